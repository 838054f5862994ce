use crate::lexer::{skip_spaces, Cursor};
use crate::memory::AccessSize;
use crate::{CommandError, CommandResult};

const DEFAULT_DUMP_LEN: u64 = 16;
const DUMP_LEN_DIGITS: usize = 4;
const CORE_DIGITS: usize = 1;

/// One parsed line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Blank line.
    Empty,
    Help,
    /// The whole record line, starting at the `S`.
    Record(&'a str),
    Peek {
        size: AccessSize,
        addr: u64,
    },
    Poke {
        size: AccessSize,
        addr: u64,
        value: u64,
    },
    Dump {
        addr: u64,
        len: u64,
        size: AccessSize,
    },
    /// Clear `[start, end)`.
    Zero {
        start: u64,
        end: u64,
    },
    /// Launch `entry` on one core, or on every core when `core` is `None`.
    Go {
        entry: u64,
        core: Option<usize>,
    },
}

impl<'a> Command<'a> {
    /// Parses a line. `addr_digits` bounds the hex digits of an address.
    pub fn parse(line: &'a str, addr_digits: usize) -> CommandResult<Self> {
        let line = skip_spaces(line);
        let Some(&letter) = line.as_bytes().first() else {
            return Ok(Command::Empty);
        };
        let mut args = Cursor::new(line);
        args.advance(1);

        match letter.to_ascii_uppercase() {
            b'S' => Ok(Command::Record(line)),
            b'B' => parse_word(AccessSize::Byte, args, addr_digits),
            b'H' => parse_word(AccessSize::Half, args, addr_digits),
            b'W' => parse_word(AccessSize::Word, args, addr_digits),
            b'Q' => parse_word(AccessSize::Quad, args, addr_digits),
            b'D' => parse_dump(args, addr_digits),
            b'Z' => parse_zero(args, addr_digits),
            b'G' => parse_go(args, addr_digits),
            b'?' => Ok(Command::Help),
            _ => Err(CommandError::Unrecognized),
        }
    }
}

fn parse_word(size: AccessSize, mut cur: Cursor<'_>, addr_digits: usize) -> CommandResult<Command<'static>> {
    cur.skip_spaces();
    let addr = cur.hex(addr_digits).ok_or(CommandError::Syntax)?;
    if !size.is_aligned(addr) {
        return Err(CommandError::Misaligned);
    }

    if cur.at_end() {
        return Ok(Command::Peek { size, addr });
    }
    if !cur.eat(b'=') {
        return Err(CommandError::Syntax);
    }
    cur.skip_spaces();
    let value = cur.hex(size.digits()).ok_or(CommandError::Syntax)?;
    if !cur.at_end() {
        return Err(CommandError::Syntax);
    }
    Ok(Command::Poke { size, addr, value })
}

fn parse_dump(mut cur: Cursor<'_>, addr_digits: usize) -> CommandResult<Command<'static>> {
    cur.skip_spaces();
    let addr = cur.hex(addr_digits).ok_or(CommandError::Syntax)?;
    let mut len = DEFAULT_DUMP_LEN;
    let mut size = 1;

    cur.skip_spaces();
    if cur.eat(b',') {
        cur.skip_spaces();
        len = cur.hex(DUMP_LEN_DIGITS).ok_or(CommandError::Syntax)?;
        cur.skip_spaces();
        if cur.eat(b',') {
            cur.skip_spaces();
            size = cur.hex(1).ok_or(CommandError::Syntax)?;
        }
    }
    if !cur.at_end() {
        return Err(CommandError::Syntax);
    }

    let size = AccessSize::from_bytes(size).ok_or(CommandError::Unsupported)?;
    if !size.is_aligned(addr) {
        return Err(CommandError::Unsupported);
    }
    Ok(Command::Dump { addr, len, size })
}

fn parse_zero(mut cur: Cursor<'_>, addr_digits: usize) -> CommandResult<Command<'static>> {
    cur.skip_spaces();
    let start = cur.hex(addr_digits).ok_or(CommandError::Syntax)?;
    let mut end = 0;

    cur.skip_spaces();
    if cur.eat(b',') {
        cur.skip_spaces();
        end = cur.hex(addr_digits).ok_or(CommandError::Syntax)?;
    }
    if !cur.at_end() || start > end {
        return Err(CommandError::Syntax);
    }
    Ok(Command::Zero { start, end })
}

fn parse_go(mut cur: Cursor<'_>, addr_digits: usize) -> CommandResult<Command<'static>> {
    cur.skip_spaces();
    let entry = cur.hex(addr_digits).ok_or(CommandError::Syntax)?;
    let mut core = None;

    cur.skip_spaces();
    if cur.eat(b',') {
        cur.skip_spaces();
        core = Some(cur.hex(CORE_DIGITS).ok_or(CommandError::Syntax)? as usize);
    }
    if !cur.at_end() {
        return Err(CommandError::Syntax);
    }
    Ok(Command::Go { entry, core })
}
