use crate::command::Command;
use crate::console::Console;
use crate::launch::{EntryPoints, LaunchSlots};
use crate::memory::{AccessSize, MemoryWindow};
use crate::srec::{self, Record, RecordStats};
use crate::transport::Transport;
use crate::{CommandError, CommandResult, TransportError};
use mcmon_config::MonitorConfig;
use std::convert::Infallible;
use std::fmt::Write;
use std::num::NonZeroU64;
use std::sync::Arc;

const HELP: &[&str] = &[
    "    Sn....  - Type n S-Record",
    "    Ba      - display value of byte at location a",
    "    Ha      - display value of 16-bit word at location a",
    "    Wa      - display value of 32-bit word at location a",
    "    Qa      - display value of 64-bit word at location a",
    "    Ba=v    - set byte at location a to v",
    "    Ha=v    - set 16-bit word at location a to v",
    "    Wa=v    - set 32-bit word at location a to v",
    "    Qa=v    - set 64-bit word at location a to v",
    "    Da,l,s  - dump l bytes of memory starting at a. Word size is s.",
    "    Ga      - call subroutine at address a on all cores",
    "    Ga,c    - call subroutine at address a on core c",
    "    Zs,e    - zero all memory locations a, where s <= a < e",
    "    ?       - show this help text",
];

/// Bytes shown per dump line.
const DUMP_LINE: u64 = 16;

// The console never fails; the fmt::Result only exists to satisfy the trait.
macro_rules! say {
    ($mon:expr, $($arg:tt)*) => {{
        let _ = writeln!($mon.console, $($arg)*);
    }};
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub prompt: String,
    pub banner: Option<String>,
    pub address_digits: usize,
    pub max_line: usize,
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            prompt: config.prompt.clone(),
            banner: config.banner.clone(),
            address_digits: config.address_digits(),
            max_line: config.max_line,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

/// The command loop running on the control core.
pub struct Monitor<T: Transport, M: MemoryWindow, E: EntryPoints + ?Sized> {
    console: Console<T>,
    memory: M,
    slots: Arc<LaunchSlots>,
    entries: Arc<E>,
    settings: MonitorSettings,
    stats: RecordStats,
}

impl<T, M, E> Monitor<T, M, E>
where
    T: Transport,
    M: MemoryWindow,
    E: EntryPoints + ?Sized,
{
    pub fn new(
        transport: T,
        memory: M,
        slots: Arc<LaunchSlots>,
        entries: Arc<E>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            console: Console::new(transport),
            memory,
            slots,
            entries,
            settings,
            stats: RecordStats::default(),
        }
    }

    pub fn stats(&self) -> RecordStats {
        self.stats
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn console(&self) -> &Console<T> {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut Console<T> {
        &mut self.console
    }

    pub fn slots(&self) -> &LaunchSlots {
        &self.slots
    }

    /// Greets the operator, then reads and executes lines until the
    /// transport fails.
    pub fn run(&mut self) -> Result<Infallible, TransportError> {
        if let Some(banner) = &self.settings.banner {
            say!(self, "{}", banner);
        }
        self.help();

        let mut line = String::with_capacity(self.settings.max_line);
        loop {
            let _ = write!(self.console, "{}", self.settings.prompt);
            self.console.read_line(&mut line, self.settings.max_line)?;
            self.execute_line(&line);
        }
    }

    /// Executes one line of input and reports any failure on the console.
    pub fn execute_line(&mut self, line: &str) {
        let res =
            Command::parse(line, self.settings.address_digits).and_then(|cmd| self.execute(cmd));
        if let Err(e) = res {
            tracing::debug!("Command {:?} failed: {:?}", line, e);
            say!(self, "{}", e);
        }
    }

    pub fn execute(&mut self, cmd: Command<'_>) -> CommandResult<()> {
        match cmd {
            Command::Empty => {}
            Command::Help => self.help(),
            Command::Record(line) => self.record(line),
            Command::Peek { size, addr } => self.peek(size, addr),
            Command::Poke { size, addr, value } => self.memory.write(addr, size, value),
            Command::Dump { addr, len, size } => self.dump(addr, len, size),
            Command::Zero { start, end } => self.zero_fill(start, end),
            Command::Go { entry, core } => return self.go(entry, core),
        }
        Ok(())
    }

    pub fn help(&mut self) {
        for line in HELP {
            say!(self, "{}", line);
        }
    }

    fn record(&mut self, line: &str) {
        let memory = &mut self.memory;
        match srec::decode(line, &mut self.stats, |addr, b| memory.write_u8(addr, b)) {
            Ok(Record::EndOfFile) => say!(
                self,
                "End of S-record file: {} good, {} bad",
                self.stats.good,
                self.stats.bad
            ),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Rejected S-record: {}", e);
                say!(self, "Bad S-record: \"{}\"", line);
            }
        }
    }

    fn peek(&mut self, size: AccessSize, addr: u64) {
        let value = self.memory.read(addr, size) & size.mask();
        say!(self, "{:08x} = {:0w$x}", addr, value, w = size.digits());
    }

    fn dump(&mut self, mut addr: u64, len: u64, size: AccessSize) {
        let step = size.bytes();
        let mut left = len;
        while left > 0 {
            let line_start = addr;
            let _ = write!(self.console, "{:08x}", addr);
            let mut room = DUMP_LINE;
            while room > 0 && left > 0 {
                if size == AccessSize::Byte && room == DUMP_LINE / 2 {
                    let _ = write!(self.console, " -");
                }
                let value = self.memory.read(addr, size);
                let _ = write!(self.console, " {:0w$x}", value, w = size.digits());
                addr = addr.wrapping_add(step);
                room = room.saturating_sub(step);
                left = left.saturating_sub(step);
            }
            if size == AccessSize::Byte {
                let _ = write!(self.console, "   ");
                let mut a = line_start;
                while a != addr {
                    let c = self.memory.read_u8(a);
                    let shown = if c <= b' ' || c >= 0x7f { '.' } else { c as char };
                    let _ = write!(self.console, "{}", shown);
                    a = a.wrapping_add(1);
                }
            }
            let _ = writeln!(self.console);
        }
    }

    /// Clears `[start, end)`. Single bytes until 8-byte aligned, 8-byte
    /// stores up to `end` rounded down to 8, single bytes for the rest. No
    /// wide store is ever misaligned.
    fn zero_fill(&mut self, mut start: u64, end: u64) {
        let limit = end & !0x7;
        if start < limit {
            while start & 0x7 != 0 {
                self.memory.write_u8(start, 0);
                start += 1;
            }
            while start < limit {
                self.memory.write(start, AccessSize::Quad, 0);
                start += 8;
            }
        }
        while start < end {
            self.memory.write_u8(start, 0);
            start += 1;
        }
    }

    /// Starts `entry` on `core`, or releases every worker and then calls it
    /// on the control core when no core is given.
    pub fn go(&mut self, entry: u64, core: Option<usize>) -> CommandResult<()> {
        let cores = self.slots.cores();
        match core {
            Some(c) if c >= cores => Err(CommandError::Unsupported),
            Some(0) => {
                self.call_here(entry);
                Ok(())
            }
            Some(c) => {
                let entry = NonZeroU64::new(entry).ok_or(CommandError::Unsupported)?;
                self.slots
                    .post(c, entry)
                    .map_err(|_| CommandError::Unsupported)
            }
            None => {
                if cores > 1 {
                    let entry = NonZeroU64::new(entry).ok_or(CommandError::Unsupported)?;
                    for c in 1..cores {
                        self.slots
                            .post(c, entry)
                            .map_err(|_| CommandError::Unsupported)?;
                    }
                }
                self.call_here(entry);
                Ok(())
            }
        }
    }

    fn call_here(&mut self, entry: u64) {
        let status = self.entries.invoke(entry, 0);
        say!(self, "Core 0: start function returned {}", status);
    }
}
