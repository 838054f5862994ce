//! Parsing vocabulary shared by the command parser and the record decoder:
//! whitespace skipping and bounded hex numbers. Nothing else tokenizes input.

pub fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

pub fn is_hex_digit(c: u8) -> bool {
    c.is_ascii_hexdigit()
}

fn hex_value(c: u8) -> Option<u64> {
    (c as char).to_digit(16).map(u64::from)
}

/// Returns `s` without its leading whitespace.
pub fn skip_spaces(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_ascii() && is_space(c as u8))
}

/// A read position within one line of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor<'a> {
    rest: &'a [u8],
}

impl<'a> Cursor<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            rest: line.as_bytes(),
        }
    }

    pub fn skip_spaces(&mut self) {
        let n = self.rest.iter().take_while(|&&c| is_space(c)).count();
        self.rest = &self.rest[n..];
    }

    /// Consumes up to `max_digits` hex digits and returns their value.
    ///
    /// Returns `None` when no digit is present at the cursor; the cursor is
    /// left exhausted so nothing further can be parsed from it.
    pub fn hex(&mut self, max_digits: usize) -> Option<u64> {
        let mut value = 0u64;
        let mut used = 0;
        while used < max_digits {
            match self.rest.get(used).copied().and_then(hex_value) {
                Some(d) => {
                    value = (value << 4) | d;
                    used += 1;
                }
                None => break,
            }
        }
        if used == 0 {
            self.rest = &[];
            return None;
        }
        self.rest = &self.rest[used..];
        Some(value)
    }

    /// True when the next two characters are both hex digits.
    pub fn at_hex_pair(&self) -> bool {
        self.rest.len() >= 2 && is_hex_digit(self.rest[0]) && is_hex_digit(self.rest[1])
    }

    pub fn peek(&self) -> Option<u8> {
        self.rest.first().copied()
    }

    /// Consumes `c` if it is the next character.
    pub fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.rest = &self.rest[1..];
            true
        } else {
            false
        }
    }

    pub fn advance(&mut self, n: usize) {
        self.rest = &self.rest[n.min(self.rest.len())..];
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    /// Skips trailing whitespace and checks nothing else remains.
    pub fn at_end(&mut self) -> bool {
        self.skip_spaces();
        self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_stops_at_max_digits() {
        let mut cur = Cursor::new("12345678");
        assert_eq!(cur.hex(4), Some(0x1234));
        assert_eq!(cur.hex(4), Some(0x5678));
        assert!(cur.is_empty());
    }

    #[test]
    fn test_hex_stops_at_non_digit() {
        let mut cur = Cursor::new("aBc=5");
        assert_eq!(cur.hex(16), Some(0xabc));
        assert_eq!(cur.peek(), Some(b'='));
    }

    #[test]
    fn test_hex_full_width_u64() {
        let mut cur = Cursor::new("FFFFFFFFFFFFFFFF1");
        assert_eq!(cur.hex(16), Some(u64::MAX));
        assert_eq!(cur.peek(), Some(b'1'));
    }

    #[test]
    fn test_hex_without_digits_exhausts_cursor() {
        let mut cur = Cursor::new("xyz 12");
        assert_eq!(cur.hex(8), None);
        assert!(cur.is_empty());
        assert_eq!(cur.hex(8), None);
    }

    #[test]
    fn test_hex_does_not_skip_spaces() {
        let mut cur = Cursor::new(" 12");
        assert_eq!(cur.hex(8), None);
    }

    #[test]
    fn test_skip_spaces() {
        assert_eq!(skip_spaces(" \t\r\x0b\x0cW100"), "W100");
        assert_eq!(skip_spaces("   "), "");
        let mut cur = Cursor::new("  ,7");
        cur.skip_spaces();
        assert!(cur.eat(b','));
        assert!(!cur.eat(b','));
        assert_eq!(cur.hex(1), Some(7));
        assert!(cur.at_end());
    }

    #[test]
    fn test_at_hex_pair() {
        assert!(Cursor::new("a0").at_hex_pair());
        assert!(!Cursor::new("a").at_hex_pair());
        assert!(!Cursor::new("ag").at_hex_pair());
    }
}
