use crate::transport::Transport;
use crate::TransportError;
use std::fmt;
use std::io;

const BEL: u8 = 0x07;
const BS: u8 = 0x08;
const DEL: u8 = 0x7f;

/// Text I/O over a transport: formatted output and an editing line reader.
#[derive(Debug)]
pub struct Console<T: Transport> {
    transport: T,
}

impl<T: Transport> Console<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Reads one line into `buf`, echoing as it goes.
    ///
    /// Backspace and delete erase the last character on screen and in the
    /// buffer. Bell answers a backspace on an empty line, a full buffer and
    /// control characters. CR or LF ends the line and is echoed as CR LF.
    pub fn read_line(&mut self, buf: &mut String, max: usize) -> Result<(), TransportError> {
        buf.clear();
        loop {
            let c = self.transport.read_char()?;
            match c {
                b'\r' | b'\n' => break,
                BS | DEL => {
                    if buf.pop().is_some() {
                        self.transport.write_char(BS);
                        self.transport.write_char(b' ');
                        self.transport.write_char(BS);
                    } else {
                        self.transport.write_char(BEL);
                    }
                }
                b' '..=b'~' if buf.len() < max => {
                    self.transport.write_char(c);
                    buf.push(c as char);
                }
                _ => self.transport.write_char(BEL),
            }
        }
        self.transport.write_char(b'\r');
        self.transport.write_char(b'\n');
        Ok(())
    }
}

impl<T: Transport> fmt::Write for Console<T> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &c in s.as_bytes() {
            if c == b'\n' {
                self.transport.write_char(b'\r');
            }
            self.transport.write_char(c);
        }
        Ok(())
    }
}

/// Output-only console for worker cores sharing a stream with others.
///
/// Text is held until a line is complete, then the whole line goes out in a
/// single write so reports from different cores never interleave mid-line.
#[derive(Debug)]
pub struct LineWriter<W: io::Write> {
    inner: W,
    line: Vec<u8>,
}

impl<W: io::Write> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            line: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> fmt::Write for LineWriter<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &c in s.as_bytes() {
            if c == b'\n' {
                self.line.extend_from_slice(b"\r\n");
                // Nobody is left to tell if the stream is gone.
                let _ = self.inner.write_all(&self.line);
                let _ = self.inner.flush();
                self.line.clear();
            } else {
                self.line.push(c);
            }
        }
        Ok(())
    }
}
