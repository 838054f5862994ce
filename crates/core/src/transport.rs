use crate::TransportError;
use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// Byte-at-a-time serial link. Both directions block.
pub trait Transport {
    fn read_char(&mut self) -> Result<u8, TransportError>;
    fn write_char(&mut self, c: u8);
}

/// Console on the host's stdin/stdout.
#[derive(Debug, Default)]
pub struct StdioTransport {}

impl StdioTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for StdioTransport {
    fn read_char(&mut self) -> Result<u8, TransportError> {
        io::stdout().flush()?;
        let mut byte = [0u8; 1];
        loop {
            match io::stdin().lock().read(&mut byte) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(_) => return Ok(byte[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write_char(&mut self, c: u8) {
        let mut out = io::stdout().lock();
        // A vanished stdout leaves nothing to report the failure on.
        let _ = out.write_all(&[c]);
        if c == b'\n' {
            let _ = out.flush();
        }
    }
}

/// In-memory link fed from a fixed script; reports `Closed` once the script
/// is used up.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl ScriptedTransport {
    pub fn new(input: impl AsRef<[u8]>) -> Self {
        Self {
            input: input.as_ref().iter().copied().collect(),
            output: Vec::new(),
        }
    }

    pub fn push_input(&mut self, input: impl AsRef<[u8]>) {
        self.input.extend(input.as_ref().iter().copied());
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output so far with `\r\n` line ends folded to `\n`.
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).replace("\r\n", "\n")
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }
}

impl Transport for ScriptedTransport {
    fn read_char(&mut self) -> Result<u8, TransportError> {
        self.input.pop_front().ok_or(TransportError::Closed)
    }

    fn write_char(&mut self, c: u8) {
        self.output.push(c);
    }
}
