pub mod bus;
pub mod command;
pub mod console;
pub mod launch;
pub mod lexer;
pub mod memory;
pub mod monitor;
pub mod srec;
pub mod transport;


pub use command::Command;
pub use console::{Console, LineWriter};
pub use launch::{EntryPoints, EntryTable, LaunchSlots, Worker};
pub use memory::{AccessSize, MemoryWindow};
pub use monitor::{Monitor, MonitorSettings};
pub use srec::{Record, RecordStats};
pub use transport::Transport;

/// Failures of a single monitor command. The REPL reports them and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Unparseable field or trailing garbage.
    #[error("How?")]
    Syntax,
    /// Address not a multiple of the access size.
    #[error("How?")]
    Misaligned,
    /// Well-formed, but asks for something the monitor can't do.
    #[error("Sorry :-(")]
    Unsupported,
    #[error("What?")]
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("unknown record type")]
    BadType,
    #[error("record shorter than its byte count")]
    BadLength,
    #[error("non-hex digit in record payload")]
    NonHex,
    #[error("checksum mismatch")]
    BadChecksum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    #[error("core {0} has no launch slot")]
    NoSuchCore(usize),
    #[error("the control core is never launched through a slot")]
    ControlCore,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CommandResult<T> = Result<T, CommandError>;
