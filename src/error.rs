#![forbid(unsafe_code)]

use std::io;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////

/// Everything that can end processing of one source early.
///
/// `SinkWrite` is fatal for the whole run: once a write has failed, output
/// integrity cannot be trusted for anything decoded afterwards. Every other
/// variant is fatal only for the current source.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Cannot allocate memory")]
    OutOfMemory,

    #[error("File format not recognized")]
    FormatNotRecognized,

    #[error("Unsupported compression options")]
    UnsupportedOptions,

    #[error("File is corrupt")]
    DataCorrupt,

    #[error("Unexpected end of input")]
    UnexpectedEndOfInput,

    #[error("Error reading input: {0}")]
    SourceRead(#[source] io::Error),

    #[error("Cannot write to output: {0}")]
    SinkWrite(#[source] io::Error),

    /// A driver or engine bug, not bad user data.
    #[error("Internal error (bug)")]
    InternalFault,
}

impl DecodeError {
    /// True when the whole run must stop, not just the current source.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, DecodeError::SinkWrite(_))
    }
}
