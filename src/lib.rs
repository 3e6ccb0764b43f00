#![forbid(unsafe_code)]

use std::io::{Read, Write};

pub mod brz;
pub mod engine;
pub mod error;
pub mod pump;

pub use brz::BrzDecoder;
pub use engine::{DecoderConfig, Format, Status, StreamDecoder, Submit};
pub use error::DecodeError;
pub use pump::StreamPump;

/// Decode one complete source into the sink using the built-in engine.
///
/// For batches, build a [`StreamPump`] once and call [`StreamPump::run`] per
/// source instead, so decoder state and buffers are reused.
pub fn decompress<R: Read, W: Write>(
    input: R,
    output: W,
    format: Format,
) -> Result<(), DecodeError> {
    StreamPump::new(BrzDecoder::new(format)).run(input, output)
}
