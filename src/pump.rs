#![forbid(unsafe_code)]

//! The read, decode, write loop driving one source to completion.

use std::io::{ErrorKind, Read, Write};

use crate::engine::{Status, StreamDecoder};
use crate::error::DecodeError;

////////////////////////////////////////////////////////////////////////////////

/// Capacity of both the input and the output buffer. Memory use per run is
/// twice this, regardless of source size.
pub const BUFFER_SIZE: usize = 8 * 1024;

/// Whether the source may still yield bytes. Sticky once `Finish`: after the
/// source reports exhaustion the decoder is told on every remaining step that
/// its input is final.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Action {
    Run,
    Finish,
}

/// Read once, retrying interrupted calls. `Ok(0)` means the source is
/// exhausted; a short non-zero read is an ordinary result, not an error.
fn read_some<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize, DecodeError> {
    loop {
        match source.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(DecodeError::SourceRead(e)),
        }
    }
}

/// The decoder claims the stream ended cleanly. Verify it defensively: no
/// buffered input may remain, and the source must have nothing further.
/// Anything left over is trailing garbage after a complete payload, reported
/// as corruption rather than silently accepted.
fn validate_stream_end<R: Read>(
    source: &mut R,
    unconsumed: usize,
    action: Action,
) -> Result<(), DecodeError> {
    if unconsumed != 0 {
        return Err(DecodeError::DataCorrupt);
    }
    if action == Action::Finish {
        return Ok(());
    }
    let mut probe = [0u8; 1];
    if read_some(source, &mut probe)? != 0 {
        return Err(DecodeError::DataCorrupt);
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////

/// Drives one (source, sink) pair at a time through a [`StreamDecoder`].
///
/// The pump owns its two fixed-size buffers and the decoder instance, so a
/// batch of sources can be decoded without reallocating either: `run` resets
/// the decoder before touching the new source.
pub struct StreamPump<D> {
    decoder: D,
    in_buf: Vec<u8>,
    out_buf: Vec<u8>,
}

impl<D: StreamDecoder> StreamPump<D> {
    pub fn new(decoder: D) -> Self {
        Self::with_buffer_size(decoder, BUFFER_SIZE)
    }

    pub fn with_buffer_size(decoder: D, size: usize) -> Self {
        assert!(size > 0, "buffer size must be non-zero");
        Self {
            decoder,
            in_buf: vec![0; size],
            out_buf: vec![0; size],
        }
    }

    /// Decode one complete source into the sink.
    ///
    /// Returns only after everything successfully decoded has been written:
    /// even when a step fails, output produced up to that point reaches the
    /// sink first.
    pub fn run<R: Read, W: Write>(
        &mut self,
        mut source: R,
        mut sink: W,
    ) -> Result<(), DecodeError> {
        self.decoder.reset();

        let mut in_pos = 0;
        let mut in_len = 0;
        let mut out_len = 0;
        let mut action = Action::Run;

        loop {
            // Refill only once every previously buffered byte was consumed;
            // refilling earlier would reorder bytes the decoder has not seen.
            if in_pos == in_len && action == Action::Run {
                in_pos = 0;
                in_len = read_some(&mut source, &mut self.in_buf)?;
                if in_len == 0 {
                    action = Action::Finish;
                }
            }

            let step = self.decoder.submit(
                &self.in_buf[in_pos..in_len],
                action == Action::Finish,
                &mut self.out_buf[out_len..],
            );
            in_pos += step.consumed;
            out_len += step.produced;

            // Flush before interpreting the status, so that everything the
            // decoder managed to produce reaches the sink even when this very
            // step reported a failure.
            if out_len == self.out_buf.len() || step.status != Status::Continue {
                sink.write_all(&self.out_buf[..out_len])
                    .map_err(DecodeError::SinkWrite)?;
                out_len = 0;
            }

            match step.status {
                Status::Continue => {}
                Status::StreamEnd => {
                    validate_stream_end(&mut source, in_len - in_pos, action)?;
                    sink.flush().map_err(DecodeError::SinkWrite)?;
                    return Ok(());
                }
                Status::OutOfMemory => return Err(DecodeError::OutOfMemory),
                Status::FormatNotRecognized => return Err(DecodeError::FormatNotRecognized),
                Status::UnsupportedOptions => return Err(DecodeError::UnsupportedOptions),
                Status::DataCorrupt => return Err(DecodeError::DataCorrupt),
                Status::UnexpectedEndOfInput => return Err(DecodeError::UnexpectedEndOfInput),
                Status::InternalFault => return Err(DecodeError::InternalFault),
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
