#![forbid(unsafe_code)]

//! The seam between the stream pump and a block-oriented decoding engine.

////////////////////////////////////////////////////////////////////////////////

/// Container format a decoder is asked to interpret.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// The self-describing `.brz` format. Several streams may be concatenated
    /// in one source; the decoder consumes them all and reports `StreamEnd`
    /// only at a clean stream boundary once the input is exhausted.
    Brz,
    /// The legacy headerless block stream. Exactly one stream per source;
    /// anything after its terminator is left unconsumed for the caller to
    /// judge.
    Raw,
}

////////////////////////////////////////////////////////////////////////////////

/// Outcome of one `submit` step. A closed set; match it exhaustively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Keep pumping.
    Continue,
    /// The stream decoded completely and validly.
    StreamEnd,
    OutOfMemory,
    FormatNotRecognized,
    UnsupportedOptions,
    DataCorrupt,
    UnexpectedEndOfInput,
    /// Contract violation between driver and engine. A bug, not user data.
    InternalFault,
}

/// What one `submit` call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submit {
    /// Input bytes consumed by this call.
    pub consumed: usize,
    /// Output bytes produced by this call.
    pub produced: usize,
    pub status: Status,
}

////////////////////////////////////////////////////////////////////////////////

/// Limits applied while decoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecoderConfig {
    /// Cap on total uncompressed bytes per source; `None` means unbounded.
    /// Exceeding the cap reports `Status::OutOfMemory`.
    pub max_output_size: Option<u64>,
}

////////////////////////////////////////////////////////////////////////////////

/// A stateful decoder driven one step at a time by [`crate::pump::StreamPump`].
///
/// Contract: `submit` consumes as much of `input` as it can in one call and
/// writes at most `output.len()` bytes. `end_of_input` promises that no byte
/// beyond `input` will ever arrive, so the decoder must either conclude at a
/// valid stream boundary or report the malformation. A `Continue` return must
/// have consumed input or produced output unless `input` was empty.
pub trait StreamDecoder {
    fn submit(&mut self, input: &[u8], end_of_input: bool, output: &mut [u8]) -> Submit;

    /// Prepare the same instance for a new, independent source with the same
    /// format and limits, discarding all prior state.
    fn reset(&mut self);
}
