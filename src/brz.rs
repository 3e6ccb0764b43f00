#![forbid(unsafe_code)]

//! Incremental decoder for the `.brz` block container and its legacy raw
//! variant.
//!
//! A `.brz` stream is `magic (4), flags (1)`, then a sequence of blocks:
//! `comp_len: u16 LE` (zero terminates the stream), `raw_len: u16 LE`, and
//! `comp_len` bytes of run-length ops. A control byte below `0x80` starts a
//! literal run of `control + 1` bytes; anything else repeats the following
//! byte `(control & 0x7f) + 3` times. A flagged stream ends with a CRC-32 of
//! its uncompressed bytes, and another stream's magic may follow it. The raw
//! variant is the block sequence alone: no magic, no flags, no checksum, one
//! stream per source.
//!
//! The decoder is a byte-driven state machine so `submit` can stop and resume
//! at any input or output boundary.

use std::mem;

use byteorder::{ByteOrder, LittleEndian};
use crc::{Crc, Digest, CRC_32_ISO_HDLC};

use crate::engine::{DecoderConfig, Format, Status, StreamDecoder, Submit};

////////////////////////////////////////////////////////////////////////////////

pub const MAGIC: [u8; 4] = [0x91, b'B', b'R', b'Z'];

/// Stream carries a CRC-32 trailer.
pub const FLAG_CRC32: u8 = 0x01;
const FLAG_MASK: u8 = FLAG_CRC32;

/// Largest uncompressed size one block may declare.
pub const MAX_BLOCK_RAW: usize = 16 * 1024;

static CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Magic { got: usize },
    Flags,
    BlockLen { got: usize },
    BlockRawLen { got: usize },
    Ops,
    Trailer { got: usize },
    /// Between concatenated streams (`Format::Brz` only).
    Boundary,
    /// Terminator seen (`Format::Raw` only).
    Done,
    /// A terminal status was already reported; only `reset` leaves this.
    Poisoned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Control,
    Literal { left: usize },
    RunValue { len: usize },
    Run { left: usize, value: u8 },
}

////////////////////////////////////////////////////////////////////////////////

pub struct BrzDecoder {
    format: Format,
    config: DecoderConfig,
    state: State,
    op: Op,
    scratch: [u8; 4],
    /// Compressed bytes left in the current block's payload.
    comp_left: usize,
    /// Uncompressed bytes the current block still owes.
    raw_left: usize,
    has_crc: bool,
    digest: Digest<'static, u32>,
    total_out: u64,
    streams_done: u32,
}

impl BrzDecoder {
    pub fn new(format: Format) -> Self {
        Self::with_config(format, DecoderConfig::default())
    }

    pub fn with_config(format: Format, config: DecoderConfig) -> Self {
        let mut decoder = Self {
            format,
            config,
            state: State::Poisoned,
            op: Op::Control,
            scratch: [0; 4],
            comp_left: 0,
            raw_left: 0,
            has_crc: false,
            digest: CRC.digest(),
            total_out: 0,
            streams_done: 0,
        };
        decoder.reset();
        decoder
    }

    fn fail(&mut self, consumed: usize, produced: usize, status: Status) -> Submit {
        self.state = State::Poisoned;
        Submit {
            consumed,
            produced,
            status,
        }
    }

    /// Input ran dry mid-parse. Transient unless the caller promised that no
    /// more input will ever arrive.
    fn starved(&mut self, consumed: usize, produced: usize, end_of_input: bool) -> Submit {
        if !end_of_input {
            return Submit {
                consumed,
                produced,
                status: Status::Continue,
            };
        }
        let status = match self.state {
            // A truncated magic after at least one complete stream is
            // indistinguishable from trailing garbage.
            State::Magic { .. } if self.streams_done > 0 => Status::DataCorrupt,
            _ => Status::UnexpectedEndOfInput,
        };
        self.fail(consumed, produced, status)
    }

    /// Count emitted bytes against the configured output cap.
    fn account(&mut self, emitted: usize) -> Option<Status> {
        self.total_out += emitted as u64;
        match self.config.max_output_size {
            Some(limit) if self.total_out > limit => Some(Status::OutOfMemory),
            _ => None,
        }
    }
}

impl StreamDecoder for BrzDecoder {
    fn submit(&mut self, input: &[u8], end_of_input: bool, output: &mut [u8]) -> Submit {
        let mut consumed = 0;
        let mut produced = 0;

        loop {
            match self.state {
                State::Poisoned => {
                    // The driver must not call again after a terminal status.
                    return self.fail(consumed, produced, Status::InternalFault);
                }

                State::Done => {
                    return Submit {
                        consumed,
                        produced,
                        status: Status::StreamEnd,
                    };
                }

                State::Magic { got } => {
                    let Some(&byte) = input.get(consumed) else {
                        return self.starved(consumed, produced, end_of_input);
                    };
                    if byte != MAGIC[got] {
                        let status = if self.streams_done == 0 {
                            Status::FormatNotRecognized
                        } else {
                            Status::DataCorrupt
                        };
                        return self.fail(consumed, produced, status);
                    }
                    consumed += 1;
                    self.state = if got + 1 == MAGIC.len() {
                        State::Flags
                    } else {
                        State::Magic { got: got + 1 }
                    };
                }

                State::Flags => {
                    let Some(&byte) = input.get(consumed) else {
                        return self.starved(consumed, produced, end_of_input);
                    };
                    consumed += 1;
                    if byte & !FLAG_MASK != 0 {
                        return self.fail(consumed, produced, Status::UnsupportedOptions);
                    }
                    self.has_crc = byte & FLAG_CRC32 != 0;
                    self.digest = CRC.digest();
                    self.state = State::BlockLen { got: 0 };
                }

                State::BlockLen { got: 2 } => {
                    let comp_len = LittleEndian::read_u16(&self.scratch[..2]) as usize;
                    if comp_len != 0 {
                        self.comp_left = comp_len;
                        self.state = State::BlockRawLen { got: 0 };
                    } else if self.format == Format::Raw {
                        // Trailing data, if any, stays unconsumed; judging it
                        // is the driver's job for the raw variant.
                        self.state = State::Done;
                    } else if self.has_crc {
                        self.state = State::Trailer { got: 0 };
                    } else {
                        self.streams_done += 1;
                        self.state = State::Boundary;
                    }
                }

                State::BlockLen { got } => {
                    let Some(&byte) = input.get(consumed) else {
                        return self.starved(consumed, produced, end_of_input);
                    };
                    consumed += 1;
                    self.scratch[got] = byte;
                    self.state = State::BlockLen { got: got + 1 };
                }

                State::BlockRawLen { got: 2 } => {
                    let raw_len = LittleEndian::read_u16(&self.scratch[..2]) as usize;
                    if raw_len == 0 || raw_len > MAX_BLOCK_RAW {
                        return self.fail(consumed, produced, Status::DataCorrupt);
                    }
                    self.raw_left = raw_len;
                    self.op = Op::Control;
                    self.state = State::Ops;
                }

                State::BlockRawLen { got } => {
                    let Some(&byte) = input.get(consumed) else {
                        return self.starved(consumed, produced, end_of_input);
                    };
                    consumed += 1;
                    self.scratch[got] = byte;
                    self.state = State::BlockRawLen { got: got + 1 };
                }

                State::Ops => match self.op {
                    Op::Control => {
                        if self.comp_left == 0 && self.raw_left == 0 {
                            self.state = State::BlockLen { got: 0 };
                            continue;
                        }
                        if self.comp_left == 0 || self.raw_left == 0 {
                            // Payload and declared size disagree.
                            return self.fail(consumed, produced, Status::DataCorrupt);
                        }
                        let Some(&control) = input.get(consumed) else {
                            return self.starved(consumed, produced, end_of_input);
                        };
                        consumed += 1;
                        self.comp_left -= 1;
                        if control < 0x80 {
                            let len = control as usize + 1;
                            if len > self.comp_left || len > self.raw_left {
                                return self.fail(consumed, produced, Status::DataCorrupt);
                            }
                            self.op = Op::Literal { left: len };
                        } else {
                            let len = (control & 0x7f) as usize + 3;
                            if self.comp_left == 0 || len > self.raw_left {
                                return self.fail(consumed, produced, Status::DataCorrupt);
                            }
                            self.op = Op::RunValue { len };
                        }
                    }

                    Op::Literal { left } => {
                        if produced == output.len() {
                            return Submit {
                                consumed,
                                produced,
                                status: Status::Continue,
                            };
                        }
                        if consumed == input.len() {
                            return self.starved(consumed, produced, end_of_input);
                        }
                        let n = left
                            .min(input.len() - consumed)
                            .min(output.len() - produced);
                        output[produced..produced + n]
                            .copy_from_slice(&input[consumed..consumed + n]);
                        if self.has_crc {
                            self.digest.update(&output[produced..produced + n]);
                        }
                        consumed += n;
                        produced += n;
                        self.comp_left -= n;
                        self.raw_left -= n;
                        if let Some(status) = self.account(n) {
                            return self.fail(consumed, produced, status);
                        }
                        self.op = if n == left {
                            Op::Control
                        } else {
                            Op::Literal { left: left - n }
                        };
                    }

                    Op::RunValue { len } => {
                        let Some(&value) = input.get(consumed) else {
                            return self.starved(consumed, produced, end_of_input);
                        };
                        consumed += 1;
                        self.comp_left -= 1;
                        self.op = Op::Run { left: len, value };
                    }

                    Op::Run { left, value } => {
                        if produced == output.len() {
                            return Submit {
                                consumed,
                                produced,
                                status: Status::Continue,
                            };
                        }
                        let n = left.min(output.len() - produced);
                        for slot in &mut output[produced..produced + n] {
                            *slot = value;
                        }
                        if self.has_crc {
                            self.digest.update(&output[produced..produced + n]);
                        }
                        produced += n;
                        self.raw_left -= n;
                        if let Some(status) = self.account(n) {
                            return self.fail(consumed, produced, status);
                        }
                        self.op = if n == left {
                            Op::Control
                        } else {
                            Op::Run {
                                left: left - n,
                                value,
                            }
                        };
                    }
                },

                State::Trailer { got: 4 } => {
                    let want = LittleEndian::read_u32(&self.scratch);
                    let digest = mem::replace(&mut self.digest, CRC.digest());
                    if digest.finalize() != want {
                        return self.fail(consumed, produced, Status::DataCorrupt);
                    }
                    self.streams_done += 1;
                    self.state = State::Boundary;
                }

                State::Trailer { got } => {
                    let Some(&byte) = input.get(consumed) else {
                        return self.starved(consumed, produced, end_of_input);
                    };
                    consumed += 1;
                    self.scratch[got] = byte;
                    self.state = State::Trailer { got: got + 1 };
                }

                State::Boundary => {
                    if consumed < input.len() {
                        // Another concatenated stream follows.
                        self.state = State::Magic { got: 0 };
                    } else if end_of_input {
                        return Submit {
                            consumed,
                            produced,
                            status: Status::StreamEnd,
                        };
                    } else {
                        return Submit {
                            consumed,
                            produced,
                            status: Status::Continue,
                        };
                    }
                }
            }
        }
    }

    fn reset(&mut self) {
        self.state = match self.format {
            Format::Brz => State::Magic { got: 0 },
            Format::Raw => State::BlockLen { got: 0 },
        };
        self.op = Op::Control;
        self.comp_left = 0;
        self.raw_left = 0;
        self.has_crc = false;
        self.digest = CRC.digest();
        self.total_out = 0;
        self.streams_done = 0;
    }
}

////////////////////////////////////////////////////////////////////////////////
