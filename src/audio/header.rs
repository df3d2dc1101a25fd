//! # WAV Header Repair
//!
//! Speech synthesized through a streaming call arrives as a RIFF/WAVE container whose
//! size fields were written before the total length was known. The upstream writer
//! fills them with `0` or `0xFFFFFFFF`, which many decoders (browsers included) refuse
//! to play. This module buffers nothing itself: it takes the fully received buffer and
//! patches the two size fields in place.
//!
//! ## RIFF Layout:
//! ```text
//! offset  size  field
//! 0       4     "RIFF"
//! 4       4     riff chunk size  = total length - 8
//! 8       4     "WAVE"
//! 12      ...   subchunks: 4-byte id, 4-byte little-endian size, body (padded to even)
//! ```
//!
//! ## Key Rust Concepts Used:
//! - **Slices (&[u8])**: Read header fields without copying the sample data
//! - **Iterator trait**: `Chunks` walks subchunk headers lazily and stops on the first error
//! - **byteorder**: Explicit little-endian reads and writes of the size fields

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Length of the `RIFF <size> WAVE` preamble.
const PREAMBLE_LEN: usize = 12;

/// Length of every subchunk header (id + size).
const CHUNK_HEADER_LEN: usize = 8;

/// Minimum body length of a PCM `fmt ` chunk.
const FMT_BODY_LEN: usize = 16;

const RIFF_ID: &[u8; 4] = b"RIFF";
const WAVE_ID: &[u8; 4] = b"WAVE";
const FMT_ID: &[u8; 4] = b"fmt ";
const DATA_ID: &[u8; 4] = b"data";

/// Reasons a synthesized buffer cannot be repaired.
///
/// Every variant means the upstream service handed us something that is not a
/// usable WAV file, so callers surface these as a bad upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WavRepairError {
    /// Buffer is shorter than the 12-byte RIFF/WAVE preamble
    TooShort(usize),

    /// First four bytes are not `RIFF`
    NotRiff,

    /// Form type at offset 8 is not `WAVE`
    NotWave,

    /// A subchunk header or body runs past the end of the buffer
    TruncatedChunk { offset: usize },

    /// No `fmt ` subchunk before the end of the buffer
    MissingFormatChunk,

    /// No `data` subchunk before the end of the buffer
    MissingDataChunk,

    /// RIFF size fields are 32-bit; the buffer cannot be described by them
    TooLarge(usize),
}

impl fmt::Display for WavRepairError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WavRepairError::TooShort(len) => {
                write!(f, "audio buffer too short for a WAV header ({} bytes)", len)
            }
            WavRepairError::NotRiff => write!(f, "audio buffer is not a RIFF container"),
            WavRepairError::NotWave => write!(f, "RIFF container is not of form type WAVE"),
            WavRepairError::TruncatedChunk { offset } => {
                write!(f, "WAV subchunk at offset {} is truncated", offset)
            }
            WavRepairError::MissingFormatChunk => write!(f, "WAV buffer has no fmt subchunk"),
            WavRepairError::MissingDataChunk => write!(f, "WAV buffer has no data subchunk"),
            WavRepairError::TooLarge(len) => {
                write!(f, "audio buffer of {} bytes exceeds the RIFF size limit", len)
            }
        }
    }
}

impl std::error::Error for WavRepairError {}

/// Format details read back from a (repaired) WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    /// WAVE format tag (1 = integer PCM)
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Length of the sample payload in bytes, clamped to what is actually present
    pub data_len: u32,
}

impl WavInfo {
    /// Number of sample frames (one sample per channel) in the payload.
    pub fn frame_count(&self) -> u64 {
        let frame_bytes = u64::from(self.channels) * u64::from(self.bits_per_sample / 8);
        if frame_bytes == 0 {
            return 0;
        }
        u64::from(self.data_len) / frame_bytes
    }

    /// Playback duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frame_count() * 1000 / u64::from(self.sample_rate)
    }
}

/// One subchunk header found while walking the container.
#[derive(Debug, Clone, Copy)]
struct Chunk<'a> {
    id: &'a [u8],
    /// Offset of the chunk header (its id) from the start of the buffer
    offset: usize,
    /// Size field exactly as written by the encoder
    declared_size: u32,
}

/// Walks subchunk headers after the preamble.
///
/// Subchunk order is not fixed across encoders (`LIST` or `fact` chunks may sit
/// between `fmt ` and `data`), so callers search by id instead of assuming offsets.
struct Chunks<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Chunks<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Self::starting_at(buffer, PREAMBLE_LEN)
    }

    fn starting_at(buffer: &'a [u8], offset: usize) -> Self {
        Self { buffer, offset }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>, WavRepairError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset;
        if offset >= self.buffer.len() {
            return None;
        }

        if self.buffer.len() - offset < CHUNK_HEADER_LEN {
            self.offset = self.buffer.len();
            return Some(Err(WavRepairError::TruncatedChunk { offset }));
        }

        let id = &self.buffer[offset..offset + 4];
        let declared_size = LittleEndian::read_u32(&self.buffer[offset + 4..offset + CHUNK_HEADER_LEN]);

        // Bodies are padded to an even length; the pad byte is not counted in the size.
        let body_len = declared_size as usize + (declared_size as usize & 1);
        self.offset = offset
            .saturating_add(CHUNK_HEADER_LEN)
            .saturating_add(body_len);

        Some(Ok(Chunk {
            id,
            offset,
            declared_size,
        }))
    }
}

/// Repair the RIFF and `data` chunk-size fields of a fully buffered WAV file.
///
/// ## What this does:
/// 1. Validates the `RIFF`/`WAVE` preamble
/// 2. Locates the `data` subchunk by scanning subchunk headers
/// 3. Writes `len - 8` into the RIFF size field (bytes 4-7)
/// 4. Writes `len - data_offset - 8` into the `data` size field, unless the declared
///    size already describes the buffer (see `data_size_is_consistent`)
///
/// Everything else (format chunk, extra chunks, sample bytes) is left untouched,
/// so applying this to an already-correct file returns it byte-for-byte, including
/// files with an odd-length payload plus pad byte or chunks after `data`.
///
/// ## Rust Concepts:
/// - **Vec<u8> by value**: The buffer is patched in place and handed back, no copy
/// - **Result<T, E>**: A malformed buffer is reported instead of panicking
pub fn repair_header(mut buffer: Vec<u8>) -> Result<Vec<u8>, WavRepairError> {
    check_preamble(&buffer)?;

    let total_len = buffer.len();
    let riff_size = u32::try_from(total_len - 8).map_err(|_| WavRepairError::TooLarge(total_len))?;

    let data = find_chunk(&buffer, DATA_ID).ok_or(WavRepairError::MissingDataChunk)??;
    let data_offset = data.offset;
    let keep_data_size = data_size_is_consistent(&buffer, data);

    LittleEndian::write_u32(&mut buffer[4..8], riff_size);
    if !keep_data_size {
        // data_offset + 8 <= total_len is guaranteed by the chunk walker
        let data_size = (total_len - data_offset - CHUNK_HEADER_LEN) as u32;
        LittleEndian::write_u32(
            &mut buffer[data_offset + 4..data_offset + CHUNK_HEADER_LEN],
            data_size,
        );
    }

    Ok(buffer)
}

/// Whether the `data` chunk's declared size already matches the buffer.
///
/// True when the body (plus its pad byte, if any) runs exactly to the end, or ends
/// inside the buffer and every following chunk fits. The `0` and `0xFFFFFFFF`
/// placeholders written by streaming encoders never count as consistent unless the
/// payload really is that long.
fn data_size_is_consistent(buffer: &[u8], data: Chunk<'_>) -> bool {
    let remaining = buffer.len() - data.offset - CHUNK_HEADER_LEN;
    let declared = data.declared_size as usize;

    if data.declared_size == u32::MAX || (declared == 0 && remaining > 0) {
        return false;
    }
    if declared == remaining || declared + (declared & 1) == remaining {
        return true;
    }
    if declared > remaining {
        return false;
    }

    let trailing = data.offset + CHUNK_HEADER_LEN + declared + (declared & 1);
    Chunks::starting_at(buffer, trailing).all(|chunk| match chunk {
        Ok(chunk) => chunk.offset + CHUNK_HEADER_LEN + chunk.declared_size as usize <= buffer.len(),
        Err(_) => false,
    })
}

/// Read the format and payload length from a WAV buffer.
///
/// Used after repair to log what is being sent back; the declared `data` size is
/// clamped to the bytes actually present so a still-broken header cannot inflate it.
pub fn inspect(buffer: &[u8]) -> Result<WavInfo, WavRepairError> {
    check_preamble(buffer)?;

    let fmt = find_chunk(buffer, FMT_ID).ok_or(WavRepairError::MissingFormatChunk)??;
    let body = fmt.offset + CHUNK_HEADER_LEN;
    if (fmt.declared_size as usize) < FMT_BODY_LEN || buffer.len() < body + FMT_BODY_LEN {
        return Err(WavRepairError::TruncatedChunk { offset: fmt.offset });
    }

    let data = find_chunk(buffer, DATA_ID).ok_or(WavRepairError::MissingDataChunk)??;
    let available = buffer.len() - data.offset - CHUNK_HEADER_LEN;
    let data_len = (data.declared_size as usize).min(available) as u32;

    Ok(WavInfo {
        audio_format: LittleEndian::read_u16(&buffer[body..body + 2]),
        channels: LittleEndian::read_u16(&buffer[body + 2..body + 4]),
        sample_rate: LittleEndian::read_u32(&buffer[body + 4..body + 8]),
        bits_per_sample: LittleEndian::read_u16(&buffer[body + 14..body + 16]),
        data_len,
    })
}

fn check_preamble(buffer: &[u8]) -> Result<(), WavRepairError> {
    if buffer.len() < PREAMBLE_LEN {
        return Err(WavRepairError::TooShort(buffer.len()));
    }
    if &buffer[0..4] != RIFF_ID {
        return Err(WavRepairError::NotRiff);
    }
    if &buffer[8..12] != WAVE_ID {
        return Err(WavRepairError::NotWave);
    }
    Ok(())
}

/// First subchunk with the given id, `None` if the walk ends without finding it.
fn find_chunk<'a>(buffer: &'a [u8], id: &[u8; 4]) -> Option<Result<Chunk<'a>, WavRepairError>> {
    Chunks::new(buffer).find(|chunk| match chunk {
        Ok(chunk) => chunk.id == id,
        Err(_) => true,
    })
}
