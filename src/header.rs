//! Fixed 128-byte segment header
//!
//! Layout (little-endian, packed):
//! ```text
//!   0  magic               u32
//!   4  version             u32
//!   8  sample_rate         u32
//!  12  channels            u32
//!  16  frames              u32
//!  20  format              u32   0 = float32
//!  24  input_offset        u32   = HEADER_SIZE
//!  28  output_offset       u32   = HEADER_SIZE + frames * channels * 4
//!  32  status              i32
//!  36  processing_time_ns  i64
//!  44  gain                f32
//!  48  bypass              u32   0 / 1
//!  52  reserved            [u8; 76]
//! ```
//!
//! The codec works on byte buffers, never on an in-memory struct layout.

use crate::error::{AudioShmError, HeaderFault, Result};
use crate::status::Status;

/// Magic number for segment validation ("ASHD")
pub const AUDIO_SHM_MAGIC: u32 = 0x4153_4844;
/// Protocol version
pub const AUDIO_SHM_VERSION: u32 = 1;
/// Header size in bytes
pub const HEADER_SIZE: usize = 128;
/// Only supported sample format: interleaved float32
pub const FORMAT_FLOAT32: u32 = 0;
/// Bytes per sample
pub const BYTES_PER_SAMPLE: usize = 4;

pub const OFFSET_MAGIC: usize = 0;
pub const OFFSET_VERSION: usize = 4;
pub const OFFSET_SAMPLE_RATE: usize = 8;
pub const OFFSET_CHANNELS: usize = 12;
pub const OFFSET_FRAMES: usize = 16;
pub const OFFSET_FORMAT: usize = 20;
pub const OFFSET_INPUT: usize = 24;
pub const OFFSET_OUTPUT: usize = 28;
pub const OFFSET_STATUS: usize = 32;
pub const OFFSET_PROCESSING_TIME: usize = 36;
pub const OFFSET_GAIN: usize = 44;
pub const OFFSET_BYPASS: usize = 48;
pub const OFFSET_RESERVED: usize = 52;

/// Shape of the audio carried by a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamShape {
    pub sample_rate: u32,
    pub channels: u32,
    pub frames: u32,
}

impl StreamShape {
    pub fn new(sample_rate: u32, channels: u32, frames: u32) -> Self {
        Self {
            sample_rate,
            channels,
            frames,
        }
    }

    /// frames * channels
    #[inline]
    pub fn sample_count(&self) -> usize {
        self.frames as usize * self.channels as usize
    }

    /// Size of one payload region in bytes
    #[inline]
    pub fn payload_bytes(&self) -> usize {
        self.sample_count() * BYTES_PER_SAMPLE
    }
}

/// Per-request transform parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessParams {
    /// Linear gain applied before soft clipping; nominal range 0.0 to 2.0
    pub gain: f32,
    /// Copy input to output untouched
    pub bypass: bool,
}

impl Default for ProcessParams {
    fn default() -> Self {
        Self {
            gain: 1.0,
            bypass: false,
        }
    }
}

/// Total segment size for a stream shape
///
/// Both the allocator and anything validating an existing segment go through
/// this. Offsets are stored as `u32`, so shapes whose segment would not be
/// addressable by them are rejected.
pub fn segment_size(frames: u32, channels: u32) -> Result<usize> {
    if channels == 0 {
        return Err(AudioShmError::InvalidShape { frames, channels });
    }

    let payload = frames as u64 * channels as u64 * BYTES_PER_SAMPLE as u64;
    let total = HEADER_SIZE as u64 + 2 * payload;
    if total > u32::MAX as u64 {
        return Err(AudioShmError::InvalidShape { frames, channels });
    }

    Ok(total as usize)
}

/// Decoded header contents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioHeader {
    pub sample_rate: u32,
    pub channels: u32,
    pub frames: u32,
    pub input_offset: u32,
    pub output_offset: u32,
    pub status: Status,
    pub processing_time_ns: i64,
    pub gain: f32,
    pub bypass: bool,
}

impl AudioHeader {
    /// Build a fresh IDLE header for `shape`, computing both payload offsets
    pub fn new(shape: StreamShape, params: ProcessParams) -> Result<Self> {
        segment_size(shape.frames, shape.channels)?;

        let payload = shape.payload_bytes() as u32;
        Ok(Self {
            sample_rate: shape.sample_rate,
            channels: shape.channels,
            frames: shape.frames,
            input_offset: HEADER_SIZE as u32,
            output_offset: HEADER_SIZE as u32 + payload,
            status: Status::Idle,
            processing_time_ns: 0,
            gain: params.gain,
            bypass: params.bypass,
        })
    }

    pub fn shape(&self) -> StreamShape {
        StreamShape::new(self.sample_rate, self.channels, self.frames)
    }

    pub fn params(&self) -> ProcessParams {
        ProcessParams {
            gain: self.gain,
            bypass: self.bypass,
        }
    }

    /// Segment size implied by the declared shape
    pub fn segment_size(&self) -> Result<usize> {
        segment_size(self.frames, self.channels)
    }

    /// Serialize to the fixed wire layout
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];

        put_u32(&mut bytes, OFFSET_MAGIC, AUDIO_SHM_MAGIC);
        put_u32(&mut bytes, OFFSET_VERSION, AUDIO_SHM_VERSION);
        put_u32(&mut bytes, OFFSET_SAMPLE_RATE, self.sample_rate);
        put_u32(&mut bytes, OFFSET_CHANNELS, self.channels);
        put_u32(&mut bytes, OFFSET_FRAMES, self.frames);
        put_u32(&mut bytes, OFFSET_FORMAT, FORMAT_FLOAT32);
        put_u32(&mut bytes, OFFSET_INPUT, self.input_offset);
        put_u32(&mut bytes, OFFSET_OUTPUT, self.output_offset);
        bytes[OFFSET_STATUS..OFFSET_STATUS + 4].copy_from_slice(&self.status.code().to_le_bytes());
        bytes[OFFSET_PROCESSING_TIME..OFFSET_PROCESSING_TIME + 8]
            .copy_from_slice(&self.processing_time_ns.to_le_bytes());
        bytes[OFFSET_GAIN..OFFSET_GAIN + 4].copy_from_slice(&self.gain.to_le_bytes());
        put_u32(&mut bytes, OFFSET_BYPASS, self.bypass as u32);

        bytes
    }

    /// Parse and validate a header block
    ///
    /// Magic and version are checked before any other field is read.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_SIZE {
            return Err(HeaderFault::Length {
                expected: HEADER_SIZE,
                got: bytes.len(),
            }
            .into());
        }

        let magic = get_u32(bytes, OFFSET_MAGIC);
        if magic != AUDIO_SHM_MAGIC {
            return Err(HeaderFault::Magic {
                expected: AUDIO_SHM_MAGIC,
                got: magic,
            }
            .into());
        }

        let version = get_u32(bytes, OFFSET_VERSION);
        if version != AUDIO_SHM_VERSION {
            return Err(HeaderFault::Version {
                expected: AUDIO_SHM_VERSION,
                got: version,
            }
            .into());
        }

        let format = get_u32(bytes, OFFSET_FORMAT);
        if format != FORMAT_FLOAT32 {
            return Err(HeaderFault::Format(format).into());
        }

        let channels = get_u32(bytes, OFFSET_CHANNELS);
        if channels == 0 {
            return Err(HeaderFault::NoChannels.into());
        }
        let frames = get_u32(bytes, OFFSET_FRAMES);

        let input_offset = get_u32(bytes, OFFSET_INPUT);
        if input_offset != HEADER_SIZE as u32 {
            return Err(HeaderFault::InputOffset {
                expected: HEADER_SIZE as u32,
                got: input_offset,
            }
            .into());
        }

        let output_offset = get_u32(bytes, OFFSET_OUTPUT);
        let expected_output =
            input_offset as u64 + frames as u64 * channels as u64 * BYTES_PER_SAMPLE as u64;
        if output_offset as u64 != expected_output {
            return Err(HeaderFault::OutputOffset {
                expected: expected_output,
                got: output_offset,
            }
            .into());
        }

        let raw_status = i32::from_le_bytes(array(bytes, OFFSET_STATUS));
        let status = Status::try_from(raw_status).map_err(HeaderFault::Status)?;

        let bypass = match get_u32(bytes, OFFSET_BYPASS) {
            0 => false,
            1 => true,
            other => return Err(HeaderFault::Bypass(other).into()),
        };

        Ok(Self {
            sample_rate: get_u32(bytes, OFFSET_SAMPLE_RATE),
            channels,
            frames,
            input_offset,
            output_offset,
            status,
            processing_time_ns: i64::from_le_bytes(array(bytes, OFFSET_PROCESSING_TIME)),
            gain: f32::from_le_bytes(array(bytes, OFFSET_GAIN)),
            bypass,
        })
    }
}

#[inline]
fn put_u32(bytes: &mut [u8; HEADER_SIZE], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn get_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(array(bytes, offset))
}

#[inline]
fn array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}
