//! Error types for AudioShm

use crate::status::Status;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for AudioShm operations
pub type Result<T> = std::result::Result<T, AudioShmError>;

/// Errors that can occur in AudioShm operations
#[derive(Debug, Error)]
pub enum AudioShmError {
    /// Failed to create shared memory
    #[error("Failed to create shared memory '{name}': {source}")]
    ShmCreate {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Failed to open shared memory
    #[error("Failed to open shared memory '{name}': {source}")]
    ShmOpen {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Failed to map memory
    #[error("Failed to map memory: {0}")]
    Mmap(#[source] io::Error),

    /// Failed to truncate shared memory
    #[error("Failed to set shared memory size: {0}")]
    Truncate(#[source] io::Error),

    /// Segment name too long
    #[error("Segment name too long: max {max} chars, got {got}")]
    NameTooLong { max: usize, got: usize },

    /// Segment name contains an interior NUL or a '/'
    #[error("Invalid segment name: {0:?}")]
    InvalidName(String),

    /// Header failed structural validation
    #[error("Corrupt header: {0}")]
    CorruptHeader(#[from] HeaderFault),

    /// Declared frames/channels disagree with the actual buffer or segment size
    #[error("Shape mismatch: expected {expected} bytes, got {got} bytes")]
    ShapeMismatch { expected: usize, got: usize },

    /// Frames/channels that cannot describe a segment at all
    #[error("Invalid shape: {frames} frames x {channels} channels")]
    InvalidShape { frames: u32, channels: u32 },

    /// The processor could not produce output for this cycle
    #[error("Processing failed: {0}")]
    ProcessingFailure(String),

    /// Producer gave up waiting for a terminal status
    #[error("Timed out after {waited:?} waiting for the processor")]
    Timeout { waited: Duration },

    /// Attempted status change outside the protocol
    #[error("Illegal status transition {from:?} -> {to:?}")]
    IllegalTransition { from: Status, to: Status },

    /// PCM byte buffer is not a whole number of float32 samples
    #[error("PCM buffer of {len} bytes is not a multiple of 4")]
    InvalidPcm { len: usize },

    /// Caller-supplied argument outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failed to write a WAV file
    #[error("Failed to write WAV file '{path}': {source}")]
    Wav {
        path: String,
        #[source]
        source: hound::Error,
    },
}

/// Reasons a header block is rejected by the decoder
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderFault {
    #[error("expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },

    #[error("invalid magic: expected 0x{expected:08X}, got 0x{got:08X}")]
    Magic { expected: u32, got: u32 },

    #[error("unsupported version: expected {expected}, got {got}")]
    Version { expected: u32, got: u32 },

    #[error("unsupported sample format {0}")]
    Format(u32),

    #[error("channel count must be at least 1")]
    NoChannels,

    #[error("input offset {got} != {expected}")]
    InputOffset { expected: u32, got: u32 },

    #[error("output offset {got} != {expected}")]
    OutputOffset { expected: u64, got: u32 },

    #[error("unknown status value {0}")]
    Status(i32),

    #[error("bypass flag must be 0 or 1, got {0}")]
    Bypass(u32),
}
