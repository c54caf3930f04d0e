//! AudioShm - shared memory request/response transport for audio blocks
//!
//! A producer process hands a block of interleaved float32 PCM to a processor
//! process through a POSIX shared memory segment and gets the transformed
//! block back, together with the time the transform took.
//!
//! # Architecture
//!
//! - **Producer (owner)**: allocates the segment, writes header + input,
//!   publishes PROCESSING, waits for DONE/ERROR, resets to IDLE
//! - **Processor (peer)**: maps the segment, validates the header, runs the
//!   gain + tanh soft-clip transform, publishes DONE or ERROR
//!
//! The 32-bit `status` word in the 128-byte header is the only synchronization
//! point. Every other field is written before a release store of the status and
//! read after an acquire load of it.
//!
//! ```text
//! [ header 128B ][ input frames*channels*4 ][ output frames*channels*4 ]
//! ```

pub mod error;
pub mod shm;
pub mod header;
pub mod status;
pub mod segment;
pub mod transform;
pub mod transport;
pub mod pcm;
pub mod wav;
pub mod bindings;

pub use error::{AudioShmError, HeaderFault, Result};
pub use header::{segment_size, AudioHeader, ProcessParams, StreamShape, HEADER_SIZE};
pub use segment::AudioSegment;
pub use status::Status;
pub use transform::{process, Processed};
pub use transport::{Completion, Processor, Producer, Served, TransportConfig};
