//! Header status state machine
//!
//! The `status` word is the only field written by both sides. It is accessed
//! atomically; everything else in the segment is published by a status change:
//!
//! ```text
//!   IDLE ──producer──▶ PROCESSING ──processor──▶ DONE ──producer──▶ IDLE
//!                           │
//!                           └─────processor────▶ ERROR ─producer──▶ IDLE
//! ```

use crate::error::{AudioShmError, HeaderFault, Result};
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::debug;

/// Raw status codes as stored in the header
pub mod code {
    pub const IDLE: i32 = 0;
    pub const PROCESSING: i32 = 1;
    pub const DONE: i32 = 2;
    pub const ERROR: i32 = -1;
}

/// Segment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Segment ready for a new request
    Idle = code::IDLE,
    /// Input published, awaiting the processor
    Processing = code::PROCESSING,
    /// Output valid
    Done = code::DONE,
    /// Processing failed; output region must not be read
    Error = code::ERROR,
}

impl Status {
    /// Raw header value
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// DONE or ERROR
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Error)
    }

    /// Whether `self -> next` is a legal protocol step
    pub const fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Idle, Status::Processing)
                | (Status::Processing, Status::Done)
                | (Status::Processing, Status::Error)
                | (Status::Done, Status::Idle)
                | (Status::Error, Status::Idle)
        )
    }

    /// Check a transition, returning `IllegalTransition` if it is not allowed
    pub fn check_transition(self, next: Status) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AudioShmError::IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl TryFrom<i32> for Status {
    type Error = i32;

    fn try_from(value: i32) -> std::result::Result<Self, i32> {
        match value {
            code::IDLE => Ok(Status::Idle),
            code::PROCESSING => Ok(Status::Processing),
            code::DONE => Ok(Status::Done),
            code::ERROR => Ok(Status::Error),
            other => Err(other),
        }
    }
}

/// Atomic view of the status word inside a mapped segment
///
/// The value is kept little-endian in memory so the byte layout matches the
/// header regardless of host endianness.
pub struct StatusCell {
    word: *const AtomicI32,
}

// SAFETY: all access goes through the atomic
unsafe impl Send for StatusCell {}
unsafe impl Sync for StatusCell {}

impl StatusCell {
    /// Create a cell over an existing status word
    ///
    /// # Safety
    /// - `word` must be 4-byte aligned and stay mapped for the lifetime of the cell
    /// - the word must only be accessed atomically while the cell exists
    pub unsafe fn from_raw(word: *mut u8) -> Self {
        Self {
            word: word as *const AtomicI32,
        }
    }

    #[inline(always)]
    fn atomic(&self) -> &AtomicI32 {
        unsafe { &*self.word }
    }

    /// Raw value with acquire ordering
    #[inline]
    pub fn load_raw(&self) -> i32 {
        i32::from_le(self.atomic().load(Ordering::Acquire))
    }

    /// Current status with acquire ordering
    ///
    /// Observing a new value makes every write the other side made before
    /// publishing it visible to this thread.
    pub fn load(&self) -> Result<Status> {
        let raw = self.load_raw();
        Status::try_from(raw)
            .map_err(|v| AudioShmError::CorruptHeader(HeaderFault::Status(v)))
    }

    /// Publish `to`, provided the word currently holds `from`
    ///
    /// Legality is checked before touching memory. The compare-exchange fails
    /// with `IllegalTransition` carrying the observed status if the other side
    /// got there first.
    pub fn transition(&self, from: Status, to: Status) -> Result<()> {
        from.check_transition(to)?;

        match self.atomic().compare_exchange(
            from.code().to_le(),
            to.code().to_le(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!(?from, ?to, "status transition");
                Ok(())
            }
            Err(observed) => {
                let observed = i32::from_le(observed);
                match Status::try_from(observed) {
                    Ok(actual) => Err(AudioShmError::IllegalTransition { from: actual, to }),
                    Err(v) => Err(AudioShmError::CorruptHeader(HeaderFault::Status(v))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Status; 4] = [Status::Idle, Status::Processing, Status::Done, Status::Error];

    #[test]
    fn test_legal_transitions() {
        let legal = [
            (Status::Idle, Status::Processing),
            (Status::Processing, Status::Done),
            (Status::Processing, Status::Error),
            (Status::Done, Status::Idle),
            (Status::Error, Status::Idle),
        ];

        for from in ALL {
            for to in ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(from.can_transition_to(to), expected, "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn test_rejects_done_to_processing() {
        let err = Status::Done.check_transition(Status::Processing).unwrap_err();
        assert!(matches!(
            err,
            AudioShmError::IllegalTransition {
                from: Status::Done,
                to: Status::Processing
            }
        ));
        assert!(!Status::Idle.can_transition_to(Status::Done));
        assert!(!Status::Error.can_transition_to(Status::Done));
    }

    #[test]
    fn test_codes_round_trip() {
        for s in ALL {
            assert_eq!(Status::try_from(s.code()), Ok(s));
        }
        assert_eq!(Status::try_from(7), Err(7));
        assert_eq!(Status::Error.code(), -1);
    }

    #[test]
    fn test_cell_transitions() {
        let word = AtomicI32::new(0);
        let cell = unsafe { StatusCell::from_raw(word.as_ptr() as *mut u8) };

        assert_eq!(cell.load().unwrap(), Status::Idle);
        cell.transition(Status::Idle, Status::Processing).unwrap();
        assert_eq!(cell.load().unwrap(), Status::Processing);

        // Stale expectation: the word is PROCESSING, not IDLE
        let err = cell.transition(Status::Idle, Status::Processing).unwrap_err();
        assert!(matches!(
            err,
            AudioShmError::IllegalTransition {
                from: Status::Processing,
                ..
            }
        ));

        cell.transition(Status::Processing, Status::Done).unwrap();
        assert!(cell.transition(Status::Done, Status::Processing).is_err());
        assert_eq!(cell.load().unwrap(), Status::Done);

        cell.transition(Status::Done, Status::Idle).unwrap();
        assert_eq!(word.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cell_rejects_unknown_value() {
        let word = AtomicI32::new(42i32.to_le());
        let cell = unsafe { StatusCell::from_raw(word.as_ptr() as *mut u8) };
        assert!(matches!(cell.load(), Err(AudioShmError::CorruptHeader(_))));
    }
}
