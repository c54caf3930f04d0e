//! Typed access to a mapped audio segment
//!
//! `[header (128 bytes)][input PCM][output PCM]`
//!
//! Plain (non-atomic) reads and writes of everything except the status word
//! are only sound under the ownership rules of the status state machine: the
//! producer touches header fields and the input region while IDLE, the
//! processor touches the output region and timing while PROCESSING. The status
//! word is only ever accessed through [`StatusCell`].

use crate::error::{AudioShmError, Result};
use crate::header::{
    segment_size, AudioHeader, ProcessParams, StreamShape, BYTES_PER_SAMPLE, HEADER_SIZE,
    OFFSET_PROCESSING_TIME, OFFSET_STATUS,
};
use crate::shm::ShmRegion;
use crate::status::{Status, StatusCell};

/// A shared segment holding one request cycle
pub struct AudioSegment {
    shm: ShmRegion,
    status: StatusCell,
}

impl AudioSegment {
    /// Allocate a segment sized for `shape` and write an IDLE header
    pub fn create(name: &str, shape: StreamShape, params: ProcessParams) -> Result<Self> {
        let header = AudioHeader::new(shape, params)?;
        let size = segment_size(shape.frames, shape.channels)?;

        let shm = ShmRegion::create(name, size)?;
        // SAFETY: mmap returns page-aligned memory; offset 32 keeps 4-byte alignment
        let status = unsafe { StatusCell::from_raw(shm.as_ptr().add(OFFSET_STATUS)) };
        let segment = Self { shm, status };

        // Fresh mapping is zeroed, so the status word already reads IDLE
        segment.write_header_fields(&header);
        Ok(segment)
    }

    /// Map an existing segment and validate its header
    ///
    /// Fails with `CorruptHeader` or `ShapeMismatch` without touching the
    /// status word.
    pub fn open(name: &str) -> Result<Self> {
        let shm = ShmRegion::open(name)?;
        if shm.size() < HEADER_SIZE {
            return Err(AudioShmError::ShapeMismatch {
                expected: HEADER_SIZE,
                got: shm.size(),
            });
        }

        let status = unsafe { StatusCell::from_raw(shm.as_ptr().add(OFFSET_STATUS)) };
        let segment = Self { shm, status };

        let header = segment.read_header()?;
        segment.check_shape(&header)?;
        Ok(segment)
    }

    pub fn name(&self) -> &str {
        self.shm.name()
    }

    /// Mapped size in bytes
    pub(crate) fn len(&self) -> usize {
        self.shm.size()
    }

    /// Current status (acquire)
    pub fn status(&self) -> Result<Status> {
        self.status.load()
    }

    /// Move the status word `from -> to` (release)
    pub fn transition(&self, from: Status, to: Status) -> Result<()> {
        self.status.transition(from, to)
    }

    /// Snapshot and decode the header
    ///
    /// The status field comes from an acquire load of the status word; the
    /// rest is copied byte-wise.
    pub fn read_header(&self) -> Result<AudioHeader> {
        let mut bytes = [0u8; HEADER_SIZE];
        self.copy_out(0, &mut bytes[..OFFSET_STATUS]);
        bytes[OFFSET_STATUS..OFFSET_STATUS + 4].copy_from_slice(&self.status.load_raw().to_le_bytes());
        self.copy_out(OFFSET_STATUS + 4, &mut bytes[OFFSET_STATUS + 4..]);
        AudioHeader::decode(&bytes)
    }

    /// Write every header field except the status word
    pub(crate) fn write_header_fields(&self, header: &AudioHeader) {
        let bytes = header.encode();
        self.copy_in(0, &bytes[..OFFSET_STATUS]);
        self.copy_in(OFFSET_STATUS + 4, &bytes[OFFSET_STATUS + 4..]);
    }

    /// Verify that the declared shape matches the mapped size
    pub fn check_shape(&self, header: &AudioHeader) -> Result<()> {
        let expected = segment_size(header.frames, header.channels)?;
        if expected != self.len() {
            return Err(AudioShmError::ShapeMismatch {
                expected,
                got: self.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn read_input(&self, header: &AudioHeader) -> Vec<f32> {
        self.read_samples(header.input_offset as usize, header.shape().sample_count())
    }

    pub(crate) fn write_input(&self, header: &AudioHeader, samples: &[f32]) {
        self.write_samples(header.input_offset as usize, samples);
    }

    pub(crate) fn read_output(&self, header: &AudioHeader) -> Vec<f32> {
        self.read_samples(header.output_offset as usize, header.shape().sample_count())
    }

    pub(crate) fn write_output(&self, header: &AudioHeader, samples: &[f32]) {
        self.write_samples(header.output_offset as usize, samples);
    }

    pub(crate) fn read_processing_time(&self) -> i64 {
        let mut bytes = [0u8; 8];
        self.copy_out(OFFSET_PROCESSING_TIME, &mut bytes);
        i64::from_le_bytes(bytes)
    }

    pub(crate) fn write_processing_time(&self, elapsed_ns: i64) {
        self.copy_in(OFFSET_PROCESSING_TIME, &elapsed_ns.to_le_bytes());
    }

    fn read_samples(&self, offset: usize, count: usize) -> Vec<f32> {
        let mut bytes = vec![0u8; count * BYTES_PER_SAMPLE];
        self.copy_out(offset, &mut bytes);
        bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn write_samples(&self, offset: usize, samples: &[f32]) {
        let mut bytes = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        self.copy_in(offset, &bytes);
    }

    #[inline]
    fn copy_out(&self, offset: usize, dst: &mut [u8]) {
        assert!(offset + dst.len() <= self.len(), "read past end of segment");
        unsafe {
            std::ptr::copy_nonoverlapping(self.shm.as_ptr().add(offset), dst.as_mut_ptr(), dst.len());
        }
    }

    #[inline]
    fn copy_in(&self, offset: usize, src: &[u8]) {
        assert!(offset + src.len() <= self.len(), "write past end of segment");
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.shm.as_ptr().add(offset), src.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{AUDIO_SHM_MAGIC, OFFSET_MAGIC};

    fn unique(name: &str) -> String {
        format!("seg_{}_{}", name, std::process::id())
    }

    #[test]
    fn test_create_writes_idle_header() {
        let name = unique("create");
        let shape = StreamShape::new(44_100, 2, 256);
        let seg = AudioSegment::create(&name, shape, ProcessParams::default()).unwrap();

        assert_eq!(seg.len(), 128 + 2 * 256 * 2 * 4);
        assert_eq!(seg.status().unwrap(), Status::Idle);

        let header = seg.read_header().unwrap();
        assert_eq!(header.shape(), shape);
        assert_eq!(header.status, Status::Idle);
        assert_eq!(header.gain, 1.0);
    }

    #[test]
    fn test_open_sees_payload() {
        let name = unique("payload");
        let shape = StreamShape::new(8_000, 1, 4);
        let seg = AudioSegment::create(&name, shape, ProcessParams::default()).unwrap();
        let header = seg.read_header().unwrap();
        seg.write_input(&header, &[0.1, 0.2, 0.3, 0.4]);

        let peer = AudioSegment::open(&name).unwrap();
        let peer_header = peer.read_header().unwrap();
        assert_eq!(peer_header, header);
        assert_eq!(peer.read_input(&peer_header), vec![0.1, 0.2, 0.3, 0.4]);

        peer.write_output(&peer_header, &[1.0, 2.0, 3.0, 4.0]);
        peer.write_processing_time(1234);
        assert_eq!(seg.read_output(&header), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(seg.read_processing_time(), 1234);
    }

    #[test]
    fn test_open_rejects_corrupt_magic() {
        let name = unique("magic");
        let seg = AudioSegment::create(&name, StreamShape::new(8_000, 1, 4), ProcessParams::default())
            .unwrap();
        seg.copy_in(OFFSET_MAGIC, &(!AUDIO_SHM_MAGIC).to_le_bytes());

        assert!(matches!(
            AudioSegment::open(&name),
            Err(AudioShmError::CorruptHeader(_))
        ));
        // Status word is left alone
        assert_eq!(seg.status().unwrap(), Status::Idle);
    }

    #[test]
    fn test_check_shape_mismatch() {
        let name = unique("shape");
        let seg = AudioSegment::create(&name, StreamShape::new(8_000, 2, 16), ProcessParams::default())
            .unwrap();
        let mut header = seg.read_header().unwrap();
        header.frames = 32;
        assert!(matches!(
            seg.check_shape(&header),
            Err(AudioShmError::ShapeMismatch { .. })
        ));
    }
}
