//! C Bindings for AudioShm
//!
//! Flat C API for hosts that marshal calls from another runtime. There is no
//! load-time registration: a host attaches to a segment with
//! [`audio_shm_processor_open`] and keeps the returned handle.

use crate::header::{AudioHeader, ProcessParams, StreamShape, HEADER_SIZE};
use crate::transport::{Processor, Served, TransportConfig};
use crate::{pcm, transform, wav};
use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;
use std::slice;
use tracing::warn;

/// Returned by [`audio_shm_processor_serve`] when the status word itself
/// could not be read or published
pub const AUDIO_SHM_SERVE_FAULT: i32 = i32::MIN;

// Opaque handle
pub struct AudioShmProcessorHandle(Processor);

unsafe fn str_arg<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

/// Attach to an existing segment as the processor
///
/// Returns null if the name is invalid or the segment header does not validate.
///
/// # Safety
/// name must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn audio_shm_processor_open(
    name: *const c_char,
) -> *mut AudioShmProcessorHandle {
    let Some(name) = str_arg(name) else {
        return ptr::null_mut();
    };

    match Processor::open(name, TransportConfig::default()) {
        Ok(processor) => Box::into_raw(Box::new(AudioShmProcessorHandle(processor))),
        Err(e) => {
            warn!(name, error = %e, "processor attach failed");
            ptr::null_mut()
        }
    }
}

/// Destroy a processor handle
///
/// # Safety
/// handle must come from `audio_shm_processor_open` and not be used afterwards
#[no_mangle]
pub unsafe extern "C" fn audio_shm_processor_destroy(handle: *mut AudioShmProcessorHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Serve the pending request, if any
///
/// Returns 0 when nothing was pending, 2 (DONE) or -1 (ERROR) for the status
/// that was published, or `AUDIO_SHM_SERVE_FAULT`.
///
/// # Safety
/// handle must be a live handle from `audio_shm_processor_open`
#[no_mangle]
pub unsafe extern "C" fn audio_shm_processor_serve(handle: *mut AudioShmProcessorHandle) -> i32 {
    if handle.is_null() {
        return AUDIO_SHM_SERVE_FAULT;
    }
    let processor = &(*handle).0;
    match processor.serve_pending() {
        Ok(None) => 0,
        Ok(Some(Served::Done { .. })) => crate::status::code::DONE,
        Ok(Some(Served::Failed(_))) => crate::status::code::ERROR,
        Err(_) => AUDIO_SHM_SERVE_FAULT,
    }
}

/// Run the transform on float32 PCM bytes without a shared segment
///
/// `output` must have room for `len` bytes. Returns false on null pointers or
/// a length that is not a multiple of 4.
///
/// # Safety
/// input/output must be valid for `len` bytes; out_elapsed_ns may be null
#[no_mangle]
pub unsafe extern "C" fn audio_shm_process(
    input: *const u8,
    len: usize,
    gain: f32,
    bypass: bool,
    output: *mut u8,
    out_elapsed_ns: *mut i64,
) -> bool {
    if (input.is_null() || output.is_null()) && len > 0 {
        return false;
    }
    let input = if len == 0 { &[][..] } else { slice::from_raw_parts(input, len) };

    match transform::process_pcm(input, gain, bypass) {
        Ok((bytes, elapsed_ns)) => {
            if len > 0 {
                ptr::copy_nonoverlapping(bytes.as_ptr(), output, bytes.len());
            }
            if !out_elapsed_ns.is_null() {
                *out_elapsed_ns = elapsed_ns;
            }
            true
        }
        Err(_) => false,
    }
}

/// Serialize an IDLE header into a 128-byte buffer
///
/// # Safety
/// out must be valid for `HEADER_SIZE` bytes
#[no_mangle]
pub unsafe extern "C" fn audio_shm_build_header(
    sample_rate: u32,
    channels: u32,
    frames: u32,
    gain: f32,
    bypass: bool,
    out: *mut u8,
) -> bool {
    if out.is_null() {
        return false;
    }
    let shape = StreamShape::new(sample_rate, channels, frames);
    match AudioHeader::new(shape, ProcessParams { gain, bypass }) {
        Ok(header) => {
            ptr::copy_nonoverlapping(header.encode().as_ptr(), out, HEADER_SIZE);
            true
        }
        Err(_) => false,
    }
}

/// Write float32 PCM bytes as a 16-bit WAV file
///
/// # Safety
/// path must be a valid null-terminated string; pcm valid for `byte_count` bytes
#[no_mangle]
pub unsafe extern "C" fn audio_shm_write_wav(
    path: *const c_char,
    pcm_bytes: *const u8,
    byte_count: usize,
    sample_rate: u32,
    channels: u16,
    frames: u32,
) -> bool {
    let Some(path) = str_arg(path) else {
        return false;
    };
    if pcm_bytes.is_null() || byte_count == 0 {
        return false;
    }

    let samples = match pcm::bytes_to_samples(slice::from_raw_parts(pcm_bytes, byte_count)) {
        Ok(s) => s,
        Err(_) => return false,
    };
    match wav::write_wav(path, &samples, sample_rate, channels, frames) {
        Ok(()) => true,
        Err(e) => {
            warn!(path, error = %e, "WAV write failed");
            false
        }
    }
}

/// Fill `out` with an interleaved sine test signal as float32 PCM bytes
///
/// Returns the number of bytes written, or 0 if `out_len` is too small.
///
/// # Safety
/// out must be valid for `out_len` bytes
#[no_mangle]
pub unsafe extern "C" fn audio_shm_generate_test_signal(
    sample_rate: u32,
    frames: u32,
    channels: u32,
    freq_hz: f32,
    out: *mut u8,
    out_len: usize,
) -> usize {
    let bytes = pcm::generate_test_signal_bytes(sample_rate, frames, channels, freq_hz);
    if out.is_null() || bytes.len() > out_len {
        return 0;
    }
    ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len());
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Producer;
    use std::ffi::CString;

    #[test]
    fn test_process_bytes() {
        let input = pcm::samples_to_bytes(&[0.5, -0.5, 2.0]);
        let mut output = vec![0u8; input.len()];
        let mut elapsed = -1i64;

        let ok = unsafe {
            audio_shm_process(input.as_ptr(), input.len(), 1.0, true, output.as_mut_ptr(), &mut elapsed)
        };
        assert!(ok);
        assert_eq!(output, input);
        assert!(elapsed >= 0);

        let ok = unsafe {
            audio_shm_process(input.as_ptr(), 5, 1.0, false, output.as_mut_ptr(), ptr::null_mut())
        };
        assert!(!ok);
    }

    #[test]
    fn test_build_header() {
        let mut out = [0u8; HEADER_SIZE];
        assert!(unsafe { audio_shm_build_header(44_100, 2, 10, 0.5, true, out.as_mut_ptr()) });
        let header = AudioHeader::decode(&out).unwrap();
        assert_eq!(header.output_offset, 128 + 80);
        assert!(header.bypass);

        assert!(!unsafe { audio_shm_build_header(44_100, 0, 10, 0.5, true, out.as_mut_ptr()) });
    }

    #[test]
    fn test_generate_signal_buffer_size() {
        let mut out = vec![0u8; 32];
        assert_eq!(
            unsafe { audio_shm_generate_test_signal(8_000, 8, 1, 1_000.0, out.as_mut_ptr(), out.len()) },
            32
        );
        assert_eq!(
            unsafe { audio_shm_generate_test_signal(8_000, 8, 2, 1_000.0, out.as_mut_ptr(), out.len()) },
            0
        );
    }

    #[test]
    fn test_write_wav_rejects_null() {
        assert!(!unsafe { audio_shm_write_wav(ptr::null(), ptr::null(), 0, 8_000, 1, 0) });
    }

    #[test]
    fn test_processor_handle_lifecycle() {
        let name = format!("ffi_{}", std::process::id());
        let mut producer = Producer::create(
            &name,
            StreamShape::new(8_000, 1, 2),
            TransportConfig::default(),
        )
        .unwrap();

        let c_name = CString::new(name).unwrap();
        let handle = unsafe { audio_shm_processor_open(c_name.as_ptr()) };
        assert!(!handle.is_null());

        assert_eq!(unsafe { audio_shm_processor_serve(handle) }, 0);
        producer.publish(&[0.25, 0.75], ProcessParams::default()).unwrap();
        assert_eq!(unsafe { audio_shm_processor_serve(handle) }, 2);
        assert_eq!(producer.wait().unwrap().samples.len(), 2);

        unsafe { audio_shm_processor_destroy(handle) };
        assert!(unsafe { audio_shm_processor_open(ptr::null()) }.is_null());
    }
}
