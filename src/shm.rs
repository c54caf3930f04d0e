//! Low-level POSIX shared memory operations

use crate::error::{AudioShmError, Result};
use rustix::fd::OwnedFd;
use rustix::fs::ftruncate;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use rustix::shm::{shm_open, shm_unlink, Mode, ShmOFlags};
use std::ffi::CString;
use std::io;
use std::ptr::NonNull;
use tracing::debug;

const SHM_PREFIX: &str = "/audio_shm_";
const MAX_NAME_LEN: usize = 255 - SHM_PREFIX.len();

/// Handle to a mapped shared memory region
pub struct ShmRegion {
    #[allow(dead_code)]
    fd: OwnedFd,
    addr: NonNull<u8>,
    size: usize,
    name: String,
    is_owner: bool,
}

// SAFETY: ShmRegion can be moved between threads; concurrent access to the
// mapped bytes is governed by the segment's status word
unsafe impl Send for ShmRegion {}
unsafe impl Sync for ShmRegion {}

fn object_name(name: &str) -> Result<CString> {
    if name.len() > MAX_NAME_LEN {
        return Err(AudioShmError::NameTooLong {
            max: MAX_NAME_LEN,
            got: name.len(),
        });
    }
    if name.is_empty() || name.contains('/') {
        return Err(AudioShmError::InvalidName(name.to_string()));
    }
    CString::new(format!("{}{}", SHM_PREFIX, name))
        .map_err(|_| AudioShmError::InvalidName(name.to_string()))
}

fn map_shared(fd: &OwnedFd, size: usize) -> Result<NonNull<u8>> {
    let addr = unsafe {
        mmap(
            std::ptr::null_mut(),
            size,
            ProtFlags::READ | ProtFlags::WRITE,
            MapFlags::SHARED,
            fd,
            0,
        )
        .map_err(|e| AudioShmError::Mmap(e.into()))?
    };

    NonNull::new(addr.cast::<u8>())
        .ok_or_else(|| AudioShmError::Mmap(io::Error::other("mmap returned null")))
}

impl ShmRegion {
    /// Create a new shared memory region
    ///
    /// # Arguments
    /// * `name` - Unique name for the region (will be prefixed with "/audio_shm_")
    /// * `size` - Size in bytes
    ///
    /// Creation is exclusive: if an object with this name already exists the
    /// call fails with `ShmCreate` and the existing object is left untouched.
    pub fn create(name: &str, size: usize) -> Result<Self> {
        let c_name = object_name(name)?;

        let fd = shm_open(
            c_name.as_c_str(),
            ShmOFlags::CREATE | ShmOFlags::EXCL | ShmOFlags::RDWR,
            Mode::RUSR | Mode::WUSR | Mode::RGRP | Mode::WGRP,
        )
        .map_err(|e| AudioShmError::ShmCreate {
            name: name.to_string(),
            source: e.into(),
        })?;

        // Only a freshly created object gets resized; drop the name if setup fails
        let addr = ftruncate(&fd, size as u64)
            .map_err(|e| AudioShmError::Truncate(e.into()))
            .and_then(|()| map_shared(&fd, size))
            .inspect_err(|_| {
                let _ = shm_unlink(c_name.as_c_str());
            })?;

        // Zero initialize
        unsafe {
            std::ptr::write_bytes(addr.as_ptr(), 0, size);
        }

        debug!(name, size, "created shared memory region");

        Ok(Self {
            fd,
            addr,
            size,
            name: name.to_string(),
            is_owner: true,
        })
    }

    /// Open an existing shared memory region
    pub fn open(name: &str) -> Result<Self> {
        let c_name = object_name(name)?;

        let fd = shm_open(c_name.as_c_str(), ShmOFlags::RDWR, Mode::empty()).map_err(|e| {
            AudioShmError::ShmOpen {
                name: name.to_string(),
                source: e.into(),
            }
        })?;

        // Get size from file
        let stat = rustix::fs::fstat(&fd).map_err(|e| AudioShmError::ShmOpen {
            name: name.to_string(),
            source: e.into(),
        })?;
        let size = stat.st_size as usize;
        if size == 0 {
            return Err(AudioShmError::ShmOpen {
                name: name.to_string(),
                source: io::Error::new(io::ErrorKind::InvalidData, "shared memory object is empty"),
            });
        }

        let addr = map_shared(&fd, size)?;

        debug!(name, size, "opened shared memory region");

        Ok(Self {
            fd,
            addr,
            size,
            name: name.to_string(),
            is_owner: false,
        })
    }

    /// Get raw pointer to shared memory
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut u8 {
        self.addr.as_ptr()
    }

    /// Get size of shared memory region
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the name of shared memory
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.addr.as_ptr().cast(), self.size);
        }

        // The name goes away; peers that already mapped the region keep it alive
        if self.is_owner {
            if let Ok(c_name) = object_name(&self.name) {
                let _ = shm_unlink(c_name.as_c_str());
            }
        }
    }
}
