//! Input buffer ownership
//!
//! A decode context reads from exactly one contiguous buffer. How that buffer
//! was obtained decides how it is released: mapped files are unmapped, heap
//! copies are freed and caller buffers are left alone.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use gp_core::config::IoConfig;
use gp_core::Status;
use thiserror::Error;
use tracing::{debug, trace};

/// Failure while turning a file into an input buffer
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file is empty")]
    Empty,

    #[error("failed to map file: {0}")]
    Map(#[source] io::Error),

    #[error("failed to read file: {0}")]
    Read(#[source] io::Error),

    #[error("cannot allocate {0} bytes for file contents")]
    OutOfMemory(u64),
}

impl AcquireError {
    pub fn status(&self) -> Status {
        match self {
            AcquireError::Open { .. } => Status::FileOpenFailure,
            AcquireError::Empty => Status::InsufficientData,
            AcquireError::Map(_) | AcquireError::Read(_) => Status::FileMapFailure,
            AcquireError::OutOfMemory(_) => Status::InsufficientMemory,
        }
    }
}

impl From<AcquireError> for Status {
    fn from(err: AcquireError) -> Status {
        err.status()
    }
}

/// How the current buffer was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOrigin {
    None,
    Mapped,
    Owned,
    Borrowed,
}

#[cfg(all(unix, test))]
pub(crate) static UNMAP_COUNT: std::sync::atomic::AtomicUsize =
    std::sync::atomic::AtomicUsize::new(0);

/// Held by tests that map files so `UNMAP_COUNT` deltas are exact
#[cfg(all(unix, test))]
pub(crate) static MAP_TEST_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// Read-only private mapping of a whole file
#[cfg(unix)]
pub struct MappedFile {
    ptr: std::ptr::NonNull<u8>,
    len: usize,
}

#[cfg(unix)]
impl MappedFile {
    /// Map the first `len` bytes of `file`
    pub fn map(file: &File, len: usize) -> Result<Self, AcquireError> {
        use libc::{mmap, MAP_FAILED, MAP_PRIVATE, PROT_READ};
        use std::os::unix::io::AsRawFd;

        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                len,
                PROT_READ,
                MAP_PRIVATE,
                file.as_raw_fd(),
                0,
            )
        };

        if ptr == MAP_FAILED {
            return Err(AcquireError::Map(io::Error::last_os_error()));
        }

        let ptr = std::ptr::NonNull::new(ptr as *mut u8)
            .ok_or_else(|| AcquireError::Map(io::Error::other("mmap returned null")))?;
        Ok(Self { ptr, len })
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the mapping is `len` bytes, readable, and lives until drop
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

#[cfg(unix)]
impl Drop for MappedFile {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
        }
        #[cfg(test)]
        UNMAP_COUNT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

// The mapping is private and never written through
#[cfg(unix)]
unsafe impl Send for MappedFile {}
#[cfg(unix)]
unsafe impl Sync for MappedFile {}

/// The bytes a decode context parses
#[derive(Default)]
pub enum InputBuffer<'buf> {
    #[default]
    Empty,
    #[cfg(unix)]
    Mapped(MappedFile),
    Owned(Box<[u8]>),
    Borrowed(&'buf [u8]),
}

impl<'buf> InputBuffer<'buf> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            InputBuffer::Empty => &[],
            #[cfg(unix)]
            InputBuffer::Mapped(mapped) => mapped.as_slice(),
            InputBuffer::Owned(bytes) => &bytes[..],
            InputBuffer::Borrowed(bytes) => &bytes[..],
        }
    }

    pub fn origin(&self) -> BufferOrigin {
        match self {
            InputBuffer::Empty => BufferOrigin::None,
            #[cfg(unix)]
            InputBuffer::Mapped(_) => BufferOrigin::Mapped,
            InputBuffer::Owned(_) => BufferOrigin::Owned,
            InputBuffer::Borrowed(_) => BufferOrigin::Borrowed,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Give the buffer back according to its origin
    pub fn release(&mut self) {
        if !matches!(self, InputBuffer::Empty) {
            trace!("releasing {:?} buffer of {} bytes", self.origin(), self.len());
        }
        *self = InputBuffer::Empty;
    }
}

impl fmt::Debug for InputBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputBuffer")
            .field("origin", &self.origin())
            .field("len", &self.len())
            .finish()
    }
}

/// Load `path` as one contiguous buffer
pub fn acquire_file(path: &Path, io: &IoConfig) -> Result<InputBuffer<'static>, AcquireError> {
    let mut file = File::open(path).map_err(|source| AcquireError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let size = file.metadata().map_err(AcquireError::Read)?.len();
    if size == 0 {
        return Err(AcquireError::Empty);
    }
    let len = usize::try_from(size).map_err(|_| AcquireError::OutOfMemory(size))?;

    #[cfg(unix)]
    if io.map_files {
        let mapped = MappedFile::map(&file, len)?;
        debug!("mapped {} ({} bytes)", path.display(), len);
        return Ok(InputBuffer::Mapped(mapped));
    }
    #[cfg(not(unix))]
    let _ = io;

    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|_| AcquireError::OutOfMemory(size))?;
    file.read_to_end(&mut bytes).map_err(AcquireError::Read)?;
    if bytes.is_empty() {
        return Err(AcquireError::Empty);
    }
    debug!("read {} ({} bytes)", path.display(), bytes.len());
    Ok(InputBuffer::Owned(bytes.into_boxed_slice()))
}
