//! C ABI for gifplug
//!
//! Exposes decode contexts to non-Rust hosts through five entry points.
//! Contexts are addressed by integer handles from a process-wide registry,
//! and bitmaps are allocated by the host through C function pointers.
//!
//! Misuse of the boundary (null or unknown handles, null paths, null output
//! slots) aborts the process. Everything else is reported as a status code.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::path::PathBuf;
use std::ptr::NonNull;
use std::sync::Arc;

use gp_context::{DecodeContext, Handle, HandleRegistry};
use gp_core::Status;
use gp_engine::{BitmapCallbacks, GifEngine, BYTES_PER_PIXEL};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, error, trace};

/// Allocate a bitmap of `width` x `height` RGBA8 pixels, or return null
pub type BitmapCreateFn =
    unsafe extern "C" fn(width: c_int, height: c_int, user_data: *mut c_void) -> *mut c_void;

/// Release a bitmap returned by the create callback
pub type BitmapDestroyFn = unsafe extern "C" fn(bitmap: *mut c_void, user_data: *mut c_void);

/// Pixel storage of a bitmap, `width * height * 4` bytes
pub type BitmapGetBufferFn =
    unsafe extern "C" fn(bitmap: *mut c_void, user_data: *mut c_void) -> *mut u8;

/// Bitmap callbacks supplied by the host
pub struct HostBitmaps {
    create: Option<BitmapCreateFn>,
    destroy: Option<BitmapDestroyFn>,
    get_buffer: Option<BitmapGetBufferFn>,
    user_data: *mut c_void,
}

// The host promises its callbacks may run on whichever thread drives the
// context. `user_data` is only ever handed back to them.
unsafe impl Send for HostBitmaps {}

impl HostBitmaps {
    pub fn new(
        create: Option<BitmapCreateFn>,
        destroy: Option<BitmapDestroyFn>,
        get_buffer: Option<BitmapGetBufferFn>,
        user_data: *mut c_void,
    ) -> Self {
        Self {
            create,
            destroy,
            get_buffer,
            user_data,
        }
    }
}

/// A host-owned bitmap
#[derive(Debug)]
pub struct HostBitmap {
    raw: NonNull<c_void>,
    len: usize,
}

unsafe impl Send for HostBitmap {}

impl HostBitmap {
    /// The pointer the host's create callback returned
    pub fn as_ptr(&self) -> *mut c_void {
        self.raw.as_ptr()
    }
}

impl BitmapCallbacks for HostBitmaps {
    type Bitmap = HostBitmap;

    fn create(&mut self, width: u32, height: u32) -> Option<HostBitmap> {
        let create = self.create?;
        let len = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(BYTES_PER_PIXEL)?;
        let w = c_int::try_from(width).ok()?;
        let h = c_int::try_from(height).ok()?;

        let raw = unsafe { create(w, h, self.user_data) };
        NonNull::new(raw).map(|raw| HostBitmap { raw, len })
    }

    fn destroy(&mut self, bitmap: HostBitmap) {
        if let Some(destroy) = self.destroy {
            unsafe { destroy(bitmap.as_ptr(), self.user_data) };
        }
    }

    fn buffer<'a>(&'a mut self, bitmap: &'a mut HostBitmap) -> Option<&'a mut [u8]> {
        let get_buffer = self.get_buffer?;
        let pixels = unsafe { get_buffer(bitmap.as_ptr(), self.user_data) };
        if pixels.is_null() {
            return None;
        }
        // The host guarantees `len` writable bytes for as long as the bitmap lives
        Some(unsafe { std::slice::from_raw_parts_mut(pixels, bitmap.len) })
    }
}

/// Context as stored behind a boundary handle. Borrowed buffers are the
/// host's to keep alive, hence `'static`.
pub type PluginContext = DecodeContext<'static, GifEngine<HostBitmaps>>;

static CONTEXTS: Lazy<Mutex<HandleRegistry<PluginContext>>> =
    Lazy::new(|| Mutex::new(HandleRegistry::new()));

/// Abort on a broken calling contract. Nothing may unwind into the host.
fn violation(what: &str) -> ! {
    error!("gifplug contract violation: {}", what);
    std::process::abort()
}

fn require(condition: bool, what: &str) {
    if !condition {
        violation(what);
    }
}

fn lookup(handle: isize) -> Arc<Mutex<PluginContext>> {
    require(handle != 0, "null handle");
    let found = Handle::try_from(handle)
        .ok()
        .and_then(|key| CONTEXTS.lock().get(key));
    found.unwrap_or_else(|| violation("unknown handle"))
}

fn to_c_int(value: usize) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

/// Report an initialise outcome. The frame count slot is only written on ok.
unsafe fn report_initialise(
    result: Result<usize, Status>,
    frame_count: *mut c_int,
    status: *mut c_int,
) {
    match result {
        Ok(count) => {
            *frame_count = to_c_int(count);
            *status = Status::Ok.code();
        }
        Err(err) => *status = err.code(),
    }
}

#[cfg(unix)]
fn path_from_c(path: &CStr) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(path.to_bytes()))
}

#[cfg(not(unix))]
fn path_from_c(path: &CStr) -> PathBuf {
    PathBuf::from(path.to_string_lossy().into_owned())
}

/// Create a decode context bound to the host's bitmap callbacks.
///
/// Returns a non-zero handle. Missing callbacks are accepted; decoding then
/// fails with insufficient memory once a bitmap is needed.
#[no_mangle]
pub extern "C" fn gifplug_create(
    create: Option<BitmapCreateFn>,
    destroy: Option<BitmapDestroyFn>,
    get_buffer: Option<BitmapGetBufferFn>,
    user_data: *mut c_void,
) -> isize {
    let callbacks = HostBitmaps::new(create, destroy, get_buffer, user_data);
    let handle = CONTEXTS.lock().insert(DecodeContext::new(callbacks));
    debug!("gifplug_create() -> {}", handle);
    isize::try_from(handle).unwrap_or_else(|_| violation("handle space exhausted"))
}

/// Load and parse the GIF file at `path`.
///
/// # Safety
///
/// `path` must be a NUL-terminated string; `frame_count` and `status` must
/// be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn gifplug_initialize_file(
    handle: isize,
    path: *const c_char,
    frame_count: *mut c_int,
    status: *mut c_int,
) {
    require(!path.is_null(), "null path");
    require(
        !frame_count.is_null() && !status.is_null(),
        "null output slot",
    );
    let context = lookup(handle);

    let path = path_from_c(CStr::from_ptr(path));
    trace!("gifplug_initialize_file({}, {})", handle, path.display());
    let result = context.lock().initialise_file(&path);
    report_initialise(result, frame_count, status);
}

/// Parse `size` bytes at `data`.
///
/// # Safety
///
/// `data` must stay valid and unchanged until the context is destroyed or
/// initialised again. `frame_count` and `status` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn gifplug_initialize_buffer(
    handle: isize,
    data: *const u8,
    size: c_int,
    frame_count: *mut c_int,
    status: *mut c_int,
) {
    require(
        !frame_count.is_null() && !status.is_null(),
        "null output slot",
    );
    let context = lookup(handle);
    trace!("gifplug_initialize_buffer({}, {:p}, {})", handle, data, size);

    if data.is_null() || size <= 0 {
        *status = Status::InsufficientData.code();
        return;
    }
    let data: &'static [u8] = std::slice::from_raw_parts(data, size as usize);
    let result = context.lock().initialise_buffer(data);
    report_initialise(result, frame_count, status);
}

/// Decode frame `index`.
///
/// Returns the host bitmap holding the composited canvas, or 0 when the
/// status is not ok. Width, height and delay are only written on ok.
///
/// # Safety
///
/// All output pointers must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn gifplug_decode(
    handle: isize,
    index: c_int,
    width: *mut c_int,
    height: *mut c_int,
    delay: *mut c_int,
    status: *mut c_int,
) -> isize {
    require(
        !width.is_null() && !height.is_null() && !delay.is_null() && !status.is_null(),
        "null output slot",
    );
    let context = lookup(handle);
    trace!("gifplug_decode({}, {})", handle, index);

    let Ok(index) = usize::try_from(index) else {
        *status = Status::InsufficientData.code();
        return 0;
    };

    let mut context = context.lock();
    match context.decode_frame(index) {
        Ok(frame) => {
            *width = to_c_int(frame.width as usize);
            *height = to_c_int(frame.height as usize);
            *delay = c_int::from(frame.delay);
            *status = Status::Ok.code();
            frame.bitmap.as_ptr() as isize
        }
        Err(err) => {
            *status = err.code();
            0
        }
    }
}

/// Destroy a context, releasing its canvas and any buffer it acquired
#[no_mangle]
pub extern "C" fn gifplug_destroy(handle: isize) {
    require(handle != 0, "null handle");
    let removed = Handle::try_from(handle)
        .ok()
        .and_then(|key| CONTEXTS.lock().remove(key));
    require(removed.is_some(), "unknown handle");
    debug!("gifplug_destroy({})", handle);
    // The context drops here unless another thread is mid-call on it
    drop(removed);
}
