//! Frames declaring far more pixels than the canvas holds

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use gp_engine::{DecodeEngine, GifEngine, GifResult, RgbaBitmaps};

/// Records the largest single allocation made by the process
struct Tracking;

static LARGEST: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for Tracking {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        LARGEST.fetch_max(layout.size(), Ordering::SeqCst);
        System.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        LARGEST.fetch_max(layout.size(), Ordering::SeqCst);
        System.alloc_zeroed(layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        LARGEST.fetch_max(new_size, Ordering::SeqCst);
        System.realloc(ptr, layout, new_size)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static GLOBAL: Tracking = Tracking;

/// 1x1 canvas holding one 65535x65535 frame whose data ends after a red pixel
const HUGE_FRAME: &[u8] = &[
    b'G', b'I', b'F', b'8', b'9', b'a', 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, // header
    0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, // palette
    0x2C, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, // descriptor
    0x02, 0x02, 0x44, 0x01, 0x00, // image data
    0x3B,
];

#[test]
fn test_huge_frame_on_tiny_canvas() {
    let mut engine = GifEngine::new(RgbaBitmaps::new());
    let result = loop {
        let result = engine.initialise(HUGE_FRAME);
        if !result.is_working() {
            break result;
        }
    };
    assert_eq!(result, GifResult::Ok);
    assert_eq!(engine.frame_count(), 1);
    assert_eq!((engine.width(), engine.height()), (1, 1));

    LARGEST.store(0, Ordering::SeqCst);
    assert_eq!(engine.decode_frame(HUGE_FRAME, 0), GifResult::EndOfFrame);
    let largest = LARGEST.load(Ordering::SeqCst);

    let canvas = engine.frame_image().unwrap();
    assert_eq!(canvas.pixel(0, 0), Some([0xFF, 0x00, 0x00, 0xFF]));
    assert!(largest < 1 << 20, "largest allocation was {} bytes", largest);
}
