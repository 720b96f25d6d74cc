//! GIF decode engine
//!
//! Parses a resident GIF byte stream one block at a time and composites
//! frames into RGBA8 bitmaps supplied by the host through
//! [`BitmapCallbacks`].

pub mod bitmap;
mod compose;
pub mod engine;
pub mod format;
pub mod result;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use bitmap::{BitmapCallbacks, RgbaBitmap, RgbaBitmaps, BYTES_PER_PIXEL};
pub use engine::{DecodeEngine, GifEngine};
pub use format::{DisposalMethod, FrameInfo};
pub use result::GifResult;
