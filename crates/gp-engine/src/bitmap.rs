//! Bitmap callback capability
//!
//! The engine never allocates pixel storage itself. It asks the host for a
//! bitmap once per canvas and writes RGBA8 pixels into the buffer the host
//! hands back.

/// Bytes per canvas pixel (RGBA8)
pub const BYTES_PER_PIXEL: usize = 4;

/// Host-provided bitmap lifecycle hooks
pub trait BitmapCallbacks {
    /// Opaque bitmap handle produced by [`create`](Self::create)
    type Bitmap;

    /// Allocate a `width` x `height` bitmap, or `None` if that is impossible
    fn create(&mut self, width: u32, height: u32) -> Option<Self::Bitmap>;

    /// Release a bitmap previously returned by [`create`](Self::create)
    fn destroy(&mut self, bitmap: Self::Bitmap);

    /// Writable pixel storage of `bitmap`, `width * height * 4` bytes long
    fn buffer<'a>(&'a mut self, bitmap: &'a mut Self::Bitmap) -> Option<&'a mut [u8]>;
}

/// Heap-backed RGBA8 bitmap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RgbaBitmap {
    pub fn new(width: u32, height: u32) -> Option<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(BYTES_PER_PIXEL)?;
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).ok()?;
        pixels.resize(len, 0);
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// RGBA value at (`x`, `y`)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = &self.pixels[offset..offset + BYTES_PER_PIXEL];
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Callback set for Rust hosts: bitmaps are plain heap buffers
#[derive(Debug, Default)]
pub struct RgbaBitmaps {
    live: usize,
}

impl RgbaBitmaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bitmaps created and not yet destroyed
    pub fn live(&self) -> usize {
        self.live
    }
}

impl BitmapCallbacks for RgbaBitmaps {
    type Bitmap = RgbaBitmap;

    fn create(&mut self, width: u32, height: u32) -> Option<RgbaBitmap> {
        let bitmap = RgbaBitmap::new(width, height)?;
        self.live += 1;
        Some(bitmap)
    }

    fn destroy(&mut self, _bitmap: RgbaBitmap) {
        self.live = self.live.saturating_sub(1);
    }

    fn buffer<'a>(&'a mut self, bitmap: &'a mut RgbaBitmap) -> Option<&'a mut [u8]> {
        Some(bitmap.pixels_mut())
    }
}
