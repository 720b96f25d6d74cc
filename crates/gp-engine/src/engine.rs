//! Incremental GIF parser and the engine interface the decode context drives

use tracing::{debug, trace, warn};

use crate::bitmap::{BitmapCallbacks, BYTES_PER_PIXEL};
use crate::compose::Compositor;
use crate::format::{
    DescriptorFlags, FrameInfo, GraphicControl, ScreenFlags, BLOCK_EXTENSION, BLOCK_IMAGE,
    BLOCK_TRAILER, DEFAULT_PALETTE, DESCRIPTOR_LEN, EXT_APPLICATION, EXT_COMMENT,
    EXT_GRAPHIC_CONTROL, EXT_PLAIN_TEXT, HEADER_LEN, MAX_CODE_SIZE, SIGNATURE,
};
use crate::result::GifResult;

/// Decoder driven by a decode context.
///
/// The context hands the same resident buffer to every call between two
/// `finalise` calls.
pub trait DecodeEngine {
    /// Canvas bitmap type produced through the host callbacks
    type Bitmap;

    /// Run one parsing step. Repeat while the result is `Working`.
    fn initialise(&mut self, data: &[u8]) -> GifResult;

    /// Composite frame `index` onto the canvas
    fn decode_frame(&mut self, data: &[u8], index: usize) -> GifResult;

    /// Release the canvas and forget everything parsed so far
    fn finalise(&mut self);

    /// Frames whose data has been fully scanned
    fn frame_count(&self) -> usize;

    /// Frames seen so far, including one whose data is truncated
    fn frame_count_partial(&self) -> usize;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Delay of frame `index` in hundredths of a second
    fn frame_delay(&self, index: usize) -> Option<u16>;

    /// Canvas holding the most recently decoded frame
    fn frame_image(&self) -> Option<&Self::Bitmap>;

    /// Animation loop count; `Some(0)` loops forever
    fn loop_count(&self) -> Option<u16> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Header,
    Frames,
    Complete,
}

/// GIF decode engine writing RGBA8 frames into host bitmaps
pub struct GifEngine<C: BitmapCallbacks> {
    callbacks: C,
    state: ParseState,
    /// Next unparsed byte
    cursor: usize,
    width: u32,
    height: u32,
    /// Screen descriptor declared a zero dimension
    grow_canvas: bool,
    global_palette: Vec<u8>,
    background_index: u8,
    loop_count: Option<u16>,
    frames: Vec<FrameInfo>,
    complete_frames: usize,
    pending_control: Option<GraphicControl>,
    canvas: Option<C::Bitmap>,
    canvas_size: (u32, u32),
    decoded_frame: Option<usize>,
    /// Canvas snapshot for restore-to-previous disposal
    previous: Vec<u8>,
}

impl<C: BitmapCallbacks> GifEngine<C> {
    pub fn new(callbacks: C) -> Self {
        Self {
            callbacks,
            state: ParseState::Header,
            cursor: 0,
            width: 0,
            height: 0,
            grow_canvas: false,
            global_palette: Vec::new(),
            background_index: 0,
            loop_count: None,
            frames: Vec::new(),
            complete_frames: 0,
            pending_control: None,
            canvas: None,
            canvas_size: (0, 0),
            decoded_frame: None,
            previous: Vec::new(),
        }
    }

    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    /// Frames recorded so far
    pub fn frames(&self) -> &[FrameInfo] {
        &self.frames
    }

    pub fn background_index(&self) -> u8 {
        self.background_index
    }

    /// Index of the frame currently on the canvas
    pub fn decoded_frame(&self) -> Option<usize> {
        self.decoded_frame
    }

    fn exhausted(&self) -> GifResult {
        if self.frames.is_empty() {
            GifResult::InsufficientData
        } else {
            GifResult::InsufficientFrameData
        }
    }

    fn parse_header(&mut self, data: &[u8]) -> GifResult {
        if data.len() < HEADER_LEN {
            return GifResult::InsufficientData;
        }
        if &data[..3] != SIGNATURE {
            warn!("missing GIF signature");
            return GifResult::DataError;
        }

        let width = u16::from_le_bytes([data[6], data[7]]);
        let height = u16::from_le_bytes([data[8], data[9]]);
        let flags = ScreenFlags::from_bits_retain(data[10]);

        let mut cursor = HEADER_LEN;
        let palette = match flags.table_len() {
            Some(len) => {
                let Some(table) = data.get(cursor..cursor + len) else {
                    return GifResult::InsufficientData;
                };
                cursor += len;
                table.to_vec()
            }
            None => DEFAULT_PALETTE.to_vec(),
        };

        self.width = width as u32;
        self.height = height as u32;
        self.grow_canvas = width == 0 || height == 0;
        self.global_palette = palette;
        self.background_index = data[11];
        self.cursor = cursor;
        self.state = ParseState::Frames;

        debug!(
            "GIF screen {}x{}, global palette: {}",
            width,
            height,
            flags.contains(ScreenFlags::GLOBAL_TABLE)
        );
        GifResult::Working
    }

    /// Consume blocks up to and including the next image
    fn parse_next_frame(&mut self, data: &[u8]) -> GifResult {
        let mut pos = self.cursor;
        loop {
            let Some(&introducer) = data.get(pos) else {
                return self.exhausted();
            };
            match introducer {
                BLOCK_TRAILER => {
                    if self.frames.is_empty() {
                        return GifResult::InsufficientData;
                    }
                    self.cursor = pos + 1;
                    self.state = ParseState::Complete;
                    debug!("GIF trailer reached after {} frames", self.frames.len());
                    return GifResult::Ok;
                }
                BLOCK_EXTENSION => match self.parse_extension(data, pos + 1) {
                    Some(next) => pos = next,
                    None => return self.exhausted(),
                },
                BLOCK_IMAGE => return self.parse_image(data, pos + 1),
                other => {
                    warn!("unknown block introducer 0x{:02x} at offset {}", other, pos);
                    return GifResult::DataError;
                }
            }
        }
    }

    /// Parse the extension whose label sits at `pos`, returning the offset after it
    fn parse_extension(&mut self, data: &[u8], pos: usize) -> Option<usize> {
        let label = *data.get(pos)?;
        let body = pos + 1;
        let first_len = *data.get(body)? as usize;
        let first = data.get(body + 1..body + 1 + first_len)?;

        match label {
            EXT_GRAPHIC_CONTROL => match GraphicControl::parse(first) {
                Some(control) => self.pending_control = Some(control),
                None => warn!("short graphic control extension ignored"),
            },
            EXT_APPLICATION if first == b"NETSCAPE2.0" || first == b"ANIMEXTS1.0" => {
                let sub = body + 1 + first_len;
                let sub_len = *data.get(sub)? as usize;
                let block = data.get(sub + 1..sub + 1 + sub_len)?;
                if sub_len >= 3 && block[0] == 1 {
                    let count = u16::from_le_bytes([block[1], block[2]]);
                    trace!("loop count {}", count);
                    self.loop_count = Some(count);
                }
            }
            // A graphic control before plain text belongs to the text block
            EXT_PLAIN_TEXT => {
                if self.pending_control.take().is_some() {
                    trace!("graphic control consumed by plain text at offset {}", pos);
                }
            }
            EXT_COMMENT => trace!("comment at offset {}", pos),
            _ => {}
        }

        skip_sub_blocks(data, body)
    }

    /// Record the image whose descriptor starts at `pos`
    fn parse_image(&mut self, data: &[u8], pos: usize) -> GifResult {
        let Some(desc) = data.get(pos..pos + DESCRIPTOR_LEN) else {
            return self.exhausted();
        };
        let left = u16::from_le_bytes([desc[0], desc[1]]);
        let top = u16::from_le_bytes([desc[2], desc[3]]);
        let width = u16::from_le_bytes([desc[4], desc[5]]);
        let height = u16::from_le_bytes([desc[6], desc[7]]);
        let flags = DescriptorFlags::from_bits_retain(desc[8]);

        let mut cursor = pos + DESCRIPTOR_LEN;
        let local_palette = match flags.table_len() {
            Some(len) => {
                let range = cursor..cursor + len;
                if data.len() < range.end {
                    return self.exhausted();
                }
                cursor = range.end;
                Some(range)
            }
            None => None,
        };

        let Some(&code_size) = data.get(cursor) else {
            return self.exhausted();
        };
        if code_size > MAX_CODE_SIZE {
            warn!("LZW minimum code size {} out of range", code_size);
            return GifResult::FrameDataError;
        }

        let display = self.place_frame(left, top, width, height);
        let control = self.pending_control.take().unwrap_or_default();
        let data_offset = cursor + 1;

        self.frames.push(FrameInfo {
            left,
            top,
            width,
            height,
            delay: control.delay,
            disposal: control.disposal,
            transparent: control.transparent,
            interlaced: flags.contains(DescriptorFlags::INTERLACED),
            display,
            local_palette,
            data_offset,
            code_size,
        });
        trace!(
            "frame {}: {}x{} at ({}, {}), delay {}",
            self.frames.len() - 1,
            width,
            height,
            left,
            top,
            control.delay
        );

        match skip_sub_blocks(data, data_offset) {
            Some(next) => {
                self.complete_frames += 1;
                self.cursor = next;
                GifResult::Working
            }
            None => {
                self.cursor = data.len();
                GifResult::InsufficientFrameData
            }
        }
    }

    /// Fit a frame to the canvas, returning whether any of it is visible
    fn place_frame(&mut self, left: u16, top: u16, width: u16, height: u16) -> bool {
        if self.grow_canvas {
            self.width = self.width.max(left as u32 + width as u32);
            self.height = self.height.max(top as u32 + height as u32);
        }
        width > 0 && height > 0 && (left as u32) < self.width && (top as u32) < self.height
    }

    fn ensure_canvas(&mut self) -> Result<(), GifResult> {
        let size = (self.width, self.height);
        if self.canvas.is_some() && self.canvas_size == size {
            return Ok(());
        }
        if let Some(stale) = self.canvas.take() {
            self.callbacks.destroy(stale);
        }
        match self.callbacks.create(size.0, size.1) {
            Some(bitmap) => {
                self.canvas = Some(bitmap);
                self.canvas_size = size;
                self.decoded_frame = None;
                Ok(())
            }
            None => {
                warn!("bitmap create failed for {}x{} canvas", size.0, size.1);
                Err(GifResult::InsufficientMemory)
            }
        }
    }
}

impl<C: BitmapCallbacks> DecodeEngine for GifEngine<C> {
    type Bitmap = C::Bitmap;

    fn initialise(&mut self, data: &[u8]) -> GifResult {
        trace!("initialise: state {:?}, cursor {}", self.state, self.cursor);
        match self.state {
            ParseState::Header => self.parse_header(data),
            ParseState::Frames => self.parse_next_frame(data),
            ParseState::Complete => GifResult::Ok,
        }
    }

    fn decode_frame(&mut self, data: &[u8], index: usize) -> GifResult {
        trace!("decode_frame({})", index);
        let Some(frame) = self.frames.get(index) else {
            return GifResult::InsufficientData;
        };
        if !frame.display {
            return GifResult::FrameNoDisplay;
        }
        if self.decoded_frame == Some(index) {
            return GifResult::Ok;
        }
        if let Err(result) = self.ensure_canvas() {
            return result;
        }

        let start = match self.decoded_frame {
            Some(current) if current + 1 == index => index,
            _ => 0,
        };
        self.decoded_frame = None;

        let width = self.width as usize;
        let height = self.height as usize;
        let Some(canvas) = self.canvas.as_mut() else {
            return GifResult::InsufficientMemory;
        };
        let Some(pixels) = self.callbacks.buffer(canvas) else {
            warn!("bitmap has no pixel buffer");
            return GifResult::InsufficientMemory;
        };
        let Some(pixels) = pixels.get_mut(..width * height * BYTES_PER_PIXEL) else {
            warn!("bitmap buffer smaller than the {}x{} canvas", width, height);
            return GifResult::InsufficientMemory;
        };

        let mut compositor =
            Compositor::new(pixels, width, height, data, &self.global_palette, &mut self.previous);
        if start == 0 {
            compositor.clear();
        }

        let mut result = GifResult::Ok;
        for i in start..=index {
            if i > 0 {
                compositor.dispose(&self.frames[i - 1]);
            }
            let outcome = compositor.draw(&self.frames[i]);
            if i == index {
                result = outcome;
            } else if outcome != GifResult::Ok {
                warn!("frame {} composited with {:?} while rebuilding", i, outcome);
            }
        }

        if result == GifResult::Ok {
            self.decoded_frame = Some(index);
        }
        result
    }

    fn finalise(&mut self) {
        if let Some(canvas) = self.canvas.take() {
            self.callbacks.destroy(canvas);
        }
        self.state = ParseState::Header;
        self.cursor = 0;
        self.width = 0;
        self.height = 0;
        self.grow_canvas = false;
        self.global_palette.clear();
        self.background_index = 0;
        self.loop_count = None;
        self.frames.clear();
        self.complete_frames = 0;
        self.pending_control = None;
        self.canvas_size = (0, 0);
        self.decoded_frame = None;
        self.previous.clear();
    }

    fn frame_count(&self) -> usize {
        self.complete_frames
    }

    fn frame_count_partial(&self) -> usize {
        self.frames.len()
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn frame_delay(&self, index: usize) -> Option<u16> {
        self.frames.get(index).map(|frame| frame.delay)
    }

    fn frame_image(&self) -> Option<&C::Bitmap> {
        self.canvas.as_ref()
    }

    fn loop_count(&self) -> Option<u16> {
        self.loop_count
    }
}

impl<C: BitmapCallbacks> Drop for GifEngine<C> {
    fn drop(&mut self) {
        if let Some(canvas) = self.canvas.take() {
            self.callbacks.destroy(canvas);
        }
    }
}

/// Skip a sub-block chain starting at `pos`, returning the offset past its terminator
pub(crate) fn skip_sub_blocks(data: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = *data.get(pos)? as usize;
        pos += 1;
        if len == 0 {
            return Some(pos);
        }
        pos += len;
    }
}
