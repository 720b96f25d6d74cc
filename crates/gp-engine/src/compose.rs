//! Frame compositing: LZW expansion, palette lookup and disposal

use thiserror::Error;
use tracing::trace;
use weezl::{decode::Decoder as LzwDecoder, BitOrder, LzwError, LzwStatus};

use crate::bitmap::BYTES_PER_PIXEL;
use crate::format::{interlaced_row, DisposalMethod, FrameInfo};
use crate::result::GifResult;

/// How far the colour indices of a frame got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fill {
    Complete,
    /// End code arrived before every pixel was produced
    EndCode,
    /// Image data ran out before the end code
    Exhausted,
}

#[derive(Error, Debug)]
pub(crate) enum FrameError {
    #[error("corrupt LZW data: {0:?}")]
    Lzw(LzwError),
}

impl From<Fill> for GifResult {
    fn from(fill: Fill) -> GifResult {
        match fill {
            Fill::Complete => GifResult::Ok,
            Fill::EndCode => GifResult::EndOfFrame,
            Fill::Exhausted => GifResult::InsufficientFrameData,
        }
    }
}

impl From<FrameError> for GifResult {
    fn from(_: FrameError) -> GifResult {
        GifResult::FrameDataError
    }
}

/// Iterator over the payloads of a sub-block chain.
///
/// A block running past the end of the buffer yields whatever bytes exist.
pub(crate) struct SubBlocks<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> SubBlocks<'a> {
    pub(crate) fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            done: false,
        }
    }
}

impl<'a> Iterator for SubBlocks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.done {
            return None;
        }
        let Some(&len) = self.data.get(self.pos) else {
            self.done = true;
            return None;
        };
        if len == 0 {
            self.done = true;
            return None;
        }
        let start = self.pos + 1;
        let end = (start + len as usize).min(self.data.len());
        self.pos = start + len as usize;
        Some(&self.data[start..end])
    }
}

/// Largest run of colour indices expanded at once
pub(crate) const CHUNK_LEN: usize = 16 * 1024;

/// Expand the LZW stream of `frame`, handing each run of decoded indices to
/// `sink` together with its offset in the frame.
///
/// Output goes through a fixed-size `chunk`, so memory use does not depend on
/// the dimensions the frame declares.
pub(crate) fn decode_indices<F>(
    data: &[u8],
    frame: &FrameInfo,
    chunk: &mut Vec<u8>,
    mut sink: F,
) -> Result<Fill, FrameError>
where
    F: FnMut(usize, &[u8]),
{
    let pixels = frame.pixel_count();
    if pixels == 0 {
        return Ok(Fill::Complete);
    }
    chunk.clear();
    chunk.resize(pixels.min(CHUNK_LEN), 0);

    let mut decoder = LzwDecoder::new(BitOrder::Lsb, frame.code_size);
    let mut filled = 0;
    let mut blocks = SubBlocks::new(data, frame.data_offset);
    let mut input: &[u8] = &[];

    loop {
        if input.is_empty() {
            match blocks.next() {
                Some(block) => input = block,
                None => break,
            }
            continue;
        }

        let want = (pixels - filled).min(chunk.len());
        let result = decoder.decode_bytes(input, &mut chunk[..want]);
        input = &input[result.consumed_in..];
        if result.consumed_out > 0 {
            sink(filled, &chunk[..result.consumed_out]);
            filled += result.consumed_out;
        }

        if filled == pixels {
            return Ok(Fill::Complete);
        }
        match result.status {
            Ok(LzwStatus::Done) => return Ok(Fill::EndCode),
            Ok(LzwStatus::Ok) => {}
            Ok(LzwStatus::NoProgress) => input = &[],
            Err(err) => return Err(FrameError::Lzw(err)),
        }
        if result.consumed_in == 0 && result.consumed_out == 0 {
            input = &[];
        }
    }

    // Codes still buffered inside the decoder
    loop {
        let want = (pixels - filled).min(chunk.len());
        let result = decoder.decode_bytes(&[], &mut chunk[..want]);
        if result.consumed_out > 0 {
            sink(filled, &chunk[..result.consumed_out]);
            filled += result.consumed_out;
        }
        if filled == pixels {
            return Ok(Fill::Complete);
        }
        match result.status {
            Ok(LzwStatus::Done) => return Ok(Fill::EndCode),
            Err(err) => return Err(FrameError::Lzw(err)),
            Ok(_) if result.consumed_out == 0 => return Ok(Fill::Exhausted),
            Ok(_) => {}
        }
    }
}

/// Draws frames onto one RGBA8 canvas
pub(crate) struct Compositor<'a> {
    pixels: &'a mut [u8],
    width: usize,
    height: usize,
    data: &'a [u8],
    global_palette: &'a [u8],
    previous: &'a mut Vec<u8>,
    /// Scratch space for decoded colour indices
    chunk: Vec<u8>,
}

impl<'a> Compositor<'a> {
    pub(crate) fn new(
        pixels: &'a mut [u8],
        width: usize,
        height: usize,
        data: &'a [u8],
        global_palette: &'a [u8],
        previous: &'a mut Vec<u8>,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            data,
            global_palette,
            previous,
            chunk: Vec::new(),
        }
    }

    /// Reset the whole canvas to transparent
    pub(crate) fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Apply the disposal method of `frame`, which is currently drawn
    pub(crate) fn dispose(&mut self, frame: &FrameInfo) {
        match frame.disposal {
            DisposalMethod::Unspecified | DisposalMethod::Keep => {}
            DisposalMethod::Background => {
                if frame.display {
                    self.clear_rect(frame);
                }
            }
            DisposalMethod::Previous => {
                if self.previous.len() == self.pixels.len() {
                    self.pixels.copy_from_slice(&self.previous[..]);
                } else {
                    self.clear();
                }
            }
        }
    }

    /// Composite `frame` over the current canvas
    pub(crate) fn draw(&mut self, frame: &FrameInfo) -> GifResult {
        if frame.disposal == DisposalMethod::Previous {
            self.previous.clear();
            if self.previous.try_reserve_exact(self.pixels.len()).is_err() {
                return GifResult::InsufficientMemory;
            }
            self.previous.extend_from_slice(&self.pixels[..]);
        }
        if !frame.display {
            return GifResult::Ok;
        }

        let data = self.data;
        let palette = self.palette_for(frame);
        let mut chunk = std::mem::take(&mut self.chunk);
        let outcome = decode_indices(data, frame, &mut chunk, |start, indices| {
            self.blit_span(frame, palette, start, indices)
        });
        self.chunk = chunk;

        match outcome {
            Ok(fill) => fill.into(),
            Err(err) => {
                trace!("{}", err);
                err.into()
            }
        }
    }

    fn palette_for(&self, frame: &FrameInfo) -> &'a [u8] {
        match &frame.local_palette {
            Some(range) => self.data.get(range.clone()).unwrap_or(self.global_palette),
            None => self.global_palette,
        }
    }

    /// Draw `indices`, which start at pixel `start` of the frame in stored order
    fn blit_span(&mut self, frame: &FrameInfo, palette: &[u8], start: usize, indices: &[u8]) {
        let frame_width = frame.width as usize;
        if frame_width == 0 {
            return;
        }
        let mut position = start;
        let mut rest = indices;
        while !rest.is_empty() {
            let column = position % frame_width;
            let take = (frame_width - column).min(rest.len());
            self.blit_row(frame, palette, position / frame_width, column, &rest[..take]);
            position += take;
            rest = &rest[take..];
        }
    }

    /// Draw part of stored row `n`, beginning at `column`
    fn blit_row(&mut self, frame: &FrameInfo, palette: &[u8], n: usize, column: usize, row: &[u8]) {
        let stored = if frame.interlaced {
            interlaced_row(n, frame.height as usize)
        } else {
            n
        };
        let y = frame.top as usize + stored;
        if y >= self.height {
            return;
        }
        let row_start = y * self.width;

        for (i, &index) in row.iter().enumerate() {
            let x = frame.left as usize + column + i;
            if x >= self.width {
                break;
            }
            if frame.transparent == Some(index) {
                continue;
            }
            let entry = index as usize * 3;
            let Some(rgb) = palette.get(entry..entry + 3) else {
                continue;
            };
            let offset = (row_start + x) * BYTES_PER_PIXEL;
            self.pixels[offset..offset + BYTES_PER_PIXEL]
                .copy_from_slice(&[rgb[0], rgb[1], rgb[2], 0xFF]);
        }
    }

    fn clear_rect(&mut self, frame: &FrameInfo) {
        let left = frame.left as usize;
        let top = frame.top as usize;
        let right = (left + frame.width as usize).min(self.width);
        let bottom = (top + frame.height as usize).min(self.height);

        for y in top..bottom {
            let start = (y * self.width + left) * BYTES_PER_PIXEL;
            let end = (y * self.width + right) * BYTES_PER_PIXEL;
            self.pixels[start..end].fill(0);
        }
    }
}
