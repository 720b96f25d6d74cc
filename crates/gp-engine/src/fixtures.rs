//! Synthetic GIF streams for tests
//!
//! ```ignore
//! let gif = GifBuilder::new(2, 2)
//!     .global_palette(&[[0, 0, 0], [255, 255, 255]])
//!     .frame(FrameSpec::new(2, 2, vec![0, 1, 1, 0]).delay(10))
//!     .build();
//! ```

use weezl::{encode::Encoder as LzwEncoder, BitOrder};

use crate::format::{
    interlaced_row, DisposalMethod, BLOCK_EXTENSION, BLOCK_IMAGE, BLOCK_TRAILER, EXT_APPLICATION,
    EXT_COMMENT, EXT_GRAPHIC_CONTROL,
};

/// One image block of a [`GifBuilder`] stream
#[derive(Debug, Clone)]
pub struct FrameSpec {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    delay: u16,
    disposal: DisposalMethod,
    transparent: Option<u8>,
    interlaced: bool,
    local_palette: Option<Vec<[u8; 3]>>,
    /// Colour indices in display order
    indices: Vec<u8>,
    code_size: Option<u8>,
    raw_data: Option<Vec<u8>>,
    truncate_data: Option<usize>,
}

impl FrameSpec {
    pub fn new(width: u16, height: u16, indices: Vec<u8>) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
            delay: 0,
            disposal: DisposalMethod::Unspecified,
            transparent: None,
            interlaced: false,
            local_palette: None,
            indices,
            code_size: None,
            raw_data: None,
            truncate_data: None,
        }
    }

    pub fn offset(mut self, left: u16, top: u16) -> Self {
        self.left = left;
        self.top = top;
        self
    }

    /// Delay in hundredths of a second
    pub fn delay(mut self, delay: u16) -> Self {
        self.delay = delay;
        self
    }

    pub fn disposal(mut self, disposal: DisposalMethod) -> Self {
        self.disposal = disposal;
        self
    }

    pub fn transparent(mut self, index: u8) -> Self {
        self.transparent = Some(index);
        self
    }

    pub fn interlaced(mut self) -> Self {
        self.interlaced = true;
        self
    }

    pub fn local_palette(mut self, colours: &[[u8; 3]]) -> Self {
        self.local_palette = Some(colours.to_vec());
        self
    }

    /// Override the LZW minimum code size written to the stream
    pub fn code_size(mut self, size: u8) -> Self {
        self.code_size = Some(size);
        self
    }

    /// Use `bytes` as the LZW stream instead of encoding the indices
    pub fn raw_data(mut self, bytes: Vec<u8>) -> Self {
        self.raw_data = Some(bytes);
        self
    }

    /// Keep only the first `len` bytes of the encoded LZW stream
    pub fn truncate_data(mut self, len: usize) -> Self {
        self.truncate_data = Some(len);
        self
    }

    fn has_control(&self) -> bool {
        self.delay != 0 || self.disposal != DisposalMethod::Unspecified || self.transparent.is_some()
    }

    /// Indices in the order they are stored in the stream
    fn stored_indices(&self) -> Vec<u8> {
        let width = self.width as usize;
        let height = self.height as usize;
        if !self.interlaced || self.indices.len() != width * height {
            return self.indices.clone();
        }
        (0..height)
            .flat_map(|n| {
                let row = interlaced_row(n, height);
                self.indices[row * width..(row + 1) * width].iter().copied()
            })
            .collect()
    }
}

enum Block {
    Frame(FrameSpec),
    Comment(String),
}

/// Builder for GIF byte streams
pub struct GifBuilder {
    width: u16,
    height: u16,
    global_palette: Option<Vec<[u8; 3]>>,
    background: u8,
    loop_count: Option<u16>,
    blocks: Vec<Block>,
    trailer: bool,
}

impl GifBuilder {
    /// Stream with a `width` x `height` logical screen and no global palette
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            global_palette: None,
            background: 0,
            loop_count: None,
            blocks: Vec::new(),
            trailer: true,
        }
    }

    pub fn global_palette(mut self, colours: &[[u8; 3]]) -> Self {
        self.global_palette = Some(colours.to_vec());
        self
    }

    pub fn background(mut self, index: u8) -> Self {
        self.background = index;
        self
    }

    /// Add a NETSCAPE2.0 looping extension
    pub fn loop_count(mut self, count: u16) -> Self {
        self.loop_count = Some(count);
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.blocks.push(Block::Comment(text.to_string()));
        self
    }

    pub fn frame(mut self, frame: FrameSpec) -> Self {
        self.blocks.push(Block::Frame(frame));
        self
    }

    pub fn without_trailer(mut self) -> Self {
        self.trailer = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"GIF89a");
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());

        let global_bits = self.global_palette.as_deref().map(size_bits);
        let packed = match global_bits {
            Some(bits) => 0x80 | 0x70 | bits,
            None => 0,
        };
        out.extend_from_slice(&[packed, self.background, 0]);
        if let Some(colours) = &self.global_palette {
            write_palette(&mut out, colours);
        }

        if let Some(count) = self.loop_count {
            out.extend_from_slice(&[BLOCK_EXTENSION, EXT_APPLICATION, 11]);
            out.extend_from_slice(b"NETSCAPE2.0");
            out.extend_from_slice(&[3, 1]);
            out.extend_from_slice(&count.to_le_bytes());
            out.push(0);
        }

        for block in &self.blocks {
            match block {
                Block::Comment(text) => {
                    out.extend_from_slice(&[BLOCK_EXTENSION, EXT_COMMENT]);
                    write_sub_blocks(&mut out, text.as_bytes());
                }
                Block::Frame(frame) => self.write_frame(&mut out, frame),
            }
        }

        if self.trailer {
            out.push(BLOCK_TRAILER);
        }
        out
    }

    fn write_frame(&self, out: &mut Vec<u8>, frame: &FrameSpec) {
        if frame.has_control() {
            let disposal: u8 = match frame.disposal {
                DisposalMethod::Unspecified => 0,
                DisposalMethod::Keep => 1,
                DisposalMethod::Background => 2,
                DisposalMethod::Previous => 3,
            };
            let packed = (disposal << 2) | frame.transparent.is_some() as u8;
            out.extend_from_slice(&[BLOCK_EXTENSION, EXT_GRAPHIC_CONTROL, 4, packed]);
            out.extend_from_slice(&frame.delay.to_le_bytes());
            out.extend_from_slice(&[frame.transparent.unwrap_or(0), 0]);
        }

        out.push(BLOCK_IMAGE);
        for value in [frame.left, frame.top, frame.width, frame.height] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        let mut packed = 0u8;
        if frame.interlaced {
            packed |= 0x40;
        }
        if let Some(colours) = &frame.local_palette {
            packed |= 0x80 | size_bits(colours);
        }
        out.push(packed);
        if let Some(colours) = &frame.local_palette {
            write_palette(out, colours);
        }

        let palette_len = frame
            .local_palette
            .as_ref()
            .or(self.global_palette.as_ref())
            .map_or(2, Vec::len);
        let code_size = frame
            .code_size
            .unwrap_or_else(|| (size_bits_for(palette_len) + 1).max(2));
        out.push(code_size);

        let mut data = match &frame.raw_data {
            Some(bytes) => bytes.clone(),
            None => LzwEncoder::new(BitOrder::Lsb, code_size.clamp(2, 11))
                .encode(&frame.stored_indices())
                .expect("indices fit the LZW code size"),
        };
        if let Some(len) = frame.truncate_data {
            data.truncate(len);
        }
        write_sub_blocks(out, &data);
    }
}

/// Packed size field for a table holding `colours`
fn size_bits(colours: &[[u8; 3]]) -> u8 {
    size_bits_for(colours.len())
}

fn size_bits_for(entries: usize) -> u8 {
    let mut bits = 0u8;
    while (2usize << bits) < entries && bits < 7 {
        bits += 1;
    }
    bits
}

fn write_palette(out: &mut Vec<u8>, colours: &[[u8; 3]]) {
    let entries = 2usize << size_bits(colours);
    for i in 0..entries {
        out.extend_from_slice(&colours.get(i).copied().unwrap_or([0, 0, 0]));
    }
}

fn write_sub_blocks(out: &mut Vec<u8>, data: &[u8]) {
    for chunk in data.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bits() {
        assert_eq!(size_bits_for(1), 0);
        assert_eq!(size_bits_for(2), 0);
        assert_eq!(size_bits_for(3), 1);
        assert_eq!(size_bits_for(4), 1);
        assert_eq!(size_bits_for(5), 2);
        assert_eq!(size_bits_for(256), 7);
    }

    #[test]
    fn test_empty_stream_layout() {
        let gif = GifBuilder::new(3, 2).build();
        assert_eq!(
            gif,
            vec![b'G', b'I', b'F', b'8', b'9', b'a', 3, 0, 2, 0, 0, 0, 0, BLOCK_TRAILER]
        );
    }

    #[test]
    fn test_palette_padding() {
        let gif = GifBuilder::new(1, 1)
            .global_palette(&[[1, 2, 3], [4, 5, 6], [7, 8, 9]])
            .build();
        // 3 colours round up to a 4-entry table
        assert_eq!(gif[10], 0xF1);
        assert_eq!(gif.len(), 13 + 12 + 1);
        assert_eq!(&gif[22..25], &[0, 0, 0]);
    }

    #[test]
    fn test_interlaced_storage_order() {
        let frame = FrameSpec::new(1, 4, vec![0, 1, 2, 3]).interlaced();
        assert_eq!(frame.stored_indices(), vec![0, 2, 1, 3]);
    }
}
