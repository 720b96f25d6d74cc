//! GIF stream layout: block introducers, packed fields and per-frame records

use bitflags::bitflags;
use std::ops::Range;

pub const SIGNATURE: &[u8; 3] = b"GIF";
/// Signature, version, logical screen descriptor
pub const HEADER_LEN: usize = 13;
/// Image descriptor after its introducer byte
pub const DESCRIPTOR_LEN: usize = 9;

pub const BLOCK_IMAGE: u8 = 0x2C;
pub const BLOCK_EXTENSION: u8 = 0x21;
pub const BLOCK_TRAILER: u8 = 0x3B;

pub const EXT_PLAIN_TEXT: u8 = 0x01;
pub const EXT_GRAPHIC_CONTROL: u8 = 0xF9;
pub const EXT_COMMENT: u8 = 0xFE;
pub const EXT_APPLICATION: u8 = 0xFF;

/// Largest LZW minimum code size accepted in image data
pub const MAX_CODE_SIZE: u8 = 11;

/// Palette used when the stream carries no global colour table
pub const DEFAULT_PALETTE: [u8; 6] = [0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF];

bitflags! {
    /// Packed field of the logical screen descriptor
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScreenFlags: u8 {
        const GLOBAL_TABLE = 0x80;
        const COLOR_RESOLUTION = 0x70;
        const SORTED = 0x08;
        const TABLE_SIZE = 0x07;
    }
}

bitflags! {
    /// Packed field of an image descriptor
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorFlags: u8 {
        const LOCAL_TABLE = 0x80;
        const INTERLACED = 0x40;
        const SORTED = 0x20;
        const TABLE_SIZE = 0x07;
    }
}

bitflags! {
    /// Packed field of a graphic control extension
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlFlags: u8 {
        const DISPOSAL = 0x1C;
        const USER_INPUT = 0x02;
        const TRANSPARENT = 0x01;
    }
}

/// Byte length of a colour table whose packed size field is `size_bits`
#[inline]
pub fn table_len(size_bits: u8) -> usize {
    3 << ((size_bits & 0x07) + 1)
}

impl ScreenFlags {
    pub fn table_len(self) -> Option<usize> {
        self.contains(Self::GLOBAL_TABLE)
            .then(|| table_len(self.bits()))
    }
}

impl DescriptorFlags {
    pub fn table_len(self) -> Option<usize> {
        self.contains(Self::LOCAL_TABLE)
            .then(|| table_len(self.bits()))
    }
}

/// What happens to a frame's area before the next frame is drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisposalMethod {
    #[default]
    Unspecified,
    Keep,
    /// Clear the area to transparent
    Background,
    /// Restore the canvas as it was before the frame was drawn
    Previous,
}

impl DisposalMethod {
    pub fn from_flags(flags: ControlFlags) -> Self {
        match (flags & ControlFlags::DISPOSAL).bits() >> 2 {
            1 => DisposalMethod::Keep,
            2 => DisposalMethod::Background,
            3 => DisposalMethod::Previous,
            // 0 and the reserved values 4..=7
            _ => DisposalMethod::Unspecified,
        }
    }
}

/// Graphic control extension waiting for the next image descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphicControl {
    pub delay: u16,
    pub disposal: DisposalMethod,
    pub transparent: Option<u8>,
}

impl GraphicControl {
    /// Parse the 4-byte body of a graphic control extension
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.len() < 4 {
            return None;
        }
        let flags = ControlFlags::from_bits_retain(body[0]);
        Some(Self {
            delay: u16::from_le_bytes([body[1], body[2]]),
            disposal: DisposalMethod::from_flags(flags),
            transparent: flags
                .contains(ControlFlags::TRANSPARENT)
                .then_some(body[3]),
        })
    }
}

/// Everything the engine records about one frame while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    /// Display delay in hundredths of a second
    pub delay: u16,
    pub disposal: DisposalMethod,
    pub transparent: Option<u8>,
    pub interlaced: bool,
    /// False when no part of the frame lies on the canvas
    pub display: bool,
    pub(crate) local_palette: Option<Range<usize>>,
    /// Offset of the first image data sub-block
    pub(crate) data_offset: usize,
    pub(crate) code_size: u8,
}

impl FrameInfo {
    pub fn has_local_palette(&self) -> bool {
        self.local_palette.is_some()
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Map the `n`th stored row of an interlaced frame to its display row
pub fn interlaced_row(n: usize, height: usize) -> usize {
    // Passes start at rows 0, 4, 2, 1 with steps 8, 8, 4, 2
    let pass1 = height.div_ceil(8);
    let pass2 = (height + 3) / 8;
    let pass3 = (height + 1) / 4;
    if n < pass1 {
        n * 8
    } else if n < pass1 + pass2 {
        (n - pass1) * 8 + 4
    } else if n < pass1 + pass2 + pass3 {
        (n - pass1 - pass2) * 4 + 2
    } else {
        (n - pass1 - pass2 - pass3) * 2 + 1
    }
}
