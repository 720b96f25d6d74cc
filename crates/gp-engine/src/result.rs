//! Engine-native result codes

use gp_core::Status;

/// Outcome of an engine call
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GifResult {
    /// More parsing steps are needed; call `initialise` again
    Working = 1,
    Ok = 0,
    InsufficientFrameData = -1,
    FrameDataError = -2,
    InsufficientData = -3,
    DataError = -4,
    InsufficientMemory = -5,
    FrameNoDisplay = -6,
    EndOfFrame = -7,
}

impl GifResult {
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    #[inline]
    pub const fn is_working(self) -> bool {
        matches!(self, GifResult::Working)
    }
}

impl From<GifResult> for Status {
    /// `Working` only reaches a caller when the parse stopped before a frame
    /// table existed, which for a resident buffer means the data ran out.
    fn from(result: GifResult) -> Status {
        match result {
            GifResult::Working => Status::InsufficientData,
            GifResult::Ok => Status::Ok,
            GifResult::InsufficientFrameData => Status::InsufficientFrameData,
            GifResult::FrameDataError => Status::FrameDataError,
            GifResult::InsufficientData => Status::InsufficientData,
            GifResult::DataError => Status::DataError,
            GifResult::InsufficientMemory => Status::InsufficientMemory,
            GifResult::FrameNoDisplay => Status::FrameNoDisplay,
            GifResult::EndOfFrame => Status::EndOfFrame,
        }
    }
}
