//! Unified status codes
//!
//! One namespace covering the decode engine's native result codes plus the
//! two codes only the decode context produces while acquiring a file. The
//! numeric values are part of the plugin ABI and must never change.

use thiserror::Error;

/// Result code reported by every fallible operation of a decode context
#[repr(i32)]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    #[error("ok")]
    Ok = 0,

    #[error("insufficient frame data")]
    InsufficientFrameData = -1,

    #[error("frame data error")]
    FrameDataError = -2,

    #[error("insufficient data")]
    InsufficientData = -3,

    #[error("data error")]
    DataError = -4,

    #[error("insufficient memory")]
    InsufficientMemory = -5,

    #[error("frame has nothing to display")]
    FrameNoDisplay = -6,

    #[error("end of frame")]
    EndOfFrame = -7,

    #[error("failed to open file")]
    FileOpenFailure = -8,

    #[error("failed to map file")]
    FileMapFailure = -9,
}

impl Status {
    /// Every status, in ABI order
    pub const ALL: [Status; 10] = [
        Status::Ok,
        Status::InsufficientFrameData,
        Status::FrameDataError,
        Status::InsufficientData,
        Status::DataError,
        Status::InsufficientMemory,
        Status::FrameNoDisplay,
        Status::EndOfFrame,
        Status::FileOpenFailure,
        Status::FileMapFailure,
    ];

    /// ABI value of this status
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Look up a status by its ABI value
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.code() == code)
    }

    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Per-frame signals a caller may skip over while iterating frames
    pub const fn is_informational(self) -> bool {
        matches!(self, Status::FrameNoDisplay | Status::EndOfFrame)
    }

    /// Failures raised while acquiring the input buffer, before any parsing
    pub const fn is_acquisition_failure(self) -> bool {
        matches!(
            self,
            Status::FileOpenFailure | Status::FileMapFailure | Status::InsufficientMemory
        )
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> i32 {
        status.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_stable() {
        assert_eq!(Status::Ok.code(), 0);
        assert_eq!(Status::InsufficientFrameData.code(), -1);
        assert_eq!(Status::FrameDataError.code(), -2);
        assert_eq!(Status::InsufficientData.code(), -3);
        assert_eq!(Status::DataError.code(), -4);
        assert_eq!(Status::InsufficientMemory.code(), -5);
        assert_eq!(Status::FrameNoDisplay.code(), -6);
        assert_eq!(Status::EndOfFrame.code(), -7);
        assert_eq!(Status::FileOpenFailure.code(), -8);
        assert_eq!(Status::FileMapFailure.code(), -9);
    }

    #[test]
    fn test_from_code() {
        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(1), None);
        assert_eq!(Status::from_code(-10), None);
    }

    #[test]
    fn test_classification() {
        assert!(Status::Ok.is_ok());
        assert!(!Status::EndOfFrame.is_ok());
        assert!(Status::FrameNoDisplay.is_informational());
        assert!(Status::EndOfFrame.is_informational());
        assert!(!Status::DataError.is_informational());
        assert!(Status::FileMapFailure.is_acquisition_failure());
        assert!(!Status::InsufficientData.is_acquisition_failure());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", Status::FileOpenFailure), "failed to open file");
        assert_eq!(format!("{}", Status::Ok), "ok");
    }
}
