//! Frame-advancing wrapper over a decode context

use std::path::Path;
use std::time::Duration;

use gp_core::config::IoConfig;
use gp_core::{GifError, Result};
use gp_engine::{DecodeEngine, FrameInfo, GifEngine, RgbaBitmap, RgbaBitmaps};
use tracing::{debug, warn};

use crate::context::DecodeContext;

/// Convert a GIF delay (hundredths of a second) to a duration
pub fn delay_duration(delay: u16) -> Duration {
    Duration::from_millis(delay as u64 * 10)
}

/// An opened GIF with frame 0 already on the canvas
pub struct Animation<'buf> {
    context: DecodeContext<'buf, GifEngine<RgbaBitmaps>>,
    frame_index: usize,
    frame_count: usize,
}

impl Animation<'static> {
    pub fn open(path: impl AsRef<Path>, io: &IoConfig) -> Result<Self> {
        let mut context = DecodeContext::new(RgbaBitmaps::new()).with_io_config(io.clone());
        let count = context
            .initialise_file(path.as_ref())
            .map_err(|status| GifError::status("initialise", status))?;
        Self::start(context, count)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mut context = DecodeContext::new(RgbaBitmaps::new());
        let count = context
            .initialise_owned(data)
            .map_err(|status| GifError::status("initialise", status))?;
        Self::start(context, count)
    }
}

impl<'buf> Animation<'buf> {
    pub fn from_slice(data: &'buf [u8]) -> Result<Self> {
        let mut context = DecodeContext::new(RgbaBitmaps::new());
        let count = context
            .initialise_buffer(data)
            .map_err(|status| GifError::status("initialise", status))?;
        Self::start(context, count)
    }

    fn start(
        mut context: DecodeContext<'buf, GifEngine<RgbaBitmaps>>,
        frame_count: usize,
    ) -> Result<Self> {
        if frame_count == 0 {
            return Err(GifError::Empty);
        }
        context
            .decode_frame(0)
            .map_err(|status| GifError::status("decode", status))?;
        debug!("animation ready with {} frames", frame_count);

        Ok(Self {
            context,
            frame_index: 0,
            frame_count,
        })
    }

    /// Move to the next frame, wrapping to 0 after the last one.
    ///
    /// Returns how long the new frame stays on screen. Frames that have
    /// nothing to display, or whose data ends early, still advance the index.
    pub fn decode_next_frame(&mut self) -> Result<Duration> {
        let next = (self.frame_index + 1) % self.frame_count;
        self.frame_index = next;

        let decoded = self.context.decode_frame(next).map(|frame| frame.delay);
        match decoded {
            Ok(delay) => Ok(delay_duration(delay)),
            Err(status) if status.is_informational() => {
                warn!("frame {}: {}", next, status);
                Ok(self.delay_of(next))
            }
            Err(status) => Err(GifError::status("decode", status)),
        }
    }

    /// Rewind to frame 0
    pub fn reset(&mut self) -> Result<()> {
        self.frame_index = 0;
        self.context
            .decode_frame(0)
            .map(|_| ())
            .map_err(|status| GifError::status("decode", status))
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn width(&self) -> u32 {
        self.context.engine().width()
    }

    pub fn height(&self) -> u32 {
        self.context.engine().height()
    }

    /// Delay of the frame currently shown
    pub fn current_delay(&self) -> Duration {
        self.delay_of(self.frame_index)
    }

    pub fn loop_count(&self) -> Option<u16> {
        self.context.engine().loop_count()
    }

    pub fn frames(&self) -> &[FrameInfo] {
        self.context.engine().frames()
    }

    /// Canvas with the current frame composited
    pub fn bitmap(&self) -> Option<&RgbaBitmap> {
        self.context.engine().frame_image()
    }

    fn delay_of(&self, index: usize) -> Duration {
        delay_duration(self.context.engine().frame_delay(index).unwrap_or(0))
    }
}
