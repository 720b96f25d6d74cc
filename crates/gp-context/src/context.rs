//! Decode context
//!
//! Pairs one input buffer with one decode engine and runs the
//! parse-until-ready loop over it. Engine results are remapped into the
//! unified [`Status`] space before they leave this module.

use std::path::Path;

use gp_core::config::IoConfig;
use gp_core::Status;
use gp_engine::{BitmapCallbacks, DecodeEngine, GifEngine, GifResult};
use tracing::{debug, trace, warn};

use crate::buffer::{acquire_file, BufferOrigin, InputBuffer};

/// Lifecycle of a decode context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No buffer installed
    Empty,
    /// Buffer installed but the last initialise did not finish with ok
    Loaded,
    /// Frames may be decoded
    Decodable,
}

/// A successfully decoded frame
#[derive(Debug)]
pub struct Decoded<'a, B> {
    pub bitmap: &'a B,
    pub width: u32,
    pub height: u32,
    /// Hundredths of a second
    pub delay: u16,
}

/// Owns an input buffer and the engine parsing it
pub struct DecodeContext<'buf, E: DecodeEngine> {
    engine: E,
    buffer: InputBuffer<'buf>,
    frame_count: usize,
    state: ContextState,
    io: IoConfig,
}

impl<'buf, C: BitmapCallbacks> DecodeContext<'buf, GifEngine<C>> {
    /// Context backed by the GIF engine, drawing through `callbacks`
    pub fn new(callbacks: C) -> Self {
        Self::with_engine(GifEngine::new(callbacks))
    }
}

impl<'buf, E: DecodeEngine> DecodeContext<'buf, E> {
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
            buffer: InputBuffer::Empty,
            frame_count: 0,
            state: ContextState::Empty,
            io: IoConfig::default(),
        }
    }

    pub fn with_io_config(mut self, io: IoConfig) -> Self {
        self.io = io;
        self
    }

    /// Load and parse the GIF at `path`, returning its frame count
    pub fn initialise_file(&mut self, path: impl AsRef<Path>) -> Result<usize, Status> {
        let path = path.as_ref();
        trace!("initialise_file({})", path.display());

        let buffer = acquire_file(path, &self.io).map_err(|err| {
            let status = err.status();
            if status.is_acquisition_failure() {
                warn!("{}: {}", path.display(), err);
            } else {
                debug!("{}: {}", path.display(), err);
            }
            status
        })?;
        self.install(buffer)
    }

    /// Parse a caller-owned buffer. The buffer must outlive the context.
    pub fn initialise_buffer(&mut self, data: &'buf [u8]) -> Result<usize, Status> {
        trace!("initialise_buffer({} bytes)", data.len());
        if data.is_empty() {
            return Err(Status::InsufficientData);
        }
        self.install(InputBuffer::Borrowed(data))
    }

    /// Parse a buffer handed over to the context
    pub fn initialise_owned(&mut self, data: Vec<u8>) -> Result<usize, Status> {
        trace!("initialise_owned({} bytes)", data.len());
        if data.is_empty() {
            return Err(Status::InsufficientData);
        }
        self.install(InputBuffer::Owned(data.into_boxed_slice()))
    }

    fn install(&mut self, buffer: InputBuffer<'buf>) -> Result<usize, Status> {
        // The engine may still reference the old bytes until it is finalised
        self.engine.finalise();
        self.buffer.release();
        self.buffer = buffer;
        self.frame_count = 0;
        self.state = ContextState::Loaded;

        let data = self.buffer.as_slice();
        let mut steps = 0usize;
        let result = loop {
            let result = self.engine.initialise(data);
            if result != GifResult::Working {
                break result;
            }
            steps += 1;
        };

        let status = Status::from(result);
        if !status.is_ok() {
            debug!("initialise stopped after {} steps: {}", steps, status);
            return Err(status);
        }

        self.frame_count = self.engine.frame_count_partial();
        self.state = ContextState::Decodable;
        debug!(
            "initialised {:?} buffer: {}x{}, {} frames",
            self.buffer.origin(),
            self.engine.width(),
            self.engine.height(),
            self.frame_count
        );
        Ok(self.frame_count)
    }

    /// Decode frame `index` into the engine's canvas
    pub fn decode_frame(&mut self, index: usize) -> Result<Decoded<'_, E::Bitmap>, Status> {
        trace!("decode_frame({})", index);
        if index >= self.engine.frame_count() {
            return Err(Status::InsufficientData);
        }

        let status = Status::from(self.engine.decode_frame(self.buffer.as_slice(), index));
        if !status.is_ok() {
            return Err(status);
        }

        let bitmap = self.engine.frame_image().ok_or(Status::InsufficientMemory)?;
        Ok(Decoded {
            bitmap,
            width: self.engine.width(),
            height: self.engine.height(),
            delay: self.engine.frame_delay(index).unwrap_or(0),
        })
    }

    /// Frame count reported by the last successful initialise
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn buffer_origin(&self) -> BufferOrigin {
        self.buffer.origin()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: DecodeEngine> Drop for DecodeContext<'_, E> {
    fn drop(&mut self) {
        self.engine.finalise();
        self.buffer.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gp_engine::fixtures::{FrameSpec, GifBuilder};
    use gp_engine::RgbaBitmaps;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every engine call
    #[derive(Default)]
    struct Journal {
        calls: Vec<String>,
    }

    struct ScriptedEngine {
        journal: Rc<RefCell<Journal>>,
        steps: Vec<GifResult>,
        frames: usize,
        canvas: u8,
    }

    impl ScriptedEngine {
        fn new(journal: Rc<RefCell<Journal>>, steps: Vec<GifResult>, frames: usize) -> Self {
            Self {
                journal,
                steps,
                frames,
                canvas: 0,
            }
        }

        fn log(&self, call: impl Into<String>) {
            self.journal.borrow_mut().calls.push(call.into());
        }
    }

    impl DecodeEngine for ScriptedEngine {
        type Bitmap = u8;

        fn initialise(&mut self, data: &[u8]) -> GifResult {
            self.log(format!("initialise {}", data.len()));
            if self.steps.is_empty() {
                GifResult::Ok
            } else {
                self.steps.remove(0)
            }
        }

        fn decode_frame(&mut self, _data: &[u8], index: usize) -> GifResult {
            self.log(format!("decode {}", index));
            self.canvas = index as u8;
            GifResult::Ok
        }

        fn finalise(&mut self) {
            self.log("finalise");
        }

        fn frame_count(&self) -> usize {
            self.frames
        }

        fn frame_count_partial(&self) -> usize {
            self.frames
        }

        fn width(&self) -> u32 {
            8
        }

        fn height(&self) -> u32 {
            4
        }

        fn frame_delay(&self, index: usize) -> Option<u16> {
            Some(index as u16 * 5)
        }

        fn frame_image(&self) -> Option<&u8> {
            Some(&self.canvas)
        }
    }

    fn scripted(steps: Vec<GifResult>, frames: usize) -> (Rc<RefCell<Journal>>, ScriptedEngine) {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let engine = ScriptedEngine::new(journal.clone(), steps, frames);
        (journal, engine)
    }

    #[test]
    fn test_new_context_is_empty() {
        let context = DecodeContext::new(RgbaBitmaps::new());
        assert_eq!(context.state(), ContextState::Empty);
        assert_eq!(context.buffer_origin(), BufferOrigin::None);
        assert_eq!(context.frame_count(), 0);
    }

    #[test]
    fn test_parse_loop_runs_until_not_working() {
        let (journal, engine) = scripted(
            vec![GifResult::Working, GifResult::Working, GifResult::Ok],
            2,
        );
        let mut context = DecodeContext::with_engine(engine);
        assert_eq!(context.initialise_buffer(b"abc"), Ok(2));
        assert_eq!(context.state(), ContextState::Decodable);

        let journal = journal.borrow();
        assert_eq!(
            journal.calls,
            ["finalise", "initialise 3", "initialise 3", "initialise 3"]
        );
    }

    #[test]
    fn test_engine_error_is_remapped() {
        let (_, engine) = scripted(vec![GifResult::Working, GifResult::DataError], 0);
        let mut context = DecodeContext::with_engine(engine);
        assert_eq!(context.initialise_buffer(b"abc"), Err(Status::DataError));
        assert_eq!(context.state(), ContextState::Loaded);
        assert_eq!(context.frame_count(), 0);
    }

    #[test]
    fn test_empty_buffer_leaves_context_alone() {
        let (journal, engine) = scripted(Vec::new(), 1);
        let mut context = DecodeContext::with_engine(engine);
        assert_eq!(context.initialise_buffer(&[]), Err(Status::InsufficientData));
        assert_eq!(context.initialise_owned(Vec::new()), Err(Status::InsufficientData));
        assert!(journal.borrow().calls.is_empty());
        assert_eq!(context.state(), ContextState::Empty);
    }

    #[test]
    fn test_decode_range_checked_before_engine() {
        let (journal, engine) = scripted(Vec::new(), 2);
        let mut context = DecodeContext::with_engine(engine);
        context.initialise_buffer(b"x").unwrap();
        journal.borrow_mut().calls.clear();

        assert_eq!(context.decode_frame(2).unwrap_err(), Status::InsufficientData);
        assert!(journal.borrow().calls.is_empty());

        let frame = context.decode_frame(1).unwrap();
        assert_eq!((frame.width, frame.height, frame.delay), (8, 4, 5));
        assert_eq!(*frame.bitmap, 1);
    }

    #[test]
    fn test_reinitialise_finalises_first() {
        let replacement = [9u8; 5];
        let (journal, engine) = scripted(Vec::new(), 1);
        let mut context = DecodeContext::with_engine(engine);
        context.initialise_owned(vec![1, 2, 3]).unwrap();
        assert_eq!(context.buffer_origin(), BufferOrigin::Owned);

        context.initialise_buffer(&replacement).unwrap();
        assert_eq!(context.buffer_origin(), BufferOrigin::Borrowed);
        assert_eq!(context.buffer_len(), 5);

        let journal = journal.borrow();
        assert_eq!(
            journal.calls,
            ["finalise", "initialise 3", "finalise", "initialise 5"]
        );
    }

    #[test]
    fn test_drop_finalises_engine() {
        let (journal, engine) = scripted(Vec::new(), 1);
        {
            let mut context = DecodeContext::with_engine(engine);
            context.initialise_buffer(b"x").unwrap();
        }
        assert_eq!(journal.borrow().calls.last().map(String::as_str), Some("finalise"));
    }

    #[test]
    fn test_decode_with_gif_engine() {
        let gif = GifBuilder::new(3, 2)
            .global_palette(&[[0, 0, 0], [255, 255, 255]])
            .frame(FrameSpec::new(3, 2, vec![1; 6]).delay(12))
            .frame(FrameSpec::new(3, 2, vec![0; 6]).delay(4))
            .build();

        let mut context = DecodeContext::new(RgbaBitmaps::new());
        assert_eq!(context.initialise_buffer(&gif), Ok(2));

        let frame = context.decode_frame(0).unwrap();
        assert_eq!((frame.width, frame.height, frame.delay), (3, 2, 12));
        assert_eq!(frame.bitmap.pixel(2, 1), Some([255, 255, 255, 255]));

        let frame = context.decode_frame(1).unwrap();
        assert_eq!(frame.delay, 4);
        assert_eq!(frame.bitmap.pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[cfg(unix)]
    #[test]
    fn test_dropping_context_unmaps_file_once() {
        use crate::buffer::{MAP_TEST_LOCK, UNMAP_COUNT};
        use std::io::Write;
        use std::sync::atomic::Ordering;

        let _guard = MAP_TEST_LOCK.lock();
        let gif = GifBuilder::new(1, 1)
            .frame(FrameSpec::new(1, 1, vec![1]))
            .build();
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(&gif).unwrap();
        file.flush().unwrap();
        let before = UNMAP_COUNT.load(Ordering::SeqCst);

        let mut context = DecodeContext::new(RgbaBitmaps::new())
            .with_io_config(IoConfig { map_files: true });
        assert_eq!(context.initialise_file(file.path()), Ok(1));
        assert_eq!(context.buffer_origin(), BufferOrigin::Mapped);
        assert!(context.decode_frame(0).is_ok());
        assert_eq!(UNMAP_COUNT.load(Ordering::SeqCst), before);

        drop(context);
        assert_eq!(UNMAP_COUNT.load(Ordering::SeqCst), before + 1);
    }
}
