//! Decode context layer
//!
//! Owns input buffers, drives the decode engine through its
//! parse-until-ready loop and maps engine results onto [`Status`]. Also
//! holds the handle registry used by the plugin boundary and a small
//! playback layer for Rust hosts.

pub mod animation;
pub mod buffer;
pub mod context;
pub mod playback;
pub mod registry;

pub use animation::Animation;
pub use buffer::{AcquireError, BufferOrigin, InputBuffer};
pub use context::{ContextState, DecodeContext, Decoded};
pub use gp_core::Status;
pub use playback::{Playback, Tick};
pub use registry::{Handle, HandleRegistry};
