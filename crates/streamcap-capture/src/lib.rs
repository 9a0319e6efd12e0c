//! Stream capture and delivery.
//!
//! Wraps the external ffmpeg binary for fixed-duration stream-copy capture
//! and for segmenting oversized artifacts, and ships the results to a chat
//! through the [`sink::ChatSink`] seam.

pub mod delivery;
pub mod recorder;
pub mod sink;
