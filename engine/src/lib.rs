//! ReelCast Core Library
//!
//! Composes vertical short videos from still images, narration, and an optional
//! background track, with word-synchronized captions burned in.
//!
//! The library is organized around one stateless pipeline:
//!
//! ```text
//! images ─► staging ─┐
//! script ─► captions ├─► composition plan ─► filter graph ─► render
//! audio  ─► probe ───┘
//! ```
//!
//! See [`core::pipeline::VideoPipeline`] for the entry point.

pub mod core;
