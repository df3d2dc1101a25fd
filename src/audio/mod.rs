//! # Audio Module
//!
//! Post-processing for audio returned by the speech synthesizer before it is
//! handed back to the browser.
//!
//! ## Key Components:
//! - **Header repair**: Fixes the RIFF and `data` chunk sizes of streamed WAV output
//! - **Header inspection**: Reads format and duration back for logging
//!
//! ## Audio Format Notes:
//! The synthesizer is always asked for `audio/wav`; the sample rate and bit depth
//! depend on the selected voice and are passed through untouched.

pub mod header; // WAV header repair and inspection

pub use header::{inspect, repair_header, WavRepairError};
