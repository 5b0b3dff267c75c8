//! # Squash Export
//!
//! Turns raw capture blocks into container-ready bytes.
//!
//! - **Pipeline**: [`EncodePipeline`] runs gain, DC blocking, limiting, metering,
//!   resampling, normalisation, dither and quantisation per block
//! - **Containers**: [`ContainerWriter`] writes WAV (44-byte header), AIFF
//!   (54-byte header) or raw PCM and patches sizes on finalisation
//!
//! ```ignore
//! use squash_export::*;
//!
//! let mut pipeline = EncodePipeline::new(EncodeOptions::default())?;
//! let mut writer = ContainerWriter::create("take.wav", pipeline.container_spec())?;
//! let block = pipeline.process_block(&interleaved)?;
//! writer.write_bytes(block.bytes)?;
//! writer.finalize()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `aiff` (default): AIFF container support

pub mod error;
mod options;

pub mod dsp;
pub mod format;
pub mod pipeline;

pub use error::{ExportError, Result};
pub use format::{ContainerSpec, ContainerWriter, Endian, AIFF_HEADER_LEN, WAV_HEADER_LEN};
pub use options::{AudioFormat, BitDepth, Container, DitherType, EncodeOptions, ProcessingParams};
pub use pipeline::{EncodePipeline, EncodedBlock};
