//! Asset conversion for the conetrace renderer.
//!
//! Decodes source files into the flat blobs described in
//! [`conetrace_core::asset`] and stores them in a linear allocator.

pub mod decode;
pub mod error;

pub use decode::{convert_image_asset, decode_image};
pub use error::{DecodeError, Result};
