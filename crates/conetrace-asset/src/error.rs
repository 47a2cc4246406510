//! Asset conversion errors.

use thiserror::Error;

/// Errors raised while converting source files into assets.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The source bytes are not an image the decoder understands.
    #[error("Couldn't load image: {0}")]
    Unparsable(#[from] image::ImageError),

    /// The decoded image has no texels.
    #[error("Image has zero extent ({width}x{height})")]
    Empty { width: u32, height: u32 },

    /// The decoded image could not be stored.
    #[error(transparent)]
    Asset(#[from] conetrace_core::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, DecodeError>;
