//! Error types for the renderer core.

use thiserror::Error;

use crate::allocator::AllocatorTag;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data error
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Allocator region has no room left
    #[error("Allocator {tag:?} exhausted: requested {requested} bytes, {remaining} remaining")]
    AllocatorExhausted {
        tag: AllocatorTag,
        requested: usize,
        remaining: usize,
    },

    /// Allocator region was never registered
    #[error("Allocator {0:?} has no region")]
    UnknownAllocator(AllocatorTag),

    /// Out of bounds access
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
