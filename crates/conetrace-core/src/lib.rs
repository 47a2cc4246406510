//! Core types, asset layout, and configuration for the conetrace renderer.
//!
//! This crate provides the foundational types used throughout the renderer:
//! - Texture roles shared by meshes and the forward pass
//! - The flat image asset layout and the linear allocator it lives in
//! - Stage configuration
//! - Common error types

pub mod allocator;
pub mod asset;
pub mod config;
pub mod error;
pub mod texture;

pub use allocator::{Allocation, AllocatorTag, LinearAllocator};
pub use asset::{pack_rgba8, unpack_rgba8, Asset, AssetKind, ImageAsset, ImageDesc, MipDesc};
pub use config::{ForwardStageConfig, PostVoxelizeStageConfig, ShaderConfig, ShaderSource};
pub use error::{Error, Result};
pub use texture::TextureRole;

/// Renderer-wide constants
pub mod constants {
    /// Timestamp query slots owned by every render stage
    pub const QUERY_SLOT_COUNT: u32 = 4;
    /// Query slot written before any stage work
    pub const TIMESTAMP_START_SLOT: u32 = 0;
    /// Query slot written after all stage work
    pub const TIMESTAMP_END_SLOT: u32 = 1;
    /// Principal axis directions stored by the anisotropic voxel texture (+X, -X, +Y, -Y, +Z, -Z)
    pub const NUM_DIRECTIONS: usize = 6;
    /// Local workgroup edge length of the post-voxelization compute shader
    pub const VOXEL_LOCAL_SIZE: u32 = 8;
    /// Default number of per-draw descriptor sets reserved for each output target
    pub const DEFAULT_DRAW_BUDGET: u32 = 512;
    /// Clear color used by the forward pass
    pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.025, 0.025, 0.025, 1.0];
}
