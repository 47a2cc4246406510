//! Render stages for the conetrace voxel cone tracing renderer.
//!
//! This crate provides:
//! - The [`RenderStage`] object, its state machine, and the idempotent
//!   [`ResourcePoolBuilder`]
//! - Static and dynamic per-draw descriptor binding
//! - The forward shading stage
//! - The post-voxelization compute stage
//! - The mesh model and voxel texture contract the stages consume

pub mod binding;
pub mod forward;
pub mod mesh;
pub mod post_voxelize;
pub mod stage;
pub mod voxel_texture;

pub use binding::{
    slot_index, DynamicDescriptorSlots, StaticDescriptorSet, TargetSlots, DYNAMIC_SET_INDEX,
    STATIC_SET_INDEX,
};
pub use forward::{create_forward_stage, per_draw_set_layout, ForwardParams, ForwardStageInfo};
pub use mesh::{draw_count, IndexBufferView, Mesh, Submesh, VertexLayout};
pub use post_voxelize::{
    create_post_voxelize_stage, voxel_set_layout, PostVoxelizeParams, PostVoxelizePushConstants,
    VOXEL_ALPHA_BINDING, VOXEL_GRID_BINDING,
};
pub use stage::{
    CommandRecorder, RecordContext, RenderStage, ResourcePoolBuilder, StageKind, StageParams,
    StageResources, StageState,
};
pub use voxel_texture::VoxelTexture;
