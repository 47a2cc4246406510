//! Vulkan abstraction layer for the conetrace renderer.
//!
//! This crate provides:
//! - The [`RenderDevice`] seam render stages record through
//! - Descriptor set layout, pool, write, and copy helpers
//! - Graphics and compute pipeline creation
//! - Command buffer, semaphore, and timestamp query helpers
//! - SPIR-V shader loading

pub mod command;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod shader;
pub mod sync;

pub use command::{
    allocate_command_buffers, begin_command_buffer, end_command_buffer, free_command_buffers,
};
pub use descriptors::{
    allocate_descriptor_sets, copy_descriptor, create_descriptor_pool, write_storage_image,
    DescriptorSetLayoutBuilder,
};
pub use device::RenderDevice;
pub use error::{GpuError, Result};
pub use pipeline::{create_compute_pipeline, create_graphics_pipeline, GraphicsPipelineConfig};
pub use query::{create_timestamp_query_pool, TimestampPair};
pub use shader::{read_spirv, ShaderStage};
pub use sync::{create_semaphore, create_semaphores};
