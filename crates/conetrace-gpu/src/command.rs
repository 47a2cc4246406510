//! Command buffer management.

use ash::vk;

use crate::device::RenderDevice;
use crate::error::Result;

/// Allocate `count` command buffers from a pool.
///
/// # Safety
/// The device and pool must be valid.
pub unsafe fn allocate_command_buffers<D: RenderDevice + ?Sized>(
    device: &D,
    pool: vk::CommandPool,
    level: vk::CommandBufferLevel,
    count: u32,
) -> Result<Vec<vk::CommandBuffer>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(level)
        .command_buffer_count(count);

    device.allocate_command_buffers(&alloc_info)
}

/// Return command buffers to their pool.
///
/// # Safety
/// The device and pool must be valid and the buffers must not be pending.
pub unsafe fn free_command_buffers<D: RenderDevice + ?Sized>(
    device: &D,
    pool: vk::CommandPool,
    buffers: &[vk::CommandBuffer],
) {
    if !buffers.is_empty() {
        device.free_command_buffers(pool, buffers);
    }
}

/// Begin recording a command buffer for repeated submission.
///
/// # Safety
/// The device and command buffer must be valid.
#[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
pub unsafe fn begin_command_buffer<D: RenderDevice + ?Sized>(
    device: &D,
    cmd: vk::CommandBuffer,
) -> Result<()> {
    let begin_info = vk::CommandBufferBeginInfo::default();
    device.begin_command_buffer(cmd, &begin_info)
}

/// End recording a command buffer.
///
/// # Safety
/// The device and command buffer must be valid.
#[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
pub unsafe fn end_command_buffer<D: RenderDevice + ?Sized>(
    device: &D,
    cmd: vk::CommandBuffer,
) -> Result<()> {
    device.end_command_buffer(cmd)
}
