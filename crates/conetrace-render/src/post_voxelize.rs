//! Post-voxelization compute stage.
//!
//! Runs the filtering shader over the anisotropic voxel texture once per
//! cascade. The stage has no framebuffers; it records one command buffer per
//! cascade instead.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use conetrace_core::constants::QUERY_SLOT_COUNT;
use conetrace_core::PostVoxelizeStageConfig;
use conetrace_gpu::{
    create_compute_pipeline, write_storage_image, DescriptorSetLayoutBuilder, GpuError,
    RenderDevice, Result, ShaderStage,
};
use glam::Vec3;

use crate::stage::{
    record_each, write_end_timestamp, CommandRecorder, RecordContext, RenderStage, StageKind,
    StageParams, StageResources, StageState,
};
use crate::voxel_texture::VoxelTexture;

/// Binding of the directional voxel storage image.
pub const VOXEL_GRID_BINDING: u32 = 0;
/// Binding of the voxel opacity storage image.
pub const VOXEL_ALPHA_BINDING: u32 = 1;

/// Push constants for the post-voxelization compute shader.
///
/// Must match the shader's layout:
/// ```glsl
/// layout(push_constant) uniform PushConstants {
///     vec3 gridres;     // 12 bytes
///     uint cascadeNum;  // 4 bytes
/// } pc;
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PostVoxelizePushConstants {
    /// Voxel grid dimensions.
    pub grid_resolution: Vec3,
    /// Cascade this dispatch filters.
    pub cascade_index: u32,
}

impl PostVoxelizePushConstants {
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;
}

/// Layout of the stage's single set: two compute storage images.
pub fn voxel_set_layout() -> DescriptorSetLayoutBuilder<'static> {
    DescriptorSetLayoutBuilder::new()
        .storage_image(VOXEL_GRID_BINDING, vk::ShaderStageFlags::COMPUTE)
        .storage_image(VOXEL_ALPHA_BINDING, vk::ShaderStageFlags::COMPUTE)
}

/// Post-voxelization stage parameter block.
#[derive(Clone, Copy, Debug)]
pub struct PostVoxelizeParams {
    pub voxel_texture: VoxelTexture,
    /// Local workgroup edge length of the shader.
    pub local_size: u32,
}

impl PostVoxelizeParams {
    unsafe fn record_cascade<D: RenderDevice + ?Sized>(
        &self,
        device: &D,
        resources: &StageResources,
        cascade: u32,
        cmd: vk::CommandBuffer,
    ) -> Result<()> {
        let pipeline = resources.pipeline()?;
        let layout = resources.pipeline_layout;

        let push_constants = PostVoxelizePushConstants {
            grid_resolution: self.voxel_texture.grid_resolution(),
            cascade_index: cascade,
        };
        device.cmd_push_constants(
            cmd,
            layout,
            vk::ShaderStageFlags::COMPUTE,
            0,
            bytemuck::bytes_of(&push_constants),
        );

        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, pipeline);
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::COMPUTE,
            layout,
            0,
            &resources.descriptor_sets,
            &[],
        );

        let [x, y, z] = self.voxel_texture.workgroup_counts(self.local_size);
        device.cmd_dispatch(cmd, x, y, z);

        // Filtered voxels are read by later compute and fragment work.
        let barrier = vk::MemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::SHADER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ);
        device.cmd_memory_barrier(
            cmd,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::PipelineStageFlags::COMPUTE_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER,
            &barrier,
        );

        write_end_timestamp(device, cmd, resources.query_pool);
        tracing::trace!(cascade, x, y, z, "post-voxelize cascade recorded");
        Ok(())
    }
}

impl CommandRecorder for PostVoxelizeParams {
    /// Records one command buffer per cascade; `targets` is ignored.
    unsafe fn record<D: RenderDevice + ?Sized>(
        &self,
        device: &D,
        resources: &StageResources,
        ctx: &RecordContext,
        _targets: &[vk::Framebuffer],
    ) -> Result<Vec<vk::CommandBuffer>> {
        record_each(
            device,
            ctx,
            resources.query_pool,
            self.voxel_texture.cascade_count,
            |cascade, cmd| self.record_cascade(device, resources, cascade, cmd),
        )
    }
}

/// Build a post-voxelization stage and record one command buffer per cascade.
///
/// Calling this on an already constructed stage creates no new objects and
/// does not rewrite the descriptor set; it only installs the new parameters
/// and re-records. The texture may change its grid size between calls, but
/// not its bound image views or cascade count: those are baked into the
/// descriptor set and semaphores, so a mismatch is rejected with
/// [`GpuError::InvalidState`] before touching the device. Destroy the stage
/// to bind a different texture.
///
/// # Safety
/// The device, command pool, and the voxel texture's image views must be valid.
pub unsafe fn create_post_voxelize_stage<D: RenderDevice + ?Sized>(
    stage: &mut RenderStage,
    device: &D,
    config: &PostVoxelizeStageConfig,
    voxel_texture: VoxelTexture,
    ctx: &RecordContext,
) -> Result<()> {
    stage.expect_kind(StageKind::PostVoxelize)?;
    config.validate()?;
    voxel_texture.validate(config.local_size)?;
    check_rebind(stage, &voxel_texture)?;

    let set_layout = voxel_set_layout();
    let push_constant_range = vk::PushConstantRange::default()
        .stage_flags(vk::ShaderStageFlags::COMPUTE)
        .offset(0)
        .size(PostVoxelizePushConstants::SIZE);

    let mut builder = stage.builder(device);
    builder.query_pool(QUERY_SLOT_COUNT)?;
    builder.pipeline_cache(&config.pipeline_cache_data)?;
    builder.semaphores(voxel_texture.cascade_count as usize)?;
    builder.descriptor_set_layouts(std::slice::from_ref(&set_layout))?;
    builder.pipeline_layout(&[], std::slice::from_ref(&push_constant_range))?;
    builder.descriptor_pool(1, &set_layout.pool_sizes(1), 0, 0)?;
    let allocated = builder.descriptor_sets(1)?;
    // A failed earlier build may have written another texture's views.
    if allocated || stage.state() == StageState::Uninitialized {
        let set = stage.resources().descriptor_sets[0];
        write_storage_image(
            device,
            set,
            VOXEL_GRID_BINDING,
            &voxel_texture.direction_descriptors[0],
        );
        write_storage_image(device, set, VOXEL_ALPHA_BINDING, &voxel_texture.alpha_descriptor);
    }
    let mut builder = stage.builder(device);
    builder.pipeline(|device, cache, layout| {
        let shader =
            ShaderStage::load(device, &config.compute_shader, vk::ShaderStageFlags::COMPUTE)?;
        let pipeline = create_compute_pipeline(device, cache, layout, &shader);
        shader.destroy(device);
        pipeline
    })?;

    stage.resources_built(StageParams::PostVoxelize(PostVoxelizeParams {
        voxel_texture,
        local_size: config.local_size,
    }));
    stage.rebuild(device, ctx, &[])
}

/// Reject a texture the existing descriptor set and semaphores do not match.
fn check_rebind(stage: &RenderStage, voxel_texture: &VoxelTexture) -> Result<()> {
    let built = stage.semaphores().len();
    if built != 0 && built != voxel_texture.cascade_count as usize {
        return Err(GpuError::InvalidState(format!(
            "stage was built for {built} cascades, texture has {}",
            voxel_texture.cascade_count
        )));
    }
    if let Some(StageParams::PostVoxelize(params)) = stage.params() {
        if params.voxel_texture.bound_views() != voxel_texture.bound_views() {
            return Err(GpuError::InvalidState(
                "voxel texture views differ from the bound ones".to_string(),
            ));
        }
    }
    Ok(())
}
