//! Forward shading stage.
//!
//! Draws every submesh of every mesh into each framebuffer. Material
//! textures reach the fragment shader through per-draw descriptor sets that
//! are filled by copying from the static scene set while recording.

use ash::vk;
use conetrace_core::constants::QUERY_SLOT_COUNT;
use conetrace_core::{ForwardStageConfig, TextureRole};
use conetrace_gpu::{
    create_graphics_pipeline, DescriptorSetLayoutBuilder, GpuError, GraphicsPipelineConfig,
    RenderDevice, Result, ShaderStage,
};

use crate::binding::{DynamicDescriptorSlots, StaticDescriptorSet, DYNAMIC_SET_INDEX};
use crate::mesh::{draw_count, Mesh, VertexLayout};
use crate::stage::{
    record_each, write_end_timestamp, CommandRecorder, RecordContext, RenderStage, StageKind,
    StageParams, StageResources,
};

/// Semaphores owned by the forward stage.
const FORWARD_SEMAPHORE_COUNT: usize = 1;

/// Layout of the per-draw set: one sampled image per texture role, binding = role index.
pub fn per_draw_set_layout() -> DescriptorSetLayoutBuilder<'static> {
    TextureRole::ALL
        .iter()
        .fold(DescriptorSetLayoutBuilder::new(), |builder, role| {
            builder.sampled_image(role.index() as u32, vk::ShaderStageFlags::FRAGMENT)
        })
}

/// Everything needed to construct a forward stage.
pub struct ForwardStageInfo<'a> {
    pub config: &'a ForwardStageConfig,
    pub render_pass: vk::RenderPass,
    pub static_set: StaticDescriptorSet,
    pub vertex_layout: &'a VertexLayout,
    pub meshes: Vec<Mesh>,
}

/// Forward stage parameter block.
#[derive(Clone, Debug)]
pub struct ForwardParams {
    pub render_pass: vk::RenderPass,
    pub static_set: StaticDescriptorSet,
    pub meshes: Vec<Mesh>,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,
}

impl ForwardParams {
    fn clear_values(&self) -> [vk::ClearValue; 2] {
        [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.clear_depth,
                    stencil: self.clear_stencil,
                },
            },
        ]
    }

    /// Reject recordings that would run out of per-draw sets.
    ///
    /// Every target draws the same meshes, so one draw count covers all of them.
    fn check_capacity(&self, resources: &StageResources, targets: usize) -> Result<()> {
        let capacity = resources.target_capacity;
        if targets > capacity as usize {
            return Err(GpuError::TargetCapacityExceeded {
                requested: targets as u32,
                capacity,
            });
        }
        let draws = draw_count(&self.meshes);
        if draws > resources.draw_budget as usize {
            return Err(GpuError::DrawBudgetExceeded {
                draws: draws as u32,
                budget: resources.draw_budget,
            });
        }
        Ok(())
    }

    unsafe fn record_target<D: RenderDevice + ?Sized>(
        &self,
        device: &D,
        resources: &StageResources,
        slots: &DynamicDescriptorSlots<'_>,
        extent: vk::Extent2D,
        target: u32,
        framebuffer: vk::Framebuffer,
        cmd: vk::CommandBuffer,
    ) -> Result<()> {
        let pipeline = resources.pipeline()?;
        let layout = resources.pipeline_layout;

        let clear_values = self.clear_values();
        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);
        device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        device.cmd_set_viewport(cmd, &[viewport]);
        device.cmd_set_scissor(
            cmd,
            &[vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            }],
        );

        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
        self.static_set
            .bind(device, cmd, vk::PipelineBindPoint::GRAPHICS, layout);

        let mut cursor = slots.for_target(target)?;
        for mesh in &self.meshes {
            if !mesh.vertex_buffers().is_empty() {
                device.cmd_bind_vertex_buffers(
                    cmd,
                    0,
                    mesh.vertex_buffers(),
                    mesh.vertex_offsets(),
                );
            }
            for submesh in mesh.submeshes() {
                let set = cursor.claim()?;
                let copies = self.static_set.texture_copies(submesh, set);
                device.update_descriptor_sets(&[], &copies);
                device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    DYNAMIC_SET_INDEX,
                    &[set],
                    &[],
                );

                let indices = &submesh.indices;
                device.cmd_bind_index_buffer(
                    cmd,
                    indices.buffer,
                    indices.offset,
                    indices.index_type,
                );
                device.cmd_draw_indexed(cmd, indices.count, 1, 0, 0, 0);
            }
        }

        write_end_timestamp(device, cmd, resources.query_pool);
        device.cmd_end_render_pass(cmd);
        tracing::trace!(target, draws = cursor.claimed(), "forward target recorded");
        Ok(())
    }
}

impl CommandRecorder for ForwardParams {
    unsafe fn record<D: RenderDevice + ?Sized>(
        &self,
        device: &D,
        resources: &StageResources,
        ctx: &RecordContext,
        targets: &[vk::Framebuffer],
    ) -> Result<Vec<vk::CommandBuffer>> {
        self.check_capacity(resources, targets.len())?;
        let slots = DynamicDescriptorSlots::new(&resources.descriptor_sets, resources.draw_budget);

        record_each(
            device,
            ctx,
            resources.query_pool,
            targets.len() as u32,
            |target, cmd| {
                self.record_target(
                    device,
                    resources,
                    &slots,
                    ctx.extent,
                    target,
                    targets[target as usize],
                    cmd,
                )
            },
        )
    }
}

/// Build a forward stage's resources and record one command buffer per framebuffer.
///
/// Calling this on an already constructed stage creates no new objects; it
/// only installs the new parameters and re-records.
///
/// The per-draw descriptor pool is sized for `config.max_targets` targets, or
/// for `targets.len()` when unset, and never grows afterwards.
///
/// # Safety
/// The device, render pass, static set and its layout, command pool, every
/// buffer the meshes reference, and every framebuffer must be valid.
pub unsafe fn create_forward_stage<D: RenderDevice + ?Sized>(
    stage: &mut RenderStage,
    device: &D,
    info: ForwardStageInfo<'_>,
    ctx: &RecordContext,
    targets: &[vk::Framebuffer],
) -> Result<()> {
    stage.expect_kind(StageKind::Forward)?;
    let config = info.config;
    config.validate()?;

    let budget = config.draw_budget_per_target;
    let built_budget = stage.resources().draw_budget;
    if built_budget != 0 && built_budget != budget {
        return Err(GpuError::Core(conetrace_core::Error::InvalidConfig(format!(
            "draw budget {budget} differs from the {built_budget} sets per target \
             the stage was built with"
        ))));
    }

    let target_capacity = match stage.resources().target_capacity {
        0 => config.max_targets.unwrap_or(targets.len() as u32),
        built => built,
    };
    if target_capacity == 0 {
        return Err(GpuError::InvalidState(
            "forward stage needs at least one output target".to_string(),
        ));
    }
    let set_count = target_capacity.checked_mul(budget).ok_or_else(|| {
        GpuError::Core(conetrace_core::Error::InvalidConfig(format!(
            "{target_capacity} targets x {budget} draws overflows the descriptor pool"
        )))
    })?;

    let set_layout = per_draw_set_layout();
    let mut builder = stage.builder(device);
    builder.query_pool(QUERY_SLOT_COUNT)?;
    builder.pipeline_cache(&config.pipeline_cache_data)?;
    builder.semaphores(FORWARD_SEMAPHORE_COUNT)?;
    builder.descriptor_set_layouts(std::slice::from_ref(&set_layout))?;
    builder.pipeline_layout(&[info.static_set.layout], &[])?;
    builder.descriptor_pool(
        set_count,
        &set_layout.pool_sizes(set_count),
        target_capacity,
        budget,
    )?;
    builder.descriptor_sets(set_count)?;
    builder.pipeline(|device, cache, layout| {
        let pipeline_config = GraphicsPipelineConfig {
            vertex_bindings: info.vertex_layout.bindings.clone(),
            vertex_attributes: info.vertex_layout.attributes.clone(),
            render_pass: info.render_pass,
            ..Default::default()
        };
        let vertex =
            ShaderStage::load(device, &config.vertex_shader, vk::ShaderStageFlags::VERTEX)?;
        let fragment_flags = vk::ShaderStageFlags::FRAGMENT;
        let fragment = match ShaderStage::load(device, &config.fragment_shader, fragment_flags) {
            Ok(fragment) => fragment,
            Err(e) => {
                vertex.destroy(device);
                return Err(e);
            }
        };
        let shaders = [vertex, fragment];
        let pipeline =
            create_graphics_pipeline(device, cache, layout, &pipeline_config, &shaders);
        for shader in shaders {
            shader.destroy(device);
        }
        pipeline
    })?;

    stage.resources_built(StageParams::Forward(ForwardParams {
        render_pass: info.render_pass,
        static_set: info.static_set,
        meshes: info.meshes,
        clear_color: config.clear_color,
        clear_depth: config.clear_depth,
        clear_stencil: config.clear_stencil,
    }));
    stage.rebuild(device, ctx, targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_draw_layout_binds_roles_in_order() {
        let layout = per_draw_set_layout();
        let bindings = layout.bindings();
        assert_eq!(bindings.len(), TextureRole::COUNT);
        for (role, binding) in TextureRole::ALL.iter().zip(bindings) {
            assert_eq!(binding.binding, role.index() as u32);
            assert_eq!(binding.descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);
            assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
        }
    }

    #[test]
    fn pool_holds_every_slot() {
        let sizes = per_draw_set_layout().pool_sizes(2 * 512);
        assert_eq!(sizes.len(), 3);
        assert!(sizes.iter().all(|s| s.descriptor_count == 1024));
    }
}
