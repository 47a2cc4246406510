//! Pipeline creation.

use ash::vk;

use crate::device::RenderDevice;
use crate::error::{GpuError, Result};
use crate::shader::ShaderStage;

/// Graphics pipeline configuration.
///
/// Defaults are the fixed-function state every mesh pass uses: triangle
/// lists, back-face culling with counter-clockwise front faces, depth test
/// and write with `LESS_OR_EQUAL`, no blending, one sample. Viewport and
/// scissor are always dynamic.
#[derive(Clone)]
pub struct GraphicsPipelineConfig {
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare_op: vk::CompareOp,
    pub samples: vk::SampleCountFlags,
    pub color_attachment_count: u32,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

impl Default for GraphicsPipelineConfig {
    fn default() -> Self {
        Self {
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: true,
            depth_write: true,
            depth_compare_op: vk::CompareOp::LESS_OR_EQUAL,
            samples: vk::SampleCountFlags::TYPE_1,
            color_attachment_count: 1,
            render_pass: vk::RenderPass::null(),
            subpass: 0,
        }
    }
}

/// Dynamic state set per command buffer rather than baked into the pipeline.
pub const DYNAMIC_STATES: [vk::DynamicState; 2] =
    [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];

/// Create a graphics pipeline against a render pass.
///
/// # Safety
/// The device, cache, layout, render pass, and shader modules must be valid.
pub unsafe fn create_graphics_pipeline<D: RenderDevice + ?Sized>(
    device: &D,
    cache: vk::PipelineCache,
    layout: vk::PipelineLayout,
    config: &GraphicsPipelineConfig,
    shaders: &[ShaderStage],
) -> Result<vk::Pipeline> {
    if config.render_pass == vk::RenderPass::null() {
        return Err(GpuError::PipelineCreation(
            "graphics pipeline needs a render pass".to_string(),
        ));
    }

    let shader_stages: Vec<_> = shaders.iter().map(ShaderStage::create_info).collect();

    // Vertex input
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&config.vertex_bindings)
        .vertex_attribute_descriptions(&config.vertex_attributes);

    // Input assembly
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(config.topology)
        .primitive_restart_enable(false);

    // Viewport (dynamic)
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    // Rasterization
    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(config.polygon_mode)
        .cull_mode(config.cull_mode)
        .front_face(config.front_face)
        .depth_bias_enable(false)
        .line_width(1.0);

    // Multisampling
    let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(config.samples)
        .sample_shading_enable(false);

    // Depth stencil
    let keep = vk::StencilOpState::default()
        .fail_op(vk::StencilOp::KEEP)
        .pass_op(vk::StencilOp::KEEP)
        .compare_op(vk::CompareOp::ALWAYS);
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(config.depth_test)
        .depth_write_enable(config.depth_write)
        .depth_compare_op(config.depth_compare_op)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false)
        .front(keep)
        .back(keep);

    // Color blending
    let color_blend_attachments: Vec<_> = (0..config.color_attachment_count)
        .map(|_| {
            vk::PipelineColorBlendAttachmentState::default()
                .blend_enable(false)
                .color_write_mask(vk::ColorComponentFlags::RGBA)
        })
        .collect();

    let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&DYNAMIC_STATES);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(config.render_pass)
        .subpass(config.subpass);

    let pipelines = device.create_graphics_pipelines(cache, &[pipeline_info])?;
    pipelines
        .first()
        .copied()
        .ok_or_else(|| GpuError::PipelineCreation("driver returned no pipeline".to_string()))
}

/// Create a compute pipeline from a single compute shader.
///
/// # Safety
/// The device, cache, layout, and shader module must be valid.
pub unsafe fn create_compute_pipeline<D: RenderDevice + ?Sized>(
    device: &D,
    cache: vk::PipelineCache,
    layout: vk::PipelineLayout,
    shader: &ShaderStage,
) -> Result<vk::Pipeline> {
    if shader.stage() != vk::ShaderStageFlags::COMPUTE {
        return Err(GpuError::PipelineCreation(format!(
            "compute pipeline given a {:?} shader",
            shader.stage()
        )));
    }

    let pipeline_info = vk::ComputePipelineCreateInfo::default()
        .stage(shader.create_info())
        .layout(layout);

    let pipelines = device.create_compute_pipelines(cache, &[pipeline_info])?;
    pipelines
        .first()
        .copied()
        .ok_or_else(|| GpuError::PipelineCreation("driver returned no pipeline".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fixed_function_state() {
        let config = GraphicsPipelineConfig::default();
        assert_eq!(config.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(config.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(config.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert!(config.depth_test && config.depth_write);
        assert_eq!(config.depth_compare_op, vk::CompareOp::LESS_OR_EQUAL);
        assert_eq!(config.samples, vk::SampleCountFlags::TYPE_1);
    }

    #[test]
    fn viewport_and_scissor_are_dynamic() {
        assert!(DYNAMIC_STATES.contains(&vk::DynamicState::VIEWPORT));
        assert!(DYNAMIC_STATES.contains(&vk::DynamicState::SCISSOR));
    }
}
