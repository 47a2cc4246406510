//! Fixtures shared by the stage tests.

#![allow(dead_code)]

use ash::vk;
use conetrace_core::constants::NUM_DIRECTIONS;
use conetrace_core::{ForwardStageConfig, PostVoxelizeStageConfig, ShaderConfig};
use conetrace_render::{
    create_forward_stage, create_post_voxelize_stage, ForwardStageInfo, IndexBufferView, Mesh,
    RecordContext, RenderStage, StageKind, StaticDescriptorSet, Submesh, VertexLayout,
    VoxelTexture,
};
use conetrace_test::{external, image_descriptor, RecordingDevice, FAKE_SPIRV};

pub const STATIC_IMAGE_BINDING: u32 = 2;

pub fn ctx() -> RecordContext {
    RecordContext {
        command_pool: external(1),
        extent: vk::Extent2D {
            width: 1280,
            height: 720,
        },
    }
}

pub fn render_pass() -> vk::RenderPass {
    external(2)
}

pub fn static_set() -> StaticDescriptorSet {
    StaticDescriptorSet::new(external(3), external(4), STATIC_IMAGE_BINDING)
        .with_dynamic_offsets(vec![0])
}

pub fn framebuffers(count: u64) -> Vec<vk::Framebuffer> {
    (0..count).map(|i| external(0x100 + i)).collect()
}

pub fn vertex_layout() -> VertexLayout {
    VertexLayout::new()
        .binding(0, 32)
        .attribute(0, 0, vk::Format::R32G32B32_SFLOAT, 0)
        .attribute(1, 0, vk::Format::R32G32B32_SFLOAT, 12)
        .attribute(2, 0, vk::Format::R32G32_SFLOAT, 24)
}

/// Submesh `n` draws `3 * (n + 1)` indices with textures `3n`, `3n + 1`, `3n + 2`.
pub fn submesh(n: u32) -> Submesh {
    Submesh::new(
        IndexBufferView {
            buffer: external(0x200 + u64::from(n)),
            offset: u64::from(n) * 64,
            count: 3 * (n + 1),
            index_type: vk::IndexType::UINT32,
        },
        [3 * n, 3 * n + 1, 3 * n + 2],
    )
}

/// Meshes with the given submesh counts, numbered consecutively.
pub fn meshes(submesh_counts: &[u32]) -> Vec<Mesh> {
    let mut next = 0;
    submesh_counts
        .iter()
        .enumerate()
        .map(|(m, &count)| {
            let submeshes = (next..next + count).map(submesh).collect();
            next += count;
            Mesh::new(vec![external(0x300 + m as u64)], vec![0], submeshes).unwrap()
        })
        .collect()
}

pub fn forward_config() -> ForwardStageConfig {
    ForwardStageConfig::new().with_shaders(
        ShaderConfig::from_spirv(FAKE_SPIRV.to_vec()),
        ShaderConfig::from_spirv(FAKE_SPIRV.to_vec()),
    )
}

pub fn build_forward(
    device: &RecordingDevice,
    config: &ForwardStageConfig,
    meshes: Vec<Mesh>,
    targets: &[vk::Framebuffer],
) -> (RenderStage, conetrace_gpu::Result<()>) {
    let mut stage = RenderStage::new(StageKind::Forward);
    let result = construct_forward(&mut stage, device, config, meshes, targets);
    (stage, result)
}

pub fn construct_forward(
    stage: &mut RenderStage,
    device: &RecordingDevice,
    config: &ForwardStageConfig,
    meshes: Vec<Mesh>,
    targets: &[vk::Framebuffer],
) -> conetrace_gpu::Result<()> {
    let layout = vertex_layout();
    let info = ForwardStageInfo {
        config,
        render_pass: render_pass(),
        static_set: static_set(),
        vertex_layout: &layout,
        meshes,
    };
    unsafe { create_forward_stage(stage, device, info, &ctx(), targets) }
}

pub fn voxel_texture(width: u32, cascades: u32) -> VoxelTexture {
    let mut direction_descriptors = [vk::DescriptorImageInfo::default(); NUM_DIRECTIONS];
    for (i, d) in direction_descriptors.iter_mut().enumerate() {
        *d = image_descriptor(0x400 + i as u64);
    }
    VoxelTexture {
        direction_descriptors,
        alpha_descriptor: image_descriptor(0x410),
        width,
        height: width,
        depth: width,
        cascade_count: cascades,
    }
}

pub fn post_voxelize_config() -> PostVoxelizeStageConfig {
    PostVoxelizeStageConfig::new().with_shader(ShaderConfig::from_spirv(FAKE_SPIRV.to_vec()))
}

pub fn build_post_voxelize(
    device: &RecordingDevice,
    texture: VoxelTexture,
) -> (RenderStage, conetrace_gpu::Result<()>) {
    let mut stage = RenderStage::new(StageKind::PostVoxelize);
    let result = unsafe {
        create_post_voxelize_stage(&mut stage, device, &post_voxelize_config(), texture, &ctx())
    };
    (stage, result)
}
