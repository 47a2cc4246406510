mod common;

use ash::vk;
use conetrace_gpu::GpuError;
use conetrace_render::{
    create_post_voxelize_stage, StageParams, StageState, VoxelTexture, VOXEL_ALPHA_BINDING,
    VOXEL_GRID_BINDING,
};
use conetrace_test::{external, image_descriptor, init_tracing, Call, RecordingDevice};

use common::*;

fn push_constant_bytes(resolution: f32, cascade: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(16);
    for _ in 0..3 {
        bytes.extend_from_slice(&resolution.to_le_bytes());
    }
    bytes.extend_from_slice(&cascade.to_le_bytes());
    bytes
}

fn reconstruct(
    stage: &mut conetrace_render::RenderStage,
    device: &RecordingDevice,
    texture: VoxelTexture,
) -> conetrace_gpu::Result<()> {
    unsafe { create_post_voxelize_stage(stage, device, &post_voxelize_config(), texture, &ctx()) }
}

fn written_views(device: &RecordingDevice) -> Vec<vk::ImageView> {
    device
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::UpdateDescriptorSets { writes, .. } => Some(writes),
            _ => None,
        })
        .flatten()
        .flat_map(|w| w.image_views)
        .collect()
}

#[test]
fn one_command_buffer_per_cascade() {
    init_tracing();
    let device = RecordingDevice::new();
    let (stage, result) = build_post_voxelize(&device, voxel_texture(64, 3));
    result.unwrap();

    assert_eq!(stage.state(), StageState::CommandsRecorded);
    assert_eq!(stage.command_buffers().len(), 3);
    assert_eq!(stage.semaphores().len(), 3);
}

#[test]
fn framebuffers_are_ignored_on_rebuild() {
    let device = RecordingDevice::new();
    let (mut stage, result) = build_post_voxelize(&device, voxel_texture(32, 2));
    result.unwrap();

    unsafe { stage.rebuild(&device, &ctx(), &framebuffers(5)) }.unwrap();
    assert_eq!(stage.command_buffers().len(), 2);
    assert!(device
        .commands_for(stage.command_buffers()[0])
        .iter()
        .all(|c| !matches!(c, Call::BeginRenderPass { .. })));
}

#[test]
fn cascade_commands_in_order() {
    let device = RecordingDevice::new();
    let (stage, result) = build_post_voxelize(&device, voxel_texture(64, 2));
    result.unwrap();

    let resources = stage.resources();
    for (cascade, &cmd) in stage.command_buffers().iter().enumerate() {
        let commands = device.commands_for(cmd);
        assert_eq!(commands.len(), 10, "{commands:#?}");

        assert!(matches!(commands[0], Call::BeginCommandBuffer(_)));
        assert!(matches!(
            commands[1],
            Call::ResetQueryPool { first_query: 0, query_count: 4, .. }
        ));
        assert!(matches!(
            commands[2],
            Call::WriteTimestamp { stage: vk::PipelineStageFlags::TOP_OF_PIPE, query: 0, .. }
        ));
        match &commands[3] {
            Call::PushConstants { layout, stages, offset, data, .. } => {
                assert_eq!(*layout, resources.pipeline_layout);
                assert_eq!(*stages, vk::ShaderStageFlags::COMPUTE);
                assert_eq!(*offset, 0);
                assert_eq!(data, &push_constant_bytes(64.0, cascade as u32));
            }
            other => panic!("expected push constants, got {other:?}"),
        }
        assert!(matches!(
            commands[4],
            Call::BindPipeline { bind_point: vk::PipelineBindPoint::COMPUTE, pipeline, .. }
                if pipeline == resources.pipelines[0]
        ));
        match &commands[5] {
            Call::BindDescriptorSets { bind_point, first_set, sets, dynamic_offsets, .. } => {
                assert_eq!(*bind_point, vk::PipelineBindPoint::COMPUTE);
                assert_eq!(*first_set, 0);
                assert_eq!(sets, &resources.descriptor_sets);
                assert!(dynamic_offsets.is_empty());
            }
            other => panic!("expected set bind, got {other:?}"),
        }
        assert!(matches!(commands[6], Call::Dispatch { x: 48, y: 8, z: 8, .. }));
        match &commands[7] {
            Call::MemoryBarrier { src_stage, dst_stage, src_access, dst_access, .. } => {
                assert_eq!(*src_stage, vk::PipelineStageFlags::COMPUTE_SHADER);
                assert_eq!(
                    *dst_stage,
                    vk::PipelineStageFlags::COMPUTE_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER
                );
                assert_eq!(*src_access, vk::AccessFlags::SHADER_WRITE);
                assert_eq!(*dst_access, vk::AccessFlags::SHADER_READ);
            }
            other => panic!("expected barrier, got {other:?}"),
        }
        assert!(matches!(
            commands[8],
            Call::WriteTimestamp { stage: vk::PipelineStageFlags::BOTTOM_OF_PIPE, query: 1, .. }
        ));
        assert!(matches!(commands[9], Call::EndCommandBuffer(_)));
    }
}

#[test]
fn dispatch_scales_with_grid_width() {
    for (width, groups) in [(8, 1), (32, 4), (128, 16)] {
        let device = RecordingDevice::new();
        let (stage, result) = build_post_voxelize(&device, voxel_texture(width, 1));
        result.unwrap();

        let dispatch = device
            .commands_for(stage.command_buffers()[0])
            .into_iter()
            .find_map(|c| match c {
                Call::Dispatch { x, y, z, .. } => Some([x, y, z]),
                _ => None,
            });
        assert_eq!(dispatch, Some([groups * 6, groups, groups]));
    }
}

#[test]
fn resources_match_compute_layout() {
    let device = RecordingDevice::new();
    let (stage, result) = build_post_voxelize(&device, voxel_texture(16, 1));
    result.unwrap();

    let own_layout = stage.resources().descriptor_set_layouts[0];
    for call in device.calls() {
        match call {
            Call::CreateDescriptorSetLayout { bindings, .. } => {
                assert_eq!(
                    bindings,
                    vec![
                        (
                            VOXEL_GRID_BINDING,
                            vk::DescriptorType::STORAGE_IMAGE,
                            vk::ShaderStageFlags::COMPUTE
                        ),
                        (
                            VOXEL_ALPHA_BINDING,
                            vk::DescriptorType::STORAGE_IMAGE,
                            vk::ShaderStageFlags::COMPUTE
                        ),
                    ]
                );
            }
            Call::CreatePipelineLayout { set_layouts, push_constant_ranges, .. } => {
                assert_eq!(set_layouts, vec![own_layout]);
                assert_eq!(push_constant_ranges, vec![(vk::ShaderStageFlags::COMPUTE, 0, 16)]);
            }
            Call::CreateDescriptorPool { max_sets, pool_sizes, .. } => {
                assert_eq!(max_sets, 1);
                assert_eq!(
                    pool_sizes,
                    vec![
                        (vk::DescriptorType::STORAGE_IMAGE, 1),
                        (vk::DescriptorType::STORAGE_IMAGE, 1)
                    ]
                );
            }
            Call::AllocateDescriptorSets { sets, .. } => assert_eq!(sets.len(), 1),
            Call::CreateComputePipeline { layout, stage: shader_stage, .. } => {
                assert_eq!(layout, stage.resources().pipeline_layout);
                assert_eq!(shader_stage, vk::ShaderStageFlags::COMPUTE);
            }
            _ => {}
        }
    }
    assert_eq!(device.count(|c| matches!(c, Call::CreateGraphicsPipeline { .. })), 0);
}

#[test]
fn voxel_images_written_once() {
    let device = RecordingDevice::new();
    let texture = voxel_texture(16, 2);
    let (mut stage, result) = build_post_voxelize(&device, texture);
    result.unwrap();

    let set = stage.resources().descriptor_sets[0];
    let writes: Vec<_> = device
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::UpdateDescriptorSets { writes, .. } => Some(writes),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(writes.len(), 2);

    assert_eq!(writes[0].dst_set, set);
    assert_eq!(writes[0].dst_binding, VOXEL_GRID_BINDING);
    assert_eq!(writes[0].descriptor_type, vk::DescriptorType::STORAGE_IMAGE);
    assert_eq!(writes[0].image_views, vec![external::<vk::ImageView>(0x400)]);

    assert_eq!(writes[1].dst_set, set);
    assert_eq!(writes[1].dst_binding, VOXEL_ALPHA_BINDING);
    assert_eq!(writes[1].image_views, vec![external::<vk::ImageView>(0x410)]);

    // Constructing again only re-records.
    device.clear_calls();
    reconstruct(&mut stage, &device, texture).unwrap();
    assert_eq!(device.count(|c| matches!(c, Call::UpdateDescriptorSets { .. })), 0);
    assert_eq!(stage.command_buffers().len(), 2);
}

#[test]
fn grid_not_multiple_of_local_size_is_rejected() {
    let device = RecordingDevice::new();
    let (stage, result) = build_post_voxelize(&device, voxel_texture(60, 1));
    assert!(matches!(result, Err(GpuError::Core(conetrace_core::Error::InvalidData(_)))));
    assert_eq!(stage.state(), StageState::Uninitialized);
    assert!(device.calls().is_empty());
}

#[test]
fn texture_without_cascades_is_rejected() {
    let device = RecordingDevice::new();
    let (_stage, result) = build_post_voxelize(&device, voxel_texture(64, 0));
    assert!(result.is_err());
    assert!(device.calls().is_empty());
}

#[test]
fn compute_pipeline_failure_propagates() {
    let device = RecordingDevice::new();
    device.fail_on("vkCreateComputePipelines", vk::Result::ERROR_INITIALIZATION_FAILED);

    let (stage, result) = build_post_voxelize(&device, voxel_texture(16, 1));
    assert!(matches!(
        result,
        Err(GpuError::Vulkan { op: "vkCreateComputePipelines", .. })
    ));
    assert_eq!(stage.state(), StageState::Uninitialized);
    assert!(stage.resources().pipelines.is_empty());
    assert_eq!(
        device.count(|c| matches!(c, Call::Destroy { object: vk::ObjectType::SHADER_MODULE, .. })),
        1
    );
}

#[test]
fn reconstructing_with_other_views_is_rejected() {
    let device = RecordingDevice::new();
    let (mut stage, result) = build_post_voxelize(&device, voxel_texture(16, 2));
    result.unwrap();
    let buffers = stage.command_buffers().to_vec();
    device.clear_calls();

    let mut other = voxel_texture(16, 2);
    other.alpha_descriptor = image_descriptor(0x420);
    let result = reconstruct(&mut stage, &device, other);

    assert!(matches!(result, Err(GpuError::InvalidState(_))));
    assert!(device.calls().is_empty());
    assert_eq!(stage.command_buffers(), buffers.as_slice());
    match stage.params() {
        Some(StageParams::PostVoxelize(params)) => {
            assert_eq!(params.voxel_texture.alpha_descriptor.image_view, external(0x410));
        }
        other => panic!("expected post-voxelize params, got {other:?}"),
    }
}

#[test]
fn reconstructing_with_other_cascade_count_is_rejected() {
    let device = RecordingDevice::new();
    let (mut stage, result) = build_post_voxelize(&device, voxel_texture(16, 2));
    result.unwrap();
    device.clear_calls();

    let result = reconstruct(&mut stage, &device, voxel_texture(16, 3));
    assert!(matches!(result, Err(GpuError::InvalidState(_))));
    assert!(device.calls().is_empty());
    assert_eq!(stage.semaphores().len(), 2);
    assert_eq!(stage.command_buffers().len(), 2);
}

#[test]
fn reconstructing_with_a_new_grid_size_rerecords() {
    let device = RecordingDevice::new();
    let (mut stage, result) = build_post_voxelize(&device, voxel_texture(16, 1));
    result.unwrap();
    device.clear_calls();

    reconstruct(&mut stage, &device, voxel_texture(32, 1)).unwrap();
    let dispatch = device
        .commands_for(stage.command_buffers()[0])
        .into_iter()
        .find_map(|c| match c {
            Call::Dispatch { x, y, z, .. } => Some([x, y, z]),
            _ => None,
        });
    assert_eq!(dispatch, Some([24, 4, 4]));
    assert!(written_views(&device).is_empty());
}

#[test]
fn retry_after_failed_build_writes_the_new_views() {
    let device = RecordingDevice::new();
    device.fail_on("vkCreateComputePipelines", vk::Result::ERROR_INITIALIZATION_FAILED);
    let (mut stage, result) = build_post_voxelize(&device, voxel_texture(16, 1));
    assert!(result.is_err());
    assert_eq!(written_views(&device), vec![external(0x400), external(0x410)]);

    device.clear_failures();
    device.clear_calls();
    let mut other = voxel_texture(16, 1);
    other.direction_descriptors[0] = image_descriptor(0x500);
    other.alpha_descriptor = image_descriptor(0x510);
    reconstruct(&mut stage, &device, other).unwrap();

    assert_eq!(stage.state(), StageState::CommandsRecorded);
    assert_eq!(written_views(&device), vec![external(0x500), external(0x510)]);
    assert_eq!(device.count(|c| matches!(c, Call::AllocateDescriptorSets { .. })), 0);
}
