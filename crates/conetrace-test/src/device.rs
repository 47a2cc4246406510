//! A [`RenderDevice`] that records every call instead of talking to a GPU.
//!
//! Created objects get unique non-null fake handles. Create infos are
//! summarized into owned values at call time so tests can inspect them after
//! the borrowed Vulkan structs are gone.

use std::collections::HashMap;

use ash::vk::{self, Handle};
use conetrace_gpu::{GpuError, RenderDevice, Result};
use parking_lot::Mutex;

/// One descriptor write.
#[derive(Clone, Debug)]
pub struct DescriptorWrite {
    pub dst_set: vk::DescriptorSet,
    pub dst_binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub image_views: Vec<vk::ImageView>,
}

/// One descriptor copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorCopy {
    pub src_set: vk::DescriptorSet,
    pub src_binding: u32,
    pub src_array_element: u32,
    pub dst_set: vk::DescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_count: u32,
}

/// The fixed-function state of a created graphics pipeline.
#[derive(Clone, Debug)]
pub struct GraphicsPipelineSummary {
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub stage_count: u32,
    pub topology: Option<vk::PrimitiveTopology>,
    pub cull_mode: Option<vk::CullModeFlags>,
    pub front_face: Option<vk::FrontFace>,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare_op: Option<vk::CompareOp>,
    pub samples: Option<vk::SampleCountFlags>,
    pub blend_enabled: bool,
    pub dynamic_states: Vec<vk::DynamicState>,
}

/// A recorded device call.
#[derive(Clone, Debug)]
pub enum Call {
    CreateQueryPool {
        pool: vk::QueryPool,
        query_type: vk::QueryType,
        count: u32,
    },
    CreatePipelineCache {
        cache: vk::PipelineCache,
        initial_data: Vec<u8>,
    },
    CreateSemaphore(vk::Semaphore),
    CreateDescriptorSetLayout {
        layout: vk::DescriptorSetLayout,
        bindings: Vec<(u32, vk::DescriptorType, vk::ShaderStageFlags)>,
    },
    CreatePipelineLayout {
        layout: vk::PipelineLayout,
        set_layouts: Vec<vk::DescriptorSetLayout>,
        push_constant_ranges: Vec<(vk::ShaderStageFlags, u32, u32)>,
    },
    CreateDescriptorPool {
        pool: vk::DescriptorPool,
        max_sets: u32,
        pool_sizes: Vec<(vk::DescriptorType, u32)>,
    },
    AllocateDescriptorSets {
        pool: vk::DescriptorPool,
        sets: Vec<vk::DescriptorSet>,
    },
    UpdateDescriptorSets {
        writes: Vec<DescriptorWrite>,
        copies: Vec<DescriptorCopy>,
    },
    CreateShaderModule {
        module: vk::ShaderModule,
        words: usize,
    },
    CreateGraphicsPipeline {
        pipeline: vk::Pipeline,
        cache: vk::PipelineCache,
        summary: GraphicsPipelineSummary,
    },
    CreateComputePipeline {
        pipeline: vk::Pipeline,
        cache: vk::PipelineCache,
        layout: vk::PipelineLayout,
        stage: vk::ShaderStageFlags,
    },
    AllocateCommandBuffers {
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
        buffers: Vec<vk::CommandBuffer>,
    },
    GetQueryPoolResults {
        pool: vk::QueryPool,
        first_query: u32,
        count: usize,
    },
    GetPipelineCacheData(vk::PipelineCache),
    FreeCommandBuffers {
        pool: vk::CommandPool,
        buffers: Vec<vk::CommandBuffer>,
    },
    Destroy {
        object: vk::ObjectType,
        raw: u64,
    },
    BeginCommandBuffer(vk::CommandBuffer),
    EndCommandBuffer(vk::CommandBuffer),
    ResetQueryPool {
        cmd: vk::CommandBuffer,
        pool: vk::QueryPool,
        first_query: u32,
        query_count: u32,
    },
    WriteTimestamp {
        cmd: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    },
    BeginRenderPass {
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: Option<[f32; 4]>,
        clear_depth_stencil: Option<(f32, u32)>,
        contents: vk::SubpassContents,
    },
    EndRenderPass(vk::CommandBuffer),
    SetViewport {
        cmd: vk::CommandBuffer,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    },
    SetScissor {
        cmd: vk::CommandBuffer,
        extent: vk::Extent2D,
    },
    BindPipeline {
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    },
    BindDescriptorSets {
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
        dynamic_offsets: Vec<u32>,
    },
    BindVertexBuffers {
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: Vec<vk::Buffer>,
        offsets: Vec<vk::DeviceSize>,
    },
    BindIndexBuffer {
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    },
    DrawIndexed {
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
    },
    PushConstants {
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    Dispatch {
        cmd: vk::CommandBuffer,
        x: u32,
        y: u32,
        z: u32,
    },
    MemoryBarrier {
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        src_access: vk::AccessFlags,
        dst_access: vk::AccessFlags,
    },
}

impl Call {
    /// The command buffer a recording call targets, if any.
    pub fn command_buffer(&self) -> Option<vk::CommandBuffer> {
        match self {
            Self::BeginCommandBuffer(cmd)
            | Self::EndCommandBuffer(cmd)
            | Self::EndRenderPass(cmd) => Some(*cmd),
            Self::ResetQueryPool { cmd, .. }
            | Self::WriteTimestamp { cmd, .. }
            | Self::BeginRenderPass { cmd, .. }
            | Self::SetViewport { cmd, .. }
            | Self::SetScissor { cmd, .. }
            | Self::BindPipeline { cmd, .. }
            | Self::BindDescriptorSets { cmd, .. }
            | Self::BindVertexBuffers { cmd, .. }
            | Self::BindIndexBuffer { cmd, .. }
            | Self::DrawIndexed { cmd, .. }
            | Self::PushConstants { cmd, .. }
            | Self::Dispatch { cmd, .. }
            | Self::MemoryBarrier { cmd, .. } => Some(*cmd),
            _ => None,
        }
    }
}

#[derive(Default)]
struct State {
    next_handle: u64,
    calls: Vec<Call>,
    failures: HashMap<&'static str, vk::Result>,
    query_results: Vec<u64>,
    pipeline_cache_data: Vec<u8>,
}

impl State {
    fn handle<H: Handle>(&mut self) -> H {
        self.next_handle += 1;
        H::from_raw(0x1000 + self.next_handle)
    }

    fn check(&self, op: &'static str) -> Result<()> {
        match self.failures.get(op) {
            Some(&result) => {
                tracing::debug!(op, ?result, "injected failure");
                Err(GpuError::vulkan(op, result))
            }
            None => Ok(()),
        }
    }
}

/// Recording mock device.
#[derive(Default)]
pub struct RecordingDevice {
    state: Mutex<State>,
}

impl RecordingDevice {
    /// Create an empty recording device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call to `op` (a Vulkan entry point name such as
    /// `"vkCreateGraphicsPipelines"`) fail with `result`.
    pub fn fail_on(&self, op: &'static str, result: vk::Result) {
        self.state.lock().failures.insert(op, result);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Values returned by the next query pool readbacks.
    pub fn set_query_results(&self, results: Vec<u64>) {
        self.state.lock().query_results = results;
    }

    /// Bytes returned by pipeline cache readbacks.
    pub fn set_pipeline_cache_data(&self, data: Vec<u8>) {
        self.state.lock().pipeline_cache_data = data;
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Forget recorded calls. Handle numbering continues.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Calls recorded into one command buffer, in order.
    pub fn commands_for(&self, cmd: vk::CommandBuffer) -> Vec<Call> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.command_buffer() == Some(cmd))
            .cloned()
            .collect()
    }

    /// All descriptor copies issued so far.
    pub fn descriptor_copies(&self) -> Vec<DescriptorCopy> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::UpdateDescriptorSets { copies, .. } => Some(copies.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Raw handles passed to destroy or free calls.
    pub fn destroyed(&self) -> Vec<u64> {
        self.state
            .lock()
            .calls
            .iter()
            .flat_map(|c| match c {
                Call::Destroy { raw, .. } => vec![*raw],
                Call::FreeCommandBuffers { buffers, .. } => {
                    buffers.iter().map(|b| b.as_raw()).collect()
                }
                _ => Vec::new(),
            })
            .collect()
    }

    fn record(&self, call: Call) {
        tracing::trace!(?call, "device call");
        self.state.lock().calls.push(call);
    }

    fn create<H: Handle + Copy>(
        &self,
        op: &'static str,
        call: impl FnOnce(H) -> Call,
    ) -> Result<H> {
        let mut state = self.state.lock();
        state.check(op)?;
        let handle = state.handle::<H>();
        state.calls.push(call(handle));
        Ok(handle)
    }

    fn destroy<H: Handle>(&self, handle: H) {
        self.record(Call::Destroy {
            object: H::TYPE,
            raw: handle.as_raw(),
        });
    }
}

/// Borrow a Vulkan array pointer as a slice.
unsafe fn slice<'a, T>(ptr: *const T, len: u32) -> &'a [T] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        // SAFETY: non-null Vulkan array pointers are valid for their count.
        unsafe { std::slice::from_raw_parts(ptr, len as usize) }
    }
}

/// Borrow an optional Vulkan struct pointer.
unsafe fn opt<'a, T>(ptr: *const T) -> Option<&'a T> {
    // SAFETY: non-null Vulkan struct pointers are valid for the call.
    unsafe { ptr.as_ref() }
}

unsafe fn summarize_graphics(info: &vk::GraphicsPipelineCreateInfo<'_>) -> GraphicsPipelineSummary {
    unsafe {
        let assembly = opt(info.p_input_assembly_state);
        let raster = opt(info.p_rasterization_state);
        let depth = opt(info.p_depth_stencil_state);
        let multisample = opt(info.p_multisample_state);
        let blend = opt(info.p_color_blend_state);
        let dynamic = opt(info.p_dynamic_state);

        GraphicsPipelineSummary {
            layout: info.layout,
            render_pass: info.render_pass,
            stage_count: info.stage_count,
            topology: assembly.map(|a| a.topology),
            cull_mode: raster.map(|r| r.cull_mode),
            front_face: raster.map(|r| r.front_face),
            depth_test: depth.is_some_and(|d| d.depth_test_enable == vk::TRUE),
            depth_write: depth.is_some_and(|d| d.depth_write_enable == vk::TRUE),
            depth_compare_op: depth.map(|d| d.depth_compare_op),
            samples: multisample.map(|m| m.rasterization_samples),
            blend_enabled: blend.is_some_and(|b| {
                slice(b.p_attachments, b.attachment_count)
                    .iter()
                    .any(|a| a.blend_enable == vk::TRUE)
            }),
            dynamic_states: dynamic
                .map(|d| slice(d.p_dynamic_states, d.dynamic_state_count).to_vec())
                .unwrap_or_default(),
        }
    }
}

impl RenderDevice for RecordingDevice {
    unsafe fn create_query_pool(
        &self,
        info: &vk::QueryPoolCreateInfo<'_>,
    ) -> Result<vk::QueryPool> {
        self.create("vkCreateQueryPool", |pool| Call::CreateQueryPool {
            pool,
            query_type: info.query_type,
            count: info.query_count,
        })
    }

    unsafe fn create_pipeline_cache(
        &self,
        info: &vk::PipelineCacheCreateInfo<'_>,
    ) -> Result<vk::PipelineCache> {
        let initial_data = unsafe {
            slice(info.p_initial_data.cast::<u8>(), info.initial_data_size as u32).to_vec()
        };
        self.create("vkCreatePipelineCache", |cache| Call::CreatePipelineCache {
            cache,
            initial_data,
        })
    }

    unsafe fn create_semaphore(
        &self,
        _info: &vk::SemaphoreCreateInfo<'_>,
    ) -> Result<vk::Semaphore> {
        self.create("vkCreateSemaphore", Call::CreateSemaphore)
    }

    unsafe fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout> {
        let bindings = unsafe { slice(info.p_bindings, info.binding_count) }
            .iter()
            .map(|b| (b.binding, b.descriptor_type, b.stage_flags))
            .collect();
        self.create("vkCreateDescriptorSetLayout", |layout| {
            Call::CreateDescriptorSetLayout { layout, bindings }
        })
    }

    unsafe fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> Result<vk::PipelineLayout> {
        let set_layouts = unsafe { slice(info.p_set_layouts, info.set_layout_count) }.to_vec();
        let push_constant_ranges =
            unsafe { slice(info.p_push_constant_ranges, info.push_constant_range_count) }
                .iter()
                .map(|r| (r.stage_flags, r.offset, r.size))
                .collect();
        self.create("vkCreatePipelineLayout", |layout| Call::CreatePipelineLayout {
            layout,
            set_layouts,
            push_constant_ranges,
        })
    }

    unsafe fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> Result<vk::DescriptorPool> {
        let pool_sizes = unsafe { slice(info.p_pool_sizes, info.pool_size_count) }
            .iter()
            .map(|s| (s.ty, s.descriptor_count))
            .collect();
        self.create("vkCreateDescriptorPool", |pool| Call::CreateDescriptorPool {
            pool,
            max_sets: info.max_sets,
            pool_sizes,
        })
    }

    unsafe fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> Result<Vec<vk::DescriptorSet>> {
        let mut state = self.state.lock();
        state.check("vkAllocateDescriptorSets")?;
        let sets: Vec<vk::DescriptorSet> = (0..info.descriptor_set_count)
            .map(|_| state.handle())
            .collect();
        state.calls.push(Call::AllocateDescriptorSets {
            pool: info.descriptor_pool,
            sets: sets.clone(),
        });
        Ok(sets)
    }

    unsafe fn update_descriptor_sets(
        &self,
        writes: &[vk::WriteDescriptorSet<'_>],
        copies: &[vk::CopyDescriptorSet<'_>],
    ) {
        let writes = writes
            .iter()
            .map(|w| DescriptorWrite {
                dst_set: w.dst_set,
                dst_binding: w.dst_binding,
                descriptor_type: w.descriptor_type,
                image_views: unsafe { slice(w.p_image_info, w.descriptor_count) }
                    .iter()
                    .map(|i| i.image_view)
                    .collect(),
            })
            .collect();
        let copies = copies
            .iter()
            .map(|c| DescriptorCopy {
                src_set: c.src_set,
                src_binding: c.src_binding,
                src_array_element: c.src_array_element,
                dst_set: c.dst_set,
                dst_binding: c.dst_binding,
                dst_array_element: c.dst_array_element,
                descriptor_count: c.descriptor_count,
            })
            .collect();
        self.record(Call::UpdateDescriptorSets { writes, copies });
    }

    unsafe fn create_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> Result<vk::ShaderModule> {
        let words = info.code_size / 4;
        self.create("vkCreateShaderModule", |module| Call::CreateShaderModule {
            module,
            words,
        })
    }

    unsafe fn create_graphics_pipelines(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::GraphicsPipelineCreateInfo<'_>],
    ) -> Result<Vec<vk::Pipeline>> {
        let summaries: Vec<_> = infos.iter().map(|i| unsafe { summarize_graphics(i) }).collect();
        let mut state = self.state.lock();
        state.check("vkCreateGraphicsPipelines")?;
        let mut pipelines = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let pipeline = state.handle();
            state.calls.push(Call::CreateGraphicsPipeline {
                pipeline,
                cache,
                summary,
            });
            pipelines.push(pipeline);
        }
        Ok(pipelines)
    }

    unsafe fn create_compute_pipelines(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::ComputePipelineCreateInfo<'_>],
    ) -> Result<Vec<vk::Pipeline>> {
        let mut state = self.state.lock();
        state.check("vkCreateComputePipelines")?;
        let mut pipelines = Vec::with_capacity(infos.len());
        for info in infos {
            let pipeline = state.handle();
            state.calls.push(Call::CreateComputePipeline {
                pipeline,
                cache,
                layout: info.layout,
                stage: info.stage.stage,
            });
            pipelines.push(pipeline);
        }
        Ok(pipelines)
    }

    unsafe fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> Result<Vec<vk::CommandBuffer>> {
        let mut state = self.state.lock();
        state.check("vkAllocateCommandBuffers")?;
        let buffers: Vec<vk::CommandBuffer> = (0..info.command_buffer_count)
            .map(|_| state.handle())
            .collect();
        state.calls.push(Call::AllocateCommandBuffers {
            pool: info.command_pool,
            level: info.level,
            buffers: buffers.clone(),
        });
        Ok(buffers)
    }

    unsafe fn get_query_pool_results(
        &self,
        pool: vk::QueryPool,
        first_query: u32,
        data: &mut [u64],
        _flags: vk::QueryResultFlags,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.check("vkGetQueryPoolResults")?;
        for (dst, src) in data.iter_mut().zip(&state.query_results) {
            *dst = *src;
        }
        state.calls.push(Call::GetQueryPoolResults {
            pool,
            first_query,
            count: data.len(),
        });
        Ok(())
    }

    unsafe fn get_pipeline_cache_data(&self, cache: vk::PipelineCache) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.check("vkGetPipelineCacheData")?;
        state.calls.push(Call::GetPipelineCacheData(cache));
        Ok(state.pipeline_cache_data.clone())
    }

    unsafe fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        self.record(Call::FreeCommandBuffers {
            pool,
            buffers: buffers.to_vec(),
        });
    }

    unsafe fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.destroy(module);
    }

    unsafe fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.destroy(pipeline);
    }

    unsafe fn destroy_pipeline_cache(&self, cache: vk::PipelineCache) {
        self.destroy(cache);
    }

    unsafe fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.destroy(layout);
    }

    unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.destroy(layout);
    }

    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.destroy(pool);
    }

    unsafe fn destroy_query_pool(&self, pool: vk::QueryPool) {
        self.destroy(pool);
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.destroy(semaphore);
    }

    unsafe fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        _info: &vk::CommandBufferBeginInfo<'_>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.check("vkBeginCommandBuffer")?;
        state.calls.push(Call::BeginCommandBuffer(cmd));
        Ok(())
    }

    unsafe fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let mut state = self.state.lock();
        state.check("vkEndCommandBuffer")?;
        state.calls.push(Call::EndCommandBuffer(cmd));
        Ok(())
    }

    unsafe fn cmd_reset_query_pool(
        &self,
        cmd: vk::CommandBuffer,
        pool: vk::QueryPool,
        first_query: u32,
        query_count: u32,
    ) {
        self.record(Call::ResetQueryPool {
            cmd,
            pool,
            first_query,
            query_count,
        });
    }

    unsafe fn cmd_write_timestamp(
        &self,
        cmd: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    ) {
        self.record(Call::WriteTimestamp {
            cmd,
            stage,
            pool,
            query,
        });
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
        contents: vk::SubpassContents,
    ) {
        let clears = unsafe { slice(info.p_clear_values, info.clear_value_count) };
        // SAFETY: the forward pass clears a color attachment then a depth/stencil one.
        let clear_color = clears.first().map(|c| unsafe { c.color.float32 });
        let clear_depth_stencil = clears.get(1).map(|c| unsafe {
            (c.depth_stencil.depth, c.depth_stencil.stencil)
        });
        self.record(Call::BeginRenderPass {
            cmd,
            render_pass: info.render_pass,
            framebuffer: info.framebuffer,
            extent: info.render_area.extent,
            clear_color,
            clear_depth_stencil,
            contents,
        });
    }

    unsafe fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        self.record(Call::EndRenderPass(cmd));
    }

    unsafe fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewports: &[vk::Viewport]) {
        for v in viewports {
            self.record(Call::SetViewport {
                cmd,
                width: v.width,
                height: v.height,
                min_depth: v.min_depth,
                max_depth: v.max_depth,
            });
        }
    }

    unsafe fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissors: &[vk::Rect2D]) {
        for s in scissors {
            self.record(Call::SetScissor {
                cmd,
                extent: s.extent,
            });
        }
    }

    unsafe fn cmd_bind_pipeline(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        self.record(Call::BindPipeline {
            cmd,
            bind_point,
            pipeline,
        });
    }

    unsafe fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        self.record(Call::BindDescriptorSets {
            cmd,
            bind_point,
            layout,
            first_set,
            sets: sets.to_vec(),
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    unsafe fn cmd_bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        self.record(Call::BindVertexBuffers {
            cmd,
            first_binding,
            buffers: buffers.to_vec(),
            offsets: offsets.to_vec(),
        });
    }

    unsafe fn cmd_bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        self.record(Call::BindIndexBuffer {
            cmd,
            buffer,
            offset,
            index_type,
        });
    }

    unsafe fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.record(Call::DrawIndexed {
            cmd,
            index_count,
            instance_count,
        });
    }

    unsafe fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.record(Call::PushConstants {
            cmd,
            layout,
            stages,
            offset,
            data: data.to_vec(),
        });
    }

    unsafe fn cmd_dispatch(&self, cmd: vk::CommandBuffer, x: u32, y: u32, z: u32) {
        self.record(Call::Dispatch { cmd, x, y, z });
    }

    unsafe fn cmd_memory_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::MemoryBarrier<'_>,
    ) {
        self.record(Call::MemoryBarrier {
            cmd,
            src_stage,
            dst_stage,
            src_access: barrier.src_access_mask,
            dst_access: barrier.dst_access_mask,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_non_null() {
        let device = RecordingDevice::new();
        let info = vk::SemaphoreCreateInfo::default();
        let a = unsafe { device.create_semaphore(&info) }.unwrap();
        let b = unsafe { device.create_semaphore(&info) }.unwrap();
        assert_ne!(a, vk::Semaphore::null());
        assert_ne!(a, b);
    }

    #[test]
    fn injected_failure_names_the_call() {
        let device = RecordingDevice::new();
        device.fail_on("vkCreateQueryPool", vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let err = unsafe { device.create_query_pool(&vk::QueryPoolCreateInfo::default()) }
            .unwrap_err();
        assert!(matches!(
            err,
            GpuError::Vulkan {
                op: "vkCreateQueryPool",
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            }
        ));
        assert!(device.calls().is_empty());

        device.clear_failures();
        assert!(unsafe { device.create_query_pool(&vk::QueryPoolCreateInfo::default()) }.is_ok());
    }

    #[test]
    fn commands_are_grouped_by_buffer() {
        let device = RecordingDevice::new();
        let info = vk::CommandBufferAllocateInfo::default().command_buffer_count(2);
        let buffers = unsafe { device.allocate_command_buffers(&info) }.unwrap();
        unsafe {
            device.cmd_dispatch(buffers[0], 1, 1, 1);
            device.cmd_dispatch(buffers[1], 2, 2, 2);
            device.cmd_dispatch(buffers[0], 3, 3, 3);
        }
        let first = device.commands_for(buffers[0]);
        assert_eq!(first.len(), 2);
        assert!(matches!(first[1], Call::Dispatch { x: 3, .. }));
    }
}
