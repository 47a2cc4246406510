//! The device seam render stages record through.
//!
//! [`RenderDevice`] is the subset of `VkDevice` that resource building and
//! command recording use. The `ash::Device` implementation forwards every
//! call and tags failures with the name of the Vulkan entry point, so a
//! failed construction or rebuild reports exactly which call went wrong.

use ash::vk;

use crate::error::{GpuError, Result};

/// Device operations used by render stages.
///
/// # Safety
/// Every method has the safety contract of the Vulkan call it wraps: handles
/// must be valid, owned by this device, and externally synchronized.
pub trait RenderDevice {
    // Object creation

    unsafe fn create_query_pool(&self, info: &vk::QueryPoolCreateInfo<'_>)
        -> Result<vk::QueryPool>;

    unsafe fn create_pipeline_cache(
        &self,
        info: &vk::PipelineCacheCreateInfo<'_>,
    ) -> Result<vk::PipelineCache>;

    unsafe fn create_semaphore(&self, info: &vk::SemaphoreCreateInfo<'_>) -> Result<vk::Semaphore>;

    unsafe fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout>;

    unsafe fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> Result<vk::PipelineLayout>;

    unsafe fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> Result<vk::DescriptorPool>;

    unsafe fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> Result<Vec<vk::DescriptorSet>>;

    unsafe fn update_descriptor_sets(
        &self,
        writes: &[vk::WriteDescriptorSet<'_>],
        copies: &[vk::CopyDescriptorSet<'_>],
    );

    unsafe fn create_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> Result<vk::ShaderModule>;

    unsafe fn create_graphics_pipelines(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::GraphicsPipelineCreateInfo<'_>],
    ) -> Result<Vec<vk::Pipeline>>;

    unsafe fn create_compute_pipelines(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::ComputePipelineCreateInfo<'_>],
    ) -> Result<Vec<vk::Pipeline>>;

    unsafe fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> Result<Vec<vk::CommandBuffer>>;

    // Queries

    unsafe fn get_query_pool_results(
        &self,
        pool: vk::QueryPool,
        first_query: u32,
        data: &mut [u64],
        flags: vk::QueryResultFlags,
    ) -> Result<()>;

    unsafe fn get_pipeline_cache_data(&self, cache: vk::PipelineCache) -> Result<Vec<u8>>;

    // Destruction

    unsafe fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);
    unsafe fn destroy_shader_module(&self, module: vk::ShaderModule);
    unsafe fn destroy_pipeline(&self, pipeline: vk::Pipeline);
    unsafe fn destroy_pipeline_cache(&self, cache: vk::PipelineCache);
    unsafe fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    unsafe fn destroy_query_pool(&self, pool: vk::QueryPool);
    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    // Command recording

    unsafe fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> Result<()>;

    unsafe fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()>;

    unsafe fn cmd_reset_query_pool(
        &self,
        cmd: vk::CommandBuffer,
        pool: vk::QueryPool,
        first_query: u32,
        query_count: u32,
    );

    unsafe fn cmd_write_timestamp(
        &self,
        cmd: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    );

    unsafe fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
        contents: vk::SubpassContents,
    );

    unsafe fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);

    unsafe fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewports: &[vk::Viewport]);

    unsafe fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissors: &[vk::Rect2D]);

    unsafe fn cmd_bind_pipeline(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    );

    unsafe fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    );

    unsafe fn cmd_bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    );

    unsafe fn cmd_bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    );

    unsafe fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    unsafe fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    unsafe fn cmd_dispatch(&self, cmd: vk::CommandBuffer, x: u32, y: u32, z: u32);

    unsafe fn cmd_memory_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::MemoryBarrier<'_>,
    );
}

impl RenderDevice for ash::Device {
    unsafe fn create_query_pool(
        &self,
        info: &vk::QueryPoolCreateInfo<'_>,
    ) -> Result<vk::QueryPool> {
        ash::Device::create_query_pool(self, info, None)
            .map_err(|e| GpuError::vulkan("vkCreateQueryPool", e))
    }

    unsafe fn create_pipeline_cache(
        &self,
        info: &vk::PipelineCacheCreateInfo<'_>,
    ) -> Result<vk::PipelineCache> {
        ash::Device::create_pipeline_cache(self, info, None)
            .map_err(|e| GpuError::vulkan("vkCreatePipelineCache", e))
    }

    unsafe fn create_semaphore(&self, info: &vk::SemaphoreCreateInfo<'_>) -> Result<vk::Semaphore> {
        ash::Device::create_semaphore(self, info, None)
            .map_err(|e| GpuError::vulkan("vkCreateSemaphore", e))
    }

    unsafe fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout> {
        ash::Device::create_descriptor_set_layout(self, info, None)
            .map_err(|e| GpuError::vulkan("vkCreateDescriptorSetLayout", e))
    }

    unsafe fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> Result<vk::PipelineLayout> {
        ash::Device::create_pipeline_layout(self, info, None)
            .map_err(|e| GpuError::vulkan("vkCreatePipelineLayout", e))
    }

    unsafe fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> Result<vk::DescriptorPool> {
        ash::Device::create_descriptor_pool(self, info, None)
            .map_err(|e| GpuError::vulkan("vkCreateDescriptorPool", e))
    }

    unsafe fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> Result<Vec<vk::DescriptorSet>> {
        ash::Device::allocate_descriptor_sets(self, info)
            .map_err(|e| GpuError::vulkan("vkAllocateDescriptorSets", e))
    }

    unsafe fn update_descriptor_sets(
        &self,
        writes: &[vk::WriteDescriptorSet<'_>],
        copies: &[vk::CopyDescriptorSet<'_>],
    ) {
        ash::Device::update_descriptor_sets(self, writes, copies);
    }

    unsafe fn create_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> Result<vk::ShaderModule> {
        ash::Device::create_shader_module(self, info, None)
            .map_err(|e| GpuError::vulkan("vkCreateShaderModule", e))
    }

    unsafe fn create_graphics_pipelines(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::GraphicsPipelineCreateInfo<'_>],
    ) -> Result<Vec<vk::Pipeline>> {
        ash::Device::create_graphics_pipelines(self, cache, infos, None)
            .map_err(|(_pipelines, e)| GpuError::vulkan("vkCreateGraphicsPipelines", e))
    }

    unsafe fn create_compute_pipelines(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::ComputePipelineCreateInfo<'_>],
    ) -> Result<Vec<vk::Pipeline>> {
        ash::Device::create_compute_pipelines(self, cache, infos, None)
            .map_err(|(_pipelines, e)| GpuError::vulkan("vkCreateComputePipelines", e))
    }

    unsafe fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> Result<Vec<vk::CommandBuffer>> {
        ash::Device::allocate_command_buffers(self, info)
            .map_err(|e| GpuError::vulkan("vkAllocateCommandBuffers", e))
    }

    unsafe fn get_query_pool_results(
        &self,
        pool: vk::QueryPool,
        first_query: u32,
        data: &mut [u64],
        flags: vk::QueryResultFlags,
    ) -> Result<()> {
        ash::Device::get_query_pool_results(self, pool, first_query, data, flags)
            .map_err(|e| GpuError::vulkan("vkGetQueryPoolResults", e))
    }

    unsafe fn get_pipeline_cache_data(&self, cache: vk::PipelineCache) -> Result<Vec<u8>> {
        ash::Device::get_pipeline_cache_data(self, cache)
            .map_err(|e| GpuError::vulkan("vkGetPipelineCacheData", e))
    }

    unsafe fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        ash::Device::free_command_buffers(self, pool, buffers);
    }

    unsafe fn destroy_shader_module(&self, module: vk::ShaderModule) {
        ash::Device::destroy_shader_module(self, module, None);
    }

    unsafe fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        ash::Device::destroy_pipeline(self, pipeline, None);
    }

    unsafe fn destroy_pipeline_cache(&self, cache: vk::PipelineCache) {
        ash::Device::destroy_pipeline_cache(self, cache, None);
    }

    unsafe fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        ash::Device::destroy_pipeline_layout(self, layout, None);
    }

    unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        ash::Device::destroy_descriptor_set_layout(self, layout, None);
    }

    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        ash::Device::destroy_descriptor_pool(self, pool, None);
    }

    unsafe fn destroy_query_pool(&self, pool: vk::QueryPool) {
        ash::Device::destroy_query_pool(self, pool, None);
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        ash::Device::destroy_semaphore(self, semaphore, None);
    }

    unsafe fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> Result<()> {
        ash::Device::begin_command_buffer(self, cmd, info)
            .map_err(|e| GpuError::vulkan("vkBeginCommandBuffer", e))
    }

    unsafe fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        ash::Device::end_command_buffer(self, cmd)
            .map_err(|e| GpuError::vulkan("vkEndCommandBuffer", e))
    }

    unsafe fn cmd_reset_query_pool(
        &self,
        cmd: vk::CommandBuffer,
        pool: vk::QueryPool,
        first_query: u32,
        query_count: u32,
    ) {
        ash::Device::cmd_reset_query_pool(self, cmd, pool, first_query, query_count);
    }

    unsafe fn cmd_write_timestamp(
        &self,
        cmd: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    ) {
        ash::Device::cmd_write_timestamp(self, cmd, stage, pool, query);
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
        contents: vk::SubpassContents,
    ) {
        ash::Device::cmd_begin_render_pass(self, cmd, info, contents);
    }

    unsafe fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        ash::Device::cmd_end_render_pass(self, cmd);
    }

    unsafe fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewports: &[vk::Viewport]) {
        ash::Device::cmd_set_viewport(self, cmd, 0, viewports);
    }

    unsafe fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissors: &[vk::Rect2D]) {
        ash::Device::cmd_set_scissor(self, cmd, 0, scissors);
    }

    unsafe fn cmd_bind_pipeline(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        ash::Device::cmd_bind_pipeline(self, cmd, bind_point, pipeline);
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
        ash::Device::cmd_bind_descriptor_sets(
            self,
            cmd,
            bind_point,
            layout,
            first_set,
            sets,
            dynamic_offsets,
        );
    }

    unsafe fn cmd_bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        ash::Device::cmd_bind_vertex_buffers(self, cmd, first_binding, buffers, offsets);
    }

    unsafe fn cmd_bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        ash::Device::cmd_bind_index_buffer(self, cmd, buffer, offset, index_type);
    }

    unsafe fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        ash::Device::cmd_draw_indexed(
            self,
            cmd,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
    }

    unsafe fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        ash::Device::cmd_push_constants(self, cmd, layout, stages, offset, data);
    }

    unsafe fn cmd_dispatch(&self, cmd: vk::CommandBuffer, x: u32, y: u32, z: u32) {
        ash::Device::cmd_dispatch(self, cmd, x, y, z);
    }

    unsafe fn cmd_memory_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::MemoryBarrier<'_>,
    ) {
        ash::Device::cmd_pipeline_barrier(
            self,
            cmd,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            std::slice::from_ref(barrier),
            &[],
            &[],
        );
    }
}
