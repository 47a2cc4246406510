//! The render stage object and its construction protocol.
//!
//! A [`RenderStage`] owns every GPU object one pass needs. Construction runs
//! in two steps:
//!
//! 1. [`ResourcePoolBuilder`] creates layouts, pools, sets, the pipeline
//!    cache, pipelines, the query pool, and semaphores. Each step skips
//!    objects that already exist, so constructing an existing stage again
//!    creates nothing and a retry after a failed build does not leak.
//! 2. The stage's [`StageParams`] record one command buffer per output
//!    target. Only this step runs again on [`RenderStage::rebuild`].
//!
//! ```text
//! Uninitialized --build--> ResourcesBuilt --record--> CommandsRecorded
//!                                                      |        ^
//!                                                      +-rebuild+
//! ```

use ash::vk;
use conetrace_core::constants::{QUERY_SLOT_COUNT, TIMESTAMP_END_SLOT, TIMESTAMP_START_SLOT};
use conetrace_gpu::{
    allocate_command_buffers, allocate_descriptor_sets, begin_command_buffer,
    create_descriptor_pool, create_semaphores, create_timestamp_query_pool, end_command_buffer,
    free_command_buffers, DescriptorSetLayoutBuilder, GpuError, RenderDevice, Result,
    TimestampPair,
};

use crate::forward::ForwardParams;
use crate::mesh::Mesh;
use crate::post_voxelize::PostVoxelizeParams;

/// Construction progress of a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageState {
    /// No resources exist yet.
    Uninitialized,
    /// Resources exist; the command buffer list is empty.
    ResourcesBuilt,
    /// One command buffer per output target has been recorded.
    CommandsRecorded,
}

/// Which pass a stage implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Forward,
    PostVoxelize,
}

/// GPU objects owned by a stage.
///
/// Every handle is either null or valid and owned by the stage alone.
#[derive(Clone, Debug, Default)]
pub struct StageResources {
    pub pipeline_cache: vk::PipelineCache,
    pub pipelines: Vec<vk::Pipeline>,
    pub pipeline_layout: vk::PipelineLayout,
    pub descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    pub descriptor_pool: vk::DescriptorPool,
    pub descriptor_sets: Vec<vk::DescriptorSet>,
    pub query_pool: vk::QueryPool,
    /// Readback buffer, one value per query slot.
    pub query_results: Vec<u64>,
    pub semaphores: Vec<vk::Semaphore>,
    /// Output targets the descriptor sets were allocated for.
    pub target_capacity: u32,
    /// Per-draw sets reserved for each target; zero when the stage has none.
    pub draw_budget: u32,
}

impl StageResources {
    /// The stage's pipeline.
    pub fn pipeline(&self) -> Result<vk::Pipeline> {
        self.pipelines
            .first()
            .copied()
            .ok_or_else(|| GpuError::InvalidState("stage has no pipeline".to_string()))
    }
}

/// Idempotent resource creation for one stage.
pub struct ResourcePoolBuilder<'a, D: RenderDevice + ?Sized> {
    device: &'a D,
    resources: &'a mut StageResources,
}

impl<'a, D: RenderDevice + ?Sized> ResourcePoolBuilder<'a, D> {
    pub fn new(device: &'a D, resources: &'a mut StageResources) -> Self {
        Self { device, resources }
    }

    /// Timestamp query pool with `slots` queries and a matching readback buffer.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn query_pool(&mut self, slots: u32) -> Result<()> {
        if self.resources.query_pool == vk::QueryPool::null() {
            self.resources.query_pool = create_timestamp_query_pool(self.device, slots)?;
            self.resources.query_results = vec![0; slots as usize];
            tracing::debug!(slots, "query pool created");
        }
        Ok(())
    }

    /// Pipeline cache, optionally seeded from a previous run.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn pipeline_cache(&mut self, initial_data: &[u8]) -> Result<()> {
        if self.resources.pipeline_cache == vk::PipelineCache::null() {
            let create_info = vk::PipelineCacheCreateInfo::default().initial_data(initial_data);
            self.resources.pipeline_cache = self.device.create_pipeline_cache(&create_info)?;
            tracing::debug!(seed_bytes = initial_data.len(), "pipeline cache created");
        }
        Ok(())
    }

    /// `count` binary semaphores.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn semaphores(&mut self, count: usize) -> Result<()> {
        if self.resources.semaphores.is_empty() {
            self.resources.semaphores = create_semaphores(self.device, count)?;
            tracing::debug!(count, "semaphores created");
        }
        Ok(())
    }

    /// The stage's own descriptor set layouts.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn descriptor_set_layouts(
        &mut self,
        builders: &[DescriptorSetLayoutBuilder<'_>],
    ) -> Result<()> {
        if !self.resources.descriptor_set_layouts.is_empty() {
            return Ok(());
        }
        let mut layouts = Vec::with_capacity(builders.len());
        for builder in builders {
            match builder.build(self.device) {
                Ok(layout) => layouts.push(layout),
                Err(e) => {
                    for layout in layouts {
                        self.device.destroy_descriptor_set_layout(layout);
                    }
                    return Err(e);
                }
            }
        }
        tracing::debug!(count = layouts.len(), "descriptor set layouts created");
        self.resources.descriptor_set_layouts = layouts;
        Ok(())
    }

    /// Pipeline layout over `external_layouts` followed by the stage's own layouts.
    ///
    /// # Safety
    /// The device and external layouts must be valid.
    pub unsafe fn pipeline_layout(
        &mut self,
        external_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> Result<()> {
        if self.resources.pipeline_layout != vk::PipelineLayout::null() {
            return Ok(());
        }
        let set_layouts: Vec<_> = external_layouts
            .iter()
            .chain(&self.resources.descriptor_set_layouts)
            .copied()
            .collect();
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(push_constant_ranges);
        self.resources.pipeline_layout = self.device.create_pipeline_layout(&create_info)?;
        tracing::debug!(sets = set_layouts.len(), "pipeline layout created");
        Ok(())
    }

    /// Descriptor pool for `max_sets` sets, partitioned into `target_capacity`
    /// targets of `draw_budget` sets each.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn descriptor_pool(
        &mut self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
        target_capacity: u32,
        draw_budget: u32,
    ) -> Result<()> {
        if self.resources.descriptor_pool == vk::DescriptorPool::null() {
            self.resources.descriptor_pool =
                create_descriptor_pool(self.device, max_sets, pool_sizes)?;
            self.resources.target_capacity = target_capacity;
            self.resources.draw_budget = draw_budget;
            tracing::debug!(max_sets, target_capacity, draw_budget, "descriptor pool created");
        }
        Ok(())
    }

    /// Allocate `count` sets of the stage's first layout.
    ///
    /// Returns whether the sets were allocated by this call.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn descriptor_sets(&mut self, count: u32) -> Result<bool> {
        if !self.resources.descriptor_sets.is_empty() {
            return Ok(false);
        }
        let layout = self
            .resources
            .descriptor_set_layouts
            .first()
            .copied()
            .ok_or_else(|| GpuError::InvalidState("no descriptor set layout".to_string()))?;
        self.resources.descriptor_sets = allocate_descriptor_sets(
            self.device,
            self.resources.descriptor_pool,
            layout,
            count,
        )?;
        tracing::debug!(count, "descriptor sets allocated");
        Ok(true)
    }

    /// The stage's pipeline, created by `create` against the stage's cache and layout.
    ///
    /// # Safety
    /// The device must be valid and `create` must return a pipeline owned by it.
    pub unsafe fn pipeline(
        &mut self,
        create: impl FnOnce(&D, vk::PipelineCache, vk::PipelineLayout) -> Result<vk::Pipeline>,
    ) -> Result<()> {
        if self.resources.pipelines.is_empty() {
            let pipeline = create(
                self.device,
                self.resources.pipeline_cache,
                self.resources.pipeline_layout,
            )?;
            self.resources.pipelines.push(pipeline);
            tracing::debug!("pipeline created");
        }
        Ok(())
    }
}

/// What a recording pass needs besides the stage's own resources.
#[derive(Clone, Copy, Debug)]
pub struct RecordContext {
    /// Pool command buffers are allocated from and freed back to.
    pub command_pool: vk::CommandPool,
    /// Swapchain extent; sets the render area, viewport, and scissor.
    pub extent: vk::Extent2D,
}

/// Records a stage's command buffers.
pub trait CommandRecorder {
    /// Record one primary command buffer per output target.
    ///
    /// # Safety
    /// The device, every handle in `resources`, and every target must be valid.
    unsafe fn record<D: RenderDevice + ?Sized>(
        &self,
        device: &D,
        resources: &StageResources,
        ctx: &RecordContext,
        targets: &[vk::Framebuffer],
    ) -> Result<Vec<vk::CommandBuffer>>;
}

/// Per-variant parameter block.
#[derive(Clone, Debug)]
pub enum StageParams {
    Forward(ForwardParams),
    PostVoxelize(PostVoxelizeParams),
}

impl StageParams {
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Forward(_) => StageKind::Forward,
            Self::PostVoxelize(_) => StageKind::PostVoxelize,
        }
    }
}

impl CommandRecorder for StageParams {
    unsafe fn record<D: RenderDevice + ?Sized>(
        &self,
        device: &D,
        resources: &StageResources,
        ctx: &RecordContext,
        targets: &[vk::Framebuffer],
    ) -> Result<Vec<vk::CommandBuffer>> {
        match self {
            Self::Forward(params) => params.record(device, resources, ctx, targets),
            Self::PostVoxelize(params) => params.record(device, resources, ctx, targets),
        }
    }
}

/// Allocate `count` primary command buffers and record each with `body`.
///
/// Every buffer is begun, has its query range reset and start timestamp
/// written, then is handed to `body`, which must write the end timestamp
/// and finish any pass it opened. On failure all buffers are freed.
///
/// # Safety
/// The device, command pool, and query pool must be valid.
pub(crate) unsafe fn record_each<D: RenderDevice + ?Sized>(
    device: &D,
    ctx: &RecordContext,
    query_pool: vk::QueryPool,
    count: u32,
    mut body: impl FnMut(u32, vk::CommandBuffer) -> Result<()>,
) -> Result<Vec<vk::CommandBuffer>> {
    let buffers = allocate_command_buffers(
        device,
        ctx.command_pool,
        vk::CommandBufferLevel::PRIMARY,
        count,
    )?;

    for (index, &cmd) in (0u32..).zip(&buffers) {
        let result = begin_command_buffer(device, cmd)
            .and_then(|()| {
                device.cmd_reset_query_pool(cmd, query_pool, 0, QUERY_SLOT_COUNT);
                device.cmd_write_timestamp(
                    cmd,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    query_pool,
                    TIMESTAMP_START_SLOT,
                );
                body(index, cmd)
            })
            .and_then(|()| end_command_buffer(device, cmd));

        if let Err(e) = result {
            free_command_buffers(device, ctx.command_pool, &buffers);
            return Err(e);
        }
        tracing::trace!(index, "command buffer recorded");
    }

    Ok(buffers)
}

/// Write the end timestamp after all prior work in `cmd`.
///
/// # Safety
/// The device, command buffer, and query pool must be valid.
pub(crate) unsafe fn write_end_timestamp<D: RenderDevice + ?Sized>(
    device: &D,
    cmd: vk::CommandBuffer,
    query_pool: vk::QueryPool,
) {
    device.cmd_write_timestamp(
        cmd,
        vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        query_pool,
        TIMESTAMP_END_SLOT,
    );
}

/// One GPU pass: its resources, parameters, and recorded command buffers.
#[derive(Debug)]
pub struct RenderStage {
    kind: StageKind,
    state: StageState,
    resources: StageResources,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    params: Option<StageParams>,
}

impl RenderStage {
    /// An empty stage of `kind`.
    pub fn new(kind: StageKind) -> Self {
        Self {
            kind,
            state: StageState::Uninitialized,
            resources: StageResources::default(),
            command_pool: vk::CommandPool::null(),
            command_buffers: Vec::new(),
            params: None,
        }
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn resources(&self) -> &StageResources {
        &self.resources
    }

    /// One command buffer per output target, in target order.
    pub fn command_buffers(&self) -> &[vk::CommandBuffer] {
        &self.command_buffers
    }

    /// Semaphores the orchestrator wires between stages.
    pub fn semaphores(&self) -> &[vk::Semaphore] {
        &self.resources.semaphores
    }

    pub fn params(&self) -> Option<&StageParams> {
        self.params.as_ref()
    }

    pub(crate) fn expect_kind(&self, kind: StageKind) -> Result<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(GpuError::InvalidState(format!(
                "{:?} stage constructed as {kind:?}",
                self.kind
            )))
        }
    }

    pub(crate) fn builder<'a, D: RenderDevice + ?Sized>(
        &'a mut self,
        device: &'a D,
    ) -> ResourcePoolBuilder<'a, D> {
        ResourcePoolBuilder::new(device, &mut self.resources)
    }

    pub(crate) fn resources_built(&mut self, params: StageParams) {
        if self.state == StageState::Uninitialized {
            self.state = StageState::ResourcesBuilt;
            tracing::info!(kind = ?self.kind, "stage resources built");
        }
        self.params = Some(params);
    }

    /// Free the current command buffers and record a new list.
    ///
    /// Only the command buffer list changes; every other handle stays the
    /// same. A failed recording leaves the stage in
    /// [`StageState::ResourcesBuilt`] with no command buffers.
    ///
    /// # Safety
    /// The device, command pool, and targets must be valid and none of the
    /// current command buffers may be pending execution.
    pub unsafe fn rebuild<D: RenderDevice + ?Sized>(
        &mut self,
        device: &D,
        ctx: &RecordContext,
        targets: &[vk::Framebuffer],
    ) -> Result<()> {
        if self.state == StageState::Uninitialized {
            return Err(GpuError::InvalidState(
                "stage rebuilt before its resources were built".to_string(),
            ));
        }
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("stage has no parameters".to_string()))?;

        let old = std::mem::take(&mut self.command_buffers);
        free_command_buffers(device, self.command_pool, &old);
        self.state = StageState::ResourcesBuilt;

        let buffers = params.record(device, &self.resources, ctx, targets)?;
        tracing::info!(
            kind = ?self.kind,
            command_buffers = buffers.len(),
            "stage commands recorded"
        );
        self.command_buffers = buffers;
        self.command_pool = ctx.command_pool;
        self.state = StageState::CommandsRecorded;
        Ok(())
    }

    /// Swap the forward stage's meshes and re-record.
    ///
    /// # Safety
    /// Same as [`RenderStage::rebuild`]; the meshes' buffers must be valid.
    pub unsafe fn replace_meshes<D: RenderDevice + ?Sized>(
        &mut self,
        device: &D,
        meshes: Vec<Mesh>,
        ctx: &RecordContext,
        targets: &[vk::Framebuffer],
    ) -> Result<()> {
        match self.params.as_mut() {
            Some(StageParams::Forward(params)) => params.meshes = meshes,
            _ => {
                return Err(GpuError::InvalidState(format!(
                    "{:?} stage has no meshes",
                    self.kind
                )))
            }
        }
        self.rebuild(device, ctx, targets)
    }

    /// Read the last completed start and end timestamps.
    ///
    /// Blocks until the queries are available.
    ///
    /// # Safety
    /// The device must be valid and a command buffer of this stage must have
    /// been submitted.
    pub unsafe fn read_timestamps<D: RenderDevice + ?Sized>(
        &mut self,
        device: &D,
    ) -> Result<TimestampPair> {
        let pool = self.resources.query_pool;
        if pool == vk::QueryPool::null() {
            return Err(GpuError::InvalidState("stage has no query pool".to_string()));
        }
        let results = &mut self.resources.query_results;
        let read = (TIMESTAMP_END_SLOT + 1) as usize;
        device.get_query_pool_results(
            pool,
            0,
            &mut results[..read],
            vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WAIT,
        )?;
        Ok(TimestampPair {
            start: results[TIMESTAMP_START_SLOT as usize],
            end: results[TIMESTAMP_END_SLOT as usize],
        })
    }

    /// Contents of the pipeline cache, for seeding the next run.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn pipeline_cache_data<D: RenderDevice + ?Sized>(
        &self,
        device: &D,
    ) -> Result<Vec<u8>> {
        if self.resources.pipeline_cache == vk::PipelineCache::null() {
            return Err(GpuError::InvalidState("stage has no pipeline cache".to_string()));
        }
        device.get_pipeline_cache_data(self.resources.pipeline_cache)
    }

    /// Release every owned object and return to [`StageState::Uninitialized`].
    ///
    /// # Safety
    /// The device must be valid and no command buffer of this stage may be
    /// pending execution.
    pub unsafe fn destroy<D: RenderDevice + ?Sized>(&mut self, device: &D) {
        let buffers = std::mem::take(&mut self.command_buffers);
        free_command_buffers(device, self.command_pool, &buffers);

        let resources = std::mem::take(&mut self.resources);
        for pipeline in resources.pipelines {
            device.destroy_pipeline(pipeline);
        }
        if resources.pipeline_cache != vk::PipelineCache::null() {
            device.destroy_pipeline_cache(resources.pipeline_cache);
        }
        if resources.pipeline_layout != vk::PipelineLayout::null() {
            device.destroy_pipeline_layout(resources.pipeline_layout);
        }
        // Sets go with their pool.
        if resources.descriptor_pool != vk::DescriptorPool::null() {
            device.destroy_descriptor_pool(resources.descriptor_pool);
        }
        for layout in resources.descriptor_set_layouts {
            device.destroy_descriptor_set_layout(layout);
        }
        if resources.query_pool != vk::QueryPool::null() {
            device.destroy_query_pool(resources.query_pool);
        }
        for semaphore in resources.semaphores {
            device.destroy_semaphore(semaphore);
        }

        self.command_pool = vk::CommandPool::null();
        self.params = None;
        self.state = StageState::Uninitialized;
        tracing::info!(kind = ?self.kind, "stage destroyed");
    }
}
