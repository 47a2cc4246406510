//! Descriptor set management.

use ash::vk;

use crate::device::RenderDevice;
use crate::error::Result;

/// Descriptor set layout builder.
pub struct DescriptorSetLayoutBuilder<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
}

impl<'a> DescriptorSetLayoutBuilder<'a> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Add a binding.
    pub fn binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        count: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(count)
                .stage_flags(stage_flags),
        );
        self
    }

    /// Add a storage image binding.
    pub fn storage_image(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::STORAGE_IMAGE, 1, stage_flags)
    }

    /// Add a sampled image binding (no sampler).
    pub fn sampled_image(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::SAMPLED_IMAGE, 1, stage_flags)
    }

    /// Bindings added so far.
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding<'a>] {
        &self.bindings
    }

    /// One pool size entry per binding, each scaled by `sets`.
    ///
    /// A pool created from these sizes with `max_sets = sets` holds exactly
    /// `sets` sets of this layout.
    pub fn pool_sizes(&self, sets: u32) -> Vec<vk::DescriptorPoolSize> {
        self.bindings
            .iter()
            .map(|b| {
                vk::DescriptorPoolSize::default()
                    .ty(b.descriptor_type)
                    .descriptor_count(b.descriptor_count * sets)
            })
            .collect()
    }

    /// Build the descriptor set layout.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn build<D: RenderDevice + ?Sized>(
        &self,
        device: &D,
    ) -> Result<vk::DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&self.bindings);
        device.create_descriptor_set_layout(&layout_info)
    }
}

impl Default for DescriptorSetLayoutBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a descriptor pool whose sets are never freed individually.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_descriptor_pool<D: RenderDevice + ?Sized>(
    device: &D,
    max_sets: u32,
    pool_sizes: &[vk::DescriptorPoolSize],
) -> Result<vk::DescriptorPool> {
    let create_info = vk::DescriptorPoolCreateInfo::default()
        .max_sets(max_sets)
        .pool_sizes(pool_sizes);

    device.create_descriptor_pool(&create_info)
}

/// Allocate `count` descriptor sets of one layout.
///
/// # Safety
/// The device, pool, and layout must be valid.
pub unsafe fn allocate_descriptor_sets<D: RenderDevice + ?Sized>(
    device: &D,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
    count: u32,
) -> Result<Vec<vk::DescriptorSet>> {
    let layouts = vec![layout; count as usize];
    let alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool)
        .set_layouts(&layouts);

    device.allocate_descriptor_sets(&alloc_info)
}

/// Write a storage image descriptor.
///
/// # Safety
/// Device and image view must be valid.
pub unsafe fn write_storage_image<D: RenderDevice + ?Sized>(
    device: &D,
    dst_set: vk::DescriptorSet,
    binding: u32,
    image_info: &vk::DescriptorImageInfo,
) {
    let write = vk::WriteDescriptorSet::default()
        .dst_set(dst_set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
        .image_info(std::slice::from_ref(image_info));

    device.update_descriptor_sets(&[write], &[]);
}

/// Describe a copy of one descriptor from `src_set` into element 0 of `dst_binding`.
pub fn copy_descriptor(
    src_set: vk::DescriptorSet,
    src_binding: u32,
    src_array_element: u32,
    dst_set: vk::DescriptorSet,
    dst_binding: u32,
) -> vk::CopyDescriptorSet<'static> {
    vk::CopyDescriptorSet::default()
        .src_set(src_set)
        .src_binding(src_binding)
        .src_array_element(src_array_element)
        .dst_set(dst_set)
        .dst_binding(dst_binding)
        .dst_array_element(0)
        .descriptor_count(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_sizes_scale_with_set_count() {
        let builder = DescriptorSetLayoutBuilder::new()
            .sampled_image(0, vk::ShaderStageFlags::FRAGMENT)
            .storage_image(1, vk::ShaderStageFlags::COMPUTE);
        let sizes = builder.pool_sizes(6);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::SAMPLED_IMAGE);
        assert_eq!(sizes[0].descriptor_count, 6);
        assert_eq!(sizes[1].ty, vk::DescriptorType::STORAGE_IMAGE);
    }

    #[test]
    fn copy_targets_first_element() {
        let copy = copy_descriptor(
            vk::DescriptorSet::null(),
            4,
            17,
            vk::DescriptorSet::null(),
            2,
        );
        assert_eq!(copy.src_binding, 4);
        assert_eq!(copy.src_array_element, 17);
        assert_eq!(copy.dst_binding, 2);
        assert_eq!(copy.dst_array_element, 0);
        assert_eq!(copy.descriptor_count, 1);
    }
}
