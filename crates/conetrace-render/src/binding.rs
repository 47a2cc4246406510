//! Descriptor binding strategies.
//!
//! Stages bind descriptors one of two ways:
//!
//! - **Static**: one externally owned set, bound once per command buffer at
//!   set index 0.
//! - **Dynamic per-draw**: a pre-allocated array of sets partitioned by
//!   output target. Every draw claims the next set of its target's partition,
//!   copies its material textures into it from the static set, and binds it
//!   at set index 1. Slot `j` of target `i` lives at `i * budget + j`.

use ash::vk;
use conetrace_core::TextureRole;
use conetrace_gpu::{copy_descriptor, GpuError, RenderDevice, Result};

use crate::mesh::Submesh;

/// Set index the static set is bound at.
pub const STATIC_SET_INDEX: u32 = 0;
/// Set index per-draw sets are bound at.
pub const DYNAMIC_SET_INDEX: u32 = 1;

/// The externally owned descriptor set holding the scene's image array.
///
/// Stages only read from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticDescriptorSet {
    pub set: vk::DescriptorSet,
    /// Layout the set was allocated with; stage pipeline layouts include it at index 0.
    pub layout: vk::DescriptorSetLayout,
    /// Binding of the image array textures are copied from.
    pub image_binding: u32,
    /// Offsets for the set's dynamic buffers, passed on every bind.
    pub dynamic_offsets: Vec<u32>,
}

impl StaticDescriptorSet {
    pub fn new(
        set: vk::DescriptorSet,
        layout: vk::DescriptorSetLayout,
        image_binding: u32,
    ) -> Self {
        Self {
            set,
            layout,
            image_binding,
            dynamic_offsets: Vec::new(),
        }
    }

    /// Set the dynamic offsets used when binding.
    pub fn with_dynamic_offsets(mut self, offsets: Vec<u32>) -> Self {
        self.dynamic_offsets = offsets;
        self
    }

    /// Bind at [`STATIC_SET_INDEX`].
    ///
    /// # Safety
    /// The device, command buffer, layout, and set must be valid, and the
    /// command buffer must be recording.
    pub unsafe fn bind<D: RenderDevice + ?Sized>(
        &self,
        device: &D,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
    ) {
        device.cmd_bind_descriptor_sets(
            cmd,
            bind_point,
            layout,
            STATIC_SET_INDEX,
            std::slice::from_ref(&self.set),
            &self.dynamic_offsets,
        );
    }

    /// Copies of `submesh`'s material textures into `dst`, one per role.
    ///
    /// Each role's texture lands in element 0 of the binding equal to the
    /// role's index.
    pub fn texture_copies(
        &self,
        submesh: &Submesh,
        dst: vk::DescriptorSet,
    ) -> [vk::CopyDescriptorSet<'static>; TextureRole::COUNT] {
        TextureRole::ALL.map(|role| {
            copy_descriptor(
                self.set,
                self.image_binding,
                submesh.texture_index(role),
                dst,
                role.index() as u32,
            )
        })
    }
}

/// Flat index of draw `draw` of target `target`.
#[inline]
pub const fn slot_index(target: u32, draw: u32, budget: u32) -> usize {
    target as usize * budget as usize + draw as usize
}

/// The pre-allocated per-draw sets of a stage.
#[derive(Clone, Copy, Debug)]
pub struct DynamicDescriptorSlots<'a> {
    sets: &'a [vk::DescriptorSet],
    budget: u32,
}

impl<'a> DynamicDescriptorSlots<'a> {
    pub fn new(sets: &'a [vk::DescriptorSet], budget: u32) -> Self {
        Self { sets, budget }
    }

    /// Number of targets the sets are partitioned for.
    pub fn target_capacity(&self) -> u32 {
        if self.budget == 0 {
            0
        } else {
            (self.sets.len() / self.budget as usize) as u32
        }
    }

    /// Start claiming from `target`'s partition.
    pub fn for_target(&self, target: u32) -> Result<TargetSlots<'a>> {
        let capacity = self.target_capacity();
        if target >= capacity {
            return Err(GpuError::TargetCapacityExceeded {
                requested: target + 1,
                capacity,
            });
        }
        let start = slot_index(target, 0, self.budget);
        let end = slot_index(target + 1, 0, self.budget);
        Ok(TargetSlots {
            sets: &self.sets[start..end],
            target,
            budget: self.budget,
            claimed: 0,
        })
    }
}

/// Claims sets from one target's partition in draw order.
///
/// A fresh cursor starts at the partition's first slot, so no slot is
/// handed out twice within one recording of a target.
#[derive(Debug)]
pub struct TargetSlots<'a> {
    sets: &'a [vk::DescriptorSet],
    target: u32,
    budget: u32,
    claimed: u32,
}

impl TargetSlots<'_> {
    /// Claim the next set.
    pub fn claim(&mut self) -> Result<vk::DescriptorSet> {
        let set = self
            .sets
            .get(self.claimed as usize)
            .copied()
            .ok_or(GpuError::DescriptorBudgetExceeded {
                target: self.target,
                draws: self.claimed + 1,
                budget: self.budget,
            })?;
        self.claimed += 1;
        Ok(set)
    }

    /// Sets claimed so far.
    pub fn claimed(&self) -> u32 {
        self.claimed
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;
    use crate::mesh::IndexBufferView;

    fn sets(n: u64) -> Vec<vk::DescriptorSet> {
        (1..=n).map(vk::DescriptorSet::from_raw).collect()
    }

    #[test]
    fn slot_index_partitions_by_target() {
        assert_eq!(slot_index(0, 0, 512), 0);
        assert_eq!(slot_index(0, 7, 512), 7);
        assert_eq!(slot_index(2, 3, 512), 1027);
    }

    #[test]
    fn claims_follow_slot_index() {
        let all = sets(12);
        let slots = DynamicDescriptorSlots::new(&all, 4);
        assert_eq!(slots.target_capacity(), 3);

        let mut second = slots.for_target(1).unwrap();
        for j in 0..4 {
            assert_eq!(second.claim().unwrap(), all[slot_index(1, j, 4)]);
        }
        assert_eq!(second.claimed(), 4);
    }

    #[test]
    fn each_target_restarts_at_its_first_slot() {
        let all = sets(8);
        let slots = DynamicDescriptorSlots::new(&all, 4);
        let mut a = slots.for_target(0).unwrap();
        a.claim().unwrap();
        a.claim().unwrap();
        let mut b = slots.for_target(1).unwrap();
        assert_eq!(b.claim().unwrap(), all[4]);
    }

    #[test]
    fn claiming_past_budget_fails() {
        let all = sets(4);
        let slots = DynamicDescriptorSlots::new(&all, 2);
        let mut cursor = slots.for_target(1).unwrap();
        cursor.claim().unwrap();
        cursor.claim().unwrap();
        assert!(matches!(
            cursor.claim(),
            Err(GpuError::DescriptorBudgetExceeded {
                target: 1,
                draws: 3,
                budget: 2
            })
        ));
    }

    #[test]
    fn target_past_capacity_fails() {
        let all = sets(4);
        let slots = DynamicDescriptorSlots::new(&all, 2);
        assert!(matches!(
            slots.for_target(2),
            Err(GpuError::TargetCapacityExceeded {
                requested: 3,
                capacity: 2
            })
        ));
    }

    #[test]
    fn copies_one_texture_per_role() {
        let static_set = StaticDescriptorSet::new(
            vk::DescriptorSet::from_raw(100),
            vk::DescriptorSetLayout::from_raw(101),
            3,
        );
        let submesh = Submesh::new(
            IndexBufferView {
                buffer: vk::Buffer::null(),
                offset: 0,
                count: 6,
                index_type: vk::IndexType::UINT16,
            },
            [10, 11, 12],
        );
        let dst = vk::DescriptorSet::from_raw(200);

        let copies = static_set.texture_copies(&submesh, dst);
        for (role, copy) in TextureRole::ALL.iter().zip(&copies) {
            assert_eq!(copy.src_set, static_set.set);
            assert_eq!(copy.src_binding, 3);
            assert_eq!(copy.src_array_element, submesh.texture_index(*role));
            assert_eq!(copy.dst_set, dst);
            assert_eq!(copy.dst_binding, role.index() as u32);
            assert_eq!(copy.descriptor_count, 1);
        }
    }
}
