//! The anisotropic voxel texture the post-voxelization pass filters.
//!
//! The texture itself (images, views, memory) is owned elsewhere; stages
//! only see its descriptors and dimensions.

use ash::vk;
use conetrace_core::constants::NUM_DIRECTIONS;
use conetrace_gpu::{GpuError, Result};
use glam::Vec3;

/// Descriptors and dimensions of an anisotropic voxel texture.
#[derive(Clone, Copy, Debug)]
pub struct VoxelTexture {
    /// One storage image descriptor per principal direction (+X, -X, +Y, -Y, +Z, -Z).
    pub direction_descriptors: [vk::DescriptorImageInfo; NUM_DIRECTIONS],
    /// Storage image holding voxel opacity.
    pub alpha_descriptor: vk::DescriptorImageInfo,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Number of nested clipmap cascades.
    pub cascade_count: u32,
}

impl VoxelTexture {
    /// Check the texture can be dispatched over with `local_size` workgroups.
    pub fn validate(&self, local_size: u32) -> Result<()> {
        let invalid = |msg: String| GpuError::Core(conetrace_core::Error::InvalidData(msg));

        if local_size == 0 {
            return Err(invalid("workgroup size must be non-zero".into()));
        }
        if self.width == 0 || self.width % local_size != 0 {
            return Err(invalid(format!(
                "voxel grid width {} is not a non-zero multiple of {local_size}",
                self.width
            )));
        }
        if self.height == 0 || self.depth == 0 {
            return Err(invalid(format!(
                "voxel grid {}x{}x{} has an empty axis",
                self.width, self.height, self.depth
            )));
        }
        if self.cascade_count == 0 {
            return Err(invalid("voxel texture has no cascades".into()));
        }
        Ok(())
    }

    /// Views the compute stage binds: the first direction, then opacity.
    pub fn bound_views(&self) -> [vk::ImageView; 2] {
        [
            self.direction_descriptors[0].image_view,
            self.alpha_descriptor.image_view,
        ]
    }

    /// Grid dimensions as floats, the way the shader receives them.
    pub fn grid_resolution(&self) -> Vec3 {
        Vec3::new(self.width as f32, self.height as f32, self.depth as f32)
    }

    /// Workgroup counts for one cascade.
    ///
    /// All directions are laid side by side along X, so X covers
    /// `width / local_size` groups per direction.
    pub fn workgroup_counts(&self, local_size: u32) -> [u32; 3] {
        let groups = self.width / local_size;
        [groups * NUM_DIRECTIONS as u32, groups, groups]
    }
}
