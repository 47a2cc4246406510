//! Mesh model consumed by the forward stage.

use ash::vk;
use conetrace_core::TextureRole;
use conetrace_gpu::{GpuError, Result};

/// A range of an index buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexBufferView {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    /// Number of indices.
    pub count: u32,
    pub index_type: vk::IndexType,
}

/// A drawable part of a mesh with its own material textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submesh {
    pub indices: IndexBufferView,
    /// Per-role element index into the static descriptor set's image array.
    pub texture_indices: [u32; TextureRole::COUNT],
}

impl Submesh {
    pub fn new(indices: IndexBufferView, texture_indices: [u32; TextureRole::COUNT]) -> Self {
        Self {
            indices,
            texture_indices,
        }
    }

    /// Image array element used for `role`.
    #[inline]
    pub fn texture_index(&self, role: TextureRole) -> u32 {
        self.texture_indices[role.index()]
    }
}

/// Submeshes sharing one set of vertex buffers.
///
/// Vertex buffers are bound once per mesh; submeshes are drawn in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mesh {
    vertex_buffers: Vec<vk::Buffer>,
    vertex_offsets: Vec<vk::DeviceSize>,
    submeshes: Vec<Submesh>,
}

impl Mesh {
    /// Create a mesh. Every vertex buffer needs exactly one offset.
    pub fn new(
        vertex_buffers: Vec<vk::Buffer>,
        vertex_offsets: Vec<vk::DeviceSize>,
        submeshes: Vec<Submesh>,
    ) -> Result<Self> {
        if vertex_buffers.len() != vertex_offsets.len() {
            return Err(GpuError::Core(conetrace_core::Error::InvalidData(format!(
                "{} vertex buffers but {} offsets",
                vertex_buffers.len(),
                vertex_offsets.len()
            ))));
        }
        Ok(Self {
            vertex_buffers,
            vertex_offsets,
            submeshes,
        })
    }

    pub fn vertex_buffers(&self) -> &[vk::Buffer] {
        &self.vertex_buffers
    }

    pub fn vertex_offsets(&self) -> &[vk::DeviceSize] {
        &self.vertex_offsets
    }

    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }
}

/// Number of draws one pass over `meshes` issues.
pub fn draw_count(meshes: &[Mesh]) -> usize {
    meshes.iter().map(|m| m.submeshes.len()).sum()
}

/// Vertex input description shared by every mesh a stage draws.
#[derive(Clone, Debug, Default)]
pub struct VertexLayout {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a per-vertex buffer binding.
    pub fn binding(mut self, binding: u32, stride: u32) -> Self {
        self.bindings.push(
            vk::VertexInputBindingDescription::default()
                .binding(binding)
                .stride(stride)
                .input_rate(vk::VertexInputRate::VERTEX),
        );
        self
    }

    /// Add an attribute read from `binding`.
    pub fn attribute(
        mut self,
        location: u32,
        binding: u32,
        format: vk::Format,
        offset: u32,
    ) -> Self {
        self.attributes.push(
            vk::VertexInputAttributeDescription::default()
                .location(location)
                .binding(binding)
                .format(format)
                .offset(offset),
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submesh(count: u32) -> Submesh {
        Submesh::new(
            IndexBufferView {
                buffer: vk::Buffer::null(),
                offset: 0,
                count,
                index_type: vk::IndexType::UINT32,
            },
            [4, 5, 6],
        )
    }

    #[test]
    fn texture_index_by_role() {
        let s = submesh(3);
        assert_eq!(s.texture_index(TextureRole::Diffuse), 4);
        assert_eq!(s.texture_index(TextureRole::Normal), 5);
        assert_eq!(s.texture_index(TextureRole::Opacity), 6);
    }

    #[test]
    fn mismatched_offsets_are_rejected() {
        let result = Mesh::new(vec![vk::Buffer::null(); 2], vec![0], vec![submesh(3)]);
        assert!(result.is_err());
    }

    #[test]
    fn draw_count_sums_submeshes() {
        let a = Mesh::new(vec![], vec![], vec![submesh(3), submesh(6)]).unwrap();
        let b = Mesh::new(vec![], vec![], vec![submesh(9)]).unwrap();
        assert_eq!(draw_count(&[a, b]), 3);
        assert_eq!(draw_count(&[]), 0);
    }

    #[test]
    fn vertex_layout_builder() {
        let layout = VertexLayout::new()
            .binding(0, 32)
            .attribute(0, 0, vk::Format::R32G32B32_SFLOAT, 0)
            .attribute(1, 0, vk::Format::R32G32_SFLOAT, 12);
        assert_eq!(layout.bindings.len(), 1);
        assert_eq!(layout.bindings[0].stride, 32);
        assert_eq!(layout.attributes[1].offset, 12);
    }
}
