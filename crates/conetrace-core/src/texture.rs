//! Texture roles.

use serde::{Deserialize, Serialize};

/// Role a texture plays in a submesh's material.
///
/// The discriminant doubles as the index into a submesh's texture index
/// array and as the binding of the role in the forward pass's per-draw
/// descriptor set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum TextureRole {
    Diffuse = 0,
    Normal = 1,
    Opacity = 2,
}

impl TextureRole {
    /// Number of roles.
    pub const COUNT: usize = 3;

    /// All roles in binding order.
    pub const ALL: [Self; Self::COUNT] = [Self::Diffuse, Self::Normal, Self::Opacity];

    /// Index into per-role arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}
