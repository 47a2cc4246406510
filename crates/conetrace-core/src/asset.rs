//! Flat image asset layout.
//!
//! A decoded image is stored as one contiguous blob:
//!
//! ```text
//! ImageDesc | MipDesc * mip_count | u32 pixel * (sum of mip texels)
//! ```
//!
//! Pixels are packed little-endian RGBA8 (red in the low byte), row-major,
//! with the first row being the bottom of the source image.

use bytemuck::{Pod, Zeroable};

use crate::allocator::{Allocation, AllocatorTag, LinearAllocator};
use crate::error::{Error, Result};

/// Image header at the start of an asset blob.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
    pub _padding: u32,
    /// Byte offset of the mip array from the start of the blob.
    pub mips_offset: u64,
}

impl ImageDesc {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// One mip level.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MipDesc {
    pub width: u32,
    pub height: u32,
    /// Byte offset of this level's first pixel from the start of the pixel array.
    pub offset: u64,
}

impl MipDesc {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Number of texels in this level.
    pub const fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Kind tag of an asset blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
}

impl AssetKind {
    /// Four-character code stored alongside the blob.
    pub const fn fourcc(self) -> [u8; 4] {
        match self {
            Self::Image => *b"IMG\0",
        }
    }
}

/// An asset blob living in a [`LinearAllocator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Asset {
    pub kind: AssetKind,
    pub size: usize,
    pub allocation: Allocation,
}

/// Pack 8-bit channels into one texel.
#[inline]
pub const fn pack_rgba8(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

/// Split a texel into its 8-bit channels.
#[inline]
pub const fn unpack_rgba8(texel: u32) -> [u8; 4] {
    texel.to_le_bytes()
}

/// A decoded image with its mip chain, held on the CPU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAsset {
    pub width: u32,
    pub height: u32,
    pub mips: Vec<MipDesc>,
    pub pixels: Vec<u32>,
}

impl ImageAsset {
    /// Single-level image from packed pixels.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(Error::InvalidData(format!(
                "{width}x{height} image needs {expected} pixels, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            mips: vec![MipDesc {
                width,
                height,
                offset: 0,
            }],
            pixels,
        })
    }

    /// Size of the flat blob in bytes.
    pub fn byte_size(&self) -> usize {
        ImageDesc::SIZE + self.mips.len() * MipDesc::SIZE + self.pixels.len() * 4
    }

    /// Pixels of one mip level.
    pub fn mip_pixels(&self, level: usize) -> Option<&[u32]> {
        let mip = self.mips.get(level)?;
        let start = usize::try_from(mip.offset).ok()? / 4;
        self.pixels.get(start..start + mip.texel_count())
    }

    /// Write the flat blob into `allocator`.
    ///
    /// Nothing is written if the region cannot hold the blob.
    pub fn write_into(&self, allocator: &mut LinearAllocator, tag: AllocatorTag) -> Result<Asset> {
        let size = self.byte_size();
        let allocation = allocator.allocate(tag, size)?;
        let bytes = allocator.bytes_mut(&allocation)?;

        let desc = ImageDesc {
            width: self.width,
            height: self.height,
            mip_count: self.mips.len() as u32,
            _padding: 0,
            mips_offset: ImageDesc::SIZE as u64,
        };
        bytes[..ImageDesc::SIZE].copy_from_slice(bytemuck::bytes_of(&desc));

        let mips_end = ImageDesc::SIZE + self.mips.len() * MipDesc::SIZE;
        bytes[ImageDesc::SIZE..mips_end].copy_from_slice(bytemuck::cast_slice(&self.mips));

        for (dst, texel) in bytes[mips_end..].chunks_exact_mut(4).zip(&self.pixels) {
            dst.copy_from_slice(&texel.to_le_bytes());
        }

        Ok(Asset {
            kind: AssetKind::Image,
            size,
            allocation,
        })
    }

    /// Read an image blob back out of `allocator`.
    pub fn read_from(allocator: &LinearAllocator, asset: &Asset) -> Result<Self> {
        if asset.kind != AssetKind::Image {
            return Err(Error::InvalidData(format!("{:?} is not an image", asset.kind)));
        }
        let bytes = allocator.bytes(&asset.allocation)?;
        if bytes.len() < ImageDesc::SIZE {
            return Err(Error::InvalidData("image blob shorter than header".into()));
        }
        let desc: ImageDesc = bytemuck::pod_read_unaligned(&bytes[..ImageDesc::SIZE]);

        let mips_start = usize::try_from(desc.mips_offset)
            .map_err(|_| Error::InvalidData("mip offset overflow".into()))?;
        let mips_end = mips_start + desc.mip_count as usize * MipDesc::SIZE;
        let mip_bytes = bytes
            .get(mips_start..mips_end)
            .ok_or_else(|| Error::OutOfBounds("mip array past end of blob".into()))?;
        let mips: Vec<MipDesc> = mip_bytes
            .chunks_exact(MipDesc::SIZE)
            .map(bytemuck::pod_read_unaligned)
            .collect();

        let pixels = bytes[mips_end..]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self {
            width: desc.width,
            height: desc.height,
            mips,
            pixels,
        })
    }
}
