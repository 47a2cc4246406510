//! Tagged linear (bump) allocator.
//!
//! Assets are decoded into fixed-capacity byte regions, one per allocator
//! tag. Allocation only ever moves the region's cursor forward; the whole
//! region is released at once with [`LinearAllocator::reset`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Alignment of every allocation in bytes.
const ALLOCATION_ALIGN: usize = 8;

/// Identifies one region of a [`LinearAllocator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocatorTag {
    /// Long-lived decoded asset payloads.
    AssetData,
    /// Short-lived scratch memory.
    Scratch,
}

/// A range handed out by a [`LinearAllocator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub tag: AllocatorTag,
    pub offset: usize,
    pub size: usize,
}

struct Region {
    tag: AllocatorTag,
    data: Vec<u8>,
    used: usize,
}

/// Linear allocator with one fixed-capacity region per tag.
#[derive(Default)]
pub struct LinearAllocator {
    regions: Vec<Region>,
}

impl LinearAllocator {
    /// Create an allocator with no regions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a region of `capacity` bytes for `tag`.
    ///
    /// Registering a tag twice replaces the previous region.
    pub fn with_region(mut self, tag: AllocatorTag, capacity: usize) -> Self {
        self.regions.retain(|r| r.tag != tag);
        self.regions.push(Region {
            tag,
            data: vec![0; capacity],
            used: 0,
        });
        self
    }

    fn region(&self, tag: AllocatorTag) -> Result<&Region> {
        self.regions
            .iter()
            .find(|r| r.tag == tag)
            .ok_or(Error::UnknownAllocator(tag))
    }

    fn region_mut(&mut self, tag: AllocatorTag) -> Result<&mut Region> {
        self.regions
            .iter_mut()
            .find(|r| r.tag == tag)
            .ok_or(Error::UnknownAllocator(tag))
    }

    /// Reserve `size` bytes from the region for `tag`.
    ///
    /// The region is left untouched when the request does not fit.
    pub fn allocate(&mut self, tag: AllocatorTag, size: usize) -> Result<Allocation> {
        let region = self.region_mut(tag)?;
        let offset = region.used.next_multiple_of(ALLOCATION_ALIGN);
        let remaining = region.data.len().saturating_sub(offset);
        if size > remaining {
            return Err(Error::AllocatorExhausted {
                tag,
                requested: size,
                remaining,
            });
        }
        region.used = offset + size;
        tracing::trace!(?tag, offset, size, "linear allocation");
        Ok(Allocation { tag, offset, size })
    }

    /// Bytes of an allocation.
    pub fn bytes(&self, allocation: &Allocation) -> Result<&[u8]> {
        let region = self.region(allocation.tag)?;
        let end = allocation.offset + allocation.size;
        if end > region.used {
            return Err(Error::OutOfBounds(format!(
                "allocation {}..{end} past {:?} cursor {}",
                allocation.offset, allocation.tag, region.used
            )));
        }
        Ok(&region.data[allocation.offset..end])
    }

    /// Mutable bytes of an allocation.
    pub fn bytes_mut(&mut self, allocation: &Allocation) -> Result<&mut [u8]> {
        let region = self.region_mut(allocation.tag)?;
        let end = allocation.offset + allocation.size;
        if end > region.used {
            return Err(Error::OutOfBounds(format!(
                "allocation {}..{end} past {:?} cursor {}",
                allocation.offset, allocation.tag, region.used
            )));
        }
        Ok(&mut region.data[allocation.offset..end])
    }

    /// Bytes in use in the region for `tag`.
    pub fn used(&self, tag: AllocatorTag) -> Result<usize> {
        Ok(self.region(tag)?.used)
    }

    /// Capacity of the region for `tag`.
    pub fn capacity(&self, tag: AllocatorTag) -> Result<usize> {
        Ok(self.region(tag)?.data.len())
    }

    /// Release every allocation in the region for `tag`.
    pub fn reset(&mut self, tag: AllocatorTag) -> Result<()> {
        self.region_mut(tag)?.used = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_aligned_and_disjoint() {
        let mut alloc = LinearAllocator::new().with_region(AllocatorTag::AssetData, 64);
        let a = alloc.allocate(AllocatorTag::AssetData, 3).unwrap();
        let b = alloc.allocate(AllocatorTag::AssetData, 4).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 8);
        assert_eq!(alloc.used(AllocatorTag::AssetData).unwrap(), 12);
    }

    #[test]
    fn exhausted_region_is_untouched() {
        let mut alloc = LinearAllocator::new().with_region(AllocatorTag::AssetData, 16);
        alloc.allocate(AllocatorTag::AssetData, 10).unwrap();
        let err = alloc.allocate(AllocatorTag::AssetData, 10).unwrap_err();
        assert!(matches!(
            err,
            Error::AllocatorExhausted {
                requested: 10,
                remaining: 0,
                ..
            }
        ));
        assert_eq!(alloc.used(AllocatorTag::AssetData).unwrap(), 10);
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let mut alloc = LinearAllocator::new().with_region(AllocatorTag::AssetData, 16);
        assert!(matches!(
            alloc.allocate(AllocatorTag::Scratch, 1),
            Err(Error::UnknownAllocator(AllocatorTag::Scratch))
        ));
    }

    #[test]
    fn reset_rewinds_cursor() {
        let mut alloc = LinearAllocator::new().with_region(AllocatorTag::Scratch, 32);
        alloc.allocate(AllocatorTag::Scratch, 32).unwrap();
        alloc.reset(AllocatorTag::Scratch).unwrap();
        let again = alloc.allocate(AllocatorTag::Scratch, 32).unwrap();
        assert_eq!(again.offset, 0);
    }

    #[test]
    fn bytes_round_trip() {
        let mut alloc = LinearAllocator::new().with_region(AllocatorTag::Scratch, 32);
        let a = alloc.allocate(AllocatorTag::Scratch, 4).unwrap();
        alloc.bytes_mut(&a).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(alloc.bytes(&a).unwrap(), &[1, 2, 3, 4]);
    }
}
