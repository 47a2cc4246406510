//! Synchronization primitives.

use ash::vk;

use crate::device::RenderDevice;
use crate::error::Result;

/// Create a binary semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore<D: RenderDevice + ?Sized>(device: &D) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    device.create_semaphore(&create_info)
}

/// Create `count` binary semaphores.
///
/// On failure the semaphores created so far are destroyed before the error
/// is returned.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphores<D: RenderDevice + ?Sized>(
    device: &D,
    count: usize,
) -> Result<Vec<vk::Semaphore>> {
    let mut semaphores = Vec::with_capacity(count);
    for _ in 0..count {
        match create_semaphore(device) {
            Ok(semaphore) => semaphores.push(semaphore),
            Err(e) => {
                for semaphore in semaphores {
                    device.destroy_semaphore(semaphore);
                }
                return Err(e);
            }
        }
    }
    Ok(semaphores)
}
