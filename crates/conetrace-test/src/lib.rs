//! Test support for the conetrace renderer.
//!
//! Provides a recording [`RenderDevice`](conetrace_gpu::RenderDevice) so
//! resource building and command recording can be checked without a GPU.

pub mod device;

pub use device::{
    Call, DescriptorCopy, DescriptorWrite, GraphicsPipelineSummary, RecordingDevice,
};

use ash::vk::{self, Handle};
use tracing_subscriber::EnvFilter;

/// A minimal SPIR-V module header (magic, version 1.0, generator, bound, schema).
pub const FAKE_SPIRV: [u32; 5] = [0x0723_0203, 0x0001_0000, 0, 1, 0];

/// Install a fmt subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A fake external handle for things the stages consume but never create
/// (render passes, framebuffers, buffers, image views, command pools).
///
/// Raw values below `0x1000` never collide with handles the recording device
/// hands out.
pub fn external<H: Handle>(raw: u64) -> H {
    debug_assert!(raw != 0 && raw < 0x1000);
    H::from_raw(raw)
}

/// A fake image descriptor pointing at an external image view.
pub fn image_descriptor(raw_view: u64) -> vk::DescriptorImageInfo {
    vk::DescriptorImageInfo::default()
        .image_view(external(raw_view))
        .image_layout(vk::ImageLayout::GENERAL)
}
