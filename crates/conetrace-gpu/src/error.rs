//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// A Vulkan call returned a non-success status.
    #[error("{op} failed: {result}")]
    Vulkan {
        op: &'static str,
        result: vk::Result,
    },

    /// Shader loading failed.
    #[error("Shader loading failed: {0}")]
    ShaderLoad(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// More draws were recorded for one target than descriptor sets were reserved.
    #[error(
        "Descriptor budget exceeded for target {target}: {draws} draws, {budget} sets reserved"
    )]
    DescriptorBudgetExceeded { target: u32, draws: u32, budget: u32 },

    /// A recording needs more draws per target than the pool reserves.
    #[error("Draw budget exceeded: {draws} draws per target, {budget} sets reserved")]
    DrawBudgetExceeded { draws: u32, budget: u32 },

    /// More output targets than the descriptor pool was sized for.
    #[error("Target capacity exceeded: {requested} targets, pool sized for {capacity}")]
    TargetCapacityExceeded { requested: u32, capacity: u32 },

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration or asset error from the core crate.
    #[error(transparent)]
    Core(#[from] conetrace_core::Error),
}

impl GpuError {
    /// Wrap a Vulkan status with the name of the call that produced it.
    pub const fn vulkan(op: &'static str, result: vk::Result) -> Self {
        Self::Vulkan { op, result }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
