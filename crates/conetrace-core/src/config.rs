//! Render stage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CLEAR_COLOR, DEFAULT_DRAW_BUDGET, VOXEL_LOCAL_SIZE};
use crate::error::{Error, Result};

/// Where SPIR-V bytecode comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShaderSource {
    /// Compiled SPIR-V file on disk.
    Path(PathBuf),
    /// SPIR-V words already in memory.
    Spirv(Vec<u32>),
}

/// A shader stage to load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    pub source: ShaderSource,
    pub entry_point: String,
}

impl ShaderConfig {
    /// Shader loaded from a SPIR-V file with a `main` entry point.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ShaderSource::Path(path.into()),
            entry_point: "main".to_string(),
        }
    }

    /// Shader from in-memory SPIR-V with a `main` entry point.
    pub fn from_spirv(words: Vec<u32>) -> Self {
        Self {
            source: ShaderSource::Spirv(words),
            entry_point: "main".to_string(),
        }
    }

    /// Set the entry point.
    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    fn validate(&self, what: &str) -> Result<()> {
        if self.entry_point.is_empty() {
            return Err(Error::InvalidConfig(format!("{what}: empty entry point")));
        }
        if matches!(&self.source, ShaderSource::Spirv(words) if words.is_empty()) {
            return Err(Error::InvalidConfig(format!("{what}: empty SPIR-V")));
        }
        Ok(())
    }
}

/// Forward shading stage configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardStageConfig {
    /// Vertex shader.
    pub vertex_shader: ShaderConfig,
    /// Fragment shader.
    pub fragment_shader: ShaderConfig,
    /// Color attachment clear value.
    pub clear_color: [f32; 4],
    /// Depth attachment clear value.
    pub clear_depth: f32,
    /// Stencil attachment clear value.
    pub clear_stencil: u32,
    /// Per-draw descriptor sets reserved for each output target.
    pub draw_budget_per_target: u32,
    /// Output targets the descriptor pool is sized for
    /// (None: the target count at construction).
    pub max_targets: Option<u32>,
    /// Initial pipeline cache contents from a previous run.
    pub pipeline_cache_data: Vec<u8>,
}

impl Default for ForwardStageConfig {
    fn default() -> Self {
        Self {
            vertex_shader: ShaderConfig::from_path("shaders/diffuse.vert.spv"),
            fragment_shader: ShaderConfig::from_path("shaders/diffuse.frag.spv"),
            clear_color: DEFAULT_CLEAR_COLOR,
            clear_depth: 1.0,
            clear_stencil: 0,
            draw_budget_per_target: DEFAULT_DRAW_BUDGET,
            max_targets: None,
            pipeline_cache_data: Vec::new(),
        }
    }
}

impl ForwardStageConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both shaders.
    pub fn with_shaders(mut self, vertex: ShaderConfig, fragment: ShaderConfig) -> Self {
        self.vertex_shader = vertex;
        self.fragment_shader = fragment;
        self
    }

    /// Set the color clear value.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set the per-target draw budget.
    pub fn with_draw_budget(mut self, budget: u32) -> Self {
        self.draw_budget_per_target = budget;
        self
    }

    /// Size the descriptor pool for up to `targets` output targets.
    pub fn with_max_targets(mut self, targets: u32) -> Self {
        self.max_targets = Some(targets);
        self
    }

    /// Seed the pipeline cache.
    pub fn with_pipeline_cache_data(mut self, data: Vec<u8>) -> Self {
        self.pipeline_cache_data = data;
        self
    }

    /// Check the configuration for values no stage can be built from.
    pub fn validate(&self) -> Result<()> {
        self.vertex_shader.validate("vertex shader")?;
        self.fragment_shader.validate("fragment shader")?;
        if self.draw_budget_per_target == 0 {
            return Err(Error::InvalidConfig("draw budget must be non-zero".into()));
        }
        if self.max_targets == Some(0) {
            return Err(Error::InvalidConfig("max targets must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.clear_depth) {
            return Err(Error::InvalidConfig(format!(
                "clear depth {} outside [0, 1]",
                self.clear_depth
            )));
        }
        Ok(())
    }
}

/// Post-voxelization compute stage configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostVoxelizeStageConfig {
    /// Compute shader.
    pub compute_shader: ShaderConfig,
    /// Local workgroup edge length the shader was compiled with.
    pub local_size: u32,
    /// Initial pipeline cache contents from a previous run.
    pub pipeline_cache_data: Vec<u8>,
}

impl Default for PostVoxelizeStageConfig {
    fn default() -> Self {
        Self {
            compute_shader: ShaderConfig::from_path("shaders/voxelizerpost.comp.spv"),
            local_size: VOXEL_LOCAL_SIZE,
            pipeline_cache_data: Vec::new(),
        }
    }
}

impl PostVoxelizeStageConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compute shader.
    pub fn with_shader(mut self, shader: ShaderConfig) -> Self {
        self.compute_shader = shader;
        self
    }

    /// Seed the pipeline cache.
    pub fn with_pipeline_cache_data(mut self, data: Vec<u8>) -> Self {
        self.pipeline_cache_data = data;
        self
    }

    /// Check the configuration for values no stage can be built from.
    pub fn validate(&self) -> Result<()> {
        self.compute_shader.validate("compute shader")?;
        if self.local_size == 0 {
            return Err(Error::InvalidConfig("local size must be non-zero".into()));
        }
        Ok(())
    }
}
