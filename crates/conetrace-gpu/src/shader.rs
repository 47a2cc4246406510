//! SPIR-V shader loading.

use std::ffi::CString;
use std::fs::File;

use ash::vk;
use conetrace_core::{ShaderConfig, ShaderSource};

use crate::device::RenderDevice;
use crate::error::{GpuError, Result};

/// Read SPIR-V words from a shader source.
pub fn read_spirv(source: &ShaderSource) -> Result<Vec<u32>> {
    match source {
        ShaderSource::Path(path) => {
            let mut file = File::open(path)
                .map_err(|e| GpuError::ShaderLoad(format!("{}: {e}", path.display())))?;
            ash::util::read_spv(&mut file)
                .map_err(|e| GpuError::ShaderLoad(format!("{}: {e}", path.display())))
        }
        ShaderSource::Spirv(words) if words.is_empty() => {
            Err(GpuError::ShaderLoad("empty SPIR-V".to_string()))
        }
        ShaderSource::Spirv(words) => Ok(words.clone()),
    }
}

/// A loaded shader module bound to one pipeline stage.
///
/// Modules are only needed until pipeline creation; call
/// [`ShaderStage::destroy`] once the pipeline exists.
pub struct ShaderStage {
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
    entry_point: CString,
}

impl ShaderStage {
    /// Load a shader and create its module.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn load<D: RenderDevice + ?Sized>(
        device: &D,
        config: &ShaderConfig,
        stage: vk::ShaderStageFlags,
    ) -> Result<Self> {
        let entry_point = CString::new(config.entry_point.as_str())
            .map_err(|e| GpuError::ShaderLoad(format!("entry point: {e}")))?;
        let code = read_spirv(&config.source)?;

        let shader_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = device.create_shader_module(&shader_info)?;
        tracing::debug!(?stage, words = code.len(), "shader module created");

        Ok(Self {
            module,
            stage,
            entry_point,
        })
    }

    /// The pipeline stage this shader runs in.
    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    /// Stage description for pipeline creation.
    pub fn create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage)
            .module(self.module)
            .name(&self.entry_point)
    }

    /// Destroy the shader module.
    ///
    /// # Safety
    /// The device must be valid and no pipeline creation may be using the module.
    pub unsafe fn destroy<D: RenderDevice + ?Sized>(self, device: &D) {
        device.destroy_shader_module(self.module);
    }
}
