// Shader module loading
//
// Vulkan consumes SPIR-V words. Binaries are read from disk at start-up (and
// again on hot reload), so a bad file has to be a clean error, not UB.

use anyhow::{Context, Result};
use ash::vk;
use std::path::Path;
use super::VulkanDevice;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Decode SPIR-V bytes into native-endian words
pub fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    let words = ash::util::read_spv(&mut std::io::Cursor::new(bytes))
        .context("SPIR-V length must be a multiple of 4")?;

    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(other) => anyhow::bail!("Bad SPIR-V magic number {:#010x}", other),
        None => anyhow::bail!("SPIR-V binary is empty"),
    }
}

/// Load SPIR-V from a file and create a shader module
pub fn load_shader_module(device: &VulkanDevice, path: &Path) -> Result<vk::ShaderModule> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read shader {}", path.display()))?;
    let code = parse_spirv(&bytes)
        .with_context(|| format!("Invalid shader {}", path.display()))?;

    let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

    log::debug!("Loaded shader {} ({} bytes)", path.display(), bytes.len());

    unsafe {
        device.device.create_shader_module(&create_info, None)
            .with_context(|| format!("Failed to create shader module for {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_ne_bytes()).collect()
    }

    #[test]
    fn accepts_spirv_header() {
        let bytes = words_to_bytes(&[SPIRV_MAGIC, 0x0001_0000, 0, 8, 0]);
        let words = parse_spirv(&bytes).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], SPIRV_MAGIC);
    }

    #[test]
    fn rejects_truncated_words() {
        let mut bytes = words_to_bytes(&[SPIRV_MAGIC, 0]);
        bytes.pop();
        assert!(parse_spirv(&bytes).is_err());
    }

    #[test]
    fn rejects_wrong_magic() {
        let bytes = words_to_bytes(&[0xdead_beef]);
        let err = parse_spirv(&bytes).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_spirv(&[]).is_err());
    }
}
