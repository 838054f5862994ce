use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Core indices are typed as a single hex digit on the command line.
pub const MAX_CORES: usize = 16;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MemoryRegion {
    pub name: String,
    pub base: u64,
    pub size: String, // e.g. "64KB"
}

/// Hosted stand-in for a program entry point. Invoking it returns `status`,
/// or the index of the calling core when no status is given.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EntryPointStub {
    pub address: u64,
    #[serde(default)]
    pub status: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default = "default_prompt")]
    pub prompt: String,
    #[serde(default = "default_cores")]
    pub cores: usize,
    #[serde(default = "default_address_bits")]
    pub address_bits: u32,
    #[serde(default = "default_max_line")]
    pub max_line: usize,
    #[serde(default = "default_memory")]
    pub memory: Vec<MemoryRegion>,
    #[serde(default)]
    pub entry_points: Vec<EntryPointStub>,
}

fn default_name() -> String {
    "mcmon".to_string()
}

fn default_prompt() -> String {
    "mon > ".to_string()
}

fn default_cores() -> usize {
    4
}

fn default_address_bits() -> u32 {
    64
}

fn default_max_line() -> usize {
    1024
}

fn default_memory() -> Vec<MemoryRegion> {
    vec![MemoryRegion {
        name: "ram".to_string(),
        base: 0,
        size: "64KiB".to_string(),
    }]
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            banner: None,
            prompt: default_prompt(),
            cores: default_cores(),
            address_bits: default_address_bits(),
            max_line: default_max_line(),
            memory: default_memory(),
            entry_points: Vec::new(),
        }
    }
}

impl MonitorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open monitor config at {:?}", path.as_ref()))?;
        let config: Self =
            serde_yaml::from_reader(f).context("Failed to parse Monitor Config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cores == 0 || self.cores > MAX_CORES {
            anyhow::bail!(
                "Setting 'cores' must be between 1 and {}, got {}",
                MAX_CORES,
                self.cores
            );
        }

        if self.address_bits != 32 && self.address_bits != 64 {
            anyhow::bail!(
                "Unsupported address_bits {}. Supported widths: 32, 64",
                self.address_bits
            );
        }

        if self.max_line == 0 {
            anyhow::bail!("Setting 'max_line' must be greater than zero");
        }

        if self.memory.is_empty() {
            anyhow::bail!("At least one memory region is required");
        }

        let mut spans = Vec::with_capacity(self.memory.len());
        for region in &self.memory {
            let size = parse_size(&region.size)
                .with_context(|| format!("Bad size for memory region '{}'", region.name))?;
            if size == 0 {
                anyhow::bail!("Memory region '{}' has zero size", region.name);
            }
            let end = region.base.checked_add(size).ok_or_else(|| {
                anyhow::anyhow!("Memory region '{}' wraps the address space", region.name)
            })?;
            if self.address_bits == 32 && end > 1 << 32 {
                anyhow::bail!(
                    "Memory region '{}' lies beyond the 32-bit address space",
                    region.name
                );
            }
            spans.push((region.base, end, region.name.as_str()));
        }

        spans.sort_by_key(|&(base, _, _)| base);
        for pair in spans.windows(2) {
            if pair[1].0 < pair[0].1 {
                anyhow::bail!(
                    "Memory regions '{}' and '{}' overlap",
                    pair[0].2,
                    pair[1].2
                );
            }
        }

        Ok(())
    }

    /// Hex digits accepted in an address field.
    pub fn address_digits(&self) -> usize {
        (self.address_bits / 4) as usize
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let yaml = r#"
name: "pi3"
banner: "Monitor version 0.2"
prompt: "pi> "
cores: 4
address_bits: 64
memory:
  - name: "ram"
    base: 0x80000
    size: "1MiB"
entry_points:
  - address: 0x80000
    status: 7
  - address: 0x90000
"#;
        let config: MonitorConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.prompt, "pi> ");
        assert_eq!(config.memory[0].base, 0x80000);
        assert_eq!(config.entry_points.len(), 2);
        assert_eq!(config.entry_points[0].status, Some(7));
        assert_eq!(config.entry_points[1].status, None);
        assert_eq!(config.max_line, 1024);
        assert_eq!(config.address_digits(), 16);
    }

    #[test]
    fn test_defaults() {
        let config: MonitorConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.prompt, "mon > ");
        assert_eq!(config.cores, 4);
    }

    #[test]
    fn test_invalid_cores() {
        let config: MonitorConfig = serde_yaml::from_str("cores: 17").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cores"));

        let config: MonitorConfig = serde_yaml::from_str("cores: 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_address_bits() {
        let config: MonitorConfig = serde_yaml::from_str("address_bits: 16").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("address_bits"));
    }

    #[test]
    fn test_32bit_region_limit() {
        let yaml = r#"
address_bits: 32
memory:
  - name: "high"
    base: 0xFFFF0000
    size: "128KiB"
"#;
        let config: MonitorConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("32-bit"));
        assert_eq!(config.address_digits(), 8);
    }

    #[test]
    fn test_overlapping_regions() {
        let yaml = r#"
memory:
  - name: "a"
    base: 0x0
    size: "8KiB"
  - name: "b"
    base: 0x1000
    size: "4KiB"
"#;
        let config: MonitorConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let res: std::result::Result<MonitorConfig, _> = serde_yaml::from_str("colour: red");
        assert!(res.is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4KiB").unwrap(), 4096);
        assert_eq!(parse_size("1MiB").unwrap(), 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }
}
