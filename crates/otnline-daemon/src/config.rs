//! Configuration loading and validation

use anyhow::{Context, Result};
use otnline_core::{ObjectType, StoreLimits, SwitchId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default, rename = "switch")]
    pub switches: Vec<SwitchConfig>,
    #[serde(default, rename = "custom_attribute")]
    pub custom_attributes: Vec<CustomAttributeConfig>,
    #[serde(default, rename = "object")]
    pub objects: Vec<ObjectConfig>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Live instance limit for types without an override
    #[serde(default = "default_max_objects")]
    pub default_max_objects: usize,
    /// Per-type overrides, keyed by object type name
    #[serde(default)]
    pub max_objects: HashMap<String, usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_objects: default_max_objects(),
            max_objects: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn to_limits(&self) -> Result<StoreLimits> {
        let mut limits = StoreLimits::new(self.default_max_objects);
        for (name, max) in &self.max_objects {
            let object_type: ObjectType = name
                .parse()
                .with_context(|| format!("engine.max_objects.{name}"))?;
            limits = limits.with_limit(object_type, *max);
        }
        Ok(limits)
    }
}

fn default_max_objects() -> usize {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub id: u64,
}

impl SwitchConfig {
    pub fn switch_id(&self) -> SwitchId {
        SwitchId(self.id)
    }
}

/// A vendor attribute the backend implements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomAttributeConfig {
    pub object_type: ObjectType,
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub writable: bool,
}

/// An object created at start-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectConfig {
    /// Local alias used by references and telemetry records
    pub key: String,
    pub object_type: ObjectType,
    pub switch: u64,
    /// Attribute values by attribute name
    #[serde(default)]
    pub attrs: toml::Table,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// JSON-lines file of samples to replay
    #[serde(default)]
    pub replay: Option<PathBuf>,
    /// Statistics report interval in seconds (0 to disable)
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            replay: None,
            report_interval_secs: default_report_interval(),
        }
    }
}

fn default_report_interval() -> u64 {
    10
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        info!(
            path = %path.display(),
            switches = config.switches.len(),
            objects = config.objects.len(),
            "Loaded configuration"
        );
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.engine.default_max_objects, 1024);
        assert_eq!(config.telemetry.report_interval_secs, 10);
        assert!(config.objects.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[engine]
default_max_objects = 64

[engine.max_objects]
switch_media_channel = 4

[[switch]]
id = 1

[[custom_attribute]]
object_type = "device"
id = 0x10000005
name = "fan_curve"
writable = true

[[object]]
key = "mc1"
object_type = "switch_media_channel"
switch = 1
attrs = {{ index = 1, lower_frequency = 191300000, upper_frequency = 191350000, admin_state = "maint" }}

[telemetry]
replay = "samples.jsonl"
report_interval_secs = 0
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        let limits = config.engine.to_limits().unwrap();
        assert_eq!(limits.max_for(ObjectType::SwitchMediaChannel), 4);
        assert_eq!(limits.max_for(ObjectType::Device), 64);
        assert_eq!(config.switches[0].switch_id(), SwitchId(1));
        assert_eq!(config.custom_attributes[0].id, 0x1000_0005);
        assert!(config.custom_attributes[0].writable);
        assert_eq!(config.objects[0].object_type, ObjectType::SwitchMediaChannel);
        assert_eq!(
            config.objects[0].attrs.get("admin_state").and_then(|v| v.as_str()),
            Some("maint")
        );
        assert_eq!(config.telemetry.replay, Some(PathBuf::from("samples.jsonl")));
        assert_eq!(config.telemetry.report_interval_secs, 0);
    }

    #[test]
    fn test_unknown_limit_key_rejected() {
        let mut engine = EngineConfig::default();
        engine.max_objects.insert("amplifier".to_string(), 3);
        assert!(engine.to_limits().is_err());
    }

    #[test]
    fn test_unknown_object_type_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[[object]]\nkey = \"x\"\nobject_type = \"amplifier\"\nswitch = 1\n").unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
