//! Generation settings layered from defaults, a YAML file, and flags

use anyhow::Context;
use caster_emit::{EmitOptions, MissingTransforms};
use serde::Deserialize;
use std::path::Path;

/// Settings file contents; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub package_name: Option<String>,
    pub package_path: Option<String>,
    pub header: Option<String>,
    pub missing_transforms: Option<MissingTransforms>,
    pub jobs: Option<usize>,
    pub gofmt: Option<bool>,
}

impl FileConfig {
    /// Parse a settings file
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Parse settings from YAML text
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct FlagConfig {
    pub package_name: Option<String>,
    pub package_path: Option<String>,
    pub missing_transforms: Option<MissingTransforms>,
    pub jobs: Option<usize>,
    pub gofmt: bool,
}

/// Effective settings of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub emit: EmitOptions,
    pub jobs: usize,
    pub gofmt: bool,
}

impl Settings {
    /// Flags win over file values, file values win over defaults
    pub fn resolve(file: FileConfig, flags: FlagConfig) -> Self {
        let defaults = EmitOptions::default();
        let emit = EmitOptions {
            package_name: flags
                .package_name
                .or(file.package_name)
                .unwrap_or(defaults.package_name),
            package_path: flags.package_path.or(file.package_path),
            header: file.header.unwrap_or(defaults.header),
            missing_transforms: flags
                .missing_transforms
                .or(file.missing_transforms)
                .unwrap_or(defaults.missing_transforms),
        };

        Self {
            emit,
            jobs: flags.jobs.or(file.jobs).unwrap_or(1).max(1),
            gofmt: flags.gofmt || file.gofmt.unwrap_or(false),
        }
    }
}
