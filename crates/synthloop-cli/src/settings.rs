//! File-based settings and their merge with command-line flags.
//!
//! Precedence: flag (or its environment variable) > TOML file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use synthloop_core::{SandboxConfig, SynthesisConfig};
use synthloop_oracle::{Backend, OracleConfig, PromptProfile};

/// Contents of the optional `--config` TOML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub synthesis: SynthesisSection,
    pub oracle: OracleSection,
    pub sandbox: SandboxSection,
    pub render: RenderSection,
    pub artifacts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthesisSection {
    pub max_iterations: Option<u32>,
    pub sandbox_timeout_secs: Option<u64>,
    pub analyze_failures: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleSection {
    pub backend: Option<Backend>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub request_timeout_secs: Option<u64>,
    pub profile: Option<PromptProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxSection {
    pub interpreter: Option<PathBuf>,
    pub staging_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    pub command: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub extension: Option<String>,
    pub base: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("Invalid config file {:?}", path))
    }
}

/// Synthesis-related flags, all optional so the file can fill gaps.
#[derive(Debug, Clone, Default)]
pub struct SynthesisOverrides {
    pub max_iterations: Option<u32>,
    pub sandbox_timeout_secs: Option<u64>,
    pub no_analysis: bool,
}

pub fn synthesis_config(
    flags: &SynthesisOverrides,
    file: &SynthesisSection,
) -> Result<SynthesisConfig> {
    let mut config = SynthesisConfig::default();
    if let Some(n) = flags.max_iterations.or(file.max_iterations) {
        config = config.with_max_iterations(n);
    }
    if let Some(secs) = flags.sandbox_timeout_secs.or(file.sandbox_timeout_secs) {
        config = config.with_sandbox_timeout(Duration::from_secs(secs));
    }
    let analyze = !flags.no_analysis && file.analyze_failures.unwrap_or(true);
    config = config.with_failure_analysis(analyze);
    config.validate().context("Invalid synthesis settings")?;
    Ok(config)
}

#[derive(Debug, Clone, Default)]
pub struct OracleOverrides {
    pub backend: Option<Backend>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub use_system_proxy: bool,
}

/// Build the oracle settings; `lookup` supplies environment variables.
pub fn oracle_config<F>(
    flags: &OracleOverrides,
    file: &OracleSection,
    lookup: F,
) -> Result<OracleConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let backend = flags.backend.or(file.backend).unwrap_or(Backend::Anthropic);
    let mut config = OracleConfig::from_lookup(backend, lookup)
        .with_context(|| format!("Cannot configure the {backend} oracle"))?;
    if let Some(model) = flags.model.clone().or_else(|| file.model.clone()) {
        config = config.with_model(model);
    }
    if let Some(endpoint) = flags.endpoint.clone().or_else(|| file.endpoint.clone()) {
        config = config.with_endpoint(endpoint);
    }
    if let Some(max_tokens) = file.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = file.temperature {
        config = config.with_temperature(temperature);
    }
    if let Some(secs) = file.request_timeout_secs {
        config = config.with_request_timeout(Duration::from_secs(secs));
    }
    config = config.with_system_proxy(flags.use_system_proxy);
    config.validate().context("Invalid oracle settings")?;
    Ok(config)
}

pub fn sandbox_config(
    profile: PromptProfile,
    interpreter: Option<PathBuf>,
    file: &SandboxSection,
    path_env: Option<String>,
) -> SandboxConfig {
    let mut config = match profile {
        PromptProfile::General => SandboxConfig::default(),
        PromptProfile::Manim => SandboxConfig::manim(),
    };
    if let Some(interpreter) = interpreter.or_else(|| file.interpreter.clone()) {
        config = config.with_interpreter(interpreter);
    }
    if let Some(root) = &file.staging_root {
        config = config.with_staging_root(root);
    }
    if let Some(path) = path_env {
        config = config.with_path_env(path);
    }
    config
}
