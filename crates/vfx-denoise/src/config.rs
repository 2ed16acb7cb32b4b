//! Filter configuration.
//!
//! Loaded once when the filter factory is initialized. Every field has a
//! default, so an empty document is a valid configuration:
//!
//! ```yaml
//! worker_threads: 2
//! thread_name: vfx-denoise
//! disabled_providers: [nvidia_video_noise_removal]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DenoiseError, DenoiseResult, ProviderId};

/// Process-wide settings of the denoise filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Threads of the pool running provider switches.
    pub worker_threads: usize,
    /// Prefix of worker thread names.
    pub thread_name: String,
    /// Providers never probed or offered.
    pub disabled_providers: Vec<ProviderId>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            thread_name: "vfx-denoise".to_string(),
            disabled_providers: Vec::new(),
        }
    }
}

impl FilterConfig {
    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> DenoiseResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> DenoiseResult<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DenoiseResult<()> {
        if self.worker_threads == 0 {
            return Err(DenoiseError::Config("worker_threads must be at least 1".into()));
        }
        if self.thread_name.is_empty() {
            return Err(DenoiseError::Config("thread_name must not be empty".into()));
        }
        if self.disabled_providers.contains(&ProviderId::Automatic) {
            return Err(DenoiseError::Config(
                "'automatic' is not a provider and cannot be disabled".into(),
            ));
        }
        Ok(())
    }
}
