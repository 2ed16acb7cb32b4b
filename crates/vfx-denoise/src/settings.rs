//! Per-instance settings.
//!
//! The host persists each filter instance's settings as an opaque key/value
//! blob. The filter reads it through [`SettingsStore`]; [`MemorySettings`]
//! is an in-memory store for hosts without one and for tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::provider::KEY_PROVIDER;
use crate::{DenoiseResult, ProviderId};

/// Current settings schema version.
pub const SCHEMA_VERSION: u64 = 1;

/// Integer-valued settings access.
pub trait SettingsStore {
    /// Value of `key`, 0 when unset.
    fn get_int(&self, key: &str) -> i64;

    fn set_int(&mut self, key: &str, value: i64);
}

/// Settings held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemorySettings(BTreeMap<String, i64>);

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings selecting `provider`.
    pub fn with_provider(provider: ProviderId) -> Self {
        let mut settings = Self::new();
        set_provider(&mut settings, provider);
        settings
    }

    pub fn from_yaml_str(yaml: &str) -> DenoiseResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml_string(&self) -> DenoiseResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl SettingsStore for MemorySettings {
    fn get_int(&self, key: &str) -> i64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    fn set_int(&mut self, key: &str, value: i64) {
        self.0.insert(key.to_string(), value);
    }
}

/// Requested provider. An unset key means `Automatic`.
pub fn provider(store: &dyn SettingsStore) -> DenoiseResult<ProviderId> {
    ProviderId::from_raw(store.get_int(KEY_PROVIDER))
}

pub fn set_provider(store: &mut dyn SettingsStore, provider: ProviderId) {
    store.set_int(KEY_PROVIDER, provider.raw());
}

/// Write default values. Every key's default is its unset value.
pub fn defaults(_store: &mut dyn SettingsStore) {}

/// Upgrade settings written by schema `version`. Nothing has changed since
/// version 1.
pub fn migrate(_store: &mut dyn SettingsStore, _version: u64) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DenoiseError;

    #[test]
    fn test_unset_is_automatic() {
        assert_eq!(provider(&MemorySettings::new()).unwrap(), ProviderId::Automatic);
    }

    #[test]
    fn test_provider_round_trip() {
        let settings = MemorySettings::with_provider(ProviderId::NvidiaVideoNoiseRemoval);
        assert_eq!(settings.get_int("Filter.VideoDenoising.Provider"), 1);
        assert_eq!(provider(&settings).unwrap(), ProviderId::NvidiaVideoNoiseRemoval);
    }

    #[test]
    fn test_unknown_provider_value() {
        let mut settings = MemorySettings::new();
        settings.set_int(KEY_PROVIDER, 42);
        assert!(matches!(provider(&settings), Err(DenoiseError::MissingConversion(42))));
    }

    #[test]
    fn test_yaml_blob() {
        let settings = MemorySettings::from_yaml_str("Filter.VideoDenoising.Provider: 1\n").unwrap();
        assert_eq!(provider(&settings).unwrap(), ProviderId::NvidiaVideoNoiseRemoval);
        let yaml = settings.to_yaml_string().unwrap();
        assert!(yaml.contains("Filter.VideoDenoising.Provider: 1"));
    }

    #[test]
    fn test_defaults_and_migrate_leave_blob_alone() {
        let mut settings = MemorySettings::with_provider(ProviderId::NvidiaVideoNoiseRemoval);
        let before = settings.clone();
        defaults(&mut settings);
        migrate(&mut settings, SCHEMA_VERSION);
        assert_eq!(settings, before);
    }
}
