//! Provider detection and auto-selection.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::FilterConfig;
use crate::sdk::{SharedSdk, VideoEffectsSdk};
use crate::ProviderId;

/// Information about a denoise provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub provider: ProviderId,
    /// Human-readable name.
    pub name: &'static str,
    /// Whether the provider can run on this machine.
    pub available: bool,
    /// Priority for auto-selection (higher = preferred).
    pub priority: u32,
    pub description: &'static str,
}

/// Availability of every compiled-in provider.
///
/// Built once per process by the filter factory; the answers never change
/// afterwards. The registry keeps the vendor SDKs it probed loaded so that
/// backends created later share them.
pub struct ProviderRegistry {
    providers: Vec<ProviderInfo>,
    _nvidia: Option<Arc<dyn VideoEffectsSdk>>,
}

impl ProviderRegistry {
    /// Probe each provider not disabled by `config`.
    pub fn detect(config: &FilterConfig, nvidia: &SharedSdk) -> Self {
        let mut providers = Vec::with_capacity(ProviderId::PRIORITY.len());
        let mut nvidia_sdk = None;

        for (rank, &provider) in ProviderId::PRIORITY.iter().enumerate() {
            let priority = ((ProviderId::PRIORITY.len() - rank) * 100) as u32;
            let available = if config.disabled_providers.contains(&provider) {
                info!(%provider, "provider disabled by configuration");
                false
            } else {
                match provider {
                    ProviderId::NvidiaVideoNoiseRemoval => match probe(nvidia) {
                        Some(sdk) => {
                            nvidia_sdk = Some(sdk);
                            true
                        }
                        None => false,
                    },
                    ProviderId::Automatic => false,
                }
            };
            debug!(%provider, available, "provider probed");
            providers.push(ProviderInfo {
                provider,
                name: display_name(provider),
                available,
                priority,
                description: description(provider),
            });
        }

        providers.sort_by(|a, b| b.priority.cmp(&a.priority));
        let registry = Self {
            providers,
            _nvidia: nvidia_sdk,
        };
        if !registry.any_available() {
            error!("All supported denoising providers failed to initialize, disabling filter");
        }
        registry
    }

    /// Whether `provider` can run. `Automatic` is available if any
    /// concrete provider is.
    pub fn is_available(&self, provider: ProviderId) -> bool {
        match provider {
            ProviderId::Automatic => self.any_available(),
            p => self.providers.iter().any(|i| i.provider == p && i.available),
        }
    }

    /// False means the filter must not be registered.
    pub fn any_available(&self) -> bool {
        self.providers.iter().any(|i| i.available)
    }

    /// Highest-priority available provider.
    pub fn best(&self) -> Option<ProviderId> {
        self.providers
            .iter()
            .filter(|i| i.available)
            .max_by_key(|i| i.priority)
            .map(|i| i.provider)
    }

    /// Turn a requested provider into the one to load.
    ///
    /// `Automatic`, and any provider that cannot run here, resolve to the
    /// best available provider.
    pub fn resolve(&self, requested: ProviderId) -> Option<ProviderId> {
        match requested {
            ProviderId::Automatic => self.best(),
            p if self.is_available(p) => Some(p),
            p => {
                warn!(provider = %p, "requested provider unavailable, selecting automatically");
                self.best()
            }
        }
    }

    /// All providers, highest priority first.
    pub fn providers(&self) -> &[ProviderInfo] {
        &self.providers
    }

    /// One line per provider, `[+]` when available.
    pub fn describe(&self) -> String {
        let mut desc = String::new();
        for info in &self.providers {
            let status = if info.available { "+" } else { "-" };
            desc.push_str(&format!("[{}] {}: {}\n", status, info.name, info.description));
        }
        desc
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers)
            .finish()
    }
}

/// Load an SDK, treating a panicking loader like a failed one.
fn probe(sdk: &SharedSdk) -> Option<Arc<dyn VideoEffectsSdk>> {
    match panic::catch_unwind(AssertUnwindSafe(|| sdk.acquire())) {
        Ok(Ok(sdk)) => Some(sdk),
        Ok(Err(e)) => {
            warn!(error = %e, "failed to load NVIDIA Video Effects, disabling provider");
            None
        }
        Err(_) => {
            warn!("NVIDIA Video Effects loader panicked, disabling provider");
            None
        }
    }
}

fn display_name(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::Automatic => "Automatic",
        ProviderId::NvidiaVideoNoiseRemoval => "NVIDIA Video Noise Removal",
    }
}

fn description(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::Automatic => "Best available provider",
        ProviderId::NvidiaVideoNoiseRemoval => "NVIDIA Video Effects over CUDA",
    }
}
