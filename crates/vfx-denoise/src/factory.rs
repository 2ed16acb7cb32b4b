//! Process-wide filter factory.
//!
//! The host registers the filter type once. [`initialize`] builds the
//! factory (probing providers, loading the vendor SDK, starting the worker
//! pool); [`finalize`] drops the process-wide reference. Instances hold
//! their own `Arc` to the factory, so the last of them releases it.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use vfx_gpu::GraphicsDevice;

use crate::config::FilterConfig;
use crate::instance::DenoiseInstance;
use crate::pool::WorkerPool;
use crate::provider::{KEY_FILTER, KEY_PROVIDER};
use crate::registry::ProviderRegistry;
use crate::sdk::SharedSdk;
use crate::settings::{self, SettingsStore};
use crate::{DenoiseResult, ProviderId};

/// Filter type id registered with the host.
pub const FILTER_ID: &str = "vfx-filter-video-denoising";

/// Documentation link shown in the properties view.
pub const HELP_URL: &str = "https://docs.rs/vfx-denoise";

/// Registration record of the filter type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterInfo {
    pub id: &'static str,
    /// Translation key of the display name.
    pub name_key: &'static str,
    pub video: bool,
    /// Output size differs from the upstream size.
    pub custom_size: bool,
}

/// One entry of the provider list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderChoice {
    pub provider: ProviderId,
    /// Settings value stored when chosen.
    pub value: i64,
    /// Translation key of the label.
    pub label_key: &'static str,
    pub available: bool,
}

/// Properties view of the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterProperties {
    /// Settings key the provider list edits.
    pub provider_key: &'static str,
    pub providers: Vec<ProviderChoice>,
    pub help_url: &'static str,
}

/// Shared state of every denoise filter in the process.
pub struct FilterFactory {
    config: FilterConfig,
    registry: ProviderRegistry,
    sdk: Arc<SharedSdk>,
    pool: WorkerPool,
}

impl FilterFactory {
    /// Probe providers with `sdk` and start the worker pool.
    pub fn new(config: FilterConfig, sdk: SharedSdk) -> DenoiseResult<Self> {
        config.validate()?;
        let sdk = Arc::new(sdk);
        let registry = ProviderRegistry::detect(&config, &sdk);
        let pool = WorkerPool::new(config.worker_threads, &config.thread_name)?;
        debug!(providers = %registry.describe().trim_end(), "denoise providers detected");
        Ok(Self {
            config,
            registry,
            sdk,
            pool,
        })
    }

    /// Registration info, `None` when no provider can run on this machine.
    pub fn info(&self) -> Option<FilterInfo> {
        self.is_enabled().then_some(FilterInfo {
            id: FILTER_ID,
            name_key: KEY_FILTER,
            video: true,
            custom_size: true,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.registry.any_available()
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub(crate) fn sdk(&self) -> Arc<SharedSdk> {
        Arc::clone(&self.sdk)
    }

    /// Automatic plus every provider not disabled by configuration.
    pub fn properties(&self) -> FilterProperties {
        let mut providers = vec![ProviderChoice {
            provider: ProviderId::Automatic,
            value: ProviderId::Automatic.raw(),
            label_key: ProviderId::Automatic.translation_key(),
            available: self.registry.is_available(ProviderId::Automatic),
        }];
        providers.extend(
            ProviderId::PRIORITY
                .iter()
                .filter(|p| !self.config.disabled_providers.contains(*p))
                .map(|&p| ProviderChoice {
                    provider: p,
                    value: p.raw(),
                    label_key: p.translation_key(),
                    available: self.registry.is_available(p),
                }),
        );
        FilterProperties {
            provider_key: KEY_PROVIDER,
            providers,
            help_url: HELP_URL,
        }
    }

    pub fn defaults(&self, store: &mut dyn SettingsStore) {
        settings::defaults(store);
    }

    pub fn migrate(&self, store: &mut dyn SettingsStore, version: u64) {
        settings::migrate(store, version);
    }

    /// Create an instance for `device`, applying `settings` if given.
    pub fn create_instance<G: GraphicsDevice>(
        self: &Arc<Self>,
        device: Arc<G>,
        settings: Option<&dyn SettingsStore>,
    ) -> DenoiseResult<DenoiseInstance<G>> {
        let instance = DenoiseInstance::new(Arc::clone(self), device)?;
        if let Some(settings) = settings {
            instance.update(settings);
        }
        Ok(instance)
    }
}

impl std::fmt::Debug for FilterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterFactory")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("pool", &self.pool)
            .finish()
    }
}

// =============================================================================
// Process-wide instance
// =============================================================================

static FACTORY: Mutex<Option<Arc<FilterFactory>>> = Mutex::new(None);

fn global() -> MutexGuard<'static, Option<Arc<FilterFactory>>> {
    FACTORY.lock().unwrap_or_else(|e| e.into_inner())
}

/// Build the process-wide factory, or return the existing one.
pub fn initialize(config: FilterConfig, sdk: SharedSdk) -> DenoiseResult<Arc<FilterFactory>> {
    let mut global = global();
    if let Some(factory) = global.as_ref() {
        return Ok(Arc::clone(factory));
    }
    let factory = Arc::new(FilterFactory::new(config, sdk)?);
    if factory.is_enabled() {
        info!(id = FILTER_ID, "video denoising filter registered");
    } else {
        warn!(id = FILTER_ID, "video denoising filter not registered, no provider available");
    }
    *global = Some(Arc::clone(&factory));
    Ok(factory)
}

pub fn get() -> Option<Arc<FilterFactory>> {
    global().clone()
}

/// Drop the process-wide reference.
pub fn finalize() {
    global().take();
}
