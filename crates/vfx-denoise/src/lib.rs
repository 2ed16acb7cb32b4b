//! Per-source video denoising filter.
//!
//! A [`DenoiseInstance`] sits between an upstream video source and the
//! host compositor. On every render tick it captures the upstream frame,
//! hands it to the active denoise provider and draws the provider's output
//! in place of the source. Providers are hot-swappable: a settings update
//! schedules a provider switch on a background worker while rendering keeps
//! skipping the filter until the new provider is loaded.
//!
//! # Architecture
//!
//! ```text
//! FilterFactory (process-wide, initialize/get/finalize)
//!     ├── ProviderRegistry (availability + priority)
//!     ├── SharedSdk (reference-counted vendor SDK)
//!     ├── WorkerPool (rayon)
//!     └── DenoiseInstance<G: GraphicsDevice>
//!             ├── SwitchSlot (coalescing provider switches)
//!             └── Backend
//!                     └── NvidiaBackend (VideoEffectsSdk + CUDA)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vfx_denoise::{factory, FilterConfig, MemorySettings, ProviderId, SharedSdk};
//! use vfx_gpu::CpuDevice;
//!
//! let factory = factory::initialize(FilterConfig::default(), SharedSdk::new(load_vendor_sdk))?;
//! let settings = MemorySettings::with_provider(ProviderId::Automatic);
//! let instance = factory.create_instance(Arc::new(CpuDevice::new()), Some(&settings))?;
//!
//! // render thread
//! instance.video_render(&source, &mut effect);
//! ```

pub mod backend;
pub mod config;
pub mod factory;
pub mod host;
pub mod instance;
pub mod pool;
pub mod provider;
pub mod registry;
pub mod sdk;
pub mod settings;
pub mod size;
mod switch;

pub use backend::{Backend, NvidiaBackend};
pub use config::FilterConfig;
pub use factory::{FilterFactory, FilterInfo, FilterProperties, ProviderChoice};
pub use host::{Effect, FilterSource};
pub use instance::{DenoiseInstance, InstanceState};
pub use pool::WorkerPool;
pub use provider::ProviderId;
pub use registry::{ProviderInfo, ProviderRegistry};
pub use sdk::{
    CvImage, EffectHandle, ImageSlot, RunStatus, SdkError, SdkLoader, SharedSdk, VideoEffectsSdk,
};
pub use settings::{MemorySettings, SettingsStore};
pub use size::negotiate_size;

use thiserror::Error;
use vfx_gpu::GpuError;

/// Denoise filter errors.
#[derive(Error, Debug)]
pub enum DenoiseError {
    #[error("Provider not available: {0}")]
    ProviderUnavailable(ProviderId),

    #[error("Failed to load provider backend: {0}")]
    BackendInit(String),

    #[error("Failed to (re)allocate backend surface: {0}")]
    BackendSurface(String),

    #[error("Failed to unmap backend surface: {0}")]
    BackendUnmap(#[source] SdkError),

    #[error("Provider {0} did not return a result")]
    NoResult(ProviderId),

    #[error("Missing conversion entry for provider value {0}")]
    MissingConversion(i64),

    #[error("Video effects call failed: {0}")]
    Sdk(#[from] SdkError),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker pool error: {0}")]
    Pool(String),
}

pub type DenoiseResult<T> = Result<T, DenoiseError>;
