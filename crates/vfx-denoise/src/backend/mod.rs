//! Denoise provider backends.
//!
//! ```text
//! Backend<G: GraphicsDevice>
//!     +-- NvidiaBackend (NVIDIA Video Effects over CUDA)
//! ```
//!
//! Every backend follows the same lifecycle: created unloaded, `load`
//! acquires the vendor SDK, `process` sizes its surfaces lazily, `unload`
//! releases everything and may be called any number of times.

mod nvidia;

pub use nvidia::NvidiaBackend;

use std::sync::Arc;

use vfx_gpu::{GraphicsDevice, Size};

use crate::sdk::SharedSdk;
use crate::{DenoiseError, DenoiseResult, ProviderId};

/// A loaded or loadable provider implementation.
pub enum Backend<G: GraphicsDevice> {
    Nvidia(NvidiaBackend<G>),
}

impl<G: GraphicsDevice> Backend<G> {
    /// Create the unloaded backend of a concrete provider.
    pub fn create(provider: ProviderId, device: Arc<G>, sdk: Arc<SharedSdk>) -> DenoiseResult<Self> {
        match provider {
            ProviderId::NvidiaVideoNoiseRemoval => Ok(Self::Nvidia(NvidiaBackend::new(device, sdk))),
            ProviderId::Automatic => Err(DenoiseError::ProviderUnavailable(provider)),
        }
    }

    pub fn provider(&self) -> ProviderId {
        match self {
            Self::Nvidia(_) => ProviderId::NvidiaVideoNoiseRemoval,
        }
    }

    pub fn is_loaded(&self) -> bool {
        match self {
            Self::Nvidia(b) => b.is_loaded(),
        }
    }

    pub fn load(&mut self) -> DenoiseResult<()> {
        match self {
            Self::Nvidia(b) => b.load(),
        }
    }

    pub fn unload(&mut self) -> DenoiseResult<()> {
        match self {
            Self::Nvidia(b) => b.unload(),
        }
    }

    /// Size this provider will process for an upstream of `requested`.
    pub fn negotiate_size(&self, requested: Size) -> Size {
        match self {
            Self::Nvidia(b) => b.negotiate_size(requested),
        }
    }

    /// Size the backend's surfaces are allocated at, if any.
    pub fn surface_size(&self) -> Option<Size> {
        match self {
            Self::Nvidia(b) => b.surface_size(),
        }
    }

    /// Denoise `input`, which must already be at `size`.
    pub fn process(&mut self, input: &G::Texture, size: Size) -> DenoiseResult<G::Texture> {
        match self {
            Self::Nvidia(b) => b.process(input, size),
        }
    }
}

impl<G: GraphicsDevice> std::fmt::Debug for Backend<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("provider", &self.provider())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
