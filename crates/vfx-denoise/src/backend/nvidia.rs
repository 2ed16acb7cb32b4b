//! NVIDIA Video Effects noise removal.
//!
//! The effect reads a source image and writes a destination image, both
//! cross-API descriptors over graphics textures. Both surfaces are sized
//! lazily on the first frame and whenever the negotiated size changes;
//! after each reallocation the images are rebound and the effect reloaded.

use std::sync::Arc;

use tracing::{debug, error};
use vfx_gpu::{ContextScope, GraphicsDevice, Size, TextureDesc};

use crate::sdk::{
    CvImage, EffectHandle, ImageSlot, RunStatus, SdkError, SharedSdk, VideoEffectsSdk,
    DENOISE_EFFECT,
};
use crate::size::negotiate_size;
use crate::{DenoiseError, DenoiseResult, ProviderId};

// =============================================================================
// Surface
// =============================================================================

/// A graphics texture and the descriptor mapping it for the effect.
struct Surface<G: GraphicsDevice> {
    texture: Option<G::Texture>,
    image: CvImage,
}

impl<G: GraphicsDevice> Default for Surface<G> {
    fn default() -> Self {
        Self {
            texture: None,
            image: CvImage::default(),
        }
    }
}

impl<G: GraphicsDevice> Surface<G> {
    fn matches(&self, device: &G, size: Size) -> bool {
        self.image.mapped
            && self
                .texture
                .as_ref()
                .is_some_and(|t| device.texture_size(t) == size)
    }

    /// Unmap, then deallocate. The descriptor is released even when the
    /// unmap fails.
    fn release(&mut self, sdk: &dyn VideoEffectsSdk) -> Result<(), SdkError> {
        let mut result = Ok(());
        if self.image.is_allocated() {
            if self.image.mapped {
                result = sdk.image_unmap(&mut self.image);
            }
            sdk.image_dealloc(&mut self.image);
            self.image = CvImage::default();
        }
        self.texture = None;
        result
    }

    fn reallocate(&mut self, device: &G, sdk: &dyn VideoEffectsSdk, size: Size) -> DenoiseResult<()> {
        self.release(sdk).map_err(|e| surface_err("unmap", e))?;

        let texture = device
            .create_texture(&TextureDesc::rgba(size))
            .map_err(|e| DenoiseError::BackendSurface(format!("texture: {e}")))?;
        self.image = sdk
            .image_init(device.native_handle(&texture), size)
            .map_err(|e| surface_err("init", e))?;
        self.texture = Some(texture);
        sdk.image_map(&mut self.image).map_err(|e| surface_err("map", e))
    }
}

fn surface_err(step: &str, e: SdkError) -> DenoiseError {
    DenoiseError::BackendSurface(format!("{step}: {e}"))
}

fn init_err(e: impl std::fmt::Display) -> DenoiseError {
    DenoiseError::BackendInit(e.to_string())
}

// =============================================================================
// NvidiaBackend
// =============================================================================

/// Noise removal through NVIDIA Video Effects.
pub struct NvidiaBackend<G: GraphicsDevice> {
    device: Arc<G>,
    shared: Arc<SharedSdk>,
    sdk: Option<Arc<dyn VideoEffectsSdk>>,
    effect: Option<EffectHandle>,
    input: Surface<G>,
    output: Surface<G>,
    /// Images bound to the effect and the effect loaded for them.
    bound: bool,
}

impl<G: GraphicsDevice> NvidiaBackend<G> {
    /// An unloaded backend. Nothing is acquired until [`load`](Self::load).
    pub fn new(device: Arc<G>, sdk: Arc<SharedSdk>) -> Self {
        Self {
            device,
            shared: sdk,
            sdk: None,
            effect: None,
            input: Surface::default(),
            output: Surface::default(),
            bound: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.sdk.is_some()
    }

    /// Size the output surface is currently allocated at.
    pub fn surface_size(&self) -> Option<Size> {
        self.output.texture.as_ref().map(|t| self.device.texture_size(t))
    }

    pub fn negotiate_size(&self, requested: Size) -> Size {
        negotiate_size(ProviderId::NvidiaVideoNoiseRemoval, requested)
    }

    /// Acquire the SDK and create the effect.
    pub fn load(&mut self) -> DenoiseResult<()> {
        if self.sdk.is_some() {
            return Ok(());
        }
        let sdk = self.shared.acquire().map_err(init_err)?;

        let device = Arc::clone(&self.device);
        let effect = {
            let _gfx = ContextScope::enter(&*device).map_err(init_err)?;
            let _cuda = ContextScope::enter(sdk.compute_context()).map_err(init_err)?;
            sdk.effect_create(DENOISE_EFFECT)
                .map_err(|e| init_err(format!("effect '{DENOISE_EFFECT}': {e}")))?
        };

        debug!(effect = effect.0, "NVIDIA noise removal loaded");
        self.effect = Some(effect);
        self.sdk = Some(sdk);
        self.bound = false;
        Ok(())
    }

    /// Release surfaces, the effect and the SDK. No-op when not loaded.
    pub fn unload(&mut self) -> DenoiseResult<()> {
        let Some(sdk) = self.sdk.clone() else {
            return Ok(());
        };

        let device = Arc::clone(&self.device);
        let released = {
            let _gfx = ContextScope::enter(&*device)?;
            let _cuda = ContextScope::enter(sdk.compute_context())?;
            let released = self.release_surfaces(&*sdk);
            if let Some(effect) = self.effect.take() {
                sdk.effect_destroy(effect);
            }
            released
        };
        self.sdk = None;

        released.map_err(|e| {
            error!(error = %e, "failed to unmap surface while unloading");
            DenoiseError::BackendUnmap(e)
        })
    }

    /// Denoise `input` (already at `size`) and return the output surface.
    pub fn process(&mut self, input: &G::Texture, size: Size) -> DenoiseResult<G::Texture> {
        let (Some(sdk), Some(effect)) = (self.sdk.clone(), self.effect) else {
            return Err(DenoiseError::BackendInit("backend is not loaded".into()));
        };

        let device = Arc::clone(&self.device);
        let _gfx = ContextScope::enter(&*device)?;
        let _cuda = ContextScope::enter(sdk.compute_context())?;

        if let Err(e) = self.ensure_surfaces(&*sdk, effect, size) {
            if let Err(unmap) = self.release_surfaces(&*sdk) {
                error!(error = %unmap, "failed to release surfaces after allocation failure");
            }
            return Err(e);
        }

        let (Some(src), Some(dst)) = (self.input.texture.as_ref(), self.output.texture.as_ref()) else {
            return Err(DenoiseError::BackendSurface("surfaces not allocated".into()));
        };
        device.copy_texture(src, input)?;

        match sdk.effect_run(effect)? {
            RunStatus::Produced => Ok(dst.clone()),
            RunStatus::Empty => Err(DenoiseError::NoResult(ProviderId::NvidiaVideoNoiseRemoval)),
        }
    }

    fn ensure_surfaces(
        &mut self,
        sdk: &dyn VideoEffectsSdk,
        effect: EffectHandle,
        size: Size,
    ) -> DenoiseResult<()> {
        let device = &*self.device;
        let mut changed = false;
        for (slot, surface) in [
            (ImageSlot::Source, &mut self.input),
            (ImageSlot::Destination, &mut self.output),
        ] {
            if surface.matches(device, size) {
                continue;
            }
            debug!(%slot, %size, "reallocating surface");
            surface.reallocate(device, sdk, size)?;
            changed = true;
        }

        if changed || !self.bound {
            self.bound = false;
            sdk.effect_set_image(effect, ImageSlot::Source, &self.input.image)
                .map_err(|e| surface_err("bind source", e))?;
            sdk.effect_set_image(effect, ImageSlot::Destination, &self.output.image)
                .map_err(|e| surface_err("bind destination", e))?;
            sdk.effect_load(effect).map_err(|e| surface_err("reload effect", e))?;
            self.bound = true;
        }
        Ok(())
    }

    fn release_surfaces(&mut self, sdk: &dyn VideoEffectsSdk) -> Result<(), SdkError> {
        self.bound = false;
        let input = self.input.release(sdk);
        let output = self.output.release(sdk);
        input.and(output)
    }
}

impl<G: GraphicsDevice> Drop for NvidiaBackend<G> {
    fn drop(&mut self) {
        if self.is_loaded() {
            if let Err(e) = self.unload() {
                error!(error = %e, "failed to unload NVIDIA backend on drop");
            }
        }
    }
}
