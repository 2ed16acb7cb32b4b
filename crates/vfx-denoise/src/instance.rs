//! Filter instances.
//!
//! One [`DenoiseInstance`] exists per filtered source. Two threads touch it:
//! the host's render thread calls [`video_render`](DenoiseInstance::video_render)
//! every frame, and a pool worker runs provider switches requested by
//! [`update`](DenoiseInstance::update). They meet at the provider mutex,
//! which guards the current backend.
//!
//! A switch loads the new backend before unloading the old one, so vendor
//! SDK state shared between them survives the swap. While a switch runs
//! the ready flag is clear and every frame passes through unfiltered.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};
use vfx_gpu::{CaptureState, ContextScope, GraphicsDevice, Size, TextureDesc, TextureFormat};

use crate::backend::Backend;
use crate::factory::FilterFactory;
use crate::host::{Effect, FilterSource, DRAW_TECHNIQUE};
use crate::sdk::SharedSdk;
use crate::settings::{self, SettingsStore};
use crate::switch::{Request, SwitchSlot};
use crate::{DenoiseResult, ProviderId};

/// Observable lifecycle of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// No provider requested yet.
    Uninitialized,
    /// A provider switch is queued or running; frames pass through.
    Switching,
    /// Frames are denoised by this provider.
    Ready(ProviderId),
    /// The last switch could not load this provider; frames pass through
    /// until a later switch succeeds.
    Failed(ProviderId),
    /// Destroyed.
    Unloaded,
}

// =============================================================================
// Shared state
// =============================================================================

/// State shared between the instance and its switch jobs.
struct Shared<G: GraphicsDevice> {
    device: Arc<G>,
    sdk: Arc<SharedSdk>,
    /// The provider mutex.
    backend: Mutex<Option<Backend<G>>>,
    /// Set only while `backend` holds a fully loaded backend.
    ready: AtomicBool,
    slot: SwitchSlot,
}

impl<G: GraphicsDevice> Shared<G> {
    /// Run switches until the slot is empty.
    fn drain(&self) {
        while let Some(target) = self.slot.begin() {
            let loaded = panic::catch_unwind(AssertUnwindSafe(|| self.switch_provider(target)))
                .unwrap_or_else(|_| {
                    error!(provider = %target, "provider switch panicked");
                    false
                });
            self.slot.finish(target, loaded);
        }
    }

    /// Replace the current backend with a freshly loaded `target`.
    fn switch_provider(&self, target: ProviderId) -> bool {
        let mut current = lock(&self.backend);
        if self.slot.snapshot().closed {
            debug!(provider = %target, "instance destroyed, switch dropped");
            return false;
        }

        self.ready.store(false, Ordering::Release);

        let next = Backend::create(target, Arc::clone(&self.device), Arc::clone(&self.sdk))
            .and_then(|mut backend| backend.load().map(|()| backend));
        let next = match next {
            Ok(backend) => backend,
            Err(e) => {
                error!(provider = %target, error = %e, "failed to load denoise provider");
                return false;
            }
        };

        if let Some(mut prev) = current.take() {
            if let Err(e) = prev.unload() {
                error!(provider = %prev.provider(), error = %e, "failed to unload previous provider");
            }
        }
        *current = Some(next);
        self.ready.store(true, Ordering::Release);

        info!(provider = %target, "denoise provider ready");
        true
    }
}

/// Render-thread resources.
struct RenderState<G: GraphicsDevice> {
    /// Capture surface of the upstream frame; 1x1 between frames.
    input: Option<G::Texture>,
    /// Last surface returned by the backend.
    output: Option<G::Texture>,
}

// =============================================================================
// DenoiseInstance
// =============================================================================

/// A denoise filter attached to one source.
pub struct DenoiseInstance<G: GraphicsDevice> {
    shared: Arc<Shared<G>>,
    render: Mutex<RenderState<G>>,
    width: AtomicU32,
    height: AtomicU32,
    factory: Arc<FilterFactory>,
}

impl<G: GraphicsDevice> DenoiseInstance<G> {
    pub(crate) fn new(factory: Arc<FilterFactory>, device: Arc<G>) -> DenoiseResult<Self> {
        let input = {
            let _gfx = ContextScope::enter(&*device)?;
            device.create_texture(&TextureDesc::render_target(Size::ONE))?
        };

        Ok(Self {
            shared: Arc::new(Shared {
                device,
                sdk: factory.sdk(),
                backend: Mutex::new(None),
                ready: AtomicBool::new(false),
                slot: SwitchSlot::new(),
            }),
            render: Mutex::new(RenderState {
                input: Some(input),
                output: None,
            }),
            width: AtomicU32::new(1),
            height: AtomicU32::new(1),
            factory,
        })
    }

    /// Apply new settings. A provider change is scheduled, never awaited.
    pub fn update(&self, settings: &dyn SettingsStore) {
        let requested = match settings::provider(settings) {
            Ok(provider) => provider,
            Err(e) => {
                error!(error = %e, "ignoring settings update");
                return;
            }
        };
        let Some(target) = self.factory.registry().resolve(requested) else {
            warn!(provider = %requested, "no denoise provider available");
            return;
        };

        match self.shared.slot.request(target) {
            Request::Spawn => {
                let shared = Arc::clone(&self.shared);
                self.factory.pool().spawn(move || shared.drain());
                debug!(provider = %target, "provider switch scheduled");
            }
            Request::Queued => debug!(provider = %target, "pending provider switch replaced"),
            Request::Cancelled => debug!(provider = %target, "pending provider switch cancelled"),
            Request::Unchanged | Request::Closed => {}
        }
    }

    /// Settings loaded from a saved scene.
    pub fn load(&self, settings: &dyn SettingsStore) {
        self.update(settings);
    }

    pub fn state(&self) -> InstanceState {
        let slot = self.shared.slot.snapshot();
        if slot.closed {
            return InstanceState::Unloaded;
        }
        if slot.is_switching() {
            return InstanceState::Switching;
        }
        if self.shared.ready.load(Ordering::Acquire) {
            if let Some(provider) = slot.current {
                return InstanceState::Ready(provider);
            }
        }
        match slot.failed {
            Some(provider) => InstanceState::Failed(provider),
            None => InstanceState::Uninitialized,
        }
    }

    /// Provider currently denoising frames.
    pub fn provider(&self) -> Option<ProviderId> {
        match self.state() {
            InstanceState::Ready(provider) => Some(provider),
            _ => None,
        }
    }

    /// Wait for scheduled switches to finish. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.shared.slot.wait_idle(timeout)
    }

    /// Negotiated output width.
    pub fn get_width(&self) -> u32 {
        self.width.load(Ordering::Acquire)
    }

    /// Negotiated output height.
    pub fn get_height(&self) -> u32 {
        self.height.load(Ordering::Acquire)
    }

    pub fn video_tick(&self, _seconds: f32) {}

    /// Render one frame, or tell the host to skip the filter.
    pub fn video_render<S, E>(&self, source: &S, effect: &mut E)
    where
        S: FilterSource<G> + ?Sized,
        E: Effect<G::Texture> + ?Sized,
    {
        let frame = match self.process_frame(source) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                source.skip_video_filter();
                return;
            }
            Err(e) => {
                error!(error = %e, "denoising failed, skipping frame");
                source.skip_video_filter();
                return;
            }
        };

        let (output, size) = frame;
        let device = &*self.shared.device;
        effect.set_image(&output, device.linear_srgb());
        while effect.next_pass(DRAW_TECHNIQUE) {
            device.draw_sprite(&output, size);
        }
    }

    /// Destroy the instance, unloading its provider on this thread.
    pub fn destroy(self) {
        drop(self);
    }

    fn process_frame<S>(&self, source: &S) -> DenoiseResult<Option<(G::Texture, Size)>>
    where
        S: FilterSource<G> + ?Sized,
    {
        let Some((width, height)) = source.target_size() else {
            return Ok(None);
        };
        let upstream = Size::new(width, height);
        if upstream.is_empty() || !self.shared.ready.load(Ordering::Acquire) {
            trace!(%upstream, "not ready, passing through");
            return Ok(None);
        }

        let mut render = lock(&self.render);
        let result = self.process_locked(source, &mut render, upstream);
        self.reset_input(&mut render);

        if let Ok(Some((output, _))) = &result {
            render.output = Some(output.clone());
        }
        result
    }

    /// Negotiate, capture and denoise under the provider mutex.
    fn process_locked<S>(
        &self,
        source: &S,
        render: &mut RenderState<G>,
        upstream: Size,
    ) -> DenoiseResult<Option<(G::Texture, Size)>>
    where
        S: FilterSource<G> + ?Sized,
    {
        let mut current = lock(&self.shared.backend);
        if !self.shared.ready.load(Ordering::Acquire) {
            return Ok(None);
        }
        let Some(backend) = current.as_mut() else {
            return Ok(None);
        };

        let size = backend.negotiate_size(upstream);
        self.width.store(size.width, Ordering::Release);
        self.height.store(size.height, Ordering::Release);

        if !source.process_filter_begin(TextureFormat::Rgba8Unorm, true) {
            return Ok(None);
        }
        let input = self.capture(source, render, size)?;
        let output = backend.process(&input, size)?;
        Ok(Some((output, size)))
    }

    /// Draw the upstream into the capture surface at `size`.
    fn capture<S>(&self, source: &S, render: &mut RenderState<G>, size: Size) -> DenoiseResult<G::Texture>
    where
        S: FilterSource<G> + ?Sized,
    {
        let device = &*self.shared.device;
        let input = match render.input.take() {
            Some(texture) if device.texture_size(&texture) == size => texture,
            _ => device.create_texture(&TextureDesc::render_target(size))?,
        };
        render.input = Some(input.clone());

        device.push_render_target(&input)?;
        device.clear([0.0; 4]);
        device.push_blend_state();
        device.set_capture_state(CaptureState::default());

        let srgb = device.framebuffer_srgb();
        device.set_framebuffer_srgb(device.linear_srgb());
        source.process_filter_end(size);
        device.set_framebuffer_srgb(srgb);

        device.pop_blend_state();
        device.pop_render_target();
        Ok(input)
    }

    /// Shrink the capture surface back to 1x1.
    fn reset_input(&self, render: &mut RenderState<G>) {
        let device = &*self.shared.device;
        if render
            .input
            .as_ref()
            .is_some_and(|t| device.texture_size(t) == Size::ONE)
        {
            return;
        }
        match device.create_texture(&TextureDesc::render_target(Size::ONE)) {
            Ok(texture) => render.input = Some(texture),
            Err(e) => {
                render.input = None;
                warn!(error = %e, "failed to reset capture surface");
            }
        }
    }
}

impl<G: GraphicsDevice> Drop for DenoiseInstance<G> {
    fn drop(&mut self) {
        self.shared.slot.close();

        {
            let mut current = lock(&self.shared.backend);
            self.shared.ready.store(false, Ordering::Release);
            if let Some(mut backend) = current.take() {
                if let Err(e) = backend.unload() {
                    error!(provider = %backend.provider(), error = %e, "failed to unload provider on destroy");
                }
            }
        }

        let device = &*self.shared.device;
        let _gfx = ContextScope::enter(device)
            .map_err(|e| warn!(error = %e, "graphics context unavailable on destroy"))
            .ok();
        let mut render = lock(&self.render);
        render.input = None;
        render.output = None;
        debug!("denoise instance destroyed");
    }
}

impl<G: GraphicsDevice> std::fmt::Debug for DenoiseInstance<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenoiseInstance")
            .field("state", &self.state())
            .field("width", &self.get_width())
            .field("height", &self.get_height())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
