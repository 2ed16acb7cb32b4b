//! CPU graphics device.
//!
//! Textures live in system memory as tightly packed RGBA8 rows. The device
//! keeps the same state stacks a GPU host would (render targets, blend
//! state, framebuffer sRGB) and counts the calls made against it, which
//! makes filter render paths observable without a GPU.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use crate::context::ScopedContext;
use crate::device::{CaptureState, GraphicsDevice};
use crate::texture::{NativeTexture, Size, TextureDesc};
use crate::{GpuError, GpuResult};

// =============================================================================
// CpuTexture
// =============================================================================

/// RGBA8 texture in system memory.
pub struct CpuTexture {
    id: u64,
    desc: TextureDesc,
    pixels: Mutex<Vec<u8>>,
}

impl CpuTexture {
    /// Texture descriptor.
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    /// Device-unique id, also used as the native handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Copy of the pixel data.
    pub fn read_pixels(&self) -> Vec<u8> {
        lock(&self.pixels).clone()
    }

    /// Replace the pixel data.
    pub fn write_pixels(&self, data: &[u8]) -> GpuResult<()> {
        let mut pixels = lock(&self.pixels);
        if data.len() != pixels.len() {
            return Err(GpuError::OperationFailed(format!(
                "pixel buffer is {} bytes, texture needs {}",
                data.len(),
                pixels.len()
            )));
        }
        pixels.copy_from_slice(data);
        Ok(())
    }

    /// Fill every pixel with `rgba`.
    pub fn fill(&self, rgba: [u8; 4]) {
        for px in lock(&self.pixels).chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }
}

impl fmt::Debug for CpuTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuTexture")
            .field("id", &self.id)
            .field("size", &self.desc.size)
            .field("render_target", &self.desc.flags.render_target)
            .finish()
    }
}

// =============================================================================
// CpuDevice
// =============================================================================

/// Call counters and state-stack depths of a [`CpuDevice`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuDeviceStats {
    pub textures_created: u64,
    pub texture_copies: u64,
    pub clears: u64,
    pub sprites_drawn: u64,
    pub last_sprite_size: Option<Size>,
    pub render_target_depth: usize,
    pub blend_depth: usize,
}

#[derive(Default)]
struct DeviceState {
    render_targets: Vec<Arc<CpuTexture>>,
    blend_stack: Vec<CaptureState>,
    capture_state: CaptureState,
    framebuffer_srgb: bool,
    linear_srgb: bool,
    stats: CpuDeviceStats,
}

/// Graphics device backed by system memory.
#[derive(Default)]
pub struct CpuDevice {
    next_id: AtomicU64,
    context_depth: AtomicUsize,
    state: Mutex<DeviceState>,
}

impl CpuDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unmatched [`ScopedContext::enter`] calls.
    pub fn context_depth(&self) -> usize {
        self.context_depth.load(Ordering::Acquire)
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> CpuDeviceStats {
        let state = self.state();
        CpuDeviceStats {
            render_target_depth: state.render_targets.len(),
            blend_depth: state.blend_stack.len(),
            ..state.stats.clone()
        }
    }

    /// Set the host's linear-sRGB preference.
    pub fn set_linear_srgb(&self, enabled: bool) {
        self.state().linear_srgb = enabled;
    }

    /// Fixed-function state currently applied.
    pub fn capture_state(&self) -> CaptureState {
        self.state().capture_state
    }

    /// Texture currently receiving draws.
    pub fn current_render_target(&self) -> Option<Arc<CpuTexture>> {
        self.state().render_targets.last().cloned()
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        lock(&self.state)
    }
}

impl fmt::Debug for CpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuDevice")
            .field("context_depth", &self.context_depth())
            .field("stats", &self.stats())
            .finish()
    }
}

impl ScopedContext for CpuDevice {
    fn enter(&self) -> GpuResult<()> {
        self.context_depth.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn leave(&self) {
        self.context_depth.fetch_sub(1, Ordering::AcqRel);
    }
}

impl GraphicsDevice for CpuDevice {
    type Texture = Arc<CpuTexture>;

    fn create_texture(&self, desc: &TextureDesc) -> GpuResult<Self::Texture> {
        if desc.size.is_empty() {
            return Err(GpuError::InvalidDimensions(desc.size.width, desc.size.height));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.state().stats.textures_created += 1;
        trace!(id, size = %desc.size, "texture created");
        Ok(Arc::new(CpuTexture {
            id,
            desc: *desc,
            pixels: Mutex::new(vec![0; desc.size_bytes()]),
        }))
    }

    fn texture_size(&self, texture: &Self::Texture) -> Size {
        texture.desc.size
    }

    fn native_handle(&self, texture: &Self::Texture) -> NativeTexture {
        NativeTexture(texture.id)
    }

    fn copy_texture(&self, dst: &Self::Texture, src: &Self::Texture) -> GpuResult<()> {
        if dst.desc.size != src.desc.size {
            return Err(GpuError::SizeMismatch {
                dst: dst.desc.size,
                src: src.desc.size,
            });
        }
        if !Arc::ptr_eq(dst, src) {
            let data = src.read_pixels();
            dst.write_pixels(&data)?;
        }
        self.state().stats.texture_copies += 1;
        Ok(())
    }

    fn push_render_target(&self, target: &Self::Texture) -> GpuResult<()> {
        if !target.desc.flags.render_target {
            return Err(GpuError::OperationFailed(format!(
                "texture {} is not a render target",
                target.id
            )));
        }
        self.state().render_targets.push(target.clone());
        Ok(())
    }

    fn pop_render_target(&self) {
        self.state().render_targets.pop();
    }

    fn clear(&self, color: [f32; 4]) {
        let target = {
            let mut state = self.state();
            state.stats.clears += 1;
            state.render_targets.last().cloned()
        };
        if let Some(target) = target {
            target.fill(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8));
        }
    }

    fn push_blend_state(&self) {
        let mut state = self.state();
        let current = state.capture_state;
        state.blend_stack.push(current);
    }

    fn pop_blend_state(&self) {
        let mut state = self.state();
        if let Some(prev) = state.blend_stack.pop() {
            state.capture_state = prev;
        }
    }

    fn set_capture_state(&self, capture: CaptureState) {
        self.state().capture_state = capture;
    }

    fn framebuffer_srgb(&self) -> bool {
        self.state().framebuffer_srgb
    }

    fn set_framebuffer_srgb(&self, enabled: bool) {
        self.state().framebuffer_srgb = enabled;
    }

    fn linear_srgb(&self) -> bool {
        self.state().linear_srgb
    }

    fn draw_sprite(&self, texture: &Self::Texture, size: Size) {
        let target = {
            let mut state = self.state();
            state.stats.sprites_drawn += 1;
            state.stats.last_sprite_size = Some(size);
            state.render_targets.last().cloned()
        };
        // Unscaled blit only; scaled sprites are counted but not rasterized.
        if let Some(target) = target {
            if target.desc.size == size && texture.desc.size == size && !Arc::ptr_eq(&target, texture) {
                let data = texture.read_pixels();
                let _ = target.write_pixels(&data);
            }
        }
    }
}

/// Lock ignoring poison; device state stays usable after a panicking caller.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
