//! The host graphics device seen by a filter.

use crate::context::ScopedContext;
use crate::texture::{NativeTexture, Size, TextureDesc};
use crate::GpuResult;

/// Fixed-function render state.
///
/// The default is the state used to capture an upstream source: all color
/// channels written, no blending, no depth or stencil test, no culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureState {
    pub color_write: [bool; 4],
    pub blending: bool,
    pub depth_test: bool,
    pub stencil_test: bool,
    pub culling: bool,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self {
            color_write: [true; 4],
            blending: false,
            depth_test: false,
            stencil_test: false,
            culling: false,
        }
    }
}

/// Graphics operations a video filter needs from its host.
///
/// The device is itself a [`ScopedContext`]: entering it makes the host
/// graphics context current on the calling thread. Every method other
/// than [`texture_size`](Self::texture_size) and
/// [`native_handle`](Self::native_handle) expects the context entered.
pub trait GraphicsDevice: ScopedContext + 'static {
    /// Shared texture handle. Clones refer to the same GPU resource.
    type Texture: Clone + Send + Sync + 'static;

    /// Allocate a texture.
    fn create_texture(&self, desc: &TextureDesc) -> GpuResult<Self::Texture>;

    /// Dimensions of a texture.
    fn texture_size(&self, texture: &Self::Texture) -> Size;

    /// API-native handle for cross-API interop.
    fn native_handle(&self, texture: &Self::Texture) -> NativeTexture;

    /// Copy the whole of `src` into `dst`. Sizes must match.
    fn copy_texture(&self, dst: &Self::Texture, src: &Self::Texture) -> GpuResult<()>;

    /// Redirect rendering into `target` until the matching pop.
    fn push_render_target(&self, target: &Self::Texture) -> GpuResult<()>;

    /// Restore the previous render target.
    fn pop_render_target(&self);

    /// Clear the current render target.
    fn clear(&self, color: [f32; 4]);

    /// Save blend and fixed-function state.
    fn push_blend_state(&self);

    /// Restore state saved by [`push_blend_state`](Self::push_blend_state).
    fn pop_blend_state(&self);

    /// Apply fixed-function state.
    fn set_capture_state(&self, state: CaptureState);

    /// Whether framebuffer sRGB conversion is enabled.
    fn framebuffer_srgb(&self) -> bool;

    fn set_framebuffer_srgb(&self, enabled: bool);

    /// The host's linear-sRGB preference for the current frame.
    fn linear_srgb(&self) -> bool;

    /// Draw `texture` as a quad of `size` into the current render target.
    fn draw_sprite(&self, texture: &Self::Texture, size: Size);
}
