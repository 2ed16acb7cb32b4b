//! What the filter needs from the host compositor.

use vfx_gpu::{GraphicsDevice, Size, TextureFormat};

/// The filter's position in the host's source graph, for one frame.
pub trait FilterSource<G: GraphicsDevice> {
    /// Base size of the upstream target, `None` if there is no upstream.
    fn target_size(&self) -> Option<(u32, u32)>;

    /// Pass the upstream frame through unmodified this frame.
    fn skip_video_filter(&self);

    /// Open a filter transaction. `false` means the host declined and the
    /// frame must be skipped.
    fn process_filter_begin(&self, format: TextureFormat, allow_direct: bool) -> bool;

    /// Draw the upstream into the current render target at `size` and
    /// close the transaction.
    fn process_filter_end(&self, size: Size);
}

/// The host's draw effect.
pub trait Effect<T> {
    /// Bind `texture` to the image parameter, decoding sRGB if `srgb`.
    fn set_image(&mut self, texture: &T, srgb: bool);

    /// Advance to the next pass of `technique`. Returns `false` when all
    /// passes are done.
    fn next_pass(&mut self, technique: &str) -> bool;
}

/// Technique the output is drawn with.
pub const DRAW_TECHNIQUE: &str = "Draw";
