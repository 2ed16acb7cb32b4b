//! Scoped context entry.
//!
//! Graphics and compute APIs keep a "current context" per thread. Work on
//! shared textures must happen with the right contexts entered, and every
//! exit path has to leave them again. [`ContextScope`] ties the leave to
//! `Drop`, so nested scopes unwind in reverse order on `?` and panics alike:
//!
//! ```
//! use vfx_gpu::{ContextScope, CpuDevice};
//!
//! let device = CpuDevice::new();
//! {
//!     let _gfx = ContextScope::enter(&device).unwrap();
//!     assert_eq!(device.context_depth(), 1);
//! }
//! assert_eq!(device.context_depth(), 0);
//! ```

use crate::GpuResult;

/// A context that must be entered before use and left afterwards.
pub trait ScopedContext: Send + Sync {
    /// Make this context current on the calling thread.
    fn enter(&self) -> GpuResult<()>;

    /// Undo a successful [`enter`](Self::enter).
    fn leave(&self);
}

/// Guard that leaves its context on drop.
#[must_use = "the context is left as soon as the scope is dropped"]
pub struct ContextScope<'a, C: ScopedContext + ?Sized> {
    ctx: &'a C,
}

impl<'a, C: ScopedContext + ?Sized> ContextScope<'a, C> {
    /// Enter `ctx` until the returned guard is dropped.
    pub fn enter(ctx: &'a C) -> GpuResult<Self> {
        ctx.enter()?;
        Ok(Self { ctx })
    }
}

impl<C: ScopedContext + ?Sized> Drop for ContextScope<'_, C> {
    fn drop(&mut self) {
        self.ctx.leave();
    }
}
