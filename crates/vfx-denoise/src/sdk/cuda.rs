//! CUDA compute context for vendor SDK implementations.
//!
//! Requires the `cuda` feature and an NVIDIA GPU.

use std::sync::Arc;

use cudarc::driver::{CudaContext, CudaStream};
use tracing::debug;
use vfx_gpu::{GpuError, GpuResult, ScopedContext};

use super::{SdkError, SdkResult};

/// A CUDA context made current per thread through [`ScopedContext`].
///
/// SDK implementations return this from
/// [`VideoEffectsSdk::compute_context`](super::VideoEffectsSdk::compute_context)
/// and map their images onto [`stream`](Self::stream).
pub struct CudaComputeContext {
    ctx: Arc<CudaContext>,
    stream: Arc<CudaStream>,
}

impl CudaComputeContext {
    /// Open the primary context of device `ordinal`.
    pub fn new(ordinal: usize) -> SdkResult<Self> {
        let ctx = CudaContext::new(ordinal)
            .map_err(|e| SdkError::new(-1, format!("CUDA init failed: {e:?}")))?;
        let stream = ctx.default_stream();
        debug!(ordinal, "opened CUDA context");
        Ok(Self { ctx, stream })
    }

    /// Check if a CUDA device is present.
    pub fn is_available() -> bool {
        CudaContext::new(0).is_ok()
    }

    pub fn context(&self) -> &Arc<CudaContext> {
        &self.ctx
    }

    /// Stream images are mapped onto.
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }
}

impl ScopedContext for CudaComputeContext {
    fn enter(&self) -> GpuResult<()> {
        self.ctx
            .bind_to_thread()
            .map_err(|e| GpuError::ContextEnter(format!("CUDA: {e:?}")))
    }

    // The primary context stays bound; the next enter rebinds it.
    fn leave(&self) {}
}
