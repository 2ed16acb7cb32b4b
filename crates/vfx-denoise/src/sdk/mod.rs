//! Vendor video effects SDK seam.
//!
//! The NVIDIA backend drives three vendor libraries: the CUDA driver, the
//! cross-API image library (`NvCVImage`) and the video effects library.
//! [`VideoEffectsSdk`] is the narrow surface of those libraries the backend
//! uses; hosts provide an implementation over the real libraries and tests
//! provide a mock.
//!
//! Loading the libraries is expensive and their state is process-wide, so
//! [`SharedSdk`] hands out one reference-counted instance. The SDK is
//! released when the last backend (or registry) holding it drops its `Arc`.

#[cfg(feature = "cuda")]
mod cuda;

#[cfg(feature = "cuda")]
pub use cuda::CudaComputeContext;

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;
use vfx_gpu::{NativeTexture, ScopedContext, Size};

/// Effect selector of the noise removal effect.
pub const DENOISE_EFFECT: &str = "Denoising";

/// A failed vendor call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct SdkError {
    /// Vendor status code.
    pub code: i32,
    pub message: String,
}

impl SdkError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result of a vendor call.
pub type SdkResult<T> = Result<T, SdkError>;

/// Cross-API image descriptor.
///
/// Wraps a graphics texture so the compute side can read or write it. A
/// descriptor with zero width is not allocated; releasing one is a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CvImage {
    /// Vendor-side handle.
    pub handle: u64,
    /// Texture the descriptor was initialized from.
    pub source: Option<NativeTexture>,
    pub size: Size,
    /// Mapped onto the compute stream.
    pub mapped: bool,
}

impl CvImage {
    pub fn new(handle: u64, source: NativeTexture, size: Size) -> Self {
        Self {
            handle,
            source: Some(source),
            size,
            mapped: false,
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.size.width != 0
    }
}

/// Vendor effect instance handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle(pub u64);

/// Image binding points of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    Source,
    Destination,
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Destination => "destination",
        })
    }
}

/// Outcome of running an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The destination image holds a new frame.
    Produced,
    /// The effect ran but wrote nothing.
    Empty,
}

/// Vendor video effects libraries as used by the NVIDIA backend.
///
/// Every call except [`error_string`](Self::error_string) expects the host
/// graphics context and then [`compute_context`](Self::compute_context)
/// entered on the calling thread.
pub trait VideoEffectsSdk: Send + Sync {
    /// The compute (CUDA) context the libraries run on.
    fn compute_context(&self) -> &dyn ScopedContext;

    /// Initialize a descriptor over a graphics texture.
    fn image_init(&self, texture: NativeTexture, size: Size) -> SdkResult<CvImage>;

    /// Map a descriptor onto the compute stream.
    fn image_map(&self, image: &mut CvImage) -> SdkResult<()>;

    /// Undo [`image_map`](Self::image_map).
    fn image_unmap(&self, image: &mut CvImage) -> SdkResult<()>;

    /// Release a descriptor, leaving it unallocated.
    fn image_dealloc(&self, image: &mut CvImage);

    /// Create an effect instance for `selector`.
    fn effect_create(&self, selector: &str) -> SdkResult<EffectHandle>;

    /// Bind an image to one of the effect's slots.
    fn effect_set_image(&self, effect: EffectHandle, slot: ImageSlot, image: &CvImage) -> SdkResult<()>;

    /// (Re)load the effect's models for the bound images.
    fn effect_load(&self, effect: EffectHandle) -> SdkResult<()>;

    fn effect_run(&self, effect: EffectHandle) -> SdkResult<RunStatus>;

    fn effect_destroy(&self, effect: EffectHandle);

    /// Human-readable text for a vendor status code.
    fn error_string(&self, code: i32) -> String {
        format!("vendor status {code}")
    }
}

/// Loads the vendor libraries.
pub type SdkLoader = Box<dyn Fn() -> SdkResult<Arc<dyn VideoEffectsSdk>> + Send + Sync>;

/// Process-wide, reference-counted vendor SDK.
///
/// ```ignore
/// let shared = SharedSdk::new(|| load_vendor_sdk());
/// let a = shared.acquire()?;
/// let b = shared.acquire()?; // same instance, loader not called again
/// ```
pub struct SharedSdk {
    loader: SdkLoader,
    live: Mutex<Option<Weak<dyn VideoEffectsSdk>>>,
}

impl SharedSdk {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> SdkResult<Arc<dyn VideoEffectsSdk>> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            live: Mutex::new(None),
        }
    }

    /// An SDK that is never available, for hosts without the vendor
    /// libraries.
    pub fn unavailable() -> Self {
        Self::new(|| Err(SdkError::new(-1, "video effects libraries not installed")))
    }

    /// Share the live SDK or load it.
    pub fn acquire(&self) -> SdkResult<Arc<dyn VideoEffectsSdk>> {
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sdk) = live.as_ref().and_then(Weak::upgrade) {
            return Ok(sdk);
        }
        let sdk = (self.loader)()?;
        *live = Some(Arc::downgrade(&sdk));
        Ok(sdk)
    }

    /// True while some holder keeps the SDK alive.
    pub fn is_loaded(&self) -> bool {
        let live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        live.as_ref().is_some_and(|w| w.strong_count() > 0)
    }
}

impl fmt::Debug for SharedSdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSdk")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
