//! Host graphics abstraction for GPU video filters.
//!
//! Video filters run inside a host pipeline that owns the graphics API.
//! This crate describes the slice of that API a filter needs: textures,
//! render targets, the capture render state, and scoped context entry.
//!
//! # Architecture
//!
//! ```text
//! GraphicsDevice (host graphics API, also a ScopedContext)
//!     ├── CpuDevice  (in-memory RGBA8 textures)
//!     └── WgpuDevice (Vulkan/Metal/DX12 via wgpu)
//! ```
//!
//! # Example
//!
//! ```
//! use vfx_gpu::{ContextScope, CpuDevice, GraphicsDevice, Size, TextureDesc};
//!
//! let device = CpuDevice::new();
//! let _gfx = ContextScope::enter(&device).unwrap();
//! let tex = device.create_texture(&TextureDesc::rgba(Size::new(4, 2))).unwrap();
//! assert_eq!(device.texture_size(&tex), Size::new(4, 2));
//! ```

pub mod backend;
pub mod context;
pub mod device;
pub mod texture;

pub use backend::{CpuDevice, CpuDeviceStats, CpuTexture};
#[cfg(feature = "wgpu")]
pub use backend::{WgpuDevice, WgpuTexture};
pub use context::{ContextScope, ScopedContext};
pub use device::{CaptureState, GraphicsDevice};
pub use texture::{NativeTexture, Size, TextureDesc, TextureFlags, TextureFormat};

use thiserror::Error;

/// Graphics operation errors
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to create device: {0}")]
    DeviceCreation(String),

    #[error("Failed to create texture: {0}")]
    TextureCreation(String),

    #[error("Invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    #[error("Texture size mismatch: destination {dst}, source {src}")]
    SizeMismatch { dst: Size, src: Size },

    #[error("Failed to enter graphics context: {0}")]
    ContextEnter(String),

    #[error("GPU operation failed: {0}")]
    OperationFailed(String),
}

pub type GpuResult<T> = Result<T, GpuError>;
