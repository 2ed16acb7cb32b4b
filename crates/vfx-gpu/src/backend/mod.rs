//! Graphics device implementations.
//!
//! - [`CpuDevice`]: textures in system memory, always available.
//! - `WgpuDevice`: real GPU textures via wgpu (feature `wgpu`).

mod cpu_backend;

#[cfg(feature = "wgpu")]
mod wgpu_backend;

pub use cpu_backend::{CpuDevice, CpuDeviceStats, CpuTexture};

#[cfg(feature = "wgpu")]
pub use wgpu_backend::{WgpuDevice, WgpuTexture};
