//! Texture sizes, formats and descriptors.

use std::fmt;

/// Surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Smallest allocatable surface.
    pub const ONE: Size = Size { width: 1, height: 1 };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either axis is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel count.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel formats a filter may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFormat {
    /// 8-bit RGBA, normalized.
    #[default]
    Rgba8Unorm,
}

impl TextureFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgba8Unorm => 4,
        }
    }
}

/// Creation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureFlags {
    /// Texture can be bound as a render target.
    pub render_target: bool,
    /// Texture is shared with another API or process.
    pub shared: bool,
}

/// Opaque API-native texture handle.
///
/// Whatever the graphics API uses to name a texture: a D3D11 texture
/// pointer, a GL texture name, a wgpu-assigned id. Cross-API image
/// descriptors are initialized from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeTexture(pub u64);

/// Texture creation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub size: Size,
    pub format: TextureFormat,
    /// Mip levels including the base level.
    pub mip_levels: u32,
    pub flags: TextureFlags,
}

impl TextureDesc {
    /// RGBA8, single level, no flags.
    pub fn rgba(size: Size) -> Self {
        Self {
            size,
            format: TextureFormat::Rgba8Unorm,
            mip_levels: 1,
            flags: TextureFlags::default(),
        }
    }

    /// RGBA8 render target.
    pub fn render_target(size: Size) -> Self {
        Self {
            flags: TextureFlags {
                render_target: true,
                shared: false,
            },
            ..Self::rgba(size)
        }
    }

    /// Byte size of the base level.
    pub fn size_bytes(&self) -> usize {
        self.size.area() as usize * self.format.bytes_per_pixel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_empty() {
        assert!(Size::new(0, 10).is_empty());
        assert!(Size::new(10, 0).is_empty());
        assert!(!Size::ONE.is_empty());
    }

    #[test]
    fn test_size_display() {
        assert_eq!(Size::new(1920, 1080).to_string(), "1920x1080");
    }

    #[test]
    fn test_desc_bytes() {
        let desc = TextureDesc::render_target(Size::new(4, 3));
        assert!(desc.flags.render_target);
        assert_eq!(desc.mip_levels, 1);
        assert_eq!(desc.size_bytes(), 48);
    }
}
