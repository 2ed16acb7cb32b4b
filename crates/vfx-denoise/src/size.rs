//! Size negotiation.
//!
//! Each provider accepts a bounded range of frame sizes. The negotiated
//! size is what the filter reports to the host and what the backend
//! allocates its surfaces at; the upstream frame is scaled into it.

use vfx_gpu::Size;

use crate::ProviderId;

/// Width bounds when the frame is landscape.
pub const NVIDIA_WIDTH_RANGE: (u32, u32) = (142, 1920);
/// Height bounds when the frame is portrait or square.
pub const NVIDIA_HEIGHT_RANGE: (u32, u32) = (80, 1080);

/// Size `provider` will process for an upstream frame of `requested`.
///
/// Pure and deterministic; both outputs are at least 1.
pub fn negotiate_size(provider: ProviderId, requested: Size) -> Size {
    match provider {
        ProviderId::NvidiaVideoNoiseRemoval => clamp_dominant_axis(
            requested,
            NVIDIA_WIDTH_RANGE,
            NVIDIA_HEIGHT_RANGE,
        ),
        ProviderId::Automatic => Size::new(requested.width.max(1), requested.height.max(1)),
    }
}

/// Clamp the longer axis into its range and derive the other from the
/// input aspect ratio.
fn clamp_dominant_axis(size: Size, width_range: (u32, u32), height_range: (u32, u32)) -> Size {
    let Size { width, height } = size;
    if width == 0 || height == 0 {
        return Size::new(width.max(1), height.max(1));
    }

    if width > height {
        let w = width.clamp(width_range.0, width_range.1);
        let h = scale(w, height, width);
        Size::new(w, h)
    } else {
        let h = height.clamp(height_range.0, height_range.1);
        let w = scale(h, width, height);
        Size::new(w, h)
    }
}

/// `round(clamped * num / den)`, at least 1.
#[inline]
fn scale(clamped: u32, num: u32, den: u32) -> u32 {
    let v = (clamped as f64 * num as f64 / den as f64).round();
    (v as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nv(w: u32, h: u32) -> Size {
        negotiate_size(ProviderId::NvidiaVideoNoiseRemoval, Size::new(w, h))
    }

    #[test]
    fn test_uhd_downscales_to_hd() {
        assert_eq!(nv(3840, 2160), Size::new(1920, 1080));
    }

    #[test]
    fn test_small_landscape_upscales() {
        assert_eq!(nv(80, 40), Size::new(142, 71));
    }

    #[test]
    fn test_in_range_is_unchanged() {
        assert_eq!(nv(1280, 720), Size::new(1280, 720));
        assert_eq!(nv(720, 1080), Size::new(720, 1080));
    }

    #[test]
    fn test_portrait_clamps_height() {
        assert_eq!(nv(1080, 1920), Size::new(608, 1080));
        assert_eq!(nv(30, 40), Size::new(60, 80));
    }

    #[test]
    fn test_square_uses_height_range() {
        assert_eq!(nv(2000, 2000), Size::new(1080, 1080));
        assert_eq!(nv(10, 10), Size::new(80, 80));
    }

    #[test]
    fn test_extreme_aspect_never_zero() {
        assert_eq!(nv(100_000, 1), Size::new(1920, 1));
        assert_eq!(nv(1, 100_000), Size::new(1, 1080));
    }

    #[test]
    fn test_idempotent() {
        let sizes = [
            (3840, 2160),
            (80, 40),
            (1280, 720),
            (1080, 1920),
            (640, 480),
            (7680, 4320),
            (200, 3000),
            (1, 1),
            (143, 142),
        ];
        for (w, h) in sizes {
            let once = nv(w, h);
            assert_eq!(nv(once.width, once.height), once, "{w}x{h}");
        }
    }

    #[test]
    fn test_aspect_preserved() {
        for (w, h) in [(3840, 2160), (1000, 750), (4096, 2160)] {
            let out = nv(w, h);
            let err = (out.width as f64 / out.height as f64 - w as f64 / h as f64).abs();
            assert!(err < 0.01, "{w}x{h} -> {out}");
        }
    }

    #[test]
    fn test_automatic_is_identity() {
        let size = Size::new(4000, 3000);
        assert_eq!(negotiate_size(ProviderId::Automatic, size), size);
    }
}
