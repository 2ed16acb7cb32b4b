//! Denoise provider identifiers.
//!
//! Provider ids are persisted in the host settings blob as plain integers,
//! so the discriminants are part of the settings format and must never be
//! renumbered.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DenoiseError, DenoiseResult};

/// Translation key of the filter name.
pub const KEY_FILTER: &str = "Filter.VideoDenoising";
/// Translation key of the provider property.
pub const KEY_PROVIDER: &str = "Filter.VideoDenoising.Provider";
/// Translation key of the NVIDIA provider label.
pub const KEY_PROVIDER_NVIDIA: &str = "Filter.VideoDenoising.Provider.NVIDIAVideoNoiseRemoval";
/// Translation key of the "Automatic" label.
pub const KEY_AUTOMATIC: &str = "State.Automatic";

/// A denoise provider, or the request to pick one automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Resolve to the highest-priority available provider.
    #[default]
    Automatic = 0,
    /// NVIDIA video effects noise removal over CUDA.
    NvidiaVideoNoiseRemoval = 1,
}

impl ProviderId {
    /// Concrete providers, in auto-selection priority order.
    pub const PRIORITY: [ProviderId; 1] = [ProviderId::NvidiaVideoNoiseRemoval];

    /// Decode a persisted settings value.
    pub fn from_raw(value: i64) -> DenoiseResult<Self> {
        match value {
            0 => Ok(Self::Automatic),
            1 => Ok(Self::NvidiaVideoNoiseRemoval),
            other => Err(DenoiseError::MissingConversion(other)),
        }
    }

    /// Value stored in settings.
    pub fn raw(self) -> i64 {
        self as i64
    }

    pub fn is_automatic(self) -> bool {
        self == Self::Automatic
    }

    /// Stable short name, used in logs and configuration.
    pub fn name(self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::NvidiaVideoNoiseRemoval => "nvidia_video_noise_removal",
        }
    }

    /// Translation key of the user-facing label.
    pub fn translation_key(self) -> &'static str {
        match self {
            Self::Automatic => KEY_AUTOMATIC,
            Self::NvidiaVideoNoiseRemoval => KEY_PROVIDER_NVIDIA,
        }
    }
}

impl TryFrom<i64> for ProviderId {
    type Error = DenoiseError;

    fn try_from(value: i64) -> DenoiseResult<Self> {
        Self::from_raw(value)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
