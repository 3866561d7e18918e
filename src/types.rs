//! Shared enumerations used across the feed, queue and provider layers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Image generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    SeedreamKie,
    SeedreamAiml,
    SeedreamByteplus,
    NanoBanana,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::SeedreamKie,
        ProviderKind::NanoBanana,
        ProviderKind::SeedreamAiml,
        ProviderKind::SeedreamByteplus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::SeedreamKie => "seedream_kie",
            ProviderKind::SeedreamAiml => "seedream_aiml",
            ProviderKind::SeedreamByteplus => "seedream_byteplus",
            ProviderKind::NanoBanana => "nano_banana",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "seedream_kie" => Ok(ProviderKind::SeedreamKie),
            "seedream_aiml" => Ok(ProviderKind::SeedreamAiml),
            "seedream_byteplus" => Ok(ProviderKind::SeedreamByteplus),
            "nano_banana" => Ok(ProviderKind::NanoBanana),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// Lifecycle state of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    InProgress,
    Success,
    Failed,
    Skipped,
}

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::Success | ProcessingStatus::Failed | ProcessingStatus::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::InProgress => "in_progress",
            ProcessingStatus::Success => "success",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the product overlay is composited onto the ad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayPosition {
    TopLeft,
    TopRight,
    #[default]
    BottomLeft,
    BottomRight,
    CenterBottom,
    CenterTop,
    Custom,
}

/// Output image framing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectSize {
    #[default]
    #[serde(rename = "landscape_4_3")]
    Landscape4x3,
    #[serde(rename = "landscape_16_9")]
    Landscape16x9,
    #[serde(rename = "portrait_3_4")]
    Portrait3x4,
    #[serde(rename = "portrait_9_16")]
    Portrait9x16,
    Square,
}

impl AspectSize {
    /// Aspect ratio string as sent to providers.
    pub fn ratio(&self) -> &'static str {
        match self {
            AspectSize::Landscape4x3 => "4:3",
            AspectSize::Landscape16x9 => "16:9",
            AspectSize::Portrait3x4 => "3:4",
            AspectSize::Portrait9x16 => "9:16",
            AspectSize::Square => "1:1",
        }
    }

    /// Integer ratio parts (width, height).
    pub fn parts(&self) -> (u32, u32) {
        match self {
            AspectSize::Landscape4x3 => (4, 3),
            AspectSize::Landscape16x9 => (16, 9),
            AspectSize::Portrait3x4 => (3, 4),
            AspectSize::Portrait9x16 => (9, 16),
            AspectSize::Square => (1, 1),
        }
    }
}

/// Output resolution tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Resolution {
    #[serde(rename = "HD")]
    Hd,
    #[serde(rename = "FHD")]
    Fhd,
    #[default]
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Hd => "HD",
            Resolution::Fhd => "FHD",
            Resolution::TwoK => "2K",
            Resolution::FourK => "4K",
        }
    }

    /// Pixel dimensions string for 16:9 framing.
    pub fn dimensions(&self) -> &'static str {
        match self {
            Resolution::Hd => "1280x720",
            Resolution::Fhd => "1920x1080",
            Resolution::TwoK => "2560x1440",
            Resolution::FourK => "3840x2160",
        }
    }

    /// Pixels per aspect-ratio unit, used by backends that take width/height.
    pub fn unit_pixels(&self) -> u32 {
        match self {
            Resolution::Hd => 80,
            Resolution::Fhd => 120,
            Resolution::TwoK => 160,
            Resolution::FourK => 240,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
