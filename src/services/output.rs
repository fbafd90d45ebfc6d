//! Output naming and badge source selection

use crate::error::{PortraitError, Result};
use serde::{Deserialize, Serialize};

/// Which user action produced an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    /// Rectangular 4:3 face crop
    FaceCrop,
    /// Circular face crop with ring
    RoundCrop,
    /// Full image with the background removed
    NoBackground,
    /// Background removed, then cropped into the round badge canvas
    BadgePortrait,
    /// Full image matted by the single-tensor network
    Matte,
    /// Round badge canvas keeping the background
    RoundWithBackground,
}

impl OutputKind {
    /// Download name prefix
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::FaceCrop => "rosto-recortado",
            Self::RoundCrop => "rosto-redondo",
            Self::NoBackground => "sem-fundo",
            Self::BadgePortrait => "foto-perfil",
            Self::Matte => "birefnet",
            Self::RoundWithBackground => "foto-redonda-com-fundo",
        }
    }

    /// `<prefix>-<timestamp>.png`
    #[must_use]
    pub fn file_name(self, timestamp_ms: i64) -> String {
        format!("{}-{timestamp_ms}.png", self.prefix())
    }
}

/// Badge flavour, which only affects the file name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BadgeVariant {
    #[default]
    Auto,
    RoundNoBackground,
    RoundWithBackground,
    RoundSimple,
}

impl BadgeVariant {
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Auto => "",
            Self::RoundNoBackground => "-sem-fundo",
            Self::RoundWithBackground => "-com-fundo",
            Self::RoundSimple => "-redondo",
        }
    }
}

/// Milliseconds since the Unix epoch
#[must_use]
pub fn timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Trim and check a candidate name (2 to 100 characters)
///
/// # Errors
/// - `InvalidConfig` for names outside the length bounds
pub fn validate_candidate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();
    if !(2..=100).contains(&length) {
        return Err(PortraitError::invalid_config(format!(
            "Candidate name must be 2-100 characters, got {length}"
        )));
    }
    Ok(trimmed)
}

/// `cracha-<slug>-<timestamp><variant suffix>.png`
///
/// # Errors
/// - Invalid candidate name
pub fn badge_file_name(name: &str, variant: BadgeVariant, timestamp_ms: i64) -> Result<String> {
    let slug = validate_candidate_name(name)?
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    Ok(format!("cracha-{slug}-{timestamp_ms}{}.png", variant.suffix()))
}

/// Preferred badge sources, best first
pub const BADGE_SOURCE_PRIORITY: [OutputKind; 5] = [
    OutputKind::BadgePortrait,
    OutputKind::Matte,
    OutputKind::RoundCrop,
    OutputKind::FaceCrop,
    OutputKind::NoBackground,
];

/// Pick the best available result to build a badge from
#[must_use]
pub fn select_badge_source(available: &[OutputKind]) -> Option<OutputKind> {
    BADGE_SOURCE_PRIORITY
        .into_iter()
        .find(|kind| available.contains(kind))
}
