//! Small value types shared by config, media and batch code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A value in config or on the command line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseValueError {
    #[error("Invalid aspect ratio '{0}' (expected W:H with positive integers)")]
    InvalidRatio(String),

    #[error("Invalid overlay position '{0}' (expected top-left, top-right, bottom-left, bottom-right, center or x,y)")]
    InvalidPosition(String),
}

/// Where the overlay video sits on the base frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OverlayPosition {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    /// Absolute pixel offset of the overlay's top-left corner.
    Custom { x: i64, y: i64 },
}

impl OverlayPosition {
    /// Pixel offset of the overlay's top-left corner on the base frame.
    ///
    /// Corner positions keep `margin` pixels from both edges. `Center`
    /// rounds down.
    pub fn coordinates(
        &self,
        base: (u32, u32),
        overlay: (u32, u32),
        margin: u32,
    ) -> (i64, i64) {
        let (bw, bh) = (base.0 as i64, base.1 as i64);
        let (ow, oh) = (overlay.0 as i64, overlay.1 as i64);
        let m = margin as i64;

        match *self {
            OverlayPosition::TopLeft => (m, m),
            OverlayPosition::TopRight => (bw - ow - m, m),
            OverlayPosition::BottomLeft => (m, bh - oh - m),
            OverlayPosition::BottomRight => (bw - ow - m, bh - oh - m),
            OverlayPosition::Center => ((bw - ow).div_euclid(2), (bh - oh).div_euclid(2)),
            OverlayPosition::Custom { x, y } => (x, y),
        }
    }
}

impl fmt::Display for OverlayPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayPosition::TopLeft => write!(f, "top-left"),
            OverlayPosition::TopRight => write!(f, "top-right"),
            OverlayPosition::BottomLeft => write!(f, "bottom-left"),
            OverlayPosition::BottomRight => write!(f, "bottom-right"),
            OverlayPosition::Center => write!(f, "center"),
            OverlayPosition::Custom { x, y } => write!(f, "{},{}", x, y),
        }
    }
}

impl FromStr for OverlayPosition {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "top-left" => Ok(OverlayPosition::TopLeft),
            "top-right" => Ok(OverlayPosition::TopRight),
            "bottom-left" => Ok(OverlayPosition::BottomLeft),
            "bottom-right" => Ok(OverlayPosition::BottomRight),
            "center" => Ok(OverlayPosition::Center),
            other => {
                let invalid = || ParseValueError::InvalidPosition(s.to_string());
                let (x, y) = other.split_once(',').ok_or_else(invalid)?;
                let x = x.trim().parse().map_err(|_| invalid())?;
                let y = y.trim().parse().map_err(|_| invalid())?;
                Ok(OverlayPosition::Custom { x, y })
            }
        }
    }
}

impl TryFrom<String> for OverlayPosition {
    type Error = ParseValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OverlayPosition> for String {
    fn from(value: OverlayPosition) -> Self {
        value.to_string()
    }
}

/// Target frame shape, written `W:H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const VERTICAL: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height.
    pub fn value(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// `WxH` form used in directory and file names.
    pub fn label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Output frame size in pixels for this shape at `height` pixels tall.
    ///
    /// Both sides are rounded down to even numbers for 4:2:0 encoders.
    pub fn frame_size(&self, height: u32) -> (u32, u32) {
        let h = even(height.max(2));
        let w = even(((h as f64) * self.value()).round() as u32).max(2);
        (w, h)
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::VERTICAL
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseValueError::InvalidRatio(s.to_string());
        let (w, h) = s.trim().split_once(':').ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = ParseValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.to_string()
    }
}

/// One rung of the export quality ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    /// FFmpeg video encoder name.
    pub codec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crf: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Encoder profile (ProRes flavour).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<u32>,
}

impl QualityProfile {
    /// H.264, CRF 20, veryfast.
    pub fn h264() -> Self {
        Self {
            codec: "libx264".to_string(),
            crf: Some(20),
            preset: Some("veryfast".to_string()),
            profile: None,
        }
    }

    /// ProRes 422 HQ.
    pub fn prores() -> Self {
        Self {
            codec: "prores_ks".to_string(),
            crf: None,
            preset: None,
            profile: Some(3),
        }
    }

    pub fn is_prores(&self) -> bool {
        self.codec == "prores_ks"
    }

    /// The default ladder: H.264 first, ProRes second.
    pub fn default_ladder() -> Vec<QualityProfile> {
        vec![Self::h264(), Self::prores()]
    }
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self::h264()
    }
}

/// Lifecycle of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    ValidationFailed,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::ValidationFailed => write!(f, "validation_failed"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

fn even(value: u32) -> u32 {
    value & !1
}
