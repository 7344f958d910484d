//! Render quality levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use scenemux_common::error::SceneMuxError;

/// Discrete render quality, selecting both the render tool's quality flag
/// and the resolution directory its output lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    /// `ql`: 854x480 at 15 fps.
    Low,
    /// `qm`: 1280x720 at 30 fps.
    Medium,
    /// `qh`: 1920x1080 at 60 fps.
    High,
    /// `qk`: 3840x2160 at 60 fps.
    FourK,
}

impl QualityLevel {
    pub const ALL: [QualityLevel; 4] = [Self::Low, Self::Medium, Self::High, Self::FourK];

    /// Short code accepted on the command line.
    pub fn code(self) -> &'static str {
        match self {
            Self::Low => "ql",
            Self::Medium => "qm",
            Self::High => "qh",
            Self::FourK => "qk",
        }
    }

    /// Flag passed to the render tool.
    pub fn flag(self) -> &'static str {
        match self {
            Self::Low => "-ql",
            Self::Medium => "-qm",
            Self::High => "-qh",
            Self::FourK => "-qk",
        }
    }

    /// Directory name the render tool uses for this quality.
    pub fn resolution_tag(self) -> &'static str {
        match self {
            Self::Low => "480p15",
            Self::Medium => "720p30",
            Self::High => "1080p60",
            Self::FourK => "2160p60",
        }
    }
}

impl FromStr for QualityLevel {
    type Err = SceneMuxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.code() == s)
            .ok_or_else(|| {
                SceneMuxError::validation(format!(
                    "Unknown quality level: {s}. Use: ql, qm, qh, qk"
                ))
            })
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
