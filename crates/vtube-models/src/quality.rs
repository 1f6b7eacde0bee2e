//! The fixed quality ladder.

use serde::Serialize;
use std::fmt;

/// One rung of the quality ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct QualityTarget {
    /// Ladder name, also used as the variant key (e.g. "1080p")
    pub name: &'static str,
    /// Display label used by players (e.g. "2160p" for 4K)
    pub label: &'static str,
    /// Target box width in pixels
    pub width: u32,
    /// Target box height in pixels
    pub height: u32,
}

impl QualityTarget {
    pub const fn new(name: &'static str, label: &'static str, width: u32, height: u32) -> Self {
        Self {
            name,
            label,
            width,
            height,
        }
    }

    /// Aspect ratio of the target box.
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Look up a rung of the default ladder by name.
    pub fn by_name(name: &str) -> Option<Self> {
        QUALITY_LADDER.iter().copied().find(|q| q.name == name)
    }
}

impl fmt::Display for QualityTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}x{})", self.name, self.width, self.height)
    }
}

pub const QUALITY_4K: QualityTarget = QualityTarget::new("4K", "2160p", 3840, 2160);
pub const QUALITY_QHD: QualityTarget = QualityTarget::new("QHD", "1440p", 2560, 1440);
pub const QUALITY_1080P: QualityTarget = QualityTarget::new("1080p", "1080p", 1920, 1080);
pub const QUALITY_720P: QualityTarget = QualityTarget::new("720p", "720p", 1280, 720);
pub const QUALITY_480P: QualityTarget = QualityTarget::new("480p", "480p", 854, 480);
pub const QUALITY_360P: QualityTarget = QualityTarget::new("360p", "360p", 640, 360);

/// Ladder attempted for every upload, highest first.
pub const QUALITY_LADDER: [QualityTarget; 6] = [
    QUALITY_4K,
    QUALITY_QHD,
    QUALITY_1080P,
    QUALITY_720P,
    QUALITY_480P,
    QUALITY_360P,
];

/// Qualities that must encode successfully for an upload to commit.
pub const REQUIRED_QUALITIES: [&str; 4] = ["1080p", "720p", "480p", "360p"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_is_ordered_highest_first() {
        for pair in QUALITY_LADDER.windows(2) {
            assert!(pair[0].width > pair[1].width);
            assert!(pair[0].height > pair[1].height);
        }
    }

    #[test]
    fn test_required_qualities_are_on_ladder() {
        for name in REQUIRED_QUALITIES {
            assert!(QualityTarget::by_name(name).is_some(), "{name} missing");
        }
        assert!(QualityTarget::by_name("8K").is_none());
    }

    #[test]
    fn test_labels() {
        assert_eq!(QualityTarget::by_name("4K").unwrap().label, "2160p");
        assert_eq!(QualityTarget::by_name("QHD").unwrap().label, "1440p");
    }
}
