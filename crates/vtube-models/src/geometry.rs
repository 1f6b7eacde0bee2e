//! Source geometry and per-target encode plans.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::quality::QualityTarget;

/// Probed dimensions of an uploaded source. Both sides are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceGeometry {
    pub width: u32,
    pub height: u32,
}

impl SourceGeometry {
    /// Returns `None` when either side is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// True when the source is smaller than the target on both axes.
    pub fn is_below(&self, target: &QualityTarget) -> bool {
        self.width < target.width && self.height < target.height
    }
}

impl fmt::Display for SourceGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Centered pad box applied after scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PadBox {
    pub width: u32,
    pub height: u32,
    /// Horizontal offset of the scaled frame inside the box
    pub x: u32,
    /// Vertical offset of the scaled frame inside the box
    pub y: u32,
}

/// Scale/pad description for one target, or a decision not to encode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterGraph {
    /// Target would require upscaling; no variant is produced.
    Skip,
    Scale {
        width: u32,
        height: u32,
        pad: Option<PadBox>,
    },
}

impl FilterGraph {
    pub fn is_skip(&self) -> bool {
        matches!(self, FilterGraph::Skip)
    }

    pub fn has_pad(&self) -> bool {
        matches!(self, FilterGraph::Scale { pad: Some(_), .. })
    }

    /// Render as an FFmpeg `-vf` argument. `None` for [`FilterGraph::Skip`].
    pub fn to_ffmpeg(&self) -> Option<String> {
        match self {
            FilterGraph::Skip => None,
            FilterGraph::Scale { width, height, pad } => {
                let mut filter = format!("scale={}:{}", width, height);
                if let Some(pad) = pad {
                    filter.push_str(&format!(
                        ",pad={}:{}:{}:{}",
                        pad.width, pad.height, pad.x, pad.y
                    ));
                }
                Some(filter)
            }
        }
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_ffmpeg() {
            Some(filter) => f.write_str(&filter),
            None => f.write_str("skip"),
        }
    }
}

/// Planned geometry for one (source, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodePlan {
    pub target: QualityTarget,
    pub filter: FilterGraph,
}

impl EncodePlan {
    pub fn skip(target: QualityTarget) -> Self {
        Self {
            target,
            filter: FilterGraph::Skip,
        }
    }

    pub fn is_skip(&self) -> bool {
        self.filter.is_skip()
    }
}
