//! Scale/pad planning for the quality ladder.
//!
//! Planning is pure: it only looks at the probed geometry and the target
//! box. The scaled frame always fits inside the target box and any pad
//! is centered.

use tracing::debug;

use crate::error::{MediaError, MediaResult};
use vtube_models::{EncodePlan, FilterGraph, PadBox, QualityTarget, SourceGeometry};

/// Aspect ratios closer than this are treated as equal.
pub const ASPECT_TOLERANCE: f64 = 0.01;

/// Plan the filter for one target.
pub fn plan(source: SourceGeometry, target: QualityTarget) -> EncodePlan {
    if source.is_below(&target) {
        return EncodePlan::skip(target);
    }

    let aspect = source.aspect();
    let filter = if (aspect - 1.0).abs() < ASPECT_TOLERANCE {
        let side = target.width.min(target.height);
        padded(target, side, side)
    } else if (aspect - target.aspect()).abs() < ASPECT_TOLERANCE {
        FilterGraph::Scale {
            width: target.width,
            height: target.height,
            pad: None,
        }
    } else if aspect > 1.0 {
        let height = round_dim(target.width as f64 / aspect);
        if height <= target.height {
            padded(target, target.width, height)
        } else {
            // Narrower than the box: fit the height instead
            padded(target, round_dim(target.height as f64 * aspect), target.height)
        }
    } else {
        let width = round_dim(target.height as f64 * aspect);
        if width <= target.width {
            padded(target, width, target.height)
        } else {
            padded(target, target.width, round_dim(target.width as f64 / aspect))
        }
    };

    debug!(source = %source, quality = target.name, filter = %filter, "Planned variant");
    EncodePlan { target, filter }
}

/// Plan every rung of `ladder`, in order.
pub fn plan_ladder(source: SourceGeometry, ladder: &[QualityTarget]) -> Vec<EncodePlan> {
    ladder.iter().map(|target| plan(source, *target)).collect()
}

/// Check that a non-skip plan describes a frame that fits its target box.
pub fn verify(plan: &EncodePlan) -> MediaResult<()> {
    let target = plan.target;
    match plan.filter {
        FilterGraph::Skip => Err(MediaError::InvalidPlan(format!(
            "{} is skipped and cannot be encoded",
            target.name
        ))),
        FilterGraph::Scale { width, height, pad } => {
            if width == 0 || height == 0 {
                return Err(MediaError::InvalidPlan(format!(
                    "{}: empty scaled frame {}x{}",
                    target.name, width, height
                )));
            }
            let (box_w, box_h) = match pad {
                Some(pad) => {
                    if pad.x + width > pad.width || pad.y + height > pad.height {
                        return Err(MediaError::InvalidPlan(format!(
                            "{}: {}x{} at {},{} overflows {}x{}",
                            target.name, width, height, pad.x, pad.y, pad.width, pad.height
                        )));
                    }
                    (pad.width, pad.height)
                }
                None => (width, height),
            };
            if box_w != target.width || box_h != target.height {
                return Err(MediaError::InvalidPlan(format!(
                    "{}: output {}x{} does not match target box",
                    target.name, box_w, box_h
                )));
            }
            Ok(())
        }
    }
}

fn padded(target: QualityTarget, width: u32, height: u32) -> FilterGraph {
    FilterGraph::Scale {
        width,
        height,
        pad: Some(PadBox {
            width: target.width,
            height: target.height,
            x: (target.width - width) / 2,
            y: (target.height - height) / 2,
        }),
    }
}

fn round_dim(value: f64) -> u32 {
    (value.round() as u32).max(1)
}
