//! Coordinate space resolution: from the document's declared convention to
//! true page pixels.
//!
//! ## Why this stage exists
//!
//! The layout model reports boxes in *its* space — a normalized 0–1 square,
//! or a fixed grid such as 500×500 — while the reviewer looks at a page
//! rendered at some DPI. Every tool downstream (corrector, overlay, crops)
//! must agree on one mapping between the two, or the overlay drifts per axis
//! and crops slice the wrong content. This module owns that mapping:
//!
//! * [`resolve`] turns a declared convention plus [`PageRasterInfo`] into the
//!   base [`Transform`].
//! * [`sweep_candidates`] enumerates an evenly spaced grid of
//!   [`ScalingParameters`] so a human can visually bisect toward the right
//!   correction when no convention is trustworthy.
//! * [`suggest_parameters`] proposes a correction from the document's
//!   coordinate extents. Advisory only; it is never applied implicitly.

use crate::error::DocTagsError;
use crate::model::{DocTagDocument, PageRasterInfo};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// The side length of the grid the DocTags layout model emits by default.
pub const DEFAULT_GRID: u32 = 500;

/// A declared coordinate-space convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Convention {
    /// Coordinates in [0, 1] relative to the page.
    Normalized,
    /// Model pixels at a declared base resolution (e.g. the 500×500 grid).
    Grid { width: u32, height: u32 },
    /// Coordinates already in true page pixels.
    Pixels,
}

impl Convention {
    /// The default model grid, 500×500.
    pub fn default_grid() -> Self {
        Convention::Grid {
            width: DEFAULT_GRID,
            height: DEFAULT_GRID,
        }
    }
}

impl FromStr for Convention {
    type Err = DocTagsError;

    /// Accepts `normalized`/`norm`, `pixels`/`px`, `grid` (the 500×500
    /// default), or an explicit `WIDTHxHEIGHT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "normalized" | "norm" => return Ok(Convention::Normalized),
            "pixels" | "px" => return Ok(Convention::Pixels),
            "grid" => return Ok(Convention::default_grid()),
            _ => {}
        }
        if let Some((w, h)) = lower.split_once('x') {
            if let (Ok(width), Ok(height)) = (w.parse::<u32>(), h.parse::<u32>()) {
                if width > 0 && height > 0 {
                    return Ok(Convention::Grid { width, height });
                }
            }
        }
        Err(DocTagsError::UnknownConvention {
            declared: Some(s.to_string()),
        })
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Convention::Normalized => f.write_str("normalized"),
            Convention::Grid { width, height } => write!(f, "{width}x{height}"),
            Convention::Pixels => f.write_str("pixels"),
        }
    }
}

/// A per-axis affine map `v' = v * scale + offset`.
///
/// Transforms are values; composing two yields a third. The identity is the
/// `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub sx: f64,
    pub sy: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            sx: 1.0,
            sy: 1.0,
            dx: 0.0,
            dy: 0.0,
        }
    }
}

impl Transform {
    /// Pure per-axis scale, no offset.
    pub fn scale(sx: f64, sy: f64) -> Self {
        Transform {
            sx,
            sy,
            dx: 0.0,
            dy: 0.0,
        }
    }

    /// The map that applies `inner` first, then `self`.
    pub fn compose(&self, inner: &Transform) -> Transform {
        Transform {
            sx: self.sx * inner.sx,
            sy: self.sy * inner.sy,
            dx: self.sx * inner.dx + self.dx,
            dy: self.sy * inner.dy + self.dy,
        }
    }

    /// Map an x coordinate.
    pub fn map_x(&self, x: f64) -> f64 {
        x * self.sx + self.dx
    }

    /// Map a y coordinate.
    pub fn map_y(&self, y: f64) -> f64 {
        y * self.sy + self.dy
    }
}

/// Determine the base transform from a declared convention to page pixels.
///
/// `override_convention` wins when present; otherwise the document's declared
/// marker is parsed. When neither identifies a convention, resolution fails
/// with `UnknownConvention` — silently guessing is how misaligned overlays
/// happen in the first place.
pub fn resolve(
    declared: Option<&str>,
    override_convention: Option<Convention>,
    raster: &PageRasterInfo,
) -> Result<Transform, DocTagsError> {
    let convention = match override_convention {
        Some(c) => c,
        None => match declared {
            Some(marker) => marker.parse()?,
            None => {
                return Err(DocTagsError::UnknownConvention { declared: None });
            }
        },
    };
    let transform = base_transform(convention, raster);
    debug!(%convention, sx = transform.sx, sy = transform.sy, "resolved coordinate space");
    Ok(transform)
}

/// The base transform for a known convention.
pub fn base_transform(convention: Convention, raster: &PageRasterInfo) -> Transform {
    match convention {
        Convention::Normalized => Transform::scale(
            f64::from(raster.width_px),
            f64::from(raster.height_px),
        ),
        Convention::Grid { width, height } => Transform::scale(
            f64::from(raster.width_px) / f64::from(width),
            f64::from(raster.height_px) / f64::from(height),
        ),
        Convention::Pixels => Transform::default(),
    }
}

/// Pure per-axis linear corrections, the value a reviewer sweeps over.
///
/// Factors must be positive; offsets default to zero and live in the source
/// coordinate space. Display rounds to 2 decimals so sweep filenames stay
/// short and stable, but the full-precision values are what get applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingParameters {
    pub x_factor: f64,
    pub y_factor: f64,
    pub x_offset: f64,
    pub y_offset: f64,
}

impl Default for ScalingParameters {
    fn default() -> Self {
        ScalingParameters {
            x_factor: 1.0,
            y_factor: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
        }
    }
}

impl ScalingParameters {
    /// Factors only, zero offsets.
    pub fn factors(x_factor: f64, y_factor: f64) -> Self {
        ScalingParameters {
            x_factor,
            y_factor,
            ..Default::default()
        }
    }

    /// The correction as a [`Transform`].
    pub fn as_transform(&self) -> Transform {
        Transform {
            sx: self.x_factor,
            sy: self.y_factor,
            dx: self.x_offset,
            dy: self.y_offset,
        }
    }

    /// A short, filesystem-safe label: `x0.70_y0.70`.
    ///
    /// Factors are rounded to 2 decimals here and only here; applying a
    /// rounded factor would compound error across sweep candidates.
    pub fn label(&self) -> String {
        format!("x{:.2}_y{:.2}", self.x_factor, self.y_factor)
    }
}

impl fmt::Display for ScalingParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={:.2}, y={:.2}", self.x_factor, self.y_factor)?;
        if self.x_offset != 0.0 || self.y_offset != 0.0 {
            write!(f, " (offset {:+.1},{:+.1})", self.x_offset, self.y_offset)?;
        }
        Ok(())
    }
}

/// Enumerate `(steps + 1)²` evenly spaced factor pairs over two closed
/// intervals.
///
/// Row-major: y varies in the outer loop, x in the inner loop, matching the
/// visual grid a reviewer bisects over. The iterator is lazy, finite, and
/// deterministic for the same bounds and step count; it performs no I/O —
/// rendering each candidate is the caller's loop.
pub fn sweep_candidates(
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
    steps: u32,
) -> impl Iterator<Item = ScalingParameters> {
    let lerp = move |lo: f64, hi: f64, i: u32| {
        if steps == 0 || i == steps {
            // Hit the endpoints exactly; accumulation error on the last
            // candidate would leak into filenames.
            if i == 0 { lo } else { hi }
        } else {
            lo + (hi - lo) * f64::from(i) / f64::from(steps)
        }
    };
    (0..=steps).flat_map(move |yi| {
        (0..=steps).map(move |xi| {
            ScalingParameters::factors(lerp(min_x, max_x, xi), lerp(min_y, max_y, yi))
        })
    })
}

/// Suggest a correction from the document's coordinate extents.
///
/// Heuristic, advisory only:
/// * extents within the default 500 grid → fit the grid to the page,
/// * otherwise → factors that map the maximum extent onto the page edges.
///
/// Returns `None` for an empty document. A human (or the sweep) still has
/// the final say; the suggestion is logged, never silently applied.
pub fn suggest_parameters(
    doc: &DocTagDocument,
    raster: &PageRasterInfo,
) -> Option<ScalingParameters> {
    let (max_x, max_y) = doc.extent()?;
    if max_x <= 0.0 || max_y <= 0.0 {
        return None;
    }
    let grid = f64::from(DEFAULT_GRID);
    let suggestion = if max_x <= grid && max_y <= grid {
        ScalingParameters::factors(
            f64::from(raster.width_px) / grid,
            f64::from(raster.height_px) / grid,
        )
    } else {
        ScalingParameters::factors(
            f64::from(raster.width_px) / max_x,
            f64::from(raster.height_px) / max_y,
        )
    };
    debug!(max_x, max_y, %suggestion, "suggesting scaling parameters from extents");
    Some(suggestion)
}
