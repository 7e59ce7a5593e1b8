//! Configuration types for DocTags correction and rendering.
//!
//! All per-page behaviour is controlled through [`CorrectionConfig`], built
//! via its [`CorrectionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across worker threads, serialise them for
//! logging, and diff two runs to understand why their overlays differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::DocTagsError;
use crate::pipeline::resolve::Convention;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for one page's correction pipeline.
///
/// Built via [`CorrectionConfig::builder()`] or using
/// [`CorrectionConfig::default()`].
///
/// # Example
/// ```rust
/// use doctags_align::CorrectionConfig;
///
/// let config = CorrectionConfig::builder()
///     .factors(0.7, 0.7)
///     .dpi(200)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// X-axis scaling correction. Must be > 0. Default: 1.0.
    ///
    /// 0.7 is the value that most often reconciles the layout model's
    /// reported coordinates with a 200-DPI render; 1.0 means "trust the
    /// declared convention as-is".
    pub x_factor: f64,

    /// Y-axis scaling correction. Must be > 0. Default: 1.0.
    pub y_factor: f64,

    /// X-axis origin offset, applied in the source coordinate space after
    /// the factor. Default: 0.0.
    ///
    /// Non-zero offsets compensate for conventions that are not top-left
    /// anchored (a cropped or letterboxed render).
    pub x_offset: f64,

    /// Y-axis origin offset. Default: 0.0.
    pub y_offset: f64,

    /// DPI the page raster was produced at. Must be > 0. Default: 200.
    ///
    /// The core never rasterizes; the value is carried into stats and the
    /// region index so a reviewer can tell which render a crop came from.
    pub dpi: u32,

    /// Explicit coordinate convention, overriding whatever the document
    /// declares. Default: None (use the document's `space` marker).
    ///
    /// Resolution fails with `UnknownConvention` when neither this nor a
    /// recognizable marker is present — guessing silently is exactly the
    /// failure mode this pipeline exists to catch.
    pub convention: Option<Convention>,

    /// Whether the (x_factor, y_factor) correction composes with the
    /// convention's base transform or replaces it. Default: compose.
    pub composition: FactorComposition,

    /// Bounding-box line thickness in the overlay, in pixels. Default: 2.
    pub line_thickness: u32,

    /// Label font height in the overlay, in pixels. Default: 14.0.
    pub font_scale: f32,

    /// Draw kind labels on the overlay. Default: true.
    ///
    /// Labels need a TrueType font; when none can be found the renderer
    /// falls back to boxes-only regardless of this flag.
    pub draw_labels: bool,

    /// Explicit path to a TrueType font for labels. Default: None
    /// (search common system font locations).
    pub font_path: Option<PathBuf>,

    /// Margin in pixels added around extracted region crops. Default: 0.
    pub crop_margin: u32,

    /// Maximum width of an extracted crop; wider crops are downscaled
    /// proportionally (Lanczos3). Default: None (never downscale).
    pub max_crop_width: Option<u32>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            x_factor: 1.0,
            y_factor: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
            dpi: 200,
            convention: None,
            composition: FactorComposition::default(),
            line_thickness: 2,
            font_scale: 14.0,
            draw_labels: true,
            font_path: None,
            crop_margin: 0,
            max_crop_width: None,
        }
    }
}

impl CorrectionConfig {
    /// Create a new builder for `CorrectionConfig`.
    pub fn builder() -> CorrectionConfigBuilder {
        CorrectionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CorrectionConfig`].
#[derive(Debug)]
pub struct CorrectionConfigBuilder {
    config: CorrectionConfig,
}

impl CorrectionConfigBuilder {
    /// Set both per-axis scaling factors at once.
    pub fn factors(mut self, x: f64, y: f64) -> Self {
        self.config.x_factor = x;
        self.config.y_factor = y;
        self
    }

    pub fn x_factor(mut self, x: f64) -> Self {
        self.config.x_factor = x;
        self
    }

    pub fn y_factor(mut self, y: f64) -> Self {
        self.config.y_factor = y;
        self
    }

    /// Set both per-axis origin offsets at once.
    pub fn offsets(mut self, x: f64, y: f64) -> Self {
        self.config.x_offset = x;
        self.config.y_offset = y;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn convention(mut self, convention: Convention) -> Self {
        self.config.convention = Some(convention);
        self
    }

    pub fn composition(mut self, composition: FactorComposition) -> Self {
        self.config.composition = composition;
        self
    }

    pub fn line_thickness(mut self, px: u32) -> Self {
        self.config.line_thickness = px.max(1);
        self
    }

    pub fn font_scale(mut self, px: f32) -> Self {
        self.config.font_scale = px.max(6.0);
        self
    }

    pub fn draw_labels(mut self, v: bool) -> Self {
        self.config.draw_labels = v;
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn crop_margin(mut self, px: u32) -> Self {
        self.config.crop_margin = px;
        self
    }

    pub fn max_crop_width(mut self, px: u32) -> Self {
        self.config.max_crop_width = Some(px.max(1));
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CorrectionConfig, DocTagsError> {
        let c = &self.config;
        if !(c.x_factor > 0.0) || !c.x_factor.is_finite() {
            return Err(DocTagsError::InvalidScalingFactor {
                axis: 'x',
                value: c.x_factor,
            });
        }
        if !(c.y_factor > 0.0) || !c.y_factor.is_finite() {
            return Err(DocTagsError::InvalidScalingFactor {
                axis: 'y',
                value: c.y_factor,
            });
        }
        if c.dpi == 0 {
            return Err(DocTagsError::InvalidConfig("DPI must be > 0".into()));
        }
        if !c.x_offset.is_finite() || !c.y_offset.is_finite() {
            return Err(DocTagsError::InvalidConfig(
                "Offsets must be finite".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How an explicit (x_factor, y_factor) correction interacts with the
/// convention's base transform.
///
/// Producers disagree on what a bare "0.7" should mean, so this is an
/// explicit, tested parameter rather than a guess:
///
/// | Mode | Effective x scale |
/// |------|-------------------|
/// | `Compose` (default) | `base.sx * x_factor` |
/// | `ReplaceBase`       | `x_factor` |
///
/// `Compose` is the default because it matches the mental model of the sweep
/// workflow: "the convention got us close, now nudge by 0.7".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorComposition {
    /// Apply the correction in the source space, then the base transform.
    #[default]
    Compose,
    /// Ignore the base transform; the factors are the whole mapping.
    ReplaceBase,
}
