//! Error types for the doctags-align library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocTagsError`] — **Fatal**: the page's pipeline cannot proceed at all
//!   (unparseable markup, ambiguous coordinate space, non-positive scaling
//!   factor). Returned as `Err(DocTagsError)` from the top-level entry points
//!   in [`crate::process`].
//!
//! * [`ElementError`] — **Non-fatal**: a single element failed during
//!   rendering or extraction (its region lies entirely outside the page, or
//!   its box collapsed to zero area) but the rest of the document is fine.
//!   Collected inside [`crate::output::PageOutput`] so callers can inspect
//!   partial success rather than losing the whole page to one bad box.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! element failure, log and continue, or collect all errors for a post-run
//! report. The library itself never drops a failed page silently; the counts
//! in [`crate::output::PageStats`] always add up.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doctags-align library.
///
/// Element-level failures use [`ElementError`] and are stored in
/// [`crate::output::PageOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DocTagsError {
    // ── Parse errors ──────────────────────────────────────────────────────
    /// The DocTags markup could not be parsed into an element tree.
    #[error("Malformed DocTags document: {detail}\nNear: {context:?}")]
    MalformedDocument { detail: String, context: String },

    /// The document parsed but contains no elements with bounding boxes.
    #[error("DocTags document is empty: no elements with <loc_..> coordinates")]
    EmptyPage,

    // ── Resolution errors ─────────────────────────────────────────────────
    /// The document's coordinate convention could not be determined.
    #[error(
        "Unknown coordinate convention {declared:?}.\n\
         Pass an explicit convention (normalized, pixels, or WIDTHxHEIGHT)."
    )]
    UnknownConvention { declared: Option<String> },

    // ── Correction errors ─────────────────────────────────────────────────
    /// A scaling factor was zero or negative; scaling would collapse or
    /// mirror the page, which is never meaningful for this pipeline.
    #[error("Invalid {axis}-axis scaling factor {value}: factors must be > 0")]
    InvalidScalingFactor { axis: char, value: f64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding an output image (overlay or crop) failed.
    #[error("Failed to encode image '{path}': {detail}")]
    ImageEncodeFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DocTagsError {
    /// Shorthand for a parse failure with a snippet of the offending input.
    ///
    /// The context is truncated to keep error messages one terminal line
    /// long; the detail names the structural problem.
    pub(crate) fn malformed(detail: impl Into<String>, near: &str) -> Self {
        let mut context: String = near.chars().take(48).collect();
        if near.chars().count() > 48 {
            context.push('…');
        }
        DocTagsError::MalformedDocument {
            detail: detail.into(),
            context,
        }
    }
}

/// A non-fatal error for a single element.
///
/// Stored alongside [`crate::output::PageOutput`] when an element fails
/// during rendering or region extraction. The page continues processing the
/// remaining elements.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ElementError {
    /// The element's box lies entirely outside the page image after clamping.
    #[error(
        "Element {index} ({kind}): region ({left:.0},{top:.0})-({right:.0},{bottom:.0}) \
         is entirely outside the {width}x{height} page image"
    )]
    EmptyRegion {
        index: usize,
        kind: String,
        left: f64,
        top: f64,
        right: f64,
        bottom: f64,
        width: u32,
        height: u32,
    },

    /// The element's box has zero width or height and cannot be drawn or
    /// cropped.
    #[error("Element {index} ({kind}): box has zero {dimension}")]
    DegenerateBox {
        index: usize,
        kind: String,
        dimension: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_truncates_context() {
        let long = "x".repeat(200);
        let e = DocTagsError::malformed("unbalanced tag", &long);
        let msg = e.to_string();
        assert!(msg.contains("unbalanced tag"));
        assert!(msg.len() < 200, "context should be truncated, got: {msg}");
    }

    #[test]
    fn invalid_factor_display() {
        let e = DocTagsError::InvalidScalingFactor {
            axis: 'x',
            value: -0.7,
        };
        let msg = e.to_string();
        assert!(msg.contains("x-axis"), "got: {msg}");
        assert!(msg.contains("-0.7"), "got: {msg}");
    }

    #[test]
    fn unknown_convention_display() {
        let e = DocTagsError::UnknownConvention {
            declared: Some("furlongs".into()),
        };
        assert!(e.to_string().contains("furlongs"));
    }

    #[test]
    fn empty_region_display() {
        let e = ElementError::EmptyRegion {
            index: 3,
            kind: "picture".into(),
            left: 1200.0,
            top: 50.0,
            right: 1400.0,
            bottom: 150.0,
            width: 1000,
            height: 800,
        };
        let msg = e.to_string();
        assert!(msg.contains("picture"));
        assert!(msg.contains("1000x800"));
    }

    #[test]
    fn element_error_serializes() {
        let e = ElementError::DegenerateBox {
            index: 0,
            kind: "table".into(),
            dimension: "width".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("DegenerateBox"));
    }
}
