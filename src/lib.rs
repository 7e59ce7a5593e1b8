//! # doctags-align
//!
//! Correct, visualize, and crop bounding boxes in DocTags layout markup.
//!
//! ## Why this crate?
//!
//! Layout models emit DocTags — tagged markup where every element carries a
//! `<loc_L><loc_T><loc_R><loc_B>` bounding box — but the coordinate space
//! those numbers live in is rarely the pixel space of the page render you
//! actually have. A box may be normalized to `[0, 1]`, quantized onto a
//! 500x500 grid, or already in pixels at some other DPI, and on top of that
//! the model is often off by a systematic per-axis scale factor. This crate
//! resolves the declared convention into an exact affine transform, applies
//! a user-supplied scaling correction on top, and produces artifacts a
//! human can check: a color-coded overlay and per-region image crops.
//!
//! ## Pipeline Overview
//!
//! ```text
//! DocTags text + page render
//!  │
//!  ├─ 1. Parse    tagged markup → DocTagDocument tree
//!  ├─ 2. Resolve  declared convention → base Transform for this raster
//!  ├─ 3. Correct  compose factors/offsets, rewrite boxes into pixel space
//!  ├─ 4. Overlay  color-coded boxes + labels drawn on the page render
//!  └─ 5. Extract  cropped region images + JSON index
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doctags_align::{process_page_to_dir, Convention, CorrectionConfig, PageRasterInfo};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let text = std::fs::read_to_string("page_1.doctags.txt")?;
//!     let page = image::open("page_1.png")?;
//!     let raster = PageRasterInfo::for_image(&page, 200);
//!     let config = CorrectionConfig::builder()
//!         .factors(0.7, 0.7)
//!         .convention(Convention::default_grid())
//!         .build()?;
//!     let (output, artifacts) =
//!         process_page_to_dir(&text, &page, &raster, &config, "out".as_ref(), "1")?;
//!     eprintln!(
//!         "{} elements, {} skipped, overlay at {}",
//!         output.stats.elements_total,
//!         output.stats.elements_skipped,
//!         artifacts.overlay.display()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doctags-align` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! doctags-align = { version = "0.3", default-features = false }
//! ```
//!
//! ## Finding factors you don't know
//!
//! When the right correction is unknown, [`sweep_candidates`] enumerates a
//! grid of `(x, y)` factor pairs to render side by side, and
//! [`suggest_parameters`] makes a first guess from the document's
//! coordinate extent.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod process;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CorrectionConfig, CorrectionConfigBuilder, FactorComposition};
pub use error::{DocTagsError, ElementError};
pub use model::{BBox, DocTagDocument, DocTagElement, ElementKind, PageRasterInfo};
pub use output::{PageOutput, PageStats, RegionIndex, RegionRecord};
pub use pipeline::correct::{apply, apply_transform};
pub use pipeline::extract::{extract_regions, is_picture, RegionCrop};
pub use pipeline::overlay::{kind_color, load_label_font, render_overlay};
pub use pipeline::parse::{parse, serialize};
pub use pipeline::resolve::{
    resolve, suggest_parameters, sweep_candidates, Convention, ScalingParameters, Transform,
    DEFAULT_GRID,
};
pub use process::{correct_page, process_page, process_page_to_dir, CorrectedPage, PageArtifacts};
