//! Region extraction: crop matching elements (typically pictures) out of the
//! page raster.
//!
//! The extractor reuses the exact clamping the overlay uses, so a crop always
//! covers the same pixels the reviewer saw boxed. Boxes straddling the image
//! boundary are clamped, not rejected — partial overlap is preserved; only a
//! box with nothing left after clamping yields an [`ElementError::EmptyRegion`]
//! for that element, never for the whole page.
//!
//! Captions travel with their crops: a picture's caption child (or its own
//! text) is cleaned of stray `<loc_..>` tokens and also condensed into a
//! filename-safe slug used by the artifact writer.

use crate::config::CorrectionConfig;
use crate::error::ElementError;
use crate::model::{BBox, DocTagDocument, DocTagElement, ElementKind};
use crate::pipeline::overlay::clamp_box;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static RE_LOC_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<loc_[^>]*>").unwrap());
static RE_SLUG_JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());

/// One extracted region: the cropped pixels plus the metadata the index
/// records.
#[derive(Debug, Clone)]
pub struct RegionCrop {
    /// Position of the element in document reading order.
    pub index: usize,
    pub kind: ElementKind,
    /// Raw tag name, carried for `other`-kind elements.
    pub tag: String,
    /// Cleaned caption text, when the element has one.
    pub caption: Option<String>,
    /// The final, clamped box in page pixels that was actually cropped.
    pub bbox: BBox,
    pub image: RgbaImage,
}

impl RegionCrop {
    /// Filename stem for this crop: `region_03` or `region_03_figure_1`.
    pub fn file_stem(&self) -> String {
        match self.caption.as_deref().map(caption_slug) {
            Some(slug) if !slug.is_empty() => format!("region_{:02}_{slug}", self.index),
            _ => format!("region_{:02}", self.index),
        }
    }
}

/// The default predicate: picture elements only.
pub fn is_picture(element: &DocTagElement) -> bool {
    element.kind == ElementKind::Picture
}

/// Crop every element matching `predicate` out of the page image.
///
/// The document must already be in page-pixel space. Crops are expanded by
/// `config.crop_margin`, clamped to the image, and downscaled to
/// `config.max_crop_width` when set. Per-element failures are collected and
/// returned alongside the successful crops.
pub fn extract_regions(
    doc: &DocTagDocument,
    page_image: &DynamicImage,
    predicate: impl Fn(&DocTagElement) -> bool,
    config: &CorrectionConfig,
) -> (Vec<RegionCrop>, Vec<ElementError>) {
    let (width, height) = (page_image.width(), page_image.height());
    let mut crops = Vec::new();
    let mut errors = Vec::new();

    for (index, element) in doc.iter_elements().enumerate() {
        if !predicate(element) {
            continue;
        }
        let padded = pad_box(&element.bbox, f64::from(config.crop_margin));
        let probe = DocTagElement {
            bbox: padded,
            ..element.clone()
        };
        let clamped = match clamp_box(&probe, index, width, height) {
            Ok(c) => c,
            Err(e) => {
                warn!(index, element = %element.tag, "skipping region: {e}");
                errors.push(e);
                continue;
            }
        };

        let mut cropped = page_image.crop_imm(clamped.x, clamped.y, clamped.w, clamped.h);
        if let Some(max_width) = config.max_crop_width {
            if cropped.width() > max_width {
                let new_height = (u64::from(cropped.height()) * u64::from(max_width)
                    / u64::from(cropped.width())) as u32;
                cropped = cropped.resize_exact(max_width, new_height.max(1), FilterType::Lanczos3);
            }
        }

        crops.push(RegionCrop {
            index,
            kind: element.kind,
            tag: element.tag.clone(),
            caption: caption_of(element),
            bbox: BBox::new(
                f64::from(clamped.x),
                f64::from(clamped.y),
                f64::from(clamped.x + clamped.w),
                f64::from(clamped.y + clamped.h),
            ),
            image: cropped.to_rgba8(),
        });
    }

    debug!(
        crops = crops.len(),
        skipped = errors.len(),
        "extracted regions"
    );
    (crops, errors)
}

fn pad_box(bbox: &BBox, margin: f64) -> BBox {
    BBox::new(
        (bbox.left - margin).max(0.0),
        (bbox.top - margin).max(0.0),
        bbox.right + margin,
        bbox.bottom + margin,
    )
}

/// The caption for an element: a `caption` child wins over its own text.
fn caption_of(element: &DocTagElement) -> Option<String> {
    let raw = element
        .children
        .iter()
        .find(|c| c.kind == ElementKind::Caption)
        .and_then(|c| c.text.as_deref())
        .or(element.text.as_deref())?;
    let cleaned = RE_LOC_TOKEN.replace_all(raw, "").trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Condense a caption into a filename-safe slug: first 30 characters,
/// lowercased, spaces collapsed to underscores.
fn caption_slug(caption: &str) -> String {
    let stripped = RE_SLUG_JUNK.replace_all(caption, "");
    let truncated: String = stripped.trim().chars().take(30).collect();
    truncated
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parse::parse;
    use image::{Rgba, RgbaImage};

    fn config() -> CorrectionConfig {
        CorrectionConfig::default()
    }

    fn page(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([200, 200, 200, 255])))
    }

    #[test]
    fn extracts_picture_with_caption() {
        let doc = parse(
            "<doctag space=\"pixels\">\
             <text><loc_0><loc_0><loc_100><loc_20>not a picture</text>\
             <picture><loc_10><loc_30><loc_110><loc_130>\
             <caption><loc_10><loc_135><loc_110><loc_150>Figure 3: Results</caption>\
             </picture></doctag>",
        )
        .unwrap();
        let (crops, errors) = extract_regions(&doc, &page(200, 200), is_picture, &config());
        assert!(errors.is_empty());
        assert_eq!(crops.len(), 1);
        let crop = &crops[0];
        assert_eq!((crop.image.width(), crop.image.height()), (100, 100));
        assert_eq!(crop.caption.as_deref(), Some("Figure 3: Results"));
        assert_eq!(crop.file_stem(), "region_01_figure_3_results");
    }

    #[test]
    fn straddling_box_is_clamped_not_rejected() {
        let doc = parse(
            "<doctag space=\"pixels\">\
             <picture><loc_150><loc_150><loc_300><loc_300></picture></doctag>",
        )
        .unwrap();
        let (crops, errors) = extract_regions(&doc, &page(200, 200), is_picture, &config());
        assert!(errors.is_empty());
        let crop = &crops[0];
        assert_eq!((crop.image.width(), crop.image.height()), (50, 50));
        // Index records the clamped box, not the requested one.
        assert_eq!(crop.bbox, BBox::new(150.0, 150.0, 200.0, 200.0));
    }

    #[test]
    fn fully_outside_box_is_per_element_error() {
        let doc = parse(
            "<doctag space=\"pixels\">\
             <picture><loc_500><loc_500><loc_600><loc_600></picture>\
             <picture><loc_10><loc_10><loc_60><loc_60></picture></doctag>",
        )
        .unwrap();
        let (crops, errors) = extract_regions(&doc, &page(200, 200), is_picture, &config());
        assert_eq!(crops.len(), 1, "second picture still extracted");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ElementError::EmptyRegion { index: 0, .. }));
    }

    #[test]
    fn margin_expands_but_clamps_at_origin() {
        let doc = parse(
            "<doctag space=\"pixels\">\
             <picture><loc_5><loc_5><loc_50><loc_50></picture></doctag>",
        )
        .unwrap();
        let cfg = CorrectionConfig::builder().crop_margin(10).build().unwrap();
        let (crops, _) = extract_regions(&doc, &page(200, 200), is_picture, &cfg);
        // Left/top clamp to 0; right/bottom extend by the margin.
        assert_eq!(crops[0].bbox, BBox::new(0.0, 0.0, 60.0, 60.0));
    }

    #[test]
    fn wide_crops_are_downscaled_proportionally() {
        let doc = parse(
            "<doctag space=\"pixels\">\
             <picture><loc_0><loc_0><loc_160><loc_80></picture></doctag>",
        )
        .unwrap();
        let cfg = CorrectionConfig::builder().max_crop_width(80).build().unwrap();
        let (crops, _) = extract_regions(&doc, &page(200, 200), is_picture, &cfg);
        assert_eq!((crops[0].image.width(), crops[0].image.height()), (80, 40));
    }

    #[test]
    fn custom_predicate_selects_other_kinds() {
        let doc = parse(
            "<doctag space=\"pixels\">\
             <table><loc_10><loc_10><loc_90><loc_90></table>\
             <picture><loc_100><loc_100><loc_150><loc_150></picture></doctag>",
        )
        .unwrap();
        let (crops, _) = extract_regions(
            &doc,
            &page(200, 200),
            |e| e.kind == ElementKind::Table,
            &config(),
        );
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].kind, ElementKind::Table);
    }

    #[test]
    fn caption_slug_is_filename_safe() {
        assert_eq!(
            caption_slug("Figure 1: A *very* long caption that keeps going and going"),
            "figure_1_a_very_long_caption_t"
        );
        assert_eq!(caption_slug("///"), "");
    }

    #[test]
    fn caption_strips_loc_tokens() {
        let doc = parse(
            "<doctag space=\"pixels\">\
             <picture><loc_10><loc_10><loc_60><loc_60>Chart of results</picture>\
             </doctag>",
        )
        .unwrap();
        let (crops, _) = extract_regions(&doc, &page(100, 100), is_picture, &config());
        assert_eq!(crops[0].caption.as_deref(), Some("Chart of results"));
    }
}
