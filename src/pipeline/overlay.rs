//! Overlay rendering: bounding boxes drawn over the page raster for visual
//! verification.
//!
//! One hollow rectangle per element, color keyed by [`ElementKind`] through a
//! fixed table — the same kind is always the same color, so a reviewer can
//! visually diff overlays across pages and runs. Labels are drawn at each
//! box's top-left corner (moved below the box when it would clip off the top
//! edge of the image).
//!
//! ## Fonts
//!
//! Label text needs a TrueType font. None is embedded; the renderer takes a
//! caller-supplied path or probes common system locations, and when nothing
//! is found it degrades to boxes without labels rather than failing the page.
//!
//! ## Partial failure
//!
//! A box entirely outside the image is recorded as an [`ElementError`] and
//! skipped; the remaining elements still render. The caller surfaces the
//! error count in its stats.

use crate::config::CorrectionConfig;
use crate::error::ElementError;
use crate::model::{DocTagDocument, DocTagElement, ElementKind};
use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{debug, warn};

/// Fixed color per element kind (RGBA).
///
/// The table is part of the tool's contract: changing a color invalidates a
/// reviewer's learned mapping, so additions go at the bottom and existing
/// entries stay put.
#[inline]
pub const fn kind_color(kind: ElementKind) -> Rgba<u8> {
    match kind {
        ElementKind::Title => Rgba([156, 39, 176, 255]), // Purple
        ElementKind::SectionHeader => Rgba([255, 87, 34, 255]), // Deep Orange
        ElementKind::Paragraph => Rgba([33, 150, 243, 255]), // Blue
        ElementKind::Text => Rgba([33, 150, 243, 255]),  // Blue (same family as paragraph)
        ElementKind::Table => Rgba([156, 39, 176, 255]), // Purple
        ElementKind::Picture => Rgba([76, 175, 80, 255]), // Green
        ElementKind::Caption => Rgba([255, 152, 0, 255]), // Orange
        ElementKind::ListItem => Rgba([0, 188, 212, 255]), // Cyan
        ElementKind::Footnote => Rgba([121, 85, 72, 255]), // Brown
        ElementKind::PageFooter => Rgba([121, 85, 72, 255]), // Brown
        ElementKind::PageHeader => Rgba([255, 193, 7, 255]), // Amber
        ElementKind::Formula => Rgba([244, 67, 54, 255]), // Red
        ElementKind::Other => Rgba([96, 125, 139, 255]), // Blue Grey
    }
}

/// Common TrueType locations probed when no explicit font path is given.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// Load the label font: explicit path first, then the candidate list.
///
/// Missing fonts are a warning, not an error — the overlay is still useful
/// without labels.
pub fn load_label_font(font_path: Option<&Path>) -> Option<FontVec> {
    let candidates: Vec<&Path> = font_path
        .into_iter()
        .chain(FONT_CANDIDATES.iter().map(Path::new))
        .collect();
    for path in candidates {
        match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    debug!(path = %path.display(), "loaded label font");
                    return Some(font);
                }
                Err(e) => warn!(path = %path.display(), "not a usable font: {e}"),
            },
            Err(_) => continue,
        }
    }
    warn!("no label font found; overlay will have boxes only");
    None
}

/// Draw one bounding rectangle per element over the page image.
///
/// The document must already be in page-pixel space (the corrector's
/// output). Returns the overlay plus per-element failures for boxes that lie
/// entirely outside the image; those never abort the remaining elements.
pub fn render_overlay(
    doc: &DocTagDocument,
    page_image: &DynamicImage,
    config: &CorrectionConfig,
) -> (RgbaImage, Vec<ElementError>) {
    let mut img = page_image.to_rgba8();
    let (width, height) = (img.width(), img.height());
    let font = if config.draw_labels {
        load_label_font(config.font_path.as_deref())
    } else {
        None
    };
    let mut errors = Vec::new();

    for (index, element) in doc.iter_elements().enumerate() {
        match clamp_box(element, index, width, height) {
            Ok(clamped) => {
                draw_element(&mut img, &clamped, element, config, font.as_ref());
            }
            Err(e) => {
                warn!(index, element = %element.tag, "skipping element: {e}");
                errors.push(e);
            }
        }
    }

    debug!(
        elements = doc.element_count(),
        skipped = errors.len(),
        "rendered overlay"
    );
    (img, errors)
}

/// An element's box clamped to image bounds, in integer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClampedBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Clamp an element's box to the image, failing per-element when nothing of
/// it remains.
pub(crate) fn clamp_box(
    element: &DocTagElement,
    index: usize,
    width: u32,
    height: u32,
) -> Result<ClampedBox, ElementError> {
    let b = element.bbox;
    if b.width() <= 0.0 {
        return Err(ElementError::DegenerateBox {
            index,
            kind: element.kind.name().to_string(),
            dimension: "width".to_string(),
        });
    }
    if b.height() <= 0.0 {
        return Err(ElementError::DegenerateBox {
            index,
            kind: element.kind.name().to_string(),
            dimension: "height".to_string(),
        });
    }
    let empty = ElementError::EmptyRegion {
        index,
        kind: element.kind.name().to_string(),
        left: b.left,
        top: b.top,
        right: b.right,
        bottom: b.bottom,
        width,
        height,
    };
    if b.left >= f64::from(width) || b.top >= f64::from(height) {
        return Err(empty);
    }
    let x = b.left.max(0.0) as u32;
    let y = b.top.max(0.0) as u32;
    let x2 = (b.right.min(f64::from(width))).round() as u32;
    let y2 = (b.bottom.min(f64::from(height))).round() as u32;
    if x2 <= x || y2 <= y {
        return Err(empty);
    }
    Ok(ClampedBox {
        x,
        y,
        w: x2 - x,
        h: y2 - y,
    })
}

fn draw_element(
    img: &mut RgbaImage,
    clamped: &ClampedBox,
    element: &DocTagElement,
    config: &CorrectionConfig,
    font: Option<&FontVec>,
) {
    let color = kind_color(element.kind);
    let (width, height) = (img.width(), img.height());

    // Nested rectangles give the line its thickness without anti-aliasing.
    for t in 0..config.line_thickness {
        let inner_w = clamped.w.saturating_sub(2 * t);
        let inner_h = clamped.h.saturating_sub(2 * t);
        if inner_w == 0 || inner_h == 0 {
            break;
        }
        let rect = Rect::at((clamped.x + t) as i32, (clamped.y + t) as i32)
            .of_size(inner_w, inner_h);
        draw_hollow_rect_mut(img, rect, color);
    }

    let Some(font) = font else { return };

    let label = element.tag.as_str();
    let label_h = config.font_scale.ceil() as u32 + 4;
    // Label above the box, unless that would clip off the top of the image.
    let text_y = if clamped.y < label_h {
        (clamped.y + clamped.h + 2).min(height.saturating_sub(label_h))
    } else {
        clamped.y - label_h
    };
    let bg_w = (label.len() as u32 * (config.font_scale as u32 * 3 / 5 + 1)).max(8);

    for py in text_y..(text_y + label_h).min(height) {
        for px in clamped.x..(clamped.x + bg_w).min(width) {
            img.put_pixel(px, py, Rgba([color.0[0], color.0[1], color.0[2], 255]));
        }
    }
    draw_text_mut(
        img,
        Rgba([255, 255, 255, 255]),
        clamped.x as i32 + 2,
        text_y as i32 + 2,
        PxScale::from(config.font_scale),
        font,
        label,
    );
}
