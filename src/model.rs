//! The DocTags entity model: typed elements with bounding boxes.
//!
//! A [`DocTagDocument`] is an ordered tree of [`DocTagElement`]s, each carrying
//! a [`BBox`] in whatever coordinate space the document declares — a space
//! *tag*, not necessarily pixels. The model is a plain value type: parsing
//! creates it, the corrector derives a new one from it, the renderer only
//! reads it. No stage shares mutable state with another.
//!
//! Element order is the document reading order and is preserved through every
//! transform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed vocabulary of layout element kinds.
///
/// Unknown tags parse to [`ElementKind::Other`] rather than failing, so
/// documents from newer layout models still flow through the pipeline. The
/// raw tag name is kept on the element itself, which is what serialization
/// writes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Title,
    SectionHeader,
    Paragraph,
    Text,
    Table,
    Picture,
    Caption,
    ListItem,
    Footnote,
    PageFooter,
    PageHeader,
    Formula,
    Other,
}

impl ElementKind {
    /// Map a raw tag name onto the fixed vocabulary.
    ///
    /// Levelled section headers (`section_header_level_2`) all map to
    /// [`ElementKind::SectionHeader`]; the level survives in the element's
    /// raw tag.
    pub fn from_tag(tag: &str) -> Self {
        if tag.starts_with("section_header") {
            return ElementKind::SectionHeader;
        }
        match tag {
            "title" => ElementKind::Title,
            "paragraph" => ElementKind::Paragraph,
            "text" => ElementKind::Text,
            "table" | "otsl" => ElementKind::Table,
            "picture" => ElementKind::Picture,
            "caption" => ElementKind::Caption,
            "list_item" => ElementKind::ListItem,
            "footnote" => ElementKind::Footnote,
            "page_footer" => ElementKind::PageFooter,
            "page_header" => ElementKind::PageHeader,
            "formula" => ElementKind::Formula,
            _ => ElementKind::Other,
        }
    }

    /// Canonical lowercase name, used in labels, filenames, and the region
    /// index.
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Title => "title",
            ElementKind::SectionHeader => "section_header",
            ElementKind::Paragraph => "paragraph",
            ElementKind::Text => "text",
            ElementKind::Table => "table",
            ElementKind::Picture => "picture",
            ElementKind::Caption => "caption",
            ElementKind::ListItem => "list_item",
            ElementKind::Footnote => "footnote",
            ElementKind::PageFooter => "page_footer",
            ElementKind::PageHeader => "page_header",
            ElementKind::Formula => "formula",
            ElementKind::Other => "other",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An axis-aligned bounding box in the document's current coordinate space.
///
/// Invariants: `left <= right`, `top <= bottom`, all coordinates
/// non-negative. The parser enforces them by swapping inverted edges (layout
/// models occasionally emit boxes bottom-up) and rejecting negative values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BBox {
    /// Construct a box, swapping edges if they arrive inverted.
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        let (left, right) = if left <= right {
            (left, right)
        } else {
            (right, left)
        };
        let (top, bottom) = if top <= bottom {
            (top, bottom)
        } else {
            (bottom, top)
        };
        BBox {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// True when `other` lies fully inside `self` (closed intervals).
    pub fn contains(&self, other: &BBox) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    /// Compare two boxes within a floating tolerance.
    pub fn approx_eq(&self, other: &BBox, tol: f64) -> bool {
        (self.left - other.left).abs() <= tol
            && (self.top - other.top).abs() <= tol
            && (self.right - other.right).abs() <= tol
            && (self.bottom - other.bottom).abs() <= tol
    }
}

/// One typed node of the DocTags tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocTagElement {
    /// The raw tag name as it appeared in the markup (`section_header_level_2`,
    /// `chart`, …). Serialization writes this back, so parsing is lossless
    /// even for kinds outside the fixed vocabulary.
    pub tag: String,
    /// The tag mapped onto the fixed vocabulary.
    pub kind: ElementKind,
    /// Bounding box in the document's current coordinate space.
    pub bbox: BBox,
    /// Extracted text or caption content, if any.
    pub text: Option<String>,
    /// Nested elements (table cells, captioned pictures), in reading order.
    pub children: Vec<DocTagElement>,
}

impl DocTagElement {
    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(DocTagElement::node_count).sum::<usize>()
    }
}

/// An ordered DocTags document for exactly one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocTagDocument {
    /// Source page identifier, when the caller supplied one.
    pub page: Option<String>,
    /// The raw value of the `space` attribute on the `<doctag>` envelope,
    /// when present. Interpreted by the resolver; an unrecognized value only
    /// fails once resolution is attempted without an override.
    pub declared_space: Option<String>,
    /// Root elements in reading order.
    pub elements: Vec<DocTagElement>,
}

impl DocTagDocument {
    /// Total element count across the whole tree.
    pub fn element_count(&self) -> usize {
        self.elements.iter().map(DocTagElement::node_count).sum()
    }

    /// Depth-first iteration over every element in reading order.
    pub fn iter_elements(&self) -> impl Iterator<Item = &DocTagElement> {
        // Explicit stack; recursion depth in real documents is tiny but the
        // input is untrusted.
        let mut stack: Vec<&DocTagElement> = self.elements.iter().rev().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }

    /// The smallest (max_x, max_y) extent covering every box in the tree.
    ///
    /// Used by the suggestion heuristic to guess what space the coordinates
    /// live in. Returns `None` for an empty document.
    pub fn extent(&self) -> Option<(f64, f64)> {
        let mut it = self.iter_elements();
        let first = it.next()?;
        let mut max_x = first.bbox.right;
        let mut max_y = first.bbox.bottom;
        for el in it {
            max_x = max_x.max(el.bbox.right);
            max_y = max_y.max(el.bbox.bottom);
        }
        Some((max_x, max_y))
    }
}

/// The true rendered page: pixel dimensions plus the DPI used to produce it.
///
/// Supplied by the rasterizing collaborator; the core never rasterizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRasterInfo {
    pub width_px: u32,
    pub height_px: u32,
    pub dpi: u32,
}

impl PageRasterInfo {
    pub fn new(width_px: u32, height_px: u32, dpi: u32) -> Self {
        PageRasterInfo {
            width_px,
            height_px,
            dpi,
        }
    }

    /// Raster info for an already-loaded page image.
    pub fn for_image(image: &image::DynamicImage, dpi: u32) -> Self {
        PageRasterInfo {
            width_px: image.width(),
            height_px: image.height(),
            dpi,
        }
    }
}
