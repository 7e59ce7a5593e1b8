//! Output types: everything a page's pipeline run hands back to the caller.
//!
//! [`PageOutput`] is the in-memory result (corrected document, overlay,
//! crops, per-element failures); [`RegionIndex`] is the machine-readable
//! sidecar written next to the crops so downstream tooling — the web UI, a
//! batch reporter — can enumerate them without re-parsing anything.
//!
//! Failed elements never disappear: `stats.elements_rendered +
//! stats.elements_skipped` always equals `stats.elements_total`.

use crate::error::ElementError;
use crate::model::{BBox, DocTagDocument, PageRasterInfo};
use crate::pipeline::extract::RegionCrop;
use crate::pipeline::resolve::Transform;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// The complete result of one page's correction pipeline.
#[derive(Debug, Clone)]
pub struct PageOutput {
    /// The corrected document, in page-pixel space.
    pub document: DocTagDocument,
    /// The corrected document serialized back to DocTags markup.
    pub corrected_text: String,
    /// The total transform (base convention composed with the correction)
    /// that produced `document` from the raw input.
    pub transform: Transform,
    /// The page raster with bounding boxes drawn on.
    pub overlay: RgbaImage,
    /// Extracted region crops, in reading order.
    pub crops: Vec<RegionCrop>,
    /// Per-element failures from rendering and extraction. These did not
    /// abort the page.
    pub element_errors: Vec<ElementError>,
    pub stats: PageStats,
}

/// Per-page processing counts, the summary surfaced at the orchestration
/// boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStats {
    /// Elements in the parsed document (whole tree).
    pub elements_total: usize,
    /// Elements drawn on the overlay.
    pub elements_rendered: usize,
    /// Elements skipped during overlay rendering. Extraction failures are
    /// listed in the element errors and the region index instead.
    pub elements_skipped: usize,
    /// Region crops produced.
    pub regions_extracted: usize,
    /// Wall-clock time for the whole page, in milliseconds.
    pub duration_ms: u64,
}

/// One entry of the region index sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    /// Crop image filename, relative to the index file.
    pub file: String,
    /// Position of the element in document reading order.
    pub index: usize,
    /// Canonical kind name (`picture`, `table`, …).
    pub kind: String,
    /// Raw tag name from the markup.
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Final clamped box in page pixels.
    pub bbox: BBox,
}

impl RegionRecord {
    /// Build the index entry for a crop saved under `file`.
    pub fn for_crop(crop: &RegionCrop, file: impl Into<String>) -> Self {
        RegionRecord {
            file: file.into(),
            index: crop.index,
            kind: crop.kind.name().to_string(),
            tag: crop.tag.clone(),
            caption: crop.caption.clone(),
            bbox: crop.bbox,
        }
    }
}

/// The machine-readable index written alongside extracted region crops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionIndex {
    /// Page identifier, when the caller supplied one.
    pub page: Option<String>,
    /// The raster the boxes are expressed against.
    pub raster: PageRasterInfo,
    /// Per-element failures recorded during extraction.
    pub errors: Vec<ElementError>,
    pub regions: Vec<RegionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementKind;

    #[test]
    fn region_index_round_trips_through_json() {
        let index = RegionIndex {
            page: Some("8".into()),
            raster: PageRasterInfo::new(1000, 800, 200),
            errors: vec![],
            regions: vec![RegionRecord {
                file: "region_00.png".into(),
                index: 0,
                kind: ElementKind::Picture.name().into(),
                tag: "picture".into(),
                caption: Some("Figure 1".into()),
                bbox: BBox::new(10.0, 20.0, 110.0, 120.0),
            }],
        };
        let json = serde_json::to_string_pretty(&index).unwrap();
        let back: RegionIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
    }

    #[test]
    fn record_without_caption_omits_the_field() {
        let record = RegionRecord {
            file: "region_01.png".into(),
            index: 1,
            kind: "table".into(),
            tag: "table".into(),
            caption: None,
            bbox: BBox::new(0.0, 0.0, 1.0, 1.0),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("caption"), "got: {json}");
    }
}
