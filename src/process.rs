//! Eager per-page entry points.
//!
//! Each function runs the stages strictly in order — parse → resolve →
//! correct → render → extract — as plain synchronous calls with no shared
//! state, no internal retries, and no timeouts. A caller that wants
//! cancellation simply stops calling; a batch driver that wants parallelism
//! runs one page per worker and relies on the unique per-page filenames
//! this module produces.
//!
//! Fatal errors (unparseable markup, unresolvable convention, bad factors)
//! abort the page and surface as `Err`; element-level render/extract
//! failures are collected into [`PageOutput::element_errors`] and the page
//! completes.

use crate::config::{CorrectionConfig, FactorComposition};
use crate::error::DocTagsError;
use crate::model::{DocTagDocument, PageRasterInfo};
use crate::output::{PageOutput, PageStats, RegionIndex, RegionRecord};
use crate::pipeline::{correct, extract, overlay, parse, resolve};
use crate::pipeline::resolve::{ScalingParameters, Transform};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A corrected document plus the transform that produced it.
#[derive(Debug, Clone)]
pub struct CorrectedPage {
    pub document: DocTagDocument,
    pub corrected_text: String,
    pub transform: Transform,
}

/// Parse raw DocTags markup and rewrite every box into page-pixel space.
///
/// The correction factors come from `config`; how they interact with the
/// declared convention's base transform is `config.composition`:
/// with [`FactorComposition::Compose`] (default) the correction applies in
/// the source space first, then the base transform; with
/// [`FactorComposition::ReplaceBase`] the factors are the whole mapping and
/// no convention is needed at all.
///
/// # Errors
/// `MalformedDocument`, `EmptyPage`, `UnknownConvention` (compose mode with
/// no resolvable convention), `InvalidScalingFactor`.
pub fn correct_page(
    text: &str,
    raster: &PageRasterInfo,
    config: &CorrectionConfig,
) -> Result<CorrectedPage, DocTagsError> {
    let document = parse::parse(text)?;
    if document.elements.is_empty() {
        return Err(DocTagsError::EmptyPage);
    }
    correct::validate_factors(config.x_factor, config.y_factor)?;

    let params = ScalingParameters {
        x_factor: config.x_factor,
        y_factor: config.y_factor,
        x_offset: config.x_offset,
        y_offset: config.y_offset,
    };
    let transform = match config.composition {
        FactorComposition::Compose => {
            let base = resolve::resolve(
                document.declared_space.as_deref(),
                config.convention,
                raster,
            )?;
            base.compose(&params.as_transform())
        }
        FactorComposition::ReplaceBase => params.as_transform(),
    };

    let corrected = correct::apply_transform(&document, &transform);
    let corrected_text = parse::serialize(&corrected);
    debug!(
        elements = corrected.element_count(),
        sx = transform.sx,
        sy = transform.sy,
        "corrected page"
    );
    Ok(CorrectedPage {
        document: corrected,
        corrected_text,
        transform,
    })
}

/// Run the full in-memory pipeline for one page.
///
/// Returns `Ok(PageOutput)` even when some elements failed to render or
/// crop — check `element_errors` and the counts in `stats`. Only parse,
/// resolution, and factor validation abort the page.
pub fn process_page(
    text: &str,
    page_image: &DynamicImage,
    raster: &PageRasterInfo,
    config: &CorrectionConfig,
) -> Result<PageOutput, DocTagsError> {
    let start = Instant::now();

    if page_image.width() != raster.width_px || page_image.height() != raster.height_px {
        warn!(
            image_w = page_image.width(),
            image_h = page_image.height(),
            raster_w = raster.width_px,
            raster_h = raster.height_px,
            "page image dimensions disagree with PageRasterInfo; trusting the image"
        );
    }

    let corrected = correct_page(text, raster, config)?;
    let (overlay_img, overlay_errors) =
        overlay::render_overlay(&corrected.document, page_image, config);
    let (crops, extract_errors) =
        extract::extract_regions(&corrected.document, page_image, extract::is_picture, config);

    let elements_total = corrected.document.element_count();
    let stats = PageStats {
        elements_total,
        elements_rendered: elements_total - overlay_errors.len(),
        elements_skipped: overlay_errors.len(),
        regions_extracted: crops.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        total = stats.elements_total,
        rendered = stats.elements_rendered,
        skipped = stats.elements_skipped,
        regions = stats.regions_extracted,
        ms = stats.duration_ms,
        "page processed"
    );

    let mut element_errors = overlay_errors;
    element_errors.extend(extract_errors);
    Ok(PageOutput {
        document: corrected.document,
        corrected_text: corrected.corrected_text,
        transform: corrected.transform,
        overlay: overlay_img,
        crops,
        element_errors,
        stats,
    })
}

/// Filesystem locations of one page's written artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageArtifacts {
    pub corrected_doctags: PathBuf,
    pub overlay: PathBuf,
    pub regions_dir: PathBuf,
    pub region_index: PathBuf,
}

/// Run the pipeline and write every artifact under `out_dir`.
///
/// Filenames embed `page_id`, so parallel callers processing different
/// pages never collide in a shared directory:
///
/// ```text
/// out_dir/page_{id}.fixed.doctags.txt
/// out_dir/page_{id}.overlay.png
/// out_dir/page_{id}.regions/region_NN[_slug].png
/// out_dir/page_{id}.regions/index.json
/// ```
///
/// Text artifacts are written atomically (temp file + rename) so a reader
/// polling the directory never sees a half-written document.
pub fn process_page_to_dir(
    text: &str,
    page_image: &DynamicImage,
    raster: &PageRasterInfo,
    config: &CorrectionConfig,
    out_dir: &Path,
    page_id: &str,
) -> Result<(PageOutput, PageArtifacts), DocTagsError> {
    let output = process_page(text, page_image, raster, config)?;

    std::fs::create_dir_all(out_dir).map_err(|e| DocTagsError::OutputWriteFailed {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let corrected_doctags = out_dir.join(format!("page_{page_id}.fixed.doctags.txt"));
    write_text_atomic(&corrected_doctags, &output.corrected_text)?;

    let overlay_path = out_dir.join(format!("page_{page_id}.overlay.png"));
    save_image(&output.overlay, &overlay_path)?;

    let regions_dir = out_dir.join(format!("page_{page_id}.regions"));
    std::fs::create_dir_all(&regions_dir).map_err(|e| DocTagsError::OutputWriteFailed {
        path: regions_dir.clone(),
        source: e,
    })?;

    let mut records = Vec::with_capacity(output.crops.len());
    for crop in &output.crops {
        let file = format!("{}.png", crop.file_stem());
        save_image(&crop.image, &regions_dir.join(&file))?;
        if let Some(caption) = &crop.caption {
            // Caption sidecar, for reviewers browsing the directory.
            write_text_atomic(
                &regions_dir.join(format!("{}.txt", crop.file_stem())),
                caption,
            )?;
        }
        records.push(RegionRecord::for_crop(crop, file));
    }

    let index = RegionIndex {
        page: output.document.page.clone().or_else(|| Some(page_id.to_string())),
        raster: *raster,
        errors: output.element_errors.clone(),
        regions: records,
    };
    let index_path = regions_dir.join("index.json");
    let json = serde_json::to_string_pretty(&index)
        .map_err(|e| DocTagsError::OutputWriteFailed {
            path: index_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
    write_text_atomic(&index_path, &json)?;

    info!(dir = %out_dir.display(), page = page_id, "artifacts written");
    Ok((
        output,
        PageArtifacts {
            corrected_doctags,
            overlay: overlay_path,
            regions_dir,
            region_index: index_path,
        },
    ))
}

/// Write `content`, then rename into place.
fn write_text_atomic(path: &Path, content: &str) -> Result<(), DocTagsError> {
    let tmp = path.with_extension("tmp");
    let write = || -> std::io::Result<()> {
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)
    };
    write().map_err(|e| DocTagsError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn save_image(image: &image::RgbaImage, path: &Path) -> Result<(), DocTagsError> {
    image.save(path).map_err(|e| DocTagsError::ImageEncodeFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::resolve::Convention;
    use image::{Rgba, RgbaImage};

    fn page_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
    }

    fn base_config() -> CorrectionConfig {
        CorrectionConfig::builder().draw_labels(false).build().unwrap()
    }

    #[test]
    fn correct_page_composes_convention_and_factors() {
        let raster = PageRasterInfo::new(1000, 800, 200);
        let config = CorrectionConfig::builder()
            .factors(0.7, 0.7)
            .convention(Convention::Normalized)
            .build()
            .unwrap();
        let page = correct_page(
            "<doctag><picture><loc_100><loc_100><loc_300><loc_300></picture></doctag>",
            &raster,
            &config,
        )
        .unwrap();
        let b = page.document.elements[0].bbox;
        assert_eq!((b.left, b.top), (70_000.0, 56_000.0));
        assert_eq!((b.right, b.bottom), (210_000.0, 168_000.0));
    }

    #[test]
    fn correct_page_replace_base_ignores_convention() {
        let raster = PageRasterInfo::new(1000, 800, 200);
        let config = CorrectionConfig::builder()
            .factors(2.0, 2.0)
            .composition(FactorComposition::ReplaceBase)
            .build()
            .unwrap();
        // No declared space and no override: only fine because ReplaceBase
        // never consults the convention.
        let page = correct_page(
            "<doctag><text><loc_10><loc_10><loc_20><loc_20>t</text></doctag>",
            &raster,
            &config,
        )
        .unwrap();
        assert_eq!(page.document.elements[0].bbox.right, 40.0);
    }

    #[test]
    fn correct_page_unresolvable_convention_fails() {
        let raster = PageRasterInfo::new(1000, 800, 200);
        let err = correct_page(
            "<doctag><text><loc_1><loc_1><loc_2><loc_2>t</text></doctag>",
            &raster,
            &base_config(),
        )
        .unwrap_err();
        assert!(matches!(err, DocTagsError::UnknownConvention { .. }));
    }

    #[test]
    fn correct_page_empty_document_fails() {
        let raster = PageRasterInfo::new(100, 100, 72);
        let err = correct_page("<doctag></doctag>", &raster, &base_config()).unwrap_err();
        assert!(matches!(err, DocTagsError::EmptyPage));
    }

    #[test]
    fn corrected_text_reparses_in_pixel_space() {
        let raster = PageRasterInfo::new(1000, 500, 200);
        let config = CorrectionConfig::builder()
            .convention(Convention::default_grid())
            .build()
            .unwrap();
        let page = correct_page(
            "<doctag space=\"500x500\">\
             <table><loc_100><loc_100><loc_400><loc_200></table></doctag>",
            &raster,
            &config,
        )
        .unwrap();
        let reparsed = parse::parse(&page.corrected_text).unwrap();
        assert_eq!(reparsed.declared_space.as_deref(), Some("pixels"));
        assert_eq!(reparsed.elements[0].bbox.left, 200.0);
        assert_eq!(reparsed.elements[0].bbox.top, 100.0);
    }

    #[test]
    fn process_page_counts_add_up() {
        let raster = PageRasterInfo::new(200, 200, 72);
        let config = CorrectionConfig::builder()
            .convention(Convention::Pixels)
            .draw_labels(false)
            .build()
            .unwrap();
        // Second element lands entirely off the page.
        let output = process_page(
            "<doctag space=\"pixels\">\
             <picture><loc_10><loc_10><loc_100><loc_100></picture>\
             <text><loc_900><loc_900><loc_950><loc_950>lost</text></doctag>",
            &page_image(200, 200),
            &raster,
            &config,
        )
        .unwrap();
        assert_eq!(output.stats.elements_total, 2);
        assert_eq!(output.stats.elements_rendered, 1);
        assert_eq!(output.stats.elements_skipped, 1);
        assert_eq!(output.stats.regions_extracted, 1);
        assert!(!output.element_errors.is_empty());
    }

    #[test]
    fn process_page_to_dir_writes_unique_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let raster = PageRasterInfo::new(200, 200, 72);
        let config = CorrectionConfig::builder()
            .convention(Convention::Pixels)
            .draw_labels(false)
            .build()
            .unwrap();
        let (_, artifacts) = process_page_to_dir(
            "<doctag space=\"pixels\">\
             <picture><loc_10><loc_10><loc_100><loc_100>A chart</picture></doctag>",
            &page_image(200, 200),
            &raster,
            &config,
            dir.path(),
            "7",
        )
        .unwrap();

        assert!(artifacts.corrected_doctags.ends_with("page_7.fixed.doctags.txt"));
        assert!(artifacts.corrected_doctags.exists());
        assert!(artifacts.overlay.exists());
        assert!(artifacts.region_index.exists());

        let index: RegionIndex =
            serde_json::from_str(&std::fs::read_to_string(&artifacts.region_index).unwrap())
                .unwrap();
        assert_eq!(index.regions.len(), 1);
        assert_eq!(index.regions[0].caption.as_deref(), Some("A chart"));
        assert!(artifacts.regions_dir.join(&index.regions[0].file).exists());
        // No stray temp files left behind.
        assert!(!artifacts.corrected_doctags.with_extension("tmp").exists());
    }
}
