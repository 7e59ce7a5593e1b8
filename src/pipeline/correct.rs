//! Scaling correction: rewrite every box in a document through an affine
//! per-axis map.
//!
//! The corrector is a pure function from (document, parameters) to a new
//! document; the source is never mutated, so the renderer can still diff
//! against the original. Corrections apply uniformly and recursively — a
//! table's cells scale exactly like the table itself, so whatever nesting
//! consistency the source had is preserved.
//!
//! Applying twice is **not** the same as applying once: factors compose
//! multiplicatively (`apply(apply(d, f), f)` equals `apply(d, f²)`). Callers
//! sweeping candidates must always start from the raw document and track the
//! cumulative factor themselves.

use crate::error::DocTagsError;
use crate::model::{BBox, DocTagDocument, DocTagElement};
use crate::pipeline::resolve::{ScalingParameters, Transform};
use tracing::debug;

/// Apply a per-axis scaling correction to every element's box.
///
/// New coordinates are `v' = max(0, v * factor + offset)` per edge; the
/// clamp keeps a negative offset from pushing boxes off the page's top-left
/// corner.
///
/// # Errors
/// `InvalidScalingFactor` when either factor is zero, negative, or
/// non-finite — such a factor would collapse or mirror the page and is never
/// meaningful here.
pub fn apply(
    doc: &DocTagDocument,
    params: &ScalingParameters,
) -> Result<DocTagDocument, DocTagsError> {
    validate_factors(params.x_factor, params.y_factor)?;
    let corrected = apply_transform(doc, &params.as_transform());
    debug!(
        elements = corrected.element_count(),
        %params,
        "applied scaling correction"
    );
    Ok(corrected)
}

/// Apply an already-validated transform (typically base ∘ correction from
/// the resolver) to every element's box.
pub fn apply_transform(doc: &DocTagDocument, transform: &Transform) -> DocTagDocument {
    DocTagDocument {
        page: doc.page.clone(),
        // The corrected document is in pixel space by construction.
        declared_space: Some("pixels".to_string()),
        elements: doc
            .elements
            .iter()
            .map(|el| transform_element(el, transform))
            .collect(),
    }
}

fn transform_element(element: &DocTagElement, t: &Transform) -> DocTagElement {
    DocTagElement {
        tag: element.tag.clone(),
        kind: element.kind,
        bbox: transform_bbox(&element.bbox, t),
        text: element.text.clone(),
        children: element
            .children
            .iter()
            .map(|child| transform_element(child, t))
            .collect(),
    }
}

fn transform_bbox(bbox: &BBox, t: &Transform) -> BBox {
    BBox::new(
        t.map_x(bbox.left).max(0.0),
        t.map_y(bbox.top).max(0.0),
        t.map_x(bbox.right).max(0.0),
        t.map_y(bbox.bottom).max(0.0),
    )
}

pub(crate) fn validate_factors(x_factor: f64, y_factor: f64) -> Result<(), DocTagsError> {
    if !(x_factor > 0.0) || !x_factor.is_finite() {
        return Err(DocTagsError::InvalidScalingFactor {
            axis: 'x',
            value: x_factor,
        });
    }
    if !(y_factor > 0.0) || !y_factor.is_finite() {
        return Err(DocTagsError::InvalidScalingFactor {
            axis: 'y',
            value: y_factor,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parse::parse;

    const TOL: f64 = 1e-9;

    fn doc() -> DocTagDocument {
        parse(
            "<doctag space=\"500x500\">\
             <table><loc_100><loc_200><loc_400><loc_450>\
             <text><loc_110><loc_210><loc_390><loc_250>cell</text>\
             </table>\
             <picture><loc_50><loc_20><loc_250><loc_180></picture>\
             </doctag>",
        )
        .unwrap()
    }

    #[test]
    fn apply_scales_every_edge() {
        let out = apply(&doc(), &ScalingParameters::factors(0.5, 2.0)).unwrap();
        let table = &out.elements[0];
        assert_eq!(table.bbox.left, 50.0);
        assert_eq!(table.bbox.right, 200.0);
        assert_eq!(table.bbox.top, 400.0);
        assert_eq!(table.bbox.bottom, 900.0);
    }

    #[test]
    fn apply_is_recursive_and_preserves_nesting() {
        let source = doc();
        let out = apply(&source, &ScalingParameters::factors(0.7, 0.7)).unwrap();
        let table = &out.elements[0];
        let cell = &table.children[0];
        assert!((cell.bbox.left - 77.0).abs() < TOL);
        // The cell was inside the table before, so it stays inside after.
        assert!(source.elements[0].bbox.contains(&source.elements[0].children[0].bbox));
        assert!(table.bbox.contains(&cell.bbox));
    }

    #[test]
    fn apply_preserves_order_text_and_kind() {
        let out = apply(&doc(), &ScalingParameters::factors(1.3, 1.3)).unwrap();
        let tags: Vec<&str> = out.elements.iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["table", "picture"]);
        assert_eq!(out.elements[0].children[0].text.as_deref(), Some("cell"));
    }

    #[test]
    fn corrected_document_is_pixel_space() {
        let out = apply(&doc(), &ScalingParameters::factors(1.0, 1.0)).unwrap();
        assert_eq!(out.declared_space.as_deref(), Some("pixels"));
    }

    #[test]
    fn offsets_shift_after_scaling_and_clamp_at_zero() {
        let params = ScalingParameters {
            x_factor: 1.0,
            y_factor: 1.0,
            x_offset: -100.0,
            y_offset: 30.0,
        };
        let out = apply(&doc(), &params).unwrap();
        let picture = &out.elements[1];
        assert_eq!(picture.bbox.left, 0.0); // 50 - 100, clamped
        assert_eq!(picture.bbox.right, 150.0);
        assert_eq!(picture.bbox.top, 50.0);
    }

    #[test]
    fn non_positive_factor_is_rejected() {
        let err = apply(&doc(), &ScalingParameters::factors(0.0, 1.0)).unwrap_err();
        assert!(matches!(
            err,
            DocTagsError::InvalidScalingFactor { axis: 'x', .. }
        ));
        let err = apply(&doc(), &ScalingParameters::factors(1.0, -2.0)).unwrap_err();
        assert!(matches!(
            err,
            DocTagsError::InvalidScalingFactor { axis: 'y', .. }
        ));
    }

    #[test]
    fn scaling_is_linear_under_composition() {
        let source = doc();
        let twice = apply(
            &apply(&source, &ScalingParameters::factors(0.8, 1.1)).unwrap(),
            &ScalingParameters::factors(1.5, 0.6),
        )
        .unwrap();
        let once = apply(
            &source,
            &ScalingParameters::factors(0.8 * 1.5, 1.1 * 0.6),
        )
        .unwrap();
        for (a, b) in twice.iter_elements().zip(once.iter_elements()) {
            assert!(a.bbox.approx_eq(&b.bbox, TOL), "{:?} vs {:?}", a.bbox, b.bbox);
        }
    }

    #[test]
    fn upscaling_strictly_widens_boxes() {
        let source = doc();
        let out = apply(&source, &ScalingParameters::factors(1.2, 1.0)).unwrap();
        for (before, after) in source.iter_elements().zip(out.iter_elements()) {
            assert!(before.bbox.width() > 0.0);
            assert!(
                after.bbox.width() > before.bbox.width(),
                "box should widen: {} vs {}",
                after.bbox.width(),
                before.bbox.width()
            );
        }
    }

    #[test]
    fn apply_twice_equals_squared_factor() {
        let source = doc();
        let f = ScalingParameters::factors(0.7, 0.7);
        let twice = apply(&apply(&source, &f).unwrap(), &f).unwrap();
        let squared = apply(&source, &ScalingParameters::factors(0.49, 0.49)).unwrap();
        for (a, b) in twice.iter_elements().zip(squared.iter_elements()) {
            assert!(a.bbox.approx_eq(&b.bbox, 1e-6));
        }
    }
}
