//! DocTags markup: lossless parse into the entity model and serialization
//! back out.
//!
//! ## The grammar
//!
//! A document is a `<doctag>…</doctag>` envelope around a sequence of typed
//! elements. Each element opens with its tag, carries exactly four
//! `<loc_..>` coordinate tokens (left, top, right, bottom, in the document's
//! declared space), then optional text and nested elements:
//!
//! ```text
//! <doctag space="500x500" page="8">
//!   <picture><loc_100><loc_100><loc_300><loc_300>
//!     <caption><loc_100><loc_310><loc_300><loc_330>Figure 1</caption>
//!   </picture>
//! </doctag>
//! ```
//!
//! The `space` attribute is the explicit convention marker consumed by
//! [`crate::pipeline::resolve`]; the parser only records it. Unknown element
//! tags map to [`ElementKind::Other`] and survive round-trips because the raw
//! tag name is kept on the element.
//!
//! ## Strictness
//!
//! Layout-model output is untrusted input. Unbalanced tags, a missing or
//! incomplete coordinate quadruple, non-numeric or negative coordinates all
//! fail with `MalformedDocument` naming the offending spot. Text after the
//! closing envelope is ignored (models routinely emit trailing tokens).

use crate::error::DocTagsError;
use crate::model::{BBox, DocTagDocument, DocTagElement, ElementKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;
use tracing::debug;

/// Any markup tag: `<name …>` or `</name>`.
static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([A-Za-z_][A-Za-z0-9_.]*)((?:\s[^>]*)?)>").unwrap());

/// An attribute inside a tag, quoted or bare: `space="normalized"`.
static RE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)\s*=\s*"?([^"\s>]+)"?"#).unwrap());

const ENVELOPE: &str = "doctag";

/// Parse DocTags markup into a [`DocTagDocument`].
///
/// Pure transformation; no I/O. See the module docs for the grammar.
///
/// # Errors
/// `MalformedDocument` when the envelope is missing, tags are unbalanced, an
/// element's coordinate quadruple is missing or incomplete, or a coordinate
/// is non-numeric or negative.
pub fn parse(text: &str) -> Result<DocTagDocument, DocTagsError> {
    let mut doc = DocTagDocument::default();
    let mut stack: Vec<Frame> = Vec::new();
    let mut in_envelope = false;
    let mut last_end = 0usize;

    for caps in RE_TAG.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let closing = !caps[1].is_empty();
        let name = &caps[2];
        let attrs = caps.get(3).map_or("", |m| m.as_str());

        // Free text between the previous tag and this one belongs to the
        // innermost open element.
        let between = &text[last_end..whole.start()];
        if in_envelope {
            if let Some(frame) = stack.last_mut() {
                push_text(&mut frame.text, between);
            }
        }
        last_end = whole.end();

        if !in_envelope {
            if !closing && name == ENVELOPE {
                in_envelope = true;
                for attr in RE_ATTR.captures_iter(attrs) {
                    match &attr[1] {
                        "space" => doc.declared_space = Some(attr[2].to_string()),
                        "page" => doc.page = Some(attr[2].to_string()),
                        _ => {}
                    }
                }
            }
            continue;
        }

        if name == ENVELOPE {
            if !closing {
                return Err(DocTagsError::malformed(
                    "nested <doctag> envelope",
                    whole.as_str(),
                ));
            }
            if let Some(open) = stack.last() {
                return Err(DocTagsError::malformed(
                    format!("envelope closed while <{}> is still open", open.tag),
                    whole.as_str(),
                ));
            }
            debug!(
                elements = doc.element_count(),
                space = doc.declared_space.as_deref(),
                "parsed DocTags document"
            );
            return Ok(doc);
        }

        if let Some(value) = name.strip_prefix("loc_") {
            let frame = stack.last_mut().ok_or_else(|| {
                DocTagsError::malformed("<loc_..> token outside any element", whole.as_str())
            })?;
            let coord: f64 = value.parse().map_err(|_| {
                DocTagsError::malformed(
                    format!("non-numeric coordinate {value:?}"),
                    whole.as_str(),
                )
            })?;
            if !coord.is_finite() || coord < 0.0 {
                return Err(DocTagsError::malformed(
                    format!("coordinate {coord} must be non-negative"),
                    whole.as_str(),
                ));
            }
            if frame.locs.len() == 4 {
                return Err(DocTagsError::malformed(
                    format!("more than four <loc_..> coordinates in <{}>", frame.tag),
                    whole.as_str(),
                ));
            }
            frame.locs.push(coord);
            continue;
        }

        if closing {
            let frame = stack.pop().ok_or_else(|| {
                DocTagsError::malformed(format!("stray closing </{name}>"), whole.as_str())
            })?;
            if frame.tag != name {
                return Err(DocTagsError::malformed(
                    format!("expected </{}>, found </{name}>", frame.tag),
                    whole.as_str(),
                ));
            }
            let element = finish_frame(frame, whole.as_str())?;
            match stack.last_mut() {
                Some(parent) => parent.children.push(element),
                None => doc.elements.push(element),
            }
        } else {
            stack.push(Frame {
                tag: name.to_string(),
                locs: Vec::with_capacity(4),
                text: String::new(),
                children: Vec::new(),
            });
        }
    }

    if !in_envelope {
        return Err(DocTagsError::malformed(
            "no <doctag> envelope found",
            text.trim_start(),
        ));
    }
    let open = stack
        .last()
        .map(|f| format!("<{}>", f.tag))
        .unwrap_or_else(|| format!("<{ENVELOPE}>"));
    Err(DocTagsError::malformed(
        format!("{open} is never closed"),
        text.trim_end(),
    ))
}

fn push_text(acc: &mut String, piece: &str) {
    let piece = piece.trim();
    if piece.is_empty() {
        return;
    }
    if !acc.is_empty() {
        acc.push(' ');
    }
    acc.push_str(piece);
}

/// One frame per open element while the tag stream is being folded into a
/// tree.
struct Frame {
    tag: String,
    locs: Vec<f64>,
    text: String,
    children: Vec<DocTagElement>,
}

fn finish_frame(frame: Frame, near: &str) -> Result<DocTagElement, DocTagsError> {
    let Frame {
        tag,
        locs,
        text,
        children,
    } = frame;
    if locs.len() != 4 {
        return Err(DocTagsError::malformed(
            format!(
                "<{tag}> has {} of 4 required <loc_..> coordinates",
                locs.len()
            ),
            near,
        ));
    }
    let kind = ElementKind::from_tag(&tag);
    Ok(DocTagElement {
        tag,
        kind,
        bbox: BBox::new(locs[0], locs[1], locs[2], locs[3]),
        text: if text.is_empty() { None } else { Some(text) },
        children,
    })
}

/// Serialize a document back to DocTags markup.
///
/// The output re-parses to an element tree equal to the input
/// (kind, box, text, children, order); whitespace is normalized, not
/// preserved. Coordinates use shortest round-trip formatting, so integral
/// values stay integral.
pub fn serialize(doc: &DocTagDocument) -> String {
    let mut out = String::with_capacity(doc.element_count() * 64 + 16);
    out.push('<');
    out.push_str(ENVELOPE);
    if let Some(space) = &doc.declared_space {
        let _ = write!(out, " space=\"{space}\"");
    }
    if let Some(page) = &doc.page {
        let _ = write!(out, " page=\"{page}\"");
    }
    out.push_str(">\n");
    for element in &doc.elements {
        serialize_element(&mut out, element);
        out.push('\n');
    }
    let _ = write!(out, "</{ENVELOPE}>");
    out
}

fn serialize_element(out: &mut String, element: &DocTagElement) {
    let _ = write!(
        out,
        "<{tag}>{}{}{}{}",
        Loc(element.bbox.left),
        Loc(element.bbox.top),
        Loc(element.bbox.right),
        Loc(element.bbox.bottom),
        tag = element.tag,
    );
    if let Some(text) = &element.text {
        out.push_str(text);
    }
    for child in &element.children {
        serialize_element(out, child);
    }
    let _ = write!(out, "</{}>", element.tag);
}

/// A coordinate formatted as a `<loc_..>` token.
struct Loc(f64);

impl std::fmt::Display for Loc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // f64 Display is the shortest representation that round-trips, which
        // keeps integer coordinates looking like integers.
        write!(f, "<loc_{}>", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementKind;

    const SIMPLE: &str = "<doctag>\
        <title><loc_10><loc_20><loc_400><loc_60>A Title</title>\
        <picture><loc_100><loc_100><loc_300><loc_300></picture>\
        </doctag>";

    #[test]
    fn parse_simple_document() {
        let doc = parse(SIMPLE).unwrap();
        assert_eq!(doc.elements.len(), 2);
        assert_eq!(doc.elements[0].kind, ElementKind::Title);
        assert_eq!(doc.elements[0].text.as_deref(), Some("A Title"));
        assert_eq!(doc.elements[1].kind, ElementKind::Picture);
        assert_eq!(doc.elements[1].bbox.right, 300.0);
    }

    #[test]
    fn parse_keeps_reading_order() {
        let doc = parse(SIMPLE).unwrap();
        let tags: Vec<&str> = doc.elements.iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["title", "picture"]);
    }

    #[test]
    fn parse_space_and_page_attributes() {
        let doc = parse(
            "<doctag space=\"500x500\" page=\"8\">\
             <text><loc_1><loc_2><loc_3><loc_4>hi</text></doctag>",
        )
        .unwrap();
        assert_eq!(doc.declared_space.as_deref(), Some("500x500"));
        assert_eq!(doc.page.as_deref(), Some("8"));
    }

    #[test]
    fn parse_nested_children() {
        let doc = parse(
            "<doctag><picture><loc_10><loc_10><loc_200><loc_200>\
             <caption><loc_10><loc_210><loc_200><loc_230>Figure 1</caption>\
             </picture></doctag>",
        )
        .unwrap();
        assert_eq!(doc.elements.len(), 1);
        let picture = &doc.elements[0];
        assert_eq!(picture.children.len(), 1);
        assert_eq!(picture.children[0].kind, ElementKind::Caption);
        assert_eq!(picture.children[0].text.as_deref(), Some("Figure 1"));
    }

    #[test]
    fn parse_decimal_coordinates() {
        let doc = parse(
            "<doctag space=\"normalized\">\
             <text><loc_0.1><loc_0.2><loc_0.9><loc_0.85>t</text></doctag>",
        )
        .unwrap();
        assert_eq!(doc.elements[0].bbox.left, 0.1);
        assert_eq!(doc.elements[0].bbox.bottom, 0.85);
    }

    #[test]
    fn parse_unknown_kind_is_preserved_as_other() {
        let doc =
            parse("<doctag><chart><loc_1><loc_1><loc_2><loc_2></chart></doctag>").unwrap();
        assert_eq!(doc.elements[0].kind, ElementKind::Other);
        assert_eq!(doc.elements[0].tag, "chart");
    }

    #[test]
    fn parse_inverted_box_is_normalized() {
        let doc =
            parse("<doctag><text><loc_300><loc_400><loc_100><loc_200>t</text></doctag>").unwrap();
        let b = doc.elements[0].bbox;
        assert!(b.left <= b.right && b.top <= b.bottom);
        assert_eq!(b.left, 100.0);
    }

    #[test]
    fn parse_ignores_trailing_junk_after_envelope() {
        let doc = parse(&format!("{SIMPLE}<end_of_stream>garbage")).unwrap();
        assert_eq!(doc.elements.len(), 2);
    }

    #[test]
    fn missing_envelope_is_malformed() {
        let err = parse("<text><loc_1><loc_2><loc_3><loc_4>t</text>").unwrap_err();
        assert!(err.to_string().contains("envelope"), "got: {err}");
    }

    #[test]
    fn unbalanced_tags_are_malformed() {
        let err = parse("<doctag><table><loc_1><loc_2><loc_3><loc_4></doctag>").unwrap_err();
        assert!(matches!(err, DocTagsError::MalformedDocument { .. }));
    }

    #[test]
    fn mismatched_close_is_malformed() {
        let err =
            parse("<doctag><table><loc_1><loc_2><loc_3><loc_4></text></doctag>").unwrap_err();
        assert!(err.to_string().contains("</table>"), "got: {err}");
    }

    #[test]
    fn missing_coordinates_are_malformed() {
        let err = parse("<doctag><picture><loc_1><loc_2><loc_3></picture></doctag>").unwrap_err();
        assert!(err.to_string().contains("3 of 4"), "got: {err}");
    }

    #[test]
    fn extra_coordinates_are_malformed() {
        let err = parse(
            "<doctag><picture><loc_1><loc_2><loc_3><loc_4><loc_5></picture></doctag>",
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than four"), "got: {err}");
    }

    #[test]
    fn non_numeric_coordinate_is_malformed() {
        let err =
            parse("<doctag><text><loc_a><loc_2><loc_3><loc_4>t</text></doctag>").unwrap_err();
        assert!(err.to_string().contains("non-numeric"), "got: {err}");
    }

    #[test]
    fn truncated_document_is_malformed() {
        let err = parse("<doctag><text><loc_1><loc_2><loc_3><loc_4>cut off").unwrap_err();
        assert!(err.to_string().contains("never closed"), "got: {err}");
    }

    #[test]
    fn serialize_round_trips_structure() {
        let source = "<doctag space=\"normalized\" page=\"3\">\
            <section_header_level_2><loc_10><loc_20><loc_400><loc_45>Methods</section_header_level_2>\
            <picture><loc_50><loc_60><loc_350><loc_320>\
            <caption><loc_50><loc_330><loc_350><loc_350>Fig 2</caption></picture>\
            <chart><loc_0.5><loc_1.25><loc_2><loc_3></chart></doctag>";
        let first = parse(source).unwrap();
        let text = serialize(&first);
        let second = parse(&text).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn serialize_keeps_integer_formatting() {
        let doc = parse(SIMPLE).unwrap();
        let text = serialize(&doc);
        assert!(text.contains("<loc_100>"), "got: {text}");
        assert!(!text.contains("<loc_100.0>"), "got: {text}");
    }
}
