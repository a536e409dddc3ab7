//! Envelope Document Renderer
//!
//! Produces the final artifact of a completed envelope: the original PDF with
//! every filled field burned onto its page, followed by a certificate of
//! completion listing each signature event.
//!
//! Rendering is a pure function of its [`RenderInput`]. Timestamps are taken
//! from the envelope and signature records, never from the clock, so a retry
//! with the same inputs yields the same bytes and the same content hash.
//!
//! # Layout
//!
//! Field boxes are stored as page percentages with a top-left origin;
//! [`geometry::to_native`] is the only place that converts them to PDF user
//! space. Signature and initials boxes hold the captured image (or the typed
//! name) above three caption lines: signer name, signing time and role.

#![deny(unsafe_code)]

pub mod certificate;
pub mod embed;
pub mod error;
pub mod geometry;
pub mod overlay;
pub mod page;
pub mod renderer;
pub mod text;

pub use embed::check_image;
pub use error::{RenderError, RenderResult};
pub use geometry::{to_native, NativeBox, PercentBox};
pub use renderer::{
    inspect_document, DocumentInfo, RenderInput, RenderOptions, RenderedDocument, Renderer,
};
pub use text::sanitize;

#[cfg(test)]
pub(crate) mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// A minimal PDF with `pages` pages and the MediaBox on the page tree root.
    pub(crate) fn sample_pdf(pages: u32, size: (f64, f64)) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids: Vec<Object> = Vec::new();
        for n in 1..=pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {}", n))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), size.0.into(), size.1.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }
}
