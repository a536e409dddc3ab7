//! Turns a completed envelope's document, fields and signatures into the
//! final PDF.

use crate::certificate::{certificate_pages, CertificateData, CertificateEntry};
use crate::embed::{embed_image, EmbeddedImage};
use crate::error::{RenderError, RenderResult};
use crate::geometry::{to_native, PercentBox};
use crate::overlay::{
    draw_signature, draw_text_field, initials_of, OverlayBuilder, SignatureStamp, FONTS,
    FONT_BOLD, FONT_REGULAR,
};
use crate::page::{append_overlay, append_page, media_box, merge_resources, pages_root, OverlayResources};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use envelope_types::{
    CertificateSummary, EnvelopeId, Field, FieldKind, FieldValue, Recipient, SignatureId,
    SignatureRecord,
};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Layout knobs for burned-in values.
#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Share of a signature box given to the captured image.
    pub image_height_ratio: f64,
    /// Font size of text values relative to their box height.
    pub text_height_ratio: f64,
    /// Offset applied to timestamps printed on the document.
    pub utc_offset_minutes: i32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            image_height_ratio: 0.65,
            text_height_ratio: 0.70,
            utc_offset_minutes: 0,
        }
    }
}

/// Everything a render needs. Timestamps come from the envelope so that
/// identical inputs give identical bytes.
#[derive(Clone, Debug)]
pub struct RenderInput<'a> {
    pub source: &'a [u8],
    pub envelope_id: EnvelopeId,
    pub title: &'a str,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub fields: &'a [Field],
    pub recipients: &'a [Recipient],
    pub signatures: &'a [SignatureRecord],
}

/// The finished artifact.
#[derive(Clone, Debug)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    /// Lowercase hex SHA-256 of `bytes`.
    pub content_hash: String,
    pub page_count: u32,
    pub certificate: CertificateSummary,
}

#[derive(Clone, Debug, Default)]
pub struct Renderer {
    options: RenderOptions,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn render(&self, input: &RenderInput<'_>) -> RenderResult<RenderedDocument> {
        let mut doc = load_source(input.source)?;
        let pages = doc.get_pages();
        let document_pages = pages.len() as u32;

        let fonts = add_fonts(&mut doc);
        let signatures: HashMap<SignatureId, &SignatureRecord> =
            input.signatures.iter().map(|s| (s.id, s)).collect();
        let mut images: HashMap<SignatureId, Option<(String, EmbeddedImage)>> = HashMap::new();

        let mut by_page: BTreeMap<u32, Vec<(&Field, &FieldValue)>> = BTreeMap::new();
        for field in input.fields {
            if let Some(value) = &field.value {
                by_page.entry(field.position.page).or_default().push((field, value));
            }
        }

        for (page_no, fields) in by_page {
            let page_id = *pages.get(&page_no).ok_or(RenderError::PageOutOfRange {
                page: page_no,
                pages: document_pages,
            })?;
            let page_box = media_box(&doc, page_id);
            let mut builder = OverlayBuilder::new();
            let mut page_images: BTreeMap<String, ObjectId> = BTreeMap::new();

            for (field, value) in fields {
                let rect = to_native(PercentBox::from(&field.position), page_box.width, page_box.height)
                    .offset(page_box.left, page_box.bottom);
                match value {
                    FieldValue::Signature(signature_id) => {
                        let record = signatures
                            .get(signature_id)
                            .copied()
                            .ok_or_else(|| RenderError::MissingSignature(signature_id.to_string()))?;
                        let embedded = match images.get(signature_id) {
                            Some(cached) => cached.clone(),
                            None => {
                                let fresh = if record.image.is_empty() {
                                    None
                                } else {
                                    let name = format!("EnvIm{}", images.len());
                                    Some((name, embed_image(&mut doc, &record.image)?))
                                };
                                images.insert(*signature_id, fresh.clone());
                                fresh
                            }
                        };
                        if let Some((name, image)) = &embedded {
                            page_images.insert(name.clone(), image.object_id);
                        }
                        let typed = match field.kind {
                            FieldKind::Initials => initials_of(&record.signer_name),
                            _ => record.signer_name.clone(),
                        };
                        let signed_at = self.timestamp(record.created_at);
                        let stamp = SignatureStamp {
                            image: embedded
                                .as_ref()
                                .map(|(name, image)| (name.as_str(), image.width, image.height)),
                            typed: &typed,
                            name: &record.signer_name,
                            signed_at: &signed_at,
                            role: role_label(input.recipients, record),
                        };
                        draw_signature(&mut builder, &stamp, rect, self.options.image_height_ratio);
                    }
                    other => {
                        draw_text_field(
                            &mut builder,
                            &other.display_text(),
                            rect,
                            self.options.text_height_ratio,
                        );
                    }
                }
            }

            if builder.is_empty() {
                continue;
            }
            let resources = OverlayResources {
                fonts: builder
                    .fonts()
                    .filter_map(|name| fonts.get(name).map(|id| (name.to_string(), *id)))
                    .collect(),
                images: page_images.into_iter().collect(),
            };
            let content = builder.encode()?;
            merge_resources(&mut doc, page_id, &resources)?;
            append_overlay(&mut doc, page_id, content)?;
        }

        let first_page = pages
            .values()
            .next()
            .map(|id| media_box(&doc, *id))
            .unwrap_or_default();
        let data = self.certificate_data(input, document_pages);
        let root = pages_root(&doc)?;
        let mut font_dict = Dictionary::new();
        for name in [FONT_REGULAR, FONT_BOLD] {
            if let Some(id) = fonts.get(name) {
                font_dict.set(name, Object::Reference(*id));
            }
        }
        for content in certificate_pages(&data, first_page.width, first_page.height)? {
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => root,
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    first_page.width.into(),
                    first_page.height.into(),
                ],
                "Resources" => dictionary! { "Font" => font_dict.clone() },
                "Contents" => content_id,
            });
            append_page(&mut doc, page_id)?;
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        let content_hash = hex::encode(Sha256::digest(&bytes));
        let page_count = doc.get_pages().len() as u32;
        tracing::debug!(
            envelope = %input.envelope_id,
            pages = page_count,
            size = bytes.len(),
            hash = %content_hash,
            "document rendered"
        );
        Ok(RenderedDocument {
            bytes,
            content_hash,
            page_count,
            certificate: CertificateSummary {
                envelope_id: input.envelope_id,
                document_title: input.title.to_string(),
                signature_count: input.signatures.len(),
                page_count,
            },
        })
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.options.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }

    fn timestamp(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset())
            .format("%Y-%m-%d %H:%M:%S %:z")
            .to_string()
    }

    fn certificate_data(&self, input: &RenderInput<'_>, document_pages: u32) -> CertificateData {
        let mut records: Vec<&SignatureRecord> = input.signatures.iter().collect();
        records.sort_by_key(|r| (r.created_at, r.id.to_string()));
        CertificateData {
            title: input.title.to_string(),
            envelope_id: input.envelope_id.to_string(),
            created_at: self.timestamp(input.created_at),
            completed_at: self.timestamp(input.completed_at),
            document_pages,
            entries: records
                .into_iter()
                .map(|r| CertificateEntry {
                    name: r.signer_name.clone(),
                    email: r.signer_email.clone(),
                    role: role_label(input.recipients, r).to_string(),
                    signed_at: self.timestamp(r.created_at),
                    method: r.method.label().to_string(),
                    ip_address: r.metadata.ip_address.clone(),
                    device: r.metadata.device_class.label().to_string(),
                    record_hash: r.hash.clone(),
                })
                .collect(),
        }
    }
}

/// What the renderer needs to know about a source document up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocumentInfo {
    pub pages: u32,
}

/// Parse `bytes` the way [`Renderer::render`] will and report the page count.
pub fn inspect_document(bytes: &[u8]) -> RenderResult<DocumentInfo> {
    let doc = load_source(bytes)?;
    Ok(DocumentInfo {
        pages: doc.get_pages().len() as u32,
    })
}

fn load_source(bytes: &[u8]) -> RenderResult<Document> {
    let doc = Document::load_mem(bytes).map_err(|e| RenderError::InvalidDocument(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(RenderError::InvalidDocument("document is encrypted".to_string()));
    }
    if doc.get_pages().is_empty() {
        return Err(RenderError::InvalidDocument("document has no pages".to_string()));
    }
    Ok(doc)
}

fn role_label<'a>(recipients: &'a [Recipient], record: &SignatureRecord) -> &'a str {
    recipients
        .iter()
        .find(|r| r.id == record.recipient_id)
        .map(|r| r.role.label())
        .unwrap_or("Signer")
}

/// Add the base-14 fonts once and return their ids by resource name.
fn add_fonts(doc: &mut Document) -> HashMap<&'static str, ObjectId> {
    FONTS
        .iter()
        .map(|(name, base)| {
            let id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => *base,
                "Encoding" => "WinAnsiEncoding",
            });
            (*name, id)
        })
        .collect()
}
