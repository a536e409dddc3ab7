//! Shared fixtures for the service integration tests.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use envelope_engine::{LayoutField, NewEnvelope};
use envelope_service::{
    templates, EnvelopeService, ManualClock, RecordingNotifier, ServiceComponents, ServiceConfig,
};
use envelope_store::InMemoryDocumentStorage;
use envelope_types::*;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub service: Arc<EnvelopeService>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub documents: Arc<InMemoryDocumentStorage>,
    pub owner: Actor,
}

pub fn config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.render.max_attempts = 2;
    config.render.initial_backoff_ms = 10;
    config.render.max_backoff_ms = 20;
    config
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn harness_with(config: ServiceConfig) -> Harness {
    let notifier = Arc::new(RecordingNotifier::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
    ));
    let documents = Arc::new(InMemoryDocumentStorage::new());
    let components = ServiceComponents::with_documents(documents.clone())
        .with_notifier(notifier.clone())
        .with_clock(clock.clone());
    let service = EnvelopeService::new(config, components).unwrap();
    Harness {
        service,
        notifier,
        clock,
        documents,
        owner: Actor::new("acme", "owner@acme.test"),
    }
}

impl Harness {
    /// Upload a two-page document and create an envelope with one signature
    /// field per actionable recipient on page 1.
    pub async fn draft(&self, workflow: WorkflowType, recipients: &[(RecipientRole, u32, &str)]) -> EnvelopeId {
        let stored = self
            .service
            .upload_document(&self.owner, sample_pdf(2))
            .await
            .unwrap();
        let fields = recipients
            .iter()
            .enumerate()
            .filter(|(_, (role, _, _))| *role != RecipientRole::Cc)
            .map(|(i, _)| signature_field(i, 1, 10.0 + 12.0 * i as f64))
            .collect();
        let summary = self
            .service
            .create_envelope(
                &self.owner,
                NewEnvelope {
                    title: "Master Services Agreement".into(),
                    document_key: stored.key,
                    workflow,
                    recipients: recipients
                        .iter()
                        .map(|(role, order, email)| NewRecipient {
                            order: *order,
                            role: *role,
                            name: name_of(email),
                            email: email.to_string(),
                        })
                        .collect(),
                    fields,
                    expires_at: None,
                },
            )
            .await
            .unwrap();
        summary.id
    }

    pub async fn sent(&self, workflow: WorkflowType, recipients: &[(RecipientRole, u32, &str)]) -> EnvelopeId {
        let id = self.draft(workflow, recipients).await;
        self.service.send(&self.owner, id).await.unwrap();
        id
    }

    /// The most recent token delivered to `email`.
    pub async fn token_for(&self, email: &str) -> CapabilityToken {
        for _ in 0..200 {
            let mut sent = self.notifier.sent_to(email, templates::RECIPIENT_ACTIVATED);
            sent.extend(self.notifier.sent_to(email, templates::CC_NOTIFIED));
            if let Some(n) = sent.last() {
                let raw = n.data["token"].as_str().unwrap().to_string();
                return CapabilityToken::from_transport(raw);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no token delivered to {}", email);
    }

    /// Wait until `count` notifications with `template` reached `email`.
    pub async fn wait_for_notifications(&self, email: &str, template: &str, count: usize) {
        for _ in 0..200 {
            if self.notifier.sent_to(email, template).len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} '{}' notifications for {}", count, template, email);
    }

    pub async fn wait_for_render(&self, id: EnvelopeId) -> RenderedOutput {
        for _ in 0..400 {
            let summary = self.service.get_envelope(&self.owner, id).await.unwrap();
            if let Some(rendered) = summary.rendered {
                return rendered;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("envelope {} was never rendered", id);
    }

    pub async fn wait_for_render_queue(&self, id: EnvelopeId) {
        for _ in 0..400 {
            if !self.service.renders().is_in_flight(id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("render of {} never settled", id);
    }

    pub async fn status(&self, id: EnvelopeId) -> EnvelopeStatus {
        self.service.get_envelope(&self.owner, id).await.unwrap().status
    }
}

fn name_of(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let mut chars = local.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => local.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

pub fn signature_field(recipient: usize, page: u32, y: f64) -> LayoutField {
    LayoutField {
        recipient,
        kind: FieldKind::Signature,
        position: FieldPosition {
            page,
            x: 10.0,
            y,
            width: 30.0,
            height: 8.0,
        },
        required: true,
        label: None,
        constraints: FieldConstraints::default(),
    }
}

pub fn drawn_capture() -> SignatureCapture {
    SignatureCapture {
        method: CaptureMethod::Drawn,
        image: png(40, 16),
        metadata: SignatureMetadata::new(
            Some("203.0.113.7".into()),
            Some("Mozilla/5.0 (X11; Linux x86_64)".into()),
            None,
        ),
        consent: true,
    }
}

pub fn typed_capture() -> SignatureCapture {
    SignatureCapture {
        method: CaptureMethod::Typed,
        image: Vec::new(),
        metadata: SignatureMetadata::default(),
        consent: true,
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let buffer = ImageBuffer::from_pixel(width, height, Rgba([20u8, 20, 90, 200]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(buffer)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// A minimal US-letter PDF with `pages` pages of text.
pub fn sample_pdf(pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });
    let mut kids: Vec<Object> = Vec::new();
    for n in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 14.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Section {}", n))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
