//! Certificate-of-completion pages.

use crate::error::RenderResult;
use crate::overlay::{OverlayBuilder, FONT_BOLD, FONT_REGULAR};
use crate::text::{sanitize, truncate_to_width};

const MARGIN: f64 = 54.0;
const TITLE_SIZE: f64 = 18.0;
const HEADING_SIZE: f64 = 12.0;
const BODY_SIZE: f64 = 10.0;
const LINE_GAP: f64 = 1.4;

/// One signature event as listed on the certificate.
#[derive(Clone, Debug)]
pub struct CertificateEntry {
    pub name: String,
    pub email: String,
    pub role: String,
    pub signed_at: String,
    pub method: String,
    pub ip_address: Option<String>,
    pub device: String,
    pub record_hash: String,
}

#[derive(Clone, Debug)]
pub struct CertificateData {
    pub title: String,
    pub envelope_id: String,
    pub created_at: String,
    pub completed_at: String,
    pub document_pages: u32,
    pub entries: Vec<CertificateEntry>,
}

#[derive(Clone, Copy)]
enum Style {
    Title,
    Heading,
    Body,
    Spacer,
}

impl Style {
    fn font(self) -> &'static str {
        match self {
            Style::Title | Style::Heading => FONT_BOLD,
            Style::Body | Style::Spacer => FONT_REGULAR,
        }
    }

    fn size(self) -> f64 {
        match self {
            Style::Title => TITLE_SIZE,
            Style::Heading => HEADING_SIZE,
            Style::Body | Style::Spacer => BODY_SIZE,
        }
    }
}

fn lines(data: &CertificateData) -> Vec<(Style, String)> {
    let mut out = vec![
        (Style::Title, "Certificate of Completion".to_string()),
        (Style::Spacer, String::new()),
        (Style::Body, format!("Document: {}", data.title)),
        (Style::Body, format!("Envelope ID: {}", data.envelope_id)),
        (Style::Body, format!("Created: {}", data.created_at)),
        (Style::Body, format!("Completed: {}", data.completed_at)),
        (Style::Body, format!("Document pages: {}", data.document_pages)),
        (Style::Spacer, String::new()),
        (
            Style::Heading,
            format!("Signature events ({})", data.entries.len()),
        ),
    ];
    for (i, entry) in data.entries.iter().enumerate() {
        out.push((Style::Spacer, String::new()));
        out.push((
            Style::Heading,
            format!("{}. {} <{}>", i + 1, entry.name, entry.email),
        ));
        out.push((
            Style::Body,
            format!("Role: {}    Signed: {}", entry.role, entry.signed_at),
        ));
        out.push((
            Style::Body,
            format!(
                "Method: {}    IP address: {}    Device: {}",
                entry.method,
                entry.ip_address.as_deref().unwrap_or("not recorded"),
                entry.device
            ),
        ));
        out.push((Style::Body, format!("Record hash: {}", entry.record_hash)));
    }
    out
}

/// Lay the certificate out on as many `width` x `height` pages as it needs
/// and return each page's encoded content stream.
pub fn certificate_pages(data: &CertificateData, width: f64, height: f64) -> RenderResult<Vec<Vec<u8>>> {
    let usable = (width - 2.0 * MARGIN).max(BODY_SIZE);
    let mut pages = Vec::new();
    let mut builder = OverlayBuilder::new();
    let mut cursor = height - MARGIN;

    for (style, raw) in lines(data) {
        let advance = style.size() * LINE_GAP;
        if cursor - advance < MARGIN && !builder.is_empty() {
            pages.push(std::mem::take(&mut builder).encode()?);
            cursor = height - MARGIN;
        }
        cursor -= advance;
        if matches!(style, Style::Spacer) {
            continue;
        }
        let text = truncate_to_width(&sanitize(&raw), style.size(), usable);
        builder.text(style.font(), style.size(), MARGIN, cursor, &text);
    }
    if !builder.is_empty() {
        pages.push(builder.encode()?);
    }
    Ok(pages)
}
