//! Content-stream operations for burned-in field values.

use crate::error::RenderResult;
use crate::geometry::{fit_within, NativeBox};
use crate::text::{fit_font_size, sanitize, truncate_to_width};
use lopdf::content::{Content, Operation};
use lopdf::Object;
use std::collections::BTreeSet;

/// Resource name of the regular Helvetica font.
pub const FONT_REGULAR: &str = "EnvF1";
/// Resource name of Helvetica-Bold.
pub const FONT_BOLD: &str = "EnvF2";
/// Resource name of Helvetica-Oblique, used for typed signatures.
pub const FONT_OBLIQUE: &str = "EnvF3";

/// Base-14 font behind each resource name.
pub const FONTS: [(&str, &str); 3] = [
    (FONT_REGULAR, "Helvetica"),
    (FONT_BOLD, "Helvetica-Bold"),
    (FONT_OBLIQUE, "Helvetica-Oblique"),
];

/// Helvetica cap height in em.
const CAP_HEIGHT: f64 = 0.718;
/// Share of a signature text line taken by the glyphs.
const LINE_FILL: f64 = 0.8;

/// Accumulates drawing operations for one page.
#[derive(Debug, Default)]
pub struct OverlayBuilder {
    ops: Vec<Operation>,
    fonts: BTreeSet<&'static str>,
}

impl OverlayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Fonts referenced so far, by resource name.
    pub fn fonts(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fonts.iter().copied()
    }

    /// Draw one line of already sanitised text with its baseline at `(x, y)`.
    pub fn text(&mut self, font: &'static str, size: f64, x: f64, y: f64, text: &str) {
        if text.is_empty() || size <= 0.0 {
            return;
        }
        self.fonts.insert(font);
        self.ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Paint image XObject `name` into `rect`.
    pub fn image(&mut self, name: &str, rect: NativeBox) {
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return;
        }
        self.ops.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    rect.width.into(),
                    0.into(),
                    0.into(),
                    rect.height.into(),
                    rect.x.into(),
                    rect.y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// Encode the operations, drawn in black inside their own graphics state.
    pub fn encode(self) -> RenderResult<Vec<u8>> {
        let mut operations = Vec::with_capacity(self.ops.len() + 3);
        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new("g", vec![0.into()]));
        operations.extend(self.ops);
        operations.push(Operation::new("Q", vec![]));
        Ok(Content { operations }.encode()?)
    }
}

/// Draw a text value sized to `height_ratio` of the box, vertically centred.
pub fn draw_text_field(builder: &mut OverlayBuilder, value: &str, rect: NativeBox, height_ratio: f64) {
    let text = sanitize(value);
    if text.trim().is_empty() {
        return;
    }
    let padding = (rect.width * 0.04).min(2.0);
    let available = rect.width - 2.0 * padding;
    let size = fit_font_size(&text, rect.height * height_ratio, available);
    let baseline = rect.y + (rect.height - size * CAP_HEIGHT) / 2.0;
    builder.text(FONT_REGULAR, size, rect.x + padding, baseline, &text);
}

/// What goes into a signature or initials box.
#[derive(Clone, Debug)]
pub struct SignatureStamp<'a> {
    /// Image resource name with its pixel size, when an image was captured.
    pub image: Option<(&'a str, u32, u32)>,
    /// Drawn in place of the image for typed signatures.
    pub typed: &'a str,
    pub name: &'a str,
    pub signed_at: &'a str,
    pub role: &'a str,
}

/// Image in the top `image_ratio` of the box, three caption lines below it.
pub fn draw_signature(
    builder: &mut OverlayBuilder,
    stamp: &SignatureStamp<'_>,
    rect: NativeBox,
    image_ratio: f64,
) {
    let image_height = rect.height * image_ratio;
    let caption_height = rect.height - image_height;
    let area = NativeBox {
        x: rect.x,
        y: rect.y + caption_height,
        width: rect.width,
        height: image_height,
    };

    match stamp.image {
        Some((name, px_w, px_h)) => {
            let (w, h) = fit_within(px_w as f64, px_h as f64, area.width, area.height);
            builder.image(
                name,
                NativeBox {
                    x: area.x,
                    y: area.y + (area.height - h) / 2.0,
                    width: w,
                    height: h,
                },
            );
        }
        None => {
            let typed = sanitize(stamp.typed);
            let size = fit_font_size(&typed, area.height * LINE_FILL, area.width);
            let baseline = area.y + (area.height - size * CAP_HEIGHT) / 2.0;
            builder.text(FONT_OBLIQUE, size, area.x, baseline, &typed);
        }
    }

    let line_height = caption_height / 3.0;
    let preferred = line_height * LINE_FILL;
    for (i, line) in [stamp.name, stamp.signed_at, stamp.role].iter().enumerate() {
        let text = sanitize(line);
        let size = preferred.min(fit_font_size(&text, preferred, rect.width).max(preferred * 0.5));
        let text = truncate_to_width(&text, size, rect.width);
        let baseline = rect.y + caption_height - (i as f64 + 1.0) * line_height + line_height * 0.2;
        builder.text(FONT_REGULAR, size, rect.x, baseline, &text);
    }
}

/// `Jane Q. Doe` → `JQD`.
pub fn initials_of(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|part| part.chars().find(|c| c.is_alphanumeric()))
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> NativeBox {
        NativeBox {
            x: 60.0,
            y: 600.0,
            width: 180.0,
            height: 40.0,
        }
    }

    fn encoded(builder: OverlayBuilder) -> String {
        String::from_utf8(builder.encode().unwrap()).unwrap()
    }

    #[test]
    fn text_field_is_sanitised_and_drawn() {
        let mut b = OverlayBuilder::new();
        draw_text_field(&mut b, "Zoë (CEO)", rect(), 0.7);
        assert_eq!(b.fonts().collect::<Vec<_>>(), vec![FONT_REGULAR]);
        let out = encoded(b);
        assert!(out.contains("(Zoe (CEO)) Tj"), "{}", out);
        assert!(out.contains("/EnvF1"));
    }

    #[test]
    fn blank_text_draws_nothing() {
        let mut b = OverlayBuilder::new();
        draw_text_field(&mut b, "   ", rect(), 0.7);
        assert!(b.is_empty());
    }

    #[test]
    fn signature_with_image_places_image_and_captions() {
        let mut b = OverlayBuilder::new();
        let stamp = SignatureStamp {
            image: Some(("EnvIm0", 200, 50)),
            typed: "",
            name: "Jane Doe",
            signed_at: "2024-05-01 14:03:22 +00:00",
            role: "Signer",
        };
        draw_signature(&mut b, &stamp, rect(), 0.65);
        let out = encoded(b);
        assert!(out.contains("/EnvIm0 Do"));
        assert!(out.contains("(Jane Doe) Tj"));
        assert!(out.contains("(Signer) Tj"));
    }

    #[test]
    fn typed_signature_uses_oblique_font() {
        let mut b = OverlayBuilder::new();
        let stamp = SignatureStamp {
            image: None,
            typed: "Jane Doe",
            name: "Jane Doe",
            signed_at: "2024-05-01",
            role: "Signer",
        };
        draw_signature(&mut b, &stamp, rect(), 0.65);
        let fonts: Vec<_> = b.fonts().collect();
        assert!(fonts.contains(&FONT_OBLIQUE));
        assert!(fonts.contains(&FONT_REGULAR));
    }

    #[test]
    fn initials() {
        assert_eq!(initials_of("Jane Q. Doe"), "JQD");
        assert_eq!(initials_of("  ada   lovelace "), "AL");
        assert_eq!(initials_of(""), "");
    }
}
