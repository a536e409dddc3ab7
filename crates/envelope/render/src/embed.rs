//! Signature image embedding.
//!
//! Captured images arrive as PNG or JPEG. They are decoded once and written
//! into the document as a FlateDecode RGB image XObject; transparency is kept
//! through a separate greyscale soft mask.

use crate::error::{RenderError, RenderResult};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbaImage;
use lopdf::{dictionary, Document, ObjectId, Stream};
use std::io::Write;

/// An image XObject already added to a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub object_id: ObjectId,
    pub width: u32,
    pub height: u32,
}

fn decode(bytes: &[u8]) -> RenderResult<RgbaImage> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| RenderError::InvalidImage(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(RenderError::InvalidImage("image has no pixels".to_string()));
    }
    Ok(rgba)
}

/// Decode a captured image without embedding it. Returns its dimensions.
///
/// Run when a signature is captured, so a record the renderer cannot draw is
/// never created.
pub fn check_image(bytes: &[u8]) -> RenderResult<(u32, u32)> {
    decode(bytes).map(|rgba| rgba.dimensions())
}

/// Decode `bytes` and add the image (and its alpha mask) to `doc`.
pub fn embed_image(doc: &mut Document, bytes: &[u8]) -> RenderResult<EmbeddedImage> {
    let rgba = decode(bytes)?;
    let (width, height) = rgba.dimensions();

    let pixels = width as usize * height as usize;
    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut alpha = Vec::with_capacity(pixels);
    for px in rgba.pixels() {
        rgb.extend_from_slice(&px.0[..3]);
        alpha.push(px.0[3]);
    }
    let opaque = alpha.iter().all(|a| *a == u8::MAX);

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    if !opaque {
        let mask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        )
        .with_compression(false);
        let mask_id = doc.add_object(mask);
        dict.set("SMask", mask_id);
    }

    let stream = Stream::new(dict, deflate(&rgb)?).with_compression(false);
    let object_id = doc.add_object(stream);
    Ok(EmbeddedImage {
        object_id,
        width,
        height,
    })
}

fn deflate(raw: &[u8]) -> RenderResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}
