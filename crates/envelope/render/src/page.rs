//! Page-level document surgery: geometry lookup, resource merging and
//! content wrapping.

use crate::error::{RenderError, RenderResult};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// US Letter, used when neither the page nor its ancestors declare a MediaBox.
pub const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

const MAX_TREE_DEPTH: usize = 64;

/// A page's MediaBox.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageBox {
    pub left: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for PageBox {
    fn default() -> Self {
        Self {
            left: 0.0,
            bottom: 0.0,
            width: DEFAULT_PAGE_SIZE.0,
            height: DEFAULT_PAGE_SIZE.1,
        }
    }
}

/// Look `key` up on the page, then on its ancestors in the page tree.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Resolve the page's MediaBox, normalising inverted corners.
pub fn media_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let Some(values) = inherited(doc, page_id, b"MediaBox").and_then(|o| o.as_array().ok()) else {
        return PageBox::default();
    };
    let numbers: Vec<f64> = values
        .iter()
        .filter_map(|o| doc.dereference(o).ok())
        .filter_map(|(_, o)| o.as_float().ok())
        .map(f64::from)
        .collect();
    let &[x1, y1, x2, y2] = numbers.as_slice() else {
        return PageBox::default();
    };
    let width = (x2 - x1).abs();
    let height = (y2 - y1).abs();
    if width <= 0.0 || height <= 0.0 {
        return PageBox::default();
    }
    PageBox {
        left: x1.min(x2),
        bottom: y1.min(y2),
        width,
        height,
    }
}

/// Extra named resources an overlay needs on a page.
#[derive(Clone, Debug, Default)]
pub struct OverlayResources {
    pub fonts: Vec<(String, ObjectId)>,
    pub images: Vec<(String, ObjectId)>,
}

impl OverlayResources {
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty() && self.images.is_empty()
    }
}

/// Copy the page's effective resources into a direct dictionary on the page
/// and add the overlay's fonts and images to it.
pub fn merge_resources(
    doc: &mut Document,
    page_id: ObjectId,
    extra: &OverlayResources,
) -> RenderResult<()> {
    let mut resources = match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    add_named(doc, &mut resources, b"Font", &extra.fonts);
    add_named(doc, &mut resources, b"XObject", &extra.images);
    let page = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
    page.set("Resources", resources);
    Ok(())
}

fn add_named(
    doc: &Document,
    resources: &mut Dictionary,
    category: &[u8],
    entries: &[(String, ObjectId)],
) {
    if entries.is_empty() {
        return;
    }
    let mut sub = match resources.get(category).ok().map(|o| doc.dereference(o)) {
        Some(Ok((_, Object::Dictionary(dict)))) => dict.clone(),
        _ => Dictionary::new(),
    };
    for (name, id) in entries {
        sub.set(name.as_bytes().to_vec(), Object::Reference(*id));
    }
    resources.set(category.to_vec(), sub);
}

/// Wrap the existing content streams in `q … Q` and append `overlay`.
///
/// The save/restore pair isolates the overlay from any graphics state the
/// original content leaves behind (an unbalanced `cm`, a clip path).
pub fn append_overlay(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> RenderResult<()> {
    let existing = doc.get_page_contents(page_id);
    let mut contents: Vec<Object> = Vec::with_capacity(existing.len() + 2);
    if !existing.is_empty() {
        let save = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.push(Object::Reference(save));
        contents.extend(existing.into_iter().map(Object::Reference));
    }
    let mut body = Vec::with_capacity(overlay.len() + 4);
    if !contents.is_empty() {
        body.extend_from_slice(b"Q\n");
    }
    body.extend_from_slice(&overlay);
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), body));
    contents.push(Object::Reference(overlay_id));
    let page = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
    page.set("Contents", contents);
    Ok(())
}

/// Object id of the root `Pages` node.
pub fn pages_root(doc: &Document) -> RenderResult<ObjectId> {
    doc.catalog()?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| RenderError::InvalidDocument("catalog has no page tree".to_string()))
}

/// Append `page_id` as the last child of the root page tree node.
pub fn append_page(doc: &mut Document, page_id: ObjectId) -> RenderResult<()> {
    let root = pages_root(doc)?;
    let pages = doc.get_object_mut(root).and_then(Object::as_dict_mut)?;
    match pages.get_mut(b"Kids").and_then(Object::as_array_mut) {
        Ok(kids) => kids.push(Object::Reference(page_id)),
        Err(_) => pages.set("Kids", vec![Object::Reference(page_id)]),
    }
    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    pages.set("Count", count + 1);
    Ok(())
}
