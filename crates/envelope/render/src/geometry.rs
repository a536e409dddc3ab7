//! Percentage layout boxes to native PDF units.
//!
//! Layout coordinates put the origin at the top-left corner of the page and
//! express everything as a percentage; PDF user space puts the origin at the
//! bottom-left and measures in points. All conversion happens in
//! [`to_native`].

use envelope_types::FieldPosition;

/// A field box in percent of the page, top-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PercentBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<&FieldPosition> for PercentBox {
    fn from(p: &FieldPosition) -> Self {
        Self {
            x: p.x,
            y: p.y,
            width: p.width,
            height: p.height,
        }
    }
}

/// A box in native page units, bottom-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NativeBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NativeBox {
    /// Shift by the page's MediaBox origin.
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

/// `x = x%·W`, `w = w%·W`, `h = h%·H`, `y = H − y%·H − h`.
pub fn to_native(percent: PercentBox, page_width: f64, page_height: f64) -> NativeBox {
    let width = percent.width / 100.0 * page_width;
    let height = percent.height / 100.0 * page_height;
    NativeBox {
        x: percent.x / 100.0 * page_width,
        y: page_height - percent.y / 100.0 * page_height - height,
        width,
        height,
    }
}

/// Largest `(w, h)` with the source aspect ratio that fits in the target.
pub fn fit_within(src_w: f64, src_h: f64, max_w: f64, max_h: f64) -> (f64, f64) {
    if src_w <= 0.0 || src_h <= 0.0 || max_w <= 0.0 || max_h <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (max_w / src_w).min(max_h / src_h);
    (src_w * scale, src_h * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn converts_reference_box() {
        let native = to_native(
            PercentBox {
                x: 10.0,
                y: 20.0,
                width: 30.0,
                height: 5.0,
            },
            600.0,
            800.0,
        );
        assert!(close(native.x, 60.0));
        assert!(close(native.width, 180.0));
        assert!(close(native.height, 40.0));
        assert!(close(native.y, 600.0));
    }

    #[test]
    fn top_left_box_lands_at_top_of_page() {
        let native = to_native(
            PercentBox {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 10.0,
            },
            612.0,
            792.0,
        );
        assert!(close(native.y + native.height, 792.0));
    }

    #[test]
    fn fit_preserves_aspect_ratio() {
        let (w, h) = fit_within(400.0, 100.0, 200.0, 100.0);
        assert!(close(w, 200.0));
        assert!(close(h, 50.0));
        assert_eq!(fit_within(0.0, 10.0, 10.0, 10.0), (0.0, 0.0));
    }

    proptest! {
        #[test]
        fn native_box_stays_on_page(
            x in 0.0f64..100.0,
            y in 0.0f64..100.0,
            w_frac in 0.0f64..1.0,
            h_frac in 0.0f64..1.0,
            page_w in 1.0f64..5000.0,
            page_h in 1.0f64..5000.0,
        ) {
            let percent = PercentBox {
                x,
                y,
                width: (100.0 - x) * w_frac,
                height: (100.0 - y) * h_frac,
            };
            let native = to_native(percent, page_w, page_h);
            let eps = 1e-6 * page_w.max(page_h);
            prop_assert!(native.x >= -eps && native.x + native.width <= page_w + eps);
            prop_assert!(native.y >= -eps && native.y + native.height <= page_h + eps);
            prop_assert!(native.width >= 0.0 && native.height >= 0.0);
        }
    }
}
