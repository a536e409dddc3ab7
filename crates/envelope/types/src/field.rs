//! Field layout: typed regions placed on document pages.
//!
//! Positions are percentages of the page, with the origin at the top-left
//! corner as seen by the layout editor. The renderer owns the translation to
//! native page units.

use crate::{FieldId, RecipientId, SignatureId, SigningError, SigningResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Tolerance for percentage bounds coming from browser layouts.
const PERCENT_EPSILON: f64 = 1e-6;

/// Kinds of field a recipient can be asked to fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Signature,
    Initials,
    Text,
    Name,
    Email,
    Date,
    Checkbox,
}

impl FieldKind {
    /// Filled by the completion action rather than by a fill call.
    pub fn is_signature_like(&self) -> bool {
        matches!(self, FieldKind::Signature | FieldKind::Initials)
    }
}

/// Wire format: `{page ≥ 1, x, y, width, height ∈ [0, 100]}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldPosition {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FieldPosition {
    pub fn validate(&self) -> SigningResult<()> {
        if self.page < 1 {
            return Err(SigningError::validation("field page must be >= 1"));
        }
        for (name, v) in [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ] {
            if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                return Err(SigningError::validation(format!(
                    "field {} must be within [0, 100], got {}",
                    name, v
                )));
            }
        }
        if self.x + self.width > 100.0 + PERCENT_EPSILON
            || self.y + self.height > 100.0 + PERCENT_EPSILON
        {
            return Err(SigningError::validation("field box extends past the page"));
        }
        Ok(())
    }
}

/// Optional constraints declared at layout time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Regular expression the whole value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// A validated field value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Checked(bool),
    Signature(SignatureId),
}

impl FieldValue {
    /// Text burned into the document for non-image values.
    pub fn display_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Checked(true) => "X".to_string(),
            FieldValue::Checked(false) => String::new(),
            FieldValue::Signature(_) => String::new(),
        }
    }
}

/// A placed field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub recipient_id: RecipientId,
    pub kind: FieldKind,
    pub position: FieldPosition,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub constraints: FieldConstraints,
    pub value: Option<FieldValue>,
    pub filled_at: Option<DateTime<Utc>>,
}

impl Field {
    pub fn new(spec: NewField) -> Self {
        Self {
            id: FieldId::generate(),
            recipient_id: spec.recipient_id,
            kind: spec.kind,
            position: spec.position,
            required: spec.required,
            label: spec.label,
            constraints: spec.constraints,
            value: None,
            filled_at: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.value.is_some()
    }
}

/// Request payload for placing a field on a draft.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewField {
    pub recipient_id: RecipientId,
    pub kind: FieldKind,
    pub position: FieldPosition,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub constraints: FieldConstraints,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(page: u32, x: f64, y: f64, w: f64, h: f64) -> FieldPosition {
        FieldPosition {
            page,
            x,
            y,
            width: w,
            height: h,
        }
    }

    #[test]
    fn position_bounds() {
        assert!(pos(1, 10.0, 20.0, 30.0, 5.0).validate().is_ok());
        assert!(pos(0, 10.0, 20.0, 30.0, 5.0).validate().is_err());
        assert!(pos(1, -1.0, 20.0, 30.0, 5.0).validate().is_err());
        assert!(pos(1, 80.0, 20.0, 30.0, 5.0).validate().is_err());
        assert!(pos(1, 10.0, f64::NAN, 30.0, 5.0).validate().is_err());
        assert!(pos(2, 0.0, 0.0, 100.0, 100.0).validate().is_ok());
    }

    #[test]
    fn value_wire_format_is_tagged() {
        let v = FieldValue::Checked(true);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["type"], "checked");
        assert_eq!(json["value"], true);
    }
}
