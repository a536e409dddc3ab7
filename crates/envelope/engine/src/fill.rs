//! Field fill engine: validates submitted values against declared types.

use chrono::{DateTime, NaiveDate};
use envelope_types::{Field, FieldKind, FieldValue, SigningError, SigningResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default upper bound for free text when no constraint is declared.
pub const DEFAULT_MAX_TEXT_LEN: usize = 1_000;

/// Raw value as submitted by a recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldInput {
    Bool(bool),
    Text(String),
}

impl From<&str> for FieldInput {
    fn from(s: &str) -> Self {
        FieldInput::Text(s.to_string())
    }
}

impl From<bool> for FieldInput {
    fn from(b: bool) -> Self {
        FieldInput::Bool(b)
    }
}

/// Validate `input` for `field` and produce the value to store.
pub fn validate_input(field: &Field, input: &FieldInput) -> SigningResult<FieldValue> {
    match field.kind {
        FieldKind::Signature | FieldKind::Initials => Err(SigningError::validation(
            "signature fields are filled by completing the envelope",
        )),
        FieldKind::Checkbox => parse_checkbox(input).map(FieldValue::Checked),
        FieldKind::Date => {
            let text = expect_text(field, input)?;
            parse_date(text.trim()).map(FieldValue::Date)
        }
        FieldKind::Email => {
            let text = expect_text(field, input)?.trim().to_string();
            if !looks_like_email(&text) {
                return Err(SigningError::validation(format!(
                    "'{}' is not a valid email address",
                    text
                )));
            }
            check_constraints(field, &text)?;
            Ok(FieldValue::Text(text))
        }
        FieldKind::Text | FieldKind::Name => {
            let text = expect_text(field, input)?.trim().to_string();
            if text.is_empty() {
                return Err(SigningError::validation("value must not be empty"));
            }
            check_constraints(field, &text)?;
            Ok(FieldValue::Text(text))
        }
    }
}

fn expect_text<'a>(field: &Field, input: &'a FieldInput) -> SigningResult<&'a str> {
    match input {
        FieldInput::Text(s) => Ok(s.as_str()),
        FieldInput::Bool(_) => Err(SigningError::validation(format!(
            "field {} expects a text value",
            field.id
        ))),
    }
}

fn parse_checkbox(input: &FieldInput) -> SigningResult<bool> {
    match input {
        FieldInput::Bool(b) => Ok(*b),
        FieldInput::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "on" | "checked" | "x" => Ok(true),
            "false" | "no" | "n" | "0" | "off" | "unchecked" | "" => Ok(false),
            other => Err(SigningError::validation(format!(
                "'{}' is not a checkbox value",
                other
            ))),
        },
    }
}

/// Accepts ISO dates, RFC 3339 timestamps and US-style `MM/DD/YYYY`.
pub fn parse_date(text: &str) -> SigningResult<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.date_naive());
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%m/%d/%Y") {
        return Ok(d);
    }
    Err(SigningError::validation(format!(
        "'{}' is not a recognised date",
        text
    )))
}

fn looks_like_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn check_constraints(field: &Field, text: &str) -> SigningResult<()> {
    let len = text.chars().count();
    let c = &field.constraints;
    if let Some(min) = c.min_length {
        if len < min {
            return Err(SigningError::validation(format!(
                "value shorter than {} characters",
                min
            )));
        }
    }
    let max = c.max_length.unwrap_or(DEFAULT_MAX_TEXT_LEN);
    if len > max {
        return Err(SigningError::validation(format!(
            "value longer than {} characters",
            max
        )));
    }
    if let Some(pattern) = &c.pattern {
        let re = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            SigningError::validation(format!("field pattern is invalid: {}", e))
        })?;
        if !re.is_match(text) {
            return Err(SigningError::validation(format!(
                "value does not match pattern {}",
                pattern
            )));
        }
    }
    Ok(())
}

/// Checked at layout time so a bad pattern never reaches a signer.
pub fn validate_pattern(pattern: &str) -> SigningResult<()> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| SigningError::validation(format!("invalid pattern: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use envelope_types::{FieldConstraints, FieldPosition, NewField, RecipientId};

    fn field(kind: FieldKind, constraints: FieldConstraints) -> Field {
        Field::new(NewField {
            recipient_id: RecipientId::generate(),
            kind,
            position: FieldPosition {
                page: 1,
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 5.0,
            },
            required: true,
            label: None,
            constraints,
        })
    }

    #[test]
    fn dates_parse_in_common_formats() {
        let f = field(FieldKind::Date, FieldConstraints::default());
        let expected = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        for raw in ["2024-03-09", "03/09/2024", "2024-03-09T10:00:00Z"] {
            assert_eq!(validate_input(&f, &raw.into()).unwrap(), expected);
        }
        assert!(validate_input(&f, &"tomorrow".into()).is_err());
    }

    #[test]
    fn checkbox_is_boolean_like() {
        let f = field(FieldKind::Checkbox, FieldConstraints::default());
        assert_eq!(
            validate_input(&f, &"Yes".into()).unwrap(),
            FieldValue::Checked(true)
        );
        assert_eq!(
            validate_input(&f, &false.into()).unwrap(),
            FieldValue::Checked(false)
        );
        assert!(matches!(
            validate_input(&f, &"maybe".into()),
            Err(SigningError::Validation(_))
        ));
    }

    #[test]
    fn text_respects_pattern_and_length() {
        let f = field(
            FieldKind::Text,
            FieldConstraints {
                min_length: Some(3),
                max_length: Some(5),
                pattern: Some("[A-Z]+".to_string()),
            },
        );
        assert!(validate_input(&f, &"ABCD".into()).is_ok());
        assert!(validate_input(&f, &"AB".into()).is_err());
        assert!(validate_input(&f, &"ABCDEF".into()).is_err());
        assert!(validate_input(&f, &"abcd".into()).is_err());
        // Pattern must match the whole value.
        assert!(validate_input(&f, &"ABc".into()).is_err());
    }

    #[test]
    fn email_shape() {
        let f = field(FieldKind::Email, FieldConstraints::default());
        assert!(validate_input(&f, &"a@example.com".into()).is_ok());
        assert!(validate_input(&f, &"a@example".into()).is_err());
        assert!(validate_input(&f, &"a b@example.com".into()).is_err());
    }

    #[test]
    fn signature_fields_reject_direct_fill() {
        let f = field(FieldKind::Signature, FieldConstraints::default());
        assert!(validate_input(&f, &"x".into()).is_err());
    }

    #[test]
    fn bad_patterns_are_caught_early() {
        assert!(validate_pattern("[a-").is_err());
        assert!(validate_pattern("[a-z]+").is_ok());
    }
}
