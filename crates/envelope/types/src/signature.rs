//! Signature records: immutable evidence of a signing or approval event.

use crate::{EnvelopeId, RecipientId, SignatureId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the signature image was captured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMethod {
    Drawn,
    Typed,
    Uploaded,
}

impl CaptureMethod {
    pub fn label(&self) -> &'static str {
        match self {
            CaptureMethod::Drawn => "drawn",
            CaptureMethod::Typed => "typed",
            CaptureMethod::Uploaded => "uploaded",
        }
    }
}

/// Coarse device category shown on the certificate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
    #[default]
    Unknown,
}

impl DeviceClass {
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent else {
            return DeviceClass::Unknown;
        };
        let ua = ua.to_ascii_lowercase();
        if ua.trim().is_empty() {
            DeviceClass::Unknown
        } else if ua.contains("ipad") || ua.contains("tablet") {
            DeviceClass::Tablet
        } else if ua.contains("android") && !ua.contains("mobile") {
            DeviceClass::Tablet
        } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("android") {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
            DeviceClass::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

/// Capture context collected alongside the signature.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub device_class: DeviceClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<GeoLocation>,
}

impl SignatureMetadata {
    pub fn new(
        ip_address: Option<String>,
        user_agent: Option<String>,
        geolocation: Option<GeoLocation>,
    ) -> Self {
        let device_class = DeviceClass::from_user_agent(user_agent.as_deref());
        Self {
            ip_address,
            user_agent,
            device_class,
            geolocation,
        }
    }
}

/// What a recipient submits when signing or approving.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignatureCapture {
    pub method: CaptureMethod,
    /// PNG or JPEG bytes. May be empty for typed signatures.
    #[serde(default, with = "hex_bytes")]
    pub image: Vec<u8>,
    #[serde(default)]
    pub metadata: SignatureMetadata,
    pub consent: bool,
}

/// Append-only signature record. No update or delete exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub id: SignatureId,
    pub envelope_id: EnvelopeId,
    pub recipient_id: RecipientId,
    pub signer_name: String,
    pub signer_email: String,
    pub method: CaptureMethod,
    #[serde(with = "hex_bytes")]
    pub image: Vec<u8>,
    pub metadata: SignatureMetadata,
    pub consent: bool,
    pub consented_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// BLAKE3 over the canonical record content.
    pub hash: String,
}

/// Hex encoding for binary payloads in JSON.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
