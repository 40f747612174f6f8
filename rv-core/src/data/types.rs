//! Fingerprint record types
//!
//! `Fingerprint` is a probe as submitted by the browser client.
//! `FingerprintRecord` is one stored row: a probe stamped with its identity and log index.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::attributes::Attributes;

/// Opaque hash columns of a fingerprint, compared by exact equality only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashField {
    Audio,
    Fonts,
    GeomCanvas,
    MediaCapabilities,
    MediaHash,
    Name,
    Plugins,
    PluginsHash,
    TxtCanvas,
}

impl HashField {
    /// Store column order
    pub const ALL: [HashField; 9] = [
        HashField::Audio,
        HashField::Fonts,
        HashField::GeomCanvas,
        HashField::MediaCapabilities,
        HashField::MediaHash,
        HashField::Name,
        HashField::Plugins,
        HashField::PluginsHash,
        HashField::TxtCanvas,
    ];

    /// Fields that describe the browser. `Name` labels a capture and is never compared.
    pub const COMPARED: [HashField; 8] = [
        HashField::Audio,
        HashField::Fonts,
        HashField::GeomCanvas,
        HashField::MediaCapabilities,
        HashField::MediaHash,
        HashField::Plugins,
        HashField::PluginsHash,
        HashField::TxtCanvas,
    ];

    /// Hashes stable enough to identify a browser on their own
    pub const IMPORTANT: [HashField; 3] =
        [HashField::Audio, HashField::GeomCanvas, HashField::TxtCanvas];

    pub fn column(&self) -> &'static str {
        match self {
            HashField::Audio => "Audio",
            HashField::Fonts => "Fonts",
            HashField::GeomCanvas => "Geom Canvas",
            HashField::MediaCapabilities => "Media Capabilities",
            HashField::MediaHash => "MediaHash",
            HashField::Name => "Name",
            HashField::Plugins => "Plugins",
            HashField::PluginsHash => "PluginsHash",
            HashField::TxtCanvas => "TXT Canvas",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == column)
    }
}

/// Hash column values. `None` stands for absent, null or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashFields {
    #[serde(rename = "Audio", default, deserialize_with = "lenient_text")]
    pub audio: Option<String>,
    #[serde(rename = "Fonts", default, deserialize_with = "lenient_text")]
    pub fonts: Option<String>,
    #[serde(rename = "Geom Canvas", default, deserialize_with = "lenient_text")]
    pub geom_canvas: Option<String>,
    #[serde(rename = "Media Capabilities", default, deserialize_with = "lenient_text")]
    pub media_capabilities: Option<String>,
    #[serde(rename = "MediaHash", default, deserialize_with = "lenient_text")]
    pub media_hash: Option<String>,
    #[serde(rename = "Name", default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(rename = "Plugins", default, deserialize_with = "lenient_text")]
    pub plugins: Option<String>,
    #[serde(rename = "PluginsHash", default, deserialize_with = "lenient_text")]
    pub plugins_hash: Option<String>,
    #[serde(rename = "TXT Canvas", default, deserialize_with = "lenient_text")]
    pub txt_canvas: Option<String>,
}

impl HashFields {
    pub fn get(&self, field: HashField) -> Option<&str> {
        let slot = match field {
            HashField::Audio => &self.audio,
            HashField::Fonts => &self.fonts,
            HashField::GeomCanvas => &self.geom_canvas,
            HashField::MediaCapabilities => &self.media_capabilities,
            HashField::MediaHash => &self.media_hash,
            HashField::Name => &self.name,
            HashField::Plugins => &self.plugins,
            HashField::PluginsHash => &self.plugins_hash,
            HashField::TxtCanvas => &self.txt_canvas,
        };
        slot.as_deref()
    }

    pub fn set(&mut self, field: HashField, value: Option<String>) {
        let value = value.filter(|v| !v.is_empty());
        match field {
            HashField::Audio => self.audio = value,
            HashField::Fonts => self.fonts = value,
            HashField::GeomCanvas => self.geom_canvas = value,
            HashField::MediaCapabilities => self.media_capabilities = value,
            HashField::MediaHash => self.media_hash = value,
            HashField::Name => self.name = value,
            HashField::Plugins => self.plugins = value,
            HashField::PluginsHash => self.plugins_hash = value,
            HashField::TxtCanvas => self.txt_canvas = value,
        }
    }

    /// Present on both sides and identical
    pub fn same(&self, other: &HashFields, field: HashField) -> bool {
        matches!((self.get(field), other.get(field)), (Some(a), Some(b)) if a == b)
    }
}

/// Accept any JSON value for a hash column: strings as-is, other values as
/// compact JSON text, null and "" as absent.
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// A fingerprint submission, before it has an identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    #[serde(rename = "Attributes")]
    pub attributes: Attributes,
    #[serde(rename = "AttributesHash", default, deserialize_with = "lenient_text")]
    pub attributes_hash: Option<String>,
    #[serde(flatten)]
    pub hashes: HashFields,
}

impl Fingerprint {
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Canonical attribute order, and an `AttributesHash` when the client sent none
    pub fn normalize(mut self) -> Self {
        self.attributes = self.attributes.canonicalize();
        if self.attributes_hash.is_none() {
            self.attributes_hash = Some(self.attributes.content_hash());
        }
        self
    }

    /// Capture label, unless the client reported none
    pub fn capture_name(&self) -> Option<&str> {
        self.hashes
            .name
            .as_deref()
            .filter(|n| *n != rv_protocol::NAME_NOT_AVAILABLE)
    }
}

/// One row of the known-identity store
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintRecord {
    pub id: u64,
    pub log: u64,
    /// `None` when the stored attribute text could not be parsed
    pub attributes: Option<Attributes>,
    pub attributes_hash: Option<String>,
    pub hashes: HashFields,
}

impl FingerprintRecord {
    pub fn from_fingerprint(fingerprint: &Fingerprint, id: u64, log: u64) -> Self {
        Self {
            id,
            log,
            attributes: Some(fingerprint.attributes.clone()),
            attributes_hash: fingerprint.attributes_hash.clone(),
            hashes: fingerprint.hashes.clone(),
        }
    }

    /// Whether the row takes part in matching
    pub fn is_comparable(&self) -> bool {
        self.attributes.is_some()
    }
}
