//! Opaque image handle passed between the loop and its collaborators.
//!
//! An `ImageRef` is a URI: either a remote URL or an inline
//! `data:<mime>;base64,<payload>` URL. The payload is shared, so cloning a
//! handle into a state snapshot never copies image bytes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// A cheaply clonable reference to an image.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(Arc<str>);

impl ImageRef {
    /// Wrap an existing URI (remote URL or data URL).
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self(Arc::from(uri.into()))
    }

    /// Encode raw bytes as an inline data URL.
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self::from_uri(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
    }

    /// The underlying URI.
    pub fn as_uri(&self) -> &str {
        &self.0
    }

    /// Whether the image is carried inline.
    pub fn is_inline(&self) -> bool {
        self.0.starts_with("data:")
    }

    /// MIME type of an inline image.
    pub fn mime(&self) -> Option<&str> {
        let rest = self.0.strip_prefix("data:")?;
        let (mime, _) = rest.split_once(';')?;
        Some(mime)
    }

    /// Decode the bytes of an inline image. Remote URLs yield `None`.
    pub fn decode(&self) -> Option<Vec<u8>> {
        let (_, payload) = self.0.strip_prefix("data:")?.split_once(";base64,")?;
        STANDARD.decode(payload).ok()
    }
}

impl std::fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Inline payloads are megabytes; never dump them into logs.
        if self.is_inline() {
            write!(f, "ImageRef(inline {}, {} bytes)", self.mime().unwrap_or("?"), self.0.len())
        } else {
            write!(f, "ImageRef({})", self.0)
        }
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from_uri)
    }
}
