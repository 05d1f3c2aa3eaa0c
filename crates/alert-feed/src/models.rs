use serde::{Deserialize, Deserializer, Serialize};

/// Maximum number of alerts retained by a Feed.
pub const MAX_ALERTS: usize = 100;

/// Alert is one security or visitor event surfaced to operators.
///
/// Alerts are identified by the pair of `image_id` and `timestamp`:
/// the source feed provides no single unique identifier.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Opaque identifier of the captured image.
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_id: String,
    /// ISO-8601 time of the event, kept verbatim as sent by the backend.
    /// An alert without a (non-empty) timestamp is malformed.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Label of the subject.
    #[serde(default, deserialize_with = "null_as_default")]
    pub visitor_id: String,
    /// Label of the originating capture point.
    #[serde(default, deserialize_with = "null_as_default")]
    pub cam_id: String,
    /// Free-form, backend-defined state of the alert.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Path or absolute URL of supporting image evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// AlertKey is the deduplication key of an Alert.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlertKey {
    pub image_id: String,
    pub timestamp: Option<String>,
}

impl AlertKey {
    pub fn new(image_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            timestamp: Some(timestamp.into()),
        }
    }
}

impl std::fmt::Display for AlertKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}",
            self.image_id,
            self.timestamp.as_deref().unwrap_or("<none>")
        )
    }
}

impl Alert {
    /// Returns true if the Alert carries a non-empty timestamp.
    pub fn is_well_formed(&self) -> bool {
        matches!(&self.timestamp, Some(ts) if !ts.is_empty())
    }

    /// Owned deduplication key of this Alert.
    pub fn key(&self) -> AlertKey {
        AlertKey {
            image_id: self.image_id.clone(),
            timestamp: self.timestamp.clone(),
        }
    }

    /// Returns true if this Alert is identified by `key`.
    pub fn has_key(&self, key: &AlertKey) -> bool {
        self.image_id == key.image_id && self.timestamp == key.timestamp
    }

    /// Returns true if `self` and `other` share a deduplication key.
    pub fn same_key(&self, other: &Alert) -> bool {
        self.image_id == other.image_id && self.timestamp == other.timestamp
    }

    /// Resolve the image evidence URL of this Alert.
    ///
    /// Absolute `http://` and `https://` URLs are returned unmodified.
    /// Anything else is a path which is prefixed by `api_base`.
    /// Returns None if there's no image or the result isn't a valid URL.
    pub fn image_url(&self, api_base: &url::Url) -> Option<url::Url> {
        let raw = self.image_url.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }

        let parsed = if is_absolute_http(raw) {
            url::Url::parse(raw)
        } else {
            crate::append_path(api_base, raw)
        };

        match parsed {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::debug!(?err, image_url = raw, "alert image URL is invalid");
                None
            }
        }
    }
}

fn is_absolute_http(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

// Backends frequently send `null` for labels they don't have.
fn null_as_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
