//! Request shapes exchanged with the record API.

use serde::{Deserialize, Serialize};

/// A single record as returned by the API: field name to JSON scalar.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Annotation the API attaches to every record; never useful to callers.
pub const ETAG_ANNOTATION: &str = "@odata.etag";

/// Filtered read against a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveMultipleRequest {
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<bool>,
}

impl RetrieveMultipleRequest {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = Some(count);
        self
    }

    /// True when the caller asked for a field projection.
    pub fn has_projection(&self) -> bool {
        self.select.as_ref().map(|s| !s.is_empty()).unwrap_or(false)
    }
}

/// Create a record in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub collection: String,
    pub entity: Record,
    #[serde(default)]
    pub return_representation: bool,
}

impl CreateRequest {
    pub fn new(collection: impl Into<String>, entity: Record) -> Self {
        Self {
            collection: collection.into(),
            entity,
            return_representation: true,
        }
    }

    pub fn with_return_representation(mut self, enable: bool) -> Self {
        self.return_representation = enable;
        self
    }
}

/// Delete a record by its primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub collection: String,
    pub key: String,
    /// Value the caller used to look the record up (e.g. its email).
    /// Only consulted by targeted invalidation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
}

impl DeleteRequest {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            discriminator: None,
        }
    }

    pub fn with_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }
}

/// Drop API annotations that are meaningless outside the wire format.
pub(crate) fn strip_annotations(mut record: Record) -> Record {
    record.remove(ETAG_ANNOTATION);
    record
}
