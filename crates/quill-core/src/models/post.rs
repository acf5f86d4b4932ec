//! Post model

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::iso_timestamp_now;

/// A cached post.
///
/// Positive ids are assigned by the server. Negative ids are local
/// placeholders for posts created while offline and not yet confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    /// Server-assigned identifier (negative while provisional)
    pub id: i64,
    /// Post title
    pub title: String,
    /// Post body
    pub description: String,
    /// Whether the post is published
    pub is_active: bool,
    /// Creation timestamp (ISO-8601)
    pub created_at: String,
    /// Last update timestamp (ISO-8601)
    pub updated_at: String,
    /// Local-only flag: the server has confirmed this record
    #[serde(rename = "isSynced")]
    pub is_synced: bool,
}

impl Post {
    /// Create an unsynced post with fresh timestamps
    #[must_use]
    pub fn new(
        id: i64,
        title: impl Into<String>,
        description: impl Into<String>,
        is_active: bool,
    ) -> Self {
        let now = iso_timestamp_now();
        Self {
            id,
            title: title.into(),
            description: description.into(),
            is_active,
            created_at: now.clone(),
            updated_at: now,
            is_synced: false,
        }
    }

    /// Build a post from a (possibly partial) JSON payload.
    pub fn from_payload(payload: &Value) -> serde_json::Result<Self> {
        Self::default().merged_with(payload)
    }

    /// Returns a copy with every non-null field of `payload` written over this post.
    pub fn merged_with(&self, payload: &Value) -> serde_json::Result<Self> {
        let mut base = serde_json::to_value(self)?;
        if let (Some(fields), Some(patch)) = (base.as_object_mut(), payload.as_object()) {
            for (key, value) in patch {
                if !value.is_null() {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }
        serde_json::from_value(base)
    }

    /// Whether this post only exists locally under a placeholder id
    pub const fn is_provisional(&self) -> bool {
        self.id < 0
    }

    /// JSON payload used when queueing this post for the server
    pub fn to_payload(&self) -> serde_json::Result<Value> {
        let mut payload = serde_json::to_value(self)?;
        if let Some(fields) = payload.as_object_mut() {
            fields.remove("isSynced");
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_post_new_is_unsynced() {
        let post = Post::new(-1, "Title", "Body", true);
        assert!(!post.is_synced);
        assert!(post.is_provisional());
        assert_eq!(post.created_at, post.updated_at);
        assert!(post.created_at.ends_with('Z'));
    }

    #[test]
    fn test_from_partial_payload_uses_defaults() {
        let post = Post::from_payload(&json!({"title": "T", "description": "D"})).unwrap();
        assert_eq!(post.id, 0);
        assert_eq!(post.title, "T");
        assert_eq!(post.description, "D");
        assert!(!post.is_active);
        assert!(!post.is_synced);
    }

    #[test]
    fn test_merge_overwrites_present_fields_only() {
        let post = Post::new(1, "Old", "Keep me", true);
        let merged = post
            .merged_with(&json!({"id": 1, "title": "Updated", "description": null}))
            .unwrap();
        assert_eq!(merged.title, "Updated");
        assert_eq!(merged.description, "Keep me");
        assert!(merged.is_active);
    }

    #[test]
    fn test_is_synced_uses_camel_case_key() {
        let mut post = Post::new(3, "T", "D", false);
        post.is_synced = true;
        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["isSynced"], json!(true));

        let payload = post.to_payload().unwrap();
        assert!(payload.get("isSynced").is_none());
        assert_eq!(payload["id"], json!(3));
    }
}
