//! Request and response bodies exchanged with the catalog API

use medicat_core::{CredentialPair, Page};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Login request
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Login response: a fresh credential pair
pub type LoginResponse = CredentialPair;

/// Body of the refresh and logout calls
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Refresh response
///
/// `refresh` is only present when the backend rotates refresh credentials.
#[derive(Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Standard `{success, data, message}` envelope
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    pub data: T,
    #[serde(default)]
    pub message: Option<JsonValue>,
}

/// A list response, paginated or wrapped in the standard envelope
#[derive(Debug, Deserialize)]
#[serde(untagged, bound = "T: DeserializeOwned")]
pub enum Listing<T> {
    Paginated(Page<T>),
    Enveloped(ApiEnvelope<Vec<T>>),
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_page(self) -> Page<T> {
        match self {
            Self::Paginated(page) => page,
            Self::Enveloped(envelope) => Page::single(envelope.data),
            Self::Bare(items) => Page::single(items),
        }
    }
}

/// A single-object response, enveloped or bare
#[derive(Debug, Deserialize)]
#[serde(untagged, bound = "T: DeserializeOwned")]
pub enum Item<T> {
    Enveloped(ApiEnvelope<T>),
    Bare(T),
}

impl<T> Item<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Enveloped(envelope) => envelope.data,
            Self::Bare(item) => item,
        }
    }
}

/// Extract a human readable message from an error body
///
/// The backend reports either `{"message": "text"}` or, for validation
/// failures, `{"message": {"field": ["error", ...]}}`; framework errors use
/// `{"detail": "text"}`.
pub fn error_message(body: &str) -> Option<String> {
    let value: JsonValue = serde_json::from_str(body).ok()?;
    let message = value.get("message").or_else(|| value.get("detail"))?;
    flatten_message(message)
}

fn flatten_message(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(text) => Some(text.clone()),
        JsonValue::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(flatten_message).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        JsonValue::Object(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .filter_map(|(field, errors)| {
                    flatten_message(errors).map(|text| format!("{field}: {text}"))
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_accepts_every_shape() {
        let paginated: Listing<u32> =
            serde_json::from_value(json!({"results": [1, 2], "count": 12, "total_pages": 2}))
                .unwrap();
        let page = paginated.into_page();
        assert_eq!(page.results, vec![1, 2]);
        assert_eq!(page.total_pages(), 2);

        let enveloped: Listing<u32> =
            serde_json::from_value(json!({"success": true, "data": [3], "message": null}))
                .unwrap();
        assert_eq!(enveloped.into_page().results, vec![3]);

        let bare: Listing<u32> = serde_json::from_value(json!([4, 5])).unwrap();
        assert_eq!(bare.into_page().count, 2);
    }

    #[test]
    fn error_message_flattens_field_errors() {
        let body = json!({
            "success": false,
            "data": null,
            "message": {"batch_number": ["This field must be unique."], "price": ["Required."]}
        })
        .to_string();
        assert_eq!(
            error_message(&body).as_deref(),
            Some("batch_number: This field must be unique.; price: Required.")
        );
    }

    #[test]
    fn error_message_reads_plain_and_detail_messages() {
        assert_eq!(
            error_message(r#"{"message": "Medicine not found."}"#).as_deref(),
            Some("Medicine not found.")
        );
        assert_eq!(
            error_message(r#"{"detail": "Token is invalid or expired"}"#).as_deref(),
            Some("Token is invalid or expired")
        );
        assert_eq!(error_message("<html>oops</html>"), None);
        assert_eq!(error_message(r#"{"message": null}"#), None);
    }
}
