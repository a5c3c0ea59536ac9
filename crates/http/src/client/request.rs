//! Replayable request descriptions

use super::error::ClientError;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Whether a request has already been replayed after a credential refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryState {
    #[default]
    Fresh,
    Retried,
}

/// One field of a multipart form
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Request payload, kept in owned form so the request can be sent twice
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(JsonValue),
    Multipart(Vec<FormPart>),
}

/// An outbound API call
///
/// Unlike a `reqwest::RequestBuilder`, an `ApiRequest` can be turned into a
/// request any number of times, which the client relies on to replay it with
/// a refreshed access credential.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: RequestBody,
    retry: RetryState,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            retry: RetryState::Fresh,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Attach a multipart form body
    #[must_use]
    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn body(&self) -> &RequestBody {
        &self.body
    }

    pub const fn retry_state(&self) -> RetryState {
        self.retry
    }

    /// Mark the request as replayed
    pub(crate) fn mark_retried(&mut self) {
        self.retry = RetryState::Retried;
    }

    /// Build a `reqwest` request for this call
    pub(crate) fn build(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        access: Option<&str>,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let url = format!("{base_url}{}", self.path);
        let mut request = client.request(self.method.clone(), url);

        if !self.query.is_empty() {
            request = request.query(&self.query);
        }

        if let Some(access) = access {
            request = request.bearer_auth(access);
        }

        request = match &self.body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Multipart(parts) => request.multipart(build_form(parts)?),
        };

        Ok(request)
    }
}

fn build_form(parts: &[FormPart]) -> Result<Form, ClientError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(mime) = mime {
                    file = file.mime_str(mime)?;
                }
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}
