//! HTTP exchanges described as plain data.
//!
//! The transport builds a [`RequestEnvelope`] per call and hands it to a
//! [`Dispatch`](crate::transport::Dispatch) implementation, which returns a
//! [`RawResponse`]. Status classification and decoding happen afterwards, so a
//! dispatcher only moves bytes.

use std::fmt;

/// HTTP verb for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// The method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A single file attached to a multipart request.
#[derive(Clone, PartialEq, Eq)]
pub struct FilePart {
    /// File name reported in the part's `Content-Disposition`.
    pub file_name: String,
    /// Raw file content.
    pub content: Vec<u8>,
}

impl FilePart {
    /// Create a file part.
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

impl fmt::Debug for FilePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePart")
            .field("file_name", &self.file_name)
            .field("len", &self.content.len())
            .finish()
    }
}

/// A multipart body: text fields plus at most one named file part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartBody {
    /// Form fields in insertion order.
    pub fields: Vec<(String, String)>,
    /// Optional file part as `(part name, file)`. Absent means fields only.
    pub file: Option<(String, FilePart)>,
}

impl MultipartBody {
    /// Create an empty multipart body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Attach the file part, replacing any previous one.
    pub fn with_file(mut self, part_name: impl Into<String>, file: FilePart) -> Self {
        self.file = Some((part_name.into(), file));
        self
    }

    /// Build a fields-only body from a JSON object.
    ///
    /// Strings are sent as-is, `null` as an empty field, and every other value
    /// as its JSON text.
    pub fn from_fields(fields: &serde_json::Map<String, serde_json::Value>) -> Self {
        let fields = fields
            .iter()
            .map(|(name, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (name.clone(), text)
            })
            .collect();
        Self { fields, file: None }
    }

    /// Look up a field value by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// A JSON document, sent as `application/json`.
    Json(serde_json::Value),
    /// A `multipart/form-data` body.
    Multipart(MultipartBody),
}

/// One outgoing request. Built fresh per call and never retained.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Path relative to the base URL, or an absolute URL for next links.
    pub path: String,
    /// Query parameters appended to the URL.
    pub query: Vec<(String, String)>,
    /// Request payload.
    pub body: RequestBody,
}

impl RequestEnvelope {
    /// Create a request with no body and no query.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Set the query parameters.
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Value of a query parameter, if present.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A response as returned by a dispatcher, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Full response body as text.
    pub body: String,
}

impl RawResponse {
    /// Create a raw response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the body should be skipped rather than decoded.
    pub fn is_empty(&self) -> bool {
        self.status == 204 || self.body.trim().is_empty()
    }
}
