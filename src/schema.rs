//! Static descriptors for managed entity kinds.
//!
//! An [`EntityKind`] tells the reconciler where an entity lives on the remote
//! API, how its listings paginate, how its bodies are encoded, and which of its
//! attributes the caller may set. Path shapes and pagination styles differ
//! between endpoint families of the same API, so they are always data on the
//! descriptor and never hard-coded in the reconciler.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::http::HttpMethod;
use crate::types::Identity;

/// Placeholder replaced by the percent-encoded identifier in item paths.
pub const ID_PLACEHOLDER: &str = "{id}";

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A 64-bit floating point number.
    Float64,
    /// A boolean value.
    Bool,
    /// A list of values of a single type.
    List(Box<AttributeType>),
    /// A set of unique values of a single type.
    Set(Box<AttributeType>),
    /// A map from string keys to values of a single type.
    Map(Box<AttributeType>),
    /// An object with a fixed set of attributes.
    Object(HashMap<String, AttributeType>),
    /// Any JSON value.
    Dynamic,
}

impl AttributeType {
    /// Create a list type.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create a set type.
    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }

    /// Create a map type.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }

    /// Create an object type.
    pub fn object(attributes: HashMap<String, AttributeType>) -> Self {
        Self::Object(attributes)
    }
}

/// Describes who owns an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The caller must set the attribute.
    pub required: bool,
    /// The caller may set the attribute.
    pub optional: bool,
    /// The remote assigns or derives the attribute.
    pub computed: bool,
    /// The value must not appear in logs.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Flags for a remote-owned, read-only attribute.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Flags for an attribute the caller may set but the remote defaults when
    /// left out.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Mark the attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Computed without being settable: never sent to the remote.
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Describes a single attribute of an entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Ownership flags.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Changing this attribute cannot be done in place; the entity is replaced.
    #[serde(default)]
    pub force_new: bool,
}

impl Attribute {
    /// Create an attribute with the given type and flags.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
        }
    }

    /// A required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// An optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// A computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// A required int64 attribute.
    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    /// An optional int64 attribute.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// A computed int64 attribute.
    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    /// A required bool attribute.
    pub fn required_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::required())
    }

    /// An optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// A computed bool attribute.
    pub fn computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::computed())
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the attribute as forcing replacement when changed.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Let the remote default the attribute when the caller leaves it out.
    pub fn with_remote_default(mut self) -> Self {
        self.flags.computed = true;
        self
    }

    /// Mark the attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// How a listing endpoint splits its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "style")]
pub enum Pagination {
    /// The endpoint returns a bare JSON array.
    Unpaginated,
    /// Each page is `{results, next}`; `next` is a URL, a path, or a token
    /// sent back as `cursor_param`.
    Cursor {
        /// Query parameter carrying a bare cursor token.
        cursor_param: String,
    },
    /// Each page is `{results, count}`, addressed by offset and limit.
    OffsetLimit {
        /// Page size requested.
        limit: u32,
        /// Name of the offset query parameter.
        offset_param: String,
        /// Name of the limit query parameter.
        limit_param: String,
    },
}

impl Pagination {
    /// Cursor pagination with the conventional `cursor` parameter.
    pub fn cursor() -> Self {
        Self::Cursor {
            cursor_param: "cursor".to_string(),
        }
    }

    /// Offset/limit pagination with the conventional `offset` and `limit`
    /// parameters.
    pub fn offset_limit(limit: u32) -> Self {
        Self::OffsetLimit {
            limit,
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
        }
    }
}

/// How create and update bodies are encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "encoding")]
pub enum BodyEncoding {
    /// `application/json`.
    Json,
    /// `multipart/form-data`, with the entity's file sent under `file_part`.
    Multipart {
        /// Name of the file part.
        file_part: String,
    },
}

/// Static descriptor of one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityKind {
    /// Kind name used in errors and logs.
    pub name: String,
    /// Path used to create and list entities.
    pub collection_path: String,
    /// Path of a single entity, containing [`ID_PLACEHOLDER`].
    pub item_path: String,
    /// JSON field carrying the identifier.
    pub id_field: String,
    /// Listing pagination style.
    pub pagination: Pagination,
    /// Verb used for partial updates.
    pub update_method: HttpMethod,
    /// Body encoding for create and update.
    pub encoding: BodyEncoding,
    /// Declared attributes. Undeclared fields are treated as caller-settable.
    pub attributes: HashMap<String, Attribute>,
}

impl EntityKind {
    /// Create a descriptor rooted at `collection_path`.
    ///
    /// The item path defaults to the collection path followed by the
    /// identifier, keeping the collection's trailing-slash convention:
    /// `/users/` yields `/users/{id}/`, `/users` yields `/users/{id}`.
    pub fn new(name: impl Into<String>, collection_path: impl Into<String>) -> Self {
        let collection_path = collection_path.into();
        let item_path = if collection_path.ends_with('/') {
            format!("{}{}/", collection_path, ID_PLACEHOLDER)
        } else {
            format!("{}/{}", collection_path, ID_PLACEHOLDER)
        };
        Self {
            name: name.into(),
            collection_path,
            item_path,
            id_field: "id".to_string(),
            pagination: Pagination::Unpaginated,
            update_method: HttpMethod::Patch,
            encoding: BodyEncoding::Json,
            attributes: HashMap::new(),
        }
    }

    /// Override the item path. It must contain [`ID_PLACEHOLDER`].
    pub fn with_item_path(mut self, item_path: impl Into<String>) -> Self {
        self.item_path = item_path.into();
        self
    }

    /// Override the identifier field name.
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Set the listing pagination style.
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Set the verb used for updates.
    pub fn with_update_method(mut self, method: HttpMethod) -> Self {
        self.update_method = method;
        self
    }

    /// Encode bodies as multipart, sending the entity's file as `file_part`.
    pub fn multipart(mut self, file_part: impl Into<String>) -> Self {
        self.encoding = BodyEncoding::Multipart {
            file_part: file_part.into(),
        };
        self
    }

    /// Declare an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Look up a declared attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Whether the field is remote-owned and never sent on create or update.
    pub fn is_read_only(&self, field: &str) -> bool {
        field == self.id_field
            || self
                .attributes
                .get(field)
                .is_some_and(|attr| attr.flags.is_read_only())
    }

    /// Whether an absent planned value means "keep the remote value".
    pub fn keeps_remote_default(&self, field: &str) -> bool {
        self.attributes
            .get(field)
            .is_some_and(|attr| attr.flags.computed && !attr.flags.is_read_only())
    }

    /// Whether changing the field forces replacement.
    pub fn forces_new(&self, field: &str) -> bool {
        self.attributes.get(field).is_some_and(|attr| attr.force_new)
    }

    /// Whether the field must be kept out of logs.
    pub fn is_sensitive(&self, field: &str) -> bool {
        self.attributes
            .get(field)
            .is_some_and(|attr| attr.flags.sensitive)
    }

    /// The item path for `id`, percent-encoded.
    pub fn item_path_for(&self, id: &Identity) -> String {
        self.item_path
            .replace(ID_PLACEHOLDER, &urlencoding::encode(id.as_str()))
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Prevents the operation.
    Error,
    /// Worth reporting, does not prevent the operation.
    Warning,
}

/// A validation finding about a desired record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The attribute path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}
