//! Minimal-diff update payloads.
//!
//! An update sends only the fields whose planned value differs from the
//! last-known value. Read-only fields never appear, and an optional attribute
//! the remote defaults is left alone when the planned record omits it.

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::RestError;
use crate::http::{FilePart, MultipartBody};
use crate::reconciler::Entity;
use crate::schema::EntityKind;
use crate::types::AttributeChange;

/// The subset of an entity sent by one update call.
///
/// Serializes to a JSON object holding exactly the changed keys. A key whose
/// planned value is absent serializes as `null`, which clears it remotely.
pub struct UpdatePayload<E> {
    fields: Map<String, Value>,
    changes: Vec<AttributeChange>,
    file: Option<FilePart>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> UpdatePayload<E> {
    /// Start a payload for `kind`.
    pub fn builder(kind: &EntityKind) -> UpdatePayloadBuilder<'_, E> {
        UpdatePayloadBuilder {
            kind,
            payload: UpdatePayload {
                fields: Map::new(),
                changes: Vec::new(),
                file: None,
                _entity: PhantomData,
            },
        }
    }

    /// Whether the update would send nothing.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.file.is_none()
    }

    /// The attribute changes, ordered by attribute name.
    pub fn changes(&self) -> &[AttributeChange] {
        &self.changes
    }

    /// The fields that will be sent.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The replacement file, present only when the file content changed.
    pub fn file(&self) -> Option<&FilePart> {
        self.file.as_ref()
    }

    /// Names of the changed attributes. Values are never included, so this is
    /// safe to log for sensitive attributes.
    pub fn changed_names(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.path.as_str()).collect()
    }

    /// Encode the payload as a multipart body, attaching the file under
    /// `file_part` when it changed.
    pub fn to_multipart(&self, file_part: &str) -> MultipartBody {
        let body = MultipartBody::from_fields(&self.fields);
        match &self.file {
            Some(file) => body.with_file(file_part, file.clone()),
            None => body,
        }
    }
}

impl<E> Serialize for UpdatePayload<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<E> fmt::Debug for UpdatePayload<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatePayload")
            .field("changed", &self.changed_names())
            .field("file", &self.file)
            .finish()
    }
}

/// Builder for [`UpdatePayload`] that refuses read-only fields.
pub struct UpdatePayloadBuilder<'k, E> {
    kind: &'k EntityKind,
    payload: UpdatePayload<E>,
}

impl<E> UpdatePayloadBuilder<'_, E> {
    /// Record a change. Changes to read-only fields are dropped.
    pub fn change(mut self, change: AttributeChange) -> Self {
        if self.kind.is_read_only(&change.path) {
            return self;
        }
        let value = change.after.clone().unwrap_or(Value::Null);
        self.payload.fields.insert(change.path.clone(), value);
        self.payload.changes.push(change);
        self
    }

    /// Attach a replacement file.
    pub fn file(mut self, file: FilePart) -> Self {
        self.payload.file = Some(file);
        self
    }

    /// Finish the payload.
    pub fn build(mut self) -> UpdatePayload<E> {
        self.payload.changes.sort_by(|a, b| a.path.cmp(&b.path));
        self.payload
    }
}

/// Compute the update payload that moves `last_known` to `planned`.
pub fn compute<E: Entity>(
    kind: &EntityKind,
    planned: &E,
    last_known: &E,
) -> Result<UpdatePayload<E>, RestError> {
    let planned_fields = to_object(planned)?;
    let known_fields = to_object(last_known)?;

    let mut builder = UpdatePayload::builder(kind);
    for change in diff_fields(kind, &planned_fields, &known_fields) {
        builder = builder.change(change);
    }

    let planned_file = planned.file();
    if planned_file != last_known.file() {
        if let Some(file) = planned_file {
            builder = builder.file(file);
        }
    }

    Ok(builder.build())
}

/// Field-by-field comparison of two serialized records.
///
/// Absent and `null` are the same value. Read-only fields are skipped, and so
/// are remote-defaulted fields the planned record leaves out.
pub fn diff_fields(
    kind: &EntityKind,
    planned: &Map<String, Value>,
    last_known: &Map<String, Value>,
) -> Vec<AttributeChange> {
    let names: BTreeSet<&String> = planned.keys().chain(last_known.keys()).collect();

    let mut changes = Vec::new();
    for name in names {
        if kind.is_read_only(name) {
            continue;
        }
        let after = present(planned.get(name.as_str()));
        let before = present(last_known.get(name.as_str()));
        if after.is_none() && kind.keeps_remote_default(name) {
            continue;
        }
        if before != after {
            changes.push(AttributeChange::new(
                name.clone(),
                before.cloned(),
                after.cloned(),
            ));
        }
    }
    changes
}

/// The fields sent when creating `record`: everything except read-only
/// fields and nulls.
pub fn creation_fields(kind: &EntityKind, record: Map<String, Value>) -> Map<String, Value> {
    record
        .into_iter()
        .filter(|(name, value)| !value.is_null() && !kind.is_read_only(name))
        .collect()
}

/// A loggable copy of `fields` with sensitive attribute values masked.
pub fn redacted(kind: &EntityKind, fields: &Map<String, Value>) -> Value {
    fields
        .iter()
        .map(|(name, value)| {
            let shown = if kind.is_sensitive(name) {
                Value::String("<redacted>".to_string())
            } else {
                value.clone()
            };
            (name.clone(), shown)
        })
        .collect::<Map<_, _>>()
        .into()
}

/// Serialize a record into its top-level JSON fields.
pub(crate) fn to_object<T: Serialize>(record: &T) -> Result<Map<String, Value>, RestError> {
    match serde_json::to_value(record).map_err(RestError::Marshal)? {
        Value::Object(map) => Ok(map),
        other => Err(RestError::Marshal(serde::ser::Error::custom(format!(
            "entity must serialize to a JSON object, got {}",
            kind_of(&other)
        )))),
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Group {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        visibility: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        member_count: Option<u64>,
    }

    impl Entity for Group {
        fn kind() -> EntityKind {
            EntityKind::new("group", "/groups/")
                .with_attribute("name", Attribute::required_string())
                .with_attribute("description", Attribute::optional_string())
                .with_attribute("visibility", Attribute::optional_string().with_remote_default())
                .with_attribute("member_count", Attribute::computed_int64())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Document {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        title: String,
        #[serde(skip)]
        content: Vec<u8>,
    }

    impl Entity for Document {
        fn kind() -> EntityKind {
            EntityKind::new("document", "/documents/").multipart("document")
        }

        fn file(&self) -> Option<FilePart> {
            Some(FilePart::new("doc.pdf", self.content.clone()))
        }
    }

    fn group(name: &str) -> Group {
        Group {
            id: Some(1),
            name: name.to_string(),
            description: None,
            visibility: Some("private".to_string()),
            member_count: Some(3),
        }
    }

    #[test]
    fn test_identical_records_produce_empty_payload() {
        let kind = Group::kind();
        let payload = compute(&kind, &group("ops"), &group("ops")).unwrap();
        assert!(payload.is_empty());
        assert!(payload.changes().is_empty());
        assert_eq!(serde_json::to_value(&payload).unwrap(), json!({}));
    }

    #[test]
    fn test_only_changed_fields_are_sent() {
        let kind = Group::kind();
        let mut planned = group("ops");
        planned.description = Some("on call".to_string());
        let payload = compute(&kind, &planned, &group("ops")).unwrap();

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"description": "on call"})
        );
        assert_eq!(payload.changes().len(), 1);
        assert_eq!(payload.changes()[0].before, None);
    }

    #[test]
    fn test_redacted_masks_sensitive_values() {
        let kind = EntityKind::new("account", "/accounts/")
            .with_attribute("login", Attribute::required_string())
            .with_attribute("password", Attribute::optional_string().sensitive());
        let fields = json!({"login": "ada", "password": "hunter2"});
        let shown = redacted(&kind, fields.as_object().unwrap());
        assert_eq!(shown, json!({"login": "ada", "password": "<redacted>"}));
    }

    #[test]
    fn test_read_only_fields_never_diff() {
        let kind = Group::kind();
        let mut planned = group("ops");
        planned.id = Some(99);
        planned.member_count = Some(100);
        let payload = compute(&kind, &planned, &group("ops")).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_cleared_field_is_sent_as_null() {
        let kind = Group::kind();
        let mut known = group("ops");
        known.description = Some("old".to_string());
        let payload = compute(&kind, &group("ops"), &known).unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"description": null})
        );
    }

    #[test]
    fn test_omitted_remote_default_is_kept() {
        let kind = Group::kind();
        let mut planned = group("ops");
        planned.visibility = None;
        assert!(compute(&kind, &planned, &group("ops")).unwrap().is_empty());

        planned.visibility = Some("public".to_string());
        let payload = compute(&kind, &planned, &group("ops")).unwrap();
        assert_eq!(payload.changed_names(), vec!["visibility"]);
    }

    #[test]
    fn test_builder_drops_read_only_changes() {
        let kind = Group::kind();
        let payload: UpdatePayload<Group> = UpdatePayload::builder(&kind)
            .change(AttributeChange::modified("id", json!(1), json!(2)))
            .change(AttributeChange::modified("name", json!("a"), json!("b")))
            .build();
        assert_eq!(payload.fields().len(), 1);
        assert_eq!(payload.fields()["name"], json!("b"));
    }

    #[test]
    fn test_file_only_attached_when_content_changes() {
        let kind = Document::kind();
        let known = Document {
            id: Some(4),
            title: "Q3".to_string(),
            content: b"v1".to_vec(),
        };

        let mut planned = known.clone();
        planned.title = "Q3 final".to_string();
        let payload = compute(&kind, &planned, &known).unwrap();
        assert!(payload.file().is_none());
        let body = payload.to_multipart("document");
        assert_eq!(body.field("title"), Some("Q3 final"));
        assert!(body.file.is_none());

        planned.content = b"v2".to_vec();
        let payload = compute(&kind, &planned, &known).unwrap();
        assert_eq!(payload.file().unwrap().content, b"v2".to_vec());
        let (part, _) = payload.to_multipart("document").file.unwrap();
        assert_eq!(part, "document");
    }

    #[test]
    fn test_creation_fields_strip_remote_owned_values() {
        let kind = Group::kind();
        let fields = to_object(&group("ops")).unwrap();
        let sent = creation_fields(&kind, fields);
        assert_eq!(
            Value::Object(sent),
            json!({"name": "ops", "visibility": "private"})
        );
    }

    #[test]
    fn test_non_object_entity_is_a_marshal_error() {
        let err = to_object(&vec![1, 2]).unwrap_err();
        assert!(matches!(err, RestError::Marshal(_)));
        assert!(err.to_string().contains("an array"));
    }
}
