//! Create, read, update, delete and list for one entity kind.
//!
//! A [`Reconciler`] turns an operation on a typed record into the right
//! sequence of [`Transport`] exchanges:
//!
//! - `create` sends every caller-settable field and trusts the response as the
//!   new source of truth.
//! - `read` maps a missing entity to [`RestError::NotFound`].
//! - `update` sends only the fields that differ between the planned and the
//!   last-known record, and sends nothing at all when they agree.
//! - `delete` treats an already missing entity as deleted.
//! - `list_all` aggregates every page of a listing.
//!
//! The reconciler keeps no state between calls. Callers that retry must call
//! `update` again so the diff is recomputed from fresh records.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::diff::{self, UpdatePayload};
use crate::error::RestError;
use crate::http::{FilePart, HttpMethod, MultipartBody};
use crate::pagination::{self, ListOptions};
use crate::schema::{BodyEncoding, EntityKind};
use crate::transport::{Dispatch, HttpDispatcher, Transport};
use crate::types::{Identity, Plan};
use crate::validation;

/// A record type managed through a [`Reconciler`].
///
/// The record serializes to a JSON object whose top-level fields are the
/// entity's attributes. Fields the remote may omit should deserialize with
/// `#[serde(default)]`, and unset optional fields should be skipped on
/// serialization so they are not sent.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Descriptor of this entity kind.
    fn kind() -> EntityKind;

    /// File content for multipart kinds.
    ///
    /// Only consulted when the kind uses [`BodyEncoding::Multipart`]. The file
    /// is sent on create and on any update where it differs from the
    /// last-known record.
    fn file(&self) -> Option<FilePart> {
        None
    }
}

/// Drives the lifecycle of entities of kind `E` against one remote API.
pub struct Reconciler<E, D = HttpDispatcher> {
    transport: Transport<D>,
    kind: EntityKind,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, D: Dispatch> Reconciler<E, D> {
    /// Create a reconciler using the kind's own descriptor.
    pub fn new(transport: Transport<D>) -> Self {
        Self::with_kind(transport, E::kind())
    }

    /// Create a reconciler with an explicit descriptor, for kinds whose paths
    /// are only known at runtime (for example collections nested under a
    /// parent entity).
    pub fn with_kind(transport: Transport<D>, kind: EntityKind) -> Self {
        Self {
            transport,
            kind,
            _entity: PhantomData,
        }
    }

    /// The descriptor in use.
    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Transport<D> {
        &self.transport
    }

    /// Identifier carried by `entity`, if it has one.
    pub fn identity_of(&self, entity: &E) -> Result<Option<Identity>, RestError> {
        let fields = diff::to_object(entity)?;
        Ok(fields.get(&self.kind.id_field).and_then(Identity::from_value))
    }

    /// Create the entity described by `desired`.
    ///
    /// The returned record comes from the response body, including the
    /// identifier and every remote-assigned field.
    #[instrument(skip_all, fields(kind = %self.kind.name))]
    pub async fn create(&self, desired: &E) -> Result<E, RestError> {
        let fields = diff::to_object(desired)?;
        self.validate(&fields)?;
        let body = diff::creation_fields(&self.kind, fields);
        debug!(body = %diff::redacted(&self.kind, &body), "Creating entity");

        let path = self.kind.collection_path.as_str();
        let created: Option<E> = match &self.kind.encoding {
            BodyEncoding::Json => {
                self.transport
                    .exchange_json(HttpMethod::Post, path, Some(&body))
                    .await?
            },
            BodyEncoding::Multipart { file_part } => {
                let mut form = MultipartBody::from_fields(&body);
                if let Some(file) = desired.file() {
                    form = form.with_file(file_part.as_str(), file);
                }
                self.transport
                    .exchange_multipart(HttpMethod::Post, path, form)
                    .await?
            },
        };

        let created = created.ok_or_else(|| self.missing_identity())?;
        let id = self
            .identity_of(&created)?
            .ok_or_else(|| self.missing_identity())?;
        info!(%id, "Created entity");
        Ok(created)
    }

    /// Fetch the entity with identifier `id`.
    ///
    /// A `404` or `410` answer, or a success without a body, is reported as
    /// [`RestError::NotFound`].
    #[instrument(skip(self), fields(kind = %self.kind.name))]
    pub async fn read(&self, id: &Identity) -> Result<E, RestError> {
        self.require_identity(id)?;
        let path = self.kind.item_path_for(id);
        let entity: Option<E> = self
            .transport
            .exchange_json(HttpMethod::Get, &path, None::<&()>)
            .await
            .map_err(|e| self.not_found(e, id))?;

        let entity = entity.ok_or_else(|| self.not_found_error(id))?;
        self.check_identity(id, &entity)?;
        debug!("Read entity");
        Ok(entity)
    }

    /// Attach to an entity created outside this process, by identifier.
    ///
    /// Fails with [`RestError::NotFound`] when nothing exists under `id`.
    #[instrument(skip(self), fields(kind = %self.kind.name))]
    pub async fn import(&self, id: &Identity) -> Result<E, RestError> {
        let entity = self.read(id).await?;
        info!("Imported entity");
        Ok(entity)
    }

    /// Move the entity from `last_known` to `planned`.
    ///
    /// Only differing fields are sent. When nothing differs no request is made
    /// and `last_known` is returned unchanged. When the remote answers without
    /// a body the entity is read back.
    #[instrument(skip(self, planned, last_known), fields(kind = %self.kind.name))]
    pub async fn update(&self, id: &Identity, planned: &E, last_known: &E) -> Result<E, RestError> {
        self.require_identity(id)?;
        let payload = diff::compute(&self.kind, planned, last_known)?;
        if payload.is_empty() {
            debug!("No changes; skipping update");
            return Ok(last_known.clone());
        }
        self.validate(&diff::to_object(planned)?)?;
        debug!(fields = %diff::redacted(&self.kind, payload.fields()), "Sending update");

        let updated = self.send_update(id, &payload).await?;
        let updated = match updated {
            Some(entity) => entity,
            None => self.read(id).await?,
        };
        self.check_identity(id, &updated)?;

        info!(changed = ?payload.changed_names(), file = payload.file().is_some(), "Updated entity");
        Ok(updated)
    }

    /// Delete the entity. An entity that is already gone counts as deleted.
    #[instrument(skip(self), fields(kind = %self.kind.name))]
    pub async fn delete(&self, id: &Identity) -> Result<(), RestError> {
        self.require_identity(id)?;
        let path = self.kind.item_path_for(id);
        match self
            .transport
            .exchange_json_unit(HttpMethod::Delete, &path, None::<&()>)
            .await
        {
            Ok(()) => {
                info!("Deleted entity");
                Ok(())
            },
            Err(e) if is_gone(&e) => {
                debug!("Entity already absent");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    /// List every entity in the kind's collection.
    pub async fn list_all(&self) -> Result<Vec<E>, RestError> {
        self.list_all_with(&[], &ListOptions::default()).await
    }

    /// List the kind's collection with extra query parameters.
    pub async fn list_all_with(
        &self,
        query: &[(String, String)],
        options: &ListOptions,
    ) -> Result<Vec<E>, RestError> {
        let path = self.kind.collection_path.clone();
        self.list_all_at(&path, query, options).await
    }

    /// List entities at an arbitrary path using the kind's pagination style.
    #[instrument(skip(self, query, options), fields(kind = %self.kind.name))]
    pub async fn list_all_at(
        &self,
        path: &str,
        query: &[(String, String)],
        options: &ListOptions,
    ) -> Result<Vec<E>, RestError> {
        let entities =
            pagination::collect(&self.transport, &self.kind.pagination, path, query, options)
                .await?;
        debug!(count = entities.len(), "Listed entities");
        Ok(entities)
    }

    /// Decide what applying `desired` over `prior` would do, without any
    /// network call.
    pub fn plan(&self, prior: Option<&E>, desired: &E) -> Result<Plan, RestError> {
        let Some(prior) = prior else {
            return Ok(Plan::Create);
        };

        let payload = diff::compute(&self.kind, desired, prior)?;
        if payload.is_empty() {
            return Ok(Plan::NoOp);
        }

        let changes = payload.changes().to_vec();
        if changes.iter().any(|c| self.kind.forces_new(&c.path)) {
            Ok(Plan::Replace { changes })
        } else {
            Ok(Plan::Update { changes })
        }
    }

    async fn send_update(
        &self,
        id: &Identity,
        payload: &UpdatePayload<E>,
    ) -> Result<Option<E>, RestError> {
        let path = self.kind.item_path_for(id);
        let method = self.kind.update_method;
        let result: Result<Option<E>, RestError> = match &self.kind.encoding {
            BodyEncoding::Json => {
                self.transport
                    .exchange_json(method, &path, Some(payload))
                    .await
            },
            BodyEncoding::Multipart { file_part } => {
                self.transport
                    .exchange_multipart(method, &path, payload.to_multipart(file_part))
                    .await
            },
        };
        result.map_err(|e| self.not_found(e, id))
    }

    fn validate(&self, fields: &Map<String, Value>) -> Result<(), RestError> {
        let errors = validation::errors(&self.kind, &Value::Object(fields.clone()));
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RestError::Validation(errors))
        }
    }

    /// An empty identifier names no entity; the item path would collapse to
    /// the collection.
    pub(crate) fn require_identity(&self, id: &Identity) -> Result<(), RestError> {
        if id.is_empty() {
            return Err(RestError::NotBound {
                kind: self.kind.name.clone(),
            });
        }
        Ok(())
    }

    fn check_identity(&self, id: &Identity, entity: &E) -> Result<(), RestError> {
        match self.identity_of(entity)? {
            Some(actual) if actual != *id => Err(RestError::IdentityMismatch {
                kind: self.kind.name.clone(),
                expected: id.to_string(),
                actual: actual.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn not_found(&self, err: RestError, id: &Identity) -> RestError {
        if is_gone(&err) {
            self.not_found_error(id)
        } else {
            err
        }
    }

    fn not_found_error(&self, id: &Identity) -> RestError {
        RestError::NotFound {
            kind: self.kind.name.clone(),
            id: id.to_string(),
        }
    }

    fn missing_identity(&self) -> RestError {
        RestError::MissingIdentity {
            kind: self.kind.name.clone(),
        }
    }
}

impl<E, D> Clone for Reconciler<E, D> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            kind: self.kind.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E, D> fmt::Debug for Reconciler<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("kind", &self.kind.name)
            .field("transport", &self.transport)
            .finish()
    }
}

fn is_gone(err: &RestError) -> bool {
    matches!(err.status(), Some(404 | 410))
}
