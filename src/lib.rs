//! Hemmer Provider REST
//!
//! This crate is the shared core behind Hemmer providers that manage
//! resources on a bearer-authenticated REST API. A provider describes each of
//! its entity kinds once, as data, and gets create, read, update, delete,
//! import and list for free.
//!
//! # Overview
//!
//! - **Transport**: one authenticated JSON or multipart exchange per call, with
//!   status classification, decoding, a fixed timeout and cancellation
//! - **Entity descriptors**: path templates, identifier field, pagination
//!   style, update verb, body encoding and attribute ownership per kind
//! - **Reconciler**: turns operations on typed records into transport calls,
//!   sending minimal diffs on update
//! - **Pagination**: cursor and offset/limit listings aggregated into one
//!   collection, bounded by a page cap
//! - **Lifecycle tracking**: the Absent/Bound state machine of one record
//! - **Error types**: a single classified error enum
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```no_run
//! use hemmer_provider_rest::{
//!     schema::{Attribute, EntityKind, Pagination},
//!     EndpointConfig, Entity, Reconciler, RestError, Transport,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Group {
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     id: Option<u64>,
//!     name: String,
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     description: Option<String>,
//! }
//!
//! impl Entity for Group {
//!     fn kind() -> EntityKind {
//!         EntityKind::new("group", "/api/v1/groups/")
//!             .with_pagination(Pagination::cursor())
//!             .with_attribute("name", Attribute::required_string())
//!             .with_attribute("description", Attribute::optional_string())
//!     }
//! }
//!
//! # async fn run() -> Result<(), RestError> {
//! let config = EndpointConfig::new("https://api.example.com", "secret-token")?;
//! let groups: Reconciler<Group> = Reconciler::new(Transport::new(config)?);
//!
//! let created = groups
//!     .create(&Group { id: None, name: "ops".into(), description: None })
//!     .await?;
//! let id = groups
//!     .identity_of(&created)?
//!     .ok_or_else(|| RestError::MissingIdentity { kind: "group".into() })?;
//!
//! let mut planned = created.clone();
//! planned.description = Some("On-call rotation".into());
//! groups.update(&id, &planned, &created).await?;
//!
//! let everything = groups.list_all().await?;
//! groups.delete(&id).await?;
//! # let _ = everything;
//! # Ok(())
//! # }
//! ```
//!
//! # Wire Contract
//!
//! Every request carries `Authorization: Bearer <token>` and
//! `Accept: application/json`. JSON exchanges send
//! `Content-Type: application/json`; multipart exchanges send the multipart
//! boundary type and at most one file part. Statuses below 400 are success,
//! `204` and empty bodies skip decoding, and anything from 400 up is returned
//! as [`RestError::RemoteApi`] with the body verbatim. Nothing is retried.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod diff;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod pagination;
pub mod reconciler;
pub mod schema;
pub mod testing;
pub mod transport;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use config::EndpointConfig;
pub use diff::UpdatePayload;
pub use error::RestError;
pub use http::{FilePart, HttpMethod, MultipartBody, RawResponse, RequestBody, RequestEnvelope};
pub use lifecycle::{Refresh, Tracked};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use pagination::{ListOptions, Page};
pub use reconciler::{Entity, Reconciler};
pub use schema::{Attribute, EntityKind, Pagination};
pub use transport::{Dispatch, HttpDispatcher, Transport};
pub use types::{AttributeChange, Identity, Plan};
pub use validation::validate;

// Re-export async_trait for custom dispatchers
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tokio_util::sync::CancellationToken;
pub use tracing;
