//! Local tracking of one managed entity.
//!
//! A [`Tracked`] record is either `Absent` (nothing remote is known) or
//! `Bound` to a remote identifier together with the last-known snapshot used
//! as the diff baseline:
//!
//! ```text
//! Absent --(create | import | attach)--> Bound --(refresh | update)*--> Bound
//! Bound --destroy--> Absent
//! Bound --refresh finds nothing--> Absent
//! ```
//!
//! Updating, refreshing or destroying an `Absent` record fails with
//! [`RestError::NotBound`]. The identifier of a `Bound` record never changes;
//! a replacement goes through `Absent` and binds the new identifier.

use tracing::{info, warn};

use crate::error::RestError;
use crate::reconciler::{Entity, Reconciler};
use crate::transport::Dispatch;
use crate::types::{Identity, Plan};

/// Tracking state of one managed entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Tracked<E> {
    /// No remote entity is associated.
    Absent,
    /// Associated with a remote entity.
    Bound {
        /// Remote identifier.
        id: Identity,
        /// Most recently fetched or applied snapshot.
        last_known: E,
    },
}

/// Outcome of [`Tracked::refresh`].
#[derive(Debug, Clone, PartialEq)]
pub enum Refresh<E> {
    /// The entity still exists; carries the fresh snapshot.
    Present(E),
    /// The entity no longer exists remotely and was dropped from tracking.
    Gone,
}

impl<E> Default for Tracked<E> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<E: Entity> Tracked<E> {
    /// Bind to a known identifier and snapshot without any network call.
    pub fn attach(id: Identity, last_known: E) -> Self {
        Self::Bound { id, last_known }
    }

    /// Whether a remote entity is associated.
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound { .. })
    }

    /// The bound identifier.
    pub fn id(&self) -> Option<&Identity> {
        match self {
            Self::Bound { id, .. } => Some(id),
            Self::Absent => None,
        }
    }

    /// The last-known snapshot.
    pub fn last_known(&self) -> Option<&E> {
        match self {
            Self::Bound { last_known, .. } => Some(last_known),
            Self::Absent => None,
        }
    }

    /// Bring the remote entity in line with `desired`.
    ///
    /// Creates when absent. When bound, plans against the last-known snapshot
    /// and then does nothing, updates in place, or deletes and recreates.
    /// Returns the plan that was carried out.
    pub async fn apply<D: Dispatch>(
        &mut self,
        reconciler: &Reconciler<E, D>,
        desired: &E,
    ) -> Result<Plan, RestError> {
        let Some((id, last_known)) = self.snapshot() else {
            self.create(reconciler, desired).await?;
            return Ok(Plan::Create);
        };

        let plan = reconciler.plan(Some(&last_known), desired)?;
        match &plan {
            Plan::Create | Plan::NoOp => {},
            Plan::Update { .. } => {
                let updated = reconciler.update(&id, desired, &last_known).await?;
                *self = Self::Bound {
                    id,
                    last_known: updated,
                };
            },
            Plan::Replace { changes } => {
                info!(
                    kind = %reconciler.kind().name,
                    %id,
                    forced_by = ?changes.iter().map(|c| c.path.as_str()).collect::<Vec<_>>(),
                    "Replacing entity"
                );
                reconciler.delete(&id).await?;
                *self = Self::Absent;
                self.create(reconciler, desired).await?;
            },
        }
        Ok(plan)
    }

    /// Update the bound entity towards `planned`.
    pub async fn update<D: Dispatch>(
        &mut self,
        reconciler: &Reconciler<E, D>,
        planned: &E,
    ) -> Result<&E, RestError> {
        let (id, last_known) = self.snapshot().ok_or_else(|| not_bound(reconciler))?;
        let updated = reconciler.update(&id, planned, &last_known).await?;
        *self = Self::Bound {
            id,
            last_known: updated,
        };
        self.last_known_or_unbound(reconciler)
    }

    /// Bind to an existing remote entity by identifier.
    ///
    /// A record already bound to a different identifier is left untouched and
    /// the call fails with [`RestError::IdentityMismatch`].
    pub async fn import<D: Dispatch>(
        &mut self,
        reconciler: &Reconciler<E, D>,
        id: Identity,
    ) -> Result<&E, RestError> {
        reconciler.require_identity(&id)?;
        if let Some(bound) = self.id() {
            if *bound != id {
                return Err(RestError::IdentityMismatch {
                    kind: reconciler.kind().name.clone(),
                    expected: bound.to_string(),
                    actual: id.to_string(),
                });
            }
        }

        let entity = reconciler.import(&id).await?;
        *self = Self::Bound {
            id,
            last_known: entity,
        };
        self.last_known_or_unbound(reconciler)
    }

    /// Re-read the bound entity.
    ///
    /// When the remote reports it missing the record becomes `Absent` and
    /// [`Refresh::Gone`] is returned instead of an error.
    pub async fn refresh<D: Dispatch>(
        &mut self,
        reconciler: &Reconciler<E, D>,
    ) -> Result<Refresh<E>, RestError> {
        let id = self.id().cloned().ok_or_else(|| not_bound(reconciler))?;
        match reconciler.read(&id).await {
            Ok(entity) => {
                *self = Self::Bound {
                    id,
                    last_known: entity.clone(),
                };
                Ok(Refresh::Present(entity))
            },
            Err(e) if e.is_not_found() => {
                warn!(kind = %reconciler.kind().name, %id, "Entity no longer exists; dropping it");
                *self = Self::Absent;
                Ok(Refresh::Gone)
            },
            Err(e) => Err(e),
        }
    }

    /// Delete the bound entity and become `Absent`.
    pub async fn destroy<D: Dispatch>(
        &mut self,
        reconciler: &Reconciler<E, D>,
    ) -> Result<(), RestError> {
        let id = self.id().cloned().ok_or_else(|| not_bound(reconciler))?;
        reconciler.delete(&id).await?;
        *self = Self::Absent;
        Ok(())
    }

    async fn create<D: Dispatch>(
        &mut self,
        reconciler: &Reconciler<E, D>,
        desired: &E,
    ) -> Result<(), RestError> {
        let created = reconciler.create(desired).await?;
        let id = reconciler
            .identity_of(&created)?
            .ok_or_else(|| RestError::MissingIdentity {
                kind: reconciler.kind().name.clone(),
            })?;
        *self = Self::Bound {
            id,
            last_known: created,
        };
        Ok(())
    }

    fn snapshot(&self) -> Option<(Identity, E)> {
        match self {
            Self::Bound { id, last_known } => Some((id.clone(), last_known.clone())),
            Self::Absent => None,
        }
    }

    fn last_known_or_unbound<D: Dispatch>(
        &self,
        reconciler: &Reconciler<E, D>,
    ) -> Result<&E, RestError> {
        self.last_known().ok_or_else(|| not_bound(reconciler))
    }
}

fn not_bound<E: Entity, D: Dispatch>(reconciler: &Reconciler<E, D>) -> RestError {
    RestError::NotBound {
        kind: reconciler.kind().name.clone(),
    }
}
