//! Resource Access Gate.
//!
//! Resolves who owns a farm record or file and applies `policy::can_access`.

use std::sync::Arc;

use fl_core::policy::{self, AccessMode};
use fl_core::{Actor, AppError, ResourceRef, ResourceRepo, Result, Role};
use tracing::debug;

#[derive(Clone)]
pub struct AccessGate {
    resources: Arc<dyn ResourceRepo>,
}

impl AccessGate {
    pub fn new(resources: Arc<dyn ResourceRepo>) -> Self {
        Self { resources }
    }

    /// Eligibility of `actor` for `resource`. Unknown resources are `NotFound`.
    ///
    /// USER is refused before the store is consulted, so the answer does not
    /// leak whether the resource exists.
    pub async fn can_access(&self, actor: &Actor, resource: ResourceRef, mode: AccessMode) -> Result<bool> {
        if actor.role == Role::User {
            return Ok(false);
        }
        let owner = self
            .resources
            .resource_owner(resource)
            .await?
            .ok_or_else(|| AppError::not_found(resource.kind.as_str(), resource.id))?;
        Ok(policy::can_access(actor, &owner, mode))
    }

    /// Like `can_access`, but a denial becomes `Forbidden`.
    pub async fn authorize(&self, actor: &Actor, resource: ResourceRef, mode: AccessMode) -> Result<()> {
        if self.can_access(actor, resource, mode).await? {
            Ok(())
        } else {
            debug!(actor = %actor.id, role = %actor.role, %resource, ?mode, "access denied");
            Err(AppError::forbidden(format!("no {mode:?} access to {resource}").to_lowercase()))
        }
    }
}
