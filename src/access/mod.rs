//! Role and permission resolution.
//!
//! | Module      | Responsibility                                         |
//! |-------------|--------------------------------------------------------|
//! | `catalog`   | Role → `CapabilitySet` table                           |
//! | `resolver`  | Effective role from site, creator and project sources  |
//! | `evaluator` | `PermissionEvaluator` checks used by the board engine  |
//!
//! The actor is always passed in explicitly; nothing here reads ambient
//! session state. Whether the actor is a member of the site at all is
//! decided by a [`MembershipLookup`] before any of this is consulted.

pub mod catalog;
pub mod evaluator;
pub mod resolver;

use async_trait::async_trait;
use tracker_common::{Actor, ActorId, Role, SiteId};

pub use catalog::{Capability, CapabilitySet, capabilities_of};
pub use evaluator::PermissionEvaluator;
pub use resolver::{Resolution, RoleContext, RoleSource, effective_role, resolve};

/// Identity and site-membership lookups provided by the auth service.
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    async fn current_actor(&self) -> anyhow::Result<Option<Actor>>;

    /// `None` means the actor is not a member of the site.
    async fn site_membership_role(
        &self,
        site_id: SiteId,
        actor_id: ActorId,
    ) -> anyhow::Result<Option<Role>>;
}
