//! Session-scoped authorization for tollgate.
//!
//! This crate provides:
//! - The per-session permission table (`PermissionTable`, `PermissionKind`)
//! - Role categories and their overrides (`RoleCategory`, `RoleTypeResolver`)
//! - Row-level constraints (`Constraint`, `ConstraintIndex`)
//! - Two-tier session attributes (`DurableAttributes`, `LocalAttributes`)
//! - The authorization session tying them together (`AuthorizationSession`)
//!
//! # Decision model
//!
//! A super role permits everything. Otherwise a target's stored level is
//! raised by role-category overrides and compared to the required level.
//! A target nobody has configured is **permitted**: the engine is
//! default-allow, and default-deny has to be expressed with explicit
//! denials or a denying role.
//!
//! # Example
//!
//! ```
//! use tollgate_access::{
//!     AuthorizationSession, Constraint, EntityOp, PermissionKind, Principal, Role,
//!     RoleCategory, RoleSet, DENY,
//! };
//! use tollgate_core::{SessionId, UserId};
//!
//! let session = AuthorizationSession::builder()
//!     .id(SessionId::new())
//!     .principal(Principal::new(UserId::new(), "alice"))
//!     .roles(RoleSet::from_roles([Role::new("auditor", RoleCategory::ReadOnly)]))
//!     .build()
//!     .expect("valid session");
//!
//! session.add_permission(PermissionKind::Screen, "orders.browse", None, DENY);
//! assert!(!session.is_screen_permitted("orders.browse"));
//! assert!(session.is_screen_permitted("customers.browse"));
//! assert!(session.is_entity_op_permitted("order", EntityOp::Read));
//! assert!(!session.is_entity_op_permitted("order", EntityOp::Update));
//!
//! session
//!     .add_constraint(Constraint::new("order").with_where_clause("{E}.region = 'emea'"))
//!     .expect("valid constraint");
//! assert_eq!(session.constraints("order").len(), 1);
//! ```

pub mod attributes;
pub mod config;
pub mod constraint;
pub mod error;
pub mod permission;
pub mod principal;
pub mod request_scope;
pub mod role;
pub mod session;

// Re-export main types at crate root
pub use attributes::{DurableAttributes, LocalAttributes, LocalValue};
pub use config::{AccessConfig, RoleMapping};
pub use constraint::{CheckType, Constraint, ConstraintIndex, ConstraintOperation};
pub use error::{ConstraintError, SessionError};
pub use permission::{
    DENY, EntityAttrAccess, EntityOp, PERMIT, PermissionKind, PermissionTable, TARGET_DELIMITER,
    compose_target, entity_attr_target, entity_op_target,
};
pub use principal::Principal;
pub use request_scope::{RequestOverrides, RequestScope, RequestValues};
pub use role::{Role, RoleCategory, RoleSet, RoleTypeResolver, StaticRoleRules};
pub use session::{
    AccessContext, AuthorizationSession, SessionBuilder, SessionEnvironment, SessionSnapshot,
    USER_ID_ATTRIBUTE, USER_LOGIN_ATTRIBUTE,
};
