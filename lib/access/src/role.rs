//! Roles, role categories, and category-driven permission overrides.
//!
//! Every granted role carries a [`RoleCategory`]. Categories adjust the
//! permission table's answer without being stored in it. Overrides only ever
//! raise the stored level: a read-only role supplies read-level defaults for
//! entity targets, a denying role turns unset targets into explicit denials,
//! and a super role bypasses checks entirely.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::RoleMapping;
use crate::permission::{DENY, EntityAttrAccess, EntityOp, PERMIT, PermissionKind, TARGET_DELIMITER};

/// Built-in category attached to a granted role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleCategory {
    /// Permissions come from the permission table only.
    #[default]
    Standard,
    /// Every permission check passes.
    Super,
    /// Supplies read-level defaults for entity targets.
    ReadOnly,
    /// Anything not explicitly granted is denied.
    Denying,
}

impl RoleCategory {
    /// Returns true if this category bypasses permission checks.
    #[must_use]
    pub fn is_super(&self) -> bool {
        matches!(self, Self::Super)
    }

    /// Returns the stable name of this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Super => "super",
            Self::ReadOnly => "readonly",
            Self::Denying => "denying",
        }
    }
}

impl fmt::Display for RoleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Computes category-driven override levels.
///
/// Implementations must be pure in-memory lookups: the session calls the
/// resolver once per attached category on every permission check.
pub trait RoleTypeResolver: Send + Sync {
    /// Returns the level `category` imposes on `target`, or `None` when the
    /// category has no opinion.
    fn override_value(
        &self,
        category: RoleCategory,
        kind: PermissionKind,
        target: &str,
    ) -> Option<i32>;
}

/// The built-in rules for each [`RoleCategory`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRoleRules;

impl RoleTypeResolver for StaticRoleRules {
    fn override_value(
        &self,
        category: RoleCategory,
        kind: PermissionKind,
        target: &str,
    ) -> Option<i32> {
        match category {
            // Super is answered before the resolver is consulted.
            RoleCategory::Standard | RoleCategory::Super => None,
            RoleCategory::ReadOnly => match kind {
                PermissionKind::EntityOperation => Some(if is_read_target(target) {
                    PERMIT
                } else {
                    DENY
                }),
                PermissionKind::EntityAttribute => Some(EntityAttrAccess::View.level()),
                PermissionKind::Screen | PermissionKind::Specific | PermissionKind::Ui => None,
            },
            RoleCategory::Denying => Some(DENY),
        }
    }
}

fn is_read_target(target: &str) -> bool {
    target
        .rsplit_once(TARGET_DELIMITER)
        .is_some_and(|(_, op)| op == EntityOp::Read.as_str())
}

/// A role granted to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    name: String,
    category: RoleCategory,
}

impl Role {
    /// Creates a role with the given name and category.
    #[must_use]
    pub fn new(name: impl Into<String>, category: RoleCategory) -> Self {
        Self {
            name: name.into(),
            category,
        }
    }

    /// Creates a role with the standard category.
    #[must_use]
    pub fn standard(name: impl Into<String>) -> Self {
        Self::new(name, RoleCategory::Standard)
    }

    /// Returns the role name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the role category.
    #[must_use]
    pub fn category(&self) -> RoleCategory {
        self.category
    }
}

/// Set of roles granted to a principal, unique by name.
///
/// Serialized as a list of roles; duplicates are dropped on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Role>", into = "Vec<Role>")]
pub struct RoleSet {
    roles: Vec<Role>,
}

impl RoleSet {
    /// Creates an empty role set.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a role set from roles, keeping the first role of each name.
    #[must_use]
    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut set = Self::none();
        for role in roles {
            set.insert(role);
        }
        set
    }

    /// Creates a role set from role names, categorising them with `mapping`.
    ///
    /// Names the mapping does not mention become standard roles.
    #[must_use]
    pub fn from_names(names: &[String], mapping: &RoleMapping) -> Self {
        Self::from_roles(
            names
                .iter()
                .map(|name| Role::new(name.as_str(), mapping.category_of(name))),
        )
    }

    /// Adds a role unless one with the same name is already present.
    ///
    /// Returns true if the role was added.
    pub fn insert(&mut self, role: Role) -> bool {
        if self.roles.iter().any(|r| r.name == role.name) {
            return false;
        }
        self.roles.push(role);
        true
    }

    /// Returns the distinct categories attached to the roles.
    #[must_use]
    pub fn categories(&self) -> BTreeSet<RoleCategory> {
        self.roles.iter().map(Role::category).collect()
    }

    /// Returns the role names in grant order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    /// Returns true if any role is a super role.
    #[must_use]
    pub fn is_super(&self) -> bool {
        self.roles.iter().any(|r| r.category.is_super())
    }

    /// Returns the roles as a slice.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Returns true if no roles are granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl From<Vec<Role>> for RoleSet {
    fn from(roles: Vec<Role>) -> Self {
        Self::from_roles(roles)
    }
}

impl From<RoleSet> for Vec<Role> {
    fn from(set: RoleSet) -> Self {
        set.roles
    }
}
