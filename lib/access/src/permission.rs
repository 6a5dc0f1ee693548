//! Permission vocabulary and the per-session permission table.
//!
//! Each [`PermissionKind`] owns an independent namespace of target strings
//! (`"order:read"`, `"order:total"`, `"orders.browse"`) mapped to an
//! integer access level. Higher levels imply lower ones: a check for level
//! `n` passes when the stored level is `>= n`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// Delimiter between the parts of a composite permission target.
pub const TARGET_DELIMITER: char = ':';

/// Level that allows an operation.
pub const PERMIT: i32 = 1;

/// Level that denies an operation.
pub const DENY: i32 = 0;

/// Category of protectable resource.
///
/// Each kind has its own target namespace; the same target string under
/// two kinds names two unrelated permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    /// Opening a screen, keyed by screen id.
    Screen,
    /// An operation on an entity type, keyed by `"entity:op"`.
    EntityOperation,
    /// Access to an entity attribute, keyed by `"entity:attribute"`.
    EntityAttribute,
    /// A named application-specific permission.
    Specific,
    /// A UI component inside a screen, keyed by `"screen:component"`.
    Ui,
}

impl PermissionKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Screen,
        Self::EntityOperation,
        Self::EntityAttribute,
        Self::Specific,
        Self::Ui,
    ];

    /// Returns the stable name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::EntityOperation => "entity_operation",
            Self::EntityAttribute => "entity_attribute",
            Self::Specific => "specific",
            Self::Ui => "ui",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operation on an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityOp {
    /// Create new instances.
    Create,
    /// Load instances.
    Read,
    /// Change existing instances.
    Update,
    /// Remove instances.
    Delete,
}

impl EntityOp {
    /// Returns the target suffix for this operation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for EntityOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Access level for an entity attribute.
///
/// Levels are ordered: `Modify` implies `View`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityAttrAccess {
    Deny,
    View,
    Modify,
}

impl EntityAttrAccess {
    /// Returns the integer level stored in the permission table.
    #[must_use]
    pub const fn level(&self) -> i32 {
        match self {
            Self::Deny => 0,
            Self::View => 1,
            Self::Modify => 2,
        }
    }

    /// Maps a stored level back to an access value, if it is one.
    #[must_use]
    pub fn from_level(level: i32) -> Option<Self> {
        match level {
            0 => Some(Self::Deny),
            1 => Some(Self::View),
            2 => Some(Self::Modify),
            _ => None,
        }
    }
}

/// Builds a composite target from two parts joined by [`TARGET_DELIMITER`].
#[must_use]
pub fn compose_target(scope: &str, name: &str) -> String {
    format!("{scope}{TARGET_DELIMITER}{name}")
}

/// Builds the `EntityOperation` target for `op` on `entity`.
#[must_use]
pub fn entity_op_target(entity: &str, op: EntityOp) -> String {
    compose_target(entity, op.as_str())
}

/// Builds the `EntityAttribute` target for `attribute` of `entity`.
#[must_use]
pub fn entity_attr_target(entity: &str, attribute: &str) -> String {
    compose_target(entity, attribute)
}

/// Per-kind mapping from target string to access level.
///
/// Grants only ever widen: a grant never lowers an existing level. Revoking
/// is the only way to take a level away.
#[derive(Debug, Default)]
pub struct PermissionTable {
    entries: RwLock<HashMap<PermissionKind, HashMap<String, i32>>>,
}

impl PermissionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `value` on `target` and, when given, on `alias`.
    ///
    /// Each entry keeps the greater of its current level and `value`. Both
    /// entries are written under one lock acquisition, so readers observe
    /// either neither or both.
    pub fn grant(&self, kind: PermissionKind, target: &str, alias: Option<&str>, value: i32) {
        let mut entries = self.entries.write();
        let targets = entries.entry(kind).or_default();

        widen(targets, target, value);
        if let Some(alias) = alias {
            widen(targets, alias, value);
        }

        debug!(%kind, resource = target, alias, value, "permission granted");
    }

    /// Removes the entry for `target`. Aliases are left untouched.
    pub fn revoke(&self, kind: PermissionKind, target: &str) {
        let removed = self
            .entries
            .write()
            .get_mut(&kind)
            .and_then(|targets| targets.remove(target));

        debug!(%kind, resource = target, removed = removed.is_some(), "permission revoked");
    }

    /// Returns the level stored for `target`, if any.
    #[must_use]
    pub fn value_of(&self, kind: PermissionKind, target: &str) -> Option<i32> {
        self.entries
            .read()
            .get(&kind)
            .and_then(|targets| targets.get(target).copied())
    }

    /// Returns a point-in-time copy of every entry of `kind`.
    #[must_use]
    pub fn snapshot_for(&self, kind: PermissionKind) -> BTreeMap<String, i32> {
        self.entries
            .read()
            .get(&kind)
            .map(|targets| {
                targets
                    .iter()
                    .map(|(target, value)| (target.clone(), *value))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns a point-in-time copy of the whole table, omitting empty kinds.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<PermissionKind, BTreeMap<String, i32>> {
        self.entries
            .read()
            .iter()
            .filter(|(_, targets)| !targets.is_empty())
            .map(|(kind, targets)| {
                let targets = targets
                    .iter()
                    .map(|(target, value)| (target.clone(), *value))
                    .collect();
                (*kind, targets)
            })
            .collect()
    }

    /// Rebuilds a table from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: BTreeMap<PermissionKind, BTreeMap<String, i32>>) -> Self {
        let entries = snapshot
            .into_iter()
            .map(|(kind, targets)| (kind, targets.into_iter().collect()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }
}

fn widen(targets: &mut HashMap<String, i32>, target: &str, value: i32) {
    targets
        .entry(target.to_string())
        .and_modify(|current| *current = (*current).max(value))
        .or_insert(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_has_no_values() {
        let table = PermissionTable::new();
        assert_eq!(table.value_of(PermissionKind::Screen, "orders.browse"), None);
        assert!(table.snapshot_for(PermissionKind::Screen).is_empty());
    }

    #[test]
    fn grant_with_alias_writes_both_targets() {
        let table = PermissionTable::new();
        table.grant(PermissionKind::EntityAttribute, "A", Some("B"), 5);

        assert_eq!(table.value_of(PermissionKind::EntityAttribute, "A"), Some(5));
        assert_eq!(table.value_of(PermissionKind::EntityAttribute, "B"), Some(5));
    }

    #[test]
    fn lower_grant_does_not_downgrade() {
        let table = PermissionTable::new();
        table.grant(PermissionKind::EntityAttribute, "A", Some("B"), 5);
        table.grant(PermissionKind::EntityAttribute, "A", None, 2);

        assert_eq!(table.value_of(PermissionKind::EntityAttribute, "A"), Some(5));
        assert_eq!(table.value_of(PermissionKind::EntityAttribute, "B"), Some(5));
    }

    #[test]
    fn alias_widens_independently_with_the_same_value() {
        let table = PermissionTable::new();
        table.grant(PermissionKind::EntityAttribute, "B", None, 7);
        table.grant(PermissionKind::EntityAttribute, "A", Some("B"), 3);

        assert_eq!(table.value_of(PermissionKind::EntityAttribute, "A"), Some(3));
        assert_eq!(table.value_of(PermissionKind::EntityAttribute, "B"), Some(7));
    }

    #[test]
    fn kinds_have_separate_namespaces() {
        let table = PermissionTable::new();
        table.grant(PermissionKind::Screen, "orders", None, DENY);

        assert_eq!(table.value_of(PermissionKind::Screen, "orders"), Some(DENY));
        assert_eq!(table.value_of(PermissionKind::Specific, "orders"), None);
    }

    #[test]
    fn revoke_leaves_alias_in_place() {
        let table = PermissionTable::new();
        table.grant(PermissionKind::EntityAttribute, "A", Some("B"), 1);
        table.revoke(PermissionKind::EntityAttribute, "A");

        assert_eq!(table.value_of(PermissionKind::EntityAttribute, "A"), None);
        assert_eq!(table.value_of(PermissionKind::EntityAttribute, "B"), Some(1));
    }

    #[test]
    fn revoke_missing_target_is_noop() {
        let table = PermissionTable::new();
        table.revoke(PermissionKind::Ui, "nothing");
        assert!(table.snapshot().is_empty());
    }

    #[test]
    fn snapshot_is_detached_from_table() {
        let table = PermissionTable::new();
        table.grant(PermissionKind::Specific, "reports.export", None, PERMIT);

        let mut snapshot = table.snapshot_for(PermissionKind::Specific);
        snapshot.insert("injected".to_string(), PERMIT);

        assert_eq!(table.value_of(PermissionKind::Specific, "injected"), None);
    }

    #[test]
    fn from_snapshot_restores_entries() {
        let table = PermissionTable::new();
        table.grant(PermissionKind::Screen, "orders", None, PERMIT);
        table.grant(PermissionKind::EntityOperation, "order:delete", None, DENY);

        let restored = PermissionTable::from_snapshot(table.snapshot());
        assert_eq!(restored.snapshot(), table.snapshot());
    }

    #[test]
    fn target_builders_use_delimiter() {
        assert_eq!(entity_op_target("order", EntityOp::Read), "order:read");
        assert_eq!(entity_attr_target("order", "total"), "order:total");
    }

    #[test]
    fn attr_access_levels_are_ordered() {
        assert!(EntityAttrAccess::Modify > EntityAttrAccess::View);
        assert_eq!(EntityAttrAccess::from_level(2), Some(EntityAttrAccess::Modify));
        assert_eq!(EntityAttrAccess::from_level(9), None);
    }

    #[test]
    fn kind_serialization_format() {
        let json = serde_json::to_string(&PermissionKind::EntityOperation).expect("serialize");
        assert_eq!(json, "\"entity_operation\"");
    }
}
