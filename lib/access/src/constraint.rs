//! Row-level constraints and the per-session constraint index.
//!
//! A constraint restricts which instances of one entity type the session may
//! see or change. The clauses are opaque here: query builders and in-memory
//! checkers interpret them, the index only stores and hands them out.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tollgate_core::{ConstraintId, Result};
use tracing::debug;

use crate::error::ConstraintError;

/// Operation a constraint applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOperation {
    /// Creating new instances.
    Create,
    /// Loading instances.
    #[default]
    Read,
    /// Changing existing instances.
    Update,
    /// Removing instances.
    Delete,
    /// A caller-defined operation identified by the constraint code.
    Custom,
    /// Every operation.
    All,
}

/// Where a constraint can be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    /// Spliced into generated queries.
    #[default]
    Database,
    /// Evaluated against loaded instances.
    Memory,
    /// Both of the above.
    DatabaseAndMemory,
}

impl CheckType {
    /// Returns true if the constraint can be applied to a query.
    #[must_use]
    pub fn in_database(&self) -> bool {
        matches!(self, Self::Database | Self::DatabaseAndMemory)
    }

    /// Returns true if the constraint can be applied to loaded instances.
    #[must_use]
    pub fn in_memory(&self) -> bool {
        matches!(self, Self::Memory | Self::DatabaseAndMemory)
    }
}

/// A row-level filter rule bound to one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    id: ConstraintId,
    entity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default)]
    operation: ConstraintOperation,
    #[serde(default)]
    check_type: CheckType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    where_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    script: Option<String>,
}

impl Constraint {
    /// Creates a read constraint with a fresh ID and no clauses.
    #[must_use]
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self::with_id(ConstraintId::new(), entity_name)
    }

    /// Creates a read constraint with the given ID and no clauses.
    ///
    /// Use this when reconstituting constraints from storage.
    #[must_use]
    pub fn with_id(id: ConstraintId, entity_name: impl Into<String>) -> Self {
        Self {
            id,
            entity_name: entity_name.into(),
            code: None,
            operation: ConstraintOperation::default(),
            check_type: CheckType::default(),
            join_clause: None,
            where_clause: None,
            script: None,
        }
    }

    /// Sets the code used to look up custom constraints.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the operation this constraint applies to.
    #[must_use]
    pub fn with_operation(mut self, operation: ConstraintOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Sets where this constraint is evaluated.
    #[must_use]
    pub fn with_check_type(mut self, check_type: CheckType) -> Self {
        self.check_type = check_type;
        self
    }

    /// Sets the join clause spliced into generated queries.
    #[must_use]
    pub fn with_join_clause(mut self, clause: impl Into<String>) -> Self {
        self.join_clause = Some(clause.into());
        self
    }

    /// Sets the where clause spliced into generated queries.
    #[must_use]
    pub fn with_where_clause(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    /// Sets the script evaluated against loaded instances.
    #[must_use]
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Returns the constraint ID.
    #[must_use]
    pub fn id(&self) -> ConstraintId {
        self.id
    }

    /// Returns the name of the constrained entity.
    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Returns the custom constraint code, if set.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Returns the operation this constraint applies to.
    #[must_use]
    pub fn operation(&self) -> ConstraintOperation {
        self.operation
    }

    /// Returns where this constraint is evaluated.
    #[must_use]
    pub fn check_type(&self) -> CheckType {
        self.check_type
    }

    /// Returns the join clause, if set.
    #[must_use]
    pub fn join_clause(&self) -> Option<&str> {
        self.join_clause.as_deref()
    }

    /// Returns the where clause, if set.
    #[must_use]
    pub fn where_clause(&self) -> Option<&str> {
        self.where_clause.as_deref()
    }

    /// Returns the in-memory script, if set.
    #[must_use]
    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    /// Checks that the constraint can be indexed.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::MissingEntityName`] for a blank entity name.
    pub fn validate(&self) -> std::result::Result<(), ConstraintError> {
        if self.entity_name.trim().is_empty() {
            return Err(ConstraintError::MissingEntityName { id: self.id });
        }
        Ok(())
    }
}

/// Multimap from entity name to that entity's constraints, in insertion order.
#[derive(Debug, Default)]
pub struct ConstraintIndex {
    entries: RwLock<BTreeMap<String, Vec<Constraint>>>,
}

impl ConstraintIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `constraint` to its entity's list.
    ///
    /// # Errors
    ///
    /// Rejects constraints without an entity name.
    pub fn add(&self, constraint: Constraint) -> Result<(), ConstraintError> {
        constraint.validate()?;

        debug!(
            constraint_id = %constraint.id,
            entity = %constraint.entity_name,
            "constraint added"
        );
        self.entries
            .write()
            .entry(constraint.entity_name.clone())
            .or_default()
            .push(constraint);
        Ok(())
    }

    /// Removes every constraint under `entity_name` whose ID is `id`.
    ///
    /// Returns the number of constraints removed; the rest keep their order.
    pub fn remove_by_identity(&self, entity_name: &str, id: ConstraintId) -> usize {
        let mut entries = self.entries.write();
        let Some(list) = entries.get_mut(entity_name) else {
            return 0;
        };

        let before = list.len();
        list.retain(|c| c.id != id);
        let removed = before - list.len();
        if list.is_empty() {
            entries.remove(entity_name);
        }

        debug!(constraint_id = %id, entity = entity_name, removed, "constraint removed");
        removed
    }

    /// Returns true if any constraint is bound to `entity_name`.
    #[must_use]
    pub fn has_any_for(&self, entity_name: &str) -> bool {
        self.entries
            .read()
            .get(entity_name)
            .is_some_and(|list| !list.is_empty())
    }

    /// Returns true if the index holds any constraint at all.
    #[must_use]
    pub fn has_any(&self) -> bool {
        self.entries.read().values().any(|list| !list.is_empty())
    }

    /// Returns a copy of the constraints for `entity_name`, in insertion order.
    #[must_use]
    pub fn list_for(&self, entity_name: &str) -> Vec<Constraint> {
        self.list_matching(entity_name, |_| true)
    }

    /// Returns a copy of the constraints for `entity_name` that satisfy
    /// `predicate`, in insertion order.
    ///
    /// The predicate runs after the lock is released, so it may call back
    /// into the index.
    #[must_use]
    pub fn list_matching<P>(&self, entity_name: &str, predicate: P) -> Vec<Constraint>
    where
        P: Fn(&Constraint) -> bool,
    {
        let list = self.entries.read().get(entity_name).cloned().unwrap_or_default();
        list.into_iter().filter(|c| predicate(c)).collect()
    }

    /// Rebuilds an index from a snapshot, keeping the snapshot's order.
    ///
    /// # Errors
    ///
    /// Fails on the first constraint without an entity name.
    pub fn from_snapshot(
        constraints: Vec<Constraint>,
    ) -> std::result::Result<Self, ConstraintError> {
        let mut entries: BTreeMap<String, Vec<Constraint>> = BTreeMap::new();
        for constraint in constraints {
            constraint.validate()?;
            entries
                .entry(constraint.entity_name.clone())
                .or_default()
                .push(constraint);
        }
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }

    /// Returns every constraint, grouped by entity name and in insertion
    /// order within each entity.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Constraint> {
        self.entries.read().values().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[Constraint]) -> Vec<ConstraintId> {
        list.iter().map(Constraint::id).collect()
    }

    #[test]
    fn empty_index_reports_nothing() {
        let index = ConstraintIndex::new();
        assert!(!index.has_any());
        assert!(!index.has_any_for("Order"));
        assert!(index.list_for("Order").is_empty());
    }

    #[test]
    fn add_preserves_insertion_order() {
        let index = ConstraintIndex::new();
        let first = Constraint::new("Order").with_where_clause("{E}.total > 0");
        let second = Constraint::new("Order").with_where_clause("{E}.region = :session$region");
        index.add(first.clone()).expect("add");
        index.add(second.clone()).expect("add");

        assert_eq!(index.list_for("Order"), vec![first, second]);
        assert!(index.has_any_for("Order"));
        assert!(!index.has_any_for("Customer"));
        assert!(index.has_any());
    }

    #[test]
    fn remove_by_identity_keeps_others_in_order() {
        let index = ConstraintIndex::new();
        let constraints: Vec<_> = (0..3).map(|_| Constraint::new("Order")).collect();
        for c in &constraints {
            index.add(c.clone()).expect("add");
        }

        let removed = index.remove_by_identity("Order", constraints[1].id());
        assert_eq!(removed, 1);
        assert_eq!(
            ids(&index.list_for("Order")),
            vec![constraints[0].id(), constraints[2].id()]
        );
    }

    #[test]
    fn remove_unknown_identity_is_noop() {
        let index = ConstraintIndex::new();
        let kept = Constraint::new("Order");
        index.add(kept.clone()).expect("add");

        assert_eq!(index.remove_by_identity("Order", ConstraintId::new()), 0);
        assert_eq!(index.remove_by_identity("Customer", kept.id()), 0);
        assert_eq!(index.list_for("Order"), vec![kept]);
    }

    #[test]
    fn removing_last_constraint_clears_entity() {
        let index = ConstraintIndex::new();
        let only = Constraint::new("Order");
        index.add(only.clone()).expect("add");
        index.remove_by_identity("Order", only.id());

        assert!(!index.has_any_for("Order"));
        assert!(!index.has_any());
    }

    #[test]
    fn list_matching_filters_in_order() {
        let index = ConstraintIndex::new();
        let db = Constraint::new("Order").with_check_type(CheckType::Database);
        let mem = Constraint::new("Order").with_check_type(CheckType::Memory);
        let both = Constraint::new("Order").with_check_type(CheckType::DatabaseAndMemory);
        for c in [&db, &mem, &both] {
            index.add(c.clone()).expect("add");
        }

        let in_db = index.list_matching("Order", |c| c.check_type().in_database());
        assert_eq!(ids(&in_db), vec![db.id(), both.id()]);

        let in_memory = index.list_matching("Order", |c| c.check_type().in_memory());
        assert_eq!(ids(&in_memory), vec![mem.id(), both.id()]);
    }

    #[test]
    fn predicate_may_write_to_the_index() {
        let index = ConstraintIndex::new();
        index.add(Constraint::new("Order")).expect("add");
        index.add(Constraint::new("Order")).expect("add");

        let matched =
            index.list_matching("Order", |_| index.add(Constraint::new("Audit")).is_ok());

        assert_eq!(matched.len(), 2);
        assert_eq!(index.list_for("Audit").len(), 2);
        assert_eq!(index.list_for("Order").len(), 2);
    }

    #[test]
    fn returned_list_is_detached() {
        let index = ConstraintIndex::new();
        index.add(Constraint::new("Order")).expect("add");

        let mut list = index.list_for("Order");
        list.clear();
        list.push(Constraint::new("Order"));
        list.push(Constraint::new("Order"));

        assert_eq!(index.list_for("Order").len(), 1);
    }

    #[test]
    fn blank_entity_name_is_rejected() {
        let index = ConstraintIndex::new();
        let blank = Constraint::new("  ");

        assert_eq!(
            blank.validate(),
            Err(ConstraintError::MissingEntityName { id: blank.id() })
        );
        assert!(index.add(blank).is_err());
        assert!(!index.has_any());
    }

    #[test]
    fn constraint_serialization_omits_unset_clauses() {
        let constraint = Constraint::new("Order").with_operation(ConstraintOperation::Update);
        let json = serde_json::to_value(&constraint).expect("serialize");

        assert_eq!(json["entity_name"], "Order");
        assert_eq!(json["operation"], "update");
        assert!(json.get("where_clause").is_none());

        let parsed: Constraint = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, constraint);
    }
}
