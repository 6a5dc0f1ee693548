//! The authorization session.
//!
//! An [`AuthorizationSession`] is built once at login and then shared by
//! every request the user makes. It answers permission checks, hands out
//! row-level constraints, and carries session attributes. All methods take
//! `&self`; each underlying structure synchronizes itself, so a session is
//! normally held in an `Arc` by the session registry.
//!
//! # Permission precedence
//!
//! 1. A session holding a [`RoleCategory::Super`] role is permitted
//!    everything.
//! 2. Otherwise the level stored in the permission table is raised to the
//!    highest override any attached role category yields.
//! 3. The check passes when no level is known at all, or the level is at
//!    least the required value.
//!
//! Step 3 makes unknown targets **permitted**. Callers that need
//! default-deny must grant an explicit [`DENY`](crate::permission::DENY) or
//! attach a [`RoleCategory::Denying`] role.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tollgate_core::{Result, SessionId};
use tracing::{debug, instrument, trace};

use crate::attributes::{DurableAttributes, LocalAttributes, LocalValue};
use crate::constraint::{Constraint, ConstraintIndex};
use crate::error::{ConstraintError, SessionError};
use crate::permission::{
    EntityAttrAccess, EntityOp, PERMIT, PermissionKind, PermissionTable, compose_target,
    entity_attr_target, entity_op_target,
};
use crate::principal::Principal;
use crate::request_scope::RequestScope;
use crate::role::{RoleCategory, RoleSet, RoleTypeResolver, StaticRoleRules};

/// Attribute name resolving to the current-or-substituted user's ID.
pub const USER_ID_ATTRIBUTE: &str = "userId";

/// Attribute name resolving to the current-or-substituted user's login,
/// folded to lower case.
pub const USER_LOGIN_ATTRIBUTE: &str = "userLogin";

/// Collaborators a session consults while answering questions.
#[derive(Clone)]
pub struct AccessContext {
    resolver: Arc<dyn RoleTypeResolver>,
    request_scope: Option<Arc<dyn RequestScope>>,
}

impl AccessContext {
    /// Creates a context with the given role resolver and no request scope.
    #[must_use]
    pub fn new(resolver: Arc<dyn RoleTypeResolver>) -> Self {
        Self {
            resolver,
            request_scope: None,
        }
    }

    /// Attaches a request-scope override source.
    #[must_use]
    pub fn with_request_scope(mut self, scope: Arc<dyn RequestScope>) -> Self {
        self.request_scope = Some(scope);
        self
    }
}

impl Default for AccessContext {
    fn default() -> Self {
        Self::new(Arc::new(StaticRoleRules))
    }
}

impl fmt::Debug for AccessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessContext")
            .field("request_scope", &self.request_scope.is_some())
            .finish_non_exhaustive()
    }
}

/// Environment values stored on the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEnvironment {
    /// Locale tag used for messages and formatting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// IANA timezone name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Client network address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Client description, such as a user agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<String>,
}

/// Builder for [`AuthorizationSession`].
#[derive(Debug, Default)]
pub struct SessionBuilder {
    id: Option<SessionId>,
    principal: Option<Principal>,
    roles: RoleSet,
    environment: SessionEnvironment,
    system: bool,
    context: AccessContext,
}

impl SessionBuilder {
    /// Sets the session ID.
    #[must_use]
    pub fn id(mut self, id: SessionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the authenticated principal.
    #[must_use]
    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Sets the granted roles.
    #[must_use]
    pub fn roles(mut self, roles: RoleSet) -> Self {
        self.roles = roles;
        self
    }

    /// Sets the session locale. Defaults to the principal's preference.
    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.environment.locale = Some(locale.into());
        self
    }

    /// Sets the session timezone. Defaults to the principal's preference.
    #[must_use]
    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.environment.timezone = Some(timezone.into());
        self
    }

    /// Sets the client address.
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.environment.address = Some(address.into());
        self
    }

    /// Sets the client description.
    #[must_use]
    pub fn client_info(mut self, client_info: impl Into<String>) -> Self {
        self.environment.client_info = Some(client_info.into());
        self
    }

    /// Marks the session as belonging to an internal system process.
    #[must_use]
    pub fn system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    /// Sets the collaborators the session consults.
    #[must_use]
    pub fn context(mut self, context: AccessContext) -> Self {
        self.context = context;
        self
    }

    /// Builds the session.
    ///
    /// # Errors
    ///
    /// Fails if the session ID is missing or nil, the principal is missing,
    /// or the principal's login is blank.
    pub fn build(self) -> Result<AuthorizationSession, SessionError> {
        let id = self
            .id
            .filter(|id| !id.is_nil())
            .ok_or(SessionError::MissingSessionId)?;
        let principal = self.principal.ok_or(SessionError::MissingPrincipal)?;
        if principal.login().trim().is_empty() {
            return Err(SessionError::BlankLogin.into());
        }

        let mut environment = self.environment;
        if environment.locale.is_none() {
            environment.locale = principal.locale().map(str::to_string);
        }
        if environment.timezone.is_none() {
            environment.timezone = principal.timezone().map(str::to_string);
        }

        debug!(
            session_id = %id,
            login = principal.login(),
            roles = self.roles.roles().len(),
            "session created"
        );

        Ok(AuthorizationSession {
            id,
            principal,
            substituted: None,
            categories: self.roles.categories(),
            roles: self.roles,
            environment: RwLock::new(environment),
            created_at: Utc::now(),
            system: self.system,
            permissions: Arc::new(PermissionTable::new()),
            constraints: Arc::new(ConstraintIndex::new()),
            attributes: Arc::new(DurableAttributes::new()),
            local_attributes: LocalAttributes::new(),
            context: self.context,
        })
    }
}

/// A principal's resolved permissions, constraints, and attributes.
pub struct AuthorizationSession {
    id: SessionId,
    principal: Principal,
    substituted: Option<Principal>,
    roles: RoleSet,
    categories: BTreeSet<RoleCategory>,
    environment: RwLock<SessionEnvironment>,
    created_at: DateTime<Utc>,
    system: bool,
    permissions: Arc<PermissionTable>,
    constraints: Arc<ConstraintIndex>,
    attributes: Arc<DurableAttributes>,
    local_attributes: LocalAttributes,
    context: AccessContext,
}

impl AuthorizationSession {
    /// Starts building a session.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the authenticated principal, ignoring any substitution.
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns the substituted principal, if the session is impersonating.
    #[must_use]
    pub fn substituted_principal(&self) -> Option<&Principal> {
        self.substituted.as_ref()
    }

    /// Returns the principal the session currently acts for.
    ///
    /// This is the identity to use for auditing and ownership stamping.
    #[must_use]
    pub fn current_or_substituted_principal(&self) -> &Principal {
        self.substituted.as_ref().unwrap_or(&self.principal)
    }

    /// Returns true if the session is impersonating another user.
    #[must_use]
    pub fn is_substituted(&self) -> bool {
        self.substituted.is_some()
    }

    /// Returns the granted roles.
    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Returns the granted role names in grant order.
    #[must_use]
    pub fn role_names(&self) -> Vec<String> {
        self.roles.names()
    }

    /// Returns the distinct categories of the granted roles.
    #[must_use]
    pub fn role_categories(&self) -> &BTreeSet<RoleCategory> {
        &self.categories
    }

    /// Returns true if a super role is attached.
    #[must_use]
    pub fn is_super(&self) -> bool {
        self.categories.contains(&RoleCategory::Super)
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true for sessions of internal system processes.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.system
    }

    // Permissions

    /// Checks `target` against the standard [`PERMIT`] level.
    #[must_use]
    pub fn is_permitted(&self, kind: PermissionKind, target: &str) -> bool {
        self.is_permitted_with(kind, target, PERMIT)
    }

    /// Checks that the effective level of `target` is at least `required`.
    ///
    /// Targets with no stored level and no category override are permitted.
    #[must_use]
    pub fn is_permitted_with(&self, kind: PermissionKind, target: &str, required: i32) -> bool {
        if self.is_super() {
            return true;
        }

        let level = self.effective_level(kind, target);
        let permitted = level.is_none_or(|level| level >= required);
        if !permitted {
            trace!(
                session_id = %self.id,
                %kind,
                resource = target,
                required,
                ?level,
                "permission denied"
            );
        }
        permitted
    }

    /// Stored level raised by the highest category override.
    fn effective_level(&self, kind: PermissionKind, target: &str) -> Option<i32> {
        let stored = self.permissions.value_of(kind, target);
        self.categories
            .iter()
            .filter_map(|category| self.context.resolver.override_value(*category, kind, target))
            .fold(stored, |level, candidate| match level {
                Some(current) if current >= candidate => Some(current),
                _ => Some(candidate),
            })
    }

    /// Checks whether `screen` may be opened.
    #[must_use]
    pub fn is_screen_permitted(&self, screen: &str) -> bool {
        self.is_permitted(PermissionKind::Screen, screen)
    }

    /// Checks whether `op` may be performed on `entity`.
    #[must_use]
    pub fn is_entity_op_permitted(&self, entity: &str, op: EntityOp) -> bool {
        self.is_permitted(PermissionKind::EntityOperation, &entity_op_target(entity, op))
    }

    /// Checks whether `attribute` of `entity` is accessible at `access` level.
    #[must_use]
    pub fn is_entity_attr_permitted(
        &self,
        entity: &str,
        attribute: &str,
        access: EntityAttrAccess,
    ) -> bool {
        self.is_permitted_with(
            PermissionKind::EntityAttribute,
            &entity_attr_target(entity, attribute),
            access.level(),
        )
    }

    /// Returns the access level granted on `attribute` of `entity`.
    #[must_use]
    pub fn entity_attr_access(&self, entity: &str, attribute: &str) -> EntityAttrAccess {
        if self.is_super() {
            return EntityAttrAccess::Modify;
        }
        let target = entity_attr_target(entity, attribute);
        match self.effective_level(PermissionKind::EntityAttribute, &target) {
            None => EntityAttrAccess::Modify,
            Some(level) => EntityAttrAccess::from_level(level.clamp(0, 2))
                .unwrap_or(EntityAttrAccess::Deny),
        }
    }

    /// Checks a named application permission.
    #[must_use]
    pub fn is_specific_permitted(&self, name: &str) -> bool {
        self.is_permitted(PermissionKind::Specific, name)
    }

    /// Checks whether `component` inside `screen` is usable.
    #[must_use]
    pub fn is_ui_permitted(&self, screen: &str, component: &str) -> bool {
        self.is_permitted(PermissionKind::Ui, &compose_target(screen, component))
    }

    /// Grants `value` on `target` (and `alias`, if given) without lowering
    /// any existing level.
    pub fn add_permission(&self, kind: PermissionKind, target: &str, alias: Option<&str>, value: i32) {
        self.permissions.grant(kind, target, alias, value);
    }

    /// Removes the stored level for `target`.
    pub fn remove_permission(&self, kind: PermissionKind, target: &str) {
        self.permissions.revoke(kind, target);
    }

    /// Returns the stored level for `target`, ignoring role categories.
    #[must_use]
    pub fn permission_value(&self, kind: PermissionKind, target: &str) -> Option<i32> {
        self.permissions.value_of(kind, target)
    }

    /// Returns a copy of every stored level of `kind`.
    #[must_use]
    pub fn permissions_of_kind(&self, kind: PermissionKind) -> BTreeMap<String, i32> {
        self.permissions.snapshot_for(kind)
    }

    // Constraints

    /// Returns the constraints for `entity`, in insertion order.
    #[must_use]
    pub fn constraints(&self, entity: &str) -> Vec<Constraint> {
        self.constraints.list_for(entity)
    }

    /// Returns the constraints for `entity` that satisfy `predicate`.
    #[must_use]
    pub fn constraints_matching<P>(&self, entity: &str, predicate: P) -> Vec<Constraint>
    where
        P: Fn(&Constraint) -> bool,
    {
        self.constraints.list_matching(entity, predicate)
    }

    /// Returns true if any constraint is bound to `entity`.
    #[must_use]
    pub fn has_constraints_for(&self, entity: &str) -> bool {
        self.constraints.has_any_for(entity)
    }

    /// Returns true if the session holds any constraint.
    #[must_use]
    pub fn has_constraints(&self) -> bool {
        self.constraints.has_any()
    }

    /// Adds a constraint under its entity name.
    ///
    /// # Errors
    ///
    /// Rejects constraints without an entity name.
    pub fn add_constraint(&self, constraint: Constraint) -> Result<(), ConstraintError> {
        self.constraints.add(constraint)
    }

    /// Removes every constraint with the same entity and ID as `constraint`.
    pub fn remove_constraint(&self, constraint: &Constraint) -> usize {
        self.constraints
            .remove_by_identity(constraint.entity_name(), constraint.id())
    }

    // Attributes

    /// Returns a session attribute.
    ///
    /// [`USER_ID_ATTRIBUTE`] and [`USER_LOGIN_ATTRIBUTE`] are computed from
    /// the current-or-substituted principal and shadow stored values.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Value> {
        let current = self.current_or_substituted_principal();
        match name {
            USER_ID_ATTRIBUTE => serde_json::to_value(current.id()).ok(),
            USER_LOGIN_ATTRIBUTE => Some(Value::String(current.login_lowercase())),
            _ => self.attributes.get(name),
        }
    }

    /// Stores a replicated attribute.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.set(name, value);
    }

    /// Removes a replicated attribute.
    pub fn remove_attribute(&self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Returns the names of the stored replicated attributes.
    #[must_use]
    pub fn attribute_names(&self) -> BTreeSet<String> {
        self.attributes.names()
    }

    /// Returns a process-local attribute.
    #[must_use]
    pub fn local_attribute(&self, name: &str) -> Option<LocalValue> {
        self.local_attributes.get(name)
    }

    /// Returns a process-local attribute if it has type `T`.
    #[must_use]
    pub fn local_attribute_as<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: std::any::Any + Send + Sync,
    {
        self.local_attributes.get_as(name)
    }

    /// Stores a process-local attribute.
    pub fn set_local_attribute<T>(&self, name: impl Into<String>, value: T)
    where
        T: std::any::Any + Send + Sync,
    {
        self.local_attributes.set(name, value);
    }

    /// Removes a process-local attribute.
    pub fn remove_local_attribute(&self, name: &str) -> Option<LocalValue> {
        self.local_attributes.remove(name)
    }

    /// Returns the names of the process-local attributes.
    #[must_use]
    pub fn local_attribute_names(&self) -> BTreeSet<String> {
        self.local_attributes.names()
    }

    // Environment

    /// Returns the locale, preferring the current request's.
    #[must_use]
    pub fn locale(&self) -> Option<String> {
        self.scoped(|scope, id| scope.locale(id))
            .or_else(|| self.environment.read().locale.clone())
    }

    /// Returns the timezone, preferring the current request's.
    #[must_use]
    pub fn timezone(&self) -> Option<String> {
        self.scoped(|scope, id| scope.timezone(id))
            .or_else(|| self.environment.read().timezone.clone())
    }

    /// Returns the client address, preferring the current request's.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        self.scoped(|scope, id| scope.address(id))
            .or_else(|| self.environment.read().address.clone())
    }

    /// Returns the client description, preferring the current request's.
    #[must_use]
    pub fn client_info(&self) -> Option<String> {
        self.scoped(|scope, id| scope.client_info(id))
            .or_else(|| self.environment.read().client_info.clone())
    }

    fn scoped<F>(&self, lookup: F) -> Option<String>
    where
        F: FnOnce(&dyn RequestScope, &SessionId) -> Option<String>,
    {
        self.context
            .request_scope
            .as_deref()
            .and_then(|scope| lookup(scope, &self.id))
    }

    /// Returns the stored environment, without request overrides.
    #[must_use]
    pub fn stored_environment(&self) -> SessionEnvironment {
        self.environment.read().clone()
    }

    /// Replaces the stored locale.
    pub fn set_locale(&self, locale: Option<String>) {
        self.environment.write().locale = locale;
    }

    /// Replaces the stored timezone.
    pub fn set_timezone(&self, timezone: Option<String>) {
        self.environment.write().timezone = timezone;
    }

    /// Replaces the stored client address.
    pub fn set_address(&self, address: Option<String>) {
        self.environment.write().address = address;
    }

    /// Replaces the stored client description.
    pub fn set_client_info(&self, client_info: Option<String>) {
        self.environment.write().client_info = client_info;
    }

    // Substitution

    /// Derives a session acting for `principal` with `roles`.
    ///
    /// The derived session keeps this session's ID and authenticated
    /// principal, and shares its permission table, constraint index, and
    /// replicated attributes: later changes through either session are
    /// visible through both. Role categories come from `roles` alone, and
    /// local attributes start empty. Substituting the authenticated user
    /// yields an unsubstituted session.
    #[must_use]
    #[instrument(skip_all, fields(session_id = %self.id, substitute = principal.login()))]
    pub fn derive_substituted(
        &self,
        principal: Principal,
        roles: RoleSet,
        locale: impl Into<String>,
    ) -> Self {
        let stored = self.stored_environment();
        let environment = SessionEnvironment {
            locale: Some(locale.into()),
            timezone: principal.timezone().map(str::to_string).or(stored.timezone),
            address: stored.address,
            client_info: stored.client_info,
        };
        let substituted = (!principal.is_same_user(&self.principal)).then_some(principal);

        debug!(substituted = substituted.is_some(), "derived session");

        Self {
            id: self.id,
            principal: self.principal.clone(),
            substituted,
            categories: roles.categories(),
            roles,
            environment: RwLock::new(environment),
            created_at: self.created_at,
            system: self.system,
            permissions: Arc::clone(&self.permissions),
            constraints: Arc::clone(&self.constraints),
            attributes: Arc::clone(&self.attributes),
            local_attributes: LocalAttributes::new(),
            context: self.context.clone(),
        }
    }

    // Replication

    /// Captures everything that replicates with the session.
    ///
    /// Local attributes and collaborators are not part of the snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            principal: self.principal.clone(),
            substituted: self.substituted.clone(),
            roles: self.roles.clone(),
            environment: self.stored_environment(),
            created_at: self.created_at,
            system: self.system,
            permissions: self.permissions.snapshot(),
            constraints: self.constraints.snapshot(),
            attributes: self.attributes.snapshot(),
        }
    }

    /// Rebuilds a session from a snapshot with empty local attributes.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot violates a construction invariant or carries a
    /// constraint without an entity name.
    pub fn from_snapshot(
        snapshot: SessionSnapshot,
        context: AccessContext,
    ) -> Result<Self, SessionError> {
        if snapshot.id.is_nil() {
            return Err(SessionError::MissingSessionId.into());
        }
        if snapshot.principal.login().trim().is_empty() {
            return Err(SessionError::BlankLogin.into());
        }
        let constraints = ConstraintIndex::from_snapshot(snapshot.constraints)
            .map_err(|e| SessionError::MalformedConstraint {
                reason: e.to_string(),
            })?;
        let substituted = snapshot
            .substituted
            .filter(|s| !s.is_same_user(&snapshot.principal));

        Ok(Self {
            id: snapshot.id,
            principal: snapshot.principal,
            substituted,
            categories: snapshot.roles.categories(),
            roles: snapshot.roles,
            environment: RwLock::new(snapshot.environment),
            created_at: snapshot.created_at,
            system: snapshot.system,
            permissions: Arc::new(PermissionTable::from_snapshot(snapshot.permissions)),
            constraints: Arc::new(constraints),
            attributes: Arc::new(DurableAttributes::from_snapshot(snapshot.attributes)),
            local_attributes: LocalAttributes::new(),
            context,
        })
    }
}

impl fmt::Display for AuthorizationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.substituted {
            Some(substituted) => write!(
                f,
                "{} [{} / {}]",
                self.id,
                self.principal.login(),
                substituted.login()
            ),
            None => write!(f, "{} [{}]", self.id, self.principal.login()),
        }
    }
}

impl fmt::Debug for AuthorizationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationSession")
            .field("id", &self.id)
            .field("principal", &self.principal)
            .field("substituted", &self.substituted)
            .field("roles", &self.roles)
            .field("system", &self.system)
            .finish_non_exhaustive()
    }
}

/// The replicated form of an [`AuthorizationSession`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session ID.
    pub id: SessionId,
    /// The authenticated user.
    pub principal: Principal,
    /// The user being acted for, if substituted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substituted: Option<Principal>,
    /// Granted roles.
    #[serde(default)]
    pub roles: RoleSet,
    /// Stored environment values.
    #[serde(default)]
    pub environment: SessionEnvironment,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Whether the session runs on behalf of the system.
    #[serde(default)]
    pub system: bool,
    /// Permission values by kind and target.
    #[serde(default)]
    pub permissions: BTreeMap<PermissionKind, BTreeMap<String, i32>>,
    /// Constraints, grouped by entity name.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Durable attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl Serialize for AuthorizationSession {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

/// Deserializes with the default [`AccessContext`]; use
/// [`AuthorizationSession::from_snapshot`] to attach other collaborators.
impl<'de> Deserialize<'de> for AuthorizationSession {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let snapshot = SessionSnapshot::deserialize(deserializer)?;
        Self::from_snapshot(snapshot, AccessContext::default()).map_err(serde::de::Error::custom)
    }
}
