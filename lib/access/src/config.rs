//! Access configuration.
//!
//! Role categories are assigned by role name. The mapping is loaded via the
//! `config` crate, normally from environment variables such as
//! `TOLLGATE_ROLES__SUPER_ROLES=administrators,root`.

use serde::Deserialize;

use crate::role::RoleCategory;

/// Top-level configuration for the access crate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    /// Role-name to category mapping.
    #[serde(default)]
    pub roles: RoleMapping,
}

impl AccessConfig {
    /// Loads configuration from `TOLLGATE_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be deserialized.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("TOLLGATE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::from_config(config)
    }

    /// Deserializes configuration from an already-built source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source does not match the expected shape.
    pub fn from_config(config: config::Config) -> Result<Self, config::ConfigError> {
        config.try_deserialize()
    }
}

/// Role names that receive a non-standard [`RoleCategory`].
///
/// Each list is a comma-separated string. A name listed more than once takes
/// the first matching category in the order super, read-only, denying.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleMapping {
    /// Roles that bypass permission checks.
    #[serde(default)]
    super_roles: String,
    /// Roles limited to reading entity data.
    #[serde(default)]
    readonly_roles: String,
    /// Roles that deny anything not explicitly granted.
    #[serde(default)]
    denying_roles: String,
}

impl RoleMapping {
    /// Creates a mapping from comma-separated role name lists.
    #[must_use]
    pub fn new(
        super_roles: impl Into<String>,
        readonly_roles: impl Into<String>,
        denying_roles: impl Into<String>,
    ) -> Self {
        Self {
            super_roles: super_roles.into(),
            readonly_roles: readonly_roles.into(),
            denying_roles: denying_roles.into(),
        }
    }

    /// Returns the category for the role called `name`.
    #[must_use]
    pub fn category_of(&self, name: &str) -> RoleCategory {
        if listed(&self.super_roles, name) {
            RoleCategory::Super
        } else if listed(&self.readonly_roles, name) {
            RoleCategory::ReadOnly
        } else if listed(&self.denying_roles, name) {
            RoleCategory::Denying
        } else {
            RoleCategory::Standard
        }
    }
}

fn listed(list: &str, name: &str) -> bool {
    list.split(',').map(str::trim).any(|entry| !entry.is_empty() && entry == name)
}
