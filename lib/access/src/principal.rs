//! The identity a session acts for.
//!
//! A principal is the authenticated user as seen by the authorization
//! engine: an ID, a login, and the user's locale and timezone preferences.
//! Two principals are the same user when their IDs match.

use serde::{Deserialize, Serialize};
use tollgate_core::UserId;

/// An authenticated (or substituted) user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Internal user ID.
    id: UserId,
    /// Login name as entered by the user.
    login: String,
    /// Display name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    /// Preferred locale tag (e.g., "en-US").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locale: Option<String>,
    /// Preferred IANA timezone name (e.g., "Europe/Berlin").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timezone: Option<String>,
}

impl Principal {
    /// Creates a principal with no display name or preferences.
    #[must_use]
    pub fn new(id: UserId, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            name: None,
            locale: None,
            timezone: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the preferred locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Sets the preferred timezone.
    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Returns the user ID.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the login exactly as stored.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Returns the login folded to lower case.
    #[must_use]
    pub fn login_lowercase(&self) -> String {
        self.login.to_lowercase()
    }

    /// Returns the display name, if known.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the preferred locale, if set.
    #[must_use]
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Returns the preferred timezone, if set.
    #[must_use]
    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    /// Returns true if both principals refer to the same user.
    #[must_use]
    pub fn is_same_user(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_lowercase_folds_case() {
        let principal = Principal::new(UserId::new(), "Alice.Smith");
        assert_eq!(principal.login(), "Alice.Smith");
        assert_eq!(principal.login_lowercase(), "alice.smith");
    }

    #[test]
    fn same_user_compares_ids_only() {
        let id = UserId::new();
        let a = Principal::new(id, "alice");
        let b = Principal::new(id, "ALICE").with_locale("de");
        let c = Principal::new(UserId::new(), "alice");

        assert!(a.is_same_user(&b));
        assert!(!a.is_same_user(&c));
    }

    #[test]
    fn principal_serialization_omits_unset_preferences() {
        let principal = Principal::new(UserId::new(), "alice").with_timezone("Europe/Berlin");
        let json = serde_json::to_value(&principal).expect("serialize");

        assert_eq!(json["timezone"], "Europe/Berlin");
        assert!(json.get("locale").is_none());

        let parsed: Principal = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, principal);
    }
}
