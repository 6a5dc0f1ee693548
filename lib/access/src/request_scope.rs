//! Request-scoped overrides for session environment values.
//!
//! While a request is being served, the transport layer may know a better
//! locale, timezone, client address, or client description than the one
//! stored on the session (for example from request headers). Overrides are
//! looked up by session ID and never written back to the session.

use parking_lot::RwLock;
use std::collections::HashMap;
use tollgate_core::SessionId;

/// Source of request-scoped environment values.
///
/// Every method defaults to `None`, meaning "use the session's value".
pub trait RequestScope: Send + Sync {
    /// Locale of the current request for `session`.
    fn locale(&self, _session: &SessionId) -> Option<String> {
        None
    }

    /// Timezone of the current request for `session`.
    fn timezone(&self, _session: &SessionId) -> Option<String> {
        None
    }

    /// Client address of the current request for `session`.
    fn address(&self, _session: &SessionId) -> Option<String> {
        None
    }

    /// Client description of the current request for `session`.
    fn client_info(&self, _session: &SessionId) -> Option<String> {
        None
    }
}

/// Values that override the session environment for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestValues {
    /// Locale negotiated for the request.
    pub locale: Option<String>,
    /// Timezone reported by the client.
    pub timezone: Option<String>,
    /// Remote address of the client.
    pub address: Option<String>,
    /// Client description, such as a user agent.
    pub client_info: Option<String>,
}

/// In-memory [`RequestScope`] keyed by session ID.
///
/// The request layer calls [`enter`](Self::enter) when it starts serving a
/// request and [`leave`](Self::leave) when it is done.
#[derive(Debug, Default)]
pub struct RequestOverrides {
    active: RwLock<HashMap<SessionId, RequestValues>>,
}

impl RequestOverrides {
    /// Creates an empty override table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `values` for `session`, replacing any previous values.
    pub fn enter(&self, session: SessionId, values: RequestValues) {
        self.active.write().insert(session, values);
    }

    /// Removes the values for `session`.
    pub fn leave(&self, session: &SessionId) -> Option<RequestValues> {
        self.active.write().remove(session)
    }

    fn lookup(
        &self,
        session: &SessionId,
        pick: impl Fn(&RequestValues) -> Option<&String>,
    ) -> Option<String> {
        self.active.read().get(session).and_then(pick).cloned()
    }
}

impl RequestScope for RequestOverrides {
    fn locale(&self, session: &SessionId) -> Option<String> {
        self.lookup(session, |v| v.locale.as_ref())
    }

    fn timezone(&self, session: &SessionId) -> Option<String> {
        self.lookup(session, |v| v.timezone.as_ref())
    }

    fn address(&self, session: &SessionId) -> Option<String> {
        self.lookup(session, |v| v.address.as_ref())
    }

    fn client_info(&self, session: &SessionId) -> Option<String> {
        self.lookup(session, |v| v.client_info.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_are_per_session() {
        let overrides = RequestOverrides::new();
        let active = SessionId::new();
        let idle = SessionId::new();
        overrides.enter(
            active,
            RequestValues {
                locale: Some("fr".to_string()),
                ..RequestValues::default()
            },
        );

        assert_eq!(overrides.locale(&active), Some("fr".to_string()));
        assert_eq!(overrides.timezone(&active), None);
        assert_eq!(overrides.locale(&idle), None);
    }

    #[test]
    fn leave_removes_values() {
        let overrides = RequestOverrides::new();
        let session = SessionId::new();
        overrides.enter(
            session,
            RequestValues {
                address: Some("10.0.0.7".to_string()),
                ..RequestValues::default()
            },
        );

        assert!(overrides.leave(&session).is_some());
        assert_eq!(overrides.address(&session), None);
    }
}
