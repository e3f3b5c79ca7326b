//! Errors for the control-plane refresh path.
//!
//! Policy decisions ([`crate::model::BlockReason`]) and malformed-operator-data
//! handling are not errors — see spec §7. These types only cover
//! [`crate::loader::Loader`] and [`crate::store::RuleStore`] refresh failures,
//! which never block a request; the prior snapshot stays in force.

/// Error returned by a [`crate::loader::Loader`] implementation.
#[derive(Debug)]
pub struct LoaderError(pub String);

impl LoaderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl std::fmt::Display for LoaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "loader error: {}", self.0)
    }
}

impl std::error::Error for LoaderError {}

/// Error returned by [`crate::store::RuleStore::refresh_all`] /
/// [`crate::store::RuleStore::refresh_rule`].
#[derive(Debug)]
pub enum StoreError {
    /// The loader itself failed (transport, deserialization, etc.).
    Loader(LoaderError),
    /// The snapshot/subgraph contained more than one enabled
    /// `RateLimitConfig` or `ConcurrentLimitConfig` for the same rule.
    ///
    /// Resolves the Open Question in spec.md §9: the schema nominally
    /// allows it, but this store rejects it rather than picking one
    /// arbitrarily (see DESIGN.md).
    MultipleActiveConfigs { rule_id: crate::model::RuleId, kind: &'static str },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Loader(e) => write!(f, "{e}"),
            StoreError::MultipleActiveConfigs { rule_id, kind } => write!(
                f,
                "rule {} has more than one enabled {kind}; at most one is allowed",
                rule_id.0
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Loader(e) => Some(e),
            StoreError::MultipleActiveConfigs { .. } => None,
        }
    }
}

impl From<LoaderError> for StoreError {
    fn from(err: LoaderError) -> Self {
        StoreError::Loader(err)
    }
}
