//! Request and response types for the HPC client

use std::collections::BTreeMap;

/// Property bag sent to the service (job/task properties, environment variables)
pub type Properties = BTreeMap<String, String>;

/// Property bag parsed from a response; `None` marks an empty `Value` element
pub type PropertyMap = BTreeMap<String, Option<String>>;

/// Build a [`Properties`] bag from string pairs
pub fn properties<I, K, V>(pairs: I) -> Properties
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

// =============================================================================
// Exchange
// =============================================================================

/// Raw result of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// HTTP status, or `None` when the server was never reached
    pub status: Option<u16>,
    /// Response body, or a description of the connection failure
    pub body: String,
}

impl Exchange {
    pub fn completed(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
        }
    }

    pub fn unreachable(description: impl Into<String>) -> Self {
        Self {
            status: None,
            body: description.into(),
        }
    }

    /// The service signals success with 200 only
    pub fn is_success(&self) -> bool {
        self.status == Some(200)
    }

    /// True if the request never produced an HTTP response
    pub fn is_unreachable(&self) -> bool {
        self.status.is_none()
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Result of an endpoint call.
///
/// Network and HTTP failures are ordinary outcomes, not errors; both variants
/// carry the exchange that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Success { value: T, exchange: Exchange },
    Failed(Exchange),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failed(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failed(_) => None,
        }
    }

    pub fn exchange(&self) -> &Exchange {
        match self {
            Self::Success { exchange, .. } | Self::Failed(exchange) => exchange,
        }
    }

    /// Body of the underlying exchange
    pub fn body(&self) -> &str {
        &self.exchange().body
    }

    pub fn status(&self) -> Option<u16> {
        self.exchange().status
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success { value, exchange } => Outcome::Success {
                value: f(value),
                exchange,
            },
            Self::Failed(exchange) => Outcome::Failed(exchange),
        }
    }
}
