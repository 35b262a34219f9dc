//! Explicit "degrade, don't abort" results.
//!
//! Stages that must never stop the pipeline (page fetches, parsing the
//! oracle's link reply) hand back a [`Degradable`] instead of an error. The
//! caller always gets a usable value and decides whether the degradation
//! reason is worth propagating.

/// Either a complete value or a fallback value plus the reason it was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradable<T> {
    Complete(T),
    Degraded { value: T, reason: String },
}

impl<T> Degradable<T> {
    pub fn complete(value: T) -> Self {
        Self::Complete(value)
    }

    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Why the fallback was used, if it was.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Complete(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Accept the degradation and keep going with whatever value is present.
    pub fn into_inner(self) -> T {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => value,
        }
    }
}
