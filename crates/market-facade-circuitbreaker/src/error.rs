use thiserror::Error;

/// Errors returned by [`crate::CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was not attempted.
    #[error("circuit is open; call not permitted")]
    Open,

    /// The wrapped call ran and returned an error.
    #[error("inner call failed: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open)
    }

    /// Returns the inner error, if the circuit permitted the call.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::Open => None,
        }
    }
}
