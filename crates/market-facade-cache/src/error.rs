use std::sync::Arc;
use thiserror::Error;

/// Errors returned by [`crate::Cache::get_or_refresh`].
#[derive(Debug, Error)]
pub enum CacheError<E> {
    /// The refresh closure ran and returned an error. Wrapped in an `Arc`
    /// because every caller coalesced onto the same in-flight refresh
    /// shares this result.
    #[error("refresh failed: {0}")]
    Refresh(Arc<E>),

    /// The in-flight refresh this caller was waiting on disappeared (the
    /// leader task was aborted) before it could deliver a result.
    #[error("in-flight refresh was lost before completing")]
    LeaderLost,
}

impl<E> CacheError<E> {
    /// Returns the inner error, if this was a refresh failure.
    pub fn into_inner(self) -> Option<Arc<E>> {
        match self {
            CacheError::Refresh(e) => Some(e),
            CacheError::LeaderLost => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_error_displays_inner() {
        let err = CacheError::Refresh(Arc::new("boom"));
        assert_eq!(err.to_string(), "refresh failed: boom");
        assert_eq!(err.into_inner().map(|e| *e), Some("boom"));
    }

    #[test]
    fn leader_lost_has_no_inner() {
        let err: CacheError<String> = CacheError::LeaderLost;
        assert!(err.into_inner().is_none());
    }
}
