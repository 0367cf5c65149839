use std::fmt;

/// Result alias used across every `cachekit-*` crate.
pub type CacheResult<T> = Result<T, CacheError>;

/// Stable error identities callers may compare against.
///
/// No ordinary call path panics; `DeleteFailed` represents an internal
/// invariant violation (e.g. the heap was empty while the index reported a
/// non-zero size) rather than a caller mistake.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The key does not exist, or has expired.
    #[error("key not found")]
    KeyNotFound,
    /// The requested operation disagrees with the node's type tag.
    #[error("type mismatch: {0}")]
    TypeMismatch(TypeMismatchKind),
    /// Internal invariant violated during delete; should not occur in a
    /// correct implementation.
    #[error("delete failed: internal invariant violated")]
    DeleteFailed,
    /// The caller's context expired or was cancelled.
    #[error("context cancelled")]
    ContextCancelled,
}

/// Which typed operation disagreed with a node's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMismatchKind {
    OnlyScalarCanSet,
    OnlyKvCanSet,
    OnlyKvNxCanSetNx,
    OnlyScalarCanGet,
    OnlyScalarCanGetSet,
    OnlyListCanLpush,
    OnlyListCanLpop,
    OnlySetCanSadd,
    OnlySetCanSrem,
    OnlyNumericCanIncr,
    OnlyNumericCanDecr,
}

impl fmt::Display for TypeMismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeMismatchKind::OnlyScalarCanSet => "only_scalar_can_set",
            TypeMismatchKind::OnlyKvCanSet => "only_kv_can_set",
            TypeMismatchKind::OnlyKvNxCanSetNx => "only_kvnx_can_setnx",
            TypeMismatchKind::OnlyScalarCanGet => "only_scalar_can_get",
            TypeMismatchKind::OnlyScalarCanGetSet => "only_scalar_can_getset",
            TypeMismatchKind::OnlyListCanLpush => "only_list_can_lpush",
            TypeMismatchKind::OnlyListCanLpop => "only_list_can_lpop",
            TypeMismatchKind::OnlySetCanSadd => "only_set_can_sadd",
            TypeMismatchKind::OnlySetCanSrem => "only_set_can_srem",
            TypeMismatchKind::OnlyNumericCanIncr => "only_numeric_can_incr",
            TypeMismatchKind::OnlyNumericCanDecr => "only_numeric_can_decr",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_kind_display_is_snake_case() {
        assert_eq!(
            TypeMismatchKind::OnlyScalarCanSet.to_string(),
            "only_scalar_can_set"
        );
        assert_eq!(
            TypeMismatchKind::OnlyNumericCanDecr.to_string(),
            "only_numeric_can_decr"
        );
    }

    #[test]
    fn errors_are_stable_identities() {
        assert_eq!(CacheError::KeyNotFound.to_string(), "key not found");
    }
}
