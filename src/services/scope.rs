use crate::auth::Principal;

/// Root under which all principal-owned objects live. Uploads outside this
/// namespace are never subject to ingestion notifications.
pub const KEY_NAMESPACE: &str = "private/";

/// The storage-key namespace a principal may read and mutate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipScope {
    pub principal_id: String,
    pub key_prefix: String,
}

impl OwnershipScope {
    /// Derive the scope for an authenticated principal. Pure function of the
    /// stable principal identifier; recomputed on every request, never stored.
    pub fn resolve(principal: &Principal) -> Self {
        Self {
            principal_id: principal.id.clone(),
            key_prefix: format!("{KEY_NAMESPACE}{}/", principal.id),
        }
    }

    /// Whether `key` falls inside this principal's namespace.
    pub fn permits(&self, key: &str) -> bool {
        key.starts_with(&self.key_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(id: &str) -> Principal {
        Principal {
            id: id.to_string(),
            groups: Vec::new(),
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = OwnershipScope::resolve(&principal("u1"));
        let b = OwnershipScope::resolve(&principal("u1"));
        assert_eq!(a, b);
        assert_eq!(a.key_prefix, "private/u1/");
    }

    #[test]
    fn permits_own_keys_only() {
        let scope = OwnershipScope::resolve(&principal("u1"));
        assert!(scope.permits("private/u1/cat.jpg"));
        assert!(scope.permits("private/u1/albums/dog.png"));
        assert!(!scope.permits("private/u2/cat.jpg"));
        assert!(!scope.permits("public/cat.jpg"));
    }

    #[test]
    fn sibling_id_prefixes_do_not_leak() {
        // "u1" must not see "u12" keys even though "u12" starts with "u1".
        let scope = OwnershipScope::resolve(&principal("u1"));
        assert!(!scope.permits("private/u12/cat.jpg"));
    }
}
