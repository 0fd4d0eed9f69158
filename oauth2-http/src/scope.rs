use axum::http::Uri;

/// Whether protected routes enforce the stored token scope against the
/// request path. Disabled by default: the core store treats scope as an
/// opaque string (spec Non-goal: no scope-based authorization engine),
/// this enforcement exists only at this reference boundary.
#[derive(Debug, Clone, Default)]
pub struct RequiredScopes {
    pub enforce: bool,
}

/// `*` is a wildcard matching any path. Otherwise each whitespace-separated
/// token in `scope` must appear as an exact path segment of `uri`.
pub fn scope_permits(scope: Option<&str>, uri: &Uri) -> bool {
    let Some(scope) = scope else {
        return false;
    };
    let scope = scope.trim();
    if scope == "*" {
        return true;
    }

    let segments: Vec<&str> = uri.path().split('/').filter(|s| !s.is_empty()).collect();
    scope.split_whitespace().any(|token| segments.contains(&token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_permits_any_path() {
        let uri: Uri = "/orders/42".parse().unwrap();
        assert!(scope_permits(Some("*"), &uri));
    }

    #[test]
    fn matching_segment_permits() {
        let uri: Uri = "/orders/42".parse().unwrap();
        assert!(scope_permits(Some("read orders"), &uri));
    }

    #[test]
    fn non_matching_segment_denies() {
        let uri: Uri = "/orders/42".parse().unwrap();
        assert!(!scope_permits(Some("invoices"), &uri));
    }

    #[test]
    fn missing_scope_denies() {
        let uri: Uri = "/orders/42".parse().unwrap();
        assert!(!scope_permits(None, &uri));
    }
}
