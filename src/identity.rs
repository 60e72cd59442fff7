//! Identity resolution from host-supplied parameters.
//!
//! The identity is an opaque string. Hosts pass it as a query parameter or
//! `key=value` argument under any of a few equivalent names.

/// Accepted parameter names, in precedence order.
pub const IDENTITY_PARAM_NAMES: &[&str] = &["userId", "user_id", "uid", "user"];

/// Pick the identity out of `(name, value)` pairs.
///
/// Earlier names in [`IDENTITY_PARAM_NAMES`] win over later ones; blank
/// values are ignored.
pub fn identity_from_pairs<I, K, V>(pairs: I) -> Option<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut best: Option<(usize, String)> = None;
    for (key, value) in pairs {
        let Some(rank) = IDENTITY_PARAM_NAMES
            .iter()
            .position(|name| *name == key.as_ref())
        else {
            continue;
        };
        let value = value.as_ref().trim();
        if value.is_empty() {
            continue;
        }
        if best.as_ref().map(|(r, _)| rank < *r).unwrap_or(true) {
            best = Some((rank, value.to_string()));
        }
    }
    best.map(|(_, value)| value)
}

/// Resolve the identity from a URL query string (`?userId=u1&...`).
pub fn identity_from_query(query: &str) -> Option<String> {
    let query = query.trim().trim_start_matches('?');
    identity_from_pairs(url::form_urlencoded::parse(query.as_bytes()))
}

/// Resolve the identity from `key=value` arguments.
pub fn identity_from_args<S: AsRef<str>>(args: &[S]) -> Option<String> {
    identity_from_pairs(
        args.iter()
            .filter_map(|arg| arg.as_ref().split_once('=')),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_alias_resolves() {
        for name in IDENTITY_PARAM_NAMES {
            assert_eq!(
                identity_from_query(&format!("{}=u1", name)).as_deref(),
                Some("u1"),
                "alias {}",
                name
            );
        }
    }

    #[test]
    fn test_precedence_follows_alias_order() {
        assert_eq!(
            identity_from_query("user=low&userId=high").as_deref(),
            Some("high")
        );
        assert_eq!(
            identity_from_query("uid=mid&user=low").as_deref(),
            Some("mid")
        );
    }

    #[test]
    fn test_blank_and_missing_identity() {
        assert_eq!(identity_from_query(""), None);
        assert_eq!(identity_from_query("?page=2"), None);
        assert_eq!(identity_from_query("userId=%20%20"), None);
        assert_eq!(
            identity_from_query("userId=&user_id=u2").as_deref(),
            Some("u2")
        );
    }

    #[test]
    fn test_query_is_percent_decoded() {
        assert_eq!(
            identity_from_query("?userId=user%40example.com").as_deref(),
            Some("user@example.com")
        );
    }

    #[test]
    fn test_args_form() {
        let args = ["--verbose", "uid=abc", "noise"];
        assert_eq!(identity_from_args(&args).as_deref(), Some("abc"));
        let empty: [&str; 0] = [];
        assert_eq!(identity_from_args(&empty), None);
    }

    #[test]
    fn test_case_sensitive_names() {
        assert_eq!(identity_from_query("USERID=u1"), None);
    }
}
