use transport_errors::TransportError;

/// Resolve `path` against the connection's base URL pathname, normalizing so
/// exactly one `/` separates them, then append `querystring` (already
/// encoded) with `?` or `&` as appropriate.
///
/// Rejects any path containing code points outside `U+0021..=U+00FF` before
/// the caller issues I/O, matching `ERR_UNESCAPED_CHARACTERS` in the
/// original transport.
pub fn build_request_url(
    base: &url::Url,
    path: &str,
    querystring: &str,
) -> Result<url::Url, TransportError> {
    if let Some(bad) = path.chars().find(|c| !('\u{21}'..='\u{ff}').contains(c)) {
        return Err(TransportError::Configuration(format!(
            "unescaped character {bad:?} in request path"
        )));
    }

    let mut url = base.clone();
    let joined = join_paths(url.path(), path);
    url.set_path(&joined);

    if !querystring.is_empty() {
        match url.query() {
            Some(existing) if !existing.is_empty() => {
                let merged = format!("{existing}&{querystring}");
                url.set_query(Some(&merged));
            }
            _ => url.set_query(Some(querystring)),
        }
    }

    Ok(url)
}

fn join_paths(base: &str, path: &str) -> String {
    let base_trimmed = base.trim_end_matches('/');
    let path_trimmed = path.trim_start_matches('/');
    if base_trimmed.is_empty() {
        format!("/{path_trimmed}")
    } else {
        format!("{base_trimmed}/{path_trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn normalizes_exactly_one_slash() {
        let base = Url::parse("http://localhost:9200/").unwrap();
        let url = build_request_url(&base, "/_search", "").unwrap();
        assert_eq!(url.path(), "/_search");
    }

    #[test]
    fn joins_host_path_prefix() {
        let base = Url::parse("http://localhost:9200/prefix/").unwrap();
        let url = build_request_url(&base, "_search", "").unwrap();
        assert_eq!(url.path(), "/prefix/_search");
    }

    #[test]
    fn appends_querystring_with_question_mark() {
        let base = Url::parse("http://localhost:9200/").unwrap();
        let url = build_request_url(&base, "/_search", "q=a").unwrap();
        assert_eq!(url.query(), Some("q=a"));
    }

    #[test]
    fn merges_querystring_with_ampersand() {
        let mut base = Url::parse("http://localhost:9200/").unwrap();
        base.set_query(Some("pretty=true"));
        let url = build_request_url(&base, "/_search", "q=a").unwrap();
        assert_eq!(url.query(), Some("pretty=true&q=a"));
    }

    #[test]
    fn rejects_unescaped_characters() {
        let base = Url::parse("http://localhost:9200/").unwrap();
        let err = build_request_url(&base, "/_search\u{2603}", "").unwrap_err();
        assert!(matches!(err, TransportError::Configuration(_)));
    }
}
