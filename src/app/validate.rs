const ACCEPTED_SCHEMES: [&str; 3] = ["ftp", "http", "https"];

/// Accepts `ftp://`, `http://` or `https://` followed by at least one
/// character that is neither whitespace nor a double quote.
pub fn is_valid_url(input: &str) -> bool {
    let Some((scheme, rest)) = input.split_once("://") else {
        return false;
    };
    ACCEPTED_SCHEMES.contains(&scheme)
        && !rest.is_empty()
        && !rest.chars().any(|ch| ch.is_whitespace() || ch == '"')
}

#[cfg(test)]
mod tests {
    use super::is_valid_url;

    #[test]
    fn accepts_supported_schemes() {
        assert!(is_valid_url("https://a.b"));
        assert!(is_valid_url("http://x"));
        assert!(is_valid_url("ftp://y"));
        assert!(is_valid_url("https://example.com/path?q=1#frag"));
    }

    #[test]
    fn rejects_empty_and_missing_scheme() {
        assert!(!is_valid_url(""));
        assert!(!is_valid_url("example.com"));
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url("gopher://x"));
    }

    #[test]
    fn rejects_whitespace_and_quotes() {
        assert!(!is_valid_url("http:// space"));
        assert!(!is_valid_url("htt ps://x"));
        assert!(!is_valid_url("https://a.b/\"quoted\""));
        assert!(!is_valid_url("https://a.b\tc"));
        assert!(!is_valid_url(" https://a.b"));
    }

    #[test]
    fn scheme_match_is_case_sensitive() {
        assert!(!is_valid_url("HTTP://x"));
    }
}
