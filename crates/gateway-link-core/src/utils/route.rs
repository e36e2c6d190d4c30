// Route pattern matching for hook dispatch.
//
// Patterns use `:name` segments (`/callback/:id`). A context path may be
// either the pattern itself or a concrete request path.

/// Segment-wise match. `:param` matches any non-empty segment (and a literal
/// `:param` segment); trailing slashes are ignored.
pub fn route_matches(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = segments(pattern).collect();
    let path_segments: Vec<&str> = segments(path).collect();

    if pattern_segments.len() != path_segments.len() {
        return false;
    }

    pattern_segments
        .iter()
        .zip(path_segments.iter())
        .all(|(p, s)| if p.starts_with(':') { !s.is_empty() } else { p == s })
}

pub fn route_matches_any<S: AsRef<str>>(patterns: &[S], path: &str) -> bool {
    patterns.iter().any(|p| route_matches(p.as_ref(), path))
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matches_itself() {
        assert!(route_matches("/callback/:id", "/callback/:id"));
    }

    #[test]
    fn test_pattern_matches_concrete_path() {
        assert!(route_matches("/callback/:id", "/callback/fortytwo"));
        assert!(route_matches("/callback/:id", "/callback/google/"));
        assert!(route_matches("/callback/:id", "/callback/google?code=abc"));
    }

    #[test]
    fn test_mismatches() {
        assert!(!route_matches("/callback/:id", "/callback"));
        assert!(!route_matches("/callback/:id", "/callback/a/b"));
        assert!(!route_matches("/sign-out", "/sign-in"));
    }

    #[test]
    fn test_any() {
        let patterns = vec!["/sign-out".to_string(), "/logout".to_string()];
        assert!(route_matches_any(&patterns, "/logout"));
        assert!(!route_matches_any(&patterns, "/session"));
    }
}
