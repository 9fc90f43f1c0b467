//! Route matching module
//!
//! Exact `path` rules beat prefix rules; among prefix rules the longest
//! matching prefix wins. Table order only breaks ties.

use crate::config::{Route, RouteMatch};

/// How specifically a rule matched; higher wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Specificity {
    CatchAll,
    Prefix(usize),
    Exact,
}

/// Find the most specific route for a path
pub fn match_route<'a>(path: &str, routes: &'a [Route]) -> Option<&'a Route> {
    routes
        .iter()
        .filter_map(|route| specificity(&route.match_rule, path).map(|s| (s, route)))
        // max_by_key keeps the last maximum; reverse so the first one wins
        .rev()
        .max_by_key(|(s, _)| *s)
        .map(|(_, route)| route)
}

/// Check if a path matches a route rule
#[cfg(test)]
fn match_path(rule: &RouteMatch, path: &str) -> bool {
    specificity(rule, path).is_some()
}

fn specificity(rule: &RouteMatch, path: &str) -> Option<Specificity> {
    if let Some(exact) = &rule.path {
        return (path == exact).then_some(Specificity::Exact);
    }
    if let Some(prefix) = &rule.prefix {
        return path
            .starts_with(prefix.as_str())
            .then_some(Specificity::Prefix(prefix.len()));
    }
    Some(Specificity::CatchAll)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteAction;

    fn upstream(addr: &str) -> RouteAction {
        RouteAction::Upstream {
            address: addr.to_string(),
        }
    }

    fn default_table() -> Vec<Route> {
        vec![
            Route::prefix("api", "/api/", upstream("127.0.0.1:3000")),
            Route::prefix(
                "websocket",
                "/ws/",
                RouteAction::Websocket {
                    address: "127.0.0.1:3030".to_string(),
                },
            ),
            Route::exact("health", "/health", upstream("127.0.0.1:3000")),
        ]
    }

    fn name_for(path: &str, routes: &[Route]) -> Option<String> {
        match_route(path, routes).and_then(|r| r.name.clone())
    }

    #[test]
    fn test_match_path_exact() {
        let rule = RouteMatch {
            path: Some("/health".to_string()),
            prefix: None,
        };
        assert!(match_path(&rule, "/health"));
        assert!(!match_path(&rule, "/health/"));
        assert!(!match_path(&rule, "/healthz"));
    }

    #[test]
    fn test_match_path_prefix() {
        let rule = RouteMatch {
            path: None,
            prefix: Some("/api/".to_string()),
        };
        assert!(match_path(&rule, "/api/v1/pages"));
        assert!(!match_path(&rule, "/api"));
        assert!(!match_path(&rule, "/apiary"));
    }

    #[test]
    fn test_default_table_dispatch() {
        let routes = default_table();
        assert_eq!(name_for("/api/v1/pages/home", &routes).as_deref(), Some("api"));
        assert_eq!(name_for("/ws/live", &routes).as_deref(), Some("websocket"));
        assert_eq!(name_for("/health", &routes).as_deref(), Some("health"));
        assert_eq!(name_for("/wiki/home", &routes), None);
        assert_eq!(name_for("/", &routes), None);
    }

    #[test]
    fn test_longest_prefix_wins_regardless_of_order() {
        let routes = vec![
            Route::prefix("api", "/api/", upstream("a:1")),
            Route::prefix("api-v2", "/api/v2/", upstream("b:2")),
        ];
        assert_eq!(name_for("/api/v2/pages", &routes).as_deref(), Some("api-v2"));
        assert_eq!(name_for("/api/v1/pages", &routes).as_deref(), Some("api"));
    }

    #[test]
    fn test_exact_beats_prefix_and_first_breaks_ties() {
        let routes = vec![
            Route::prefix("first", "/docs", upstream("a:1")),
            Route::prefix("second", "/docs", upstream("b:2")),
            Route::exact("exact", "/docs/index", upstream("c:3")),
        ];
        assert_eq!(name_for("/docs/index", &routes).as_deref(), Some("exact"));
        assert_eq!(name_for("/docs/other", &routes).as_deref(), Some("first"));
    }
}
