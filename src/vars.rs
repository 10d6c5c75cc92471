use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // matches ${name}
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").unwrap())
}

/// Substitute every `${name}` occurrence from the map. Unknown names resolve
/// to the empty string rather than passing through, so no placeholder ever
/// reaches the wire.
pub fn replace_variables(text: &str, vars: &HashMap<String, String>) -> String {
    var_pattern()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// No-op interpolator for callers that carry no variables.
pub fn identity(text: &str) -> String {
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_variables() {
        let vars = vars_of(&[("user", "alice"), ("env", "prod")]);
        assert_eq!(
            replace_variables("hello ${user} on ${env}", &vars),
            "hello alice on prod"
        );
    }

    #[test]
    fn unknown_variables_become_empty() {
        let vars = vars_of(&[]);
        assert_eq!(replace_variables("x=${missing}!", &vars), "x=!");
    }

    #[test]
    fn leaves_plain_text_and_malformed_refs_alone() {
        let vars = vars_of(&[("a", "1")]);
        assert_eq!(replace_variables("no vars here", &vars), "no vars here");
        assert_eq!(replace_variables("${not closed", &vars), "${not closed");
        assert_eq!(replace_variables("$a alone", &vars), "$a alone");
    }

    #[test]
    fn identity_passes_through() {
        assert_eq!(identity("${user}"), "${user}");
    }
}
