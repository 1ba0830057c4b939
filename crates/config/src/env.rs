//! Process environment snapshot.

use std::collections::HashMap;

/// Immutable copy of the environment variables a resolver reads from.
///
/// Taken once at startup so resolution never depends on `std::env` being
/// mutated mid-run, and so tests can supply their own variables.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Snapshot the current process environment. Non-UTF-8 entries are skipped.
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Like [`get`](Self::get) but treats an empty value as unset.
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_and_lookup() {
        let env = Environment::from_pairs([("CERTBOT_DOMAIN", "example.com"), ("EMPTY", "")]);
        assert_eq!(env.get("CERTBOT_DOMAIN"), Some("example.com"));
        assert_eq!(env.get("EMPTY"), Some(""));
        assert_eq!(env.get_non_empty("EMPTY"), None);
        assert_eq!(env.get("MISSING"), None);
    }

    #[test]
    fn test_set_overrides() {
        let mut env = Environment::default();
        env.set("LOG_LEVEL", "DEBUG");
        env.set("LOG_LEVEL", "ERROR");
        assert_eq!(env.get("LOG_LEVEL"), Some("ERROR"));
    }
}
