//! Snapshot of the environment variables an ingestion reads.
//!
//! The pipeline never calls `std::env` itself. The caller captures the
//! variables named by the config once, at the ingestion boundary, and passes
//! the snapshot down.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Empty snapshot: every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read the named variables from the process environment.
    ///
    /// Unset variables and values that are not valid unicode are left out.
    pub fn capture<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vars = names
            .into_iter()
            .filter_map(|name| {
                let name = name.as_ref();
                std::env::var(name).ok().map(|value| (name.to_string(), value))
            })
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
        self.vars.get(name).map(|v| v.as_str())
    }

    /// Look up an optional variable name, as stored in configs.
    pub fn lookup(&self, name: Option<&str>) -> Option<&str> {
        name.and_then(|n| self.get(n))
    }
}
