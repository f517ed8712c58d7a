//! Navigation destinations

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NavigationError;

/// A view path plus query parameters, e.g. `/schedule?tab=week`
///
/// Values are kept verbatim; callers pass already-encoded text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Destination {
    /// Destination without query parameters
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Parse `/path?k=v&k2=v2`
    pub fn parse(s: &str) -> Result<Self, NavigationError> {
        let s = s.trim();
        let (path, query) = match s.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (s, None),
        };
        if !path.starts_with('/') {
            return Err(NavigationError::InvalidDestination(s.to_string()));
        }

        let mut destination = Self::new(path);
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                destination = destination.with_param(key, value);
            }
        }
        Ok(destination)
    }

    /// Set a query parameter, replacing an existing one with the same key
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.query.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.query.push((key, value)),
        }
        self
    }

    /// Value of a query parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Same path, no query
    pub fn without_query(&self) -> Self {
        Self::new(self.path.clone())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, key, value)?;
        }
        Ok(())
    }
}

impl FromStr for Destination {
    type Err = NavigationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
