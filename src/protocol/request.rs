//! Request definitions
//!
//! A verb, a key and its parameter set.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CoordError, Result};
use crate::store::Preconditions;

/// Request verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "DELETE" => Ok(Verb::Delete),
            _ => Err(CoordError::Protocol(format!("Unsupported verb: {}", s))),
        }
    }
}

/// Request parameters (string → string)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub const VALUE: &'static str = "value";
    pub const TTL: &'static str = "ttl";
    pub const PREV_EXIST: &'static str = "prevExist";
    pub const PREV_INDEX: &'static str = "prevIndex";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The required `value` parameter
    pub fn value(&self) -> Result<&str> {
        self.get(Self::VALUE)
            .ok_or_else(|| CoordError::InvalidArgument("missing parameter: value".to_string()))
    }

    /// The optional `ttl` parameter, in whole seconds
    pub fn ttl(&self) -> Result<Option<Duration>> {
        self.get(Self::TTL)
            .map(|raw| {
                raw.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| CoordError::InvalidArgument(format!("invalid ttl: {}", raw)))
            })
            .transpose()
    }

    /// `prevExist` / `prevIndex` guards
    pub fn preconditions(&self) -> Result<Preconditions> {
        let mut preconditions = Preconditions::none();

        if let Some(raw) = self.get(Self::PREV_EXIST) {
            let exists = match raw {
                "true" => true,
                "false" => false,
                _ => {
                    return Err(CoordError::InvalidArgument(format!(
                        "invalid prevExist: {}",
                        raw
                    )))
                }
            };
            preconditions = preconditions.prev_exist(exists);
        }

        if let Some(raw) = self.get(Self::PREV_INDEX) {
            let index = raw
                .parse::<u64>()
                .map_err(|_| CoordError::InvalidArgument(format!("invalid prevIndex: {}", raw)))?;
            preconditions = preconditions.prev_index(index);
        }

        Ok(preconditions)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A request against the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub verb: Verb,
    pub key: String,
    pub params: Params,
}

impl Request {
    pub fn new(verb: Verb, key: impl Into<String>) -> Self {
        Self {
            verb,
            key: key.into(),
            params: Params::new(),
        }
    }

    /// GET a single key or (trailing `/`) a directory listing
    pub fn get(key: impl Into<String>) -> Self {
        Self::new(Verb::Get, key)
    }

    /// POST an auto-named child under `dir`
    pub fn post(dir: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(Verb::Post, dir).param(Params::VALUE, value)
    }

    /// PUT `value` at `key`
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(Verb::Put, key).param(Params::VALUE, value)
    }

    /// DELETE `key`
    pub fn delete(key: impl Into<String>) -> Self {
        Self::new(Verb::Delete, key)
    }

    /// Set an arbitrary parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name, value);
        self
    }

    pub fn ttl(self, seconds: u64) -> Self {
        self.param(Params::TTL, seconds.to_string())
    }

    pub fn prev_exist(self, exists: bool) -> Self {
        self.param(Params::PREV_EXIST, exists.to_string())
    }

    pub fn prev_index(self, index: u64) -> Self {
        self.param(Params::PREV_INDEX, index.to_string())
    }
}
