//! Look up strategy constructors by short name.
//!
//! Scoring and inference strategies are chosen by configuration, so each kind
//! keeps a [`StrategyRegistry`] mapping the short names a configuration may use
//! to a constructor and a human readable name.
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No {kind} strategy named \"{name}\" is registered")]
pub struct UnknownStrategy {
    pub kind: &'static str,
    pub name: String,
}

#[derive(Debug, Clone)]
struct Entry<C> {
    name: String,
    constructor: C,
}

/// Constructors of one kind of strategy, keyed by short name in registration order
#[derive(Debug, Clone)]
pub struct StrategyRegistry<C> {
    kind: &'static str,
    entries: IndexMap<String, Entry<C>>,
}

impl<C: Copy> StrategyRegistry<C> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Register a constructor, replacing any earlier one of the same short name
    pub fn register<S: Into<String>, N: Into<String>>(&mut self, short_name: S, name: N, constructor: C) {
        let short_name = short_name.into();
        if self
            .entries
            .insert(
                short_name.clone(),
                Entry {
                    name: name.into(),
                    constructor,
                },
            )
            .is_some()
        {
            log::debug!("Replaced {} strategy {short_name}", self.kind);
        }
    }

    pub fn get(&self, short_name: &str) -> Result<C, UnknownStrategy> {
        self.entries
            .get(short_name)
            .map(|e| e.constructor)
            .ok_or_else(|| UnknownStrategy {
                kind: self.kind,
                name: short_name.to_string(),
            })
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.entries.contains_key(short_name)
    }

    /// Short name to human readable name of every registered strategy
    pub fn names(&self) -> IndexMap<String, String> {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
