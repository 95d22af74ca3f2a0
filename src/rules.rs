//! Per-type translation rules
//!
//! Platform quirks are recorded as data: each C type name maps to the one
//! action the translator takes for it. Adding a quirk means adding an entry
//! to the configuration, not a new code path.

use std::collections::BTreeMap;

use crate::config::GenerationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Action {
    /// Leave the type out; consumers treat it as opaque.
    Exclude,
    /// Emit the enum as a module of integer constants.
    ConstifyModule,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("{0:?} is not a C identifier")]
    InvalidName(String),
    #[error("{0:?} is listed as both excluded and constified")]
    Conflict(String),
    #[error("ctypes prefix {0:?} is not a Rust path")]
    InvalidPrefix(String),
}

fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: BTreeMap<String, Action>,
}

impl RuleTable {
    pub fn from_config(config: &GenerationConfig) -> Result<Self, RuleError> {
        if let Some(prefix) = &config.ctypes_prefix {
            if syn::parse_str::<syn::Path>(prefix).is_err() {
                return Err(RuleError::InvalidPrefix(prefix.clone()));
            }
        }

        let mut rules = BTreeMap::new();
        let entries = config
            .excluded_types
            .iter()
            .map(|name| (name, Action::Exclude))
            .chain(
                config
                    .constified_enum_modules
                    .iter()
                    .map(|name| (name, Action::ConstifyModule)),
            );
        for (name, action) in entries {
            if !is_c_identifier(name) {
                return Err(RuleError::InvalidName(name.clone()));
            }
            if rules.insert(name.clone(), action).is_some() {
                return Err(RuleError::Conflict(name.clone()));
            }
        }
        Ok(Self { rules })
    }

    pub fn action(&self, name: &str) -> Option<Action> {
        self.rules.get(name).copied()
    }

    pub fn names(&self, action: Action) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter(move |(_, a)| **a == action)
            .map(|(name, _)| name.as_str())
    }

    /// Pattern that matches exactly `name` and nothing else in the
    /// translator's regex-based allow/block lists.
    pub fn exact_pattern(name: &str) -> String {
        regex::escape(name)
    }
}
