//! The typed in-memory model a [`Config`] is parsed into and emitted from.
//!
//! This is the buffer between the on-disk declarative text (`codec`) and
//! everything that operates on configuration semantically (`merge`,
//! `remove`, `dedupe`). Nothing outside `codec` should need to know the
//! on-disk syntax.

use indexmap::IndexMap;

/// A single option's value. Booleans, numbers, and IP addresses are all
/// represented as strings at this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(v) => Some(v),
            Self::Scalar(_) => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

/// Identifies a section within its [`Config`]: by name if present,
/// otherwise by its 0-based position among same-typed anonymous sections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionKey {
    Named(String),
    Anonymous { kind: String, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: Option<String>,
    pub kind: String,
    /// Insertion-ordered, keys unique per section.
    pub options: IndexMap<String, Value>,
    /// Reserved `.`-prefixed keys; not modeled as options.
    pub meta: IndexMap<String, String>,
}

impl Section {
    pub fn new(kind: impl Into<String>, name: Option<String>) -> Self {
        Self {
            name,
            kind: kind.into(),
            options: IndexMap::new(),
            meta: IndexMap::new(),
        }
    }

    pub fn key(&self, positional_index: usize) -> SectionKey {
        match &self.name {
            Some(name) => SectionKey::Named(name.clone()),
            None => SectionKey::Anonymous {
                kind: self.kind.clone(),
                index: positional_index,
            },
        }
    }
}

/// An ordered sequence of sections. Order must be preserved across
/// load->emit round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub sections: Vec<Section>,
    /// Unix mode bits of the file this was loaded from, if any. Used by
    /// the commit logic to preserve file mode across writes.
    pub mode: Option<u32>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// The 0-based positional index `section` would have among
    /// same-typed anonymous sections, given everything already pushed.
    pub fn next_anonymous_index(&self, kind: &str) -> usize {
        self.sections
            .iter()
            .filter(|s| s.name.is_none() && s.kind == kind)
            .count()
    }

    pub fn find_named(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.name.as_deref() == Some(name))
    }

    pub fn find_named_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections
            .iter_mut()
            .find(|s| s.name.as_deref() == Some(name))
    }

    /// Finds the anonymous section of `kind` at `index` among same-typed
    /// anonymous sections (positional merge by `(Type, index)`).
    pub fn find_anonymous(&self, kind: &str, index: usize) -> Option<&Section> {
        self.sections
            .iter()
            .filter(|s| s.name.is_none() && s.kind == kind)
            .nth(index)
    }

    pub fn find_anonymous_mut(&mut self, kind: &str, index: usize) -> Option<&mut Section> {
        self.sections
            .iter_mut()
            .filter(|s| s.name.is_none() && s.kind == kind)
            .nth(index)
    }

    /// Validates the invariants that aren't structurally
    /// enforced by the types above (unique names within the config).
    pub fn validate(&self) -> crate::error::Result<()> {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for s in &self.sections {
            if let Some(name) = &s.name {
                if !seen.insert(name.clone()) {
                    return Err(crate::error::RouterConfigError::Validation {
                        message: format!("duplicate section name '{name}'"),
                    });
                }
            }
        }
        Ok(())
    }
}
