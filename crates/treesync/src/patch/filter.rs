//! Narrowing a patch to the keys one subscriber may see.
//!
//! A [`Filter`] decides visibility of the top-level keys of a patch: a rule
//! per fixed key plus one rule for every other key. Children of a visible
//! key are kept whole. The older `{keys}` and `{any}` shapes are
//! expressed through [`Filter::keys`] and [`Filter::any`].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::value::MapKey;

use super::types::{Deletion, Patch, PatchError};

/// Visibility predicate over a key.
pub type KeyPredicate = dyn Fn(&MapKey) -> bool + Send + Sync;

/// Visibility rule for one key or for the fallback.
#[derive(Clone)]
pub enum Rule {
    Include,
    Exclude,
    When(Arc<KeyPredicate>),
}

impl Rule {
    pub fn when<F>(predicate: F) -> Rule
    where
        F: Fn(&MapKey) -> bool + Send + Sync + 'static,
    {
        Rule::When(Arc::new(predicate))
    }

    pub fn admits(&self, key: &MapKey) -> bool {
        match self {
            Rule::Include => true,
            Rule::Exclude => false,
            Rule::When(predicate) => predicate(key),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Include => f.write_str("Include"),
            Rule::Exclude => f.write_str("Exclude"),
            Rule::When(_) => f.write_str("When(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Filter {
    fixed: IndexMap<MapKey, Rule>,
    other: Rule,
}

impl Filter {
    pub fn new<K, I>(fixed: I, other: Rule) -> Filter
    where
        K: Into<MapKey>,
        I: IntoIterator<Item = (K, Rule)>,
    {
        Filter {
            fixed: fixed.into_iter().map(|(k, r)| (k.into(), r)).collect(),
            other,
        }
    }

    /// Only the listed keys are visible.
    pub fn keys<K, I>(keys: I) -> Filter
    where
        K: Into<MapKey>,
        I: IntoIterator<Item = K>,
    {
        Filter::new(keys.into_iter().map(|k| (k, Rule::Include)), Rule::Exclude)
    }

    /// Every key is visible.
    pub fn any() -> Filter {
        Filter {
            fixed: IndexMap::new(),
            other: Rule::Include,
        }
    }

    /// Sets the rule for one key.
    pub fn with(mut self, key: impl Into<MapKey>, rule: Rule) -> Filter {
        self.fixed.insert(key.into(), rule);
        self
    }

    pub fn is_visible(&self, key: &MapKey) -> bool {
        self.fixed.get(key).unwrap_or(&self.other).admits(key)
    }

    fn is_field_visible(&self, key: &str) -> bool {
        self.is_visible(&MapKey::Str(key.to_string()))
    }

    /// True when the filter can never hide a key.
    pub fn admits_all(&self) -> bool {
        matches!(self.other, Rule::Include) && self.fixed.values().all(|r| matches!(r, Rule::Include))
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::any()
    }
}

fn retain_deletion(delete: &mut Deletion<MapKey>, visible: &Filter) {
    if let Deletion::Keys(keys) = delete {
        keys.retain(|k| visible.is_visible(k));
    }
}

/// Returns a copy of `patch` restricted to the keys `visible` admits.
///
/// A full clear always stays visible. List patches only accept filters that
/// admit everything, since list membership is positional.
pub fn filter(patch: &Patch, visible: &Filter) -> Result<Patch, PatchError> {
    let mut out = patch.clone();
    match &mut out {
        Patch::Object(p) => {
            p.set.retain(|k, _| visible.is_field_visible(k));
            p.delete.retain(|k| visible.is_field_visible(k));
            p.children.retain(|k, _| visible.is_field_visible(k));
        }
        Patch::Array(_) => {
            if !visible.admits_all() {
                return Err(PatchError::UnsupportedFilterShape);
            }
        }
        Patch::Map(p) => {
            p.set.retain(|k, _| visible.is_visible(k));
            retain_deletion(&mut p.delete, visible);
            p.children.retain(|k, _| visible.is_field_visible(k));
            p.children_by_numeric_key
                .retain(|k, _| visible.is_visible(&MapKey::Num(*k)));
        }
        Patch::Set(p) => {
            p.add.retain(|k| visible.is_visible(k));
            retain_deletion(&mut p.delete, visible);
        }
    }
    Ok(out)
}
