//! Tag classification.
//!
//! Tags live in one flat namespace. A [`RuleTable`] partitions them into
//! categories by key prefix: rules are tried in order, the first match
//! wins and keys no rule matches land in the table's default category.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::api::{model::ModelAlias, KeyValue, KeyValues};

pub type Tags = BTreeMap<String, String>;

/// A `key`/`value` shaped upstream record.
pub trait Pair {
    fn pair(&self) -> (&str, &str);
}

impl Pair for KeyValue {
    fn pair(&self) -> (&str, &str) {
        (&self.key, &self.value)
    }
}

impl Pair for ModelAlias {
    fn pair(&self) -> (&str, &str) {
        (&self.alias, &self.version)
    }
}

/// Converts an upstream key/value list to a mapping. Later duplicates win.
pub fn to_map<T: Pair>(list: &[T]) -> Tags {
    list.iter()
        .map(|item| {
            let (key, value) = item.pair();
            (key.to_owned(), value.to_owned())
        })
        .collect()
}

impl<T: Pair> KeyValues<T> {
    /// The mapping form. Already converted values are returned as they are.
    pub fn to_map(&self) -> Tags {
        match self {
            KeyValues::List(list) => to_map(list),
            KeyValues::Map(map) => map.clone(),
        }
    }
}

/// How a rule looks at a tag key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    Prefix(&'static str),
}

impl KeyMatch {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyMatch::Prefix(prefix) => key.starts_with(prefix),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule<C> {
    pub key: KeyMatch,
    pub category: C,
}

const fn prefix<C>(prefix: &'static str, category: C) -> Rule<C> {
    Rule {
        key: KeyMatch::Prefix(prefix),
        category,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RuleTable<C: 'static> {
    pub rules: &'static [Rule<C>],
    pub default: C,
}

impl<C: Copy + Ord + 'static> RuleTable<C> {
    pub fn category_of(&self, key: &str) -> C {
        self.rules
            .iter()
            .find(|rule| rule.key.matches(key))
            .map(|rule| rule.category)
            .unwrap_or(self.default)
    }

    /// Every category this table can produce, in rule order, default last.
    pub fn categories(&self) -> Vec<C> {
        let mut categories = Vec::with_capacity(self.rules.len() + 1);
        for category in self.rules.iter().map(|rule| rule.category).chain(Some(self.default)) {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        categories
    }

    /// Partitions `tags`. Every category of the table is present in the
    /// result, empty if no tag fell into it.
    pub fn classify(&self, tags: &Tags) -> BTreeMap<C, Tags> {
        let mut classified: BTreeMap<C, Tags> =
            self.categories().into_iter().map(|category| (category, Tags::new())).collect();
        for (key, value) in tags {
            classified
                .entry(self.category_of(key))
                .or_default()
                .insert(key.clone(), value.clone());
        }
        classified
    }
}

/// Prefix shared by all tags the tracking service sets itself.
pub const SYSTEM_PREFIX: &str = "mlflow";

/// Categories of run tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTagCategory {
    Git,
    Notebook,
    Cluster,
    Workspace,
    Source,
    OtherSystem,
    User,
}

impl RunTagCategory {
    pub fn title(self) -> &'static str {
        match self {
            RunTagCategory::Git => "Git Repo Tags",
            RunTagCategory::Notebook => "Notebook Tags",
            RunTagCategory::Cluster => "Cluster Tags",
            RunTagCategory::Workspace => "Workspace Tags",
            RunTagCategory::Source => "Source Tags",
            RunTagCategory::OtherSystem => "Other System Tags",
            RunTagCategory::User => "User Tags",
        }
    }
}

pub const RUN_TAG_RULES: RuleTable<RunTagCategory> = RuleTable {
    rules: &[
        prefix("mlflow.databricks.gitRepo", RunTagCategory::Git),
        prefix("mlflow.databricks.notebook", RunTagCategory::Notebook),
        prefix("mlflow.databricks.cluster", RunTagCategory::Cluster),
        prefix("mlflow.databricks.w", RunTagCategory::Workspace),
        prefix("mlflow.source.", RunTagCategory::Source),
        prefix(SYSTEM_PREFIX, RunTagCategory::OtherSystem),
    ],
    default: RunTagCategory::User,
};

/// Categories of registered model and experiment tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemTagCategory {
    System,
    User,
}

impl SystemTagCategory {
    pub fn title(self) -> &'static str {
        match self {
            SystemTagCategory::System => "MLflow System Tags",
            SystemTagCategory::User => "User Tags",
        }
    }
}

pub const SYSTEM_TAG_RULES: RuleTable<SystemTagCategory> = RuleTable {
    rules: &[prefix(SYSTEM_PREFIX, SystemTagCategory::System)],
    default: SystemTagCategory::User,
};
