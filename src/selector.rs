// src/selector.rs

use strum_macros::{Display, EnumString};

/// How a task selector pattern is compared against scheduled task names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SelectorKind {
    Exact,
    Prefix,
    Wildcard,
}

/// Selects scheduled tasks by fully qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSelector {
    pub kind: SelectorKind,
    pub pattern: String,
}

impl TaskSelector {
    pub fn new(kind: SelectorKind, pattern: impl Into<String>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
        }
    }

    pub fn exact(name: impl Into<String>) -> Self {
        Self::new(SelectorKind::Exact, name)
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::new(SelectorKind::Prefix, prefix)
    }

    pub fn wildcard(pattern: impl Into<String>) -> Self {
        Self::new(SelectorKind::Wildcard, pattern)
    }

    /// Exact selectors name their task directly; the others need the full task list.
    pub fn needs_enumeration(&self) -> bool {
        self.kind != SelectorKind::Exact
    }

    /// Returns the members of `all_tasks` this selector picks, in their original order.
    /// Exact selectors ignore the list and yield the pattern itself.
    pub fn resolve(&self, all_tasks: &[String]) -> Vec<String> {
        match self.kind {
            SelectorKind::Exact => vec![self.pattern.clone()],
            SelectorKind::Prefix => {
                let prefix = self.pattern.to_lowercase();
                all_tasks
                    .iter()
                    .filter(|task| task.to_lowercase().starts_with(&prefix))
                    .cloned()
                    .collect()
            }
            SelectorKind::Wildcard => all_tasks
                .iter()
                .filter(|task| wildcard_match(task, &self.pattern))
                .cloned()
                .collect(),
        }
    }
}

/// Case-insensitive match where `*` stands for any run of text.
///
/// Without a `*` the whole input must equal the pattern. Otherwise each
/// non-empty literal part must occur in order, each search starting where the
/// previous part ended. Parts are not anchored to the start or end of the
/// input: `Task*` also matches `\Other Task-1`.
pub fn wildcard_match(input: &str, pattern: &str) -> bool {
    let input = input.to_lowercase();
    let pattern = pattern.to_lowercase();

    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return input == pattern;
    }

    let mut offset = 0;
    for part in parts.into_iter().filter(|part| !part.is_empty()) {
        match input[offset..].find(part) {
            Some(found) => offset += found + part.len(),
            None => return false,
        }
    }
    true
}
