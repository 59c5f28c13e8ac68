use std::collections::HashSet;

/// The set of every parent field name referenced by any dependency rule.
///
/// Built while rules are registered. Names keep their first-registration
/// order; registering a name twice has no effect.
#[derive(Debug, Clone, Default)]
pub struct ParentRegistry {
    names: Vec<String>,
    seen: HashSet<String>,
}

impl ParentRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, name: &str) {
        if self.seen.insert(name.to_owned()) {
            self.names.push(name.to_owned());
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
