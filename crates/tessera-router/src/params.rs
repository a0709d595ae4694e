//! Variables captured while resolving a URL.
//!
//! Most URLs carry only a handful of `key|value` pairs or bind placeholders,
//! so the pairs live inline in a small vector.

use smallvec::SmallVec;

const INLINE_VARS: usize = 4;

/// Ordered variables extracted from a URL.
///
/// Inserting an existing name replaces its value in place, so the first
/// position of a name is kept.
///
/// # Example
///
/// ```rust
/// use tessera_router::Vars;
///
/// let mut vars = Vars::new();
/// vars.insert("page", "1");
/// vars.insert("sort", "name");
/// vars.insert("page", "2");
///
/// assert_eq!(vars.get("page"), Some("2"));
/// assert_eq!(vars.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Vars {
    inner: SmallVec<[(String, String); INLINE_VARS]>,
}

impl Vars {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, replacing an earlier value of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.inner.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.inner.push((name, value)),
        }
    }

    /// Returns the value of a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Moves every variable of `other` into this set.
    pub fn extend(&mut self, other: Self) {
        for (name, value) in other.inner {
            self.insert(name, value);
        }
    }

    /// Returns true if there are no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl IntoIterator for Vars {
    type Item = (String, String);
    type IntoIter = smallvec::IntoIter<[(String, String); INLINE_VARS]>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Vars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Self::new();
        for (name, value) in iter {
            vars.insert(name, value);
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut vars = Vars::new();
        vars.insert("a", "1");
        vars.insert("b", "2");
        vars.insert("a", "3");

        let pairs: Vec<_> = vars.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_extend_and_collect() {
        let mut vars: Vars = [("id", "7")].into_iter().collect();
        vars.extend([("id", "8"), ("name", "x")].into_iter().collect());

        assert_eq!(vars.get("id"), Some("8"));
        assert_eq!(vars.get("name"), Some("x"));
        assert_eq!(vars.get("missing"), None);
    }

    #[test]
    fn test_inline_capacity_spills() {
        let vars: Vars = (0..10).map(|i| (format!("k{i}"), i.to_string())).collect();
        assert_eq!(vars.len(), 10);
        assert_eq!(vars.get("k9"), Some("9"));
        assert_eq!(vars.into_iter().count(), 10);
    }
}
