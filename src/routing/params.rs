//! Parameters captured by a route match.

/// Decoded path parameters.
///
/// Named captures keep template order. The wildcard tail is positional and
/// is also reachable as `get("*")` / `get("0")`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    named: Vec<(String, String)>,
    wildcard: Option<String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a parameter value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        if name == "*" || name == "0" {
            return self.wildcard();
        }
        self.named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The rejoined tail captured by a trailing `*`.
    pub fn wildcard(&self) -> Option<&str> {
        self.wildcard.as_deref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.named.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.named.len() + usize::from(self.wildcard.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.named.clear();
        self.wildcard = None;
    }

    pub(crate) fn push(&mut self, name: &str, value: impl Into<String>) {
        self.named.push((name.to_string(), value.into()));
    }

    pub(crate) fn set_wildcard(&mut self, tail: String) {
        self.wildcard = Some(tail);
    }
}
