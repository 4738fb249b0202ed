use std::collections::HashSet;

/// The organisation's own extensions
///
/// Fixed at construction. Classification is exact string match.
#[derive(Debug, Clone, Default)]
pub struct InternalNumbers {
    numbers: HashSet<String>,
}

impl InternalNumbers {
    pub fn new<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            numbers: numbers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_internal(&self, number: &str) -> bool {
        self.numbers.contains(number)
    }

    /// True when exactly one side is internal
    ///
    /// Internal-to-internal (intercom) and external-to-external (trunk to
    /// trunk) pairs are not reported.
    pub fn bridges_outside(&self, caller: &str, callee: &str) -> bool {
        self.is_internal(caller) != self.is_internal(callee)
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    /// Sorted, for stable output
    pub fn sorted(&self) -> Vec<&str> {
        let mut numbers: Vec<&str> = self.numbers.iter().map(String::as_str).collect();
        numbers.sort_unstable();
        numbers
    }
}
