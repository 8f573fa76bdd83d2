use std::collections::HashSet;

use crate::category_state::CategoryState;

/// Every product id already tracked by some category.
///
/// Derived from the category state files at cycle start; only used to
/// suppress duplicate "new" events across overlapping categories.
#[derive(Debug, Clone, Default)]
pub struct DeduplicationIndex {
    ids: HashSet<String>,
}

impl DeduplicationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_states<'a, I>(states: I) -> Self
    where
        I: IntoIterator<Item = &'a CategoryState>,
    {
        let mut index = Self::new();
        for state in states {
            index.absorb(state);
        }
        index
    }

    /// Add every id of `state` to the index.
    pub fn absorb(&mut self, state: &CategoryState) {
        self.ids.extend(state.ids().map(str::to_string));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for DeduplicationIndex {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::KeywordFilter;
    use crate::testutil::sample_record;

    #[test]
    fn test_union_of_category_states() {
        let filter = KeywordFilter::default();
        let mut a = CategoryState::new();
        a.update_product(&sample_record("1", 10.0, None), Utc::now(), &filter);
        a.update_product(&sample_record("2", 10.0, None), Utc::now(), &filter);
        let mut b = CategoryState::new();
        b.update_product(&sample_record("2", 10.0, None), Utc::now(), &filter);
        b.update_product(&sample_record("3", 10.0, None), Utc::now(), &filter);

        let index = DeduplicationIndex::from_states([&a, &b]);
        assert_eq!(index.len(), 3);
        assert!(index.contains("1"));
        assert!(index.contains("3"));
        assert!(!index.contains("4"));
    }

    #[test]
    fn test_from_iterator() {
        let index: DeduplicationIndex = ["a", "b"].into_iter().collect();
        assert!(index.contains("a"));
        assert!(!index.is_empty());
    }
}
