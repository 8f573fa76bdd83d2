//! Ordered fallback chains for extracting one field.
//!
//! Each field of a page is read by trying strategies in order (structured
//! payload first, then markup, then free-text patterns) until one yields a
//! value.

/// One named way of reading a field from a document `D`.
pub struct FieldStrategy<D, T> {
    pub name: &'static str,
    pub extract: fn(&D) -> Option<T>,
}

impl<D, T> FieldStrategy<D, T> {
    pub const fn new(name: &'static str, extract: fn(&D) -> Option<T>) -> Self {
        Self { name, extract }
    }
}

/// Strategies for one field, tried in order.
pub struct StrategyChain<D: 'static, T: 'static> {
    field: &'static str,
    strategies: &'static [FieldStrategy<D, T>],
}

impl<D, T> StrategyChain<D, T> {
    pub const fn new(field: &'static str, strategies: &'static [FieldStrategy<D, T>]) -> Self {
        Self { field, strategies }
    }

    /// First value produced by any strategy.
    pub fn resolve(&self, doc: &D) -> Option<T> {
        self.resolve_named(doc).map(|(_, value)| value)
    }

    /// First value produced by any strategy, with the strategy's name.
    pub fn resolve_named(&self, doc: &D) -> Option<(&'static str, T)> {
        for strategy in self.strategies {
            if let Some(value) = (strategy.extract)(doc) {
                tracing::trace!(field = self.field, strategy = strategy.name, "Field resolved");
                return Some((strategy.name, value));
            }
        }
        tracing::trace!(field = self.field, "No strategy matched");
        None
    }

    pub fn field(&self) -> &'static str {
        self.field
    }
}
