//! Compiled-expression cache keyed by exact source text.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::eval::{evaluate, FormulaScope};
use super::{compile, Expr, ExprError, Value};

type Compiled = Arc<Result<Expr, ExprError>>;

/// Caches compiled expressions (and compile failures) by source text.
///
/// Lives as long as one loaded project; [`ExpressionCache::clear`] is
/// called whenever the project is replaced.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    compiled: RwLock<HashMap<String, Compiled>>,
}

impl ExpressionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled form of `source`, compiling on first use.
    pub fn get_or_compile(&self, source: &str) -> Compiled {
        if let Some(hit) = self.compiled.read().get(source) {
            return Arc::clone(hit);
        }
        let compiled = Arc::new(compile(source));
        let mut write = self.compiled.write();
        Arc::clone(write.entry(source.to_string()).or_insert(compiled))
    }

    /// Compiles (or reuses) and evaluates `source`.
    ///
    /// # Errors
    ///
    /// Returns the compile error, or any evaluation error.
    pub fn evaluate(&self, source: &str, scope: &dyn FormulaScope) -> Result<Value, ExprError> {
        match self.get_or_compile(source).as_ref() {
            Ok(expr) => evaluate(expr, scope),
            Err(err) => Err(err.clone()),
        }
    }

    /// Number of cached sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.compiled.read().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compiled.read().is_empty()
    }

    /// Drops every cached expression.
    pub fn clear(&self) {
        self.compiled.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty;

    impl FormulaScope for Empty {
        fn quantity(&self, _item_id: &str) -> i64 {
            0
        }
        fn selected_len(&self) -> usize {
            0
        }
        fn currency(&self, _currency_id: &str) -> Option<f64> {
            None
        }
        fn group_count(&self, _group_id: &str) -> Option<i64> {
            None
        }
        fn tag_count(&self, _tag: &str) -> i64 {
            0
        }
        fn this_group(&self) -> Option<i64> {
            None
        }
    }

    #[test]
    fn test_compiles_once_per_source() {
        let cache = ExpressionCache::new();
        let first = cache.get_or_compile("1 + 1");
        let second = cache.get_or_compile("1 + 1");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        cache.get_or_compile("1 +  1");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failures_are_cached() {
        let cache = ExpressionCache::new();
        assert!(cache.evaluate("1 +", &Empty).is_err());
        assert!(cache.evaluate("1 +", &Empty).is_err());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = ExpressionCache::new();
        assert_eq!(cache.evaluate("this_group + 2", &Empty).unwrap(), Value::Number(2.0));
        cache.clear();
        assert!(cache.is_empty());
    }
}
