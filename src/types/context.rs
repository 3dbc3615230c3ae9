use std::collections::BTreeMap;

use super::Value;

/// Mutable evaluation context: a flat map from dot-separated field paths
/// (`"sensor.temp"`) to [`Value`]s.
///
/// This is the context type understood by the bundled
/// [`ExprEvaluator`](crate::ExprEvaluator). Action handlers receive it by
/// `&mut` and may update it between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    fields: BTreeMap<String, Value>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.insert(path, value);
        self
    }

    /// Insert or overwrite a field, returning the previous value.
    pub fn insert(&mut self, path: &str, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(path.to_owned(), value.into())
    }

    pub fn remove(&mut self, path: &str) -> Option<Value> {
        self.fields.remove(path)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.fields.get(path)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.fields.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let ctx = Context::new().set("sensor.temp", 81_i64);
        assert_eq!(ctx.get("sensor.temp"), Some(&Value::Int(81)));
        assert_eq!(ctx.get("sensor"), None);
    }

    #[test]
    fn insert_returns_previous() {
        let mut ctx = Context::new();
        assert_eq!(ctx.insert("n", 1_i64), None);
        assert_eq!(ctx.insert("n", 2_i64), Some(Value::Int(1)));
        assert_eq!(ctx.get("n"), Some(&Value::Int(2)));
    }

    #[test]
    fn remove_field() {
        let mut ctx = Context::new().set("muted", true);
        assert_eq!(ctx.remove("muted"), Some(Value::Bool(true)));
        assert!(!ctx.contains("muted"));
        assert!(ctx.is_empty());
    }
}
