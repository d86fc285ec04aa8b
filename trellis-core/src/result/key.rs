use std::hash::Hash;
use std::hash::Hasher;

use serde_json_bytes::ByteString;

use crate::json_ext::Json;
use crate::json_ext::Object;
use crate::json_ext::hash_json;

/// Identity of a field within an object result: schema field name, optional
/// alias and fully-coerced argument values.
///
/// An alias equal to the field name is erased at construction, so `x` and
/// `x: x` produce the same key. Argument equality is structural and
/// order-independent.
#[derive(Clone, Debug, PartialEq)]
pub struct Key {
    name: ByteString,
    alias: Option<ByteString>,
    arguments: Object,
}

impl Key {
    pub fn new(name: impl Into<ByteString>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: Object::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<ByteString>) -> Self {
        let alias = alias.into();
        self.alias = (alias.as_str() != self.name.as_str()).then_some(alias);
        self
    }

    pub fn with_arguments(mut self, arguments: Object) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_argument(mut self, name: impl Into<ByteString>, value: Json) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_ref().map(ByteString::as_str)
    }

    pub fn arguments(&self) -> &Object {
        &self.arguments
    }

    /// The key this field appears under in the response.
    pub fn response_key(&self) -> &str {
        self.alias().unwrap_or_else(|| self.name())
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.as_str().hash(state);
        self.alias().hash(state);
        state.write_usize(self.arguments.len());
        let mut entries: Vec<_> = self.arguments.iter().collect();
        entries.sort_by_key(|(name, _)| name.as_str());
        for (name, value) in entries {
            name.as_str().hash(state);
            hash_json(value, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use serde_json_bytes::json;

    use super::*;

    fn hash_of(key: &Key) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn redundant_alias_is_erased() {
        let plain = Key::new("x");
        let aliased = Key::new("x").with_alias("x");
        assert_eq!(plain, aliased);
        assert_eq!(hash_of(&plain), hash_of(&aliased));
        assert_eq!(aliased.alias(), None);
    }

    #[test]
    fn distinct_alias_distinguishes_keys() {
        let plain = Key::new("x");
        let aliased = Key::new("x").with_alias("y");
        assert_ne!(plain, aliased);
        assert_eq!(aliased.response_key(), "y");
    }

    #[test]
    fn argument_order_does_not_matter() {
        let a = Key::new("f")
            .with_argument("first", json!(1))
            .with_argument("second", json!(2));
        let b = Key::new("f")
            .with_argument("second", json!(2))
            .with_argument("first", json!(1));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn argument_values_distinguish_keys() {
        let a = Key::new("f").with_argument("limit", json!(1));
        let b = Key::new("f").with_argument("limit", json!(2));
        assert_ne!(a, b);
    }
}
