//! Map values.
//!
//! Storage preserves insertion order (`entries`) while `buckets` speeds up
//! lookup by key hash. Keys sharing a bucket are told apart with
//! [`Value::key_equals`].

use std::collections::HashMap;

use super::Value;

#[derive(Clone, Default)]
pub struct MapObject {
    entries: Vec<(Value, Value)>,
    buckets: HashMap<u64, Vec<usize>>,
}

impl MapObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later pairs overwrite earlier ones with an equal key.
    pub fn from_pairs(pairs: Vec<(Value, Value)>) -> Self {
        let mut map = Self::new();
        for (key, value) in pairs {
            map.insert(key, value);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        let index = self.find_index(key.key_hash(), key)?;
        Some(self.entries[index].1.clone())
    }

    pub fn insert(&mut self, key: Value, value: Value) {
        let hash = key.key_hash();
        if let Some(index) = self.find_index(hash, &key) {
            self.entries[index].1 = value;
            return;
        }

        let index = self.entries.len();
        self.entries.push((key, value));
        self.buckets.entry(hash).or_default().push(index);
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    fn find_index(&self, hash: u64, key: &Value) -> Option<usize> {
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|&index| self.entries[index].0.key_equals(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supports_len_get_insert_and_order() {
        let mut map = MapObject::from_pairs(vec![
            (Value::string("a"), Value::Number(1.0)),
            (Value::string("b"), Value::Number(2.0)),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Value::string("a")), Some(Value::Number(1.0)));

        map.insert(Value::string("a"), Value::Number(7.0));
        map.insert(Value::Number(3.0), Value::Nihl);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&Value::string("a")), Some(Value::Number(7.0)));
        assert_eq!(map.get(&Value::string("missing")), None);

        let keys: Vec<String> = map.entries().iter().map(|(key, _)| key.repr()).collect();
        assert_eq!(keys, vec!["'a'", "'b'", "3"]);
    }

    #[test]
    fn zero_signs_and_nan_keys_collapse() {
        let mut map = MapObject::new();
        map.insert(Value::Number(0.0), Value::string("zero"));
        map.insert(Value::Number(-0.0), Value::string("negative zero"));
        map.insert(Value::Number(f64::NAN), Value::Boolean(true));
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get(&Value::Number(0.0)),
            Some(Value::string("negative zero"))
        );
        assert_eq!(map.get(&Value::Number(f64::NAN)), Some(Value::Boolean(true)));
    }

    #[test]
    fn collection_keys_compare_by_identity() {
        let first = Value::array(vec![Value::Number(1.0)]);
        let twin = Value::array(vec![Value::Number(1.0)]);
        let mut map = MapObject::new();
        map.insert(first.clone(), Value::string("first"));

        assert_eq!(map.get(&first), Some(Value::string("first")));
        assert_eq!(map.get(&twin), None);
    }

    #[test]
    fn different_types_never_alias() {
        let map = MapObject::from_pairs(vec![
            (Value::Number(1.0), Value::string("number")),
            (Value::Boolean(true), Value::string("boolean")),
            (Value::string("1"), Value::string("string")),
        ]);
        assert_eq!(map.len(), 3);
    }
}
