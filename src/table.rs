// File: src/table.rs
//
// Open-addressed hash table keyed by interned strings.
// Backs both the string intern set and the global variable table. Probing is
// linear over a power-of-two capacity; deletes leave tombstones so later
// probe sequences stay intact.

use std::rc::Rc;

use crate::value::{hash_str, StrObj, Value};

const TABLE_MAX_LOAD: f64 = 0.75;

/// A slot is one of: live (key present), empty (no key, nil value), or a
/// tombstone (no key, `true` value).
#[derive(Debug, Clone)]
struct Entry {
    key: Option<Rc<StrObj>>,
    value: Value,
}

impl Entry {
    fn empty() -> Self {
        Self { key: None, value: Value::Nil }
    }
}

#[derive(Debug, Default)]
pub struct Table {
    /// Live entries plus tombstones; load factor is computed against this.
    count: usize,
    entries: Vec<Entry>,
}

impl Table {
    pub fn new() -> Self {
        Self { count: 0, entries: Vec::new() }
    }

    /// Slot index for `key`: its live entry if present, otherwise the slot
    /// an insert should use (the first tombstone on the probe path, or the
    /// trailing empty slot). Keys are interned, so comparison is identity.
    fn find_entry(entries: &[Entry], key: &Rc<StrObj>) -> usize {
        let mask = entries.len() - 1;
        let mut index = key.hash as usize & mask;
        let mut tombstone: Option<usize> = None;

        loop {
            let entry = &entries[index];
            match &entry.key {
                None => {
                    if matches!(entry.value, Value::Nil) {
                        return tombstone.unwrap_or(index);
                    }
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Some(existing) => {
                    if Rc::ptr_eq(existing, key) {
                        return index;
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    fn adjust_capacity(&mut self, capacity: usize) {
        let old = std::mem::replace(&mut self.entries, vec![Entry::empty(); capacity]);
        self.count = 0;
        for entry in old {
            if let Some(key) = entry.key {
                let index = Self::find_entry(&self.entries, &key);
                self.entries[index] = Entry { key: Some(key), value: entry.value };
                self.count += 1;
            }
        }
    }

    /// Insert or overwrite. Returns true when `key` was not present before.
    pub fn set(&mut self, key: Rc<StrObj>, value: Value) -> bool {
        if (self.count + 1) as f64 > self.entries.len() as f64 * TABLE_MAX_LOAD {
            let capacity = if self.entries.len() < 8 { 8 } else { self.entries.len() * 2 };
            self.adjust_capacity(capacity);
        }

        let index = Self::find_entry(&self.entries, &key);
        let entry = &mut self.entries[index];
        let is_new_key = entry.key.is_none();
        if is_new_key && matches!(entry.value, Value::Nil) {
            // Fresh slot; tombstone reuse keeps the count unchanged.
            self.count += 1;
        }
        entry.key = Some(key);
        entry.value = value;
        is_new_key
    }

    pub fn get(&self, key: &Rc<StrObj>) -> Option<Value> {
        if self.count == 0 {
            return None;
        }
        let index = Self::find_entry(&self.entries, key);
        let entry = &self.entries[index];
        entry.key.as_ref().map(|_| entry.value.clone())
    }

    /// Remove `key`, leaving a tombstone. Returns whether it was present.
    pub fn delete(&mut self, key: &Rc<StrObj>) -> bool {
        if self.count == 0 {
            return false;
        }
        let index = Self::find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        if entry.key.is_none() {
            return false;
        }
        entry.key = None;
        entry.value = Value::Bool(true);
        true
    }

    /// Lookup by raw bytes and hash, used to deduplicate before allocating
    /// a new string object.
    pub fn find_string(&self, text: &str, hash: u32) -> Option<Rc<StrObj>> {
        if self.count == 0 {
            return None;
        }
        let mask = self.entries.len() - 1;
        let mut index = hash as usize & mask;
        loop {
            let entry = &self.entries[index];
            match &entry.key {
                None => {
                    if matches!(entry.value, Value::Nil) {
                        return None;
                    }
                }
                Some(key) => {
                    if key.hash == hash && &*key.chars == text {
                        return Some(Rc::clone(key));
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    /// The canonical object for `text`, allocating it on first sight.
    pub fn intern(&mut self, text: &str) -> Rc<StrObj> {
        let hash = hash_str(text);
        if let Some(existing) = self.find_string(text, hash) {
            return existing;
        }
        let key = Rc::new(StrObj { chars: text.into(), hash });
        self.set(Rc::clone(&key), Value::Nil);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_returns_one_object_per_byte_sequence() {
        let mut table = Table::new();
        let a = table.intern("hello");
        let b = table.intern("hello");
        let c = table.intern("world");
        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_set_get_overwrite() {
        let mut table = Table::new();
        let mut names = Table::new();
        let key = names.intern("answer");

        assert!(table.set(Rc::clone(&key), Value::Number(1.0)));
        assert!(!table.set(Rc::clone(&key), Value::Number(42.0)));
        assert_eq!(table.get(&key), Some(Value::Number(42.0)));
    }

    #[test]
    fn test_get_missing_is_none() {
        let mut names = Table::new();
        let key = names.intern("ghost");
        let table = Table::new();
        assert_eq!(table.get(&key), None);
    }

    #[test]
    fn test_delete_leaves_probing_intact() {
        let mut table = Table::new();
        let mut names = Table::new();
        let keys: Vec<_> = (0..16).map(|i| names.intern(&format!("key{}", i))).collect();
        for (i, key) in keys.iter().enumerate() {
            table.set(Rc::clone(key), Value::Number(i as f64));
        }

        assert!(table.delete(&keys[3]));
        assert!(!table.delete(&keys[3]));
        assert_eq!(table.get(&keys[3]), None);

        // Entries that may have probed past the tombstone are still found.
        for (i, key) in keys.iter().enumerate() {
            if i != 3 {
                assert_eq!(table.get(key), Some(Value::Number(i as f64)), "lost key{}", i);
            }
        }
    }

    #[test]
    fn test_tombstone_slot_is_reused() {
        let mut table = Table::new();
        let mut names = Table::new();
        let key = names.intern("slot");
        table.set(Rc::clone(&key), Value::Bool(false));
        table.delete(&key);
        assert!(table.set(Rc::clone(&key), Value::Bool(true)));
        assert_eq!(table.get(&key), Some(Value::Bool(true)));
    }

    #[test]
    fn test_growth_preserves_entries() {
        let mut table = Table::new();
        let mut names = Table::new();
        let keys: Vec<_> = (0..200).map(|i| names.intern(&format!("v{}", i))).collect();
        for (i, key) in keys.iter().enumerate() {
            table.set(Rc::clone(key), Value::Number(i as f64));
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(table.get(key), Some(Value::Number(i as f64)));
        }
    }

    #[test]
    fn test_find_string_matches_bytes_not_identity() {
        let mut table = Table::new();
        let interned = table.intern("needle");
        let found = table.find_string("needle", hash_str("needle"));
        assert!(matches!(found, Some(ref f) if Rc::ptr_eq(f, &interned)));
        assert!(table.find_string("missing", hash_str("missing")).is_none());
    }
}
