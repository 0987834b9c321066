//! Recency-ordered list with O(1) lookup, promotion and removal
//!
//! A doubly linked list threaded through a `HashMap`: each entry stores the
//! keys of its neighbours, so moving an entry to the front never scans the list.

use std::collections::HashMap;

use uuid::Uuid;

#[derive(Debug, Clone)]
struct Node<V> {
    value: V,
    prev: Option<Uuid>,
    next: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct RecencyList<V> {
    nodes: HashMap<Uuid, Node<V>>,
    head: Option<Uuid>,
    tail: Option<Uuid>,
}

impl<V> RecencyList<V> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: Uuid) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn get(&self, key: Uuid) -> Option<&V> {
        self.nodes.get(&key).map(|n| &n.value)
    }

    pub fn front(&self) -> Option<&V> {
        self.head.and_then(|k| self.get(k))
    }

    /// Insert or replace `key`, placing it at the front
    pub fn upsert_front(&mut self, key: Uuid, value: V) {
        self.unlink(key);
        self.link_front(key, value);
    }

    /// Append `key` at the back; used when seeding from an ordered snapshot
    pub fn push_back(&mut self, key: Uuid, value: V) {
        self.unlink(key);
        let node = Node {
            value,
            prev: self.tail,
            next: None,
        };
        match self.tail.and_then(|t| self.nodes.get_mut(&t)) {
            Some(tail) => tail.next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.nodes.insert(key, node);
    }

    pub fn remove(&mut self, key: Uuid) -> Option<V> {
        self.unlink(key)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Front to back
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    fn link_front(&mut self, key: Uuid, value: V) {
        let node = Node {
            value,
            prev: None,
            next: self.head,
        };
        match self.head.and_then(|h| self.nodes.get_mut(&h)) {
            Some(head) => head.prev = Some(key),
            None => self.tail = Some(key),
        }
        self.head = Some(key);
        self.nodes.insert(key, node);
    }

    fn unlink(&mut self, key: Uuid) -> Option<V> {
        let node = self.nodes.remove(&key)?;

        match node.prev.and_then(|p| self.nodes.get_mut(&p)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|n| self.nodes.get_mut(&n)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }

        Some(node.value)
    }
}

impl<V> Default for RecencyList<V> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a, V> {
    list: &'a RecencyList<V>,
    cursor: Option<Uuid>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let node = self.list.nodes.get(&key)?;
        self.cursor = node.next;
        Some(&node.value)
    }
}
