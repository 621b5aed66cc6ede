//! Doubly linked list backed by a slot arena.
//!
//! Nodes refer to their neighbours by slot index. `head.prev` and
//! `tail.next` are always `None`, including for one-element lists.

use bytes::Bytes;

type NodeId = usize;

#[derive(Debug, Clone)]
struct Node {
    value: Bytes,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct LinkedList {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl LinkedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, id: NodeId) -> &Node {
        self.slots[id].as_ref().expect("list link points at a free slot")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id].as_mut().expect("list link points at a free slot")
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    pub fn push_front(&mut self, value: impl Into<Bytes>) {
        let id = self.alloc(Node {
            value: value.into(),
            prev: None,
            next: self.head,
        });
        match self.head {
            Some(old) => self.node_mut(old).prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        self.len += 1;
    }

    pub fn push_back(&mut self, value: impl Into<Bytes>) {
        let id = self.alloc(Node {
            value: value.into(),
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(old) => self.node_mut(old).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    /// Walk to `index`, starting from whichever end is closer
    fn locate(&self, index: usize) -> Option<NodeId> {
        if index >= self.len {
            return None;
        }
        if index <= self.len / 2 {
            let mut cur = self.head;
            for _ in 0..index {
                cur = cur.and_then(|id| self.node(id).next);
            }
            cur
        } else {
            let mut cur = self.tail;
            for _ in 0..(self.len - 1 - index) {
                cur = cur.and_then(|id| self.node(id).prev);
            }
            cur
        }
    }

    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.locate(index).map(|id| &self.node(id).value)
    }

    fn unlink(&mut self, id: NodeId) -> Bytes {
        let node = self.slots[id].take().expect("list link points at a free slot");
        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }
        self.free.push(id);
        self.len -= 1;

        if self.len == 0 {
            self.slots.clear();
            self.free.clear();
        }
        node.value
    }

    pub fn remove(&mut self, index: usize) -> Option<Bytes> {
        let id = self.locate(index)?;
        Some(self.unlink(id))
    }

    pub fn pop_front(&mut self) -> Option<Bytes> {
        let id = self.head?;
        Some(self.unlink(id))
    }

    pub fn pop_back(&mut self) -> Option<Bytes> {
        let id = self.tail?;
        Some(self.unlink(id))
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cur: self.head,
        }
    }

    #[cfg(test)]
    fn assert_links(&self) {
        match (self.head, self.tail) {
            (None, None) => assert_eq!(self.len, 0),
            (Some(h), Some(t)) => {
                assert!(self.node(h).prev.is_none());
                assert!(self.node(t).next.is_none());
            }
            _ => panic!("head and tail disagree on emptiness"),
        }
        let forward: Vec<_> = self.iter().cloned().collect();
        let mut backward = Vec::new();
        let mut cur = self.tail;
        while let Some(id) = cur {
            backward.push(self.node(id).value.clone());
            cur = self.node(id).prev;
        }
        backward.reverse();
        assert_eq!(forward.len(), self.len);
        assert_eq!(forward, backward);
    }
}

pub struct Iter<'a> {
    list: &'a LinkedList,
    cur: Option<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Bytes;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.node(self.cur?);
        self.cur = node.next;
        Some(&node.value)
    }
}
