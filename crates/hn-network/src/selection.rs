use std::collections::BTreeSet;

use hn_core::EntityId;

/// Multi-selection model for the network editor.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Selection {
    ids: BTreeSet<EntityId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn add(&mut self, id: EntityId) {
        self.ids.insert(id);
    }

    pub fn remove(&mut self, id: &str) {
        self.ids.remove(id);
    }

    pub fn toggle(&mut self, id: EntityId) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.ids.iter()
    }

    /// True if any of `ids` is currently selected.
    pub fn references_any<'a>(&self, ids: impl IntoIterator<Item = &'a EntityId>) -> bool {
        ids.into_iter().any(|id| self.ids.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_and_references() {
        let j1 = EntityId::new("J1").unwrap();
        let p1 = EntityId::new("P1").unwrap();
        let mut sel = Selection::new();
        sel.toggle(j1.clone());
        assert!(sel.contains("J1"));
        assert!(sel.references_any([&p1, &j1]));
        assert!(!sel.references_any([&p1]));
        sel.toggle(j1);
        assert!(sel.is_empty());
    }
}
