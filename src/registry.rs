use std::collections::BTreeMap;

/// Session-scoped table binding update ids to their sources.
///
/// Ids start at 1 and grow monotonically, so iterating the table visits
/// sources in registration order.
#[derive(Debug)]
pub(crate) struct IdMap<V> {
    next: u64,
    map: BTreeMap<u64, V>,
}

impl<V> IdMap<V> {
    pub(crate) fn new() -> Self {
        Self {
            next: 1,
            map: BTreeMap::new(),
        }
    }

    /// Send side: binds `value` to the next free id.
    pub(crate) fn allocate(&mut self, value: V) -> u64 {
        let id = self.next;
        self.next += 1;
        self.map.insert(id, value);
        id
    }

    /// Receive side: binds `value` to an id chosen by the peer. Hands the
    /// value back if the id is already taken.
    pub(crate) fn register(&mut self, id: u64, value: V) -> Result<(), V> {
        use std::collections::btree_map::Entry;
        match self.map.entry(id) {
            Entry::Occupied(_) => Err(value),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    pub(crate) fn contains(&self, id: u64) -> bool {
        self.map.contains_key(&id)
    }

    pub(crate) fn get(&self, id: u64) -> Option<&V> {
        self.map.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut V> {
        self.map.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<V> {
        self.map.remove(&id)
    }

    /// Registered ids, ascending.
    pub(crate) fn ids(&self) -> Vec<u64> {
        self.map.keys().copied().collect()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.map.values_mut()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (u64, V)> {
        std::mem::take(&mut self.map).into_iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
