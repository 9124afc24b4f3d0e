use crate::config::PublicationConfig;

pub type PublicationId = u64;

/// The publications owned by one client, in creation order.
#[derive(Debug, Default)]
pub(crate) struct PublicationRegistry {
    entries: Vec<(PublicationId, PublicationConfig)>,
    next_id: PublicationId,
}

impl PublicationRegistry {
    pub(crate) fn insert(&mut self, config: PublicationConfig) -> PublicationId {
        self.next_id += 1;
        self.entries.push((self.next_id, config));
        self.next_id
    }

    pub(crate) fn get(&self, id: PublicationId) -> Option<&PublicationConfig> {
        self.entries.iter().find(|(i, _)| *i == id).map(|(_, c)| c)
    }

    pub(crate) fn remove(&mut self, id: PublicationId) -> Option<PublicationConfig> {
        let index = self.entries.iter().position(|(i, _)| *i == id)?;
        Some(self.entries.remove(index).1)
    }

    pub(crate) fn ids(&self) -> Vec<PublicationId> {
        self.entries.iter().map(|(i, _)| *i).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
