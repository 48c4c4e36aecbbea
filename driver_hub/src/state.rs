use std::collections::HashMap;

use crate::driver::{ConnectionId, Driver, Metadata, PositionUpdate};

/// Registry of the drivers currently sharing their position.
#[derive(Debug, Default)]
pub struct State {
    drivers: HashMap<ConnectionId, Driver>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the driver for `id`, replacing any earlier record for the same
    /// connection. Returns the replaced record.
    pub fn join(&mut self, id: ConnectionId, metadata: Metadata) -> Option<Driver> {
        let driver = Driver::new(id.clone(), metadata);
        self.drivers.insert(id, driver)
    }

    /// Returns `None` without touching the registry if `id` never joined.
    pub fn update_position(&mut self, id: &ConnectionId, update: &PositionUpdate) -> Option<&Driver> {
        let driver = self.drivers.get_mut(id)?;
        driver.apply(update);
        Some(&*driver)
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<Driver> {
        self.drivers.remove(id)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Driver> {
        self.drivers.get(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.drivers.contains_key(id)
    }

    pub fn snapshot(&self) -> Vec<Driver> {
        self.drivers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}
