//! Resource Registry - in-memory store of VM records.
//!
//! The registry is a pure data structure with no I/O. Access from connection
//! handlers goes through [`RegistryService`], which owns the registry on a
//! single task and serializes every operation.

mod service;

pub use service::{Command, RegistryHandle, RegistryService};

use std::collections::BTreeMap;
use std::fmt;

use crate::error::RegistryError;

/// Default maximum number of records.
pub const DEFAULT_CAPACITY: usize = 128;

/// Longest VM name kept; longer names are truncated.
pub const MAX_NAME_LEN: usize = 63;

/// Memory assigned when the requested size is absent or non-positive.
pub const DEFAULT_MEMORY_MIB: u64 = 512;

const DEFAULT_NAME: &str = "vm";

/// Lifecycle state of a VM record.
///
/// Only `Stopped` exists until a real hypervisor backend drives transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Stopped,
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmState::Stopped => write!(f, "stopped"),
        }
    }
}

/// A placeholder VM resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRecord {
    pub id: u32,
    pub name: String,
    pub memory_mib: u64,
    pub state: VmState,
}

impl fmt::Display for VmRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={} name={} mem={} state={}",
            self.id, self.name, self.memory_mib, self.state
        )
    }
}

/// Ordered, capacity-bounded collection of VM records.
///
/// Ids come from a counter that starts at 1 and only ever increments, so
/// keying the map by id also keeps records in insertion order.
#[derive(Debug)]
pub struct Registry {
    vms: BTreeMap<u32, VmRecord>,
    next_id: u32,
    capacity: usize,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            vms: BTreeMap::new(),
            next_id: 1,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.vms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }

    /// Snapshot of all records in insertion order.
    pub fn list(&self) -> Vec<VmRecord> {
        self.vms.values().cloned().collect()
    }

    /// Insert a new stopped record and return its id.
    ///
    /// Fails without side effects when the registry is full; the id counter
    /// is only advanced for records that are actually inserted.
    pub fn create(&mut self, name: &str, memory_mib: i64) -> Result<u32, RegistryError> {
        if self.vms.len() >= self.capacity {
            return Err(RegistryError::CapacityExceeded(self.capacity));
        }

        let id = self.next_id;
        // Running out of ids is treated like a full registry.
        self.next_id = id
            .checked_add(1)
            .ok_or(RegistryError::CapacityExceeded(self.capacity))?;

        let record = VmRecord {
            id,
            name: normalize_name(name),
            memory_mib: if memory_mib > 0 {
                memory_mib as u64
            } else {
                DEFAULT_MEMORY_MIB
            },
            state: VmState::Stopped,
        };
        self.vms.insert(id, record);
        Ok(id)
    }

    pub fn info(&self, id: u32) -> Result<VmRecord, RegistryError> {
        self.vms
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    /// Remove a record; the relative order of the rest is unchanged.
    pub fn destroy(&mut self, id: u32) -> Result<(), RegistryError> {
        self.vms
            .remove(&id)
            .map(|_| ())
            .ok_or(RegistryError::NotFound(id))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn normalize_name(name: &str) -> String {
    if name.is_empty() {
        return DEFAULT_NAME.to_string();
    }
    name.chars().take(MAX_NAME_LEN).collect()
}
