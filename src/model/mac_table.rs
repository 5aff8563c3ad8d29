//! Switch MAC table (§3 MAC table entry): (MAC, VLAN) → port, learned from
//! ingress frames. The same MAC in two VLANs yields two independent
//! entries, per the invariant in §3.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacEntryKind {
    Static,
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct MacEntry {
    pub port: String,
    pub kind: MacEntryKind,
    pub age: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MacTable {
    entries: HashMap<(String, u16), MacEntry>,
}

impl MacTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, mac: &str, vlan: u16) -> Option<&MacEntry> {
        self.entries.get(&(mac.to_string(), vlan))
    }

    /// Learns `mac` on `port` within `vlan`. A MAC re-learned on a new port
    /// for the same VLAN replaces the old port, satisfying the uniqueness
    /// invariant.
    pub fn learn(&mut self, mac: &str, vlan: u16, port: impl Into<String>) {
        self.entries.insert(
            (mac.to_string(), vlan),
            MacEntry {
                port: port.into(),
                kind: MacEntryKind::Dynamic,
                age: 0,
            },
        );
    }

    pub fn remove_port(&mut self, port: &str) {
        self.entries.retain(|_, entry| entry.port != port);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(String, u16), &MacEntry)> {
        self.entries.iter()
    }

    pub fn age_all(&mut self, timeout: u32) -> Vec<(String, u16)> {
        let mut expired = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            if entry.kind == MacEntryKind::Dynamic {
                entry.age += 1;
                if entry.age >= timeout {
                    expired.push(key.clone());
                }
            }
        }
        for key in &expired {
            self.entries.remove(key);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_mac_different_vlans_are_independent() {
        let mut table = MacTable::new();
        table.learn("AA:AA:AA:AA:AA:AA", 10, "Fa0/1");
        table.learn("AA:AA:AA:AA:AA:AA", 20, "Fa0/2");
        assert_eq!(table.lookup("AA:AA:AA:AA:AA:AA", 10).unwrap().port, "Fa0/1");
        assert_eq!(table.lookup("AA:AA:AA:AA:AA:AA", 20).unwrap().port, "Fa0/2");
    }

    #[test]
    fn relearning_moves_port() {
        let mut table = MacTable::new();
        table.learn("AA:AA:AA:AA:AA:AA", 1, "Fa0/1");
        table.learn("AA:AA:AA:AA:AA:AA", 1, "Fa0/2");
        assert_eq!(table.iter().count(), 1);
        assert_eq!(table.lookup("AA:AA:AA:AA:AA:AA", 1).unwrap().port, "Fa0/2");
    }
}
