//! ARP table (§3 ARP entry): per-device IP→MAC cache.

use std::collections::HashMap;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpEntryKind {
    Static,
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct ArpEntry {
    pub mac: String,
    pub interface: String,
    pub kind: ArpEntryKind,
    pub age: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ArpTable {
    entries: HashMap<Ipv4Addr, ArpEntry>,
}

impl ArpTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ip: &Ipv4Addr) -> Option<&ArpEntry> {
        self.entries.get(ip)
    }

    pub fn upsert(&mut self, ip: Ipv4Addr, mac: impl Into<String>, interface: impl Into<String>, kind: ArpEntryKind) {
        self.entries.insert(
            ip,
            ArpEntry {
                mac: mac.into(),
                interface: interface.into(),
                kind,
                age: 0,
            },
        );
    }

    pub fn set_static(&mut self, ip: Ipv4Addr, mac: impl Into<String>, interface: impl Into<String>) {
        self.upsert(ip, mac, interface, ArpEntryKind::Static);
    }

    pub fn remove(&mut self, ip: &Ipv4Addr) -> Option<ArpEntry> {
        self.entries.remove(ip)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ipv4Addr, &ArpEntry)> {
        self.entries.iter()
    }

    pub fn age_all(&mut self, timeout: u32) -> Vec<Ipv4Addr> {
        let mut expired = Vec::new();
        for (ip, entry) in self.entries.iter_mut() {
            if entry.kind == ArpEntryKind::Dynamic {
                entry.age += 1;
                if entry.age >= timeout {
                    expired.push(*ip);
                }
            }
        }
        for ip in &expired {
            self.entries.remove(ip);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces() {
        let mut table = ArpTable::new();
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        table.upsert(ip, "AA:AA:AA:AA:AA:AA", "eth0", ArpEntryKind::Dynamic);
        table.upsert(ip, "BB:BB:BB:BB:BB:BB", "eth0", ArpEntryKind::Dynamic);
        assert_eq!(table.get(&ip).unwrap().mac, "BB:BB:BB:BB:BB:BB");
        assert_eq!(table.iter().count(), 1);
    }
}
