//! VLAN catalog (§3 VLAN).

use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Vlan {
    pub id: u16,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct VlanCatalog {
    vlans: BTreeMap<u16, Vlan>,
}

impl Default for VlanCatalog {
    fn default() -> Self {
        let mut vlans = BTreeMap::new();
        vlans.insert(
            1,
            Vlan {
                id: 1,
                name: "default".to_string(),
            },
        );
        Self { vlans }
    }
}

impl VlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: u16) -> bool {
        self.vlans.contains_key(&id)
    }

    pub fn get(&self, id: u16) -> Option<&Vlan> {
        self.vlans.get(&id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Vlan> {
        self.vlans.values()
    }

    pub fn add(&mut self, id: u16, name: impl Into<String>) {
        self.vlans.insert(id, Vlan { id, name: name.into() });
    }

    /// Refuses id 1, per §6.
    pub fn remove(&mut self, id: u16) -> bool {
        if id == 1 {
            return false;
        }
        self.vlans.remove(&id).is_some()
    }

    pub fn rename(&mut self, id: u16, name: impl Into<String>) -> bool {
        match self.vlans.get_mut(&id) {
            Some(v) => {
                v.name = name.into();
                true
            }
            None => false,
        }
    }
}

pub fn is_valid_vlan_id(id: u16) -> bool {
    (1..=4094).contains(&id)
}
