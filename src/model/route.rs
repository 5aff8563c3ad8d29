//! Routing table (§3 Route entry).

use std::net::Ipv4Addr;

use crate::addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Connected,
    Static,
}

#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub network: Ipv4Addr,
    pub mask: Ipv4Addr,
    /// `0.0.0.0` means directly connected.
    pub gateway: Ipv4Addr,
    pub interface: String,
    pub metric: u32,
    pub kind: RouteKind,
}

impl RouteEntry {
    pub fn is_directly_connected(&self) -> bool {
        self.gateway == Ipv4Addr::new(0, 0, 0, 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[RouteEntry] {
        &self.routes
    }

    fn find_index(&self, network: Ipv4Addr, mask: Ipv4Addr) -> Option<usize> {
        self.routes
            .iter()
            .position(|r| r.network == network && r.mask == mask)
    }

    /// Inserts or replaces the route for `(network, mask)`.
    pub fn upsert(&mut self, route: RouteEntry) {
        if let Some(idx) = self.find_index(route.network, route.mask) {
            self.routes[idx] = route;
        } else {
            self.routes.push(route);
        }
    }

    pub fn remove(&mut self, network: Ipv4Addr, mask: Ipv4Addr) -> Option<RouteEntry> {
        self.find_index(network, mask).map(|idx| self.routes.remove(idx))
    }

    pub fn remove_connected_for_interface(&mut self, interface: &str) {
        self.routes
            .retain(|r| !(r.kind == RouteKind::Connected && r.interface == interface));
    }

    /// Longest-prefix-match lookup (step 7.2 of the router/host L3 engine).
    pub fn lookup(&self, dest: Ipv4Addr) -> Option<&RouteEntry> {
        let idx = addr::longest_prefix_match(
            dest,
            self.routes.iter().map(|r| (&r.network, &r.mask)),
        )?;
        self.routes.get(idx)
    }
}
