//! TCP connection table (§3 TCP connection, §4.6).

use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
    Listen,
    SynSent,
    SynRecv,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    Closing,
    LastAck,
    TimeWait,
}

#[derive(Debug, Clone)]
pub struct TcpConnection {
    pub local_ip: Ipv4Addr,
    pub local_port: u16,
    pub remote_ip: Ipv4Addr,
    pub remote_port: u16,
    pub state: TcpState,
    pub seq: u32,
    pub ack: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TcpTable {
    connections: Vec<TcpConnection>,
}

impl TcpTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[TcpConnection] {
        &self.connections
    }

    /// Finds the connection matching a specific 4-tuple, falling back to a
    /// LISTEN socket on `local_port` that accepts any remote, per the
    /// lookup rule in §4.6.
    pub fn find(&self, local_port: u16, remote_ip: Ipv4Addr, remote_port: u16) -> Option<usize> {
        self.connections.iter().position(|c| {
            c.local_port == local_port && c.remote_ip == remote_ip && c.remote_port == remote_port
        })
    }

    pub fn find_listener(&self, local_port: u16) -> Option<usize> {
        self.connections
            .iter()
            .position(|c| c.local_port == local_port && c.state == TcpState::Listen)
    }

    pub fn get(&self, idx: usize) -> Option<&TcpConnection> {
        self.connections.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut TcpConnection> {
        self.connections.get_mut(idx)
    }

    pub fn insert(&mut self, connection: TcpConnection) -> usize {
        self.connections.push(connection);
        self.connections.len() - 1
    }

    pub fn remove(&mut self, idx: usize) {
        self.connections.remove(idx);
    }
}
