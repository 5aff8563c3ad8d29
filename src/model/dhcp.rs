//! DHCP server config and lease bookkeeping (§3, §4.7).

use std::net::Ipv4Addr;

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct Lease {
    pub ip: Ipv4Addr,
    pub mac: String,
    pub hostname: String,
    pub lease_start: DateTime<Utc>,
    pub lease_end: DateTime<Utc>,
}

impl Lease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.lease_end
    }
}

#[derive(Debug, Clone)]
pub struct DhcpServerConfig {
    pub interface: String,
    pub enabled: bool,
    pub pool_start: Ipv4Addr,
    pub pool_end: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub dns: Vec<Ipv4Addr>,
    pub lease_time_secs: u32,
    pub leases: Vec<Lease>,
    pub excluded: Vec<Ipv4Addr>,
}

impl DhcpServerConfig {
    /// Finds the existing non-expired lease for `mac`, or allocates the
    /// first free address in the pool (excluding reserved addresses and
    /// addresses already leased and unexpired), per §4.7.
    pub fn allocate(&mut self, mac: &str, hostname: &str, now: DateTime<Utc>) -> Option<Ipv4Addr> {
        if let Some(existing) = self
            .leases
            .iter()
            .find(|l| l.mac == mac && !l.is_expired(now))
        {
            return Some(existing.ip);
        }

        self.leases.retain(|l| !l.is_expired(now));

        let start = u32::from(self.pool_start);
        let end = u32::from(self.pool_end);
        for raw in start..=end {
            let candidate = Ipv4Addr::from(raw);
            if self.excluded.contains(&candidate) {
                continue;
            }
            if self.leases.iter().any(|l| l.ip == candidate) {
                continue;
            }
            let lease = Lease {
                ip: candidate,
                mac: mac.to_string(),
                hostname: hostname.to_string(),
                lease_start: now,
                lease_end: now + Duration::seconds(self.lease_time_secs as i64),
            };
            self.leases.push(lease);
            return Some(candidate);
        }
        None
    }

    pub fn release(&mut self, mac: &str) {
        self.leases.retain(|l| l.mac != mac);
    }
}
