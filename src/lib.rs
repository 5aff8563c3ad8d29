//! `netsim_core` — a tick-driven network topology simulation engine:
//! L2 switching with VLANs and STP, L3 routing with ARP and ICMP, DHCP,
//! stateful TCP, and firewalling, all advanced by a single `tick` call.
//!
//! Embedders build a [`model::world::World`], wire up devices and
//! connections, then drive it forward with [`engine::tick`]. Long-running
//! interactive operations (`ping`, `requestDhcp`) are modeled as
//! cooperative tasks in [`engine::ping`] and [`engine::dhcp`] that inject
//! packets and poll the world rather than blocking the scheduler.

pub mod addr;
pub mod config;
pub mod engine;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod model;

pub use config::SimConfig;
pub use errors::{SimError, SimResult};
pub use ids::{ConnectionId, DeviceId, PacketId};
pub use model::world::World;
