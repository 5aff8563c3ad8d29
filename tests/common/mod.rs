//! Shared scaffolding for black-box tests against the public `World` API.
#![allow(dead_code)]

use std::net::Ipv4Addr;

use netsim_core::config::SimConfig;
use netsim_core::engine;
use netsim_core::ids::DeviceId;
use netsim_core::model::device::DeviceKind;
use netsim_core::model::interface::Interface;
use netsim_core::model::packet::Packet;
use netsim_core::World;

/// A world with a high link speed so on-link progress crosses in a single
/// tick, keeping test tick budgets small without faking the scheduler.
pub fn fast_world() -> World {
    let mut config = SimConfig::default();
    config.default_speed = 50.0;
    World::new(config)
}

pub fn add_pc(world: &mut World, hostname: &str, mac: &str, ip: Ipv4Addr, mask: Ipv4Addr, gateway: Option<Ipv4Addr>) -> DeviceId {
    let id = world.add_device(DeviceKind::Pc, hostname);
    world.add_interface(id, Interface::new("eth0", mac)).unwrap();
    world.configure_interface_ip(id, "eth0", ip, mask).unwrap();
    if let Some(gw) = gateway {
        world.device_mut(id).unwrap().interface_mut("eth0").unwrap().gateway = Some(gw);
    }
    id
}

pub fn run_ticks(world: &mut World, n: u32) {
    for _ in 0..n {
        engine::tick(world);
    }
}

/// Ticks `world` up to `max_ticks` times, stopping the first tick where some
/// packet in `world.packets` matches `pred`. `Stage::Arrived` packets are
/// only visible for the one tick they're produced in, so this checks right
/// after each `tick()` rather than scanning after the whole loop.
pub fn run_until(world: &mut World, max_ticks: u32, pred: impl Fn(&Packet) -> bool) -> bool {
    for _ in 0..max_ticks {
        engine::tick(world);
        if world.packets.iter().any(&pred) {
            return true;
        }
    }
    false
}
