//! Property-based laws over the public `World` API: the ones named
//! explicitly alongside the end-to-end scenarios — ARP upsert idempotence,
//! MAC-learning idempotence, STP convergence idempotence, and add/remove
//! route round-tripping.

use proptest::prelude::*;
use std::net::Ipv4Addr;

use netsim_core::config::SimConfig;
use netsim_core::engine;
use netsim_core::model::arp::ArpEntryKind;
use netsim_core::model::device::DeviceKind;
use netsim_core::model::interface::Interface;
use netsim_core::model::stp::{PortRole, PortState};
use netsim_core::World;

fn arb_ip() -> impl Strategy<Value = Ipv4Addr> {
    (1u8..254, 0u8..255, 0u8..255, 1u8..254).prop_map(|(a, b, c, d)| Ipv4Addr::new(a, b, c, d))
}

fn arb_mask() -> impl Strategy<Value = Ipv4Addr> {
    prop_oneof![
        Just(Ipv4Addr::new(255, 255, 255, 0)),
        Just(Ipv4Addr::new(255, 255, 0, 0)),
        Just(Ipv4Addr::new(255, 0, 0, 0)),
    ]
}

fn arb_mac() -> impl Strategy<Value = String> {
    (1u8..255, 1u8..255, 1u8..255)
        .prop_map(|(x, y, z)| format!("AA:BB:CC:{:02X}:{:02X}:{:02X}", x, y, z))
}

proptest! {
    #[test]
    fn arp_upsert_is_idempotent(ip in arb_ip(), mac in arb_mac()) {
        let mut world = World::new(SimConfig::default());
        let pc = world.add_device(DeviceKind::Pc, "pc1");

        let once_mac = {
            let dev = world.device_mut(pc).unwrap();
            dev.arp.upsert(ip, mac.clone(), "eth0", ArpEntryKind::Dynamic);
            dev.arp.get(&ip).map(|e| e.mac.clone())
        };
        let twice_mac = {
            let dev = world.device_mut(pc).unwrap();
            dev.arp.upsert(ip, mac.clone(), "eth0", ArpEntryKind::Dynamic);
            dev.arp.get(&ip).map(|e| e.mac.clone())
        };

        prop_assert_eq!(once_mac, twice_mac);
        prop_assert_eq!(world.device(pc).unwrap().arp.iter().count(), 1);
    }

    #[test]
    fn mac_learning_is_idempotent(mac in arb_mac(), vlan in 1u16..100, port_idx in 1u16..9) {
        let port = format!("Fa0/{port_idx}");
        let mut world = World::new(SimConfig::default());
        let sw = world.add_device(DeviceKind::Switch, "sw1");

        let dev = world.device_mut(sw).unwrap();
        dev.switch.mac_table.learn(&mac, vlan, port.clone());
        dev.switch.mac_table.learn(&mac, vlan, port.clone());

        prop_assert_eq!(dev.switch.mac_table.iter().count(), 1);
        prop_assert_eq!(dev.switch.mac_table.lookup(&mac, vlan).map(|e| e.port.clone()), Some(port));
    }

    #[test]
    fn add_remove_route_round_trips(network in arb_ip(), mask in arb_mask(), gateway in arb_ip()) {
        let mut world = World::new(SimConfig::default());
        let r = world.add_device(DeviceKind::Router, "r1");

        world.add_route(r, network, mask, gateway, "Gi0/1", 1).unwrap();
        prop_assert!(world
            .device(r)
            .unwrap()
            .router
            .routes
            .all()
            .iter()
            .any(|rt| rt.network == network && rt.mask == mask));

        world.remove_route(r, network, mask).unwrap();
        prop_assert!(!world
            .device(r)
            .unwrap()
            .router
            .routes
            .all()
            .iter()
            .any(|rt| rt.network == network && rt.mask == mask));
    }
}

/// STP re-convergence over an unchanged topology is a fixed point: running
/// it twice in a row produces identical port roles and states.
#[test]
fn stp_convergence_is_idempotent() {
    let mut world = World::new(SimConfig::default());
    let sw1 = world.add_device(DeviceKind::Switch, "sw1");
    let sw2 = world.add_device(DeviceKind::Switch, "sw2");

    world.add_interface(sw1, Interface::new("Gi0/1", "AA:AA:AA:AA:AA:01")).unwrap();
    world.add_interface(sw2, Interface::new("Gi0/1", "AA:AA:AA:AA:AA:02")).unwrap();
    world.connect(sw1, "Gi0/1", sw2, "Gi0/1").unwrap();
    world.device_mut(sw1).unwrap().switch.stp.enabled = true;
    world.device_mut(sw2).unwrap().switch.stp.enabled = true;

    engine::stp::converge(&mut world);
    let snapshot = |w: &World| -> Vec<(PortRole, PortState)> {
        w.device(sw1).unwrap().switch.stp.ports.values().map(|p| (p.role, p.state)).collect()
    };
    let first = snapshot(&world);

    engine::stp::converge(&mut world);
    let second = snapshot(&world);

    assert_eq!(first, second);
}
