//! End-to-end: an access-port broadcast stays inside its VLAN across a
//! trunk link, reaching a same-VLAN host on a second switch while never
//! touching a different-VLAN host on the first.

mod common;

use netsim_core::addr;
use netsim_core::model::device::DeviceKind;
use netsim_core::model::interface::{Interface, VlanMode};
use netsim_core::model::packet::{ArpOp, Packet, PacketKind, Payload};
use std::net::Ipv4Addr;

#[test]
fn broadcast_stays_within_vlan_across_trunk() {
    let mut world = common::fast_world();

    let sw1 = world.add_device(DeviceKind::Switch, "sw1");
    let sw2 = world.add_device(DeviceKind::Switch, "sw2");
    let host_a = world.add_device(DeviceKind::Pc, "hostA");
    let host_b = world.add_device(DeviceKind::Pc, "hostB");
    let host_c = world.add_device(DeviceKind::Pc, "hostC");

    world.add_vlan(sw1, 10, "data").unwrap();
    world.add_vlan(sw1, 20, "voice").unwrap();
    world.add_vlan(sw2, 10, "data").unwrap();
    world.add_vlan(sw2, 20, "voice").unwrap();

    world.add_interface(sw1, Interface::new("Fa0/1", "AA:AA:AA:AA:AA:01")).unwrap();
    world.add_interface(sw1, Interface::new("Fa0/2", "AA:AA:AA:AA:AA:02")).unwrap();
    world.add_interface(sw1, Interface::new("Gi0/1", "AA:AA:AA:AA:AA:03")).unwrap();
    world.device_mut(sw1).unwrap().interface_mut("Fa0/1").unwrap().access_vlan = 10;
    world.device_mut(sw1).unwrap().interface_mut("Fa0/2").unwrap().access_vlan = 20;
    {
        let trunk = world.device_mut(sw1).unwrap().interface_mut("Gi0/1").unwrap();
        trunk.vlan_mode = VlanMode::Trunk;
        trunk.allowed_vlans = vec![1, 10, 20];
    }

    world.add_interface(sw2, Interface::new("Gi0/1", "AA:AA:AA:AA:AA:04")).unwrap();
    world.add_interface(sw2, Interface::new("Fa0/1", "AA:AA:AA:AA:AA:05")).unwrap();
    {
        let trunk = world.device_mut(sw2).unwrap().interface_mut("Gi0/1").unwrap();
        trunk.vlan_mode = VlanMode::Trunk;
        trunk.allowed_vlans = vec![1, 10, 20];
    }
    world.device_mut(sw2).unwrap().interface_mut("Fa0/1").unwrap().access_vlan = 10;

    world.add_interface(host_a, Interface::new("eth0", "AA:AA:AA:AA:AA:10")).unwrap();
    world.add_interface(host_b, Interface::new("eth0", "AA:AA:AA:AA:AA:11")).unwrap();
    world.add_interface(host_c, Interface::new("eth0", "AA:AA:AA:AA:AA:12")).unwrap();

    world.connect(host_a, "eth0", sw1, "Fa0/1").unwrap();
    world.connect(host_b, "eth0", sw1, "Fa0/2").unwrap();
    world.connect(sw1, "Gi0/1", sw2, "Gi0/1").unwrap();
    world.connect(host_c, "eth0", sw2, "Fa0/1").unwrap();

    let host_a_ip = Ipv4Addr::new(10, 0, 10, 2);
    let mut arp_request = Packet::new(world.next_packet_id(), PacketKind::Arp, sw1);
    arp_request.ingress_interface = Some("Fa0/1".to_string());
    arp_request.source_mac = "AA:AA:AA:AA:AA:10".to_string();
    arp_request.dest_mac = addr::BROADCAST_MAC.to_string();
    arp_request.payload = Payload::Arp {
        op: ArpOp::Request,
        sender_ip: host_a_ip,
        sender_mac: "AA:AA:AA:AA:AA:10".to_string(),
        target_ip: Ipv4Addr::new(10, 0, 10, 99),
        target_mac: addr::BROADCAST_MAC.to_string(),
    };
    world.inject(arp_request);

    common::run_ticks(&mut world, 1);
    assert!(
        world.packets.iter().all(|p| p.target_device != Some(host_b)),
        "a vlan 10 broadcast must never reach the vlan 20 access port"
    );
    assert!(
        world.packets.iter().any(|p| p.target_device == Some(sw2)),
        "the trunk should carry the frame into the neighboring switch"
    );

    common::run_ticks(&mut world, 10);
    assert!(
        world.device(host_c).unwrap().arp.get(&host_a_ip).is_some(),
        "hostC, on the same vlan via the trunk, should have learned hostA's address"
    );
    assert!(world.device(host_b).unwrap().arp.get(&host_a_ip).is_none());
}
