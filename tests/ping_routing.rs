//! End-to-end: a PC pings a host on another subnet through a router, with
//! ARP resolution on both hops along the way.

mod common;

use netsim_core::addr;
use netsim_core::model::device::DeviceKind;
use netsim_core::model::interface::Interface;
use netsim_core::model::packet::{IcmpCode, IcmpType, Packet, PacketKind, Payload, Stage};
use std::net::Ipv4Addr;

#[test]
fn cross_subnet_ping_delivers_echo_reply() {
    let mut world = common::fast_world();

    let router = world.add_device(DeviceKind::Router, "r1");
    world.add_interface(router, Interface::new("Gi0/0", "AA:AA:AA:AA:AA:01")).unwrap();
    world.add_interface(router, Interface::new("Gi0/1", "AA:AA:AA:AA:AA:02")).unwrap();
    world.configure_interface_ip(router, "Gi0/0", Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 255, 255, 0)).unwrap();
    world.configure_interface_ip(router, "Gi0/1", Ipv4Addr::new(10, 0, 1, 1), Ipv4Addr::new(255, 255, 255, 0)).unwrap();

    let pc1 = common::add_pc(
        &mut world,
        "pc1",
        "AA:AA:AA:AA:AA:03",
        Ipv4Addr::new(10, 0, 0, 2),
        Ipv4Addr::new(255, 255, 255, 0),
        Some(Ipv4Addr::new(10, 0, 0, 1)),
    );
    let pc2 = common::add_pc(
        &mut world,
        "pc2",
        "AA:AA:AA:AA:AA:04",
        Ipv4Addr::new(10, 0, 1, 2),
        Ipv4Addr::new(255, 255, 255, 0),
        Some(Ipv4Addr::new(10, 0, 1, 1)),
    );

    world.connect(pc1, "eth0", router, "Gi0/0").unwrap();
    world.connect(router, "Gi0/1", pc2, "eth0").unwrap();

    let mut echo = Packet::new(world.next_packet_id(), PacketKind::Icmp, pc1);
    echo.source_ip = Some(Ipv4Addr::new(10, 0, 0, 2));
    echo.dest_ip = Some(Ipv4Addr::new(10, 0, 1, 2));
    echo.dest_mac = addr::PLACEHOLDER_MAC.to_string();
    echo.is_locally_generated = true;
    echo.payload = Payload::Icmp { icmp_type: IcmpType::EchoRequest, code: IcmpCode::Na, seq: 1, unreachable: None };
    world.inject(echo);

    let delivered = common::run_until(&mut world, 80, |p| {
        p.current_device == pc1
            && p.stage == Stage::Arrived
            && matches!(p.payload, Payload::Icmp { icmp_type: IcmpType::EchoReply, .. })
    });

    assert!(delivered, "echo reply never arrived back at pc1");
    assert!(world.device(pc1).unwrap().arp.get(&Ipv4Addr::new(10, 0, 0, 1)).is_some());
    assert!(world.device(pc2).unwrap().arp.get(&Ipv4Addr::new(10, 0, 1, 1)).is_some());
}
