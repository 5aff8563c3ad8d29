//! End-to-end: a packet with no ARP entry for its next hop is buffered
//! rather than dropped, and resolves once the ARP exchange completes.

mod common;

use netsim_core::addr;
use netsim_core::engine;
use netsim_core::model::packet::{IcmpCode, IcmpType, Packet, PacketKind, Payload, Stage};
use std::net::Ipv4Addr;

#[test]
fn arp_miss_buffers_until_resolved() {
    let mut world = common::fast_world();

    let pc1 = common::add_pc(
        &mut world,
        "pc1",
        "AA:AA:AA:AA:AA:01",
        Ipv4Addr::new(10, 0, 0, 2),
        Ipv4Addr::new(255, 255, 255, 0),
        None,
    );
    let pc2 = common::add_pc(
        &mut world,
        "pc2",
        "AA:AA:AA:AA:AA:02",
        Ipv4Addr::new(10, 0, 0, 3),
        Ipv4Addr::new(255, 255, 255, 0),
        None,
    );
    world.connect(pc1, "eth0", pc2, "eth0").unwrap();

    let mut echo = Packet::new(world.next_packet_id(), PacketKind::Icmp, pc1);
    echo.source_ip = Some(Ipv4Addr::new(10, 0, 0, 2));
    echo.dest_ip = Some(Ipv4Addr::new(10, 0, 0, 3));
    echo.dest_mac = addr::PLACEHOLDER_MAC.to_string();
    echo.is_locally_generated = true;
    echo.payload = Payload::Icmp { icmp_type: IcmpType::EchoRequest, code: IcmpCode::Na, seq: 1, unreachable: None };
    world.inject(echo);

    engine::tick(&mut world);

    let buffered = world.packets.iter().find(|p| p.stage == Stage::Buffered);
    assert!(buffered.is_some(), "original packet should be buffered pending ARP resolution");
    assert_eq!(buffered.unwrap().waiting_for_arp, Some(Ipv4Addr::new(10, 0, 0, 3)));
    assert!(
        world.packets.iter().any(|p| p.kind == PacketKind::Arp),
        "an ARP request should have been emitted alongside the buffered packet"
    );

    let delivered = common::run_until(&mut world, 60, |p| {
        p.current_device == pc1
            && p.stage == Stage::Arrived
            && matches!(p.payload, Payload::Icmp { icmp_type: IcmpType::EchoReply, .. })
    });
    assert!(delivered, "buffered packet never resolved and was delivered");
    assert!(world.device(pc1).unwrap().arp.get(&Ipv4Addr::new(10, 0, 0, 3)).is_some());
}
