//! End-to-end: firewall rules evaluate in order, first match wins. A
//! leading deny-tcp rule blocks a TCP handshake while a later allow-any
//! rule still lets ICMP through.

mod common;

use netsim_core::addr;
use netsim_core::model::device::DeviceKind;
use netsim_core::model::firewall::{Action, Direction, FirewallRule, Protocol};
use netsim_core::model::interface::Interface;
use netsim_core::model::packet::{IcmpCode, IcmpType, Packet, PacketKind, Payload, Stage};
use std::net::Ipv4Addr;

fn rule(id: u32, action: Action, protocol: Protocol) -> FirewallRule {
    FirewallRule {
        id,
        name: format!("r{id}"),
        action,
        protocol,
        source_ip: "any".into(),
        source_port: "*".into(),
        dest_ip: "any".into(),
        dest_port: "*".into(),
        direction: Direction::Any,
        enabled: true,
    }
}

fn build_topology() -> (netsim_core::World, netsim_core::DeviceId, netsim_core::DeviceId, netsim_core::DeviceId) {
    let mut world = common::fast_world();

    let fw = world.add_device(DeviceKind::Firewall, "fw1");
    world.add_interface(fw, Interface::new("Gi0/0", "AA:AA:AA:AA:AA:01")).unwrap();
    world.add_interface(fw, Interface::new("Gi0/1", "AA:AA:AA:AA:AA:02")).unwrap();
    world.configure_interface_ip(fw, "Gi0/0", Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 255, 255, 0)).unwrap();
    world.configure_interface_ip(fw, "Gi0/1", Ipv4Addr::new(10, 0, 1, 1), Ipv4Addr::new(255, 255, 255, 0)).unwrap();

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

    world.connect(pc1, "eth0", fw, "Gi0/0").unwrap();
    world.connect(fw, "Gi0/1", pc2, "eth0").unwrap();

    world.device_mut(fw).unwrap().firewall.rules = vec![
        rule(1, Action::Deny, Protocol::Tcp),
        rule(2, Action::Allow, Protocol::Any),
    ];

    (world, fw, pc1, pc2)
}

#[test]
fn icmp_passes_denied_tcp_rule() {
    let (mut world, _fw, pc1, _pc2) = build_topology();

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
    assert!(delivered, "icmp should pass through the firewall's allow-any fallback");
}

#[test]
fn tcp_is_blocked_by_leading_deny_rule() {
    let (mut world, _fw, pc1, pc2) = build_topology();

    netsim_core::engine::tcp::listen(&mut world, pc2, 80).unwrap();
    let syn = netsim_core::engine::tcp::connect(
        &mut world,
        pc1,
        Ipv4Addr::new(10, 0, 0, 2),
        4000,
        Ipv4Addr::new(10, 0, 1, 2),
        80,
    )
    .unwrap();
    for p in syn {
        world.inject(p);
    }

    common::run_ticks(&mut world, 150);

    assert!(
        world.tcp_connections(pc2).unwrap().iter().all(|c| c.state != netsim_core::model::tcp::TcpState::SynRecv
            && c.state != netsim_core::model::tcp::TcpState::Established),
        "no connection should have been established past a denying firewall"
    );
}
