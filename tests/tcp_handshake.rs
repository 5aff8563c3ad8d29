//! End-to-end: a TCP client connects to a listening server across a direct
//! link, completing the three-way handshake purely by ticking the world.

mod common;

use netsim_core::engine;
use netsim_core::model::tcp::TcpState;
use std::net::Ipv4Addr;

#[test]
fn three_way_handshake_reaches_established() {
    let mut world = common::fast_world();

    let client_ip = Ipv4Addr::new(10, 0, 0, 2);
    let server_ip = Ipv4Addr::new(10, 0, 0, 3);
    let client = common::add_pc(&mut world, "client", "AA:AA:AA:AA:AA:01", client_ip, Ipv4Addr::new(255, 255, 255, 0), None);
    let server = common::add_pc(&mut world, "server", "AA:AA:AA:AA:AA:02", server_ip, Ipv4Addr::new(255, 255, 255, 0), None);
    world.connect(client, "eth0", server, "eth0").unwrap();

    engine::tcp::listen(&mut world, server, 80).unwrap();
    let syn = engine::tcp::connect(&mut world, client, client_ip, 4000, server_ip, 80).unwrap();
    for p in syn {
        world.inject(p);
    }

    common::run_ticks(&mut world, 120);

    let client_conn = world
        .tcp_connections(client)
        .unwrap()
        .iter()
        .find(|c| c.remote_ip == server_ip && c.remote_port == 80)
        .expect("client connection should exist");
    assert_eq!(client_conn.state, TcpState::Established);

    let server_conn = world
        .tcp_connections(server)
        .unwrap()
        .iter()
        .find(|c| c.remote_ip == client_ip && c.remote_port == 4000)
        .expect("server-side connection should exist");
    assert_eq!(server_conn.state, TcpState::Established);
}
