use std::time::Duration;

use etherparse::{Ipv4HeaderSlice, UdpHeaderSlice};
use ripd_core::{
    hal::{memory::local_mac, Frame, Interface, MemoryHal, MemoryLink, RIP_MULTICAST_MAC},
    protocols::{
        ipv4::{subnetting::Ipv4Net, Ipv4Address},
        rip::{Command, RipEntry, RipPacket},
    },
    shutdown::ExitStatus,
    Router, Shutdown,
};
use tokio::task::JoinHandle;

const NEIGHBOR_0: Ipv4Address = Ipv4Address::new([10, 0, 0, 2]);
const NEIGHBOR_0_MAC: u64 = 0x0a_00_00_00_00_02;
const HOST_1: Ipv4Address = Ipv4Address::new([10, 0, 1, 9]);
const HOST_1_MAC: u64 = 0x0b_00_00_00_01_09;

type Running = JoinHandle<(Router<MemoryHal>, ExitStatus)>;

/// A router on 10.0.0.1/24 (slot 0) and 10.0.1.1/24 (slot 1) that knows the
/// link addresses of one neighbor router and one host.
fn start(update_interval: Duration) -> (Running, MemoryLink, Shutdown) {
    let (mut hal, link) = MemoryHal::new(vec![
        Interface::new([10, 0, 0, 1].into(), 24),
        Interface::new([10, 0, 1, 1].into(), 24),
    ]);
    hal.add_neighbor(0, NEIGHBOR_0, NEIGHBOR_0_MAC);
    hal.add_neighbor(1, HOST_1, HOST_1_MAC);
    let mut router = Router::new(hal, 100)
        .unwrap()
        .with_update_interval(update_interval);

    let shutdown = Shutdown::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let status = router.run(shutdown).await.unwrap();
            (router, status)
        })
    };
    (handle, link, shutdown)
}

/// Swallows the full table Requests sent on startup.
async fn skip_startup(link: &mut MemoryLink) {
    for slot in 0..2 {
        let frame = link.sent().await.unwrap();
        assert_eq!(frame.slot, slot);
        assert_eq!(frame.destination, RIP_MULTICAST_MAC);
        let packet = RipPacket::disassemble(&frame.bytes).unwrap();
        assert_eq!(packet, RipPacket::new_full_table_request());
    }
}

fn ip_packet(source: [u8; 4], destination: [u8; 4], ttl: u8) -> Vec<u8> {
    let payload = b"across the router";
    let header = etherparse::Ipv4Header::new(
        payload.len() as u16,
        ttl,
        etherparse::IpNumber::Udp,
        source,
        destination,
    );
    let mut packet = vec![];
    header.write(&mut packet).unwrap();
    packet.extend_from_slice(payload);
    packet
}

fn arrive(slot: u32, source: u64, bytes: Vec<u8>) -> Frame {
    Frame {
        bytes,
        source,
        destination: local_mac(slot),
        slot,
    }
}

fn response(routes: &[(&str, u32)]) -> RipPacket {
    RipPacket::new_response(
        routes
            .iter()
            .map(|(cidr, metric)| {
                let net = Ipv4Net::from_cidr(cidr).unwrap();
                RipEntry::new(net.id(), net.mask(), Ipv4Address::UNSPECIFIED, *metric)
            })
            .collect(),
    )
}

#[tokio::test]
async fn learns_a_route_and_forwards_along_it() -> anyhow::Result<()> {
    let (router, mut link, shutdown) = start(Duration::from_secs(3600));
    skip_startup(&mut link).await;

    let advertisement = response(&[("10.0.2.0/24", 1)]).to_datagram(NEIGHBOR_0, Ipv4Address::RIP_MULTICAST)?;
    link.deliver(arrive(0, NEIGHBOR_0_MAC, advertisement));

    let original = ip_packet([10, 0, 1, 9], [10, 0, 2, 7], 64);
    link.deliver(arrive(1, HOST_1_MAC, original.clone()));

    let forwarded = link.sent().await.unwrap();
    assert_eq!(forwarded.slot, 0);
    assert_eq!(forwarded.destination, NEIGHBOR_0_MAC);
    assert_eq!(forwarded.source, local_mac(0));

    let header = Ipv4HeaderSlice::from_slice(&forwarded.bytes)?;
    assert_eq!(header.ttl(), 63);
    assert_eq!(header.header_checksum(), header.to_header().calc_header_checksum()?);
    assert_eq!(forwarded.bytes[20..], original[20..]);

    shutdown.shut_down();
    let (router, status) = router.await?;
    assert_eq!(status, ExitStatus::Exited);
    let route = router.rip().table().lookup([10, 0, 2, 7].into()).unwrap();
    assert_eq!(route.metric, 2);
    assert_eq!(route.next_hop, Some(NEIGHBOR_0));
    Ok(())
}

#[tokio::test]
async fn forwards_to_directly_connected_hosts() -> anyhow::Result<()> {
    let (_router, mut link, shutdown) = start(Duration::from_secs(3600));
    skip_startup(&mut link).await;

    link.deliver(arrive(0, NEIGHBOR_0_MAC, ip_packet([10, 0, 0, 2], [10, 0, 1, 9], 2)));
    let forwarded = link.sent().await.unwrap();
    assert_eq!(forwarded.slot, 1);
    assert_eq!(forwarded.destination, HOST_1_MAC);
    assert_eq!(Ipv4HeaderSlice::from_slice(&forwarded.bytes)?.ttl(), 1);

    shutdown.shut_down();
    Ok(())
}

#[tokio::test]
async fn bad_packets_are_dropped_and_the_router_carries_on() -> anyhow::Result<()> {
    let (_router, mut link, shutdown) = start(Duration::from_secs(3600));
    skip_startup(&mut link).await;

    // the last hop
    link.deliver(arrive(0, NEIGHBOR_0_MAC, ip_packet([10, 0, 0, 2], [10, 0, 1, 9], 1)));
    // a corrupt header
    let mut corrupt = ip_packet([10, 0, 0, 2], [10, 0, 1, 9], 64);
    corrupt[15] ^= 0x01;
    link.deliver(arrive(0, NEIGHBOR_0_MAC, corrupt));
    // nowhere to go
    link.deliver(arrive(0, NEIGHBOR_0_MAC, ip_packet([10, 0, 0, 2], [172, 16, 0, 1], 64)));
    // a malformed advertisement
    let mut advertisement = response(&[("10.0.5.0/24", 1)]).to_datagram(NEIGHBOR_0, Ipv4Address::RIP_MULTICAST)?;
    let last = advertisement.len() - 1;
    advertisement[last] = 0;
    link.deliver(arrive(0, NEIGHBOR_0_MAC, advertisement));
    // and finally one that makes it
    link.deliver(arrive(0, NEIGHBOR_0_MAC, ip_packet([10, 0, 0, 2], [10, 0, 1, 9], 33)));

    let forwarded = link.sent().await.unwrap();
    assert_eq!(Ipv4HeaderSlice::from_slice(&forwarded.bytes)?.ttl(), 32);
    assert!(link.try_sent().is_none());

    shutdown.shut_down();
    Ok(())
}

#[tokio::test]
async fn answers_requests_directly() -> anyhow::Result<()> {
    let (_router, mut link, shutdown) = start(Duration::from_secs(3600));
    skip_startup(&mut link).await;

    let request = RipPacket::new_full_table_request().to_datagram(NEIGHBOR_0, Ipv4Address::RIP_MULTICAST)?;
    link.deliver(arrive(0, 0xdead, request));

    let reply = link.sent().await.unwrap();
    assert_eq!(reply.slot, 0);
    assert_eq!(reply.destination, 0xdead);
    let header = Ipv4HeaderSlice::from_slice(&reply.bytes)?;
    assert_eq!(header.source(), [10, 0, 0, 1]);
    assert_eq!(header.destination(), NEIGHBOR_0.to_bytes());

    let packet = RipPacket::disassemble(&reply.bytes)?;
    assert_eq!(packet.command, Command::Response);
    let nets: Vec<Ipv4Net> = packet.entries.iter().map(RipEntry::network).collect();
    assert_eq!(nets, vec![Ipv4Net::new_short([10, 0, 1, 0], 24)]);

    shutdown.shut_down();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn advertises_periodically_with_split_horizon() -> anyhow::Result<()> {
    let (_router, mut link, shutdown) = start(Duration::from_millis(5000));
    skip_startup(&mut link).await;

    let started = tokio::time::Instant::now();
    for round in 1..=2u32 {
        for slot in 0..2 {
            let update = link.sent().await.unwrap();
            assert_eq!(update.slot, slot);
            assert_eq!(update.destination, RIP_MULTICAST_MAC);

            let ip = Ipv4HeaderSlice::from_slice(&update.bytes)?;
            assert_eq!(ip.ttl(), 1);
            assert_eq!(ip.destination(), [224, 0, 0, 9]);
            let udp = UdpHeaderSlice::from_slice(&update.bytes[20..])?;
            assert_eq!(udp.source_port(), 520);
            assert_eq!(udp.destination_port(), 520);

            let packet = RipPacket::disassemble(&update.bytes)?;
            let nets: Vec<Ipv4Net> = packet.entries.iter().map(RipEntry::network).collect();
            let other_side = Ipv4Net::new_short([10, 0, 1 - slot as u8, 0], 24);
            assert_eq!(nets, vec![other_side]);
        }
        assert!(started.elapsed() >= Duration::from_millis(5000) * round);
    }

    shutdown.shut_down();
    Ok(())
}

#[tokio::test]
async fn stops_when_the_links_close() -> anyhow::Result<()> {
    let (router, link, _shutdown) = start(Duration::from_secs(3600));
    drop(link);
    let (_, status) = router.await?;
    assert_eq!(status, ExitStatus::EndOfStream);
    Ok(())
}
