//! Two routers joined by a UDP cable, each with a host network behind it.
//!
//! ```text
//! host a (10.0.1.9) --- [r1] 10.0.0.1 --- 10.0.0.2 [r2] --- host b (10.0.2.9)
//! ```

use std::{collections::HashMap, net::SocketAddr, time::Duration};

use etherparse::Ipv4HeaderSlice;
use ripd::udp_link::{decode_frame, encode_frame, UdpHal, UdpLink};
use ripd_core::{
    hal::{Interface, Mac, RIP_MULTICAST_MAC},
    protocols::ipv4::Ipv4Address,
    Router, Shutdown,
};
use tokio::{
    net::UdpSocket,
    time::{timeout, Instant},
};

const R1_0: Mac = 0x02_00_00_00_00_01;
const R1_1: Mac = 0x02_00_00_00_01_01;
const R2_0: Mac = 0x02_00_00_00_00_02;
const R2_1: Mac = 0x02_00_00_00_02_01;
const HOST_A: Mac = 0x02_00_00_00_01_09;
const HOST_B: Mac = 0x02_00_00_00_02_09;

async fn link(address: [u8; 4], mac: Mac, neighbor: ([u8; 4], Mac)) -> anyhow::Result<UdpLink> {
    Ok(UdpLink {
        interface: Interface::new(address.into(), 24),
        mac,
        socket: UdpSocket::bind("127.0.0.1:0").await?,
        peer: "127.0.0.1:9".parse()?,
        neighbors: HashMap::from([(Ipv4Address::new(neighbor.0), neighbor.1)]),
    })
}

fn packet(ttl: u8) -> Vec<u8> {
    let payload = b"from a to b";
    let header = etherparse::Ipv4Header::new(
        payload.len() as u16,
        ttl,
        etherparse::IpNumber::Udp,
        [10, 0, 1, 9],
        [10, 0, 2, 9],
    );
    let mut out = vec![];
    header.write(&mut out).unwrap();
    out.extend_from_slice(payload);
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn routes_propagate_and_traffic_flows() -> anyhow::Result<()> {
    let mut r1_0 = link([10, 0, 0, 1], R1_0, ([10, 0, 0, 2], R2_0)).await?;
    let mut r1_1 = link([10, 0, 1, 1], R1_1, ([10, 0, 1, 9], HOST_A)).await?;
    let mut r2_0 = link([10, 0, 0, 2], R2_0, ([10, 0, 0, 1], R1_0)).await?;
    let mut r2_1 = link([10, 0, 2, 1], R2_1, ([10, 0, 2, 9], HOST_B)).await?;
    let host_a = UdpSocket::bind("127.0.0.1:0").await?;
    let host_b = UdpSocket::bind("127.0.0.1:0").await?;

    r1_0.peer = r2_0.socket.local_addr()?;
    r2_0.peer = r1_0.socket.local_addr()?;
    r1_1.peer = host_a.local_addr()?;
    r2_1.peer = host_b.local_addr()?;
    let r1_1_addr: SocketAddr = r1_1.socket.local_addr()?;

    let shutdown = Shutdown::new();
    for links in [vec![r1_0, r1_1], vec![r2_0, r2_1]] {
        let mut router = Router::new(UdpHal::new(links), 100)?
            .with_update_interval(Duration::from_millis(200));
        let shutdown = shutdown.clone();
        tokio::spawn(async move { router.run(shutdown).await });
    }

    // r1 only learns 10.0.2.0/24 once r2 has told it, so keep trying
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut buf = vec![0u8; 2048];
    let forwarded = 'found: loop {
        assert!(Instant::now() < deadline, "host b never heard from host a");
        host_a
            .send_to(&encode_frame(R1_1, HOST_A, &packet(64)), r1_1_addr)
            .await?;

        let wait_until = Instant::now() + Duration::from_millis(300);
        while let Ok(received) = timeout(
            wait_until.saturating_duration_since(Instant::now()),
            host_b.recv_from(&mut buf),
        )
        .await
        {
            let (len, _) = received?;
            let Some((destination, source, bytes)) = decode_frame(&buf[..len]) else {
                continue;
            };
            // r2 also advertises to host b's network
            if destination == RIP_MULTICAST_MAC {
                continue;
            }
            assert_eq!(destination, HOST_B);
            assert_eq!(source, R2_1);
            break 'found bytes.to_vec();
        }
    };

    let header = Ipv4HeaderSlice::from_slice(&forwarded)?;
    assert_eq!(header.ttl(), 62);
    assert_eq!(header.source(), [10, 0, 1, 9]);
    assert_eq!(header.destination(), [10, 0, 2, 9]);
    assert_eq!(header.header_checksum(), header.to_header().calc_header_checksum()?);
    assert_eq!(&forwarded[20..], b"from a to b");

    shutdown.shut_down();
    Ok(())
}
