use anyhow::Result;
use lagg_core::notify::wait_readable;
use lagg_core::proto::{encode_frame, FrameHeader, MacAddress};
use lagg_core::{Aggregator, Client, Link, LinkManager};
use std::io;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixDatagram;
use std::thread;
use std::time::{Duration, Instant};

const REORDER_TIMEOUT: Duration = Duration::from_millis(50);

fn mac(last: u8) -> MacAddress {
    MacAddress([2, 0, 0, 0, 0, last])
}

/// Pop one payload, waiting on the delivery signal for up to `limit`.
fn recv_within(manager: &LinkManager, limit: Duration) -> Option<Vec<u8>> {
    let start = Instant::now();
    loop {
        if let Some(p) = manager.recv() {
            return Some(p);
        }
        let remaining = limit.checked_sub(start.elapsed())?;
        let _ = wait_readable(&[manager.signal_fd()], Some(remaining.min(Duration::from_millis(20))));
        let _ = manager.drain_signal();
    }
}

fn raw_frame(seq: u16, payload: &[u8]) -> Vec<u8> {
    encode_frame(&FrameHeader::new(mac(2), mac(1), seq), payload)
}

#[test]
fn test_only_one_copy_arrives() -> Result<()> {
    // Links A and B; A's far end is gone so only B's copy is delivered.
    let (a_left, a_right) = Link::pair("a0", mac(1), mac(2))?;
    let (b_left, b_right) = Link::pair("b0", mac(3), mac(4))?;
    drop(a_right);

    let mut sender = LinkManager::new(vec![a_left, b_left], REORDER_TIMEOUT)?;
    let receiver = LinkManager::new(vec![b_right], REORDER_TIMEOUT)?;

    let accepted = sender.send(&[0x10, 0x20])?;
    assert_eq!(accepted, 1);

    assert_eq!(recv_within(&receiver, Duration::from_secs(5)), Some(vec![0x10, 0x20]));
    assert_eq!(receiver.recv(), None);
    Ok(())
}

#[test]
fn test_gap_skipped_after_timeout() -> Result<()> {
    let (wire, rx_link) = Link::pair("pair0", mac(1), mac(2))?;
    let receiver = LinkManager::new(vec![rx_link], REORDER_TIMEOUT)?;

    // 1..=5 then 7; 6 never arrives
    for seq in [1u16, 2, 3, 4, 5, 7] {
        wire.send_frame(&raw_frame(seq, &seq.to_be_bytes()))?;
    }

    let mut got = Vec::new();
    while let Some(p) = recv_within(&receiver, Duration::from_secs(2)) {
        got.push(u16::from_be_bytes([p[0], p[1]]));
        if got.len() == 6 {
            break;
        }
    }
    assert_eq!(got, vec![1, 2, 3, 4, 5, 7]);

    // A late 6 is discarded
    wire.send_frame(&raw_frame(6, &6u16.to_be_bytes()))?;
    assert_eq!(recv_within(&receiver, Duration::from_millis(200)), None);

    let stats = receiver.stats();
    assert_eq!(stats.delivered, 6);
    assert_eq!(stats.lost, 1);
    Ok(())
}

#[test]
fn test_three_paths_deliver_each_payload_once() -> Result<()> {
    let mut wires = Vec::new();
    let mut rx_links = Vec::new();
    for i in 0..3u8 {
        let (wire, rx) = Link::pair(&format!("p{i}"), mac(10 + i), mac(20 + i))?;
        wires.push(wire);
        rx_links.push(rx);
    }
    let receiver = LinkManager::new(rx_links, REORDER_TIMEOUT)?;

    // Each path sees the same frames, but the paths disagree on order
    let orders: [&[u16]; 3] = [&[1, 2, 3, 4], &[2, 1, 4, 3], &[4, 3, 2, 1]];
    for (wire, order) in wires.iter().zip(orders) {
        for &seq in order {
            wire.send_frame(&raw_frame(seq, &[seq as u8]))?;
        }
    }

    let mut got = Vec::new();
    while got.len() < 4 {
        match recv_within(&receiver, Duration::from_secs(5)) {
            Some(p) => got.push(p[0]),
            None => break,
        }
    }
    assert_eq!(got, vec![1, 2, 3, 4]);

    // Let any remaining copies drain through the engine
    thread::sleep(Duration::from_millis(100));
    assert_eq!(receiver.recv(), None);
    assert_eq!(receiver.stats().delivered, 4);
    Ok(())
}

#[test]
fn test_many_payloads_over_redundant_links() -> Result<()> {
    let (a_left, a_right) = Link::pair("a0", mac(1), mac(2))?;
    let (b_left, b_right) = Link::pair("b0", mac(3), mac(4))?;

    let mut sender = LinkManager::new(vec![a_left, b_left], REORDER_TIMEOUT)?;
    let receiver = LinkManager::new(vec![a_right, b_right], REORDER_TIMEOUT)?;

    for i in 0..100u16 {
        assert_eq!(sender.send(&i.to_be_bytes())?, 2);
        // Keep the socket buffers from filling
        if i % 50 == 49 {
            thread::sleep(Duration::from_millis(10));
        }
    }

    for i in 0..100u16 {
        let p = recv_within(&receiver, Duration::from_secs(5)).expect("payload");
        assert_eq!(u16::from_be_bytes([p[0], p[1]]), i);
    }
    Ok(())
}

// Client backed by one end of a datagram socketpair
struct PairClient {
    sock: UnixDatagram,
    buf: Vec<u8>,
}

fn pair_client() -> io::Result<(PairClient, UnixDatagram)> {
    let (ours, theirs) = UnixDatagram::pair()?;
    ours.set_nonblocking(true)?;
    theirs.set_read_timeout(Some(Duration::from_secs(5)))?;
    Ok((
        PairClient {
            sock: ours,
            buf: vec![0u8; 2048],
        },
        theirs,
    ))
}

impl Client for PairClient {
    fn receive_packet(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.sock.recv(&mut self.buf) {
            Ok(n) => Ok(Some(self.buf[..n].to_vec())),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn send_packet(&mut self, packet: &[u8]) -> io::Result<()> {
        self.sock.send(packet).map(|_| ())
    }

    fn readiness_fd(&self) -> RawFd {
        self.sock.as_raw_fd()
    }
}

#[test]
fn test_aggregators_exchange_traffic_both_ways() -> Result<()> {
    let (a_left, a_right) = Link::pair("a0", mac(1), mac(2))?;
    let (b_left, b_right) = Link::pair("b0", mac(3), mac(4))?;

    let (west_client, west_local) = pair_client()?;
    let (east_client, east_local) = pair_client()?;

    let mut west = Aggregator::new(
        west_client,
        LinkManager::new(vec![a_left, b_left], REORDER_TIMEOUT)?,
        Ipv4Addr::new(10, 0, 0, 2),
        Duration::from_millis(200),
    )?;
    let mut east = Aggregator::new(
        east_client,
        LinkManager::new(vec![a_right, b_right], REORDER_TIMEOUT)?,
        Ipv4Addr::new(10, 0, 0, 1),
        Duration::from_millis(200),
    )?;

    let west_stop = west.shutdown_handle();
    let east_stop = east.shutdown_handle();
    let west_thread = thread::spawn(move || west.run());
    let east_thread = thread::spawn(move || east.run());

    let mut buf = [0u8; 2048];

    for i in 0..20u8 {
        west_local.send(&[0x45, i])?;
        let n = east_local.recv(&mut buf)?;
        assert_eq!(&buf[..n], &[0x45, i]);

        east_local.send(&[0x60, i])?;
        let n = west_local.recv(&mut buf)?;
        assert_eq!(&buf[..n], &[0x60, i]);
    }

    west_stop.trigger();
    east_stop.trigger();
    west_thread.join().expect("west thread")?;
    east_thread.join().expect("east thread")?;
    Ok(())
}
