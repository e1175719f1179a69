// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! Reader locator routing integration tests
//!
//! Binds `ReaderLocator` endpoints to remote, local and datasharing readers
//! and checks which path each message takes.

use hdds_datapath::{
    DataSharingConfig, DataSharingListener, Error, Guid, IntraprocessDelivery, LocalDomain,
    LocalReader, Locator, ReaderLocator, SyncSender, UdpSyncSender,
};
use parking_lot::Mutex;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct CountingSender {
    sent: Mutex<Vec<Vec<Locator>>>,
}

impl SyncSender for CountingSender {
    fn send_sync(&self, _message: &[u8], _writer: &Guid, locators: &[Locator], _deadline: Instant) -> bool {
        self.sent.lock().push(locators.to_vec());
        true
    }
}

struct InProcessReader {
    guid: Guid,
    listener: DataSharingListener,
}

impl LocalReader for InProcessReader {
    fn guid(&self) -> Guid {
        self.guid
    }

    fn datasharing_listener(&self) -> &DataSharingListener {
        &self.listener
    }
}

fn writer_guid() -> Guid {
    Guid::new([0xAA; 12], [0, 0, 1, 2])
}

fn remote(id: u8) -> Guid {
    Guid::new([id; 12], [0, 0, 1, 7])
}

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(1)
}

#[test]
fn test_unicast_preferred_then_multicast() {
    let sender = Arc::new(CountingSender::default());
    let domain = Arc::new(LocalDomain::new(IntraprocessDelivery::Full));
    let mut endpoint = ReaderLocator::new(writer_guid(), sender.clone(), domain, None);

    let unicast = [Locator::udp_v4(Ipv4Addr::new(10, 0, 0, 5), 7411)];
    let multicast = [Locator::udp_v4(Ipv4Addr::new(239, 255, 0, 1), 7401)];
    endpoint
        .start(remote(1), &unicast, &multicast, false, false)
        .expect("unbound endpoint starts");
    endpoint.send(b"m1", deadline()).expect("send");

    assert!(endpoint.update(&[], &multicast, false));
    endpoint.send(b"m2", deadline()).expect("send");

    let sent = sender.sent.lock();
    assert_eq!(sent.as_slice(), &[unicast.to_vec(), multicast.to_vec()]);
}

#[test]
fn test_bound_endpoint_rejects_second_start() {
    let domain = Arc::new(LocalDomain::default());
    let mut endpoint =
        ReaderLocator::new(writer_guid(), Arc::new(CountingSender::default()), domain, None);
    let unicast = [Locator::udp_v4(Ipv4Addr::LOCALHOST, 7411)];

    endpoint.start(remote(1), &unicast, &[], true, false).expect("start");
    let err = endpoint
        .start(remote(2), &[], &[], false, false)
        .expect_err("already bound");
    assert!(matches!(err, Error::AlreadyBound));
    assert_eq!(endpoint.remote_guid(), remote(1));
    assert!(endpoint.expects_inline_qos());

    assert!(!endpoint.stop_guid(&remote(2)));
    assert!(endpoint.stop_guid(&remote(1)));
    endpoint.stop();
    assert!(endpoint.remote_guid().is_unknown());
    endpoint.start(remote(2), &[], &[], false, false).expect("restart");
}

#[test]
fn test_update_is_idempotent() {
    let domain = Arc::new(LocalDomain::default());
    let mut endpoint =
        ReaderLocator::new(writer_guid(), Arc::new(CountingSender::default()), domain, None);
    let unicast = [Locator::udp_v4(Ipv4Addr::LOCALHOST, 7411)];
    endpoint.start(remote(1), &unicast, &[], false, false).expect("start");
    let generation = endpoint.resend_generation();

    assert!(!endpoint.update(&unicast, &[], false));
    assert_eq!(endpoint.resend_generation(), generation);
    assert!(endpoint.update(&unicast, &[], true));
    assert_eq!(endpoint.resend_generation(), generation);
}

#[test]
fn test_local_reader_takes_precedence() {
    let sender = Arc::new(CountingSender::default());
    let domain = Arc::new(LocalDomain::new(IntraprocessDelivery::Full));
    let reader = Arc::new(InProcessReader {
        guid: remote(3),
        listener: DataSharingListener::new(),
    });
    domain.register_reader(reader.clone());

    let mut endpoint = ReaderLocator::new(
        writer_guid(),
        sender.clone(),
        domain,
        Some(DataSharingConfig::default()),
    );
    let unicast = [Locator::udp_v4(Ipv4Addr::LOCALHOST, 7411)];
    endpoint.start(remote(3), &unicast, &[], false, false).expect("start");

    assert!(endpoint.is_local_reader());
    assert!(endpoint.unicast_locators().is_empty());
    endpoint.send(b"skipped", deadline()).expect("local send is a no-op");
    assert!(sender.sent.lock().is_empty());

    endpoint.datasharing_notify().expect("notify");
    endpoint.datasharing_notify().expect("notify");
    assert_eq!(reader.listener.notification_count(), 2);
    assert_eq!(reader.listener.same_process_count(), 2);
}

#[test]
fn test_intraprocess_off_uses_network() {
    let sender = Arc::new(CountingSender::default());
    let domain = Arc::new(LocalDomain::new(IntraprocessDelivery::Off));
    let reader = Arc::new(InProcessReader {
        guid: remote(4),
        listener: DataSharingListener::new(),
    });
    domain.register_reader(reader.clone());

    let mut endpoint = ReaderLocator::new(writer_guid(), sender.clone(), domain, None);
    let unicast = [Locator::udp_v4(Ipv4Addr::LOCALHOST, 7411)];
    endpoint.start(remote(4), &unicast, &[], false, false).expect("start");

    assert!(!endpoint.is_local_reader());
    endpoint.send(b"net", deadline()).expect("send");
    assert_eq!(sender.sent.lock().len(), 1);
    assert!(matches!(endpoint.datasharing_notify(), Err(Error::Shm(_))));
}

#[test]
fn test_send_over_udp_loopback() {
    let receiver = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
    receiver
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("timeout");
    let addr = receiver.local_addr().expect("local addr");

    let sender = Arc::new(UdpSyncSender::new().expect("udp sender"));
    let mut endpoint =
        ReaderLocator::new(writer_guid(), sender, Arc::new(LocalDomain::default()), None);
    endpoint
        .start(remote(5), &[Locator::from_socket_addr(&addr)], &[], false, false)
        .expect("start");
    endpoint.send(b"RTPS-payload", deadline()).expect("send");

    let mut buf = [0u8; 64];
    let (len, _) = receiver.recv_from(&mut buf).expect("datagram");
    assert_eq!(&buf[..len], b"RTPS-payload");
}

#[cfg(target_os = "linux")]
#[test]
fn test_datasharing_notify_through_shm() {
    use hdds_datapath::transport::shm::DataSharingNotifier;

    let directory = format!("/hdds_it_{}", fastrand::u64(..));
    let reader = remote(6);

    let mut reader_side = DataSharingNotifier::new(directory.clone());
    reader_side.create(&reader).expect("reader creates its segment");
    let snapshot = reader_side.snapshot().expect("snapshot");

    let sender = Arc::new(CountingSender::default());
    let mut endpoint = ReaderLocator::new(
        writer_guid(),
        sender.clone(),
        Arc::new(LocalDomain::default()),
        Some(DataSharingConfig {
            shm_directory: directory.clone(),
        }),
    );
    let unicast = [Locator::udp_v4(Ipv4Addr::LOCALHOST, 7411)];
    endpoint.start(reader, &unicast, &[], false, true).expect("start");

    assert!(endpoint.is_datasharing_reader());
    assert!(endpoint.unicast_locators().is_empty());
    endpoint.send(b"skipped", deadline()).expect("datasharing send is a no-op");
    assert!(sender.sent.lock().is_empty());

    endpoint.datasharing_notify().expect("notify");
    assert!(reader_side
        .wait_for_notification(snapshot, Duration::from_millis(100))
        .expect("enabled"));

    endpoint.stop();
    assert!(!endpoint.is_datasharing_reader());
    DataSharingNotifier::unlink(&directory, &reader).expect("cleanup");
}

#[cfg(target_os = "linux")]
#[test]
fn test_datasharing_without_reader_segment_uses_network() {
    use hdds_datapath::transport::shm::DataSharingNotifier;

    let directory = format!("/hdds_it_{}", fastrand::u64(..));
    let reader = remote(7);
    let segment_path = format!("/dev/shm{}", DataSharingNotifier::segment_name(&directory, &reader));

    let sender = Arc::new(CountingSender::default());
    let mut endpoint = ReaderLocator::new(
        writer_guid(),
        sender.clone(),
        Arc::new(LocalDomain::default()),
        Some(DataSharingConfig {
            shm_directory: directory.clone(),
        }),
    );
    let unicast = [Locator::udp_v4(Ipv4Addr::new(10, 0, 0, 2), 7411)];
    endpoint.start(reader, &unicast, &[], false, true).expect("start");

    assert!(!endpoint.is_datasharing_reader());
    assert_eq!(endpoint.unicast_locators(), &unicast);
    endpoint.send(b"net", deadline()).expect("send");
    assert_eq!(sender.sent.lock().as_slice(), &[unicast.to_vec()]);

    endpoint.stop();
    assert!(!std::path::Path::new(&segment_path).exists());
}
