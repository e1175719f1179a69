// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ReaderLocator: how a writer reaches one matched remote reader.
//!
//! Three paths, in order of preference:
//!
//! 1. same process: nothing is sent, the reader is signalled directly
//! 2. datasharing (same host): the reader's SHM notifier is bumped
//! 3. network: unicast locators, or multicast when no unicast is known
//!
//! Not synchronized: the owning writer serializes access.

use std::sync::{Arc, Weak};
use std::time::Instant;

use super::local_domain::{LocalDomain, LocalReader};
use super::sender::SyncSender;
use crate::core::{Guid, Locator, LocatorList};
use crate::qos::DataSharingConfig;
use crate::transport::shm::{DataSharingNotifier, ShmError};
use crate::{Error, Result};

/// Transmission state towards one remote reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorInfo {
    pub remote_guid: Guid,
    pub unicast: LocatorList,
    pub multicast: LocatorList,
    enabled: bool,
    resend_generation: u64,
}

impl LocatorInfo {
    fn new() -> Self {
        Self {
            remote_guid: Guid::UNKNOWN,
            unicast: Vec::new(),
            multicast: Vec::new(),
            enabled: false,
            resend_generation: 0,
        }
    }

    /// Start a new resend generation.
    ///
    /// The endpoint keeps no per-message state itself. Writers compare the
    /// generation they last served with [`resend_generation`](Self::resend_generation)
    /// and resend their control messages (heartbeat, gap) when it moved.
    fn bump_resend_generation(&mut self) {
        self.resend_generation = self.resend_generation.wrapping_add(1);
    }

    fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bumped on every bind, addressing change and unbind.
    pub fn resend_generation(&self) -> u64 {
        self.resend_generation
    }
}

/// Delivery endpoint of a writer towards one matched reader.
pub struct ReaderLocator {
    writer_guid: Guid,
    sender: Arc<dyn SyncSender>,
    domain: Arc<LocalDomain>,
    locator_info: LocatorInfo,
    expects_inline_qos: bool,
    is_local_reader: bool,
    local_reader: Option<Weak<dyn LocalReader>>,
    guid_as_vector: [Guid; 1],
    participant_as_vector: [Guid; 1],
    datasharing_notifier: Option<DataSharingNotifier>,
}

impl ReaderLocator {
    /// Endpoint owned by `writer_guid`, initially unbound.
    ///
    /// `datasharing` is the writer's datasharing configuration; without one
    /// the endpoint never uses shared memory.
    pub fn new(
        writer_guid: Guid,
        sender: Arc<dyn SyncSender>,
        domain: Arc<LocalDomain>,
        datasharing: Option<DataSharingConfig>,
    ) -> Self {
        Self {
            writer_guid,
            sender,
            domain,
            locator_info: LocatorInfo::new(),
            expects_inline_qos: false,
            is_local_reader: false,
            local_reader: None,
            guid_as_vector: [Guid::UNKNOWN],
            participant_as_vector: [Guid::UNKNOWN],
            datasharing_notifier: datasharing.map(|cfg| DataSharingNotifier::new(cfg.shm_directory)),
        }
    }

    /// Bind to a matched remote reader.
    ///
    /// Fails with [`Error::AlreadyBound`] (and changes nothing) unless the
    /// endpoint is unbound. Locator lists are only kept for readers reached
    /// over the network.
    pub fn start(
        &mut self,
        remote_guid: Guid,
        unicast: &[Locator],
        multicast: &[Locator],
        expects_inline_qos: bool,
        is_datasharing: bool,
    ) -> Result<()> {
        if !self.locator_info.remote_guid.is_unknown() {
            log::debug!(
                "[ReaderLocator] writer={} already bound to {}, cannot start {}",
                self.writer_guid,
                self.locator_info.remote_guid,
                remote_guid
            );
            return Err(Error::AlreadyBound);
        }

        self.expects_inline_qos = expects_inline_qos;
        self.guid_as_vector = [remote_guid];
        self.participant_as_vector = [remote_guid.participant()];
        self.locator_info.remote_guid = remote_guid;

        self.is_local_reader = self
            .domain
            .should_intraprocess_between(&self.writer_guid, &remote_guid);
        self.local_reader = None;

        let datasharing = is_datasharing && self.enable_datasharing(&remote_guid);
        if !self.is_local_reader && !datasharing {
            self.locator_info.unicast = unicast.to_vec();
            self.locator_info.multicast = multicast.to_vec();
        }

        self.locator_info.bump_resend_generation();
        self.locator_info.enable(true);

        log::info!(
            "[ReaderLocator] writer={} matched reader={} (local={}, datasharing={})",
            self.writer_guid,
            remote_guid,
            self.is_local_reader,
            datasharing
        );
        Ok(())
    }

    fn enable_datasharing(&mut self, remote_guid: &Guid) -> bool {
        let Some(notifier) = self.datasharing_notifier.as_mut() else {
            log::warn!(
                "[ReaderLocator] writer={} is not datasharing compatible, reader {} falls back to the network",
                self.writer_guid,
                remote_guid
            );
            return false;
        };

        match notifier.enable(remote_guid) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "[ReaderLocator] datasharing towards {} unavailable ({}), falling back to the network",
                    remote_guid,
                    e
                );
                false
            }
        }
    }

    /// Apply renegotiated locators / inline-QoS expectation.
    ///
    /// Returns whether anything changed. A locator change starts a new
    /// resend generation.
    pub fn update(&mut self, unicast: &[Locator], multicast: &[Locator], expects_inline_qos: bool) -> bool {
        let mut changed = false;

        if self.expects_inline_qos != expects_inline_qos {
            self.expects_inline_qos = expects_inline_qos;
            changed = true;
        }

        if self.locator_info.unicast.as_slice() != unicast
            || self.locator_info.multicast.as_slice() != multicast
        {
            if !self.is_local_reader && !self.is_datasharing_reader() {
                self.locator_info.unicast = unicast.to_vec();
                self.locator_info.multicast = multicast.to_vec();
            }
            self.locator_info.bump_resend_generation();
            self.locator_info.enable(true);
            changed = true;
        }

        changed
    }

    /// Stop only if bound to `remote_guid`.
    pub fn stop_guid(&mut self, remote_guid: &Guid) -> bool {
        if self.locator_info.remote_guid == *remote_guid {
            self.stop();
            return true;
        }
        false
    }

    /// Unbind. Safe to call at any time.
    pub fn stop(&mut self) {
        if let Some(notifier) = self.datasharing_notifier.as_mut() {
            notifier.disable();
        }

        self.locator_info.enable(false);
        self.locator_info.bump_resend_generation();
        self.locator_info.unicast.clear();
        self.locator_info.multicast.clear();
        self.locator_info.remote_guid = Guid::UNKNOWN;
        self.guid_as_vector = [Guid::UNKNOWN];
        self.participant_as_vector = [Guid::UNKNOWN];
        self.expects_inline_qos = false;
        self.is_local_reader = false;
        self.local_reader = None;
    }

    /// Send a prepared message to the reader, blocking until `deadline` at most.
    ///
    /// Unbound, local and datasharing readers are skipped successfully:
    /// they are served by [`datasharing_notify`](Self::datasharing_notify).
    pub fn send(&self, message: &[u8], deadline: Instant) -> Result<()> {
        if self.locator_info.remote_guid.is_unknown()
            || self.is_local_reader
            || self.is_datasharing_reader()
        {
            return Ok(());
        }

        let locators = if self.locator_info.unicast.is_empty() {
            &self.locator_info.multicast
        } else {
            &self.locator_info.unicast
        };

        if self
            .sender
            .send_sync(message, &self.writer_guid, locators, deadline)
        {
            Ok(())
        } else {
            Err(Error::SendFailed(format!(
                "writer {} could not reach reader {} before deadline",
                self.writer_guid, self.locator_info.remote_guid
            )))
        }
    }

    /// In-process reader object of the bound reader, resolved once.
    pub fn local_reader(&mut self) -> Option<Arc<dyn LocalReader>> {
        if let Some(cached) = self.local_reader.as_ref() {
            match cached.upgrade() {
                Some(reader) => return Some(reader),
                None => self.local_reader = None,
            }
        }

        let reader = self
            .domain
            .find_local_reader(&self.locator_info.remote_guid)?;
        self.local_reader = Some(Arc::downgrade(&reader));
        Some(reader)
    }

    /// Tell the reader new data is available.
    ///
    /// Local readers are signalled directly; others through shared memory.
    pub fn datasharing_notify(&mut self) -> Result<()> {
        if self.is_local_reader {
            if let Some(reader) = self.local_reader() {
                reader.datasharing_listener().notify(true);
                return Ok(());
            }
        }

        match self.datasharing_notifier.as_ref() {
            Some(notifier) => notifier.notify().map_err(Error::from),
            None => Err(Error::Shm(ShmError::NotEnabled)),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn writer_guid(&self) -> Guid {
        self.writer_guid
    }

    pub fn remote_guid(&self) -> Guid {
        self.locator_info.remote_guid
    }

    /// Bound reader GUID as a one-element slice (message destination list).
    pub fn remote_guids(&self) -> &[Guid] {
        &self.guid_as_vector
    }

    /// Participant of the bound reader as a one-element slice.
    pub fn remote_participants(&self) -> &[Guid] {
        &self.participant_as_vector
    }

    pub fn expects_inline_qos(&self) -> bool {
        self.expects_inline_qos
    }

    pub fn is_local_reader(&self) -> bool {
        self.is_local_reader
    }

    pub fn is_datasharing_reader(&self) -> bool {
        self.datasharing_notifier
            .as_ref()
            .is_some_and(DataSharingNotifier::is_enabled)
    }

    pub fn unicast_locators(&self) -> &[Locator] {
        &self.locator_info.unicast
    }

    pub fn multicast_locators(&self) -> &[Locator] {
        &self.locator_info.multicast
    }

    pub fn locator_info(&self) -> &LocatorInfo {
        &self.locator_info
    }

    pub fn is_enabled(&self) -> bool {
        self.locator_info.is_enabled()
    }

    pub fn resend_generation(&self) -> u64 {
        self.locator_info.resend_generation()
    }
}

impl std::fmt::Debug for ReaderLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderLocator")
            .field("writer_guid", &self.writer_guid)
            .field("locator_info", &self.locator_info)
            .field("expects_inline_qos", &self.expects_inline_qos)
            .field("is_local_reader", &self.is_local_reader)
            .field("datasharing", &self.is_datasharing_reader())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::IntraprocessDelivery;
    use crate::writer::DataSharingListener;
    use parking_lot::Mutex;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    /// Records every send; answers with a fixed outcome.
    struct RecordingSender {
        sends: Mutex<Vec<Vec<Locator>>>,
        succeed: bool,
    }

    impl RecordingSender {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                sends: Mutex::new(Vec::new()),
                succeed,
            })
        }

        fn sends(&self) -> Vec<Vec<Locator>> {
            self.sends.lock().clone()
        }
    }

    impl SyncSender for RecordingSender {
        fn send_sync(&self, _message: &[u8], _writer: &Guid, locators: &[Locator], _deadline: Instant) -> bool {
            self.sends.lock().push(locators.to_vec());
            self.succeed
        }
    }

    struct Reader {
        guid: Guid,
        listener: DataSharingListener,
    }

    impl LocalReader for Reader {
        fn guid(&self) -> Guid {
            self.guid
        }

        fn datasharing_listener(&self) -> &DataSharingListener {
            &self.listener
        }
    }

    fn writer_guid() -> Guid {
        Guid::new([0x10; 12], [0, 0, 1, 2])
    }

    fn remote() -> Guid {
        Guid::new([0x20; 12], [0, 0, 1, 7])
    }

    fn unicast() -> Vec<Locator> {
        vec![Locator::udp_v4(Ipv4Addr::new(10, 0, 0, 2), 7411)]
    }

    fn multicast() -> Vec<Locator> {
        vec![Locator::udp_v4(Ipv4Addr::new(239, 255, 0, 1), 7401)]
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_millis(100)
    }

    fn locator(sender: Arc<RecordingSender>) -> ReaderLocator {
        ReaderLocator::new(writer_guid(), sender, Arc::new(LocalDomain::default()), None)
    }

    #[test]
    fn test_unbound_send_is_noop() {
        let sender = RecordingSender::new(false);
        let rl = locator(sender.clone());
        assert!(rl.send(b"data", deadline()).is_ok());
        assert!(sender.sends().is_empty());
        assert!(!rl.is_enabled());
    }

    #[test]
    fn test_start_is_guarded() {
        let sender = RecordingSender::new(true);
        let mut rl = locator(sender);
        rl.start(remote(), &unicast(), &multicast(), true, false).expect("first start");
        let before = rl.locator_info().clone();

        let other = Guid::new([0x30; 12], [0, 0, 1, 7]);
        assert!(matches!(
            rl.start(other, &[], &[], false, false),
            Err(Error::AlreadyBound)
        ));
        assert_eq!(rl.locator_info(), &before);
        assert!(rl.expects_inline_qos());
        assert_eq!(rl.remote_guids(), &[remote()]);
        assert_eq!(rl.remote_participants(), &[remote().participant()]);
    }

    #[test]
    fn test_send_prefers_unicast() {
        let sender = RecordingSender::new(true);
        let mut rl = locator(sender.clone());
        rl.start(remote(), &unicast(), &multicast(), false, false).expect("start");
        rl.send(b"data", deadline()).expect("sent");
        assert_eq!(sender.sends(), vec![unicast()]);
    }

    #[test]
    fn test_send_falls_back_to_multicast() {
        let sender = RecordingSender::new(true);
        let mut rl = locator(sender.clone());
        rl.start(remote(), &[], &multicast(), false, false).expect("start");
        rl.send(b"data", deadline()).expect("sent");
        assert_eq!(sender.sends(), vec![multicast()]);
    }

    #[test]
    fn test_send_failure_reported() {
        let sender = RecordingSender::new(false);
        let mut rl = locator(sender);
        rl.start(remote(), &unicast(), &[], false, false).expect("start");
        assert!(matches!(rl.send(b"data", deadline()), Err(Error::SendFailed(_))));
    }

    #[test]
    fn test_resend_generation_follows_binding() {
        let mut rl = locator(RecordingSender::new(true));
        assert_eq!(rl.resend_generation(), 0);

        rl.start(remote(), &unicast(), &[], false, false).expect("start");
        assert_eq!(rl.resend_generation(), 1);
        assert!(rl.locator_info().is_enabled());

        rl.stop();
        assert_eq!(rl.resend_generation(), 2);
        assert!(!rl.locator_info().is_enabled());
        assert!(rl.locator_info().unicast.is_empty());
    }

    #[test]
    fn test_update_detects_changes() {
        let sender = RecordingSender::new(true);
        let mut rl = locator(sender);
        rl.start(remote(), &unicast(), &multicast(), false, false).expect("start");
        let generation = rl.resend_generation();

        assert!(!rl.update(&unicast(), &multicast(), false));
        assert_eq!(rl.resend_generation(), generation);

        // Inline QoS alone does not require a resend.
        assert!(rl.update(&unicast(), &multicast(), true));
        assert_eq!(rl.resend_generation(), generation);

        let moved = vec![Locator::udp_v4(Ipv4Addr::new(10, 0, 0, 3), 7411)];
        assert!(rl.update(&moved, &multicast(), true));
        assert_eq!(rl.resend_generation(), generation + 1);
        assert_eq!(rl.unicast_locators(), moved.as_slice());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let sender = RecordingSender::new(true);
        let mut rl = locator(sender);
        rl.stop();
        rl.start(remote(), &unicast(), &multicast(), true, false).expect("start");

        assert!(!rl.stop_guid(&Guid::new([0x99; 12], [0, 0, 1, 7])));
        assert!(rl.is_enabled());
        assert!(rl.stop_guid(&remote()));
        rl.stop();

        assert!(rl.remote_guid().is_unknown());
        assert!(!rl.is_enabled());
        assert!(rl.unicast_locators().is_empty());
        assert!(!rl.expects_inline_qos());
        rl.start(remote(), &unicast(), &[], false, false).expect("restart after stop");
    }

    #[test]
    fn test_local_reader_path() {
        let domain = Arc::new(LocalDomain::new(IntraprocessDelivery::Full));
        let reader = Arc::new(Reader {
            guid: remote(),
            listener: DataSharingListener::new(),
        });
        domain.register_reader(reader.clone());

        let sender = RecordingSender::new(false);
        let mut rl = ReaderLocator::new(writer_guid(), sender.clone(), domain, None);
        rl.start(remote(), &unicast(), &multicast(), false, false).expect("start");

        assert!(rl.is_local_reader());
        assert!(rl.unicast_locators().is_empty());
        assert!(rl.send(b"data", deadline()).is_ok());
        assert!(sender.sends().is_empty());

        rl.datasharing_notify().expect("direct notify");
        assert_eq!(reader.listener.same_process_count(), 1);
        assert_eq!(
            rl.local_reader().map(|r| r.guid()),
            Some(remote()),
            "memoized local reader"
        );
    }

    #[test]
    fn test_datasharing_without_notifier_falls_back() {
        let sender = RecordingSender::new(true);
        let mut rl = locator(sender.clone());
        rl.start(remote(), &unicast(), &[], false, true).expect("start");

        assert!(!rl.is_datasharing_reader());
        assert_eq!(rl.unicast_locators(), unicast().as_slice());
        rl.send(b"data", deadline()).expect("network path");
        assert_eq!(sender.sends().len(), 1);
        assert!(matches!(rl.datasharing_notify(), Err(Error::Shm(_))));
    }
}
