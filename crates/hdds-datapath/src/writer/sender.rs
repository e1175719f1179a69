// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Synchronous send primitive used by reader locators.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Instant;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::core::{Guid, Locator};

/// Blocking send of one prepared message to a set of locators.
pub trait SyncSender: Send + Sync {
    /// Send `message` on behalf of `writer_guid` to every locator.
    ///
    /// Returns `true` only if every send completed before `deadline`.
    fn send_sync(
        &self,
        message: &[u8],
        writer_guid: &Guid,
        locators: &[Locator],
        deadline: Instant,
    ) -> bool;
}

/// [`SyncSender`] over plain UDP sockets.
///
/// Each datagram's write timeout is bounded by the time left before the
/// deadline. Locators that are not UDP are skipped.
#[derive(Debug)]
pub struct UdpSyncSender {
    v4: Socket,
    v6: Option<Socket>,
}

impl UdpSyncSender {
    pub fn new() -> io::Result<Self> {
        let v4 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        v4.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;
        v4.set_multicast_loop_v4(true)?;

        let v6 = match Self::open_v6() {
            Ok(socket) => Some(socket),
            Err(e) => {
                log::debug!("[UdpSyncSender] IPv6 unavailable: {}", e);
                None
            }
        };

        Ok(Self { v4, v6 })
    }

    fn open_v6() -> io::Result<Socket> {
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_only_v6(true)?;
        socket.bind(&SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)).into())?;
        Ok(socket)
    }

    /// Local address of the IPv4 socket.
    pub fn local_addr_v4(&self) -> io::Result<SocketAddr> {
        self.v4
            .local_addr()?
            .as_socket()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "not an inet address"))
    }

    fn send_one(&self, message: &[u8], target: SocketAddr, deadline: Instant) -> io::Result<()> {
        let socket = match target {
            SocketAddr::V4(_) => &self.v4,
            SocketAddr::V6(_) => self.v6.as_ref().ok_or_else(|| {
                io::Error::new(io::ErrorKind::Unsupported, "no IPv6 socket")
            })?,
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "deadline expired"));
        }
        socket.set_write_timeout(Some(remaining))?;

        let sent = socket.send_to(message, &SockAddr::from(target))?;
        if sent != message.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("partial datagram ({}/{} bytes)", sent, message.len()),
            ));
        }
        Ok(())
    }
}

impl SyncSender for UdpSyncSender {
    fn send_sync(
        &self,
        message: &[u8],
        writer_guid: &Guid,
        locators: &[Locator],
        deadline: Instant,
    ) -> bool {
        let mut all_sent = true;

        for locator in locators {
            let Some(target) = locator.to_socket_addr() else {
                log::trace!("[UdpSyncSender] skipping non-UDP locator {:?}", locator);
                continue;
            };

            if let Err(e) = self.send_one(message, target, deadline) {
                log::warn!(
                    "[UdpSyncSender] writer={} send to {} failed: {}",
                    writer_guid,
                    target,
                    e
                );
                all_sent = false;
                if e.kind() == io::ErrorKind::TimedOut || Instant::now() >= deadline {
                    break;
                }
            }
        }

        all_sent
    }
}
