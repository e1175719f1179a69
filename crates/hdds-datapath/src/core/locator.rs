// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS Locator_t: an opaque transport address for a remote endpoint.
//!
//! ```text
//! struct Locator_t {
//!     long kind;                // 4 bytes
//!     unsigned long port;       // 4 bytes
//!     octet address[16];        // 16 bytes (IPv4 in the last 4)
//! };
//! ```

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Locator kind: Invalid locator.
pub const LOCATOR_KIND_INVALID: i32 = -1;

/// Locator kind: UDP over IPv4 (standard RTPS).
pub const LOCATOR_KIND_UDPV4: i32 = 1;

/// Locator kind: UDP over IPv6 (standard RTPS).
pub const LOCATOR_KIND_UDPV6: i32 = 2;

/// Locator kind: Shared Memory (vendor extension).
pub const LOCATOR_KIND_SHM: i32 = 16;

/// Transport address of a remote endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Locator {
    pub kind: i32,
    pub port: u32,
    pub address: [u8; 16],
}

/// Ordered list of locators announced by a remote endpoint.
pub type LocatorList = Vec<Locator>;

impl Locator {
    pub const fn new(kind: i32, port: u32, address: [u8; 16]) -> Self {
        Self {
            kind,
            port,
            address,
        }
    }

    /// Create an invalid locator.
    pub const fn invalid() -> Self {
        Self::new(LOCATOR_KIND_INVALID, 0, [0u8; 16])
    }

    /// Create a UDPv4 locator from IPv4 address and port.
    pub fn udp_v4(addr: Ipv4Addr, port: u16) -> Self {
        let mut address = [0u8; 16];
        address[12..16].copy_from_slice(&addr.octets());
        Self::new(LOCATOR_KIND_UDPV4, u32::from(port), address)
    }

    /// Create a UDPv6 locator from IPv6 address and port.
    pub fn udp_v6(addr: Ipv6Addr, port: u16) -> Self {
        Self::new(LOCATOR_KIND_UDPV6, u32::from(port), addr.octets())
    }

    /// Create a UDP locator from a socket address.
    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Self::udp_v4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => Self::udp_v6(*v6.ip(), v6.port()),
        }
    }

    /// Socket address for UDP locators, `None` for any other kind.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let port = u16::try_from(self.port).ok()?;
        match self.kind {
            LOCATOR_KIND_UDPV4 => {
                let ip = Ipv4Addr::new(
                    self.address[12],
                    self.address[13],
                    self.address[14],
                    self.address[15],
                );
                Some(SocketAddr::V4(SocketAddrV4::new(ip, port)))
            }
            LOCATOR_KIND_UDPV6 => Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(self.address),
                port,
                0,
                0,
            ))),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.kind != LOCATOR_KIND_INVALID
    }

    /// Multicast address check (UDP kinds only).
    pub fn is_multicast(&self) -> bool {
        self.to_socket_addr()
            .is_some_and(|addr| addr.ip().is_multicast())
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::invalid()
    }
}
