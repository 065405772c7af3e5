use std::net::Ipv4Addr;

use thiserror::Error;

/// Ether-type for IPv4.
pub const ETH_TYPE_IPV4: u16 = 0x0800;
/// Ether-type for ARP.
pub const ETH_TYPE_ARP: u16 = 0x0806;
/// Ether-type for an 802.1Q VLAN tag.
pub const ETH_TYPE_VLAN: u16 = 0x8100;

/// Destination MAC + source MAC + ether-type.
const ETH_HEADER_LEN: usize = 14;
/// Size of an 802.1Q tag (TPID + TCI).
const VLAN_TAG_LEN: usize = 4;
/// Minimum IPv4 header length (IHL = 5).
const IPV4_MIN_HEADER_LEN: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Frame too short: {0} bytes")]
    Truncated(usize),
    #[error("Invalid IPv4 version: {0}")]
    Ipv4Version(u8),
    #[error("Invalid IPv4 header length: {0} words")]
    Ipv4HeaderLength(u8),
}

/// The parts of an inbound frame the controller cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet {
    /// An ARP frame. These are never classified.
    Arp,
    /// An IPv4 frame with its source and destination addresses.
    Ipv4 { src: Ipv4Addr, dst: Ipv4Addr },
    /// Any other ether-type (LLDP, IPv6, ...).
    Other { ether_type: u16 },
}

impl Packet {
    /// Parses an Ethernet II frame, skipping a single 802.1Q tag if present.
    pub fn parse(frame: &[u8]) -> Result<Self, Error> {
        if frame.len() < ETH_HEADER_LEN {
            return Err(Error::Truncated(frame.len()));
        }

        let mut offset = 12;
        let mut ether_type = u16::from_be_bytes([frame[offset], frame[offset + 1]]);
        offset += 2;

        if ether_type == ETH_TYPE_VLAN {
            if frame.len() < ETH_HEADER_LEN + VLAN_TAG_LEN {
                return Err(Error::Truncated(frame.len()));
            }

            // Skip the TCI, the inner ether-type follows.
            ether_type = u16::from_be_bytes([frame[offset + 2], frame[offset + 3]]);
            offset += VLAN_TAG_LEN;
        }

        match ether_type {
            ETH_TYPE_ARP => Ok(Self::Arp),
            ETH_TYPE_IPV4 => parse_ipv4(&frame[offset..]),
            other => Ok(Self::Other { ether_type: other }),
        }
    }

    /// Returns the ether-type of this packet.
    #[inline]
    pub fn ether_type(&self) -> u16 {
        match self {
            Self::Arp => ETH_TYPE_ARP,
            Self::Ipv4 { .. } => ETH_TYPE_IPV4,
            Self::Other { ether_type } => *ether_type,
        }
    }
}

fn parse_ipv4(header: &[u8]) -> Result<Packet, Error> {
    if header.len() < IPV4_MIN_HEADER_LEN {
        return Err(Error::Truncated(header.len()));
    }

    let version = header[0] >> 4;
    if version != 4 {
        return Err(Error::Ipv4Version(version));
    }

    let ihl = header[0] & 0x0f;
    if ihl < 5 || header.len() < ihl as usize * 4 {
        return Err(Error::Ipv4HeaderLength(ihl));
    }

    let src = Ipv4Addr::new(header[12], header[13], header[14], header[15]);
    let dst = Ipv4Addr::new(header[16], header[17], header[18], header[19]);

    Ok(Packet::Ipv4 { src, dst })
}
