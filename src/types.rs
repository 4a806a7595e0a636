//! Core Types
//!
//! Values exchanged between the listener, the rule matcher and the
//! address synthesizer.

use std::fmt;
use std::net::SocketAddr;

/// TTL carried by every synthesized answer (seconds)
pub const SYNTHETIC_TTL: u32 = 10;

/// Internet class; the only class eligible for synthesis
pub const CLASS_IN: u16 = 1;

/// DNS record types the responder distinguishes.
///
/// Only `A` is eligible for synthesis; every other type is proxied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Ns,
    Cname,
    Soa,
    Ptr,
    Mx,
    Txt,
    Aaaa,
    Srv,
    Any,
    Other(u16),
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::Ns,
            5 => RecordType::Cname,
            6 => RecordType::Soa,
            12 => RecordType::Ptr,
            15 => RecordType::Mx,
            16 => RecordType::Txt,
            28 => RecordType::Aaaa,
            33 => RecordType::Srv,
            255 => RecordType::Any,
            other => RecordType::Other(other),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::Ns => 2,
            RecordType::Cname => 5,
            RecordType::Soa => 6,
            RecordType::Ptr => 12,
            RecordType::Mx => 15,
            RecordType::Txt => 16,
            RecordType::Aaaa => 28,
            RecordType::Srv => 33,
            RecordType::Any => 255,
            RecordType::Other(code) => code,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Ns => f.write_str("NS"),
            RecordType::Cname => f.write_str("CNAME"),
            RecordType::Soa => f.write_str("SOA"),
            RecordType::Ptr => f.write_str("PTR"),
            RecordType::Mx => f.write_str("MX"),
            RecordType::Txt => f.write_str("TXT"),
            RecordType::Aaaa => f.write_str("AAAA"),
            RecordType::Srv => f.write_str("SRV"),
            RecordType::Any => f.write_str("ANY"),
            RecordType::Other(code) => write!(f, "TYPE{}", code),
        }
    }
}

/// Transport a query arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    /// Largest response the transport carries without truncation
    pub fn max_response_size(self) -> usize {
        match self {
            Transport::Udp => 512,
            Transport::Tcp => u16::MAX as usize,
        }
    }
}

/// A decoded inbound question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Query name as received, without the trailing root dot
    pub name: String,

    /// Requested record type
    pub record_type: RecordType,

    /// Requested class
    pub record_class: u16,

    /// Address of the querying client
    pub client_addr: SocketAddr,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.record_class == CLASS_IN {
            write!(f, "{} IN {}", self.name, self.record_type)
        } else {
            write!(f, "{} CLASS{} {}", self.name, self.record_class, self.record_type)
        }
    }
}

/// A synthesized address record.
///
/// The address stays in its rendered `prefix.index` form until encoding, so
/// an out-of-range index is carried through unchanged and rejected there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressAnswer {
    pub address: String,
    pub ttl: u32,
}

impl AddressAnswer {
    pub fn new(address: String) -> Self {
        Self {
            address,
            ttl: SYNTHETIC_TTL,
        }
    }
}

impl fmt::Display for AddressAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_codes() {
        assert_eq!(RecordType::from(1), RecordType::A);
        assert_eq!(RecordType::from(28), RecordType::Aaaa);
        assert_eq!(RecordType::from(99), RecordType::Other(99));
        assert_eq!(u16::from(RecordType::Other(99)), 99);
        assert_eq!(u16::from(RecordType::Mx), 15);
    }

    #[test]
    fn test_record_type_display() {
        assert_eq!(RecordType::A.to_string(), "A");
        assert_eq!(RecordType::Other(64).to_string(), "TYPE64");
    }

    #[test]
    fn test_answer_ttl() {
        let answer = AddressAnswer::new("10.11.12.7".to_string());
        assert_eq!(answer.ttl, 10);
        assert_eq!(answer.to_string(), "10.11.12.7");
    }
}
