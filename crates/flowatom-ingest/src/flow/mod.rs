//! Flow-file (format A) records
//!
//! A flow file holds summarized connection records. Each record is decoded by
//! a [`FlowSource`] and flattened by [`normalize`] into a fixed-order tuple
//! that is emitted on the default stream.

pub mod normalize;
pub mod source;

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

pub use normalize::{normalize, AddressPolicy, FLOW_TUPLE_WIDTH};
pub use source::{FixedLayoutSource, FlowRecords, FlowSource, RECORD_LEN};

/// One decoded flow record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    /// Start time, epoch seconds
    pub stime: f64,
    /// Duration in seconds
    pub duration: f64,
    pub sport: u16,
    pub dport: u16,
    pub protocol: u8,
    /// (class, type) pair
    pub classtype: (String, String),
    pub sensor: String,
    /// Union of flags over all packets
    pub tcpflags: TcpFlags,
    /// Flags on the first packet
    pub initflags: TcpFlags,
    /// Union of flags on the remaining packets
    pub restflags: TcpFlags,
    pub application: u16,
    /// SNMP input interface
    pub input: u32,
    /// SNMP output interface
    pub output: u32,
    pub packets: u64,
    pub bytes: u64,
    pub sip: IpAddr,
    pub dip: IpAddr,
    /// Next-hop address
    pub nhip: IpAddr,
}

/// TCP control flags, rendered as the letters of the set bits
///
/// Letter order follows the bit order from least significant:
/// `F S R P A U E C`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TcpFlags(pub u8);

impl TcpFlags {
    const LETTERS: [char; 8] = ['F', 'S', 'R', 'P', 'A', 'U', 'E', 'C'];

    pub const FIN: TcpFlags = TcpFlags(0x01);
    pub const SYN: TcpFlags = TcpFlags(0x02);
    pub const RST: TcpFlags = TcpFlags(0x04);
    pub const PSH: TcpFlags = TcpFlags(0x08);
    pub const ACK: TcpFlags = TcpFlags(0x10);
    pub const URG: TcpFlags = TcpFlags(0x20);
    pub const ECE: TcpFlags = TcpFlags(0x40);
    pub const CWR: TcpFlags = TcpFlags(0x80);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: TcpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for TcpFlags {
    type Output = TcpFlags;

    fn bitor(self, rhs: TcpFlags) -> TcpFlags {
        TcpFlags(self.0 | rhs.0)
    }
}

impl std::fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (bit, letter) in Self::LETTERS.iter().enumerate() {
            if self.0 & (1 << bit) != 0 {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for TcpFlags {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bits = 0u8;
        for ch in s.chars().filter(|c| !c.is_whitespace()) {
            let upper = ch.to_ascii_uppercase();
            let bit = Self::LETTERS
                .iter()
                .position(|l| *l == upper)
                .ok_or_else(|| format!("unknown TCP flag `{}`", ch))?;
            bits |= 1 << bit;
        }
        Ok(TcpFlags(bits))
    }
}
