//! Flow record normalization
//!
//! Flattens a [`FlowRecord`] into the positional tuple consumed downstream:
//!
//! | pos | field            | pos | field       |
//! |-----|------------------|-----|-------------|
//! | 0   | start secs (int) | 10  | initflags   |
//! | 1   | start secs (frac)| 11  | restflags   |
//! | 2   | duration         | 12  | application |
//! | 3   | sport            | 13  | input       |
//! | 4   | dport            | 14  | output      |
//! | 5   | protocol         | 15  | packets     |
//! | 6   | class            | 16  | bytes       |
//! | 7   | type             | 17  | sip         |
//! | 8   | sensor           | 18  | dip         |
//! | 9   | tcpflags         | 19  | nhip        |

use std::net::IpAddr;

use flowatom_common::{FlowError, Result, Tuple};
use serde::{Deserialize, Serialize};

use super::FlowRecord;

/// Number of positions in a normalized flow tuple
pub const FLOW_TUPLE_WIDTH: usize = 20;

/// How addresses are rendered in the tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressPolicy {
    /// Keep the stored family
    #[default]
    Native,
    /// Render IPv4 addresses as IPv4-mapped IPv6
    Ipv6,
}

impl AddressPolicy {
    fn render(self, addr: IpAddr) -> String {
        match (self, addr) {
            (AddressPolicy::Ipv6, IpAddr::V4(v4)) => v4.to_ipv6_mapped().to_string(),
            _ => addr.to_string(),
        }
    }
}

impl std::str::FromStr for AddressPolicy {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "native" => Ok(AddressPolicy::Native),
            "ipv6" | "v6" => Ok(AddressPolicy::Ipv6),
            other => Err(FlowError::Config(format!(
                "Invalid address policy: {} (expected native or ipv6)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AddressPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressPolicy::Native => write!(f, "native"),
            AddressPolicy::Ipv6 => write!(f, "ipv6"),
        }
    }
}

/// Shortest round-trip text of `value` that always carries a decimal point
///
/// `12.0` renders as `"12.0"`, `12.5` as `"12.5"`. Non-finite values render
/// as `nan`, `inf` or `-inf`.
pub fn float_text(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Split an epoch start time into its integer and fractional digits
fn split_start_time(stime: f64) -> Result<(String, String)> {
    if !stime.is_finite() {
        return Err(FlowError::Normalize(format!(
            "start time {} has no decimal form",
            float_text(stime)
        )));
    }
    let text = float_text(stime);
    match text.split_once('.') {
        Some((secs, frac)) => Ok((secs.to_string(), frac.to_string())),
        None => Err(FlowError::Normalize(format!(
            "start time {} has no decimal point",
            text
        ))),
    }
}

/// Flatten one record into its fixed-order tuple
pub fn normalize(record: &FlowRecord, policy: AddressPolicy) -> Result<Tuple> {
    let (start_secs, start_frac) = split_start_time(record.stime)?;

    let tuple = vec![
        start_secs,
        start_frac,
        float_text(record.duration),
        record.sport.to_string(),
        record.dport.to_string(),
        record.protocol.to_string(),
        record.classtype.0.clone(),
        record.classtype.1.clone(),
        record.sensor.clone(),
        record.tcpflags.to_string(),
        record.initflags.to_string(),
        record.restflags.to_string(),
        record.application.to_string(),
        record.input.to_string(),
        record.output.to_string(),
        record.packets.to_string(),
        record.bytes.to_string(),
        policy.render(record.sip),
        policy.render(record.dip),
        policy.render(record.nhip),
    ];
    debug_assert_eq!(tuple.len(), FLOW_TUPLE_WIDTH);

    Ok(tuple)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::flow::TcpFlags;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn sample_record() -> FlowRecord {
        FlowRecord {
            stime: 1_357_000_000.25,
            duration: 3.0,
            sport: 51234,
            dport: 443,
            protocol: 6,
            classtype: ("all".to_string(), "out".to_string()),
            sensor: "S1".to_string(),
            tcpflags: TcpFlags::SYN | TcpFlags::ACK | TcpFlags::FIN,
            initflags: TcpFlags::SYN,
            restflags: TcpFlags::ACK | TcpFlags::FIN,
            application: 443,
            input: 1,
            output: 2,
            packets: 12,
            bytes: 5_000_000_000,
            sip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            dip: IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
            nhip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }

    #[test]
    fn test_float_text_keeps_decimal_point() {
        assert_eq!(float_text(12.0), "12.0");
        assert_eq!(float_text(12.5), "12.5");
        assert_eq!(float_text(0.001), "0.001");
        assert_eq!(float_text(f64::NAN), "nan");
        assert_eq!(float_text(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_start_time_split() {
        assert_eq!(
            split_start_time(12.5).unwrap(),
            ("12".to_string(), "5".to_string())
        );
        assert_eq!(
            split_start_time(12.0).unwrap(),
            ("12".to_string(), "0".to_string())
        );
        assert!(split_start_time(f64::INFINITY).is_err());
    }

    #[test]
    fn test_normalize_field_order() {
        let tuple = normalize(&sample_record(), AddressPolicy::Native).unwrap();

        assert_eq!(tuple.len(), FLOW_TUPLE_WIDTH);
        assert_eq!(
            tuple,
            vec![
                "1357000000", "25", "3.0", "51234", "443", "6", "all", "out", "S1", "FSA", "S",
                "FA", "443", "1", "2", "12", "5000000000", "10.0.0.1", "2001:db8::1", "0.0.0.0",
            ]
        );
    }

    #[test]
    fn test_normalize_ipv6_policy_maps_v4_only() {
        let tuple = normalize(&sample_record(), AddressPolicy::Ipv6).unwrap();

        assert_eq!(tuple[17], "::ffff:10.0.0.1");
        assert_eq!(tuple[18], "2001:db8::1");
        assert_eq!(tuple[19], "::ffff:0.0.0.0");
    }

    #[test]
    fn test_normalize_rejects_non_finite_start() {
        let mut record = sample_record();
        record.stime = f64::NAN;
        assert!(matches!(
            normalize(&record, AddressPolicy::Native),
            Err(FlowError::Normalize(_))
        ));
    }

    #[test]
    fn test_address_policy_from_str() {
        assert_eq!("NATIVE".parse::<AddressPolicy>().unwrap(), AddressPolicy::Native);
        assert_eq!("ipv6".parse::<AddressPolicy>().unwrap(), AddressPolicy::Ipv6);
        assert!("ipv5".parse::<AddressPolicy>().is_err());
    }
}
