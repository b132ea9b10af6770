//! Flow-file readers
//!
//! [`FlowSource`] is the seam between the pipeline and whatever decodes the
//! on-disk format. [`FixedLayoutSource`] reads headerless files of
//! big-endian, fixed-width records:
//!
//! ```text
//! off  len  field           off  len  field
//!   0    8  stime (ms)       24    2  application
//!   8    4  duration (ms)    26    2  (padding)
//!  12    2  sport            28    2  input
//!  14    2  dport            30    2  output
//!  16    1  protocol         32    4  packets
//!  17    1  flowtype         36    4  bytes
//!  18    2  sensor           40    4  sip
//!  20    1  tcpflags         44    4  dip
//!  21    1  initflags        48    4  nhip
//!  22    1  restflags
//!  23    1  attributes
//! ```

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use flowatom_common::{FlowError, Result};
use tracing::debug;

use super::{FlowRecord, TcpFlags};

/// Size of one fixed-layout record in bytes
pub const RECORD_LEN: usize = 52;

/// Class shared by every entry of the default flowtype table
const DEFAULT_CLASS: &str = "all";

/// Default two-way flowtype table, indexed by flowtype id
const FLOWTYPES: [&str; 11] = [
    "in", "out", "inweb", "outweb", "innull", "outnull", "int2int", "ext2ext", "inicmp",
    "outicmp", "other",
];

/// Lazy, single-pass sequence of decoded records
pub type FlowRecords = Box<dyn Iterator<Item = Result<FlowRecord>> + Send>;

/// Opens a flow file and yields its records in file order
pub trait FlowSource: Send + Sync {
    /// Open `path` for reading
    ///
    /// Fails when the path cannot be opened. Errors met while iterating are
    /// yielded in place of a record and end the file.
    fn open(&self, path: &Path) -> Result<FlowRecords>;
}

/// Reader for the fixed 52-byte record layout
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLayoutSource;

impl FixedLayoutSource {
    pub fn new() -> Self {
        Self
    }

    /// Encode `record` into its fixed-layout bytes
    ///
    /// Times are truncated to milliseconds. Only IPv4 addresses, 16-bit
    /// interfaces, 32-bit counters, numeric sensors and classtypes from the
    /// default flowtype table fit the layout.
    pub fn encode(record: &FlowRecord) -> Result<[u8; RECORD_LEN]> {
        let mut buf = [0u8; RECORD_LEN];

        let stime_ms = seconds_to_millis(record.stime, "stime")?;
        let dur_ms = u32::try_from(seconds_to_millis(record.duration, "duration")?)
            .map_err(|_| FlowError::Encode("duration exceeds 32 bits".into()))?;
        let flowtype = flowtype_id(&record.classtype).ok_or_else(|| {
            FlowError::Encode(format!(
                "classtype {:?} is not in the flowtype table",
                record.classtype
            ))
        })?;
        let sensor: u16 = record
            .sensor
            .parse()
            .map_err(|_| FlowError::Encode(format!("sensor `{}` is not numeric", record.sensor)))?;

        buf[0..8].copy_from_slice(&stime_ms.to_be_bytes());
        buf[8..12].copy_from_slice(&dur_ms.to_be_bytes());
        buf[12..14].copy_from_slice(&record.sport.to_be_bytes());
        buf[14..16].copy_from_slice(&record.dport.to_be_bytes());
        buf[16] = record.protocol;
        buf[17] = flowtype;
        buf[18..20].copy_from_slice(&sensor.to_be_bytes());
        buf[20] = record.tcpflags.bits();
        buf[21] = record.initflags.bits();
        buf[22] = record.restflags.bits();
        buf[24..26].copy_from_slice(&record.application.to_be_bytes());
        buf[28..30].copy_from_slice(&narrow_u16(record.input, "input")?.to_be_bytes());
        buf[30..32].copy_from_slice(&narrow_u16(record.output, "output")?.to_be_bytes());
        buf[32..36].copy_from_slice(&narrow_u32(record.packets, "packets")?.to_be_bytes());
        buf[36..40].copy_from_slice(&narrow_u32(record.bytes, "bytes")?.to_be_bytes());
        buf[40..44].copy_from_slice(&ipv4_bits(record.sip, "sip")?.to_be_bytes());
        buf[44..48].copy_from_slice(&ipv4_bits(record.dip, "dip")?.to_be_bytes());
        buf[48..52].copy_from_slice(&ipv4_bits(record.nhip, "nhip")?.to_be_bytes());

        Ok(buf)
    }

    /// Decode one fixed-layout record
    pub fn decode(buf: &[u8; RECORD_LEN]) -> FlowRecord {
        let be16 = |at: usize| u16::from_be_bytes([buf[at], buf[at + 1]]);
        let be32 = |at: usize| u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        let mut stime = [0u8; 8];
        stime.copy_from_slice(&buf[0..8]);
        let stime_ms = u64::from_be_bytes(stime);

        FlowRecord {
            stime: stime_ms as f64 / 1000.0,
            duration: f64::from(be32(8)) / 1000.0,
            sport: be16(12),
            dport: be16(14),
            protocol: buf[16],
            classtype: classtype(buf[17]),
            sensor: be16(18).to_string(),
            tcpflags: TcpFlags(buf[20]),
            initflags: TcpFlags(buf[21]),
            restflags: TcpFlags(buf[22]),
            application: be16(24),
            input: u32::from(be16(28)),
            output: u32::from(be16(30)),
            packets: u64::from(be32(32)),
            bytes: u64::from(be32(36)),
            sip: IpAddr::V4(Ipv4Addr::from(be32(40))),
            dip: IpAddr::V4(Ipv4Addr::from(be32(44))),
            nhip: IpAddr::V4(Ipv4Addr::from(be32(48))),
        }
    }
}

impl FlowSource for FixedLayoutSource {
    fn open(&self, path: &Path) -> Result<FlowRecords> {
        let file = File::open(path).map_err(|source| FlowError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Opened flow file");

        Ok(Box::new(FixedLayoutRecords {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            index: 0,
            done: false,
        }))
    }
}

struct FixedLayoutRecords {
    path: PathBuf,
    reader: BufReader<File>,
    index: usize,
    done: bool,
}

impl FixedLayoutRecords {
    /// Fill `buf` as far as the file allows, returning the byte count
    fn fill(&mut self, buf: &mut [u8; RECORD_LEN]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < RECORD_LEN {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn fail(&mut self, message: String) -> Option<Result<FlowRecord>> {
        self.done = true;
        Some(Err(FlowError::Format {
            path: self.path.clone(),
            message,
        }))
    }
}

impl Iterator for FixedLayoutRecords {
    type Item = Result<FlowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = [0u8; RECORD_LEN];
        match self.fill(&mut buf) {
            Ok(0) => {
                self.done = true;
                None
            },
            Ok(RECORD_LEN) => {
                self.index += 1;
                Some(Ok(FixedLayoutSource::decode(&buf)))
            },
            Ok(n) => {
                let message = format!(
                    "record {} truncated after {} of {} bytes",
                    self.index, n, RECORD_LEN
                );
                self.fail(message)
            },
            Err(e) => {
                let message = format!("read failed at record {}: {}", self.index, e);
                self.fail(message)
            },
        }
    }
}

fn classtype(flowtype: u8) -> (String, String) {
    let kind = FLOWTYPES
        .get(usize::from(flowtype))
        .map(|t| t.to_string())
        .unwrap_or_else(|| flowtype.to_string());
    (DEFAULT_CLASS.to_string(), kind)
}

fn flowtype_id((class, kind): &(String, String)) -> Option<u8> {
    if class != DEFAULT_CLASS {
        return None;
    }
    FLOWTYPES
        .iter()
        .position(|t| t == kind)
        .and_then(|i| u8::try_from(i).ok())
        .or_else(|| kind.parse().ok())
}

fn seconds_to_millis(secs: f64, field: &str) -> Result<u64> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(FlowError::Encode(format!("{} {} is out of range", field, secs)));
    }
    Ok((secs * 1000.0).round() as u64)
}

fn narrow_u16(value: u32, field: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| FlowError::Encode(format!("{} exceeds 16 bits", field)))
}

fn narrow_u32(value: u64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| FlowError::Encode(format!("{} exceeds 32 bits", field)))
}

fn ipv4_bits(addr: IpAddr, field: &str) -> Result<u32> {
    match addr {
        IpAddr::V4(v4) => Ok(u32::from(v4)),
        IpAddr::V6(_) => Err(FlowError::Encode(format!("{} is not IPv4", field))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(stime: f64, flowtype: &str) -> FlowRecord {
        FlowRecord {
            stime,
            duration: 1.5,
            sport: 53,
            dport: 40000,
            protocol: 17,
            classtype: ("all".to_string(), flowtype.to_string()),
            sensor: "7".to_string(),
            tcpflags: TcpFlags::default(),
            initflags: TcpFlags::default(),
            restflags: TcpFlags::default(),
            application: 53,
            input: 3,
            output: 4,
            packets: 2,
            bytes: 180,
            sip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
            dip: IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
            nhip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 254)),
        }
    }

    fn write_records(records: &[FlowRecord], trailing: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for r in records {
            file.write_all(&FixedLayoutSource::encode(r).unwrap()).unwrap();
        }
        file.write_all(trailing).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_decode_matches_encoded_fields() {
        let original = record(1_357_000_000.25, "inweb");
        let decoded = FixedLayoutSource::decode(&FixedLayoutSource::encode(&original).unwrap());
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_unknown_flowtype_renders_as_number() {
        let mut buf = FixedLayoutSource::encode(&record(1.0, "in")).unwrap();
        buf[17] = 42;
        let decoded = FixedLayoutSource::decode(&buf);
        assert_eq!(decoded.classtype, ("all".to_string(), "42".to_string()));
    }

    #[test]
    fn test_encode_rejects_ipv6() {
        let mut r = record(1.0, "in");
        r.dip = "2001:db8::1".parse().unwrap();
        assert!(matches!(FixedLayoutSource::encode(&r), Err(FlowError::Encode(_))));
    }

    #[test]
    fn test_reads_records_in_order() {
        let file = write_records(&[record(10.0, "in"), record(11.5, "out")], &[]);

        let records: Vec<FlowRecord> = FixedLayoutSource::new()
            .open(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].stime, 10.0);
        assert_eq!(records[1].classtype.1, "out");
    }

    #[test]
    fn test_empty_file_yields_nothing() {
        let file = write_records(&[], &[]);
        let mut records = FixedLayoutSource::new().open(file.path()).unwrap();
        assert!(records.next().is_none());
    }

    #[test]
    fn test_truncated_record_is_format_error() {
        let file = write_records(&[record(10.0, "in")], &[0u8; 10]);
        let mut records = FixedLayoutSource::new().open(file.path()).unwrap();

        assert!(records.next().unwrap().is_ok());
        assert!(matches!(
            records.next(),
            Some(Err(FlowError::Format { .. }))
        ));
        assert!(records.next().is_none());
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let result = FixedLayoutSource::new().open(&dir.path().join("absent.rw"));
        assert!(matches!(result, Err(FlowError::Open { .. })));
    }
}
