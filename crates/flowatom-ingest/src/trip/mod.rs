//! Trip-file (format B) records
//!
//! Trip files are decoded by the external `tripdump` tool into pipe-delimited
//! lines such as
//!
//! ```text
//! DNS: | 10.0.0.5 | example.org | A | 93.184.216.34 | ...
//! ```
//!
//! The first field names the record kind. Only the kinds in [`Label`] are
//! kept; each is padded to its fixed width and emitted on the stream that
//! carries its name.

pub mod reader;

use flowatom_common::Tuple;

pub use reader::TripdumpReader;

/// Field separator of tripdump output
pub const FIELD_SEPARATOR: char = '|';

/// Known record kinds and their expected field counts
///
/// The width counts the label itself as the first field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Dns,
    Client,
    Service,
    Fingerprint,
}

impl Label {
    pub const ALL: [Label; 4] = [Label::Dns, Label::Client, Label::Service, Label::Fingerprint];

    /// Look up a normalized (lower-case, colon-free) label
    pub fn from_label(label: &str) -> Option<Label> {
        Label::ALL.into_iter().find(|l| l.as_str() == label)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Dns => "dns",
            Label::Client => "client",
            Label::Service => "service",
            Label::Fingerprint => "fingerprint",
        }
    }

    /// Number of fields an accepted tuple of this kind carries
    pub fn expected_width(self) -> usize {
        match self {
            Label::Dns => 10,
            Label::Client => 12,
            Label::Service => 11,
            Label::Fingerprint => 9,
        }
    }

    /// Output stream for tuples of this kind
    pub fn stream(self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An accepted line, padded to its label's width
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub label: Label,
    /// All fields, the normalized label first
    pub fields: Tuple,
}

/// Why a line was not accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Dropped {
    #[error("no fields after label")]
    NoContent,

    #[error("unknown label `{0}`")]
    UnknownLabel(String),

    #[error("{fields} fields exceed {label} width {}", .label.expected_width())]
    TooWide { label: Label, fields: usize },
}

/// Classify one tripdump line
///
/// Splits on `|`, trims every field, strips one trailing `:` from the first
/// field and lower-cases it. The colon is optional: `dns|a` is accepted the
/// same as `DNS:|a`. Short lines are padded with empty fields.
pub fn classify_line(line: &str) -> Result<TextRecord, Dropped> {
    let mut fields: Tuple = line
        .split(FIELD_SEPARATOR)
        .map(|f| f.trim().to_string())
        .collect();

    if fields.len() <= 1 {
        return Err(Dropped::NoContent);
    }

    let raw = &fields[0];
    let normalized = raw.strip_suffix(':').unwrap_or(raw).to_lowercase();
    let label =
        Label::from_label(&normalized).ok_or_else(|| Dropped::UnknownLabel(normalized.clone()))?;
    fields[0] = normalized;

    let width = label.expected_width();
    if fields.len() > width {
        return Err(Dropped::TooWide {
            label,
            fields: fields.len(),
        });
    }
    fields.resize(width, String::new());

    Ok(TextRecord { label, fields })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dns_line_is_padded() {
        let record = classify_line("Dns: |a|b|c|d|e|f|g|h").unwrap();

        assert_eq!(record.label, Label::Dns);
        assert_eq!(
            record.fields,
            vec!["dns", "a", "b", "c", "d", "e", "f", "g", "h", ""]
        );
    }

    #[test]
    fn test_exact_width_is_kept() {
        let record = classify_line("Dns: |a|b|c|d|e|f|g|h|i").unwrap();
        assert_eq!(record.fields.len(), 10);
        assert_eq!(record.fields[9], "i");
    }

    #[test]
    fn test_over_width_is_dropped() {
        assert_eq!(
            classify_line("DNS:|a|b|c|d|e|f|g|h|i|j"),
            Err(Dropped::TooWide {
                label: Label::Dns,
                fields: 11
            })
        );
    }

    #[test]
    fn test_fields_are_trimmed() {
        let record = classify_line("  CLIENT:  |  10.0.0.1 \t| agent \r").unwrap();
        assert_eq!(record.label, Label::Client);
        assert_eq!(&record.fields[..3], &["client", "10.0.0.1", "agent"]);
        assert_eq!(record.fields.len(), 12);
    }

    #[test]
    fn test_label_without_colon() {
        let record = classify_line("service|x").unwrap();
        assert_eq!(record.label, Label::Service);
        assert_eq!(record.fields.len(), 11);

        assert_eq!(classify_line("dns|a"), classify_line("DNS:|a"));
    }

    #[test]
    fn test_only_one_colon_is_stripped() {
        assert_eq!(
            classify_line("dns::|a"),
            Err(Dropped::UnknownLabel("dns:".to_string()))
        );
    }

    #[test]
    fn test_unknown_label_is_dropped() {
        assert_eq!(
            classify_line("unknown:|a"),
            Err(Dropped::UnknownLabel("unknown".to_string()))
        );
    }

    #[test]
    fn test_label_only_is_dropped() {
        assert_eq!(classify_line("dns:"), Err(Dropped::NoContent));
        assert_eq!(classify_line(""), Err(Dropped::NoContent));
    }

    #[test]
    fn test_streams_follow_labels() {
        for label in Label::ALL {
            assert_eq!(label.stream(), label.to_string());
            assert_eq!(Label::from_label(label.as_str()), Some(label));
        }
        assert_eq!(Label::from_label("DNS"), None);
    }

    proptest! {
        #[test]
        fn prop_accepted_width_matches_label(idx in 0usize..4, extra in 1usize..16) {
            let label = Label::ALL[idx];
            let line = std::iter::once(format!("{}:", label.as_str().to_uppercase()))
                .chain((0..extra).map(|i| format!("f{}", i)))
                .collect::<Vec<_>>()
                .join("|");

            match classify_line(&line) {
                Ok(record) => {
                    prop_assert!(extra + 1 <= label.expected_width());
                    prop_assert_eq!(record.fields.len(), label.expected_width());
                    prop_assert_eq!(record.fields[0].as_str(), label.as_str());
                },
                Err(dropped) => {
                    prop_assert!(extra + 1 > label.expected_width());
                    prop_assert_eq!(dropped, Dropped::TooWide { label, fields: extra + 1 });
                },
            }
        }

        #[test]
        fn prop_unknown_labels_never_accepted(label in "[a-z]{1,12}", extra in 1usize..12) {
            prop_assume!(Label::from_label(&label).is_none());
            let line = format!("{}:{}", label, "|x".repeat(extra));
            prop_assert!(classify_line(&line).is_err());
        }
    }
}
