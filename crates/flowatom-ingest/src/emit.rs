//! Tuple emitters
//!
//! An [`Emitter`] receives each normalized tuple together with the name of
//! the stream it belongs to. Flow tuples use [`DEFAULT_STREAM`]; trip tuples
//! use the stream of their label.

use std::io::Write;

use flowatom_common::{FlowError, Result, Tuple};
use serde::Serialize;

pub use flowatom_common::DEFAULT_STREAM;

/// Destination for normalized tuples
pub trait Emitter {
    /// Emit one tuple on `stream`
    fn emit(&mut self, stream: &str, tuple: &[String]) -> Result<()>;
}

impl<E: Emitter + ?Sized> Emitter for &mut E {
    fn emit(&mut self, stream: &str, tuple: &[String]) -> Result<()> {
        (**self).emit(stream, tuple)
    }
}

#[derive(Serialize)]
struct EmittedLine<'a> {
    stream: &'a str,
    tuple: &'a [String],
}

/// Writes one JSON object per tuple, flushed after every line
///
/// ```text
/// {"stream":"dns","tuple":["dns","10.0.0.5","example.org",...]}
/// ```
pub struct JsonLinesEmitter<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesEmitter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Emitter for JsonLinesEmitter<W> {
    fn emit(&mut self, stream: &str, tuple: &[String]) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &EmittedLine { stream, tuple })?;
        self.writer
            .write_all(b"\n")
            .and_then(|_| self.writer.flush())
            .map_err(|e| FlowError::Emit(e.to_string()))
    }
}

/// Keeps every emitted tuple in memory, in emission order
#[derive(Debug, Default, Clone)]
pub struct MemoryEmitter {
    emitted: Vec<(String, Tuple)>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> &[(String, Tuple)] {
        &self.emitted
    }

    /// Tuples emitted on `stream`, in emission order
    pub fn stream(&self, stream: &str) -> Vec<&Tuple> {
        self.emitted
            .iter()
            .filter(|(s, _)| s == stream)
            .map(|(_, t)| t)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }
}

impl Emitter for MemoryEmitter {
    fn emit(&mut self, stream: &str, tuple: &[String]) -> Result<()> {
        self.emitted.push((stream.to_string(), tuple.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn tuple(fields: &[&str]) -> Tuple {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_json_lines_output() {
        let mut emitter = JsonLinesEmitter::new(Vec::new());
        emitter.emit(DEFAULT_STREAM, &tuple(&["12", "5"])).unwrap();
        emitter.emit("dns", &tuple(&["dns", ""])).unwrap();

        let out = String::from_utf8(emitter.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["stream"], "default");
        assert_eq!(first["tuple"], serde_json::json!(["12", "5"]));
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["tuple"], serde_json::json!(["dns", ""]));
    }

    #[test]
    fn test_memory_emitter_partitions_by_stream() {
        let mut emitter = MemoryEmitter::new();
        emitter.emit("dns", &tuple(&["dns", "1"])).unwrap();
        emitter.emit("client", &tuple(&["client", "2"])).unwrap();
        emitter.emit("dns", &tuple(&["dns", "3"])).unwrap();

        assert_eq!(emitter.len(), 3);
        let dns = emitter.stream("dns");
        assert_eq!(dns.len(), 2);
        assert_eq!(dns[0][1], "1");
        assert_eq!(dns[1][1], "3");
        assert!(emitter.stream("service").is_empty());
    }
}
