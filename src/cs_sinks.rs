//! Traffic sinks for consuming emitted events

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::SecondsFormat;
use log::{info, warn};

use crate::cs_interface::TrafficEvent;

/// Trait for consuming events produced by the simulator
pub trait TrafficSink {
    fn record(&mut self, event: &TrafficEvent);

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Push every event of `events` into `sink`, returning how many were recorded
pub fn drain<I, S>(events: I, sink: &mut S) -> usize
where
    I: IntoIterator<Item = TrafficEvent>,
    S: TrafficSink + ?Sized,
{
    let mut count = 0;
    for event in events {
        sink.record(&event);
        count += 1;
    }
    count
}

/// No-op sink
pub struct NoOpSink;

impl TrafficSink for NoOpSink {
    #[inline(always)]
    fn record(&mut self, _event: &TrafficEvent) {}
}

fn kind(event: &TrafficEvent) -> &'static str {
    if event.replayed {
        "replay"
    } else {
        "synth"
    }
}

// ============================================================================
// Console Sink
// ============================================================================

/// Logs one line per event
pub struct ConsoleSink {
    enabled: bool,
}

impl ConsoleSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl TrafficSink for ConsoleSink {
    fn record(&mut self, event: &TrafficEvent) {
        if !self.enabled {
            return;
        }

        info!(
            "{} {:>6} {} -> {} {:<5} {:>8}B",
            event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            kind(event),
            event.src,
            event.dst,
            event.protocol,
            event.byte_count
        );
    }
}

// ============================================================================
// CSV Sink
// ============================================================================

pub const CSV_HEADER: &str = "timestamp,src,dst,protocol,bytes,replayed";

/// Writes events as CSV rows
pub struct CsvSink<W: Write> {
    writer: W,
    write_errors: usize,
}

impl CsvSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvSink<W> {
    /// Wrap a writer and emit the header row
    pub fn new(mut writer: W) -> io::Result<Self> {
        writeln!(writer, "{}", CSV_HEADER)?;
        Ok(Self {
            writer,
            write_errors: 0,
        })
    }

    /// Number of rows that failed to write
    pub fn write_errors(&self) -> usize {
        self.write_errors
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl<W: Write> TrafficSink for CsvSink<W> {
    fn record(&mut self, event: &TrafficEvent) {
        let result = writeln!(
            self.writer,
            "{},{},{},{},{},{}",
            event.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            csv_field(&event.src),
            csv_field(&event.dst),
            csv_field(&event.protocol),
            event.byte_count,
            event.replayed
        );

        if let Err(e) = result {
            self.write_errors += 1;
            warn!("error writing csv row: {}", e);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<W: Write> Drop for CsvSink<W> {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

// ============================================================================
// Digest Sink
// ============================================================================

/// Fingerprints an event stream with blake3
///
/// Two streams have the same digest exactly when they contain the same events
/// in the same order, which makes it cheap to compare runs for reproducibility.
pub struct DigestSink {
    hasher: blake3::Hasher,
    events: usize,
}

impl DigestSink {
    pub fn new() -> Self {
        Self {
            hasher: blake3::Hasher::new(),
            events: 0,
        }
    }

    pub fn events(&self) -> usize {
        self.events
    }

    pub fn finalize_hex(&self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for DigestSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficSink for DigestSink {
    fn record(&mut self, event: &TrafficEvent) {
        // length-prefixed fields so "ab","c" and "a","bc" differ
        self.hasher
            .update(&event.timestamp.timestamp_micros().to_le_bytes());
        for field in [&event.src, &event.dst, &event.protocol] {
            self.hasher.update(&(field.len() as u64).to_le_bytes());
            self.hasher.update(field.as_bytes());
        }
        self.hasher.update(&event.byte_count.to_le_bytes());
        self.hasher.update(&[event.replayed as u8]);
        self.events += 1;
    }
}

// ============================================================================
// Collector Sink (In-Memory)
// ============================================================================

/// Collects events in memory for programmatic analysis
#[derive(Default)]
pub struct CollectorSink {
    pub events: Vec<TrafficEvent>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn replayed(&self) -> impl Iterator<Item = &TrafficEvent> {
        self.events.iter().filter(|e| e.replayed)
    }

    pub fn synthesized(&self) -> impl Iterator<Item = &TrafficEvent> {
        self.events.iter().filter(|e| !e.replayed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.events.iter().map(|e| e.byte_count).sum()
    }
}

impl TrafficSink for CollectorSink {
    fn record(&mut self, event: &TrafficEvent) {
        self.events.push(event.clone());
    }
}

// ============================================================================
// Multi Sink (Combine Multiple Sinks)
// ============================================================================

/// Fans each event out to several sinks
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn TrafficSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Box<dyn TrafficSink>) {
        self.sinks.push(sink);
    }
}

impl TrafficSink for MultiSink {
    fn record(&mut self, event: &TrafficEvent) {
        for sink in &mut self.sinks {
            sink.record(event);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn event(offset_secs: i64, src: &str, dst: &str, bytes: u64, replayed: bool) -> TrafficEvent {
        TrafficEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
            src: src.to_string(),
            dst: dst.to_string(),
            protocol: "TCP".to_string(),
            byte_count: bytes,
            replayed,
        }
    }

    #[test]
    fn test_csv_sink_rows() {
        let mut buffer: Vec<u8> = Vec::new();
        {
            let mut sink = CsvSink::new(&mut buffer).unwrap();
            sink.record(&event(0, "A", "B", 100, true));
            sink.record(&event(1, "host,1", "C", 7, false));
            assert_eq!(sink.write_errors(), 0);
        }

        let out = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "2024-01-01T00:00:00Z,A,B,TCP,100,true");
        assert_eq!(lines[2], "2024-01-01T00:00:01Z,\"host,1\",C,TCP,7,false");
    }

    #[test]
    fn test_digest_matches_identical_streams() {
        let stream = vec![event(0, "A", "B", 1, false), event(5, "B", "C", 2, false)];

        let mut first = DigestSink::new();
        let mut second = DigestSink::new();
        drain(stream.clone(), &mut first);
        drain(stream, &mut second);

        assert_eq!(first.events(), 2);
        assert_eq!(first.finalize_hex(), second.finalize_hex());
    }

    #[test]
    fn test_digest_differs_on_any_change() {
        let base = vec![event(0, "A", "B", 1, false), event(5, "B", "C", 2, false)];
        let mut reordered = base.clone();
        reordered.swap(0, 1);
        let mut shifted = base.clone();
        shifted[1].byte_count = 3;

        let digest = |events: Vec<TrafficEvent>| {
            let mut sink = DigestSink::new();
            drain(events, &mut sink);
            sink.finalize_hex()
        };

        let reference = digest(base);
        assert_ne!(reference, digest(reordered));
        assert_ne!(reference, digest(shifted));
        assert_ne!(
            digest(vec![event(0, "ab", "c", 1, false)]),
            digest(vec![event(0, "a", "bc", 1, false)])
        );
    }

    #[test]
    fn test_collector_and_multi_sink() {
        let mut collector = CollectorSink::new();
        let recorded = drain(
            vec![event(0, "A", "B", 10, true), event(1, "B", "A", 5, false)],
            &mut collector,
        );

        assert_eq!(recorded, 2);
        assert_eq!(collector.replayed().count(), 1);
        assert_eq!(collector.synthesized().count(), 1);
        assert_eq!(collector.total_bytes(), 15);

        let mut multi = MultiSink::new();
        multi.add_sink(Box::new(NoOpSink));
        multi.add_sink(Box::new(DigestSink::new()));
        assert_eq!(drain(collector.events.clone(), &mut multi), 2);
        assert!(multi.flush().is_ok());
    }
}
