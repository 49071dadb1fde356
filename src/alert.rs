//! Audible alert and transit log
//!
//! The gong is a single shared signal with a 2 s global debounce; any
//! trigger within the window is suppressed. The transit log is an
//! append-only CSV for after-the-fact verification of logged transits.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

const GONG_DEBOUNCE: Duration = Duration::from_secs(2);

/// Shared audible alert with global debounce
pub struct Gong {
    last: Mutex<Option<Instant>>,
}

impl Default for Gong {
    fn default() -> Self {
        Self::new()
    }
}

impl Gong {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    /// Ring the terminal bell unless one rang within the debounce window.
    /// Returns whether the bell actually fired.
    pub fn ring(&self) -> bool {
        if !self.arm() {
            return false;
        }
        print!("\x07");
        let _ = io::stdout().flush();
        true
    }

    /// Debounce check and timestamp update, separated out for tests
    fn arm(&self) -> bool {
        let mut last = self.last.lock();
        let now = Instant::now();
        match *last {
            Some(prev) if now.duration_since(prev) <= GONG_DEBOUNCE => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// One audit record, appended when a transit arms the display hold
#[derive(Debug, Clone, Serialize)]
pub struct TransitLogRecord {
    pub timestamp: String,
    pub icao: String,
    pub callsign: String,
    pub min_distance_km: f64,
    pub plane_az_deg: f64,
    pub plane_alt_deg: f64,
    pub body_az_deg: f64,
    pub body_alt_deg: f64,
    pub body: String,
}

/// Append-only CSV transit log. Write failures are reported, never fatal.
pub struct TransitLog {
    path: PathBuf,
}

impl TransitLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, record: &TransitLogRecord) -> Result<(), csv::Error> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    /// Fire-and-forget append
    pub fn append_or_warn(&self, record: &TransitLogRecord) {
        if let Err(e) = self.append(record) {
            warn!("transit log write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gong_debounce_suppresses_repeat() {
        let gong = Gong::new();
        assert!(gong.arm());
        // Immediately after, still inside the 2 s window
        assert!(!gong.arm());
        assert!(!gong.arm());
    }

    #[test]
    fn test_transit_log_appends_csv() {
        let path = std::env::temp_dir().join(format!("transitwarn-test-{}.csv", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let log = TransitLog::new(&path);

        let record = TransitLogRecord {
            timestamp: "2024-05-01 12:00:00".to_string(),
            icao: "4CA2D6".to_string(),
            callsign: "LOT123".to_string(),
            min_distance_km: 12.3,
            plane_az_deg: 201.5,
            plane_alt_deg: 44.2,
            body_az_deg: 200.0,
            body_alt_deg: 45.0,
            body: "Moon".to_string(),
        };
        log.append(&record).unwrap();
        log.append(&record).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("2024-05-01 12:00:00,4CA2D6,LOT123,"));
        assert!(lines[0].ends_with(",Moon"));

        let _ = std::fs::remove_file(&path);
    }
}
