//! SBS/BaseStation record decoding
//!
//! Turns one comma-separated feed line into a typed, validated message.
//! Field indices follow the BaseStation convention: class(0), subtype(1),
//! identity(4), date(6), time(7), callsign(10), altitude(11), speed(12),
//! track(12/13), lat(14), lon(15).

use chrono::{DateTime, Local, NaiveDateTime, Offset, TimeZone, Utc};
use thiserror::Error;

/// Which feed a record arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Decoded ADS-B reports (timestamps carry the local UTC offset)
    AdsB,
    /// Multilateration reports (timestamps already UTC)
    Mlat,
}

impl FeedKind {
    pub fn label(&self) -> &'static str {
        match self {
            FeedKind::AdsB => "ADS-B",
            FeedKind::Mlat => "MLAT",
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("record has too few fields")]
    TooShort,
    #[error("missing identity code")]
    MissingIdentity,
    #[error("unsupported subtype: {0}")]
    BadSubtype(String),
    #[error("unparsable timestamp: {0}")]
    BadTimestamp(String),
}

/// One decoded surveillance record
#[derive(Debug, Clone)]
pub struct SbsMessage {
    pub feed: FeedKind,
    /// Transmission subtype (1 identity, 3 position, 4 kinematic, 5 elevation)
    pub msg_type: u8,
    /// Record class column reads "MLAT"
    pub mlat: bool,
    /// Sanitized identity code (6-hex-digit address)
    pub icao: String,
    /// Record timestamp, normalized to UTC
    pub timestamp: DateTime<Utc>,
    pub callsign: Option<String>,
    /// Reported pressure altitude in feet, uncorrected
    pub elevation_ft: Option<i32>,
    pub speed_kts: Option<f64>,
    pub track_deg: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Local UTC offset in seconds, used to normalize ADS-B feed timestamps
pub fn local_utc_offset_secs() -> i64 {
    Local::now().offset().fix().local_minus_utc() as i64
}

fn field(parts: &[&str], idx: usize) -> Option<String> {
    parts.get(idx).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn num_field<T: std::str::FromStr>(parts: &[&str], idx: usize) -> Option<T> {
    field(parts, idx).and_then(|s| s.parse().ok())
}

/// Decode one feed line. Malformed records come back as errors and are
/// dropped by the caller; nothing here is fatal.
pub fn decode_line(
    line: &str,
    feed: FeedKind,
    local_offset_secs: i64,
) -> Result<SbsMessage, DecodeError> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 8 {
        return Err(DecodeError::TooShort);
    }

    let class = parts[0].trim();
    let mlat = class.eq_ignore_ascii_case("MLAT");

    let subtype = parts[1].trim();
    let msg_type: u8 = match subtype {
        "1" | "3" | "4" | "5" => subtype.parse().unwrap_or(0),
        other => return Err(DecodeError::BadSubtype(other.to_string())),
    };

    let icao: String = parts[4].trim().chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if icao.is_empty() {
        return Err(DecodeError::MissingIdentity);
    }

    let date = parts[6].trim();
    let time = parts[7].trim();
    let stamp = format!("{} {}", date, time);
    let naive = NaiveDateTime::parse_from_str(&stamp, "%Y/%m/%d %H:%M:%S%.f")
        .map_err(|_| DecodeError::BadTimestamp(stamp.clone()))?;
    // ADS-B feed timestamps are stamped in local time; MLAT is already UTC
    let naive = match feed {
        FeedKind::AdsB => naive - chrono::Duration::seconds(local_offset_secs),
        FeedKind::Mlat => naive,
    };
    let timestamp = Utc.from_utc_datetime(&naive);

    let mut msg = SbsMessage {
        feed,
        msg_type,
        mlat,
        icao,
        timestamp,
        callsign: None,
        elevation_ft: None,
        speed_kts: None,
        track_deg: None,
        lat: None,
        lon: None,
    };

    match msg_type {
        1 => {
            msg.callsign = field(&parts, 10);
        }
        5 => {
            msg.callsign = field(&parts, 10);
            msg.elevation_ft = num_field(&parts, 11);
        }
        4 => {
            msg.speed_kts = num_field(&parts, 12);
            msg.track_deg = num_field(&parts, 13);
        }
        3 => {
            msg.elevation_ft = num_field(&parts, 11);
            msg.track_deg = num_field(&parts, 12);
            msg.lat = num_field(&parts, 14);
            msg.lon = num_field(&parts, 15);
            if msg.mlat {
                // MLAT position records also carry kinematics in the
                // subtype-4 speed/track columns
                msg.speed_kts = num_field(&parts, 12);
                if let Some(t) = num_field(&parts, 13) {
                    msg.track_deg = Some(t);
                }
            }
        }
        _ => {}
    }

    Ok(msg)
}
