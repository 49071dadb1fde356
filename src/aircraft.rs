//! Aircraft tracking and per-entry state
//!
//! Maintains the authoritative map from identity code to aircraft state.
//! All mutation goes through `apply_message`; the 1 Hz tick drives TTL
//! eviction and transit-hold expiry. Cross-track, warning, proximity and
//! trend are recomputed on every relevant event, never lazily at read time.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::alert::TransitLogRecord;
use crate::decoder::SbsMessage;
use crate::ephemeris::{Body, SkySnapshot};
use crate::geometry::{self, Observer};
use crate::transit::{self, SeparationTier, TRANSIT_LOCK_SECS, TransitCandidate};

/// Entries idle longer than this are evicted
pub const TRACK_TTL_SECS: i64 = 60;
/// Display/log freeze window after a locked transit
pub const TRANSIT_HOLD_SECS: i64 = transit::TRANSIT_HOLD_SECS;

/// Azimuth/altitude samples kept per aircraft (photography window of 120 s
/// at the 6 s sampling floor, with slack)
const ANGLE_HISTORY_CAP: usize = 32;
/// Minimum spacing between angle-history samples
const ANGLE_HISTORY_SPACING_SECS: i64 = 6;

/// Reports without a usable ground speed assume a fast cruiser
const DEFAULT_SPEED_KMH: f64 = 900.0;
/// Above this pressure altitude the QNH correction applies
const PRESSURE_ALTITUDE_FLOOR_FT: i32 = 6500;
const FT_PER_HPA: i32 = 26;
const FT_TO_M: f64 = 0.3048;
const KTS_TO_KMH: f64 = 1.852;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trend {
    #[default]
    Unknown,
    Approaching,
    Receding,
    Holding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarningState {
    #[default]
    Clear,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Proximity {
    #[default]
    Unlinked,
    Linked,
    Entering,
    Leaving,
}

/// Tracked aircraft state
#[derive(Debug, Clone)]
pub struct AircraftTrack {
    /// Sanitized identity code
    pub icao: String,
    /// Timestamp of the last applied event; drives eviction
    pub last_seen: DateTime<Utc>,
    pub callsign: Option<String>,
    pub position: Option<(f64, f64)>,
    /// Geometric altitude in meters, pressure-corrected
    pub elevation_m: Option<f64>,
    pub track_deg: Option<f64>,
    pub ground_speed_kmh: Option<f64>,
    /// Distance from observer, km
    pub distance_km: Option<f64>,
    /// Bearing from observer, degrees [0, 360)
    pub bearing_deg: Option<f64>,
    /// Line-of-sight elevation angle from observer, degrees
    pub elevation_angle_deg: Option<f64>,
    /// Running minimum distance, for the trend
    pub min_distance_km: Option<f64>,
    pub trend: Trend,
    pub crosstrack_km: Option<f64>,
    pub warning: WarningState,
    pub proximity: Proximity,
    /// (azimuth, elevation angle) samples at >= 6 s spacing, bounded ring
    pub angle_history: VecDeque<(f64, f64)>,
    last_angle_sample: Option<DateTime<Utc>>,
    pub transit_sun: Option<TransitCandidate>,
    pub transit_moon: Option<TransitCandidate>,
    /// Display/log freeze: set on a locked transit, cleared after 120 s
    pub transit_active: bool,
    pub transit_active_since: Option<DateTime<Utc>>,
    pub messages: u64,
}

impl AircraftTrack {
    fn new(icao: String, seen: DateTime<Utc>) -> Self {
        Self {
            icao,
            last_seen: seen,
            callsign: None,
            position: None,
            elevation_m: None,
            track_deg: None,
            ground_speed_kmh: None,
            distance_km: None,
            bearing_deg: None,
            elevation_angle_deg: None,
            min_distance_km: None,
            trend: Trend::Unknown,
            crosstrack_km: None,
            warning: WarningState::Clear,
            proximity: Proximity::Unlinked,
            angle_history: VecDeque::with_capacity(ANGLE_HISTORY_CAP),
            last_angle_sample: None,
            transit_sun: None,
            transit_moon: None,
            transit_active: false,
            transit_active_since: None,
            messages: 0,
        }
    }

    pub fn transit(&self, body: Body) -> Option<&TransitCandidate> {
        match body {
            Body::Sun => self.transit_sun.as_ref(),
            Body::Moon => self.transit_moon.as_ref(),
        }
    }

    /// Callsign when known, identity code otherwise
    pub fn display_name(&self) -> &str {
        self.callsign.as_deref().unwrap_or(&self.icao)
    }

    fn set_transit(&mut self, body: Body, candidate: TransitCandidate) {
        match body {
            Body::Sun => self.transit_sun = Some(candidate),
            Body::Moon => self.transit_moon = Some(candidate),
        }
    }
}

/// Everything an event application needs beyond the message itself
pub struct UpdateContext<'a> {
    pub observer: &'a Observer,
    pub sky: SkySnapshot,
    pub pressure_hpa: u32,
    /// Earth radius for the configured unit mode
    pub radius: f64,
    pub warning_distance_km: f64,
    pub alert_distance_km: f64,
    pub crosstrack_limit_km: f64,
    pub now: DateTime<Utc>,
}

/// Edge-triggered alert reasons surfaced by one event application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCause {
    WarningRaised,
    WarningCleared,
    ProximityEntering,
    TransitImminent(Body),
}

/// Side effects requested by one event application
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub alerts: Vec<AlertCause>,
    pub log_records: Vec<TransitLogRecord>,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// QNH-corrected geometric elevation in meters
fn corrected_elevation_m(elevation_ft: i32, pressure_hpa: u32) -> f64 {
    let mut ft = elevation_ft;
    if ft > PRESSURE_ALTITUDE_FLOOR_FT {
        ft += (crate::metar::STANDARD_PRESSURE_HPA as i32 - pressure_hpa as i32) * FT_PER_HPA;
    }
    f64::from(ft) * FT_TO_M
}

/// The authoritative aircraft map. The caller serializes access; every
/// method here is pure computation and returns immediately.
pub struct TrackStore {
    tracks: HashMap<String, AircraftTrack>,
    ttl: Duration,
    hold: Duration,
}

impl TrackStore {
    pub fn new(ttl_secs: i64, hold_secs: i64) -> Self {
        Self {
            tracks: HashMap::new(),
            ttl: Duration::seconds(ttl_secs),
            hold: Duration::seconds(hold_secs),
        }
    }

    pub fn get(&self, icao: &str) -> Option<&AircraftTrack> {
        self.tracks.get(icao)
    }

    pub fn all(&self) -> impl Iterator<Item = &AircraftTrack> {
        self.tracks.values()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Apply one decoded record: mutate the entry, re-derive the dependent
    /// state machines and run the transit predictor for both bodies.
    pub fn apply_message(&mut self, msg: &SbsMessage, ctx: &UpdateContext) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        let track = self
            .tracks
            .entry(msg.icao.clone())
            .or_insert_with(|| AircraftTrack::new(msg.icao.clone(), msg.timestamp));
        track.last_seen = msg.timestamp;
        track.messages += 1;

        match msg.msg_type {
            1 => {
                if msg.callsign.is_some() {
                    track.callsign = msg.callsign.clone();
                }
            }
            5 => {
                if msg.callsign.is_some() {
                    track.callsign = msg.callsign.clone();
                }
                if let Some(ft) = msg.elevation_ft {
                    track.elevation_m = Some(corrected_elevation_m(ft, ctx.pressure_hpa));
                }
            }
            4 => {
                apply_kinematics(track, msg);
            }
            3 => {
                if msg.mlat {
                    apply_kinematics(track, msg);
                }
                if let Some(ft) = msg.elevation_ft {
                    track.elevation_m = Some(corrected_elevation_m(ft, ctx.pressure_hpa));
                }
                if let Some(t) = msg.track_deg {
                    track.track_deg = Some(t);
                }
                apply_position(track, msg, ctx);
            }
            _ => {}
        }

        if track.position.is_some() && track.track_deg.is_some() {
            evaluate_states(track, ctx, &mut outcome);
        }

        outcome
    }

    /// TTL eviction: drop entries idle past the TTL, transit hold or not.
    /// Returns how many were removed.
    pub fn remove_stale(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.tracks.len();
        let ttl = self.ttl;
        self.tracks.retain(|_, t| now - t.last_seen <= ttl);
        before - self.tracks.len()
    }

    /// Clear transit holds older than the freeze window
    pub fn expire_transit_holds(&mut self, now: DateTime<Utc>) -> usize {
        let mut cleared = 0;
        for track in self.tracks.values_mut() {
            if track.transit_active
                && track.transit_active_since.is_some_and(|since| now - since > self.hold)
            {
                track.transit_active = false;
                track.transit_active_since = None;
                cleared += 1;
            }
        }
        cleared
    }
}

fn apply_kinematics(track: &mut AircraftTrack, msg: &SbsMessage) {
    let kmh = msg
        .speed_kts
        .map(|kts| (kts * KTS_TO_KMH).round())
        .unwrap_or(DEFAULT_SPEED_KMH);
    track.ground_speed_kmh = Some(kmh);
    // Empty track fields never overwrite a known heading
    if let Some(t) = msg.track_deg {
        track.track_deg = Some(t);
    }
}

fn apply_position(track: &mut AircraftTrack, msg: &SbsMessage, ctx: &UpdateContext) {
    let (Some(lat), Some(lon)) = (msg.lat, msg.lon) else {
        return;
    };
    if lat == 0.0 && lon == 0.0 {
        return;
    }

    let mut distance = round1(geometry::distance(ctx.observer.position(), (lat, lon), ctx.radius));
    if distance == 0.0 {
        distance = 0.01;
    }
    let bearing = round1(geometry::bearing(ctx.observer.position(), (lat, lon)));
    let elevation_angle = track.elevation_m.map(|m| {
        round1(((m - ctx.observer.elevation_m) / (distance * 1000.0)).atan().to_degrees())
    });

    track.position = Some((lat, lon));
    track.distance_km = Some(distance);
    track.bearing_deg = Some(bearing);
    track.elevation_angle_deg = elevation_angle;

    match track.min_distance_km {
        None => {
            track.min_distance_km = Some(distance);
        }
        Some(min) if distance < min => {
            track.trend = Trend::Approaching;
            track.min_distance_km = Some(distance);
        }
        Some(min) if distance > min => {
            track.trend = Trend::Receding;
        }
        Some(_) => {
            track.trend = Trend::Holding;
        }
    }

    // Angle history at the sampling floor
    let sample_due = match track.last_angle_sample {
        None => true,
        Some(prev) => (msg.timestamp - prev).num_seconds() >= ANGLE_HISTORY_SPACING_SECS,
    };
    if sample_due {
        if track.angle_history.len() == ANGLE_HISTORY_CAP {
            track.angle_history.pop_front();
        }
        track.angle_history.push_back((bearing, elevation_angle.unwrap_or(0.0)));
        track.last_angle_sample = Some(msg.timestamp);
    }
}

/// Cross-track/warning, proximity and the per-body transit predictions.
/// Pure function of the latest snapshot; fires edge-triggered alerts.
fn evaluate_states(track: &mut AircraftTrack, ctx: &UpdateContext, outcome: &mut ApplyOutcome) {
    let Some(distance) = track.distance_km else {
        return;
    };
    let Some(heading) = track.track_deg else {
        return;
    };
    let Some(bearing) = track.bearing_deg else {
        return;
    };
    let Some(position) = track.position else {
        return;
    };

    // Deviation of the projected track relative to the observer
    let course = (180.0 + bearing) % 360.0;
    let xtd = geometry::crosstrack(distance, course, heading, ctx.radius);
    track.crosstrack_km = Some(xtd);

    if track.trend != Trend::Receding && distance < ctx.warning_distance_km {
        match track.warning {
            WarningState::Clear if xtd <= ctx.crosstrack_limit_km => {
                track.warning = WarningState::Warning;
                outcome.alerts.push(AlertCause::WarningRaised);
            }
            WarningState::Warning if xtd > ctx.crosstrack_limit_km => {
                track.warning = WarningState::Clear;
                outcome.alerts.push(AlertCause::WarningCleared);
            }
            _ => {}
        }
    }

    if track.proximity == Proximity::Unlinked {
        track.proximity = Proximity::Linked;
    }
    if distance <= ctx.alert_distance_km && track.proximity != Proximity::Entering {
        track.proximity = Proximity::Entering;
        outcome.alerts.push(AlertCause::ProximityEntering);
    } else if distance > ctx.alert_distance_km && track.proximity == Proximity::Entering {
        track.proximity = Proximity::Leaving;
    }

    let speed_kmh = track.ground_speed_kmh.unwrap_or(DEFAULT_SPEED_KMH);
    let elevation_m = track.elevation_m.unwrap_or(ctx.observer.elevation_m);

    for body in [Body::Sun, Body::Moon] {
        let Some(candidate) = transit::predict(
            ctx.observer,
            ctx.sky.body(body),
            position,
            heading,
            speed_kmh,
            elevation_m,
            ctx.radius,
            ctx.now,
        ) else {
            continue;
        };

        if candidate.tier() == SeparationTier::Imminent {
            outcome.alerts.push(AlertCause::TransitImminent(body));
        }

        if candidate.eta_secs <= TRANSIT_LOCK_SECS {
            let newly_locked = !track.transit_active;
            track.transit_active = true;
            track.transit_active_since = Some(ctx.now);
            if newly_locked {
                outcome.log_records.push(TransitLogRecord {
                    // Log timestamps stay in observer-local time for the
                    // after-the-fact photo check
                    timestamp: ctx
                        .now
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                    icao: track.icao.clone(),
                    callsign: track.callsign.clone().unwrap_or_default(),
                    min_distance_km: track.min_distance_km.unwrap_or(distance),
                    plane_az_deg: bearing,
                    plane_alt_deg: track.elevation_angle_deg.unwrap_or(0.0),
                    body_az_deg: candidate.body_az_deg,
                    body_alt_deg: candidate.body_alt_deg,
                    body: body.name().to_string(),
                });
            }
        }

        track.set_transit(body, candidate);
    }
}
