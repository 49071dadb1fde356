//! transitwarn-rs: Sun/Moon aircraft transit prediction from live
//! BaseStation feeds
//!
//! Tracks aircraft from two SBS feeds (decoded ADS-B and MLAT), predicts
//! great-circle crossings of the observer's Sun/Moon sight lines and
//! alerts ahead of photographable transits.

mod aircraft;
mod alert;
mod config;
mod decoder;
mod ephemeris;
mod geometry;
mod metar;
mod network;
mod transit;

use std::io::{self, Write};
use std::sync::Arc;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::RwLock;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::aircraft::{AircraftTrack, TrackStore};
use crate::alert::{Gong, TransitLog};
use crate::config::Config;
use crate::decoder::{FeedKind, SbsMessage};
use crate::ephemeris::SkySnapshot;
use crate::metar::PressureCache;
use crate::network::FeedStatus;
use crate::transit::{SeparationTier, TransitCandidate};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_args();

    // Initialize logging only if not in interactive mode
    if !config.interactive {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
        info!("transitwarn-rs starting...");
        info!("Configuration: {:?}", config);
    }

    let observer = config.observer();
    let local_offset_secs = decoder::local_utc_offset_secs();

    let store = Arc::new(RwLock::new(TrackStore::new(
        aircraft::TRACK_TTL_SECS,
        aircraft::TRANSIT_HOLD_SECS,
    )));
    let sky = Arc::new(RwLock::new(ephemeris::compute(&observer, Utc::now())));
    let pressure = Arc::new(PressureCache::new());
    let feed_status = Arc::new(FeedStatus::new());
    let gong = Arc::new(Gong::new());
    let transit_log = Arc::new(TransitLog::new(&config.log_path));

    // Channel from the feed clients to the single processor
    let (msg_tx, msg_rx): (Sender<SbsMessage>, Receiver<SbsMessage>) = bounded(1024);

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        for (port, feed) in [
            (config.adsb_port, FeedKind::AdsB),
            (config.mlat_port, FeedKind::Mlat),
        ] {
            let host = config.host.clone();
            let tx = msg_tx.clone();
            let status = Arc::clone(&feed_status);
            tokio::spawn(async move {
                network::run_feed_client(host, port, feed, local_offset_secs, tx, status).await;
            });
        }

        let metar_handle = {
            let url = config.metar_url.clone();
            let cache = Arc::clone(&pressure);
            tokio::spawn(async move {
                metar::run_refresh_task(url, cache).await;
            })
        };

        // Message processing task
        let processor_handle = {
            let store = Arc::clone(&store);
            let sky = Arc::clone(&sky);
            let pressure = Arc::clone(&pressure);
            let gong = Arc::clone(&gong);
            let transit_log = Arc::clone(&transit_log);
            let cfg = config.clone();
            tokio::spawn(async move {
                process_messages(msg_rx, store, sky, pressure, gong, transit_log, cfg).await;
            })
        };

        // 1 Hz housekeeping: sky refresh, TTL eviction, hold expiry
        let tick_handle = {
            let store = Arc::clone(&store);
            let sky = Arc::clone(&sky);
            let obs = observer;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
                loop {
                    interval.tick().await;
                    let now = Utc::now();
                    *sky.write() = ephemeris::compute(&obs, now);
                    let mut store = store.write();
                    store.remove_stale(now);
                    store.expire_transit_holds(now);
                }
            })
        };

        let interactive_handle = if config.interactive {
            let store = Arc::clone(&store);
            let sky = Arc::clone(&sky);
            let pressure = Arc::clone(&pressure);
            let status = Arc::clone(&feed_status);
            let cfg = config.clone();
            Some(tokio::spawn(async move {
                interactive_display(store, sky, pressure, status, cfg).await;
            }))
        } else {
            None
        };

        if !config.interactive {
            info!(
                "Watching {}:{} (ADS-B) and {}:{} (MLAT), Ctrl+C to exit",
                config.host, config.adsb_port, config.host, config.mlat_port
            );
        }
        tokio::signal::ctrl_c().await.ok();

        tick_handle.abort();
        metar_handle.abort();
        processor_handle.abort();
        if let Some(h) = interactive_handle {
            h.abort();
        }
    });

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn process_messages(
    rx: Receiver<SbsMessage>,
    store: Arc<RwLock<TrackStore>>,
    sky: Arc<RwLock<SkySnapshot>>,
    pressure: Arc<PressureCache>,
    gong: Arc<Gong>,
    transit_log: Arc<TransitLog>,
    config: Config,
) {
    let observer = config.observer();
    let radius = config.earth_radius();

    while let Ok(msg) = rx.recv() {
        let ctx = aircraft::UpdateContext {
            observer: &observer,
            sky: *sky.read(),
            pressure_hpa: pressure.current_hpa(),
            radius,
            warning_distance_km: config.warning_distance_km,
            alert_distance_km: config.alert_distance_km,
            crosstrack_limit_km: config.crosstrack_limit_km,
            now: Utc::now(),
        };
        let outcome = store.write().apply_message(&msg, &ctx);

        for cause in &outcome.alerts {
            gong.ring();
            if !config.interactive {
                info!("{} [{}]: {:?}", msg.icao, msg.feed.label(), cause);
            }
        }
        for record in &outcome.log_records {
            transit_log.append_or_warn(record);
        }
    }
}

const REDALERT: &str = "\x1b[1;37;41m";
const RED: &str = "\x1b[0;31;40m";
const GREENALERT: &str = "\x1b[0;30;42m";
const GREENFG: &str = "\x1b[1;32;40m";
const BLUE: &str = "\x1b[1;34;40m";
const YELLOW: &str = "\x1b[1;33;40m";
const CYAN: &str = "\x1b[1;36;40m";
const PURPLEDARK: &str = "\x1b[0;35;40m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// 16-point compass label for an azimuth in degrees
fn compass(az_deg: f64) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let idx = ((az_deg.rem_euclid(360.0) + 11.25) / 22.5) as usize % 16;
    POINTS[idx]
}

/// Staleness marker: fresh, aging, about to be evicted
fn age_marker(age_secs: i64) -> String {
    if age_secs < 10 {
        format!("{GREENFG}o{RESET}")
    } else if age_secs < 30 {
        format!("{YELLOW}!{RESET}")
    } else {
        format!("{RED}x{RESET}")
    }
}

/// One transit cell: separation, aircraft/observer crossing distances, the
/// ideal-point distance and the time left to the crossing, tier colored
fn transit_cell(
    candidate: Option<&TransitCandidate>,
    hold: bool,
    now: chrono::DateTime<Utc>,
) -> String {
    let Some(cand) = candidate else {
        return format!("{:>29}", "--");
    };
    let color = if hold {
        GREENALERT
    } else {
        match cand.tier() {
            SeparationTier::Imminent => GREENALERT,
            SeparationTier::Close => REDALERT,
            SeparationTier::Marginal => PURPLEDARK,
            SeparationTier::Ignored => return format!("{:>29}", "--"),
        }
    };
    // Count down from the prediction instant so the number stays honest
    // between updates
    let elapsed = (now - cand.computed_at).num_milliseconds() as f64 / 1000.0;
    let eta_left = (cand.eta_secs - elapsed).max(0.0);
    let text = format!(
        "{:>5.1} {:>5.1} {:>5.1} {:>5.1} {:>4.0}s",
        cand.separation_deg(),
        cand.aircraft_to_crossing_km,
        cand.observer_to_crossing_km,
        cand.ideal_crossing_km,
        eta_left,
    );
    format!("{color}{:>29}{RESET}", text)
}

fn distance_color(distance_km: f64, alert_km: f64, warning_km: f64) -> &'static str {
    if distance_km <= alert_km {
        REDALERT
    } else if distance_km <= warning_km {
        YELLOW
    } else {
        ""
    }
}

fn render_row(track: &AircraftTrack, config: &Config, now: chrono::DateTime<Utc>) -> String {
    let age = (now - track.last_seen).num_seconds().max(0);
    let dist = track.distance_km.unwrap_or(0.0);
    let dist_color = distance_color(dist, config.alert_distance_km, config.warning_distance_km);
    let az = track.bearing_deg.unwrap_or(0.0);
    let name_color = if track.transit_active {
        GREENALERT
    } else if track.warning == aircraft::WarningState::Warning {
        CYAN
    } else {
        ""
    };

    format!(
        "{name_color}{:<9}{RESET} {dist_color}{:>7.1}{RESET} {:>4}({:>5.1}) {:>6.2} {:>7.0} {:>5.0} {:>6.0} {:>6.1} {:>5} {} {} {}",
        track.display_name(),
        dist,
        compass(az),
        az,
        track.elevation_angle_deg.unwrap_or(0.0),
        track.elevation_m.unwrap_or(0.0),
        track.ground_speed_kmh.unwrap_or(0.0),
        track.track_deg.unwrap_or(0.0),
        track.crosstrack_km.unwrap_or(0.0),
        track.messages,
        transit_cell(track.transit_sun.as_ref(), track.transit_active, now),
        transit_cell(track.transit_moon.as_ref(), track.transit_active, now),
        age_marker(age),
    )
}

async fn interactive_display(
    store: Arc<RwLock<TrackStore>>,
    sky: Arc<RwLock<SkySnapshot>>,
    pressure: Arc<PressureCache>,
    feed_status: Arc<FeedStatus>,
    config: Config,
) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
    let unit = if config.metric { "km" } else { "mi" };

    loop {
        interval.tick().await;
        let now = Utc::now();
        let snap = *sky.read();

        // Clear screen and move cursor to top
        print!("\x1b[2J\x1b[H");

        println!(
            "{BOLD}{:<9} {:>7} {:>11} {:>6} {:>7} {:>5} {:>6} {:>6} {:>5} {:>29} {:>29} {:>1}{RESET}",
            "Flight",
            format!("D[{}]", unit),
            "Azimuth",
            "El[*]",
            "Alt[m]",
            "Spd",
            "Trk",
            format!("XTD[{}]", unit),
            "Msgs",
            "Sun sep/p2x/h2x/idl/eta",
            "Moon sep/p2x/h2x/idl/eta",
            "S",
        );
        println!("{}", "-".repeat(132));

        let store = store.read();
        let mut tracks: Vec<&AircraftTrack> = store
            .all()
            .filter(|t| t.position.is_some())
            .collect();
        // Locked transits pinned on top, then nearest first
        tracks.sort_by(|a, b| {
            b.transit_active.cmp(&a.transit_active).then(
                a.distance_km
                    .unwrap_or(f64::MAX)
                    .total_cmp(&b.distance_km.unwrap_or(f64::MAX)),
            )
        });

        if store.is_empty() {
            println!("  (no aircraft tracked)");
        } else {
            for track in tracks.into_iter().take(config.interactive_rows) {
                println!("{}", render_row(track, &config, now));
            }
        }

        println!("{}", "-".repeat(132));
        let adsb = feed_state_label(&feed_status, FeedKind::AdsB);
        let mlat = feed_state_label(&feed_status, FeedKind::Mlat);
        println!(
            "{BLUE}{}{RESET} UTC | Sun {:>5.1}*/{:<5.1} Moon {:>5.1}*/{:<5.1} @ {} | QNH {} hPa | {} | {} | {} tracked",
            now.format("%Y-%m-%d %H:%M:%S"),
            snap.sun.alt_deg,
            snap.sun.az_deg,
            snap.moon.alt_deg,
            snap.moon.az_deg,
            snap.at.format("%H:%M:%S"),
            pressure.current_hpa(),
            adsb,
            mlat,
            store.len(),
        );

        io::stdout().flush().ok();
    }
}

fn feed_state_label(status: &FeedStatus, feed: FeedKind) -> String {
    if status.is_up(feed) {
        format!("{GREENFG}{} up{RESET}", feed.label())
    } else {
        format!("{REDALERT}{} down{RESET}", feed.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compass_points() {
        assert_eq!(compass(0.0), "N");
        assert_eq!(compass(11.24), "N");
        assert_eq!(compass(11.26), "NNE");
        assert_eq!(compass(90.0), "E");
        assert_eq!(compass(200.0), "SSW");
        assert_eq!(compass(359.9), "N");
    }

    #[test]
    fn test_age_marker_bands() {
        assert!(age_marker(0).contains('o'));
        assert!(age_marker(15).contains('!'));
        assert!(age_marker(45).contains('x'));
    }

    fn sample_candidate(now: chrono::DateTime<Utc>) -> TransitCandidate {
        TransitCandidate {
            body_alt_deg: 45.0,
            body_az_deg: 200.0,
            predicted_elevation_angle_deg: 50.0,
            observer_to_crossing_km: 5.6,
            aircraft_to_crossing_km: 12.3,
            ideal_crossing_km: 11.2,
            eta_secs: 135.0,
            computed_at: now - chrono::Duration::seconds(10),
        }
    }

    #[test]
    fn test_transit_cell_shows_crossing_numbers() {
        let now = Utc::now();
        let cand = sample_candidate(now);
        let cell = transit_cell(Some(&cand), false, now);
        // Separation 5.0, aircraft and observer crossing distances, the
        // ideal-point distance and the countdown (135 s minus 10 s elapsed)
        assert!(cell.contains("5.0"));
        assert!(cell.contains("12.3"));
        assert!(cell.contains("5.6"));
        assert!(cell.contains("11.2"));
        assert!(cell.contains("125s"));
        assert!(cell.contains(REDALERT));
    }

    #[test]
    fn test_transit_cell_countdown_floors_at_zero() {
        let now = Utc::now();
        let mut cand = sample_candidate(now);
        cand.computed_at = now - chrono::Duration::seconds(200);
        let cell = transit_cell(Some(&cand), false, now);
        assert!(cell.contains("0s"));
        assert!(!cell.contains("-"));
    }

    #[test]
    fn test_transit_cell_hidden_unless_shown_or_held() {
        let now = Utc::now();
        assert_eq!(transit_cell(None, false, now).trim(), "--");

        let mut cand = sample_candidate(now);
        cand.predicted_elevation_angle_deg = 70.0;
        assert_eq!(transit_cell(Some(&cand), false, now).trim(), "--");
        // An armed hold keeps the numbers on screen regardless of tier
        let held = transit_cell(Some(&cand), true, now);
        assert!(held.contains(GREENALERT));
        assert!(held.contains("12.3"));
    }

    #[test]
    fn test_render_row_shows_message_count() {
        use crate::aircraft::{TRACK_TTL_SECS, TRANSIT_HOLD_SECS, UpdateContext};
        use crate::decoder::decode_line;
        use crate::ephemeris::BodyPosition;
        use crate::geometry::{EARTH_RADIUS_KM, Observer};

        let now = Utc::now();
        let observer = Observer {
            lat: 51.1111,
            lon: 21.1111,
            elevation_m: 111.0,
        };
        let sky = SkySnapshot {
            sun: BodyPosition {
                alt_deg: -10.0,
                az_deg: 0.0,
            },
            moon: BodyPosition {
                alt_deg: -10.0,
                az_deg: 0.0,
            },
            at: now,
        };
        let ctx = UpdateContext {
            observer: &observer,
            sky,
            pressure_hpa: 1013,
            radius: EARTH_RADIUS_KM,
            warning_distance_km: 200.0,
            alert_distance_km: 15.0,
            crosstrack_limit_km: 20.0,
            now,
        };

        let mut store = TrackStore::new(TRACK_TTL_SECS, TRANSIT_HOLD_SECS);
        for secs in [0, 1, 2] {
            let line = format!(
                "MSG,3,111,11111,4CA2D6,111111,2024/05/01,12:00:0{secs}.0,2024/05/01,12:00:0{secs}.0,,37000,180.0,,51.3,21.3,,,,,,0"
            );
            store.apply_message(&decode_line(&line, FeedKind::Mlat, 0).unwrap(), &ctx);
        }

        let row = render_row(store.get("4CA2D6").unwrap(), &Config::default(), now);
        assert!(row.contains("4CA2D6"));
        assert!(row.contains("    3"));
    }
}
