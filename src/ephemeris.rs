//! Topocentric Sun and Moon positions
//!
//! Low-precision solar and lunar alt/az from days since J2000, good to
//! about a degree. That is enough to steer the transit solver; the final
//! verification happens through the camera anyway.

use chrono::{DateTime, Utc};

use crate::geometry::Observer;

/// Unix timestamp of the J2000.0 epoch (2000-01-01 12:00 UTC)
const J2000_UNIX: f64 = 946_728_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    Sun,
    Moon,
}

impl Body {
    pub fn name(&self) -> &'static str {
        match self {
            Body::Sun => "Sun",
            Body::Moon => "Moon",
        }
    }
}

/// Topocentric position of one body, degrees
#[derive(Debug, Clone, Copy)]
pub struct BodyPosition {
    pub alt_deg: f64,
    pub az_deg: f64,
}

/// Sun and Moon positions for one instant, refreshed by the 1 Hz tick
#[derive(Debug, Clone, Copy)]
pub struct SkySnapshot {
    pub sun: BodyPosition,
    pub moon: BodyPosition,
    pub at: DateTime<Utc>,
}

impl SkySnapshot {
    pub fn body(&self, body: Body) -> BodyPosition {
        match body {
            Body::Sun => self.sun,
            Body::Moon => self.moon,
        }
    }
}

fn norm_deg(x: f64) -> f64 {
    x.rem_euclid(360.0)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Days since J2000.0, fractional
fn days_since_j2000(at: DateTime<Utc>) -> f64 {
    let secs = at.timestamp() as f64 + f64::from(at.timestamp_subsec_millis()) / 1000.0;
    (secs - J2000_UNIX) / 86_400.0
}

/// Greenwich mean sidereal time in degrees
fn gmst_deg(days: f64) -> f64 {
    norm_deg(280.460_618_37 + 360.985_647_366_29 * days)
}

/// Convert ecliptic lon/lat (degrees) to topocentric alt/az for the observer
fn ecliptic_to_horizontal(
    observer: &Observer,
    days: f64,
    ecl_lon_deg: f64,
    ecl_lat_deg: f64,
) -> BodyPosition {
    let obliquity = (23.439 - 0.000_000_4 * days).to_radians();
    let lambda = ecl_lon_deg.to_radians();
    let beta = ecl_lat_deg.to_radians();

    let ra = (lambda.sin() * obliquity.cos() - beta.tan() * obliquity.sin()).atan2(lambda.cos());
    let dec = (beta.sin() * obliquity.cos() + beta.cos() * obliquity.sin() * lambda.sin()).asin();

    let hour_angle = (gmst_deg(days) + observer.lon - ra.to_degrees()).to_radians();
    let lat = observer.lat.to_radians();

    let alt = (lat.sin() * dec.sin() + lat.cos() * dec.cos() * hour_angle.cos()).asin();
    // Measured westward from south; shift to north-based azimuth
    let az_south = hour_angle
        .sin()
        .atan2(hour_angle.cos() * lat.sin() - dec.tan() * lat.cos());
    let az = norm_deg(az_south.to_degrees() + 180.0);

    BodyPosition {
        alt_deg: round1(alt.to_degrees()),
        az_deg: round1(az),
    }
}

fn sun_position(observer: &Observer, days: f64) -> BodyPosition {
    let mean_lon = norm_deg(280.460 + 0.985_647_4 * days);
    let mean_anomaly = norm_deg(357.528 + 0.985_600_3 * days).to_radians();
    let ecl_lon =
        mean_lon + 1.915 * mean_anomaly.sin() + 0.020 * (2.0 * mean_anomaly).sin();
    ecliptic_to_horizontal(observer, days, ecl_lon, 0.0)
}

fn moon_position(observer: &Observer, days: f64) -> BodyPosition {
    let mean_lon = norm_deg(218.316 + 13.176_396 * days);
    let mean_anomaly = norm_deg(134.963 + 13.064_993 * days).to_radians();
    let mean_distance = norm_deg(93.272 + 13.229_350 * days).to_radians();
    let ecl_lon = mean_lon + 6.289 * mean_anomaly.sin();
    let ecl_lat = 5.128 * mean_distance.sin();
    ecliptic_to_horizontal(observer, days, ecl_lon, ecl_lat)
}

/// Compute the current sky snapshot for the observer
pub fn compute(observer: &Observer, at: DateTime<Utc>) -> SkySnapshot {
    let days = days_since_j2000(at);
    SkySnapshot {
        sun: sun_position(observer, days),
        moon: moon_position(observer, days),
        at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EQUATOR: Observer = Observer {
        lat: 0.0,
        lon: 0.0,
        elevation_m: 0.0,
    };

    #[test]
    fn test_sun_high_at_solstice_noon() {
        let at = Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();
        let snap = compute(&EQUATOR, at);
        // Solar declination ~ +23.4 deg: altitude near 66.6 at the equator,
        // bearing to the north
        assert!(snap.sun.alt_deg > 60.0 && snap.sun.alt_deg < 72.0);
        assert!(snap.sun.az_deg < 40.0 || snap.sun.az_deg > 320.0);
    }

    #[test]
    fn test_sun_below_horizon_at_midnight() {
        let at = Utc.with_ymd_and_hms(2024, 6, 21, 0, 0, 0).unwrap();
        let snap = compute(&EQUATOR, at);
        assert!(snap.sun.alt_deg < -50.0);
    }

    #[test]
    fn test_positions_within_domain() {
        let obs = Observer {
            lat: 51.1111,
            lon: 21.1111,
            elevation_m: 111.0,
        };
        let at = Utc.with_ymd_and_hms(2024, 5, 15, 18, 30, 0).unwrap();
        let snap = compute(&obs, at);
        for body in [snap.sun, snap.moon] {
            assert!(body.alt_deg >= -90.0 && body.alt_deg <= 90.0);
            assert!(body.az_deg >= 0.0 && body.az_deg < 360.0);
        }
        // The two bodies are somewhere else than each other
        assert!(
            (snap.sun.az_deg - snap.moon.az_deg).abs() > 0.1
                || (snap.sun.alt_deg - snap.moon.alt_deg).abs() > 0.1
        );
    }
}
