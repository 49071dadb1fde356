//! Transit prediction
//!
//! Wraps the great-circle solver into a per-body candidate with an
//! actionability horizon and the separation tiers used for alerting and
//! display.

use chrono::{DateTime, Utc};

use crate::ephemeris::BodyPosition;
use crate::geometry::{self, Observer};

/// Predictions further out than this are not actionable
pub const TRANSIT_HORIZON_SECS: f64 = 900.0;
/// A candidate this close arms the display/log hold
pub const TRANSIT_LOCK_SECS: f64 = 2.0;
/// The display/log hold duration after a locked transit
pub const TRANSIT_HOLD_SECS: i64 = 120;

/// Loudest tier: always fires the audible signal
pub const SEP_ALERT_DEG: f64 = 3.0;
/// Red tier
pub const SEP_RED_DEG: f64 = 7.0;
/// Beyond this the candidate is shown as dashes
pub const SEP_SHOWN_DEG: f64 = 15.0;

/// Separation band between the predicted line-of-sight angle and the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparationTier {
    /// |sep| < 3 deg: audible alert, highlighted green
    Imminent,
    /// |sep| < 7 deg: red
    Close,
    /// |sep| < 15 deg: dimmed but shown
    Marginal,
    /// Not worth showing
    Ignored,
}

pub fn separation_tier(separation_deg: f64) -> SeparationTier {
    let sep = separation_deg.abs();
    if sep < SEP_ALERT_DEG {
        SeparationTier::Imminent
    } else if sep < SEP_RED_DEG {
        SeparationTier::Close
    } else if sep < SEP_SHOWN_DEG {
        SeparationTier::Marginal
    } else {
        SeparationTier::Ignored
    }
}

/// Predicted closest-approach geometry for one aircraft and one body
#[derive(Debug, Clone, Copy)]
pub struct TransitCandidate {
    /// Body altitude used for the prediction, degrees
    pub body_alt_deg: f64,
    /// Body azimuth used for the prediction, degrees
    pub body_az_deg: f64,
    /// Predicted line-of-sight elevation angle at the crossing, degrees
    pub predicted_elevation_angle_deg: f64,
    /// Observer to crossing point, km (h2x)
    pub observer_to_crossing_km: f64,
    /// Aircraft to crossing point, km (p2x)
    pub aircraft_to_crossing_km: f64,
    /// Ground distance of the ideal crossing point under the body ray, km
    pub ideal_crossing_km: f64,
    pub eta_secs: f64,
    pub computed_at: DateTime<Utc>,
}

impl TransitCandidate {
    /// Predicted angle minus body altitude; zero means dead-on
    pub fn separation_deg(&self) -> f64 {
        self.predicted_elevation_angle_deg - self.body_alt_deg
    }

    pub fn tier(&self) -> SeparationTier {
        separation_tier(self.separation_deg())
    }
}

/// Run the solver for one body. Recomputing with the same inputs yields the
/// same output; candidates past the 15 min horizon are discarded.
#[allow(clippy::too_many_arguments)]
pub fn predict(
    observer: &Observer,
    body: BodyPosition,
    aircraft: (f64, f64),
    track_deg: f64,
    speed_kmh: f64,
    elevation_m: f64,
    radius: f64,
    now: DateTime<Utc>,
) -> Option<TransitCandidate> {
    let crossing = geometry::intersect(
        observer,
        body.az_deg,
        body.alt_deg,
        aircraft,
        track_deg,
        speed_kmh,
        elevation_m,
        radius,
    )?;
    if crossing.eta_secs > TRANSIT_HORIZON_SECS {
        return None;
    }
    Some(TransitCandidate {
        body_alt_deg: body.alt_deg,
        body_az_deg: body.az_deg,
        predicted_elevation_angle_deg: (crossing.elevation_angle_deg * 100.0).round() / 100.0,
        observer_to_crossing_km: crossing.observer_to_crossing_km,
        aircraft_to_crossing_km: crossing.aircraft_to_crossing_km,
        ideal_crossing_km: crossing.ideal_crossing_km,
        eta_secs: crossing.eta_secs,
        computed_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EARTH_RADIUS_KM;

    const OBS: Observer = Observer {
        lat: 51.1111,
        lon: 21.1111,
        elevation_m: 111.0,
    };

    const MOON: BodyPosition = BodyPosition {
        alt_deg: 45.0,
        az_deg: 200.0,
    };

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(separation_tier(0.0), SeparationTier::Imminent);
        assert_eq!(separation_tier(-2.99), SeparationTier::Imminent);
        assert_eq!(separation_tier(3.0), SeparationTier::Close);
        assert_eq!(separation_tier(-6.9), SeparationTier::Close);
        assert_eq!(separation_tier(7.0), SeparationTier::Marginal);
        assert_eq!(separation_tier(14.9), SeparationTier::Marginal);
        assert_eq!(separation_tier(15.0), SeparationTier::Ignored);
        assert_eq!(separation_tier(90.0), SeparationTier::Ignored);
    }

    #[test]
    fn test_predict_converging_aircraft() {
        let now = Utc::now();
        let cand = predict(
            &OBS,
            MOON,
            (51.3, 21.3),
            210.0,
            800.0,
            10000.0,
            EARTH_RADIUS_KM,
            now,
        )
        .expect("candidate expected inside the horizon");
        assert!(cand.eta_secs > 0.0 && cand.eta_secs <= TRANSIT_HORIZON_SECS);
        let sep = cand.separation_deg();
        assert!((sep - (cand.predicted_elevation_angle_deg - 45.0)).abs() < 1e-9);
        // Tier classification is consistent with the documented thresholds
        let expected = separation_tier(sep);
        assert_eq!(cand.tier(), expected);
    }

    #[test]
    fn test_predict_discards_beyond_horizon() {
        // Same geometry at a crawl: the ETA blows through the 15 min horizon
        let cand = predict(
            &OBS,
            MOON,
            (51.3, 21.3),
            210.0,
            60.0,
            10000.0,
            EARTH_RADIUS_KM,
            Utc::now(),
        );
        assert!(cand.is_none());
    }

    #[test]
    fn test_predict_rejects_horizon_body() {
        let low = BodyPosition {
            alt_deg: 0.05,
            az_deg: 200.0,
        };
        let cand = predict(
            &OBS,
            low,
            (51.3, 21.3),
            210.0,
            800.0,
            10000.0,
            EARTH_RADIUS_KM,
            Utc::now(),
        );
        assert!(cand.is_none());
    }
}
