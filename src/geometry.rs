//! Great-circle geometry and the two-path transit solver
//!
//! Pure spherical trigonometry on a fixed-radius sphere. The inverse-cosine
//! arguments can drift just outside [-1, 1] for numerically adjacent points,
//! so every acos here takes a clamped argument.

use std::f64::consts::TAU;

/// Earth radius in km (metric mode)
pub const EARTH_RADIUS_KM: f64 = 6371.0;
/// Earth radius in statute miles (imperial mode)
pub const EARTH_RADIUS_MI: f64 = 3959.0;

/// Fixed observer site: position and antenna elevation
#[derive(Debug, Clone, Copy)]
pub struct Observer {
    pub lat: f64,
    pub lon: f64,
    /// Antenna elevation above sea level in meters
    pub elevation_m: f64,
}

impl Observer {
    pub fn position(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// Predicted crossing of the aircraft path and the observer-to-body ray
#[derive(Debug, Clone, Copy)]
pub struct Crossing {
    /// Bearing from observer to the crossing point, degrees [0, 360)
    pub azimuth_deg: f64,
    /// Line-of-sight elevation angle at the crossing point, degrees
    pub elevation_angle_deg: f64,
    /// Observer to crossing point, km (h2x)
    pub observer_to_crossing_km: f64,
    /// Aircraft to crossing point, km (p2x)
    pub aircraft_to_crossing_km: f64,
    /// Seconds until the aircraft reaches the crossing point
    pub eta_secs: f64,
    /// Ground distance of the ideal crossing point directly under the
    /// body ray at the aircraft's elevation, km
    pub ideal_crossing_km: f64,
}

fn clamp_unit(x: f64) -> f64 {
    x.clamp(-1.0, 1.0)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Great-circle distance in the units of `radius` (haversine)
pub fn distance(a: (f64, f64), b: (f64, f64), radius: f64) -> f64 {
    let (lat1, lon1) = a;
    let (lat2, lon2) = b;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    radius * c
}

/// Initial great-circle bearing from one point to another, degrees [0, 360)
pub fn bearing(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());
    let dlon = lon2 - lon1;
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Perpendicular deviation in km of a point `distance_km` away on bearing
/// `course_deg`, relative to a great-circle track of heading `track_deg`.
/// Rounded to 0.1 km.
pub fn crosstrack(distance_km: f64, course_deg: f64, track_deg: f64, radius: f64) -> f64 {
    let xtd = ((distance_km / radius).sin() * (course_deg - track_deg).to_radians().sin()).asin()
        * radius;
    round1(xtd.abs())
}

/// Solve the great-circle intersection of the observer-to-body ray and the
/// aircraft's track, and derive the crossing geometry.
///
/// Returns `None` when the body sits at or below the horizon, the two paths
/// diverge or are degenerate, the crossing is more than 500 km out, or the
/// aircraft reports no usable ground speed.
#[allow(clippy::too_many_arguments)]
pub fn intersect(
    observer: &Observer,
    body_az_deg: f64,
    body_alt_deg: f64,
    aircraft: (f64, f64),
    track_deg: f64,
    speed_kmh: f64,
    elevation_m: f64,
    radius: f64,
) -> Option<Crossing> {
    // At or below the horizon the solution is unstable and useless
    if body_alt_deg < 0.1 {
        return None;
    }
    if speed_kmh <= 0.0 {
        return None;
    }

    let (lat1, lon1) = (observer.lat.to_radians(), observer.lon.to_radians());
    let (lat2, lon2) = (aircraft.0.to_radians(), aircraft.1.to_radians());
    let theta_13 = body_az_deg.to_radians();
    let theta_23 = track_deg.to_radians();

    // Angular separation observer <-> aircraft
    let delta_12 = 2.0
        * (((lat1 - lat2) / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * ((lon1 - lon2) / 2.0).sin().powi(2))
        .sqrt()
        .asin();
    if delta_12 == 0.0 {
        return None;
    }

    let theta_a =
        clamp_unit((lat2.sin() - lat1.sin() * delta_12.cos()) / (delta_12.sin() * lat1.cos()))
            .acos();
    let theta_b =
        clamp_unit((lat1.sin() - lat2.sin() * delta_12.cos()) / (delta_12.sin() * lat2.cos()))
            .acos();

    let (theta_12, theta_21) = if (lon2 - lon1).sin() > 0.0 {
        (theta_a, TAU - theta_b)
    } else {
        (TAU - theta_a, theta_b)
    };

    // Included angles between each path and the connecting great circle
    let alfa_1 = theta_13 - theta_12;
    let alfa_2 = theta_21 - theta_23;
    if alfa_1.sin() == 0.0 && alfa_2.sin() == 0.0 {
        return None;
    }
    if alfa_1.sin() * alfa_2.sin() < 0.0 {
        // Paths diverge, no crossing ahead of either party
        return None;
    }

    let alfa_3 =
        clamp_unit(-alfa_1.cos() * alfa_2.cos() + alfa_1.sin() * alfa_2.sin() * delta_12.cos())
            .acos();
    let delta_13 = (delta_12.sin() * alfa_1.sin() * alfa_2.sin())
        .atan2(alfa_2.cos() + alfa_1.cos() * alfa_3.cos());

    let lat3 = (lat1.sin() * delta_13.cos() + lat1.cos() * delta_13.sin() * theta_13.cos()).asin();
    let dlon_13 = (theta_13.sin() * delta_13.sin() * lat1.cos())
        .atan2(delta_13.cos() - lat1.sin() * lat3.sin());
    let lat3 = lat3.to_degrees();
    let lon3 = ((lon1 + dlon_13).to_degrees() + 540.0) % 360.0 - 180.0;

    let mut h2x = round1(distance(observer.position(), (lat3, lon3), radius));
    if h2x > 500.0 {
        return None;
    }
    if h2x == 0.0 {
        h2x = 0.001;
    }

    let elevation_angle_deg =
        ((elevation_m - observer.elevation_m) / (h2x * 1000.0)).atan().to_degrees();
    let azimuth_deg = round1(bearing(observer.position(), (lat3, lon3)));
    let p2x = round1(distance(aircraft, (lat3, lon3), radius));
    let eta_secs = p2x / speed_kmh * 3600.0;

    // Ground distance to the point directly under the body ray at the
    // aircraft's elevation
    let ideal_crossing_km =
        ((90.0 - body_alt_deg).to_radians().sin() * elevation_m) / body_alt_deg.to_radians().sin()
            / 1000.0;

    Some(Crossing {
        azimuth_deg,
        elevation_angle_deg,
        observer_to_crossing_km: h2x,
        aircraft_to_crossing_km: p2x,
        eta_secs,
        ideal_crossing_km,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBS: Observer = Observer {
        lat: 51.1111,
        lon: 21.1111,
        elevation_m: 111.0,
    };

    #[test]
    fn test_distance_identity_and_symmetry() {
        let a = (51.1111, 21.1111);
        let b = (52.2297, 21.0122);
        assert_eq!(distance(a, a, EARTH_RADIUS_KM), 0.0);
        let ab = distance(a, b, EARTH_RADIUS_KM);
        let ba = distance(b, a, EARTH_RADIUS_KM);
        assert!((ab - ba).abs() < 1e-9);
        assert!(ab > 100.0 && ab < 150.0);
    }

    #[test]
    fn test_distance_triangle_inequality() {
        let a = (51.0, 21.0);
        let b = (52.0, 20.0);
        let c = (50.5, 22.5);
        let ab = distance(a, b, EARTH_RADIUS_KM);
        let bc = distance(b, c, EARTH_RADIUS_KM);
        let ac = distance(a, c, EARTH_RADIUS_KM);
        assert!(ac <= ab + bc + 1e-9);
    }

    #[test]
    fn test_bearing_cardinal() {
        let north = bearing((50.0, 21.0), (51.0, 21.0));
        assert!(north < 0.01 || north > 359.99);
        let east = bearing((0.0, 21.0), (0.0, 22.0));
        assert!((east - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_crosstrack_zero_on_track() {
        assert_eq!(crosstrack(100.0, 45.0, 45.0, EARTH_RADIUS_KM), 0.0);
    }

    #[test]
    fn test_crosstrack_course_flip_symmetry() {
        let a = crosstrack(120.0, 30.0, 80.0, EARTH_RADIUS_KM);
        let b = crosstrack(120.0, 210.0, 80.0, EARTH_RADIUS_KM);
        assert_eq!(a, b);
    }

    #[test]
    fn test_intersect_rejects_body_below_horizon() {
        let c = intersect(&OBS, 200.0, 0.05, (51.3, 21.3), 210.0, 800.0, 10000.0, EARTH_RADIUS_KM);
        assert!(c.is_none());
    }

    #[test]
    fn test_intersect_rejects_coincident_points() {
        let c = intersect(
            &OBS,
            200.0,
            45.0,
            (51.1111, 21.1111),
            180.0,
            800.0,
            10000.0,
            EARTH_RADIUS_KM,
        );
        assert!(c.is_none());
    }

    #[test]
    fn test_intersect_rejects_diverging_paths() {
        // Body ray toward NNE, aircraft north-east of the observer heading
        // south: the included angles have opposite-sign sines
        let c = intersect(&OBS, 20.0, 45.0, (51.3, 21.3), 180.0, 800.0, 10000.0, EARTH_RADIUS_KM);
        assert!(c.is_none());
    }

    #[test]
    fn test_intersect_survives_antipodal_inputs() {
        // Near-antipodal aircraft must not raise a domain fault; the
        // crossing is simply too far out
        let c = intersect(
            &OBS,
            200.0,
            45.0,
            (-51.1, -158.9),
            10.0,
            800.0,
            10000.0,
            EARTH_RADIUS_KM,
        );
        assert!(c.is_none());
    }

    #[test]
    fn test_intersect_converging_scenario() {
        // Aircraft NE of the observer tracking SSW across the body ray
        let c = intersect(&OBS, 200.0, 45.0, (51.3, 21.3), 210.0, 800.0, 10000.0, EARTH_RADIUS_KM)
            .expect("converging geometry must yield a crossing");
        assert!(c.observer_to_crossing_km > 0.0 && c.observer_to_crossing_km < 100.0);
        assert!(c.aircraft_to_crossing_km > 0.0);
        assert!(c.eta_secs > 0.0 && c.eta_secs < 900.0);
        // Crossing point lies roughly along the body azimuth
        assert!((c.azimuth_deg - 200.0).abs() < 5.0);
        // Predicted line-of-sight angle is computable against the body altitude
        let separation = c.elevation_angle_deg - 45.0;
        assert!(separation.is_finite());
    }
}
