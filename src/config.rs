//! Configuration and command-line argument parsing

use std::env;

use crate::geometry::{EARTH_RADIUS_KM, EARTH_RADIUS_MI, Observer};

#[derive(Debug, Clone)]
pub struct Config {
    // Observer site
    /// Site latitude, degrees
    pub lat: f64,
    /// Site longitude, degrees
    pub lon: f64,
    /// Antenna elevation above sea level, meters
    pub elevation_m: f64,

    // Feeds
    pub host: String,
    /// Decoded ADS-B feed (BaseStation format)
    pub adsb_port: u16,
    /// Multilateration feed (BaseStation format)
    pub mlat_port: u16,

    // Distance and deviation limits
    pub warning_distance_km: f64,
    pub alert_distance_km: f64,
    pub crosstrack_limit_km: f64,

    // Output
    pub metric: bool,
    pub interactive: bool,
    pub interactive_rows: usize,
    pub log_path: String,

    // METAR source for the QNH correction
    pub metar_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lat: 51.1111,
            lon: 21.1111,
            elevation_m: 111.0,
            host: "127.0.0.1".to_string(),
            adsb_port: 30003,
            mlat_port: 30106,
            warning_distance_km: 200.0,
            alert_distance_km: 15.0,
            crosstrack_limit_km: 20.0,
            metric: true,
            interactive: false,
            interactive_rows: 30,
            log_path: "transits.csv".to_string(),
            metar_url: "https://awiacja.imgw.pl/metar00.php?airport=EPRA".to_string(),
        }
    }
}

impl Config {
    pub fn observer(&self) -> Observer {
        Observer {
            lat: self.lat,
            lon: self.lon,
            elevation_m: self.elevation_m,
        }
    }

    /// Earth radius matching the configured unit mode
    pub fn earth_radius(&self) -> f64 {
        if self.metric { EARTH_RADIUS_KM } else { EARTH_RADIUS_MI }
    }

    pub fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = Config::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--lat" => {
                    i += 1;
                    if let Some(v) = args.get(i).and_then(|s| s.parse().ok()) {
                        config.lat = v;
                    }
                }
                "--lon" => {
                    i += 1;
                    if let Some(v) = args.get(i).and_then(|s| s.parse().ok()) {
                        config.lon = v;
                    }
                }
                "--elevation" => {
                    i += 1;
                    if let Some(v) = args.get(i).and_then(|s| s.parse().ok()) {
                        config.elevation_m = v;
                    }
                }
                "--host" => {
                    i += 1;
                    if let Some(v) = args.get(i) {
                        config.host = v.clone();
                    }
                }
                "--adsb-port" => {
                    i += 1;
                    config.adsb_port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30003);
                }
                "--mlat-port" => {
                    i += 1;
                    config.mlat_port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30106);
                }
                "--warning-distance" => {
                    i += 1;
                    config.warning_distance_km =
                        args.get(i).and_then(|s| s.parse().ok()).unwrap_or(200.0);
                }
                "--alert-distance" => {
                    i += 1;
                    config.alert_distance_km =
                        args.get(i).and_then(|s| s.parse().ok()).unwrap_or(15.0);
                }
                "--crosstrack-limit" => {
                    i += 1;
                    config.crosstrack_limit_km =
                        args.get(i).and_then(|s| s.parse().ok()).unwrap_or(20.0);
                }
                "--metric" => config.metric = true,
                "--imperial" => config.metric = false,
                "--interactive" => config.interactive = true,
                "--interactive-rows" => {
                    i += 1;
                    config.interactive_rows =
                        args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
                }
                "--log" => {
                    i += 1;
                    if let Some(v) = args.get(i) {
                        config.log_path = v.clone();
                    }
                }
                "--metar-url" => {
                    i += 1;
                    if let Some(v) = args.get(i) {
                        config.metar_url = v.clone();
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown option: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        config
    }
}

fn print_help() {
    println!(
        r#"transitwarn-rs - Sun/Moon aircraft transit predictor for BaseStation feeds

Usage: transitwarn-rs [OPTIONS]

Options:
  --lat <degrees>          Observer latitude (default: 51.1111)
  --lon <degrees>          Observer longitude (default: 21.1111)
  --elevation <m>          Antenna elevation above sea level (default: 111)
  --host <addr>            Feed host (default: 127.0.0.1)
  --adsb-port <port>       Decoded ADS-B feed port (default: 30003)
  --mlat-port <port>       MLAT feed port (default: 30106)
  --warning-distance <km>  Cross-track warning radius (default: 200)
  --alert-distance <km>    Proximity alert radius (default: 15)
  --crosstrack-limit <km>  Cross-track deviation limit (default: 20)
  --metric                 Use kilometers (default)
  --imperial               Use miles
  --interactive            Live table refreshing on screen
  --interactive-rows <N>   Max rows in interactive mode (default: 30)
  --log <file>             Transit log CSV path (default: transits.csv)
  --metar-url <url>        METAR source for the QNH correction
  --help                   Show this help
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_limits() {
        let config = Config::default();
        assert_eq!(config.adsb_port, 30003);
        assert_eq!(config.mlat_port, 30106);
        assert_eq!(config.warning_distance_km, 200.0);
        assert_eq!(config.alert_distance_km, 15.0);
        assert_eq!(config.crosstrack_limit_km, 20.0);
        assert!(config.metric);
    }

    #[test]
    fn test_earth_radius_follows_units() {
        let mut config = Config::default();
        assert_eq!(config.earth_radius(), EARTH_RADIUS_KM);
        config.metric = false;
        assert_eq!(config.earth_radius(), EARTH_RADIUS_MI);
    }
}
