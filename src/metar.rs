//! Barometric pressure (QNH) lookup
//!
//! Fetches a METAR page over HTTP every 15 minutes and extracts the Q####
//! group. On any failure the last known value is retained; the cache starts
//! at the standard atmosphere.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

/// Standard atmosphere, used until the first successful fetch
pub const STANDARD_PRESSURE_HPA: u32 = 1013;

/// Cached value is reused for 15 minutes
const REFRESH_INTERVAL: Duration = Duration::from_secs(900);

#[derive(Debug, Error)]
pub enum PressureError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no plausible QNH group in response")]
    NoPressure,
}

/// Extract a physically plausible QNH value (800-1100 hPa) from METAR text
pub fn parse_qnh(text: &str) -> Option<u32> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"Q(\d{4})").expect("static pattern"));
    let value: u32 = re.captures(text)?.get(1)?.as_str().parse().ok()?;
    (800..=1100).contains(&value).then_some(value)
}

/// Shared pressure cache, read by the elevation correction on every
/// elevation-bearing record
pub struct PressureCache {
    hpa: AtomicU32,
}

impl Default for PressureCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PressureCache {
    pub fn new() -> Self {
        Self {
            hpa: AtomicU32::new(STANDARD_PRESSURE_HPA),
        }
    }

    pub fn current_hpa(&self) -> u32 {
        self.hpa.load(Ordering::Relaxed)
    }

    pub fn store(&self, hpa: u32) {
        self.hpa.store(hpa, Ordering::Relaxed);
    }
}

async fn fetch_qnh(client: &reqwest::Client, url: &str) -> Result<u32, PressureError> {
    let text = client.get(url).send().await?.error_for_status()?.text().await?;
    parse_qnh(&text).ok_or(PressureError::NoPressure)
}

/// Periodic refresh loop; runs for process lifetime
pub async fn run_refresh_task(url: String, cache: std::sync::Arc<PressureCache>) {
    let client = reqwest::Client::new();
    let mut interval = tokio::time::interval(REFRESH_INTERVAL);
    loop {
        interval.tick().await;
        match fetch_qnh(&client, &url).await {
            Ok(hpa) => {
                cache.store(hpa);
                debug!("QNH updated to {} hPa", hpa);
            }
            Err(e) => {
                warn!("METAR fetch failed, keeping {} hPa: {}", cache.current_hpa(), e);
            }
        }
    }
}
