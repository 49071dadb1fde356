//! Feed clients
//!
//! One persistent TCP client per feed (ADS-B and MLAT). Each client
//! connects, reads newline-delimited BaseStation records, decodes them and
//! hands the result to the single processor over the bounded channel. Any
//! connection error drops the link status and retries after 5 seconds;
//! the loops run for process lifetime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::Sender;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::decoder::{self, DecodeError, FeedKind, SbsMessage};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Link status per feed, written by the clients and read by the display
#[derive(Default)]
pub struct FeedStatus {
    adsb_up: AtomicBool,
    mlat_up: AtomicBool,
}

impl FeedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_up(&self, feed: FeedKind) -> bool {
        self.flag(feed).load(Ordering::Relaxed)
    }

    fn set(&self, feed: FeedKind, up: bool) {
        self.flag(feed).store(up, Ordering::Relaxed);
    }

    fn flag(&self, feed: FeedKind) -> &AtomicBool {
        match feed {
            FeedKind::AdsB => &self.adsb_up,
            FeedKind::Mlat => &self.mlat_up,
        }
    }
}

/// Connect-read-reconnect loop for one feed
pub async fn run_feed_client(
    host: String,
    port: u16,
    feed: FeedKind,
    local_offset_secs: i64,
    tx: Sender<SbsMessage>,
    status: Arc<FeedStatus>,
) {
    let addr = format!("{}:{}", host, port);
    loop {
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                info!("{} feed connected to {}", feed.label(), addr);
                status.set(feed, true);
                read_stream(stream, feed, local_offset_secs, &tx).await;
                status.set(feed, false);
                warn!("{} feed lost, reconnecting in 5 s", feed.label());
            }
            Err(e) => {
                status.set(feed, false);
                debug!("{} feed connect to {} failed: {}", feed.label(), addr, e);
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Read lines until EOF or error. Undecodable lines are skipped; a full
/// channel drops the record rather than stalling the socket.
async fn read_stream(
    stream: TcpStream,
    feed: FeedKind,
    local_offset_secs: i64,
    tx: &Sender<SbsMessage>,
) {
    let reader = BufReader::new(stream);
    let mut lines = reader.lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match decoder::decode_line(line, feed, local_offset_secs) {
            Ok(msg) => {
                if tx.try_send(msg).is_err() {
                    warn!("{} feed: processor queue full, record dropped", feed.label());
                }
            }
            // Unknown subtypes arrive constantly on a live feed
            Err(DecodeError::BadSubtype(_)) => {}
            Err(e) => debug!("{} feed: undecodable record: {}", feed.label(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_status_independent_flags() {
        let status = FeedStatus::new();
        assert!(!status.is_up(FeedKind::AdsB));
        assert!(!status.is_up(FeedKind::Mlat));

        status.set(FeedKind::AdsB, true);
        assert!(status.is_up(FeedKind::AdsB));
        assert!(!status.is_up(FeedKind::Mlat));

        status.set(FeedKind::Mlat, true);
        status.set(FeedKind::AdsB, false);
        assert!(!status.is_up(FeedKind::AdsB));
        assert!(status.is_up(FeedKind::Mlat));
    }
}
