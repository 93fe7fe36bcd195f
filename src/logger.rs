use crate::peer::state::StateChange;
use log::{info, LevelFilter};
use once_cell::sync::OnceCell;
use std::io::Write;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::stats::StatsReportType;

/// Verbose while developing, quiet in release builds.
#[cfg(debug_assertions)]
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Warn;

static INIT: OnceCell<()> = OnceCell::new();

/// Installs the global logger once. An explicit `level` wins over
/// `RUST_LOG`, which wins over [`DEFAULT_LOG_LEVEL`].
pub fn init(level: Option<LevelFilter>) {
    INIT.get_or_init(|| {
        let mut builder = env_logger::Builder::new();
        builder.format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        });

        match (level, std::env::var("RUST_LOG")) {
            (Some(level), _) => {
                builder.filter_level(level);
            }
            (None, Ok(filters)) if !filters.trim().is_empty() => {
                builder.parse_filters(&filters);
            }
            _ => {
                builder.filter_level(DEFAULT_LOG_LEVEL);
            }
        }

        // A logger installed by the embedding program stays in place.
        let _ = builder.try_init();
    });
}

/// Quick getStats snapshot of the nominated candidate pair.
pub async fn dump_selected_pair(pc: &RTCPeerConnection, moment: &str) {
    let stats = pc.get_stats().await;
    for report in stats.reports.into_values() {
        if let StatsReportType::CandidatePair(pair) = report {
            if pair.nominated {
                info!(
                    "STATS {moment}: {}:{}  type: {:?}  bytes={}/{} state={:?}",
                    pair.local_candidate_id,
                    pair.remote_candidate_id,
                    pair.stats_type,
                    pair.bytes_sent,
                    pair.bytes_received,
                    pair.state
                );
            }
        }
    }
}

pub fn record_state_change(change: &StateChange) {
    info!(
        "[{}] session {}: {} -> {}",
        change.timestamp.format("%H:%M:%S%.3f"),
        change.session_id,
        change.previous,
        change.next
    );
}
