pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;

pub use config::{Cli, GatewayConfig};
pub use error::{EnvelopeError, GatewayError, LinkError, PipelineError, Result};
pub use session::{Orchestrator, Session};
pub use signaling::EnvelopeCodec;

use crate::http::AppState;
use crate::media::SourcePipelineFactory;
use crate::peer::connection::WebRtcConnector;
use log::{info, warn};
use std::sync::Arc;

/// Starts the gateway and serves until interrupted.
pub async fn run(config: GatewayConfig) -> Result<()> {
    logger::init(config.log_level);

    for degradation in config.transport.degradations() {
        warn!("{degradation}");
    }

    let orchestrator = Orchestrator::new(
        Arc::new(WebRtcConnector::new()),
        Arc::new(SourcePipelineFactory::new(config.h264_fps)),
    )
    .with_plan(config.plan.clone())
    .with_gather_timeout(config.gather_timeout)
    .with_envelope(EnvelopeCodec::new(config.compress));

    info!(
        "audio source '{}', video source '{}'",
        config.audio_source, config.video_source
    );

    let state = Arc::new(AppState {
        orchestrator,
        transport: Arc::clone(&config.transport),
        audio_source: config.audio_source,
        video_source: config.video_source,
    });
    http::serve(config.listen, state).await
}
