use crate::peer::ice::{RelayServer, TransportConfig, DEFAULT_DISCOVERY_SERVER};
use crate::peer::types::{Codec, MediaPlan};
use clap::Parser;
use log::LevelFilter;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Browser-facing WebRTC media gateway.
#[derive(Debug, Clone, Parser)]
#[command(name = "mediagate", version, about)]
pub struct Cli {
    /// Address the HTTP signaling endpoint listens on
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Audio source: `silence` or `ogg:<path>`
    #[arg(long, default_value = "silence")]
    pub audio_src: String,

    /// Video source: `h264:<path>` or `ivf:<path>`
    #[arg(long, default_value = "h264:video.h264")]
    pub video_src: String,

    /// Codec of the video track (h264, vp8, vp9)
    #[arg(long, default_value = "h264")]
    pub video_codec: Codec,

    /// Discovery (STUN) server, repeatable
    #[arg(long = "stun", default_value = DEFAULT_DISCOVERY_SERVER)]
    pub stun: Vec<String>,

    #[arg(long, env = "TURN_SERVER", default_value = "")]
    pub turn_server: String,

    #[arg(long, env = "TURN_USER", default_value = "")]
    pub turn_user: String,

    #[arg(long, env = "TURN_PASSWORD", default_value = "", hide_env_values = true)]
    pub turn_password: String,

    /// Wait for candidate gathering before answering; 0 answers immediately
    #[arg(long, default_value_t = 5000)]
    pub gather_timeout_ms: u64,

    /// Gzip answer envelopes
    #[arg(long)]
    pub compress: bool,

    /// Overrides RUST_LOG
    #[arg(long)]
    pub log_level: Option<LevelFilter>,

    #[arg(long, default_value_t = 30)]
    pub h264_fps: u32,
}

/// Everything the gateway needs at start-up, resolved from the command line.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen: SocketAddr,
    pub audio_source: String,
    pub video_source: String,
    pub plan: MediaPlan,
    pub transport: Arc<TransportConfig>,
    pub gather_timeout: Option<Duration>,
    pub compress: bool,
    pub log_level: Option<LevelFilter>,
    pub h264_fps: u32,
}

impl GatewayConfig {
    pub fn from_cli(cli: Cli) -> Self {
        let relay = RelayServer::new(
            cli.turn_server.as_str(),
            cli.turn_user.as_str(),
            cli.turn_password.as_str(),
        );
        let transport = TransportConfig::build(&cli.stun, relay);

        let gather_timeout = match cli.gather_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Self {
            listen: cli.listen,
            audio_source: cli.audio_src,
            video_source: cli.video_src,
            plan: MediaPlan::audio_video(cli.video_codec),
            transport: Arc::new(transport),
            gather_timeout,
            compress: cli.compress,
            log_level: cli.log_level,
            h264_fps: cli.h264_fps,
        }
    }
}
