use thiserror::Error;

/// Result alias used by the orchestration layer.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Classified failure of a negotiation request.
///
/// Everything except [`GatewayError::Config`] and [`GatewayError::ConnectivityLost`]
/// is fatal for the request that produced it. `Config` only describes a
/// degraded transport setup, see `TransportConfig::degradations`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid transport configuration: {0}")]
    Config(String),

    #[error("malformed session envelope: {0}")]
    Decode(#[source] EnvelopeError),

    #[error("failed to encode answer: {0}")]
    Encode(#[source] EnvelopeError),

    #[error("failed to create peer connection: {0}")]
    Connection(#[source] LinkError),

    #[error("remote description rejected: {0}")]
    Negotiation(#[source] LinkError),

    #[error("track registration rejected: {0}")]
    Provision(#[source] LinkError),

    #[error("pipeline binding failed: {0}")]
    Bind(#[source] PipelineError),

    #[error("tracks are already bound to a pipeline")]
    AlreadyBound,

    #[error("pipeline failed to start: {0}")]
    PipelineStart(#[source] PipelineError),

    #[error("connectivity lost for session {0}")]
    ConnectivityLost(String),

    #[error("http server error: {0}")]
    Server(#[from] hyper::Error),
}

impl GatewayError {
    /// Errors caused by what the caller sent rather than by the gateway itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, GatewayError::Decode(_) | GatewayError::Negotiation(_))
    }
}

/// Failures reported by the connectivity layer.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    WebRtc(#[from] webrtc::Error),

    #[error("connection is closed")]
    Closed,

    #[error("{0}")]
    Rejected(String),
}

/// Failures of the textual session-description envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope is empty")]
    Empty,

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid session description json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("compression error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decompressed envelope exceeds {0} bytes")]
    TooLarge(u64),

    #[error("session description carries no sdp")]
    MissingSdp,
}

/// Failures of a media-producing pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown media source '{0}'")]
    UnknownSource(String),

    #[error("source '{source_desc}' cannot produce {codec}")]
    CodecMismatch { source_desc: String, codec: String },

    #[error("pipeline has no tracks to feed")]
    NoTracks,

    #[error("pipeline is already running")]
    AlreadyRunning,

    #[error("no async runtime available to drive the pipeline")]
    NoRuntime,

    #[error("media source i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("media source: {0}")]
    Source(String),
}
