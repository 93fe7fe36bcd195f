pub mod connection;
pub mod ice;
pub mod monitor;
pub mod negotiator;
pub mod state;
pub mod tracks;
pub mod types;

pub use connection::{Connector, Link, LinkTrack, SampleSink, WebRtcConnector};
pub use ice::{CredentialKind, RelayServer, TransportConfig, DEFAULT_DISCOVERY_SERVER};
pub use negotiator::{FinalAnswer, Negotiator};
pub use state::{SessionState, StateChange, StatsSnapshot, STATS};
pub use tracks::{SealedTracks, TrackProvisioner};
pub use types::{Codec, MediaPlan, Track, TrackKind, TrackRequest, TrackSpec};
