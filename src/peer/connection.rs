use crate::error::LinkError;
use crate::logger::dump_selected_pair;
use crate::peer::ice::TransportConfig;
use crate::peer::monitor::StateSender;
use crate::peer::types::TrackSpec;
use async_trait::async_trait;
use log::{debug, trace};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::{
    configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
    sdp::session_description::RTCSessionDescription, RTCPeerConnection,
};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Creates connectivity-layer connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a fresh connection. Every state change of the connection is
    /// forwarded to `events` without blocking.
    async fn connect(
        &self,
        config: &TransportConfig,
        events: StateSender,
    ) -> Result<Arc<dyn Link>, LinkError>;
}

/// One peer connection as seen by the orchestrator.
#[async_trait]
pub trait Link: Send + Sync {
    /// Registers an outbound track; changes the media lines advertised locally.
    async fn add_track(&self, spec: &TrackSpec) -> Result<LinkTrack, LinkError>;

    async fn set_remote_description(&self, offer: RTCSessionDescription) -> Result<(), LinkError>;

    async fn create_answer(&self) -> Result<RTCSessionDescription, LinkError>;

    async fn set_local_description(&self, answer: RTCSessionDescription) -> Result<(), LinkError>;

    /// Waits at most `limit` for candidate gathering; true if it finished.
    async fn gathering_complete(&self, limit: Duration) -> bool;

    async fn local_description(&self) -> Option<RTCSessionDescription>;

    /// Diagnostic snapshot of the nominated candidate pair.
    async fn log_selected_pair(&self, _moment: &str) {}

    async fn close(&self) -> Result<(), LinkError>;
}

/// What the connection handed back for a registered track.
pub struct LinkTrack {
    /// Sync-source id the connection will advertise for the track.
    pub ssrc: u32,
    pub sink: Arc<dyn SampleSink>,
}

/// Write side of a registered track.
#[async_trait]
pub trait SampleSink: Send + Sync {
    async fn write_sample(&self, sample: &Sample) -> Result<(), LinkError>;
}

/// [`Connector`] backed by webrtc-rs.
#[derive(Debug, Default)]
pub struct WebRtcConnector;

impl WebRtcConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebRtcConnector {
    async fn connect(
        &self,
        config: &TransportConfig,
        events: StateSender,
    ) -> Result<Arc<dyn Link>, LinkError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(api.new_peer_connection(rtc_config(config)).await?);

        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            // Only enqueue here: this runs on the connection's own dispatch path.
            let _ = events.send(st);
            Box::pin(async {})
        }));

        pc.on_ice_connection_state_change(Box::new(|st: RTCIceConnectionState| {
            debug!("ICE connection state changed to: {st}");
            Box::pin(async {})
        }));

        pc.on_ice_gathering_state_change(Box::new(|st: RTCIceGathererState| {
            debug!("ICE gathering state changed to: {st:?}");
            Box::pin(async {})
        }));

        Ok(Arc::new(WebRtcLink { pc }))
    }
}

fn rtc_config(config: &TransportConfig) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: config.ice_servers(),
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

struct WebRtcLink {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl Link for WebRtcLink {
    async fn add_track(&self, spec: &TrackSpec) -> Result<LinkTrack, LinkError> {
        let track = Arc::new(TrackLocalStaticSample::new(
            spec.codec.capability(),
            spec.id.clone(),
            spec.label.clone(),
        ));

        let rtp_sender = self
            .pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        let ssrc = rtp_sender
            .get_parameters()
            .await
            .encodings
            .first()
            .map(|encoding| encoding.ssrc)
            .ok_or_else(|| LinkError::Rejected(format!("track {} has no encoding", spec.id)))?;

        // Incoming RTCP has to be read for interceptors (NACK, reports) to run.
        let track_id = spec.id.clone();
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtp_sender.read(&mut rtcp_buf).await.is_ok() {}
            trace!("RTCP reader for track {track_id} finished");
        });

        Ok(LinkTrack {
            ssrc,
            sink: Arc::new(WebRtcSink { track }),
        })
    }

    async fn set_remote_description(&self, offer: RTCSessionDescription) -> Result<(), LinkError> {
        Ok(self.pc.set_remote_description(offer).await?)
    }

    async fn create_answer(&self) -> Result<RTCSessionDescription, LinkError> {
        Ok(self.pc.create_answer(None).await?)
    }

    async fn set_local_description(&self, answer: RTCSessionDescription) -> Result<(), LinkError> {
        Ok(self.pc.set_local_description(answer).await?)
    }

    async fn gathering_complete(&self, limit: Duration) -> bool {
        let mut done = self.pc.gathering_complete_promise().await;
        timeout(limit, done.recv()).await.is_ok()
    }

    async fn local_description(&self) -> Option<RTCSessionDescription> {
        self.pc.local_description().await
    }

    async fn log_selected_pair(&self, moment: &str) {
        dump_selected_pair(&self.pc, moment).await;
    }

    async fn close(&self) -> Result<(), LinkError> {
        Ok(self.pc.close().await?)
    }
}

struct WebRtcSink {
    track: Arc<TrackLocalStaticSample>,
}

#[async_trait]
impl SampleSink for WebRtcSink {
    async fn write_sample(&self, sample: &Sample) -> Result<(), LinkError> {
        Ok(self.track.write_sample(sample).await?)
    }
}
