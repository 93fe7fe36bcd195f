mod common;

use common::{advertised_ssrcs, media_lines, ScriptedPipelines};
use mediagate_lib::peer::{
    monitor, Codec, Connector, Negotiator, TrackKind, TrackProvisioner, TransportConfig,
    WebRtcConnector,
};
use mediagate_lib::{EnvelopeCodec, Orchestrator, Session};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

/// Receive-only peer with one audio and one video transceiver, its offer
/// already applied with gathering done.
async fn viewer() -> RTCPeerConnection {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs().unwrap();
    let registry = register_default_interceptors(Registry::new(), &mut media_engine).unwrap();
    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let viewer = api
        .new_peer_connection(RTCConfiguration::default())
        .await
        .unwrap();
    viewer
        .add_transceiver_from_kind(RTPCodecType::Audio, None)
        .await
        .unwrap();
    viewer
        .add_transceiver_from_kind(RTPCodecType::Video, None)
        .await
        .unwrap();

    let offer = viewer.create_offer(None).await.unwrap();
    let mut gathered = viewer.gathering_complete_promise().await;
    viewer.set_local_description(offer).await.unwrap();
    let _ = tokio::time::timeout(Duration::from_secs(5), gathered.recv()).await;
    viewer
}

#[tokio::test]
async fn real_backend_answers_browser_style_offer() {
    let viewer = viewer().await;
    let codec = EnvelopeCodec::default();
    let envelope = codec
        .encode(&viewer.local_description().await.unwrap())
        .unwrap();

    let gateway = Orchestrator::new(
        Arc::new(WebRtcConnector::new()),
        Arc::new(ScriptedPipelines::default()),
    )
    .with_gather_timeout(Some(Duration::from_secs(2)));

    let answer = gateway
        .negotiate(
            &envelope,
            "silence",
            "h264:video.h264",
            Arc::new(TransportConfig::default()),
        )
        .await
        .unwrap();

    let answer = codec.decode(&answer).unwrap();
    let lines = media_lines(&answer.sdp);
    assert_eq!(lines.len(), 2, "{}", answer.sdp);
    assert!(answer.sdp.to_lowercase().contains("opus/48000"));
    assert!(answer.sdp.contains("H264/90000"));

    viewer.set_remote_description(answer).await.unwrap();
    viewer.close().await.unwrap();
}

#[tokio::test]
async fn answer_advertises_every_track_ssrc() {
    let viewer = viewer().await;
    let offer = viewer.local_description().await.unwrap();

    let transport = Arc::new(TransportConfig::default());
    let (events, _rx) = monitor::channel();
    let link = WebRtcConnector::new()
        .connect(&transport, events)
        .await
        .unwrap();
    let mut session = Session::new(link, transport, broadcast::channel(16).0);

    let mut provisioner = TrackProvisioner::new(session.id(), Arc::clone(session.link()));
    provisioner
        .provision(TrackKind::Audio, Codec::Opus, "gateway")
        .await
        .unwrap();
    provisioner
        .provision(TrackKind::Video, Codec::H264, "gateway")
        .await
        .unwrap();
    let sealed = provisioner.seal();

    let answer = Negotiator::new(Some(Duration::from_secs(2)))
        .answer(&mut session, &sealed, offer)
        .await
        .unwrap();

    let advertised = advertised_ssrcs(&answer.description().sdp);
    for track in sealed.tracks() {
        assert!(
            advertised.contains(&track.ssrc()),
            "ssrc {} of {} missing from answer:\n{}",
            track.ssrc(),
            track.id(),
            answer.description().sdp
        );
    }

    session.release().await;
    viewer.close().await.unwrap();
}
