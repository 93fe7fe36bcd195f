#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use mediagate_lib::error::{LinkError, PipelineError};
use mediagate_lib::media::{MediaPipeline, PipelineFactory};
use mediagate_lib::peer::monitor::StateSender;
use mediagate_lib::peer::{
    Codec, Connector, Link, LinkTrack, SampleSink, TrackKind, TrackSpec, TransportConfig,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webrtc::media::Sample;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Connector double: records every call into a shared log and counts open
/// connections.
#[derive(Default)]
pub struct RecordingConnector {
    pub log: CallLog,
    pub created: AtomicUsize,
    pub open: Arc<AtomicUsize>,
    pub senders: Mutex<Vec<StateSender>>,
    pub links: Mutex<Vec<Arc<RecordingLink>>>,
    pub fail_add_track: bool,
    pub reject_remote: bool,
    pub gathering_incomplete: bool,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn sender(&self, idx: usize) -> StateSender {
        self.senders.lock().unwrap()[idx].clone()
    }

    pub fn link(&self, idx: usize) -> Arc<RecordingLink> {
        Arc::clone(&self.links.lock().unwrap()[idx])
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(
        &self,
        _config: &TransportConfig,
        events: StateSender,
    ) -> Result<Arc<dyn Link>, LinkError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.open.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push("connect".into());
        self.senders.lock().unwrap().push(events);

        let link = Arc::new(RecordingLink {
            log: Arc::clone(&self.log),
            open: Arc::clone(&self.open),
            fail_add_track: self.fail_add_track,
            reject_remote: self.reject_remote,
            gathering_incomplete: self.gathering_incomplete,
            ..RecordingLink::default()
        });
        self.links.lock().unwrap().push(Arc::clone(&link));
        Ok(link)
    }
}

/// Track as registered on a [`RecordingLink`], with the ssrc the link chose.
#[derive(Debug, Clone)]
pub struct Registered {
    pub spec: TrackSpec,
    pub ssrc: u32,
}

#[derive(Default)]
pub struct RecordingLink {
    pub log: CallLog,
    pub open: Arc<AtomicUsize>,
    pub registered: Mutex<Vec<Registered>>,
    pub assigned: Mutex<HashSet<u32>>,
    pub local: Mutex<Option<RTCSessionDescription>>,
    pub closed: AtomicBool,
    pub fail_add_track: bool,
    pub reject_remote: bool,
    pub gathering_incomplete: bool,
    /// Hands out this ssrc for every track instead of drawing one.
    pub fixed_ssrc: Option<u32>,
}

impl RecordingLink {
    /// Link not created through a connector.
    pub fn standalone() -> Arc<Self> {
        let link = Self::default();
        link.open.store(1, Ordering::SeqCst);
        Arc::new(link)
    }

    /// Standalone link that reports the same ssrc for every track.
    pub fn reusing_ssrc(ssrc: u32) -> Arc<Self> {
        let link = Self {
            fixed_ssrc: Some(ssrc),
            ..Self::default()
        };
        link.open.store(1, Ordering::SeqCst);
        Arc::new(link)
    }

    pub fn registered(&self) -> Vec<Registered> {
        self.registered.lock().unwrap().clone()
    }

    fn assign_ssrc(&self) -> u32 {
        if let Some(ssrc) = self.fixed_ssrc {
            return ssrc;
        }
        let mut assigned = self.assigned.lock().unwrap();
        loop {
            let ssrc = rand::random::<u32>();
            if ssrc != 0 && assigned.insert(ssrc) {
                return ssrc;
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Link for RecordingLink {
    async fn add_track(&self, spec: &TrackSpec) -> Result<LinkTrack, LinkError> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        if self.fail_add_track {
            return Err(LinkError::Rejected("scripted add_track failure".into()));
        }
        self.record(format!("add_track:{}", spec.id));
        let ssrc = self.assign_ssrc();
        self.registered.lock().unwrap().push(Registered {
            spec: spec.clone(),
            ssrc,
        });
        Ok(LinkTrack {
            ssrc,
            sink: Arc::new(RecordingSink::default()),
        })
    }

    async fn set_remote_description(&self, _offer: RTCSessionDescription) -> Result<(), LinkError> {
        if self.reject_remote {
            return Err(LinkError::Rejected("scripted remote rejection".into()));
        }
        self.record("set_remote".into());
        Ok(())
    }

    async fn create_answer(&self) -> Result<RTCSessionDescription, LinkError> {
        self.record("create_answer".into());
        Ok(RTCSessionDescription::answer(answer_sdp(&self.registered()))?)
    }

    async fn set_local_description(&self, answer: RTCSessionDescription) -> Result<(), LinkError> {
        self.record("set_local".into());
        *self.local.lock().unwrap() = Some(answer);
        Ok(())
    }

    async fn gathering_complete(&self, _limit: Duration) -> bool {
        self.record("gathering_complete".into());
        !self.gathering_incomplete
    }

    async fn local_description(&self) -> Option<RTCSessionDescription> {
        self.record("local_description".into());
        self.local.lock().unwrap().clone()
    }

    async fn close(&self) -> Result<(), LinkError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open.fetch_sub(1, Ordering::SeqCst);
            self.record("close".into());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub samples: AtomicUsize,
}

#[async_trait]
impl SampleSink for RecordingSink {
    async fn write_sample(&self, _sample: &Sample) -> Result<(), LinkError> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One media description per registered track.
pub fn answer_sdp(tracks: &[Registered]) -> String {
    let mut sdp = String::from("v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n");
    for (mid, Registered { spec, ssrc }) in tracks.iter().enumerate() {
        let pt = spec.codec.default_payload_type();
        let mut rtpmap = format!("{}/{}", spec.codec.encoding_name(), spec.codec.clock_rate());
        if spec.codec.channels() > 0 {
            rtpmap.push_str(&format!("/{}", spec.codec.channels()));
        }
        sdp.push_str(&format!(
            "m={} 9 UDP/TLS/RTP/SAVPF {pt}\r\nc=IN IP4 0.0.0.0\r\na=mid:{mid}\r\na=sendonly\r\na=rtpmap:{pt} {rtpmap}\r\na=ssrc:{} msid:{} {}\r\n",
            spec.kind, ssrc, spec.label, spec.id
        ));
    }
    sdp
}

/// Browser-style recvonly offer for the given kinds.
pub fn offer_sdp(kinds: &[TrackKind]) -> String {
    let mut sdp = String::from("v=0\r\no=- 2 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n");
    for (mid, kind) in kinds.iter().enumerate() {
        let codec = match kind {
            TrackKind::Audio => Codec::Opus,
            TrackKind::Video => Codec::H264,
        };
        let pt = codec.default_payload_type();
        sdp.push_str(&format!(
            "m={kind} 9 UDP/TLS/RTP/SAVPF {pt}\r\nc=IN IP4 0.0.0.0\r\na=mid:{mid}\r\na=recvonly\r\na=rtpmap:{pt} {}/{}\r\n",
            codec.encoding_name(),
            codec.clock_rate()
        ));
    }
    sdp
}

pub fn offer_envelope(kinds: &[TrackKind]) -> String {
    let json = serde_json::json!({ "type": "offer", "sdp": offer_sdp(kinds) });
    general_purpose::STANDARD.encode(json.to_string())
}

pub fn media_lines(sdp: &str) -> Vec<&str> {
    sdp.lines().filter(|l| l.starts_with("m=")).collect()
}

/// Sync-source ids named by `a=ssrc:` lines.
pub fn advertised_ssrcs(sdp: &str) -> HashSet<u32> {
    sdp.lines()
        .filter_map(|l| l.strip_prefix("a=ssrc:"))
        .filter_map(|rest| rest.split_whitespace().next())
        .filter_map(|id| id.parse().ok())
        .collect()
}

/// Pipeline factory double. Logs `bind:<codec>x<tracks>` and `start:<codec>`
/// into the shared call log and tracks how many pipelines are alive.
#[derive(Default)]
pub struct ScriptedPipelines {
    pub log: CallLog,
    pub live: Arc<AtomicUsize>,
    pub fail_create: bool,
    pub fail_start: bool,
}

impl ScriptedPipelines {
    pub fn sharing(log: &CallLog) -> Self {
        Self {
            log: Arc::clone(log),
            ..Self::default()
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl PipelineFactory for ScriptedPipelines {
    fn create(
        &self,
        codec: Codec,
        sinks: Vec<Arc<dyn SampleSink>>,
        source: &str,
    ) -> Result<Box<dyn MediaPipeline>, PipelineError> {
        if self.fail_create {
            return Err(PipelineError::UnknownSource(source.to_owned()));
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("bind:{codec}x{}", sinks.len()));
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedPipeline {
            codec,
            log: Arc::clone(&self.log),
            live: Arc::clone(&self.live),
            fail_start: self.fail_start,
        }))
    }
}

struct ScriptedPipeline {
    codec: Codec,
    log: CallLog,
    live: Arc<AtomicUsize>,
    fail_start: bool,
}

impl MediaPipeline for ScriptedPipeline {
    fn start(&mut self) -> Result<(), PipelineError> {
        if self.fail_start {
            return Err(PipelineError::Source("scripted start failure".into()));
        }
        self.log.lock().unwrap().push(format!("start:{}", self.codec));
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().push(format!("stop:{}", self.codec));
    }
}

impl Drop for ScriptedPipeline {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
