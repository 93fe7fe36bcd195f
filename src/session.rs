use crate::error::{GatewayError, Result};
use crate::logger::record_state_change;
use crate::media::{PipelineBinder, PipelineFactory, PipelineHandle};
use crate::peer::connection::{Connector, Link};
use crate::peer::ice::TransportConfig;
use crate::peer::monitor;
use crate::peer::negotiator::Negotiator;
use crate::peer::state::{SessionState, StateChange, STATS};
use crate::peer::tracks::{SealedTracks, TrackProvisioner};
use crate::peer::types::{Codec, MediaPlan, Track, TrackKind};
use crate::signaling::EnvelopeCodec;
use crate::utils::random_id;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

const DIAGNOSTICS_CAPACITY: usize = 256;

/// One browser connection: its peer connection, tracks and pipelines.
///
/// Owned by the orchestrator while negotiating and by the monitor worker
/// afterwards; never shared.
pub struct Session {
    id: String,
    state: SessionState,
    link: Arc<dyn Link>,
    transport: Arc<TransportConfig>,
    tracks: Vec<Track>,
    binders: Vec<Arc<PipelineBinder>>,
    pipelines: Vec<PipelineHandle>,
    diagnostics: broadcast::Sender<StateChange>,
    released: bool,
}

impl Session {
    pub fn new(
        link: Arc<dyn Link>,
        transport: Arc<TransportConfig>,
        diagnostics: broadcast::Sender<StateChange>,
    ) -> Self {
        STATS.session_started();
        Self {
            id: random_id(),
            state: SessionState::Created,
            link,
            transport,
            tracks: Vec::new(),
            binders: Vec::new(),
            pipelines: Vec::new(),
            diagnostics,
            released: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn link(&self) -> &Arc<dyn Link> {
        &self.link
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn binders(&self) -> &[Arc<PipelineBinder>] {
        &self.binders
    }

    /// Applies `next` if it is an edge of the state machine, emitting a
    /// diagnostic record. Returns false (and changes nothing) otherwise.
    pub fn transition(&mut self, next: SessionState) -> bool {
        let previous = self.state;
        if !previous.can_transition_to(next) {
            debug!("session {}: rejected transition {previous} -> {next}", self.id);
            return false;
        }
        self.state = next;

        let change = StateChange {
            timestamp: chrono::Utc::now(),
            session_id: self.id.clone(),
            previous,
            next,
        };
        record_state_change(&change);
        // No subscribers is fine.
        let _ = self.diagnostics.send(change);
        true
    }

    /// Takes the sealed track set and prepares one binder per track group.
    fn adopt(&mut self, tracks: &SealedTracks) {
        self.tracks = tracks.tracks().to_vec();
        self.binders = tracks
            .groups()
            .into_iter()
            .map(|(kind, codec, members)| Arc::new(PipelineBinder::new(kind, codec, members)))
            .collect();
    }

    fn attach(&mut self, pipeline: PipelineHandle) {
        self.pipelines.push(pipeline);
    }

    /// Drives the session to `Failed` and releases everything it holds.
    pub async fn fail(&mut self) {
        self.transition(SessionState::Failed);
        self.release().await;
    }

    /// Stops pipelines, drops tracks and closes the connection. Idempotent.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        for pipeline in &mut self.pipelines {
            pipeline.stop();
        }
        self.pipelines.clear();
        self.binders.clear();
        self.tracks.clear();

        if let Err(err) = self.link.close().await {
            warn!("session {}: closing connection failed: {err}", self.id);
        }
        STATS.session_released();
        info!("session {} released in state {}", self.id, self.state);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.released {
            // Pipelines stop through their own Drop; the connection cannot be
            // closed synchronously here.
            warn!("session {} dropped without release", self.id);
            STATS.session_released();
        }
    }
}

/// Composes configuration, connection, tracks, negotiation and pipeline
/// binding into the single negotiation call.
pub struct Orchestrator {
    connector: Arc<dyn Connector>,
    pipelines: Arc<dyn PipelineFactory>,
    plan: MediaPlan,
    negotiator: Negotiator,
    envelope: EnvelopeCodec,
    diagnostics: broadcast::Sender<StateChange>,
}

impl Orchestrator {
    pub fn new(connector: Arc<dyn Connector>, pipelines: Arc<dyn PipelineFactory>) -> Self {
        let (diagnostics, _) = broadcast::channel(DIAGNOSTICS_CAPACITY);
        Self {
            connector,
            pipelines,
            plan: MediaPlan::audio_video(Codec::H264),
            negotiator: Negotiator::default(),
            envelope: EnvelopeCodec::default(),
            diagnostics,
        }
    }

    pub fn with_plan(mut self, plan: MediaPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_gather_timeout(mut self, limit: Option<Duration>) -> Self {
        self.negotiator = Negotiator::new(limit);
        self
    }

    pub fn with_envelope(mut self, envelope: EnvelopeCodec) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn plan(&self) -> &MediaPlan {
        &self.plan
    }

    /// Stream of every session transition made through this orchestrator.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.diagnostics.subscribe()
    }

    /// Answers one offer. On success the session keeps running under its
    /// monitor; on failure nothing allocated for the attempt survives.
    pub async fn negotiate(
        &self,
        offer_envelope: &str,
        audio_source: &str,
        video_source: &str,
        transport: Arc<TransportConfig>,
    ) -> Result<String> {
        let offer = self
            .envelope
            .decode(offer_envelope)
            .map_err(GatewayError::Decode)?;

        let (events_tx, events_rx) = monitor::channel();
        let link = self
            .connector
            .connect(&transport, events_tx)
            .await
            .map_err(GatewayError::Connection)?;

        let mut session = Session::new(link, transport, self.diagnostics.clone());
        info!("session {} created", session.id());

        match self
            .establish(&mut session, offer, audio_source, video_source)
            .await
        {
            Ok(answer) => {
                info!("session {} answered, monitoring connection", session.id());
                monitor::spawn(session, events_rx);
                Ok(answer)
            }
            Err(err) => {
                error!("session {} aborted: {err}", session.id());
                STATS.session_failed();
                session.fail().await;
                Err(err)
            }
        }
    }

    async fn establish(
        &self,
        session: &mut Session,
        offer: RTCSessionDescription,
        audio_source: &str,
        video_source: &str,
    ) -> Result<String> {
        let mut provisioner = TrackProvisioner::new(session.id(), Arc::clone(session.link()));
        for request in &self.plan.tracks {
            provisioner
                .provision(request.kind, request.codec, &request.label)
                .await?;
        }
        let tracks = provisioner.seal();
        session.adopt(&tracks);

        let answer = self.negotiator.answer(session, &tracks, offer).await?;
        let encoded = self
            .envelope
            .encode(answer.description())
            .map_err(GatewayError::Encode)?;

        let binders = session.binders().to_vec();
        for binder in binders {
            let source = match binder.kind() {
                TrackKind::Audio => audio_source,
                TrackKind::Video => video_source,
            };
            let mut pipeline = binder.bind(self.pipelines.as_ref(), &answer, source)?;
            let started = binder.start(&mut pipeline);
            // Attached even when start failed so release can stop it.
            session.attach(pipeline);
            started?;
        }

        session.transition(SessionState::Bound);
        Ok(encoded)
    }
}
