use crate::error::{GatewayError, Result};
use crate::media::{PipelineFactory, PipelineHandle};
use crate::peer::negotiator::FinalAnswer;
use crate::peer::types::{Codec, Track, TrackKind};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};

/// Binds one group of tracks to exactly one pipeline for the session's
/// lifetime.
#[derive(Debug)]
pub struct PipelineBinder {
    kind: TrackKind,
    codec: Codec,
    tracks: Vec<Track>,
    bound: AtomicBool,
}

impl PipelineBinder {
    pub fn new(kind: TrackKind, codec: Codec, tracks: Vec<Track>) -> Self {
        Self {
            kind,
            codec,
            tracks,
            bound: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    /// Creates the pipeline for this group. Requires the finalized answer so
    /// the remote peer already knows which codec and sync-source to expect.
    /// The flag stays set after a failed attempt.
    pub fn bind(
        &self,
        factory: &dyn PipelineFactory,
        _answer: &FinalAnswer,
        source: &str,
    ) -> Result<PipelineHandle> {
        if self
            .bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(GatewayError::AlreadyBound);
        }

        let sinks = self.tracks.iter().map(Track::sink).collect();
        let pipeline = factory
            .create(self.codec, sinks, source)
            .map_err(GatewayError::Bind)?;

        info!(
            "bound {} {} track(s) to '{}'",
            self.tracks.len(),
            self.codec,
            source
        );
        Ok(PipelineHandle::new(self.codec, source, pipeline))
    }

    pub fn start(&self, handle: &mut PipelineHandle) -> Result<()> {
        handle.start().map_err(GatewayError::PipelineStart)
    }
}
