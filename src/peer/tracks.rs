use crate::error::{GatewayError, LinkError, Result};
use crate::peer::connection::Link;
use crate::peer::types::{Codec, Track, TrackKind, TrackSpec};
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

/// Creates and registers the tracks of one session.
///
/// Registration mutates the media lines the connection will advertise, so
/// the provisioner is consumed by [`TrackProvisioner::seal`] and only the
/// resulting [`SealedTracks`] can be handed to answer generation.
pub struct TrackProvisioner {
    session_id: String,
    link: Arc<dyn Link>,
    tracks: Vec<Track>,
    ssrcs: HashSet<u32>,
}

impl TrackProvisioner {
    pub fn new(session_id: impl Into<String>, link: Arc<dyn Link>) -> Self {
        Self {
            session_id: session_id.into(),
            link,
            tracks: Vec::new(),
            ssrcs: HashSet::new(),
        }
    }

    pub async fn provision(&mut self, kind: TrackKind, codec: Codec, label: &str) -> Result<Track> {
        if codec.kind() != kind {
            return Err(GatewayError::Provision(LinkError::Rejected(format!(
                "{codec} cannot be carried by a {kind} track"
            ))));
        }

        let spec = TrackSpec {
            id: format!("{kind}{}", self.tracks.len()),
            kind,
            codec,
            label: label.to_owned(),
        };

        let registered = self
            .link
            .add_track(&spec)
            .await
            .map_err(GatewayError::Provision)?;

        // Sync-source ids are unique within a session.
        if registered.ssrc == 0 || !self.ssrcs.insert(registered.ssrc) {
            return Err(GatewayError::Provision(LinkError::Rejected(format!(
                "connection assigned unusable ssrc {} to track {}",
                registered.ssrc, spec.id
            ))));
        }

        debug!(
            "session {}: registered {} track {} ({}, ssrc={}, stream={})",
            self.session_id, spec.kind, spec.id, spec.codec, registered.ssrc, spec.label
        );

        let track = Track::new(spec, registered.ssrc, registered.sink);
        self.tracks.push(track.clone());
        Ok(track)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Freezes the track set. No track can be added afterwards.
    pub fn seal(self) -> SealedTracks {
        SealedTracks {
            session_id: self.session_id,
            tracks: self.tracks,
        }
    }
}

/// Final, registered track set of a session
#[derive(Debug, Clone)]
pub struct SealedTracks {
    session_id: String,
    tracks: Vec<Track>,
}

impl SealedTracks {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks grouped by (kind, codec), in first-appearance order. Each group
    /// is fed by one pipeline.
    pub fn groups(&self) -> Vec<(TrackKind, Codec, Vec<Track>)> {
        let mut groups: Vec<(TrackKind, Codec, Vec<Track>)> = Vec::new();
        for track in &self.tracks {
            match groups
                .iter_mut()
                .find(|(kind, codec, _)| *kind == track.kind() && *codec == track.codec())
            {
                Some((_, _, members)) => members.push(track.clone()),
                None => groups.push((track.kind(), track.codec(), vec![track.clone()])),
            }
        }
        groups
    }
}
