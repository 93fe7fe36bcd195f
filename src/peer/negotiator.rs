//! Offer/answer exchange for one session.
//!
//! The answer is only generated from a [`SealedTracks`] set, so the media
//! lines it advertises always match the registered tracks. The description
//! returned to the caller is read back from the connection after it was
//! applied, never the intermediate one produced by `create_answer`.

use crate::error::{GatewayError, LinkError, Result};
use crate::peer::state::SessionState;
use crate::peer::tracks::SealedTracks;
use crate::session::Session;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Local description after it was applied to the connection. Pipelines can
/// only be bound with one in hand.
#[derive(Debug, Clone)]
pub struct FinalAnswer {
    description: RTCSessionDescription,
}

impl FinalAnswer {
    pub fn description(&self) -> &RTCSessionDescription {
        &self.description
    }

    #[cfg(test)]
    pub(crate) fn for_tests(description: RTCSessionDescription) -> Self {
        Self { description }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Negotiator {
    gather_timeout: Option<Duration>,
}

impl Negotiator {
    /// `gather_timeout` bounds the wait for candidate gathering before the
    /// answer is read back; `None` returns without waiting.
    pub fn new(gather_timeout: Option<Duration>) -> Self {
        Self { gather_timeout }
    }

    pub async fn answer(
        &self,
        session: &mut Session,
        tracks: &SealedTracks,
        offer: RTCSessionDescription,
    ) -> Result<FinalAnswer> {
        if tracks.session_id() != session.id() {
            return Err(rejected(format!(
                "track set of session {} used for session {}",
                tracks.session_id(),
                session.id()
            )));
        }

        session.transition(SessionState::Negotiating);

        if offer.sdp_type != RTCSdpType::Offer {
            return Err(rejected(format!(
                "expected an offer, got {}",
                offer.sdp_type
            )));
        }
        if let Err(err) = offer.unmarshal() {
            return Err(GatewayError::Negotiation(err.into()));
        }

        let link = Arc::clone(session.link());
        link.set_remote_description(offer)
            .await
            .map_err(GatewayError::Negotiation)?;

        let answer = link.create_answer().await.map_err(GatewayError::Negotiation)?;
        link.set_local_description(answer)
            .await
            .map_err(GatewayError::Negotiation)?;

        if let Some(limit) = self.gather_timeout {
            if !link.gathering_complete(limit).await {
                warn!(
                    "session {}: candidate gathering not complete after {:?}, answering with partial candidates",
                    session.id(),
                    limit
                );
            }
        }

        let description = link
            .local_description()
            .await
            .ok_or_else(|| rejected("connection has no local description".to_owned()))?;

        debug!(
            "session {}: answer finalized for {} track(s)",
            session.id(),
            tracks.len()
        );
        session.transition(SessionState::Answered);
        Ok(FinalAnswer { description })
    }
}

fn rejected(reason: String) -> GatewayError {
    GatewayError::Negotiation(LinkError::Rejected(reason))
}
