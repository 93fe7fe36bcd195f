use crate::error::GatewayError;
use crate::peer::state::SessionState;
use crate::session::Session;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// Producer half handed to the connectivity layer. Sending never blocks.
pub type StateSender = mpsc::UnboundedSender<RTCPeerConnectionState>;
pub type StateReceiver = mpsc::UnboundedReceiver<RTCPeerConnectionState>;

pub fn channel() -> (StateSender, StateReceiver) {
    mpsc::unbounded_channel()
}

/// Maps a connectivity-layer state onto the session state machine.
/// Intermediate states (new, connecting) are not session transitions.
pub fn map_state(state: RTCPeerConnectionState) -> Option<SessionState> {
    match state {
        RTCPeerConnectionState::Connected => Some(SessionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(SessionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(SessionState::Failed),
        RTCPeerConnectionState::Closed => Some(SessionState::Closed),
        _ => None,
    }
}

/// Hands a fully negotiated session to its supervising worker.
pub fn spawn(session: Session, events: StateReceiver) -> JoinHandle<SessionState> {
    tokio::spawn(supervise(session, events))
}

/// Applies queued connectivity changes until the session reaches a terminal
/// state, then releases it. Returns the final state.
pub async fn supervise(mut session: Session, mut events: StateReceiver) -> SessionState {
    while let Some(st) = events.recv().await {
        info!("session {}: peer connection state changed to {st}", session.id());

        let Some(next) = map_state(st) else {
            continue;
        };

        if matches!(next, SessionState::Disconnected | SessionState::Failed) {
            let link = Arc::clone(session.link());
            link.log_selected_pair("BEFORE-FAIL").await;
        }

        if !session.transition(next) {
            debug!(
                "session {}: ignoring {st} while {}",
                session.id(),
                session.state()
            );
            continue;
        }

        if next == SessionState::Disconnected {
            warn!("{}", GatewayError::ConnectivityLost(session.id().to_owned()));
        }

        if session.state().is_terminal() {
            break;
        }
    }

    if !session.state().is_terminal() {
        // Connection dropped its notifier without a final state.
        session.transition(SessionState::Closed);
    }
    session.release().await;
    session.state()
}
