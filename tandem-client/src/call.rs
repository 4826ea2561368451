use crate::chat::{ChatRouter, PRIMARY_PEER};
use crate::session::{LocalAnswer, LocalOffer, PeerSession, WeakPeerSession};
use crate::signaling::{SendOptions, SignalingBridge, WeakSignalingBridge};
use anyhow::Result;
use tandem_core::error::SessionError;
use tandem_core::model::{
    ConnectionId, IceCandidate, SessionDescription, SignalType, SignalingMessage,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CALL_SIGNALS: [SignalType; 3] = [
    SignalType::Offer,
    SignalType::Answer,
    SignalType::IceCandidate,
];

/// Wiring between one session, the signaling bridge and the chat router.
pub struct CallLink {
    session: PeerSession,
    bridge: SignalingBridge,
    forwarder: JoinHandle<()>,
}

/// Connect `session`, `bridge` and `router` for one call.
///
/// Must be called inside a tokio runtime.
pub fn link(session: &PeerSession, bridge: &SignalingBridge, router: &ChatRouter) -> CallLink {
    // Candidates leave in discovery order through a single forwarding task.
    let (candidate_tx, mut candidate_rx) = mpsc::unbounded_channel::<(IceCandidate, ConnectionId)>();
    session.on_ice_candidate(move |candidate, connection_id| {
        if candidate_tx.send((candidate, connection_id)).is_err() {
            debug!("Candidate forwarder gone, dropping candidate");
        }
    });
    let forwarder = tokio::spawn({
        let bridge = bridge.downgrade();
        async move {
            while let Some((candidate, connection_id)) = candidate_rx.recv().await {
                let Some(bridge) = bridge.upgrade() else {
                    break;
                };
                let options = SendOptions::default().with_connection_id(connection_id);
                if let Err(e) = bridge
                    .send_message_with(SignalType::IceCandidate, &candidate, options)
                    .await
                {
                    warn!("Failed to send local candidate: {}", e);
                }
            }
        }
    });

    session.on_negotiation_needed({
        let session = session.downgrade();
        let bridge = bridge.downgrade();
        move || {
            let (Some(session), Some(bridge)) = (session.upgrade(), bridge.upgrade()) else {
                return;
            };
            tokio::spawn(async move {
                match session.handle_renegotiation().await {
                    Ok(offer) => {
                        if let Err(e) = send_offer(&bridge, offer).await {
                            warn!("Failed to send renegotiation offer: {}", e);
                        }
                    }
                    Err(SessionError::RenegotiationInProgress) => {
                        debug!("Renegotiation already in flight");
                    }
                    Err(e) => warn!("Renegotiation failed: {}", e),
                }
            });
        }
    });

    session.on_data_channel({
        let router = router.downgrade();
        move |handle| {
            if let Some(router) = router.upgrade() {
                router.handle_new_data_channel(handle, PRIMARY_PEER);
            }
        }
    });

    let weak_session = session.downgrade();
    let weak_bridge = bridge.downgrade();
    bridge.on(SignalType::Offer, {
        let session = weak_session.clone();
        let bridge = weak_bridge.clone();
        move |message| answer_offer(session.clone(), bridge.clone(), message)
    });
    bridge.on(SignalType::Answer, {
        let session = weak_session.clone();
        move |message| apply_answer(session.clone(), message)
    });
    bridge.on(SignalType::IceCandidate, {
        let session = weak_session;
        move |message| apply_candidate(session.clone(), message)
    });

    info!("Call wiring installed");
    CallLink {
        session: session.clone(),
        bridge: bridge.clone(),
        forwarder,
    }
}

impl CallLink {
    /// Open the call from this side: create the first offer and send it.
    pub async fn start(&self) -> Result<ConnectionId> {
        let offer = self.session.create_offer().await?;
        let connection_id = offer.connection_id.clone();
        send_offer(&self.bridge, offer).await?;
        Ok(connection_id)
    }

    /// Remove the bridge handlers and stop forwarding candidates.
    pub fn unlink(self) {
        for signal_type in CALL_SIGNALS {
            self.bridge.off(signal_type);
        }
        self.forwarder.abort();
        debug!("Call wiring removed");
    }
}

async fn send_offer(bridge: &SignalingBridge, offer: LocalOffer) -> Result<()> {
    let options = SendOptions::default().with_connection_id(offer.connection_id);
    bridge
        .send_message_with(SignalType::Offer, &offer.offer, options)
        .await?;
    Ok(())
}

async fn answer_offer(
    session: WeakPeerSession,
    bridge: WeakSignalingBridge,
    message: SignalingMessage,
) -> Result<()> {
    let (Some(session), Some(bridge)) = (session.upgrade(), bridge.upgrade()) else {
        return Ok(());
    };
    let offer: SessionDescription = message.payload()?;
    let connection_id = message.connection_id.clone().unwrap_or_default();
    let LocalAnswer {
        answer,
        connection_id,
    } = session.process_offer(offer, connection_id).await?;

    let options = SendOptions::default()
        .to(message.sender)
        .with_connection_id(connection_id);
    bridge
        .send_message_with(SignalType::Answer, &answer, options)
        .await?;
    Ok(())
}

async fn apply_answer(session: WeakPeerSession, message: SignalingMessage) -> Result<()> {
    let Some(session) = session.upgrade() else {
        return Ok(());
    };
    let answer: SessionDescription = message.payload()?;
    session
        .process_answer(answer, message.connection_id.clone())
        .await?;
    session.complete_renegotiation().await;
    Ok(())
}

async fn apply_candidate(session: WeakPeerSession, message: SignalingMessage) -> Result<()> {
    let Some(session) = session.upgrade() else {
        return Ok(());
    };
    let candidate: IceCandidate = message.payload()?;
    session
        .add_ice_candidate(candidate, message.connection_id.clone())
        .await?;
    Ok(())
}
