use crate::transport::{ChannelHandle, TransportState};
use crate::session::RemoteStream;
use parking_lot::RwLock;
use std::sync::Arc;
use tandem_core::model::{ConnectionId, IceCandidate};

pub type CandidateCallback = dyn Fn(IceCandidate, ConnectionId) + Send + Sync;
pub type NegotiationNeededCallback = dyn Fn() + Send + Sync;
pub type RemoteStreamCallback = dyn Fn(RemoteStream) + Send + Sync;
pub type DataChannelCallback = dyn Fn(Arc<dyn ChannelHandle>) + Send + Sync;
pub type ConnectionStateCallback = dyn Fn(TransportState) + Send + Sync;

/// Holder for a single callback; installing a new one replaces the old one.
pub struct CallbackSlot<F: ?Sized> {
    slot: RwLock<Option<Arc<F>>>,
}

impl<F: ?Sized> CallbackSlot<F> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    pub fn set(&self, f: Arc<F>) {
        *self.slot.write() = Some(f);
    }

    pub fn clear(&self) {
        self.slot.write().take();
    }

    pub fn get(&self) -> Option<Arc<F>> {
        self.slot.read().clone()
    }

    pub fn is_set(&self) -> bool {
        self.slot.read().is_some()
    }
}

impl<F: ?Sized> Default for CallbackSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Event callbacks of a peer session, one active handler per event.
#[derive(Default)]
pub(crate) struct SessionCallbacks {
    pub ice_candidate: CallbackSlot<CandidateCallback>,
    pub negotiation_needed: CallbackSlot<NegotiationNeededCallback>,
    pub remote_stream: CallbackSlot<RemoteStreamCallback>,
    pub data_channel: CallbackSlot<DataChannelCallback>,
    pub connection_state: CallbackSlot<ConnectionStateCallback>,
}
