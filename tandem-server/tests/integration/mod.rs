
use tandem_core::model::{SignalType, SignalingMessage};
use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn offer_from(sender: &str, room_id: &str, timestamp: i64) -> SignalingMessage {
    SignalingMessage {
        signal_type: SignalType::Offer,
        sender: sender.to_owned(),
        receiver: None,
        room_id: room_id.to_owned(),
        data: serde_json::json!({ "type": "offer", "sdp": "v=0" }),
        timestamp,
        connection_id: None,
    }
}
