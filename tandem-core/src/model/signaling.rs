use crate::model::connection::ConnectionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of a signaling message. Handlers are registered per exact tag.
///
/// Tags outside the call protocol travel as `Custom` and keep their wire name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalType {
    Offer,
    Answer,
    IceCandidate,
    Join,
    Leave,
    Custom(String),
}

impl SignalType {
    pub fn custom(tag: impl Into<String>) -> Self {
        Self::from(tag.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Custom(tag) => tag,
        }
    }
}

impl From<String> for SignalType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "offer" => Self::Offer,
            "answer" => Self::Answer,
            "ice-candidate" => Self::IceCandidate,
            "join" => Self::Join,
            "leave" => Self::Leave,
            _ => Self::Custom(tag),
        }
    }
}

impl From<&str> for SignalType {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_owned())
    }
}

impl From<SignalType> for String {
    fn from(signal_type: SignalType) -> Self {
        match signal_type {
            SignalType::Custom(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message exchanged through the signal store.
///
/// Immutable once sent. Ordered by `timestamp` for cursor purposes only; the
/// timestamps of different senders are not guaranteed to be increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    pub room_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
}

impl SignalingMessage {
    /// True when the message has no explicit receiver or names `identity` as its receiver.
    pub fn is_addressed_to(&self, identity: &str) -> bool {
        self.receiver.as_deref().is_none_or(|receiver| receiver == identity)
    }

    /// Decode the payload into a typed value.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// Session description carried in offer/answer payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A discovered network path, in the shape browsers serialize it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}
