use serde::{Deserialize, Serialize};

/// Kind reported by a media track handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Role a local track plays once it is bound to the session.
///
/// Screen share is carried as video on the wire but tracked separately so it
/// can be started and stopped without touching the camera sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    Audio,
    Video,
    Screen,
}

impl From<TrackKind> for SenderKind {
    fn from(kind: TrackKind) -> Self {
        match kind {
            TrackKind::Audio => Self::Audio,
            TrackKind::Video => Self::Video,
        }
    }
}
