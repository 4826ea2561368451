use std::sync::Arc;
use tandem_client::MediaTrack;
use tandem_core::error::SessionError;
use tandem_core::model::{SenderKind, TrackKind};

use crate::integration::{init_tracing, initialized_session};
use crate::utils::{MockMediaTrack, stream_of};

#[tokio::test]
async fn test_add_then_remove_restores_sender_count() {
    init_tracing();
    let (session, transport) = initialized_session(&[MockMediaTrack::audio("mic")]).await;
    let before = session.sender_count().await;

    let cam = MockMediaTrack::video("cam");
    let stream = stream_of("camera", &[cam.clone()]);
    let id = session
        .add_track(cam, &stream, SenderKind::Video)
        .await
        .expect("add_track failed");
    assert_eq!(session.sender_count().await, before + 1);

    assert!(session.remove_track(&id).await.expect("remove_track failed"));
    assert_eq!(session.sender_count().await, before);
    assert_eq!(transport.attached_tracks(), vec!["mic".to_owned()]);
}

#[tokio::test]
async fn test_remove_unknown_track_is_a_no_op() {
    init_tracing();
    let (session, _transport) = initialized_session(&[MockMediaTrack::audio("mic")]).await;

    assert!(!session.remove_track("ghost").await.expect("remove_track failed"));
    assert_eq!(session.sender_count().await, 1);
}

#[tokio::test]
async fn test_replace_track_rekeys_sender() {
    init_tracing();
    let (session, transport) = initialized_session(&[MockMediaTrack::video("front")]).await;

    let back = MockMediaTrack::video("back");
    session
        .replace_track("front", back)
        .await
        .expect("replace_track failed");

    assert_eq!(session.sender_kind("front").await, None);
    assert_eq!(session.sender_kind("back").await, Some(SenderKind::Video));
    assert_eq!(session.sender_count().await, 1);
    assert_eq!(transport.attached_tracks(), vec!["back".to_owned()]);
}

#[tokio::test]
async fn test_replace_unknown_track_fails() {
    init_tracing();
    let (session, _transport) = initialized_session(&[]).await;

    let err = session
        .replace_track("ghost", MockMediaTrack::video("new"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::UnknownTrack(id) if id == "ghost"));
}

#[tokio::test]
async fn test_toggle_flips_every_track_of_a_kind_together() {
    init_tracing();
    let mic = MockMediaTrack::audio("mic");
    let cam = MockMediaTrack::video("cam");
    let (session, _transport) = initialized_session(&[mic.clone(), cam.clone()]).await;

    let screen = MockMediaTrack::new("screen", TrackKind::Video, "display");
    session
        .add_screen_share_track(&stream_of("display", &[screen.clone()]))
        .await
        .expect("screen share failed");

    assert_eq!(session.toggle_track(TrackKind::Video).await, Some(false));
    assert!(!cam.is_enabled());
    assert!(!screen.is_enabled());
    assert!(mic.is_enabled());

    // One enabled track is enough for the next toggle to disable all.
    cam.set_enabled(true);
    assert_eq!(session.toggle_track(TrackKind::Video).await, Some(false));
    assert!(!cam.is_enabled());

    assert_eq!(session.toggle_track(TrackKind::Video).await, Some(true));
    assert!(cam.is_enabled() && screen.is_enabled());
}

#[tokio::test]
async fn test_toggle_without_tracks_of_kind_returns_none() {
    init_tracing();
    let (session, _transport) = initialized_session(&[MockMediaTrack::audio("mic")]).await;

    assert_eq!(session.toggle_track(TrackKind::Video).await, None);
}

#[tokio::test]
async fn test_screen_share_add_and_remove() {
    init_tracing();
    let (session, transport) = initialized_session(&[MockMediaTrack::audio("mic")]).await;

    let screen = MockMediaTrack::new("screen-1", TrackKind::Video, "display");
    let id = session
        .add_screen_share_track(&stream_of("display", &[screen]))
        .await
        .expect("screen share failed");
    assert_eq!(id, "screen-1");
    assert_eq!(session.sender_kind(&id).await, Some(SenderKind::Screen));
    assert_eq!(session.screen_share_track_id().await.as_deref(), Some("screen-1"));

    assert!(session.remove_screen_share_track().await.expect("remove failed"));
    assert_eq!(session.screen_share_track_id().await, None);
    assert_eq!(transport.attached_tracks(), vec!["mic".to_owned()]);
    assert!(!session.remove_screen_share_track().await.expect("remove failed"));
}

#[tokio::test]
async fn test_second_screen_share_replaces_the_first() {
    init_tracing();
    let (session, transport) = initialized_session(&[]).await;

    let first = MockMediaTrack::new("screen-1", TrackKind::Video, "display");
    let second = MockMediaTrack::new("screen-2", TrackKind::Video, "display");
    session
        .add_screen_share_track(&stream_of("display", &[first]))
        .await
        .expect("first screen share failed");
    session
        .add_screen_share_track(&stream_of("display", &[second]))
        .await
        .expect("second screen share failed");

    assert_eq!(session.screen_share_track_id().await.as_deref(), Some("screen-2"));
    assert_eq!(session.sender_count().await, 1);
    assert_eq!(transport.attached_tracks(), vec!["screen-2".to_owned()]);
}

#[tokio::test]
async fn test_screen_share_requires_video_track() {
    init_tracing();
    let (session, _transport) = initialized_session(&[]).await;

    let audio_only = stream_of("display", &[MockMediaTrack::audio("system-audio")]);
    let err = session.add_screen_share_track(&audio_only).await.unwrap_err();
    assert!(matches!(err, SessionError::MissingVideoTrack(_)));
}

#[tokio::test]
async fn test_close_stops_local_tracks() {
    init_tracing();
    let mic = MockMediaTrack::audio("mic");
    let cam = MockMediaTrack::video("cam");
    let (session, transport) = initialized_session(&[mic.clone(), cam.clone()]).await;

    session.close().await;

    assert!(mic.is_stopped() && cam.is_stopped());
    assert!(transport.is_closed());
    assert!(!session.is_initialized().await);
    assert_eq!(session.sender_count().await, 0);
    assert_eq!(session.connection_id().await, None);

    // A closed session can be initialized again.
    let fresh: Vec<Arc<dyn MediaTrack>> = vec![MockMediaTrack::audio("mic-2")];
    session.initialize(&fresh).await.expect("re-initialize failed");
    assert_eq!(session.sender_count().await, 1);
}
