use super::*;
use crate::error::NetworkError;
use crate::ports::HttpMethod;
use crate::sync::remote::{AVAILABLE_PATH, PREFERENCES_PATH, SWITCH_PATH};
use crate::test_helpers::{FixedEnvironment, FlakyStorage, ManualClock, MockNetwork, RecordingDocument};
use crate::theme::store::THEME_STORAGE_KEY;
use serde_json::{Value, json};
use std::time::Duration;

struct Harness {
    network: Arc<MockNetwork>,
    storage: Arc<FlakyStorage>,
    document: Arc<RecordingDocument>,
    engine: PreferenceEngine,
}

fn harness_with(system_theme: Option<ThemeName>) -> Harness {
    let network = MockNetwork::new();
    let storage = FlakyStorage::new();
    let document = RecordingDocument::new();
    let ports = EnginePorts {
        storage: storage.clone(),
        network: network.clone(),
        document: document.clone(),
        environment: Arc::new(FixedEnvironment { system_theme, accessibility: None }),
        clock: ManualClock::at(42_000),
        view_transition: None,
    };
    let engine = PreferenceEngine::new(ports, &SyncConfig::default());
    Harness { network, storage, document, engine }
}

fn harness() -> Harness {
    harness_with(None)
}

/// Theme carried by the last PUT or PATCH the server received.
fn last_written_theme(network: &MockNetwork) -> Option<Value> {
    network
        .calls()
        .into_iter()
        .filter(|c| matches!(c.method, HttpMethod::Put | HttpMethod::Patch))
        .next_back()
        .and_then(|c| c.body)
        .map(|body| body["theme"].clone())
}

// =============================================================================
// initialize
// =============================================================================

#[tokio::test(start_paused = true)]
async fn initialize_applies_server_won_theme() {
    let h = harness();
    h.network.reply_json(HttpMethod::Get, PREFERENCES_PATH, &json!({ "theme": "light" }));
    h.network.reply_json(HttpMethod::Put, PREFERENCES_PATH, &json!({ "ok": true }));

    let state = h.engine.initialize();
    assert_eq!(state.current_theme, ThemeName::Dark);
    assert!(!state.is_loading);

    h.engine.settle().await;
    assert_eq!(h.engine.state().current_theme, ThemeName::Light);
    assert_eq!(h.engine.preferences().last_synced, Some(42_000));
    assert_eq!(h.engine.last_sync(), Some(42_000));
    assert_eq!(h.storage.raw(THEME_STORAGE_KEY).as_deref(), Some("light"));
    // Background reconcile is passive.
    assert_eq!(h.engine.sync_status(), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn initialize_twice_reconciles_once() {
    let h = harness();
    h.network.reply_json(HttpMethod::Get, PREFERENCES_PATH, &json!({ "theme": "dark" }));
    h.network.reply_json(HttpMethod::Put, PREFERENCES_PATH, &json!({}));

    h.engine.initialize();
    h.engine.initialize();
    h.engine.settle().await;

    assert_eq!(h.network.calls_to(HttpMethod::Get, PREFERENCES_PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn initialize_offline_makes_no_network_calls() {
    let h = harness();
    h.network.set_online(false);

    h.engine.initialize();
    h.engine.settle().await;

    assert_eq!(h.network.call_count(), 0);
    assert_eq!(h.engine.state().current_theme, ThemeName::Dark);
}

#[tokio::test(start_paused = true)]
async fn saved_auto_switch_is_restored_on_initialize() {
    let h = harness_with(Some(ThemeName::Light));
    h.network.set_online(false);
    h.storage.put_raw(PREFERENCES_STORAGE_KEY, r#"{"theme":"dark","autoSwitch":true}"#);

    let state = h.engine.initialize();
    assert!(h.engine.preferences().auto_switch);
    assert_eq!(state.current_theme, ThemeName::Light);
}

#[tokio::test(start_paused = true)]
async fn unreadable_saved_preferences_are_ignored() {
    let h = harness_with(Some(ThemeName::Light));
    h.network.set_online(false);
    h.storage.put_raw(PREFERENCES_STORAGE_KEY, "{not json");

    let state = h.engine.initialize();
    assert!(!h.engine.preferences().auto_switch);
    assert_eq!(state.current_theme, ThemeName::Dark);
}

// =============================================================================
// set_theme
// =============================================================================

#[tokio::test(start_paused = true)]
async fn set_theme_commits_before_returning_then_pushes() {
    let h = harness();
    h.network.reply_json(HttpMethod::Patch, SWITCH_PATH, &json!({ "theme": "light", "switched": true }));

    let state = h.engine.set_theme(ThemeName::Light).await;
    assert_eq!(state.current_theme, ThemeName::Light);
    assert_eq!(h.storage.raw(THEME_STORAGE_KEY).as_deref(), Some("light"));
    assert!(h.storage.raw(PREFERENCES_STORAGE_KEY).unwrap().contains(r#""theme":"light""#));
    assert_eq!(h.document.applied_themes(), vec![ThemeName::Light]);

    h.engine.settle().await;
    assert_eq!(h.network.calls_to(HttpMethod::Patch, SWITCH_PATH), 1);
    assert_eq!(h.network.calls()[0].body, Some(json!({ "theme": "light" })));
    assert_eq!(h.engine.sync_status(), SyncStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn offline_set_theme_is_local_only() {
    let h = harness();
    h.network.set_online(false);

    let state = h.engine.set_theme(ThemeName::Light).await;
    h.engine.settle().await;

    assert_eq!(state.current_theme, ThemeName::Light);
    assert_eq!(h.network.call_count(), 0);
    assert_eq!(h.engine.sync_status(), SyncStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn failed_push_retries_then_reports_error() {
    let h = harness();
    h.network.reply_error(HttpMethod::Patch, SWITCH_PATH, NetworkError::Connection("connection refused".into()));

    h.engine.set_theme(ThemeName::Light).await;
    h.engine.settle().await;

    assert_eq!(h.network.calls_to(HttpMethod::Patch, SWITCH_PATH), 4);
    assert_eq!(h.engine.sync_status(), SyncStatus::Error);
    assert_eq!(h.engine.state().current_theme, ThemeName::Light);
}

#[tokio::test(start_paused = true)]
async fn busy_transition_still_commits() {
    let h = harness();
    h.network.set_online(false);

    let (first, second) = tokio::join!(h.engine.set_theme(ThemeName::Light), h.engine.set_theme(ThemeName::Dark));

    assert_eq!(second.current_theme, ThemeName::Dark);
    assert_eq!(first.current_theme, ThemeName::Dark);
    assert_eq!(h.document.applied_themes(), vec![ThemeName::Light, ThemeName::Dark]);
    assert_eq!(h.storage.raw(THEME_STORAGE_KEY).as_deref(), Some("dark"));
}

#[tokio::test(start_paused = true)]
async fn toggle_and_raw_names() {
    let h = harness();
    h.network.set_online(false);

    assert_eq!(h.engine.toggle_theme().await.current_theme, ThemeName::Light);
    assert_eq!(h.engine.toggle_theme().await.current_theme, ThemeName::Dark);
    assert!(h.engine.set_theme_str("not-a-theme").await.is_none());
    assert_eq!(h.engine.state().current_theme, ThemeName::Dark);
    assert!(h.engine.set_theme_str("light").await.is_some());
}

#[tokio::test(start_paused = true)]
async fn reduced_motion_skips_the_animation_wait() {
    let h = harness();
    h.network.set_online(false);
    let flags = AccessibilityFlags { prefers_reduced_motion: true, prefers_high_contrast: false };
    h.engine.on_accessibility_changed(flags);

    let start = tokio::time::Instant::now();
    h.engine.set_theme(ThemeName::Light).await;
    assert!(start.elapsed() < Duration::from_millis(100));
    assert!(h.engine.preferences().reduced_motion);
    assert!(h.storage.raw(PREFERENCES_STORAGE_KEY).unwrap().contains(r#""reducedMotion":true"#));
}

// =============================================================================
// commits racing background sync
// =============================================================================

#[tokio::test(start_paused = true)]
async fn set_theme_during_startup_reconcile_is_kept() {
    let h = harness();
    h.network.reply_json(HttpMethod::Get, PREFERENCES_PATH, &json!({ "theme": "dark" }));
    h.network.reply_json(HttpMethod::Put, PREFERENCES_PATH, &json!({}));
    h.network.reply_json(HttpMethod::Patch, SWITCH_PATH, &json!({ "theme": "light", "switched": true }));

    h.engine.initialize();
    let state = h.engine.set_theme(ThemeName::Light).await;
    assert_eq!(state.current_theme, ThemeName::Light);

    h.engine.settle().await;
    assert_eq!(h.engine.state().current_theme, ThemeName::Light);
    assert_eq!(h.storage.raw(THEME_STORAGE_KEY).as_deref(), Some("light"));
    assert_eq!(h.engine.preferences().last_synced, Some(42_000));
    assert_eq!(last_written_theme(&h.network), Some(json!("light")));
    assert_eq!(h.engine.sync_status(), SyncStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn unpushed_offline_change_survives_reconnect() {
    let h = harness();
    h.network.set_online(false);
    h.engine.set_theme(ThemeName::Light).await;
    h.engine.settle().await;

    h.network.set_online(true);
    h.network.reply_json(HttpMethod::Get, PREFERENCES_PATH, &json!({ "theme": "dark" }));
    h.network.reply_json(HttpMethod::Put, PREFERENCES_PATH, &json!({}));
    h.engine.on_online_changed(true);
    h.engine.settle().await;

    assert_eq!(h.engine.state().current_theme, ThemeName::Light);
    assert_eq!(last_written_theme(&h.network), Some(json!("light")));
}

#[tokio::test(start_paused = true)]
async fn newer_commit_replaces_retrying_push() {
    let h = harness();
    h.network.reply_error(HttpMethod::Patch, SWITCH_PATH, NetworkError::Timeout("timed out".into()));
    h.network.reply_json(HttpMethod::Patch, SWITCH_PATH, &json!({ "switched": true }));

    h.engine.set_theme(ThemeName::Light).await;
    h.engine.set_theme(ThemeName::Dark).await;
    h.engine.settle().await;
    assert_eq!(h.engine.sync_status(), SyncStatus::Success);
    tokio::time::sleep(Duration::from_secs(20)).await;

    let switched: Vec<Value> = h
        .network
        .calls()
        .into_iter()
        .filter(|c| c.method == HttpMethod::Patch)
        .filter_map(|c| c.body.map(|body| body["theme"].clone()))
        .collect();
    assert_eq!(switched, vec![json!("light"), json!("dark")]);
    assert_eq!(h.engine.state().current_theme, ThemeName::Dark);
}

// =============================================================================
// sync_now
// =============================================================================

#[tokio::test(start_paused = true)]
async fn sync_now_server_wins() {
    let h = harness();
    h.network.reply_json(HttpMethod::Get, PREFERENCES_PATH, &json!({ "theme": "light" }));
    h.network.reply_json(HttpMethod::Put, PREFERENCES_PATH, &json!({}));

    let result = h.engine.sync_now().await;
    assert!(result.success);
    assert_eq!(result.source, Some(DataSource::Server));
    let merged = result.data.unwrap();
    assert_eq!(merged.theme, ThemeName::Light);
    assert_eq!(merged.last_synced, Some(42_000));

    assert_eq!(h.engine.state().current_theme, ThemeName::Light);
    assert_eq!(h.engine.sync_status(), SyncStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn sync_now_with_throwing_network_returns_local_fallback() {
    let h = harness();
    h.network.reply_error(HttpMethod::Get, PREFERENCES_PATH, NetworkError::Request("boom".into()));

    let result = h.engine.sync_now().await;
    assert!(result.success);
    assert!(result.fallback);
    assert_eq!(result.source, Some(DataSource::Local));
    assert_eq!(result.data.unwrap().theme, ThemeName::Dark);
    assert_eq!(h.network.calls_to(HttpMethod::Get, PREFERENCES_PATH), 4);
    assert_eq!(h.engine.sync_status(), SyncStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn sync_now_offline_short_circuits() {
    let h = harness();
    h.network.set_online(false);

    let result = h.engine.sync_now().await;
    assert!(result.success);
    assert_eq!(result.source, Some(DataSource::Local));
    assert_eq!(h.network.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn status_reverts_after_success_window() {
    let h = harness();
    h.network.reply_json(HttpMethod::Get, PREFERENCES_PATH, &json!({}));
    h.network.reply_json(HttpMethod::Put, PREFERENCES_PATH, &json!({}));

    h.engine.sync_now().await;
    assert_eq!(h.engine.sync_status(), SyncStatus::Success);

    let mut status = h.engine.watch_sync_status();
    status.changed().await.unwrap();
    assert_eq!(*status.borrow(), SyncStatus::Idle);
}

// =============================================================================
// auto-switch + environment
// =============================================================================

#[tokio::test(start_paused = true)]
async fn auto_switch_follows_system_theme_changes() {
    let h = harness_with(Some(ThemeName::Light));
    h.network.set_online(false);
    h.engine.initialize();

    let state = h.engine.set_auto_switch(true).await;
    assert_eq!(state.current_theme, ThemeName::Light);
    assert!(h.engine.preferences().auto_switch);

    let state = h.engine.on_system_theme_changed(ThemeName::Dark).await;
    assert_eq!(state.current_theme, ThemeName::Dark);

    h.engine.set_auto_switch(false).await;
    let state = h.engine.on_system_theme_changed(ThemeName::Light).await;
    assert_eq!(state.system_theme, ThemeName::Light);
    assert_eq!(state.current_theme, ThemeName::Dark);
}

#[tokio::test(start_paused = true)]
async fn auto_switch_change_pushes_full_preferences() {
    let h = harness();
    h.network.reply_json(HttpMethod::Put, PREFERENCES_PATH, &json!({}));

    h.engine.set_auto_switch(false).await;
    h.engine.settle().await;

    let put = h.network.calls().into_iter().find(|c| c.method == HttpMethod::Put).unwrap();
    assert_eq!(put.body.unwrap()["autoSwitch"], json!(false));
    assert_eq!(h.engine.sync_status(), SyncStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn reconnect_triggers_background_reconcile() {
    let h = harness();
    h.network.reply_json(HttpMethod::Get, PREFERENCES_PATH, &json!({ "theme": "light" }));
    h.network.reply_json(HttpMethod::Put, PREFERENCES_PATH, &json!({}));

    h.engine.on_online_changed(true);
    h.engine.settle().await;
    assert_eq!(h.engine.state().current_theme, ThemeName::Light);
}

// =============================================================================
// remote reads
// =============================================================================

#[tokio::test(start_paused = true)]
async fn available_themes_offline_uses_built_in_set() {
    let h = harness();
    h.network.set_online(false);

    let result = h.engine.available_themes().await;
    assert_eq!(result.data, Some(AvailableThemes::default()));
    assert!(result.fallback);
    assert_eq!(h.network.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn available_themes_exhausted_retry_falls_back() {
    let h = harness();
    h.network.reply_status(HttpMethod::Get, AVAILABLE_PATH, 503, "Service Unavailable");

    let result = h.engine.available_themes().await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("HTTP 503: Service Unavailable"));
    assert_eq!(result.data, Some(AvailableThemes::default()));
    assert_eq!(h.network.calls_to(HttpMethod::Get, AVAILABLE_PATH), 4);
}

#[tokio::test(start_paused = true)]
async fn remote_preferences_are_cached() {
    let h = harness();
    h.network.reply_json(HttpMethod::Get, PREFERENCES_PATH, &json!({ "theme": "light" }));

    assert!(h.engine.remote_preferences(false).await.success);
    let again = h.engine.remote_preferences(false).await;
    assert_eq!(again.source, Some(DataSource::Cache));
    assert_eq!(h.network.call_count(), 1);
}

// =============================================================================
// shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn shutdown_stops_pending_retries() {
    let h = harness();
    h.network.reply_error(HttpMethod::Patch, SWITCH_PATH, NetworkError::Timeout("timed out".into()));

    h.engine.set_theme(ThemeName::Light).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.network.calls_to(HttpMethod::Patch, SWITCH_PATH), 2);

    h.engine.shutdown();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(h.network.calls_to(HttpMethod::Patch, SWITCH_PATH), 2);
}

#[tokio::test(start_paused = true)]
async fn set_theme_after_shutdown_still_commits_locally() {
    let h = harness();
    h.engine.shutdown();

    let state = h.engine.set_theme(ThemeName::Light).await;
    h.engine.settle().await;

    assert_eq!(state.current_theme, ThemeName::Light);
    assert_eq!(h.network.call_count(), 0);
}
