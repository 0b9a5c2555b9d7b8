/// Tests for drift driven by the engine's timer
///
/// Drift ticks once per period (1 s by default) while armed and playing. Each
/// tick's beat passes through the debounce window (100 ms) before reaching
/// the voices, so the tests sample state half a period after each tick.

use binaural::config::EngineConfig;
use binaural::drift::{DriftDirection, DriftPhase, DriftScheduler};
use binaural::engine::{Engine, EngineHandle, PointerEvent};
use binaural::test_utils::{Recorder, RecordingBackend};
use binaural::FrequencyBand;
use std::time::Duration;
use tokio::time::sleep;

fn spawn_with(config: EngineConfig) -> (EngineHandle, Recorder) {
    let backend = RecordingBackend::new();
    let recorder = backend.recorder();
    let handle = Engine::new(config, backend).unwrap().spawn();
    (handle, recorder)
}

/// Helper: Playing on theta at the surface center (beat 6)
async fn playing_theta_center(config: EngineConfig) -> (EngineHandle, Recorder) {
    let (handle, recorder) = spawn_with(config);
    handle.play().await.unwrap();
    handle.set_band("theta").await.unwrap();
    handle
        .pointer_down(PointerEvent::new(200.0, 200.0, 400.0, 400.0))
        .await
        .unwrap();
    handle.pointer_up().await.unwrap();
    sleep(Duration::from_millis(150)).await;
    assert_eq!(handle.snapshot().await.unwrap().beat, 6.0);
    (handle, recorder)
}

// ============================================================================
// TEST: Timed sweep
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_theta_sweep_reverses_at_bounds() {
    let (handle, _) = playing_theta_center(EngineConfig::default()).await;

    assert_eq!(handle.toggle_drift().await, Ok(true));
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.drift_timer_active);
    assert_eq!((snapshot.drift.min, snapshot.drift.max), (4.0, 8.0));

    // Half a period past the first tick
    sleep(Duration::from_millis(1500)).await;

    let mut beats = Vec::new();
    for _ in 0..7 {
        let snapshot = handle.snapshot().await.unwrap();
        beats.push(snapshot.beat);
        assert!((4.0..=8.0).contains(&snapshot.beat));
        sleep(Duration::from_millis(1000)).await;
    }
    assert_eq!(beats, vec![5.0, 4.0, 5.0, 6.0, 7.0, 8.0, 7.0]);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_sweep_stays_in_band_with_carrier_near_power_of_two() {
    let (handle, _) = spawn_with(EngineConfig::default());
    handle.play().await.unwrap();
    handle.set_base_preset("la").await.unwrap();
    handle.set_band("theta").await.unwrap();
    // Carrier just under 1024 Hz, so left + beat lands in the next binade
    handle
        .pointer_down(PointerEvent::new(200.0, 159.102, 400.0, 400.0))
        .await
        .unwrap();
    handle.pointer_up().await.unwrap();
    sleep(Duration::from_millis(150)).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.left.frequency < 1024.0 && snapshot.right.frequency > 1024.0);
    assert_eq!(snapshot.beat, 6.0);

    handle.toggle_drift().await.unwrap();
    sleep(Duration::from_millis(1500)).await;

    let mut beats = Vec::new();
    for _ in 0..11 {
        let beat = handle.snapshot().await.unwrap().beat;
        assert!((4.0..=8.0).contains(&beat), "beat {} left theta", beat);
        beats.push(beat);
        sleep(Duration::from_millis(1000)).await;
    }
    assert_eq!(beats, vec![5.0, 4.0, 5.0, 6.0, 7.0, 8.0, 7.0, 6.0, 5.0, 4.0, 5.0]);
    assert!(beats.windows(2).all(|w| w[0] != w[1]));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_left_carrier_is_untouched_by_drift() {
    let (handle, _) = playing_theta_center(EngineConfig::default()).await;
    handle.toggle_drift().await.unwrap();

    sleep(Duration::from_millis(3500)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.left.frequency, 445.5);
    assert_eq!(snapshot.right.frequency, 450.5);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_disarm_cancels_timer() {
    let (handle, recorder) = playing_theta_center(EngineConfig::default()).await;
    handle.toggle_drift().await.unwrap();
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(handle.toggle_drift().await, Ok(false));
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.drift_timer_active);
    assert_eq!(snapshot.beat, 5.0);

    let ramps = recorder.len();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(recorder.len(), ramps);
    assert_eq!(handle.snapshot().await.unwrap().beat, 5.0);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_disarms_drift() {
    let (handle, recorder) = playing_theta_center(EngineConfig::default()).await;
    handle.toggle_drift().await.unwrap();

    handle.stop().await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.drift.armed);
    assert!(!snapshot.drift_timer_active);

    let calls = recorder.len();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(recorder.len(), calls);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_armed_while_stopped_ticks_after_play() {
    let (handle, _) = spawn_with(EngineConfig::default());

    assert_eq!(handle.toggle_drift().await, Ok(true));
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.drift.armed);
    assert!(!snapshot.drift_timer_active);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(handle.snapshot().await.unwrap().beat, 10.5);

    handle.play().await.unwrap();
    assert!(handle.snapshot().await.unwrap().drift_timer_active);
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(handle.snapshot().await.unwrap().beat, 9.5);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_band_change_while_armed_resyncs_bounds() {
    let (handle, _) = playing_theta_center(EngineConfig::default()).await;
    handle.toggle_drift().await.unwrap();

    handle.set_band("gamma").await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!((snapshot.drift.min, snapshot.drift.max), (30.0, 50.0));

    // Center of gamma is 40; the next tick descends from there
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(handle.snapshot().await.unwrap().beat, 39.0);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_tick_reads_update_still_in_debounce_window() {
    let mut config = EngineConfig::default();
    config.debounce_ms = 2000;
    let (handle, _) = spawn_with(config);

    handle.play().await.unwrap();
    handle.set_band("theta").await.unwrap();
    handle.toggle_drift().await.unwrap();

    // At 1 s the theta center (6) is still pending; the tick steps from it
    sleep(Duration::from_millis(1500)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.beat, 10.5);
    assert_eq!(snapshot.pending.map(|p| p.beat), Some(5.0));

    handle.shutdown().await;
}

// ============================================================================
// TEST: Scheduler state machine
// ============================================================================

#[test]
fn test_scheduler_phases_follow_direction() {
    let theta = FrequencyBand::new(4.0, 8.0);
    let mut drift = DriftScheduler::new(&Default::default(), &theta);
    assert_eq!(drift.phase(), DriftPhase::Idle);

    drift.arm(&theta);
    assert_eq!(drift.phase(), DriftPhase::Descending);

    assert_eq!(drift.tick(5.0), Some(4.0));
    assert_eq!(drift.phase(), DriftPhase::Ascending);
    assert_eq!(drift.state().direction, DriftDirection::Ascending);

    drift.disarm();
    assert_eq!(drift.phase(), DriftPhase::Idle);
    assert_eq!(drift.tick(4.0), None);
}

#[test]
fn test_next_step_after_flip_moves_away_from_bound() {
    let beta = FrequencyBand::new(13.0, 30.0);
    let mut config = binaural::config::DriftConfig::default();
    config.step_hz = 4.0;
    config.initial_direction = DriftDirection::Ascending;

    let mut drift = DriftScheduler::new(&config, &beta);
    drift.arm(&beta);

    let mut beat = 25.0;
    let mut previous_direction = drift.state().direction;
    for _ in 0..40 {
        let next = drift.tick(beat).unwrap();
        assert!(beta.contains(next));
        let direction = drift.state().direction;
        if direction != previous_direction {
            // Flipped exactly at the bound it reached
            assert!(next == beta.min || next == beta.max);
            let after = drift.tick(next).unwrap();
            match direction {
                DriftDirection::Ascending => assert!(after > next),
                DriftDirection::Descending => assert!(after < next),
            }
            beat = after;
        } else {
            beat = next;
        }
        previous_direction = drift.state().direction;
    }
}
