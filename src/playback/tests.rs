use super::*;
use crate::geometry::Vec2;
use crate::render::RecordingRenderer;
use crate::timestep::{CarRecord, CarState, TimestepRecord, Turn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::time::{Duration, Instant};

const SCENARIO_PAYLOAD: &str = r#"[{"timestep":0,"traffic_lights":{"S":"G"},"cars":[{"id":"c1","origin":"N","position":{"x":0,"y":0},"direction":{"x":0,"y":1},"state":"moving","turn":"none","turned":false,"wait_time":0}]}]"#;

fn engine() -> PlaybackEngine {
    let config = EngineConfig {
        rng_seed: Some(3),
        ..EngineConfig::default()
    };
    PlaybackEngine::new(config, SkinSelector::uniform(vec!["car".to_string()]))
}

fn car(id: &str, x: f32, y: f32) -> CarRecord {
    CarRecord {
        id: id.to_string(),
        origin: "main_E".to_string(),
        original_origin: None,
        position: Vec2::new(x, y),
        direction: Vec2::new(-1.0, 0.0),
        state: CarState::Go,
        turn: Turn::Straight,
        turned: false,
        target_intersection: None,
        wait_time: 0,
    }
}

fn step(index: u32, lights: &[(&str, SignalColor)], cars: Vec<CarRecord>) -> TimestepRecord {
    TimestepRecord {
        index,
        traffic_lights: lights.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        cars,
    }
}

/// Tick far enough apart that every call applies one timestep.
fn run_all(engine: &mut PlaybackEngine, renderer: &mut RecordingRenderer, start: Instant) {
    let mut now = start;
    while engine.state() == PlaybackState::Running {
        engine.tick(now, renderer);
        now += Duration::from_secs(1);
    }
}

#[test]
fn test_new_engine_is_idle() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.tick(Instant::now(), &mut renderer), None);
    assert!(renderer.log.is_empty());
}

#[test]
fn test_scenario_payload_creates_car_and_sets_signal() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();

    engine.ingest(SCENARIO_PAYLOAD).unwrap();
    assert_eq!(engine.store().len(), 1);
    assert_eq!(engine.state(), PlaybackState::Running);

    assert_eq!(engine.tick(Instant::now(), &mut renderer), Some(0));
    assert_eq!(engine.signal("S"), Some(SignalColor::Green));
    assert_eq!(renderer.signals["S"], SignalColor::Green);

    let entity = engine.entity("c1").expect("c1 created");
    assert_eq!(entity.skin, "car");
    let pose = renderer.pose_of("c1").unwrap();
    assert_eq!(pose.position, Vec2::new(0.0, 0.0));
    assert_eq!(pose.heading, 0.0); // facing +y

    assert_eq!(engine.state(), PlaybackState::Finished);
    assert!(!engine.cursor().is_playing);
}

#[test]
fn test_second_message_removes_departed_car() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    let t0 = Instant::now();

    engine.load(vec![step(0, &[], vec![car("a", 0.0, 0.0), car("b", 5.0, 0.0)])]);
    run_all(&mut engine, &mut renderer, t0);
    assert!(engine.entities().contains("a"));

    engine.load(vec![step(0, &[], vec![car("b", 6.0, 0.0)])]);
    run_all(&mut engine, &mut renderer, t0 + Duration::from_secs(60));

    assert!(!engine.entities().contains("a"));
    assert!(engine.entities().contains("b"));
    assert_eq!(renderer.live_ids(), vec!["b".to_string()]);
}

#[test]
fn test_first_timestep_applies_immediately_then_waits_for_interval() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    let t0 = Instant::now();

    engine.load(vec![step(0, &[], vec![]), step(1, &[], vec![]), step(2, &[], vec![])]);

    assert_eq!(engine.tick(t0, &mut renderer), Some(0));
    assert_eq!(engine.tick(t0 + Duration::from_millis(200), &mut renderer), None);
    assert_eq!(engine.tick(t0 + Duration::from_millis(500), &mut renderer), Some(1));
    assert_eq!(engine.tick(t0 + Duration::from_millis(900), &mut renderer), None);
    assert_eq!(engine.tick(t0 + Duration::from_millis(1000), &mut renderer), Some(2));
    assert_eq!(engine.state(), PlaybackState::Finished);
    assert_eq!(engine.tick(t0 + Duration::from_secs(5), &mut renderer), None);
}

#[test]
fn test_empty_sequence_finishes_on_first_tick() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    engine.ingest("[]").unwrap();
    assert_eq!(engine.state(), PlaybackState::Running);
    assert_eq!(engine.tick(Instant::now(), &mut renderer), None);
    assert_eq!(engine.state(), PlaybackState::Finished);
}

#[test]
fn test_parse_failure_leaves_playback_untouched() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    let t0 = Instant::now();

    engine.load(vec![step(0, &[], vec![car("a", 0.0, 0.0)]), step(1, &[], vec![])]);
    engine.tick(t0, &mut renderer);
    let load_id = engine.store().load_id();

    assert!(engine.ingest("[{\"timestep\": 0").is_err());
    assert!(engine.ingest(r#"[{"timestep": 0, "cars": []}]"#).is_err());

    assert_eq!(engine.store().len(), 2);
    assert_eq!(engine.store().load_id(), load_id);
    assert_eq!(engine.cursor().current_index, 1);
    assert_eq!(engine.state(), PlaybackState::Running);
    assert!(engine.entities().contains("a"));
}

#[test]
fn test_stop_then_start_restarts_from_zero() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    let t0 = Instant::now();

    engine.load(vec![step(0, &[], vec![]), step(1, &[], vec![])]);
    engine.tick(t0, &mut renderer);
    engine.stop();
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.tick(t0 + Duration::from_secs(10), &mut renderer), None);

    assert!(engine.start());
    assert_eq!(engine.cursor().current_index, 0);
    assert_eq!(engine.tick(t0 + Duration::from_secs(11), &mut renderer), Some(0));
}

#[test]
fn test_start_without_data_stays_idle() {
    let mut engine = engine();
    assert!(!engine.start());
    assert_eq!(engine.state(), PlaybackState::Idle);
}

#[test]
fn test_finished_can_be_stopped_and_restarted() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    engine.load(vec![step(0, &[], vec![])]);
    run_all(&mut engine, &mut renderer, Instant::now());
    assert_eq!(engine.state(), PlaybackState::Finished);

    engine.stop();
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert!(engine.start());
    assert_eq!(engine.state(), PlaybackState::Running);
}

#[test]
fn test_tick_interval_is_clamped() {
    let mut engine = engine();
    let floor = Duration::from_millis(100);
    assert_eq!(engine.set_tick_interval(0.0), floor);
    assert_eq!(engine.set_tick_interval(-3.0), floor);
    assert_eq!(engine.set_tick_interval(f64::NAN), floor);
    assert_eq!(engine.set_tick_interval(f64::INFINITY), floor);
    assert_eq!(engine.set_tick_interval(2.0), Duration::from_secs(2));
    assert_eq!(engine.cursor().tick_interval, Duration::from_secs(2));
}

#[test]
fn test_huge_interval_saturates_instead_of_flooring() {
    let floor = Duration::from_millis(100);
    assert_eq!(clamp_interval(1e20, floor), Duration::MAX);

    let mut engine = engine();
    assert_eq!(engine.set_tick_interval(1e20), Duration::MAX);

    // Playback still starts, then waits on the oversized interval
    let mut renderer = RecordingRenderer::new();
    let t0 = Instant::now();
    engine.load(vec![step(0, &[], vec![]), step(1, &[], vec![])]);
    assert_eq!(engine.tick(t0, &mut renderer), Some(0));
    assert_eq!(engine.tick(t0 + Duration::from_secs(3600), &mut renderer), None);
}

#[test]
fn test_interval_change_applies_to_running_playback() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    let t0 = Instant::now();

    engine.load(vec![step(0, &[], vec![]), step(1, &[], vec![])]);
    engine.tick(t0, &mut renderer);
    engine.set_tick_interval(2.0);
    assert_eq!(engine.tick(t0 + Duration::from_secs(1), &mut renderer), None);
    assert_eq!(engine.tick(t0 + Duration::from_secs(2), &mut renderer), Some(1));
}

#[test]
fn test_absent_signal_keeps_previous_color() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();

    engine.load(vec![
        step(0, &[("S", SignalColor::Green), ("E", SignalColor::Red)], vec![]),
        step(1, &[("E", SignalColor::Yellow)], vec![]),
        step(2, &[], vec![]),
    ]);
    run_all(&mut engine, &mut renderer, Instant::now());

    assert_eq!(engine.signal("S"), Some(SignalColor::Green));
    assert_eq!(engine.signal("E"), Some(SignalColor::Yellow));
    assert_eq!(engine.signal("W"), None);
}

#[test]
fn test_signal_renderer_only_called_on_change() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();

    engine.load(vec![
        step(0, &[("S", SignalColor::Green)], vec![]),
        step(1, &[("S", SignalColor::Green)], vec![]),
        step(2, &[("S", SignalColor::AllRed)], vec![]),
    ]);
    run_all(&mut engine, &mut renderer, Instant::now());

    let changes = renderer
        .log
        .iter()
        .filter(|e| matches!(e, crate::render::RenderEvent::SignalChanged { .. }))
        .count();
    assert_eq!(changes, 2);
}

#[test]
fn test_initial_signals_start_red() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    engine.init_signals(&["S", "E", "W"], &mut renderer);
    assert_eq!(engine.signal("W"), Some(SignalColor::Red));
    assert_eq!(renderer.signals.len(), 3);
}

#[test]
fn test_diff_invariant_over_random_sequences() {
    let mut rng = StdRng::seed_from_u64(11);
    let pool: Vec<String> = (0..12).map(|i| format!("car{}", i)).collect();

    for _ in 0..20 {
        let steps: Vec<TimestepRecord> = (0..25)
            .map(|i| {
                let mut cars = Vec::new();
                for id in &pool {
                    if rng.gen_bool(0.5) {
                        cars.push(car(id, rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0)));
                    }
                }
                // order within a timestep is not meaningful
                if rng.gen_bool(0.5) {
                    cars.reverse();
                }
                step(i, &[], cars)
            })
            .collect();

        let mut engine = engine();
        let mut renderer = RecordingRenderer::new();
        engine.load(steps.clone());

        let mut now = Instant::now();
        let mut previous: HashSet<String> = HashSet::new();
        for expected in &steps {
            let before = renderer.log.len();
            let handles_before: Vec<_> = previous
                .iter()
                .map(|id| engine.entity(id).map(|e| e.handle))
                .collect();

            engine.tick(now, &mut renderer);
            now += Duration::from_secs(1);

            let ids: HashSet<String> = expected.cars.iter().map(|c| c.id.clone()).collect();
            let live: HashSet<String> = engine.entities().ids().into_iter().map(String::from).collect();
            assert_eq!(live, ids);

            // Retained ids keep their render handle: no destroy/create churn.
            for (id, handle) in previous.iter().zip(handles_before) {
                if ids.contains(id) {
                    assert_eq!(engine.entity(id).map(|e| e.handle), handle);
                }
            }

            let created = renderer.log[before..]
                .iter()
                .filter(|e| matches!(e, crate::render::RenderEvent::EntityCreated { .. }))
                .count();
            assert_eq!(created, ids.difference(&previous).count());

            previous = ids;
        }
        assert_eq!(renderer.live_ids().len(), previous.len());
    }
}

#[test]
fn test_zero_direction_keeps_previous_facing() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();

    let mut moving = car("a", 0.0, 0.0);
    moving.direction = Vec2::new(1.0, 0.0);
    let mut stopped = car("a", 0.0, 0.0);
    stopped.direction = Vec2::ZERO;

    engine.load(vec![step(0, &[], vec![moving]), step(1, &[], vec![stopped])]);
    run_all(&mut engine, &mut renderer, Instant::now());

    let heading = engine.entity("a").unwrap().motion.target().heading;
    assert!((heading - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
}

#[test]
fn test_new_car_with_zero_direction_faces_default() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    let mut parked = car("p", 2.0, 3.0);
    parked.direction = Vec2::ZERO;

    engine.load(vec![step(0, &[], vec![parked])]);
    run_all(&mut engine, &mut renderer, Instant::now());
    assert_eq!(renderer.pose_of("p").unwrap().heading, 0.0);
}

#[test]
fn test_updates_set_targets_without_moving_instantly() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    let t0 = Instant::now();

    engine.load(vec![
        step(0, &[], vec![car("a", 0.0, 0.0)]),
        step(1, &[], vec![car("a", 10.0, 0.0)]),
    ]);
    run_all(&mut engine, &mut renderer, t0);

    let entity = engine.entity("a").unwrap();
    assert_eq!(entity.motion.target().position, Vec2::new(10.0, 0.0));
    assert_eq!(entity.motion.current().position, Vec2::new(0.0, 0.0));

    engine.animate(0.1, &mut renderer);
    let x = renderer.pose_of("a").unwrap().position.x;
    assert!(x > 0.0 && x < 10.0);
}

#[test]
fn test_teleport_snaps_on_next_frame() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();

    engine.load(vec![
        step(0, &[], vec![car("a", -120.0, 0.0)]),
        step(1, &[], vec![car("a", 120.0, 0.0)]),
    ]);
    run_all(&mut engine, &mut renderer, Instant::now());
    engine.animate(0.016, &mut renderer);

    assert_eq!(renderer.pose_of("a").unwrap().position, Vec2::new(120.0, 0.0));
}

#[test]
fn test_animate_settled_entities_does_not_redraw() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    engine.load(vec![step(0, &[], vec![car("a", 1.0, 1.0)])]);
    run_all(&mut engine, &mut renderer, Instant::now());
    assert_eq!(engine.animate(0.016, &mut renderer), 0);
}

#[test]
fn test_no_skins_skips_creation_and_keeps_playing() {
    let mut engine = PlaybackEngine::new(EngineConfig::default(), SkinSelector::uniform(Vec::new()));
    let mut renderer = RecordingRenderer::new();

    engine.load(vec![
        step(0, &[("S", SignalColor::Green)], vec![car("a", 0.0, 0.0)]),
        step(1, &[("S", SignalColor::Red)], vec![]),
    ]);
    run_all(&mut engine, &mut renderer, Instant::now());

    assert!(engine.entities().is_empty());
    assert_eq!(renderer.created(), 0);
    assert_eq!(engine.signal("S"), Some(SignalColor::Red));
    assert_eq!(engine.state(), PlaybackState::Finished);
}

#[test]
fn test_weighted_skins_used_for_new_cars() {
    let config = EngineConfig {
        rng_seed: Some(9),
        ..EngineConfig::default()
    };
    let skins = SkinSelector::new(
        vec!["sedan".to_string(), "truck".to_string()],
        Some(vec![1.0, 0.0]),
    );
    let mut engine = PlaybackEngine::new(config, skins);
    let mut renderer = RecordingRenderer::new();

    let cars = (0..20).map(|i| car(&format!("c{}", i), 0.0, 0.0)).collect();
    engine.load(vec![step(0, &[], cars)]);
    run_all(&mut engine, &mut renderer, Instant::now());

    assert!(renderer.live.values().all(|(_, skin, _)| skin == "sedan"));
}

#[test]
fn test_status_reflects_engine() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    engine.load(vec![
        step(0, &[("S", SignalColor::Yellow)], vec![car("a", 0.0, 0.0)]),
        step(1, &[], vec![]),
    ]);
    engine.tick(Instant::now(), &mut renderer);

    let status = engine.status();
    assert_eq!(status.state, PlaybackState::Running);
    assert_eq!(status.current_index, 1);
    assert_eq!(status.total_timesteps, 2);
    assert_eq!(status.active_entities, 1);
    assert_eq!(status.signals["S"], SignalColor::Yellow);
    assert!(status.load_id.is_some());
    assert!((status.tick_interval_seconds - 0.5).abs() < 1e-9);
}

#[test]
fn test_reload_keeps_cars_present_in_new_data() {
    let mut engine = engine();
    let mut renderer = RecordingRenderer::new();
    let t0 = Instant::now();

    engine.load(vec![step(0, &[], vec![car("a", 0.0, 0.0)])]);
    run_all(&mut engine, &mut renderer, t0);
    let handle = engine.entity("a").unwrap().handle;

    engine.load(vec![step(0, &[], vec![car("a", 1.0, 0.0), car("b", 3.0, 0.0)])]);
    run_all(&mut engine, &mut renderer, t0 + Duration::from_secs(60));

    assert_eq!(engine.entity("a").unwrap().handle, handle);
    assert_eq!(renderer.created(), 2);
    assert_eq!(renderer.destroyed(), 0);
}
