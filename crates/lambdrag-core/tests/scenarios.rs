//! End-to-end reconciliation and throttling scenarios driven through the
//! public `ClientState` API.

use std::time::{Duration, Instant};

use lambdrag_core::{
    ClientConfig, ClientState, InputEvent, Point, Snapshot, ThrottleStrategy, TransitionPolicy,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn snapshot_json(
    puzzle_id: i64,
    token_id: i64,
    tokens: &[(&str, f64, f64)],
    clear: bool,
) -> String {
    let tokens: Vec<serde_json::Value> = tokens
        .iter()
        .map(|(label, x, y)| serde_json::json!({ "Token": label, "X": x, "Y": y }))
        .collect();
    serde_json::json!({
        "TokenID": token_id,
        "PlayerID": 42,
        "Started": true,
        "PuzzleID": puzzle_id,
        "PuzzleGoal": format!("goal {puzzle_id}"),
        "GHCIOutput": "<n/a>",
        "LevelClear": clear,
        "Players": 3,
        "Lobby": 1,
        "Tokens": tokens,
    })
    .to_string()
}

fn apply(client: &mut ClientState, json: &str, rng: &mut StdRng) {
    let snapshot = Snapshot::decode(json).expect("fixture snapshot decodes");
    client.apply_snapshot(&snapshot, rng);
}

/// Move the pointer so the self-token lands on `p` (default 800x400 canvas).
fn drag_to(client: &mut ClientState, p: Point, now: Instant) {
    client.handle_input(
        InputEvent::PointerMove {
            page_x: p.x * 800.0,
            page_y: p.y * 400.0,
        },
        now,
    );
}

const THREE: &[(&str, f64, f64)] = &[("take", 0.3, 0.3), ("5", 0.4, 0.4), ("$", 0.6, 0.6)];

#[test]
fn spectator_merges_everything_and_never_sends() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut client = ClientState::new(&ClientConfig::default());
    let start = Instant::now();

    apply(&mut client, &snapshot_json(0, -1, THREE, false), &mut rng);
    client.handle_input(InputEvent::Click, start);
    drag_to(&mut client, Point::new(0.9, 0.9), start);
    client.notify_local_change(start);

    let moved: &[(&str, f64, f64)] = &[("take", 0.1, 0.2), ("5", 0.3, 0.4), ("$", 0.5, 0.6)];
    apply(&mut client, &snapshot_json(0, -1, moved, false), &mut rng);

    for (i, (_, x, y)) in moved.iter().enumerate() {
        assert_eq!(client.tokens().get(i).unwrap().position(), Point::new(*x, *y));
    }
    for step in 0..10 {
        assert!(client.poll_send(start + Duration::from_millis(step * 100)).is_none());
    }
}

#[test]
fn owned_token_survives_stale_echo() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut client = ClientState::new(&ClientConfig::default());
    let now = Instant::now();

    apply(&mut client, &snapshot_json(4, 2, THREE, false), &mut rng);
    client.handle_input(InputEvent::Click, now);
    drag_to(&mut client, Point::new(0.5, 0.7), now);

    let echo: &[(&str, f64, f64)] = &[("take", 0.3, 0.3), ("5", 0.4, 0.4), ("$", 0.1, 0.1)];
    apply(&mut client, &snapshot_json(4, 2, echo, false), &mut rng);

    let own = client.tokens().get(2).unwrap().position();
    assert!((own.x - 0.5).abs() < 1e-9);
    assert!((own.y - 0.7).abs() < 1e-9);
}

#[test]
fn puzzle_change_resets_state() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut client = ClientState::new(&ClientConfig::default());
    let now = Instant::now();

    apply(&mut client, &snapshot_json(4, 0, THREE, true), &mut rng);
    assert!(client.puzzle().cleared);
    client.handle_input(InputEvent::Click, now);
    drag_to(&mut client, Point::new(0.5, 0.5), now);

    let next: &[(&str, f64, f64)] = &[("iterate", 0.7, 0.25), ("(", 0.71, 0.44)];
    apply(&mut client, &snapshot_json(5, 0, next, false), &mut rng);

    assert_eq!(client.session().puzzle_id(), Some(5));
    assert_eq!(client.puzzle().goal_text, "goal 5");
    assert!(!client.puzzle().cleared);
    assert_eq!(client.tokens().len(), 2);
    assert_eq!(client.tokens().get(0).unwrap().label, "iterate");
    assert_eq!(client.tokens().get(0).unwrap().position(), Point::new(0.7, 0.25));
}

#[test]
fn puzzle_step_back_depends_on_policy() {
    let earlier: &[(&str, f64, f64)] = &[("succ", 0.14, 0.77)];

    let mut rng = StdRng::seed_from_u64(4);
    let mut change = ClientState::new(&ClientConfig::default());
    apply(&mut change, &snapshot_json(3, 0, THREE, false), &mut rng);
    apply(&mut change, &snapshot_json(2, 0, earlier, false), &mut rng);
    assert_eq!(change.session().puzzle_id(), Some(2));
    assert_eq!(change.puzzle().goal_text, "goal 2");

    let config = ClientConfig {
        transition: TransitionPolicy::Advance,
        ..ClientConfig::default()
    };
    let mut advance = ClientState::new(&config);
    apply(&mut advance, &snapshot_json(3, 0, THREE, false), &mut rng);
    apply(&mut advance, &snapshot_json(2, 0, earlier, false), &mut rng);
    assert_eq!(advance.session().puzzle_id(), Some(3));
    assert_eq!(advance.puzzle().goal_text, "goal 3");
    assert_eq!(advance.tokens().len(), 1, "still trimmed to the remote length");
}

#[test]
fn burst_within_window_sends_once_with_last_position() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut client = ClientState::new(&ClientConfig::default());
    let start = Instant::now();
    apply(&mut client, &snapshot_json(1, 1, THREE, false), &mut rng);
    client.handle_input(InputEvent::Click, start);

    let path = [(0.1, 0.1), (0.2, 0.3), (0.25, 0.35), (0.4, 0.6), (0.45, 0.65)];
    for (i, (x, y)) in path.iter().enumerate() {
        drag_to(&mut client, Point::new(*x, *y), start + Duration::from_millis(i as u64 * 15));
    }

    let mut sent = Vec::new();
    for ms in (0..=300).step_by(5) {
        if let Some(update) = client.poll_send(start + Duration::from_millis(ms)) {
            sent.push(update);
        }
    }
    assert_eq!(sent.len(), 1);
    assert!((sent[0].x - 0.45).abs() < 1e-9);
    assert!((sent[0].y - 0.65).abs() < 1e-9);
    assert_eq!(sent[0].token_id, 1);
    assert_eq!(sent[0].player_id, 42);
}

#[test]
fn periodic_strategy_reports_each_window() {
    let mut config = ClientConfig::default();
    config.throttle.strategy = ThrottleStrategy::Periodic;
    config.throttle.window_ms = 25;
    let mut rng = StdRng::seed_from_u64(6);
    let mut client = ClientState::new(&config);
    let start = Instant::now();
    apply(&mut client, &snapshot_json(1, 0, THREE, false), &mut rng);

    let sent: Vec<_> = (0..4)
        .filter_map(|i| client.poll_send(start + Duration::from_millis(i * 25)))
        .collect();
    assert_eq!(sent.len(), 4);
    assert!(sent.iter().all(|u| (u.x - 0.3).abs() < 1e-9));
}

#[test]
fn malformed_snapshot_leaves_state_untouched() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut client = ClientState::new(&ClientConfig::default());
    apply(&mut client, &snapshot_json(1, 0, THREE, false), &mut rng);
    let before = client.frame();

    for bad in [
        r#"{"PuzzleID":1}"#,
        r#"{"PuzzleID":1,"Tokens":"take 5"}"#,
        r#"{"Tokens":[]}"#,
        "{",
    ] {
        assert!(Snapshot::decode(bad).is_err(), "{bad} should be rejected");
    }
    assert_eq!(client.frame(), before);
}

#[test]
fn resize_keeps_two_to_one_and_remaps_immediately() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut client = ClientState::new(&ClientConfig::default());
    apply(&mut client, &snapshot_json(1, 0, THREE, false), &mut rng);

    client.handle_input(
        InputEvent::Resize {
            height: 250,
            left: 0.0,
            top: 0.0,
        },
        Instant::now(),
    );
    let frame = client.frame();
    assert_eq!(frame.height, 250);
    assert_eq!(frame.width, 500);
    assert!((frame.tokens[2].px - 300.0).abs() < 1e-9);
    assert!((frame.tokens[2].py - 150.0).abs() < 1e-9);
}
