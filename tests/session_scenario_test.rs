//! Integration tests for the GameSession state machine
//!
//! These tests drive the session through its public API only:
//! - The difficulty 1 play-through (hit, miss, counters)
//! - Combo and counter invariants over long hit/miss sequences
//! - Settings clamping and chart reproducibility
//! - Clock-driven auto-miss and the automatic end of a run

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vocal_rhythm::config::GameConfig;
use vocal_rhythm::game::{ChartGenerator, GameEvent, GameSession, NoteState, SessionStatus};

fn playing_session() -> GameSession {
    let mut session = GameSession::new(&GameConfig::default());
    session.start_game();
    session
}

#[test]
fn test_difficulty_one_scenario() {
    let mut session = GameSession::new(&GameConfig::default());
    assert_eq!(session.set_difficulty(1), 1);
    session.start_game();

    let notes = session.notes();
    assert!((12..=25).contains(&notes.len()));
    assert!(notes.iter().all(|n| n.state == NoteState::Pending));
    assert!(notes
        .windows(2)
        .all(|pair| pair[0].target_time_ms < pair[1].target_time_ms));

    let first = notes[0].id.clone();
    let second = notes[1].id.clone();

    let outcome = session.hit_note(&first, 0.95).expect("first note is pending");
    assert!(outcome.perfect());
    let board = session.board();
    assert_eq!(board.score, 100);
    assert_eq!(board.combo, 1);
    assert_eq!(board.hit_notes, 1);
    assert_eq!(board.perfect_notes, 1);

    assert!(session.miss_note(&second));
    let board = session.board();
    assert_eq!(board.combo, 0);
    assert_eq!(board.missed_notes, 1);
    assert_eq!(board.total_notes, 2);
    assert_eq!(board.max_combo, 1);
}

#[test]
fn test_counters_hold_over_random_sequences() {
    let mut rng = StdRng::seed_from_u64(7);

    for difficulty in 1..=10 {
        let mut session = GameSession::new(&GameConfig::default());
        session.set_difficulty(difficulty);
        session.start_game();

        let ids: Vec<String> = session.notes().iter().map(|n| n.id.clone()).collect();
        for id in &ids {
            let previous_combo = session.board().combo;
            if rng.gen_bool(0.7) {
                session.hit_note(id, rng.gen_range(0.0..=1.0));
                assert_eq!(session.board().combo, previous_combo + 1);
            } else {
                session.miss_note(id);
                assert_eq!(session.board().combo, 0);
            }

            let board = session.board();
            assert!(board.combo <= board.max_combo);
            assert_eq!(board.total_notes, board.hit_notes + board.missed_notes);
            assert!(board.perfect_notes <= board.hit_notes);
        }

        assert_eq!(session.status(), SessionStatus::Ended);
        assert_eq!(session.board().total_notes as usize, ids.len());
    }
}

#[test]
fn test_resolved_notes_ignore_further_calls() {
    let mut session = playing_session();
    let id = session.notes()[0].id.clone();

    assert!(session.hit_note(&id, 0.8).is_some());
    let after_first = session.board().clone();

    assert!(session.hit_note(&id, 1.0).is_none());
    assert!(!session.miss_note(&id));
    assert!(session.hit_note("note-999", 1.0).is_none());
    assert_eq!(session.board(), &after_first);

    // A miss for a note outside the chart only breaks the combo
    assert!(!session.miss_note("does-not-exist"));
    let board = session.board();
    assert_eq!(board.combo, 0);
    assert_eq!(board.max_combo, after_first.max_combo);
    assert_eq!(board.total_notes, after_first.total_notes);
    assert_eq!(board.missed_notes, 0);
}

#[test]
fn test_pausing_through_the_last_notes_still_ends_the_run() {
    let mut session = playing_session();
    let ids: Vec<String> = session.notes().iter().map(|n| n.id.clone()).collect();
    let (last, rest) = ids.split_last().expect("chart is not empty");
    for id in rest {
        session.hit_note(id, 0.9);
    }

    session.pause_game();
    session.miss_note(last);
    assert_eq!(session.status(), SessionStatus::Paused);

    session.resume_game();
    assert_eq!(session.status(), SessionStatus::Ended);
    assert_eq!(session.summary().missed_notes, 1);
}

#[test]
fn test_settings_are_clamped() {
    let mut session = GameSession::default();
    assert_eq!(session.set_difficulty(15), 10);
    assert_eq!(session.set_difficulty(0), 1);
    assert_eq!(session.set_difficulty(-4), 1);
    assert_eq!(session.set_volume(-0.1), 0.0);
    assert_eq!(session.set_volume(1.5), 1.0);
    assert_eq!(session.set_volume(f32::NAN), 0.0);
    assert_eq!(session.set_volume(0.25), 0.25);
}

#[test]
fn test_charts_are_reproducible() {
    for difficulty in 1..=10 {
        let a = ChartGenerator::new(4, 42).generate(difficulty);
        let b = ChartGenerator::new(4, 42).generate(difficulty);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}

#[test]
fn test_clock_runs_out_the_chart() {
    let mut session = playing_session();
    let last = session.notes().last().cloned().expect("chart is not empty");

    session.update_time(last.target_time_ms + last.duration_ms + 501);

    assert_eq!(session.status(), SessionStatus::Ended);
    assert!(session.notes().iter().all(|n| n.state == NoteState::Missed));

    let events = session.drain_events();
    let misses = events
        .iter()
        .filter(|e| matches!(e, GameEvent::NoteMissed { .. }))
        .count();
    assert_eq!(misses, session.notes().len());
    match events.last() {
        Some(GameEvent::SessionEnded { summary }) => {
            assert_eq!(summary.score, 0);
            assert_eq!(summary.missed_notes as usize, misses);
        }
        other => panic!("expected SessionEnded last, got {:?}", other),
    }
}

#[test]
fn test_start_after_end_begins_a_fresh_run() {
    let mut session = playing_session();
    let ids: Vec<String> = session.notes().iter().map(|n| n.id.clone()).collect();
    for id in &ids {
        session.hit_note(id, 1.0);
    }
    assert_eq!(session.status(), SessionStatus::Ended);
    assert!(session.board().score > 0);

    session.start_game();
    assert_eq!(session.status(), SessionStatus::Playing);
    assert_eq!(session.board().score, 0);
    assert_eq!(session.board().max_combo, 0);
    assert_eq!(session.clock_ms(), 0);
    assert!(session.notes().iter().all(|n| n.is_pending()));
}
