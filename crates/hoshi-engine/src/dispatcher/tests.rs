//! Unit tests for the protocol state machine.

use std::sync::{Arc, Mutex, PoisonError};

use rstest::{fixture, rstest};

use super::{Effect, EngineCore};
use crate::board::{Color, TurnState};
use crate::config::EngineConfig;
use crate::errors::ProcessFailure;
use crate::events::{Interest, SessionEvent};
use crate::tests::support::{CoreHarness, FailingWriter, alternating};

const BOOT_COMMANDS: usize = 6;

#[fixture]
fn booted() -> CoreHarness {
    let mut harness = CoreHarness::new();
    harness.boot(true, false, false);
    harness.settle();
    harness.clear_effects();
    harness
}

fn recorder() -> (Arc<Mutex<Vec<f64>>>, super::EvaluationContinuation) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let continuation: super::EvaluationContinuation = Box::new(move |value: f64| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
    });
    (seen, continuation)
}

fn run_evaluations(effects: Vec<Effect>) {
    for effect in effects {
        if let Effect::Evaluation {
            continuation,
            value,
        } = effect
        {
            continuation(value);
        }
    }
}

#[rstest]
fn startup_waits_for_banner_then_probes_in_order() {
    let mut harness = CoreHarness::new();
    let effects = harness.core.start();

    assert!(effects.is_empty());
    assert!(harness.lines().is_empty());

    harness.stderr("GTP ready, beginning main protocol loop");
    assert_eq!(
        harness.lines(),
        vec!["0 komi 7.5", "1 lz-analyze interval 1 minmoves 30"]
    );

    harness.respond(true);
    harness.respond(true);
    harness.respond(false);
    harness.respond(false);

    assert_eq!(
        harness.commands(),
        vec![
            "komi 7.5",
            "lz-analyze interval 1 minmoves 30",
            "endstate_map",
            "kata-analyze interval 1",
            "clear_board",
        ]
    );
    assert!(harness.core.is_ready());
    assert_eq!(harness.events(), vec![&SessionEvent::Ready]);
}

#[rstest]
fn probes_start_immediately_without_waiting() {
    let config = EngineConfig::new("leelaz").with_wait_for_startup(false);
    let mut harness = CoreHarness::with_config(config, Interest::all());

    let effects = harness.core.start();

    assert!(effects.is_empty());
    assert_eq!(
        harness.lines(),
        vec!["0 komi 7.5", "1 lz-analyze interval 1 minmoves 30"]
    );
}

#[rstest]
fn repeated_banner_does_not_probe_again(mut booted: CoreHarness) {
    booted.stderr("Setting max tree size to 3736 MiB");

    assert_eq!(booted.commands().len(), BOOT_COMMANDS);
}

#[rstest]
fn queued_work_waits_for_probes() {
    let mut harness = CoreHarness::new();
    harness.core.start();
    harness.stderr("GTP ready");
    let effects = harness.core.set_board(&alternating(&["D4"]));

    assert!(effects.is_empty());
    assert_eq!(harness.commands().len(), 2);
    assert!(!harness.core.in_flight().is_settled());
}

#[rstest]
fn at_most_one_command_is_outstanding(mut booted: CoreHarness) {
    booted.core.send_command("komi 6.5");
    booted.core.send_command("time_settings 0 5 1");

    assert_eq!(booted.commands_after(BOOT_COMMANDS), vec!["komi 6.5"]);
    assert_eq!(booted.core.in_flight().last_sent(), 6);
    assert_eq!(booted.core.in_flight().last_acked(), 5);
    assert_eq!(booted.core.queue().len(), 1);

    booted.respond(true);

    assert_eq!(
        booted.commands_after(BOOT_COMMANDS),
        vec!["komi 6.5", "time_settings 0 5 1"]
    );
    assert_eq!(booted.core.in_flight().last_acked(), 6);
    assert!(booted.core.queue().is_empty());
}

#[rstest]
fn diverging_history_replays_only_the_tail(mut booted: CoreHarness) {
    booted.play_through(&alternating(&["D4", "Q16", "C3"]));
    let before = booted.commands().len();

    booted.play_through(&alternating(&["D4", "Q16", "R4"]));

    assert_eq!(
        booted.commands_after(before),
        vec!["undo", "play b R4", "lz-analyze interval 10 minmoves 30"]
    );
}

#[rstest]
fn unchanged_history_sends_nothing(mut booted: CoreHarness) {
    booted.play_through(&alternating(&["D4", "Q16"]));
    let before = booted.commands().len();

    booted.play_through(&alternating(&["D4", "Q16"]));

    assert_eq!(booted.commands().len(), before);
}

#[rstest]
fn empty_history_clears_the_board(mut booted: CoreHarness) {
    booted.play_through(&alternating(&["D4", "Q16"]));
    let before = booted.commands().len();

    booted.play_through(&[]);

    assert_eq!(
        booted.commands_after(before),
        vec!["clear_board", "lz-analyze interval 10 minmoves 30"]
    );
    assert!(booted.core.mirror().is_empty());
    assert_eq!(booted.core.turn(), TurnState::initial());
}

#[rstest]
fn turn_changes_when_marker_is_dispatched(mut booted: CoreHarness) {
    booted.core.set_board(&alternating(&["D4"]));

    assert_eq!(booted.core.turn(), TurnState::initial());

    booted.settle();

    assert_eq!(
        booted.core.turn(),
        TurnState {
            move_count: 1,
            to_move: Color::White,
        }
    );
}

#[rstest]
fn rejected_play_keeps_optimistic_mirror(mut booted: CoreHarness) {
    let history = alternating(&["D4"]);
    booted.core.set_board(&history);
    booted.respond(false);

    assert_eq!(booted.core.mirror(), history.as_slice());
}

#[rstest]
fn analysis_is_ignored_while_a_command_is_outstanding(mut booted: CoreHarness) {
    let line = "info move D4 visits 3 winrate 5000 order 0 pv D4";
    booted.core.send_command("komi 6.5");

    booted.stdout(line);
    assert!(booted.events().is_empty());

    booted.respond(true);
    booted.stdout(line);
    assert_eq!(booted.events().len(), 1);
}

#[rstest]
fn analysis_is_reported_for_the_side_to_move(mut booted: CoreHarness) {
    booted.play_through(&alternating(&["D4"]));
    booted.clear_effects();

    booted.stdout("info move Q16 visits 10 winrate 4000 order 0 pv Q16 D16");

    let Some(SessionEvent::Suggestions(report)) = booted.events().first().copied() else {
        panic!("expected suggestions, got {:?}", booted.effects);
    };
    assert_eq!(report.visits, 10);
    let black = report.black_winrate.expect("black winrate");
    assert!((black - 60.0).abs() < 1e-9);
}

#[rstest]
fn analysis_without_interest_is_dropped() {
    let interest = Interest {
        suggestions: false,
        endstate: true,
    };
    let mut harness = CoreHarness::with_config(EngineConfig::new("leelaz"), interest);
    harness.boot(true, false, false);
    harness.settle();
    harness.clear_effects();

    harness.stdout("info move D4 visits 3 winrate 5000 order 0 pv D4");

    assert!(harness.events().is_empty());
}

#[rstest]
#[case(true, false, "lz-analyze interval 10 minmoves 30")]
#[case(false, false, "lz-analyze 10")]
#[case(true, true, "kata-analyze ownership true interval 10 minmoves 30")]
#[case(false, true, "kata-analyze ownership true 10")]
fn analysis_command_follows_capabilities(
    #[case] minmoves: bool,
    #[case] kata: bool,
    #[case] expected: &str,
) {
    let mut harness = CoreHarness::new();
    harness.boot(minmoves, false, kata);
    harness.settle();

    assert_eq!(harness.commands().last().map(String::as_str), Some(expected));
    assert_eq!(harness.core.capabilities().is_alternate_dialect(), kata);
}

#[rstest]
fn configured_komi_and_interval_reach_the_engine() {
    let config = EngineConfig::new("leelaz")
        .with_komi(6.5)
        .with_analyze_interval(25);
    let mut harness = CoreHarness::with_config(config, Interest::all());
    harness.boot(true, false, false);
    harness.settle();

    let commands = harness.commands();
    assert_eq!(commands.first().map(String::as_str), Some("komi 6.5"));
    assert_eq!(
        commands.last().map(String::as_str),
        Some("lz-analyze interval 25 minmoves 30")
    );
}

#[rstest]
fn pondering_toggles_only_on_change(mut booted: CoreHarness) {
    booted.core.set_pondering(true);
    assert_eq!(booted.commands().len(), BOOT_COMMANDS);
    assert!(booted.core.is_pondering());

    booted.core.set_pondering(false);
    booted.core.set_pondering(false);
    booted.settle();
    assert_eq!(booted.commands_after(BOOT_COMMANDS), vec!["name"]);
    assert!(!booted.core.is_pondering());

    booted.core.set_pondering(true);
    assert_eq!(
        booted.commands_after(BOOT_COMMANDS),
        vec!["name", "lz-analyze interval 10 minmoves 30"]
    );
}

#[rstest]
fn endstate_support_debounces_updates() {
    let mut harness = CoreHarness::new();
    harness.boot(true, true, false);
    harness.settle();

    assert!(matches!(harness.core.update().as_slice(), [Effect::ScheduleUpdate]));

    let before = harness.commands().len();
    harness.core.update_now();
    harness.settle();

    assert_eq!(
        harness.commands_after(before),
        vec!["endstate_map", "lz-analyze interval 10 minmoves 30"]
    );
}

#[rstest]
fn endstate_is_not_requested_without_interest() {
    let interest = Interest {
        suggestions: true,
        endstate: false,
    };
    let mut harness = CoreHarness::with_config(EngineConfig::new("leelaz"), interest);
    harness.boot(true, true, false);
    harness.settle();
    let before = harness.commands().len();

    harness.core.update_now();
    harness.settle();

    assert_eq!(
        harness.commands_after(before),
        vec!["lz-analyze interval 10 minmoves 30"]
    );
}

#[rstest]
fn endstate_block_is_delivered_and_status_mode_resumes() {
    let mut harness = CoreHarness::new();
    harness.boot(true, true, false);
    harness.settle();
    harness.play_through(&alternating(&["D4", "Q16"]));
    harness.clear_effects();

    harness.stderr("endstate:");
    harness.stderr(" 1000  500 -250");
    harness.stderr("    0 -1000    0");
    harness.stderr("  250    0 1000");
    harness.stderr("endstate sum: 0.75");
    harness.stderr("Detecting residual layers...v1...128 channels...10 blocks.");

    let Some(SessionEvent::Endstate(report)) = harness.events().first().copied() else {
        panic!("expected endstate, got {:?}", harness.effects);
    };
    assert_eq!(report.matrix.len(), 3);
    assert_eq!(report.matrix.first(), Some(&vec![1.0, 0.5, -0.25]));
    assert_eq!(report.move_count, 2);
    assert_eq!(harness.core.network_descriptor(), Some("128x10"));
}

#[rstest]
fn peek_plays_and_undoes_for_side_to_move(mut booted: CoreHarness) {
    booted.play_through(&alternating(&["D4"]));
    let before = booted.commands().len();
    let (seen, continuation) = recorder();

    booted.core.peek_value("Q16", continuation);

    assert_eq!(
        booted.commands_after(before),
        vec![
            "lz-setoption name visits value 1",
            "play w Q16",
            "lz-analyze interval 0",
            "lz-setoption name visits value 0",
            "undo",
        ]
    );

    let effects = booted.core.handle_stderr("NN eval=0.4125");
    run_evaluations(effects);
    booted.stderr("NN eval=0.9");

    let values = seen.lock().unwrap_or_else(PoisonError::into_inner).clone();
    assert_eq!(values, vec![0.4125]);
}

#[rstest]
fn later_peek_replaces_pending_continuation(mut booted: CoreHarness) {
    let (first, first_continuation) = recorder();
    let (second, second_continuation) = recorder();
    booted.core.peek_value("D4", first_continuation);
    booted.core.peek_value("Q16", second_continuation);

    run_evaluations(booted.core.handle_stderr("NN eval=0.5"));

    assert!(first.lock().unwrap_or_else(PoisonError::into_inner).is_empty());
    assert_eq!(
        *second.lock().unwrap_or_else(PoisonError::into_inner),
        vec![0.5]
    );
}

#[rstest]
fn peek_restores_configured_visit_limit() {
    let config = EngineConfig::new("leelaz").with_visit_limit(1600);
    let mut harness = CoreHarness::with_config(config, Interest::all());
    harness.boot(true, false, false);
    harness.settle();
    let (_, continuation) = recorder();

    harness.core.peek_value("D4", continuation);

    assert!(
        harness
            .commands()
            .contains(&String::from("lz-setoption name visits value 1600"))
    );
}

#[rstest]
fn incompatible_weights_is_reported(mut booted: CoreHarness) {
    booted.stderr("Weights file is the wrong version.");

    assert!(matches!(
        booted.effects.as_slice(),
        [Effect::Failure(ProcessFailure::IncompatibleWeights)]
    ));
}

#[rstest]
fn write_failure_is_reported() {
    let config = EngineConfig::new("leelaz").with_wait_for_startup(false);
    let mut core = EngineCore::new(Box::new(FailingWriter), config, Interest::all(), true);

    let effects = core.start();

    assert!(matches!(
        effects.first(),
        Some(Effect::Failure(ProcessFailure::StreamError { stream: "stdin", .. }))
    ));
}
