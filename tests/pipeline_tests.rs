//! Integration tests for the assembled motion pipeline
//!
//! Every test starts a full [`MotionSystem`] on a paused tokio clock, so the
//! per-axis timers advance only as fast as the test waits.

use std::sync::Arc;
use std::time::Duration;

use stepper_servo_ctl::hal::{MockDisplay, MockPwm, MockTransport, RecordingDriver};
use stepper_servo_ctl::{
    AxisId, CoordinatorConfig, MenuTarget, MotionConfig, MotionSystem, StepperConfig,
};

struct Bench {
    system: MotionSystem<RecordingDriver>,
    transport: Arc<MockTransport>,
    probes: Vec<RecordingDriver>,
    display: MockDisplay,
}

fn bench(config: MotionConfig, axes: usize) -> Bench {
    let probes: Vec<_> = (0..axes).map(|_| RecordingDriver::new()).collect();
    let transport = Arc::new(MockTransport::new());
    let display = MockDisplay::new();
    let system = MotionSystem::start(
        &config,
        probes.clone(),
        MockPwm::new(1000),
        display.clone(),
        transport.clone(),
    )
    .unwrap();
    Bench {
        system,
        transport,
        probes,
        display,
    }
}

/// Waits (in virtual time) until `line` has been sent, then returns
/// everything sent so far.
async fn wait_for_line(transport: &MockTransport, line: &str) -> Vec<String> {
    for _ in 0..100_000 {
        let lines = transport.lines();
        if lines.iter().any(|l| l == line) {
            return transport.take_lines();
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("{line:?} never sent, got {:?}", transport.lines());
}

/// Gives every task a chance to run without advancing far.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

// ============================================================================
// Serial Frames
// ============================================================================

#[tokio::test(start_paused = true)]
async fn relative_move_runs_to_completion() {
    let bench = bench(MotionConfig::default(), 2);

    bench.system.sender().deliver_line(":S0D1A090\r\n").await.unwrap();
    let lines = wait_for_line(&bench.transport, "SCT:END").await;

    assert_eq!(lines, ["SCT:BGN", "SCT:END"]);
    assert_eq!(bench.probes[0].step_count(), 1024);
    assert_eq!(bench.probes[1].step_count(), 0);
    assert_eq!(bench.system.view().pending_angle(AxisId(0)), Some(0));
}

#[tokio::test(start_paused = true)]
async fn malformed_frame_is_echoed_once() {
    let bench = bench(MotionConfig::default(), 2);

    bench.system.sender().deliver_line("XYZ").await.unwrap();
    settle().await;

    assert_eq!(bench.transport.take_lines(), ["XYZ - error"]);
}

#[tokio::test(start_paused = true)]
async fn unknown_axis_reports_single_diagnostic() {
    let bench = bench(MotionConfig::default(), 2);

    bench.system.sender().deliver_line(":S9D1A010").await.unwrap();
    settle().await;

    assert_eq!(bench.transport.take_lines(), ["AST:ERR:STPID"]);
    assert!(bench.probes.iter().all(|p| p.step_count() == 0));
}

#[tokio::test(start_paused = true)]
async fn every_field_error_is_reported_in_bit_order() {
    let bench = bench(MotionConfig::default(), 2);

    bench.system.sender().deliver_line(":S9D7A-5").await.unwrap();
    settle().await;

    assert_eq!(
        bench.transport.take_lines(),
        ["AST:ERR:STPID", "AST:ERR:STPDIR", "AST:ERR:STPANG"]
    );
}

#[tokio::test(start_paused = true)]
async fn joint_move_ends_after_slowest_axis() {
    let bench = bench(MotionConfig::default(), 2);

    bench
        .system
        .sender()
        .deliver_line(":S0D1A045S1D0A090")
        .await
        .unwrap();
    let lines = wait_for_line(&bench.transport, "SCT:END").await;

    assert_eq!(lines, ["SCT:BGN", "SCT:END"]);
    assert_eq!(bench.probes[0].step_count(), 512);
    assert_eq!(bench.probes[1].step_count(), 1024);
}

#[tokio::test(start_paused = true)]
async fn commands_are_processed_in_arrival_order() {
    let bench = bench(MotionConfig::default(), 2);
    let sender = bench.system.sender();

    sender.deliver_line(":S0D1A010").await.unwrap();
    sender.deliver_line(":S0V5").await.unwrap();
    sender.deliver_line(":X300").await.unwrap();
    sender.deliver_line(":S1D0A010").await.unwrap();

    let mut lines: Vec<String> = Vec::new();
    while lines.iter().filter(|l| l.as_str() == "SCT:END").count() < 2 {
        tokio::time::sleep(Duration::from_millis(1)).await;
        lines.extend(bench.transport.take_lines());
    }

    assert_eq!(
        lines,
        ["SCT:BGN", "SCT:END", "AST:ERR:SRVANG", "SCT:BGN", "SCT:END"]
    );
    assert_eq!(bench.system.stepper().period_ms(AxisId(0)), Ok(5));
    assert_eq!(bench.system.view().servo_angle(), 180);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_speed_is_rejected() {
    let config = MotionConfig::default()
        .with_stepper(StepperConfig::default().with_period_range(2, 20));
    let bench = bench(config, 1);

    bench.system.sender().deliver_line(":S0V1").await.unwrap();
    settle().await;

    assert_eq!(bench.transport.take_lines(), ["AST:ERR:STPVEL"]);
    assert_eq!(bench.system.stepper().period_ms(AxisId(0)), Ok(2));
}

// ============================================================================
// Encoder
// ============================================================================

#[tokio::test(start_paused = true)]
async fn encoder_detent_moves_selected_axis() {
    let bench = bench(MotionConfig::default(), 2);
    let encoder = bench.system.encoder();

    encoder.button_edge();
    let menu = wait_for_line(&bench.transport, "MNU:STP1").await;
    assert_eq!(menu, ["MNU:STP1"]);
    assert_eq!(bench.system.view().selection(), MenuTarget::Stepper(AxisId(1)));

    encoder.rotation_edge(true);
    let lines = wait_for_line(&bench.transport, "SCT:END").await;

    assert_eq!(lines, ["SCT:BGN", "SCT:END"]);
    assert_eq!(bench.probes[0].step_count(), 0);
    assert_eq!(bench.probes[1].step_count(), 170);
}

#[tokio::test(start_paused = true)]
async fn encoder_detent_nudges_servo() {
    let bench = bench(MotionConfig::default(), 2);
    let encoder = bench.system.encoder();

    encoder.button_edge();
    encoder.button_edge();
    wait_for_line(&bench.transport, "MNU:SRV").await;
    assert_eq!(bench.system.view().servo_angle(), 90);

    encoder.rotation_edge(false);
    settle().await;
    assert_eq!(bench.system.view().servo_angle(), 80);

    encoder.rotation_edge(false);
    settle().await;
    assert_eq!(bench.system.view().servo_angle(), 70);
}

#[tokio::test(start_paused = true)]
async fn back_to_back_servo_detents_all_count() {
    let bench = bench(MotionConfig::default(), 2);
    let encoder = bench.system.encoder();

    encoder.button_edge();
    encoder.button_edge();
    wait_for_line(&bench.transport, "MNU:SRV").await;

    for _ in 0..3 {
        encoder.rotation_edge(false);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(bench.system.view().servo_angle(), 60);
    assert!(bench.transport.take_lines().is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_move_completion_never_ends_the_next_move_early() {
    let config = MotionConfig::default().with_coordinator(
        CoordinatorConfig::default().with_completion_timeout_ms(Some(30)),
    );
    let bench = bench(config, 1);
    let sender = bench.system.sender();

    sender.deliver_line(":S0D1A002").await.unwrap();
    wait_for_line(&bench.transport, "AST:ERR:STPTMO").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(bench.probes[0].step_count(), 22);

    sender.deliver_line(":S0D1A001").await.unwrap();
    let lines = wait_for_line(&bench.transport, "SCT:END").await;

    assert_eq!(lines, ["SCT:BGN", "SCT:END"]);
    assert_eq!(bench.probes[0].step_count(), 33);
    assert_eq!(bench.system.stepper().pending_steps(AxisId(0)), Ok(0));
}

#[tokio::test(start_paused = true)]
async fn menu_wraps_back_to_first_axis() {
    let bench = bench(MotionConfig::default(), 1);
    let encoder = bench.system.encoder();

    encoder.button_edge();
    encoder.button_edge();
    wait_for_line(&bench.transport, "MNU:STP0").await;

    assert_eq!(bench.system.view().selection(), MenuTarget::Stepper(AxisId(0)));
}

// ============================================================================
// Display
// ============================================================================

#[tokio::test(start_paused = true)]
async fn display_renders_on_start_and_menu_change() {
    let bench = bench(MotionConfig::default(), 2);
    settle().await;
    assert_eq!(bench.display.render_count(), 1);

    bench.system.encoder().button_edge();
    wait_for_line(&bench.transport, "MNU:STP1").await;
    settle().await;

    let last = bench.display.last().unwrap();
    assert_eq!(bench.display.render_count(), 2);
    assert_eq!(last.selection, MenuTarget::Stepper(AxisId(1)));
    assert_eq!(last.servo_angle, 90);
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn start_requires_at_least_one_axis() {
    let result = MotionSystem::<RecordingDriver>::start(
        &MotionConfig::default(),
        Vec::new(),
        MockPwm::new(1000),
        MockDisplay::new(),
        Arc::new(MockTransport::new()),
    );
    assert!(result.is_err());
}
