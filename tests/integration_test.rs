use clap::Parser;
use input_linux::sys::{input_event, EV_KEY, EV_SYN};
use mclick::config::{parse_duration, DEFAULT_CLICK_SPEED_MS};
use mclick::{
    driver, Args, Button, ClickConfig, ClickError, ClickRequest, DeviceStage, EmitKind,
    EventSink, Invocation, Preset, Termination,
};
use std::io::{self, Write};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Sleep granularity slack for upper timing bounds.
const SLACK: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recorded {
    Press(u16),
    Release(u16),
    Sync,
}

#[derive(Default)]
struct RecordingSink {
    events: Vec<(Instant, Recorded)>,
}

impl RecordingSink {
    fn kinds(&self) -> Vec<Recorded> {
        self.events.iter().map(|(_, kind)| *kind).collect()
    }

    fn count(&self, wanted: fn(&Recorded) -> bool) -> usize {
        self.events.iter().filter(|(_, kind)| wanted(kind)).count()
    }
}

impl EventSink for RecordingSink {
    fn write(&mut self, events: &[input_event]) -> io::Result<usize> {
        for event in events {
            let kind = if event.type_ == EV_KEY as u16 {
                match event.value {
                    1 => Recorded::Press(event.code),
                    0 => Recorded::Release(event.code),
                    v => panic!("unexpected key value {v}"),
                }
            } else if event.type_ == EV_SYN as u16 {
                Recorded::Sync
            } else {
                panic!("unexpected event type {}", event.type_);
            };
            self.events.push((Instant::now(), kind));
        }
        Ok(events.len())
    }
}

/// Fails the n-th write (0 based) and records nothing after it.
struct FailingSink {
    fail_at: usize,
    writes: usize,
}

impl EventSink for FailingSink {
    fn write(&mut self, events: &[input_event]) -> io::Result<usize> {
        let n = self.writes;
        self.writes += 1;
        if n == self.fail_at {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device gone"));
        }
        Ok(events.len())
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn counted(button: Button, count: u32, hold: u64, speed: u64) -> ClickRequest {
    ClickRequest::counted(button, NonZeroU32::new(count).unwrap(), ms(hold), ms(speed))
}

#[test]
fn test_three_left_clicks() {
    let request = counted(Button::Left, 3, 50, 100);
    let mut sink = RecordingSink::default();

    let report = driver::run(&mut sink, &request).unwrap();

    let left = Button::Left.code();
    let cycle = [
        Recorded::Press(left),
        Recorded::Sync,
        Recorded::Release(left),
        Recorded::Sync,
    ];
    let expected: Vec<Recorded> = cycle.iter().copied().cycle().take(12).collect();
    assert_eq!(sink.kinds(), expected);
    assert_eq!(report.cycles, 3);

    // 3 holds + 2 gaps
    assert!(report.elapsed >= ms(350), "elapsed {:?}", report.elapsed);
    assert!(report.elapsed < ms(350) + SLACK, "elapsed {:?}", report.elapsed);
}

#[test]
fn test_hold_and_gap_timing() {
    let request = counted(Button::Right, 2, 40, 80);
    let mut sink = RecordingSink::default();
    driver::run(&mut sink, &request).unwrap();

    let right = Button::Right.code();
    let at = |wanted: Recorded, nth: usize| {
        sink.events
            .iter()
            .filter(|(_, kind)| *kind == wanted)
            .nth(nth)
            .map(|(t, _)| *t)
            .unwrap()
    };

    let first_press = at(Recorded::Press(right), 0);
    let first_release = at(Recorded::Release(right), 0);
    let second_press = at(Recorded::Press(right), 1);

    assert!(first_release - first_press >= ms(40));
    assert!(second_press - first_release >= ms(80));
}

#[test]
fn test_presses_and_releases_alternate() {
    let request = counted(Button::Left, 5, 2, 2);
    let mut sink = RecordingSink::default();
    driver::run(&mut sink, &request).unwrap();

    assert_eq!(sink.count(|k| matches!(k, Recorded::Press(_))), 5);
    assert_eq!(sink.count(|k| matches!(k, Recorded::Release(_))), 5);
    assert_eq!(sink.count(|k| matches!(k, Recorded::Sync)), 10);

    let mut held = false;
    for kind in sink.kinds() {
        match kind {
            Recorded::Press(_) => {
                assert!(!held, "press before the previous release");
                held = true;
            }
            Recorded::Release(_) => {
                assert!(held, "release without a press");
                held = false;
            }
            Recorded::Sync => {}
        }
    }
    assert!(!held);
}

#[test]
fn test_repeated_runs_have_same_shape() {
    let request = counted(Button::Right, 3, 1, 1);

    let mut first = RecordingSink::default();
    let mut second = RecordingSink::default();
    driver::run(&mut first, &request).unwrap();
    driver::run(&mut second, &request).unwrap();

    assert_eq!(first.kinds(), second.kinds());
}

#[test]
fn test_timed_run_stays_within_one_cycle_of_budget() {
    let budget = ms(120);
    let request = ClickRequest::timed(Button::Left, budget, ms(20), ms(20));
    let mut sink = RecordingSink::default();

    let report = driver::run(&mut sink, &request).unwrap();

    assert!(report.elapsed >= budget, "elapsed {:?}", report.elapsed);
    assert!(
        report.elapsed < budget + request.cycle() + SLACK,
        "elapsed {:?}",
        report.elapsed
    );
    assert!(report.cycles >= 2);
    assert_eq!(
        sink.count(|k| matches!(k, Recorded::Press(_))) as u64,
        report.cycles
    );
}

#[test]
fn test_timed_run_always_clicks_once() {
    let request = ClickRequest::timed(Button::Left, ms(5), ms(20), ms(20));
    let mut sink = RecordingSink::default();

    let report = driver::run(&mut sink, &request).unwrap();

    assert_eq!(report.cycles, 1);
    assert_eq!(sink.events.len(), 4);
    assert!(report.elapsed >= ms(40));
}

#[test]
fn test_failed_key_event_aborts() {
    let request = counted(Button::Left, 3, 1, 1);
    let mut sink = FailingSink {
        fail_at: 2,
        writes: 0,
    };

    let err = driver::run(&mut sink, &request).unwrap_err();

    // writes: press, sync, release <- fails
    assert_eq!(err.kind, EmitKind::Key);
    assert_eq!(err.value, 0);
    assert_eq!(err.button, Button::Left);
    assert_eq!(sink.writes, 3);
}

#[test]
fn test_failed_sync_event_aborts() {
    let request = counted(Button::Right, 3, 1, 1);
    let mut sink = FailingSink {
        fail_at: 1,
        writes: 0,
    };

    let err = driver::run(&mut sink, &request).unwrap_err();

    assert_eq!(err.kind, EmitKind::Sync);
    assert_eq!(err.value, 1);
    assert_eq!(sink.writes, 2);
}

#[test]
fn test_missing_device_fails_before_clicking() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClickConfig {
        request: counted(Button::Left, 1, 1, 1),
        debug: false,
        device_path: dir.path().join("no-uinput"),
    };

    let err = mclick::run(&config).unwrap_err();

    match &err {
        ClickError::Device(device) => assert_eq!(device.stage, DeviceStage::Open),
        other => panic!("expected a device error, got {other:?}"),
    }
    assert_ne!(err.exit_code(), 0);
}

#[test]
fn test_invalid_durations_rejected() {
    for bad in ["0", "-5", "fast", "10x"] {
        assert!(parse_duration(bad).is_err(), "{bad} accepted");
    }
}

#[test]
fn test_invalid_duration_is_rejected_before_the_device() {
    let dir = tempfile::tempdir().unwrap();
    let device = dir.path().join("no-uinput");
    let device = device.to_str().unwrap();

    let args = match mclick::normalize_args(["mclick", "l", "-t", "0", "--device", device]) {
        Invocation::Run(args) => Args::try_parse_from(args).unwrap(),
        Invocation::Usage => panic!("expected a run"),
    };

    let err = ClickError::from(args.load_from_config_or_default().unwrap_err());
    assert!(matches!(err, ClickError::Argument(_)));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_preset_file_operations() -> TestResult {
    let file = NamedTempFile::new()?;

    let preset = Preset {
        button: Some(Button::Right),
        count: Some(4),
        hold_ms: Some(30),
        click_speed_ms: None,
        time_ms: None,
    };
    preset.save_to_file(file.path())?;

    let loaded = Preset::load_from_file(file.path())?;
    assert_eq!(loaded, preset);

    let request = loaded.to_request()?;
    assert_eq!(request.button, Button::Right);
    assert_eq!(request.hold, ms(30));
    assert_eq!(request.click_speed, ms(DEFAULT_CLICK_SPEED_MS));
    assert_eq!(
        request.termination,
        Termination::Count(NonZeroU32::new(4).unwrap())
    );
    Ok(())
}

#[test]
fn test_command_line_overrides_preset() -> TestResult {
    let file = NamedTempFile::new()?;
    std::fs::write(
        file.path(),
        r#"{ "button": "left", "count": 10, "hold_ms": 200 }"#,
    )?;
    let path = file.path().to_str().unwrap();

    let args = Args::try_parse_from(["mclick", "r", "--config", path, "-h", "15"])?;
    let config = args.load_from_config_or_default()?;

    assert_eq!(config.request.button, Button::Right);
    assert_eq!(config.request.hold, ms(15));
    assert_eq!(
        config.request.termination,
        Termination::Count(NonZeroU32::new(10).unwrap())
    );
    Ok(())
}

#[test]
fn test_command_line_count_beats_preset_time() -> TestResult {
    let file = NamedTempFile::new()?;
    std::fs::write(file.path(), r#"{ "button": "left", "time_ms": 5000 }"#)?;
    let path = file.path().to_str().unwrap();

    let args = Args::try_parse_from(["mclick", "l", "3", "--config", path])?;
    let config = args.load_from_config_or_default()?;
    assert_eq!(
        config.request.termination,
        Termination::Count(NonZeroU32::new(3).unwrap())
    );

    // both given on the command line: time still wins
    let args = Args::try_parse_from(["mclick", "l", "3", "--config", path, "-t", "1s"])?;
    let config = args.load_from_config_or_default()?;
    assert_eq!(config.request.termination, Termination::Timed(ms(1000)));

    // preset time without a command line count is kept
    let args = Args::try_parse_from(["mclick", "l", "--config", path])?;
    let config = args.load_from_config_or_default()?;
    assert_eq!(config.request.termination, Termination::Timed(ms(5000)));
    Ok(())
}

#[test]
fn test_save_config_writes_effective_settings() -> TestResult {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("preset.json");
    let out_str = out.to_str().unwrap();

    let args = Args::try_parse_from(["mclick", "l", "-t", "2s", "--save-config", out_str])?;
    args.load_from_config_or_default()?;
    assert!(!out.exists(), "preset written before the run");

    args.save_config_if_requested()?;

    let saved = Preset::load_from_file(&out)?;
    assert_eq!(saved.button, Some(Button::Left));
    assert_eq!(saved.time_ms, Some(2000));
    Ok(())
}

#[test]
fn test_broken_preset_is_an_argument_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    let err = Preset::load_from_file(file.path()).unwrap_err();
    assert!(err.to_string().starts_with("preset '"));
}
