use input_linux::{sys::input_event, EventTime, InputEvent, KeyEvent, KeyState, SynchronizeEvent};
use std::{
    io, slice, thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, trace};

use crate::config::{Button, ClickRequest, Termination};
use crate::device::EventSink;
use crate::error::{EmitError, EmitKind};

/// Where a single click cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickPhase {
    Idle,
    Pressed,
    Held,
    Released,
    Done,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub cycles: u64,
    pub elapsed: Duration,
}

/// Emits a press or release of `button` followed by a `SYN_REPORT`.
///
/// Each event is written on its own so a failure names the event that was
/// lost. Both failures are fatal.
pub fn send_event<S: EventSink + ?Sized>(
    sink: &mut S,
    button: Button,
    pressed: bool,
) -> Result<(), EmitError> {
    let time = event_time_now();
    let (state, value) = if pressed {
        (KeyState::PRESSED, 1)
    } else {
        (KeyState::RELEASED, 0)
    };

    let key = InputEvent::from(KeyEvent::new(time, button.key(), state));
    write_one(sink, key.as_raw()).map_err(|source| EmitError {
        kind: EmitKind::Key,
        button,
        value,
        source,
    })?;
    debug!(
        code = button.code(),
        "{}",
        if pressed { "Press" } else { "Release" }
    );

    let sync = InputEvent::from(SynchronizeEvent::report(time));
    write_one(sink, sync.as_raw()).map_err(|source| EmitError {
        kind: EmitKind::Sync,
        button,
        value,
        source,
    })
}

fn write_one<S: EventSink + ?Sized>(sink: &mut S, event: &input_event) -> io::Result<()> {
    match sink.write(slice::from_ref(event))? {
        0 => Err(io::Error::new(
            io::ErrorKind::WriteZero,
            "device accepted no events",
        )),
        _ => Ok(()),
    }
}

fn event_time_now() -> EventTime {
    // the kernel restamps uinput events, a clock before the epoch is harmless
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    EventTime::new(now.as_secs() as _, now.subsec_micros() as _)
}

struct Clicker<'a, S: EventSink + ?Sized> {
    sink: &'a mut S,
    request: &'a ClickRequest,
    phase: ClickPhase,
    cycles: u64,
}

impl<'a, S: EventSink + ?Sized> Clicker<'a, S> {
    fn new(sink: &'a mut S, request: &'a ClickRequest) -> Self {
        Self {
            sink,
            request,
            phase: ClickPhase::Idle,
            cycles: 0,
        }
    }

    fn transition(&mut self, next: ClickPhase) {
        trace!(from = ?self.phase, to = ?next, cycle = self.cycles, "click phase");
        self.phase = next;
    }

    /// Press, hold, release.
    fn click(&mut self) -> Result<(), EmitError> {
        let button = self.request.button;

        send_event(&mut *self.sink, button, true)?;
        self.transition(ClickPhase::Pressed);

        thread::sleep(self.request.hold);
        self.transition(ClickPhase::Held);

        send_event(&mut *self.sink, button, false)?;
        self.transition(ClickPhase::Released);

        self.cycles += 1;
        Ok(())
    }

    fn wait(&mut self) {
        thread::sleep(self.request.click_speed);
        self.transition(ClickPhase::Idle);
    }

    fn finish(&mut self) {
        self.transition(ClickPhase::Done);
    }
}

/// Runs the click loop described by `request` against `sink`.
///
/// In count mode exactly `n` clicks are sent with the click speed delay only
/// between them. In timed mode the budget is checked after each full cycle,
/// so the run overshoots it by at most one hold plus one delay, and always
/// performs at least one click.
pub fn run<S: EventSink + ?Sized>(
    sink: &mut S,
    request: &ClickRequest,
) -> Result<RunReport, EmitError> {
    let start = Instant::now();
    let mut clicker = Clicker::new(sink, request);

    match request.termination {
        Termination::Count(count) => {
            let count = u64::from(count.get());
            debug!(
                count,
                hold_ms = request.hold.as_millis() as u64,
                speed_ms = request.click_speed.as_millis() as u64,
                "counted clicks"
            );
            for i in 0..count {
                clicker.click()?;
                if i + 1 < count {
                    clicker.wait();
                }
            }
        }
        Termination::Timed(budget) => {
            debug!(
                time_ms = budget.as_millis() as u64,
                hold_ms = request.hold.as_millis() as u64,
                speed_ms = request.click_speed.as_millis() as u64,
                max_overshoot_ms = request.cycle().as_millis() as u64,
                "timed clicks"
            );
            loop {
                clicker.click()?;
                clicker.wait();
                if start.elapsed() >= budget {
                    break;
                }
            }
        }
    }

    clicker.finish();
    let report = RunReport {
        cycles: clicker.cycles,
        elapsed: start.elapsed(),
    };
    debug!(cycles = report.cycles, elapsed = ?report.elapsed, "run finished");
    Ok(report)
}
