//! Scoped elapsed-time reporting around cache activity.
//!
//! The memoization wrapper opens an instrumentation scope around a disk read
//! and around a full computation when it runs in verbose mode. The default
//! hook, [`Stopwatch`], prints one line per scope with the elapsed time in
//! the most legible unit, indenting nested scopes:
//!
//! ```text
//! Caching call to population in population._de.cache:
//! .. Serving call to shapes from file shapes._de.cache: 312.4 usec
//! 1.2 sec
//! ```
//!
//! Nesting depth and the "line still open" flag are thread-local, so
//! concurrent callers on different threads do not garble each other's
//! bookkeeping.

use std::cell::Cell;
use std::io::Write as _;
use std::time::{Duration, Instant};

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static LINE_OPEN: Cell<bool> = const { Cell::new(false) };
}

/// An instrumentation hook consumed by the memoization wrapper.
///
/// The wrapper calls [`enter`](Instrument::enter) around a successful disk
/// read and around a full computation; the returned guard ends the scope
/// when dropped.
pub trait Instrument {
    /// Opens a scope labeled `label`.
    fn enter(&self, label: String) -> Box<dyn Span>;
}

/// Guard for one open instrumentation scope.
///
/// Implementations report the scope however they like from their `Drop`.
pub trait Span {
    /// Marks the scope as failed before it closes.
    ///
    /// The wrapper calls this when a disk read that looked like a hit turns
    /// out to be unreadable and the call falls through to recomputation.
    fn fail(&mut self) {}
}

/// The default instrumentation hook: a nesting-aware stopwatch on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stopwatch;

impl Instrument for Stopwatch {
    fn enter(&self, label: String) -> Box<dyn Span> {
        Box::new(TimerSpan::open(label))
    }
}

/// One open stopwatch line.
pub struct TimerSpan {
    start: Instant,
    failed: bool,
}

impl TimerSpan {
    fn open(label: String) -> Self {
        if LINE_OPEN.get() {
            println!();
        }
        print!("{}{}: ", ".. ".repeat(DEPTH.get()), label);
        let _ = std::io::stdout().flush();

        DEPTH.set(DEPTH.get() + 1);
        LINE_OPEN.set(true);

        TimerSpan {
            start: Instant::now(),
            failed: false,
        }
    }
}

impl Span for TimerSpan {
    fn fail(&mut self) {
        self.failed = true;
    }
}

impl Drop for TimerSpan {
    fn drop(&mut self) {
        let depth = DEPTH.get().saturating_sub(1);
        DEPTH.set(depth);

        // An inner scope already closed our line; re-indent before reporting.
        if !LINE_OPEN.get() {
            print!("{}", ".. ".repeat(depth));
        }
        if self.failed || std::thread::panicking() {
            println!("failed");
        } else {
            println!("{}", legible(self.start.elapsed()));
        }
        LINE_OPEN.set(false);
    }
}

/// Formats `elapsed` in the most legible of microseconds, milliseconds and
/// seconds.
fn legible(elapsed: Duration) -> String {
    let usec = elapsed.as_secs_f64() * 1e6;
    if usec < 1_000.0 {
        format!("{usec:.1} usec")
    } else if usec < 1_000_000.0 {
        format!("{:.1} msec", usec / 1_000.0)
    } else {
        format!("{:.1} sec", usec / 1e6)
    }
}
