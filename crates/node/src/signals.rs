//! Termination-class signal handling.
//!
//! Rust's signal delivery model has no safe in-process "restore previous
//! handler and re-raise to self" primitive, so signals are converted to a
//! notification channel instead: each registered signal feeds a single
//! channel, and a dedicated task performs the DELAYED-flush hook before
//! driving the same shutdown sequence a scope-exit stop would.

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

/// The termination-class signals the coordinator honors, with their
/// conventional numbers for the `128 + n` exit code.
const TERMINATION_SIGNALS: &[(SignalKind, i32)] = &[
    (SignalKind::interrupt(), 2),
    (SignalKind::terminate(), 15),
    (SignalKind::quit(), 3),
    // SIGABRT, SIGHUP, SIGTSTP, and SIGPWR lack `const fn` constructors in
    // `tokio::signal::unix::SignalKind`, so they're registered individually
    // in `watch_termination_signals` instead of this table.
];

/// Spawns one listener task per termination-class signal, all feeding a
/// single channel. The receiver yields the conventional `128 + signal`
/// exit code for whichever signal arrived first.
pub fn watch_termination_signals() -> mpsc::Receiver<i32> {
    let (tx, rx) = mpsc::channel(1);

    for &(kind, number) in TERMINATION_SIGNALS {
        spawn_listener(kind, number, tx.clone());
    }
    for (kind, number) in [
        (SignalKind::from_raw(6), 6),   // SIGABRT
        (SignalKind::from_raw(1), 1),   // SIGHUP
        (SignalKind::from_raw(20), 20), // SIGTSTP
        (SignalKind::from_raw(30), 30), // SIGPWR
    ] {
        spawn_listener(kind, number, tx.clone());
    }

    rx
}

fn spawn_listener(kind: SignalKind, number: i32, tx: mpsc::Sender<i32>) {
    tokio::spawn(async move {
        let mut stream = match signal(kind) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(signal = number, error = %err, "failed to register signal handler");
                return;
            }
        };
        if stream.recv().await.is_some() {
            tracing::info!(signal = number, "received termination signal");
            let _ = tx.send(128 + number).await;
        }
    });
}
