//! # Diagnostics
//!
//! Every transmitted command and every received line is handed to a [DiagnosticSink] together
//! with the timer instant it happened at. Sinks have no influence on the protocol.
use fugit::TimerInstantU32;

/// Observable protocol event
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event<'a> {
    /// Command sent to the modem
    Transmitted(&'a str),
    /// Non-empty line received from the modem
    Received(&'a str),
    /// Single character of the escape sequence sent
    Escape,
}

/// Receiver of protocol events
pub trait DiagnosticSink<const TIMER_HZ: u32> {
    fn record(&mut self, at: TimerInstantU32<TIMER_HZ>, event: Event<'_>);
}

/// Drops all events
#[derive(Copy, Clone, Debug, Default)]
pub struct NoDiagnostics;

impl<const TIMER_HZ: u32> DiagnosticSink<TIMER_HZ> for NoDiagnostics {
    fn record(&mut self, _at: TimerInstantU32<TIMER_HZ>, _event: Event<'_>) {}
}

/// Forwards events to the debug log (`log` or `defmt` feature)
#[derive(Copy, Clone, Debug, Default)]
pub struct LogSink;

impl<const TIMER_HZ: u32> DiagnosticSink<TIMER_HZ> for LogSink {
    fn record(&mut self, at: TimerInstantU32<TIMER_HZ>, event: Event<'_>) {
        let ticks = at.ticks();
        match event {
            Event::Transmitted(command) => debug!("[{}] Tx: {}", ticks, command),
            Event::Received(line) => debug!("[{}] Rx: {}", ticks, line),
            Event::Escape => debug!("[{}] Tx: +", ticks),
        }
    }
}
