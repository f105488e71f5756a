//! # WIFI access point client
//!
//! [Adapter] owns the serial transport, the reset line and a timer of the ESP-AT modem. Joining a
//! network is done by [Adapter::connect], which resets the modem and runs the station setup
//! commands in order. Each step waits for its `OK` and the first missing acknowledgment aborts
//! the sequence. Nothing gets retried or rolled back, so the modem should be reset (e.g. by
//! calling `connect()` again) after any error.
//!
//! ## Example
//!
//! ````
//! # use esp_at_passthrough::diagnostics::NoDiagnostics;
//! # use esp_at_passthrough::example::{ExamplePin, ExampleSerial, ExampleTimer};
//! # use esp_at_passthrough::wifi::{Adapter, State};
//! #
//! let mut adapter: Adapter<_, _, _, _, 1_000, 128> = Adapter::new(
//!     ExampleSerial::default(),
//!     ExamplePin::default(),
//!     ExampleTimer::default(),
//!     NoDiagnostics,
//! );
//!
//! // Resets the modem and joins the access point
//! adapter.connect("test_wifi", "secret").unwrap();
//! assert_eq!(State::Joined, adapter.state());
//!
//! // Leaving the access point again
//! adapter.disconnect();
//! ````
use crate::commands::{self, AUTO_CONNECT_OFF, DISCONNECT, ECHO_OFF, OK, STATION_MODE};
use crate::diagnostics::{DiagnosticSink, Event};
use crate::reader::LineReader;
use crate::timing::{pause, Deadline, Timing};
use crate::transport::Transport;
use embedded_hal::digital::OutputPin;
use fugit::TimerDurationU32;
use fugit_timer::Timer;

/// Errors of the connection sequences. Each variant names the step that was not acknowledged.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Disabling the command echo (ATE0) was not acknowledged. Usually the modem is not responding at all.
    GenericFailure,

    /// Setting the station mode (CWMODE) failed
    ModeError,

    /// Disabling auto connect (CWAUTOCONN) failed
    AutoconnectDisableError,

    /// Joining the access point (CWJAP) failed
    JoinError,

    /// Opening the TCP connection (CIPSTART) failed
    ConnectError,

    /// Enabling transparent transmission mode (CIPMODE) failed
    PassthroughModeError,

    /// Starting the transmission (CIPSEND) failed
    SendEnableError,

    /// Given SSID is longer then the max. size of 32 chars
    InvalidSsidLength,

    /// Given password is longer then the max. size of 63 chars
    InvalidPasswordLength,

    /// Given remote address does not fit in the command buffer
    InvalidAddressLength,
}

impl Error {
    /// Numeric outcome code. Success is represented by 0.
    pub fn code(&self) -> u8 {
        match self {
            Error::GenericFailure => 1,
            Error::ModeError => 2,
            Error::AutoconnectDisableError => 3,
            Error::JoinError => 4,
            Error::ConnectError => 5,
            Error::PassthroughModeError => 6,
            Error::SendEnableError => 7,
            Error::InvalidSsidLength => 8,
            Error::InvalidPasswordLength => 9,
            Error::InvalidAddressLength => 10,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::GenericFailure => defmt::write!(f, "Error::GenericFailure"),
            Error::ModeError => defmt::write!(f, "Error::ModeError"),
            Error::AutoconnectDisableError => defmt::write!(f, "Error::AutoconnectDisableError"),
            Error::JoinError => defmt::write!(f, "Error::JoinError"),
            Error::ConnectError => defmt::write!(f, "Error::ConnectError"),
            Error::PassthroughModeError => defmt::write!(f, "Error::PassthroughModeError"),
            Error::SendEnableError => defmt::write!(f, "Error::SendEnableError"),
            Error::InvalidSsidLength => defmt::write!(f, "Error::InvalidSsidLength"),
            Error::InvalidPasswordLength => defmt::write!(f, "Error::InvalidPasswordLength"),
            Error::InvalidAddressLength => defmt::write!(f, "Error::InvalidAddressLength"),
        }
    }
}

/// Protocol step the adapter is in or failed at. Informational only.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Resetting,
    EchoOff,
    StationMode,
    AutoconnectOff,
    Joining,
    Joined,
    TcpOpening,
    PassthroughEnabling,
    SendEnabling,
    /// Transparent transmission is active, the transport is a raw byte pipe
    Streaming,
    EscapeWait,
    Escaping,
    Closing,
}

/// Single command of a connection sequence
pub(crate) struct Step<'a> {
    /// State while the command is pending
    pub(crate) state: State,

    /// Command text without terminator
    pub(crate) command: &'a str,

    /// Acknowledgment timeout in ms
    pub(crate) timeout_ms: u32,

    /// Returned if the command is not acknowledged
    pub(crate) error: Error,
}

/// Central client for the passthrough connection
///
/// TIMER_HZ: Tick rate of the timer
///
/// LINE_SIZE: Size of the buffer for received lines. Longer lines get split.
pub struct Adapter<
    T: Transport,
    P: OutputPin,
    C: Timer<TIMER_HZ>,
    D: DiagnosticSink<TIMER_HZ>,
    const TIMER_HZ: u32,
    const LINE_SIZE: usize,
> {
    /// Serial connection to the modem
    pub(crate) transport: T,

    /// Hardware reset line, active low
    pub(crate) reset_pin: P,

    /// Timer used for timeout measurement and delays
    pub(crate) timer: C,

    /// Receiver of transmitted and received lines
    pub(crate) diagnostics: D,

    /// Line capture state
    pub(crate) reader: LineReader<LINE_SIZE>,

    /// Tuned timing values
    pub(crate) timing: Timing,

    /// Current protocol step
    pub(crate) state: State,
}

impl<
        T: Transport,
        P: OutputPin,
        C: Timer<TIMER_HZ>,
        D: DiagnosticSink<TIMER_HZ>,
        const TIMER_HZ: u32,
        const LINE_SIZE: usize,
    > Adapter<T, P, C, D, TIMER_HZ, LINE_SIZE>
{
    /// Creates an idle adapter using the default [Timing]
    pub fn new(transport: T, reset_pin: P, timer: C, diagnostics: D) -> Self {
        Self {
            transport,
            reset_pin,
            timer,
            diagnostics,
            reader: LineReader::new(),
            timing: Timing::default(),
            state: State::Idle,
        }
    }

    /// Resets the modem and joins the given access point
    ///
    /// Returns the error of the first step not acknowledged in time. Following steps are skipped.
    pub fn connect(&mut self, ssid: &str, password: &str) -> Result<(), Error> {
        let join_command = commands::access_point_connect(ssid, password)?;
        let command_timeout_ms = self.timing.command_timeout_ms;

        self.reset();
        self.empty(TimerDurationU32::millis(self.timing.drain_ms));

        self.run_step(Step {
            state: State::EchoOff,
            command: ECHO_OFF,
            timeout_ms: command_timeout_ms,
            error: Error::GenericFailure,
        })?;
        self.run_step(Step {
            state: State::StationMode,
            command: STATION_MODE,
            timeout_ms: command_timeout_ms,
            error: Error::ModeError,
        })?;
        self.run_step(Step {
            state: State::AutoconnectOff,
            command: AUTO_CONNECT_OFF,
            timeout_ms: command_timeout_ms,
            error: Error::AutoconnectDisableError,
        })?;
        self.run_step(Step {
            state: State::Joining,
            command: join_command.as_str(),
            timeout_ms: self.timing.join_timeout_ms,
            error: Error::JoinError,
        })?;

        self.state = State::Joined;
        Ok(())
    }

    /// Leaves the current access point
    ///
    /// Best effort, a missing acknowledgment is just logged.
    pub fn disconnect(&mut self) {
        let timeout = TimerDurationU32::millis(self.timing.disconnect_timeout_ms);
        if !self.send_command(DISCONNECT, OK, timeout) {
            warn!("Disconnect from access point was not acknowledged");
        }
    }

    /// Pulses the reset line of the modem and waits until it has recovered
    pub fn reset(&mut self) {
        self.state = State::Resetting;

        if self.reset_pin.set_low().is_err() {
            warn!("Failed to pull reset line low");
        }
        pause(&mut self.timer, TimerDurationU32::millis(self.timing.reset_low_ms));

        if self.reset_pin.set_high().is_err() {
            warn!("Failed to release reset line");
        }
        pause(&mut self.timer, TimerDurationU32::millis(self.timing.reset_recovery_ms));
    }

    /// Discards all received data for the given duration
    pub fn empty(&mut self, duration: TimerDurationU32<TIMER_HZ>) {
        self.reader.empty(&mut self.transport, &mut self.timer, duration);
    }

    /// Sends the given command and waits for a line containing `expected`
    ///
    /// Transport errors are not distinguished, they end up as missing acknowledgment.
    pub fn send_command(&mut self, command: &str, expected: &str, timeout: TimerDurationU32<TIMER_HZ>) -> bool {
        if self.transport.write_line(command).is_err() {
            warn!("Failed to write command {}", command);
        }

        let now = self.timer.now();
        self.diagnostics.record(now, Event::Transmitted(command));

        self.await_substring(expected, timeout)
    }

    /// Reads lines until one contains `expected` or the timeout expires
    ///
    /// Returns true on the first match. On false the full timeout has elapsed.
    pub fn await_substring(&mut self, expected: &str, timeout: TimerDurationU32<TIMER_HZ>) -> bool {
        let deadline = Deadline::start(&mut self.timer, timeout);
        let line_timeout = TimerDurationU32::millis(self.timing.line_timeout_ms);

        loop {
            let now = self.timer.now();
            if deadline.is_expired(now) {
                return false;
            }

            let remaining = deadline.remaining(now);
            let capture_timeout = if remaining < line_timeout { remaining } else { line_timeout };
            if self.reader.read_line(&mut self.transport, &mut self.timer, capture_timeout) == 0 {
                continue;
            }

            let now = self.timer.now();
            let line = self.reader.line();
            self.diagnostics.record(now, Event::Received(line));

            if line.contains(expected) {
                return true;
            }
        }
    }

    /// Runs a single command step followed by the settle delay
    pub(crate) fn run_step(&mut self, step: Step<'_>) -> Result<(), Error> {
        self.state = step.state;

        if !self.send_command(step.command, OK, TimerDurationU32::millis(step.timeout_ms)) {
            warn!("Command {} was not acknowledged", step.command);
            return Err(step.error);
        }

        self.settle();
        Ok(())
    }

    /// Gives the modem time to commit its internal state
    pub(crate) fn settle(&mut self) {
        pause(&mut self.timer, TimerDurationU32::millis(self.timing.settle_ms));
    }

    /// Current protocol step
    pub fn state(&self) -> State {
        self.state
    }

    /// Overrides the default timing values
    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Direct access to the transport, e.g. for sending data while streaming
    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Returns transport, reset line and timer
    pub fn release(self) -> (T, P, C) {
        (self.transport, self.reset_pin, self.timer)
    }
}
