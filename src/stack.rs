//! # Transparent TCP connection
//!
//! After joining a network, [Adapter::open] connects to a TCP server and switches the modem into
//! transparent transmission mode. From then on every byte written to the transport is forwarded
//! to the server and vice versa, the modem no longer interprets commands.
//!
//! [Adapter::close] leaves transparent mode by the `+++` escape sequence and closes the
//! connection. The escape sequence is only recognized if it is surrounded by quiet periods and
//! the characters are spaced closely enough, see [Timing](crate::timing::Timing).
//!
//! ## Example
//!
//! ````
//! # use esp_at_passthrough::diagnostics::NoDiagnostics;
//! # use esp_at_passthrough::example::{ExamplePin, ExampleSerial, ExampleTimer};
//! # use esp_at_passthrough::transport::Transport;
//! # use esp_at_passthrough::wifi::{Adapter, State};
//! # use fugit::ExtU32;
//! #
//! let mut adapter: Adapter<_, _, _, _, 1_000, 128> = Adapter::new(
//!     ExampleSerial::default(),
//!     ExamplePin::default(),
//!     ExampleTimer::default(),
//!     NoDiagnostics,
//! );
//! adapter.connect("test_wifi", "secret").unwrap();
//!
//! // Opening the tunnel
//! adapter.open("10.0.0.1", 21).unwrap();
//! assert_eq!(State::Streaming, adapter.state());
//!
//! // Raw data is forwarded to the server
//! adapter.transport().write_raw(b"hallo!").unwrap();
//!
//! // Leaving transparent mode and closing the connection
//! assert!(adapter.close(5.millis()));
//! ````
use crate::commands::{self, CLOSE, ESCAPE_CHAR, ESCAPE_LENGTH, OK, PASSTHROUGH_MODE, START_SEND};
use crate::diagnostics::{DiagnosticSink, Event};
use crate::timing::pause;
use crate::transport::Transport;
use crate::wifi::{Adapter, Error, State, Step};
use embedded_hal::digital::OutputPin;
use fugit::TimerDurationU32;
use fugit_timer::Timer;

impl<
        T: Transport,
        P: OutputPin,
        C: Timer<TIMER_HZ>,
        D: DiagnosticSink<TIMER_HZ>,
        const TIMER_HZ: u32,
        const LINE_SIZE: usize,
    > Adapter<T, P, C, D, TIMER_HZ, LINE_SIZE>
{
    /// Opens a TCP connection to the given remote and enables transparent transmission
    ///
    /// Each call runs the full command sequence, independent of previous calls.
    pub fn open(&mut self, address: &str, port: u16) -> Result<(), Error> {
        let connect_command = commands::tcp_connect(address, port)?;
        let timeout_ms = self.timing.command_timeout_ms;

        self.run_step(Step {
            state: State::TcpOpening,
            command: connect_command.as_str(),
            timeout_ms,
            error: Error::ConnectError,
        })?;
        self.run_step(Step {
            state: State::PassthroughEnabling,
            command: PASSTHROUGH_MODE,
            timeout_ms,
            error: Error::PassthroughModeError,
        })?;
        self.run_step(Step {
            state: State::SendEnabling,
            command: START_SEND,
            timeout_ms,
            error: Error::SendEnableError,
        })?;

        self.state = State::Streaming;
        Ok(())
    }

    /// Leaves transparent mode and closes the TCP connection
    ///
    /// `inter_char_delay` is waited after each escape character. 5 ms turned out to be reliable
    /// (see [DEFAULT_ESCAPE_CHAR_DELAY_MS](crate::timing::DEFAULT_ESCAPE_CHAR_DELAY_MS)).
    ///
    /// Returns true if the close command was acknowledged in time.
    pub fn close(&mut self, inter_char_delay: TimerDurationU32<TIMER_HZ>) -> bool {
        self.state = State::EscapeWait;
        pause(&mut self.timer, TimerDurationU32::millis(self.timing.escape_guard_before_ms));

        self.state = State::Escaping;
        self.send_escape_sequence(inter_char_delay);
        pause(&mut self.timer, TimerDurationU32::millis(self.timing.escape_guard_after_ms));

        self.state = State::Closing;
        let timeout = TimerDurationU32::millis(self.timing.close_timeout_ms);
        if !self.send_command(CLOSE, OK, timeout) {
            warn!("Close command was not acknowledged");
            return false;
        }

        self.state = State::Idle;
        true
    }

    /// Writes the escape characters one by one
    fn send_escape_sequence(&mut self, inter_char_delay: TimerDurationU32<TIMER_HZ>) {
        for _ in 0..ESCAPE_LENGTH {
            if self.transport.write_raw(&[ESCAPE_CHAR]).is_err() {
                warn!("Failed to write escape character");
            }

            let now = self.timer.now();
            self.diagnostics.record(now, Event::Escape);

            pause(&mut self.timer, inter_char_delay);
        }
    }
}
