use crate::diagnostics::{DiagnosticSink, Event};
use crate::transport::{IoTransport, Transport};
use crate::wifi::Adapter;
use alloc::collections::VecDeque;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::convert::Infallible;
use embedded_hal::digital::{Error as PinError, ErrorKind as PinErrorKind, ErrorType as PinErrorType, OutputPin};
use embedded_io::{ErrorType, Read, ReadReady, Write};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer as FugitTimer;
use mockall::mock;

/// Tick rate of the simulated timer
pub const TIMER_HZ: u32 = 1_000;

pub type AdapterType = Adapter<IoTransport<MockSerial>, MockResetPin, MockTimer, RecordingSink, TIMER_HZ, 128>;

pub type SharedSimulation = Rc<RefCell<Simulation>>;

/// Scripted reply of the simulated modem
struct Rule {
    /// Reply gets triggered by lines containing this text
    trigger: &'static str,

    /// Reply bytes, None => modem stays silent
    reply: Option<&'static [u8]>,

    /// Delay in ticks between receiving the command and sending the reply
    delay: u32,
}

/// Simulated modem and time shared by [MockSerial] and [MockTimer]
///
/// Time only advances by querying the timer. Each `now()` call moves it forward by one tick (1 ms).
pub struct Simulation {
    /// Current tick
    now: u32,

    /// Bytes to receive, available from the given tick on
    rx: VecDeque<(u32, u8)>,

    /// Transmitted bytes of the current (incomplete) line
    tx_line: Vec<u8>,

    /// Complete transmitted lines (without terminator) with their tick
    lines: Vec<(u32, String)>,

    /// Ticks at which escape characters were written
    escapes: Vec<u32>,

    /// Reply rules, first matching rule wins
    rules: Vec<Rule>,
}

impl Simulation {
    pub fn new() -> SharedSimulation {
        Rc::new(RefCell::new(Self {
            now: 0,
            rx: VecDeque::new(),
            tx_line: vec![],
            lines: vec![],
            escapes: vec![],
            rules: vec![],
        }))
    }

    /// Creates a simulation acknowledging every command by OK after 10 ticks
    pub fn acknowledging() -> SharedSimulation {
        let simulation = Self::new();
        simulation.borrow_mut().reply("AT", b"\r\nOK\r\n", 10);
        simulation
    }

    pub fn now(&self) -> u32 {
        self.now
    }

    /// Replies to lines containing `trigger` after `delay` ticks
    pub fn reply(&mut self, trigger: &'static str, reply: &'static [u8], delay: u32) {
        self.rules.push(Rule {
            trigger,
            reply: Some(reply),
            delay,
        });
    }

    /// Never replies to lines containing `trigger`
    pub fn silence(&mut self, trigger: &'static str) {
        self.rules.push(Rule {
            trigger,
            reply: None,
            delay: 0,
        });
    }

    /// Never replies to lines containing `trigger`, taking precedence over all other rules
    pub fn silence_first(&mut self, trigger: &'static str) {
        self.rules.insert(
            0,
            Rule {
                trigger,
                reply: None,
                delay: 0,
            },
        );
    }

    /// Replies to lines containing `trigger` after 10 ticks, taking precedence over all other rules
    pub fn reply_first(&mut self, trigger: &'static str, reply: &'static [u8]) {
        self.rules.insert(
            0,
            Rule {
                trigger,
                reply: Some(reply),
                delay: 10,
            },
        );
    }

    pub fn clear_rules(&mut self) {
        self.rules.clear();
    }

    /// Makes the given bytes available for reading at the given tick
    pub fn queue(&mut self, at: u32, bytes: &[u8]) {
        for byte in bytes {
            self.rx.push_back((at, *byte));
        }
    }

    /// Makes each byte available `interval` ticks after the previous one
    pub fn trickle(&mut self, start: u32, interval: u32, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            self.rx.push_back((start + i as u32 * interval, *byte));
        }
    }

    /// Returns the transmitted lines
    pub fn commands(&self) -> Vec<String> {
        self.lines.iter().map(|(_, line)| line.clone()).collect()
    }

    /// Returns the tick at which the given command was transmitted
    pub fn command_tick(&self, command: &str) -> Option<u32> {
        self.lines.iter().find(|(_, line)| line == command).map(|(tick, _)| *tick)
    }

    pub fn escape_ticks(&self) -> Vec<u32> {
        self.escapes.clone()
    }

    fn advance(&mut self) -> u32 {
        self.now += 1;
        self.now
    }

    fn is_byte_ready(&self) -> bool {
        matches!(self.rx.front(), Some((at, _)) if *at <= self.now)
    }

    fn receive(&mut self, bytes: &[u8]) {
        if bytes == b"+" {
            self.escapes.push(self.now);
            return;
        }

        self.tx_line.extend_from_slice(bytes);

        while let Some(end) = self.tx_line.windows(2).position(|window| window == b"\r\n") {
            let line: Vec<u8> = self.tx_line.drain(..end + 2).collect();
            let line = String::from_utf8(line[..end].to_vec()).unwrap();
            self.respond(&line);
            self.lines.push((self.now, line));
        }
    }

    fn respond(&mut self, line: &str) {
        let rule = self.rules.iter().find(|rule| line.contains(rule.trigger));

        if let Some(Rule {
            reply: Some(reply),
            delay,
            ..
        }) = rule
        {
            let (reply, at) = (*reply, self.now + delay);
            self.queue(at, reply);
        }
    }
}

/// Serial end of the simulated modem
pub struct MockSerial {
    simulation: SharedSimulation,
}

impl MockSerial {
    pub fn new(simulation: &SharedSimulation) -> Self {
        Self {
            simulation: simulation.clone(),
        }
    }
}

impl ErrorType for MockSerial {
    type Error = Infallible;
}

impl ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.simulation.borrow().is_byte_ready())
    }
}

impl Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut simulation = self.simulation.borrow_mut();
        if buf.is_empty() || !simulation.is_byte_ready() {
            return Ok(0);
        }

        let (_, byte) = simulation.rx.pop_front().unwrap();
        buf[0] = byte;
        Ok(1)
    }
}

impl Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.simulation.borrow_mut().receive(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Error raised by [FaultyTransport] and [MockFaultyPin]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fault;

impl PinError for Fault {
    fn kind(&self) -> PinErrorKind {
        PinErrorKind::Other
    }
}

/// Serial end of the simulated modem failing on demand
pub struct FaultyTransport {
    serial: IoTransport<MockSerial>,

    /// Number of upcoming reads failing before the simulation gets polled again
    pub read_failures: usize,

    /// Total number of failed reads
    pub failed_reads: usize,

    /// Writes fail without reaching the simulation
    pub fail_writes: bool,
}

impl FaultyTransport {
    pub fn new(simulation: &SharedSimulation) -> Self {
        Self {
            serial: IoTransport::new(MockSerial::new(simulation)),
            read_failures: 0,
            failed_reads: 0,
            fail_writes: false,
        }
    }

    /// Transport failing every read and write
    pub fn broken(simulation: &SharedSimulation) -> Self {
        let mut transport = Self::new(simulation);
        transport.read_failures = usize::MAX;
        transport.fail_writes = true;
        transport
    }
}

impl Transport for FaultyTransport {
    type Error = Fault;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        if self.read_failures > 0 {
            self.read_failures -= 1;
            self.failed_reads += 1;
            return Err(nb::Error::Other(Fault));
        }

        self.serial
            .read_byte()
            .map_err(|error| error.map(|never: Infallible| -> Fault { match never {} }))
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(Fault);
        }

        self.serial
            .write_raw(bytes)
            .map_err(|never: Infallible| -> Fault { match never {} })
    }
}

/// Timer on top of the simulated time
pub struct MockTimer {
    simulation: SharedSimulation,
}

impl MockTimer {
    pub fn new(simulation: &SharedSimulation) -> Self {
        Self {
            simulation: simulation.clone(),
        }
    }

    /// Short hand helper for returning a milliseconds duration
    pub fn duration_ms(duration: u32) -> TimerDurationU32<TIMER_HZ> {
        TimerDurationU32::millis(duration)
    }
}

impl FugitTimer<TIMER_HZ> for MockTimer {
    type Error = Infallible;

    fn now(&mut self) -> TimerInstantU32<TIMER_HZ> {
        TimerInstantU32::from_ticks(self.simulation.borrow_mut().advance())
    }

    fn start(&mut self, _duration: TimerDurationU32<TIMER_HZ>) -> Result<(), Self::Error> {
        unimplemented!("Currently not implemented for mock");
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        unimplemented!("Currently not implemented for mock");
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        unimplemented!("Currently not implemented for mock");
    }
}

/// Collects all diagnostic events as `(tick, text)`
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<(u32, String)>,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<String> {
        self.events.iter().map(|(_, text)| text.clone()).collect()
    }
}

impl DiagnosticSink<TIMER_HZ> for RecordingSink {
    fn record(&mut self, at: TimerInstantU32<TIMER_HZ>, event: Event<'_>) {
        let text = match event {
            Event::Transmitted(command) => format!("Tx: {}", command),
            Event::Received(line) => format!("Rx: {}", line),
            Event::Escape => String::from("+"),
        };

        self.events.push((at.ticks(), text));
    }
}

mock! {
    pub ResetPin {}

    impl PinErrorType for ResetPin {
        type Error = Infallible;
    }

    impl OutputPin for ResetPin {
        fn set_low(&mut self) -> Result<(), Infallible>;
        fn set_high(&mut self) -> Result<(), Infallible>;
    }
}

mock! {
    pub FaultyPin {}

    impl PinErrorType for FaultyPin {
        type Error = Fault;
    }

    impl OutputPin for FaultyPin {
        fn set_low(&mut self) -> Result<(), Fault>;
        fn set_high(&mut self) -> Result<(), Fault>;
    }
}

impl MockResetPin {
    /// Reset line accepting any number of level changes
    pub fn accepting() -> Self {
        let mut pin = Self::new();
        pin.expect_set_low().returning(|| Ok(()));
        pin.expect_set_high().returning(|| Ok(()));
        pin
    }
}

/// Adapter on top of the given simulation
pub fn adapter(simulation: &SharedSimulation, pin: MockResetPin) -> AdapterType {
    adapter_with(simulation, IoTransport::new(MockSerial::new(simulation)), pin)
}

/// Adapter using the given transport and reset line, timed by the given simulation
pub fn adapter_with<T: Transport, P: OutputPin>(
    simulation: &SharedSimulation,
    transport: T,
    pin: P,
) -> Adapter<T, P, MockTimer, RecordingSink, TIMER_HZ, 128> {
    Adapter::new(transport, pin, MockTimer::new(simulation), RecordingSink::default())
}
