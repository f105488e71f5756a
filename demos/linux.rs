//! Example that runs on Linux using a serial-USB-adapter.
//!
//! The modem reset line is expected on RTS, as wired on most ESP development boards.
use std::{
    convert::Infallible,
    env,
    io::{self, Read, Write},
    time::{Duration, Instant},
};

use embedded_hal::digital::{ErrorType, OutputPin};
use esp_at_passthrough::{
    diagnostics::LogSink,
    timing::DEFAULT_ESCAPE_CHAR_DELAY_MS,
    transport::Transport,
    wifi::Adapter,
};
use fugit::TimerDurationU32;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

// Timer frequency in Hz
const TIMER_HZ: u32 = 1000;

// Maximum length of received lines
const LINE_SIZE: usize = 256;

// Time to collect the server response after sending the request
const RESPONSE_WINDOW: Duration = Duration::from_secs(5);

fn main() {
    env_logger::init();

    // Parse args
    let args: Vec<String> = env::args().collect();
    if args.len() != 7 {
        println!("Usage: {} <path-to-serial> <baudrate> <ssid> <psk> <host> <port>", args[0]);
        println!("Example: {} /dev/ttyUSB0 115200 mywifi hellopasswd123 ifconfig.net 80", args[0]);
        println!("\nNote: To run the example with debug logging, run it like this:");
        println!("\n  RUST_LOG=debug cargo run --example linux --features log -- /dev/ttyUSB0 115200 mywifi hellopasswd123 ifconfig.net 80");
        std::process::exit(1);
    }
    let dev = &args[1];
    let baud_rate: u32 = args[2].parse().expect("Invalid baud rate");
    let ssid = &args[3];
    let psk = &args[4];
    let host = &args[5];
    let port: u16 = args[6].parse().expect("Invalid port");

    println!("Starting (dev={}, baud={:?})...", dev, baud_rate);

    // Open serial port
    let serial = serialport::new(dev, baud_rate)
        .data_bits(DataBits::Eight)
        .flow_control(FlowControl::None)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(Duration::from_millis(500))
        .open()
        .expect("Could not open serial port");
    let reset_line = serial.try_clone().expect("Could not clone serial port");

    let mut adapter: Adapter<_, _, _, _, TIMER_HZ, LINE_SIZE> = Adapter::new(
        SerialTransport::new(serial),
        RtsResetPin::new(reset_line),
        timer::SysTimer::new(),
        LogSink,
    );

    // Join WIFI access point
    println!("Join WiFi \"{}\"...", ssid);
    if let Err(error) = adapter.connect(ssid, psk) {
        println!("Joining failed: {:?} (code {})", error, error.code());
        std::process::exit(error.code().into());
    }

    // Open the transparent TCP tunnel
    println!("Connecting to {}:{}...", host, port);
    if let Err(error) = adapter.open(host, port) {
        println!("Connecting failed: {:?} (code {})", error, error.code());
        adapter.disconnect();
        std::process::exit(error.code().into());
    }
    println!("Connected!");

    // Everything written now goes straight to the server
    println!("Sending HTTP request...");
    let request = format!("GET / HTTP/1.1\r\nAccept: text/plain\r\nHost: {}\r\n\r\n", host);
    adapter
        .transport()
        .write_raw(request.as_bytes())
        .expect("Could not send HTTP request");

    let response = collect_response(adapter.transport(), RESPONSE_WINDOW);
    println!("Response:\n---\n{}\n---", String::from_utf8_lossy(&response));

    // Leave the tunnel and the access point
    println!("Closing connection...");
    if !adapter.close(TimerDurationU32::millis(DEFAULT_ESCAPE_CHAR_DELAY_MS)) {
        println!("Closing was not acknowledged");
    }
    adapter.disconnect();
}

/// Reads tunnel data until the given window is over
fn collect_response(transport: &mut SerialTransport, window: Duration) -> Vec<u8> {
    let start = Instant::now();
    let mut response = Vec::new();

    while start.elapsed() < window {
        match transport.read_byte() {
            Ok(byte) => response.push(byte),
            Err(nb::Error::WouldBlock) => std::thread::sleep(Duration::from_millis(1)),
            Err(nb::Error::Other(e)) => {
                println!("Serial error while reading: {}", e);
                break;
            }
        }
    }

    response
}

/// [Transport] on top of a serialport handle
struct SerialTransport {
    serial: Box<dyn SerialPort>,
}

impl SerialTransport {
    fn new(serial: Box<dyn SerialPort>) -> Self {
        Self { serial }
    }
}

impl Transport for SerialTransport {
    type Error = io::Error;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        if self.serial.bytes_to_read().map_err(|e| nb::Error::Other(e.into()))? == 0 {
            return Err(nb::Error::WouldBlock);
        }

        let mut buffer = [0x0; 1];
        match self.serial.read(&mut buffer) {
            Ok(0) => Err(nb::Error::WouldBlock),
            Ok(_) => Ok(buffer[0]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                Err(nb::Error::WouldBlock)
            }
            Err(e) => Err(nb::Error::Other(e)),
        }
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.serial.write_all(bytes)?;
        self.serial.flush()
    }
}

/// Modem reset line driven by RTS. RTS is inverted by the adapter, so asserting it pulls reset low.
struct RtsResetPin {
    serial: Box<dyn SerialPort>,
}

impl RtsResetPin {
    fn new(serial: Box<dyn SerialPort>) -> Self {
        Self { serial }
    }

    fn request_to_send(&mut self, level: bool) {
        if let Err(e) = self.serial.write_request_to_send(level) {
            log::warn!("Setting RTS failed: {}", e);
        }
    }
}

impl ErrorType for RtsResetPin {
    type Error = Infallible;
}

impl OutputPin for RtsResetPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.request_to_send(true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.request_to_send(false);
        Ok(())
    }
}

mod timer {
    use std::{convert::Infallible, time::Instant as StdInstant};

    use fugit::{TimerDurationU32, TimerInstantU32};
    use fugit_timer::Timer;

    /// A timer with millisecond precision.
    pub struct SysTimer {
        origin: StdInstant,
        start: StdInstant,
        duration_ms: u32,
    }

    impl SysTimer {
        pub fn new() -> SysTimer {
            let now = StdInstant::now();
            SysTimer {
                origin: now,
                start: now,
                duration_ms: 0,
            }
        }
    }

    impl Timer<1000> for SysTimer {
        type Error = Infallible;

        /// Return current time `Instant`, wrapping after ~49 days
        fn now(&mut self) -> TimerInstantU32<1000> {
            let milliseconds = (StdInstant::now() - self.origin).as_millis();
            TimerInstantU32::from_ticks(milliseconds as u32)
        }

        fn start(&mut self, duration: TimerDurationU32<1000>) -> Result<(), Self::Error> {
            self.start = StdInstant::now();
            self.duration_ms = duration.ticks();
            Ok(())
        }

        fn cancel(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        /// Must return `nb::Error::WouldBlock` if timer `duration` is not yet over.
        fn wait(&mut self) -> nb::Result<(), Self::Error> {
            if (StdInstant::now() - self.start).as_millis() > self.duration_ms.into() {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        }
    }

}
