//! # Serial byte transport
//!
//! The adapter talks to the modem through [Transport]. Reads are non-blocking and signal an
//! idle line by `nb::Error::WouldBlock`. Any `embedded-io` serial implementing [Read], [ReadReady]
//! and [Write] can be used through [IoTransport].
use core::fmt::Debug;
use embedded_io::{Read, ReadReady, Write};

/// Terminator appended to every transmitted command
pub const COMMAND_TERMINATOR: &[u8] = b"\r\n";

/// Duplex serial channel to the modem
pub trait Transport {
    /// Transport specific error. Errors are never distinguished from an idle line.
    type Error: Debug;

    /// Reads a single byte. Returns `nb::Error::WouldBlock` if no data is pending.
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;

    /// Writes the given bytes as they are
    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Writes the given text followed by the command terminator
    fn write_line(&mut self, text: &str) -> Result<(), Self::Error> {
        self.write_raw(text.as_bytes())?;
        self.write_raw(COMMAND_TERMINATOR)
    }
}

/// [Transport] on top of a blocking `embedded-io` serial
pub struct IoTransport<S> {
    serial: S,
}

impl<S> IoTransport<S> {
    /// Wraps the given serial
    pub fn new(serial: S) -> Self {
        Self { serial }
    }

    /// Returns the wrapped serial
    pub fn release(self) -> S {
        self.serial
    }

    /// Mutable access to the wrapped serial, e.g. for using the passthrough tunnel
    pub fn inner(&mut self) -> &mut S {
        &mut self.serial
    }
}

impl<S: Read + ReadReady + Write> Transport for IoTransport<S> {
    type Error = S::Error;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        if !self.serial.read_ready().map_err(nb::Error::Other)? {
            return Err(nb::Error::WouldBlock);
        }

        let mut buffer = [0x0; 1];
        match self.serial.read(&mut buffer).map_err(nb::Error::Other)? {
            0 => Err(nb::Error::WouldBlock),
            _ => Ok(buffer[0]),
        }
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.serial.write_all(bytes)?;

        // Escape sequence timing depends on bytes leaving the UART right away
        self.serial.flush()
    }
}
