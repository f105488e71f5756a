//! Mocks for doc examples
use crate::transport::Transport;
use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, OutputPin};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::Deque;

/// Modem mock acknowledging every command by OK
#[derive(Default)]
pub struct ExampleSerial {
    /// Pending response bytes
    rx: Deque<u8, 64>,
}

impl Transport for ExampleSerial {
    type Error = Infallible;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }

    fn write_raw(&mut self, _bytes: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn write_line(&mut self, _text: &str) -> Result<(), Self::Error> {
        for byte in b"\r\nOK\r\n" {
            let _ = self.rx.push_back(*byte);
        }

        Ok(())
    }
}

/// Reset line mock
#[derive(Default)]
pub struct ExamplePin {}

impl ErrorType for ExamplePin {
    type Error = Infallible;
}

impl OutputPin for ExamplePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Timer mock, advancing one millisecond on every query
#[derive(Default)]
pub struct ExampleTimer {
    ticks: u32,
}

impl Timer<1_000> for ExampleTimer {
    type Error = Infallible;

    fn now(&mut self) -> TimerInstantU32<1_000> {
        self.ticks = self.ticks.wrapping_add(1);
        TimerInstantU32::from_ticks(self.ticks)
    }

    fn start(&mut self, _duration: TimerDurationU32<1_000>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        nb::Result::Err(nb::Error::WouldBlock)
    }
}
