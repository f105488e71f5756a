//! # Line reader
//!
//! Captures a single response line of the modem. Capturing ends when the line terminator is
//! received, the buffer runs full or the capture deadline expires. Whatever was collected until
//! then is handed back as a line, so a malformed reply can never block the matcher.
//!
//! Only printable ASCII is stored. Line feeds and binary noise (e.g. while the modem boots) are
//! dropped silently.
use crate::timing::Deadline;
use crate::transport::Transport;
use fugit::TimerDurationU32;
use fugit_timer::Timer;
use heapless::String;

/// Byte ending a received line
pub const LINE_TERMINATOR: u8 = b'\r';

/// Fixed capacity buffer of a single line
///
/// The last slot stays reserved for a string terminator, so at most `N - 2` characters are stored.
pub struct LineBuffer<const N: usize> {
    line: String<N>,
}

impl<const N: usize> LineBuffer<N> {
    const CAPACITY_CHECK: () = assert!(N >= 2, "line buffer needs at least two bytes");

    /// Max. number of stored characters
    pub const LIMIT: usize = N - 2;

    /// Creates an empty buffer
    pub fn new() -> Self {
        let _ = Self::CAPACITY_CHECK;
        Self { line: String::new() }
    }

    /// Drops all stored characters
    pub fn clear(&mut self) {
        self.line.clear();
    }

    /// Appends a printable character. Returns false if the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.line.len() >= Self::LIMIT {
            return false;
        }

        self.line.push(byte as char).is_ok()
    }

    /// Number of stored characters
    pub fn len(&self) -> usize {
        self.line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    pub fn as_str(&self) -> &str {
        self.line.as_str()
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// States of a single line capture
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadState {
    /// Buffer needs to be cleared
    Clean,
    /// Polling the transport for the next byte
    Reading,
    /// Checking the capture deadline
    CheckTimeout,
    /// Capture finished, buffer holds the line
    Done,
}

/// Events driving [ReadState]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadEvent {
    /// Buffer was cleared
    Cleared,
    /// No byte pending
    Idle,
    /// Line terminator received
    Terminator,
    /// Printable byte was stored
    Stored,
    /// Printable byte received, but buffer is full
    Full,
    /// Non printable byte was dropped
    Noise,
    /// Capture deadline expired
    Expired,
    /// Capture deadline not expired yet
    Pending,
}

impl ReadState {
    /// Transition table of the line capture. Events not valid for a state leave it unchanged.
    ///
    /// Dropped noise does not re-arm the deadline, but still passes the deadline check.
    pub fn next(self, event: ReadEvent) -> Self {
        match (self, event) {
            (Self::Clean, ReadEvent::Cleared) => Self::Reading,
            (Self::Reading, ReadEvent::Terminator | ReadEvent::Full) => Self::Done,
            (Self::Reading, ReadEvent::Stored | ReadEvent::Idle | ReadEvent::Noise) => Self::CheckTimeout,
            (Self::CheckTimeout, ReadEvent::Expired) => Self::Done,
            (Self::CheckTimeout, ReadEvent::Pending) => Self::Reading,
            (state, _) => state,
        }
    }
}

/// Returns true for bytes stored in a line (ASCII 0x20..=0x7E)
pub(crate) fn is_printable(byte: u8) -> bool {
    byte == b' ' || byte.is_ascii_graphic()
}

/// Line capture on top of a [Transport]
pub struct LineReader<const N: usize> {
    buffer: LineBuffer<N>,
}

impl<const N: usize> LineReader<N> {
    pub fn new() -> Self {
        Self {
            buffer: LineBuffer::new(),
        }
    }

    /// Last captured line
    pub fn line(&self) -> &str {
        self.buffer.as_str()
    }

    /// Captures the next line and returns its length
    ///
    /// The deadline is armed once at the start of the capture and not extended by received bytes.
    pub fn read_line<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32>(
        &mut self,
        transport: &mut T,
        timer: &mut C,
        timeout: TimerDurationU32<TIMER_HZ>,
    ) -> usize {
        let deadline = Deadline::start(timer, timeout);
        let mut state = ReadState::Clean;

        while state != ReadState::Done {
            let event = match state {
                ReadState::Clean => {
                    self.buffer.clear();
                    ReadEvent::Cleared
                }
                ReadState::Reading => self.poll(transport),
                ReadState::CheckTimeout if deadline.is_expired(timer.now()) => ReadEvent::Expired,
                ReadState::CheckTimeout => ReadEvent::Pending,
                ReadState::Done => break,
            };

            state = state.next(event);
        }

        self.buffer.len()
    }

    /// Polls a single byte and classifies it
    fn poll<T: Transport>(&mut self, transport: &mut T) -> ReadEvent {
        match transport.read_byte() {
            Ok(LINE_TERMINATOR) => ReadEvent::Terminator,
            Ok(byte) if is_printable(byte) => {
                if self.buffer.push(byte) {
                    ReadEvent::Stored
                } else {
                    debug!("Line buffer full, returning partial line");
                    ReadEvent::Full
                }
            }
            Ok(_) => ReadEvent::Noise,
            Err(nb::Error::WouldBlock) => ReadEvent::Idle,
            Err(nb::Error::Other(_)) => {
                trace!("Transport read failed, treated as idle line");
                ReadEvent::Idle
            }
        }
    }

    /// Discards all incoming data for the given duration
    pub fn empty<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32>(
        &mut self,
        transport: &mut T,
        timer: &mut C,
        duration: TimerDurationU32<TIMER_HZ>,
    ) {
        let deadline = Deadline::start(timer, duration);
        while !deadline.is_expired(timer.now()) {
            let _ = transport.read_byte();
        }
    }
}

impl<const N: usize> Default for LineReader<N> {
    fn default() -> Self {
        Self::new()
    }
}
