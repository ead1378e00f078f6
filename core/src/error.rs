//! Error taxonomy (spec §7). Hand-rolled rather than built on `thiserror`:
//! the crate is `no_std` and generic over the caller's bus error type, the
//! same shape the teacher crate uses for its own `Error<SPI, CS, RESET>`.

use core::fmt;

/// Any failure raised by the underlying [`crate::bus::Bus::xfer`] or
/// [`crate::bus::Bus::reset_pulse`]. Propagates from RIO up through every
/// setter; getters mask it (see the sentinels documented on each accessor
/// in [`crate::config`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError<E>(pub E);

impl<E: fmt::Debug> fmt::Display for BusError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus transaction failed: {:?}", self.0)
    }
}

/// A setter argument fell outside its valid domain (carrier frequency,
/// coding rate, spreading factor, TX power, oversized payload, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeError {
    pub what: &'static str,
}

impl RangeError {
    pub const fn new(what: &'static str) -> Self {
        RangeError { what }
    }
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value out of range: {}", self.what)
    }
}

/// Top-level error returned by the fallible RC setters and by
/// [`crate::engine::Engine::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    Bus(BusError<E>),
    Range(RangeError),
}

impl<E> From<BusError<E>> for Error<E> {
    fn from(e: BusError<E>) -> Self {
        Error::Bus(e)
    }
}

impl<E> From<RangeError> for Error<E> {
    fn from(e: RangeError) -> Self {
        Error::Range(e)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => e.fmt(f),
            Error::Range(e) => e.fmt(f),
        }
    }
}

/// Raised by [`crate::engine::Engine::receive`] when `timeout` elapses
/// without the RxDone flag. The chip is already back in Standby with IRQs
/// cleared by the time this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError;

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timed out waiting for a packet")
    }
}

/// Raised by [`crate::engine::Engine::receive`] when RxDone fired but
/// `RxNbBytes` read back as zero. Same cleanup as [`TimeoutError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyPacketError;

impl fmt::Display for EmptyPacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "received an empty packet")
    }
}

/// Errors observable while receiving: the bus can fail at any step, plus
/// the two receive-specific conditions above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveError<E> {
    Bus(BusError<E>),
    Timeout(TimeoutError),
    EmptyPacket(EmptyPacketError),
}

impl<E> From<BusError<E>> for ReceiveError<E> {
    fn from(e: BusError<E>) -> Self {
        ReceiveError::Bus(e)
    }
}

impl<E> From<TimeoutError> for ReceiveError<E> {
    fn from(e: TimeoutError) -> Self {
        ReceiveError::Timeout(e)
    }
}

impl<E> From<EmptyPacketError> for ReceiveError<E> {
    fn from(e: EmptyPacketError) -> Self {
        ReceiveError::EmptyPacket(e)
    }
}

impl<E: fmt::Debug> fmt::Display for ReceiveError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiveError::Bus(e) => e.fmt(f),
            ReceiveError::Timeout(e) => e.fmt(f),
            ReceiveError::EmptyPacket(e) => e.fmt(f),
        }
    }
}

/// Errors observable while sending: a bus failure, or an oversized payload
/// caught before it is programmed into the FIFO (spec §9 open question,
/// resolved in favor of rejecting rather than silently wrapping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError<E> {
    Bus(BusError<E>),
    Range(RangeError),
}

impl<E> From<BusError<E>> for SendError<E> {
    fn from(e: BusError<E>) -> Self {
        SendError::Bus(e)
    }
}

impl<E> From<RangeError> for SendError<E> {
    fn from(e: RangeError) -> Self {
        SendError::Range(e)
    }
}

impl<E: fmt::Debug> fmt::Display for SendError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Bus(e) => e.fmt(f),
            SendError::Range(e) => e.fmt(f),
        }
    }
}

/// Construction-time failure (spec §4.5 steps 1-2): opening the bus or
/// resetting the chip failed outright. Unlike everything above, this is
/// always fatal -- there is no usable [`crate::RadioDevice`] to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitError<E>(pub E);

impl<E: fmt::Debug> fmt::Display for InitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to initialise the radio: {:?}", self.0)
    }
}
