//! Software I²C master on two open-drain lines (DATA / SDA and CLOCK / SCL)
//!
//! Both lines have external pull-ups; the master only ever pulls a line low
//! or releases it, never drives it high. Everything a device says to the
//! master (ACK bits, read data) is the device pulling DATA low while the
//! master has released it.
//!
//! Frame layout:
//! - Start: DATA falls while CLOCK is high
//! - Address byte: 7-bit address, shifted left, lowest bit is the direction
//!   (0: write, 1: read)
//! - Data bytes, MSB first, each followed by an ACK bit from the receiver
//!   (low: ACK, high: NACK)
//! - Stop: DATA rises while CLOCK is high
//!
//! DATA only changes while CLOCK is low, apart from start and stop. A start
//! without a preceding stop is a "repeated start" and switches direction
//! without giving up the bus.
//!
//! The clock is never read back, so devices that stretch the clock are not
//! supported.

mod address;
mod error;
mod hal;
mod hardware;
mod low_level;
mod operations;

pub use self::address::{
	DeviceAddress,
	parse_byte,
};

pub use self::error::{
	BusError,
	BusResult,
};

pub use self::hardware::{
	BusyWait,
	Delay,
	Hardware,
	Line,
	Sleep,
	Timing,
	reliable_sleep,
};

pub use self::low_level::{
	Direction,
	LowLevel,
	Transaction,
};

pub use self::operations::{
	DeviceBus,
	Master,
};
