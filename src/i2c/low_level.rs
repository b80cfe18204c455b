use std::fmt;
use std::ops::{
	Deref,
	DerefMut,
};

use super::{
	BusError,
	BusResult,
	Hardware,
	Line,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
	Write,
	Read,
}

impl Direction {
	// lowest bit of the address byte
	pub fn bit(self) -> u8 {
		match self {
			Direction::Write => 0,
			Direction::Read => 1,
		}
	}

	pub fn address_byte(self, address: u8) -> u8 {
		(address << 1) | self.bit()
	}
}

impl fmt::Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Direction::Write => write!(f, "write"),
			Direction::Read => write!(f, "read"),
		}
	}
}

/// A running transfer: created with a start condition, sends the stop
/// condition when dropped (also on early return through `?`).
pub struct Transaction<'a, H: ?Sized+LowLevel+'a>(&'a mut H);

impl<'a, H: ?Sized+LowLevel> Transaction<'a, H> {
	// start without stop in between; keeps the bus
	pub fn repeated_start(&mut self) {
		trace!("repeated start");
		self.0._start_condition();
	}

	// send address byte with direction bit; NACK means nobody is listening
	pub fn send_address(&mut self, address: u8, direction: Direction) -> BusResult<()> {
		if !self.write_byte(direction.address_byte(address)) {
			debug!("no ACK for {} address 0x{:02x}", direction, address);
			return Err(BusError::AddressNack { address, direction });
		}
		Ok(())
	}

	// send payload bytes, abort on first missing ACK
	pub fn send(&mut self, address: u8, data: &[u8]) -> BusResult<()> {
		for (index, &byte) in data.iter().enumerate() {
			if !self.write_byte(byte) {
				debug!("no ACK from 0x{:02x} for data byte {} (0x{:02x})", address, index, byte);
				return Err(BusError::DataNack { address, index });
			}
		}
		Ok(())
	}

	// fill buffer; ACK every byte but the last one unless `more` follows
	pub fn receive(&mut self, buffer: &mut [u8], more: bool) {
		let len = buffer.len();
		for (index, target) in buffer.iter_mut().enumerate() {
			let ack = more || index + 1 < len;
			*target = self.read_byte(ack);
		}
	}
}

impl<'a, H: ?Sized+LowLevel> Drop for Transaction<'a, H> {
	fn drop(&mut self) {
		self.0._stop_condition();
	}
}

impl<'a, H: ?Sized+LowLevel> Deref for Transaction<'a, H> {
	type Target = H;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, H: ?Sized+LowLevel> DerefMut for Transaction<'a, H> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

trait InternalLowLevel: Hardware {
	// change a line, then give it (and everyone else) time to settle
	fn settle_low(&mut self, line: Line) {
		self.drive_low(line);
		self.delay();
	}

	fn settle_release(&mut self, line: Line) {
		self.release(line);
		self.delay();
	}

	// DATA falls while CLOCK is high; leaves CLOCK low
	//
	// DATA is released first so this also works as repeated start from the
	// middle of a transfer (CLOCK low, DATA in any state)
	fn _start_condition(&mut self) {
		self.settle_release(Line::Data);
		self.settle_release(Line::Clock);
		self.settle_low(Line::Data);
		self.settle_low(Line::Clock);
	}

	// DATA rises while CLOCK is high; leaves both lines released (idle)
	fn _stop_condition(&mut self) {
		trace!("stop");
		self.settle_low(Line::Data);
		self.settle_release(Line::Clock);
		self.settle_release(Line::Data);
	}

	// one full clock cycle, DATA must already be set up (CLOCK is low when
	// called)
	fn _clock_pulse(&mut self) {
		self.settle_release(Line::Clock);
		self.settle_low(Line::Clock);
	}

	// put one bit on DATA during CLOCK low, then clock it out
	fn _send_bit(&mut self, bit: bool) {
		if bit {
			self.settle_release(Line::Data);
		} else {
			self.settle_low(Line::Data);
		}
		self._clock_pulse();
	}

	// release DATA and sample it while CLOCK is high; the other side drives
	// the bit (or leaves it high)
	fn _receive_bit(&mut self) -> bool {
		self.settle_release(Line::Data);
		self.settle_release(Line::Clock);
		let data = self.read_data();
		self.settle_low(Line::Clock);
		data
	}
}

impl<H: Hardware+?Sized> InternalLowLevel for H {
}

pub trait LowLevel: Hardware {
	// send byte MSB first; returns whether the receiver acknowledged (pulled
	// DATA low during the ninth clock)
	fn write_byte(&mut self, byte: u8) -> bool {
		for bit in (0..8).rev() {
			self._send_bit(0 != byte & (1 << bit));
		}
		let ack = !self._receive_bit();
		trace!("sent 0x{:02x} ({})", byte, if ack { "ACK" } else { "NACK" });
		ack
	}

	// receive byte MSB first, then send ACK (more bytes wanted) or NACK (last
	// byte)
	fn read_byte(&mut self, ack: bool) -> u8 {
		let mut byte = 0u8;
		for bit in (0..8).rev() {
			if self._receive_bit() {
				byte |= 1 << bit;
			}
		}
		self._send_bit(!ack);
		self.settle_release(Line::Data);
		trace!("received 0x{:02x} ({})", byte, if ack { "ACK" } else { "NACK" });
		byte
	}

	fn start_transaction(&mut self) -> Transaction<Self> {
		trace!("start");
		self._start_condition();

		Transaction(self)
	}
}

impl<H: Hardware+?Sized> LowLevel for H {
}
