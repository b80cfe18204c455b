use std::sync::{
	Arc,
	Mutex,
};

use crate::i2c::Direction;

/// Byte-level behaviour of a simulated device; the bit-level protocol is
/// handled by the bus.
pub trait Target {
	// 7-bit address the device answers to
	fn address(&self) -> u8;

	// addressed by the master; `false` doesn't acknowledge the address
	fn select(&mut self, _direction: Direction) -> bool {
		true
	}

	// byte from the master; `false` doesn't acknowledge it
	fn write(&mut self, byte: u8) -> bool;

	// next byte for the master
	fn read(&mut self) -> u8;

	// stop condition after the device was addressed
	fn stop(&mut self) {}
}

// keep a handle to inspect the device after attaching it to the bus
impl<T: Target + ?Sized> Target for Arc<Mutex<T>> {
	fn address(&self) -> u8 {
		self.lock().unwrap_or_else(|e| e.into_inner()).address()
	}

	fn select(&mut self, direction: Direction) -> bool {
		self.lock().unwrap_or_else(|e| e.into_inner()).select(direction)
	}

	fn write(&mut self, byte: u8) -> bool {
		self.lock().unwrap_or_else(|e| e.into_inner()).write(byte)
	}

	fn read(&mut self) -> u8 {
		self.lock().unwrap_or_else(|e| e.into_inner()).read()
	}

	fn stop(&mut self) {
		self.lock().unwrap_or_else(|e| e.into_inner()).stop()
	}
}

/// Register file with an auto-incrementing pointer (like most sensors and
/// 24Cxx EEPROMs): the first byte of a write sets the pointer, further bytes
/// are stored at the pointer; reads return bytes from the pointer.
pub struct RegisterDevice {
	address: u8,
	registers: [u8; 256],
	pointer: u8,
	expect_pointer: bool,
	// acknowledge only that many bytes per write (pointer included)
	accept: Option<usize>,
	received: usize,
	transfers: usize,
}

impl RegisterDevice {
	pub fn new(address: u8) -> Self {
		RegisterDevice {
			address,
			registers: [0u8; 256],
			pointer: 0,
			expect_pointer: false,
			accept: None,
			received: 0,
			transfers: 0,
		}
	}

	pub fn with_register(mut self, register: u8, value: u8) -> Self {
		self.registers[register as usize] = value;
		self
	}

	pub fn accept_only(mut self, bytes: usize) -> Self {
		self.accept = Some(bytes);
		self
	}

	pub fn register(&self, register: u8) -> u8 {
		self.registers[register as usize]
	}

	pub fn pointer(&self) -> u8 {
		self.pointer
	}

	// completed transfers (stop conditions seen while addressed)
	pub fn transfers(&self) -> usize {
		self.transfers
	}
}

impl Target for RegisterDevice {
	fn address(&self) -> u8 {
		self.address
	}

	fn select(&mut self, direction: Direction) -> bool {
		self.expect_pointer = direction == Direction::Write;
		self.received = 0;
		true
	}

	fn write(&mut self, byte: u8) -> bool {
		if let Some(limit) = self.accept {
			if self.received >= limit {
				return false;
			}
		}
		self.received += 1;
		if self.expect_pointer {
			self.pointer = byte;
			self.expect_pointer = false;
		} else {
			self.registers[self.pointer as usize] = byte;
			self.pointer = self.pointer.wrapping_add(1);
		}
		true
	}

	fn read(&mut self) -> u8 {
		let value = self.registers[self.pointer as usize];
		self.pointer = self.pointer.wrapping_add(1);
		value
	}

	fn stop(&mut self) {
		self.transfers += 1;
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
	// not addressed (or done); ignore everything until the next start
	Idle,
	// shifting in a byte; `address` for the first byte after a start
	Receiving { byte: u8, count: u8, address: bool },
	// pulling DATA low for the ACK bit
	Acking { then: Direction },
	// `count` bits of `byte` already clocked out
	Transmitting { byte: u8, count: u8 },
	// master's ACK bit after a transmitted byte
	AwaitingAck { ack: Option<bool> },
}

/// Bit-level side of a device on the simulated bus
pub(super) struct Peer {
	target: Box<dyn Target + Send>,
	state: State,
	selected: bool,
	data_released: bool,
}

impl Peer {
	pub(super) fn new(target: Box<dyn Target + Send>) -> Self {
		Peer {
			target,
			state: State::Idle,
			selected: false,
			data_released: true,
		}
	}

	pub(super) fn data_released(&self) -> bool {
		self.data_released
	}

	pub(super) fn start_condition(&mut self) {
		self.data_released = true;
		self.state = State::Receiving { byte: 0, count: 0, address: true };
	}

	pub(super) fn stop_condition(&mut self) {
		self.data_released = true;
		self.state = State::Idle;
		if self.selected {
			self.selected = false;
			self.target.stop();
		}
	}

	pub(super) fn clock_rising(&mut self, data: bool) {
		match self.state {
			State::Receiving { byte, count, address } if count < 8 => {
				self.state = State::Receiving { byte: (byte << 1) | data as u8, count: count + 1, address };
			},
			State::AwaitingAck { ack: None } => {
				self.state = State::AwaitingAck { ack: Some(!data) };
			},
			_ => (),
		}
	}

	pub(super) fn clock_falling(&mut self) {
		self.state = match self.state {
			State::Receiving { byte, count: 8, address: true } => {
				let direction = if 0 != byte & 1 { Direction::Read } else { Direction::Write };
				if byte >> 1 == self.target.address() && self.target.select(direction) {
					self.selected = true;
					self.data_released = false;
					State::Acking { then: direction }
				} else {
					State::Idle
				}
			},
			State::Receiving { byte, count: 8, address: false } => {
				if self.target.write(byte) {
					self.data_released = false;
					State::Acking { then: Direction::Write }
				} else {
					State::Idle
				}
			},
			State::Acking { then: Direction::Write } => {
				self.data_released = true;
				State::Receiving { byte: 0, count: 0, address: false }
			},
			State::Acking { then: Direction::Read } | State::AwaitingAck { ack: Some(true) } => {
				self.transmit()
			},
			State::Transmitting { byte, count } => {
				let count = count + 1;
				if count == 8 {
					self.data_released = true;
					State::AwaitingAck { ack: None }
				} else {
					self.data_released = 0 != byte & (0x80 >> count);
					State::Transmitting { byte, count }
				}
			},
			State::AwaitingAck { .. } => {
				// NACK: master doesn't want any more
				self.data_released = true;
				State::Idle
			},
			state => state,
		};
	}

	// put the MSB of the next byte on DATA
	fn transmit(&mut self) -> State {
		let byte = self.target.read();
		self.data_released = 0 != byte & 0x80;
		State::Transmitting { byte, count: 0 }
	}
}
