use std::sync::Mutex;

use super::{
	BusResult,
	DeviceAddress,
	Direction,
	Hardware,
	Line,
	LowLevel,
	Transaction,
	error::check_address,
};

/// Single bus master owning its two lines.
///
/// Every transfer blocks until its stop condition went out; the stop
/// condition is sent on every exit path, including a missing ACK.
pub struct Master<H: Hardware> {
	hardware: H,
}

impl<H: Hardware> Master<H> {
	// take over the lines and leave the bus idle (both released)
	pub fn new(mut hardware: H) -> Self {
		hardware.release(Line::Clock);
		hardware.delay();
		hardware.release(Line::Data);
		hardware.delay();
		debug!("bus master ready, lines released");
		Master { hardware }
	}

	pub fn hardware(&self) -> &H {
		&self.hardware
	}

	// validate address before anything happens on the bus, then start
	pub(super) fn begin(&mut self, address: u8) -> BusResult<Transaction<H>> {
		check_address(address)?;
		Ok(self.hardware.start_transaction())
	}

	pub fn write_frame(&mut self, address: u8, data: &[u8]) -> BusResult<()> {
		debug!("write {} bytes to 0x{:02x}", data.len(), address);
		let mut tx = self.begin(address)?;
		tx.send_address(address, Direction::Write)?;
		tx.send(address, data)
	}

	pub fn read_into(&mut self, address: u8, buffer: &mut [u8]) -> BusResult<()> {
		debug!("read {} bytes from 0x{:02x}", buffer.len(), address);
		let mut tx = self.begin(address)?;
		tx.send_address(address, Direction::Read)?;
		tx.receive(buffer, false);
		Ok(())
	}

	pub fn read_frame(&mut self, address: u8, length: usize) -> BusResult<Vec<u8>> {
		let mut buffer = vec![0u8; length];
		self.read_into(address, &mut buffer)?;
		Ok(buffer)
	}

	// write `data`, then switch to reading through a repeated start (no stop
	// in between)
	pub fn write_read(&mut self, address: u8, data: &[u8], buffer: &mut [u8]) -> BusResult<()> {
		debug!("write {} bytes to / read {} bytes from 0x{:02x}", data.len(), buffer.len(), address);
		let mut tx = self.begin(address)?;
		tx.send_address(address, Direction::Write)?;
		tx.send(address, data)?;
		tx.repeated_start();
		tx.send_address(address, Direction::Read)?;
		tx.receive(buffer, false);
		Ok(())
	}

	// set register pointer, then read a single byte
	pub fn read_register(&mut self, address: u8, register: u8) -> BusResult<u8> {
		let mut value = [0u8];
		self.write_read(address, &[register], &mut value)?;
		Ok(value[0])
	}

	pub fn write_register(&mut self, address: u8, register: u8, value: u8) -> BusResult<()> {
		self.write_frame(address, &[register, value])
	}

	// zero-length write; a device is present if it acknowledges its address
	pub fn probe(&mut self, address: u8) -> BusResult<bool> {
		match self.write_frame(address, &[]) {
			Ok(()) => Ok(true),
			Err(ref e) if e.is_nack() => Ok(false),
			Err(e) => Err(e),
		}
	}

	// probe all addresses that aren't reserved
	pub fn scan(&mut self) -> Vec<u8> {
		let mut found = Vec::new();
		for address in DeviceAddress::all().filter(|a| !a.is_reserved()) {
			let address = address.get();
			if let Ok(true) = self.probe(address) {
				debug!("device at 0x{:02x}", address);
				found.push(address);
			}
		}
		found
	}
}

/// What a device driver (display, sensor, ...) needs from the bus.
pub trait DeviceBus {
	fn write(&mut self, address: u8, data: &[u8]) -> BusResult<()>;

	fn read(&mut self, address: u8, length: usize) -> BusResult<Vec<u8>>;

	fn read_register(&mut self, address: u8, register: u8) -> BusResult<u8>;

	fn write_register(&mut self, address: u8, register: u8, value: u8) -> BusResult<()> {
		self.write(address, &[register, value])
	}
}

impl<H: Hardware> DeviceBus for Master<H> {
	fn write(&mut self, address: u8, data: &[u8]) -> BusResult<()> {
		self.write_frame(address, data)
	}

	fn read(&mut self, address: u8, length: usize) -> BusResult<Vec<u8>> {
		self.read_frame(address, length)
	}

	fn read_register(&mut self, address: u8, register: u8) -> BusResult<u8> {
		Master::read_register(self, address, register)
	}
}

impl<'a, B: DeviceBus + ?Sized> DeviceBus for &'a mut B {
	fn write(&mut self, address: u8, data: &[u8]) -> BusResult<()> {
		B::write(*self, address, data)
	}

	fn read(&mut self, address: u8, length: usize) -> BusResult<Vec<u8>> {
		B::read(*self, address, length)
	}

	fn read_register(&mut self, address: u8, register: u8) -> BusResult<u8> {
		B::read_register(*self, address, register)
	}

	fn write_register(&mut self, address: u8, register: u8, value: u8) -> BusResult<()> {
		B::write_register(*self, address, register, value)
	}
}

// Shared between threads: the lock is held for a whole transfer. A poisoned
// lock is fine to reuse: the stop condition already went out while
// unwinding.
impl<'a, B: DeviceBus + ?Sized> DeviceBus for &'a Mutex<B> {
	fn write(&mut self, address: u8, data: &[u8]) -> BusResult<()> {
		let mut bus = self.lock().unwrap_or_else(|e| e.into_inner());
		bus.write(address, data)
	}

	fn read(&mut self, address: u8, length: usize) -> BusResult<Vec<u8>> {
		let mut bus = self.lock().unwrap_or_else(|e| e.into_inner());
		bus.read(address, length)
	}

	fn read_register(&mut self, address: u8, register: u8) -> BusResult<u8> {
		let mut bus = self.lock().unwrap_or_else(|e| e.into_inner());
		bus.read_register(address, register)
	}

	fn write_register(&mut self, address: u8, register: u8, value: u8) -> BusResult<()> {
		let mut bus = self.lock().unwrap_or_else(|e| e.into_inner());
		bus.write_register(address, register, value)
	}
}
