//! `embedded-hal` adapter so existing device drivers can run on the
//! bit-banged master.

use embedded_hal::i2c::{
	ErrorType,
	I2c,
	Operation,
	SevenBitAddress,
};

use super::{
	BusError,
	Direction,
	Hardware,
	Master,
};

fn direction(operation: &Operation) -> Direction {
	match operation {
		Operation::Read(_) => Direction::Read,
		Operation::Write(_) => Direction::Write,
	}
}

impl<H: Hardware> ErrorType for Master<H> {
	type Error = BusError;
}

impl<H: Hardware> I2c<SevenBitAddress> for Master<H> {
	// one start, address again (after a repeated start) whenever the
	// direction changes, one stop; consecutive reads and consecutive writes
	// are merged into one phase
	fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
		if operations.is_empty() {
			return super::error::check_address(address);
		}

		let mut tx = self.begin(address)?;
		let mut previous: Option<Direction> = None;
		for index in 0..operations.len() {
			let current = direction(&operations[index]);
			match previous {
				None => tx.send_address(address, current)?,
				Some(previous) if previous != current => {
					tx.repeated_start();
					tx.send_address(address, current)?;
				},
				Some(_) => (),
			}
			// ACK the last byte only if more bytes get read before the
			// direction changes; empty reads don't count
			let read_follows = operations[index + 1..].iter()
				.take_while(|op| direction(op) == Direction::Read)
				.any(|op| match op {
					Operation::Read(buffer) => !buffer.is_empty(),
					Operation::Write(_) => false,
				});
			match &mut operations[index] {
				Operation::Write(data) => tx.send(address, data)?,
				Operation::Read(buffer) => tx.receive(buffer, read_follows),
			}
			previous = Some(current);
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use embedded_hal::i2c::{
		Error,
		ErrorKind,
		I2c,
		NoAcknowledgeSource,
		Operation,
	};

	use crate::i2c::{
		BusError,
		Master,
	};
	use crate::sim::{
		Event,
		RegisterDevice,
		SimBus,
	};

	fn ack(value: u8) -> Event {
		Event::Byte { value, ack: true }
	}

	fn nack(value: u8) -> Event {
		Event::Byte { value, ack: false }
	}

	fn eeprom() -> Master<SimBus> {
		let device = RegisterDevice::new(0x50)
			.with_register(0x10, 0x81)
			.with_register(0x11, 0x82)
			.with_register(0x12, 0x83)
			.with_register(0x13, 0x84);
		Master::new(SimBus::new().with(device))
	}

	#[test]
	fn write_read_through_transaction() {
		let mut master = eeprom();
		let mut buffer = [0u8; 2];
		I2c::write_read(&mut master, 0x50, &[0x10], &mut buffer).unwrap();
		assert_eq!(buffer, [0x81, 0x82]);
		assert_eq!(master.hardware().events(), &[
			Event::Start,
			ack(0xa0),
			ack(0x10),
			Event::RepeatedStart,
			ack(0xa1),
			ack(0x81),
			nack(0x82),
			Event::Stop,
		]);
	}

	#[test]
	fn consecutive_reads_share_one_phase() {
		let mut master = eeprom();
		master.write(0x50, &[0x10]).unwrap();
		let mut first = [0u8; 1];
		let mut second = [0u8; 3];
		master.transaction(0x50, &mut [Operation::Read(&mut first), Operation::Read(&mut second)]).unwrap();
		assert_eq!(first, [0x81]);
		assert_eq!(second, [0x82, 0x83, 0x84]);
		let events = master.hardware().events();
		assert_eq!(&events[4..], &[
			Event::Start,
			ack(0xa1),
			ack(0x81),
			ack(0x82),
			ack(0x83),
			nack(0x84),
			Event::Stop,
		]);
	}

	// register 0x01 holds 0x00: a device that got an ACK for 0x81 would
	// hold DATA low for the next byte's MSB and block the stop
	fn eeprom_with_low_next_byte() -> Master<SimBus> {
		let device = RegisterDevice::new(0x50)
			.with_register(0x00, 0x81)
			.with_register(0x01, 0x00);
		Master::new(SimBus::new().with(device))
	}

	#[test]
	fn trailing_empty_read_still_nacks_last_byte() {
		let mut master = eeprom_with_low_next_byte();
		let mut first = [0u8; 1];
		let mut empty = [0u8; 0];
		master.transaction(0x50, &mut [Operation::Read(&mut first), Operation::Read(&mut empty)]).unwrap();
		assert_eq!(first, [0x81]);
		assert_eq!(master.hardware().events(), &[
			Event::Start,
			ack(0xa1),
			nack(0x81),
			Event::Stop,
		]);
		assert!(master.hardware().is_idle());
	}

	#[test]
	fn empty_read_before_direction_change() {
		let mut master = eeprom_with_low_next_byte();
		let mut first = [0u8; 1];
		let mut empty = [0u8; 0];
		master.transaction(0x50, &mut [
			Operation::Read(&mut first),
			Operation::Read(&mut empty),
			Operation::Write(&[0x00]),
		]).unwrap();
		assert_eq!(first, [0x81]);
		assert_eq!(master.hardware().events(), &[
			Event::Start,
			ack(0xa1),
			nack(0x81),
			Event::RepeatedStart,
			ack(0xa0),
			ack(0x00),
			Event::Stop,
		]);
		assert!(master.hardware().is_idle());
	}

	#[test]
	fn consecutive_writes_share_one_phase() {
		let mut master = eeprom();
		master.transaction(0x50, &mut [Operation::Write(&[0x20]), Operation::Write(&[0x01, 0x02])]).unwrap();
		assert_eq!(master.hardware().events(), &[
			Event::Start,
			ack(0xa0),
			ack(0x20),
			ack(0x01),
			ack(0x02),
			Event::Stop,
		]);
		let mut buffer = [0u8; 2];
		I2c::write_read(&mut master, 0x50, &[0x20], &mut buffer).unwrap();
		assert_eq!(buffer, [0x01, 0x02]);
	}

	#[test]
	fn error_kinds() {
		let mut master = Master::new(SimBus::new().with(RegisterDevice::new(0x50).accept_only(1)));

		let err = master.write(0x51, &[0x00]).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));

		let err = master.write(0x50, &[0x00, 0x01]).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));

		let mut buffer = [0u8; 1];
		let err = master.read(0x80, &mut buffer).unwrap_err();
		assert_eq!(err, BusError::InvalidAddress(0x80));
		assert_eq!(err.kind(), ErrorKind::Other);

		// each failed transfer still ended with a stop
		assert_eq!(master.hardware().count(Event::Start), 2);
		assert_eq!(master.hardware().count(Event::Stop), 2);
		assert!(master.hardware().is_idle());
	}

	#[test]
	fn empty_transaction_is_a_no_op() {
		let mut master = eeprom();
		master.transaction(0x50, &mut []).unwrap();
		assert!(master.hardware().events().is_empty());
		assert!(master.transaction(0x80, &mut []).is_err());
	}
}
