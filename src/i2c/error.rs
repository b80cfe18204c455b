use embedded_hal::i2c::{
	ErrorKind,
	NoAcknowledgeSource,
};

use super::Direction;

/// Failure of a single transfer.
///
/// On the wire there is only one way to fail: a byte wasn't acknowledged.
/// A missing device, a busy device and a glitch all look the same; the
/// variants only record where in the frame it happened.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Fail)]
pub enum BusError {
	#[fail(display = "no acknowledge from device 0x{:02x} for {} address", address, direction)]
	AddressNack {
		address: u8,
		direction: Direction,
	},
	#[fail(display = "no acknowledge from device 0x{:02x} for data byte {}", address, index)]
	DataNack {
		address: u8,
		index: usize,
	},
	#[fail(display = "invalid 7-bit device address 0x{:02x}", _0)]
	InvalidAddress(u8),
}

pub type BusResult<T> = Result<T, BusError>;

impl BusError {
	pub fn is_nack(&self) -> bool {
		match self {
			BusError::AddressNack { .. } | BusError::DataNack { .. } => true,
			BusError::InvalidAddress(_) => false,
		}
	}
}

impl embedded_hal::i2c::Error for BusError {
	fn kind(&self) -> ErrorKind {
		match self {
			BusError::AddressNack { .. } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
			BusError::DataNack { .. } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
			BusError::InvalidAddress(_) => ErrorKind::Other,
		}
	}
}

pub(super) fn check_address(address: u8) -> BusResult<()> {
	if address > 0x7f {
		return Err(BusError::InvalidAddress(address));
	}
	Ok(())
}
