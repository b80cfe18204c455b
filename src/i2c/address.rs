use std::fmt;
use std::str;

/// Parse a byte given either decimal or as `0x`-prefixed hex
pub fn parse_byte(s: &str) -> crate::AResult<u8> {
	let value = if s.starts_with("0x") || s.starts_with("0X") {
		with_context!(("invalid hex byte: {:?}", s),
			Ok(u8::from_str_radix(&s[2..], 16)?)
		)?
	} else {
		with_context!(("invalid byte: {:?}", s),
			Ok(s.parse::<u8>()?)
		)?
	};
	Ok(value)
}

/// 7-bit device address (without the direction bit)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DeviceAddress(u8);

impl DeviceAddress {
	pub fn new(address: u8) -> crate::AResult<Self> {
		ensure!(address <= 0x7f, "device address 0x{:02x} doesn't fit in 7 bits", address);
		Ok(DeviceAddress(address))
	}

	pub fn get(&self) -> u8 {
		self.0
	}

	// every 7-bit address, ascending
	pub fn all() -> impl Iterator<Item = DeviceAddress> {
		(0x00..=0x7f).map(DeviceAddress)
	}

	// addresses 0x00-0x07 and 0x78-0x7f are reserved (general call, CBUS,
	// high speed master code, 10-bit addressing, ...)
	pub fn is_reserved(&self) -> bool {
		self.0 < 0x08 || self.0 > 0x77
	}
}

impl fmt::Display for DeviceAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl str::FromStr for DeviceAddress {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		DeviceAddress::new(parse_byte(s)?)
	}
}
