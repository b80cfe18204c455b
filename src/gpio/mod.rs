//! Linux GPIO backends: two pins as open-drain bus lines.
//!
//! `sysfs` works with any GPIO controller the kernel knows about; `gpiomem`
//! maps the BCM2835 (Raspberry Pi) GPIO block and is a lot faster.

mod mapped;
mod sysfs;

pub use self::mapped::{
	GPIOMEM_PATH,
	GpioMemLines,
	Mapped,
	Registers,
	open_gpiomem,
};
pub use self::sysfs::{
	SYSFS_GPIO_ROOT,
	SysfsLines,
	open_sysfs,
	open_sysfs_at,
};

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Backend {
	Sysfs,
	GpioMem,
}

impl Backend {
	pub const NAMES: &'static [&'static str] = &["sysfs", "gpiomem"];
}

impl fmt::Display for Backend {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Backend::Sysfs => write!(f, "sysfs"),
			Backend::GpioMem => write!(f, "gpiomem"),
		}
	}
}

impl FromStr for Backend {
	type Err = failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"sysfs" => Ok(Backend::Sysfs),
			"gpiomem" => Ok(Backend::GpioMem),
			_ => bail!("unknown GPIO backend {:?} (expected one of {:?})", s, Backend::NAMES),
		}
	}
}

#[cfg(test)]
mod test {
	use super::Backend;

	#[test]
	fn backend_names() {
		for name in Backend::NAMES {
			let backend: Backend = name.parse().unwrap();
			assert_eq!(backend.to_string(), *name);
		}
		assert!("pigpio".parse::<Backend>().is_err());
	}
}
