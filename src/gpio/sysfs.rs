use std::fs;
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::{
	Path,
	PathBuf,
};
use std::thread;
use std::time::Duration;

use crate::i2c::{
	Delay,
	Hardware,
	Line,
};

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

// udev needs some time to fix permissions after exporting
const EXPORT_POLL: Duration = Duration::from_millis(10);
const EXPORT_ATTEMPTS: usize = 100;

fn write_attribute(path: &Path, data: &str) -> crate::AResult<()> {
	// sysfs attributes need to be written in one syscall
	fs::OpenOptions::new().write(true).open(path)?.write_all(data.as_bytes())?;
	Ok(())
}

/// One exported GPIO; open-drain is emulated by switching direction between
/// "in" (released) and "low" (output, latched low in the same write).
struct SysfsPin {
	root: PathBuf,
	pin: u32,
	exported: bool,
	direction: fs::File,
	value: fs::File,
}

fn unexport(root: &Path, pin: u32) {
	if let Err(e) = write_attribute(&root.join("unexport"), &pin.to_string()) {
		warn!("Failed to unexport GPIO {}: {}", pin, e);
	}
}

// direction and value attributes of an exported GPIO
fn open_attributes(dir: &Path, pin: u32, exported: bool) -> crate::AResult<(fs::File, fs::File)> {
	let direction_path = dir.join("direction");
	let mut attempt = 0;
	let direction = loop {
		match fs::OpenOptions::new().read(true).write(true).open(&direction_path) {
			Ok(f) => break f,
			Err(_) if exported && attempt < EXPORT_ATTEMPTS => {
				attempt += 1;
				thread::sleep(EXPORT_POLL);
			},
			Err(e) => bail!("open {:?}: {}", direction_path, e),
		}
	};
	let value = with_context!(("open value of GPIO {}", pin), {
		Ok(fs::File::open(dir.join("value"))?)
	})?;
	Ok((direction, value))
}

impl SysfsPin {
	fn open(root: &Path, pin: u32) -> crate::AResult<Self> {
		let dir = root.join(format!("gpio{}", pin));
		let exported = !dir.exists();
		if exported {
			with_context!(("export GPIO {}", pin),
				write_attribute(&root.join("export"), &pin.to_string())
			)?;
		}

		let (direction, value) = match open_attributes(&dir, pin, exported) {
			Ok(files) => files,
			Err(e) => {
				// don't leave a half set up GPIO behind
				if exported {
					unexport(root, pin);
				}
				return Err(e);
			},
		};

		let pin = SysfsPin {
			root: root.into(),
			pin,
			exported,
			direction,
			value,
		};
		pin.release();
		Ok(pin)
	}

	fn set_direction(&self, direction: &str) {
		let l = self.direction.write_at(direction.as_bytes(), 0).expect("write to GPIO direction must not fail");
		assert_eq!(l, direction.len(), "short write to GPIO {} direction", self.pin);
	}

	fn drive_low(&self) {
		self.set_direction("low");
	}

	fn release(&self) {
		self.set_direction("in");
	}

	fn is_high(&self) -> bool {
		let mut buf = [0u8];
		self.value.read_at(&mut buf, 0).expect("read from GPIO value must not fail");
		buf[0] == b'1'
	}
}

impl Drop for SysfsPin {
	fn drop(&mut self) {
		self.release();
		if self.exported {
			unexport(&self.root, self.pin);
		}
	}
}

/// Bus lines on two sysfs GPIOs.
///
/// Every edge costs a syscall, so the bus runs much slower than the
/// configured frequency; the delay still guarantees the minimum times.
pub struct SysfsLines<D: Delay> {
	data: SysfsPin,
	clock: SysfsPin,
	delay: D,
}

impl<D: Delay> SysfsLines<D> {
	fn pin(&self, line: Line) -> &SysfsPin {
		match line {
			Line::Data => &self.data,
			Line::Clock => &self.clock,
		}
	}
}

impl<D: Delay> Hardware for SysfsLines<D> {
	fn drive_low(&mut self, line: Line) {
		self.pin(line).drive_low();
	}

	fn release(&mut self, line: Line) {
		self.pin(line).release();
	}

	fn read_data(&mut self) -> bool {
		self.data.is_high()
	}

	fn delay(&mut self) {
		self.delay.delay();
	}
}

pub fn open_sysfs_at<D: Delay>(root: &Path, data: u32, clock: u32, delay: D) -> crate::AResult<SysfsLines<D>> {
	ensure!(data != clock, "DATA and CLOCK need different GPIOs (both {})", data);
	let data = SysfsPin::open(root, data)?;
	let clock = SysfsPin::open(root, clock)?;
	debug!("sysfs GPIO lines: DATA {}, CLOCK {}", data.pin, clock.pin);
	Ok(SysfsLines { data, clock, delay })
}

pub fn open_sysfs<D: Delay>(data: u32, clock: u32, delay: D) -> crate::AResult<SysfsLines<D>> {
	open_sysfs_at(Path::new(SYSFS_GPIO_ROOT), data, clock, delay)
}

#[cfg(test)]
mod test {
	use std::fs;
	use std::path::{
		Path,
		PathBuf,
	};

	use super::open_sysfs_at;
	use crate::i2c::{
		BusyWait,
		Hardware,
		Line,
		Timing,
	};

	// fake sysfs tree with already exported GPIOs
	fn fake_root(name: &str, pins: &[u32]) -> PathBuf {
		let root = std::env::temp_dir().join(format!("soft-i2c-sysfs-{}-{}", name, std::process::id()));
		let _ = fs::remove_dir_all(&root);
		for pin in pins {
			let dir = root.join(format!("gpio{}", pin));
			fs::create_dir_all(&dir).unwrap();
			fs::write(dir.join("direction"), "out").unwrap();
			fs::write(dir.join("value"), "1").unwrap();
		}
		root
	}

	fn direction(root: &Path, pin: u32) -> String {
		fs::read_to_string(root.join(format!("gpio{}/direction", pin))).unwrap()
	}

	#[test]
	fn lines_switch_direction() {
		let root = fake_root("direction", &[2, 3]);
		{
			let mut lines = open_sysfs_at(&root, 2, 3, BusyWait(Timing::default())).unwrap();
			// opening releases both lines
			assert!(direction(&root, 2).starts_with("in"));
			assert!(direction(&root, 3).starts_with("in"));

			lines.drive_low(Line::Clock);
			assert_eq!(direction(&root, 3), "low");
			assert!(direction(&root, 2).starts_with("in"));

			lines.release(Line::Clock);
			assert!(direction(&root, 3).starts_with("in"));

			assert!(lines.read_data());
			fs::write(root.join("gpio2/value"), "0").unwrap();
			assert!(!lines.read_data());
		}
		// pins weren't exported by us: no unexport on drop
		assert!(!root.join("unexport").exists());
		fs::remove_dir_all(&root).unwrap();
	}

	#[test]
	fn same_pin_twice_fails() {
		let root = fake_root("same", &[4]);
		assert!(open_sysfs_at(&root, 4, 4, BusyWait(Timing::default())).is_err());
		fs::remove_dir_all(&root).unwrap();
	}

	#[test]
	fn failed_open_unexports_again() {
		// export "works", but the GPIO directory never shows up
		let root = fake_root("unexport", &[]);
		fs::create_dir_all(&root).unwrap();
		fs::write(root.join("export"), "").unwrap();
		fs::write(root.join("unexport"), "").unwrap();
		assert!(open_sysfs_at(&root, 7, 8, BusyWait(Timing::default())).is_err());
		assert_eq!(fs::read_to_string(root.join("export")).unwrap(), "7");
		assert_eq!(fs::read_to_string(root.join("unexport")).unwrap(), "7");
		fs::remove_dir_all(&root).unwrap();
	}

	#[test]
	fn missing_gpio_fails() {
		// no export file: exporting fails
		let root = fake_root("missing", &[]);
		fs::create_dir_all(&root).unwrap();
		assert!(open_sysfs_at(&root, 5, 6, BusyWait(Timing::default())).is_err());
		fs::remove_dir_all(&root).unwrap();
	}
}
