use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::io::FromRawFd;
use std::ptr;

use libc::{
	MAP_SHARED,
	O_CLOEXEC,
	O_RDWR,
	O_SYNC,
	PROT_READ,
	PROT_WRITE,
	c_void,
	mmap,
	munmap,
	open,
};

use crate::i2c::{
	Delay,
	Hardware,
	Line,
};

pub const GPIOMEM_PATH: &str = "/dev/gpiomem";

// the driver maps the GPIO block into one page
const MAP_LEN: usize = 4096;

const GPFSEL0: usize = 0x00;
const GPCLR0: usize = 0x28;
const GPLEV0: usize = 0x34;

// pins 0..=31 live in the first level/clear registers
const MAX_PIN: u32 = 31;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
enum Function {
	Input = 0b000,
	Output = 0b001,
}

/// 32-bit register access to the BCM2835 GPIO block
pub trait Registers {
	fn read_register(&self, offset: usize) -> u32;
	fn write_register(&mut self, offset: usize, value: u32);
}

#[derive(Debug)]
pub struct Mapped {
	ptr: ptr::NonNull<u8>,
	len: usize,
}

impl Drop for Mapped {
	fn drop(&mut self) {
		unsafe {
			let res = munmap(
				self.ptr.as_ptr() as *mut c_void,
				self.len,
			);
			if 0 != res {
				panic!("munmap failed: {}", io::Error::last_os_error());
			}
		}
	}
}

// the mapping isn't tied to the opening thread
unsafe impl Send for Mapped {}

impl Registers for Mapped {
	fn read_register(&self, offset: usize) -> u32 {
		assert!(offset & 3 == 0);
		assert!(offset + 3 < self.len);
		unsafe { ptr::read_volatile(self.ptr.as_ptr().add(offset) as *const u32) }
	}

	fn write_register(&mut self, offset: usize, value: u32) {
		assert!(offset & 3 == 0);
		assert!(offset + 3 < self.len);
		unsafe { ptr::write_volatile(self.ptr.as_ptr().add(offset) as *mut u32, value) }
	}
}

fn map(path: &str) -> io::Result<Mapped> {
	let path = CString::new(path)?;

	let fd = unsafe { open(path.as_ptr(), O_RDWR | O_CLOEXEC | O_SYNC) };
	if -1 == fd {
		return Err(io::Error::last_os_error());
	}
	// closes the fd on return; the mapping stays valid
	let _f = unsafe { fs::File::from_raw_fd(fd) };

	let area = unsafe {
		mmap(
			ptr::null_mut(),
			MAP_LEN,
			PROT_READ | PROT_WRITE,
			MAP_SHARED,
			fd,
			0,
		)
	};
	if area as usize == !0usize {
		return Err(io::Error::last_os_error());
	}
	match ptr::NonNull::new(area as *mut u8) {
		None => panic!("mmap shouldn't return NULL ever"),
		Some(area) => Ok(Mapped {
			ptr: area,
			len: MAP_LEN,
		}),
	}
}

/// Bus lines on two GPIOs of the memory mapped BCM2835 GPIO block.
///
/// A released line is an input; a driven line is an output with the level
/// cleared before switching, so it never drives high.
pub struct GpioMemLines<R: Registers, D: Delay> {
	registers: R,
	data: u32,
	clock: u32,
	delay: D,
}

impl<R: Registers, D: Delay> GpioMemLines<R, D> {
	pub fn new(registers: R, data: u32, clock: u32, delay: D) -> crate::AResult<Self> {
		ensure!(data <= MAX_PIN, "GPIO {} not supported for DATA (only 0..={})", data, MAX_PIN);
		ensure!(clock <= MAX_PIN, "GPIO {} not supported for CLOCK (only 0..={})", clock, MAX_PIN);
		ensure!(data != clock, "DATA and CLOCK need different GPIOs (both {})", data);

		let mut lines = GpioMemLines {
			registers,
			data,
			clock,
			delay,
		};
		lines.set_function(data, Function::Input);
		lines.set_function(clock, Function::Input);
		debug!("gpiomem lines: DATA {}, CLOCK {}", data, clock);
		Ok(lines)
	}

	fn pin(&self, line: Line) -> u32 {
		match line {
			Line::Data => self.data,
			Line::Clock => self.clock,
		}
	}

	fn set_function(&mut self, pin: u32, function: Function) {
		let offset = GPFSEL0 + 4 * (pin / 10) as usize;
		let shift = 3 * (pin % 10);
		let value = self.registers.read_register(offset);
		let value = (value & !(0b111 << shift)) | ((function as u32) << shift);
		self.registers.write_register(offset, value);
	}
}

impl<R: Registers, D: Delay> Hardware for GpioMemLines<R, D> {
	fn drive_low(&mut self, line: Line) {
		let pin = self.pin(line);
		self.registers.write_register(GPCLR0, 1 << pin);
		self.set_function(pin, Function::Output);
	}

	fn release(&mut self, line: Line) {
		let pin = self.pin(line);
		self.set_function(pin, Function::Input);
	}

	fn read_data(&mut self) -> bool {
		0 != self.registers.read_register(GPLEV0) & (1 << self.data)
	}

	fn delay(&mut self) {
		self.delay.delay();
	}
}

impl<R: Registers, D: Delay> Drop for GpioMemLines<R, D> {
	fn drop(&mut self) {
		let (data, clock) = (self.data, self.clock);
		self.set_function(data, Function::Input);
		self.set_function(clock, Function::Input);
	}
}

pub fn open_gpiomem<D: Delay>(data: u32, clock: u32, delay: D) -> crate::AResult<GpioMemLines<Mapped, D>> {
	let registers = with_context!(("map {}", GPIOMEM_PATH), Ok(map(GPIOMEM_PATH)?))?;
	GpioMemLines::new(registers, data, clock, delay)
}

#[cfg(test)]
mod test {
	use super::{
		GPCLR0,
		GPLEV0,
		GpioMemLines,
		Registers,
	};
	use crate::i2c::{
		BusyWait,
		Hardware,
		Line,
		Timing,
	};

	// register block in memory; keeps the last value written to GPCLR0
	struct Block([u32; 64]);

	impl Registers for Block {
		fn read_register(&self, offset: usize) -> u32 {
			self.0[offset / 4]
		}

		fn write_register(&mut self, offset: usize, value: u32) {
			self.0[offset / 4] = value;
		}
	}

	fn lines(data: u32, clock: u32) -> GpioMemLines<Block, BusyWait> {
		// every pin configured as output before
		let mut block = Block([0u32; 64]);
		for fsel in 0..6 {
			block.0[fsel] = 0o1111111111;
		}
		GpioMemLines::new(block, data, clock, BusyWait(Timing::default())).unwrap()
	}

	#[test]
	fn open_releases_both_lines() {
		let lines = lines(2, 3);
		// GPFSEL0: pins 2 and 3 input, all others untouched
		assert_eq!(lines.registers.0[0], 0o1111110011);
		assert_eq!(lines.registers.0[1], 0o1111111111);
	}

	#[test]
	fn function_select_register_and_shift() {
		let mut lines = lines(17, 27);
		// GPFSEL1 bits 21..24, GPFSEL2 bits 21..24
		assert_eq!(lines.registers.0[1], 0o1101111111);
		assert_eq!(lines.registers.0[2], 0o1101111111);

		lines.drive_low(Line::Clock);
		assert_eq!(lines.registers.0[2], 0o1111111111);
		assert_eq!(lines.registers.0[GPCLR0 / 4], 1 << 27);

		lines.release(Line::Clock);
		assert_eq!(lines.registers.0[2], 0o1101111111);
		assert_eq!(lines.registers.0[1], 0o1101111111);
	}

	#[test]
	fn data_level() {
		let mut lines = lines(2, 3);
		lines.registers.0[GPLEV0 / 4] = 1 << 3;
		assert!(!lines.read_data());
		lines.registers.0[GPLEV0 / 4] = 1 << 2;
		assert!(lines.read_data());
	}

	#[test]
	fn invalid_pins() {
		let block = || Block([0u32; 64]);
		let delay = || BusyWait(Timing::default());
		assert!(GpioMemLines::new(block(), 32, 3, delay()).is_err());
		assert!(GpioMemLines::new(block(), 2, 40, delay()).is_err());
		assert!(GpioMemLines::new(block(), 5, 5, delay()).is_err());
		assert!(GpioMemLines::new(block(), 0, 31, delay()).is_ok());
	}
}
