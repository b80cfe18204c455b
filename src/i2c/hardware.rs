use std::hint;
use std::thread;
use std::time::{
	Duration,
	Instant,
};

// each bit on the wire takes three delays: setup, clock high, clock low
const DELAYS_PER_BIT: u32 = 3;

pub const DEFAULT_FREQUENCY: u32 = 100_000;
pub const MAX_FREQUENCY: u32 = 400_000;

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

pub fn busy_wait(duration: Duration) {
	let now = Instant::now();
	while now.elapsed() < duration {
		hint::spin_loop();
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Line {
	Data,
	Clock,
}

/// Length of a single delay unit, derived from the bus frequency
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Timing {
	unit: Duration,
}

impl Timing {
	pub fn from_frequency(frequency: u32) -> crate::AResult<Self> {
		ensure!(frequency > 0, "bus frequency must not be zero");
		ensure!(frequency <= MAX_FREQUENCY, "bus frequency {} Hz above {} Hz", frequency, MAX_FREQUENCY);
		Ok(Timing::for_frequency(frequency))
	}

	fn for_frequency(frequency: u32) -> Self {
		let bit_ns = 1_000_000_000u64 / u64::from(frequency);
		Timing {
			unit: Duration::from_nanos(bit_ns / u64::from(DELAYS_PER_BIT)),
		}
	}

	pub fn unit(&self) -> Duration {
		self.unit
	}
}

impl Default for Timing {
	fn default() -> Self {
		Timing::for_frequency(DEFAULT_FREQUENCY)
	}
}

/// Time source for the settling delay after each line transition
pub trait Delay {
	fn delay(&mut self);
}

/// Spin until a delay unit passed; doesn't give up the CPU.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BusyWait(pub Timing);

impl Delay for BusyWait {
	fn delay(&mut self) {
		busy_wait(self.0.unit());
	}
}

/// Sleep for (at least) a delay unit; the scheduler usually makes this a lot
/// longer than requested.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Sleep(pub Timing);

impl Delay for Sleep {
	fn delay(&mut self) {
		reliable_sleep(self.0.unit());
	}
}

impl<D: Delay + ?Sized> Delay for Box<D> {
	fn delay(&mut self) {
		D::delay(self)
	}
}

pub trait Hardware {
	// pull line low
	fn drive_low(&mut self, line: Line);
	// stop driving; pull-up (or a device) decides the level
	fn release(&mut self, line: Line);
	// level of the (released) DATA line; `true` is high
	fn read_data(&mut self) -> bool;

	// delay for (at least) one delay unit
	fn delay(&mut self) {
		busy_wait(Timing::default().unit());
	}
}

impl<H: Hardware + ?Sized> Hardware for Box<H> {
	fn drive_low(&mut self, line: Line) {
		H::drive_low(self, line)
	}
	fn release(&mut self, line: Line) {
		H::release(self, line)
	}
	fn read_data(&mut self) -> bool {
		H::read_data(self)
	}
	fn delay(&mut self) {
		H::delay(self)
	}
}

#[cfg(test)]
mod test {
	use std::time::{
		Duration,
		Instant,
	};

	use super::*;

	#[test]
	fn timing_from_frequency() {
		// 10 µs per bit at 100 kHz, split into three delays
		assert_eq!(Timing::default().unit(), Duration::from_nanos(3333));
		assert_eq!(Timing::from_frequency(400_000).unwrap().unit(), Duration::from_nanos(833));
		assert_eq!(Timing::from_frequency(1).unwrap().unit(), Duration::from_nanos(333_333_333));
		assert!(Timing::from_frequency(0).is_err());
		assert!(Timing::from_frequency(400_001).is_err());
		assert!(Timing::from_frequency(1_000_000).is_err());
	}

	fn check_waits_at_least<D: Delay>(mut delay: D, unit: Duration) {
		let now = Instant::now();
		delay.delay();
		assert!(now.elapsed() >= unit, "{:?} returned early", now.elapsed());
	}

	#[test]
	fn delays_wait_a_full_unit() {
		let timing = Timing::from_frequency(1_000).unwrap();
		check_waits_at_least(BusyWait(timing), timing.unit());
		check_waits_at_least(Sleep(timing), timing.unit());
		let boxed: Box<dyn Delay> = Box::new(BusyWait(timing));
		check_waits_at_least(boxed, timing.unit());
	}
}
