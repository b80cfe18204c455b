//! In-process I²C bus for exercising the master without hardware
//!
//! Both lines are wired-AND: a line is high only if the master and every
//! attached device released it. Devices react to clock edges like real
//! ones (sample on rising CLOCK, change DATA after falling CLOCK), and a
//! bus monitor decodes what happened on the wire into `Event`s.
//!
//! Delays cost nothing; every line change, delay and sample is recorded as a
//! `Step` so timing discipline can be checked afterwards.

mod device;

pub use self::device::{
	RegisterDevice,
	Target,
};

use self::device::Peer;

use crate::i2c::{
	Hardware,
	Line,
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Event {
	Start,
	RepeatedStart,
	// `ack`: DATA was low during the ninth clock
	Byte { value: u8, ack: bool },
	Stop,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Step {
	Low(Line),
	Release(Line),
	Delay,
	Sample(bool),
}

#[derive(Default)]
struct Monitor {
	in_transfer: bool,
	bits: Vec<bool>,
	sampled: Vec<bool>,
	events: Vec<Event>,
}

impl Monitor {
	fn start(&mut self) {
		self.events.push(if self.in_transfer { Event::RepeatedStart } else { Event::Start });
		self.in_transfer = true;
		self.bits.clear();
	}

	fn stop(&mut self) {
		// the rising CLOCK edge of the stop condition itself was recorded as
		// a stray bit
		self.events.push(Event::Stop);
		self.in_transfer = false;
		self.bits.clear();
	}

	fn clock_rising(&mut self, data: bool) {
		if !self.in_transfer {
			return;
		}
		self.bits.push(data);
		if self.bits.len() == 9 {
			let value = self.bits[..8].iter().fold(0u8, |byte, &bit| (byte << 1) | bit as u8);
			self.events.push(Event::Byte { value, ack: !self.bits[8] });
			self.sampled.extend_from_slice(&self.bits);
			self.bits.clear();
		}
	}
}

pub struct SimBus {
	master_data: bool,
	master_clock: bool,
	data_level: bool,
	clock_level: bool,
	peers: Vec<Peer>,
	monitor: Monitor,
	steps: Vec<Step>,
}

impl SimBus {
	// idle bus (both lines pulled up) without any devices
	pub fn new() -> Self {
		SimBus {
			master_data: true,
			master_clock: true,
			data_level: true,
			clock_level: true,
			peers: Vec::new(),
			monitor: Monitor::default(),
			steps: Vec::new(),
		}
	}

	pub fn with<T: Target + Send + 'static>(mut self, target: T) -> Self {
		self.attach(target);
		self
	}

	pub fn attach<T: Target + Send + 'static>(&mut self, target: T) {
		self.peers.push(Peer::new(Box::new(target)));
	}

	pub fn events(&self) -> &[Event] {
		&self.monitor.events
	}

	// DATA bits of all complete bytes (8 data bits + ACK bit each), in wire
	// order
	pub fn sampled_bits(&self) -> &[bool] {
		&self.monitor.sampled
	}

	pub fn steps(&self) -> &[Step] {
		&self.steps
	}

	pub fn count(&self, event: Event) -> usize {
		self.monitor.events.iter().filter(|&&e| e == event).count()
	}

	pub fn is_idle(&self) -> bool {
		self.data_level && self.clock_level && !self.monitor.in_transfer
	}

	fn data_line(&self) -> bool {
		self.master_data && self.peers.iter().all(|p| p.data_released())
	}

	// propagate a master line change to monitor and devices
	fn update(&mut self) {
		let clock = self.master_clock;
		let data = self.data_line();

		if self.clock_level && clock {
			if self.data_level && !data {
				self.monitor.start();
				for peer in &mut self.peers {
					peer.start_condition();
				}
			} else if !self.data_level && data {
				self.monitor.stop();
				for peer in &mut self.peers {
					peer.stop_condition();
				}
			}
		} else if !self.clock_level && clock {
			self.monitor.clock_rising(data);
			for peer in &mut self.peers {
				peer.clock_rising(data);
			}
		} else if self.clock_level && !clock {
			for peer in &mut self.peers {
				peer.clock_falling();
			}
		}

		self.clock_level = clock;
		// devices only change DATA after a falling clock
		self.data_level = self.data_line();
	}

	fn set_line(&mut self, line: Line, released: bool) {
		match line {
			Line::Data => self.master_data = released,
			Line::Clock => self.master_clock = released,
		}
		self.update();
	}
}

impl Default for SimBus {
	fn default() -> Self {
		SimBus::new()
	}
}

impl Hardware for SimBus {
	fn drive_low(&mut self, line: Line) {
		self.steps.push(Step::Low(line));
		self.set_line(line, false);
	}

	fn release(&mut self, line: Line) {
		self.steps.push(Step::Release(line));
		self.set_line(line, true);
	}

	fn read_data(&mut self) -> bool {
		let data = self.data_line();
		self.steps.push(Step::Sample(data));
		data
	}

	fn delay(&mut self) {
		self.steps.push(Step::Delay);
	}
}
