#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate soft_i2c;
use soft_i2c::*;

use std::process::exit;

use soft_i2c::gpio::Backend;
use soft_i2c::i2c::{
	BusyWait,
	Delay,
	DeviceAddress,
	Hardware,
	Master,
	Sleep,
	Timing,
	parse_byte,
};

type Bus = Master<Box<dyn Hardware>>;

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_byte(matches: &clap::ArgMatches, name: &str) -> AResult<u8> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	parse_byte(param).map_err(|e| {
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn open_bus(matches: &clap::ArgMatches) -> AResult<Bus> {
	let backend: Backend = get_param(matches, "backend")?;
	let sda: u32 = get_param(matches, "sda")?;
	let scl: u32 = get_param(matches, "scl")?;
	let frequency: u32 = get_param(matches, "frequency")?;
	let timing = Timing::from_frequency(frequency)?;

	let delay: Box<dyn Delay> = if matches.is_present("sleep") {
		Box::new(Sleep(timing))
	} else {
		Box::new(BusyWait(timing))
	};
	let hardware: Box<dyn Hardware> = match backend {
		Backend::Sysfs => Box::new(gpio::open_sysfs(sda, scl, delay)?),
		Backend::GpioMem => Box::new(gpio::open_gpiomem(sda, scl, delay)?),
	};
	info!("{} backend: SDA GPIO {}, SCL GPIO {}, {} Hz", backend, sda, scl, frequency);

	Ok(Master::new(hardware))
}

fn hex_dump(data: &[u8]) {
	for i in 0..data.len() {
		if 0 == i % 16 {
			print!("{:02x}:", i);
		} else if 0 == i % 8 {
			print!(" ");
		}
		print!(" {:02x}", data[i]);
		if 15 == i % 16 {
			println!("");
		}
	}
	if 0 != data.len() % 16 {
		println!("");
	}
}

fn scan(bus: &mut Bus) -> AResult<()> {
	let found = bus.scan();
	for &address in &found {
		println!("0x{:02x}", address);
	}
	info!("{} device(s) found", found.len());
	Ok(())
}

fn read(bus: &mut Bus, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address: DeviceAddress = get_param(sub_m, "ADDRESS")?;
	let length: usize = get_param(sub_m, "LENGTH")?;

	let data = bus.read_frame(address.get(), length)?;
	hex_dump(&data);
	Ok(())
}

fn write(bus: &mut Bus, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address: DeviceAddress = get_param(sub_m, "ADDRESS")?;
	let data = match sub_m.values_of("BYTES") {
		Some(values) => values.map(parse_byte).collect::<AResult<Vec<u8>>>()?,
		None => bail!("missing parameter BYTES"),
	};

	bus.write_frame(address.get(), &data)?;
	info!("wrote {} byte(s) to {}", data.len(), address);
	Ok(())
}

fn read_register(bus: &mut Bus, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address: DeviceAddress = get_param(sub_m, "ADDRESS")?;
	let register = get_byte(sub_m, "REGISTER")?;

	let value = bus.read_register(address.get(), register)?;
	println!("0x{:02x}", value);
	Ok(())
}

fn write_register(bus: &mut Bus, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address: DeviceAddress = get_param(sub_m, "ADDRESS")?;
	let register = get_byte(sub_m, "REGISTER")?;
	let value = get_byte(sub_m, "VALUE")?;

	bus.write_register(address.get(), register, value)?;
	Ok(())
}

fn dump(bus: &mut Bus, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address: DeviceAddress = get_param(sub_m, "ADDRESS")?;
	let length: usize = if sub_m.is_present("LENGTH") {
		get_param(sub_m, "LENGTH")?
	} else {
		256
	};

	let mut data = vec![0u8; length];
	bus.write_read(address.get(), &[0x00], &mut data)?;
	hex_dump(&data);
	Ok(())
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg backend: -b --backend +takes_value default_value("sysfs") "GPIO backend (sysfs or gpiomem)")
		(@arg sda: --sda +takes_value +required "GPIO number of the DATA line")
		(@arg scl: --scl +takes_value +required "GPIO number of the CLOCK line")
		(@arg frequency: -f --frequency +takes_value default_value("100000") "bus frequency in Hz (at most 400000)")
		(@arg sleep: --sleep "sleep instead of busy waiting between line transitions")
		(@subcommand scan =>
			(about: "list addresses acknowledged on the bus")
		)
		(@subcommand read =>
			(about: "read bytes from a device")
			(@arg ADDRESS: +required "7-bit device address")
			(@arg LENGTH: +required "number of bytes")
		)
		(@subcommand write =>
			(about: "write bytes to a device")
			(@arg ADDRESS: +required "7-bit device address")
			(@arg BYTES: +required +multiple "bytes to write")
		)
		(@subcommand read_register =>
			(about: "read a single register")
			(@arg ADDRESS: +required "7-bit device address")
			(@arg REGISTER: +required "register number")
		)
		(@subcommand write_register =>
			(about: "write a single register")
			(@arg ADDRESS: +required "7-bit device address")
			(@arg REGISTER: +required "register number")
			(@arg VALUE: +required "register value")
		)
		(@subcommand dump =>
			(about: "hex dump registers starting at 0x00")
			(@arg ADDRESS: +required "7-bit device address")
			(@arg LENGTH: "number of bytes (default 256)")
		)
	).get_matches();

	let mut bus = open_bus(&matches)?;

	match matches.subcommand() {
		("scan", _) => {
			scan(&mut bus)
		}
		("read", Some(sub_m)) => {
			read(&mut bus, sub_m)
		}
		("write", Some(sub_m)) => {
			write(&mut bus, sub_m)
		}
		("read_register", Some(sub_m)) => {
			read_register(&mut bus, sub_m)
		}
		("write_register", Some(sub_m)) => {
			write_register(&mut bus, sub_m)
		}
		("dump", Some(sub_m)) => {
			dump(&mut bus, sub_m)
		}
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
