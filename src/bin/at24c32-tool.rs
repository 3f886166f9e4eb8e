#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate at24c32_eeprom;
use at24c32_eeprom::*;

use std::fs;
use std::io::{
	self,
	Write,
};
use std::process::exit;
use std::time::Duration;

use at24c32_eeprom::at24c32::{
	CAPACITY,
	DEFAULT_ADDRESS,
	DEFAULT_SETTLE_DELAY,
};
use at24c32_eeprom::i2c::I2cDev;

const DEFAULT_BUS: &str = "/dev/i2c-1";

fn parse_number(s: &str) -> AResult<u64> {
	if s.starts_with("0x") || s.starts_with("0X") {
		Ok(u64::from_str_radix(&s[2..], 16)?)
	} else {
		Ok(s.parse::<u64>()?)
	}
}

fn get_number(matches: &clap::ArgMatches, name: &str, max: u64) -> AResult<Option<u64>> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => return Ok(None),
	};
	let value = parse_number(param).map_err(|e| -> failure::Error {
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})?;
	ensure!(value <= max, "parameter {} out of range: {} (max {})", name, value, max);
	Ok(Some(value))
}

fn get_start_address(matches: &clap::ArgMatches) -> AResult<u16> {
	match get_number(matches, "ADDRESS", 0xffff)? {
		Some(a) => Ok(a as u16),
		None => bail!("missing parameter ADDRESS"),
	}
}

// "deadbeef", "de ad be ef" and "0xdeadbeef" are all accepted
fn parse_hex_bytes(s: &str) -> AResult<Vec<u8>> {
	let s = if s.starts_with("0x") || s.starts_with("0X") { &s[2..] } else { s };
	let digits: Vec<u8> = s.bytes().filter(|c| !c.is_ascii_whitespace()).collect();
	ensure!(!digits.is_empty(), "no data given");
	ensure!(0 == digits.len() % 2, "odd number of hex digits: {}", digits.len());

	digits.chunks(2).map(|pair| -> AResult<u8> {
		let pair = std::str::from_utf8(pair)?;
		Ok(u8::from_str_radix(pair, 16).map_err(|e| format_err!("invalid hex byte {:?}: {}", pair, e))?)
	}).collect()
}

fn print_hex(start: u16, data: &[u8]) {
	for (i, b) in data.iter().enumerate() {
		if 0 == i % 16 {
			print!("{:04x} ", start.wrapping_add(i as u16));
		} else if 0 == i % 8 {
			print!(" ");
		}
		print!(" {:02x}", b);
		if 15 == i % 16 {
			println!();
		}
	}
	if 0 != data.len() % 16 {
		println!();
	}
}

fn open_eeprom(matches: &clap::ArgMatches) -> AResult<Eeprom<I2cDev>> {
	let bus_path = matches.value_of("bus").unwrap_or(DEFAULT_BUS);
	let address = get_number(matches, "address", 0x7f)?.map(|a| a as u8).unwrap_or(DEFAULT_ADDRESS);
	let settle_delay = get_number(matches, "settle", u64::from(u32::max_value()))?
		.map(Duration::from_millis)
		.unwrap_or(DEFAULT_SETTLE_DELAY);

	let bus = i2c::open_bus(bus_path)?;
	debug!("{}: EEPROM at 0x{:02x}, settle delay {:?}", bus_path, address, settle_delay);
	Ok(Eeprom::with_address(bus, address).with_settle_delay(settle_delay))
}

fn read(matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> AResult<()> {
	let start = get_start_address(sub_m)?;
	let length = get_number(sub_m, "LENGTH", 0x1_0000)?.unwrap_or(1) as usize;

	let mut eeprom = open_eeprom(matches)?;
	let data = eeprom.read(start, length)?;
	print_hex(start, &data);

	Ok(())
}

fn write(matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> AResult<()> {
	let start = get_start_address(sub_m)?;
	let data = match sub_m.value_of("DATA") {
		Some(d) => parse_hex_bytes(d)?,
		None => bail!("missing parameter DATA"),
	};
	let verify = sub_m.is_present("verify");

	let mut eeprom = open_eeprom(matches)?;
	eeprom.write(&data, start)?;
	info!("Wrote {} byte(s) at 0x{:04x}", data.len(), start);

	if verify {
		let stored = eeprom.read(start, data.len())?;
		for offset in 0..data.len() {
			ensure!(stored[offset] == data[offset],
				"Verify failed at {:04x}: expected {:02x}, eeprom is {:02x}",
				start.wrapping_add(offset as u16), data[offset], stored[offset]
			);
		}
		info!("Verified {} byte(s)", data.len());
	}

	Ok(())
}

fn dump(matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> AResult<()> {
	let mut eeprom = open_eeprom(matches)?;
	info!("Reading {} bytes, this takes a while (one settle delay per byte)", CAPACITY);
	let image = eeprom.read(0, CAPACITY)?;

	match sub_m.value_of("output") {
		Some(path) => {
			fs::write(path, &image).map_err(|e| -> failure::Error {
				let msg = format!("{}: write dump", path);
				failure::Error::from(e).context(msg).into()
			})?;
			info!("Wrote dump to {}", path);
		},
		None => {
			io::stdout().write_all(&image)?;
		},
	}

	Ok(())
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg bus: -b --bus +takes_value "I2C bus device (default: /dev/i2c-1)")
		(@arg address: -a --address +takes_value "7-bit I2C address of the EEPROM (default: 0x50)")
		(@arg settle: -s --settle +takes_value "delay after each transaction in ms (default: 100)")
		(@subcommand read =>
			(about: "read bytes and print them as hex dump")
			(@arg ADDRESS: +required "first EEPROM address to read")
			(@arg LENGTH: "number of bytes to read (default: 1)")
		)
		(@subcommand write =>
			(about: "write bytes given as hex string")
			(@arg verify: --verify "read data back after writing")
			(@arg ADDRESS: +required "first EEPROM address to write")
			(@arg DATA: +required "data as hex string, e.g. \"deadbeef\"")
		)
		(@subcommand dump =>
			(about: "dump the whole EEPROM as binary")
			(@arg output: -o --output +takes_value "write to file instead of stdout")
		)
	).get_matches();

	match matches.subcommand() {
		("read", Some(sub_m)) => {
			read(&matches, sub_m)
		},
		("write", Some(sub_m)) => {
			write(&matches, sub_m)
		},
		("dump", Some(sub_m)) => {
			dump(&matches, sub_m)
		},
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
