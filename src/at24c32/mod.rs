//! Driver for AT24C32-class I2C serial EEPROMs (4 KiB, 32 Kbit).
//!
//! Datasheet: https://ww1.microchip.com/downloads/en/DeviceDoc/doc0336.pdf
//!
//! Every transaction starts with the 16-bit word address, high byte first:
//! - byte write: `[hi, lo, data]`, then the chip is busy for its write cycle
//! - random read: `[hi, lo]` to load the address pointer, then read one byte
//!
//! The driver writes one byte per write cycle (no page writes) and waits a
//! fixed settle delay after every address or data transaction.

use std::time::Duration;

use crate::i2c::{
	I2cBus,
	ScopedLock,
};

mod payload;

pub use self::payload::Payload;

pub const DEFAULT_ADDRESS: u8 = 0x50;
pub const CAPACITY: usize = 4096;
pub const PAGE_SIZE: usize = 32;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Word address of `start + offset`, modulo 2^16, as sent on the wire.
pub fn word_address(start: u16, offset: usize) -> [u8; 2] {
	let address = start.wrapping_add(offset as u16);
	[(address >> 8) as u8, address as u8]
}

#[derive(Debug)]
pub struct Eeprom<B: I2cBus> {
	bus: B,
	address: u8,
	settle_delay: Duration,
}

impl<B: I2cBus> Eeprom<B> {
	pub fn new(bus: B) -> Self {
		Self::with_address(bus, DEFAULT_ADDRESS)
	}

	/// `address` has to match the A0..A2 strapping of the chip; nothing is
	/// sent on the bus to check it.
	pub fn with_address(bus: B, address: u8) -> Self {
		assert!(address <= 0x7f, "7-bit I2C address expected, got 0x{:02x}", address);
		Eeprom {
			bus,
			address,
			settle_delay: DEFAULT_SETTLE_DELAY,
		}
	}

	pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
		self.settle_delay = settle_delay;
		self
	}

	pub fn address(&self) -> u8 {
		self.address
	}

	pub fn settle_delay(&self) -> Duration {
		self.settle_delay
	}

	pub fn bus(&self) -> &B {
		&self.bus
	}

	pub fn bus_mut(&mut self) -> &mut B {
		&mut self.bus
	}

	pub fn into_bus(self) -> B {
		self.bus
	}

	/// Write `value` byte by byte, starting at `start_address`.
	///
	/// Stops at the first failing transaction; bytes before it are already
	/// stored on the chip, bytes after it are not attempted.
	pub fn write<'a, P: Into<Payload<'a>>>(&mut self, value: P, start_address: u16) -> crate::AResult<()> {
		let value = value.into();
		let data = value.as_bytes();
		if data.is_empty() {
			return Ok(());
		}
		debug!("EEPROM 0x{:02x}: write {} byte(s) at 0x{:04x}", self.address, data.len(), start_address);

		let (address, settle_delay) = (self.address, self.settle_delay);
		let mut bus = ScopedLock::acquire(&mut self.bus)?;
		for (offset, &byte) in data.iter().enumerate() {
			let [hi, lo] = word_address(start_address, offset);
			bus.transmit(address, &[hi, lo, byte])?;
			bus.settle(settle_delay);
		}
		Ok(())
	}

	pub fn write_byte(&mut self, value: u8, start_address: u16) -> crate::AResult<()> {
		self.write(Payload::Byte(value), start_address)
	}

	pub fn write_bytes(&mut self, value: &[u8], start_address: u16) -> crate::AResult<()> {
		self.write(Payload::Bytes(value), start_address)
	}

	/// Fill `target` from consecutive addresses starting at `start_address`.
	///
	/// On error `target` is left partially filled; its contents shouldn't be
	/// trusted.
	pub fn read_into(&mut self, start_address: u16, target: &mut [u8]) -> crate::AResult<()> {
		if target.is_empty() {
			return Ok(());
		}
		debug!("EEPROM 0x{:02x}: read {} byte(s) at 0x{:04x}", self.address, target.len(), start_address);

		let (address, settle_delay) = (self.address, self.settle_delay);
		let mut bus = ScopedLock::acquire(&mut self.bus)?;
		for (offset, t) in target.iter_mut().enumerate() {
			bus.transmit(address, &word_address(start_address, offset))?;
			bus.settle(settle_delay);
			bus.receive(address, std::slice::from_mut(t))?;
		}
		Ok(())
	}

	pub fn read(&mut self, start_address: u16, size: usize) -> crate::AResult<Vec<u8>> {
		let mut buf = vec![0u8; size];
		self.read_into(start_address, &mut buf)?;
		Ok(buf)
	}

	pub fn read_byte(&mut self, address: u16) -> crate::AResult<u8> {
		let mut buf = [0u8];
		self.read_into(address, &mut buf)?;
		Ok(buf[0])
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::i2c::{
		SimulatedAt24c32,
		Transaction,
		TransportError,
	};

	fn transmit(bytes: &[u8]) -> Transaction {
		Transaction::Transmit { address: 0x50, bytes: bytes.to_vec() }
	}

	fn receive_one() -> Transaction {
		Transaction::Receive { address: 0x50, len: 1 }
	}

	#[test]
	fn word_address_is_big_endian() {
		assert_eq!(word_address(0x0010, 0), [0x00, 0x10]);
		assert_eq!(word_address(0x0fff, 0), [0x0f, 0xff]);
		assert_eq!(word_address(0x00ff, 1), [0x01, 0x00]);
	}

	#[test]
	fn word_address_wraps_at_16_bits() {
		assert_eq!(word_address(0xffff, 1), [0x00, 0x00]);
		assert_eq!(word_address(0xfffe, 3), [0x00, 0x01]);
	}

	#[test]
	fn new_performs_no_io() {
		let chip = SimulatedAt24c32::new();
		let eeprom = Eeprom::new(chip);
		assert_eq!(eeprom.address(), DEFAULT_ADDRESS);
		assert_eq!(eeprom.settle_delay(), Duration::from_millis(100));
		let chip = eeprom.into_bus();
		assert!(chip.transactions().is_empty());
		assert_eq!(chip.lock_count(), 0);
	}

	#[test]
	#[should_panic]
	fn eight_bit_address_is_rejected() {
		Eeprom::with_address(SimulatedAt24c32::new(), 0xa0);
	}

	#[test]
	fn write_single_byte() {
		let mut eeprom = Eeprom::new(SimulatedAt24c32::new());
		eeprom.write(0x42u8, 0x0010).unwrap();

		let chip = eeprom.bus();
		assert_eq!(chip.transactions(), &[transmit(&[0x00, 0x10, 0x42])]);
		assert_eq!(chip.settles(), &[Duration::from_millis(100)]);
		assert_eq!(chip.memory()[0x10], 0x42);
	}

	#[test]
	fn write_is_one_transaction_per_byte() {
		let mut eeprom = Eeprom::new(SimulatedAt24c32::new());
		eeprom.write(&[1u8, 2, 3], 0x01fe).unwrap();

		let chip = eeprom.bus();
		assert_eq!(chip.transactions(), &[
			transmit(&[0x01, 0xfe, 1]),
			transmit(&[0x01, 0xff, 2]),
			transmit(&[0x02, 0x00, 3]),
		]);
		assert_eq!(chip.settles().len(), 3);
	}

	#[test]
	fn read_sets_address_then_reads_one_byte() {
		let mut chip = SimulatedAt24c32::new();
		chip.memory_mut()[0x10..0x13].copy_from_slice(&[7, 8, 9]);
		let mut eeprom = Eeprom::new(chip);

		assert_eq!(eeprom.read(0x0010, 3).unwrap(), vec![7, 8, 9]);

		let chip = eeprom.bus();
		assert_eq!(chip.transactions(), &[
			transmit(&[0x00, 0x10]), receive_one(),
			transmit(&[0x00, 0x11]), receive_one(),
			transmit(&[0x00, 0x12]), receive_one(),
		]);
		assert_eq!(chip.settles().len(), 3);
	}

	#[test]
	fn empty_read_and_write_touch_nothing() {
		let mut eeprom = Eeprom::new(SimulatedAt24c32::new());
		assert!(eeprom.read(0x0100, 0).unwrap().is_empty());
		eeprom.write_bytes(&[], 0x0100).unwrap();

		let chip = eeprom.bus();
		assert!(chip.transactions().is_empty());
		assert!(chip.settles().is_empty());
		assert_eq!(chip.lock_count(), 0);
	}

	#[test]
	fn lock_is_released_after_failure() {
		let mut chip = SimulatedAt24c32::new();
		chip.fail_at_transaction(1);
		let mut eeprom = Eeprom::new(chip);

		assert!(eeprom.write(&[1u8, 2], 0).is_err());
		assert!(!eeprom.bus().is_locked());
		assert_eq!(eeprom.bus().unlock_count(), 1);

		eeprom.bus_mut().clear_log();
		assert!(eeprom.read(0, 2).is_err());
		assert!(!eeprom.bus().is_locked());
		assert_eq!(eeprom.bus().unlock_count(), 2);
	}

	#[test]
	fn read_into_keeps_partial_data() {
		let mut chip = SimulatedAt24c32::new();
		chip.memory_mut()[0..3].copy_from_slice(&[1, 2, 3]);
		// transactions: addr, recv, addr, recv, addr(fails)
		chip.fail_at_transaction(4);
		let mut eeprom = Eeprom::new(chip);

		let mut buf = [0u8; 3];
		let err = eeprom.read_into(0, &mut buf).unwrap_err();
		assert!(err.downcast_ref::<TransportError>().is_some());
		assert_eq!(&buf[..2], &[1, 2]);
		assert_eq!(buf[2], 0);
	}

	#[test]
	fn borrowed_bus() {
		let mut chip = SimulatedAt24c32::new();
		Eeprom::new(&mut chip).write_byte(0x5a, 0x0123).unwrap();
		assert_eq!(Eeprom::new(&mut chip).read_byte(0x0123).unwrap(), 0x5a);
		assert_eq!(chip.lock_count(), 2);
	}

	#[test]
	fn custom_settle_delay() {
		let mut eeprom = Eeprom::with_address(SimulatedAt24c32::with_address(0x57), 0x57)
			.with_settle_delay(Duration::from_millis(10));
		eeprom.write_bytes(b"ab", 0).unwrap();
		assert_eq!(eeprom.bus().settles(), &[Duration::from_millis(10); 2]);
	}
}
