//! In-memory AT24C32 that speaks the byte protocol of the real part.
//!
//! Keeps a log of every bus transaction and settle delay, and never sleeps.

use std::time::Duration;

use crate::at24c32::{
	CAPACITY,
	DEFAULT_ADDRESS,
	PAGE_SIZE,
};

use super::{
	I2cBus,
	TransportError,
};

// a 32 Kbit part decodes 12 address bits and ignores the rest
const ADDRESS_MASK: usize = CAPACITY - 1;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Transaction {
	Transmit {
		address: u8,
		bytes: Vec<u8>,
	},
	Receive {
		address: u8,
		len: usize,
	},
}

#[derive(Clone, Debug)]
pub struct SimulatedAt24c32 {
	address: u8,
	memory: Vec<u8>,
	pointer: usize,
	present: bool,
	fail_at: Option<usize>,
	transactions: Vec<Transaction>,
	settles: Vec<Duration>,
	locked: bool,
	lock_count: usize,
	unlock_count: usize,
}

impl SimulatedAt24c32 {
	pub fn new() -> Self {
		Self::with_address(DEFAULT_ADDRESS)
	}

	pub fn with_address(address: u8) -> Self {
		assert!(address <= 0x7f);
		SimulatedAt24c32 {
			address,
			memory: vec![0xff; CAPACITY],
			pointer: 0,
			present: true,
			fail_at: None,
			transactions: Vec::new(),
			settles: Vec::new(),
			locked: false,
			lock_count: 0,
			unlock_count: 0,
		}
	}

	/// Make the transaction with (zero-based) index `index` in the log fail
	/// with a NACK, without touching the memory.
	pub fn fail_at_transaction(&mut self, index: usize) {
		self.fail_at = Some(index);
	}

	/// Pull the chip off the bus; every transaction is NACKed.
	pub fn set_present(&mut self, present: bool) {
		self.present = present;
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub fn memory_mut(&mut self) -> &mut [u8] {
		&mut self.memory
	}

	pub fn transactions(&self) -> &[Transaction] {
		&self.transactions
	}

	pub fn settles(&self) -> &[Duration] {
		&self.settles
	}

	pub fn clear_log(&mut self) {
		self.transactions.clear();
		self.settles.clear();
	}

	pub fn is_locked(&self) -> bool {
		self.locked
	}

	pub fn lock_count(&self) -> usize {
		self.lock_count
	}

	pub fn unlock_count(&self) -> usize {
		self.unlock_count
	}

	// log the transaction and decide whether the chip answers it
	fn begin(&mut self, address: u8, transaction: Transaction) -> crate::AResult<()> {
		let index = self.transactions.len();
		self.transactions.push(transaction);
		if address != self.address {
			return Err(TransportError::DeviceAbsent { address }.into());
		}
		if !self.present || self.fail_at == Some(index) {
			return Err(TransportError::Nack { address }.into());
		}
		Ok(())
	}
}

impl Default for SimulatedAt24c32 {
	fn default() -> Self {
		Self::new()
	}
}

impl I2cBus for SimulatedAt24c32 {
	fn transmit(&mut self, address: u8, bytes: &[u8]) -> crate::AResult<()> {
		self.begin(address, Transaction::Transmit { address, bytes: bytes.to_vec() })?;

		if bytes.len() < 2 {
			// the chip only latches a complete word address
			return Ok(());
		}
		let word_address = ((bytes[0] as usize) << 8 | bytes[1] as usize) & ADDRESS_MASK;
		self.pointer = word_address;

		// page write: the lower 5 bits roll over inside the page
		let page = word_address & !(PAGE_SIZE - 1);
		let mut offset = word_address & (PAGE_SIZE - 1);
		for &b in &bytes[2..] {
			self.memory[page + offset] = b;
			offset = (offset + 1) % PAGE_SIZE;
		}
		if bytes.len() > 2 {
			self.pointer = page + offset;
		}
		Ok(())
	}

	fn receive(&mut self, address: u8, buffer: &mut [u8]) -> crate::AResult<()> {
		self.begin(address, Transaction::Receive { address, len: buffer.len() })?;

		for b in buffer.iter_mut() {
			*b = self.memory[self.pointer];
			self.pointer = (self.pointer + 1) & ADDRESS_MASK;
		}
		Ok(())
	}

	fn lock(&mut self) -> crate::AResult<()> {
		ensure!(!self.locked, "simulated I2C bus already locked");
		self.locked = true;
		self.lock_count += 1;
		Ok(())
	}

	fn unlock(&mut self) -> crate::AResult<()> {
		ensure!(self.locked, "simulated I2C bus not locked");
		self.locked = false;
		self.unlock_count += 1;
		Ok(())
	}

	fn settle(&mut self, duration: Duration) {
		self.settles.push(duration);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fresh_chip_is_erased() {
		let chip = SimulatedAt24c32::new();
		assert_eq!(chip.memory().len(), CAPACITY);
		assert!(chip.memory().iter().all(|&b| b == 0xff));
	}

	#[test]
	fn page_write_rolls_over_inside_page() {
		let mut chip = SimulatedAt24c32::new();
		chip.transmit(0x50, &[0x00, 0x1f, 1, 2]).unwrap();
		assert_eq!(chip.memory()[0x1f], 1);
		assert_eq!(chip.memory()[0x00], 2);
		assert_eq!(chip.memory()[0x20], 0xff);
	}

	#[test]
	fn upper_address_bits_are_ignored() {
		let mut chip = SimulatedAt24c32::new();
		chip.transmit(0x50, &[0xf0, 0x05, 0x77]).unwrap();
		assert_eq!(chip.memory()[0x005], 0x77);
	}

	#[test]
	fn sequential_receive_wraps_at_end_of_memory() {
		let mut chip = SimulatedAt24c32::new();
		chip.memory_mut()[CAPACITY - 1] = 0x11;
		chip.memory_mut()[0] = 0x22;
		chip.transmit(0x50, &[0x0f, 0xff]).unwrap();
		let mut buf = [0u8; 2];
		chip.receive(0x50, &mut buf).unwrap();
		assert_eq!(buf, [0x11, 0x22]);
	}

	#[test]
	fn wrong_address_is_absent() {
		let mut chip = SimulatedAt24c32::new();
		let err = chip.transmit(0x51, &[0x00, 0x00]).unwrap_err();
		match err.downcast_ref::<TransportError>() {
			Some(TransportError::DeviceAbsent { address: 0x51 }) => (),
			other => panic!("unexpected: {:?}", other),
		}
	}

	#[test]
	fn injected_failure_leaves_memory_untouched() {
		let mut chip = SimulatedAt24c32::new();
		chip.fail_at_transaction(1);
		chip.transmit(0x50, &[0x00, 0x00, 0xaa]).unwrap();
		assert!(chip.transmit(0x50, &[0x00, 0x01, 0xbb]).is_err());
		assert_eq!(chip.memory()[0], 0xaa);
		assert_eq!(chip.memory()[1], 0xff);
		assert_eq!(chip.transactions().len(), 2);
	}

	#[test]
	fn double_lock_is_rejected() {
		let mut chip = SimulatedAt24c32::new();
		chip.lock().unwrap();
		assert!(chip.lock().is_err());
		chip.unlock().unwrap();
		assert!(chip.unlock().is_err());
	}
}
