//! Minimal I2C master capability as needed by the EEPROM driver.
//!
//! Every call is one bus transaction (START .. STOP) addressed to a 7-bit
//! device address, except `transmit_then_receive`, which may use a repeated
//! START between both halves.

use std::ops::{
	Deref,
	DerefMut,
};
use std::thread;
use std::time::{
	Duration,
	Instant,
};

mod error;
pub mod linux;
pub mod sim;

pub use self::error::TransportError;

pub use self::linux::{
	I2cDev,
	open_bus,
};

pub use self::sim::{
	SimulatedAt24c32,
	Transaction,
};

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

pub trait I2cBus {
	fn transmit(&mut self, address: u8, bytes: &[u8]) -> crate::AResult<()>;

	fn receive(&mut self, address: u8, buffer: &mut [u8]) -> crate::AResult<()>;

	fn transmit_then_receive(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> crate::AResult<()> {
		self.transmit(address, bytes)?;
		self.receive(address, buffer)
	}

	// exclusive use of the bus for one logical operation; see `ScopedLock`
	fn lock(&mut self) -> crate::AResult<()> {
		Ok(())
	}

	fn unlock(&mut self) -> crate::AResult<()> {
		Ok(())
	}

	// wait for (at least) `duration`, e.g. an EEPROM write cycle
	fn settle(&mut self, duration: Duration) {
		reliable_sleep(duration);
	}
}

impl<'a, B: I2cBus + ?Sized> I2cBus for &'a mut B {
	fn transmit(&mut self, address: u8, bytes: &[u8]) -> crate::AResult<()> {
		(**self).transmit(address, bytes)
	}

	fn receive(&mut self, address: u8, buffer: &mut [u8]) -> crate::AResult<()> {
		(**self).receive(address, buffer)
	}

	fn transmit_then_receive(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> crate::AResult<()> {
		(**self).transmit_then_receive(address, bytes, buffer)
	}

	fn lock(&mut self) -> crate::AResult<()> {
		(**self).lock()
	}

	fn unlock(&mut self) -> crate::AResult<()> {
		(**self).unlock()
	}

	fn settle(&mut self, duration: Duration) {
		(**self).settle(duration)
	}
}

/// Holds the bus lock; released on drop, also when unwinding out of an
/// operation through `?`.
pub struct ScopedLock<'a, B: I2cBus + ?Sized + 'a> {
	bus: &'a mut B,
	locked: bool, // false once released through `close`
}

impl<'a, B: I2cBus + ?Sized> ScopedLock<'a, B> {
	pub fn acquire(bus: &'a mut B) -> crate::AResult<Self> {
		bus.lock()?;
		trace!("I2C bus locked");
		Ok(ScopedLock { bus, locked: true })
	}

	/// Release the lock and report a failing unlock instead of only logging it.
	pub fn close(mut self) -> crate::AResult<()> {
		self.locked = false;
		self.bus.unlock()
	}
}

impl<'a, B: I2cBus + ?Sized> Drop for ScopedLock<'a, B> {
	fn drop(&mut self) {
		if self.locked {
			self.locked = false;
			match self.bus.unlock() {
				Ok(()) => trace!("I2C bus unlocked"),
				Err(e) => error!("Failed to release I2C bus: {}", e),
			}
		}
	}
}

impl<'a, B: I2cBus + ?Sized> Deref for ScopedLock<'a, B> {
	type Target = B;

	fn deref(&self) -> &Self::Target {
		&self.bus
	}
}

impl<'a, B: I2cBus + ?Sized> DerefMut for ScopedLock<'a, B> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.bus
	}
}
