use failure::Fail;
use std::io;

/// Failure reported by an I2C transport.
///
/// The EEPROM driver never produces errors of its own; whatever a bus
/// returns is handed to the caller unchanged.
#[derive(Debug, Fail)]
pub enum TransportError {
	#[fail(display = "I2C device 0x{:02x} did not acknowledge", address)]
	Nack {
		address: u8,
	},

	#[fail(display = "no I2C device at 0x{:02x}", address)]
	DeviceAbsent {
		address: u8,
	},

	#[fail(display = "I2C arbitration lost while talking to 0x{:02x}", address)]
	ArbitrationLost {
		address: u8,
	},

	#[fail(display = "I2C transaction with 0x{:02x} timed out", address)]
	Timeout {
		address: u8,
	},

	#[fail(display = "I2C transaction with 0x{:02x} failed: {}", address, error)]
	Io {
		address: u8,
		#[cause] error: io::Error,
	},
}

impl TransportError {
	pub fn address(&self) -> u8 {
		match *self {
			TransportError::Nack { address } => address,
			TransportError::DeviceAbsent { address } => address,
			TransportError::ArbitrationLost { address } => address,
			TransportError::Timeout { address } => address,
			TransportError::Io { address, .. } => address,
		}
	}

	// classify an errno from the i2c-dev ioctl
	pub fn from_os_error(address: u8, error: io::Error) -> Self {
		match error.raw_os_error() {
			Some(libc::ENXIO) | Some(libc::EREMOTEIO) => TransportError::Nack { address },
			Some(libc::ENODEV) => TransportError::DeviceAbsent { address },
			Some(libc::EAGAIN) => TransportError::ArbitrationLost { address },
			Some(libc::ETIMEDOUT) => TransportError::Timeout { address },
			_ => TransportError::Io { address, error },
		}
	}
}
