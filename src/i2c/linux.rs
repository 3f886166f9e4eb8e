//! `I2cBus` over the Linux i2c-dev interface (`/dev/i2c-N`).

use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{
	Path,
	PathBuf,
};

use libc::{
	LOCK_EX,
	LOCK_UN,
	c_ulong,
	flock,
	ioctl,
};

use super::{
	I2cBus,
	TransportError,
};

// from <linux/i2c-dev.h> and <linux/i2c.h>
const I2C_RDWR: c_ulong = 0x0707;
const I2C_M_RD: u16 = 0x0001;

#[repr(C)]
struct I2cMsg {
	addr: u16,
	flags: u16,
	len: u16,
	buf: *mut u8,
}

#[repr(C)]
struct I2cRdwrIoctlData {
	msgs: *mut I2cMsg,
	nmsgs: u32,
}

impl I2cMsg {
	fn write(address: u8, bytes: &[u8]) -> Self {
		assert!(bytes.len() <= u16::max_value() as usize);
		I2cMsg {
			addr: address as u16,
			flags: 0,
			len: bytes.len() as u16,
			// the kernel doesn't write through buffers without I2C_M_RD
			buf: bytes.as_ptr() as *mut u8,
		}
	}

	fn read(address: u8, buffer: &mut [u8]) -> Self {
		assert!(buffer.len() <= u16::max_value() as usize);
		I2cMsg {
			addr: address as u16,
			flags: I2C_M_RD,
			len: buffer.len() as u16,
			buf: buffer.as_mut_ptr(),
		}
	}
}

#[derive(Debug)]
pub struct I2cDev {
	file: fs::File,
	path: PathBuf,
}

impl I2cDev {
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn rdwr(&mut self, address: u8, msgs: &mut [I2cMsg]) -> crate::AResult<()> {
		assert!(address <= 0x7f, "7-bit I2C address expected");
		let mut data = I2cRdwrIoctlData {
			msgs: msgs.as_mut_ptr(),
			nmsgs: msgs.len() as u32,
		};
		let res = unsafe { ioctl(self.file.as_raw_fd(), I2C_RDWR as _, &mut data as *mut I2cRdwrIoctlData) };
		if res < 0 {
			let e = io::Error::last_os_error();
			trace!("{}: I2C_RDWR for 0x{:02x} failed: {}", self.path.display(), address, e);
			return Err(TransportError::from_os_error(address, e).into());
		}
		Ok(())
	}

	fn flock(&mut self, operation: libc::c_int) -> io::Result<()> {
		let res = unsafe { flock(self.file.as_raw_fd(), operation) };
		if 0 != res {
			return Err(io::Error::last_os_error());
		}
		Ok(())
	}
}

impl I2cBus for I2cDev {
	fn transmit(&mut self, address: u8, bytes: &[u8]) -> crate::AResult<()> {
		trace!("{}: 0x{:02x} <- {:02x?}", self.path.display(), address, bytes);
		self.rdwr(address, &mut [I2cMsg::write(address, bytes)])
	}

	fn receive(&mut self, address: u8, buffer: &mut [u8]) -> crate::AResult<()> {
		self.rdwr(address, &mut [I2cMsg::read(address, buffer)])?;
		trace!("{}: 0x{:02x} -> {:02x?}", self.path.display(), address, buffer);
		Ok(())
	}

	// both messages in one ioctl: repeated START instead of STOP in between
	fn transmit_then_receive(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> crate::AResult<()> {
		trace!("{}: 0x{:02x} <- {:02x?} (restart)", self.path.display(), address, bytes);
		self.rdwr(address, &mut [
			I2cMsg::write(address, bytes),
			I2cMsg::read(address, buffer),
		])?;
		trace!("{}: 0x{:02x} -> {:02x?}", self.path.display(), address, buffer);
		Ok(())
	}

	// advisory lock; only excludes other users that lock as well
	fn lock(&mut self) -> crate::AResult<()> {
		let path = self.path.clone();
		with_context!(("{}: lock I2C bus", path.display()), {
			self.flock(LOCK_EX)?;
			Ok(())
		})
	}

	fn unlock(&mut self) -> crate::AResult<()> {
		let path = self.path.clone();
		with_context!(("{}: unlock I2C bus", path.display()), {
			self.flock(LOCK_UN)?;
			Ok(())
		})
	}
}

pub fn open_bus<P: AsRef<Path>>(path: P) -> crate::AResult<I2cDev> {
	let path = path.as_ref().to_path_buf();
	with_context!(("{}: open I2C bus", path.display()), {
		let file = fs::OpenOptions::new()
			.read(true)
			.write(true)
			.open(&path)?;
		debug!("{}: opened I2C bus", path.display());
		Ok(I2cDev {
			file,
			path: path.clone(),
		})
	})
}
