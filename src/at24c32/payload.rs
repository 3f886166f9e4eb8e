use std::slice;

/// Data for `Eeprom::write`: a single byte or a run of bytes for
/// consecutive addresses.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Payload<'a> {
	Byte(u8),
	Bytes(&'a [u8]),
}

impl<'a> Payload<'a> {
	pub fn as_bytes(&self) -> &[u8] {
		match self {
			Payload::Byte(b) => slice::from_ref(b),
			Payload::Bytes(bytes) => *bytes,
		}
	}

	pub fn len(&self) -> usize {
		self.as_bytes().len()
	}

	pub fn is_empty(&self) -> bool {
		self.as_bytes().is_empty()
	}
}

impl<'a> From<u8> for Payload<'a> {
	fn from(v: u8) -> Self {
		Payload::Byte(v)
	}
}

impl<'a> From<&'a [u8]> for Payload<'a> {
	fn from(v: &'a [u8]) -> Self {
		Payload::Bytes(v)
	}
}

impl<'a, const N: usize> From<&'a [u8; N]> for Payload<'a> {
	fn from(v: &'a [u8; N]) -> Self {
		Payload::Bytes(&v[..])
	}
}

impl<'a> From<&'a Vec<u8>> for Payload<'a> {
	fn from(v: &'a Vec<u8>) -> Self {
		Payload::Bytes(&v[..])
	}
}
