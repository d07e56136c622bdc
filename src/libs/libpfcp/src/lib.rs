#![allow(nonstandard_style)]
extern crate num;
#[macro_use]
extern crate num_derive;

use std::convert::TryInto;
use std::error::Error;
use std::fmt;

pub trait PFCPModel {
	const ID: u16;
	fn encode(&self) -> Vec<u8>;
	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized;
}

pub mod models;
pub mod messages;
pub mod handlers;
pub mod helpers;

/// Default UDP port of the PFCP protocol
pub const PFCP_PORT: u16 = 8805;

#[derive(Debug, Clone)]
pub struct PFCPError {
	details: String,
}

impl PFCPError {
	pub fn new_boxed(msg: &str) -> Box<PFCPError> {
		Box::new(PFCPError {
			details: msg.to_string(),
		})
	}
	pub fn new(msg: &str) -> PFCPError {
		PFCPError {
			details: msg.to_string(),
		}
	}
}

impl fmt::Display for PFCPError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.details)
	}
}

impl Error for PFCPError {
	fn description(&self) -> &str {
		&self.details
	}
}

/// Walks the type-length-value IEs in `stream`, handing each IE type and value to `f`.
pub(crate) fn for_each_ie<'a, F>(stream: &'a [u8], mut f: F) -> Result<(), PFCPError>
where
	F: FnMut(u16, &'a [u8]) -> Result<(), PFCPError>,
{
	let mut stream = stream;
	while !stream.is_empty() {
		if stream.len() < 4 {
			return Err(PFCPError::new(&format!("Truncated IE header, remaining octets is {}", stream.len())));
		}
		let ie_type = u16::from_be_bytes(stream[0..2].try_into().map_err(|_| PFCPError::new("IE type"))?);
		let length = u16::from_be_bytes(stream[2..4].try_into().map_err(|_| PFCPError::new("IE length"))?) as usize;
		stream = &stream[4..];
		if stream.len() < length {
			return Err(PFCPError::new(&format!("IE {} is of length {}, but remaining octects is {}", ie_type, length, stream.len())));
		}
		f(ie_type, &stream[..length])?;
		stream = &stream[length..];
	}
	Ok(())
}

/// Fills in the length of a grouped IE encoded with a placeholder length.
pub(crate) fn patch_grouped_length(result: &mut Vec<u8>) {
	let length: u16 = result.len() as u16 - 4;
	let length_be = length.to_be_bytes();
	result[2] = length_be[0];
	result[3] = length_be[1];
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_for_each_ie() {
		let stream = [0u8, 19, 0, 1, 1, 0, 96, 0, 0];
		let mut seen = vec![];
		for_each_ie(&stream, |t, v| {
			seen.push((t, v.to_vec()));
			Ok(())
		}).unwrap();
		assert_eq!(seen, vec![(19, vec![1]), (96, vec![])]);

		assert!(for_each_ie(&[0u8, 19, 0], |_, _| Ok(())).is_err());
		assert!(for_each_ie(&[0u8, 19, 0, 2, 1], |_, _| Ok(())).is_err());
	}
}
