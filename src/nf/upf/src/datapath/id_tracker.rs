use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdTrackerError {
	#[error("pool exhausted")]
	PoolExhausted,
}

/// Bitmap over `[0, size)` handing out the lowest free id first.
/// A set bit marks a free id.
#[derive(Debug, Clone)]
pub struct IdTracker {
	bitmap: Vec<u64>,
	size: u32,
}

impl IdTracker {
	pub fn new(size: u32) -> IdTracker {
		let words = ((size as usize) + 63) / 64;
		let mut bitmap = vec![u64::MAX; words];
		let tail = size % 64;
		if tail != 0 {
			if let Some(last) = bitmap.last_mut() {
				*last = (1u64 << tail) - 1;
			}
		}
		IdTracker { bitmap, size }
	}

	pub fn get_next(&mut self) -> Result<u32, IdTrackerError> {
		for (index, word) in self.bitmap.iter_mut().enumerate() {
			if *word != 0 {
				let bit = word.trailing_zeros();
				*word &= !(1u64 << bit);
				return Ok(index as u32 * 64 + bit);
			}
		}
		Err(IdTrackerError::PoolExhausted)
	}

	/// Ids outside the pool are ignored.
	pub fn release(&mut self, id: u32) {
		if id >= self.size {
			return;
		}
		self.bitmap[(id / 64) as usize] |= 1u64 << (id % 64);
	}

	pub fn available(&self) -> u32 {
		self.bitmap.iter().map(|w| w.count_ones()).sum()
	}

	pub fn capacity(&self) -> u32 {
		self.size
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_exhaustion_and_lowest_free_reuse() {
		let mut tracker = IdTracker::new(70);
		for expected in 0..70 {
			assert_eq!(tracker.get_next(), Ok(expected));
		}
		assert_eq!(tracker.get_next(), Err(IdTrackerError::PoolExhausted));
		tracker.release(65);
		tracker.release(3);
		assert_eq!(tracker.get_next(), Ok(3));
		assert_eq!(tracker.get_next(), Ok(65));
		assert_eq!(tracker.get_next(), Err(IdTrackerError::PoolExhausted));
	}

	#[test]
	fn test_release_out_of_range_is_ignored() {
		let mut tracker = IdTracker::new(2);
		assert_eq!(tracker.available(), 2);
		tracker.release(2);
		tracker.release(1000);
		assert_eq!(tracker.available(), 2);
		assert_eq!(tracker.capacity(), 2);
	}

	#[test]
	fn test_double_release() {
		let mut tracker = IdTracker::new(64);
		let id = tracker.get_next().unwrap();
		tracker.release(id);
		tracker.release(id);
		assert_eq!(tracker.available(), 64);
		assert_eq!(tracker.get_next(), Ok(id));
	}

	#[test]
	fn test_empty_pool() {
		let mut tracker = IdTracker::new(0);
		assert_eq!(tracker.get_next(), Err(IdTrackerError::PoolExhausted));
	}
}
