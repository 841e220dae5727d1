//! Wall-clock access, injectable for tests.

use std::sync::atomic::{AtomicU64, Ordering};

pub trait TimeSource: Send + Sync {
	/// Current Unix time in seconds.
	fn now(&self) -> u64;
}

pub struct SystemClock;

impl TimeSource for SystemClock {
	fn now(&self) -> u64 {
		u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
	}
}

/// Clock that only moves when told to.
pub struct FixedClock {
	now: AtomicU64,
}

impl FixedClock {
	pub fn new(now: u64) -> Self {
		Self {
			now: AtomicU64::new(now),
		}
	}

	pub fn set(&self, now: u64) {
		self.now.store(now, Ordering::SeqCst);
	}

	pub fn advance(&self, secs: u64) {
		self.now.fetch_add(secs, Ordering::SeqCst);
	}
}

impl TimeSource for FixedClock {
	fn now(&self) -> u64 {
		self.now.load(Ordering::SeqCst)
	}
}
