use std::{
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration,
};

use dashmap::DashMap;
use libpfcp::{handlers::MetricsCollector, models::Cause};
use log::info;

/// Upper bounds of the latency buckets, in microseconds. The last bucket is unbounded.
const LATENCY_BUCKETS_US: [u64; 7] = [10, 50, 100, 500, 1_000, 5_000, 10_000];

#[derive(Debug, Clone, Default)]
pub struct LatencyHistogram {
	pub buckets: [u64; LATENCY_BUCKETS_US.len() + 1],
	pub count: u64,
	pub sum_us: u64,
}

impl LatencyHistogram {
	fn observe(&mut self, elapsed: Duration) {
		let us = elapsed.as_micros().min(u64::MAX as u128) as u64;
		let bucket = LATENCY_BUCKETS_US
			.iter()
			.position(|bound| us <= *bound)
			.unwrap_or(LATENCY_BUCKETS_US.len());
		self.buckets[bucket] += 1;
		self.count += 1;
		self.sum_us = self.sum_us.saturating_add(us);
	}
}

/// PFCP counters kept in memory and periodically written to the log.
#[derive(Default)]
pub struct UpfMetrics {
	rx: DashMap<String, u64>,
	tx: DashMap<String, u64>,
	rx_errors: DashMap<(String, Cause), u64>,
	latency: DashMap<String, LatencyHistogram>,
	associations: AtomicUsize,
	sessions: AtomicUsize,
}

impl UpfMetrics {
	pub fn new() -> UpfMetrics {
		UpfMetrics::default()
	}

	pub fn rx_count(&self, message: &str) -> u64 {
		self.rx.get(message).map_or(0, |v| *v)
	}

	pub fn tx_count(&self, message: &str) -> u64 {
		self.tx.get(message).map_or(0, |v| *v)
	}

	pub fn rx_error_count(&self, message: &str, cause: Cause) -> u64 {
		self.rx_errors.get(&(message.to_string(), cause)).map_or(0, |v| *v)
	}

	pub fn latency(&self, message: &str) -> Option<LatencyHistogram> {
		self.latency.get(message).map(|h| h.value().clone())
	}

	/// Responses sent for `request`; tx counters are keyed by the response name.
	pub fn reply_count(&self, request: &str) -> u64 {
		request.strip_suffix("Request").map_or(0, |base| self.tx_count(&format!("{}Response", base)))
	}

	pub fn associations(&self) -> usize {
		self.associations.load(Ordering::Relaxed)
	}

	pub fn sessions(&self) -> usize {
		self.sessions.load(Ordering::Relaxed)
	}

	pub fn log_summary(&self) {
		info!("PFCP associations={} sessions={}", self.associations(), self.sessions());
		for entry in self.rx.iter() {
			let name = entry.key();
			let (mean_us, count) = match self.latency.get(name) {
				Some(h) if h.count > 0 => (h.sum_us / h.count, h.count),
				_ => (0, 0),
			};
			info!(
				"PFCP {}: rx={} tx_replies={} handled={} mean_latency={}us",
				name,
				*entry.value(),
				self.reply_count(name),
				count,
				mean_us
			);
		}
		for entry in self.rx_errors.iter() {
			let (name, cause) = entry.key();
			info!("PFCP {} rejected with {:?}: {}", name, cause, *entry.value());
		}
	}
}

impl MetricsCollector for UpfMetrics {
	fn message_rx(&self, message: &str) {
		*self.rx.entry(message.to_string()).or_insert(0) += 1;
	}

	fn message_tx(&self, message: &str) {
		*self.tx.entry(message.to_string()).or_insert(0) += 1;
	}

	fn message_rx_error(&self, message: &str, cause: Cause) {
		*self.rx_errors.entry((message.to_string(), cause)).or_insert(0) += 1;
	}

	fn message_latency(&self, message: &str, elapsed: Duration) {
		self.latency.entry(message.to_string()).or_default().observe(elapsed);
	}

	fn set_associations(&self, count: usize) {
		self.associations.store(count, Ordering::Relaxed);
	}

	fn set_sessions(&self, count: usize) {
		self.sessions.store(count, Ordering::Relaxed);
	}
}
