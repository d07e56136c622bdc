use std::{
	net::SocketAddr,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
};

use libpfcp::messages::{HeartbeatRequest, PFCPMessage};
use log::{debug, info, warn};
use tokio::{net::UdpSocket, sync::oneshot, task::JoinHandle};

use super::{
	association::{remove_association, HeartbeatTimer},
	NodeAssociation,
};
use crate::context::UpfContext;

/// Sends heartbeat requests to every association and drops the ones that stop answering.
///
/// Each association owns at most one timer. A timer waits `heartbeat_interval`, sends a
/// request, then waits `heartbeat_timeout`; a response in the meantime replaces the timer,
/// otherwise a failure is recorded and the cycle starts again.
pub struct HeartbeatEngine {
	ctx: Arc<UpfContext>,
	socket: Arc<UdpSocket>,
	next_timer_id: AtomicU64,
}

enum TimerStep {
	Send(u32, SocketAddr),
	Stop,
}

impl HeartbeatEngine {
	pub fn new(ctx: Arc<UpfContext>, socket: Arc<UdpSocket>) -> Arc<HeartbeatEngine> {
		Arc::new(HeartbeatEngine {
			ctx,
			socket,
			next_timer_id: AtomicU64::new(1),
		})
	}

	/// Starts a fresh timer for `association`, cancelling the pending one.
	/// The caller holds the association table lock.
	pub fn schedule(self: &Arc<Self>, key: &str, association: &mut NodeAssociation) {
		let (cancel, cancelled) = oneshot::channel();
		let timer_id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
		association.set_heartbeat_timer(HeartbeatTimer { id: timer_id, cancel });
		let engine = self.clone();
		let key = key.to_string();
		tokio::spawn(async move { engine.run_timer(key, timer_id, cancelled).await });
	}

	async fn run_timer(self: Arc<Self>, key: String, timer_id: u64, mut cancelled: oneshot::Receiver<()>) {
		let params = &self.ctx.params;
		loop {
			tokio::select! {
				_ = &mut cancelled => return,
				_ = tokio::time::sleep(params.heartbeat_interval) => {}
			}
			let (seq, addr) = match self.next_request(&key, timer_id).await {
				TimerStep::Send(seq, addr) => (seq, addr),
				TimerStep::Stop => return,
			};
			let request = PFCPMessage::from(HeartbeatRequest {
				recovery_time_stamp: params.recovery_time_stamp(),
			});
			match self.socket.send_to(&request.encode(seq, None), addr).await {
				Ok(_) => {
					debug!("Heartbeat request seq={} sent to {}", seq, addr);
					self.ctx.metrics.message_tx(request.name());
				}
				Err(e) => warn!("Failed to send heartbeat request to {}: {}", addr, e),
			}
			tokio::select! {
				_ = &mut cancelled => return,
				_ = tokio::time::sleep(params.heartbeat_timeout) => {}
			}
			if !self.record_failure(&key, timer_id).await {
				return;
			}
		}
	}

	async fn next_request(&self, key: &str, timer_id: u64) -> TimerStep {
		let mut associations = self.ctx.associations.lock().await;
		match associations.get_mut(key) {
			Some(association) if association.is_current_timer(timer_id) => {
				TimerStep::Send(association.new_sequence_id(), association.addr)
			}
			_ => TimerStep::Stop,
		}
	}

	/// Counts a missed heartbeat and drops the association once retries run out.
	/// Returns whether the timer keeps running.
	pub async fn record_failure(&self, key: &str, timer_id: u64) -> bool {
		let mut associations = self.ctx.associations.lock().await;
		let retries = self.ctx.params.heartbeat_retries;
		let association = match associations.get_mut(key) {
			Some(association) if association.is_current_timer(timer_id) => association,
			_ => return false,
		};
		association.heartbeat_failures += 1;
		if association.is_expired(retries) {
			warn!(
				"No heartbeat response from {} after {} attempts, releasing association",
				association.id, association.heartbeat_failures
			);
			remove_association(&self.ctx, &mut associations, key).await;
			return false;
		}
		info!(
			"Heartbeat to {} timed out ({}/{})",
			association.id, association.heartbeat_failures, retries
		);
		true
	}

	/// Starts timers for associations that have none.
	pub async fn refresh(self: &Arc<Self>) {
		let mut associations = self.ctx.associations.lock().await;
		for (key, association) in associations.iter_mut() {
			if !association.has_heartbeat_timer() {
				debug!("Starting heartbeat timer for {}", key);
				self.schedule(key, association);
			}
		}
	}

	pub fn spawn_refresh_loop(self: Arc<Self>) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(self.ctx.params.heartbeat_interval);
			loop {
				interval.tick().await;
				self.refresh().await;
			}
		})
	}
}
