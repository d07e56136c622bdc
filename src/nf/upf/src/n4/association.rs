use std::{collections::HashMap, net::SocketAddr};

use log::{info, warn};
use tokio::sync::oneshot;

use super::session::Session;
use crate::context::UpfContext;

/// Pending heartbeat timer; dropping `cancel` stops the timer task.
#[derive(Debug)]
pub struct HeartbeatTimer {
	pub id: u64,
	pub cancel: oneshot::Sender<()>,
}

/// A PFCP association with one control-plane peer and the sessions it owns.
#[derive(Debug)]
pub struct NodeAssociation {
	/// Node ID of the peer, as text
	pub id: String,
	/// Where heartbeat requests are sent
	pub addr: SocketAddr,
	pub next_session_id: u64,
	pub next_sequence_id: u32,
	pub sessions: HashMap<u64, Session>,
	pub heartbeat_failures: u32,
	pub heartbeat: Option<HeartbeatTimer>,
}

impl NodeAssociation {
	pub fn new(id: String, addr: SocketAddr) -> NodeAssociation {
		NodeAssociation {
			id,
			addr,
			next_session_id: 1,
			next_sequence_id: 1,
			sessions: HashMap::new(),
			heartbeat_failures: 0,
			heartbeat: None,
		}
	}

	pub fn new_local_seid(&mut self) -> u64 {
		let seid = self.next_session_id;
		self.next_session_id = self.next_session_id.wrapping_add(1).max(1);
		seid
	}

	/// Sequence numbers are 24 bits wide.
	pub fn new_sequence_id(&mut self) -> u32 {
		let seq = self.next_sequence_id;
		self.next_sequence_id = (self.next_sequence_id + 1) & 0x00_ff_ff_ff;
		seq
	}

	pub fn refresh_retries(&mut self) {
		self.heartbeat_failures = 0;
	}

	pub fn is_expired(&self, retries: u32) -> bool {
		self.heartbeat_failures > retries
	}

	pub fn has_heartbeat_timer(&self) -> bool {
		self.heartbeat.is_some()
	}

	pub fn is_current_timer(&self, timer_id: u64) -> bool {
		matches!(&self.heartbeat, Some(timer) if timer.id == timer_id)
	}

	/// Replaces the pending timer, which cancels the previous one.
	pub fn set_heartbeat_timer(&mut self, timer: HeartbeatTimer) {
		self.heartbeat = Some(timer);
	}
}

/// Removes the association under `key` and tears down every session it owns.
pub async fn remove_association(
	ctx: &UpfContext,
	associations: &mut HashMap<String, NodeAssociation>,
	key: &str,
) -> Option<NodeAssociation> {
	let mut association = associations.remove(key)?;
	association.heartbeat = None;
	info!("Removing association with {} ({}), {} sessions", association.id, key, association.sessions.len());
	for (seid, session) in association.sessions.drain() {
		if let Err(e) = session.release(ctx).await {
			warn!("Session {:#x} of {} was not fully removed: {}", seid, key, e);
		}
	}
	ctx.update_gauges(associations);
	Some(association)
}
