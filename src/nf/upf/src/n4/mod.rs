mod association;
mod heartbeat;
mod node_handlers;
mod pdr;
mod session;
mod session_handlers;
mod setup_initiator;

#[cfg(test)]
mod tests;

use std::{net::SocketAddr, sync::Arc};

pub use association::{remove_association, NodeAssociation};
pub use heartbeat::HeartbeatEngine;
pub use session::{Session, SessionError};
pub use setup_initiator::SetupInitiator;

use crate::context::UpfContext;

/// PFCP request handlers of the UPF.
pub struct N4Handlers {
	pub ctx: Arc<UpfContext>,
	/// `None` when heartbeats are disabled
	pub heartbeat: Option<Arc<HeartbeatEngine>>,
}

impl N4Handlers {
	pub fn new(ctx: Arc<UpfContext>, heartbeat: Option<Arc<HeartbeatEngine>>) -> N4Handlers {
		N4Handlers { ctx, heartbeat }
	}
}

/// Associations are keyed by the address their requests come from.
pub fn association_key(src: &SocketAddr) -> String {
	src.ip().to_string()
}
