use std::{
	net::SocketAddr,
	sync::{
		atomic::{AtomicU32, Ordering},
		Arc,
	},
	time::Duration,
};

use libpfcp::messages::{AssociationSetupRequest, PFCPMessage};
use log::{debug, info, warn};
use tokio::{net::UdpSocket, task::JoinHandle};

use super::association_key;
use crate::context::UpfContext;

/// Sends association setup requests to configured control-plane peers until they have an association.
///
/// The association itself is created when the peer's setup response comes back through the dispatcher.
/// A peer whose association is later lost gets requests again.
pub struct SetupInitiator {
	ctx: Arc<UpfContext>,
	socket: Arc<UdpSocket>,
	peers: Vec<SocketAddr>,
	next_sequence_id: AtomicU32,
}

impl SetupInitiator {
	pub fn new(ctx: Arc<UpfContext>, socket: Arc<UdpSocket>, peers: Vec<SocketAddr>) -> Arc<SetupInitiator> {
		Arc::new(SetupInitiator {
			ctx,
			socket,
			peers,
			next_sequence_id: AtomicU32::new(1),
		})
	}

	fn new_sequence_id(&self) -> u32 {
		self.next_sequence_id.fetch_add(1, Ordering::Relaxed) & 0x00_ff_ff_ff
	}

	/// Sends one request to every peer without association and returns how many went out.
	pub async fn send_pending(&self) -> usize {
		let pending = {
			let associations = self.ctx.associations.lock().await;
			self.peers
				.iter()
				.filter(|peer| !associations.contains_key(&association_key(peer)))
				.copied()
				.collect::<Vec<_>>()
		};
		let params = &self.ctx.params;
		let mut sent = 0;
		for peer in pending {
			let seq = self.new_sequence_id();
			let request = PFCPMessage::from(AssociationSetupRequest {
				node_id: Some(params.node_id()),
				recovery_time_stamp: Some(params.recovery_time_stamp()),
				up_function_features: Some(params.up_function_features()),
			});
			match self.socket.send_to(&request.encode(seq, None), peer).await {
				Ok(_) => {
					info!("Association setup request seq={} sent to {}", seq, peer);
					self.ctx.metrics.message_tx(request.name());
					sent += 1;
				}
				Err(e) => warn!("Failed to send association setup request to {}: {}", peer, e),
			}
		}
		sent
	}

	pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(period);
			loop {
				interval.tick().await;
				if self.send_pending().await == 0 {
					debug!("All {} configured peers are associated", self.peers.len());
				}
			}
		})
	}
}
