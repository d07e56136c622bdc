use std::net::SocketAddr;

use async_trait::async_trait;
use libpfcp::{
	handlers::{HandlerResult, NodeRequestHandlers, PFCPReply},
	messages::{
		AssociationReleaseRequest, AssociationReleaseResponse, AssociationSetupRequest, AssociationSetupResponse,
		AssociationUpdateRequest, AssociationUpdateResponse, CheckedIE, HeartbeatRequest, HeartbeatResponse,
	},
	models::{Cause, PFCPHeader},
};
use log::{debug, info, warn};

use super::{association_key, remove_association, N4Handlers, NodeAssociation};

impl N4Handlers {
	fn association_setup_response(&self, cause: Cause) -> AssociationSetupResponse {
		let params = &self.ctx.params;
		let accepted = cause.is_accepted();
		AssociationSetupResponse {
			node_id: params.node_id(),
			cause,
			recovery_time_stamp: Some(params.recovery_time_stamp()),
			up_function_features: if accepted { Some(params.up_function_features()) } else { None },
		}
	}
}

#[async_trait]
impl NodeRequestHandlers for N4Handlers {
	async fn handle_heartbeat_request(&self, header: &PFCPHeader, _request: HeartbeatRequest, src: SocketAddr) -> HandlerResult {
		debug!("Heartbeat request seq={} from {}", header.seq, src);
		Ok(Some(PFCPReply::node(HeartbeatResponse {
			recovery_time_stamp: self.ctx.params.recovery_time_stamp(),
		})))
	}

	async fn handle_heartbeat_response(&self, header: &PFCPHeader, _response: HeartbeatResponse, src: SocketAddr) -> HandlerResult {
		let key = association_key(&src);
		let mut associations = self.ctx.associations.lock().await;
		match associations.get_mut(&key) {
			Some(association) => {
				debug!("Heartbeat response seq={} from {}", header.seq, association.id);
				association.refresh_retries();
				if let Some(engine) = self.heartbeat.as_ref() {
					engine.schedule(&key, association);
				}
			}
			None => debug!("Heartbeat response from {} without association", src),
		}
		Ok(None)
	}

	async fn handle_association_setup(&self, _header: &PFCPHeader, request: AssociationSetupRequest, src: SocketAddr) -> HandlerResult {
		let node_id = match request.node_id {
			Some(node_id) => node_id,
			None => {
				warn!("Rejecting association setup from {}: Node ID missing", src);
				return Ok(Some(PFCPReply::node(self.association_setup_response(Cause::MandatoryIEMissing))));
			}
		};
		let key = association_key(&src);
		let mut associations = self.ctx.associations.lock().await;
		if associations.contains_key(&key) {
			info!("Association with {} is set up again, dropping its sessions", key);
			remove_association(&self.ctx, &mut associations, &key).await;
		}
		info!("Associated with {} (Node ID {})", src, node_id);
		associations.insert(key, NodeAssociation::new(node_id.to_string(), src));
		self.ctx.update_gauges(&associations);
		Ok(Some(PFCPReply::node(self.association_setup_response(Cause::RequestAccepted))))
	}

	async fn handle_association_setup_response(
		&self,
		_header: &PFCPHeader,
		response: AssociationSetupResponse,
		src: SocketAddr,
	) -> HandlerResult {
		if !response.cause.is_accepted() {
			warn!("Association setup rejected by {} (Node ID {}): {:?}", src, response.node_id, response.cause);
			self.ctx.metrics.message_rx_error("AssociationSetupResponse", response.cause);
			return Ok(None);
		}
		let key = association_key(&src);
		let mut associations = self.ctx.associations.lock().await;
		if associations.contains_key(&key) {
			info!("Association with {} already exists, keeping it", key);
			return Ok(None);
		}
		info!("Associated with {} (Node ID {}) on our request", src, response.node_id);
		associations.insert(key, NodeAssociation::new(response.node_id.to_string(), src));
		self.ctx.update_gauges(&associations);
		Ok(None)
	}

	async fn handle_association_update(&self, _header: &PFCPHeader, request: AssociationUpdateRequest, src: SocketAddr) -> HandlerResult {
		let cause = match request.node_id {
			CheckedIE::Missing => {
				warn!("Rejecting association update from {}: Node ID missing", src);
				Cause::MandatoryIEMissing
			}
			CheckedIE::Malformed => {
				warn!("Rejecting association update from {}: Node ID malformed", src);
				Cause::MandatoryIEIncorrect
			}
			CheckedIE::Present(node_id) => {
				if self.ctx.associations.lock().await.contains_key(&association_key(&src)) {
					info!("Association update from {} (Node ID {})", src, node_id);
					Cause::RequestAccepted
				} else {
					warn!("Association update from {} (Node ID {}) without association", src, node_id);
					Cause::NoEstablishedPFCPAssociation
				}
			}
		};
		let params = &self.ctx.params;
		Ok(Some(PFCPReply::node(AssociationUpdateResponse {
			node_id: params.node_id(),
			cause,
			recovery_time_stamp: if cause.is_accepted() { Some(params.recovery_time_stamp()) } else { None },
		})))
	}

	async fn handle_association_release(&self, _header: &PFCPHeader, request: AssociationReleaseRequest, src: SocketAddr) -> HandlerResult {
		let node_id = self.ctx.params.node_id();
		if request.node_id.is_none() {
			warn!("Rejecting association release from {}: Node ID missing", src);
			return Ok(Some(PFCPReply::node(AssociationReleaseResponse { node_id, cause: Cause::MandatoryIEMissing })));
		}
		let key = association_key(&src);
		let mut associations = self.ctx.associations.lock().await;
		let cause = match remove_association(&self.ctx, &mut associations, &key).await {
			Some(association) => {
				info!("Association with {} released", association.id);
				Cause::RequestAccepted
			}
			None => {
				warn!("Association release from {} without association", src);
				Cause::NoEstablishedPFCPAssociation
			}
		};
		Ok(Some(PFCPReply::node(AssociationReleaseResponse { node_id, cause })))
	}
}
