use std::net::SocketAddr;

use async_trait::async_trait;
use libpfcp::{
	handlers::{HandlerResult, PFCPReply, SessionRequestHandlers},
	messages::{
		CreatedPDR, PFCPSessionDeletionRequest, PFCPSessionDeletionResponse, PFCPSessionEstablishmentRequest,
		PFCPSessionEstablishmentResponse, PFCPSessionModificationRequest, PFCPSessionModificationResponse,
	},
	models::{Cause, PFCPHeader, F_SEID},
};
use log::{info, warn};

use super::{association_key, pdr::PdrBuilder, session::Session, N4Handlers, SessionError};

impl N4Handlers {
	fn establishment_response(&self, cause: Cause, up_f_seid: Option<F_SEID>, created_pdr: Vec<CreatedPDR>) -> PFCPSessionEstablishmentResponse {
		PFCPSessionEstablishmentResponse {
			node_id: self.ctx.params.node_id(),
			cause,
			up_f_seid,
			created_pdr,
		}
	}

	/// FARs and QERs go first so PDRs can refer to them.
	async fn establish_rules(&self, session: &mut Session, request: &PFCPSessionEstablishmentRequest) -> Result<Vec<CreatedPDR>, SessionError> {
		for far in request.create_far.iter() {
			session.create_far(&self.ctx, far).await?;
		}
		for qer in request.create_qer.iter() {
			session.create_qer(&self.ctx, qer).await?;
		}
		let mut builder = PdrBuilder::new(&self.ctx, session.resource_key);
		for pdr in request.create_pdr.iter() {
			session.create_pdr(&mut builder, pdr).await?;
		}
		Ok(builder.into_created())
	}

	async fn modify_rules(&self, session: &mut Session, request: &PFCPSessionModificationRequest) -> Result<Vec<CreatedPDR>, SessionError> {
		for far in request.create_far.iter() {
			session.create_far(&self.ctx, far).await?;
		}
		for far in request.update_far.iter() {
			session.update_far(&self.ctx, far).await?;
		}
		for far in request.remove_far.iter() {
			session.remove_far(&self.ctx, far.far_id.rule_id).await?;
		}
		for qer in request.create_qer.iter() {
			session.create_qer(&self.ctx, qer).await?;
		}
		for qer in request.update_qer.iter() {
			session.update_qer(&self.ctx, qer).await?;
		}
		for qer in request.remove_qer.iter() {
			session.remove_qer(&self.ctx, qer.qer_id.rule_id).await?;
		}
		let mut builder = PdrBuilder::new(&self.ctx, session.resource_key);
		for pdr in request.create_pdr.iter() {
			session.create_pdr(&mut builder, pdr).await?;
		}
		for pdr in request.update_pdr.iter() {
			session.update_pdr(&mut builder, pdr).await?;
		}
		for pdr in request.remove_pdr.iter() {
			session.remove_pdr(&self.ctx, pdr.pdr_id.rule_id).await?;
		}
		Ok(builder.into_created())
	}
}

#[async_trait]
impl SessionRequestHandlers for N4Handlers {
	async fn handle_session_establishment(&self, _header: &PFCPHeader, request: PFCPSessionEstablishmentRequest, src: SocketAddr) -> HandlerResult {
		let cp_f_seid = match (request.node_id.as_ref(), request.cp_f_seid.as_ref()) {
			(Some(_), Some(cp_f_seid)) => cp_f_seid.clone(),
			(_, cp_f_seid) => {
				warn!("Rejecting session establishment from {}: Node ID or CP F-SEID missing", src);
				let remote_seid = cp_f_seid.map_or(0, |f| f.seid);
				return Ok(Some(PFCPReply::session(
					self.establishment_response(Cause::MandatoryIEMissing, None, vec![]),
					remote_seid,
				)));
			}
		};
		let key = association_key(&src);
		let mut associations = self.ctx.associations.lock().await;
		let association = match associations.get_mut(&key) {
			Some(association) => association,
			None => {
				warn!("Rejecting session establishment from {}: no association", src);
				return Ok(Some(PFCPReply::session(
					self.establishment_response(Cause::NoEstablishedPFCPAssociation, None, vec![]),
					cp_f_seid.seid,
				)));
			}
		};
		let local_seid = association.new_local_seid();
		let mut session = Session::new(local_seid, cp_f_seid.seid, self.ctx.new_resource_key());
		let created_pdr = match self.establish_rules(&mut session, &request).await {
			Ok(created_pdr) => created_pdr,
			Err(e) => {
				warn!("Session establishment from {} failed: {}", src, e);
				// rules already in the forwarding plane stay, held addresses and TEIDs go back
				if let Err(e) = self.ctx.resources.release_ip(session.resource_key) {
					warn!("Failed to release UE IP: {}", e);
				}
				if let Err(e) = self.ctx.resources.release_teid(session.resource_key) {
					warn!("Failed to release TEIDs: {}", e);
				}
				return Ok(Some(PFCPReply::session(
					self.establishment_response(e.cause(), None, vec![]),
					cp_f_seid.seid,
				)));
			}
		};
		info!(
			"Session {:#x} established for {} (remote SEID {:#x}): {} PDRs, {} FARs, {} QERs",
			local_seid,
			association.id,
			cp_f_seid.seid,
			session.pdrs.len(),
			session.fars.len(),
			session.qers.len()
		);
		association.sessions.insert(local_seid, session);
		self.ctx.update_gauges(&associations);
		let up_f_seid = F_SEID::new(self.ctx.params.node_ip, local_seid);
		Ok(Some(PFCPReply::session(
			self.establishment_response(Cause::RequestAccepted, Some(up_f_seid), created_pdr),
			cp_f_seid.seid,
		)))
	}

	async fn handle_session_modification(&self, header: &PFCPHeader, request: PFCPSessionModificationRequest, src: SocketAddr) -> HandlerResult {
		let reject = |cause: Cause, seid: u64| -> HandlerResult { Ok(Some(PFCPReply::session(PFCPSessionModificationResponse { cause, created_pdr: vec![] }, seid))) };
		let key = association_key(&src);
		let local_seid = header.seid.unwrap_or(0);
		let mut associations = self.ctx.associations.lock().await;
		let association = match associations.get_mut(&key) {
			Some(association) => association,
			None => {
				warn!("Rejecting session modification from {}: no association", src);
				return reject(Cause::NoEstablishedPFCPAssociation, 0);
			}
		};
		let session = match association.sessions.get_mut(&local_seid) {
			Some(session) => session,
			None => {
				warn!("Rejecting session modification from {}: no session {:#x}", src, local_seid);
				return reject(Cause::SessionContextNotFound, 0);
			}
		};
		if let Some(cp_f_seid) = request.cp_f_seid.as_ref() {
			session.remote_seid = cp_f_seid.seid;
		}
		match self.modify_rules(session, &request).await {
			Ok(created_pdr) => {
				info!("Session {:#x} modified by {}", local_seid, src);
				Ok(Some(PFCPReply::session(
					PFCPSessionModificationResponse { cause: Cause::RequestAccepted, created_pdr },
					session.remote_seid,
				)))
			}
			Err(e) => {
				warn!("Session {:#x} modification from {} failed: {}", local_seid, src, e);
				reject(e.cause(), session.remote_seid)
			}
		}
	}

	async fn handle_session_deletion(&self, header: &PFCPHeader, _request: PFCPSessionDeletionRequest, src: SocketAddr) -> HandlerResult {
		let reply = |cause: Cause, seid: u64| -> HandlerResult { Ok(Some(PFCPReply::session(PFCPSessionDeletionResponse { cause }, seid))) };
		let key = association_key(&src);
		let local_seid = header.seid.unwrap_or(0);
		let mut associations = self.ctx.associations.lock().await;
		let association = match associations.get_mut(&key) {
			Some(association) => association,
			None => {
				warn!("Rejecting session deletion from {}: no association", src);
				return reply(Cause::NoEstablishedPFCPAssociation, 0);
			}
		};
		let session = match association.sessions.remove(&local_seid) {
			Some(session) => session,
			None => {
				warn!("Rejecting session deletion from {}: no session {:#x}", src, local_seid);
				return reply(Cause::SessionContextNotFound, 0);
			}
		};
		let result = session.release(&self.ctx).await;
		self.ctx.update_gauges(&associations);
		match result {
			Ok(()) => {
				info!("Session {:#x} deleted by {}", local_seid, src);
				reply(Cause::RequestAccepted, session.remote_seid)
			}
			Err(e) => {
				warn!("Session {:#x} deleted by {} with failures: {}", local_seid, src, e);
				reply(Cause::RuleCreationModificationFailure, session.remote_seid)
			}
		}
	}
}
