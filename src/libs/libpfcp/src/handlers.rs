use async_trait::async_trait;
use log::{error, warn};
use tokio::net::UdpSocket;

use super::messages::*;
use super::models::{Cause, PFCPHeader};
use super::PFCPError;
use std::{
	net::SocketAddr,
	sync::Arc,
	time::{Duration, Instant},
};

/// A response produced by a handler; `seid` goes into the header of session-level responses.
#[derive(Debug, Clone, PartialEq)]
pub struct PFCPReply {
	pub message: PFCPMessage,
	pub seid: Option<u64>,
}

impl PFCPReply {
	pub fn node<M: Into<PFCPMessage>>(message: M) -> PFCPReply {
		PFCPReply { message: message.into(), seid: None }
	}
	pub fn session<M: Into<PFCPMessage>>(message: M, seid: u64) -> PFCPReply {
		PFCPReply { message: message.into(), seid: Some(seid) }
	}
}

/// `Ok(None)` and `Err(_)` both mean nothing is sent back.
pub type HandlerResult = Result<Option<PFCPReply>, PFCPError>;

#[async_trait]
pub trait SessionRequestHandlers {
	async fn handle_session_establishment(
		&self,
		header: &PFCPHeader,
		request: PFCPSessionEstablishmentRequest,
		src: SocketAddr,
	) -> HandlerResult;
	async fn handle_session_modification(
		&self,
		header: &PFCPHeader,
		request: PFCPSessionModificationRequest,
		src: SocketAddr,
	) -> HandlerResult;
	async fn handle_session_deletion(
		&self,
		header: &PFCPHeader,
		request: PFCPSessionDeletionRequest,
		src: SocketAddr,
	) -> HandlerResult;
}

#[async_trait]
pub trait NodeRequestHandlers {
	async fn handle_heartbeat_request(&self, header: &PFCPHeader, request: HeartbeatRequest, src: SocketAddr) -> HandlerResult;
	async fn handle_heartbeat_response(&self, header: &PFCPHeader, response: HeartbeatResponse, src: SocketAddr) -> HandlerResult;
	async fn handle_association_setup(
		&self,
		header: &PFCPHeader,
		request: AssociationSetupRequest,
		src: SocketAddr,
	) -> HandlerResult;
	/// Answer to a setup request this node sent; never replied to.
	async fn handle_association_setup_response(
		&self,
		header: &PFCPHeader,
		response: AssociationSetupResponse,
		src: SocketAddr,
	) -> HandlerResult;
	async fn handle_association_update(
		&self,
		header: &PFCPHeader,
		request: AssociationUpdateRequest,
		src: SocketAddr,
	) -> HandlerResult;
	async fn handle_association_release(
		&self,
		header: &PFCPHeader,
		request: AssociationReleaseRequest,
		src: SocketAddr,
	) -> HandlerResult;
}

/// Sink for PFCP counters, keyed by message name.
pub trait MetricsCollector: Send + Sync {
	fn message_rx(&self, message: &str);
	fn message_tx(&self, message: &str);
	fn message_rx_error(&self, message: &str, cause: Cause);
	fn message_latency(&self, message: &str, elapsed: Duration);
	fn set_associations(&self, count: usize);
	fn set_sessions(&self, count: usize);
}

/// An encoded response waiting to be sent.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
	pub name: &'static str,
	pub bytes: Vec<u8>,
}

pub struct PFCPDispatcher<H> {
	handlers: H,
	metrics: Arc<dyn MetricsCollector>,
}

impl<H> PFCPDispatcher<H>
where
	H: SessionRequestHandlers + NodeRequestHandlers + Send + Sync,
{
	pub fn new(handlers: H, metrics: Arc<dyn MetricsCollector>) -> PFCPDispatcher<H> {
		PFCPDispatcher { handlers, metrics }
	}

	pub fn handlers(&self) -> &H {
		&self.handlers
	}

	/// Handles every message of one datagram (follow-on messages included) and returns the responses to send.
	pub async fn handle(&self, datagram: &[u8], src: SocketAddr) -> Vec<OutgoingMessage> {
		let mut replies = vec![];
		let mut content = datagram;
		let mut fo_flag_set = true;
		while !content.is_empty() && fo_flag_set {
			match PFCPHeader::decode(content) {
				Ok((body, next_msg_pointer, header)) => {
					fo_flag_set = header.flags.getFO() != 0;
					if let Some(reply) = self.handle_message(header, &body, src).await {
						replies.push(reply);
					}
					content = next_msg_pointer;
				}
				Err(e) => {
					warn!("Failed to decode PFCP header from {}: {}, message discarded", src, e);
					break;
				}
			}
		}
		replies
	}

	async fn handle_message(&self, header: PFCPHeader, body: &[u8], src: SocketAddr) -> Option<OutgoingMessage> {
		let message = match PFCPMessage::decode(header.msg_type, body) {
			Ok(message) => message,
			Err(e) => {
				warn!("Failed to decode PFCP message type {} from {}: {}, message discarded", header.msg_type, src, e);
				return None;
			}
		};
		let name = message.name();
		self.metrics.message_rx(name);
		let start = Instant::now();
		let result = match message {
			PFCPMessage::HeartbeatRequest(m) => self.handlers.handle_heartbeat_request(&header, m, src).await,
			PFCPMessage::HeartbeatResponse(m) => self.handlers.handle_heartbeat_response(&header, m, src).await,
			PFCPMessage::AssociationSetupRequest(m) => self.handlers.handle_association_setup(&header, m, src).await,
			PFCPMessage::AssociationSetupResponse(m) => self.handlers.handle_association_setup_response(&header, m, src).await,
			PFCPMessage::AssociationUpdateRequest(m) => self.handlers.handle_association_update(&header, m, src).await,
			PFCPMessage::AssociationReleaseRequest(m) => self.handlers.handle_association_release(&header, m, src).await,
			PFCPMessage::PFCPSessionEstablishmentRequest(m) => self.handlers.handle_session_establishment(&header, m, src).await,
			PFCPMessage::PFCPSessionModificationRequest(m) => self.handlers.handle_session_modification(&header, m, src).await,
			PFCPMessage::PFCPSessionDeletionRequest(m) => self.handlers.handle_session_deletion(&header, m, src).await,
			other => {
				warn!("No handler for {} (type {}) from {}, message dropped", other.name(), header.msg_type, src);
				return None;
			}
		};
		self.metrics.message_latency(name, start.elapsed());
		let reply = match result {
			Ok(Some(reply)) => reply,
			Ok(None) => return None,
			Err(e) => {
				error!("Failed to handle {} from {}: {}", name, src, e);
				return None;
			}
		};
		if let Some(cause) = reply.message.cause() {
			if !cause.is_accepted() {
				self.metrics.message_rx_error(name, cause);
			}
		}
		Some(OutgoingMessage {
			name: reply.message.name(),
			bytes: reply.message.encode(header.seq, reply.seid),
		})
	}

	/// Receive loop: each datagram is fully handled and answered before the next one is read.
	pub async fn run(&self, socket: &UdpSocket) {
		let mut buf = vec![0u8; 65536];
		loop {
			let (number_of_bytes, src_addr) = match socket.recv_from(&mut buf).await {
				Ok(r) => r,
				Err(e) => {
					error!("Failed to receive PFCP datagram: {}", e);
					continue;
				}
			};
			for reply in self.handle(&buf[..number_of_bytes], src_addr).await {
				match socket.send_to(&reply.bytes, src_addr).await {
					Ok(_) => self.metrics.message_tx(reply.name),
					Err(e) => error!("Failed to send {} to {}: {}", reply.name, src_addr, e),
				}
			}
		}
	}
}
