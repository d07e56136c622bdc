use std::{
	collections::{HashMap, HashSet},
	net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use libpfcp::{
	messages::{CreateFAR, CreatePDR, CreateQER, UpdateFAR, UpdatePDR, UpdateQER},
	models::{Cause, OuterHeaderCreation, OuterHeaderRemoval},
	PFCPError,
};
use log::{debug, warn};
use thiserror::Error;

use super::pdr::{parse_sdf_filter, PdrBuilder};
use crate::{
	context::UpfContext,
	datapath::{FarInfo, ForwardingPlaneController, ForwardingPlaneError, PdrInfo, QerInfo},
	resource::ResourceError,
};

#[derive(Debug, Error)]
pub enum SessionError {
	#[error("mandatory IE {0} is missing")]
	MissingIe(&'static str),
	#[error("FAR {0} is not known in this session")]
	UnknownFar(u32),
	#[error("QER {0} is not known in this session")]
	UnknownQer(u32),
	#[error("PDR {0} is not known in this session")]
	UnknownPdr(u16),
	#[error("invalid SDF filter: {0}")]
	Sdf(PFCPError),
	#[error(transparent)]
	Resource(#[from] ResourceError),
	#[error(transparent)]
	ForwardingPlane(#[from] ForwardingPlaneError),
}

impl SessionError {
	/// Cause reported to the peer when a request fails with this error.
	pub fn cause(&self) -> Cause {
		match self {
			SessionError::Resource(ResourceError::NoFreeIp) | SessionError::Resource(ResourceError::NoFreeTeid) => {
				Cause::NoResourcesAvailable
			}
			SessionError::ForwardingPlane(ForwardingPlaneError::NoFreeSlot { .. }) => Cause::NoResourcesAvailable,
			_ => Cause::RuleCreationModificationFailure,
		}
	}
}

/// Forwarding plane key a PDR is installed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdrDetection {
	Uplink { teid: u32 },
	DownlinkIpv4(Ipv4Addr),
	DownlinkIpv6(Ipv6Addr),
}

impl PdrDetection {
	pub async fn put(&self, backend: &dyn ForwardingPlaneController, info: PdrInfo) -> Result<(), ForwardingPlaneError> {
		match *self {
			PdrDetection::Uplink { teid } => backend.put_pdr_uplink(teid, info).await,
			PdrDetection::DownlinkIpv4(ip) => backend.put_pdr_downlink(ip, info).await,
			PdrDetection::DownlinkIpv6(ip) => backend.put_pdr_downlink_ip6(ip, info).await,
		}
	}

	pub async fn update(&self, backend: &dyn ForwardingPlaneController, info: PdrInfo) -> Result<(), ForwardingPlaneError> {
		match *self {
			PdrDetection::Uplink { teid } => backend.update_pdr_uplink(teid, info).await,
			PdrDetection::DownlinkIpv4(ip) => backend.update_pdr_downlink(ip, info).await,
			PdrDetection::DownlinkIpv6(ip) => backend.update_pdr_downlink_ip6(ip, info).await,
		}
	}

	pub async fn delete(&self, backend: &dyn ForwardingPlaneController) -> Result<(), ForwardingPlaneError> {
		match *self {
			PdrDetection::Uplink { teid } => backend.delete_pdr_uplink(teid).await,
			PdrDetection::DownlinkIpv4(ip) => backend.delete_pdr_downlink(ip).await,
			PdrDetection::DownlinkIpv6(ip) => backend.delete_pdr_downlink_ip6(ip).await,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionPdr {
	pub pdr_id: u16,
	pub detection: PdrDetection,
	/// Session-local FAR ID
	pub far_id: Option<u32>,
	/// Session-local QER ID
	pub qer_id: Option<u32>,
	pub info: PdrInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionFar {
	pub global_id: u32,
	pub info: FarInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionQer {
	pub global_id: u32,
	pub info: QerInfo,
}

/// A PFCP session and the rules it has installed, keyed by their session-local IDs.
#[derive(Debug)]
pub struct Session {
	pub local_seid: u64,
	pub remote_seid: u64,
	/// Key of the IPs and TEIDs held in the resource manager
	pub resource_key: u64,
	pub pdrs: HashMap<u16, SessionPdr>,
	pub fars: HashMap<u32, SessionFar>,
	pub qers: HashMap<u32, SessionQer>,
}

fn apply_outer_header_creation(info: &mut FarInfo, ohc: &OuterHeaderCreation, n3_address: Ipv4Addr) {
	info.outer_header_creation = ohc.first_octet();
	info.teid = ohc.teid.unwrap_or(0);
	info.remote_ip = ohc.ipv4.map(IpAddr::V4).or_else(|| ohc.ipv6.map(IpAddr::V6));
	info.local_ip = Some(IpAddr::V4(n3_address));
}

pub fn compose_far_info(far: &CreateFAR, n3_address: Ipv4Addr) -> FarInfo {
	let mut info = FarInfo { action: far.apply_action.first_octet(), ..Default::default() };
	if let Some(fp) = far.forwarding_parameters.as_ref() {
		if let Some(ohc) = fp.outer_header_creation.as_ref() {
			apply_outer_header_creation(&mut info, ohc, n3_address);
		}
		if let Some(tlm) = fp.transport_level_marking.as_ref() {
			info.transport_level_marking = tlm.tos_val;
		}
	}
	info
}

pub fn update_far_info(info: &mut FarInfo, update: &UpdateFAR, n3_address: Ipv4Addr) {
	if let Some(action) = update.apply_action.as_ref() {
		info.action = action.first_octet();
	}
	if let Some(fp) = update.update_forwarding_parameters.as_ref() {
		if let Some(ohc) = fp.outer_header_creation.as_ref() {
			apply_outer_header_creation(info, ohc, n3_address);
		}
		if let Some(tlm) = fp.transport_level_marking.as_ref() {
			info.transport_level_marking = tlm.tos_val;
		}
	}
}

pub fn compose_qer_info(qer: &CreateQER) -> QerInfo {
	let mut info = QerInfo {
		gate_status_ul: qer.gate_status.getULGate(),
		gate_status_dl: qer.gate_status.getDLGate(),
		..Default::default()
	};
	if let Some(mbr) = qer.maximum_bitrate.as_ref() {
		info.max_bitrate_ul = mbr.ul_mbr.saturating_mul(1000);
		info.max_bitrate_dl = mbr.dl_mbr.saturating_mul(1000);
	}
	if let Some(qfi) = qer.qfi.as_ref() {
		info.qfi = qfi.getQFI();
	}
	info
}

pub fn update_qer_info(info: &mut QerInfo, update: &UpdateQER) {
	if let Some(gate_status) = update.gate_status.as_ref() {
		info.gate_status_ul = gate_status.getULGate();
		info.gate_status_dl = gate_status.getDLGate();
	}
	if let Some(mbr) = update.maximum_bitrate.as_ref() {
		info.max_bitrate_ul = mbr.ul_mbr.saturating_mul(1000);
		info.max_bitrate_dl = mbr.dl_mbr.saturating_mul(1000);
	}
	if let Some(qfi) = update.qfi.as_ref() {
		info.qfi = qfi.getQFI();
	}
}

fn outer_header_removal(ohr: Option<&OuterHeaderRemoval>) -> Option<u8> {
	ohr.map(|o| o.desc as u8)
}

impl Session {
	pub fn new(local_seid: u64, remote_seid: u64, resource_key: u64) -> Session {
		Session {
			local_seid,
			remote_seid,
			resource_key,
			pdrs: HashMap::new(),
			fars: HashMap::new(),
			qers: HashMap::new(),
		}
	}

	/// Global slot of a session-local FAR ID.
	pub fn far_slot(&self, far_id: Option<u32>) -> Result<Option<u32>, SessionError> {
		match far_id {
			Some(id) => self.fars.get(&id).map(|f| Some(f.global_id)).ok_or(SessionError::UnknownFar(id)),
			None => Ok(None),
		}
	}

	/// Global slot of a session-local QER ID.
	pub fn qer_slot(&self, qer_id: Option<u32>) -> Result<Option<u32>, SessionError> {
		match qer_id {
			Some(id) => self.qers.get(&id).map(|q| Some(q.global_id)).ok_or(SessionError::UnknownQer(id)),
			None => Ok(None),
		}
	}

	pub async fn create_far(&mut self, ctx: &UpfContext, far: &CreateFAR) -> Result<(), SessionError> {
		let info = compose_far_info(far, ctx.params.n3_address);
		let global_id = ctx.backend.new_far(info.clone()).await?;
		debug!("Session {:#x}: FAR {} installed in slot {}", self.local_seid, far.far_id.rule_id, global_id);
		if let Some(previous) = self.fars.insert(far.far_id.rule_id, SessionFar { global_id, info }) {
			// a re-created FAR replaces the old one
			ctx.backend.delete_far(previous.global_id).await?;
		}
		Ok(())
	}

	pub async fn update_far(&mut self, ctx: &UpfContext, update: &UpdateFAR) -> Result<(), SessionError> {
		let far = self
			.fars
			.get_mut(&update.far_id.rule_id)
			.ok_or(SessionError::UnknownFar(update.far_id.rule_id))?;
		update_far_info(&mut far.info, update, ctx.params.n3_address);
		ctx.backend.update_far(far.global_id, far.info.clone()).await?;
		Ok(())
	}

	pub async fn remove_far(&mut self, ctx: &UpfContext, far_id: u32) -> Result<(), SessionError> {
		match self.fars.remove(&far_id) {
			Some(far) => ctx.backend.delete_far(far.global_id).await?,
			None => warn!("Session {:#x}: FAR {} to remove does not exist", self.local_seid, far_id),
		}
		Ok(())
	}

	pub async fn create_qer(&mut self, ctx: &UpfContext, qer: &CreateQER) -> Result<(), SessionError> {
		let info = compose_qer_info(qer);
		let global_id = ctx.backend.new_qer(info.clone()).await?;
		debug!("Session {:#x}: QER {} installed in slot {}", self.local_seid, qer.qer_id.rule_id, global_id);
		if let Some(previous) = self.qers.insert(qer.qer_id.rule_id, SessionQer { global_id, info }) {
			ctx.backend.delete_qer(previous.global_id).await?;
		}
		Ok(())
	}

	pub async fn update_qer(&mut self, ctx: &UpfContext, update: &UpdateQER) -> Result<(), SessionError> {
		let qer = self
			.qers
			.get_mut(&update.qer_id.rule_id)
			.ok_or(SessionError::UnknownQer(update.qer_id.rule_id))?;
		update_qer_info(&mut qer.info, update);
		ctx.backend.update_qer(qer.global_id, qer.info.clone()).await?;
		Ok(())
	}

	pub async fn remove_qer(&mut self, ctx: &UpfContext, qer_id: u32) -> Result<(), SessionError> {
		match self.qers.remove(&qer_id) {
			Some(qer) => ctx.backend.delete_qer(qer.global_id).await?,
			None => warn!("Session {:#x}: QER {} to remove does not exist", self.local_seid, qer_id),
		}
		Ok(())
	}

	pub async fn create_pdr(&mut self, builder: &mut PdrBuilder<'_>, pdr: &CreatePDR) -> Result<(), SessionError> {
		let pdr_id = pdr.pdr_id.rule_id;
		let far_id = pdr.far_id.as_ref().map(|f| f.rule_id);
		let qer_id = pdr.qer_id.as_ref().map(|q| q.rule_id);
		let detection = builder.detection(pdr_id, &pdr.pdi)?;
		let info = PdrInfo {
			outer_header_removal: outer_header_removal(pdr.outer_header_removal.as_ref()),
			far_id: self.far_slot(far_id)?,
			qer_id: self.qer_slot(qer_id)?,
			sdf_filter: parse_sdf_filter(&pdr.pdi)?,
		};
		let backend = builder.backend();
		if let Some(previous) = self.pdrs.get(&pdr_id).map(|p| p.detection) {
			if previous != detection {
				self.release_detection(backend, previous, pdr_id).await?;
			}
		}
		detection.put(backend, info.clone()).await?;
		debug!("Session {:#x}: PDR {} installed as {:?}", self.local_seid, pdr_id, detection);
		self.pdrs.insert(pdr_id, SessionPdr { pdr_id, detection, far_id, qer_id, info });
		Ok(())
	}

	pub async fn update_pdr(&mut self, builder: &mut PdrBuilder<'_>, update: &UpdatePDR) -> Result<(), SessionError> {
		let pdr_id = update.pdr_id.rule_id;
		let mut pdr = self.pdrs.get(&pdr_id).cloned().ok_or(SessionError::UnknownPdr(pdr_id))?;
		if let Some(ohr) = update.outer_header_removal.as_ref() {
			pdr.info.outer_header_removal = outer_header_removal(Some(ohr));
		}
		if let Some(far_id) = update.far_id.as_ref() {
			pdr.far_id = Some(far_id.rule_id);
			pdr.info.far_id = self.far_slot(pdr.far_id)?;
		}
		if let Some(qer_id) = update.qer_id.as_ref() {
			pdr.qer_id = Some(qer_id.rule_id);
			pdr.info.qer_id = self.qer_slot(pdr.qer_id)?;
		}
		let previous = pdr.detection;
		if let Some(pdi) = update.pdi.as_ref() {
			pdr.detection = builder.detection(pdr_id, pdi)?;
			pdr.info.sdf_filter = parse_sdf_filter(pdi)?;
		}
		let backend = builder.backend();
		if previous == pdr.detection {
			pdr.detection.update(backend, pdr.info.clone()).await?;
		} else {
			self.release_detection(backend, previous, pdr_id).await?;
			pdr.detection.put(backend, pdr.info.clone()).await?;
		}
		self.pdrs.insert(pdr_id, pdr);
		Ok(())
	}

	pub async fn remove_pdr(&mut self, ctx: &UpfContext, pdr_id: u16) -> Result<(), SessionError> {
		match self.pdrs.remove(&pdr_id) {
			Some(pdr) => self.release_detection(ctx.backend.as_ref(), pdr.detection, pdr_id).await?,
			None => warn!("Session {:#x}: PDR {} to remove does not exist", self.local_seid, pdr_id),
		}
		Ok(())
	}

	/// Drops the forwarding plane entry of `detection` unless another PDR of the session,
	/// other than `pdr_id`, is installed under it; that PDR then takes the entry over.
	async fn release_detection(
		&self,
		backend: &dyn ForwardingPlaneController,
		detection: PdrDetection,
		pdr_id: u16,
	) -> Result<(), ForwardingPlaneError> {
		match self.pdrs.values().find(|p| p.pdr_id != pdr_id && p.detection == detection) {
			Some(other) => detection.put(backend, other.info.clone()).await,
			None => detection.delete(backend).await,
		}
	}

	/// Removes every rule from the forwarding plane and returns the session's IPs and TEIDs.
	/// Keeps going past failures and reports the first one.
	pub async fn release(&self, ctx: &UpfContext) -> Result<(), SessionError> {
		let mut first_error: Option<SessionError> = None;
		let backend = ctx.backend.as_ref();
		let detections = self.pdrs.values().map(|p| p.detection).collect::<HashSet<_>>();
		for detection in detections {
			if let Err(e) = detection.delete(backend).await {
				warn!("Session {:#x}: failed to delete PDR entry {:?}: {}", self.local_seid, detection, e);
				first_error.get_or_insert(e.into());
			}
		}
		for (far_id, far) in self.fars.iter() {
			if let Err(e) = backend.delete_far(far.global_id).await {
				warn!("Session {:#x}: failed to delete FAR {}: {}", self.local_seid, far_id, e);
				first_error.get_or_insert(e.into());
			}
		}
		for (qer_id, qer) in self.qers.iter() {
			if let Err(e) = backend.delete_qer(qer.global_id).await {
				warn!("Session {:#x}: failed to delete QER {}: {}", self.local_seid, qer_id, e);
				first_error.get_or_insert(e.into());
			}
		}
		if let Err(e) = ctx.resources.release_ip(self.resource_key) {
			first_error.get_or_insert(e.into());
		}
		if let Err(e) = ctx.resources.release_teid(self.resource_key) {
			first_error.get_or_insert(e.into());
		}
		match first_error {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::net::Ipv4Addr;

	use libpfcp::{
		messages::{ForwardingParameters, UpdateForwardingParameters},
		models::*,
	};

	use super::*;

	fn forward_far(ohc: Option<OuterHeaderCreation>) -> CreateFAR {
		let mut action = ApplyAction(0);
		action.setFORW(1);
		CreateFAR {
			far_id: FAR_ID { rule_id: 1 },
			apply_action: action,
			forwarding_parameters: Some(ForwardingParameters {
				destination_interface: DestinationInterface::AccessSide,
				network_instance: None,
				outer_header_creation: ohc,
				transport_level_marking: Some(TransportLevelMarking { tos_val: 0xb8fc }),
			}),
		}
	}

	#[test]
	fn test_compose_far_info() {
		let n3 = Ipv4Addr::new(10, 100, 50, 233);
		let far = forward_far(Some(OuterHeaderCreation::gtp_u_ipv4(0x44, Ipv4Addr::new(10, 100, 50, 1))));
		let info = compose_far_info(&far, n3);
		assert_eq!(info.action, 0b10);
		assert_eq!(info.outer_header_creation, 1);
		assert_eq!(info.teid, 0x44);
		assert_eq!(info.remote_ip, Some(IpAddr::V4(Ipv4Addr::new(10, 100, 50, 1))));
		assert_eq!(info.local_ip, Some(IpAddr::V4(n3)));
		assert_eq!(info.transport_level_marking, 0xb8fc);

		let plain = compose_far_info(&forward_far(None), n3);
		assert_eq!(plain.outer_header_creation, 0);
		assert_eq!(plain.remote_ip, None);
	}

	#[test]
	fn test_far_update_keeps_untouched_fields() {
		let n3 = Ipv4Addr::new(10, 0, 0, 3);
		let mut info = compose_far_info(&forward_far(None), n3);
		let mut drop = ApplyAction(0);
		drop.setDROP(1);
		update_far_info(
			&mut info,
			&UpdateFAR {
				far_id: FAR_ID { rule_id: 1 },
				apply_action: Some(drop),
				update_forwarding_parameters: Some(UpdateForwardingParameters {
					destination_interface: None,
					network_instance: None,
					outer_header_creation: Some(OuterHeaderCreation::gtp_u_ipv4(9, Ipv4Addr::new(10, 0, 0, 9))),
					transport_level_marking: None,
				}),
			},
			n3,
		);
		assert_eq!(info.action, 1);
		assert_eq!(info.teid, 9);
		assert_eq!(info.transport_level_marking, 0xb8fc);
	}

	#[test]
	fn test_qer_info_in_bps() {
		let mut gate = GateStatus(0);
		gate.setULGate(1);
		let mut qfi = QFI(0);
		qfi.setQFI(9);
		let mut info = compose_qer_info(&CreateQER {
			qer_id: QER_ID { rule_id: 1 },
			gate_status: gate,
			maximum_bitrate: Some(MBR { ul_mbr: 200_000, dl_mbr: 100_000 }),
			qfi: Some(qfi),
		});
		assert_eq!(info.gate_status_ul, 1);
		assert_eq!(info.gate_status_dl, 0);
		assert_eq!(info.max_bitrate_ul, 200_000_000);
		assert_eq!(info.max_bitrate_dl, 100_000_000);
		assert_eq!(info.qfi, 9);

		update_qer_info(
			&mut info,
			&UpdateQER { qer_id: QER_ID { rule_id: 1 }, gate_status: Some(GateStatus(0)), maximum_bitrate: None, qfi: None },
		);
		assert_eq!(info.gate_status_ul, 0);
		assert_eq!(info.max_bitrate_ul, 200_000_000);
	}

	#[test]
	fn test_error_causes() {
		assert_eq!(SessionError::Resource(ResourceError::NoFreeIp).cause(), Cause::NoResourcesAvailable);
		assert_eq!(SessionError::Resource(ResourceError::NoFreeTeid).cause(), Cause::NoResourcesAvailable);
		assert_eq!(SessionError::UnknownFar(3).cause(), Cause::RuleCreationModificationFailure);
		assert_eq!(
			SessionError::ForwardingPlane(ForwardingPlaneError::Backend("down".into())).cause(),
			Cause::RuleCreationModificationFailure
		);
	}

	#[test]
	fn test_unknown_rule_references() {
		let mut session = Session::new(1, 2, 3);
		session.fars.insert(7, SessionFar { global_id: 70, info: FarInfo::default() });
		assert_eq!(session.far_slot(Some(7)).unwrap(), Some(70));
		assert_eq!(session.far_slot(None).unwrap(), None);
		assert!(matches!(session.far_slot(Some(8)), Err(SessionError::UnknownFar(8))));
		assert!(matches!(session.qer_slot(Some(1)), Err(SessionError::UnknownQer(1))));
	}
}
