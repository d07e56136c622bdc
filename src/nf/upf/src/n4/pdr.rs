use std::{collections::HashMap, net::IpAddr};

use libpfcp::{
	helpers::SdfFilter,
	messages::{CreatedPDR, PDI},
	models::{F_TEID, PDR_ID, UE_IPAddress},
};
use log::debug;

use super::session::{PdrDetection, SessionError};
use crate::{context::UpfContext, datapath::ForwardingPlaneController};

/// Parses the flow description of the PDI's SDF filter, if any.
pub fn parse_sdf_filter(pdi: &PDI) -> Result<Option<SdfFilter>, SessionError> {
	match pdi.sdf_filter.as_ref().and_then(|f| f.flow_desc.as_ref()) {
		Some(flow_desc) => SdfFilter::parse(flow_desc).map(Some).map_err(SessionError::Sdf),
		None => Ok(None),
	}
}

/// Resolves PDIs of one request into forwarding plane keys, allocating TEIDs and UE
/// addresses on request. Allocations are collected as Created PDR IEs.
pub struct PdrBuilder<'a> {
	ctx: &'a UpfContext,
	resource_key: u64,
	teid_by_choose_id: HashMap<u8, u32>,
	created: Vec<CreatedPDR>,
}

impl<'a> PdrBuilder<'a> {
	pub fn new(ctx: &'a UpfContext, resource_key: u64) -> PdrBuilder<'a> {
		PdrBuilder {
			ctx,
			resource_key,
			teid_by_choose_id: HashMap::new(),
			created: vec![],
		}
	}

	pub fn backend(&self) -> &'a dyn ForwardingPlaneController {
		self.ctx.backend.as_ref()
	}

	fn ue_ip(&mut self, pdi: &PDI, created: &mut CreatedPDR) -> Result<Option<IpAddr>, SessionError> {
		let ue_ip = match pdi.ue_ip_address.as_ref() {
			Some(ue_ip) => ue_ip,
			None => return Ok(None),
		};
		let allocated = if ue_ip.flags.getCHV4() != 0 {
			IpAddr::V4(self.ctx.resources.allocate_ipv4(self.resource_key)?)
		} else if ue_ip.flags.getCHV6() != 0 {
			IpAddr::V6(self.ctx.resources.allocate_ipv6(self.resource_key)?)
		} else {
			return Ok(ue_ip.ipv4.map(IpAddr::V4).or_else(|| ue_ip.ipv6.map(IpAddr::V6)));
		};
		created.ue_ip_address = Some(UE_IPAddress::from_ip(allocated, ue_ip.flags.getSD() != 0));
		Ok(Some(allocated))
	}

	fn local_teid(&mut self, pdr_id: u16, f_teid: &F_TEID, created: &mut CreatedPDR) -> Result<u32, SessionError> {
		if !f_teid.is_choose() {
			return f_teid.teid.ok_or(SessionError::MissingIe("F-TEID"));
		}
		let cached = f_teid.choose_id.and_then(|id| self.teid_by_choose_id.get(&id).copied());
		let teid = match cached {
			Some(teid) => teid,
			None => {
				let teid = self.ctx.resources.allocate_teid(self.resource_key, pdr_id)?;
				if let Some(id) = f_teid.choose_id {
					self.teid_by_choose_id.insert(id, teid);
				}
				teid
			}
		};
		debug!("PDR {} uses local TEID {:#x}", pdr_id, teid);
		created.local_f_teid = Some(F_TEID::from_ip_teid(IpAddr::V4(self.ctx.params.n3_address), teid));
		Ok(teid)
	}

	/// A local F-TEID makes an uplink PDR, otherwise the UE address makes a downlink one.
	pub fn detection(&mut self, pdr_id: u16, pdi: &PDI) -> Result<PdrDetection, SessionError> {
		let mut created = CreatedPDR {
			pdr_id: PDR_ID { rule_id: pdr_id },
			local_f_teid: None,
			ue_ip_address: None,
		};
		let ue_ip = self.ue_ip(pdi, &mut created)?;
		let detection = match (pdi.local_f_teid.as_ref(), ue_ip) {
			(Some(f_teid), _) => PdrDetection::Uplink { teid: self.local_teid(pdr_id, f_teid, &mut created)? },
			(None, Some(IpAddr::V4(ip))) => PdrDetection::DownlinkIpv4(ip),
			(None, Some(IpAddr::V6(ip))) => PdrDetection::DownlinkIpv6(ip),
			(None, None) => return Err(SessionError::MissingIe("F-TEID or UE IP Address")),
		};
		if created.local_f_teid.is_some() || created.ue_ip_address.is_some() {
			self.created.push(created);
		}
		Ok(detection)
	}

	pub fn into_created(self) -> Vec<CreatedPDR> {
		self.created
	}
}
