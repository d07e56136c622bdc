use std::{
	net::{Ipv4Addr, Ipv6Addr},
	sync::Mutex,
};

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, info};

use super::{
	id_tracker::IdTracker, FarInfo, ForwardingPlaneController, ForwardingPlaneError, PdrInfo, QerInfo,
};

/// Forwarding plane kept in process memory, with the same addressing as a packet pipeline:
/// PDR tables keyed by match field, FAR/QER tables keyed by slot.
pub struct InMemoryForwardingPlane {
	uplink: DashMap<u32, PdrInfo>,
	downlink: DashMap<Ipv4Addr, PdrInfo>,
	downlink_ip6: DashMap<Ipv6Addr, PdrInfo>,
	fars: DashMap<u32, FarInfo>,
	qers: DashMap<u32, QerInfo>,
	far_slots: Mutex<IdTracker>,
	qer_slots: Mutex<IdTracker>,
}

fn not_found(kind: &'static str, key: impl ToString) -> ForwardingPlaneError {
	ForwardingPlaneError::NotFound { kind, key: key.to_string() }
}

fn poisoned(kind: &'static str) -> ForwardingPlaneError {
	ForwardingPlaneError::Backend(format!("{} slot tracker poisoned", kind))
}

impl InMemoryForwardingPlane {
	pub fn new(far_map_size: u32, qer_map_size: u32) -> InMemoryForwardingPlane {
		InMemoryForwardingPlane {
			uplink: DashMap::new(),
			downlink: DashMap::new(),
			downlink_ip6: DashMap::new(),
			fars: DashMap::new(),
			qers: DashMap::new(),
			far_slots: Mutex::new(IdTracker::new(far_map_size)),
			qer_slots: Mutex::new(IdTracker::new(qer_map_size)),
		}
	}

	pub fn uplink_pdr(&self, teid: u32) -> Option<PdrInfo> {
		self.uplink.get(&teid).map(|e| e.value().clone())
	}

	pub fn downlink_pdr(&self, ipv4: Ipv4Addr) -> Option<PdrInfo> {
		self.downlink.get(&ipv4).map(|e| e.value().clone())
	}

	pub fn downlink_pdr_ip6(&self, ipv6: Ipv6Addr) -> Option<PdrInfo> {
		self.downlink_ip6.get(&ipv6).map(|e| e.value().clone())
	}

	pub fn far(&self, far_id: u32) -> Option<FarInfo> {
		self.fars.get(&far_id).map(|e| e.value().clone())
	}

	pub fn qer(&self, qer_id: u32) -> Option<QerInfo> {
		self.qers.get(&qer_id).map(|e| e.value().clone())
	}

	pub fn pdr_count(&self) -> usize {
		self.uplink.len() + self.downlink.len() + self.downlink_ip6.len()
	}

	pub fn far_count(&self) -> usize {
		self.fars.len()
	}

	pub fn qer_count(&self) -> usize {
		self.qers.len()
	}

	pub fn log_summary(&self) {
		info!(
			"Forwarding plane: {} uplink PDRs, {} downlink PDRs, {} downlink IPv6 PDRs, {} FARs, {} QERs",
			self.uplink.len(),
			self.downlink.len(),
			self.downlink_ip6.len(),
			self.fars.len(),
			self.qers.len()
		);
	}

	fn allocate_slot(tracker: &Mutex<IdTracker>, kind: &'static str) -> Result<u32, ForwardingPlaneError> {
		let mut guard = tracker.lock().map_err(|_| poisoned(kind))?;
		guard
			.get_next()
			.map_err(|source| ForwardingPlaneError::NoFreeSlot { kind, source })
	}

	fn release_slot(tracker: &Mutex<IdTracker>, kind: &'static str, id: u32) -> Result<(), ForwardingPlaneError> {
		tracker.lock().map_err(|_| poisoned(kind))?.release(id);
		Ok(())
	}
}

#[async_trait]
impl ForwardingPlaneController for InMemoryForwardingPlane {
	async fn put_pdr_uplink(&self, teid: u32, pdr: PdrInfo) -> Result<(), ForwardingPlaneError> {
		debug!("Put uplink PDR teid={} {:?}", teid, pdr);
		self.uplink.insert(teid, pdr);
		Ok(())
	}

	async fn put_pdr_downlink(&self, ipv4: Ipv4Addr, pdr: PdrInfo) -> Result<(), ForwardingPlaneError> {
		debug!("Put downlink PDR ue_ip={} {:?}", ipv4, pdr);
		self.downlink.insert(ipv4, pdr);
		Ok(())
	}

	async fn put_pdr_downlink_ip6(&self, ipv6: Ipv6Addr, pdr: PdrInfo) -> Result<(), ForwardingPlaneError> {
		debug!("Put downlink PDR ue_ip={} {:?}", ipv6, pdr);
		self.downlink_ip6.insert(ipv6, pdr);
		Ok(())
	}

	async fn update_pdr_uplink(&self, teid: u32, pdr: PdrInfo) -> Result<(), ForwardingPlaneError> {
		let mut entry = self.uplink.get_mut(&teid).ok_or_else(|| not_found("uplink PDR", teid))?;
		*entry = pdr;
		Ok(())
	}

	async fn update_pdr_downlink(&self, ipv4: Ipv4Addr, pdr: PdrInfo) -> Result<(), ForwardingPlaneError> {
		let mut entry = self.downlink.get_mut(&ipv4).ok_or_else(|| not_found("downlink PDR", ipv4))?;
		*entry = pdr;
		Ok(())
	}

	async fn update_pdr_downlink_ip6(&self, ipv6: Ipv6Addr, pdr: PdrInfo) -> Result<(), ForwardingPlaneError> {
		let mut entry = self.downlink_ip6.get_mut(&ipv6).ok_or_else(|| not_found("downlink PDR", ipv6))?;
		*entry = pdr;
		Ok(())
	}

	async fn delete_pdr_uplink(&self, teid: u32) -> Result<(), ForwardingPlaneError> {
		self.uplink.remove(&teid).map(|_| ()).ok_or_else(|| not_found("uplink PDR", teid))
	}

	async fn delete_pdr_downlink(&self, ipv4: Ipv4Addr) -> Result<(), ForwardingPlaneError> {
		self.downlink.remove(&ipv4).map(|_| ()).ok_or_else(|| not_found("downlink PDR", ipv4))
	}

	async fn delete_pdr_downlink_ip6(&self, ipv6: Ipv6Addr) -> Result<(), ForwardingPlaneError> {
		self.downlink_ip6.remove(&ipv6).map(|_| ()).ok_or_else(|| not_found("downlink PDR", ipv6))
	}

	async fn new_far(&self, far: FarInfo) -> Result<u32, ForwardingPlaneError> {
		let far_id = Self::allocate_slot(&self.far_slots, "FAR")?;
		debug!("New FAR slot={} {:?}", far_id, far);
		self.fars.insert(far_id, far);
		Ok(far_id)
	}

	async fn update_far(&self, far_id: u32, far: FarInfo) -> Result<(), ForwardingPlaneError> {
		let mut entry = self.fars.get_mut(&far_id).ok_or_else(|| not_found("FAR", far_id))?;
		*entry = far;
		Ok(())
	}

	async fn delete_far(&self, far_id: u32) -> Result<(), ForwardingPlaneError> {
		self.fars.remove(&far_id).ok_or_else(|| not_found("FAR", far_id))?;
		Self::release_slot(&self.far_slots, "FAR", far_id)
	}

	async fn new_qer(&self, qer: QerInfo) -> Result<u32, ForwardingPlaneError> {
		let qer_id = Self::allocate_slot(&self.qer_slots, "QER")?;
		debug!("New QER slot={} {:?}", qer_id, qer);
		self.qers.insert(qer_id, qer);
		Ok(qer_id)
	}

	async fn update_qer(&self, qer_id: u32, qer: QerInfo) -> Result<(), ForwardingPlaneError> {
		let mut entry = self.qers.get_mut(&qer_id).ok_or_else(|| not_found("QER", qer_id))?;
		*entry = qer;
		Ok(())
	}

	async fn delete_qer(&self, qer_id: u32) -> Result<(), ForwardingPlaneError> {
		self.qers.remove(&qer_id).ok_or_else(|| not_found("QER", qer_id))?;
		Self::release_slot(&self.qer_slots, "QER", qer_id)
	}
}
