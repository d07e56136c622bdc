pub mod id_tracker;
pub mod memory;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use libpfcp::helpers::SdfFilter;
use thiserror::Error;

use id_tracker::IdTrackerError;

/// What a PDR installs in the forwarding plane, keyed by TEID or UE address.
#[derive(Debug, Clone, PartialEq)]
pub struct PdrInfo {
	pub outer_header_removal: Option<u8>,
	/// Global FAR slot
	pub far_id: Option<u32>,
	/// Global QER slot
	pub qer_id: Option<u32>,
	pub sdf_filter: Option<SdfFilter>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FarInfo {
	/// First octet of Apply Action
	pub action: u8,
	/// First octet of the Outer Header Creation description, 0 when absent
	pub outer_header_creation: u8,
	pub teid: u32,
	pub remote_ip: Option<IpAddr>,
	pub local_ip: Option<IpAddr>,
	pub transport_level_marking: u16,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QerInfo {
	pub gate_status_ul: u8,
	pub gate_status_dl: u8,
	pub qfi: u8,
	/// bits per second
	pub max_bitrate_ul: u64,
	/// bits per second
	pub max_bitrate_dl: u64,
}

#[derive(Debug, Error)]
pub enum ForwardingPlaneError {
	#[error("no free {kind} slot: {source}")]
	NoFreeSlot {
		kind: &'static str,
		source: IdTrackerError,
	},
	#[error("{kind} {key} not found")]
	NotFound { kind: &'static str, key: String },
	#[error("forwarding plane failure: {0}")]
	Backend(String),
}

/// Programs per-packet state. PDRs are addressed by their match key, FARs and QERs by the
/// global slot handed out by `new_far`/`new_qer`.
#[async_trait]
pub trait ForwardingPlaneController: Send + Sync {
	async fn put_pdr_uplink(&self, teid: u32, pdr: PdrInfo) -> Result<(), ForwardingPlaneError>;
	async fn put_pdr_downlink(&self, ipv4: Ipv4Addr, pdr: PdrInfo) -> Result<(), ForwardingPlaneError>;
	async fn put_pdr_downlink_ip6(&self, ipv6: Ipv6Addr, pdr: PdrInfo) -> Result<(), ForwardingPlaneError>;
	async fn update_pdr_uplink(&self, teid: u32, pdr: PdrInfo) -> Result<(), ForwardingPlaneError>;
	async fn update_pdr_downlink(&self, ipv4: Ipv4Addr, pdr: PdrInfo) -> Result<(), ForwardingPlaneError>;
	async fn update_pdr_downlink_ip6(&self, ipv6: Ipv6Addr, pdr: PdrInfo) -> Result<(), ForwardingPlaneError>;
	async fn delete_pdr_uplink(&self, teid: u32) -> Result<(), ForwardingPlaneError>;
	async fn delete_pdr_downlink(&self, ipv4: Ipv4Addr) -> Result<(), ForwardingPlaneError>;
	async fn delete_pdr_downlink_ip6(&self, ipv6: Ipv6Addr) -> Result<(), ForwardingPlaneError>;

	async fn new_far(&self, far: FarInfo) -> Result<u32, ForwardingPlaneError>;
	async fn update_far(&self, far_id: u32, far: FarInfo) -> Result<(), ForwardingPlaneError>;
	async fn delete_far(&self, far_id: u32) -> Result<(), ForwardingPlaneError>;

	async fn new_qer(&self, qer: QerInfo) -> Result<u32, ForwardingPlaneError>;
	async fn update_qer(&self, qer_id: u32, qer: QerInfo) -> Result<(), ForwardingPlaneError>;
	async fn delete_qer(&self, qer_id: u32) -> Result<(), ForwardingPlaneError>;
}
