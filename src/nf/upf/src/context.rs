use std::{
	collections::HashMap,
	net::{IpAddr, Ipv4Addr},
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
	time::Duration,
};

use libpfcp::{
	handlers::MetricsCollector,
	models::{NodeID, RecoveryTimeStamp, UPFunctionFeatures},
};
use tokio::sync::Mutex;

use crate::{config::UpfConfig, datapath::ForwardingPlaneController, n4::NodeAssociation, resource::ResourceManager};

#[derive(Debug, Clone)]
pub struct UPFParameters {
	pub node_id: String,
	/// Address put in the UP F-SEID of established sessions
	pub node_ip: IpAddr,
	pub n3_address: Ipv4Addr,
	pub feature_ftup: bool,
	pub feature_ueip: bool,
	pub heartbeat_retries: u32,
	pub heartbeat_interval: Duration,
	pub heartbeat_timeout: Duration,
	pub nf_startup_time: chrono::DateTime<chrono::offset::Utc>,
}

impl UPFParameters {
	pub fn from_config(config: &UpfConfig, nf_startup_time: chrono::DateTime<chrono::offset::Utc>) -> UPFParameters {
		let node_ip = match config.pfcp_node_id.parse::<IpAddr>() {
			Ok(ip) => ip,
			Err(_) if !config.pfcp_address.ip().is_unspecified() => config.pfcp_address.ip(),
			Err(_) => IpAddr::V4(config.n3_address),
		};
		UPFParameters {
			node_id: config.pfcp_node_id.clone(),
			node_ip,
			n3_address: config.n3_address,
			feature_ftup: config.feature_ftup,
			feature_ueip: config.feature_ueip,
			heartbeat_retries: config.heartbeat_retries,
			heartbeat_interval: Duration::from_secs(config.heartbeat_interval),
			heartbeat_timeout: Duration::from_secs(config.heartbeat_timeout),
			nf_startup_time,
		}
	}

	pub fn node_id(&self) -> NodeID {
		NodeID::from_string(&self.node_id)
	}

	pub fn recovery_time_stamp(&self) -> RecoveryTimeStamp {
		RecoveryTimeStamp::new(self.nf_startup_time)
	}

	pub fn up_function_features(&self) -> UPFunctionFeatures {
		let mut features = UPFunctionFeatures(0);
		if self.feature_ftup {
			features.setFTUP(1);
		}
		if self.feature_ueip {
			features.setUEIP(1);
		}
		features
	}
}

/// State shared by the PFCP handlers and the heartbeat engine.
pub struct UpfContext {
	pub params: UPFParameters,
	/// Keyed by the peer IP address
	pub associations: Mutex<HashMap<String, NodeAssociation>>,
	pub resources: ResourceManager,
	pub backend: Arc<dyn ForwardingPlaneController>,
	pub metrics: Arc<dyn MetricsCollector>,
	next_resource_key: AtomicU64,
}

impl UpfContext {
	pub fn new(
		params: UPFParameters,
		resources: ResourceManager,
		backend: Arc<dyn ForwardingPlaneController>,
		metrics: Arc<dyn MetricsCollector>,
	) -> UpfContext {
		UpfContext {
			params,
			associations: Mutex::new(HashMap::new()),
			resources,
			backend,
			metrics,
			next_resource_key: AtomicU64::new(1),
		}
	}

	/// Key under which a session's IPs and TEIDs are held, unique across associations.
	pub fn new_resource_key(&self) -> u64 {
		self.next_resource_key.fetch_add(1, Ordering::Relaxed)
	}

	pub fn update_gauges(&self, associations: &HashMap<String, NodeAssociation>) {
		self.metrics.set_associations(associations.len());
		self.metrics.set_sessions(associations.values().map(|a| a.sessions.len()).sum());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parameters_from_config() {
		let mut config = UpfConfig::default();
		config.feature_ftup = true;
		let params = UPFParameters::from_config(&config, chrono::Utc::now());
		assert_eq!(params.node_ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
		assert_eq!(params.up_function_features().getFTUP(), 1);
		assert_eq!(params.up_function_features().getUEIP(), 0);
		assert_eq!(params.heartbeat_interval, Duration::from_secs(5));

		config.pfcp_node_id = "upf.local".into();
		config.pfcp_address = "0.0.0.0:8805".parse().unwrap();
		config.n3_address = Ipv4Addr::new(10, 0, 0, 3);
		let params = UPFParameters::from_config(&config, chrono::Utc::now());
		assert_eq!(params.node_ip, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)));
		assert_eq!(params.node_id().to_string(), "upf.local");
	}
}
