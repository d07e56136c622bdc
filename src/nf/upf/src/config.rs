use std::{
	net::{Ipv4Addr, SocketAddr},
	path::Path,
};

use cidr::{Ipv4Cidr, Ipv6Cidr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("cannot read config file: {0}")]
	Io(#[from] std::io::Error),
	#[error("malformed config: {0}")]
	Yaml(#[from] serde_yaml::Error),
	#[error("invalid {field}: {reason}")]
	Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl ToString) -> ConfigError {
	ConfigError::Invalid { field, reason: reason.to_string() }
}

/// UPF settings as read from YAML. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpfConfig {
	/// Local address the PFCP socket binds to
	pub pfcp_address: SocketAddr,
	/// Node ID advertised to peers, an IP address or an FQDN
	pub pfcp_node_id: String,
	/// Local N3 address, used for allocated F-TEIDs and as GTP-U source address
	pub n3_address: Ipv4Addr,
	pub heartbeat_retries: u32,
	/// Seconds between two heartbeat requests
	pub heartbeat_interval: u64,
	/// Seconds to wait for a heartbeat response, 0 disables heartbeats
	pub heartbeat_timeout: u64,
	pub far_map_size: u32,
	pub qer_map_size: u32,
	pub feature_ueip: bool,
	pub feature_ftup: bool,
	pub ip_pool: String,
	pub ip_pool_v6: Option<String>,
	pub teid_pool: u32,
	/// Seconds between two metric summaries in the log, 0 disables them
	pub metrics_log_interval: u64,
	/// Control-plane peers this node sets up associations with on its own
	pub smf_peers: Vec<SocketAddr>,
	/// Seconds between two setup attempts towards a peer without association
	pub association_setup_interval: u64,
}

impl Default for UpfConfig {
	fn default() -> Self {
		UpfConfig {
			pfcp_address: SocketAddr::from((Ipv4Addr::LOCALHOST, libpfcp::PFCP_PORT)),
			pfcp_node_id: "127.0.0.1".into(),
			n3_address: Ipv4Addr::LOCALHOST,
			heartbeat_retries: 3,
			heartbeat_interval: 5,
			heartbeat_timeout: 5,
			far_map_size: 1024,
			qer_map_size: 1024,
			feature_ueip: false,
			feature_ftup: false,
			ip_pool: "10.60.0.0/24".into(),
			ip_pool_v6: None,
			teid_pool: 65536,
			metrics_log_interval: 60,
			smf_peers: vec![],
			association_setup_interval: 5,
		}
	}
}

impl UpfConfig {
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<UpfConfig, ConfigError> {
		let cfg_file = std::fs::File::open(path)?;
		Ok(serde_yaml::from_reader(cfg_file)?)
	}

	pub fn from_yaml(yaml: &str) -> Result<UpfConfig, ConfigError> {
		Ok(serde_yaml::from_str(yaml)?)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.pfcp_node_id.is_empty() {
			return Err(invalid("pfcp_node_id", "must not be empty"));
		}
		if self.heartbeat_timeout > 0 && self.heartbeat_interval == 0 {
			return Err(invalid("heartbeat_interval", "must be positive when heartbeats are enabled"));
		}
		if !self.smf_peers.is_empty() && self.association_setup_interval == 0 {
			return Err(invalid("association_setup_interval", "must be positive when smf_peers are set"));
		}
		if self.far_map_size == 0 {
			return Err(invalid("far_map_size", "must be positive"));
		}
		if self.qer_map_size == 0 {
			return Err(invalid("qer_map_size", "must be positive"));
		}
		if self.teid_pool == 0 {
			return Err(invalid("teid_pool", "must be positive"));
		}
		self.ip_pool()?;
		self.ip_pool_v6()?;
		Ok(())
	}

	pub fn ip_pool(&self) -> Result<Ipv4Cidr, ConfigError> {
		self.ip_pool.parse::<Ipv4Cidr>().map_err(|e| invalid("ip_pool", format!("{}: {}", self.ip_pool, e)))
	}

	pub fn ip_pool_v6(&self) -> Result<Option<Ipv6Cidr>, ConfigError> {
		match self.ip_pool_v6.as_ref() {
			Some(pool) => pool
				.parse::<Ipv6Cidr>()
				.map(Some)
				.map_err(|e| invalid("ip_pool_v6", format!("{}: {}", pool, e))),
			None => Ok(None),
		}
	}
}
