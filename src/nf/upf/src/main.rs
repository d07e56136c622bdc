#![allow(nonstandard_style)]

extern crate clap;

use std::{sync::Arc, time::Duration};

use clap::{App, Arg};
use log::{error, info};
use tokio::{net::UdpSocket, sync::oneshot};

use config::UpfConfig;
use context::{UPFParameters, UpfContext};
use datapath::memory::InMemoryForwardingPlane;
use libpfcp::handlers::PFCPDispatcher;
use metrics::UpfMetrics;
use n4::{HeartbeatEngine, N4Handlers, SetupInitiator};
use resource::ResourceManager;

mod config;
mod context;
mod datapath;
mod metrics;
mod n4;
mod resource;

fn load_config(matches: &clap::ArgMatches) -> Result<UpfConfig, Box<dyn std::error::Error>> {
	let mut config = UpfConfig::from_file(matches.value_of("config").unwrap_or("config.yaml"))?;
	if let Some(paddr) = matches.value_of("paddr") {
		config.pfcp_address = paddr.parse()?;
	}
	if let Some(nodeid) = matches.value_of("nodeid") {
		config.pfcp_node_id = nodeid.to_string();
	}
	if let Some(n3addr) = matches.value_of("n3addr") {
		config.n3_address = n3addr.parse()?;
	}
	config.validate()?;
	Ok(config)
}

fn create_resources(config: &UpfConfig) -> Result<ResourceManager, Box<dyn std::error::Error>> {
	let ipv6_pool = config.ip_pool_v6()?;
	Ok(ResourceManager::new(&config.ip_pool()?, ipv6_pool.as_ref(), config.teid_pool))
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() {
	env_logger::init();

	let matches = App::new("UPF")
		.version("1.0")
		.about("UPF PFCP control plane")
		.arg(Arg::new("config")
			.long("config")
			.takes_value(true)
			.default_value("config.yaml")
		)
		.arg(Arg::new("paddr")
			.long("paddr")
			.takes_value(true)
			.required(false)
		)
		.arg(Arg::new("nodeid")
			.long("nodeid")
			.takes_value(true)
			.required(false)
		)
		.arg(Arg::new("n3addr")
			.long("n3addr")
			.takes_value(true)
			.required(false)
		)
		.get_matches();

	let config = match load_config(&matches) {
		Ok(config) => config,
		Err(e) => {
			error!("Failed to load configuration: {}", e);
			std::process::exit(1);
		}
	};

	let (stop_tx, stop_rx) = oneshot::channel::<()>();
	let mut signals = match signal_hook::iterator::Signals::new(&[signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM]) {
		Ok(signals) => signals,
		Err(e) => {
			error!("Failed to register signal handlers: {}", e);
			std::process::exit(1);
		}
	};
	std::thread::spawn(move || {
		if let Some(sig) = signals.forever().next() {
			info!("Received signal {:?}, exiting", sig);
			let _ = stop_tx.send(());
		}
	});

	info!("Creating forwarding plane with {} FAR and {} QER slots", config.far_map_size, config.qer_map_size);
	let backend = Arc::new(InMemoryForwardingPlane::new(config.far_map_size, config.qer_map_size));
	let metrics = Arc::new(UpfMetrics::new());

	info!("Creating resource pools, UE IPv4 pool {}, {} TEIDs", config.ip_pool, config.teid_pool);
	let resources = match create_resources(&config) {
		Ok(resources) => resources,
		Err(e) => {
			error!("Failed to create resource pools: {}", e);
			std::process::exit(1);
		}
	};

	let params = UPFParameters::from_config(&config, chrono::Utc::now());
	info!("UPF Node ID is {}, N3 address is {}", params.node_id, params.n3_address);
	let ctx = Arc::new(UpfContext::new(params, resources, backend.clone(), metrics.clone()));

	info!("Binding PFCP socket on {}", config.pfcp_address);
	let socket = match UdpSocket::bind(config.pfcp_address).await {
		Ok(socket) => Arc::new(socket),
		Err(e) => {
			error!("Failed to bind PFCP socket on {}: {}", config.pfcp_address, e);
			std::process::exit(1);
		}
	};

	let heartbeat = if config.heartbeat_timeout > 0 {
		info!(
			"Starting heartbeats every {}s, timeout {}s, {} retries",
			config.heartbeat_interval, config.heartbeat_timeout, config.heartbeat_retries
		);
		let engine = HeartbeatEngine::new(ctx.clone(), socket.clone());
		engine.clone().spawn_refresh_loop();
		Some(engine)
	} else {
		info!("Heartbeats disabled");
		None
	};

	if !config.smf_peers.is_empty() {
		info!(
			"Setting up associations with {:?} every {}s until they answer",
			config.smf_peers, config.association_setup_interval
		);
		SetupInitiator::new(ctx.clone(), socket.clone(), config.smf_peers.clone())
			.spawn(Duration::from_secs(config.association_setup_interval));
	}

	if config.metrics_log_interval > 0 {
		let metrics = metrics.clone();
		let backend = backend.clone();
		let period = Duration::from_secs(config.metrics_log_interval);
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(period);
			interval.tick().await;
			loop {
				interval.tick().await;
				metrics.log_summary();
				backend.log_summary();
			}
		});
	}

	let dispatcher = PFCPDispatcher::new(N4Handlers::new(ctx, heartbeat), metrics.clone());

	info!("UPF is running");
	tokio::select! {
		_ = dispatcher.run(&socket) => {}
		_ = stop_rx => {}
	}

	metrics.log_summary();
	info!("UPF finishes running");
}
