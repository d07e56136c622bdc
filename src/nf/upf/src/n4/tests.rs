use std::{
	net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
	sync::Arc,
	time::Duration,
};

use libpfcp::{
	handlers::{NodeRequestHandlers, PFCPDispatcher, PFCPReply, SessionRequestHandlers},
	messages::*,
	models::*,
	PFCPModel,
};
use tokio::net::UdpSocket;

use super::{session::PdrDetection, *};
use crate::{
	config::UpfConfig,
	context::{UPFParameters, UpfContext},
	datapath::memory::InMemoryForwardingPlane,
	metrics::UpfMetrics,
	resource::ResourceManager,
};

struct Harness {
	handlers: N4Handlers,
	fp: Arc<InMemoryForwardingPlane>,
	metrics: Arc<UpfMetrics>,
}

impl Harness {
	fn ctx(&self) -> &UpfContext {
		&self.handlers.ctx
	}
}

fn config() -> UpfConfig {
	let mut config = UpfConfig::default();
	config.pfcp_node_id = "10.100.50.241".into();
	config.n3_address = Ipv4Addr::new(10, 100, 50, 233);
	config.ip_pool = "10.61.0.0/16".into();
	config.ip_pool_v6 = Some("2001:db8:1::/120".into());
	config.feature_ftup = true;
	config
}

fn context(config: &UpfConfig) -> (Arc<UpfContext>, Arc<InMemoryForwardingPlane>, Arc<UpfMetrics>) {
	let fp = Arc::new(InMemoryForwardingPlane::new(config.far_map_size, config.qer_map_size));
	let metrics = Arc::new(UpfMetrics::new());
	let resources = ResourceManager::new(
		&config.ip_pool().unwrap(),
		config.ip_pool_v6().unwrap().as_ref(),
		config.teid_pool,
	);
	let params = UPFParameters::from_config(config, chrono::Utc::now());
	let ctx = Arc::new(UpfContext::new(params, resources, fp.clone(), metrics.clone()));
	(ctx, fp, metrics)
}

fn harness_with(config: UpfConfig) -> Harness {
	let (ctx, fp, metrics) = context(&config);
	Harness { handlers: N4Handlers::new(ctx, None), fp, metrics }
}

fn harness() -> Harness {
	harness_with(config())
}

fn smf() -> SocketAddr {
	"10.100.50.244:8805".parse().unwrap()
}

fn header(msg_type: u8, seid: Option<u64>) -> PFCPHeader {
	PFCPHeader::new(msg_type, seid, 1, 0)
}

async fn associate_from(handlers: &N4Handlers, src: SocketAddr) {
	let reply = handlers
		.handle_association_setup(
			&header(5, None),
			AssociationSetupRequest {
				node_id: Some(NodeID::from_string("smf.example.org")),
				recovery_time_stamp: Some(RecoveryTimeStamp { timestamp: 1 }),
				up_function_features: None,
			},
			src,
		)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(reply.message.cause(), Some(Cause::RequestAccepted));
}

async fn associate(h: &Harness) {
	associate_from(&h.handlers, smf()).await;
}

fn forward_far(far_id: u32, teid: u32) -> CreateFAR {
	let mut action = ApplyAction(0);
	action.setFORW(1);
	CreateFAR {
		far_id: FAR_ID { rule_id: far_id },
		apply_action: action,
		forwarding_parameters: Some(ForwardingParameters {
			destination_interface: DestinationInterface::AccessSide,
			network_instance: None,
			outer_header_creation: Some(OuterHeaderCreation::gtp_u_ipv4(teid, Ipv4Addr::new(10, 100, 50, 1))),
			transport_level_marking: None,
		}),
	}
}

fn plain_far(far_id: u32) -> CreateFAR {
	let mut action = ApplyAction(0);
	action.setFORW(1);
	CreateFAR { far_id: FAR_ID { rule_id: far_id }, apply_action: action, forwarding_parameters: None }
}

fn create_qer(qer_id: u32, ul_kbps: u64) -> CreateQER {
	CreateQER {
		qer_id: QER_ID { rule_id: qer_id },
		gate_status: GateStatus(0),
		maximum_bitrate: Some(MBR { ul_mbr: ul_kbps, dl_mbr: ul_kbps }),
		qfi: None,
	}
}

fn pdi(source_interface: SourceInterface, local_f_teid: Option<F_TEID>, ue_ip_address: Option<UE_IPAddress>) -> PDI {
	PDI {
		source_interface,
		local_f_teid,
		network_instance: None,
		ue_ip_address,
		sdf_filter: None,
		qfi: None,
	}
}

fn create_pdr(pdr_id: u16, pdi: PDI, far_id: u32, qer_id: Option<u32>) -> CreatePDR {
	CreatePDR {
		pdr_id: PDR_ID { rule_id: pdr_id },
		precedence: Some(Precedence { precedence: 255 }),
		pdi,
		outer_header_removal: None,
		far_id: Some(FAR_ID { rule_id: far_id }),
		qer_id: qer_id.map(|rule_id| QER_ID { rule_id }),
	}
}

fn choose_ue_ipv4() -> UE_IPAddress {
	let mut ue_ip = UE_IPAddress::new();
	ue_ip.flags.setV4(1);
	ue_ip.flags.setSD(1);
	ue_ip.flags.setCHV4(1);
	ue_ip
}

fn establishment(create_far: Vec<CreateFAR>, create_qer: Vec<CreateQER>, create_pdr: Vec<CreatePDR>) -> PFCPSessionEstablishmentRequest {
	PFCPSessionEstablishmentRequest {
		node_id: Some(NodeID::from_string("smf.example.org")),
		cp_f_seid: Some(F_SEID::new(IpAddr::V4(Ipv4Addr::new(10, 100, 50, 244)), 0xc0ffee)),
		create_pdr,
		create_far,
		create_qer,
	}
}

async fn establish(h: &Harness, request: PFCPSessionEstablishmentRequest) -> (PFCPSessionEstablishmentResponse, Option<u64>) {
	let reply = h.handlers.handle_session_establishment(&header(50, Some(0)), request, smf()).await.unwrap().unwrap();
	match reply.message {
		PFCPMessage::PFCPSessionEstablishmentResponse(response) => (response, reply.seid),
		other => panic!("unexpected {:?}", other),
	}
}

async fn modify(h: &Harness, seid: u64, request: PFCPSessionModificationRequest) -> (PFCPSessionModificationResponse, Option<u64>) {
	let reply = h.handlers.handle_session_modification(&header(52, Some(seid)), request, smf()).await.unwrap().unwrap();
	match reply.message {
		PFCPMessage::PFCPSessionModificationResponse(response) => (response, reply.seid),
		other => panic!("unexpected {:?}", other),
	}
}

async fn delete(h: &Harness, seid: u64) -> (Cause, Option<u64>) {
	let reply = h
		.handlers
		.handle_session_deletion(&header(54, Some(seid)), PFCPSessionDeletionRequest {}, smf())
		.await
		.unwrap()
		.unwrap();
	(reply.message.cause().unwrap(), reply.seid)
}

fn local_teid(created: &CreatedPDR) -> u32 {
	created.local_f_teid.as_ref().and_then(|f| f.teid).unwrap()
}

#[tokio::test]
async fn test_heartbeat_request_returns_own_recovery_time_stamp() {
	let h = harness();
	let reply = h
		.handlers
		.handle_heartbeat_request(&header(1, None), HeartbeatRequest { recovery_time_stamp: RecoveryTimeStamp { timestamp: 3 } }, smf())
		.await
		.unwrap()
		.unwrap();
	let expected = h.ctx().params.recovery_time_stamp();
	assert_eq!(
		reply,
		PFCPReply::node(HeartbeatResponse { recovery_time_stamp: expected })
	);
}

#[tokio::test]
async fn test_association_setup() {
	let h = harness();
	let reply = h
		.handlers
		.handle_association_setup(
			&header(5, None),
			AssociationSetupRequest {
				node_id: Some(NodeID::from_ip(IpAddr::V4(Ipv4Addr::new(10, 100, 50, 244)))),
				recovery_time_stamp: Some(RecoveryTimeStamp { timestamp: 1 }),
				up_function_features: None,
			},
			smf(),
		)
		.await
		.unwrap()
		.unwrap();
	match reply.message {
		PFCPMessage::AssociationSetupResponse(response) => {
			assert_eq!(response.cause, Cause::RequestAccepted);
			assert_eq!(response.node_id, NodeID::from_ip(IpAddr::V4(Ipv4Addr::new(10, 100, 50, 241))));
			let features = response.up_function_features.unwrap();
			assert_eq!(features.getFTUP(), 1);
			assert_eq!(features.getUEIP(), 0);
			assert!(response.recovery_time_stamp.is_some());
		}
		other => panic!("unexpected {:?}", other),
	}
	let associations = h.ctx().associations.lock().await;
	let association = associations.get("10.100.50.244").unwrap();
	assert_eq!(association.id, "10.100.50.244");
	assert_eq!(association.addr, smf());
	assert_eq!(h.metrics.associations(), 1);
}

#[tokio::test]
async fn test_association_setup_without_node_id() {
	let h = harness();
	let reply = h
		.handlers
		.handle_association_setup(
			&header(5, None),
			AssociationSetupRequest { node_id: None, recovery_time_stamp: None, up_function_features: None },
			smf(),
		)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(reply.message.cause(), Some(Cause::MandatoryIEMissing));
	assert!(h.ctx().associations.lock().await.is_empty());
}

#[tokio::test]
async fn test_session_needs_association() {
	let h = harness();
	let (response, seid) = establish(&h, establishment(vec![plain_far(1)], vec![], vec![])).await;
	assert_eq!(response.cause, Cause::NoEstablishedPFCPAssociation);
	assert_eq!(seid, Some(0xc0ffee));
	assert_eq!(h.fp.far_count(), 0);
}

#[tokio::test]
async fn test_establishment_without_cp_f_seid() {
	let h = harness();
	associate(&h).await;
	let mut request = establishment(vec![plain_far(1)], vec![], vec![]);
	request.cp_f_seid = None;
	let (response, seid) = establish(&h, request).await;
	assert_eq!(response.cause, Cause::MandatoryIEMissing);
	assert_eq!(response.up_f_seid, None);
	assert_eq!(seid, Some(0));
}

#[tokio::test]
async fn test_session_lifecycle() {
	let h = harness();
	associate(&h).await;
	let free_ips = h.ctx().resources.free_ipv4_count();
	let free_teids = h.ctx().resources.free_teid_count();
	let request = establishment(
		vec![plain_far(1), forward_far(2, 0x100)],
		vec![create_qer(1, 100_000)],
		vec![
			create_pdr(1, pdi(SourceInterface::AccessSide, Some(F_TEID::new_choose(true, false, Some(5))), None), 1, Some(1)),
			create_pdr(2, pdi(SourceInterface::AccessSide, Some(F_TEID::new_choose(true, false, Some(5))), None), 1, Some(1)),
			create_pdr(3, pdi(SourceInterface::CoreSide, None, Some(choose_ue_ipv4())), 2, Some(1)),
		],
	);
	let (response, seid) = establish(&h, request).await;
	assert_eq!(response.cause, Cause::RequestAccepted);
	assert_eq!(seid, Some(0xc0ffee));
	let up_f_seid = response.up_f_seid.unwrap();
	assert_eq!(up_f_seid.ipv4, Some(Ipv4Addr::new(10, 100, 50, 241)));
	let local_seid = up_f_seid.seid;

	// both PDRs choosing with the same CHOOSE ID share one TEID
	assert_eq!(response.created_pdr.len(), 3);
	let teid = local_teid(&response.created_pdr[0]);
	assert_eq!(local_teid(&response.created_pdr[1]), teid);
	assert_eq!(
		response.created_pdr[0].local_f_teid.as_ref().unwrap().ipv4,
		Some(Ipv4Addr::new(10, 100, 50, 233))
	);
	let ue_ip = Ipv4Addr::new(10, 61, 0, 1);
	assert_eq!(response.created_pdr[2].pdr_id.rule_id, 3);
	assert_eq!(response.created_pdr[2].ue_ip_address.as_ref().unwrap().ipv4, Some(ue_ip));
	assert_eq!(h.ctx().resources.free_teid_count(), free_teids - 1);

	let uplink = h.fp.uplink_pdr(teid).unwrap();
	let downlink = h.fp.downlink_pdr(ue_ip).unwrap();
	let far = h.fp.far(downlink.far_id.unwrap()).unwrap();
	assert_eq!(far.teid, 0x100);
	assert_eq!(far.remote_ip, Some(IpAddr::V4(Ipv4Addr::new(10, 100, 50, 1))));
	assert_eq!(uplink.qer_id, downlink.qer_id);
	assert_eq!(h.fp.qer(uplink.qer_id.unwrap()).unwrap().max_bitrate_ul, 100_000_000);
	assert_eq!(h.metrics.sessions(), 1);

	// handover: new tunnel for the downlink FAR, new QER for the downlink PDR, PDR 2 removed
	let mut request = PFCPSessionModificationRequest::default();
	request.update_far.push(UpdateFAR {
		far_id: FAR_ID { rule_id: 2 },
		apply_action: None,
		update_forwarding_parameters: Some(UpdateForwardingParameters {
			destination_interface: None,
			network_instance: None,
			outer_header_creation: Some(OuterHeaderCreation::gtp_u_ipv4(0x200, Ipv4Addr::new(10, 100, 50, 2))),
			transport_level_marking: None,
		}),
	});
	request.create_qer.push(create_qer(2, 5_000));
	request.update_pdr.push(UpdatePDR {
		pdr_id: PDR_ID { rule_id: 3 },
		outer_header_removal: None,
		precedence: None,
		pdi: None,
		far_id: None,
		qer_id: Some(QER_ID { rule_id: 2 }),
	});
	request.remove_pdr.push(RemovePDR { pdr_id: PDR_ID { rule_id: 2 } });
	let (response, seid) = modify(&h, local_seid, request).await;
	assert_eq!(response.cause, Cause::RequestAccepted);
	assert_eq!(seid, Some(0xc0ffee));
	assert!(response.created_pdr.is_empty());
	let downlink = h.fp.downlink_pdr(ue_ip).unwrap();
	assert_eq!(h.fp.far(downlink.far_id.unwrap()).unwrap().teid, 0x200);
	assert_eq!(h.fp.qer(downlink.qer_id.unwrap()).unwrap().max_bitrate_dl, 5_000_000);
	// PDR 1 still owns the shared uplink entry
	assert_eq!(h.fp.uplink_pdr(teid).unwrap().qer_id, uplink.qer_id);

	let (cause, seid) = delete(&h, local_seid).await;
	assert_eq!(cause, Cause::RequestAccepted);
	assert_eq!(seid, Some(0xc0ffee));
	assert_eq!(h.fp.pdr_count(), 0);
	assert_eq!(h.fp.far_count(), 0);
	assert_eq!(h.fp.qer_count(), 0);
	assert_eq!(h.ctx().resources.free_ipv4_count(), free_ips);
	assert_eq!(h.ctx().resources.free_teid_count(), free_teids);
	assert_eq!(h.metrics.sessions(), 0);

	let (cause, seid) = delete(&h, local_seid).await;
	assert_eq!(cause, Cause::SessionContextNotFound);
	assert_eq!(seid, Some(0));
}

#[tokio::test]
async fn test_sessions_keep_their_own_ue_addresses() {
	let h = harness();
	associate(&h).await;
	let mut seids = vec![];
	for ue_ip in [Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2)] {
		let downlink = pdi(SourceInterface::CoreSide, None, Some(UE_IPAddress::from_ip(IpAddr::V4(ue_ip), true)));
		let (response, _) = establish(&h, establishment(vec![plain_far(1)], vec![], vec![create_pdr(1, downlink, 1, None)])).await;
		assert_eq!(response.cause, Cause::RequestAccepted);
		seids.push(response.up_f_seid.unwrap().seid);
	}
	assert_ne!(seids[0], seids[1]);
	let associations = h.ctx().associations.lock().await;
	let sessions = &associations.get("10.100.50.244").unwrap().sessions;
	assert_eq!(sessions[&seids[0]].pdrs[&1].detection, PdrDetection::DownlinkIpv4(Ipv4Addr::new(1, 1, 1, 1)));
	assert_eq!(sessions[&seids[1]].pdrs[&1].detection, PdrDetection::DownlinkIpv4(Ipv4Addr::new(2, 2, 2, 2)));
	assert!(h.fp.downlink_pdr(Ipv4Addr::new(1, 1, 1, 1)).is_some());
	assert!(h.fp.downlink_pdr(Ipv4Addr::new(2, 2, 2, 2)).is_some());
}

#[tokio::test]
async fn test_static_teid_and_ipv6_ue_address() {
	let h = harness();
	associate(&h).await;
	let ue_ip6: Ipv6Addr = "2001:db8:1::10".parse().unwrap();
	let request = establishment(
		vec![plain_far(1)],
		vec![],
		vec![
			create_pdr(1, pdi(SourceInterface::AccessSide, Some(F_TEID::from_ip_teid(IpAddr::V4(Ipv4Addr::new(10, 100, 50, 233)), 0x1000)), None), 1, None),
			create_pdr(2, pdi(SourceInterface::CoreSide, None, Some(UE_IPAddress::from_ip(IpAddr::V6(ue_ip6), true))), 1, None),
		],
	);
	let (response, _) = establish(&h, request).await;
	assert_eq!(response.cause, Cause::RequestAccepted);
	assert!(response.created_pdr.is_empty());
	assert!(h.fp.uplink_pdr(0x1000).is_some());
	assert!(h.fp.downlink_pdr_ip6(ue_ip6).is_some());
}

#[tokio::test]
async fn test_pdr_with_unknown_far_is_rejected() {
	let h = harness();
	associate(&h).await;
	let free_teids = h.ctx().resources.free_teid_count();
	let request = establishment(
		vec![plain_far(1)],
		vec![],
		vec![create_pdr(1, pdi(SourceInterface::AccessSide, Some(F_TEID::new_choose(true, false, None)), None), 9, None)],
	);
	let (response, seid) = establish(&h, request).await;
	assert_eq!(response.cause, Cause::RuleCreationModificationFailure);
	assert_eq!(seid, Some(0xc0ffee));
	assert!(response.created_pdr.is_empty());
	assert_eq!(h.ctx().resources.free_teid_count(), free_teids);
	assert_eq!(h.metrics.sessions(), 0);
}

#[tokio::test]
async fn test_malformed_sdf_filter_is_rejected() {
	let h = harness();
	associate(&h).await;
	let mut downlink = pdi(SourceInterface::CoreSide, None, Some(UE_IPAddress::from_ip(IpAddr::V4(Ipv4Addr::new(10, 61, 9, 9)), true)));
	downlink.sdf_filter = Some(SDFFilter::from_flow_description("permit out ip from any to 300.1.1.1"));
	let (response, _) = establish(&h, establishment(vec![plain_far(1)], vec![], vec![create_pdr(1, downlink, 1, None)])).await;
	assert_eq!(response.cause, Cause::RuleCreationModificationFailure);
}

#[tokio::test]
async fn test_ue_ip_exhaustion() {
	let mut config = config();
	config.ip_pool = "10.61.0.7/32".into();
	let h = harness_with(config);
	associate(&h).await;
	let request = || establishment(vec![plain_far(1)], vec![], vec![create_pdr(1, pdi(SourceInterface::CoreSide, None, Some(choose_ue_ipv4())), 1, None)]);
	let (response, _) = establish(&h, request()).await;
	assert_eq!(response.cause, Cause::RequestAccepted);
	assert_eq!(response.created_pdr[0].ue_ip_address.as_ref().unwrap().ipv4, Some(Ipv4Addr::new(10, 61, 0, 7)));
	let (response, _) = establish(&h, request()).await;
	assert_eq!(response.cause, Cause::NoResourcesAvailable);
}

#[tokio::test]
async fn test_modification_of_unknown_session() {
	let h = harness();
	let (response, _) = modify(&h, 1, PFCPSessionModificationRequest::default()).await;
	assert_eq!(response.cause, Cause::NoEstablishedPFCPAssociation);
	associate(&h).await;
	let (response, seid) = modify(&h, 77, PFCPSessionModificationRequest::default()).await;
	assert_eq!(response.cause, Cause::SessionContextNotFound);
	assert_eq!(seid, Some(0));
}

#[tokio::test]
async fn test_modification_updates_remote_seid() {
	let h = harness();
	associate(&h).await;
	let (response, _) = establish(&h, establishment(vec![plain_far(1)], vec![], vec![])).await;
	let local_seid = response.up_f_seid.unwrap().seid;
	let mut request = PFCPSessionModificationRequest::default();
	request.cp_f_seid = Some(F_SEID::new(IpAddr::V4(Ipv4Addr::new(10, 100, 50, 244)), 0xbeef));
	request.update_far.push(UpdateFAR { far_id: FAR_ID { rule_id: 5 }, apply_action: None, update_forwarding_parameters: None });
	let (response, seid) = modify(&h, local_seid, request).await;
	assert_eq!(response.cause, Cause::RuleCreationModificationFailure);
	assert_eq!(seid, Some(0xbeef));
}

#[tokio::test]
async fn test_setup_again_drops_sessions() {
	let h = harness();
	associate(&h).await;
	let (response, _) = establish(&h, establishment(vec![plain_far(1)], vec![create_qer(1, 1)], vec![])).await;
	assert_eq!(response.cause, Cause::RequestAccepted);
	assert_eq!(h.fp.far_count(), 1);
	associate(&h).await;
	assert_eq!(h.fp.far_count(), 0);
	assert_eq!(h.fp.qer_count(), 0);
	let associations = h.ctx().associations.lock().await;
	assert!(associations.get("10.100.50.244").unwrap().sessions.is_empty());
	assert_eq!(h.metrics.associations(), 1);
	assert_eq!(h.metrics.sessions(), 0);
}

#[tokio::test]
async fn test_association_release() {
	let h = harness();
	let release = || AssociationReleaseRequest { node_id: Some(NodeID::from_string("smf.example.org")) };
	let reply = h.handlers.handle_association_release(&header(9, None), release(), smf()).await.unwrap().unwrap();
	assert_eq!(reply.message.cause(), Some(Cause::NoEstablishedPFCPAssociation));
	associate(&h).await;
	establish(&h, establishment(vec![plain_far(1)], vec![], vec![create_pdr(1, pdi(SourceInterface::CoreSide, None, Some(choose_ue_ipv4())), 1, None)])).await;
	assert_eq!(h.fp.pdr_count(), 1);
	let reply = h.handlers.handle_association_release(&header(9, None), release(), smf()).await.unwrap().unwrap();
	assert_eq!(reply.message.cause(), Some(Cause::RequestAccepted));
	assert_eq!(h.fp.pdr_count(), 0);
	assert_eq!(h.fp.far_count(), 0);
	assert!(h.ctx().associations.lock().await.is_empty());
	let reply = h
		.handlers
		.handle_association_release(&header(9, None), AssociationReleaseRequest { node_id: None }, smf())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(reply.message.cause(), Some(Cause::MandatoryIEMissing));
}

#[tokio::test]
async fn test_dispatcher_answers_with_remote_seid() {
	let (ctx, _fp, metrics) = context(&config());
	let dispatcher = PFCPDispatcher::new(N4Handlers::new(ctx, None), metrics.clone());
	associate_from(dispatcher.handlers(), smf()).await;
	let request = establishment(vec![plain_far(1)], vec![], vec![]);
	let datagram = PFCPMessage::from(request).encode(0x42, Some(0));
	let replies = dispatcher.handle(&datagram, smf()).await;
	assert_eq!(replies.len(), 1);
	let (body, _, header) = PFCPHeader::decode(&replies[0].bytes).unwrap();
	assert_eq!(header.msg_type, 51);
	assert_eq!(header.seq, 0x42);
	assert_eq!(header.seid, Some(0xc0ffee));
	let response = PFCPSessionEstablishmentResponse::decode(&body).unwrap();
	assert_eq!(response.cause, Cause::RequestAccepted);
	assert_eq!(metrics.rx_count("PFCPSessionEstablishmentRequest"), 1);

	let deletion = PFCPMessage::from(PFCPSessionDeletionRequest {}).encode(0x43, Some(999));
	let replies = dispatcher.handle(&deletion, smf()).await;
	assert_eq!(replies.len(), 1);
	assert_eq!(metrics.rx_error_count("PFCPSessionDeletionRequest", Cause::SessionContextNotFound), 1);
}

async fn update(h: &Harness, node_id: CheckedIE<NodeID>) -> AssociationUpdateResponse {
	let request = AssociationUpdateRequest { node_id, up_function_features: None };
	let reply = h.handlers.handle_association_update(&header(7, None), request, smf()).await.unwrap().unwrap();
	match reply.message {
		PFCPMessage::AssociationUpdateResponse(response) => response,
		other => panic!("unexpected {:?}", other),
	}
}

#[tokio::test]
async fn test_association_update() {
	let h = harness();
	let smf_node_id = || CheckedIE::Present(NodeID::from_string("smf.example.org"));
	assert_eq!(update(&h, CheckedIE::Missing).await.cause, Cause::MandatoryIEMissing);
	assert_eq!(update(&h, CheckedIE::Malformed).await.cause, Cause::MandatoryIEIncorrect);
	let response = update(&h, smf_node_id()).await;
	assert_eq!(response.cause, Cause::NoEstablishedPFCPAssociation);
	assert_eq!(response.recovery_time_stamp, None);

	associate(&h).await;
	let response = update(&h, smf_node_id()).await;
	assert_eq!(response.cause, Cause::RequestAccepted);
	assert_eq!(response.node_id, h.ctx().params.node_id());
	assert_eq!(response.recovery_time_stamp, Some(h.ctx().params.recovery_time_stamp()));
	assert_eq!(h.ctx().associations.lock().await.len(), 1);
}

fn setup_response(cause: Cause) -> AssociationSetupResponse {
	AssociationSetupResponse {
		node_id: NodeID::from_string("smf.example.org"),
		cause,
		recovery_time_stamp: Some(RecoveryTimeStamp { timestamp: 7 }),
		up_function_features: None,
	}
}

#[tokio::test]
async fn test_setup_response_creates_association() {
	let h = harness();
	let reply = h
		.handlers
		.handle_association_setup_response(&header(6, None), setup_response(Cause::RequestRejected), smf())
		.await
		.unwrap();
	assert_eq!(reply, None);
	assert!(h.ctx().associations.lock().await.is_empty());
	assert_eq!(h.metrics.rx_error_count("AssociationSetupResponse", Cause::RequestRejected), 1);

	let reply = h
		.handlers
		.handle_association_setup_response(&header(6, None), setup_response(Cause::RequestAccepted), smf())
		.await
		.unwrap();
	assert_eq!(reply, None);
	assert_eq!(h.ctx().associations.lock().await.get("10.100.50.244").unwrap().id, "smf.example.org");
	assert_eq!(h.metrics.associations(), 1);

	// a late duplicate keeps the sessions of the existing association
	let (response, _) = establish(&h, establishment(vec![plain_far(1)], vec![], vec![])).await;
	assert_eq!(response.cause, Cause::RequestAccepted);
	h.handlers
		.handle_association_setup_response(&header(6, None), setup_response(Cause::RequestAccepted), smf())
		.await
		.unwrap();
	assert_eq!(h.metrics.sessions(), 1);
	assert_eq!(h.fp.far_count(), 1);
}

#[tokio::test]
async fn test_setup_initiator_stops_once_associated() {
	let (ctx, _fp, metrics) = context(&config());
	let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
	let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	let peer_addr = peer.local_addr().unwrap();
	let initiator = SetupInitiator::new(ctx.clone(), socket, vec![peer_addr]);
	let dispatcher = PFCPDispatcher::new(N4Handlers::new(ctx.clone(), None), metrics.clone());

	assert_eq!(initiator.send_pending().await, 1);
	assert_eq!(metrics.tx_count("AssociationSetupRequest"), 1);
	let mut buf = [0u8; 256];
	let (n, _) = peer.recv_from(&mut buf).await.unwrap();
	let (body, _, header) = PFCPHeader::decode(&buf[..n]).unwrap();
	assert_eq!(header.msg_type, 5);
	let request = AssociationSetupRequest::decode(&body).unwrap();
	assert_eq!(request.node_id, Some(ctx.params.node_id()));
	assert_eq!(request.recovery_time_stamp, Some(ctx.params.recovery_time_stamp()));
	assert_eq!(request.up_function_features.unwrap().getFTUP(), 1);

	let response = PFCPMessage::from(setup_response(Cause::RequestAccepted)).encode(header.seq, None);
	assert!(dispatcher.handle(&response, peer_addr).await.is_empty());
	assert!(ctx.associations.lock().await.contains_key("127.0.0.1"));
	assert_eq!(initiator.send_pending().await, 0);
	assert_eq!(metrics.tx_count("AssociationSetupRequest"), 1);
}

fn heartbeat_config(retries: u32) -> UpfConfig {
	let mut config = config();
	config.heartbeat_retries = retries;
	config.heartbeat_interval = 5;
	config.heartbeat_timeout = 5;
	config
}

async fn heartbeat_setup(
	retries: u32,
) -> (N4Handlers, Arc<HeartbeatEngine>, Arc<InMemoryForwardingPlane>, Arc<UpfMetrics>, UdpSocket) {
	let (ctx, fp, metrics) = context(&heartbeat_config(retries));
	let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
	let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	let engine = HeartbeatEngine::new(ctx.clone(), socket);
	let handlers = N4Handlers::new(ctx, Some(engine.clone()));
	associate_from(&handlers, peer.local_addr().unwrap()).await;
	(handlers, engine, fp, metrics, peer)
}

#[tokio::test(start_paused = true)]
async fn test_silent_peer_is_released() {
	let (handlers, engine, fp, metrics, peer) = heartbeat_setup(1).await;
	let free_ips = handlers.ctx.resources.free_ipv4_count();
	let free_teids = handlers.ctx.resources.free_teid_count();
	establish_on(&handlers, peer.local_addr().unwrap()).await;
	assert_eq!(fp.pdr_count(), 2);
	assert_eq!(fp.far_count(), 1);
	assert_eq!(fp.qer_count(), 1);
	assert_eq!(handlers.ctx.resources.free_ipv4_count(), free_ips - 1);
	assert_eq!(handlers.ctx.resources.free_teid_count(), free_teids - 1);

	engine.refresh().await;
	tokio::time::sleep(Duration::from_secs(12)).await;
	assert_eq!(handlers.ctx.associations.lock().await.get("127.0.0.1").unwrap().heartbeat_failures, 1);
	tokio::time::sleep(Duration::from_secs(60)).await;
	assert!(handlers.ctx.associations.lock().await.is_empty());
	assert_eq!(metrics.tx_count("HeartbeatRequest"), 2);
	assert_eq!(metrics.sessions(), 0);
	assert_eq!(fp.pdr_count(), 0);
	assert_eq!(fp.far_count(), 0);
	assert_eq!(fp.qer_count(), 0);
	assert_eq!(handlers.ctx.resources.free_ipv4_count(), free_ips);
	assert_eq!(handlers.ctx.resources.free_teid_count(), free_teids);
	let mut buf = [0u8; 64];
	let (n, _) = peer.recv_from(&mut buf).await.unwrap();
	let (_, _, header) = PFCPHeader::decode(&buf[..n]).unwrap();
	assert_eq!(header.msg_type, 1);
}

/// Uplink PDR on a chosen TEID plus downlink PDR on a chosen UE address, sharing one FAR and one QER.
async fn establish_on(handlers: &N4Handlers, src: SocketAddr) {
	let request = establishment(
		vec![forward_far(1, 0x100)],
		vec![create_qer(1, 10_000)],
		vec![
			create_pdr(1, pdi(SourceInterface::AccessSide, Some(F_TEID::new_choose(true, false, None)), None), 1, Some(1)),
			create_pdr(2, pdi(SourceInterface::CoreSide, None, Some(choose_ue_ipv4())), 1, Some(1)),
		],
	);
	let reply = handlers.handle_session_establishment(&header(50, Some(0)), request, src).await.unwrap().unwrap();
	assert_eq!(reply.message.cause(), Some(Cause::RequestAccepted));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_response_resets_failures() {
	let (handlers, engine, _fp, _metrics, peer) = heartbeat_setup(3).await;
	let peer_addr = peer.local_addr().unwrap();
	engine.refresh().await;
	let first_timer = handlers.ctx.associations.lock().await.get("127.0.0.1").unwrap().heartbeat.as_ref().unwrap().id;
	assert!(engine.record_failure("127.0.0.1", first_timer).await);
	assert_eq!(handlers.ctx.associations.lock().await.get("127.0.0.1").unwrap().heartbeat_failures, 1);

	handlers
		.handle_heartbeat_response(&header(2, None), HeartbeatResponse { recovery_time_stamp: RecoveryTimeStamp { timestamp: 1 } }, peer_addr)
		.await
		.unwrap();
	{
		let associations = handlers.ctx.associations.lock().await;
		let association = associations.get("127.0.0.1").unwrap();
		assert_eq!(association.heartbeat_failures, 0);
		assert!(!association.is_current_timer(first_timer));
		assert!(association.has_heartbeat_timer());
	}
	// the replaced timer no longer counts
	assert!(!engine.record_failure("127.0.0.1", first_timer).await);
	assert_eq!(handlers.ctx.associations.lock().await.get("127.0.0.1").unwrap().heartbeat_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_release_cancels_heartbeat_timer() {
	let (handlers, engine, _fp, metrics, peer) = heartbeat_setup(3).await;
	engine.refresh().await;
	handlers
		.handle_association_release(&header(9, None), AssociationReleaseRequest { node_id: Some(NodeID::from_string("smf")) }, peer.local_addr().unwrap())
		.await
		.unwrap();
	tokio::time::sleep(Duration::from_secs(60)).await;
	assert_eq!(metrics.tx_count("HeartbeatRequest"), 0);
}
