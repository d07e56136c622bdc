use log::{debug, warn};

use super::{for_each_ie, patch_grouped_length, PFCPModel, models::*};
use super::PFCPError;

#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatRequest {
	pub recovery_time_stamp: RecoveryTimeStamp,
}
impl PFCPModel for HeartbeatRequest {
	const ID: u16 = 1;

	fn encode(&self) -> Vec<u8> {
		self.recovery_time_stamp.encode()
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut recovery_time_stamp = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				RecoveryTimeStamp::ID => { recovery_time_stamp = Some(RecoveryTimeStamp::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in HeartbeatRequest", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			recovery_time_stamp: recovery_time_stamp.ok_or(PFCPError::new("Missing mandatory field RecoveryTimeStamp"))?,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatResponse {
	pub recovery_time_stamp: RecoveryTimeStamp,
}
impl PFCPModel for HeartbeatResponse {
	const ID: u16 = 2;

	fn encode(&self) -> Vec<u8> {
		self.recovery_time_stamp.encode()
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut recovery_time_stamp = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				RecoveryTimeStamp::ID => { recovery_time_stamp = Some(RecoveryTimeStamp::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in HeartbeatResponse", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			recovery_time_stamp: recovery_time_stamp.ok_or(PFCPError::new("Missing mandatory field RecoveryTimeStamp"))?,
		})
	}
}

/// Decodes a Node ID that the handler validates itself, so a bad one does not drop the whole message.
fn decode_lenient<T: PFCPModel>(name: &str, curmsg: &[u8]) -> Option<T> {
	match T::decode(curmsg) {
		Ok(ie) => Some(ie),
		Err(e) => {
			warn!("Undecodable {}: {}", name, e);
			None
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociationSetupRequest {
	/// Mandatory, checked by the handler
	pub node_id: Option<NodeID>,
	pub recovery_time_stamp: Option<RecoveryTimeStamp>,
	pub up_function_features: Option<UPFunctionFeatures>,
}
impl PFCPModel for AssociationSetupRequest {
	const ID: u16 = 5;

	fn encode(&self) -> Vec<u8> {
		let mut ret = vec![];
		if let Some(o) = self.node_id.as_ref() { ret.append(&mut o.encode()); }
		if let Some(o) = self.recovery_time_stamp.as_ref() { ret.append(&mut o.encode()); }
		if let Some(o) = self.up_function_features.as_ref() { ret.append(&mut o.encode()); }
		ret
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut node_id = None;
		let mut recovery_time_stamp = None;
		let mut up_function_features = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				NodeID::ID => { node_id = decode_lenient::<NodeID>("NodeID", curmsg); }
				RecoveryTimeStamp::ID => { recovery_time_stamp = Some(RecoveryTimeStamp::decode(curmsg)?); }
				UPFunctionFeatures::ID => { up_function_features = Some(UPFunctionFeatures::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in AssociationSetupRequest", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			node_id,
			recovery_time_stamp,
			up_function_features,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociationSetupResponse {
	pub node_id: NodeID,
	pub cause: Cause,
	pub recovery_time_stamp: Option<RecoveryTimeStamp>,
	pub up_function_features: Option<UPFunctionFeatures>,
}
impl PFCPModel for AssociationSetupResponse {
	const ID: u16 = 6;

	fn encode(&self) -> Vec<u8> {
		let mut ret = vec![];
		ret.append(&mut self.node_id.encode());
		ret.append(&mut self.cause.encode());
		if let Some(o) = self.recovery_time_stamp.as_ref() { ret.append(&mut o.encode()); }
		if let Some(o) = self.up_function_features.as_ref() { ret.append(&mut o.encode()); }
		ret
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut node_id = None;
		let mut cause = None;
		let mut recovery_time_stamp = None;
		let mut up_function_features = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				NodeID::ID => { node_id = Some(NodeID::decode(curmsg)?); }
				Cause::ID => { cause = Some(Cause::decode(curmsg)?); }
				RecoveryTimeStamp::ID => { recovery_time_stamp = Some(RecoveryTimeStamp::decode(curmsg)?); }
				UPFunctionFeatures::ID => { up_function_features = Some(UPFunctionFeatures::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in AssociationSetupResponse", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			node_id: node_id.ok_or(PFCPError::new("Missing mandatory field NodeID"))?,
			cause: cause.ok_or(PFCPError::new("Missing mandatory field Cause"))?,
			recovery_time_stamp,
			up_function_features,
		})
	}
}

/// A mandatory IE left for the handler to check, so it can tell an absent IE from a malformed one.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckedIE<T> {
	Missing,
	Malformed,
	Present(T),
}

impl<T: PFCPModel> CheckedIE<T> {
	fn decode(name: &str, curmsg: &[u8]) -> CheckedIE<T> {
		match decode_lenient::<T>(name, curmsg) {
			Some(ie) => CheckedIE::Present(ie),
			None => CheckedIE::Malformed,
		}
	}

	pub fn present(&self) -> Option<&T> {
		match self {
			CheckedIE::Present(ie) => Some(ie),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociationUpdateRequest {
	pub node_id: CheckedIE<NodeID>,
	pub up_function_features: Option<UPFunctionFeatures>,
}
impl PFCPModel for AssociationUpdateRequest {
	const ID: u16 = 7;

	fn encode(&self) -> Vec<u8> {
		let mut ret = vec![];
		if let Some(o) = self.node_id.present() { ret.append(&mut o.encode()); }
		if let Some(o) = self.up_function_features.as_ref() { ret.append(&mut o.encode()); }
		ret
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut node_id = CheckedIE::Missing;
		let mut up_function_features = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				NodeID::ID => { node_id = CheckedIE::decode("NodeID", curmsg); }
				UPFunctionFeatures::ID => { up_function_features = Some(UPFunctionFeatures::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in AssociationUpdateRequest", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self { node_id, up_function_features })
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociationUpdateResponse {
	pub node_id: NodeID,
	pub cause: Cause,
	pub recovery_time_stamp: Option<RecoveryTimeStamp>,
}
impl PFCPModel for AssociationUpdateResponse {
	const ID: u16 = 8;

	fn encode(&self) -> Vec<u8> {
		let mut ret = vec![];
		ret.append(&mut self.node_id.encode());
		ret.append(&mut self.cause.encode());
		if let Some(o) = self.recovery_time_stamp.as_ref() { ret.append(&mut o.encode()); }
		ret
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut node_id = None;
		let mut cause = None;
		let mut recovery_time_stamp = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				NodeID::ID => { node_id = Some(NodeID::decode(curmsg)?); }
				Cause::ID => { cause = Some(Cause::decode(curmsg)?); }
				RecoveryTimeStamp::ID => { recovery_time_stamp = Some(RecoveryTimeStamp::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in AssociationUpdateResponse", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			node_id: node_id.ok_or(PFCPError::new("Missing mandatory field NodeID"))?,
			cause: cause.ok_or(PFCPError::new("Missing mandatory field Cause"))?,
			recovery_time_stamp,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociationReleaseRequest {
	/// Mandatory, checked by the handler
	pub node_id: Option<NodeID>,
}
impl PFCPModel for AssociationReleaseRequest {
	const ID: u16 = 9;

	fn encode(&self) -> Vec<u8> {
		self.node_id.as_ref().map_or(vec![], |o| o.encode())
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut node_id = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				NodeID::ID => { node_id = decode_lenient::<NodeID>("NodeID", curmsg); }
				_ => { debug!("Ignore unknown IE type {} in AssociationReleaseRequest", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self { node_id })
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociationReleaseResponse {
	pub node_id: NodeID,
	pub cause: Cause,
}
impl PFCPModel for AssociationReleaseResponse {
	const ID: u16 = 10;

	fn encode(&self) -> Vec<u8> {
		let mut ret = vec![];
		ret.append(&mut self.node_id.encode());
		ret.append(&mut self.cause.encode());
		ret
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut node_id = None;
		let mut cause = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				NodeID::ID => { node_id = Some(NodeID::decode(curmsg)?); }
				Cause::ID => { cause = Some(Cause::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in AssociationReleaseResponse", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			node_id: node_id.ok_or(PFCPError::new("Missing mandatory field NodeID"))?,
			cause: cause.ok_or(PFCPError::new("Missing mandatory field Cause"))?,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct PDI {
	pub source_interface: SourceInterface,
	pub local_f_teid: Option<F_TEID>,
	pub network_instance: Option<NetworkInstance>,
	pub ue_ip_address: Option<UE_IPAddress>,
	/// Only the first SDF Filter of a PDI is kept
	pub sdf_filter: Option<SDFFilter>,
	pub qfi: Option<QFI>,
}
impl PFCPModel for PDI {
	const ID: u16 = 2;

	fn encode(&self) -> Vec<u8> {
		let mut result = Self::ID.to_be_bytes().to_vec();
		result.append(&mut 0u16.to_be_bytes().to_vec());
		result.append(&mut self.source_interface.encode());
		if let Some(o) = self.local_f_teid.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.network_instance.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.ue_ip_address.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.sdf_filter.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.qfi.as_ref() { result.append(&mut o.encode()); }
		patch_grouped_length(&mut result);
		result
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut source_interface = None;
		let mut local_f_teid = None;
		let mut network_instance = None;
		let mut ue_ip_address = None;
		let mut sdf_filter = None;
		let mut qfi = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				SourceInterface::ID => { source_interface = Some(SourceInterface::decode(curmsg)?); }
				F_TEID::ID => { local_f_teid = Some(F_TEID::decode(curmsg)?); }
				NetworkInstance::ID => { network_instance = Some(NetworkInstance::decode(curmsg)?); }
				UE_IPAddress::ID => { ue_ip_address = Some(UE_IPAddress::decode(curmsg)?); }
				SDFFilter::ID => {
					let decoded = SDFFilter::decode(curmsg)?;
					if sdf_filter.is_none() {
						sdf_filter = Some(decoded);
					}
				}
				QFI::ID => { qfi = Some(QFI::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in PDI", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			source_interface: source_interface.ok_or(PFCPError::new("Missing mandatory field SourceInterface"))?,
			local_f_teid,
			network_instance,
			ue_ip_address,
			sdf_filter,
			qfi,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePDR {
	pub pdr_id: PDR_ID,
	pub precedence: Option<Precedence>,
	pub pdi: PDI,
	pub outer_header_removal: Option<OuterHeaderRemoval>,
	pub far_id: Option<FAR_ID>,
	pub qer_id: Option<QER_ID>,
}
impl PFCPModel for CreatePDR {
	const ID: u16 = 1;

	fn encode(&self) -> Vec<u8> {
		let mut result = Self::ID.to_be_bytes().to_vec();
		result.append(&mut 0u16.to_be_bytes().to_vec());
		result.append(&mut self.pdr_id.encode());
		if let Some(o) = self.precedence.as_ref() { result.append(&mut o.encode()); }
		result.append(&mut self.pdi.encode());
		if let Some(o) = self.outer_header_removal.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.far_id.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.qer_id.as_ref() { result.append(&mut o.encode()); }
		patch_grouped_length(&mut result);
		result
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut pdr_id = None;
		let mut precedence = None;
		let mut pdi = None;
		let mut outer_header_removal = None;
		let mut far_id = None;
		let mut qer_id = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				PDR_ID::ID => { pdr_id = Some(PDR_ID::decode(curmsg)?); }
				Precedence::ID => { precedence = Some(Precedence::decode(curmsg)?); }
				PDI::ID => { pdi = Some(PDI::decode(curmsg)?); }
				OuterHeaderRemoval::ID => { outer_header_removal = Some(OuterHeaderRemoval::decode(curmsg)?); }
				FAR_ID::ID => { far_id = Some(FAR_ID::decode(curmsg)?); }
				QER_ID::ID => {
					let decoded = QER_ID::decode(curmsg)?;
					if qer_id.is_none() {
						qer_id = Some(decoded);
					}
				}
				_ => { debug!("Ignore unknown IE type {} in CreatePDR", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			pdr_id: pdr_id.ok_or(PFCPError::new("Missing mandatory field PDR_ID"))?,
			precedence,
			pdi: pdi.ok_or(PFCPError::new("Missing mandatory field PDI"))?,
			outer_header_removal,
			far_id,
			qer_id,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForwardingParameters {
	pub destination_interface: DestinationInterface,
	pub network_instance: Option<NetworkInstance>,
	pub outer_header_creation: Option<OuterHeaderCreation>,
	pub transport_level_marking: Option<TransportLevelMarking>,
}
impl PFCPModel for ForwardingParameters {
	const ID: u16 = 4;

	fn encode(&self) -> Vec<u8> {
		let mut result = Self::ID.to_be_bytes().to_vec();
		result.append(&mut 0u16.to_be_bytes().to_vec());
		result.append(&mut self.destination_interface.encode());
		if let Some(o) = self.network_instance.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.outer_header_creation.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.transport_level_marking.as_ref() { result.append(&mut o.encode()); }
		patch_grouped_length(&mut result);
		result
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut destination_interface = None;
		let mut network_instance = None;
		let mut outer_header_creation = None;
		let mut transport_level_marking = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				DestinationInterface::ID => { destination_interface = Some(DestinationInterface::decode(curmsg)?); }
				NetworkInstance::ID => { network_instance = Some(NetworkInstance::decode(curmsg)?); }
				OuterHeaderCreation::ID => { outer_header_creation = Some(OuterHeaderCreation::decode(curmsg)?); }
				TransportLevelMarking::ID => { transport_level_marking = Some(TransportLevelMarking::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in ForwardingParameters", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			destination_interface: destination_interface.ok_or(PFCPError::new("Missing mandatory field DestinationInterface"))?,
			network_instance,
			outer_header_creation,
			transport_level_marking,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateForwardingParameters {
	pub destination_interface: Option<DestinationInterface>,
	pub network_instance: Option<NetworkInstance>,
	pub outer_header_creation: Option<OuterHeaderCreation>,
	pub transport_level_marking: Option<TransportLevelMarking>,
}
impl PFCPModel for UpdateForwardingParameters {
	const ID: u16 = 11;

	fn encode(&self) -> Vec<u8> {
		let mut result = Self::ID.to_be_bytes().to_vec();
		result.append(&mut 0u16.to_be_bytes().to_vec());
		if let Some(o) = self.destination_interface.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.network_instance.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.outer_header_creation.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.transport_level_marking.as_ref() { result.append(&mut o.encode()); }
		patch_grouped_length(&mut result);
		result
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut destination_interface = None;
		let mut network_instance = None;
		let mut outer_header_creation = None;
		let mut transport_level_marking = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				DestinationInterface::ID => { destination_interface = Some(DestinationInterface::decode(curmsg)?); }
				NetworkInstance::ID => { network_instance = Some(NetworkInstance::decode(curmsg)?); }
				OuterHeaderCreation::ID => { outer_header_creation = Some(OuterHeaderCreation::decode(curmsg)?); }
				TransportLevelMarking::ID => { transport_level_marking = Some(TransportLevelMarking::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in UpdateForwardingParameters", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			destination_interface,
			network_instance,
			outer_header_creation,
			transport_level_marking,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateFAR {
	pub far_id: FAR_ID,
	pub apply_action: ApplyAction,
	pub forwarding_parameters: Option<ForwardingParameters>,
}
impl PFCPModel for CreateFAR {
	const ID: u16 = 3;

	fn encode(&self) -> Vec<u8> {
		let mut result = Self::ID.to_be_bytes().to_vec();
		result.append(&mut 0u16.to_be_bytes().to_vec());
		result.append(&mut self.far_id.encode());
		result.append(&mut self.apply_action.encode());
		if let Some(o) = self.forwarding_parameters.as_ref() { result.append(&mut o.encode()); }
		patch_grouped_length(&mut result);
		result
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut far_id = None;
		let mut apply_action = None;
		let mut forwarding_parameters = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				FAR_ID::ID => { far_id = Some(FAR_ID::decode(curmsg)?); }
				ApplyAction::ID => { apply_action = Some(ApplyAction::decode(curmsg)?); }
				ForwardingParameters::ID => { forwarding_parameters = Some(ForwardingParameters::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in CreateFAR", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			far_id: far_id.ok_or(PFCPError::new("Missing mandatory field FAR_ID"))?,
			apply_action: apply_action.ok_or(PFCPError::new("Missing mandatory field ApplyAction"))?,
			forwarding_parameters,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateQER {
	pub qer_id: QER_ID,
	pub gate_status: GateStatus,
	pub maximum_bitrate: Option<MBR>,
	pub qfi: Option<QFI>,
}
impl PFCPModel for CreateQER {
	const ID: u16 = 7;

	fn encode(&self) -> Vec<u8> {
		let mut result = Self::ID.to_be_bytes().to_vec();
		result.append(&mut 0u16.to_be_bytes().to_vec());
		result.append(&mut self.qer_id.encode());
		result.append(&mut self.gate_status.encode());
		if let Some(o) = self.maximum_bitrate.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.qfi.as_ref() { result.append(&mut o.encode()); }
		patch_grouped_length(&mut result);
		result
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut qer_id = None;
		let mut gate_status = None;
		let mut maximum_bitrate = None;
		let mut qfi = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				QER_ID::ID => { qer_id = Some(QER_ID::decode(curmsg)?); }
				GateStatus::ID => { gate_status = Some(GateStatus::decode(curmsg)?); }
				MBR::ID => { maximum_bitrate = Some(MBR::decode(curmsg)?); }
				QFI::ID => { qfi = Some(QFI::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in CreateQER", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			qer_id: qer_id.ok_or(PFCPError::new("Missing mandatory field QER_ID"))?,
			gate_status: gate_status.ok_or(PFCPError::new("Missing mandatory field GateStatus"))?,
			maximum_bitrate,
			qfi,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPDR {
	pub pdr_id: PDR_ID,
	pub local_f_teid: Option<F_TEID>,
	pub ue_ip_address: Option<UE_IPAddress>,
}
impl PFCPModel for CreatedPDR {
	const ID: u16 = 8;

	fn encode(&self) -> Vec<u8> {
		let mut result = Self::ID.to_be_bytes().to_vec();
		result.append(&mut 0u16.to_be_bytes().to_vec());
		result.append(&mut self.pdr_id.encode());
		if let Some(o) = self.local_f_teid.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.ue_ip_address.as_ref() { result.append(&mut o.encode()); }
		patch_grouped_length(&mut result);
		result
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut pdr_id = None;
		let mut local_f_teid = None;
		let mut ue_ip_address = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				PDR_ID::ID => { pdr_id = Some(PDR_ID::decode(curmsg)?); }
				F_TEID::ID => { local_f_teid = Some(F_TEID::decode(curmsg)?); }
				UE_IPAddress::ID => { ue_ip_address = Some(UE_IPAddress::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in CreatedPDR", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			pdr_id: pdr_id.ok_or(PFCPError::new("Missing mandatory field PDR_ID"))?,
			local_f_teid,
			ue_ip_address,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePDR {
	pub pdr_id: PDR_ID,
	pub outer_header_removal: Option<OuterHeaderRemoval>,
	pub precedence: Option<Precedence>,
	pub pdi: Option<PDI>,
	pub far_id: Option<FAR_ID>,
	pub qer_id: Option<QER_ID>,
}
impl PFCPModel for UpdatePDR {
	const ID: u16 = 9;

	fn encode(&self) -> Vec<u8> {
		let mut result = Self::ID.to_be_bytes().to_vec();
		result.append(&mut 0u16.to_be_bytes().to_vec());
		result.append(&mut self.pdr_id.encode());
		if let Some(o) = self.outer_header_removal.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.precedence.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.pdi.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.far_id.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.qer_id.as_ref() { result.append(&mut o.encode()); }
		patch_grouped_length(&mut result);
		result
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut pdr_id = None;
		let mut outer_header_removal = None;
		let mut precedence = None;
		let mut pdi = None;
		let mut far_id = None;
		let mut qer_id = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				PDR_ID::ID => { pdr_id = Some(PDR_ID::decode(curmsg)?); }
				OuterHeaderRemoval::ID => { outer_header_removal = Some(OuterHeaderRemoval::decode(curmsg)?); }
				Precedence::ID => { precedence = Some(Precedence::decode(curmsg)?); }
				PDI::ID => { pdi = Some(PDI::decode(curmsg)?); }
				FAR_ID::ID => { far_id = Some(FAR_ID::decode(curmsg)?); }
				QER_ID::ID => {
					let decoded = QER_ID::decode(curmsg)?;
					if qer_id.is_none() {
						qer_id = Some(decoded);
					}
				}
				_ => { debug!("Ignore unknown IE type {} in UpdatePDR", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			pdr_id: pdr_id.ok_or(PFCPError::new("Missing mandatory field PDR_ID"))?,
			outer_header_removal,
			precedence,
			pdi,
			far_id,
			qer_id,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateFAR {
	pub far_id: FAR_ID,
	pub apply_action: Option<ApplyAction>,
	pub update_forwarding_parameters: Option<UpdateForwardingParameters>,
}
impl PFCPModel for UpdateFAR {
	const ID: u16 = 10;

	fn encode(&self) -> Vec<u8> {
		let mut result = Self::ID.to_be_bytes().to_vec();
		result.append(&mut 0u16.to_be_bytes().to_vec());
		result.append(&mut self.far_id.encode());
		if let Some(o) = self.apply_action.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.update_forwarding_parameters.as_ref() { result.append(&mut o.encode()); }
		patch_grouped_length(&mut result);
		result
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut far_id = None;
		let mut apply_action = None;
		let mut update_forwarding_parameters = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				FAR_ID::ID => { far_id = Some(FAR_ID::decode(curmsg)?); }
				ApplyAction::ID => { apply_action = Some(ApplyAction::decode(curmsg)?); }
				UpdateForwardingParameters::ID => { update_forwarding_parameters = Some(UpdateForwardingParameters::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in UpdateFAR", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			far_id: far_id.ok_or(PFCPError::new("Missing mandatory field FAR_ID"))?,
			apply_action,
			update_forwarding_parameters,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQER {
	pub qer_id: QER_ID,
	pub gate_status: Option<GateStatus>,
	pub maximum_bitrate: Option<MBR>,
	pub qfi: Option<QFI>,
}
impl PFCPModel for UpdateQER {
	const ID: u16 = 14;

	fn encode(&self) -> Vec<u8> {
		let mut result = Self::ID.to_be_bytes().to_vec();
		result.append(&mut 0u16.to_be_bytes().to_vec());
		result.append(&mut self.qer_id.encode());
		if let Some(o) = self.gate_status.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.maximum_bitrate.as_ref() { result.append(&mut o.encode()); }
		if let Some(o) = self.qfi.as_ref() { result.append(&mut o.encode()); }
		patch_grouped_length(&mut result);
		result
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut qer_id = None;
		let mut gate_status = None;
		let mut maximum_bitrate = None;
		let mut qfi = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				QER_ID::ID => { qer_id = Some(QER_ID::decode(curmsg)?); }
				GateStatus::ID => { gate_status = Some(GateStatus::decode(curmsg)?); }
				MBR::ID => { maximum_bitrate = Some(MBR::decode(curmsg)?); }
				QFI::ID => { qfi = Some(QFI::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in UpdateQER", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			qer_id: qer_id.ok_or(PFCPError::new("Missing mandatory field QER_ID"))?,
			gate_status,
			maximum_bitrate,
			qfi,
		})
	}
}

macro_rules! remove_rule_ie {
	($name:ident, $id:expr, $field:ident, $rule:ident) => {
		#[derive(Debug, Clone, PartialEq)]
		pub struct $name {
			pub $field: $rule,
		}
		impl PFCPModel for $name {
			const ID: u16 = $id;

			fn encode(&self) -> Vec<u8> {
				let mut result = Self::ID.to_be_bytes().to_vec();
				result.append(&mut 0u16.to_be_bytes().to_vec());
				result.append(&mut self.$field.encode());
				patch_grouped_length(&mut result);
				result
			}

			fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
				let mut $field = None;
				for_each_ie(stream, |ie_type, curmsg| {
					match ie_type {
						$rule::ID => { $field = Some($rule::decode(curmsg)?); }
						_ => { debug!("Ignore unknown IE type {} in {}", ie_type, stringify!($name)); }
					}
					Ok(())
				})?;
				Ok(Self {
					$field: $field.ok_or(PFCPError::new(concat!("Missing mandatory field ", stringify!($rule))))?,
				})
			}
		}
	};
}

remove_rule_ie!(RemovePDR, 15, pdr_id, PDR_ID);
remove_rule_ie!(RemoveFAR, 16, far_id, FAR_ID);
remove_rule_ie!(RemoveQER, 18, qer_id, QER_ID);

#[derive(Debug, Clone, PartialEq)]
pub struct PFCPSessionEstablishmentRequest {
	/// Mandatory, checked by the handler
	pub node_id: Option<NodeID>,
	/// Mandatory, checked by the handler
	pub cp_f_seid: Option<F_SEID>,
	pub create_pdr: Vec<CreatePDR>,
	pub create_far: Vec<CreateFAR>,
	pub create_qer: Vec<CreateQER>,
}
impl PFCPModel for PFCPSessionEstablishmentRequest {
	const ID: u16 = 50;

	fn encode(&self) -> Vec<u8> {
		let mut ret = vec![];
		if let Some(o) = self.node_id.as_ref() { ret.append(&mut o.encode()); }
		if let Some(o) = self.cp_f_seid.as_ref() { ret.append(&mut o.encode()); }
		self.create_pdr.iter().for_each(|o| ret.append(&mut o.encode()));
		self.create_far.iter().for_each(|o| ret.append(&mut o.encode()));
		self.create_qer.iter().for_each(|o| ret.append(&mut o.encode()));
		ret
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut node_id = None;
		let mut cp_f_seid = None;
		let mut create_pdr = vec![];
		let mut create_far = vec![];
		let mut create_qer = vec![];
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				NodeID::ID => { node_id = decode_lenient::<NodeID>("NodeID", curmsg); }
				F_SEID::ID => { cp_f_seid = decode_lenient::<F_SEID>("CP F-SEID", curmsg); }
				CreatePDR::ID => { create_pdr.push(CreatePDR::decode(curmsg)?); }
				CreateFAR::ID => { create_far.push(CreateFAR::decode(curmsg)?); }
				CreateQER::ID => { create_qer.push(CreateQER::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in PFCPSessionEstablishmentRequest", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			node_id,
			cp_f_seid,
			create_pdr,
			create_far,
			create_qer,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct PFCPSessionEstablishmentResponse {
	pub node_id: NodeID,
	pub cause: Cause,
	pub up_f_seid: Option<F_SEID>,
	pub created_pdr: Vec<CreatedPDR>,
}
impl PFCPModel for PFCPSessionEstablishmentResponse {
	const ID: u16 = 51;

	fn encode(&self) -> Vec<u8> {
		let mut ret = vec![];
		ret.append(&mut self.node_id.encode());
		ret.append(&mut self.cause.encode());
		if let Some(o) = self.up_f_seid.as_ref() { ret.append(&mut o.encode()); }
		self.created_pdr.iter().for_each(|o| ret.append(&mut o.encode()));
		ret
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut node_id = None;
		let mut cause = None;
		let mut up_f_seid = None;
		let mut created_pdr = vec![];
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				NodeID::ID => { node_id = Some(NodeID::decode(curmsg)?); }
				Cause::ID => { cause = Some(Cause::decode(curmsg)?); }
				F_SEID::ID => { up_f_seid = Some(F_SEID::decode(curmsg)?); }
				CreatedPDR::ID => { created_pdr.push(CreatedPDR::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in PFCPSessionEstablishmentResponse", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			node_id: node_id.ok_or(PFCPError::new("Missing mandatory field NodeID"))?,
			cause: cause.ok_or(PFCPError::new("Missing mandatory field Cause"))?,
			up_f_seid,
			created_pdr,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PFCPSessionModificationRequest {
	pub cp_f_seid: Option<F_SEID>,
	pub remove_pdr: Vec<RemovePDR>,
	pub remove_far: Vec<RemoveFAR>,
	pub remove_qer: Vec<RemoveQER>,
	pub create_pdr: Vec<CreatePDR>,
	pub create_far: Vec<CreateFAR>,
	pub create_qer: Vec<CreateQER>,
	pub update_pdr: Vec<UpdatePDR>,
	pub update_far: Vec<UpdateFAR>,
	pub update_qer: Vec<UpdateQER>,
}
impl PFCPModel for PFCPSessionModificationRequest {
	const ID: u16 = 52;

	fn encode(&self) -> Vec<u8> {
		let mut ret = vec![];
		if let Some(o) = self.cp_f_seid.as_ref() { ret.append(&mut o.encode()); }
		self.remove_pdr.iter().for_each(|o| ret.append(&mut o.encode()));
		self.remove_far.iter().for_each(|o| ret.append(&mut o.encode()));
		self.remove_qer.iter().for_each(|o| ret.append(&mut o.encode()));
		self.create_pdr.iter().for_each(|o| ret.append(&mut o.encode()));
		self.create_far.iter().for_each(|o| ret.append(&mut o.encode()));
		self.create_qer.iter().for_each(|o| ret.append(&mut o.encode()));
		self.update_pdr.iter().for_each(|o| ret.append(&mut o.encode()));
		self.update_far.iter().for_each(|o| ret.append(&mut o.encode()));
		self.update_qer.iter().for_each(|o| ret.append(&mut o.encode()));
		ret
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut ret = Self::default();
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				F_SEID::ID => { ret.cp_f_seid = Some(F_SEID::decode(curmsg)?); }
				RemovePDR::ID => { ret.remove_pdr.push(RemovePDR::decode(curmsg)?); }
				RemoveFAR::ID => { ret.remove_far.push(RemoveFAR::decode(curmsg)?); }
				RemoveQER::ID => { ret.remove_qer.push(RemoveQER::decode(curmsg)?); }
				CreatePDR::ID => { ret.create_pdr.push(CreatePDR::decode(curmsg)?); }
				CreateFAR::ID => { ret.create_far.push(CreateFAR::decode(curmsg)?); }
				CreateQER::ID => { ret.create_qer.push(CreateQER::decode(curmsg)?); }
				UpdatePDR::ID => { ret.update_pdr.push(UpdatePDR::decode(curmsg)?); }
				UpdateFAR::ID => { ret.update_far.push(UpdateFAR::decode(curmsg)?); }
				UpdateQER::ID => { ret.update_qer.push(UpdateQER::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in PFCPSessionModificationRequest", ie_type); }
			}
			Ok(())
		})?;
		Ok(ret)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct PFCPSessionModificationResponse {
	pub cause: Cause,
	pub created_pdr: Vec<CreatedPDR>,
}
impl PFCPModel for PFCPSessionModificationResponse {
	const ID: u16 = 53;

	fn encode(&self) -> Vec<u8> {
		let mut ret = vec![];
		ret.append(&mut self.cause.encode());
		self.created_pdr.iter().for_each(|o| ret.append(&mut o.encode()));
		ret
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut cause = None;
		let mut created_pdr = vec![];
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				Cause::ID => { cause = Some(Cause::decode(curmsg)?); }
				CreatedPDR::ID => { created_pdr.push(CreatedPDR::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in PFCPSessionModificationResponse", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			cause: cause.ok_or(PFCPError::new("Missing mandatory field Cause"))?,
			created_pdr,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct PFCPSessionDeletionRequest {}
impl PFCPModel for PFCPSessionDeletionRequest {
	const ID: u16 = 54;

	fn encode(&self) -> Vec<u8> {
		vec![]
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		for_each_ie(stream, |ie_type, _| {
			debug!("Ignore unknown IE type {} in PFCPSessionDeletionRequest", ie_type);
			Ok(())
		})?;
		Ok(Self {})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct PFCPSessionDeletionResponse {
	pub cause: Cause,
}
impl PFCPModel for PFCPSessionDeletionResponse {
	const ID: u16 = 55;

	fn encode(&self) -> Vec<u8> {
		self.cause.encode()
	}

	fn decode(stream: &[u8]) -> Result<Self, PFCPError> where Self: Sized {
		let mut cause = None;
		for_each_ie(stream, |ie_type, curmsg| {
			match ie_type {
				Cause::ID => { cause = Some(Cause::decode(curmsg)?); }
				_ => { debug!("Ignore unknown IE type {} in PFCPSessionDeletionResponse", ie_type); }
			}
			Ok(())
		})?;
		Ok(Self {
			cause: cause.ok_or(PFCPError::new("Missing mandatory field Cause"))?,
		})
	}
}

macro_rules! pfcp_messages {
	($($name:ident),* $(,)?) => {
		/// Every PFCP message this node understands, tagged by kind.
		#[derive(Debug, Clone, PartialEq)]
		pub enum PFCPMessage {
			$($name($name),)*
			/// A message type with no model here, kept so it can still be counted
			Unsupported(u8),
		}

		impl PFCPMessage {
			pub fn decode(msg_type: u8, body: &[u8]) -> Result<PFCPMessage, PFCPError> {
				match msg_type as u16 {
					$($name::ID => Ok(PFCPMessage::$name($name::decode(body)?)),)*
					_ => Ok(PFCPMessage::Unsupported(msg_type)),
				}
			}

			pub fn msg_type(&self) -> u8 {
				match self {
					$(PFCPMessage::$name(_) => $name::ID as u8,)*
					PFCPMessage::Unsupported(t) => *t,
				}
			}

			pub fn name(&self) -> &'static str {
				match self {
					$(PFCPMessage::$name(_) => stringify!($name),)*
					PFCPMessage::Unsupported(_) => "Unsupported",
				}
			}

			/// Encodes the IEs only, without the PFCP header
			pub fn encode_body(&self) -> Vec<u8> {
				match self {
					$(PFCPMessage::$name(m) => m.encode(),)*
					PFCPMessage::Unsupported(_) => vec![],
				}
			}
		}

		$(
			impl From<$name> for PFCPMessage {
				fn from(m: $name) -> Self {
					PFCPMessage::$name(m)
				}
			}
		)*
	};
}

pfcp_messages!(
	HeartbeatRequest,
	HeartbeatResponse,
	AssociationSetupRequest,
	AssociationSetupResponse,
	AssociationUpdateRequest,
	AssociationUpdateResponse,
	AssociationReleaseRequest,
	AssociationReleaseResponse,
	PFCPSessionEstablishmentRequest,
	PFCPSessionEstablishmentResponse,
	PFCPSessionModificationRequest,
	PFCPSessionModificationResponse,
	PFCPSessionDeletionRequest,
	PFCPSessionDeletionResponse,
);

impl PFCPMessage {
	/// Encodes the full message, header included.
	pub fn encode(&self, seq: u32, seid: Option<u64>) -> Vec<u8> {
		let mut body = self.encode_body();
		let mut ret = PFCPHeader::new(self.msg_type(), seid, seq, body.len()).encode();
		ret.append(&mut body);
		ret
	}

	/// Cause carried by a response, if any.
	pub fn cause(&self) -> Option<Cause> {
		match self {
			PFCPMessage::AssociationSetupResponse(m) => Some(m.cause),
			PFCPMessage::AssociationUpdateResponse(m) => Some(m.cause),
			PFCPMessage::AssociationReleaseResponse(m) => Some(m.cause),
			PFCPMessage::PFCPSessionEstablishmentResponse(m) => Some(m.cause),
			PFCPMessage::PFCPSessionModificationResponse(m) => Some(m.cause),
			PFCPMessage::PFCPSessionDeletionResponse(m) => Some(m.cause),
			_ => None,
		}
	}
}
