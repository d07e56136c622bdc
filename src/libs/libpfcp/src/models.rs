#![allow(non_snake_case, non_camel_case_types)]

use std::{
    convert::TryInto,
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use bitfield::bitfield;

use super::{PFCPError, PFCPModel};

macro_rules! decode_primitive_u8 {
    ($t:ident, $u:expr) => {
        match num::FromPrimitive::from_u8($u) as Option<$t> {
            Some(a) => a,
            None => {
                return Err(PFCPError::new(&format!(
                    "FromPrimitive error {} from {}",
                    stringify!($t),
                    $u
                )));
            }
        }
    };
}

/// Takes `N` octets off the front of `stream`, failing on truncated input.
pub(crate) fn take<const N: usize>(stream: &mut &[u8], what: &str) -> Result<[u8; N], PFCPError> {
    if stream.len() < N {
        return Err(PFCPError::new(&format!(
            "Truncated {}: expect {} octets, got {}",
            what,
            N,
            stream.len()
        )));
    }
    let bytes: [u8; N] = stream[..N].try_into().map_err(|_| PFCPError::new(what))?;
    *stream = &stream[N..];
    Ok(bytes)
}

fn expect_length(stream: &[u8], expected: usize) -> Result<(), PFCPError> {
    if stream.len() != expected {
        return Err(PFCPError::new(&format!(
            "Expect length {}, got {}",
            expected,
            stream.len()
        )));
    }
    Ok(())
}

fn ie_header(id: u16, length: u16) -> Vec<u8> {
    let mut result = id.to_be_bytes().to_vec();
    result.append(&mut length.to_be_bytes().to_vec());
    result
}

bitfield! {
    #[derive(Clone, Debug, PartialEq)]
    pub struct PFCPHeaderFlags(u8);
    u8;
    pub getVersion, setVersion: 7, 5;
    pub getFO, setFO: 2, 2; // Follow On
    pub getMP, setMP: 1, 1; // Presence of Message Priority
    pub getSEID, setSEID: 0, 0;
}

#[derive(Clone, Debug, PartialEq)]
pub struct PFCPHeader {
    pub flags: PFCPHeaderFlags,
    pub msg_type: u8,
    pub length: u16,
    pub seid: Option<u64>,
    /// Sequence number, big endian, lower 24 bits are used
    pub seq: u32,
    pub priority: Option<u8>,
}

impl PFCPHeader {
    /// Builds a version 1 header for a body of `body_length` octets.
    pub fn new(msg_type: u8, seid: Option<u64>, seq: u32, body_length: usize) -> PFCPHeader {
        let mut flags = PFCPHeaderFlags(0);
        flags.setVersion(1);
        let mut length = body_length + 4;
        if seid.is_some() {
            flags.setSEID(1);
            length += 8;
        }
        PFCPHeader {
            flags,
            msg_type,
            length: length as u16,
            seid,
            seq: seq & 0xFF_FFFF,
            priority: None,
        }
    }
    pub fn encode(&self) -> Vec<u8> {
        let mut ret = vec![self.flags.0, self.msg_type];
        ret.append(&mut self.length.to_be_bytes().to_vec());
        if let Some(seid) = self.seid {
            ret.append(&mut seid.to_be_bytes().to_vec());
        }
        let seq_priority = (self.seq << 8) | ((self.priority.map_or(0, |f| f << 4)) as u32);
        ret.append(&mut seq_priority.to_be_bytes().to_vec());
        ret
    }
    /// Splits one message off `stream`, returning an owned copy of its body and the remaining octets.
    pub fn decode(stream: &[u8]) -> Result<(Vec<u8>, &[u8], PFCPHeader), PFCPError> {
        let mut stream = stream;
        let [flags, msg_type, len_hi, len_lo] = take::<4>(&mut stream, "PFCP header")?;
        let flags = PFCPHeaderFlags(flags);
        if flags.getVersion() != 1 {
            return Err(PFCPError::new(&format!(
                "Unsupported PFCP version {}",
                flags.getVersion()
            )));
        }
        let length = u16::from_be_bytes([len_hi, len_lo]);
        if stream.len() < length as usize {
            return Err(PFCPError::new(&format!(
                "Message is of length {}, but remaining octects is {}",
                length,
                stream.len()
            )));
        }
        let (mut message, rest) = stream.split_at(length as usize);
        let seid = if flags.getSEID() != 0 {
            Some(u64::from_be_bytes(take::<8>(&mut message, "SEID")?))
        } else {
            None
        };
        let seq_priority = u32::from_be_bytes(take::<4>(&mut message, "sequence number")?);
        let priority = if flags.getMP() != 0 {
            Some(((seq_priority & 0xF0) as u8) >> 4)
        } else {
            None
        };
        Ok((
            message.to_vec(),
            rest,
            PFCPHeader {
                flags,
                msg_type,
                length,
                seid,
                seq: (seq_priority >> 8),
                priority,
            },
        ))
    }
    /// Is this message a request or a response to a request
    pub fn is_request(&self) -> bool {
        matches!(self.msg_type, 1 | 3 | 5 | 7 | 9 | 12 | 14 | 50 | 52 | 54 | 56)
    }
}

bitfield! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct UPFunctionFeatures(u64);
    u8;
    /// Downlink Data Buffering in CP function is supported by the UP function.
    pub getBUCP, setBUCP: 56, 56;
    /// The buffering parameter 'Downlink Data Notification Delay' is supported by the UP function.
    pub getDDND, setDDND: 57, 57;
    /// The buffering parameter 'DL Buffering Duration' is supported by the UP function.
    pub getDLBD, setDLBD: 58, 58;
    /// Traffic Steering is supported by the UP function.
    pub getTRST, setTRST: 59, 59;
    /// F-TEID allocation / release in the UP function is supported by the UP function.
    pub getFTUP, setFTUP: 60, 60;
    /// The PFD Management procedure is supported by the UP function.
    pub getPFDM, setPFDM: 61, 61;
    /// Header Enrichment of Uplink traffic is supported by the UP function.
    pub getHEEU, setHEEU: 62, 62;
    /// Traffic Redirection Enforcement in the UP function is supported by the UP function.
    pub getTREU, setTREU: 63, 63;
    /// Sending of End Marker packets supported by the UP function.
    pub getEMPU, setEMPU: 48, 48;
    /// Support of PDI optimised signalling in UP function (see clause 5.2.1A.2).
    pub getPDIU, setPDIU: 49, 49;
    /// Allocating UE IP addresses or prefixes.
    pub getUEIP, setUEIP: 42, 42;
}
impl PFCPModel for UPFunctionFeatures {
    const ID: u16 = 43;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 6);
        result.append(&mut self.0.to_be_bytes()[..6].to_vec());
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        if stream.len() < 2 {
            return Err(PFCPError::new(&format!(
                "Expect length at least 2, got {}",
                stream.len()
            )));
        }
        let mut bytes = [0u8; 8];
        let used = std::cmp::min(stream.len(), 8);
        bytes[..used].copy_from_slice(&stream[..used]);
        Ok(Self(u64::from_be_bytes(bytes)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum NodeIdType {
    IPV4 = 0,
    IPV6 = 1,
    FQDN = 2,
}
#[derive(Debug, Clone, PartialEq)]
pub struct NodeID {
    /// Node ID Type
    pub node_id_type: NodeIdType,

    /// Node ID Value
    pub node_id: Vec<u8>,
    // FQDN encoding shall be identical to the encoding of a FQDN within a DNS message of clause 3.1 of
    //   IETF RFC 1035 [27] but excluding the trailing zero byte.
}
impl NodeID {
    pub fn from_ip(ip: IpAddr) -> NodeID {
        match ip {
            IpAddr::V4(v4) => NodeID {
                node_id_type: NodeIdType::IPV4,
                node_id: v4.octets().to_vec(),
            },
            IpAddr::V6(v6) => NodeID {
                node_id_type: NodeIdType::IPV6,
                node_id: v6.octets().to_vec(),
            },
        }
    }
    pub fn from_fqdn(fqdn: &str) -> NodeID {
        let mut node_id = vec![];
        for label in fqdn.trim_end_matches('.').split('.') {
            let label = &label.as_bytes()[..std::cmp::min(label.len(), 63)];
            node_id.push(label.len() as u8);
            node_id.extend_from_slice(label);
        }
        NodeID {
            node_id_type: NodeIdType::FQDN,
            node_id,
        }
    }
    /// IP literals become IPv4/IPv6 node ids, anything else an FQDN.
    pub fn from_string(value: &str) -> NodeID {
        match value.parse::<IpAddr>() {
            Ok(ip) => Self::from_ip(ip),
            Err(_) => Self::from_fqdn(value),
        }
    }
    pub fn to_ip(&self) -> Option<IpAddr> {
        match self.node_id_type {
            NodeIdType::IPV4 => {
                let tmp: [u8; 4] = self.node_id.as_slice().try_into().ok()?;
                Some(IpAddr::V4(Ipv4Addr::from(tmp)))
            }
            NodeIdType::IPV6 => {
                let tmp: [u8; 16] = self.node_id.as_slice().try_into().ok()?;
                Some(IpAddr::V6(Ipv6Addr::from(tmp)))
            }
            NodeIdType::FQDN => None,
        }
    }
}
impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ip) = self.to_ip() {
            return write!(f, "{}", ip);
        }
        let mut labels = vec![];
        let mut stream = self.node_id.as_slice();
        while let Some((&len, rest)) = stream.split_first() {
            let len = std::cmp::min(len as usize, rest.len());
            labels.push(String::from_utf8_lossy(&rest[..len]).to_string());
            stream = &rest[len..];
        }
        write!(f, "{}", labels.join("."))
    }
}
impl PFCPModel for NodeID {
    const ID: u16 = 60;
    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, (self.node_id.len() + 1) as u16);
        result.push(self.node_id_type as u8);
        result.append(&mut self.node_id.clone());
        result
    }
    fn decode(stream: &[u8]) -> Result<NodeID, PFCPError> {
        let mut stream = stream;
        let [id_type] = take::<1>(&mut stream, "Node ID type")?;
        let id_type = decode_primitive_u8!(NodeIdType, id_type & 0x0F);
        match id_type {
            NodeIdType::IPV4 => expect_length(stream, 4)?,
            NodeIdType::IPV6 => expect_length(stream, 16)?,
            NodeIdType::FQDN => {
                if stream.is_empty() {
                    return Err(PFCPError::new("Empty FQDN Node ID"));
                }
            }
        };
        Ok(NodeID {
            node_id_type: id_type,
            node_id: stream.to_vec(),
        })
    }
}

/// Seconds between 1900-01-01 and the UNIX epoch.
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryTimeStamp {
    pub timestamp: u32,
}
impl RecoveryTimeStamp {
    pub fn new(startup_time: chrono::DateTime<chrono::offset::Utc>) -> RecoveryTimeStamp {
        let diff = (startup_time.timestamp() + NTP_UNIX_OFFSET) as u32;
        RecoveryTimeStamp { timestamp: diff }
    }
}
impl PFCPModel for RecoveryTimeStamp {
    const ID: u16 = 96;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 4);
        result.append(&mut self.timestamp.to_be_bytes().to_vec());
        result
    }
    fn decode(stream: &[u8]) -> Result<RecoveryTimeStamp, PFCPError> {
        let mut stream = stream;
        let timestamp = u32::from_be_bytes(take::<4>(&mut stream, "Recovery Time Stamp")?);
        Ok(RecoveryTimeStamp { timestamp })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum Cause {
    Reserved = 0,
    RequestAccepted = 1,
    RequestRejected = 64,
    SessionContextNotFound = 65,
    MandatoryIEMissing = 66,
    ConditionalIEMissing = 67,
    InvalidLength = 68,
    MandatoryIEIncorrect = 69,
    InvalidForwardingPolicy = 70,
    InvalidFTEIDAllocationOption = 71,
    NoEstablishedPFCPAssociation = 72,
    RuleCreationModificationFailure = 73,
    PFCPEntityInCongestion = 74,
    NoResourcesAvailable = 75,
    ServiceNotSupported = 76,
    SystemFailure = 77,
    RedirectionRequested = 78,
}
impl Cause {
    pub fn is_accepted(&self) -> bool {
        *self == Cause::RequestAccepted
    }
}
impl PFCPModel for Cause {
    const ID: u16 = 19;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 1);
        result.push(*self as u8);
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        expect_length(stream, 1)?;
        Ok(decode_primitive_u8!(Self, stream[0]))
    }
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct F_SEID {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub seid: u64,
}
impl F_SEID {
    pub fn new(ip: IpAddr, seid: u64) -> F_SEID {
        match ip {
            IpAddr::V4(v4) => F_SEID {
                ipv4: Some(v4),
                ipv6: None,
                seid,
            },
            IpAddr::V6(v6) => F_SEID {
                ipv4: None,
                ipv6: Some(v6),
                seid,
            },
        }
    }
}
impl PFCPModel for F_SEID {
    const ID: u16 = 57;

    fn encode(&self) -> Vec<u8> {
        let mut flag = 0u8;
        let mut length: u16 = 1 + 8;
        if self.ipv4.is_some() {
            flag |= 0b10;
            length += 4;
        };
        if self.ipv6.is_some() {
            flag |= 0b01;
            length += 16;
        };
        let mut result = ie_header(Self::ID, length);
        result.push(flag);
        result.append(&mut self.seid.to_be_bytes().to_vec());
        if let Some(ip) = self.ipv4 {
            result.append(&mut ip.octets().to_vec());
        }
        if let Some(ip) = self.ipv6 {
            result.append(&mut ip.octets().to_vec());
        }
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        let mut stream = stream;
        let [flag] = take::<1>(&mut stream, "F-SEID flags")?;
        let seid = u64::from_be_bytes(take::<8>(&mut stream, "F-SEID")?);
        let ipv4 = if flag & 0b10 != 0 {
            Some(Ipv4Addr::from(take::<4>(&mut stream, "F-SEID IPv4")?))
        } else {
            None
        };
        let ipv6 = if flag & 0b01 != 0 {
            Some(Ipv6Addr::from(take::<16>(&mut stream, "F-SEID IPv6")?))
        } else {
            None
        };
        Ok(F_SEID { ipv4, ipv6, seid })
    }
}

#[derive(Debug, Clone, PartialEq, Copy)]
pub struct PDR_ID {
    pub rule_id: u16,
}
impl PFCPModel for PDR_ID {
    const ID: u16 = 56;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 2);
        result.append(&mut self.rule_id.to_be_bytes().to_vec());
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        expect_length(stream, 2)?;
        let mut stream = stream;
        Ok(PDR_ID {
            rule_id: u16::from_be_bytes(take::<2>(&mut stream, "PDR ID")?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Copy)]
pub struct Precedence {
    /// Higher value lower precedence
    pub precedence: u32,
}
impl PFCPModel for Precedence {
    const ID: u16 = 29;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 4);
        result.append(&mut self.precedence.to_be_bytes().to_vec());
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        expect_length(stream, 4)?;
        let mut stream = stream;
        Ok(Precedence {
            precedence: u32::from_be_bytes(take::<4>(&mut stream, "Precedence")?),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum OuterHeaderRemovalDescription {
    GTP_U_UDP_IPv4 = 0,
    GTP_U_UDP_IPv6 = 1,
    UDP_IPv4 = 2,
    UDP_IPv6 = 3,
    IPv4 = 4,
    IPv6 = 5,
    GTP_U_UDP_IP = 6,
    VLAN_S_TAG = 7,
    S_TAG_AND_C_TAG = 8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OuterHeaderRemoval {
    pub desc: OuterHeaderRemovalDescription,
    pub ext_header_deletion: Option<u8>,
}
impl PFCPModel for OuterHeaderRemoval {
    const ID: u16 = 95;

    fn encode(&self) -> Vec<u8> {
        let length = if self.ext_header_deletion.is_some() { 2 } else { 1 };
        let mut result = ie_header(Self::ID, length);
        result.push(self.desc as u8);
        if let Some(e) = self.ext_header_deletion {
            result.push(e);
        }
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        let mut stream = stream;
        let [desc] = take::<1>(&mut stream, "Outer Header Removal")?;
        let desc = decode_primitive_u8!(OuterHeaderRemovalDescription, desc);
        let ext_header_deletion = stream.first().copied();
        Ok(OuterHeaderRemoval {
            desc,
            ext_header_deletion,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Copy, Hash, Eq)]
pub struct FAR_ID {
    pub rule_id: u32,
}
impl PFCPModel for FAR_ID {
    const ID: u16 = 108;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 4);
        result.append(&mut self.rule_id.to_be_bytes().to_vec());
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        expect_length(stream, 4)?;
        let mut stream = stream;
        Ok(FAR_ID {
            rule_id: u32::from_be_bytes(take::<4>(&mut stream, "FAR ID")?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Copy, Hash, Eq)]
pub struct QER_ID {
    pub rule_id: u32,
}
impl PFCPModel for QER_ID {
    const ID: u16 = 109;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 4);
        result.append(&mut self.rule_id.to_be_bytes().to_vec());
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        expect_length(stream, 4)?;
        let mut stream = stream;
        Ok(QER_ID {
            rule_id: u32::from_be_bytes(take::<4>(&mut stream, "QER ID")?),
        })
    }
}

bitfield! {
    #[derive(Debug, Clone, PartialEq, Hash)]
    pub struct ApplyAction(u16);
    u8;
    pub getDROP, setDROP: 8, 8;
    pub getFORW, setFORW: 9, 9;
    pub getBUFF, setBUFF: 10, 10;
    pub getNOCP, setNOCP: 11, 11;
    pub getDUPL, setDUPL: 12, 12;
    pub getIPMA, setIPMA: 13, 13;
    pub getIPMD, setIPMD: 14, 14;
    pub getDFRT, setDFRT: 15, 15;
    pub getEDRT, setEDRT: 0, 0;
    pub getBDPN, setBDPN: 1, 1;
    pub getDDPN, setDDPN: 2, 2;
}
impl ApplyAction {
    /// The first octet, which carries DROP/FORW/BUFF/NOCP/DUPL.
    pub fn first_octet(&self) -> u8 {
        (self.0 >> 8) as u8
    }
}
impl PFCPModel for ApplyAction {
    const ID: u16 = 44;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 2);
        result.append(&mut self.0.to_be_bytes().to_vec());
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        // Rel-15 peers send a single octet
        match stream.len() {
            1 => Ok(ApplyAction((stream[0] as u16) << 8)),
            2 => Ok(ApplyAction(u16::from_be_bytes([stream[0], stream[1]]))),
            x => Err(PFCPError::new(&format!("Expect length 1 or 2, got {}", x))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Copy, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum SourceInterface {
    AccessSide = 0,
    CoreSide = 1,
    SGi_LAN_N6_LAN = 2,
    CP_Function = 3,
    _5G_VN_internal = 4,
}
impl PFCPModel for SourceInterface {
    const ID: u16 = 20;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 1);
        result.push(*self as u8);
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        let mut stream = stream;
        let [val] = take::<1>(&mut stream, "Source Interface")?;
        Ok(decode_primitive_u8!(Self, val & 0x0F))
    }
}

#[derive(Debug, Clone, PartialEq, Copy, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum DestinationInterface {
    AccessSide = 0,
    CoreSide = 1,
    SGi_LAN_N6_LAN = 2,
    CP_Function = 3,
    LI_Function = 4,
    _5G_VN_internal = 5,
}
impl PFCPModel for DestinationInterface {
    const ID: u16 = 42;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 1);
        result.push(*self as u8);
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        let mut stream = stream;
        let [val] = take::<1>(&mut stream, "Destination Interface")?;
        Ok(decode_primitive_u8!(Self, val & 0x0F))
    }
}

bitfield! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct F_TEIDFlags(u8);
    u8;
    pub getV4, setV4: 0, 0;
    pub getV6, setV6: 1, 1;
    pub getCH, setCH: 2, 2;
    pub getCHID, setCHID: 3, 3;
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F_TEID {
    pub flags: F_TEIDFlags,
    pub teid: Option<u32>,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub choose_id: Option<u8>,
}
impl F_TEID {
    pub fn new_choose(ipv4: bool, ipv6: bool, choose_id: Option<u8>) -> F_TEID {
        let mut flags = F_TEIDFlags(0);
        flags.setCH(1);
        if ipv4 {
            flags.setV4(1);
        }
        if ipv6 {
            flags.setV6(1);
        }
        if choose_id.is_some() {
            flags.setCHID(1);
        }
        F_TEID {
            flags,
            teid: None,
            ipv4: None,
            ipv6: None,
            choose_id,
        }
    }
    pub fn from_ip_teid(ip: IpAddr, teid: u32) -> F_TEID {
        let mut flags = F_TEIDFlags(0);
        match ip {
            IpAddr::V4(ip) => {
                flags.setV4(1);
                F_TEID {
                    flags,
                    teid: Some(teid),
                    ipv4: Some(ip),
                    ipv6: None,
                    choose_id: None,
                }
            }
            IpAddr::V6(ip) => {
                flags.setV6(1);
                F_TEID {
                    flags,
                    teid: Some(teid),
                    ipv4: None,
                    ipv6: Some(ip),
                    choose_id: None,
                }
            }
        }
    }
    pub fn is_choose(&self) -> bool {
        self.flags.getCH() != 0
    }
}
impl PFCPModel for F_TEID {
    const ID: u16 = 21;

    fn encode(&self) -> Vec<u8> {
        let mut length: u16 = 1;
        if self.teid.is_some() {
            length += 4;
        }
        if self.ipv4.is_some() {
            length += 4;
        }
        if self.ipv6.is_some() {
            length += 16;
        }
        if self.choose_id.is_some() {
            length += 1;
        }
        let mut result = ie_header(Self::ID, length);
        result.push(self.flags.0);
        if let Some(id) = self.teid {
            result.append(&mut id.to_be_bytes().to_vec());
        }
        if let Some(ip) = self.ipv4 {
            result.append(&mut ip.octets().to_vec());
        }
        if let Some(ip) = self.ipv6 {
            result.append(&mut ip.octets().to_vec());
        }
        if let Some(id) = self.choose_id {
            result.push(id);
        }
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        let mut stream = stream;
        let [flags] = take::<1>(&mut stream, "F-TEID flags")?;
        let flags = F_TEIDFlags(flags);
        let choose = flags.getCH() != 0;
        let teid = if !choose {
            Some(u32::from_be_bytes(take::<4>(&mut stream, "TEID")?))
        } else {
            None
        };
        let ipv4 = if flags.getV4() != 0 && !choose {
            Some(Ipv4Addr::from(take::<4>(&mut stream, "F-TEID IPv4")?))
        } else {
            None
        };
        let ipv6 = if flags.getV6() != 0 && !choose {
            Some(Ipv6Addr::from(take::<16>(&mut stream, "F-TEID IPv6")?))
        } else {
            None
        };
        let choose_id = if flags.getCHID() != 0 {
            let [id] = take::<1>(&mut stream, "CHOOSE ID")?;
            Some(id)
        } else {
            None
        };
        Ok(F_TEID {
            flags,
            teid,
            ipv4,
            ipv6,
            choose_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInstance {
    pub instance: Vec<u8>,
}
impl PFCPModel for NetworkInstance {
    const ID: u16 = 22;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, self.instance.len() as u16);
        result.append(&mut self.instance.clone());
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        Ok(NetworkInstance {
            instance: stream.to_vec(),
        })
    }
}

bitfield! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct UE_IPAddressFlags(u8);
    u8;
    pub getV6, setV6: 0, 0;
    pub getV4, setV4: 1, 1;
    /// 0 for Source, 1 for Destination
    pub getSD, setSD: 2, 2;
    pub getIPv6D, setIPv6D: 3, 3;
    pub getCHV4, setCHV4: 4, 4;
    pub getCHV6, setCHV6: 5, 5;
    pub getIP6PL, setIP6PL: 6, 6;
}
#[derive(Debug, Clone, PartialEq)]
pub struct UE_IPAddress {
    pub flags: UE_IPAddressFlags,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub ipv6_prefix_delegation_bits: Option<u8>,
    pub ipv6_prefix_length: Option<u8>,
}
impl UE_IPAddress {
    pub fn new() -> UE_IPAddress {
        UE_IPAddress {
            flags: UE_IPAddressFlags(0),
            ipv4: None,
            ipv6: None,
            ipv6_prefix_delegation_bits: None,
            ipv6_prefix_length: None,
        }
    }
    pub fn from_ip(ip: IpAddr, destination: bool) -> UE_IPAddress {
        let mut result = Self::new();
        if destination {
            result.flags.setSD(1);
        }
        match ip {
            IpAddr::V4(v4) => {
                result.flags.setV4(1);
                result.ipv4 = Some(v4);
            }
            IpAddr::V6(v6) => {
                result.flags.setV6(1);
                result.ipv6 = Some(v6);
            }
        }
        result
    }
}
impl Default for UE_IPAddress {
    fn default() -> Self {
        Self::new()
    }
}
impl PFCPModel for UE_IPAddress {
    const ID: u16 = 93;

    fn encode(&self) -> Vec<u8> {
        let mut length: u16 = 1;
        if self.ipv4.is_some() {
            length += 4;
        }
        if self.ipv6.is_some() {
            length += 16;
        }
        if self.ipv6_prefix_delegation_bits.is_some() {
            length += 1;
        }
        if self.ipv6_prefix_length.is_some() {
            length += 1;
        }
        let mut result = ie_header(Self::ID, length);
        result.push(self.flags.0);
        if let Some(ip) = self.ipv4 {
            result.append(&mut ip.octets().to_vec());
        }
        if let Some(ip) = self.ipv6 {
            result.append(&mut ip.octets().to_vec());
        }
        if let Some(bits) = self.ipv6_prefix_delegation_bits {
            result.push(bits);
        }
        if let Some(len) = self.ipv6_prefix_length {
            result.push(len);
        }
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        let mut stream = stream;
        let [flags] = take::<1>(&mut stream, "UE IP Address flags")?;
        let flags = UE_IPAddressFlags(flags);
        let ipv4 = if flags.getV4() != 0 && flags.getCHV4() == 0 {
            Some(Ipv4Addr::from(take::<4>(&mut stream, "UE IPv4")?))
        } else {
            None
        };
        let ipv6 = if flags.getV6() != 0 && flags.getCHV6() == 0 {
            Some(Ipv6Addr::from(take::<16>(&mut stream, "UE IPv6")?))
        } else {
            None
        };
        let v6d = if flags.getIPv6D() != 0 {
            let [bits] = take::<1>(&mut stream, "IPv6 prefix delegation bits")?;
            Some(bits)
        } else {
            None
        };
        let v6pl = if flags.getIP6PL() != 0 {
            let [len] = take::<1>(&mut stream, "IPv6 prefix length")?;
            Some(len)
        } else {
            None
        };
        Ok(Self {
            flags,
            ipv4,
            ipv6,
            ipv6_prefix_delegation_bits: v6d,
            ipv6_prefix_length: v6pl,
        })
    }
}

bitfield! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct SDFFilterFlags(u8);
    u8;
    pub getFD, setFD: 0, 0;
    pub getTTC, setTTC: 1, 1;
    pub getSPI, setSPI: 2, 2;
    pub getFL, setFL: 3, 3;
    pub getBID, setBID: 4, 4;
}
#[derive(Debug, Clone, PartialEq)]
pub struct SDFFilter {
    pub flow_desc: Option<String>,
    pub tos_traffic_class: Option<u16>,
    pub security_parameter_index: Option<u32>,
    pub flow_label: Option<[u8; 3]>,
    pub sdf_filter_id: Option<u32>,
}
impl SDFFilter {
    pub fn from_flow_description(flow_desc: &str) -> Self {
        Self {
            flow_desc: Some(flow_desc.to_string()),
            tos_traffic_class: None,
            security_parameter_index: None,
            flow_label: None,
            sdf_filter_id: None,
        }
    }
}
impl PFCPModel for SDFFilter {
    const ID: u16 = 23;

    fn encode(&self) -> Vec<u8> {
        let mut flag = SDFFilterFlags(0);
        if self.flow_desc.is_some() {
            flag.setFD(1);
        }
        if self.tos_traffic_class.is_some() {
            flag.setTTC(1);
        }
        if self.security_parameter_index.is_some() {
            flag.setSPI(1);
        }
        if self.flow_label.is_some() {
            flag.setFL(1);
        }
        if self.sdf_filter_id.is_some() {
            flag.setBID(1);
        }
        let mut result = ie_header(Self::ID, 0);
        result.push(flag.0);
        result.push(0);
        if let Some(fd) = self.flow_desc.as_ref() {
            result.append(&mut (fd.len() as u16).to_be_bytes().to_vec());
            result.append(&mut fd.as_bytes().to_vec());
        }
        if let Some(o) = self.tos_traffic_class {
            result.append(&mut o.to_be_bytes().to_vec());
        }
        if let Some(o) = self.security_parameter_index {
            result.append(&mut o.to_be_bytes().to_vec());
        }
        if let Some(o) = self.flow_label {
            result.append(&mut o.to_vec());
        }
        if let Some(o) = self.sdf_filter_id {
            result.append(&mut o.to_be_bytes().to_vec());
        }
        let length_be = (result.len() as u16 - 4).to_be_bytes();
        result[2] = length_be[0];
        result[3] = length_be[1];
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        let mut stream = stream;
        let [flag, _spare] = take::<2>(&mut stream, "SDF Filter flags")?;
        let flag = SDFFilterFlags(flag);
        let flow_desc = if flag.getFD() != 0 {
            let len = u16::from_be_bytes(take::<2>(&mut stream, "Flow Description length")?) as usize;
            if stream.len() < len {
                return Err(PFCPError::new(&format!(
                    "Flow Description is of length {}, but remaining octets is {}",
                    len,
                    stream.len()
                )));
            }
            let fd = std::str::from_utf8(&stream[..len])
                .map_err(|e| PFCPError::new(&format!("Flow Description is not UTF-8: {}", e)))?
                .to_string();
            stream = &stream[len..];
            Some(fd)
        } else {
            None
        };
        let tos_traffic_class = if flag.getTTC() != 0 {
            Some(u16::from_be_bytes(take::<2>(&mut stream, "ToS Traffic Class")?))
        } else {
            None
        };
        let security_parameter_index = if flag.getSPI() != 0 {
            Some(u32::from_be_bytes(take::<4>(&mut stream, "Security Parameter Index")?))
        } else {
            None
        };
        let flow_label = if flag.getFL() != 0 {
            Some(take::<3>(&mut stream, "Flow Label")?)
        } else {
            None
        };
        let sdf_filter_id = if flag.getBID() != 0 {
            Some(u32::from_be_bytes(take::<4>(&mut stream, "SDF Filter ID")?))
        } else {
            None
        };
        Ok(Self {
            flow_desc,
            tos_traffic_class,
            security_parameter_index,
            flow_label,
            sdf_filter_id,
        })
    }
}

bitfield! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct OuterHeaderCreationDescription(u16);
    u8;
    pub getGTP_U_UDP_IPv4, setGTP_U_UDP_IPv4: 8, 8;
    pub getGTP_U_UDP_IPv6, setGTP_U_UDP_IPv6: 9, 9;
    pub getUDP_IPv4, setUDP_IPv4: 10, 10;
    pub getUDP_IPv6, setUDP_IPv6: 11, 11;
    pub getIPv4, setIPv4: 12, 12;
    pub getIPv6, setIPv6: 13, 13;
    pub getC_TAG, setC_TAG: 14, 14;
    pub getS_TAG, setS_TAG: 15, 15;
    pub getN19Indication, setN19Indication: 0, 0;
    pub getN6Indication, setN6Indication: 1, 1;
}
#[derive(Debug, Clone, PartialEq)]
pub struct OuterHeaderCreation {
    pub desc: OuterHeaderCreationDescription,
    pub teid: Option<u32>,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub port: Option<u16>,
    pub c_tag: Option<[u8; 3]>,
    pub s_tag: Option<[u8; 3]>,
}
impl OuterHeaderCreation {
    pub fn new() -> OuterHeaderCreation {
        OuterHeaderCreation {
            desc: OuterHeaderCreationDescription(0),
            teid: None,
            ipv4: None,
            ipv6: None,
            port: None,
            c_tag: None,
            s_tag: None,
        }
    }
    pub fn gtp_u_ipv4(teid: u32, ip: Ipv4Addr) -> OuterHeaderCreation {
        let mut ohc = Self::new();
        ohc.desc.setGTP_U_UDP_IPv4(1);
        ohc.teid = Some(teid);
        ohc.ipv4 = Some(ip);
        ohc
    }
    /// The first descriptor octet, as handed to the forwarding plane.
    pub fn first_octet(&self) -> u8 {
        (self.desc.0 >> 8) as u8
    }
}
impl Default for OuterHeaderCreation {
    fn default() -> Self {
        Self::new()
    }
}
impl PFCPModel for OuterHeaderCreation {
    const ID: u16 = 84;

    fn encode(&self) -> Vec<u8> {
        let mut length: u16 = 2;
        if self.teid.is_some() {
            length += 4;
        }
        if self.ipv4.is_some() {
            length += 4;
        }
        if self.ipv6.is_some() {
            length += 16;
        }
        if self.port.is_some() {
            length += 2;
        }
        if self.c_tag.is_some() {
            length += 3;
        }
        if self.s_tag.is_some() {
            length += 3;
        }
        let mut result = ie_header(Self::ID, length);
        result.append(&mut self.desc.0.to_be_bytes().to_vec());
        if let Some(teid) = self.teid {
            result.append(&mut teid.to_be_bytes().to_vec());
        }
        if let Some(ip) = self.ipv4 {
            result.append(&mut ip.octets().to_vec());
        }
        if let Some(ip) = self.ipv6 {
            result.append(&mut ip.octets().to_vec());
        }
        if let Some(port) = self.port {
            result.append(&mut port.to_be_bytes().to_vec());
        }
        if let Some(tag) = self.c_tag {
            result.append(&mut tag.to_vec());
        }
        if let Some(tag) = self.s_tag {
            result.append(&mut tag.to_vec());
        }
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        let mut stream = stream;
        let desc = OuterHeaderCreationDescription(u16::from_be_bytes(take::<2>(
            &mut stream,
            "Outer Header Creation Description",
        )?));
        let teid = if desc.getGTP_U_UDP_IPv4() != 0 || desc.getGTP_U_UDP_IPv6() != 0 {
            Some(u32::from_be_bytes(take::<4>(&mut stream, "OHC TEID")?))
        } else {
            None
        };
        let ipv4 = if desc.getGTP_U_UDP_IPv4() != 0 || desc.getUDP_IPv4() != 0 || desc.getIPv4() != 0 {
            Some(Ipv4Addr::from(take::<4>(&mut stream, "OHC IPv4")?))
        } else {
            None
        };
        let ipv6 = if desc.getGTP_U_UDP_IPv6() != 0 || desc.getUDP_IPv6() != 0 || desc.getIPv6() != 0 {
            Some(Ipv6Addr::from(take::<16>(&mut stream, "OHC IPv6")?))
        } else {
            None
        };
        let port = if desc.getUDP_IPv6() != 0 || desc.getUDP_IPv4() != 0 {
            Some(u16::from_be_bytes(take::<2>(&mut stream, "OHC port")?))
        } else {
            None
        };
        let c_tag = if desc.getC_TAG() != 0 {
            Some(take::<3>(&mut stream, "OHC C-TAG")?)
        } else {
            None
        };
        let s_tag = if desc.getS_TAG() != 0 {
            Some(take::<3>(&mut stream, "OHC S-TAG")?)
        } else {
            None
        };
        Ok(Self {
            desc,
            teid,
            ipv4,
            ipv6,
            port,
            c_tag,
            s_tag,
        })
    }
}

/// The ToS/Traffic Class shall be encoded on two octets as an OctetString. \
/// The first octet shall contain the DSCP value in the IPv4 Type-of-Service or the IPv6 Traffic-Class field and the second octet shall contain the ToS/Traffic Class mask field, \
/// which shall be set to "0xFC". See clause 5.3.15 of 3GPPTS29.212[8].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportLevelMarking {
    pub tos_val: u16,
}
impl TransportLevelMarking {
    pub fn to_tos(&self) -> u8 {
        (self.tos_val >> 8) as u8
    }
}
impl PFCPModel for TransportLevelMarking {
    const ID: u16 = 30;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 2);
        result.append(&mut self.tos_val.to_be_bytes().to_vec());
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        expect_length(stream, 2)?;
        let mut stream = stream;
        Ok(Self {
            tos_val: u16::from_be_bytes(take::<2>(&mut stream, "Transport Level Marking")?),
        })
    }
}

bitfield! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct GateStatus(u8);
    u8;
    /// 0 - OPEN, 1 - CLOSED
    pub getDLGate, setDLGate: 1, 0;
    /// 0 - OPEN, 1 - CLOSED
    pub getULGate, setULGate: 3, 2;
}
impl PFCPModel for GateStatus {
    const ID: u16 = 25;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 1);
        result.push(self.0);
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        let mut stream = stream;
        let [flags] = take::<1>(&mut stream, "Gate Status")?;
        Ok(GateStatus(flags))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MBR {
    /// BR fields shall be encoded as kilobits per second (1 kbps = 1000 bps), 40 bits long
    pub ul_mbr: u64,
    /// BR fields shall be encoded as kilobits per second (1 kbps = 1000 bps), 40 bits long
    pub dl_mbr: u64,
}
impl PFCPModel for MBR {
    const ID: u16 = 26;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 10);
        result.append(&mut self.ul_mbr.to_be_bytes()[3..].to_vec());
        result.append(&mut self.dl_mbr.to_be_bytes()[3..].to_vec());
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        let mut stream = stream;
        let mut ul = [0u8; 8];
        ul[3..].copy_from_slice(&take::<5>(&mut stream, "UL MBR")?);
        let mut dl = [0u8; 8];
        dl[3..].copy_from_slice(&take::<5>(&mut stream, "DL MBR")?);
        Ok(MBR {
            ul_mbr: u64::from_be_bytes(ul),
            dl_mbr: u64::from_be_bytes(dl),
        })
    }
}

bitfield! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct QFI(u8);
    u8;
    pub getQFI, setQFI: 5, 0;
}
impl PFCPModel for QFI {
    const ID: u16 = 124;

    fn encode(&self) -> Vec<u8> {
        let mut result = ie_header(Self::ID, 1);
        result.push(self.0);
        result
    }

    fn decode(stream: &[u8]) -> Result<Self, PFCPError>
    where
        Self: Sized,
    {
        let mut stream = stream;
        let [qfi] = take::<1>(&mut stream, "QFI")?;
        Ok(QFI(qfi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pfcp_header() {
        let msg = PFCPHeader::new(50, Some(123456), 1, 20);
        let mut encoded = msg.encode();
        encoded.append(&mut vec![123u8; 20]);
        encoded.append(&mut vec![7u8; 3]);
        let (body, rest, decoded) = PFCPHeader::decode(&encoded).unwrap();
        assert_eq!(msg, decoded);
        assert_eq!(body, vec![123u8; 20]);
        assert_eq!(rest, &[7u8; 3]);
        assert!(decoded.is_request());
    }

    #[test]
    fn test_pfcp_header_truncated() {
        let msg = PFCPHeader::new(1, None, 7, 8);
        let encoded = msg.encode();
        assert!(PFCPHeader::decode(&encoded).is_err());
        assert!(PFCPHeader::decode(&encoded[..3]).is_err());
        // Length claims a SEID that is not there
        let mut flags = PFCPHeaderFlags(0x20);
        flags.setSEID(1);
        assert!(PFCPHeader::decode(&[flags.0, 50, 0, 2, 0, 0]).is_err());
    }

    #[test]
    fn test_pfcp_header_sequence_wraps_to_24_bits() {
        let msg = PFCPHeader::new(1, None, 0x0100_0002, 0);
        assert_eq!(msg.seq, 2);
        assert_eq!(msg.length, 4);
    }

    #[test]
    fn test_node_id_fqdn() {
        let id = NodeID::from_string("smf.example.org");
        assert_eq!(id.node_id_type, NodeIdType::FQDN);
        assert_eq!(id.node_id[0], 3);
        let encoded = id.encode();
        let decoded = NodeID::decode(&encoded[4..]).unwrap();
        assert_eq!(decoded.to_string(), "smf.example.org");
        assert_eq!(decoded.to_ip(), None);

        let id = NodeID::from_string("10.0.0.1");
        assert_eq!(id.to_ip(), Some("10.0.0.1".parse().unwrap()));
        assert_eq!(id.to_string(), "10.0.0.1");
    }

    #[test]
    fn test_node_id_invalid() {
        assert!(NodeID::decode(&[]).is_err());
        assert!(NodeID::decode(&[0, 1, 2]).is_err());
        assert!(NodeID::decode(&[9, 1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_cause_values() {
        assert_eq!(Cause::RequestAccepted as u8, 1);
        assert_eq!(Cause::RequestRejected as u8, 64);
        assert_eq!(Cause::NoEstablishedPFCPAssociation as u8, 72);
        assert_eq!(Cause::RuleCreationModificationFailure as u8, 73);
        assert_eq!(Cause::NoResourcesAvailable as u8, 75);
        assert_eq!(Cause::RedirectionRequested as u8, 78);
        assert_eq!(Cause::decode(&[66]).unwrap(), Cause::MandatoryIEMissing);
        assert!(Cause::decode(&[2]).is_err());
    }

    #[test]
    fn test_recovery_time_stamp() {
        let epoch = chrono::DateTime::<chrono::Utc>::from(std::time::UNIX_EPOCH);
        assert_eq!(RecoveryTimeStamp::new(epoch).timestamp, 2_208_988_800);
    }

    #[test]
    fn test_up_function_features() {
        let mut features = UPFunctionFeatures(0);
        features.setFTUP(1);
        features.setUEIP(1);
        let encoded = features.encode();
        assert_eq!(&encoded[4..], &[0b0001_0000, 0, 0b0000_0100, 0, 0, 0]);
        assert_eq!(UPFunctionFeatures::decode(&encoded[4..]).unwrap(), features);
    }

    #[test]
    fn test_f_teid_choose() {
        let fteid = F_TEID::decode(&[0b0000_1101, 5]).unwrap();
        assert!(fteid.is_choose());
        assert_eq!(fteid.teid, None);
        assert_eq!(fteid.choose_id, Some(5));

        let fteid = F_TEID::decode(&[0b0000_0001, 0, 0, 0, 9, 10, 0, 0, 1]).unwrap();
        assert_eq!(fteid.teid, Some(9));
        assert_eq!(fteid.ipv4, Some(Ipv4Addr::new(10, 0, 0, 1)));

        assert!(F_TEID::decode(&[0b0000_0001, 0, 0, 0, 9, 10]).is_err());
    }

    #[test]
    fn test_ue_ip_address_choose_v4() {
        let ueip = UE_IPAddress::decode(&[0b0001_0110]).unwrap();
        assert_eq!(ueip.flags.getCHV4(), 1);
        assert_eq!(ueip.ipv4, None);
        let ueip = UE_IPAddress::decode(&[0b0000_0110, 1, 1, 1, 1]).unwrap();
        assert_eq!(ueip.ipv4, Some(Ipv4Addr::new(1, 1, 1, 1)));
    }

    #[test]
    fn test_outer_header_creation_fields() {
        let ohc = OuterHeaderCreation::decode(&[0x01, 0x00, 0, 0, 0, 42, 192, 168, 0, 1]).unwrap();
        assert_eq!(ohc.teid, Some(42));
        assert_eq!(ohc.ipv4, Some(Ipv4Addr::new(192, 168, 0, 1)));
        assert_eq!(ohc.first_octet(), 1);

        let mut bytes = vec![0x08, 0x00];
        bytes.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        bytes.extend_from_slice(&2152u16.to_be_bytes());
        let ohc = OuterHeaderCreation::decode(&bytes).unwrap();
        assert_eq!(ohc.teid, None);
        assert_eq!(ohc.ipv6, Some(Ipv6Addr::LOCALHOST));
        assert_eq!(ohc.port, Some(2152));

        assert!(OuterHeaderCreation::decode(&[0x01, 0x00, 0, 0]).is_err());
    }

    #[test]
    fn test_mbr_40_bit() {
        let mbr = MBR {
            ul_mbr: 0xFF_FFFF_FFFF,
            dl_mbr: 100_000,
        };
        let encoded = mbr.encode();
        assert_eq!(encoded.len(), 14);
        assert_eq!(MBR::decode(&encoded[4..]).unwrap(), mbr);
    }

    #[test]
    fn test_sdf_filter_flow_description() {
        let sdf = SDFFilter::from_flow_description("permit out ip from any to assigned");
        let encoded = sdf.encode();
        assert_eq!(SDFFilter::decode(&encoded[4..]).unwrap(), sdf);
        assert!(SDFFilter::decode(&[1, 0, 0, 10, b'p']).is_err());
    }
}
