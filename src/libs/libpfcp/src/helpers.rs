use std::net::IpAddr;

use cidr::IpCidr;

use crate::PFCPError;

/// Protocols a flow description may name, numbered as the forwarding plane expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SdfProtocol {
    Icmp = 0,
    Ip = 1,
    Tcp = 2,
    Udp = 3,
    Icmp6 = 4,
}

impl SdfProtocol {
    fn from_token(token: &str) -> Result<Self, PFCPError> {
        match token {
            "icmp" => Ok(SdfProtocol::Icmp),
            "ip" => Ok(SdfProtocol::Ip),
            "tcp" => Ok(SdfProtocol::Tcp),
            "udp" => Ok(SdfProtocol::Udp),
            "icmp6" | "58" => Ok(SdfProtocol::Icmp6),
            other => Err(PFCPError::new(&format!("Unsupported protocol {} in flow description", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub low: u16,
    pub high: u16,
}

impl PortRange {
    pub const FULL: PortRange = PortRange { low: 0, high: 65535 };
    /// Default for both sides of a flow towards `assigned`.
    pub const ASSIGNED: PortRange = PortRange { low: 1, high: 65535 };

    fn parse(token: &str) -> Result<Self, PFCPError> {
        let mut items = token.splitn(2, '-');
        let low = parse_port(items.next().unwrap_or_default())?;
        let high = match items.next() {
            Some(high) => parse_port(high)?,
            None => low,
        };
        if low > high {
            return Err(PFCPError::new(&format!("Invalid port range {}, low port is greater than high port", token)));
        }
        Ok(PortRange { low, high })
    }
}

fn parse_port(token: &str) -> Result<u16, PFCPError> {
    let port = token
        .parse::<u32>()
        .map_err(|e| PFCPError::new(&format!("Invalid port {}: {}", token, e)))?;
    if port > 65535 {
        return Err(PFCPError::new(&format!("Port {} exceeds 65535", port)));
    }
    Ok(port as u16)
}

/// One side of a flow; `ip` is `None` for `any` and `assigned`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdfEndpoint {
    pub ip: Option<IpCidr>,
    pub ports: PortRange,
}

/// A parsed `permit out` IPFilterRule as carried in the Flow Description of an SDF Filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdfFilter {
    pub protocol: SdfProtocol,
    pub src: SdfEndpoint,
    pub dst: SdfEndpoint,
}

impl SdfFilter {
    /// Parses `permit out {proto} from {src}[/{mask}] [ports] to {dst}[/{mask}] [ports]`.
    pub fn parse(flow_desc: &str) -> Result<Self, PFCPError> {
        let items = flow_desc.split_whitespace().collect::<Vec<_>>();
        let mut items = items.as_slice();
        match items {
            ["permit", "out", rest @ ..] => items = rest,
            [action, ..] if *action != "permit" => {
                return Err(PFCPError::new(&format!("Unsupported action {} in flow description", action)));
            }
            _ => return Err(PFCPError::new(&format!("Unsupported flow description {}", flow_desc))),
        }
        let (protocol, rest) = match items {
            [proto, "from", rest @ ..] => (SdfProtocol::from_token(proto)?, rest),
            _ => return Err(PFCPError::new(&format!("Expect '{{protocol}} from' in flow description {}", flow_desc))),
        };
        let (mut src, rest) = Self::parse_endpoint(rest, false)?;
        let rest = match rest {
            ["to", rest @ ..] => rest,
            _ => return Err(PFCPError::new(&format!("Expect 'to' in flow description {}", flow_desc))),
        };
        let to_assigned = matches!(rest, ["assigned", ..]);
        let (dst, rest) = Self::parse_endpoint(rest, true)?;
        if to_assigned && src.ports == PortRange::FULL {
            src.ports = PortRange::ASSIGNED;
        }
        if !rest.is_empty() {
            return Err(PFCPError::new(&format!("Unexpected trailing {:?} in flow description", rest)));
        }
        Ok(SdfFilter { protocol, src, dst })
    }

    fn parse_endpoint<'a, 'b>(items: &'a [&'b str], destination: bool) -> Result<(SdfEndpoint, &'a [&'b str]), PFCPError> {
        let (addr, mut rest) = match items.split_first() {
            Some((addr, rest)) => (*addr, rest),
            None => return Err(PFCPError::new("Missing address in flow description")),
        };
        let (ip, mut ports) = match addr {
            "any" => (None, PortRange::FULL),
            "assigned" if destination => (None, PortRange::ASSIGNED),
            _ => (Some(parse_masked_ip(addr)?), PortRange::FULL),
        };
        if let Some((token, tail)) = rest.split_first() {
            if *token != "to" {
                ports = PortRange::parse(token)?;
                rest = tail;
            }
        }
        Ok((SdfEndpoint { ip, ports }, rest))
    }
}

fn parse_masked_ip(token: &str) -> Result<IpCidr, PFCPError> {
    let mut items = token.splitn(2, '/');
    let addr = items.next().unwrap_or_default();
    let ip = addr
        .parse::<IpAddr>()
        .map_err(|e| PFCPError::new(&format!("Invalid address {}: {}", addr, e)))?;
    let max_len = if ip.is_ipv4() { 32 } else { 128 };
    let len = match items.next() {
        Some(mask) => mask
            .parse::<u8>()
            .map_err(|e| PFCPError::new(&format!("Invalid prefix length {}: {}", mask, e)))?,
        None => max_len,
    };
    if len > max_len {
        return Err(PFCPError::new(&format!("Prefix length {} too long for {}", len, ip)));
    }
    let network = match ip {
        IpAddr::V4(v4) => {
            let mask = u32::MAX.checked_shl(32 - len as u32).unwrap_or(0);
            IpAddr::V4((u32::from(v4) & mask).into())
        }
        IpAddr::V6(v6) => {
            let mask = u128::MAX.checked_shl(128 - len as u32).unwrap_or(0);
            IpAddr::V6((u128::from(v6) & mask).into())
        }
    };
    IpCidr::new(network, len).map_err(|e| PFCPError::new(&format!("Invalid network {}: {}", token, e)))
}
