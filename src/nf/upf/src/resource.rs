use std::{
	collections::{HashMap, VecDeque},
	marker::PhantomData,
	net::{Ipv4Addr, Ipv6Addr},
	sync::Mutex,
};

use cidr::{Ipv4Cidr, Ipv6Cidr};
use log::debug;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
	#[error("no free ip available")]
	NoFreeIp,
	#[error("no free TEID available")]
	NoFreeTeid,
	#[error("no IPv6 pool is configured")]
	NoIpv6Pool,
	#[error("resource manager lock poisoned")]
	Poisoned,
}

/// Hands out `first..end` in order, then the values given back, oldest first.
/// Nothing is enumerated up front, so a pool may span any prefix length.
struct Cursor {
	next: u128,
	end: u128,
	released: VecDeque<u128>,
}

impl Cursor {
	fn new(first: u128, count: u128) -> Cursor {
		Cursor { next: first, end: first.saturating_add(count), released: VecDeque::new() }
	}

	fn take(&mut self) -> Option<u128> {
		if self.next < self.end {
			let value = self.next;
			self.next += 1;
			return Some(value);
		}
		self.released.pop_front()
	}

	fn give_back(&mut self, value: u128) {
		self.released.push_back(value);
	}

	fn remaining(&self) -> usize {
		usize::try_from(self.end - self.next)
			.unwrap_or(usize::MAX)
			.saturating_add(self.released.len())
	}
}

trait PoolAddress: Copy {
	fn at(base: u128, offset: u128) -> Self;
}

impl PoolAddress for Ipv4Addr {
	fn at(base: u128, offset: u128) -> Self {
		Ipv4Addr::from((base + offset) as u32)
	}
}

impl PoolAddress for Ipv6Addr {
	fn at(base: u128, offset: u128) -> Self {
		Ipv6Addr::from(base + offset)
	}
}

/// Addresses of one network plus the address held by each session.
struct AddressPool<A> {
	base: u128,
	offsets: Cursor,
	busy: HashMap<u64, u128>,
	_addr: PhantomData<A>,
}

impl<A: PoolAddress> AddressPool<A> {
	/// Point-to-point and host networks have no network address to skip.
	fn new(base: u128, host_bits: u32) -> AddressPool<A> {
		let size = 1u128.checked_shl(host_bits).unwrap_or(u128::MAX);
		let (first, count) = if host_bits > 1 { (1, size - 1) } else { (0, size) };
		AddressPool { base, offsets: Cursor::new(first, count), busy: HashMap::new(), _addr: PhantomData }
	}

	fn allocate(&mut self, session: u64) -> Option<A> {
		if let Some(offset) = self.busy.get(&session) {
			return Some(A::at(self.base, *offset));
		}
		let offset = self.offsets.take()?;
		self.busy.insert(session, offset);
		Some(A::at(self.base, offset))
	}

	fn release(&mut self, session: u64) -> Option<A> {
		let offset = self.busy.remove(&session)?;
		self.offsets.give_back(offset);
		Some(A::at(self.base, offset))
	}
}

fn ipv4_pool(cidr: &Ipv4Cidr) -> AddressPool<Ipv4Addr> {
	AddressPool::new(u32::from(cidr.first_address()) as u128, 32 - cidr.network_length() as u32)
}

fn ipv6_pool(cidr: &Ipv6Cidr) -> AddressPool<Ipv6Addr> {
	AddressPool::new(u128::from(cidr.first_address()), 128 - cidr.network_length() as u32)
}

/// TEIDs `1..=size`; a session holds one TEID per rule.
struct TeidPool {
	ids: Cursor,
	busy: HashMap<u64, HashMap<u16, u32>>,
}

impl TeidPool {
	fn new(size: u32) -> TeidPool {
		TeidPool { ids: Cursor::new(1, size as u128), busy: HashMap::new() }
	}

	fn allocate(&mut self, session: u64, rule: u16) -> Option<u32> {
		let rules = self.busy.entry(session).or_default();
		if let Some(teid) = rules.get(&rule) {
			return Some(*teid);
		}
		match self.ids.take() {
			Some(teid) => {
				rules.insert(rule, teid as u32);
				Some(teid as u32)
			}
			None => {
				if rules.is_empty() {
					self.busy.remove(&session);
				}
				None
			}
		}
	}

	fn release(&mut self, session: u64) -> usize {
		match self.busy.remove(&session) {
			Some(rules) => {
				let mut teids = rules.into_values().collect::<Vec<_>>();
				teids.sort_unstable();
				for teid in teids.iter() {
					self.ids.give_back(*teid as u128);
				}
				teids.len()
			}
			None => 0,
		}
	}
}

/// UE address and local TEID allocation, keyed by a per-session resource key.
pub struct ResourceManager {
	ipv4: Mutex<AddressPool<Ipv4Addr>>,
	ipv6: Option<Mutex<AddressPool<Ipv6Addr>>>,
	teids: Mutex<TeidPool>,
}

impl ResourceManager {
	pub fn new(ipv4_pool_cidr: &Ipv4Cidr, ipv6_pool_cidr: Option<&Ipv6Cidr>, teid_pool: u32) -> ResourceManager {
		ResourceManager {
			ipv4: Mutex::new(ipv4_pool(ipv4_pool_cidr)),
			ipv6: ipv6_pool_cidr.map(|cidr| Mutex::new(ipv6_pool(cidr))),
			teids: Mutex::new(TeidPool::new(teid_pool)),
		}
	}

	/// Repeated calls for one session return the same address.
	pub fn allocate_ipv4(&self, session: u64) -> Result<Ipv4Addr, ResourceError> {
		let mut pool = self.ipv4.lock().map_err(|_| ResourceError::Poisoned)?;
		let ip = pool.allocate(session).ok_or(ResourceError::NoFreeIp)?;
		debug!("Session key {} holds UE IP {}", session, ip);
		Ok(ip)
	}

	pub fn allocate_ipv6(&self, session: u64) -> Result<Ipv6Addr, ResourceError> {
		let pool = self.ipv6.as_ref().ok_or(ResourceError::NoIpv6Pool)?;
		let mut pool = pool.lock().map_err(|_| ResourceError::Poisoned)?;
		let ip = pool.allocate(session).ok_or(ResourceError::NoFreeIp)?;
		debug!("Session key {} holds UE IP {}", session, ip);
		Ok(ip)
	}

	/// Returns the session's addresses to the tail of their pools.
	pub fn release_ip(&self, session: u64) -> Result<(), ResourceError> {
		if let Some(ip) = self.ipv4.lock().map_err(|_| ResourceError::Poisoned)?.release(session) {
			debug!("Session key {} released UE IP {}", session, ip);
		}
		if let Some(pool) = self.ipv6.as_ref() {
			if let Some(ip) = pool.lock().map_err(|_| ResourceError::Poisoned)?.release(session) {
				debug!("Session key {} released UE IP {}", session, ip);
			}
		}
		Ok(())
	}

	pub fn allocate_teid(&self, session: u64, rule: u16) -> Result<u32, ResourceError> {
		let mut pool = self.teids.lock().map_err(|_| ResourceError::Poisoned)?;
		pool.allocate(session, rule).ok_or(ResourceError::NoFreeTeid)
	}

	/// Frees every TEID held by the session.
	pub fn release_teid(&self, session: u64) -> Result<(), ResourceError> {
		let released = self.teids.lock().map_err(|_| ResourceError::Poisoned)?.release(session);
		if released > 0 {
			debug!("Session key {} released {} TEIDs", session, released);
		}
		Ok(())
	}

	pub fn free_ipv4_count(&self) -> usize {
		self.ipv4.lock().map(|p| p.offsets.remaining()).unwrap_or(0)
	}

	pub fn free_teid_count(&self) -> usize {
		self.teids.lock().map(|p| p.ids.remaining()).unwrap_or(0)
	}
}
