use std::{
	collections::HashSet,
	net::TcpListener,
	ops::Range,
	sync::{Arc, Mutex},
};

use crate::error::{Result, SandboxError};

/// Tracks which ports in the configured range currently have a sandbox
/// bound to them. Probing "is this port free" opens and immediately drops
/// a loopback `TcpListener` before the port is ever handed to the spawned
/// child, closing the window between "looks free" and "actually bound" a
/// plain counter would leave open.
#[derive(Clone)]
pub struct PortPool {
	range: Range<u16>,
	leased: Arc<Mutex<HashSet<u16>>>,
}

impl PortPool {
	pub fn new(range: Range<u16>) -> Self {
		Self { range, leased: Arc::new(Mutex::new(HashSet::new())) }
	}

	/// Leases the first free port in the range. Freed automatically when
	/// the returned guard drops.
	pub fn lease(&self) -> Result<SandboxPortLease> {
		let mut leased = self.leased.lock().unwrap();
		for port in self.range.clone() {
			if leased.contains(&port) {
				continue;
			}
			if TcpListener::bind(("127.0.0.1", port)).is_ok() {
				leased.insert(port);
				return Ok(SandboxPortLease { port, leased: self.leased.clone() });
			}
		}
		Err(SandboxError::NoFreePort)
	}
}

pub struct SandboxPortLease {
	port: u16,
	leased: Arc<Mutex<HashSet<u16>>>,
}

impl SandboxPortLease {
	pub fn port(&self) -> u16 {
		self.port
	}
}

impl Drop for SandboxPortLease {
	fn drop(&mut self) {
		self.leased.lock().unwrap().remove(&self.port);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn overlapping_leases_are_prevented_by_free_port_probing() {
		let pool = PortPool::new(19_500..19_503);
		let a = pool.lease().unwrap();
		let b = pool.lease().unwrap();
		assert_ne!(a.port(), b.port());
	}

	#[test]
	fn releasing_a_lease_makes_the_port_available_again() {
		let pool = PortPool::new(19_600..19_601);
		let port = {
			let lease = pool.lease().unwrap();
			lease.port()
		};
		let reused = pool.lease().unwrap();
		assert_eq!(reused.port(), port);
	}

	#[test]
	fn exhausted_range_fails_cleanly() {
		let pool = PortPool::new(19_700..19_701);
		let _held = pool.lease().unwrap();
		assert!(matches!(pool.lease(), Err(SandboxError::NoFreePort)));
	}
}
