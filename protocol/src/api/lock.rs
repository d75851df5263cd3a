//! Address Lock Manager.
//!
//! Serializes the nonce-allocation-and-sign window per sender. Without it,
//! two concurrent intents from the same address could both read the same
//! "next nonce" from the pool before either transaction lands there.
//!
//! Locks are created on first use and never removed. The table grows with the
//! number of distinct local senders, which is bounded by the keystore.

use std::sync::Arc;

use alloy_primitives::Address;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct AddrLocker {
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

/// Exclusive hold on one address. Released on drop, including on `?` exits.
#[derive(Debug)]
pub struct AddrGuard {
    address: Address,
    _guard: OwnedMutexGuard<()>,
}

impl AddrGuard {
    pub fn address(&self) -> Address {
        self.address
    }
}

impl AddrLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `address` is free and takes it.
    pub async fn lock(&self, address: Address) -> AddrGuard {
        let mutex = self.locks.entry(address).or_default().clone();
        AddrGuard {
            address,
            _guard: mutex.lock_owned().await,
        }
    }

    /// Number of addresses ever locked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_address_is_exclusive() {
        let locker = Arc::new(AddrLocker::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let addr = Address::repeat_byte(1);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let (locker, inside, peak) = (locker.clone(), inside.clone(), peak.clone());
            tasks.push(tokio::spawn(async move {
                let _guard = locker.lock(addr).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(locker.len(), 1);
    }

    #[tokio::test]
    async fn different_addresses_do_not_block() {
        let locker = AddrLocker::new();
        let a = locker.lock(Address::repeat_byte(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locker.lock(Address::repeat_byte(2)))
            .await
            .expect("second address should not wait");
        assert_ne!(a.address(), b.address());
        assert_eq!(locker.len(), 2);
    }

    #[tokio::test]
    async fn released_on_drop() {
        let locker = AddrLocker::new();
        let addr = Address::repeat_byte(3);
        let result: Result<(), &str> = async {
            let _guard = locker.lock(addr).await;
            Err("bail out")
        }
        .await;
        assert!(result.is_err());
        tokio::time::timeout(Duration::from_millis(100), locker.lock(addr))
            .await
            .expect("lock should have been released");
    }
}
