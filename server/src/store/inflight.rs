use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::Fingerprint;

type Slots = Arc<Mutex<HashMap<Fingerprint, Slot>>>;

struct Slot {
    lock: Arc<AsyncMutex<()>>,
    // Holder plus waiters, counted from before they start waiting.
    users: usize,
}

/// Per-fingerprint exclusion for requests executing in this process.
///
/// Slots are created on first claim and removed once the last holder or
/// waiter lets go, so the table only ever holds fingerprints in flight.
#[derive(Clone, Default)]
pub struct InflightClaims {
    slots: Slots,
}

impl InflightClaims {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn claim(&self, fingerprint: &Fingerprint) -> ClaimGuard {
        let (lock, registration) = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(fingerprint.clone()).or_insert_with(|| Slot {
                lock: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            let registration = Registration {
                fingerprint: fingerprint.clone(),
                slots: Arc::clone(&self.slots),
            };
            (Arc::clone(&slot.lock), registration)
        };
        // Cancelled while waiting: `registration` drops here and gives the slot back.
        let guard = lock.lock_owned().await;
        ClaimGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.slots.lock().len()
    }
}

/// Held while a keyed request executes; dropping it (including on
/// cancellation) lets the next waiter in.
pub struct ClaimGuard {
    // Field order matters: the lock is released before the slot is given back.
    _guard: OwnedMutexGuard<()>,
    _registration: Registration,
}

struct Registration {
    fingerprint: Fingerprint,
    slots: Slots,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&self.fingerprint) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(&self.fingerprint);
            }
        }
    }
}
