//! Room bookkeeping.
//!
//! The room table is the relay's only shared mutable state. The lock is
//! held for slot claims, parking, pairing, and sweeping; never while bytes
//! are being forwarded.
//!
//! Joining is split into `claim` (take the slot or learn it is busy) and
//! `settle` (park the connection, or collect the waiting partner), so the
//! join reply can be written to the socket between the two without holding
//! the lock across I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Coarse per-room activity clock, touched by the forwarders without a lock
pub struct Activity {
    started: Instant,
    last: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last: AtomicU64::new(0),
        }
    }

    /// Record traffic now
    pub fn touch(&self) {
        self.last
            .store(self.started.elapsed().as_secs(), Ordering::Relaxed);
    }

    /// Time since the last recorded traffic
    #[must_use]
    pub fn idle(&self) -> Duration {
        let elapsed = self.started.elapsed().as_secs();
        Duration::from_secs(elapsed.saturating_sub(self.last.load(Ordering::Relaxed)))
    }
}

/// A connection parked in a room, waiting for its partner.
///
/// `leftover` holds any bytes the peer sent past its banner frame; they
/// must be delivered to the partner ahead of freshly read traffic.
pub struct ParkedPeer {
    /// The peer's socket
    pub stream: TcpStream,
    /// Bytes already received beyond the banner
    pub leftover: Vec<u8>,
}

struct Room {
    occupied: [bool; 2],
    waiting: Option<ParkedPeer>,
    activity: Arc<Activity>,
}

/// A successfully claimed slot, to be settled or released
pub struct Reservation {
    room: String,
    role: u8,
}

/// Outcome of a slot claim
pub enum Claim {
    /// Slot taken; settle or release the reservation
    Reserved(Reservation),
    /// The (room, role) slot is already occupied
    Busy,
}

/// Outcome of settling a reservation
pub enum Settled {
    /// First in the room; the connection is parked until the partner joins
    Parked,
    /// Partner was waiting; forwarding can begin
    Paired {
        /// The connection just settled, returned to its handler
        mine: ParkedPeer,
        /// The partner's parked connection
        partner: ParkedPeer,
        /// Shared activity clock for the room
        activity: Arc<Activity>,
    },
}

/// The relay's room table
#[derive(Default)]
pub struct RoomTable {
    rooms: Mutex<HashMap<String, Room>>,
}

impl RoomTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the (room, role) slot, creating the room if needed
    pub fn claim(&self, room: &str, role: u8) -> Claim {
        let mut rooms = self.rooms.lock().expect("room table lock poisoned");
        let entry = rooms.entry(room.to_string()).or_insert_with(|| Room {
            occupied: [false, false],
            waiting: None,
            activity: Arc::new(Activity::new()),
        });
        if entry.occupied[role as usize] {
            return Claim::Busy;
        }
        entry.occupied[role as usize] = true;
        entry.activity.touch();
        Claim::Reserved(Reservation {
            room: room.to_string(),
            role,
        })
    }

    /// Park the claimed connection, or pair it with the waiting partner
    pub fn settle(&self, reservation: Reservation, peer: ParkedPeer) -> Settled {
        let mut rooms = self.rooms.lock().expect("room table lock poisoned");
        let entry = rooms.entry(reservation.room).or_insert_with(|| {
            // The room was swept between claim and settle; start it over.
            let mut occupied = [false, false];
            occupied[reservation.role as usize] = true;
            Room {
                occupied,
                waiting: None,
                activity: Arc::new(Activity::new()),
            }
        });
        entry.activity.touch();
        match entry.waiting.take() {
            Some(partner) => Settled::Paired {
                mine: peer,
                partner,
                activity: entry.activity.clone(),
            },
            None => {
                entry.waiting = Some(peer);
                Settled::Parked
            }
        }
    }

    /// Give back a claimed slot that never settled
    pub fn release(&self, reservation: Reservation) {
        let mut rooms = self.rooms.lock().expect("room table lock poisoned");
        if let Some(entry) = rooms.get_mut(&reservation.room) {
            entry.occupied[reservation.role as usize] = false;
            if entry.occupied == [false, false] && entry.waiting.is_none() {
                rooms.remove(&reservation.room);
            }
        }
    }

    /// Tear down a room once forwarding ends
    pub fn leave(&self, room: &str) {
        let mut rooms = self.rooms.lock().expect("room table lock poisoned");
        rooms.remove(room);
    }

    /// Delete rooms idle past `idle_max`, closing any parked connections.
    /// Returns how many were removed.
    pub fn sweep(&self, idle_max: Duration) -> usize {
        let mut rooms = self.rooms.lock().expect("room table lock poisoned");
        let before = rooms.len();
        rooms.retain(|room, entry| {
            let keep = entry.activity.idle() < idle_max;
            if !keep {
                tracing::debug!(room = %room, "sweeping idle room");
            }
            keep
        });
        before - rooms.len()
    }

    /// Number of live rooms
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.lock().expect("room table lock poisoned").len()
    }

    /// True when no rooms exist
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
