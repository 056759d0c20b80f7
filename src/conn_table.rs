//! Fixed capacity connection table with admission control
//!
//! Slots `[0, len)` are active, there are no holes. Removing slot `i` moves
//! the last active slot into `i`, so an index held across a removal other
//! than of the last slot no longer names the same connection. The
//! registration array holding interest and readiness is compacted together
//! with the slots.
//!
//! Scratch buffers belong to the slots, not to the connections: they are
//! allocated once with the table and reused by every connection that lands
//! in the slot.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::IpAddr;
use std::os::fd::BorrowedFd;

use nix::poll::PollFlags;

use crate::buffer::ScratchBuffer;
use crate::common::LimitsConfig;
use crate::connection::{Conn, Interest, Progress};
use crate::log;
use crate::transport::Session;

struct Slot<S> {
    scratch: ScratchBuffer,
    conn: Option<Conn<S>>,
}

/// Interest to poll for and readiness reported by the last poll
#[derive(Clone, Copy, Debug)]
pub(crate) struct Registration {
    pub(crate) interest: Interest,
    pub(crate) revents: PollFlags,
}

impl Default for Registration {
    fn default() -> Self {
        Self {
            interest: Interest::Read,
            revents: PollFlags::empty(),
        }
    }
}

pub(crate) struct ConnTable<S> {
    slots: Vec<Slot<S>>,
    registry: Vec<Registration>,
    len: usize,
}

impl<S> std::fmt::Debug for ConnTable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnTable")
            .field("capacity", &self.slots.len())
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl<S: Session> ConnTable<S> {
    /// Allocates every slot and its scratch buffer up front.
    pub(crate) fn new(limits: LimitsConfig) -> Self {
        let slots = (0..limits.max_conns)
            .map(|_| Slot {
                scratch: ScratchBuffer::with_capacity(limits.scratch_size),
                conn: None,
            })
            .collect();
        Self {
            slots,
            registry: vec![Registration::default(); limits.max_conns],
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Makes room for one more connection, evicting one if the table is
    /// full. False if the table is full and no connection can be evicted.
    pub(crate) fn make_room(&mut self) -> bool {
        if !self.is_full() {
            return true;
        }
        match self.select_victim() {
            Some(victim) => {
                if let Some(conn) = &self.slots[victim].conn {
                    log::info!("{}: evicted in {:?}", conn.peer(), conn.phase());
                }
                self.remove(victim);
                true
            }
            None => false,
        }
    }

    /// Installs `conn` behind the last active slot, in the request phase.
    ///
    /// # Errors
    ///
    /// The table is full, `conn` is handed back.
    pub(crate) fn insert(&mut self, conn: Conn<S>) -> Result<usize, Conn<S>> {
        if self.is_full() {
            return Err(conn);
        }
        let idx = self.len;
        let slot = &mut self.slots[idx];
        slot.scratch.clear();
        slot.conn = Some(conn);
        self.registry[idx] = Registration::default();
        self.len += 1;
        Ok(idx)
    }

    /// Closes the connection in slot `idx` and moves the last active slot
    /// into its place.
    pub(crate) fn remove(&mut self, idx: usize) {
        if idx >= self.len {
            return;
        }
        self.len -= 1;
        self.slots.swap(idx, self.len);
        self.registry.swap(idx, self.len);

        // socket, body file and TLS session are released here
        let slot = &mut self.slots[self.len];
        if let Some(conn) = slot.conn.take() {
            log::info!("{}: closing", conn.peer());
        }
        slot.scratch.clear();
        self.registry[self.len] = Registration::default();
    }

    /// Removes every connection, last slot first.
    pub(crate) fn clear(&mut self) {
        while self.len > 0 {
            self.remove(self.len - 1);
        }
    }

    pub(crate) fn get_mut(
        &mut self,
        idx: usize,
    ) -> Option<(&mut Conn<S>, &mut ScratchBuffer, &mut Registration)> {
        if idx >= self.len {
            return None;
        }
        let slot = &mut self.slots[idx];
        let conn = slot.conn.as_mut()?;
        Some((conn, &mut slot.scratch, &mut self.registry[idx]))
    }

    /// Descriptors and registrations of the active slots, in table order
    pub(crate) fn registrations(&self) -> impl Iterator<Item = (BorrowedFd<'_>, Interest)> {
        self.slots[..self.len]
            .iter()
            .zip(&self.registry)
            .filter_map(|(slot, reg)| {
                slot.conn
                    .as_ref()
                    .map(|conn| (conn.session().as_fd(), reg.interest))
            })
    }

    /// Stores poll results for the active slots, in table order.
    pub(crate) fn set_revents<I: IntoIterator<Item = PollFlags>>(&mut self, revents: I) {
        for (reg, flags) in self.registry[..self.len].iter_mut().zip(revents) {
            reg.revents = flags;
        }
    }

    fn select_victim(&self) -> Option<usize> {
        let candidates: Vec<Candidate> = self.slots[..self.len]
            .iter()
            .filter_map(|slot| {
                slot.conn.as_ref().map(|conn| Candidate {
                    addr: conn.peer().ip(),
                    progress: conn.progress(&slot.scratch),
                })
            })
            .collect();
        select_victim(&candidates)
    }
}

/// Eviction view of one active slot
#[derive(Clone, Copy, Debug)]
pub(crate) struct Candidate {
    pub(crate) addr: IpAddr,
    pub(crate) progress: Progress,
}

/// Picks the connection to evict: the representative of the largest group
/// of connections sharing a peer address.
///
/// Inside a group the least progressed phase is chosen; within the request
/// phase the one with the fewest bytes received, within the response phase
/// the one with the most bytes unsent, within the payload phase the one with
/// the most file bytes left. Ties go to the earlier slot and the group whose
/// first member comes first. `None` when no address occurs twice.
pub(crate) fn select_victim(candidates: &[Candidate]) -> Option<usize> {
    struct Group {
        size: usize,
        victim: usize,
    }

    let mut index: HashMap<IpAddr, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for (i, candidate) in candidates.iter().enumerate() {
        match index.entry(candidate.addr) {
            Entry::Occupied(entry) => {
                let group = &mut groups[*entry.get()];
                group.size += 1;
                if evicts_before(candidate.progress, candidates[group.victim].progress) {
                    group.victim = i;
                }
            }
            Entry::Vacant(entry) => {
                let _ = entry.insert(groups.len());
                groups.push(Group { size: 1, victim: i });
            }
        }
    }

    let mut best: Option<&Group> = None;
    for group in groups.iter().filter(|group| group.size >= 2) {
        if best.map_or(true, |best| group.size > best.size) {
            best = Some(group);
        }
    }
    best.map(|group| group.victim)
}

/// True if `a` is strictly preferred over `b` as eviction victim.
fn evicts_before(a: Progress, b: Progress) -> bool {
    fn rank(p: Progress) -> u8 {
        match p {
            Progress::Request(_) => 0,
            Progress::Response(_) => 1,
            Progress::Payload(_) => 2,
        }
    }

    match (a, b) {
        (Progress::Request(a), Progress::Request(b)) => a < b,
        (Progress::Response(a), Progress::Response(b)) => a > b,
        (Progress::Payload(a), Progress::Payload(b)) => a > b,
        _ => rank(a) < rank(b),
    }
}
