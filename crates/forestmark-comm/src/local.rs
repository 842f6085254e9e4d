//! In-process rank groups
//!
//! [`LocalWorld`] runs one thread per rank. Ranks share nothing but a
//! mailbox matrix and a rendezvous; all data moves through
//! [`Communicator::exchange`].

use crate::communicator::Communicator;
use crate::error::CommError;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// A group of ranks executed as threads of the current process
#[derive(Debug, Clone, Copy)]
pub struct LocalWorld {
    size: usize,
}

impl LocalWorld {
    /// Create a world of `size` ranks
    pub fn new(size: usize) -> Result<Self, CommError> {
        if size == 0 {
            return Err(CommError::EmptyGroup);
        }
        Ok(Self { size })
    }

    /// Number of ranks
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `program` once per rank and collect the per-rank results
    ///
    /// Results are indexed by rank. If any rank panics, the remaining ranks
    /// are released from their collectives and the first panicked rank is
    /// reported.
    pub fn run<T, F>(&self, program: F) -> Result<Vec<T>, CommError>
    where
        F: Fn(&LocalComm) -> T + Sync,
        T: Send,
    {
        let group = Arc::new(Group::new(self.size));
        let program = &program;

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.size);
            for rank in 0..self.size {
                let comm = LocalComm {
                    rank,
                    group: Arc::clone(&group),
                };
                // a failed spawn drops `comm`, which releases the started ranks
                let handle = thread::Builder::new()
                    .name(format!("rank-{rank}"))
                    .spawn_scoped(scope, move || program(&comm))
                    .map_err(|source| CommError::Spawn { rank, source });
                handles.push(handle);
            }

            let mut results = Vec::with_capacity(self.size);
            let mut failure = None;
            for (rank, handle) in handles.into_iter().enumerate() {
                match handle {
                    Ok(handle) => match handle.join() {
                        Ok(value) => results.push(value),
                        Err(_) => {
                            warn!(rank, "rank panicked");
                            failure.get_or_insert(CommError::RankPanicked { rank });
                        }
                    },
                    Err(e) => {
                        failure.get_or_insert(e);
                    }
                }
            }

            match failure {
                Some(e) => Err(e),
                None => Ok(results),
            }
        })
    }
}

/// Communicator handed to each rank of a [`LocalWorld`]
///
/// Dropping it (normally or while unwinding) removes the rank from the
/// group; peers blocked in a collective then fail instead of waiting forever.
#[derive(Debug)]
pub struct LocalComm {
    rank: usize,
    group: Arc<Group>,
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.size
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.group.rendezvous.wait()?;
        self.group.check_poison()
    }

    fn exchange(&self, outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, CommError> {
        let size = self.group.size;
        if outgoing.len() == size {
            let mut mailbox = self.group.mailbox.lock();
            for (dst, payload) in outgoing.into_iter().enumerate() {
                mailbox[dst][self.rank] = Some(payload);
            }
        } else {
            warn!(
                rank = self.rank,
                expected = size,
                actual = outgoing.len(),
                "malformed exchange contribution"
            );
            self.group.poisoned.store(true, Ordering::SeqCst);
        }

        self.group.rendezvous.wait()?;
        let incoming: Vec<Vec<u8>> = {
            let mut mailbox = self.group.mailbox.lock();
            mailbox[self.rank]
                .iter_mut()
                .map(|slot| slot.take().unwrap_or_default())
                .collect()
        };
        // nobody may refill the mailbox before every rank has emptied its row
        self.group.rendezvous.wait()?;

        self.group.check_poison()?;
        Ok(incoming)
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        debug!(rank = self.rank, "rank leaving group");
        self.group.rendezvous.depart();
    }
}

/// State shared by all ranks of one world
#[derive(Debug)]
struct Group {
    size: usize,
    /// `mailbox[dst][src]`
    mailbox: Mutex<Vec<Vec<Option<Vec<u8>>>>>,
    rendezvous: Rendezvous,
    poisoned: AtomicBool,
}

impl Group {
    fn new(size: usize) -> Self {
        Self {
            size,
            mailbox: Mutex::new(vec![vec![None; size]; size]),
            rendezvous: Rendezvous::new(size),
            poisoned: AtomicBool::new(false),
        }
    }

    fn check_poison(&self) -> Result<(), CommError> {
        if self.poisoned.load(Ordering::SeqCst) {
            Err(CommError::Poisoned)
        } else {
            Ok(())
        }
    }
}

/// Reusable barrier that breaks when a participant leaves
#[derive(Debug)]
struct Rendezvous {
    size: usize,
    state: Mutex<RendezvousState>,
    released: Condvar,
}

#[derive(Debug, Default)]
struct RendezvousState {
    arrived: usize,
    generation: u64,
    departed: usize,
    broken: bool,
}

impl Rendezvous {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(RendezvousState::default()),
            released: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<(), CommError> {
        let mut state = self.state.lock();
        // a departed rank will never arrive
        if state.broken || state.departed > 0 {
            return Err(CommError::PeerDeparted);
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
            return Ok(());
        }

        while state.generation == generation && !state.broken {
            self.released.wait(&mut state);
        }
        if state.generation == generation {
            Err(CommError::PeerDeparted)
        } else {
            Ok(())
        }
    }

    fn depart(&self) {
        let mut state = self.state.lock();
        state.departed += 1;
        if state.arrived > 0 {
            state.broken = true;
            self.released.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::ReduceOp;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_world_rejected() {
        assert!(matches!(LocalWorld::new(0), Err(CommError::EmptyGroup)));
    }

    #[test]
    fn ranks_see_their_identity() {
        let world = LocalWorld::new(4).unwrap();
        let ids = world.run(|comm| (comm.rank(), comm.size())).unwrap();
        assert_eq!(ids, vec![(0, 4), (1, 4), (2, 4), (3, 4)]);
    }

    #[test]
    fn exchange_routes_by_destination() {
        let world = LocalWorld::new(3).unwrap();
        let received = world
            .run(|comm| {
                let outgoing = (0..comm.size())
                    .map(|dst| vec![comm.rank() as u8, dst as u8])
                    .collect();
                comm.exchange(outgoing).unwrap()
            })
            .unwrap();

        for (dst, incoming) in received.iter().enumerate() {
            for (src, payload) in incoming.iter().enumerate() {
                assert_eq!(payload, &vec![src as u8, dst as u8]);
            }
        }
    }

    #[test]
    fn repeated_collectives_stay_in_lockstep() {
        let world = LocalWorld::new(4).unwrap();
        let totals = world
            .run(|comm| {
                (0..50u64)
                    .map(|round| {
                        comm.barrier().unwrap();
                        comm.all_reduce_u64(round + comm.rank() as u64, ReduceOp::Sum)
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap();

        let expected: Vec<u64> = (0..50u64).map(|round| 4 * round + 6).collect();
        for per_rank in totals {
            assert_eq!(per_rank, expected);
        }
    }

    #[test]
    fn reduce_only_reaches_root() {
        let world = LocalWorld::new(3).unwrap();
        let maxima = world
            .run(|comm| comm.reduce_f64(comm.rank() as f64 * 1.5, ReduceOp::Max, 0).unwrap())
            .unwrap();
        assert_eq!(maxima, vec![Some(3.0), None, None]);
    }

    #[test]
    fn exclusive_scan_offsets() {
        let world = LocalWorld::new(4).unwrap();
        let offsets = world
            .run(|comm| comm.exclusive_scan_u64(comm.rank() as u64 + 1).unwrap())
            .unwrap();
        assert_eq!(offsets, vec![0, 1, 3, 6]);
    }

    #[test]
    fn vote_is_unanimous() {
        let world = LocalWorld::new(3).unwrap();
        let outcome = world.run(|comm| comm.vote(comm.rank() != 1).unwrap()).unwrap();
        assert_eq!(outcome, vec![false, false, false]);

        let outcome = world.run(|comm| comm.vote(true).unwrap()).unwrap();
        assert_eq!(outcome, vec![true, true, true]);
    }

    #[test]
    fn early_exit_releases_waiting_peers() {
        let world = LocalWorld::new(3).unwrap();
        let outcome = world
            .run(|comm| {
                if comm.rank() == 2 {
                    return Ok(());
                }
                comm.barrier()
            })
            .unwrap();

        assert!(outcome[2].is_ok());
        assert!(matches!(outcome[0], Err(CommError::PeerDeparted)));
        assert!(matches!(outcome[1], Err(CommError::PeerDeparted)));
    }

    #[test]
    fn malformed_contribution_poisons_every_rank() {
        let world = LocalWorld::new(2).unwrap();
        let outcome = world
            .run(|comm| {
                let parts = if comm.rank() == 0 { 1 } else { 2 };
                comm.exchange(vec![Vec::new(); parts])
            })
            .unwrap();
        assert!(outcome.iter().all(|r| matches!(r, Err(CommError::Poisoned))));
    }

    #[test]
    fn panicked_rank_is_reported() {
        let world = LocalWorld::new(2).unwrap();
        let outcome = world.run(|comm| {
            if comm.rank() == 1 {
                panic!("boom");
            }
            comm.barrier()
        });
        assert!(matches!(outcome, Err(CommError::RankPanicked { rank: 1 })));
    }
}
