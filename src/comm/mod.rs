//! The group of cooperating workers that distributed arrays are split over.
//!
//! Every worker runs the same code (SPMD). Anything in here that exchanges
//! data is *collective*: all workers in the group must call it, in the same
//! order, with consistent arguments.

#[cfg(test)]
mod tests;

use std::{any::Any, fmt::Debug, sync::Arc};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;
use thiserror::Error;

/// Data moved between workers.
pub type Payload = Box<dyn Any + Send>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    #[error("Expected one outgoing payload per worker ({expected}), got {actual}")]
    WrongPayloadCount { expected: usize, actual: usize },

    #[error("Worker {rank} left the group")]
    Disconnected { rank: usize },

    #[error("Worker {rank} sent data of an unexpected type")]
    UnexpectedPayload { rank: usize },

    #[error("Worker {rank} didn't supply the data it was supposed to")]
    MissingPayload { rank: usize },

    #[error("Rank {root} isn't part of a group of {size} workers")]
    BadRoot { root: usize, size: usize },
}

pub trait Communicator: Debug + Send + Sync {
    /// This worker's position in the group.
    fn rank(&self) -> usize;

    /// The number of workers in the group.
    fn size(&self) -> usize;

    /// Send `outgoing[j]` to worker `j` and receive one payload from every
    /// worker, in rank order. Collective.
    fn exchange(&self, outgoing: Vec<Payload>) -> Result<Vec<Payload>, CommError>;
}

/// A group with only this worker in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfComm;

impl SelfComm {
    pub fn new_arc() -> Arc<dyn Communicator> {
        Arc::new(SelfComm)
    }
}

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn exchange(&self, outgoing: Vec<Payload>) -> Result<Vec<Payload>, CommError> {
        if outgoing.len() != 1 {
            return Err(CommError::WrongPayloadCount {
                expected: 1,
                actual: outgoing.len(),
            });
        }
        Ok(outgoing)
    }
}

/// A worker in a group of threads. There is one channel for every ordered pair
/// of workers, so messages from one worker to another arrive in the order they
/// were sent.
pub struct ThreadComm {
    rank: usize,
    /// `senders[j]` sends to worker `j`.
    senders: Vec<Sender<Payload>>,
    /// `receivers[i]` receives from worker `i`.
    receivers: Vec<Receiver<Payload>>,
}

impl Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.senders.len())
            .finish()
    }
}

impl ThreadComm {
    /// Form a group of `size` workers. Hand each element of the result to its
    /// own thread.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        // channels[i][j] carries messages from i to j.
        let channels: Vec<Vec<(Sender<Payload>, Receiver<Payload>)>> = (0..size)
            .map(|_| (0..size).map(|_| unbounded()).collect())
            .collect();
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                senders: (0..size).map(|j| channels[rank][j].0.clone()).collect(),
                receivers: (0..size).map(|i| channels[i][rank].1.clone()).collect(),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn exchange(&self, outgoing: Vec<Payload>) -> Result<Vec<Payload>, CommError> {
        let size = self.size();
        if outgoing.len() != size {
            return Err(CommError::WrongPayloadCount {
                expected: size,
                actual: outgoing.len(),
            });
        }
        trace!("Rank {} exchanging with {size} workers", self.rank);
        for (j, (payload, tx)) in outgoing.into_iter().zip(&self.senders).enumerate() {
            tx.send(payload)
                .map_err(|_| CommError::Disconnected { rank: j })?;
        }
        self.receivers
            .iter()
            .enumerate()
            .map(|(i, rx)| rx.recv().map_err(|_| CommError::Disconnected { rank: i }))
            .collect()
    }
}

/// Run `f` on `num_workers` threads, each with its own member of a
/// [`ThreadComm`] group, and collect the results in rank order. A panic on any
/// worker is resumed on the calling thread.
pub fn run_spmd<F, R>(num_workers: usize, f: F) -> Vec<R>
where
    F: Fn(Arc<dyn Communicator>) -> R + Sync,
    R: Send,
{
    let comms = ThreadComm::group(num_workers);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(Arc::new(comm)))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

/// Typed all-to-all: `outgoing[j]` goes to worker `j`; the result holds what
/// every worker sent to this one, in rank order.
pub fn all_to_all<T: Send + 'static>(
    comm: &dyn Communicator,
    outgoing: Vec<T>,
) -> Result<Vec<T>, CommError> {
    let incoming = comm.exchange(
        outgoing
            .into_iter()
            .map(|t| Box::new(t) as Payload)
            .collect(),
    )?;
    incoming
        .into_iter()
        .enumerate()
        .map(|(rank, p)| {
            p.downcast::<T>()
                .map(|b| *b)
                .map_err(|_| CommError::UnexpectedPayload { rank })
        })
        .collect()
}

/// Every worker gets every worker's `value`, in rank order.
pub fn all_gather<T: Clone + Send + 'static>(
    comm: &dyn Communicator,
    value: T,
) -> Result<Vec<T>, CommError> {
    all_to_all(comm, vec![value; comm.size()])
}

/// Every worker gets `root`'s value. Only `root` needs to supply one.
pub fn broadcast<T: Clone + Send + 'static>(
    comm: &dyn Communicator,
    root: usize,
    value: Option<T>,
) -> Result<T, CommError> {
    check_root(comm, root)?;
    let outgoing = if comm.rank() == root {
        vec![value; comm.size()]
    } else {
        vec![None; comm.size()]
    };
    all_to_all(comm, outgoing)?
        .swap_remove(root)
        .ok_or(CommError::MissingPayload { rank: root })
}

/// Wait until every worker gets here.
pub fn barrier(comm: &dyn Communicator) -> Result<(), CommError> {
    all_gather(comm, ())?;
    Ok(())
}

pub(crate) fn check_root(comm: &dyn Communicator, root: usize) -> Result<(), CommError> {
    if root >= comm.size() {
        return Err(CommError::BadRoot {
            root,
            size: comm.size(),
        });
    }
    Ok(())
}
