use std::sync::Mutex;
use crossbeam_channel::{Receiver, Sender};
use super::comm::Communicator;

type Envelope = (usize, Vec<u8>);




/// A communicator connecting a group of workers within one process, e.g. one
/// per thread. Each worker has a single inbox; messages which arrive from a
/// peer other than the one being waited on are held back until requested.
///
pub struct ChannelCommunicator {
    rank: usize,
    peers: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    held: Mutex<Vec<Envelope>>,
}




// ============================================================================
impl ChannelCommunicator {

    /// Create a fully connected group of `size` communicators, in rank
    /// order.
    ///
    pub fn group(size: usize) -> Vec<Self> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size)
            .map(|_| crossbeam_channel::unbounded())
            .unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| Self {
                rank,
                peers: senders.clone(),
                inbox,
                held: Mutex::new(Vec::new()),
            })
            .collect()
    }
}




// ============================================================================
impl Communicator for ChannelCommunicator {

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, rank: usize, message: Vec<u8>) {
        self.peers[rank]
            .send((self.rank, message))
            .unwrap_or_else(|_| panic!("rank {} has hung up", rank))
    }

    fn recv_from(&self, rank: usize) -> Vec<u8> {
        let mut held = self.held.lock().unwrap();

        if let Some(n) = held.iter().position(|(source, _)| *source == rank) {
            return held.remove(n).1;
        }
        loop {
            let (source, message) = self
                .inbox
                .recv()
                .unwrap_or_else(|_| panic!("all peers of rank {} have hung up", self.rank));

            if source == rank {
                return message;
            }
            held.push((source, message))
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::thread;
    use super::ChannelCommunicator;
    use crate::message::comm::Communicator;

    fn run_group<F, T>(size: usize, f: F) -> Vec<T>
    where
        F: Fn(ChannelCommunicator) -> T + Send + Sync + Copy + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = ChannelCommunicator::group(size)
            .into_iter()
            .map(|comm| thread::spawn(move || f(comm)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    fn minimum_is_found_on_every_rank() {
        for size in 1..8 {
            let result = run_group(size, |comm| comm.reduce_min(10.0 - comm.rank() as f64));
            assert!(result.iter().all(|&x| x == 10.0 - (size - 1) as f64));
        }
    }

    #[test]
    fn sums_are_identical_on_every_rank_and_across_runs() {
        let contribution = |comm: ChannelCommunicator| comm.reduce_sum(0.1 * (comm.rank() as f64 + 1.0).sqrt());
        let first = run_group(7, contribution);
        let second = run_group(7, contribution);
        assert!(first.iter().all(|x| x.to_bits() == first[0].to_bits()));
        assert_eq!(first, second);
    }

    #[test]
    fn broadcast_reaches_every_rank() {
        let result = run_group(6, |comm| {
            let value = if comm.rank() == 0 { Some(vec![7, 8, 9]) } else { None };
            comm.broadcast(value)
        });
        assert!(result.iter().all(|v| v == &vec![7, 8, 9]));
    }
}
