use super::util;

/// Interface for a group of processes that can exchange messages. The
/// underlying transport can in principle be TCP, in-process channels, or a
/// higher level abstraction like MPI.
///
/// Every collective operation combines values in an order fixed by the
/// ranks alone, so a reduction over the same values on the same group gives
/// bitwise identical results from run to run.
///
pub trait Communicator: Send {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peers processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return immediately, in other words it is not allowed to block until a
    /// matching receive is posted.
    fn send(&self, rank: usize, message: Vec<u8>);

    /// Must be implemented to receive the next message from the given peer.
    /// Messages from one peer arrive in the order they were sent. This
    /// method is allowed to block until a message is ready to be received.
    fn recv_from(&self, rank: usize) -> Vec<u8>;

    /// Implements a binomial tree broadcast from the root node. The message
    /// buffer must be `Some` if this is the root node, and it must be `None`
    /// otherwise.
    ///
    fn broadcast(&self, value: Option<Vec<u8>>) -> Vec<u8> {
        let r = self.rank();
        let p = self.size();

        let value = match value {
            Some(value) => value,
            None => self.recv_from(r & (r.wrapping_sub(1))),
        };
        for level in (0..util::ceil_log2(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 && r + one < p {
                self.send(r + one, value.clone())
            }
        }
        value
    }

    /// Implements a binomial tree reduce. All ranks return `None` except for
    /// the root. At each stage a node combines its own value (left) with
    /// its partner's (right).
    ///
    fn reduce(&self, f: &dyn Fn(Vec<u8>, Vec<u8>) -> Vec<u8>, mut value: Vec<u8>) -> Option<Vec<u8>> {
        let r = self.rank();
        let p = self.size();

        for level in 0..util::ceil_log2(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    value = f(value, self.recv_from(r + one))
                }
            } else {
                self.send(r - one, value);
                return None;
            }
        }
        Some(value)
    }

    /// Implements an all-reduce (symmetric fold) operation over a commutative
    /// binary operator.
    ///
    fn all_reduce(&self, f: &dyn Fn(Vec<u8>, Vec<u8>) -> Vec<u8>, value: Vec<u8>) -> Vec<u8> {
        self.broadcast(self.reduce(f, value))
    }

    /// Return the minimum of `x` over all peers.
    ///
    fn reduce_min(&self, x: f64) -> f64 {
        let f = |a: Vec<u8>, b: Vec<u8>| {
            util::f64_to_bytes(util::f64_from_bytes(&a).min(util::f64_from_bytes(&b)))
        };
        util::f64_from_bytes(&self.all_reduce(&f, util::f64_to_bytes(x)))
    }

    /// Return the sum of `x` over all peers.
    ///
    fn reduce_sum(&self, x: f64) -> f64 {
        let f = |a: Vec<u8>, b: Vec<u8>| {
            util::f64_to_bytes(util::f64_from_bytes(&a) + util::f64_from_bytes(&b))
        };
        util::f64_from_bytes(&self.all_reduce(&f, util::f64_to_bytes(x)))
    }
}




/// The communicator of a single worker. Collectives return the local value.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, rank: usize, _message: Vec<u8>) {
        panic!("serial communicator cannot send to rank {}", rank)
    }

    fn recv_from(&self, rank: usize) -> Vec<u8> {
        panic!("serial communicator cannot receive from rank {}", rank)
    }
}
