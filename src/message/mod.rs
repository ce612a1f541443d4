//! This module exports a minimal message-passing API, which is encapsulated
//! by a `Communicator` trait. Implementors only need to write `send` and
//! `recv_from` operations for a given transport layer. The trait then
//! provides default implementations for broadcast, reduce, and all-reduce
//! operations, and the floating-point minimum and sum reductions used for
//! time step selection and integrated diagnostics.
//!
//! Two transports are included: a `SerialCommunicator` for a single worker,
//! and a `ChannelCommunicator` connecting a group of in-process workers
//! over `crossbeam-channel`.
//!

pub mod channel;
pub mod comm;
pub mod util;

pub use channel::ChannelCommunicator;
pub use comm::{Communicator, SerialCommunicator};
