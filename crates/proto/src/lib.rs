//! Protocol message identity for the WhoMine plugin host
//!
//! This crate only describes *which* protocol message an event carries and
//! in which direction it travels. Encoding and decoding belong to the host's
//! network layer; plugins see packets as opaque payloads tagged with a
//! [`PacketType`].

#![warn(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::missing_assert_message,
    clippy::unwrap_in_result,
    clippy::unwrap_used,
    clippy::str_to_string,
    clippy::clone_on_ref_ptr,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inefficient_to_string,
    clippy::manual_let_else,
    clippy::redundant_closure_for_method_calls,
    clippy::trivially_copy_pass_by_ref,
    clippy::unused_self
)]

pub mod event;
pub mod packet;

pub use bytes;
pub use uuid;

pub use event::{Connection, PacketContainer, PacketEvent};
pub use packet::{PacketFlow, PacketType, Protocol};
