//! Session manager and its wire datagram types.

pub mod cipher;
pub mod datagram;
pub mod manager;

pub use datagram::{decode_datagram, encode_datagram, Datagram};
pub use manager::{ChatMessage, Room, SessionManager};
