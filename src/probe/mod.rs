pub mod classify;
pub mod socket;
pub mod udp;

pub use classify::*;
pub use socket::*;
pub use udp::*;
