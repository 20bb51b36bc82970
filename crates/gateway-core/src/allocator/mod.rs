//! Id and port allocation
//!
//! Both allocators share one discipline: a fixed bitset plus a rotating
//! cursor. Allocation scans forward from the cursor and wraps once, so
//! recently released values are not handed out again immediately. Releasing
//! a value that is not allocated is reported, never ignored.

mod id;
mod pool;
mod port;

pub use id::{IdAllocator, SessionId};
pub use port::PortAllocator;
