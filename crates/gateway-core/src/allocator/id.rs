use std::fmt;

use serde::{Deserialize, Serialize};

use super::pool::RotatingPool;
use crate::error::{Error, Result};
use crate::session::Direction;

const POOL_NAME: &str = "session id";

/// Numeric session identifier.
///
/// Inbound legs draw from `[0, K)`, outbound legs from `[K, 2K)`. Displayed as
/// four hex digits, the form used in per-leg log tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl SessionId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

/// Issues and recycles session ids from two disjoint ranges
#[derive(Debug)]
pub struct IdAllocator {
    pool_size: u32,
    inbound: RotatingPool,
    outbound: RotatingPool,
}

impl IdAllocator {
    /// Create an allocator with `pool_size` ids per direction
    pub fn new(pool_size: u32) -> Self {
        Self {
            pool_size,
            inbound: RotatingPool::new(pool_size as usize),
            outbound: RotatingPool::new(pool_size as usize),
        }
    }

    /// Ids per direction
    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    /// Issue the next free id for `direction`
    pub fn allocate(&mut self, direction: Direction) -> Result<SessionId> {
        let (pool, offset) = match direction {
            Direction::Inbound => (&mut self.inbound, 0),
            Direction::Outbound => (&mut self.outbound, self.pool_size),
        };
        let index = pool
            .allocate()
            .ok_or(Error::AllocationExhausted { pool: POOL_NAME })?;
        Ok(SessionId(offset + index as u32))
    }

    /// Return an id to its pool
    pub fn release(&mut self, id: SessionId) -> Result<()> {
        let (pool, index) = self.locate(id)?;
        if pool.release(index) {
            Ok(())
        } else {
            Err(Error::NotOwned {
                pool: POOL_NAME,
                value: id.0,
            })
        }
    }

    /// Direction an id belongs to, if it is in range
    pub fn direction_of(&self, id: SessionId) -> Option<Direction> {
        if id.0 < self.pool_size {
            Some(Direction::Inbound)
        } else if id.0 < self.pool_size * 2 {
            Some(Direction::Outbound)
        } else {
            None
        }
    }

    pub fn is_allocated(&self, id: SessionId) -> bool {
        match self.direction_of(id) {
            Some(Direction::Inbound) => self.inbound.is_allocated(id.0 as usize),
            Some(Direction::Outbound) => self.outbound.is_allocated((id.0 - self.pool_size) as usize),
            None => false,
        }
    }

    /// Free ids left for `direction`
    pub fn available(&self, direction: Direction) -> usize {
        match direction {
            Direction::Inbound => self.inbound.available(),
            Direction::Outbound => self.outbound.available(),
        }
    }

    /// Ids currently issued, both directions
    pub fn in_use(&self) -> usize {
        self.inbound.in_use() + self.outbound.in_use()
    }

    fn locate(&mut self, id: SessionId) -> Result<(&mut RotatingPool, usize)> {
        match self.direction_of(id) {
            Some(Direction::Inbound) => Ok((&mut self.inbound, id.0 as usize)),
            Some(Direction::Outbound) => Ok((&mut self.outbound, (id.0 - self.pool_size) as usize)),
            None => Err(Error::OutOfRange {
                pool: POOL_NAME,
                value: id.0,
            }),
        }
    }
}
