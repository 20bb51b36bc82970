use super::pool::RotatingPool;
use crate::error::{Error, Result};

const POOL_NAME: &str = "media port";

/// Issues and recycles UDP ports from a contiguous range
#[derive(Debug)]
pub struct PortAllocator {
    base: u16,
    pool: RotatingPool,
}

impl PortAllocator {
    /// Create an allocator over `[base, base + count)`.
    ///
    /// The range is checked by [`GatewayConfig::validate`](crate::GatewayConfig::validate).
    pub fn new(base: u16, count: u16) -> Self {
        Self {
            base,
            pool: RotatingPool::new(count as usize),
        }
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn count(&self) -> usize {
        self.pool.capacity()
    }

    /// Whether `port` falls inside the managed range
    pub fn contains(&self, port: u16) -> bool {
        port >= self.base && usize::from(port - self.base) < self.pool.capacity()
    }

    /// Issue the next free port
    pub fn allocate(&mut self) -> Result<u16> {
        let index = self
            .pool
            .allocate()
            .ok_or(Error::AllocationExhausted { pool: POOL_NAME })?;
        Ok(self.base + index as u16)
    }

    /// Return a port to the pool
    pub fn release(&mut self, port: u16) -> Result<()> {
        if !self.contains(port) {
            return Err(Error::OutOfRange {
                pool: POOL_NAME,
                value: u32::from(port),
            });
        }
        if self.pool.release(usize::from(port - self.base)) {
            Ok(())
        } else {
            Err(Error::NotOwned {
                pool: POOL_NAME,
                value: u32::from(port),
            })
        }
    }

    pub fn is_allocated(&self, port: u16) -> bool {
        self.contains(port) && self.pool.is_allocated(usize::from(port - self.base))
    }

    pub fn in_use(&self) -> usize {
        self.pool.in_use()
    }

    pub fn available(&self) -> usize {
        self.pool.available()
    }
}
