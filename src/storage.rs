use crate::allocator::{AllocError, Allocator, Block};
use std::alloc::Layout;
use std::ops::Deref;
use std::rc::Rc;

/// Growable array whose capacity is granted by one [`Allocator`].
///
/// The block is requested before the backing vector grows and is handed back
/// when capacity drops to zero or the storage is dropped. An empty storage with
/// zero capacity holds no block at all.
pub(crate) struct Storage<T> {
    items: Vec<T>,
    capacity: usize,
    block: Option<Block>,
    allocator: Rc<dyn Allocator>,
}

impl<T> Storage<T> {
    /// Capacity used when pushing into a storage that has none yet.
    pub(crate) const MIN_CAPACITY: usize = 16;

    pub(crate) fn new(allocator: Rc<dyn Allocator>) -> Self {
        Self {
            items: Vec::new(),
            capacity: 0,
            block: None,
            allocator,
        }
    }

    pub(crate) fn with_capacity(
        allocator: Rc<dyn Allocator>,
        capacity: usize,
    ) -> Result<Self, AllocError> {
        let mut storage = Self::new(allocator);
        storage.resize(capacity)?;
        Ok(storage)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Append `value`, doubling capacity first if it is full.
    pub(crate) fn push(&mut self, value: T) -> Result<(), AllocError> {
        if self.items.len() == self.capacity {
            let grown = if self.capacity == 0 {
                Self::MIN_CAPACITY
            } else {
                self.capacity
                    .checked_mul(2)
                    .ok_or(AllocError::CapacityOverflow)?
            };
            self.resize(grown)?;
        }
        self.items.push(value);
        Ok(())
    }

    /// Make room for exactly `additional` more elements unless it is already there.
    pub(crate) fn reserve_exact(&mut self, additional: usize) -> Result<(), AllocError> {
        let needed = self
            .items
            .len()
            .checked_add(additional)
            .ok_or(AllocError::CapacityOverflow)?;
        if needed > self.capacity {
            self.resize(needed)?;
        }
        Ok(())
    }

    /// Drop spare capacity so it matches the length exactly.
    pub(crate) fn shrink_to_fit(&mut self) -> Result<(), AllocError> {
        self.resize(self.items.len())
    }

    /// Remove every element and hand the block back.
    pub(crate) fn clear(&mut self) {
        self.items = Vec::new();
        self.capacity = 0;
        if let Some(block) = self.block.take() {
            self.allocator.release(block);
        }
    }

    fn resize(&mut self, capacity: usize) -> Result<(), AllocError> {
        debug_assert!(capacity >= self.items.len());
        if capacity == 0 {
            self.clear();
            return Ok(());
        }

        let layout = Layout::array::<T>(capacity).map_err(|_| AllocError::CapacityOverflow)?;
        match self.block.as_mut() {
            Some(block) => self.allocator.reallocate(block, layout)?,
            None => self.block = Some(self.allocator.allocate(layout)?),
        }

        if capacity > self.items.capacity() {
            self.items
                .try_reserve_exact(capacity - self.items.len())
                .map_err(|_| AllocError::Exhausted {
                    requested: layout.size(),
                })?;
        } else {
            self.items.shrink_to(capacity);
        }
        log::trace!("storage resized from {} to {}", self.capacity, capacity);
        self.capacity = capacity;
        Ok(())
    }
}

impl<T> Deref for Storage<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> Drop for Storage<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            self.allocator.release(block);
        }
    }
}
