//! Allocator contract used for every array the interpreter owns.
//!
//! The host injects one [`Allocator`] per interpreter as an `Rc<dyn Allocator>`.
//! The command table and the per-line argument arrays ask it for capacity before
//! they grow, and hand their [`Block`] back when they shrink to nothing or are
//! dropped. Blocks are move-only, so each grant is released at most once.

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Failure to obtain capacity from an [`Allocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The allocator refused a request of `requested` bytes.
    Exhausted { requested: usize },
    /// The requested element count does not fit in a layout.
    CapacityOverflow,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::Exhausted { requested } => {
                write!(f, "out of memory (requested {} bytes)", requested)
            }
            AllocError::CapacityOverflow => write!(f, "capacity overflow"),
        }
    }
}

impl std::error::Error for AllocError {}

/// Record of one grant handed out by an [`Allocator`].
///
/// A block is not `Clone`: whoever holds it is the only party that can give it back.
/// It carries the token of the allocator instance that granted it, so an allocator can
/// tell its own blocks from blocks with the same id handed out by another instance.
#[derive(Debug, PartialEq, Eq)]
pub struct Block {
    owner: u64,
    id: u64,
    layout: Layout,
}

impl Block {
    /// Create a block record. Only allocator implementations should need this.
    pub fn new(owner: u64, id: u64, layout: Layout) -> Self {
        Self { owner, id, layout }
    }

    /// Token of the allocator instance that granted this block.
    pub fn owner(&self) -> u64 {
        self.owner
    }

    /// Allocator-assigned identifier of this grant, unique per owner.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current layout of the grant.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Size of the grant in bytes.
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Update the layout after a successful reallocation.
    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }
}

/// Capability set every interpreter-owned allocation goes through.
///
/// Implementations keep whatever context they need in `self`; methods take `&self`
/// so a single instance can be shared by the table and by every parsed line.
pub trait Allocator {
    /// Grant a new block for `layout`.
    fn allocate(&self, layout: Layout) -> Result<Block, AllocError>;

    /// Resize `block` to `layout`. On failure the block is left untouched and still valid.
    fn reallocate(&self, block: &mut Block, layout: Layout) -> Result<(), AllocError>;

    /// Give `block` back. Must be the same allocator that granted it.
    fn release(&self, block: Block);
}

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Fresh token identifying one allocator instance for the lifetime of the process.
pub fn owner_token() -> u64 {
    NEXT_OWNER.fetch_add(1, Ordering::Relaxed)
}

/// Grants every request and leaves the actual memory to the process allocator.
#[derive(Debug)]
pub struct SystemAllocator {
    owner: u64,
    next_id: Cell<u64>,
}

impl SystemAllocator {
    pub fn new() -> Self {
        Self {
            owner: owner_token(),
            next_id: Cell::new(0),
        }
    }
}

impl Default for SystemAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> Result<Block, AllocError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Ok(Block::new(self.owner, id, layout))
    }

    fn reallocate(&self, block: &mut Block, layout: Layout) -> Result<(), AllocError> {
        block.set_layout(layout);
        Ok(())
    }

    fn release(&self, _block: Block) {}
}

#[derive(Debug, Default)]
struct Ledger {
    live: HashMap<u64, Layout>,
    live_bytes: usize,
    peak_bytes: usize,
    allocations: usize,
    reallocations: usize,
    releases: usize,
}

/// Allocator that books every grant and optionally enforces a byte limit.
///
/// Useful for hosts that want to cap the interpreter's footprint and for checking
/// that every block handed out eventually comes back.
#[derive(Debug)]
pub struct TrackingAllocator {
    owner: u64,
    limit: Cell<Option<usize>>,
    next_id: Cell<u64>,
    ledger: RefCell<Ledger>,
}

impl TrackingAllocator {
    /// Tracking allocator with no limit.
    pub fn new() -> Self {
        Self {
            owner: owner_token(),
            limit: Cell::new(None),
            next_id: Cell::new(0),
            ledger: RefCell::new(Ledger::default()),
        }
    }

    /// Tracking allocator refusing any request that would push live bytes above `bytes`.
    pub fn with_limit(bytes: usize) -> Self {
        let allocator = Self::new();
        allocator.limit.set(Some(bytes));
        allocator
    }

    /// Change the limit. Blocks already granted are not affected.
    pub fn set_limit(&self, limit: Option<usize>) {
        self.limit.set(limit);
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit.get()
    }

    /// Number of blocks granted and not yet released.
    pub fn live_blocks(&self) -> usize {
        self.ledger.borrow().live.len()
    }

    /// Bytes currently held by live blocks.
    pub fn live_bytes(&self) -> usize {
        self.ledger.borrow().live_bytes
    }

    /// Highest value `live_bytes` has reached.
    pub fn peak_bytes(&self) -> usize {
        self.ledger.borrow().peak_bytes
    }

    pub fn allocations(&self) -> usize {
        self.ledger.borrow().allocations
    }

    pub fn reallocations(&self) -> usize {
        self.ledger.borrow().reallocations
    }

    pub fn releases(&self) -> usize {
        self.ledger.borrow().releases
    }

    fn check_limit(&self, live_after: usize, requested: usize) -> Result<(), AllocError> {
        match self.limit.get() {
            Some(limit) if live_after > limit => {
                log::debug!(
                    "allocation of {} bytes refused ({} live, limit {})",
                    requested,
                    live_after - requested,
                    limit
                );
                Err(AllocError::Exhausted { requested })
            }
            _ => Ok(()),
        }
    }

    fn owns(&self, block: &Block) -> bool {
        block.owner() == self.owner
    }
}

impl Default for TrackingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for TrackingAllocator {
    fn allocate(&self, layout: Layout) -> Result<Block, AllocError> {
        let mut ledger = self.ledger.borrow_mut();
        let live_after = ledger
            .live_bytes
            .checked_add(layout.size())
            .ok_or(AllocError::CapacityOverflow)?;
        self.check_limit(live_after, layout.size())?;

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ledger.live.insert(id, layout);
        ledger.live_bytes = live_after;
        ledger.peak_bytes = ledger.peak_bytes.max(live_after);
        ledger.allocations += 1;
        Ok(Block::new(self.owner, id, layout))
    }

    fn reallocate(&self, block: &mut Block, layout: Layout) -> Result<(), AllocError> {
        let mut ledger = self.ledger.borrow_mut();
        let known = self.owns(block).then(|| ledger.live.get(&block.id()).copied());
        let Some(Some(old)) = known else {
            log::warn!("reallocate of unknown block #{}", block.id());
            return Err(AllocError::Exhausted {
                requested: layout.size(),
            });
        };
        let live_after = (ledger.live_bytes - old.size())
            .checked_add(layout.size())
            .ok_or(AllocError::CapacityOverflow)?;
        if layout.size() > old.size() {
            self.check_limit(live_after, layout.size() - old.size())?;
        }

        ledger.live.insert(block.id(), layout);
        ledger.live_bytes = live_after;
        ledger.peak_bytes = ledger.peak_bytes.max(live_after);
        ledger.reallocations += 1;
        block.set_layout(layout);
        Ok(())
    }

    fn release(&self, block: Block) {
        if !self.owns(&block) {
            log::warn!(
                "release of block #{} granted by another allocator",
                block.id()
            );
            return;
        }
        let mut ledger = self.ledger.borrow_mut();
        match ledger.live.remove(&block.id()) {
            Some(layout) => {
                ledger.live_bytes -= layout.size();
                ledger.releases += 1;
            }
            None => log::warn!("release of unknown block #{}", block.id()),
        }
    }
}
