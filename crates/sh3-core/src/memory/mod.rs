//! Address-space model: page lookup, handler contract, dispatch and backing stores.

/// Access widths, capability sets and the handler trait.
pub mod access;
/// Address-space dispatcher.
pub mod dispatch;
/// Page table, mirroring and attribute windows.
pub mod map;
/// ROM and RAM handlers.
pub mod storage;

pub use access::{AccessKind, AccessSet, AccessWidth, BusContext, MemoryHandler};
pub use dispatch::{AddressSpace, HandlerId};
pub use map::{
    page_index, window_attributes, AttributeWindow, LookupTable, RegionAttributes,
    ATTRIBUTE_WINDOWS, HANDLER_INDEX_MASK, LOOKUP_ENTRIES, LOOKUP_SHIFT, MAX_HANDLERS,
    MIRROR_LIMIT, MIRROR_STRIDE, MIRROR_THRESHOLD, PAGE_BYTES, UNMAPPED,
};
pub use storage::{RamHandler, RomHandler};
