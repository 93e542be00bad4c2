//! Constants and configuration defaults for the soft TCAM

/// Widest key any `KeyBits` implementation may have (`u128`).
pub const MAX_KEY_WIDTH: usize = 128;

/// Granularity used by `sort_worst` to spread hot elements across pages.
pub const PAGE_SIZE: usize = 4096;

pub const DEFAULT_NODE_CAPACITY: usize = 1024;
pub const DEFAULT_ENTRY_CAPACITY: usize = 1024;

/// First priority handed out by the ACL loader; each accepted line takes the next lower one.
pub const ACL_PRIORITY_START: u32 = u32::MAX;
