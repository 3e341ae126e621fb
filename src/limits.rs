//! Hard caps that keep a single request from growing engine state without bound.

/// Windows accepted by one bulk replacement.
pub const MAX_WINDOWS_PER_REPLACE: usize = 1_000;

/// Active reservations dated today or later held per space.
pub const MAX_OPEN_RESERVATIONS_PER_SPACE: usize = 100_000;

/// Opaque usage-purpose tag length, in bytes.
pub const MAX_USAGE_PURPOSE_LEN: usize = 64;

/// Opaque request-message length, in bytes.
pub const MAX_REQUEST_MESSAGE_LEN: usize = 2_000;

/// Capacity of the WAL group-commit channel.
pub const WAL_CHANNEL_CAPACITY: usize = 4096;

/// Buffered notifications per space before slow subscribers start lagging.
pub const NOTIFY_CHANNEL_CAPACITY: usize = 256;

/// Largest bincode payload a single WAL frame may carry.
pub const MAX_WAL_ENTRY_BYTES: usize = 16 * 1024 * 1024;
