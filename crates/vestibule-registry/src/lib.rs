//! Room listing registry for Vestibule.
//!
//! The registry is the fleet-wide index of live rooms: one
//! [`RoomListing`] row per room, readable by every process, mutated only
//! by the owner. Matchmaking queries filter and sort these rows.
//!
//! The [`Driver`] trait is the storage contract; [`MemoryDriver`] is the
//! in-process implementation for single-node deployments and tests. A
//! database-backed driver implements the same trait.

mod driver;
mod error;
mod listing;
mod memory;
mod query;

pub use driver::Driver;
pub use error::RegistryError;
pub use listing::RoomListing;
pub use memory::MemoryDriver;
pub use query::{Direction, QueryConditions, SortSpec};
