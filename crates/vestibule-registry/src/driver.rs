//! The registry storage contract.

use std::future::Future;

use vestibule_protocol::RoomId;

use crate::{QueryConditions, RegistryError, RoomListing, SortSpec};

/// Persisted index of room listings.
///
/// Implementations must be linearizable per listing: a `save` is fully
/// visible to the next `find_by_id` for the same room. Cross-listing
/// queries (`find`, `find_one`) may observe slightly stale data.
///
/// Methods return `Send` futures because they are awaited from spawned
/// tasks; implementations just write `async fn`.
pub trait Driver: Send + Sync + 'static {
    /// Builds a listing from initial fields without persisting it.
    /// The listing becomes visible to queries on the first [`save`](Self::save).
    fn create_instance(
        &self,
        initial: RoomListing,
    ) -> impl Future<Output = Result<RoomListing, RegistryError>> + Send;

    /// Returns every listing matching the conditions.
    fn find(
        &self,
        conditions: &QueryConditions,
    ) -> impl Future<Output = Result<Vec<RoomListing>, RegistryError>> + Send;

    /// Returns the best listing matching the conditions, ordered by
    /// `sort` when given, insertion order otherwise.
    fn find_one(
        &self,
        conditions: &QueryConditions,
        sort: Option<&SortSpec>,
    ) -> impl Future<Output = Result<Option<RoomListing>, RegistryError>> + Send;

    /// Returns the listing for a room id, if any.
    fn find_by_id(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<Option<RoomListing>, RegistryError>> + Send;

    /// Persists a listing, inserting or overwriting.
    fn save(&self, listing: &RoomListing) -> impl Future<Output = Result<(), RegistryError>> + Send;

    /// Removes a listing. Removing an absent listing is not an error.
    fn remove(&self, room_id: &RoomId) -> impl Future<Output = Result<(), RegistryError>> + Send;
}
