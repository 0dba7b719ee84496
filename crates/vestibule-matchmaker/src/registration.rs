//! Per-room-type registration.
//!
//! A [`RoomType`] carries everything the matchmaker needs to serve one
//! room type: the logic factory, room options, default join options, the
//! filter/sort projection for matchmaking queries, and typed lifecycle
//! hook slots. At most one registration exists per type name;
//! re-registering replaces it.

use std::sync::Arc;

use serde_json::{json, Value};
use vestibule_registry::{QueryConditions, RoomListing, SortSpec};
use vestibule_room::{RoomLogic, RoomOptions};

type LogicFactory = dyn Fn() -> Box<dyn RoomLogic> + Send + Sync;
type ListingHook = dyn Fn(&RoomListing) + Send + Sync;

/// Typed lifecycle hook slots, invoked with the listing snapshot.
#[derive(Default)]
pub(crate) struct LifecycleHooks {
    on_create: Option<Box<ListingHook>>,
    on_join: Option<Box<ListingHook>>,
    on_leave: Option<Box<ListingHook>>,
    on_lock: Option<Box<ListingHook>>,
    on_unlock: Option<Box<ListingHook>>,
    on_dispose: Option<Box<ListingHook>>,
}

impl LifecycleHooks {
    pub(crate) fn create(&self, listing: &RoomListing) {
        if let Some(hook) = &self.on_create {
            hook(listing);
        }
    }

    pub(crate) fn join(&self, listing: &RoomListing) {
        if let Some(hook) = &self.on_join {
            hook(listing);
        }
    }

    pub(crate) fn leave(&self, listing: &RoomListing) {
        if let Some(hook) = &self.on_leave {
            hook(listing);
        }
    }

    pub(crate) fn lock(&self, listing: &RoomListing) {
        if let Some(hook) = &self.on_lock {
            hook(listing);
        }
    }

    pub(crate) fn unlock(&self, listing: &RoomListing) {
        if let Some(hook) = &self.on_unlock {
            hook(listing);
        }
    }

    pub(crate) fn dispose(&self, listing: &RoomListing) {
        if let Some(hook) = &self.on_dispose {
            hook(listing);
        }
    }
}

/// A registered room type.
///
/// ```no_run
/// # use vestibule_matchmaker::RoomType;
/// # use vestibule_room::{NoopRoom, RoomOptions};
/// # use vestibule_registry::SortSpec;
/// let battle = RoomType::new(|| NoopRoom)
///     .with_options(RoomOptions { max_clients: 4, ..RoomOptions::default() })
///     .filter_by(["mode"])
///     .sort_by(SortSpec::desc("clients"));
/// ```
pub struct RoomType {
    factory: Box<LogicFactory>,
    pub(crate) options: RoomOptions,
    pub(crate) default_options: Value,
    filter_fields: Vec<String>,
    pub(crate) sort: Option<SortSpec>,
    pub(crate) hooks: Arc<LifecycleHooks>,
}

impl RoomType {
    /// Registers a room type backed by the given logic factory.
    pub fn new<F, L>(factory: F) -> Self
    where
        F: Fn() -> L + Send + Sync + 'static,
        L: RoomLogic,
    {
        Self {
            factory: Box::new(move || Box::new(factory())),
            options: RoomOptions::default(),
            default_options: json!({}),
            filter_fields: Vec::new(),
            sort: None,
            hooks: Arc::new(LifecycleHooks::default()),
        }
    }

    /// Sets the room options for rooms of this type.
    pub fn with_options(mut self, options: RoomOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the room type's default options. On creation they merge
    /// over the client's options, winning on conflicting keys.
    pub fn default_options(mut self, options: Value) -> Self {
        self.default_options = options;
        self
    }

    /// Names the client-option fields projected into listing metadata
    /// and matched by matchmaking queries.
    pub fn filter_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Orders matchmaking candidates before picking one.
    pub fn sort_by(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn on_create(self, hook: impl Fn(&RoomListing) + Send + Sync + 'static) -> Self {
        self.set_hook(|hooks| hooks.on_create = Some(Box::new(hook)))
    }

    pub fn on_join(self, hook: impl Fn(&RoomListing) + Send + Sync + 'static) -> Self {
        self.set_hook(|hooks| hooks.on_join = Some(Box::new(hook)))
    }

    pub fn on_leave(self, hook: impl Fn(&RoomListing) + Send + Sync + 'static) -> Self {
        self.set_hook(|hooks| hooks.on_leave = Some(Box::new(hook)))
    }

    pub fn on_lock(self, hook: impl Fn(&RoomListing) + Send + Sync + 'static) -> Self {
        self.set_hook(|hooks| hooks.on_lock = Some(Box::new(hook)))
    }

    pub fn on_unlock(self, hook: impl Fn(&RoomListing) + Send + Sync + 'static) -> Self {
        self.set_hook(|hooks| hooks.on_unlock = Some(Box::new(hook)))
    }

    pub fn on_dispose(self, hook: impl Fn(&RoomListing) + Send + Sync + 'static) -> Self {
        self.set_hook(|hooks| hooks.on_dispose = Some(Box::new(hook)))
    }

    fn set_hook(mut self, set: impl FnOnce(&mut LifecycleHooks)) -> Self {
        let hooks = Arc::get_mut(&mut self.hooks).expect("hooks are exclusive until registered");
        set(hooks);
        self
    }

    pub(crate) fn instantiate(&self) -> Box<dyn RoomLogic> {
        (self.factory)()
    }

    /// The query a matchmaking operation runs for this type: unlocked
    /// rooms of this name, narrowed by the filter projection of the
    /// client options.
    pub(crate) fn matchmaking_conditions(&self, name: &str, options: &Value) -> QueryConditions {
        let mut conditions = QueryConditions::new()
            .with("locked", false)
            .with("name", name);
        for field in &self.filter_fields {
            if let Some(value) = options.get(field) {
                conditions.insert(field, value.clone());
            }
        }
        conditions
    }

    /// The filter projection copied into a new room's listing metadata.
    pub(crate) fn project_metadata(&self, options: &Value) -> serde_json::Map<String, Value> {
        let mut metadata = serde_json::Map::new();
        for field in &self.filter_fields {
            if let Some(value) = options.get(field) {
                metadata.insert(field.clone(), value.clone());
            }
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vestibule_room::NoopRoom;

    #[test]
    fn test_matchmaking_conditions_include_filter_projection() {
        let room_type = RoomType::new(|| NoopRoom).filter_by(["mode", "region"]);
        let conditions = room_type
            .matchmaking_conditions("battle", &json!({"mode": "ranked", "ignored": 1}));

        let mut listing = RoomListing::new(
            vestibule_protocol::RoomId::new("r1"),
            "battle",
            vestibule_protocol::ProcessId::new("p1"),
        );
        listing.metadata.insert("mode".into(), json!("ranked"));
        assert!(conditions.matches(&listing));

        listing.metadata.insert("mode".into(), json!("casual"));
        assert!(!conditions.matches(&listing));
    }

    #[test]
    fn test_conditions_always_require_unlocked_and_name() {
        let room_type = RoomType::new(|| NoopRoom);
        let conditions = room_type.matchmaking_conditions("battle", &json!({}));

        let mut listing = RoomListing::new(
            vestibule_protocol::RoomId::new("r1"),
            "battle",
            vestibule_protocol::ProcessId::new("p1"),
        );
        assert!(conditions.matches(&listing));
        listing.locked = true;
        assert!(!conditions.matches(&listing));
    }

    #[test]
    fn test_project_metadata_takes_only_named_fields() {
        let room_type = RoomType::new(|| NoopRoom).filter_by(["mode"]);
        let metadata =
            room_type.project_metadata(&json!({"mode": "ranked", "secret": "nope"}));
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata["mode"], json!("ranked"));
    }
}
