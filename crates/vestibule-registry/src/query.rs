//! Query conditions and sort specifications for listing lookups.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::RoomListing;

/// Field-equality conditions for a registry query.
///
/// Every condition must match for a listing to qualify. Field names use
/// the wire spelling (`maxClients`, `locked`, plus any metadata key).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryConditions {
    fields: Map<String, Value>,
}

impl QueryConditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if the listing satisfies every condition.
    pub fn matches(&self, listing: &RoomListing) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| listing.field(field).as_ref() == Some(expected))
    }
}

/// Sort direction for [`SortSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Orders candidate listings by a single field before picking one.
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub direction: Direction,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Compares two listings by the sort field. Missing fields sort
    /// last regardless of direction.
    pub fn compare(&self, a: &RoomListing, b: &RoomListing) -> Ordering {
        let ordering = match (a.field(&self.field), b.field(&self.field)) {
            (Some(a), Some(b)) => compare_values(&a, &b),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        };
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vestibule_protocol::{ProcessId, RoomId};

    fn listing(id: &str, clients: u32, locked: bool) -> RoomListing {
        let mut l = RoomListing::new(RoomId::new(id), "battle", ProcessId::new("p1"));
        l.max_clients = 4;
        l.clients = clients;
        l.locked = locked;
        l
    }

    #[test]
    fn test_conditions_match_all_fields() {
        let conditions = QueryConditions::new()
            .with("name", "battle")
            .with("locked", false);
        assert!(conditions.matches(&listing("r1", 0, false)));
        assert!(!conditions.matches(&listing("r2", 0, true)));
    }

    #[test]
    fn test_conditions_match_metadata() {
        let mut l = listing("r1", 0, false);
        l.metadata.insert("mode".into(), json!("ranked"));

        let ranked = QueryConditions::new().with("mode", "ranked");
        let casual = QueryConditions::new().with("mode", "casual");
        assert!(ranked.matches(&l));
        assert!(!casual.matches(&l));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let conditions = QueryConditions::new().with("mode", "ranked");
        assert!(!conditions.matches(&listing("r1", 0, false)));
    }

    #[test]
    fn test_empty_conditions_match_everything() {
        assert!(QueryConditions::new().matches(&listing("r1", 3, true)));
    }

    #[test]
    fn test_sort_asc_and_desc() {
        let a = listing("a", 1, false);
        let b = listing("b", 3, false);

        assert_eq!(SortSpec::asc("clients").compare(&a, &b), Ordering::Less);
        assert_eq!(SortSpec::desc("clients").compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_sort_missing_field_sorts_last() {
        let mut a = listing("a", 0, false);
        a.metadata.insert("elo".into(), json!(1200));
        let b = listing("b", 0, false);

        let sort = SortSpec::desc("elo");
        assert_eq!(sort.compare(&a, &b), Ordering::Less);
        assert_eq!(sort.compare(&b, &a), Ordering::Greater);
    }
}
