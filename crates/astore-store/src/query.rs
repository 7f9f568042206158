use crate::entity::{Entity, Property};
use crate::key::{Key, Kind};

/// Equality filter on an indexed property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub property: Property,
    pub value: String,
}

impl Filter {
    pub fn matches(&self, entity: &Entity) -> bool {
        entity
            .property(self.property)
            .iter()
            .any(|v| *v == self.value)
    }
}

/// Result ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    CreatedDescending,
}

/// A kind-scoped query with optional ancestor, property filters, ordering
/// and limit.
///
/// ```
/// use astore_store::{Key, Kind, Order, Property, Query};
///
/// let dir = Key::named(Kind::PathElement, "root", None);
/// let query = Query::new(Kind::Artifact)
///     .ancestor(&dir)
///     .filter(Property::Tag, "latest")
///     .order(Order::CreatedDescending)
///     .limit(1);
/// assert_eq!(query.kind(), Kind::Artifact);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    kind: Kind,
    ancestor: Option<Key>,
    filters: Vec<Filter>,
    order: Option<Order>,
    limit: Option<usize>,
}

impl Query {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            ancestor: None,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Restrict results to entities at or below `key`.
    pub fn ancestor(mut self, key: &Key) -> Self {
        self.ancestor = Some(key.clone());
        self
    }

    pub fn filter(mut self, property: Property, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            property,
            value: value.into(),
        });
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Returns `true` if an entity stored under `key` is in the query's
    /// scope, ignoring property filters.
    ///
    /// Transactions record their queries by scope so that writes which move
    /// an entity out of the filtered set still count as conflicts.
    pub fn covers(&self, key: &Key) -> bool {
        key.kind() == self.kind
            && self
                .ancestor
                .as_ref()
                .map_or(true, |ancestor| key.has_ancestor(ancestor))
    }

    pub fn matches(&self, key: &Key, entity: &Entity) -> bool {
        self.covers(key)
            && entity.kind() == self.kind
            && self.filters.iter().all(|f| f.matches(entity))
    }

    /// Sort and truncate matching results according to the query.
    ///
    /// Ties on the creation time fall back to the allocated id, so of two
    /// artifacts created in the same instant the later insert sorts as newer.
    pub fn finish(&self, mut results: Vec<(Key, Entity)>) -> Vec<(Key, Entity)> {
        if let Some(order) = self.order {
            results.sort_by(|(ka, a), (kb, b)| {
                let ord = a
                    .created()
                    .cmp(&b.created())
                    .then_with(|| ka.id().cmp(&kb.id()));
                match order {
                    Order::CreatedDescending => ord.reverse(),
                }
            });
        } else {
            results.sort_by_key(|(k, _)| k.id());
        }
        if let Some(limit) = self.limit {
            results.truncate(limit);
        }
        results
    }
}
