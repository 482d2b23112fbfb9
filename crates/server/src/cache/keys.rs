//! Cache keys and their expiry.

use std::fmt;
use std::time::Duration;

use fakeshion_core::{OrderId, ProductId, UserId};

/// TTL for detail and list views.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// TTL for the homepage top-rated list.
pub const TOP_RATED_TTL: Duration = Duration::from_secs(60);

/// Prefix shared by every cached filtered product list.
pub const PRODUCT_LIST_PREFIX: &str = "product:list:";

/// Logical cache key for an entity or list view.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    OrderDetail(OrderId),
    UserOrders(UserId),
    AllOrders,
    ProductDetail(ProductId),
    ProductReviews(ProductId),
    /// A filtered product listing, keyed by its canonical filter string.
    ProductList(String),
    TopRated,
}

impl CacheKey {
    /// How long an entry under this key stays valid.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        match self {
            Self::TopRated => TOP_RATED_TTL,
            _ => DEFAULT_TTL,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderDetail(id) => write!(f, "order:detail:{id}"),
            Self::UserOrders(id) => write!(f, "order:list:user:{id}"),
            Self::AllOrders => f.write_str("order:list:all"),
            Self::ProductDetail(id) => write!(f, "product:detail:{id}"),
            Self::ProductReviews(id) => write!(f, "product:reviews:{id}"),
            Self::ProductList(filter) => write!(f, "{PRODUCT_LIST_PREFIX}{filter}"),
            Self::TopRated => f.write_str("product:topRated"),
        }
    }
}

/// The set of cache entries a write makes stale.
///
/// Exact keys are dropped individually; prefixes drop every key that starts
/// with them, trading precision for not tracking list dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub keys: Vec<CacheKey>,
    pub prefixes: Vec<&'static str>,
}

impl Invalidation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn key(mut self, key: CacheKey) -> Self {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: &'static str) -> Self {
        if !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.prefixes.is_empty()
    }
}
