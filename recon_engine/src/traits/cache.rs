use std::future::Future;

use crate::{
    db_types::{OrderId, OrderItem},
    traits::DownstreamError,
};

/// The read-through catalog cache. This service only ever invalidates entries; populating them happens elsewhere.
pub trait CatalogCache: Clone + Send + Sync + 'static {
    fn invalidate(&self, keys: Vec<String>) -> impl Future<Output = Result<(), DownstreamError>> + Send;
}

/// The cache keys that go stale when an order changes state.
pub fn cache_keys_for_order(order_id: &OrderId, items: &[OrderItem]) -> Vec<String> {
    let mut keys = vec![format!("order:{}", order_id.as_str())];
    for item in items {
        let key = format!("product:{}", item.product_id);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// A cache that has nothing to invalidate. Used when no cache endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl CatalogCache for NoopCache {
    async fn invalidate(&self, _keys: Vec<String>) -> Result<(), DownstreamError> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::Paise;

    fn item(product_id: &str) -> OrderItem {
        OrderItem {
            id: 0,
            order_id: OrderId::from("ord_1"),
            product_id: product_id.to_string(),
            variant_id: None,
            brand_id: "b1".to_string(),
            quantity: 1,
            price: Paise::from(100),
            weight_grams: None,
        }
    }

    #[test]
    fn keys_are_unique() {
        let items = vec![item("p1"), item("p2"), item("p1")];
        let keys = cache_keys_for_order(&OrderId::from("ord_1"), &items);
        assert_eq!(keys, vec!["order:ord_1", "product:p1", "product:p2"]);
    }
}
