use std::collections::HashMap;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::order::models::NewOrderProduct;
use crate::product::models::Product;

/// Product ids picked in this session. Repeats denote quantity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Basket {
    products: Vec<i32>,
}

impl Basket {
    pub fn add(&mut self, product_id: i32) {
        self.products.push(product_id);
    }

    /// Removes one occurrence of `product_id`.
    pub fn remove(&mut self, product_id: i32) -> bool {
        match self.products.iter().position(|id| *id == product_id) {
            Some(index) => {
                self.products.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.products.clear();
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn product_ids(&self) -> &[i32] {
        &self.products
    }

    /// Groups repeated ids into `(product_id, quantity)` pairs, in the order
    /// each id was first added.
    pub fn quantities(&self) -> Vec<(i32, i32)> {
        let mut totals: Vec<(i32, i32)> = Vec::new();
        let mut index: HashMap<i32, usize> = HashMap::new();

        for &product_id in &self.products {
            match index.get(&product_id) {
                Some(&at) => totals[at].1 += 1,
                None => {
                    index.insert(product_id, totals.len());
                    totals.push((product_id, 1));
                }
            }
        }

        totals
    }

    pub fn state(&self) -> BasketState {
        BasketState {
            products: self.products.clone(),
            products_count: self.products.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasketAction {
    Add,
    Remove,
}

#[derive(Debug, Deserialize)]
pub struct ChangeBasket {
    pub pk: i32,
    pub action: BasketAction,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct BasketState {
    pub products: Vec<i32>,
    pub products_count: usize,
}

#[derive(Debug, Serialize)]
pub struct BasketLine {
    pub product: Product,
    pub qty: i32,
    pub total: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct BasketSummary {
    pub basket: Vec<BasketLine>,
    pub basket_total: BigDecimal,
    pub products_count: usize,
}

pub fn line_total(price: &BigDecimal, qty: i32) -> BigDecimal {
    price * &BigDecimal::from(qty)
}

/// One order line per distinct product, carrying its basket quantity.
pub fn order_lines(order_id: i32, quantities: &[(i32, i32)]) -> Vec<NewOrderProduct> {
    quantities
        .iter()
        .map(|&(product_id, amount)| NewOrderProduct {
            order_id,
            product_id,
            amount,
        })
        .collect()
}

impl BasketSummary {
    pub fn empty() -> Self {
        Self {
            basket: Vec::new(),
            basket_total: BigDecimal::from(0),
            products_count: 0,
        }
    }

    /// Prices each `(product_id, quantity)` pair against `products`. Ids with
    /// no matching product are skipped.
    pub fn build(quantities: &[(i32, i32)], products: Vec<Product>) -> Self {
        let mut by_id: HashMap<i32, Product> =
            products.into_iter().map(|p| (p.id, p)).collect();

        let mut summary = Self::empty();

        for &(product_id, qty) in quantities {
            let Some(product) = by_id.remove(&product_id) else {
                warn!(product_id, "basket references a missing product, skipping");
                continue;
            };

            let total = line_total(&product.price, qty);
            summary.basket_total += &total;
            summary.products_count += qty as usize;
            summary.basket.push(BasketLine {
                product,
                qty,
                total,
            });
        }

        summary
    }
}
