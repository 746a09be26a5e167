//! Cart document: an insertion-ordered line list plus derived snapshot totals.
//!
//! The totals are recomputed from scratch after every mutation so they are
//! always a pure function of the current line list.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::Product;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub state: CartState,
    pub items: Vec<CartItem>,
    pub subtotal_all: Decimal,
    pub subtotal_selected: Decimal,
    pub grand_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    /// Price captured at last add/update; may diverge from the live price.
    pub unit_price: Decimal,
    /// Always `quantity * unit_price`.
    pub line_subtotal: Decimal,
    pub selected: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartState {
    #[default]
    Open,
    Converted,
}

impl CartState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Converted => "converted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "converted" => Some(Self::Converted),
            _ => None,
        }
    }
}

impl Cart {
    /// An empty open cart with all totals at zero.
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            state: CartState::Open,
            items: vec![],
            subtotal_all: Decimal::ZERO,
            subtotal_selected: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == CartState::Open
    }

    pub fn line(&self, product_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|l| l.product_id == product_id)
    }

    /// Sets the line for `product` to `quantity` at `unit_price`, creating it
    /// if absent. The line is always re-selected, even if previously
    /// deselected.
    pub fn upsert_line(&mut self, product: &Product, quantity: u32, unit_price: Decimal) {
        let line_subtotal = unit_price * Decimal::from(quantity);
        if let Some(line) = self.items.iter_mut().find(|l| l.product_id == product.id) {
            line.product_name = product.name.clone();
            line.quantity = quantity;
            line.unit_price = unit_price;
            line.line_subtotal = line_subtotal;
            line.selected = true;
        } else {
            self.items.push(CartItem {
                id: Uuid::new_v4(),
                product_id: product.id,
                product_name: product.name.clone(),
                quantity,
                unit_price,
                line_subtotal,
                selected: true,
            });
        }
        self.recalculate();
    }

    /// Replaces a line's quantity, refreshing the price snapshot but leaving
    /// the selection flag untouched. Returns false when the line is absent.
    pub fn set_line_quantity(&mut self, product_id: Uuid, quantity: u32, unit_price: Decimal) -> bool {
        let Some(line) = self.items.iter_mut().find(|l| l.product_id == product_id) else {
            return false;
        };
        line.quantity = quantity;
        line.unit_price = unit_price;
        line.line_subtotal = unit_price * Decimal::from(quantity);
        self.recalculate();
        true
    }

    pub fn remove_line(&mut self, product_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|l| l.product_id != product_id);
        if self.items.len() == before {
            return false;
        }
        self.recalculate();
        true
    }

    pub fn set_line_selected(&mut self, product_id: Uuid, selected: bool) -> bool {
        let Some(line) = self.items.iter_mut().find(|l| l.product_id == product_id) else {
            return false;
        };
        line.selected = selected;
        self.recalculate();
        true
    }

    pub fn mark_converted(&mut self) {
        self.state = CartState::Converted;
        self.updated_at = Utc::now();
    }

    /// Recomputes all three snapshot totals from the line list in one pass.
    /// The grand total equals the selected subtotal; there is no separate
    /// tax or discount stage.
    fn recalculate(&mut self) {
        let mut all = Decimal::ZERO;
        let mut selected = Decimal::ZERO;
        for line in &self.items {
            all += line.line_subtotal;
            if line.selected {
                selected += line.line_subtotal;
            }
        }
        self.subtotal_all = all;
        self.subtotal_selected = selected;
        self.grand_total = selected;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn totals_hold(cart: &Cart) {
        let all: Decimal = cart.items.iter().map(|l| l.line_subtotal).sum();
        let selected: Decimal = cart
            .items
            .iter()
            .filter(|l| l.selected)
            .map(|l| l.line_subtotal)
            .sum();
        assert_eq!(cart.subtotal_all, all);
        assert_eq!(cart.subtotal_selected, selected);
        assert_eq!(cart.grand_total, selected);
        for line in &cart.items {
            assert_eq!(line.line_subtotal, line.unit_price * Decimal::from(line.quantity));
        }
    }

    #[test]
    fn upsert_replaces_existing_line() {
        let p = testutil::product(100, 10);
        let mut cart = Cart::new(Uuid::new_v4());
        cart.upsert_line(&p, 3, Decimal::from(100));
        assert_eq!(cart.subtotal_all, Decimal::from(300));
        cart.upsert_line(&p, 5, Decimal::from(100));
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);
        assert_eq!(cart.subtotal_all, Decimal::from(500));
        totals_hold(&cart);
    }

    #[test]
    fn upsert_reselects_deselected_line() {
        let p = testutil::product(100, 10);
        let mut cart = Cart::new(Uuid::new_v4());
        cart.upsert_line(&p, 2, Decimal::from(100));
        assert!(cart.set_line_selected(p.id, false));
        assert_eq!(cart.subtotal_selected, Decimal::ZERO);
        cart.upsert_line(&p, 3, Decimal::from(100));
        assert!(cart.items[0].selected);
        totals_hold(&cart);
    }

    #[test]
    fn selection_excludes_line_from_selected_totals() {
        let p = testutil::product(100, 10);
        let q = testutil::product(50, 10);
        let mut cart = Cart::new(Uuid::new_v4());
        cart.upsert_line(&p, 5, Decimal::from(100));
        cart.upsert_line(&q, 1, Decimal::from(50));
        assert!(cart.set_line_selected(p.id, false));
        assert_eq!(cart.subtotal_all, Decimal::from(550));
        assert_eq!(cart.subtotal_selected, Decimal::from(50));
        totals_hold(&cart);
    }

    #[test]
    fn remove_line_leaves_other_lines_untouched() {
        let p = testutil::product(100, 10);
        let q = testutil::product(50, 10);
        let mut cart = Cart::new(Uuid::new_v4());
        cart.upsert_line(&p, 2, Decimal::from(100));
        cart.upsert_line(&q, 1, Decimal::from(50));
        assert!(cart.remove_line(p.id));
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_id, q.id);
        assert_eq!(cart.subtotal_all, Decimal::from(50));
        assert!(!cart.remove_line(p.id));
        totals_hold(&cart);
    }

    #[test]
    fn set_line_quantity_keeps_selection_flag() {
        let p = testutil::product(100, 10);
        let mut cart = Cart::new(Uuid::new_v4());
        cart.upsert_line(&p, 2, Decimal::from(100));
        cart.set_line_selected(p.id, false);
        assert!(cart.set_line_quantity(p.id, 4, Decimal::from(120)));
        assert!(!cart.items[0].selected);
        assert_eq!(cart.items[0].line_subtotal, Decimal::from(480));
        totals_hold(&cart);
    }
}
