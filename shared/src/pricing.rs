//! Order pricing and stock availability checks

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::money::{checked_sum, line_total, AmountOverflow};

/// A line ready to be priced at the current unit price
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricedLine {
    pub medicine_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    pub fn total(&self) -> Result<Decimal, AmountOverflow> {
        line_total(self.quantity, self.unit_price)
    }
}

/// Σ quantity × unit price, exact at two decimal places
pub fn order_total(lines: &[PricedLine]) -> Result<Decimal, AmountOverflow> {
    let totals = lines
        .iter()
        .map(PricedLine::total)
        .collect::<Result<Vec<_>, _>>()?;
    checked_sum(totals)
}

/// First medicine that cannot cover its requested quantity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient stock for {medicine_id}: requested {requested}, available {available}")]
pub struct StockShortfall {
    pub medicine_id: Uuid,
    pub requested: i64,
    pub available: i32,
}

/// Sum requested quantities per medicine, keeping first-seen order
pub fn aggregate_quantities<I>(lines: I) -> Vec<(Uuid, i64)>
where
    I: IntoIterator<Item = (Uuid, i32)>,
{
    let mut order = Vec::new();
    let mut totals: HashMap<Uuid, i64> = HashMap::new();
    for (medicine_id, quantity) in lines {
        let entry = totals.entry(medicine_id).or_insert_with(|| {
            order.push(medicine_id);
            0
        });
        *entry += i64::from(quantity);
    }
    order
        .into_iter()
        .map(|id| (id, totals.get(&id).copied().unwrap_or_default()))
        .collect()
}

/// Check the requested quantities against current stock levels.
///
/// A medicine missing from `stock` counts as zero available.
pub fn check_availability(
    requested: &[(Uuid, i32)],
    stock: &HashMap<Uuid, i32>,
) -> Result<(), StockShortfall> {
    for (medicine_id, quantity) in aggregate_quantities(requested.iter().copied()) {
        let available = stock.get(&medicine_id).copied().unwrap_or(0);
        if i64::from(available) < quantity {
            return Err(StockShortfall {
                medicine_id,
                requested: quantity,
                available,
            });
        }
    }
    Ok(())
}
