//! Order fulfillment: turns an active prescription into a paid order
//!
//! This is the only place the inventory, wallet and prescription ledgers are
//! written together. Everything happens in one unit of work:
//!
//! 1. lock the prescription and check ownership and status
//! 2. resolve the selected lines
//! 3. lock the medicines (ascending id) and price the lines at current prices
//! 4. check stock for every line, then the wallet balance
//! 5. reserve stock, charge the wallet, mark the prescription fulfilled and
//!    record the order
//!
//! A failed check returns before anything is written. Store contention is
//! retried a bounded number of times and then reported as a conflict.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Medicine, Order, OrderItem, OrderStatus, Prescription, Role};
use crate::services::inventory::InventoryLedger;
use crate::services::prescription::PrescriptionRegistry;
use crate::services::retry::{with_retries, RetryPolicy};
use crate::services::wallet::{ChargeReference, WalletLedger};
use crate::store::{DynStore, UnitOfWork};
use shared::{check_availability, order_total, PricedLine};

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderInput {
    pub prescription_number: String,
    #[serde(default)]
    pub selected_line_indices: Vec<i64>,
}

/// Order fulfillment service
#[derive(Clone)]
pub struct OrderFulfillmentService {
    store: DynStore,
    retry: RetryPolicy,
}

/// A selected prescription line priced at the current unit price
struct PricedSelection {
    line_index: i32,
    medicine_id: Uuid,
    medicine_name: String,
    quantity: i32,
    unit_price: Decimal,
}

impl OrderFulfillmentService {
    pub fn new(store: DynStore) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fulfill the selected lines of a prescription for the acting patient
    pub async fn place_order(
        &self,
        patient_id: Uuid,
        prescription_number: &str,
        selected_line_indices: &[i64],
    ) -> AppResult<Order> {
        let prescription_number = prescription_number.trim();
        let order = with_retries(&self.retry, "place_order", move || {
            self.try_place_order(patient_id, prescription_number, selected_line_indices)
        })
        .await?;

        tracing::info!(
            order_id = %order.id,
            prescription_number = %order.prescription_number,
            patient_id = %patient_id,
            total = %order.total_amount,
            lines = order.items.len(),
            "Order placed"
        );
        Ok(order)
    }

    async fn try_place_order(
        &self,
        patient_id: Uuid,
        prescription_number: &str,
        selected_line_indices: &[i64],
    ) -> AppResult<Order> {
        let mut uow = self.store.begin().await?;

        let prescription = uow
            .lock_prescription(prescription_number)
            .await?
            .ok_or_else(|| AppError::NotFound("Prescription".to_string()))?;

        if prescription.patient_id != patient_id {
            return Err(AppError::Forbidden(
                "This prescription belongs to another patient".to_string(),
            ));
        }
        if !prescription.is_active() {
            return Err(AppError::AlreadyFulfilled(prescription.prescription_number));
        }

        let selected = resolve_selection(&prescription, selected_line_indices)?;
        let medicines = lock_medicines(uow.as_mut(), &prescription, &selected).await?;

        let lines: Vec<PricedSelection> = selected
            .iter()
            .map(|&index| {
                let item = &prescription.items[index];
                let medicine = &medicines[&item.medicine_id];
                PricedSelection {
                    line_index: index as i32,
                    medicine_id: medicine.id,
                    medicine_name: medicine.name.clone(),
                    quantity: item.quantity,
                    unit_price: medicine.price,
                }
            })
            .collect();

        let requested: Vec<(Uuid, i32)> = lines.iter().map(|l| (l.medicine_id, l.quantity)).collect();
        let stock: HashMap<Uuid, i32> = medicines.values().map(|m| (m.id, m.stock)).collect();
        check_availability(&requested, &stock).map_err(|shortfall| AppError::InsufficientStock {
            medicine_id: shortfall.medicine_id,
            medicine_name: medicines
                .get(&shortfall.medicine_id)
                .map(|m| m.name.clone())
                .unwrap_or_default(),
            requested: shortfall.requested,
            available: shortfall.available,
        })?;

        let priced: Vec<PricedLine> = lines
            .iter()
            .map(|l| PricedLine {
                medicine_id: l.medicine_id,
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect();
        let line_totals = priced
            .iter()
            .map(PricedLine::total)
            .collect::<Result<Vec<_>, _>>()?;
        let total = order_total(&priced)?;

        let available = uow
            .lock_wallet(patient_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Wallet".to_string()))?;
        if available < total {
            return Err(AppError::InsufficientFunds {
                required: total,
                available,
            });
        }

        let order = Order {
            id: Uuid::new_v4(),
            prescription_id: prescription.id,
            prescription_number: prescription.prescription_number.clone(),
            patient_id,
            items: lines
                .iter()
                .zip(line_totals.iter())
                .map(|(line, line_total)| OrderItem {
                    line_index: line.line_index,
                    medicine_id: line.medicine_id,
                    medicine_name: line.medicine_name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: *line_total,
                })
                .collect(),
            total_amount: total,
            status: OrderStatus::Completed,
            created_at: Utc::now(),
        };

        // Every check has passed; from here on a failure means the ledgers
        // disagree with what was just read under lock.
        apply_order(uow.as_mut(), &order)
            .await
            .map_err(|err| {
                if err.is_retryable() {
                    err
                } else {
                    tracing::error!(
                        prescription_number = %order.prescription_number,
                        error = %err,
                        "Fulfillment failed after checks passed, rolling back"
                    );
                    AppError::Internal(format!("Order could not be applied: {}", err))
                }
            })?;

        uow.commit().await?;
        Ok(order)
    }

    /// A patient's orders, newest first
    pub async fn list_orders(&self, patient_id: Uuid) -> AppResult<Vec<Order>> {
        let mut uow = self.store.begin().await?;
        uow.list_orders(Some(patient_id)).await
    }

    /// Every order, newest first
    pub async fn list_all_orders(&self) -> AppResult<Vec<Order>> {
        let mut uow = self.store.begin().await?;
        uow.list_orders(None).await
    }

    /// Patients may only see their own orders; pharmacists see all
    pub async fn get_order(&self, order_id: Uuid, user_id: Uuid, role: Role) -> AppResult<Order> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        match role {
            Role::Pharmacist => Ok(order),
            Role::Patient if order.patient_id == user_id => Ok(order),
            _ => Err(AppError::Forbidden(
                "You do not have access to this order".to_string(),
            )),
        }
    }
}

/// Validate and de-duplicate the selected line indices, in ascending order
fn resolve_selection(prescription: &Prescription, indices: &[i64]) -> AppResult<Vec<usize>> {
    if indices.is_empty() {
        return Err(AppError::NoSelection);
    }
    let mut selected = BTreeSet::new();
    for &index in indices {
        let valid = usize::try_from(index)
            .ok()
            .filter(|i| *i < prescription.items.len());
        match valid {
            Some(i) => {
                selected.insert(i);
            }
            None => {
                return Err(AppError::validation(
                    "selected_line_indices",
                    format!(
                        "Line {} does not exist on prescription {} ({} lines)",
                        index,
                        prescription.prescription_number,
                        prescription.items.len()
                    ),
                ))
            }
        }
    }
    Ok(selected.into_iter().collect())
}

/// Lock every medicine the selection touches, in ascending id order
async fn lock_medicines(
    uow: &mut dyn UnitOfWork,
    prescription: &Prescription,
    selected: &[usize],
) -> AppResult<HashMap<Uuid, Medicine>> {
    let ids: BTreeSet<Uuid> = selected
        .iter()
        .map(|&i| prescription.items[i].medicine_id)
        .collect();

    let mut medicines = HashMap::with_capacity(ids.len());
    for id in ids {
        let medicine = match uow.lock_medicine(id).await? {
            Some(medicine) => medicine,
            None => {
                let name = prescription
                    .items
                    .iter()
                    .find(|item| item.medicine_id == id)
                    .map(|item| item.medicine_name.clone())
                    .unwrap_or_else(|| id.to_string());
                return Err(AppError::NotFound(format!("Medicine '{}'", name)));
            }
        };
        medicines.insert(id, medicine);
    }
    Ok(medicines)
}

/// Reserve stock, charge the wallet, close the prescription and store the order
async fn apply_order(uow: &mut dyn UnitOfWork, order: &Order) -> AppResult<()> {
    for item in &order.items {
        InventoryLedger::reserve_stock_in(uow, item.medicine_id, item.quantity).await?;
    }

    // Free medicines produce no payment; the log only holds positive amounts
    if order.total_amount > Decimal::ZERO {
        WalletLedger::charge_in(
            uow,
            order.patient_id,
            order.total_amount,
            ChargeReference {
                reference: format!("ORDER-{}", order.prescription_number),
                description: format!("Payment for prescription {}", order.prescription_number),
                order_id: Some(order.id),
            },
        )
        .await?;
    }

    PrescriptionRegistry::mark_fulfilled_in(uow, order.prescription_id).await?;
    uow.insert_order(order).await?;
    Ok(())
}
