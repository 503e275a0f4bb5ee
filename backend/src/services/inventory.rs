//! Inventory ledger: medicine records and stock counts

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Medicine, MedicineAlert, LOW_STOCK_THRESHOLD};
use crate::services::retry::{with_retries, RetryPolicy};
use crate::store::{DynStore, UnitOfWork};
use shared::{
    inventory_alerts, parse_calendar_date, validate_medicine_name, validate_price,
    validate_quantity, validate_stock,
};

/// Inventory ledger service
#[derive(Clone)]
pub struct InventoryLedger {
    store: DynStore,
    retry: RetryPolicy,
}

/// Fields for creating or replacing a medicine
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MedicineInput {
    #[validate(length(min = 1, max = 200, message = "Medicine name is required"))]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub batch_number: String,
    /// YYYY-MM-DD, MM/DD/YYYY or DD/MM/YYYY
    pub expiry_date: String,
    pub price: Decimal,
    pub stock: i64,
    pub notes: Option<String>,
}

/// Validated medicine fields
struct MedicineFields {
    name: String,
    category: String,
    manufacturer: String,
    batch_number: String,
    expiry_date: NaiveDate,
    price: Decimal,
    stock: i32,
    notes: Option<String>,
}

impl MedicineInput {
    fn into_fields(self) -> AppResult<MedicineFields> {
        self.validate()?;
        validate_medicine_name(&self.name).map_err(|m| AppError::validation("name", m))?;
        let expiry_date = parse_calendar_date(&self.expiry_date)
            .map_err(|e| AppError::validation("expiry_date", e.to_string()))?;
        validate_price(self.price).map_err(|m| AppError::validation("price", m))?;
        let stock = validate_stock(self.stock).map_err(|m| AppError::validation("stock", m))?;

        Ok(MedicineFields {
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            manufacturer: self.manufacturer.trim().to_string(),
            batch_number: self.batch_number.trim().to_string(),
            expiry_date,
            price: self.price,
            stock,
            notes: self
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        })
    }
}

/// Medicine update body; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicinePatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i64>,
    pub notes: Option<String>,
}

impl From<MedicineInput> for MedicinePatch {
    fn from(input: MedicineInput) -> Self {
        Self {
            name: Some(input.name),
            category: Some(input.category),
            manufacturer: Some(input.manufacturer),
            batch_number: Some(input.batch_number),
            expiry_date: Some(input.expiry_date),
            price: Some(input.price),
            stock: Some(input.stock),
            notes: input.notes,
        }
    }
}

#[derive(Debug, Default)]
struct PatchFields {
    name: Option<String>,
    category: Option<String>,
    manufacturer: Option<String>,
    batch_number: Option<String>,
    expiry_date: Option<NaiveDate>,
    price: Option<Decimal>,
    stock: Option<i32>,
    notes: Option<String>,
}

impl MedicinePatch {
    fn validated(self) -> AppResult<PatchFields> {
        let name = match self.name {
            Some(name) => {
                validate_medicine_name(&name).map_err(|m| AppError::validation("name", m))?;
                Some(name.trim().to_string())
            }
            None => None,
        };
        let expiry_date = self
            .expiry_date
            .map(|raw| {
                parse_calendar_date(&raw)
                    .map_err(|e| AppError::validation("expiry_date", e.to_string()))
            })
            .transpose()?;
        if let Some(price) = self.price {
            validate_price(price).map_err(|m| AppError::validation("price", m))?;
        }
        let stock = self
            .stock
            .map(|stock| validate_stock(stock).map_err(|m| AppError::validation("stock", m)))
            .transpose()?;

        Ok(PatchFields {
            name,
            category: self.category.map(|c| c.trim().to_string()),
            manufacturer: self.manufacturer.map(|m| m.trim().to_string()),
            batch_number: self.batch_number.map(|b| b.trim().to_string()),
            expiry_date,
            price: self.price,
            stock,
            notes: self.notes.map(|n| n.trim().to_string()),
        })
    }
}

impl PatchFields {
    fn apply(&self, existing: Medicine) -> Medicine {
        Medicine {
            name: self.name.clone().unwrap_or(existing.name),
            category: self.category.clone().unwrap_or(existing.category),
            manufacturer: self.manufacturer.clone().unwrap_or(existing.manufacturer),
            batch_number: self.batch_number.clone().unwrap_or(existing.batch_number),
            expiry_date: self.expiry_date.unwrap_or(existing.expiry_date),
            price: self.price.unwrap_or(existing.price),
            stock: self.stock.unwrap_or(existing.stock),
            // An empty string clears the notes
            notes: match &self.notes {
                Some(n) if n.is_empty() => None,
                Some(n) => Some(n.clone()),
                None => existing.notes,
            },
            updated_at: Utc::now(),
            ..existing
        }
    }
}

impl InventoryLedger {
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

    pub async fn get_medicine(&self, id: Uuid) -> AppResult<Medicine> {
        let mut uow = self.store.begin().await?;
        uow.get_medicine(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Medicine".to_string()))
    }

    /// Case-insensitive substring match on name, manufacturer or category
    pub async fn list_medicines(&self, query: Option<&str>) -> AppResult<Vec<Medicine>> {
        let mut uow = self.store.begin().await?;
        uow.list_medicines(query).await
    }

    pub async fn create_medicine(&self, input: MedicineInput) -> AppResult<Medicine> {
        let fields = input.into_fields()?;
        let now = Utc::now();
        let medicine = Medicine {
            id: Uuid::new_v4(),
            name: fields.name,
            category: fields.category,
            manufacturer: fields.manufacturer,
            batch_number: fields.batch_number,
            expiry_date: fields.expiry_date,
            price: fields.price,
            stock: fields.stock,
            notes: fields.notes,
            created_at: now,
            updated_at: now,
        };

        let mut uow = self.store.begin().await?;
        uow.insert_medicine(&medicine).await?;
        uow.commit().await?;

        tracing::info!(medicine_id = %medicine.id, name = %medicine.name, stock = medicine.stock, "Medicine created");
        Ok(medicine)
    }

    /// Create when `id` is absent, otherwise apply the fields as an update
    pub async fn upsert_medicine(
        &self,
        id: Option<Uuid>,
        input: MedicineInput,
    ) -> AppResult<Medicine> {
        match id {
            None => self.create_medicine(input).await,
            Some(id) => self.update_medicine(id, input).await,
        }
    }

    /// Partial update. Omitted fields keep their stored value.
    pub async fn update_medicine(
        &self,
        id: Uuid,
        patch: impl Into<MedicinePatch>,
    ) -> AppResult<Medicine> {
        let patch: MedicinePatch = patch.into();
        let patch = patch.validated()?;
        let patch = &patch;
        let medicine = with_retries(&self.retry, "update_medicine", move || {
            async move {
                let mut uow = self.store.begin().await?;
                let existing = uow
                    .lock_medicine(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Medicine".to_string()))?;

                let medicine = patch.apply(existing);
                if !uow.update_medicine(&medicine).await? {
                    return Err(AppError::NotFound("Medicine".to_string()));
                }
                uow.commit().await?;
                Ok(medicine)
            }
        })
        .await?;

        tracing::info!(medicine_id = %id, stock = medicine.stock, "Medicine updated");
        Ok(medicine)
    }

    pub async fn remove_medicine(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        if !uow.delete_medicine(id).await? {
            return Err(AppError::NotFound("Medicine".to_string()));
        }
        uow.commit().await?;
        tracing::info!(medicine_id = %id, "Medicine removed");
        Ok(())
    }

    /// Atomically check `stock >= quantity` and decrement. Returns the new stock.
    pub async fn reserve_stock(&self, id: Uuid, quantity: i64) -> AppResult<i32> {
        let quantity = validate_quantity(quantity).map_err(|m| AppError::validation("quantity", m))?;
        with_retries(&self.retry, "reserve_stock", move || async move {
            let mut uow = self.store.begin().await?;
            let remaining = Self::reserve_stock_in(uow.as_mut(), id, quantity).await?;
            uow.commit().await?;
            Ok(remaining)
        })
        .await
    }

    /// Reserve inside a caller-owned unit of work
    pub async fn reserve_stock_in(
        uow: &mut dyn UnitOfWork,
        id: Uuid,
        quantity: i32,
    ) -> AppResult<i32> {
        if quantity <= 0 {
            return Err(AppError::validation("quantity", "Quantity must be greater than zero"));
        }
        let medicine = uow
            .lock_medicine(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Medicine".to_string()))?;

        match uow.decrement_stock(id, quantity).await? {
            Some(remaining) => Ok(remaining),
            None => Err(AppError::InsufficientStock {
                medicine_id: id,
                medicine_name: medicine.name,
                requested: i64::from(quantity),
                available: medicine.stock,
            }),
        }
    }

    /// Medicines with stock below the low-stock threshold
    pub async fn low_stock(&self) -> AppResult<Vec<Medicine>> {
        let medicines = self.list_medicines(None).await?;
        Ok(medicines
            .into_iter()
            .filter(|m| m.stock < LOW_STOCK_THRESHOLD)
            .collect())
    }

    /// Low-stock, expiring and expired medicine alerts as of `today`
    pub async fn alerts(&self, today: NaiveDate) -> AppResult<Vec<MedicineAlert>> {
        let medicines = self.list_medicines(None).await?;
        Ok(inventory_alerts(&medicines, today))
    }
}
