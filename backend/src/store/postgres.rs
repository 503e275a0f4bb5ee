//! PostgreSQL store
//!
//! A unit of work is one database transaction. `lock_*` reads use
//! `SELECT ... FOR UPDATE`, and the conditional writes put their guard in
//! the `WHERE` clause so a concurrent writer can never push stock or a
//! balance below zero.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{PrescriptionFilter, Store, UnitOfWork, UserCredentials};
use crate::error::{AppError, AppResult};
use crate::models::{
    Medicine, Order, OrderItem, OrderStatus, Prescription, PrescriptionItem, PrescriptionStatus,
    Role, User, UserProfile, WalletTransaction, WalletTransactionStatus, WalletTransactionType,
};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.db).await.is_ok()
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    national_id: Option<String>,
    practice_code: Option<String>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_credentials(self) -> AppResult<UserCredentials> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| AppError::Internal(format!("Unknown role '{}'", self.role)))?;
        let missing = |field: &str| AppError::Internal(format!("User {} has no {}", self.id, field));
        let profile = match role {
            Role::Patient => UserProfile::Patient {
                national_id: self.national_id.clone().ok_or_else(|| missing("national_id"))?,
            },
            Role::Doctor => UserProfile::Doctor {
                practice_code: self.practice_code.clone().ok_or_else(|| missing("practice_code"))?,
            },
            Role::Pharmacist => UserProfile::Pharmacist {
                practice_code: self.practice_code.clone().ok_or_else(|| missing("practice_code"))?,
            },
        };
        Ok(UserCredentials {
            user: User {
                id: self.id,
                name: self.name,
                email: self.email,
                profile,
                created_at: self.created_at,
            },
            password_hash: self.password_hash,
        })
    }
}

#[derive(Debug, FromRow)]
struct MedicineRow {
    id: Uuid,
    name: String,
    category: String,
    manufacturer: String,
    batch_number: String,
    expiry_date: NaiveDate,
    price: Decimal,
    stock: i32,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MedicineRow> for Medicine {
    fn from(row: MedicineRow) -> Self {
        Medicine {
            id: row.id,
            name: row.name,
            category: row.category,
            manufacturer: row.manufacturer,
            batch_number: row.batch_number,
            expiry_date: row.expiry_date,
            price: row.price,
            stock: row.stock,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct WalletTransactionRow {
    id: Uuid,
    patient_id: Uuid,
    transaction_type: String,
    amount: Decimal,
    balance_after: Decimal,
    reference: String,
    description: String,
    order_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WalletTransactionRow> for WalletTransaction {
    type Error = AppError;

    fn try_from(row: WalletTransactionRow) -> AppResult<Self> {
        let transaction_type = WalletTransactionType::parse(&row.transaction_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown transaction type '{}'", row.transaction_type))
        })?;
        Ok(WalletTransaction {
            id: row.id,
            patient_id: row.patient_id,
            transaction_type,
            amount: row.amount,
            balance_after: row.balance_after,
            status: WalletTransactionStatus::Completed,
            reference: row.reference,
            description: row.description,
            order_id: row.order_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PrescriptionRow {
    id: Uuid,
    prescription_number: String,
    doctor_id: Uuid,
    patient_id: Uuid,
    patient_national_id: String,
    notes: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    fulfilled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct PrescriptionItemRow {
    prescription_id: Uuid,
    medicine_id: Uuid,
    medicine_name: String,
    dosage: String,
    duration: String,
    quantity: i32,
    quoted_unit_price: Decimal,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    prescription_id: Uuid,
    prescription_number: String,
    patient_id: Uuid,
    total_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    line_index: i32,
    medicine_id: Uuid,
    medicine_name: String,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, national_id, practice_code, created_at";
const MEDICINE_COLUMNS: &str = "id, name, category, manufacturer, batch_number, expiry_date, \
     price, stock, notes, created_at, updated_at";
const PRESCRIPTION_COLUMNS: &str = "id, prescription_number, doctor_id, patient_id, \
     patient_national_id, notes, status, created_at, fulfilled_at";
const ORDER_COLUMNS: &str =
    "id, prescription_id, prescription_number, patient_id, total_amount, status, created_at";

impl PgUnitOfWork {
    async fn load_prescriptions(&mut self, rows: Vec<PrescriptionRow>) -> AppResult<Vec<Prescription>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, PrescriptionItemRow>(
            r#"
            SELECT prescription_id, medicine_id, medicine_name, dosage, duration, quantity, quoted_unit_price
            FROM prescription_items
            WHERE prescription_id = ANY($1)
            ORDER BY prescription_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut by_prescription: HashMap<Uuid, Vec<PrescriptionItem>> = HashMap::new();
        for item in items {
            by_prescription
                .entry(item.prescription_id)
                .or_default()
                .push(PrescriptionItem {
                    medicine_id: item.medicine_id,
                    medicine_name: item.medicine_name,
                    dosage: item.dosage,
                    duration: item.duration,
                    quantity: item.quantity,
                    quoted_unit_price: item.quoted_unit_price,
                });
        }

        rows.into_iter()
            .map(|row| {
                let status = PrescriptionStatus::parse(&row.status).ok_or_else(|| {
                    AppError::Internal(format!("Unknown prescription status '{}'", row.status))
                })?;
                Ok(Prescription {
                    id: row.id,
                    items: by_prescription.remove(&row.id).unwrap_or_default(),
                    prescription_number: row.prescription_number,
                    doctor_id: row.doctor_id,
                    patient_id: row.patient_id,
                    patient_national_id: row.patient_national_id,
                    notes: row.notes,
                    status,
                    created_at: row.created_at,
                    fulfilled_at: row.fulfilled_at,
                })
            })
            .collect()
    }

    async fn load_orders(&mut self, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT order_id, line_index, medicine_id, medicine_name, quantity, unit_price, line_total
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(OrderItem {
                line_index: item.line_index,
                medicine_id: item.medicine_id,
                medicine_name: item.medicine_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total,
            });
        }

        rows.into_iter()
            .map(|row| {
                let status = OrderStatus::parse(&row.status).ok_or_else(|| {
                    AppError::Internal(format!("Unknown order status '{}'", row.status))
                })?;
                Ok(Order {
                    id: row.id,
                    items: by_order.remove(&row.id).unwrap_or_default(),
                    prescription_id: row.prescription_id,
                    prescription_number: row.prescription_number,
                    patient_id: row.patient_id,
                    total_amount: row.total_amount,
                    status,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    async fn fetch_prescription(&mut self, sql: &str, key: &str) -> AppResult<Option<Prescription>> {
        let row = sqlx::query_as::<_, PrescriptionRow>(sql)
            .bind(key)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(row) => Ok(self.load_prescriptions(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

/// Map unique violations on insert to a duplicate-entry error
fn map_unique(err: sqlx::Error, field: &str) -> AppError {
    let err = AppError::from(err);
    if err.is_unique_violation() {
        AppError::DuplicateEntry(field.to_string())
    } else {
        err
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_user(&mut self, user: &User, password_hash: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, national_id, practice_code, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.email.to_lowercase())
        .bind(password_hash)
        .bind(user.role().as_str())
        .bind(user.profile.national_id())
        .bind(user.profile.practice_code())
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, "email or national_id"))?;
        Ok(())
    }

    async fn email_exists(&mut self, email: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)",
        )
        .bind(email.to_lowercase())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn national_id_exists(&mut self, national_id: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE national_id = $1)",
        )
        .bind(national_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn find_credentials_by_email(&mut self, email: &str) -> AppResult<Option<UserCredentials>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(UserRow::into_credentials).transpose()
    }

    async fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(UserRow::into_credentials).transpose()?.map(|c| c.user))
    }

    async fn find_patient_by_national_id(&mut self, national_id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE national_id = $1 AND role = 'patient'",
            USER_COLUMNS
        ))
        .bind(national_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(UserRow::into_credentials).transpose()?.map(|c| c.user))
    }

    async fn list_users(&mut self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at, email",
            USER_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter()
            .map(|r| r.into_credentials().map(|c| c.user))
            .collect()
    }

    async fn insert_medicine(&mut self, medicine: &Medicine) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO medicines (id, name, category, manufacturer, batch_number, expiry_date,
                                   price, stock, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(medicine.id)
        .bind(&medicine.name)
        .bind(&medicine.category)
        .bind(&medicine.manufacturer)
        .bind(&medicine.batch_number)
        .bind(medicine.expiry_date)
        .bind(medicine.price)
        .bind(medicine.stock)
        .bind(&medicine.notes)
        .bind(medicine.created_at)
        .bind(medicine.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, "id"))?;
        Ok(())
    }

    async fn update_medicine(&mut self, medicine: &Medicine) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE medicines
            SET name = $2, category = $3, manufacturer = $4, batch_number = $5,
                expiry_date = $6, price = $7, stock = $8, notes = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(medicine.id)
        .bind(&medicine.name)
        .bind(&medicine.category)
        .bind(&medicine.manufacturer)
        .bind(&medicine.batch_number)
        .bind(medicine.expiry_date)
        .bind(medicine.price)
        .bind(medicine.stock)
        .bind(&medicine.notes)
        .bind(medicine.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_medicine(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM medicines WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_medicine(&mut self, id: Uuid) -> AppResult<Option<Medicine>> {
        let row = sqlx::query_as::<_, MedicineRow>(&format!(
            "SELECT {} FROM medicines WHERE id = $1",
            MEDICINE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Medicine::from))
    }

    async fn lock_medicine(&mut self, id: Uuid) -> AppResult<Option<Medicine>> {
        let row = sqlx::query_as::<_, MedicineRow>(&format!(
            "SELECT {} FROM medicines WHERE id = $1 FOR UPDATE",
            MEDICINE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Medicine::from))
    }

    async fn list_medicines(&mut self, query: Option<&str>) -> AppResult<Vec<Medicine>> {
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));

        let rows = sqlx::query_as::<_, MedicineRow>(&format!(
            r#"
            SELECT {}
            FROM medicines
            WHERE $1::text IS NULL
               OR name ILIKE $1 OR manufacturer ILIKE $1 OR category ILIKE $1
            ORDER BY created_at DESC, id
            "#,
            MEDICINE_COLUMNS
        ))
        .bind(pattern)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Medicine::from).collect())
    }

    async fn decrement_stock(&mut self, id: Uuid, quantity: i32) -> AppResult<Option<i32>> {
        let stock = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE medicines
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(stock)
    }

    async fn create_wallet(&mut self, patient_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO wallets (patient_id, balance) VALUES ($1, 0) ON CONFLICT (patient_id) DO NOTHING",
        )
        .bind(patient_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn wallet_balance(&mut self, patient_id: Uuid) -> AppResult<Option<Decimal>> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            "SELECT balance FROM wallets WHERE patient_id = $1",
        )
        .bind(patient_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(balance)
    }

    async fn lock_wallet(&mut self, patient_id: Uuid) -> AppResult<Option<Decimal>> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            "SELECT balance FROM wallets WHERE patient_id = $1 FOR UPDATE",
        )
        .bind(patient_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(balance)
    }

    async fn adjust_wallet(&mut self, patient_id: Uuid, delta: Decimal) -> AppResult<Option<Decimal>> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE wallets
            SET balance = balance + $2, updated_at = NOW()
            WHERE patient_id = $1 AND balance + $2 >= 0
            RETURNING balance
            "#,
        )
        .bind(patient_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(balance)
    }

    async fn insert_wallet_transaction(&mut self, transaction: &WalletTransaction) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (id, patient_id, transaction_type, amount, balance_after,
                                             status, reference, description, order_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.patient_id)
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.amount)
        .bind(transaction.balance_after)
        .bind(transaction.status.as_str())
        .bind(&transaction.reference)
        .bind(&transaction.description)
        .bind(transaction.order_id)
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_wallet_transactions(&mut self, patient_id: Uuid) -> AppResult<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, WalletTransactionRow>(
            r#"
            SELECT id, patient_id, transaction_type, amount, balance_after, reference,
                   description, order_id, created_at
            FROM wallet_transactions
            WHERE patient_id = $1
            ORDER BY seq DESC
            "#,
        )
        .bind(patient_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(WalletTransaction::try_from).collect()
    }

    async fn insert_prescription(&mut self, prescription: &Prescription) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO prescriptions (id, prescription_number, doctor_id, patient_id,
                                       patient_national_id, notes, status, created_at, fulfilled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(prescription.id)
        .bind(&prescription.prescription_number)
        .bind(prescription.doctor_id)
        .bind(prescription.patient_id)
        .bind(&prescription.patient_national_id)
        .bind(&prescription.notes)
        .bind(prescription.status.as_str())
        .bind(prescription.created_at)
        .bind(prescription.fulfilled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, "prescription_number"))?;

        for (position, item) in prescription.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO prescription_items (prescription_id, position, medicine_id, medicine_name,
                                                dosage, duration, quantity, quoted_unit_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(prescription.id)
            .bind(position as i32)
            .bind(item.medicine_id)
            .bind(&item.medicine_name)
            .bind(&item.dosage)
            .bind(&item.duration)
            .bind(item.quantity)
            .bind(item.quoted_unit_price)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn prescription_number_exists(&mut self, number: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM prescriptions WHERE prescription_number = $1)",
        )
        .bind(number)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn find_prescription(&mut self, id: Uuid) -> AppResult<Option<Prescription>> {
        let row = sqlx::query_as::<_, PrescriptionRow>(&format!(
            "SELECT {} FROM prescriptions WHERE id = $1",
            PRESCRIPTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        match row {
            Some(row) => Ok(self.load_prescriptions(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_prescription_by_number(&mut self, number: &str) -> AppResult<Option<Prescription>> {
        let sql = format!(
            "SELECT {} FROM prescriptions WHERE prescription_number = $1",
            PRESCRIPTION_COLUMNS
        );
        self.fetch_prescription(&sql, number).await
    }

    async fn lock_prescription(&mut self, number: &str) -> AppResult<Option<Prescription>> {
        let sql = format!(
            "SELECT {} FROM prescriptions WHERE prescription_number = $1 FOR UPDATE",
            PRESCRIPTION_COLUMNS
        );
        self.fetch_prescription(&sql, number).await
    }

    async fn list_prescriptions(&mut self, filter: &PrescriptionFilter) -> AppResult<Vec<Prescription>> {
        let rows = sqlx::query_as::<_, PrescriptionRow>(&format!(
            r#"
            SELECT {}
            FROM prescriptions
            WHERE ($1::uuid IS NULL OR patient_id = $1)
              AND ($2::uuid IS NULL OR doctor_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC, prescription_number DESC
            "#,
            PRESCRIPTION_COLUMNS
        ))
        .bind(filter.patient_id)
        .bind(filter.doctor_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await?;
        self.load_prescriptions(rows).await
    }

    async fn mark_prescription_fulfilled(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE prescriptions
            SET status = 'fulfilled', fulfilled_at = $2
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_order(&mut self, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, prescription_id, prescription_number, patient_id,
                                total_amount, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id)
        .bind(order.prescription_id)
        .bind(&order.prescription_number)
        .bind(order.patient_id)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, "prescription_id"))?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, line_index, medicine_id, medicine_name,
                                         quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(order.id)
            .bind(position as i32)
            .bind(item.line_index)
            .bind(item.medicine_id)
            .bind(&item.medicine_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn find_order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        match row {
            Some(row) => Ok(self.load_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&mut self, patient_id: Option<Uuid>) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE $1::uuid IS NULL OR patient_id = $1
            ORDER BY created_at DESC, id
            "#,
            ORDER_COLUMNS
        ))
        .bind(patient_id)
        .fetch_all(&mut *self.tx)
        .await?;
        self.load_orders(rows).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
