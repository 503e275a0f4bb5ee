//! Prescription registry: doctor-authored, patient-targeted prescriptions

use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    format_prescription_number, Prescription, PrescriptionItem, PrescriptionStatus, Role,
};
use crate::services::retry::{with_retries, RetryPolicy};
use crate::store::{DynStore, PrescriptionFilter, UnitOfWork};
use shared::{check_availability, validate_national_id, validate_quantity};

/// Number candidates tried inside one unit of work before giving up
const MAX_NUMBER_ATTEMPTS: usize = 20;

type SuffixSource = Arc<dyn Fn() -> u16 + Send + Sync>;

/// Prescription registry service
#[derive(Clone)]
pub struct PrescriptionRegistry {
    store: DynStore,
    retry: RetryPolicy,
    suffix_source: SuffixSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrescriptionLineInput {
    pub medicine_id: Uuid,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub duration: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrescriptionInput {
    pub patient_national_id: String,
    pub items: Vec<PrescriptionLineInput>,
    pub notes: Option<String>,
}

fn random_suffix() -> u16 {
    rand::thread_rng().gen_range(0..1000)
}

impl PrescriptionRegistry {
    pub fn new(store: DynStore) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            suffix_source: Arc::new(random_suffix),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the random 3-digit suffix generator
    pub fn with_suffix_source(mut self, source: impl Fn() -> u16 + Send + Sync + 'static) -> Self {
        self.suffix_source = Arc::new(source);
        self
    }

    /// Create a prescription for the patient with the given national ID.
    ///
    /// Stock is checked so the prescription displays as satisfiable, but
    /// nothing is reserved: availability is re-checked at fulfillment.
    pub async fn create_prescription(
        &self,
        doctor_id: Uuid,
        input: CreatePrescriptionInput,
    ) -> AppResult<Prescription> {
        let national_id = input.patient_national_id.trim().to_string();
        validate_national_id(&national_id)
            .map_err(|m| AppError::validation("patient_national_id", m))?;

        if input.items.is_empty() {
            return Err(AppError::validation(
                "items",
                "A prescription needs at least one medicine",
            ));
        }

        let mut lines = Vec::with_capacity(input.items.len());
        for (index, item) in input.items.iter().enumerate() {
            let quantity = validate_quantity(item.quantity)
                .map_err(|m| AppError::validation(&format!("items[{}].quantity", index), m))?;
            lines.push((item, quantity));
        }
        let notes = input
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let lines = &lines;
        let national_id = national_id.as_str();
        let notes = &notes;
        let prescription = with_retries(&self.retry, "create_prescription", move || async move {
            let mut uow = self.store.begin().await?;

            let doctor = uow
                .find_user(doctor_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Doctor".to_string()))?;
            if doctor.role() != Role::Doctor {
                return Err(AppError::Forbidden(
                    "Only doctors can issue prescriptions".to_string(),
                ));
            }

            let patient = uow
                .find_patient_by_national_id(national_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Patient".to_string()))?;

            let mut items = Vec::with_capacity(lines.len());
            let mut stock = HashMap::new();
            let mut names = HashMap::new();
            for (item, quantity) in lines.iter() {
                let medicine = uow
                    .get_medicine(item.medicine_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Medicine".to_string()))?;
                stock.insert(medicine.id, medicine.stock);
                names.insert(medicine.id, medicine.name.clone());
                items.push(PrescriptionItem {
                    medicine_id: medicine.id,
                    medicine_name: medicine.name,
                    dosage: item.dosage.trim().to_string(),
                    duration: item.duration.trim().to_string(),
                    quantity: *quantity,
                    quoted_unit_price: medicine.price,
                });
            }

            let requested: Vec<(Uuid, i32)> =
                items.iter().map(|i| (i.medicine_id, i.quantity)).collect();
            check_availability(&requested, &stock).map_err(|shortfall| {
                AppError::InsufficientStock {
                    medicine_id: shortfall.medicine_id,
                    medicine_name: names
                        .get(&shortfall.medicine_id)
                        .cloned()
                        .unwrap_or_default(),
                    requested: shortfall.requested,
                    available: shortfall.available,
                }
            })?;

            let now = Utc::now();
            let prescription_number = self.unused_number(uow.as_mut(), now).await?;
            let prescription = Prescription {
                id: Uuid::new_v4(),
                prescription_number,
                doctor_id,
                patient_id: patient.id,
                patient_national_id: national_id.to_string(),
                items,
                notes: notes.clone(),
                status: PrescriptionStatus::Active,
                created_at: now,
                fulfilled_at: None,
            };

            match uow.insert_prescription(&prescription).await {
                // Lost a race for the same number: start over with a fresh one
                Err(AppError::DuplicateEntry(field)) if field == "prescription_number" => {
                    return Err(AppError::TransactionConflict);
                }
                other => other?,
            }
            uow.commit().await?;
            Ok(prescription)
        })
        .await?;

        tracing::info!(
            prescription_number = %prescription.prescription_number,
            doctor_id = %doctor_id,
            patient_id = %prescription.patient_id,
            lines = prescription.items.len(),
            "Prescription created"
        );
        Ok(prescription)
    }

    /// `RX-YYYYMMDD-NNN` not yet used by any prescription
    async fn unused_number(
        &self,
        uow: &mut dyn UnitOfWork,
        now: chrono::DateTime<Utc>,
    ) -> AppResult<String> {
        let date = now.date_naive();
        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let candidate = format_prescription_number(date, (self.suffix_source)());
            if !uow.prescription_number_exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!(candidate = %candidate, "Prescription number taken, regenerating");
        }
        Err(AppError::Conflict {
            resource: "prescription_number".to_string(),
            message: format!(
                "Could not allocate a free prescription number for {}",
                date.format("%Y-%m-%d")
            ),
        })
    }

    pub async fn get_by_number(&self, number: &str) -> AppResult<Prescription> {
        let mut uow = self.store.begin().await?;
        uow.find_prescription_by_number(number.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("Prescription".to_string()))
    }

    /// Look up a prescription the user is allowed to see: the patient it was
    /// written for, the doctor who issued it, or any pharmacist
    pub async fn get_visible_to(
        &self,
        number: &str,
        user_id: Uuid,
        role: Role,
    ) -> AppResult<Prescription> {
        let prescription = self.get_by_number(number).await?;
        let visible = match role {
            Role::Pharmacist => true,
            Role::Doctor => prescription.doctor_id == user_id,
            Role::Patient => prescription.patient_id == user_id,
        };
        if !visible {
            return Err(AppError::Forbidden(
                "You do not have access to this prescription".to_string(),
            ));
        }
        Ok(prescription)
    }

    /// Newest first
    pub async fn get_for_patient(
        &self,
        patient_id: Uuid,
        status: Option<PrescriptionStatus>,
    ) -> AppResult<Vec<Prescription>> {
        self.list(PrescriptionFilter {
            patient_id: Some(patient_id),
            status,
            ..Default::default()
        })
        .await
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<PrescriptionStatus>,
    ) -> AppResult<Vec<Prescription>> {
        self.list(PrescriptionFilter {
            doctor_id: Some(doctor_id),
            status,
            ..Default::default()
        })
        .await
    }

    pub async fn list_all(&self, status: Option<PrescriptionStatus>) -> AppResult<Vec<Prescription>> {
        self.list(PrescriptionFilter {
            status,
            ..Default::default()
        })
        .await
    }

    async fn list(&self, filter: PrescriptionFilter) -> AppResult<Vec<Prescription>> {
        let mut uow = self.store.begin().await?;
        uow.list_prescriptions(&filter).await
    }

    /// Move an active prescription to fulfilled
    pub async fn mark_fulfilled(&self, prescription_id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        Self::mark_fulfilled_in(uow.as_mut(), prescription_id).await?;
        uow.commit().await
    }

    /// Compare-and-set inside a caller-owned unit of work
    pub async fn mark_fulfilled_in(uow: &mut dyn UnitOfWork, prescription_id: Uuid) -> AppResult<()> {
        let prescription = uow
            .find_prescription(prescription_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Prescription".to_string()))?;

        if !uow
            .mark_prescription_fulfilled(prescription_id, Utc::now())
            .await?
        {
            return Err(AppError::AlreadyFulfilled(prescription.prescription_number));
        }
        Ok(())
    }
}
