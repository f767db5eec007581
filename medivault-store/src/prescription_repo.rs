use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use medivault_core::{
    CoreError, CoreResult, MedicationLine, PrescriptionHeader, PrescriptionStore,
    StoredPrescription,
};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error};

pub struct PgPrescriptionStore {
    pool: PgPool,
}

impl PgPrescriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct PrescriptionRow {
    prescription_id: i64,
    patient_id: i64,
    doctor_id: i64,
    source: String,
    prescribed_date: NaiveDate,
    s3_image_url: String,
    fhir_json: Option<Value>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct LineRow {
    medicine_name: String,
    dosage: String,
    frequency: String,
    duration: String,
    route: Option<String>,
    notes: Option<String>,
}

fn storage_error(e: sqlx::Error) -> CoreError {
    CoreError::StorageUnavailable(e.to_string())
}

async fn insert_prescription(
    tx: &mut Transaction<'_, Postgres>,
    header: &PrescriptionHeader,
    lines: &[MedicationLine],
) -> Result<i64, sqlx::Error> {
    let prescription_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO prescriptions (patient_id, doctor_id, source, prescribed_date, s3_image_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING prescription_id
        "#,
    )
    .bind(header.patient_id)
    .bind(header.prescriber_id)
    .bind(&header.source)
    .bind(header.prescribed_date)
    .bind(&header.source_image_ref)
    .fetch_one(&mut **tx)
    .await?;

    for line in lines {
        sqlx::query(
            "INSERT INTO medicines (medicine_name) VALUES ($1) ON CONFLICT (medicine_name) DO NOTHING",
        )
        .bind(&line.name)
        .execute(&mut **tx)
        .await?;

        let medicine_id: i64 =
            sqlx::query_scalar("SELECT medicine_id FROM medicines WHERE medicine_name = $1")
                .bind(&line.name)
                .fetch_one(&mut **tx)
                .await?;

        sqlx::query(
            r#"
            INSERT INTO prescription_medicines
                (prescription_id, medicine_id, dosage, frequency, duration, route, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(prescription_id)
        .bind(medicine_id)
        .bind(&line.dosage)
        .bind(&line.frequency)
        .bind(&line.duration)
        .bind(&line.route)
        .bind(&line.notes)
        .execute(&mut **tx)
        .await?;
    }

    Ok(prescription_id)
}

#[async_trait]
impl PrescriptionStore for PgPrescriptionStore {
    async fn save(
        &self,
        header: &PrescriptionHeader,
        lines: &[MedicationLine],
    ) -> CoreResult<i64> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        match insert_prescription(&mut tx, header, lines).await {
            Ok(prescription_id) => {
                tx.commit().await.map_err(storage_error)?;
                debug!(
                    "Committed prescription {} with {} lines",
                    prescription_id,
                    lines.len()
                );
                Ok(prescription_id)
            }
            Err(e) => {
                error!("Prescription insert failed, rolling back: {}", e);
                if let Err(rollback_err) = tx.rollback().await {
                    error!("Rollback failed: {}", rollback_err);
                }
                Err(storage_error(e))
            }
        }
    }

    async fn update_bundle(&self, prescription_id: i64, bundle: &Value) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE prescriptions SET fhir_json = $1 WHERE prescription_id = $2 AND fhir_json IS NULL",
        )
        .bind(bundle)
        .bind(prescription_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "prescription {} has no pending bundle",
                prescription_id
            )));
        }
        Ok(())
    }

    async fn get_prescription(
        &self,
        prescription_id: i64,
    ) -> CoreResult<Option<StoredPrescription>> {
        let row = sqlx::query_as::<_, PrescriptionRow>(
            r#"
            SELECT prescription_id, patient_id, doctor_id, source, prescribed_date,
                   s3_image_url, fhir_json, created_at
            FROM prescriptions
            WHERE prescription_id = $1
            "#,
        )
        .bind(prescription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT m.medicine_name, pm.dosage, pm.frequency, pm.duration, pm.route, pm.notes
            FROM prescription_medicines pm
            JOIN medicines m ON m.medicine_id = pm.medicine_id
            WHERE pm.prescription_id = $1
            ORDER BY pm.id
            "#,
        )
        .bind(prescription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(Some(StoredPrescription {
            id: row.prescription_id,
            header: PrescriptionHeader {
                patient_id: row.patient_id,
                prescriber_id: row.doctor_id,
                source: row.source,
                prescribed_date: row.prescribed_date,
                source_image_ref: row.s3_image_url,
            },
            lines: lines
                .into_iter()
                .map(|l| MedicationLine {
                    name: l.medicine_name,
                    dosage: l.dosage,
                    frequency: l.frequency,
                    duration: l.duration,
                    route: l.route,
                    notes: l.notes,
                })
                .collect(),
            bundle: row.fhir_json,
            created_at: row.created_at,
        }))
    }

    async fn ping(&self) -> CoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}
