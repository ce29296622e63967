#![allow(dead_code)]

use chrono::NaiveDateTime;
use hce::db::Database;
use hce::ehr::{catalogs, patients};
use hce::models::{AdmissionForm, NewMedication, NewPatient, Patient, PrescribedMedication, RecordDetails};
use hce::models::{ClinicalRecord, LabExam, NewLabExam, NewLabParameter};
use sqlx::pool::PoolConnection;
use sqlx::Sqlite;

pub async fn database() -> Database {
    let db = Database::connect("sqlite::memory:", 1).await.unwrap();
    db.run_migrations().await.unwrap();
    db
}

pub async fn connection() -> (Database, PoolConnection<Sqlite>) {
    let db = database().await;
    let conn = db.acquire().await.unwrap();
    (db, conn)
}

pub fn at(ts: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M").unwrap()
}

pub fn new_patient(name: &str, number: &str) -> NewPatient {
    NewPatient { name: name.to_string(), number: number.to_string(), bed: Some("101".to_string()) }
}

pub fn prescription(code: &str, quantity: f64) -> PrescribedMedication {
    PrescribedMedication {
        code: code.to_string(),
        dose: Some("500 mg".to_string()),
        frequency: Some("every 8 h".to_string()),
        requested_quantity: Some(quantity),
        inventory_unit: Some("tab".to_string()),
        route: Some("oral".to_string()),
    }
}

pub async fn admit(
    conn: &mut sqlx::SqliteConnection,
    number: &str,
    medications: Vec<PrescribedMedication>,
    now: NaiveDateTime,
) -> (Patient, ClinicalRecord) {
    let form = AdmissionForm {
        patient: new_patient("Ana Ruiz", number),
        record_type: None,
        details: RecordDetails { admission_number: Some(format!("ING-{}", number)), ..Default::default() },
        vitals: Default::default(),
        medications,
    };
    patients::admit(conn, form, now).await.unwrap()
}

pub async fn medication(conn: &mut sqlx::SqliteConnection, code: &str, stock: f64) {
    catalogs::create_medication(
        conn,
        NewMedication {
            code: code.to_string(),
            name: format!("Medication {}", code),
            dosage_form: Some("tablet".to_string()),
            presentation: None,
            stock,
            inventory_unit: Some("tab".to_string()),
        },
    )
    .await
    .unwrap();
}

/// Exam with a single "Hemoglobin" parameter, reference 12 to 16 g/dL.
pub async fn hemogram(conn: &mut sqlx::SqliteConnection) -> LabExam {
    let exam = catalogs::create_exam(
        &mut *conn,
        NewLabExam { name: "Hemogram".to_string(), group_name: Some("Hematology".to_string()) },
    )
    .await
    .unwrap();
    catalogs::add_parameter(
        &mut *conn,
        exam.id,
        NewLabParameter {
            name: "Hemoglobin".to_string(),
            unit: Some("g/dL".to_string()),
            ref_min: Some(12.0),
            ref_max: Some(16.0),
        },
    )
    .await
    .unwrap();
    exam
}
