mod common;

use common::{admit, at, connection, hemogram, medication, prescription};
use hce::ehr::{imaging, records, supplies};
use hce::error::ClinicalError;
use hce::models::{NewImagingStudy, NewOrder, NewSupplyItem, NewSupplyUsage, StudyKind};

fn study(name: &str, date: Option<&str>, attachment: Option<&str>) -> NewImagingStudy {
    NewImagingStudy {
        kind: StudyKind::Image,
        exam_name: name.to_string(),
        result_date: date.map(|d| d.parse().unwrap()),
        attachment: attachment.map(str::to_string),
        notes: None,
    }
}

fn gauze(stock: f64) -> NewSupplyItem {
    NewSupplyItem { code: "GZ-01".to_string(), name: "Gauze".to_string(), stock, unit: "uni".to_string(), active: true }
}

#[actix_rt::test]
async fn order_lists_its_medications_and_lab_items() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 08:00");
    medication(&mut conn, "AMX500", 20.0).await;
    let exam = hemogram(&mut conn).await;
    let (_, record) = admit(&mut conn, "1001", vec![], now).await;

    let order = NewOrder {
        instructions: Some("  Start antibiotics ".to_string()),
        medications: vec![prescription("AMX500", 3.0)],
        lab_exam_ids: vec![exam.id],
        ..Default::default()
    };
    let view = records::create_order(&mut conn, record.id, order, now).await.unwrap();

    assert_eq!(view.order.instructions.as_deref(), Some("Start antibiotics"));
    assert_eq!(view.medications.len(), 1);
    assert_eq!(view.labs.len(), 1);
    assert_eq!(view.labs[0].exam_name, "Hemogram");
    assert_eq!(view.labs[0].status, "requested");

    let page = records::record_view(&mut conn, record.id).await.unwrap();
    assert_eq!(page.orders.len(), 1);
    assert_eq!(page.patient.number, "1001");
}

#[actix_rt::test]
async fn order_with_unknown_exam_is_refused() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 08:00");
    let (_, record) = admit(&mut conn, "1002", vec![], now).await;

    let order = NewOrder { lab_exam_ids: vec![404], ..Default::default() };
    let err = records::create_order(&mut conn, record.id, order, now).await.unwrap_err();
    assert!(matches!(err, ClinicalError::NotFound { .. }));

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medical_orders").fetch_one(&mut *conn).await.unwrap();
    assert_eq!(orders, 0);
}

#[actix_rt::test]
async fn imaging_lists_undated_studies_last() {
    let (_db, mut conn) = connection().await;
    let (_, record) = admit(&mut conn, "1003", vec![], at("2026-03-02 08:00")).await;

    imaging::register(&mut conn, record.id, study("Chest X-ray", None, None)).await.unwrap();
    imaging::register(&mut conn, record.id, study("CT head", Some("2026-03-01"), None)).await.unwrap();
    imaging::register(&mut conn, record.id, study("Abdominal US", Some("2026-03-02"), None)).await.unwrap();

    let names: Vec<String> =
        imaging::list(&mut conn, record.id).await.unwrap().into_iter().map(|s| s.exam_name).collect();
    assert_eq!(names, ["Abdominal US", "CT head", "Chest X-ray"]);
}

#[actix_rt::test]
async fn imaging_rejects_paths_outside_uploads() {
    let (_db, mut conn) = connection().await;
    let (_, record) = admit(&mut conn, "1004", vec![], at("2026-03-02 08:00")).await;

    let err = imaging::register(&mut conn, record.id, study("MRI", None, Some("../etc/passwd"))).await.unwrap_err();
    assert!(matches!(err, ClinicalError::Validation(_)));
}

#[actix_rt::test]
async fn study_attachment_outlives_a_rolled_back_delete() {
    let (db, mut conn) = connection().await;
    let (_, record) = admit(&mut conn, "1005", vec![], at("2026-03-02 08:00")).await;
    let saved = imaging::register(&mut conn, record.id, study("MRI", None, Some("scan-1005.pdf"))).await.unwrap();
    drop(conn);

    let uploads = std::env::temp_dir().join(format!("hce-uploads-{}", std::process::id()));
    tokio::fs::create_dir_all(&uploads).await.unwrap();
    tokio::fs::write(uploads.join("scan-1005.pdf"), b"%PDF").await.unwrap();

    let mut tx = db.begin().await.unwrap();
    let attachment = imaging::delete(&mut tx, saved.id).await.unwrap();
    assert_eq!(attachment.as_deref(), Some("scan-1005.pdf"));
    tx.rollback().await.unwrap();
    assert!(uploads.join("scan-1005.pdf").exists());

    let mut tx = db.begin().await.unwrap();
    let attachment = imaging::delete(&mut tx, saved.id).await.unwrap();
    tx.commit().await.unwrap();
    imaging::remove_attachment(&uploads, attachment.as_deref().unwrap()).await;

    assert!(!uploads.join("scan-1005.pdf").exists());
    let mut conn = db.acquire().await.unwrap();
    assert!(matches!(imaging::get(&mut conn, saved.id).await, Err(ClinicalError::NotFound { .. })));
    let _ = tokio::fs::remove_dir_all(&uploads).await;
}

#[actix_rt::test]
async fn supply_usage_moves_stock_both_ways() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 08:00");
    let (patient, _) = admit(&mut conn, "1006", vec![], now).await;
    let item = supplies::create(&mut conn, gauze(10.0), now).await.unwrap();

    let usage = NewSupplyUsage { patient_id: patient.id, supply_id: item.id, quantity: 4.0, notes: None };
    let used = supplies::record_usage(&mut conn, usage, now).await.unwrap();
    assert_eq!(used.code, "GZ-01");
    assert_eq!(supplies::get(&mut conn, item.id).await.unwrap().stock, 6.0);

    supplies::delete_usage(&mut conn, used.id).await.unwrap();
    assert_eq!(supplies::get(&mut conn, item.id).await.unwrap().stock, 10.0);
    assert!(supplies::list_usage(&mut conn, patient.id).await.unwrap().is_empty());
}

#[actix_rt::test]
async fn supply_usage_needs_a_positive_quantity() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 08:00");
    let (patient, _) = admit(&mut conn, "1007", vec![], now).await;
    let item = supplies::create(&mut conn, gauze(10.0), now).await.unwrap();

    let usage = NewSupplyUsage { patient_id: patient.id, supply_id: item.id, quantity: 0.0, notes: None };
    let err = supplies::record_usage(&mut conn, usage, now).await.unwrap_err();
    assert!(matches!(err, ClinicalError::Validation(_)));
}

#[actix_rt::test]
async fn deleting_a_supply_drops_its_usage() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 08:00");
    let (patient, _) = admit(&mut conn, "1008", vec![], now).await;
    let item = supplies::create(&mut conn, gauze(10.0), now).await.unwrap();
    let usage = NewSupplyUsage { patient_id: patient.id, supply_id: item.id, quantity: 1.0, notes: None };
    supplies::record_usage(&mut conn, usage, now).await.unwrap();

    supplies::delete(&mut conn, item.id).await.unwrap();

    assert!(supplies::list_usage(&mut conn, patient.id).await.unwrap().is_empty());
    assert!(matches!(supplies::get(&mut conn, item.id).await, Err(ClinicalError::NotFound { .. })));
}
