mod common;

use common::{admit, at, connection, new_patient, prescription};
use fake::faker::name::en::Name;
use fake::Fake;
use hce::ehr::{labs, nursing, patients, records};
use hce::models::{PatientSearch, SearchCriterion};
use hce::ClinicalError;

#[actix_rt::test]
async fn create_opens_a_blank_nursing_entry() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 09:00");

    let patient = patients::create(&mut conn, new_patient("  Ana Ruiz ", "1001"), now).await.unwrap();
    assert_eq!(patient.name, "Ana Ruiz");

    let history = nursing::list_for_patient(&mut conn, patient.id).await.unwrap();
    assert_eq!(history.entries.len(), 1);
    assert!(history.entries[0].vitals.is_empty());
}

#[actix_rt::test]
async fn duplicate_number_is_rejected() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 09:00");

    patients::create(&mut conn, new_patient("Ana Ruiz", "1001"), now).await.unwrap();
    let err = patients::create(&mut conn, new_patient("Luis Gil", "1001"), now).await.unwrap_err();
    assert!(matches!(err, ClinicalError::Duplicate(_)));
}

#[actix_rt::test]
async fn blank_name_is_rejected() {
    let (_db, mut conn) = connection().await;
    let err = patients::create(&mut conn, new_patient("   ", "1001"), at("2026-03-02 09:00")).await.unwrap_err();
    assert!(matches!(err, ClinicalError::Validation(_)));
}

#[actix_rt::test]
async fn lists_ten_per_page() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 09:00");
    for i in 0..12 {
        let name: String = Name().fake();
        patients::create(&mut conn, new_patient(&name, &format!("20{:02}", i)), now).await.unwrap();
    }

    let first = patients::list(&mut conn, 1).await.unwrap();
    assert_eq!(first.patients.len(), 10);
    assert_eq!(first.total, 12);
    assert_eq!(first.pages(), 2);

    let second = patients::list(&mut conn, 2).await.unwrap();
    assert_eq!(second.patients.len(), 2);
}

#[actix_rt::test]
async fn search_by_number_can_require_records() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 09:00");
    patients::create(&mut conn, new_patient("Luis Gil", "3001"), now).await.unwrap();
    admit(&mut conn, "3002", Vec::new(), now).await;

    let search = |with_records| PatientSearch {
        criterion: SearchCriterion::Number,
        value: "300".to_string(),
        with_records,
    };
    assert_eq!(patients::search(&mut conn, &search(false)).await.unwrap().len(), 2);

    let admitted = patients::search(&mut conn, &search(true)).await.unwrap();
    assert_eq!(admitted.len(), 1);
    assert_eq!(admitted[0].number, "3002");
}

#[actix_rt::test]
async fn accented_names_match_in_any_case() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 09:00");
    patients::create(&mut conn, new_patient("JOSÉ GÓMEZ", "5001"), now).await.unwrap();
    patients::create(&mut conn, new_patient("Luis Gil", "5002"), now).await.unwrap();

    let by_name = |value: &str| PatientSearch {
        criterion: SearchCriterion::Name,
        value: value.to_string(),
        with_records: false,
    };
    for term in ["GÓMEZ", "gómez", "José Gó"] {
        let found = patients::search(&mut conn, &by_name(term)).await.unwrap();
        assert_eq!(found.len(), 1, "search {:?}", term);
        assert_eq!(found[0].number, "5001");
    }

    let options = patients::autocomplete(&mut conn, "JOSÉ").await.unwrap();
    assert_eq!(options.len(), 1);
    let info = patients::lookup_info(&mut conn, "josé").await.unwrap().unwrap();
    assert_eq!(info.number, "5001");
}

#[actix_rt::test]
async fn lookup_falls_back_to_admission_number() {
    let (_db, mut conn) = connection().await;
    admit(&mut conn, "4001", Vec::new(), at("2026-03-02 09:00")).await;

    let info = patients::lookup_info(&mut conn, "ING-4001").await.unwrap().unwrap();
    assert_eq!(info.number, "4001");
    assert_eq!(info.admission_number.as_deref(), Some("ING-4001"));

    assert!(patients::lookup_info(&mut conn, "nobody").await.unwrap().is_none());
}

#[actix_rt::test]
async fn delete_removes_everything_filed_under_the_patient() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 09:00");
    common::medication(&mut conn, "M001", 10.0).await;
    let exam = common::hemogram(&mut conn).await;
    let (patient, record) = admit(&mut conn, "5001", vec![prescription("M001", 3.0)], now).await;
    labs::create_request(&mut conn, record.id, exam.id, now).await.unwrap();

    patients::delete(&mut conn, patient.id).await.unwrap();

    assert!(matches!(
        patients::get(&mut conn, patient.id).await.unwrap_err(),
        ClinicalError::NotFound { .. }
    ));
    assert!(matches!(records::get(&mut conn, record.id).await.unwrap_err(), ClinicalError::NotFound { .. }));
    for table in ["prescribed_medications", "lab_requests", "lab_results", "admission_vitals"] {
        let left: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(left, 0, "{} still has rows", table);
    }
}
