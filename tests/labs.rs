mod common;

use common::{admit, at, connection, hemogram};
use hce::ehr::labs;
use hce::import::{self, Sheet};
use hce::models::{LabStatus, ResultEntry};
use hce::ClinicalError;
use rust_xlsxwriter::Workbook;

#[actix_rt::test]
async fn request_opens_one_empty_result_per_parameter() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 09:00");
    let exam = hemogram(&mut conn).await;
    let (_, record) = admit(&mut conn, "1001", Vec::new(), now).await;

    let detail = labs::create_request(&mut conn, record.id, exam.id, now).await.unwrap();
    assert_eq!(detail.request.status, LabStatus::Pending);
    assert_eq!(detail.results.len(), 1);
    assert_eq!(detail.results[0].unit.as_deref(), Some("g/dL"));
    assert!(detail.results[0].value.is_none());
}

#[actix_rt::test]
async fn unknown_exam_is_not_found() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 09:00");
    let (_, record) = admit(&mut conn, "1001", Vec::new(), now).await;

    let err = labs::create_request(&mut conn, record.id, 999, now).await.unwrap_err();
    assert!(matches!(err, ClinicalError::NotFound { .. }));
}

#[actix_rt::test]
async fn captured_values_are_flagged_against_reference() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 09:00");
    let exam = hemogram(&mut conn).await;
    let (_, record) = admit(&mut conn, "1001", Vec::new(), now).await;
    let detail = labs::create_request(&mut conn, record.id, exam.id, now).await.unwrap();

    let entries = vec![ResultEntry {
        result_id: detail.results[0].id,
        value: Some("11,2".to_string()),
        interpretation: Some("Mild anaemia".to_string()),
    }];
    let captured = labs::capture_results(&mut conn, detail.request.id, entries, at("2026-03-02 15:00")).await.unwrap();

    assert_eq!(captured.request.status, LabStatus::Interpreted);
    assert_eq!(captured.request.resulted_at, Some(at("2026-03-02 15:00")));
    assert!(captured.results[0].out_of_range);
    assert_eq!(captured.results[0].interpretation.as_deref(), Some("Mild anaemia"));
}

#[actix_rt::test]
async fn results_of_another_request_are_refused() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 09:00");
    let exam = hemogram(&mut conn).await;
    let (_, record) = admit(&mut conn, "1001", Vec::new(), now).await;
    let first = labs::create_request(&mut conn, record.id, exam.id, now).await.unwrap();
    let second = labs::create_request(&mut conn, record.id, exam.id, now).await.unwrap();

    let entries = vec![ResultEntry { result_id: first.results[0].id, value: Some("13".to_string()), interpretation: None }];
    let err = labs::capture_results(&mut conn, second.request.id, entries, now).await.unwrap_err();
    assert!(matches!(err, ClinicalError::NotFound { .. }));
}

#[actix_rt::test]
async fn imported_results_group_by_laboratory_and_date() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-05 10:00");
    hemogram(&mut conn).await;
    let (_, record) = admit(&mut conn, "1001", Vec::new(), now).await;

    let sheet = Sheet::parse(
        "NUMERO_PACIENTE,EXAMEN,PARAMETRO,VALOR,FECHA_RESULTADO,LABORATORIO\n\
         1001,Hemogram,Hemoglobin,13.1,03/03/2026,Central\n\
         1001,hemogram,HEMOGLOBIN,17.2,03/03/2026,Central\n\
         1001,Hemogram,Hemoglobin,12.5,2026-03-04,Central\n\
         9999,Hemogram,Hemoglobin,12.0,03/03/2026,Central\n\
         1001,Hemogram,Platelets,250,03/03/2026,Central\n\
         1001,Hemogram,Hemoglobin,12.0,31/02/2026,Central\n",
    )
    .unwrap();

    let report = import::labs::import_results(&mut conn, &sheet, now, 10).await.unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(report.errors.len(), 3);
    assert!(report.errors[0].starts_with("Row 5:"), "{:?}", report.errors);

    let requests = labs::list_requests(&mut conn, record.id).await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.status == LabStatus::Completed));

    // The second row replaced the first on the same request.
    let march_3 = requests.iter().find(|r| r.resulted_at == Some(at("2026-03-03 00:00"))).unwrap();
    let detail = labs::request_detail(&mut conn, march_3.id).await.unwrap();
    assert_eq!(detail.results.len(), 1);
    assert_eq!(detail.results[0].value.as_deref(), Some("17.2"));
    assert!(detail.results[0].out_of_range);
}

#[actix_rt::test]
async fn workbook_results_match_accented_exam_names() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-05 10:00");
    let catalog = Sheet::parse(
        "EXAMEN,GRUPO,PARAMETRO,UNIDAD,VALOR_REF_MIN,VALOR_REF_MAX,TIPO\n\
         ÁCIDO ÚRICO,QUÍMICA,ÁCIDO ÚRICO SÉRICO,mg/dL,2.4,6,numeric\n",
    )
    .unwrap();
    import::catalogs::import_lab_catalog(&mut conn, &catalog, 10).await.unwrap();
    let (_, record) = admit(&mut conn, "1001", Vec::new(), now).await;

    let mut workbook = Workbook::new();
    workbook.add_worksheet().set_name("Instrucciones").unwrap();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(import::labs::RESULTS_WORKSHEET).unwrap();
    for (col, header) in import::labs::REQUIRED_COLUMNS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header).unwrap();
    }
    worksheet.write_number(1, 0, 1001.0).unwrap();
    worksheet.write_string(1, 1, "Ácido Úrico").unwrap();
    worksheet.write_string(1, 2, "ácido úrico sérico").unwrap();
    worksheet.write_number(1, 3, 7.1).unwrap();
    worksheet.write_string(1, 4, "03/03/2026").unwrap();
    worksheet.write_string(1, 5, "Central").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let sheet = Sheet::from_upload_preferring(&bytes, Some(import::labs::RESULTS_WORKSHEET)).unwrap();
    let report = import::labs::import_results(&mut conn, &sheet, now, 10).await.unwrap();
    assert_eq!(report.created, 1, "{:?}", report.errors);

    let requests = labs::list_requests(&mut conn, record.id).await.unwrap();
    let detail = labs::request_detail(&mut conn, requests[0].id).await.unwrap();
    assert_eq!(detail.results[0].value.as_deref(), Some("7.1"));
    assert!(detail.results[0].out_of_range);
}
