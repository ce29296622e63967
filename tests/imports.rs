mod common;

use common::{at, connection};
use fake::faker::name::en::Name;
use fake::Fake;
use hce::ehr::{catalogs, nursing, patients, records, supplies};
use hce::import::{self, Sheet};
use hce::ClinicalError;

const PATIENT_HEADER: &str = "NOMBRE;NUMERO;CAMA;NUMERO_HC;NUMERO_INGRESO;SERVICIO;REGIMEN;ESTRATO;PLAN_BENEFICIOS;\
ACUDIENTE;TEL_ACUDIENTE;DIR_ACUDIENTE;PADRE;MADRE;SUBJETIVOS;OBJETIVOS;ANALISIS;PLAN;TIENE_ALERGIAS;DESC_ALERGIAS;FC";

fn patient_row(name: &str, number: &str, allergies: &str, description: &str) -> String {
    format!(
        "{};{};12A;HC-{};ING-{};Internal medicine;Contributivo;2;POS;Guardian;3001234567;Calle 1;Father;Mother;\
         Headache;Alert;Stable;Observe;{};{};82",
        name, number, number, number, allergies, description
    )
}

fn patient_sheet(rows: &[String]) -> Sheet {
    let mut text = String::from(PATIENT_HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    Sheet::parse(&text).unwrap()
}

#[actix_rt::test]
async fn patient_import_keeps_valid_rows_and_reports_the_rest() {
    let (_db, mut conn) = connection().await;
    let now = at("2026-03-02 09:00");
    patients::create(&mut conn, common::new_patient("Existing", "7000"), now).await.unwrap();

    let mut rows: Vec<String> = (1..=3)
        .map(|i| patient_row(&Name().fake::<String>(), &format!("700{}", i), "no", ""))
        .collect();
    rows.push(patient_row("", "7004", "no", ""));
    rows.push(patient_row("Dup Licate", "7000", "no", ""));
    rows.push(patient_row("Alma Paz", "7005", "si", ""));

    let report = import::patients::import(&mut conn, &patient_sheet(&rows), now, 5).await.unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(report.errors.len(), 3);
    assert!(report.errors[0].starts_with("Row 5:"), "{:?}", report.errors);

    let imported = patients::find_by_number(&mut conn, "7002").await.unwrap().unwrap();
    let record = records::latest_for_patient(&mut conn, imported.id).await.unwrap().unwrap();
    assert_eq!(record.record_type, "admission");
    assert_eq!(record.details.admission_number.as_deref(), Some("ING-7002"));
    assert_eq!(record.details.stratum, Some(2));

    let history = nursing::list_for_patient(&mut conn, imported.id).await.unwrap();
    assert_eq!(history.entries.len(), 1);
    assert_eq!(history.entries[0].record_id, Some(record.id));

    // The rejected allergy row left nothing behind.
    assert!(patients::find_by_number(&mut conn, "7005").await.unwrap().is_none());
}

#[actix_rt::test]
async fn error_list_is_capped_for_display() {
    let (_db, mut conn) = connection().await;
    let rows: Vec<String> = (0..8).map(|i| patient_row("", &format!("80{}", i), "no", "")).collect();

    let report = import::patients::import(&mut conn, &patient_sheet(&rows), at("2026-03-02 09:00"), 5).await.unwrap();
    let summary = report.summary();
    assert_eq!(summary.failed, 8);
    assert_eq!(summary.errors.len(), 5);
    assert!(summary.message.contains("8 rows with errors"));
}

#[actix_rt::test]
async fn missing_columns_abort_before_any_write() {
    let (_db, mut conn) = connection().await;
    let sheet = Sheet::parse("NOMBRE,NUMERO\nAna Ruiz,9001\n").unwrap();

    let err = import::patients::import(&mut conn, &sheet, at("2026-03-02 09:00"), 5).await.unwrap_err();
    match err {
        ClinicalError::Validation(msg) => {
            assert!(msg.starts_with("Missing required columns: CAMA"));
            assert!(msg.contains("PLAN"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(patients::find_by_number(&mut conn, "9001").await.unwrap().is_none());
}

#[actix_rt::test]
async fn medications_upsert_by_code() {
    let (_db, mut conn) = connection().await;
    common::medication(&mut conn, "M001", 4.0).await;

    let sheet = Sheet::parse(
        "codigo,nombre,forma_farmaceutica,presentacion,cantidad_disponible,unidad_inventario\n\
         M001,Acetaminophen,tablet,500 mg,120,tab\n\
         M002,Ibuprofen,tablet,400 mg,\"60,5\",tab\n\
         M003,Broken,tablet,,-3,tab\n\
         ,Nameless,tablet,,1,tab\n",
    )
    .unwrap();
    let report = import::catalogs::import_medications(&mut conn, &sheet, 10).await.unwrap();
    assert_eq!((report.created, report.updated, report.errors.len()), (1, 1, 2));

    let found = catalogs::search_medications(&mut conn, "M00").await.unwrap();
    let first = found.iter().find(|m| m.code == "M001").unwrap();
    assert_eq!(first.name, "Acetaminophen");
    assert_eq!(first.stock, 120.0);
    assert_eq!(found.iter().find(|m| m.code == "M002").unwrap().stock, 60.5);
}

#[actix_rt::test]
async fn icd10_codes_are_uppercased_and_searchable() {
    let (_db, mut conn) = connection().await;
    let sheet = Sheet::parse("Codigo;Nombre;Descripcion\nj189;Pneumonia, unspecified;\nA09;Gastroenteritis;Infectious\n").unwrap();

    let report = import::catalogs::import_icd10(&mut conn, &sheet, 10).await.unwrap();
    assert_eq!(report.created, 2);

    let options = catalogs::autocomplete_icd10(&mut conn, "j1").await.unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].label, "J189 - Pneumonia, unspecified");

    let codes = catalogs::search_icd10(&mut conn, "a09").await.unwrap();
    catalogs::toggle_icd10(&mut conn, codes[0].id).await.unwrap();
    assert!(catalogs::autocomplete_icd10(&mut conn, "gastro").await.unwrap().is_empty());
}

#[actix_rt::test]
async fn lab_catalog_counts_new_exams_and_parameters() {
    let (_db, mut conn) = connection().await;
    let sheet = Sheet::parse(
        "EXAMEN,GRUPO,PARAMETRO,UNIDAD,VALOR_REF_MIN,VALOR_REF_MAX,TIPO\n\
         Hemogram,Hematology,Hemoglobin,g/dL,12,16,numeric\n\
         Hemogram,Hematology,Hematocrit,%,36,46,numeric\n\
         Glucose,Chemistry,Fasting glucose,mg/dL,70,100,numeric\n\
         Hemogram,Hematology,Hemoglobin,g/dL,12.5,16,numeric\n\
         ,Chemistry,Orphan,,,,numeric\n",
    )
    .unwrap();

    let result = import::catalogs::import_lab_catalog(&mut conn, &sheet, 10).await.unwrap();
    assert_eq!(result.new_exams, 2);
    assert_eq!(result.new_parameters, 3);
    assert_eq!(result.report.updated, 1);
    assert_eq!(result.report.errors.len(), 1);

    let exams = catalogs::search_exams(&mut conn, "hemo").await.unwrap();
    let detail = catalogs::exam_detail(&mut conn, exams[0].id).await.unwrap();
    assert_eq!(detail.parameters.len(), 2);
    assert_eq!(detail.parameters[0].ref_min, Some(12.5));
}

#[actix_rt::test]
async fn accented_exam_names_are_not_duplicated() {
    let (_db, mut conn) = connection().await;
    let catalog = "EXAMEN,GRUPO,PARAMETRO,UNIDAD,VALOR_REF_MIN,VALOR_REF_MAX,TIPO\n\
                   ÁCIDO ÚRICO,QUÍMICA,ÁCIDO ÚRICO SÉRICO,mg/dL,2.4,6,numeric\n";

    let first = import::catalogs::import_lab_catalog(&mut conn, &Sheet::parse(catalog).unwrap(), 10).await.unwrap();
    assert_eq!(first.new_exams, 1);
    let again = import::catalogs::import_lab_catalog(&mut conn, &Sheet::parse(catalog).unwrap(), 10).await.unwrap();
    assert_eq!(again.new_exams, 0);
    assert_eq!(again.new_parameters, 0);
    assert_eq!(again.report.updated, 1);

    let exams: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lab_exams").fetch_one(&mut *conn).await.unwrap();
    assert_eq!(exams, 1);

    let err = catalogs::create_exam(
        &mut conn,
        hce::models::NewLabExam { name: "ácido úrico".to_string(), group_name: None },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClinicalError::Duplicate(_)));

    assert_eq!(catalogs::search_exams(&mut conn, "química").await.unwrap().len(), 1);
}

#[actix_rt::test]
async fn accented_catalog_names_are_searchable() {
    let (_db, mut conn) = connection().await;
    let medications = Sheet::parse(
        "codigo;nombre;forma_farmaceutica;presentacion;cantidad_disponible;unidad_inventario\n\
         M100;ÁCIDO FÓLICO;tableta;1 mg;30;tab\n",
    )
    .unwrap();
    import::catalogs::import_medications(&mut conn, &medications, 10).await.unwrap();
    assert_eq!(catalogs::search_medications(&mut conn, "fólico").await.unwrap().len(), 1);
    assert_eq!(catalogs::lookup_medications(&mut conn, "Ácido").await.unwrap().len(), 1);

    let icd10 = Sheet::parse("Codigo;Nombre;Descripcion\nE55;DEFICIENCIA DE VITAMINA D;\n").unwrap();
    import::catalogs::import_icd10(&mut conn, &icd10, 10).await.unwrap();
    assert_eq!(catalogs::autocomplete_icd10(&mut conn, "e5").await.unwrap().len(), 1);
    assert_eq!(catalogs::search_icd10(&mut conn, "vitamina").await.unwrap().len(), 1);

    let supplies_sheet = Sheet::parse("codigo,nombre,stock_actual,unidad,activo\nS900,CATÉTER Nº 18,5,,si\n").unwrap();
    import::catalogs::import_supplies(&mut conn, &supplies_sheet, at("2026-03-02 09:00"), 10).await.unwrap();
    assert_eq!(supplies::search(&mut conn, "catéter").await.unwrap().len(), 1);
}

#[actix_rt::test]
async fn supplies_default_unit_and_active_flag() {
    let (_db, mut conn) = connection().await;
    let sheet = Sheet::parse(
        "codigo,nombre,stock_actual,unidad,activo\n\
         S001,Gauze,100,,si\n\
         S002,Syringe 5 mL,40,box,no\n",
    )
    .unwrap();

    let report = import::catalogs::import_supplies(&mut conn, &sheet, at("2026-03-02 09:00"), 10).await.unwrap();
    assert_eq!(report.created, 2);

    let items = supplies::search(&mut conn, "S00").await.unwrap();
    let gauze = items.iter().find(|s| s.code == "S001").unwrap();
    assert_eq!(gauze.unit, "uni");
    assert!(gauze.active);
    assert!(!items.iter().find(|s| s.code == "S002").unwrap().active);
}
