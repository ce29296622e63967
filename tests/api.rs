mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use hce::api::{self, middleware, AppState};
use hce::config::{ClinicConfig, Config, DatabaseConfig, ImportConfig, LogConfig, ServerConfig};
use hce::utils::ClinicClock;
use rust_xlsxwriter::Workbook;
use serde_json::{json, Value};

fn test_config() -> Config {
    Config {
        server: ServerConfig { host: "127.0.0.1".to_string(), port: 0 },
        database: DatabaseConfig { url: "sqlite::memory:".to_string(), max_connections: 1 },
        clinic: ClinicConfig { utc_offset_hours: -5, edit_grace_minutes: 120, uploads_dir: "uploads".to_string() },
        log: LogConfig { level: "info".to_string(), json: false },
        import: ImportConfig { patient_error_cap: 5, lab_error_cap: 10, catalog_error_cap: 1, supply_error_cap: 10 },
    }
}

async fn state() -> web::Data<AppState> {
    let db = common::database().await;
    let mut state = AppState::new(db, test_config());
    state.clock = ClinicClock::fixed(common::at("2026-03-02 09:00"));
    web::Data::new(state)
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .app_data(middleware::json_config())
                .app_data(middleware::query_config())
                .app_data(middleware::payload_config())
                .wrap(middleware::request_logger())
                .configure(api::configure),
        )
        .await
    };
}

#[actix_rt::test]
async fn health_reports_ok() {
    let state = state().await;
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_rt::test]
async fn patient_round_trip_through_the_api() {
    let state = state().await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/patients")
        .set_json(json!({ "name": "Ana Ruiz", "number": "1001", "bed": "3B" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::get().uri(&format!("/api/patients/{}", id)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["number"], "1001");

    let req = test::TestRequest::get().uri("/api/patients/autocomplete?q=ana").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[actix_rt::test]
async fn errors_use_the_json_envelope() {
    let state = state().await;
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/patients/42").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");

    let req = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn wrong_shift_is_forbidden() {
    let state = state().await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/patients")
        .set_json(json!({ "name": "Ana Ruiz", "number": "1001" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/nursing/patients/{}/entries", id))
        .set_json(json!({ "shift": "night", "vitals": { "heart_rate": "80" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn import_with_rejected_rows_answers_with_a_warning() {
    let state = state().await;
    let app = app!(state);

    let csv = "codigo,nombre,forma_farmaceutica,presentacion,cantidad_disponible,unidad_inventario\n\
               M001,Acetaminophen,tablet,500 mg,10,tab\n\
               ,Nameless,tablet,,1,tab\n";
    let req = test::TestRequest::post()
        .uri("/api/catalogs/medications/import")
        .insert_header(("content-type", "text/csv"))
        .set_payload(csv)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "warning");
    assert_eq!(body["data"]["created"], 1);
    assert_eq!(body["data"]["failed"], 1);
}

#[actix_rt::test]
async fn catalog_imports_show_the_configured_number_of_errors() {
    let state = state().await;
    let app = app!(state);

    let csv = "codigo,nombre,forma_farmaceutica,presentacion,cantidad_disponible,unidad_inventario\n\
               ,First,tablet,,1,tab\n\
               ,Second,tablet,,1,tab\n";
    let req = test::TestRequest::post()
        .uri("/api/catalogs/medications/import")
        .insert_header(("content-type", "text/csv"))
        .set_payload(csv)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["failed"], 2);
    assert_eq!(body["data"]["errors"].as_array().unwrap().len(), 1);
}

#[actix_rt::test]
async fn imports_accept_xlsx_workbooks() {
    let state = state().await;
    let app = app!(state);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, header) in ["codigo", "nombre", "stock_actual", "unidad", "activo"].iter().enumerate() {
        worksheet.write_string(0, col as u16, *header).unwrap();
    }
    worksheet.write_string(1, 0, "S001").unwrap();
    worksheet.write_string(1, 1, "GASA ESTÉRIL").unwrap();
    worksheet.write_number(1, 2, 25.0).unwrap();
    worksheet.write_string(1, 4, "si").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let req = test::TestRequest::post()
        .uri("/api/supplies/import")
        .insert_header(("content-type", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"))
        .set_payload(bytes)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["created"], 1);

    let req = test::TestRequest::get().uri("/api/supplies?q=est%C3%A9ril").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["stock"], 25.0);
}
