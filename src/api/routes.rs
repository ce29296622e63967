//! Route table. Fixed paths are registered before `{id}` paths that would
//! otherwise capture them.

use actix_web::web;

use super::handlers::{self, catalogs, nursing, patients, records, supplies};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health)).service(
        web::scope("/api")
            .configure(patient_routes)
            .configure(record_routes)
            .configure(nursing_routes)
            .configure(catalog_routes)
            .configure(supply_routes),
    );
}

fn patient_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/patients")
            .service(
                web::resource("")
                    .route(web::get().to(patients::list))
                    .route(web::post().to(patients::create)),
            )
            .route("/admissions", web::post().to(patients::admit))
            .route("/search", web::get().to(patients::search))
            .route("/autocomplete", web::get().to(patients::autocomplete))
            .route("/lookup", web::get().to(patients::lookup))
            .route("/import", web::post().to(patients::import))
            .service(
                web::resource("/{id}")
                    .route(web::get().to(patients::get))
                    .route(web::delete().to(patients::delete)),
            )
            .route("/{id}/records", web::get().to(patients::records))
            .route("/{id}/supplies", web::get().to(supplies::patient_usage)),
    );
}

fn record_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/records")
            .route("/{id}", web::get().to(records::view))
            .route("/{id}/orders", web::post().to(records::create_order))
            .service(
                web::resource("/{id}/labs")
                    .route(web::get().to(records::list_labs))
                    .route(web::post().to(records::request_lab)),
            )
            .service(
                web::resource("/{id}/imaging")
                    .route(web::get().to(records::list_imaging))
                    .route(web::post().to(records::register_imaging)),
            ),
    )
    .service(
        web::scope("/labs")
            .route("/import", web::post().to(records::import_lab_results))
            .service(
                web::resource("/requests/{id}")
                    .route(web::get().to(records::lab_request))
                    .route(web::put().to(records::capture_results)),
            ),
    )
    .service(
        web::resource("/imaging/{id}")
            .route(web::put().to(records::update_imaging))
            .route(web::delete().to(records::delete_imaging)),
    );
}

fn nursing_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/nursing")
            .route("/patients/{id}/shift", web::get().to(nursing::current_shift))
            .service(
                web::resource("/patients/{id}/entries")
                    .route(web::get().to(nursing::history))
                    .route(web::post().to(nursing::create_entry)),
            )
            .route("/patients/{id}/notes", web::post().to(nursing::create_note))
            .route("/patients/{id}/medication-entry", web::post().to(nursing::medication_entry))
            .route("/entries/{id}", web::delete().to(nursing::delete_entry))
            .route("/entries/{id}/vitals", web::delete().to(nursing::clear_vitals))
            .route("/entries/{id}/balance", web::delete().to(nursing::clear_balance))
            .route("/entries/{id}/note", web::delete().to(nursing::clear_note))
            .service(
                web::resource("/entries/{id}/medications")
                    .route(web::get().to(nursing::medications))
                    .route(web::post().to(nursing::administer)),
            )
            .service(
                web::resource("/administrations/{id}")
                    .route(web::put().to(nursing::edit_administration))
                    .route(web::delete().to(nursing::delete_administration)),
            ),
    );
}

fn catalog_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/catalogs")
            .service(
                web::resource("/medications")
                    .route(web::get().to(catalogs::list_medications))
                    .route(web::post().to(catalogs::create_medication))
                    .route(web::delete().to(catalogs::delete_medications)),
            )
            .route("/medications/lookup", web::get().to(catalogs::lookup_medications))
            .route("/medications/import", web::post().to(catalogs::import_medications))
            .route("/medications/{id}", web::delete().to(catalogs::delete_medication))
            .route("/icd10", web::get().to(catalogs::list_icd10))
            .route("/icd10/autocomplete", web::get().to(catalogs::autocomplete_icd10))
            .route("/icd10/import", web::post().to(catalogs::import_icd10))
            .route("/icd10/{id}/toggle", web::post().to(catalogs::toggle_icd10))
            .service(
                web::resource("/labs")
                    .route(web::get().to(catalogs::list_exams))
                    .route(web::post().to(catalogs::create_exam)),
            )
            .route("/labs/import", web::post().to(catalogs::import_lab_catalog))
            .service(
                web::resource("/labs/parameters/{id}")
                    .route(web::put().to(catalogs::edit_parameter))
                    .route(web::delete().to(catalogs::delete_parameter)),
            )
            .service(
                web::resource("/labs/{id}")
                    .route(web::get().to(catalogs::exam_detail))
                    .route(web::delete().to(catalogs::delete_exam)),
            )
            .route("/labs/{id}/toggle", web::post().to(catalogs::toggle_exam))
            .route("/labs/{id}/parameters", web::post().to(catalogs::add_parameter)),
    );
}

fn supply_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/supplies")
            .service(
                web::resource("")
                    .route(web::get().to(supplies::list))
                    .route(web::post().to(supplies::create))
                    .route(web::delete().to(supplies::delete_many)),
            )
            .route("/import", web::post().to(supplies::import))
            .route("/usage", web::post().to(supplies::record_usage))
            .route("/usage/{id}", web::delete().to(supplies::delete_usage))
            .route("/{id}", web::delete().to(supplies::delete)),
    );
}
