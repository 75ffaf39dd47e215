//! Route table.

use actix_web::web;

use super::handlers;
use crate::ws;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route(
                "/session/reconcile",
                web::post().to(handlers::reconcile_session),
            )
            .route("/patients", web::get().to(handlers::list_patients))
            .route("/patients", web::post().to(handlers::register_patient))
            .route("/patients/{patient_id}", web::get().to(handlers::get_patient))
            .route(
                "/patients/{patient_id}",
                web::delete().to(handlers::discharge_patient),
            )
            .route(
                "/patients/{patient_id}/medications",
                web::post().to(handlers::add_medication),
            )
            .route(
                "/patients/{patient_id}/medications/{medication_id}/taken",
                web::post().to(handlers::mark_taken),
            )
            .route(
                "/patients/{patient_id}/medications/{medication_id}",
                web::delete().to(handlers::delete_medication),
            )
            .route(
                "/rpc/delete-medication",
                web::post().to(handlers::delete_medication_rpc),
            )
            .route(
                "/rpc/discharge-patient",
                web::post().to(handlers::discharge_patient_rpc),
            )
            .route("/views/home", web::get().to(handlers::home_view))
            .route("/views/history", web::get().to(handlers::history_view))
            .route("/views/schedule", web::get().to(handlers::schedule_view)),
    )
    .route("/ws", web::get().to(ws::ws_handler));
}
