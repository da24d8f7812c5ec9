use actix_web::{web, HttpResponse};

pub mod accounts;
pub mod admin;
pub mod bookings;
pub mod technicians;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}
