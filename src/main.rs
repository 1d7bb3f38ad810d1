#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod utils;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dotenvy::dotenv;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Build, Orbit, Request, Response, Rocket};
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

use crate::config::Config;
use crate::db::DbConn;
use crate::services::{ExpirySweeper, SweeperHandle};
use crate::utils::{SharedClock, SystemClock};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- SWEEPER ----------------------------- */

/// Runs the expiry sweeper for as long as the server is up.
pub struct ExpirySweep {
    interval: Duration,
    handle: Mutex<Option<SweeperHandle>>,
}

impl ExpirySweep {
    pub fn new(interval: Duration) -> Self {
        ExpirySweep {
            interval,
            handle: Mutex::new(None),
        }
    }
}

#[rocket::async_trait]
impl Fairing for ExpirySweep {
    fn info(&self) -> Info {
        Info {
            name: "Expiry Sweeper",
            kind: Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (Some(store), Some(clock)) = (rocket.state::<DbConn>(), rocket.state::<SharedClock>()) else {
            log::error!("✗ Expiry sweeper not started: store or clock is not managed");
            return;
        };

        let sweeper = ExpirySweeper::new(store.clone(), clock.clone(), self.interval);
        match self.handle.lock() {
            Ok(mut slot) => *slot = Some(sweeper.start()),
            Err(_) => log::error!("✗ Expiry sweeper not started: handle lock poisoned"),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        let handle = self.handle.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(401)]
fn unauthorized() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Missing or invalid credentials"
    })
}

#[catch(403)]
fn forbidden() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "You are not allowed to perform this action"
    })
}

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(422)]
fn unprocessable() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Malformed request body"
    })
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Internal server error"
    })
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/v1/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

/// Everything except the store, which the caller attaches or manages.
fn app(clock: SharedClock, sweep_interval: Duration) -> Rocket<Build> {
    rocket::build()
        .manage(clock)
        .attach(CORS)
        .attach(ExpirySweep::new(sweep_interval))
        .mount("/", routes![options_handler])
        .mount("/api/v1", routes::api())
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register(
            "/",
            catchers![unauthorized, forbidden, not_found, unprocessable, internal_error],
        )
}

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    let clock: SharedClock = Arc::new(SystemClock::new(Config::utc_offset()));

    log::info!("🚀 MessBuddy API running");
    log::info!("📚 Swagger UI → http://localhost:8000/api/docs");

    app(clock, Config::sweep_interval()).attach(db::init())
}
