pub mod auth;
pub mod blind_date;
pub mod chat;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod events;
pub mod friends;
pub mod gateway;
pub mod matchmaking;
pub mod models;
pub mod notify;
pub mod pii;
pub mod presence;
pub mod profiles;
pub mod prompt;
pub mod rate_limit;
pub mod routes;
pub mod scorer;
pub mod worker;

use config::Config;
use db::Db;
use events::EventBus;
use log::info;
use presence::Presence;
use rate_limit::RateLimiter;
use rocket_cors::{AllowedOrigins, CorsOptions};

/// Build the server from the environment. Panics when `JWT_SECRET` is
/// missing — that is the one configuration defect with no sane default.
pub fn rocket() -> rocket::Rocket<rocket::Build> {
    build_rocket(Config::from_env())
}

/// Build with an explicit config (tests hand in a temp database path and a
/// known secret).
pub fn rocket_with_config(config: Config) -> rocket::Rocket<rocket::Build> {
    build_rocket(config)
}

fn build_rocket(config: Config) -> rocket::Rocket<rocket::Build> {
    // Ensure data directory exists
    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let db = Db::new(&config.database_path);
    let events = EventBus::new();

    // Subscribe the notification gate BEFORE handing the bus to Rocket.
    let notify_receiver = events.subscribe();
    let notify_db_path = config.database_path.clone();
    let push_url = config.push_webhook_url.clone();

    let worker_bus = events.clone();
    let worker_db_path = config.database_path.clone();
    let match_interval = config.match_interval_secs;
    let prompt_interval = config.prompt_interval_secs;
    let reminder_interval = config.reminder_interval_secs;

    let cors = match &config.cors_origin {
        Some(origin) => CorsOptions {
            allowed_origins: AllowedOrigins::some_exact(&[origin]),
            ..Default::default()
        },
        None => CorsOptions::default(),
    }
    .to_cors()
    .expect("Failed to create CORS");

    let ws_path = config.ws_path.clone();

    rocket::build()
        .manage(db)
        .manage(events)
        .manage(Presence::new())
        .manage(RateLimiter::new())
        .manage(config)
        .attach(cors)
        .register(
            "/",
            rocket::catchers![routes::not_found, routes::unauthorized],
        )
        .mount(ws_path.as_str(), rocket::routes![gateway::socket])
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::stats,
                routes::get_inbox,
                routes::get_profile,
                routes::upsert_profile,
                routes::upsert_giver,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff(
            "Notification Gate",
            move |_rocket| {
                Box::pin(async move {
                    notify::spawn_dispatcher(notify_receiver, notify_db_path, push_url);
                    info!("notification gate started");
                })
            },
        ))
        .attach(rocket::fairing::AdHoc::on_liftoff(
            "Background Workers",
            move |_rocket| {
                Box::pin(async move {
                    worker::spawn(
                        "matchmaking",
                        coordinator::MATCHMAKING_LEASE,
                        match_interval,
                        worker_db_path.clone(),
                        worker_bus.clone(),
                        |conn, bus, holder| {
                            let o = matchmaking::run_pass(conn, bus, holder)?;
                            Ok(format!(
                                "proposed {}, expired {}, dropped {}",
                                o.proposed, o.expired_proposals, o.dropped_tickets
                            ))
                        },
                    );
                    worker::spawn(
                        "prompt",
                        coordinator::PROMPT_LEASE,
                        prompt_interval,
                        worker_db_path.clone(),
                        worker_bus.clone(),
                        |conn, bus, _| {
                            let o = prompt::run_tick(conn, bus)?;
                            Ok(format!(
                                "offered {}, expired {} requests / {} attempts, exhausted {}",
                                o.offered, o.expired_requests, o.expired_attempts, o.exhausted
                            ))
                        },
                    );
                    worker::spawn(
                        "reminder",
                        coordinator::REMINDER_LEASE,
                        reminder_interval,
                        worker_db_path,
                        worker_bus,
                        |conn, bus, _| {
                            let n = blind_date::run_reminder_sweep(conn, bus)?;
                            Ok(if n > 0 { format!("reminded {n} matches") } else { String::new() })
                        },
                    );
                    info!("background workers started");
                })
            },
        ))
}
