mod cors;

use actix_web::{
    App, HttpResponse, HttpServer, Responder, get,
    web::{self},
};
use common::env_config::Config;

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();
    let config_data = config.clone();

    // get info
    let is_production = config.environment == "production";
    let origin = config.cors_allowed_origin.clone();

    // init logger
    if config.console_logging_enabled {
        logger::setup().expect("Failed to set up logger");
    }

    // init db connection
    let pool = db::setup(&config.database_url, is_production)
        .await
        .expect("Failed to set up database");

    // one Stripe client for the whole process, injected into handlers
    let stripe_client = common::stripe::create_client(&config.stripe.secret_key);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(pool.clone()))
            .app_data(web::Data::new(config_data.clone()))
            .app_data(web::Data::new(stripe_client.clone()))
            .wrap(logger::middleware()) // 3rd
            .wrap(api_auth::auth_middleware()) // 2nd
            .wrap(cors::middleware(&origin)) // 1st
            .service(
                web::scope("/api")
                    .service(health)
                    .service(api_auth::mount_auth())
                    .service(api_subs::mount_subscription()),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
