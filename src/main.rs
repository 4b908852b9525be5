mod config;
mod database;
mod email;
mod error;
mod handlers;
mod lookup;
mod middleware;
mod models;
mod pdf;
mod report;
mod services;
mod utils;

use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use std::path::Path;
use std::sync::Arc;

use config::AppConfig;
use database::DatabaseService;
use dotenvy::dotenv;
use email::Mailer;
use handlers::TenantState;
use lookup::UserLookupTable;
use middleware::{CorsMiddleware, LoggingMiddleware, SecurityHeadersMiddleware};
use services::RegistrationService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment from .env (if present)
    let _ = dotenv();

    // Load configuration
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging: file + stdout (rotating file)
    // Try to initialize flexi_logger to write to a logs directory; fall back to env_logger
    if let Ok(logger) = flexi_logger::Logger::try_with_str(config.logging.level.clone()) {
        let file_spec = flexi_logger::FileSpec::default()
            .directory(config.logging.file_path.as_deref().unwrap_or("logs"))
            .suppress_timestamp();
        let _ = logger
            .log_to_file(file_spec)
            .duplicate_to_stdout(flexi_logger::Duplicate::Info)
            .start();
    } else {
        let log_level = utils::logging::level_from_string(&config.logging.level);
        env_logger::builder()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
    }

    log::info!(
        "Starting registration server v{}",
        env!("CARGO_PKG_VERSION")
    );
    log::info!("Server: {}:{}", config.server.host, config.server.port);
    log::info!("Tenants: {}", config.tenants.len());

    // Build per-tenant state: pool, schema, mailer, lookup table. A tenant
    // with an unreachable database is fatal; a missing lookup CSV is not.
    let mut tenants: Vec<(String, Arc<TenantState>)> = Vec::new();
    for tenant in &config.tenants {
        let db = match DatabaseService::new(&config.database, &tenant.schema_name()).await {
            Ok(db) => Arc::new(db),
            Err(e) => {
                log::error!("Database init failed for tenant '{}': {}", tenant.name, e);
                std::process::exit(1);
            }
        };
        if let Err(e) = db.init_schema().await {
            log::error!("Schema init failed for tenant '{}': {}", tenant.name, e);
            std::process::exit(1);
        }

        let mailer = if config.smtp.enabled && !tenant.email_from_address.is_empty() {
            match Mailer::new(&config.smtp, tenant) {
                Ok(mailer) => Some(Arc::new(mailer)),
                Err(e) => {
                    log::warn!(
                        "Mailer disabled for tenant '{}': {}",
                        tenant.name,
                        e
                    );
                    None
                }
            }
        } else {
            None
        };

        let lookup = match &tenant.lookup_csv {
            Some(path) => match UserLookupTable::from_path(Path::new(path)) {
                Ok(table) => Some(table),
                Err(e) => {
                    log::warn!(
                        "Lookup table unavailable for tenant '{}': {}",
                        tenant.name,
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let service = RegistrationService::new(Arc::clone(&db), mailer, tenant.clone());
        tenants.push((
            tenant.name.clone(),
            Arc::new(TenantState {
                config: tenant.clone(),
                service,
                lookup,
            }),
        ));
        log::info!("Tenant '{}' mounted at /{}", tenant.name, tenant.name);
    }

    // Print access information
    println!("🚀 Registration server started!");
    println!(
        "📍 Local access: http://{}:{}",
        config.server.host, config.server.port
    );
    println!(
        "📍 Health check: http://{}:{}/health",
        config.server.host, config.server.port
    );
    for (name, _) in &tenants {
        println!(
            "📍 Tenant form: http://{}:{}/{}",
            config.server.host, config.server.port, name
        );
    }
    println!("📝 Press Ctrl+C to stop the server");
    println!();

    let cors_allowed_origins = config.server.cors_allowed_origins.clone();

    // Create and run the HTTP server
    HttpServer::new(move || {
        let mut app = App::new()
            // Custom middleware (applied before compression to work with original body types)
            .wrap(SecurityHeadersMiddleware)
            .wrap(LoggingMiddleware)
            .wrap(CorsMiddleware {
                allowed_origins: cors_allowed_origins.clone(),
            })
            // Actix built-in middleware (applied after custom middleware to avoid body type conflicts)
            .wrap(actix_middleware::Compress::default())
            // Health check (top-level, tenant-independent)
            .route("/health", web::get().to(handlers::health_check));

        for (name, state) in &tenants {
            app = app.service(
                web::scope(&format!("/{}", name))
                    .app_data(web::Data::new(Arc::clone(state)))
                    .configure(handlers::configure),
            );
        }

        app
    })
    .bind((config.server.host.clone(), config.server.port))?
    .workers(config.server.workers)
    // Apply server timeouts and connection settings
    .keep_alive(std::time::Duration::from_secs(config.server.keep_alive_seconds))
    .client_request_timeout(std::time::Duration::from_secs(
        config.server.client_timeout_seconds,
    ))
    .max_connections(config.server.max_connections)
    .run()
    .await
}
