use actix_web::{web, HttpResponse, Result};
use std::sync::Arc;
use validator::Validate;

use crate::config::TenantConfig;
use crate::error::ServiceError;
use crate::lookup::UserLookupTable;
use crate::models::{RegistrationRequest, SubmissionResponse};
use crate::services::RegistrationService;
use crate::utils;

/// Everything one mounted tenant needs to serve requests.
pub struct TenantState {
    pub config: TenantConfig,
    pub service: RegistrationService,
    pub lookup: Option<UserLookupTable>,
}

/// Route factory: registers one tenant's routes. Mounted under
/// `web::scope("/{tenant}")` with the tenant's state attached.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(tenant_health))
        .route("/admin", web::get().to(admin_page))
        .route("/api/config", web::get().to(form_config))
        .route("/api/registrati", web::post().to(submit_registration))
        .route("/api/check-user/{user_id}", web::get().to(check_user))
        .route("/api/lookup-user/{user_id}", web::get().to(lookup_user))
        .route("/api/registrations", web::get().to(list_registrations))
        .route("/api/export", web::get().to(export_csv))
        .route(
            "/api/generate-pdf/{registration_id}",
            web::post().to(generate_pdf),
        )
        .route(
            "/api/admin/delete-database",
            web::post().to(delete_database),
        );
}

/// Top-level health check endpoint
pub async fn health_check() -> Result<HttpResponse> {
    Ok(utils::response::success_response(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

async fn tenant_health(state: web::Data<Arc<TenantState>>) -> Result<HttpResponse> {
    Ok(utils::response::success_response(serde_json::json!({
        "status": "ok",
        "instance": state.config.name,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Form bootstrap data consumed by the frontend price calculator.
async fn form_config(state: web::Data<Arc<TenantState>>) -> Result<HttpResponse> {
    Ok(utils::response::success_response(serde_json::json!({
        "calculationDate": state.config.calculation_date
    })))
}

async fn submit_registration(
    req: web::Json<RegistrationRequest>,
    state: web::Data<Arc<TenantState>>,
) -> Result<HttpResponse> {
    let r = req.into_inner();
    if let Err(e) = r.validate() {
        let msgs = flatten_validation_errors(e);
        return Ok(utils::response::validation_error_response(msgs));
    }

    match state.service.submit(r).await {
        Ok(id) => Ok(utils::response::success_response(SubmissionResponse {
            success: true,
            id,
        })),
        Err(err) => Ok(service_error_response(err, "submit_registration")),
    }
}

async fn check_user(
    path: web::Path<String>,
    state: web::Data<Arc<TenantState>>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    match state.service.check_user(&user_id).await {
        Ok(exists) => Ok(utils::response::success_response(
            serde_json::json!({"exists": exists}),
        )),
        Err(err) => Ok(service_error_response(err, "check_user")),
    }
}

async fn lookup_user(
    path: web::Path<String>,
    state: web::Data<Arc<TenantState>>,
) -> Result<HttpResponse> {
    let table = match &state.lookup {
        Some(table) => table,
        None => {
            return Ok(utils::response::error_response(
                "Lookup non disponibile per questo evento.",
                404,
            ))
        }
    };

    let user_id = path.into_inner();
    match table.lookup(&user_id) {
        Some(record) => Ok(utils::response::success_response(
            serde_json::json!({"found": true, "userData": record}),
        )),
        None => Ok(utils::response::json_response(
            serde_json::json!({"found": false, "error": "Utente non trovato."}),
            404,
        )),
    }
}

async fn list_registrations(state: web::Data<Arc<TenantState>>) -> Result<HttpResponse> {
    match state.service.list_person_rows().await {
        Ok(rows) => Ok(utils::response::success_response(rows)),
        Err(err) => Ok(service_error_response(err, "list_registrations")),
    }
}

async fn export_csv(state: web::Data<Arc<TenantState>>) -> Result<HttpResponse> {
    match state.service.export_csv().await {
        Ok((filename, body)) => Ok(HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", filename),
            ))
            .body(body)),
        Err(err) => Ok(service_error_response(err, "export_csv")),
    }
}

async fn generate_pdf(
    path: web::Path<i64>,
    state: web::Data<Arc<TenantState>>,
) -> Result<HttpResponse> {
    let registration_id = path.into_inner();
    match state.service.generate_pdf(registration_id).await {
        Ok((filename, bytes)) => Ok(HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", filename),
            ))
            .body(bytes)),
        Err(err) => Ok(service_error_response(err, "generate_pdf")),
    }
}

#[derive(serde::Deserialize)]
struct AdminQuery {
    password: Option<String>,
}

/// Admin dashboard: wrong or missing password falls back to the login page.
async fn admin_page(
    query: web::Query<AdminQuery>,
    state: web::Data<Arc<TenantState>>,
) -> Result<HttpResponse> {
    let page = match query.password.as_deref() {
        Some(password) if state.service.verify_admin(password).is_ok() => {
            admin_dashboard_html(&state.config)
        }
        Some(_) => {
            log::warn!(
                "Failed admin login attempt for tenant '{}'",
                state.config.name
            );
            admin_login_html(&state.config)
        }
        None => admin_login_html(&state.config),
    };

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(page))
}

#[derive(serde::Deserialize)]
struct DeleteDatabaseRequest {
    #[serde(default)]
    password: String,
}

async fn delete_database(
    req: web::Json<DeleteDatabaseRequest>,
    state: web::Data<Arc<TenantState>>,
) -> Result<HttpResponse> {
    match state.service.reset_data(&req.password).await {
        Ok(()) => Ok(utils::response::success_response(serde_json::json!({
            "success": true,
            "message": "I dati del database sono stati eliminati con successo."
        }))),
        Err(ServiceError::Unauthorized) => Ok(utils::response::json_response(
            serde_json::json!({"success": false, "error": "Password errata."}),
            401,
        )),
        Err(err) => Ok(service_error_response(err, "delete_database")),
    }
}

/// Map a service error onto the wire: user-facing message, internals logged.
fn service_error_response(err: ServiceError, context: &str) -> HttpResponse {
    let status = err.status_code();
    if status >= 500 {
        log::error!("{} failed: {}", context, err);
    }
    utils::response::error_response(&err.public_message(), status)
}

/// Flatten top-level and nested validation errors into user-facing
/// messages. Guest errors arrive as List-kind entries and would otherwise
/// produce an empty rejection body.
fn flatten_validation_errors(err: validator::ValidationErrors) -> Vec<String> {
    let mut msgs = Vec::new();
    collect_validation_messages(&err, &mut msgs);
    msgs
}

fn collect_validation_messages(err: &validator::ValidationErrors, msgs: &mut Vec<String>) {
    use validator::ValidationErrorsKind;

    for (field, kind) in err.errors().iter() {
        match kind {
            ValidationErrorsKind::Field(errors) => {
                for e in errors.iter() {
                    let message = if let Some(m) = &e.message {
                        m.to_string()
                    } else {
                        format!("{} {}", field, e.code)
                    };
                    msgs.push(message);
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_validation_messages(nested, msgs),
            ValidationErrorsKind::List(entries) => {
                for nested in entries.values() {
                    collect_validation_messages(nested, msgs);
                }
            }
        }
    }
}

fn admin_login_html(config: &TenantConfig) -> String {
    let event = utils::html::escape(&config.event_name);
    format!(
        "<!DOCTYPE html>\
<html lang=\"it\">\
<head><meta charset=\"utf-8\"><title>Admin - {event}</title></head>\
<body>\
<h1>Area riservata - {event}</h1>\
<form method=\"get\" action=\"admin\">\
<label for=\"password\">Password</label>\
<input type=\"password\" id=\"password\" name=\"password\" required>\
<button type=\"submit\">Accedi</button>\
</form>\
</body>\
</html>",
        event = event
    )
}

fn admin_dashboard_html(config: &TenantConfig) -> String {
    let event = utils::html::escape(&config.event_name);
    format!(
        "<!DOCTYPE html>\
<html lang=\"it\">\
<head><meta charset=\"utf-8\"><title>Dashboard - {event}</title></head>\
<body>\
<h1>Dashboard iscrizioni - {event}</h1>\
<p><a href=\"api/export\">Scarica CSV dettagliato</a></p>\
<p><a href=\"api/registrations\">Elenco registrazioni (JSON)</a></p>\
<h2>Zona pericolosa</h2>\
<p>POST su <code>api/admin/delete-database</code> con la password elimina\
 tutti i dati in modo irreversibile.</p>\
</body>\
</html>",
        event = event
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    // `test` is aliased so the plain #[test] attribute below keeps resolving
    // to the built-in one rather than actix-web's async macro.
    use actix_web::{test as actix_test, App};
    use validator::Validate;

    #[actix_rt::test]
    async fn health_check_returns_ok() {
        let app =
            actix_test::init_service(App::new().route("/health", web::get().to(health_check)))
                .await;

        let req = actix_test::TestRequest::get().uri("/health").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn validation_errors_flatten_to_messages() {
        let req = RegistrationRequest {
            user_id: None,
            nome: String::new(),
            cognome: "Rossi".to_string(),
            email: "not-an-email".to_string(),
            cellulare: "333".to_string(),
            data_nascita: "1980-01-01".to_string(),
            indirizzo: "Via Roma 1".to_string(),
            codice_fiscale: "X".to_string(),
            partenza: "fco".to_string(),
            evento: String::new(),
            camera_singola: 0,
            camera_doppia: 0,
            camera_tripla: 0,
            camera_quadrupla: 0,
            costo_totale_gruppo: 0.0,
            ospiti: vec![],
            fatturazione_aziendale: false,
            tipo_fatturazione: None,
            dati_fatturazione: None,
        };

        let msgs = flatten_validation_errors(req.validate().unwrap_err());
        assert!(msgs.contains(&"Nome mancante".to_string()));
        assert!(msgs.contains(&"Email non valida".to_string()));
    }

    #[test]
    fn nested_guest_errors_surface_in_messages() {
        let mut req = RegistrationRequest {
            user_id: None,
            nome: "Maria".to_string(),
            cognome: "Rossi".to_string(),
            email: "maria@example.com".to_string(),
            cellulare: "333123".to_string(),
            data_nascita: "1980-01-01".to_string(),
            indirizzo: "Via Roma 1".to_string(),
            codice_fiscale: "RSSMRA80D52F205X".to_string(),
            partenza: "fco".to_string(),
            evento: "Crociera".to_string(),
            camera_singola: 0,
            camera_doppia: 1,
            camera_tripla: 0,
            camera_quadrupla: 0,
            costo_totale_gruppo: 2400.0,
            ospiti: vec![crate::models::GuestPayload {
                nome: String::new(),
                cognome: "Rossi".to_string(),
                data_nascita: String::new(),
                indirizzo: String::new(),
                codice_fiscale: String::new(),
            }],
            fatturazione_aziendale: false,
            tipo_fatturazione: None,
            dati_fatturazione: None,
        };

        // The guest is the only invalid part of the payload.
        let msgs = flatten_validation_errors(req.validate().unwrap_err());
        assert!(!msgs.is_empty());
        assert!(msgs.contains(&"Nome accompagnatore mancante".to_string()));

        req.ospiti[0].nome = "Luca".to_string();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn admin_pages_escape_the_event_name() {
        let config = TenantConfig {
            name: "demo".to_string(),
            event_name: "Evento <script>".to_string(),
            admin_password: "pw".to_string(),
            calculation_date: None,
            lookup_csv: None,
            require_user_id: false,
            billing_mode: crate::config::BillingMode::Corporate,
            email_from_name: "Eventi".to_string(),
            email_from_address: "noreply@example.com".to_string(),
        };

        let login = admin_login_html(&config);
        assert!(login.contains("Evento &lt;script&gt;"));
        assert!(!login.contains("<script>"));

        let dashboard = admin_dashboard_html(&config);
        assert!(dashboard.contains("Evento &lt;script&gt;"));
        assert!(!dashboard.contains("<script>"));
    }

    #[test]
    fn error_responses_carry_public_messages() {
        let resp = service_error_response(ServiceError::Duplicate, "test");
        assert_eq!(resp.status().as_u16(), 400);

        let resp = service_error_response(ServiceError::Unauthorized, "test");
        assert_eq!(resp.status().as_u16(), 401);

        let resp = service_error_response(
            ServiceError::Database("connection refused".to_string()),
            "test",
        );
        assert_eq!(resp.status().as_u16(), 500);
    }
}
