use std::sync::Arc;

use chrono::Utc;

use crate::config::{BillingMode, TenantConfig};
use crate::database::DatabaseService;
use crate::email::{summary_html, Mailer};
use crate::error::ServiceError;
use crate::models::{PersonRow, RegistrationRequest};
use crate::pdf;
use crate::report;

/// Per-tenant business logic between the HTTP handlers and the database.
pub struct RegistrationService {
    db: Arc<DatabaseService>,
    mailer: Option<Arc<Mailer>>,
    tenant: TenantConfig,
}

impl RegistrationService {
    pub fn new(db: Arc<DatabaseService>, mailer: Option<Arc<Mailer>>, tenant: TenantConfig) -> Self {
        Self { db, mailer, tenant }
    }

    /// Validate, persist and confirm one submission. The insert is atomic;
    /// the confirmation email is best-effort and never fails the request.
    pub async fn submit(&self, req: RegistrationRequest) -> Result<i64, ServiceError> {
        validate_submission(&req, &self.tenant)?;

        if let Some(user_id) = req.user_id.as_deref() {
            if self.db.user_id_exists(user_id).await? {
                return Err(ServiceError::Duplicate);
            }
        }

        let data_iscrizione = Utc::now().to_rfc3339();
        let id = self.db.insert_registration(&req, &data_iscrizione).await?;
        log::info!(
            "Registration {} saved for tenant '{}' ({} guests)",
            id,
            self.tenant.name,
            req.ospiti.len()
        );

        if let Some(mailer) = &self.mailer {
            if !req.email.trim().is_empty() {
                let mailer = Arc::clone(mailer);
                let subject = format!("Conferma iscrizione - {}", self.tenant.event_name);
                let html = summary_html(&req, &self.tenant.event_name);
                let to = req.email.clone();
                tokio::spawn(async move {
                    if let Err(e) = mailer.send(&to, &subject, html).await {
                        log::warn!("Confirmation email failed: {}", e);
                    }
                });
            }
        }

        Ok(id)
    }

    /// Whether a submission with this external user id already exists.
    pub async fn check_user(&self, user_id: &str) -> Result<bool, ServiceError> {
        self.db.user_id_exists(user_id).await
    }

    /// Expanded per-person rows for the admin listing.
    pub async fn list_person_rows(&self) -> Result<Vec<PersonRow>, ServiceError> {
        let registrations = self.db.list_registrations().await?;
        let guests = self.db.list_guests().await?;
        Ok(report::expand_person_rows(&registrations, &guests))
    }

    /// Detailed CSV export: `(filename, body)`.
    pub async fn export_csv(&self) -> Result<(String, String), ServiceError> {
        let rows = self.list_person_rows().await?;
        if rows.is_empty() {
            return Err(ServiceError::NotFound(
                "Nessuna registrazione trovata.".to_string(),
            ));
        }
        let body = report::to_csv(&rows)?;
        let filename = format!(
            "registrazioni_{}_dettagliate.csv",
            self.tenant.schema_name()
        );
        Ok((filename, body))
    }

    /// PDF room summary for one registration: `(filename, bytes)`.
    pub async fn generate_pdf(&self, registration_id: i64) -> Result<(String, Vec<u8>), ServiceError> {
        let details = self
            .db
            .fetch_details(registration_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("Registrazione non trovata.".to_string())
            })?;

        let filename = pdf::summary_filename(&self.tenant.event_name, registration_id);
        let bytes = pdf::render_summary(&details)?;
        Ok((filename, bytes))
    }

    pub fn verify_admin(&self, password: &str) -> Result<(), ServiceError> {
        if password == self.tenant.admin_password {
            Ok(())
        } else {
            Err(ServiceError::Unauthorized)
        }
    }

    /// Authenticate and wipe the tenant's data, leaving empty tables behind.
    pub async fn reset_data(&self, password: &str) -> Result<(), ServiceError> {
        self.verify_admin(password)?;
        log::warn!("Database wipe requested for tenant '{}'", self.tenant.name);
        self.db.reset_schema().await
    }
}

/// Tenant-dependent checks that run before touching the database.
fn validate_submission(req: &RegistrationRequest, tenant: &TenantConfig) -> Result<(), ServiceError> {
    if tenant.require_user_id && req.user_id.as_deref().unwrap_or("").trim().is_empty() {
        return Err(ServiceError::Validation("User ID mancante.".to_string()));
    }

    if req.wants_corporate_billing() {
        let complete = req
            .dati_fatturazione
            .as_ref()
            .is_some_and(|df| df.corporate_complete());
        if !complete {
            return Err(ServiceError::Validation(
                "Dati fatturazione aziendale incompleti.".to_string(),
            ));
        }
    }

    if req.wants_private_billing() && tenant.billing_mode != BillingMode::CorporateAndPrivate {
        return Err(ServiceError::Validation(
            "Fatturazione privata non disponibile per questo evento.".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillingPayload;

    fn tenant(require_user_id: bool, billing_mode: BillingMode) -> TenantConfig {
        TenantConfig {
            name: "crociera".to_string(),
            event_name: "Crociera Fiordi 2026".to_string(),
            admin_password: "pw".to_string(),
            calculation_date: None,
            lookup_csv: None,
            require_user_id,
            billing_mode,
            email_from_name: "Eventi".to_string(),
            email_from_address: "noreply@example.com".to_string(),
        }
    }

    fn request() -> RegistrationRequest {
        RegistrationRequest {
            user_id: Some("AB123".to_string()),
            nome: "Maria".to_string(),
            cognome: "Rossi".to_string(),
            email: "maria@example.com".to_string(),
            cellulare: "333123".to_string(),
            data_nascita: "1980-04-12".to_string(),
            indirizzo: "Via Roma 1".to_string(),
            codice_fiscale: "RSSMRA80D52F205X".to_string(),
            partenza: "fco".to_string(),
            evento: "Crociera".to_string(),
            camera_singola: 0,
            camera_doppia: 1,
            camera_tripla: 0,
            camera_quadrupla: 0,
            costo_totale_gruppo: 2400.0,
            ospiti: vec![],
            fatturazione_aziendale: false,
            tipo_fatturazione: None,
            dati_fatturazione: None,
        }
    }

    #[test]
    fn user_id_required_only_when_tenant_says_so() {
        let mut req = request();
        req.user_id = None;

        assert!(validate_submission(&req, &tenant(false, BillingMode::Corporate)).is_ok());

        let err = validate_submission(&req, &tenant(true, BillingMode::Corporate)).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn corporate_billing_must_be_complete() {
        let mut req = request();
        req.fatturazione_aziendale = true;
        req.dati_fatturazione = Some(BillingPayload {
            ragione_sociale: Some("ACME Srl".to_string()),
            ..Default::default()
        });

        let err = validate_submission(&req, &tenant(false, BillingMode::Corporate)).unwrap_err();
        match err {
            ServiceError::Validation(msg) => {
                assert_eq!(msg, "Dati fatturazione aziendale incompleti.")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn complete_corporate_billing_passes() {
        let mut req = request();
        req.fatturazione_aziendale = true;
        req.dati_fatturazione = Some(BillingPayload {
            ragione_sociale: Some("ACME Srl".to_string()),
            partita_iva: Some("01234567890".to_string()),
            indirizzo_sede_legale: Some("Via Milano 5".to_string()),
            ..Default::default()
        });

        assert!(validate_submission(&req, &tenant(false, BillingMode::Corporate)).is_ok());
    }

    #[test]
    fn private_billing_needs_the_right_tenant_mode() {
        let mut req = request();
        req.tipo_fatturazione = Some("privato".to_string());
        req.dati_fatturazione = Some(BillingPayload {
            nome: Some("Maria".to_string()),
            cognome: Some("Rossi".to_string()),
            ..Default::default()
        });

        assert!(validate_submission(&req, &tenant(false, BillingMode::Corporate)).is_err());
        assert!(
            validate_submission(&req, &tenant(false, BillingMode::CorporateAndPrivate)).is_ok()
        );
    }
}
