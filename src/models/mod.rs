use serde::{Deserialize, Serialize};
use validator::Validate;

/// One stored registration (capogruppo row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: i64,
    pub user_id: Option<String>,
    pub nome: String,
    pub cognome: String,
    pub email: String,
    pub cellulare: String,
    pub data_nascita: String,
    pub indirizzo: String,
    pub codice_fiscale: String,
    pub partenza: String,
    pub evento: String,
    pub camera_singola: i32,
    pub camera_doppia: i32,
    pub camera_tripla: i32,
    pub camera_quadrupla: i32,
    pub costo_totale_gruppo: f64,
    pub data_iscrizione: String,
    pub fatturazione_aziendale: bool,
}

/// One stored accompanying guest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestRecord {
    pub registrazione_id: i64,
    pub nome: String,
    pub cognome: String,
    pub data_nascita: String,
    pub indirizzo: String,
    pub codice_fiscale: String,
}

/// Stored billing row. Corporate and private columns live side by side;
/// at most one family is populated per row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingRecord {
    pub ragione_sociale: Option<String>,
    pub partita_iva: Option<String>,
    pub codice_fiscale_azienda: Option<String>,
    pub indirizzo_sede_legale: Option<String>,
    pub codice_sdi: Option<String>,
    pub pec_azienda: Option<String>,
    pub fattura_nome: Option<String>,
    pub fattura_cognome: Option<String>,
    pub fattura_codice_fiscale: Option<String>,
    pub indirizzo_residenza: Option<String>,
}

/// Registration with its joined billing row and guests, as fetched for the
/// PDF summary.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationDetails {
    pub registration: Registration,
    pub billing: Option<BillingRecord>,
    pub guests: Vec<GuestRecord>,
}

/// Guest object in the submission payload.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct GuestPayload {
    #[validate(length(min = 1, message = "Nome accompagnatore mancante"))]
    pub nome: String,
    #[validate(length(min = 1, message = "Cognome accompagnatore mancante"))]
    pub cognome: String,
    #[serde(default)]
    pub data_nascita: String,
    #[serde(default)]
    pub indirizzo: String,
    #[serde(default)]
    pub codice_fiscale: String,
}

/// Billing object in the submission payload. For private-person billing the
/// form sends plain `nome`/`cognome`/`codice_fiscale`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BillingPayload {
    pub ragione_sociale: Option<String>,
    pub partita_iva: Option<String>,
    pub codice_fiscale_azienda: Option<String>,
    pub indirizzo_sede_legale: Option<String>,
    pub codice_sdi: Option<String>,
    pub pec_azienda: Option<String>,
    pub nome: Option<String>,
    pub cognome: Option<String>,
    pub codice_fiscale: Option<String>,
    pub indirizzo_residenza: Option<String>,
}

impl BillingPayload {
    /// Corporate billing needs at least company name, VAT id and legal address.
    pub fn corporate_complete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.ragione_sociale)
            && filled(&self.partita_iva)
            && filled(&self.indirizzo_sede_legale)
    }
}

/// Registration submission payload.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RegistrationRequest {
    pub user_id: Option<String>,
    #[validate(length(min = 1, message = "Nome mancante"))]
    pub nome: String,
    #[validate(length(min = 1, message = "Cognome mancante"))]
    pub cognome: String,
    #[validate(email(message = "Email non valida"))]
    pub email: String,
    #[validate(length(min = 1, message = "Cellulare mancante"))]
    pub cellulare: String,
    #[validate(length(min = 1, message = "Data di nascita mancante"))]
    pub data_nascita: String,
    #[validate(length(min = 1, message = "Indirizzo mancante"))]
    pub indirizzo: String,
    #[validate(length(min = 1, message = "Codice fiscale mancante"))]
    pub codice_fiscale: String,
    #[validate(length(min = 1, message = "Partenza mancante"))]
    pub partenza: String,
    #[serde(default)]
    pub evento: String,
    #[serde(default)]
    pub camera_singola: i32,
    #[serde(default)]
    pub camera_doppia: i32,
    #[serde(default)]
    pub camera_tripla: i32,
    #[serde(default)]
    pub camera_quadrupla: i32,
    pub costo_totale_gruppo: f64,
    #[serde(default)]
    #[validate]
    pub ospiti: Vec<GuestPayload>,
    #[serde(default)]
    pub fatturazione_aziendale: bool,
    /// "azienda" or "privato"; tenants without private billing omit it.
    pub tipo_fatturazione: Option<String>,
    pub dati_fatturazione: Option<BillingPayload>,
}

impl RegistrationRequest {
    pub fn wants_corporate_billing(&self) -> bool {
        self.fatturazione_aziendale || self.tipo_fatturazione.as_deref() == Some("azienda")
    }

    pub fn wants_private_billing(&self) -> bool {
        self.tipo_fatturazione.as_deref() == Some("privato") && self.dati_fatturazione.is_some()
    }
}

/// One row of the expanded per-person report (admin listing and CSV export).
/// Every registration becomes a capogruppo row followed by one row per
/// guest; group-level columns are blank on guest rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRow {
    pub registrazione_id: i64,
    pub id: i64,
    pub user_id: String,
    pub evento: String,
    pub data_registrazione: String,
    pub tipo_persona: String,
    pub posizione_gruppo: usize,
    pub nome: String,
    pub cognome: String,
    pub email: String,
    pub cellulare: String,
    pub data_nascita: String,
    pub indirizzo: String,
    pub codice_fiscale: String,
    pub partenza: String,
    pub camera_singola: String,
    pub camera_doppia: String,
    pub camera_tripla: String,
    pub camera_quadrupla: String,
    pub costo_totale_gruppo: String,
    pub fatturazione_aziendale: String,
    pub ragione_sociale: String,
    pub partita_iva: String,
    pub codice_fiscale_azienda: String,
    pub indirizzo_sede_legale: String,
    pub codice_sdi: String,
    pub pec_azienda: String,
    pub ospiti_dettagli: String,
}

/// Wire shape of a successful submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub success: bool,
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn valid_request() -> RegistrationRequest {
        RegistrationRequest {
            user_id: Some("AB123".to_string()),
            nome: "Maria".to_string(),
            cognome: "Rossi".to_string(),
            email: "maria.rossi@example.com".to_string(),
            cellulare: "3331234567".to_string(),
            data_nascita: "1980-04-12".to_string(),
            indirizzo: "Via Roma 1, Milano".to_string(),
            codice_fiscale: "RSSMRA80D52F205X".to_string(),
            partenza: "fco".to_string(),
            evento: "Crociera Fiordi 2026".to_string(),
            camera_singola: 0,
            camera_doppia: 1,
            camera_tripla: 0,
            camera_quadrupla: 0,
            costo_totale_gruppo: 2400.0,
            ospiti: vec![GuestPayload {
                nome: "Luca".to_string(),
                cognome: "Rossi".to_string(),
                data_nascita: "1978-01-30".to_string(),
                indirizzo: "Via Roma 1, Milano".to_string(),
                codice_fiscale: "RSSLCU78A30F205Y".to_string(),
            }],
            fatturazione_aziendale: false,
            tipo_fatturazione: None,
            dati_fatturazione: None,
        }
    }

    #[test]
    fn valid_request_passes_validation() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn missing_required_field_fails_validation() {
        let mut req = valid_request();
        req.cognome = String::new();
        assert!(req.validate().is_err());

        let mut req = valid_request();
        req.email = "not-an-email".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn nested_guest_validation_is_applied() {
        let mut req = valid_request();
        req.ospiti[0].nome = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn corporate_billing_completeness() {
        let complete = BillingPayload {
            ragione_sociale: Some("ACME Srl".to_string()),
            partita_iva: Some("01234567890".to_string()),
            indirizzo_sede_legale: Some("Via Milano 5, Roma".to_string()),
            ..Default::default()
        };
        assert!(complete.corporate_complete());

        let incomplete = BillingPayload {
            ragione_sociale: Some("ACME Srl".to_string()),
            partita_iva: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!incomplete.corporate_complete());
    }

    #[test]
    fn billing_kind_detection() {
        let mut req = valid_request();
        req.fatturazione_aziendale = true;
        assert!(req.wants_corporate_billing());
        assert!(!req.wants_private_billing());

        let mut req = valid_request();
        req.tipo_fatturazione = Some("privato".to_string());
        req.dati_fatturazione = Some(BillingPayload::default());
        assert!(req.wants_private_billing());
        assert!(!req.wants_corporate_billing());
    }
}
