use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{SmtpConfig, TenantConfig};
use crate::error::ServiceError;
use crate::models::RegistrationRequest;
use crate::utils::html::escape;

/// Async SMTP mailer with a per-tenant from-identity.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(
        smtp: &SmtpConfig,
        tenant: &TenantConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
            .port(smtp.port)
            .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()))
            .build();

        let from: Mailbox = format!("{} <{}>", tenant.email_from_name, tenant.email_from_address)
            .parse()?;

        Ok(Self { transport, from })
    }

    pub async fn send(&self, to: &str, subject: &str, html: String) -> Result<(), ServiceError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().map_err(|e| ServiceError::Mail(format!("invalid recipient: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| ServiceError::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ServiceError::Mail(e.to_string()))?;

        log::info!("Confirmation email sent to {}", to);
        Ok(())
    }
}

/// HTML summary of a committed submission for the confirmation email.
pub fn summary_html(req: &RegistrationRequest, event_name: &str) -> String {
    let mut html = String::with_capacity(2048);

    html.push_str(&format!(
        "<h1>Grazie per la tua iscrizione, {}!</h1>\
         <p>Ecco il riepilogo della tua prenotazione per l'evento: <strong>{}</strong></p>",
        escape(&req.nome),
        escape(event_name)
    ));

    html.push_str("<h2>Dati del Capogruppo</h2><ul>");
    html.push_str(&format!(
        "<li><strong>Nome:</strong> {} {}</li>",
        escape(&req.nome),
        escape(&req.cognome)
    ));
    html.push_str(&format!("<li><strong>Email:</strong> {}</li>", escape(&req.email)));
    html.push_str(&format!("<li><strong>Cellulare:</strong> {}</li>", escape(&req.cellulare)));
    html.push_str(&format!(
        "<li><strong>Data di Nascita:</strong> {}</li>",
        format_date_it(&req.data_nascita)
    ));
    html.push_str(&format!("<li><strong>Indirizzo:</strong> {}</li>", escape(&req.indirizzo)));
    html.push_str(&format!(
        "<li><strong>Codice Fiscale:</strong> {}</li>",
        escape(&req.codice_fiscale)
    ));
    html.push_str(&format!("<li><strong>Partenza:</strong> {}</li>", escape(&req.partenza)));
    html.push_str("</ul>");

    html.push_str("<h2>Riepilogo Camere</h2><ul>");
    for (count, label) in [
        (req.camera_singola, "Camera Singola"),
        (req.camera_doppia, "Camera Doppia"),
        (req.camera_tripla, "Camera Tripla"),
        (req.camera_quadrupla, "Camera Quadrupla"),
    ] {
        if count > 0 {
            html.push_str(&format!("<li>{}: {}</li>", label, count));
        }
    }
    html.push_str("</ul>");

    if !req.ospiti.is_empty() {
        html.push_str("<h2>Accompagnatori</h2><ul>");
        for ospite in &req.ospiti {
            html.push_str(&format!(
                "<li>{} {} ({})</li>",
                escape(&ospite.nome),
                escape(&ospite.cognome),
                format_date_it(&ospite.data_nascita)
            ));
        }
        html.push_str("</ul>");
    }

    if let Some(df) = &req.dati_fatturazione {
        let billing_fields: [(&str, &Option<String>); 9] = [
            ("Ragione Sociale", &df.ragione_sociale),
            ("Partita IVA", &df.partita_iva),
            ("Codice Fiscale Azienda", &df.codice_fiscale_azienda),
            ("Indirizzo Sede Legale", &df.indirizzo_sede_legale),
            ("Codice SDI", &df.codice_sdi),
            ("PEC", &df.pec_azienda),
            ("Nome", &df.nome),
            ("Cognome", &df.cognome),
            ("Indirizzo di Residenza", &df.indirizzo_residenza),
        ];
        if billing_fields.iter().any(|(_, v)| v.is_some()) {
            html.push_str("<h2>Dati Fatturazione</h2><ul>");
            for (label, value) in billing_fields {
                if let Some(value) = value {
                    html.push_str(&format!(
                        "<li><strong>{}:</strong> {}</li>",
                        label,
                        escape(value)
                    ));
                }
            }
            html.push_str("</ul>");
        }
    }

    html.push_str(&format!(
        "<h2>Costo Totale</h2><p><strong>&euro;{:.2}</strong></p>\
         <hr><p>Verrai ricontattato a breve per la conferma definitiva.</p>",
        req.costo_totale_gruppo
    ));

    html
}

/// ISO dates render as dd/mm/yyyy; anything else passes through.
fn format_date_it(raw: &str) -> String {
    match chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.format("%d/%m/%Y").to_string(),
        Err(_) => raw.to_string(),
    }
}
