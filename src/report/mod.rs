use std::collections::HashMap;

use chrono::DateTime;

use crate::error::ServiceError;
use crate::models::{BillingRecord, GuestRecord, PersonRow, Registration};

/// CSV column order, matching the detailed export consumed by the agency.
const CSV_COLUMNS: [&str; 26] = [
    "registrazione_id",
    "user_id",
    "evento",
    "data_registrazione",
    "tipo_persona",
    "posizione_gruppo",
    "nome",
    "cognome",
    "email",
    "cellulare",
    "data_nascita",
    "indirizzo",
    "codice_fiscale",
    "partenza",
    "camera_singola",
    "camera_doppia",
    "camera_tripla",
    "camera_quadrupla",
    "costo_totale_gruppo",
    "fatturazione_aziendale",
    "ragione_sociale",
    "partita_iva",
    "codice_fiscale_azienda",
    "indirizzo_sede_legale",
    "codice_sdi",
    "pec_azienda",
];

/// Expand registrations into per-person rows: one capogruppo row per
/// registration followed by its guest rows. Group-level columns (rooms,
/// cost, billing) appear only on the capogruppo row.
pub fn expand_person_rows(
    registrations: &[(Registration, Option<BillingRecord>)],
    guests: &[GuestRecord],
) -> Vec<PersonRow> {
    let mut guests_by_registration: HashMap<i64, Vec<&GuestRecord>> = HashMap::new();
    for guest in guests {
        guests_by_registration
            .entry(guest.registrazione_id)
            .or_default()
            .push(guest);
    }

    let mut rows = Vec::new();
    for (registration, billing) in registrations {
        let reg_guests = guests_by_registration
            .get(&registration.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let ospiti_dettagli = reg_guests
            .iter()
            .map(|g| format!("{} {}", g.nome, g.cognome))
            .collect::<Vec<_>>()
            .join(" | ");

        let billing = billing.clone().unwrap_or_default();
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();

        rows.push(PersonRow {
            registrazione_id: registration.id,
            id: registration.id,
            user_id: registration.user_id.clone().unwrap_or_default(),
            evento: registration.evento.clone(),
            data_registrazione: display_timestamp(&registration.data_iscrizione),
            tipo_persona: "Capogruppo".to_string(),
            posizione_gruppo: 1,
            nome: registration.nome.clone(),
            cognome: registration.cognome.clone(),
            email: registration.email.clone(),
            cellulare: registration.cellulare.clone(),
            data_nascita: registration.data_nascita.clone(),
            indirizzo: registration.indirizzo.clone(),
            codice_fiscale: registration.codice_fiscale.clone(),
            partenza: registration.partenza.clone(),
            camera_singola: registration.camera_singola.to_string(),
            camera_doppia: registration.camera_doppia.to_string(),
            camera_tripla: registration.camera_tripla.to_string(),
            camera_quadrupla: registration.camera_quadrupla.to_string(),
            costo_totale_gruppo: format!("{:.2}", registration.costo_totale_gruppo),
            fatturazione_aziendale: registration.fatturazione_aziendale.to_string(),
            ragione_sociale: opt(&billing.ragione_sociale),
            partita_iva: opt(&billing.partita_iva),
            codice_fiscale_azienda: opt(&billing.codice_fiscale_azienda),
            indirizzo_sede_legale: opt(&billing.indirizzo_sede_legale),
            codice_sdi: opt(&billing.codice_sdi),
            pec_azienda: opt(&billing.pec_azienda),
            ospiti_dettagli: ospiti_dettagli.clone(),
        });

        for (index, guest) in reg_guests.iter().enumerate() {
            rows.push(PersonRow {
                registrazione_id: registration.id,
                id: registration.id,
                user_id: registration.user_id.clone().unwrap_or_default(),
                evento: registration.evento.clone(),
                data_registrazione: display_timestamp(&registration.data_iscrizione),
                tipo_persona: "Ospite".to_string(),
                posizione_gruppo: index + 2,
                nome: guest.nome.clone(),
                cognome: guest.cognome.clone(),
                // Guests have no contact fields of their own
                email: String::new(),
                cellulare: String::new(),
                data_nascita: guest.data_nascita.clone(),
                indirizzo: guest.indirizzo.clone(),
                codice_fiscale: guest.codice_fiscale.clone(),
                partenza: registration.partenza.clone(),
                camera_singola: String::new(),
                camera_doppia: String::new(),
                camera_tripla: String::new(),
                camera_quadrupla: String::new(),
                costo_totale_gruppo: String::new(),
                fatturazione_aziendale: String::new(),
                ragione_sociale: String::new(),
                partita_iva: String::new(),
                codice_fiscale_azienda: String::new(),
                indirizzo_sede_legale: String::new(),
                codice_sdi: String::new(),
                pec_azienda: String::new(),
                ospiti_dettagli: ospiti_dettagli.clone(),
            });
        }
    }
    rows
}

/// Render person rows as CSV with humanized headers. The writer quotes
/// fields containing commas, quotes or newlines.
pub fn to_csv(rows: &[PersonRow]) -> Result<String, ServiceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(CSV_COLUMNS.iter().map(|c| humanize_header(c)))
        .map_err(|e| ServiceError::Render(e.to_string()))?;

    for row in rows {
        writer
            .write_record(&[
                row.registrazione_id.to_string(),
                row.user_id.clone(),
                row.evento.clone(),
                row.data_registrazione.clone(),
                row.tipo_persona.clone(),
                row.posizione_gruppo.to_string(),
                row.nome.clone(),
                row.cognome.clone(),
                row.email.clone(),
                row.cellulare.clone(),
                row.data_nascita.clone(),
                row.indirizzo.clone(),
                row.codice_fiscale.clone(),
                row.partenza.clone(),
                row.camera_singola.clone(),
                row.camera_doppia.clone(),
                row.camera_tripla.clone(),
                row.camera_quadrupla.clone(),
                row.costo_totale_gruppo.clone(),
                row.fatturazione_aziendale.clone(),
                row.ragione_sociale.clone(),
                row.partita_iva.clone(),
                row.codice_fiscale_azienda.clone(),
                row.indirizzo_sede_legale.clone(),
                row.codice_sdi.clone(),
                row.pec_azienda.clone(),
            ])
            .map_err(|e| ServiceError::Render(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ServiceError::Render(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ServiceError::Render(e.to_string()))
}

/// "costo_totale_gruppo" -> "Costo Totale Gruppo"
fn humanize_header(column: &str) -> String {
    column
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// RFC 3339 registration timestamps render as "YYYY-MM-DD HH:MM:SS";
/// anything unparseable passes through untouched.
pub fn display_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(id: i64, user_id: &str) -> Registration {
        Registration {
            id,
            user_id: Some(user_id.to_string()),
            nome: "Maria".to_string(),
            cognome: "Rossi".to_string(),
            email: "maria@example.com".to_string(),
            cellulare: "333123".to_string(),
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
            data_iscrizione: "2026-03-01T10:30:00+00:00".to_string(),
            fatturazione_aziendale: false,
        }
    }

    fn guest(reg_id: i64, nome: &str) -> GuestRecord {
        GuestRecord {
            registrazione_id: reg_id,
            nome: nome.to_string(),
            cognome: "Rossi".to_string(),
            data_nascita: "1978-01-30".to_string(),
            indirizzo: "Via Roma 1, Milano".to_string(),
            codice_fiscale: "X".to_string(),
        }
    }

    #[test]
    fn one_row_per_person_in_group_order() {
        let regs = vec![(registration(1, "AB123"), None)];
        let guests = vec![guest(1, "Luca"), guest(1, "Anna")];

        let rows = expand_person_rows(&regs, &guests);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].tipo_persona, "Capogruppo");
        assert_eq!(rows[0].posizione_gruppo, 1);
        assert_eq!(rows[1].nome, "Luca");
        assert_eq!(rows[1].posizione_gruppo, 2);
        assert_eq!(rows[2].nome, "Anna");
        assert_eq!(rows[2].posizione_gruppo, 3);
    }

    #[test]
    fn guest_rows_leave_group_columns_blank() {
        let regs = vec![(registration(1, "AB123"), None)];
        let guests = vec![guest(1, "Luca")];

        let rows = expand_person_rows(&regs, &guests);
        let guest_row = &rows[1];
        assert!(guest_row.email.is_empty());
        assert!(guest_row.camera_doppia.is_empty());
        assert!(guest_row.costo_totale_gruppo.is_empty());
        // but shared trip context carries over
        assert_eq!(guest_row.partenza, "fco");
        assert_eq!(guest_row.evento, "Crociera Fiordi 2026");
    }

    #[test]
    fn guest_summary_is_aggregated_on_every_row() {
        let regs = vec![(registration(1, "AB123"), None)];
        let guests = vec![guest(1, "Luca"), guest(1, "Anna")];

        let rows = expand_person_rows(&regs, &guests);
        for row in &rows {
            assert_eq!(row.ospiti_dettagli, "Luca Rossi | Anna Rossi");
        }
    }

    #[test]
    fn billing_columns_come_from_joined_row() {
        let billing = BillingRecord {
            ragione_sociale: Some("ACME Srl".to_string()),
            partita_iva: Some("01234567890".to_string()),
            ..Default::default()
        };
        let regs = vec![(registration(1, "AB123"), Some(billing))];

        let rows = expand_person_rows(&regs, &[]);
        assert_eq!(rows[0].ragione_sociale, "ACME Srl");
        assert_eq!(rows[0].partita_iva, "01234567890");
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let regs = vec![(registration(1, "AB123"), None)];
        let rows = expand_person_rows(&regs, &[]);
        let csv = to_csv(&rows).unwrap();

        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Registrazione Id,User Id,Evento,Data Registrazione"));
        let data = lines.next().unwrap();
        assert!(data.contains("\"Via Roma 1, Milano\""));
        assert!(data.contains("2026-03-01 10:30:00"));
    }

    #[test]
    fn humanized_headers() {
        assert_eq!(humanize_header("user_id"), "User Id");
        assert_eq!(humanize_header("costo_totale_gruppo"), "Costo Totale Gruppo");
    }
}
