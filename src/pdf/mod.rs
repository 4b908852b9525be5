use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Point};

use crate::error::ServiceError;
use crate::models::RegistrationDetails;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;

/// One person placed into a synthetic room for the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomPerson {
    pub nome: String,
    pub cognome: String,
    pub data_nascita: String,
    pub codice_fiscale: String,
    pub indirizzo: String,
    pub email: Option<String>,
    pub cellulare: Option<String>,
    pub capogruppo: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub label: &'static str,
    pub people: Vec<RoomPerson>,
}

/// Group capogruppo + guests into rooms from the stored room counts:
/// singles first, then doubles, triples and quadruples. People left over
/// when the counts don't cover the group land in a trailing "Gruppo"
/// bucket so nobody disappears from the summary.
pub fn assign_rooms(details: &RegistrationDetails) -> Vec<Room> {
    let reg = &details.registration;

    let mut people = Vec::with_capacity(details.guests.len() + 1);
    people.push(RoomPerson {
        nome: reg.nome.clone(),
        cognome: reg.cognome.clone(),
        data_nascita: reg.data_nascita.clone(),
        codice_fiscale: reg.codice_fiscale.clone(),
        indirizzo: reg.indirizzo.clone(),
        email: Some(reg.email.clone()),
        cellulare: Some(reg.cellulare.clone()),
        capogruppo: true,
    });
    for guest in &details.guests {
        people.push(RoomPerson {
            nome: guest.nome.clone(),
            cognome: guest.cognome.clone(),
            data_nascita: guest.data_nascita.clone(),
            codice_fiscale: guest.codice_fiscale.clone(),
            indirizzo: guest.indirizzo.clone(),
            email: None,
            cellulare: None,
            capogruppo: false,
        });
    }

    let mut rooms = Vec::new();
    let mut next = 0usize;
    let plan: [(&'static str, i32, usize); 4] = [
        ("Camera Singola", reg.camera_singola, 1),
        ("Camera Doppia", reg.camera_doppia, 2),
        ("Camera Tripla", reg.camera_tripla, 3),
        ("Camera Quadrupla", reg.camera_quadrupla, 4),
    ];

    for (label, count, capacity) in plan {
        for _ in 0..count.max(0) {
            if next >= people.len() {
                break;
            }
            let end = (next + capacity).min(people.len());
            rooms.push(Room {
                label,
                people: people[next..end].to_vec(),
            });
            next = end;
        }
    }

    if next < people.len() {
        rooms.push(Room {
            label: "Gruppo",
            people: people[next..].to_vec(),
        });
    }
    rooms
}

/// Suggested attachment filename for a registration summary.
pub fn summary_filename(event_name: &str, registration_id: i64) -> String {
    let safe_event: String = event_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("riepilogo-iscrizione-{}-{}.pdf", safe_event, registration_id)
}

/// Render the registration summary as an A4 PDF: a room-by-room section
/// with one box per person, then a recap page with room totals and the
/// billing block. Layout is a manual y cursor with explicit page breaks.
pub fn render_summary(details: &RegistrationDetails) -> Result<Vec<u8>, ServiceError> {
    let reg = &details.registration;
    let rooms = assign_rooms(details);
    let total_people = details.guests.len() + 1;

    let mut canvas = Canvas::new(&reg.evento)?;

    canvas.centered_text("RIEPILOGO ISCRIZIONE", 20.0, true);
    canvas.advance(10.0);
    canvas.centered_text(&reg.evento, 16.0, true);
    canvas.advance(14.0);

    canvas.text("DETTAGLI EVENTO", 14.0, true);
    canvas.rule();
    canvas.advance(8.0);
    if let Some(user_id) = &reg.user_id {
        canvas.text(&format!("ID Utente: {}", user_id), 11.0, false);
        canvas.advance(6.0);
    }
    canvas.text(&format!("Partenza: {}", departure_label(&reg.partenza)), 11.0, false);
    canvas.advance(6.0);
    canvas.text(
        &format!("Costo totale gruppo: EUR {:.2}", reg.costo_totale_gruppo),
        14.0,
        true,
    );
    canvas.advance(12.0);

    canvas.centered_text("COMPOSIZIONE CAMERE", 16.0, true);
    canvas.advance(10.0);

    for room in &rooms {
        canvas.ensure_space(14.0);
        canvas.text(room.label, 14.0, true);
        canvas.rule();
        canvas.advance(7.0);

        for person in &room.people {
            let mut needed = 12.0;
            if !person.data_nascita.is_empty() {
                needed += 5.0;
            }
            if !person.codice_fiscale.is_empty() {
                needed += 5.0;
            }
            if !person.indirizzo.is_empty() {
                needed += 5.0;
            }
            canvas.ensure_space(needed);

            let title = if person.capogruppo {
                format!("{} {} (Capogruppo)", person.nome, person.cognome)
            } else {
                format!("{} {}", person.nome, person.cognome)
            };
            canvas.text(&title, 12.0, true);
            if person.capogruppo {
                if let Some(email) = &person.email {
                    canvas.text_at(&format!("Email: {}", email), 10.0, false, 110.0);
                }
            }
            canvas.advance(5.5);
            if person.capogruppo {
                if let Some(cellulare) = &person.cellulare {
                    canvas.text_at(&format!("Telefono: {}", cellulare), 10.0, false, 110.0);
                }
            }
            if !person.data_nascita.is_empty() {
                canvas.text(&format!("Data di nascita: {}", person.data_nascita), 10.0, false);
                canvas.advance(5.0);
            }
            if !person.codice_fiscale.is_empty() {
                canvas.text(&format!("Codice fiscale: {}", person.codice_fiscale), 10.0, false);
                canvas.advance(5.0);
            }
            if !person.indirizzo.is_empty() {
                canvas.text(&format!("Indirizzo: {}", person.indirizzo), 10.0, false);
                canvas.advance(5.0);
            }
            canvas.advance(4.0);
        }
        canvas.advance(4.0);
    }

    // Recap on its own page
    canvas.new_page();
    canvas.centered_text("RIEPILOGO GENERALE", 16.0, true);
    canvas.advance(12.0);
    canvas.text("Riepilogo Camere:", 14.0, true);
    canvas.rule();
    canvas.advance(8.0);

    let room_counts = [
        (reg.camera_singola, "Camera Singola"),
        (reg.camera_doppia, "Camera Doppia"),
        (reg.camera_tripla, "Camera Tripla"),
        (reg.camera_quadrupla, "Camera Quadrupla"),
    ];
    for (count, label) in room_counts {
        if count > 0 {
            canvas.text(&format!("- {} {}", count, label), 11.0, false);
            canvas.advance(5.5);
        }
    }
    canvas.advance(5.0);
    canvas.text(&format!("Totale persone: {}", total_people), 11.0, false);
    canvas.advance(8.0);
    canvas.centered_text(&format!("Costo totale: EUR {:.2}", reg.costo_totale_gruppo), 16.0, true);
    canvas.advance(12.0);

    if let Some(billing) = &details.billing {
        canvas.text("DATI FATTURAZIONE", 14.0, true);
        canvas.rule();
        canvas.advance(8.0);

        let fields: [(&str, &Option<String>); 10] = [
            ("Ragione sociale", &billing.ragione_sociale),
            ("Partita IVA", &billing.partita_iva),
            ("Codice fiscale", &billing.codice_fiscale_azienda),
            ("Indirizzo sede legale", &billing.indirizzo_sede_legale),
            ("Codice SDI", &billing.codice_sdi),
            ("PEC", &billing.pec_azienda),
            ("Nome", &billing.fattura_nome),
            ("Cognome", &billing.fattura_cognome),
            ("Codice fiscale", &billing.fattura_codice_fiscale),
            ("Indirizzo di residenza", &billing.indirizzo_residenza),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                canvas.text(&format!("{}: {}", label, value), 11.0, false);
                canvas.advance(5.5);
            }
        }
    }

    canvas.advance(14.0);
    let generated = chrono::Utc::now().format("%d/%m/%Y").to_string();
    canvas.centered_text(
        &format!("Documento generato automaticamente in data: {}", generated),
        10.0,
        false,
    );

    canvas.finish()
}

/// Departure point codes used by the forms, mapped to readable labels.
pub fn departure_label(code: &str) -> String {
    match code {
        "autonomo" => "Arrivo autonomo".to_string(),
        "fco" => "FCO - Roma Fiumicino".to_string(),
        "nap" => "NAP - Napoli".to_string(),
        "bcn" => "BCN - Barcellona".to_string(),
        "mpx" | "mxp" => "MXP - Malpensa".to_string(),
        other => other.to_string(),
    }
}

/// A4 page with a descending y cursor; wraps the printpdf plumbing.
struct Canvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl Canvas {
    fn new(title: &str) -> Result<Self, ServiceError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ServiceError::Render(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ServiceError::Render(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y - needed < MARGIN {
            self.new_page();
        }
    }

    fn advance(&mut self, amount: f32) {
        self.ensure_space(amount);
        self.y -= amount;
    }

    fn font(&self, bold: bool) -> &IndirectFontRef {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }

    fn text(&mut self, text: &str, size: f32, bold: bool) {
        self.text_at(text, size, bold, MARGIN);
    }

    fn text_at(&mut self, text: &str, size: f32, bold: bool, x: f32) {
        self.layer
            .use_text(text, size, Mm(x), Mm(self.y), self.font(bold));
    }

    /// Helvetica has no metrics API here; 0.35 mm per pt is close enough
    /// to center headings on an A4 page.
    fn centered_text(&mut self, text: &str, size: f32, bold: bool) {
        let width = text.len() as f32 * size * 0.35 * 0.5;
        let x = ((PAGE_WIDTH - width) / 2.0).max(MARGIN);
        self.text_at(text, size, bold, x);
    }

    fn rule(&mut self) {
        let y = self.y - 1.5;
        let line = Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(y)), false),
                (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(y)), false),
            ],
            is_closed: false,
        };
        self.layer.add_line(line);
    }

    fn finish(self) -> Result<Vec<u8>, ServiceError> {
        self.doc
            .save_to_bytes()
            .map_err(|e| ServiceError::Render(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GuestRecord, Registration};

    fn details(singole: i32, doppie: i32, triple: i32, quadruple: i32, guests: usize) -> RegistrationDetails {
        let registration = Registration {
            id: 7,
            user_id: Some("AB123".to_string()),
            nome: "Maria".to_string(),
            cognome: "Rossi".to_string(),
            email: "maria@example.com".to_string(),
            cellulare: "333123".to_string(),
            data_nascita: "1980-04-12".to_string(),
            indirizzo: "Via Roma 1".to_string(),
            codice_fiscale: "RSSMRA80D52F205X".to_string(),
            partenza: "fco".to_string(),
            evento: "Crociera Fiordi 2026".to_string(),
            camera_singola: singole,
            camera_doppia: doppie,
            camera_tripla: triple,
            camera_quadrupla: quadruple,
            costo_totale_gruppo: 1000.0,
            data_iscrizione: "2026-03-01T10:30:00+00:00".to_string(),
            fatturazione_aziendale: false,
        };
        let guests = (0..guests)
            .map(|i| GuestRecord {
                registrazione_id: 7,
                nome: format!("Ospite{}", i + 1),
                cognome: "Rossi".to_string(),
                data_nascita: String::new(),
                indirizzo: String::new(),
                codice_fiscale: String::new(),
            })
            .collect();
        RegistrationDetails {
            registration,
            billing: None,
            guests,
        }
    }

    #[test]
    fn singles_are_filled_before_larger_rooms() {
        let rooms = assign_rooms(&details(1, 1, 0, 0, 2));
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].label, "Camera Singola");
        assert_eq!(rooms[0].people.len(), 1);
        assert!(rooms[0].people[0].capogruppo);
        assert_eq!(rooms[1].label, "Camera Doppia");
        assert_eq!(rooms[1].people.len(), 2);
    }

    #[test]
    fn leftover_people_fall_into_group_bucket() {
        let rooms = assign_rooms(&details(1, 0, 0, 0, 3));
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[1].label, "Gruppo");
        assert_eq!(rooms[1].people.len(), 3);
    }

    #[test]
    fn excess_rooms_are_dropped_once_people_run_out() {
        let rooms = assign_rooms(&details(4, 0, 0, 0, 1));
        assert_eq!(rooms.len(), 2);
        assert!(rooms.iter().all(|r| !r.people.is_empty()));
    }

    #[test]
    fn partially_filled_room_keeps_its_label() {
        // Two people, one quadruple room: the room exists with two occupants.
        let rooms = assign_rooms(&details(0, 0, 0, 1, 1));
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].label, "Camera Quadrupla");
        assert_eq!(rooms[0].people.len(), 2);
    }

    #[test]
    fn filename_is_sanitized() {
        assert_eq!(
            summary_filename("Crociera Fiordi 2026!", 12),
            "riepilogo-iscrizione-crociera-fiordi-2026--12.pdf"
        );
    }

    #[test]
    fn renders_nonempty_pdf() {
        let bytes = render_summary(&details(0, 1, 0, 0, 1)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn departure_codes_map_to_labels() {
        assert_eq!(departure_label("fco"), "FCO - Roma Fiumicino");
        assert_eq!(departure_label("autonomo"), "Arrivo autonomo");
        assert_eq!(departure_label("qualcosa"), "qualcosa");
    }
}
