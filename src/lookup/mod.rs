use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

/// Pre-assigned form data for one external user id, as seeded by the
/// travel agency before the form opens.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LookupRecord {
    #[serde(rename = "schedaNumero")]
    pub scheda_numero: String,
    #[serde(rename = "codiceCliente")]
    pub codice_cliente: String,
    pub email: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// In-memory lookup table built once at startup from a tenant's seeded CSV
/// (columns USER_ID, SCHEDA NUMERO, CODICE CLIENTE, EMAIL). Owned by the
/// tenant state; rebuilding means restarting, there is no ambient cache.
#[derive(Debug, Default)]
pub struct UserLookupTable {
    rows: HashMap<String, LookupRecord>,
}

impl UserLookupTable {
    pub fn from_path(path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file)?;
        log::info!(
            "Lookup table loaded from {}: {} rows",
            path.display(),
            table.len()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let col = |name: &str| headers.iter().position(|h| h == name);
        let user_id_col = col("USER_ID").ok_or("lookup CSV is missing a USER_ID column")?;
        let scheda_col = col("SCHEDA NUMERO");
        let cliente_col = col("CODICE CLIENTE");
        let email_col = col("EMAIL");

        let field = |record: &csv::StringRecord, idx: Option<usize>| -> String {
            idx.and_then(|i| record.get(i)).unwrap_or_default().to_string()
        };

        let mut rows = HashMap::new();
        for record in csv_reader.records() {
            let record = record?;
            let user_id = field(&record, Some(user_id_col));
            if user_id.is_empty() {
                continue;
            }
            rows.insert(
                user_id.clone(),
                LookupRecord {
                    scheda_numero: field(&record, scheda_col),
                    codice_cliente: field(&record, cliente_col),
                    email: field(&record, email_col),
                    user_id,
                },
            );
        }

        Ok(Self { rows })
    }

    pub fn lookup(&self, user_id: &str) -> Option<&LookupRecord> {
        self.rows.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
