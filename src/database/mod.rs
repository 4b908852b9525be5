use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::error::SqlState;
use tokio_postgres::NoTls;

use crate::config::DatabaseConfig;
use crate::error::ServiceError;
use crate::models::{BillingRecord, GuestRecord, Registration, RegistrationDetails, RegistrationRequest};

/// Database connection pool
pub type DbPool = Pool;

/// Per-tenant database service. All tables live in the tenant's own
/// Postgres schema; every statement is fully qualified, so pools can share
/// one logical database.
pub struct DatabaseService {
    pool: DbPool,
    schema: String,
}

impl DatabaseService {
    /// Create a new database service with connection pool
    pub async fn new(
        config: &DatabaseConfig,
        schema: &str,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut cfg = Config::new();
        cfg.url = Some(config.url.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: config.max_connections as usize,
            timeouts: deadpool_postgres::Timeouts {
                create: Some(std::time::Duration::from_secs(config.connect_timeout_seconds)),
                ..Default::default()
            },
            ..Default::default()
        });

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

        // Test connection
        let client = pool.get().await?;
        client.execute("SELECT 1", &[]).await?;

        log::info!("Database connection established for schema '{}'", schema);

        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }

    fn q(&self, sql: &str) -> String {
        sql.replace("{schema}", &self.schema)
    }

    /// Ensure the tenant schema and its three tables exist.
    pub async fn init_schema(&self) -> Result<(), ServiceError> {
        let client = self.pool.get().await?;

        client
            .execute(&self.q("CREATE SCHEMA IF NOT EXISTS {schema}"), &[])
            .await?;

        client
            .execute(
                &self.q(
                    "CREATE TABLE IF NOT EXISTS {schema}.registrazioni (\
                        id BIGSERIAL PRIMARY KEY,\
                        user_id TEXT UNIQUE,\
                        nome TEXT, cognome TEXT, email TEXT, cellulare TEXT, data_nascita TEXT,\
                        indirizzo TEXT, codice_fiscale TEXT, partenza TEXT,\
                        camera_singola INTEGER DEFAULT 0, camera_doppia INTEGER DEFAULT 0,\
                        camera_tripla INTEGER DEFAULT 0, camera_quadrupla INTEGER DEFAULT 0,\
                        costo_totale_gruppo DOUBLE PRECISION, evento TEXT, data_iscrizione TEXT,\
                        fatturazione_aziendale BOOLEAN DEFAULT false\
                    )",
                ),
                &[],
            )
            .await?;

        client
            .execute(
                &self.q(
                    "CREATE TABLE IF NOT EXISTS {schema}.accompagnatori_dettagli (\
                        id BIGSERIAL PRIMARY KEY,\
                        registrazione_id BIGINT REFERENCES {schema}.registrazioni(id) ON DELETE CASCADE,\
                        nome TEXT, cognome TEXT, data_nascita TEXT,\
                        indirizzo TEXT, codice_fiscale TEXT\
                    )",
                ),
                &[],
            )
            .await?;

        client
            .execute(
                &self.q(
                    "CREATE TABLE IF NOT EXISTS {schema}.dati_fatturazione (\
                        id BIGSERIAL PRIMARY KEY,\
                        registrazione_id BIGINT REFERENCES {schema}.registrazioni(id) ON DELETE CASCADE,\
                        ragione_sociale TEXT, partita_iva TEXT,\
                        codice_fiscale_azienda TEXT, indirizzo_sede_legale TEXT,\
                        codice_sdi TEXT, pec_azienda TEXT,\
                        fattura_nome TEXT, fattura_cognome TEXT,\
                        fattura_codice_fiscale TEXT, indirizzo_residenza TEXT\
                    )",
                ),
                &[],
            )
            .await?;

        log::info!("Database tables ready for schema '{}'", self.schema);
        Ok(())
    }

    /// Drop the tenant's three tables and recreate the empty schema.
    /// Irreversible; callers authenticate before getting here.
    pub async fn reset_schema(&self) -> Result<(), ServiceError> {
        let client = self.pool.get().await?;

        client
            .execute(&self.q("DROP TABLE IF EXISTS {schema}.dati_fatturazione CASCADE"), &[])
            .await?;
        client
            .execute(
                &self.q("DROP TABLE IF EXISTS {schema}.accompagnatori_dettagli CASCADE"),
                &[],
            )
            .await?;
        client
            .execute(&self.q("DROP TABLE IF EXISTS {schema}.registrazioni CASCADE"), &[])
            .await?;
        drop(client);

        log::info!("Tables dropped for schema '{}'", self.schema);
        self.init_schema().await
    }

    /// Whether a registration with this external user id already exists.
    pub async fn user_id_exists(&self, user_id: &str) -> Result<bool, ServiceError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &self.q("SELECT id FROM {schema}.registrazioni WHERE user_id = $1"),
                &[&user_id],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Insert the registration, its guests and the optional billing row in
    /// one transaction. Rolls back on any failure, including a guest insert
    /// failing mid-loop (the transaction guard rolls back on drop).
    pub async fn insert_registration(
        &self,
        req: &RegistrationRequest,
        data_iscrizione: &str,
    ) -> Result<i64, ServiceError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await.map_err(map_insert_err)?;

        let row = tx
            .query_one(
                &self.q(
                    "INSERT INTO {schema}.registrazioni (\
                        user_id, nome, cognome, email, cellulare, data_nascita, indirizzo, codice_fiscale,\
                        partenza, evento, camera_singola, camera_doppia, camera_tripla, camera_quadrupla,\
                        costo_totale_gruppo, data_iscrizione, fatturazione_aziendale\
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)\
                    RETURNING id",
                ),
                &[
                    &req.user_id,
                    &req.nome,
                    &req.cognome,
                    &req.email,
                    &req.cellulare,
                    &req.data_nascita,
                    &req.indirizzo,
                    &req.codice_fiscale,
                    &req.partenza,
                    &req.evento,
                    &req.camera_singola,
                    &req.camera_doppia,
                    &req.camera_tripla,
                    &req.camera_quadrupla,
                    &req.costo_totale_gruppo,
                    &data_iscrizione,
                    &req.wants_corporate_billing(),
                ],
            )
            .await
            .map_err(map_insert_err)?;
        let registration_id: i64 = row.get(0);

        for ospite in &req.ospiti {
            tx.execute(
                &self.q(
                    "INSERT INTO {schema}.accompagnatori_dettagli (\
                        registrazione_id, nome, cognome, data_nascita, indirizzo, codice_fiscale\
                    ) VALUES ($1, $2, $3, $4, $5, $6)",
                ),
                &[
                    &registration_id,
                    &ospite.nome,
                    &ospite.cognome,
                    &ospite.data_nascita,
                    &ospite.indirizzo,
                    &ospite.codice_fiscale,
                ],
            )
            .await
            .map_err(map_insert_err)?;
        }

        if req.wants_corporate_billing() {
            if let Some(df) = &req.dati_fatturazione {
                tx.execute(
                    &self.q(
                        "INSERT INTO {schema}.dati_fatturazione (\
                            registrazione_id, ragione_sociale, partita_iva, codice_fiscale_azienda,\
                            indirizzo_sede_legale, codice_sdi, pec_azienda\
                        ) VALUES ($1, $2, $3, $4, $5, $6, $7)",
                    ),
                    &[
                        &registration_id,
                        &df.ragione_sociale,
                        &df.partita_iva,
                        &df.codice_fiscale_azienda,
                        &df.indirizzo_sede_legale,
                        &df.codice_sdi,
                        &df.pec_azienda,
                    ],
                )
                .await
                .map_err(map_insert_err)?;
            }
        } else if req.wants_private_billing() {
            if let Some(df) = &req.dati_fatturazione {
                tx.execute(
                    &self.q(
                        "INSERT INTO {schema}.dati_fatturazione (\
                            registrazione_id, fattura_nome, fattura_cognome,\
                            fattura_codice_fiscale, indirizzo_residenza\
                        ) VALUES ($1, $2, $3, $4, $5)",
                    ),
                    &[
                        &registration_id,
                        &df.nome,
                        &df.cognome,
                        &df.codice_fiscale,
                        &df.indirizzo_residenza,
                    ],
                )
                .await
                .map_err(map_insert_err)?;
            }
        }

        tx.commit().await.map_err(map_insert_err)?;
        Ok(registration_id)
    }

    /// Fetch one registration with billing and guests, for the PDF summary.
    pub async fn fetch_details(&self, id: i64) -> Result<Option<RegistrationDetails>, ServiceError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                &self.q(
                    "SELECT r.*, \
                        df.ragione_sociale, df.partita_iva, df.codice_fiscale_azienda,\
                        df.indirizzo_sede_legale, df.codice_sdi, df.pec_azienda,\
                        df.fattura_nome, df.fattura_cognome, df.fattura_codice_fiscale,\
                        df.indirizzo_residenza \
                     FROM {schema}.registrazioni r \
                     LEFT JOIN {schema}.dati_fatturazione df ON r.id = df.registrazione_id \
                     WHERE r.id = $1",
                ),
                &[&id],
            )
            .await?;

        let row = match rows.first() {
            Some(row) => row,
            None => return Ok(None),
        };
        let registration = row_to_registration(row);
        let billing = row_to_billing(row);

        let guest_rows = client
            .query(
                &self.q(
                    "SELECT registrazione_id, nome, cognome, data_nascita, indirizzo, codice_fiscale \
                     FROM {schema}.accompagnatori_dettagli \
                     WHERE registrazione_id = $1 ORDER BY id",
                ),
                &[&id],
            )
            .await?;

        Ok(Some(RegistrationDetails {
            registration,
            billing,
            guests: guest_rows.iter().map(row_to_guest).collect(),
        }))
    }

    /// All registrations joined with billing, newest first.
    pub async fn list_registrations(
        &self,
    ) -> Result<Vec<(Registration, Option<BillingRecord>)>, ServiceError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &self.q(
                    "SELECT r.*, \
                        df.ragione_sociale, df.partita_iva, df.codice_fiscale_azienda,\
                        df.indirizzo_sede_legale, df.codice_sdi, df.pec_azienda,\
                        df.fattura_nome, df.fattura_cognome, df.fattura_codice_fiscale,\
                        df.indirizzo_residenza \
                     FROM {schema}.registrazioni r \
                     LEFT JOIN {schema}.dati_fatturazione df ON r.id = df.registrazione_id \
                     ORDER BY r.data_iscrizione DESC",
                ),
                &[],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| (row_to_registration(row), row_to_billing(row)))
            .collect())
    }

    /// All guests across all registrations, in insertion order.
    pub async fn list_guests(&self) -> Result<Vec<GuestRecord>, ServiceError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &self.q(
                    "SELECT registrazione_id, nome, cognome, data_nascita, indirizzo, codice_fiscale \
                     FROM {schema}.accompagnatori_dettagli ORDER BY registrazione_id, id",
                ),
                &[],
            )
            .await?;
        Ok(rows.iter().map(row_to_guest).collect())
    }
}

/// A unique violation on `user_id` means two submissions raced past the
/// pre-check; surface it as a duplicate rather than a generic failure.
fn map_insert_err(err: tokio_postgres::Error) -> ServiceError {
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        ServiceError::Duplicate
    } else {
        ServiceError::Database(err.to_string())
    }
}

fn row_to_registration(row: &tokio_postgres::Row) -> Registration {
    Registration {
        id: row.get("id"),
        user_id: row.get("user_id"),
        nome: text(row, "nome"),
        cognome: text(row, "cognome"),
        email: text(row, "email"),
        cellulare: text(row, "cellulare"),
        data_nascita: text(row, "data_nascita"),
        indirizzo: text(row, "indirizzo"),
        codice_fiscale: text(row, "codice_fiscale"),
        partenza: text(row, "partenza"),
        evento: text(row, "evento"),
        camera_singola: row.get::<_, Option<i32>>("camera_singola").unwrap_or(0),
        camera_doppia: row.get::<_, Option<i32>>("camera_doppia").unwrap_or(0),
        camera_tripla: row.get::<_, Option<i32>>("camera_tripla").unwrap_or(0),
        camera_quadrupla: row.get::<_, Option<i32>>("camera_quadrupla").unwrap_or(0),
        costo_totale_gruppo: row.get::<_, Option<f64>>("costo_totale_gruppo").unwrap_or(0.0),
        data_iscrizione: text(row, "data_iscrizione"),
        fatturazione_aziendale: row
            .get::<_, Option<bool>>("fatturazione_aziendale")
            .unwrap_or(false),
    }
}

fn row_to_billing(row: &tokio_postgres::Row) -> Option<BillingRecord> {
    let billing = BillingRecord {
        ragione_sociale: row.get("ragione_sociale"),
        partita_iva: row.get("partita_iva"),
        codice_fiscale_azienda: row.get("codice_fiscale_azienda"),
        indirizzo_sede_legale: row.get("indirizzo_sede_legale"),
        codice_sdi: row.get("codice_sdi"),
        pec_azienda: row.get("pec_azienda"),
        fattura_nome: row.get("fattura_nome"),
        fattura_cognome: row.get("fattura_cognome"),
        fattura_codice_fiscale: row.get("fattura_codice_fiscale"),
        indirizzo_residenza: row.get("indirizzo_residenza"),
    };
    if billing.ragione_sociale.is_none() && billing.fattura_nome.is_none() {
        None
    } else {
        Some(billing)
    }
}

fn row_to_guest(row: &tokio_postgres::Row) -> GuestRecord {
    GuestRecord {
        registrazione_id: row.get("registrazione_id"),
        nome: text(row, "nome"),
        cognome: text(row, "cognome"),
        data_nascita: text(row, "data_nascita"),
        indirizzo: text(row, "indirizzo"),
        codice_fiscale: text(row, "codice_fiscale"),
    }
}

fn text(row: &tokio_postgres::Row, col: &str) -> String {
    row.get::<_, Option<String>>(col).unwrap_or_default()
}
