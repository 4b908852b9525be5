use thiserror::Error;

/// Error taxonomy for the registration service.
///
/// Handlers translate these into JSON responses; everything that is not a
/// user-facing rejection collapses into a generic 500 so internals never
/// leak to the form.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("Un modulo con questo ID è già stato inviato.")]
    Duplicate,

    #[error("{0}")]
    NotFound(String),

    #[error("Password errata.")]
    Unauthorized,

    #[error("database error: {0}")]
    Database(String),

    #[error("mail delivery failed: {0}")]
    Mail(String),

    #[error("render failed: {0}")]
    Render(String),
}

impl ServiceError {
    /// HTTP status code this error maps onto.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) | ServiceError::Duplicate => 400,
            ServiceError::Unauthorized => 401,
            ServiceError::NotFound(_) => 404,
            ServiceError::Database(_) | ServiceError::Mail(_) | ServiceError::Render(_) => 500,
        }
    }

    /// Message safe to show to the submitter. Internal failures get a
    /// generic text, user-facing rejections keep their wording.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Validation(_)
            | ServiceError::Duplicate
            | ServiceError::NotFound(_)
            | ServiceError::Unauthorized => self.to_string(),
            ServiceError::Database(_) => {
                "Errore durante il salvataggio dei dati nel database.".to_string()
            }
            ServiceError::Mail(_) | ServiceError::Render(_) => {
                "Errore interno del server.".to_string()
            }
        }
    }
}

impl From<tokio_postgres::Error> for ServiceError {
    fn from(err: tokio_postgres::Error) -> Self {
        ServiceError::Database(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for ServiceError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        ServiceError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_errors_keep_their_message() {
        let err = ServiceError::Validation("Campi capogruppo mancanti.".to_string());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "Campi capogruppo mancanti.");

        assert_eq!(ServiceError::Duplicate.status_code(), 400);
        assert_eq!(ServiceError::Unauthorized.status_code(), 401);
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = ServiceError::Database("relation does not exist".to_string());
        assert_eq!(err.status_code(), 500);
        assert!(!err.public_message().contains("relation"));
    }
}
