use thiserror::Error;

/// Erreurs du service de métadonnées.
#[derive(Error, Debug)]
pub enum MetaError {
    #[error("requête HTTP échouée : {0}")]
    Http(#[from] reqwest::Error),

    #[error("réponse illisible : {0}")]
    Decode(#[from] serde_json::Error),

    #[error("URL invalide : {0}")]
    InvalidUrl(String),
}
