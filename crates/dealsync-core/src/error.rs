use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not initialized: run 'dealsync init'")]
    NotInitialized,

    #[error("missing env vars: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("invalid stage: {0}")]
    InvalidStage(String),

    #[error("invalid deal field: {0}")]
    InvalidField(String),

    #[error("malformed deal {deal_id}: {reason}")]
    MalformedDeal { deal_id: String, reason: String },

    #[error("{service} API error ({status}): {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request {path} exceeded {attempts} attempts")]
    RetriesExhausted {
        service: &'static str,
        path: String,
        attempts: u32,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
