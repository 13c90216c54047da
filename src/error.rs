use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} not found: id {id}")]
    NotFound { entity: &'static str, id: i64 },
}

pub type Result<T> = std::result::Result<T, Error>;
