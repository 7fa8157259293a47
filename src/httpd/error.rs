use {
    crate::{
        config::ConfigError,
        decoder::{DecodeError, DecoderError},
    },
    actix_web::{HttpResponse, ResponseError, http::StatusCode},
    serde::{Deserialize, Serialize},
    std::io,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Request(#[from] DecodeError),

    #[error(transparent)]
    Decoder(#[from] DecoderError),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Request(_) | ServiceError::Decoder(DecoderError::Input(_)) => {
                StatusCode::BAD_REQUEST
            },
            ServiceError::Decoder(DecoderError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Decoder(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
