use {
    super::{context::Context, error::ServiceError},
    crate::decoder::{DecodeError, DecodedLoan},
    actix_web::{Responder, get, web},
    serde::Deserialize,
    tracing::{debug, warn},
};

#[get("/")]
pub async fn index() -> impl Responder {
    "OK"
}

// both optional so a missing one is answered like a missing decoder field
#[derive(Debug, Deserialize)]
pub struct DecodeLoanQuery {
    pub mutable_data_hex: Option<String>,
    pub immutable_data_hex: Option<String>,
}

#[get("/decode_loan")]
pub async fn decode_loan(
    query: web::Query<DecodeLoanQuery>,
    context: web::Data<Context>,
) -> Result<web::Json<DecodedLoan>, ServiceError> {
    let query = query.into_inner();
    let mutable_hex = query
        .mutable_data_hex
        .ok_or(DecodeError::MissingField("mutable_data_hex"))?;
    let immutable_hex = query
        .immutable_data_hex
        .ok_or(DecodeError::MissingField("immutable_data_hex"))?;

    let loan = context
        .decoder
        .decode_loan(&mutable_hex, &immutable_hex)
        .await
        .inspect_err(|e| warn!(error = %e, "decode_loan failed"))?;

    debug!(collateral = %loan.collateral_token, "decoded loan");

    Ok(web::Json(loan))
}
