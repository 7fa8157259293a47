//! Loan NFT decoding through the external decoder binary.
//!
//! The decoder takes the hex encoded mutable and immutable NFT data and prints one
//! line: `collateral_token collateral_amount amount_lent loan_time loan_to_value interest_rate`.

use crate::lending::Loan;
use crate::types::{Timestamp, TokenAddress};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const FIELDS: [&str; 6] = [
    "collateral_token",
    "collateral_amount",
    "amount_lent",
    "loan_time",
    "loan_to_value",
    "interest_rate",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{0} Undefined")]
    MissingField(&'static str),

    #[error("Field {field} is not a number: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("{field} is not valid hex data")]
    InvalidHex { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedLoan {
    pub collateral_token: TokenAddress,
    pub collateral_amount: Decimal,
    pub amount_lent: Decimal,
    /// seconds since epoch
    pub loan_time: i64,
    pub loan_to_value: Decimal,
    pub interest_rate: Decimal,
}

impl DecodedLoan {
    pub fn parse(output: &str) -> Result<Self, DecodeError> {
        let mut tokens = output.split_whitespace();
        let mut next = |index: usize| tokens.next().ok_or(DecodeError::MissingField(FIELDS[index]));

        let collateral_token = TokenAddress::from(next(0)?);
        let collateral_amount = parse_decimal(next(1)?, FIELDS[1])?;
        let amount_lent = parse_decimal(next(2)?, FIELDS[2])?;
        let loan_time_raw = next(3)?;
        let loan_time = loan_time_raw.parse::<i64>().map_err(|_| DecodeError::InvalidField {
            field: FIELDS[3],
            value: loan_time_raw.to_string(),
        })?;
        let loan_to_value = parse_decimal(next(4)?, FIELDS[4])?;
        let interest_rate = parse_decimal(next(5)?, FIELDS[5])?;

        Ok(Self {
            collateral_token,
            collateral_amount,
            amount_lent,
            loan_time,
            loan_to_value,
            interest_rate,
        })
    }

    pub fn into_loan(self) -> Loan {
        Loan {
            collateral_token: self.collateral_token,
            collateral_amount: self.collateral_amount,
            amount_lent: self.amount_lent,
            loan_time: Timestamp::from_secs(self.loan_time),
            loan_to_value: self.loan_to_value,
            interest_rate: self.interest_rate,
        }
    }
}

impl FromStr for DecodedLoan {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_decimal(raw: &str, field: &'static str) -> Result<Decimal, DecodeError> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| DecodeError::InvalidField {
            field,
            value: raw.to_string(),
        })
}

/// Non-empty, even length, hex digits only. Anything else never reaches the process.
pub fn validate_hex(field: &'static str, value: &str) -> Result<(), DecodeError> {
    if value.is_empty() || value.len() % 2 != 0 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidHex { field });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error(transparent)]
    Input(DecodeError),

    #[error("Decoder printed unreadable output: {0}")]
    Output(DecodeError),

    #[error("Failed to run decoder: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Decoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Decoder did not answer within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait LoanDecoder: Send + Sync {
    async fn decode_loan(&self, mutable_hex: &str, immutable_hex: &str) -> Result<DecodedLoan, DecoderError>;
}

/// Runs the decoder binary once per request, without a shell.
#[derive(Debug, Clone)]
pub struct ProcessDecoder {
    binary: PathBuf,
    timeout: Duration,
}

impl ProcessDecoder {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }
}

#[async_trait]
impl LoanDecoder for ProcessDecoder {
    async fn decode_loan(&self, mutable_hex: &str, immutable_hex: &str) -> Result<DecodedLoan, DecoderError> {
        validate_hex("mutable_data_hex", mutable_hex).map_err(DecoderError::Input)?;
        validate_hex("immutable_data_hex", immutable_hex).map_err(DecoderError::Input)?;

        debug!(binary = %self.binary.display(), "running loan decoder");

        let child = Command::new(&self.binary)
            .arg(mutable_hex)
            .arg(immutable_hex)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(timeout = ?self.timeout, "loan decoder timed out");
                return Err(DecoderError::Timeout(self.timeout));
            },
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = %output.status, %stderr, "loan decoder failed");
            return Err(DecoderError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        DecodedLoan::parse(&stdout)
            .map_err(DecoderError::Output)
            .inspect_err(|e| warn!(error = %e, "loan decoder output rejected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const LINE: &str = "resource_tdx_b_1qre9sv 1500 250.5 1681000000 0.4 0.0001\n";

    #[test]
    fn parses_decoder_line() {
        let loan = DecodedLoan::parse(LINE).unwrap();
        assert_eq!(loan.collateral_token, TokenAddress::from("resource_tdx_b_1qre9sv"));
        assert_eq!(loan.amount_lent, dec!(250.5));
        assert_eq!(loan.loan_time, 1_681_000_000);

        let loan = loan.into_loan();
        assert_eq!(loan.loan_time, Timestamp::from_secs(1_681_000_000));
        assert_eq!(loan.interest_rate, dec!(0.0001));
    }

    #[test]
    fn missing_field_reports_undefined() {
        let err = DecodedLoan::parse("resource_x 1500 250.5").unwrap_err();
        assert_eq!(err, DecodeError::MissingField("loan_time"));
        assert_eq!(err.to_string(), "loan_time Undefined");
        assert_eq!(DecodedLoan::parse("").unwrap_err().to_string(), "collateral_token Undefined");
    }

    #[test]
    fn non_numeric_field_rejected() {
        assert!(matches!(
            "resource_x 1500 lots 1681000000 0.4 0.0001".parse::<DecodedLoan>(),
            Err(DecodeError::InvalidField { field: "amount_lent", .. })
        ));
    }

    #[test]
    fn hex_validation() {
        assert!(validate_hex("m", "5c21").is_ok());
        assert!(validate_hex("m", "").is_err());
        assert!(validate_hex("m", "5c2").is_err());
        assert!(validate_hex("m", "5c; rm").is_err());
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        fn script(body: &str) -> tempfile::TempPath {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "#!/bin/sh\n{body}").unwrap();
            let path = file.into_temp_path();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn decodes_through_process() {
            let path = script("echo resource_x 10 5 1681000000 0.5 0.001");
            let decoder = ProcessDecoder::new(path.to_path_buf(), Duration::from_secs(5));
            let loan = decoder.decode_loan("0a", "ff").await.unwrap();
            assert_eq!(loan.collateral_amount, dec!(10));
        }

        #[tokio::test]
        async fn arguments_passed_in_order() {
            let path = script("echo resource_x $1 $2 1681000000 0.5 0.001");
            let decoder = ProcessDecoder::new(path.to_path_buf(), Duration::from_secs(5));
            let loan = decoder.decode_loan("10", "20").await.unwrap();
            assert_eq!(loan.collateral_amount, dec!(10));
            assert_eq!(loan.amount_lent, dec!(20));
        }

        #[tokio::test]
        async fn failing_process_reported() {
            let path = script("echo boom >&2; exit 3");
            let decoder = ProcessDecoder::new(path.to_path_buf(), Duration::from_secs(5));
            match decoder.decode_loan("0a", "ff").await {
                Err(DecoderError::Failed { stderr, .. }) => assert_eq!(stderr, "boom"),
                other => panic!("expected failure, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn slow_process_times_out() {
            let path = script("sleep 5");
            let decoder = ProcessDecoder::new(path.to_path_buf(), Duration::from_millis(100));
            assert!(matches!(decoder.decode_loan("0a", "ff").await, Err(DecoderError::Timeout(_))));
        }

        #[tokio::test]
        async fn bad_hex_never_spawns() {
            let decoder = ProcessDecoder::new("/nonexistent/decoder", Duration::from_secs(1));
            assert!(matches!(decoder.decode_loan("zz", "ff").await, Err(DecoderError::Input(_))));
        }
    }
}
