//! Mapping of ledger gateway responses into pools, lenders and loan handles.
//!
//! Component state arrives as a positional `data_json` array. Numbers may be JSON
//! numbers or decimal strings. Every field is looked up by index and a missing or
//! malformed one is reported by name.

use crate::lending::Lender;
use crate::step::{Pool, Step};
use crate::types::{StepId, TokenAddress};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Malformed gateway response: {0}")]
    Malformed(String),

    #[error("Component state has no field {field} at index {index}")]
    MissingField { field: &'static str, index: usize },

    #[error("Field {field} is not a valid {expected}: {value}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
}

// entity details: { "details": { "state": { "data_json": [...] } } }
#[derive(Debug, Deserialize)]
struct EntityDetails {
    details: Details,
}

#[derive(Debug, Deserialize)]
struct Details {
    state: ComponentState,
}

#[derive(Debug, Deserialize)]
struct ComponentState {
    data_json: Vec<Value>,
}

/// Extracts the positional state array from an `/entity/details` response.
pub fn component_state(response: &Value) -> Result<Vec<Value>, GatewayError> {
    EntityDetails::deserialize(response)
        .map(|d| d.details.state.data_json)
        .map_err(|e| GatewayError::Malformed(e.to_string()))
        .inspect_err(|e| warn!(error = %e, "gateway entity details unreadable"))
}

fn field<'a>(state: &'a [Value], index: usize, name: &'static str) -> Result<&'a Value, GatewayError> {
    state.get(index).ok_or(GatewayError::MissingField { field: name, index })
}

fn decimal_field(state: &[Value], index: usize, name: &'static str) -> Result<Decimal, GatewayError> {
    as_decimal(field(state, index, name)?, name)
}

fn as_decimal(value: &Value, name: &'static str) -> Result<Decimal, GatewayError> {
    let invalid = || GatewayError::InvalidField {
        field: name,
        expected: "decimal",
        value: value.to_string(),
    };
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err(invalid()),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| invalid())
}

fn as_step_id(value: &Value, name: &'static str) -> Result<StepId, GatewayError> {
    let invalid = || GatewayError::InvalidField {
        field: name,
        expected: "step id",
        value: value.to_string(),
    };
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| StepId::try_from(v).ok()).ok_or_else(invalid),
        Value::String(s) => s.parse::<StepId>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn as_text(value: &Value, name: &'static str) -> Result<String, GatewayError> {
    value.as_str().map(str::to_string).ok_or_else(|| GatewayError::InvalidField {
        field: name,
        expected: "string",
        value: value.to_string(),
    })
}

/// A pool's step ids with the address of the component holding each step.
pub fn step_refs(pool_state: &[Value]) -> Result<Vec<(StepId, String)>, GatewayError> {
    let steps = field(pool_state, 6, "steps")?
        .as_array()
        .ok_or_else(|| GatewayError::InvalidField {
            field: "steps",
            expected: "array",
            value: pool_state[6].to_string(),
        })?;

    steps
        .iter()
        .map(|entry| {
            let pair = entry.as_array().map(Vec::as_slice).unwrap_or_default();
            let id = as_step_id(field(pair, 0, "step_id")?, "step_id")?;
            let address = as_text(field(pair, 1, "step_address")?, "step_address")?;
            Ok((id, address))
        })
        .collect()
}

pub fn step_from_state(step_id: StepId, state: &[Value]) -> Result<Step, GatewayError> {
    let mut step = Step::new(
        step_id,
        decimal_field(state, 0, "stablecoin_amount")?,
        decimal_field(state, 1, "other_token_amount")?,
        decimal_field(state, 2, "rate")?,
    );
    step.stable_fees_per_liq = decimal_field(state, 3, "stable_fees_per_liq")?;
    step.other_fees_per_liq = decimal_field(state, 4, "other_fees_per_liq")?;
    Ok(step)
}

/// Builds a pool from its component state and the already resolved steps.
/// The ledger stores the rate increment between steps, the pool keeps the multiplier.
pub fn pool_from_state(token: TokenAddress, state: &[Value], steps: Vec<Step>) -> Result<Pool, GatewayError> {
    let build = || -> Result<Pool, GatewayError> {
        let increment = decimal_field(state, 0, "rate_step")?;
        let current_step = as_step_id(field(state, 1, "current_step")?, "current_step")?;
        let min_rate = decimal_field(state, 2, "min_rate")?;
        let max_rate = decimal_field(state, 3, "max_rate")?;
        Ok(Pool::new(
            token.clone(),
            Decimal::ONE + increment,
            current_step,
            min_rate,
            max_rate,
            steps,
        ))
    };
    build().inspect_err(|e| warn!(token = %token, error = %e, "pool state unreadable"))
}

/// Protocol fees held by the pool: (stablecoin, other token).
pub fn protocol_fees_from_state(state: &[Value]) -> Result<(Decimal, Decimal), GatewayError> {
    Ok((
        decimal_field(state, 4, "stable_protocol_fees")?,
        decimal_field(state, 5, "other_protocol_fees")?,
    ))
}

pub fn oracle_price_from_state(state: &[Value]) -> Result<Decimal, GatewayError> {
    decimal_field(state, 0, "price")
}

/// The oracle component address a lender reads its price from.
pub fn lender_oracle(state: &[Value]) -> Result<String, GatewayError> {
    as_text(field(state, 5, "oracle")?, "oracle")
}

pub fn lender_from_state(
    collateral_token: TokenAddress,
    state: &[Value],
    collateral_price: Decimal,
) -> Result<Lender, GatewayError> {
    let build = || -> Result<Lender, GatewayError> {
        Ok(Lender {
            collateral_token: collateral_token.clone(),
            collateral_price,
            oracle: lender_oracle(state)?,
            loan_to_value: decimal_field(state, 1, "loan_to_value")?,
            interest_rate: decimal_field(state, 2, "interest_rate")?,
            liquidation_threshold: decimal_field(state, 3, "liquidation_threshold")?,
            liquidation_penalty: decimal_field(state, 4, "liquidation_penalty")?,
        })
    };
    build().inspect_err(|e| warn!(token = %collateral_token, error = %e, "lender state unreadable"))
}

/// `(token, component)` pairs listed by the router (pools) or the issuer (lenders).
pub fn component_list_from_state(state: &[Value]) -> Result<Vec<(TokenAddress, String)>, GatewayError> {
    let rows = field(state, 1, "components")?
        .as_array()
        .ok_or_else(|| GatewayError::InvalidField {
            field: "components",
            expected: "array",
            value: state[1].to_string(),
        })?;

    rows.iter()
        .map(|row| {
            let pair = row.as_array().map(Vec::as_slice).unwrap_or_default();
            let token = as_text(field(pair, 0, "token")?, "token")?;
            let address = as_text(field(pair, 1, "component")?, "component")?;
            Ok((TokenAddress::from(token), address))
        })
        .collect()
}

/// Raw data of one non-fungible, as fed to the loan decoder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NonFungibleData {
    pub mutable_data_hex: String,
    pub immutable_data_hex: String,
}

pub fn non_fungible_data(response: &Value) -> Result<NonFungibleData, GatewayError> {
    NonFungibleData::deserialize(response)
        .map_err(|e| GatewayError::Malformed(e.to_string()))
        .inspect_err(|e| warn!(error = %e, "non-fungible data unreadable"))
}

#[derive(Debug, Deserialize)]
struct IdsResponse {
    non_fungible_ids: IdsPage,
}

#[derive(Debug, Deserialize)]
struct IdsPage {
    items: Vec<IdItem>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdItem {
    non_fungible_id: String,
}

/// One page of non-fungible ids and the cursor of the next page, if any.
pub fn non_fungible_ids_page(response: &Value) -> Result<(Vec<String>, Option<String>), GatewayError> {
    let page = IdsResponse::deserialize(response)
        .map_err(|e| GatewayError::Malformed(e.to_string()))
        .inspect_err(|e| warn!(error = %e, "non-fungible id page unreadable"))?
        .non_fungible_ids;
    let ids = page.items.into_iter().map(|i| i.non_fungible_id).collect();
    Ok((ids, page.next_cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn details(data: Value) -> Value {
        json!({ "details": { "state": { "data_json": data } } })
    }

    #[test]
    fn pool_state_maps_increment_to_multiplier() {
        let response = details(json!([
            "0.0001", "12", "0.5", 5000, "3.2", "0.01",
            [[11, "component_step11"], ["12", "component_step12"]]
        ]));
        let state = component_state(&response).unwrap();
        let refs = step_refs(&state).unwrap();
        assert_eq!(refs, vec![(11, "component_step11".to_string()), (12, "component_step12".to_string())]);

        let step = step_from_state(12, &[json!("40"), json!("2"), json!(0.5), json!("0"), json!("0.001")]).unwrap();
        let pool = pool_from_state(TokenAddress::from("resource_xrd"), &state, vec![step]).unwrap();
        assert_eq!(pool.rate_step, dec!(1.0001));
        assert_eq!(pool.current_step, 12);
        assert_eq!(pool.max_rate, dec!(5000));
        assert_eq!(pool.step(12).unwrap().other_fees_per_liq, dec!(0.001));
        assert_eq!(protocol_fees_from_state(&state).unwrap(), (dec!(3.2), dec!(0.01)));
    }

    #[test]
    fn missing_field_is_named() {
        let state = vec![json!("0.0001"), json!(3)];
        let err = pool_from_state(TokenAddress::from("resource_xrd"), &state, Vec::new()).unwrap_err();
        assert_eq!(err, GatewayError::MissingField { field: "min_rate", index: 2 });
    }

    #[test]
    fn non_numeric_value_rejected() {
        let err = oracle_price_from_state(&[json!("abc")]).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidField { field: "price", .. }));
        assert_eq!(oracle_price_from_state(&[json!(1e-5)]).unwrap(), dec!(0.00001));
    }

    #[test]
    fn lender_state_with_oracle_price() {
        let state = vec![
            json!("1000"),
            json!("0.5"),
            json!("0.0001"),
            json!("0.8"),
            json!("0.05"),
            json!("component_oracle"),
        ];
        let lender = lender_from_state(TokenAddress::from("resource_btc"), &state, dec!(30000)).unwrap();
        assert_eq!(lender.oracle, "component_oracle");
        assert_eq!(lender.liquidation_threshold, dec!(0.8));
        assert_eq!(lender.collateral_price, dec!(30000));
        assert!(lender.validate().is_ok());
    }

    #[test]
    fn component_list_rows() {
        let state = vec![json!("resource_stable"), json!([["resource_btc", "component_a"], ["resource_eth", "component_b"]])];
        let list = component_list_from_state(&state).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].0, TokenAddress::from("resource_eth"));
    }

    #[test]
    fn malformed_details_rejected() {
        assert!(matches!(component_state(&json!({ "details": {} })), Err(GatewayError::Malformed(_))));
    }

    #[test]
    fn ids_page_with_cursor() {
        let response = json!({
            "non_fungible_ids": {
                "items": [{ "non_fungible_id": "#1#" }, { "non_fungible_id": "#2#" }],
                "next_cursor": "abc"
            }
        });
        let (ids, cursor) = non_fungible_ids_page(&response).unwrap();
        assert_eq!(ids, vec!["#1#", "#2#"]);
        assert_eq!(cursor.as_deref(), Some("abc"));

        let data = non_fungible_data(&json!({ "mutable_data_hex": "0a", "immutable_data_hex": "ff" })).unwrap();
        assert_eq!(data.immutable_data_hex, "ff");
    }
}
