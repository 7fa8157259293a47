// stoichiometric-core: pricing and loan math for a stepped-liquidity DEX and its lender.
// everything outside httpd/ and decoder.rs is pure: snapshots in, numbers out.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: TokenAddress, Direction, Estimate, Timestamp
//   2.x  pricing.rs: swap quotes, fee split, two-leg routing
//   3.x  step.rs: steps and pools, rate ladder math
//   4.x  registry.rs: PoolBook / LenderBook lookups
//   5.x  liquidity.rs: range deposits, LP position valuation
//   6.x  lending.rs: interest accrual, liquidation price and plans
//   7.x  config.rs: fees, interest model, decoder, server, env presets
//   8.x  gateway.rs: ledger gateway data_json mapping
//   9.x  decoder.rs: loan NFT decoder process
//   10.x httpd/: /decode_loan service
//   11.x oracle.rs: TWAP step oracle over pool observations

// core math
pub mod lending;
pub mod liquidity;
pub mod oracle;
pub mod pricing;
pub mod registry;
pub mod step;
pub mod types;

// integration modules
pub mod config;
pub mod decoder;
pub mod gateway;
pub mod httpd;

// re exports for convenience
pub use lending::*;
pub use liquidity::*;
pub use oracle::*;
pub use pricing::*;
pub use registry::*;
pub use step::*;
pub use types::*;
pub use self::config::{AppConfig, ConfigError, Environment};
pub use decoder::{DecodeError, DecodedLoan, DecoderError, LoanDecoder, ProcessDecoder};
pub use gateway::GatewayError;
