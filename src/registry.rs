// 4.0 registry.rs: pools and lenders keyed by token address.
// a missing key is an error the caller has to handle, never a silent zero.

use crate::lending::Lender;
use crate::step::Pool;
use crate::types::TokenAddress;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("No pool for token {0}")]
    UnknownPool(TokenAddress),

    #[error("No lender for collateral {0}")]
    UnknownLender(TokenAddress),
}

#[derive(Debug, Clone, Default)]
pub struct PoolBook {
    pools: HashMap<TokenAddress, Pool>,
}

impl PoolBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the pool for `pool.token`.
    pub fn insert(&mut self, pool: Pool) -> Option<Pool> {
        self.pools.insert(pool.token.clone(), pool)
    }

    pub fn get(&self, token: &TokenAddress) -> Result<&Pool, RegistryError> {
        self.pools
            .get(token)
            .ok_or_else(|| RegistryError::UnknownPool(token.clone()))
    }

    pub fn contains(&self, token: &TokenAddress) -> bool {
        self.pools.contains_key(token)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenAddress> {
        self.pools.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

impl FromIterator<Pool> for PoolBook {
    fn from_iter<I: IntoIterator<Item = Pool>>(iter: I) -> Self {
        let mut book = Self::new();
        for pool in iter {
            book.insert(pool);
        }
        book
    }
}

#[derive(Debug, Clone, Default)]
pub struct LenderBook {
    lenders: HashMap<TokenAddress, Lender>,
}

impl LenderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, lender: Lender) -> Option<Lender> {
        self.lenders.insert(lender.collateral_token.clone(), lender)
    }

    pub fn get(&self, collateral: &TokenAddress) -> Result<&Lender, RegistryError> {
        self.lenders
            .get(collateral)
            .ok_or_else(|| RegistryError::UnknownLender(collateral.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lender> {
        self.lenders.values()
    }

    pub fn len(&self) -> usize {
        self.lenders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lenders.is_empty()
    }
}

impl FromIterator<Lender> for LenderBook {
    fn from_iter<I: IntoIterator<Item = Lender>>(iter: I) -> Self {
        let mut book = Self::new();
        for lender in iter {
            book.insert(lender);
        }
        book
    }
}
