//! Structural and policy checks on incoming orders
//!
//! Pure: no I/O, no shared state. Checks run in a fixed order and the first
//! failure is reported:
//! 1. Symbol is non-empty
//! 2. Side is buy or sell (case-insensitive)
//! 3. Price > 0
//! 4. Quantity > 0
//! 5. Symbol is on the allow-list, when one is configured

use std::collections::HashSet;

use intake_types::errors::ValidationError;
use intake_types::order::Side;
use rust_decimal::Decimal;

use crate::models::CreateOrderRequest;

/// An order that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidOrder {
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    // Upper-cased; empty disables the check
    allowed_symbols: HashSet<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowed_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_symbols: symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn validate(&self, request: &CreateOrderRequest) -> Result<ValidOrder, ValidationError> {
        let symbol = request.symbol.trim();
        if symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let side = Side::parse(&request.side).ok_or_else(|| ValidationError::InvalidSide {
            side: request.side.clone(),
        })?;

        if request.price <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice);
        }
        if request.quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity);
        }

        if !self.allowed_symbols.is_empty()
            && !self.allowed_symbols.contains(&symbol.to_ascii_uppercase())
        {
            return Err(ValidationError::SymbolNotAllowed {
                symbol: symbol.to_string(),
            });
        }

        Ok(ValidOrder {
            symbol: symbol.to_string(),
            side,
            price: request.price,
            quantity: request.quantity,
        })
    }
}
