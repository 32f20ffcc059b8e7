//! Two fixed principals with disjoint privilege sets.
//!
//! The administrative identity is set once at construction and never
//! changes; the operator is the only identity allowed to start a borrow and
//! can be replaced by the administrative principal only.

use crate::error::GuardError;
use crate::ident::AccountId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControl {
    administrative: AccountId,
    operator: AccountId,
}

impl AccessControl {
    pub fn new(administrative: AccountId, operator: AccountId) -> Result<Self, GuardError> {
        if administrative.is_zero() {
            return Err(GuardError::InvalidConfiguration(
                "administrative principal must be non-zero",
            ));
        }
        if operator.is_zero() {
            return Err(GuardError::InvalidConfiguration(
                "operator principal must be non-zero",
            ));
        }
        Ok(Self {
            administrative,
            operator,
        })
    }

    pub fn administrative(&self) -> AccountId {
        self.administrative
    }

    pub fn operator(&self) -> AccountId {
        self.operator
    }

    pub fn require_administrative(&self, caller: AccountId) -> Result<(), GuardError> {
        if caller != self.administrative {
            return Err(GuardError::Unauthorized);
        }
        Ok(())
    }

    pub fn require_operator(&self, caller: AccountId) -> Result<(), GuardError> {
        if caller != self.operator {
            return Err(GuardError::Unauthorized);
        }
        Ok(())
    }

    /// Replace the operator, returning the displaced identity. The caller
    /// must already have passed the administrative check.
    pub fn replace_operator(&mut self, operator: AccountId) -> Result<AccountId, GuardError> {
        if operator.is_zero() {
            return Err(GuardError::InvalidOperator);
        }
        let previous = self.operator;
        self.operator = operator;
        Ok(previous)
    }
}
