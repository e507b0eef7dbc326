use cosmwasm_schema::cw_serde;
use cosmwasm_std::Uint128;

use crate::core::ContractError;

/// Rates are expressed in hundredths of a percent, i.e. 100 == 1%.
pub const FEE_RATE_DIVISOR: u64 = 10_000;

/// Sliding-scale settlement fee. The applied rate starts at `max_rate` for
/// settled amounts at or below `lower_bound` and falls linearly to
/// `min_rate` at `upper_bound`.
#[cw_serde]
pub struct FeeConfig {
    pub min_rate: u64,
    pub max_rate: u64,
    pub lower_bound: Uint128,
    pub upper_bound: Uint128,
}

impl FeeConfig {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.min_rate > self.max_rate {
            return Err(ContractError::InvalidConfig {
                reason: "min_rate cannot exceed max_rate",
            });
        }

        if self.max_rate >= FEE_RATE_DIVISOR {
            return Err(ContractError::InvalidConfig {
                reason: "max_rate must be below the rate divisor",
            });
        }

        if self.lower_bound > self.upper_bound {
            return Err(ContractError::InvalidConfig {
                reason: "lower_bound cannot exceed upper_bound",
            });
        }

        Ok(())
    }

    pub fn rate_for(&self, amount: Uint128) -> u64 {
        if self.min_rate == self.max_rate || amount >= self.upper_bound {
            return self.min_rate;
        }

        if amount <= self.lower_bound {
            return self.max_rate;
        }

        let reduction = (amount - self.lower_bound).multiply_ratio(
            self.max_rate - self.min_rate,
            self.upper_bound - self.lower_bound,
        );

        // reduction < max_rate - min_rate, so the cast cannot truncate
        self.max_rate - reduction.u128() as u64
    }

    pub fn fee_for(&self, amount: Uint128) -> Result<Uint128, ContractError> {
        Ok(amount.checked_multiply_ratio(self.rate_for(amount), FEE_RATE_DIVISOR)?)
    }
}
