use cosmwasm_std::{Uint128, Uint256};

use crate::core::ContractError;

/// `total * part / whole`, rounded down. Summed over all parts of `whole`
/// the shares never exceed `total`.
pub fn floor_share(
    total: Uint128,
    part: Uint128,
    whole: Uint128,
) -> Result<Uint128, ContractError> {
    Ok(total.checked_multiply_ratio(part, whole)?)
}

/// `total * part / whole`, rounded up. Summed over all parts of `whole`
/// the shares never fall short of `total`.
pub fn ceil_share(total: Uint128, part: Uint128, whole: Uint128) -> Result<Uint128, ContractError> {
    let numerator = total.full_mul(part);
    let denominator = Uint256::from(whole);

    let floor = numerator.checked_div(denominator)?;

    let share = if numerator.checked_rem(denominator)?.is_zero() {
        floor
    } else {
        floor.checked_add(Uint256::one())?
    };

    Ok(share.try_into()?)
}
