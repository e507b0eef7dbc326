use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Coin};

/// Interface of the external conversion service. The engine attaches the
/// base-denom funds to `Convert` and measures the outcome from its own
/// balance deltas; the service may spend strictly less than it was sent,
/// refunding the remainder, but never more.
#[cw_serde]
pub enum ConverterExecuteMsg {
    Convert {
        target_denom: String,
        recipient: Option<Addr>,
    },
}

#[cw_serde]
pub struct ExpectedReceiveAmount {
    pub receive_amount: Coin,
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum ConverterQueryMsg {
    #[returns(ExpectedReceiveAmount)]
    ExpectedReceiveAmount {
        convert_amount: Coin,
        target_denom: String,
    },
}
