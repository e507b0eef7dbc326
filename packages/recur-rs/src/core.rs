use cosmwasm_std::{
    Addr, Binary, CheckedMultiplyRatioError, Coin, ConversionOverflowError, CosmosMsg,
    DivideByZeroError, OverflowError, Response, StdError, Uint128, WasmMsg,
};
use cw_utils::PaymentError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("{0}")]
    Overflow(#[from] OverflowError),

    #[error("{0}")]
    CheckedMultiplyRatio(#[from] CheckedMultiplyRatioError),

    #[error("{0}")]
    DivideByZero(#[from] DivideByZeroError),

    #[error("{0}")]
    ConversionOverflow(#[from] ConversionOverflowError),

    #[error("{0}")]
    Payment(#[from] PaymentError),

    #[error("Unauthorized")]
    Unauthorized {},

    #[error("No schedule at index {index}")]
    ScheduleNotFound { index: u32 },

    #[error("Schedule id mismatch at index {index}: expected {expected}, found {actual}")]
    ScheduleIdMismatch { index: u32, expected: u64, actual: u64 },

    #[error("Schedule {id} is paused")]
    SchedulePaused { id: u64 },

    #[error("Period not elapsed: next execution due at {due}")]
    PeriodNotElapsed { due: u64 },

    #[error("Sale amount {amount} is below the minimum of {min}")]
    SaleAmountBelowMinimum { amount: Uint128, min: Uint128 },

    #[error("Period {period} is below the minimum of {min}")]
    PeriodBelowMinimum { period: u64, min: u64 },

    #[error("Sale amount {amount} exceeds schedule balance {balance}")]
    SaleAmountExceedsBalance { amount: Uint128, balance: Uint128 },

    #[error("Cannot hold more than {max} schedules at once")]
    MaxSchedulesReached { max: u32 },

    #[error("A settlement is already in progress")]
    SettlementInProgress {},

    #[error("Batch must contain at least one entry")]
    EmptyBatch {},

    #[error("Declared total {declared} does not match the sum of sale amounts {actual}")]
    DeclaredTotalMismatch { declared: Uint128, actual: Uint128 },

    #[error("Conversion failed: {reason}")]
    ConversionFailed { reason: String },

    #[error("Nothing to withdraw")]
    NothingToWithdraw {},

    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: &'static str },
}

impl ContractError {
    pub fn generic_err(msg: impl Into<String>) -> Self {
        ContractError::Std(StdError::generic_err(msg.into()))
    }
}

pub type ContractResult = Result<Response, ContractError>;

pub struct Contract(pub Addr);

impl Contract {
    pub fn addr(&self) -> Addr {
        self.0.clone()
    }

    pub fn call(&self, msg: Binary, funds: Vec<Coin>) -> CosmosMsg {
        WasmMsg::Execute {
            contract_addr: self.addr().into(),
            msg,
            funds,
        }
        .into()
    }
}
