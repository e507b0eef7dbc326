use ahash::RandomState;
use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Api, Event, Timestamp, Uint128};

use crate::{
    core::ContractError,
    fees::{FeeConfig, FEE_RATE_DIVISOR},
};

/// One recurring sale instruction. `last_execution` is `0` until the first
/// successful execution, then the previous execution's nominal due time.
#[cw_serde]
pub struct Schedule {
    pub id: u64,
    pub sale_amount: Uint128,
    pub period: u64,
    pub last_execution: u64,
    pub balance: Uint128,
    pub paused: bool,
}

impl Schedule {
    pub fn is_due(&self, now: u64) -> bool {
        self.last_execution == 0 || now >= self.next_due()
    }

    // saturates so an extreme period pins the due time at the end of time
    // instead of overflowing
    pub fn next_due(&self) -> u64 {
        self.last_execution.saturating_add(self.period)
    }

    /// Advance the cadence nominally: the first execution anchors it at
    /// `now`, every later one steps by exactly one period.
    pub fn advance(&mut self, now: u64) {
        self.last_execution = if self.last_execution == 0 {
            now
        } else {
            self.next_due()
        };
    }
}

/// Opaque schedule identity, checked against the supplied index on every
/// access to detect stale references across swap-and-pop deletions.
pub fn derive_schedule_id(owner: &Addr, created_at: Timestamp, index: u32) -> u64 {
    RandomState::with_seeds(
        0x9a3c_55de_1f07_b2c4,
        0x42d1_8e6a_7c93_f015,
        0xe7b5_20c9_d84a_6f31,
        0x1c68_f3ad_5b92_e470,
    )
    .hash_one((owner.as_str(), created_at.nanos(), index))
}

#[cw_serde]
pub struct Config {
    pub admin: Addr,
    pub executors: Vec<Addr>,
    pub converter: Addr,
    pub fee_collector: Addr,
    pub base_denom: String,
    pub quote_denom: String,
    pub fees: FeeConfig,
    pub min_sale_amount: Uint128,
    pub min_period: u64,
    pub max_schedules_per_account: u32,
    pub conversion_fee_bps: u64,
}

impl Config {
    pub fn validate(&self, api: &dyn Api) -> Result<(), ContractError> {
        api.addr_validate(self.admin.as_str())?;
        api.addr_validate(self.converter.as_str())?;
        api.addr_validate(self.fee_collector.as_str())?;

        if self.executors.is_empty() {
            return Err(ContractError::InvalidConfig {
                reason: "must provide at least one executor",
            });
        }

        for executor in &self.executors {
            api.addr_validate(executor.as_str())?;
        }

        if self.base_denom == self.quote_denom {
            return Err(ContractError::InvalidConfig {
                reason: "base and quote denom must differ",
            });
        }

        if self.min_period == 0 {
            return Err(ContractError::InvalidConfig {
                reason: "min_period must be positive",
            });
        }

        if self.min_sale_amount.is_zero() {
            return Err(ContractError::InvalidConfig {
                reason: "min_sale_amount must be positive",
            });
        }

        if self.max_schedules_per_account == 0 {
            return Err(ContractError::InvalidConfig {
                reason: "max_schedules_per_account must be positive",
            });
        }

        if self.conversion_fee_bps >= FEE_RATE_DIVISOR {
            return Err(ContractError::InvalidConfig {
                reason: "conversion_fee_bps must be below the rate divisor",
            });
        }

        self.fees.validate()
    }
}

#[cw_serde]
#[derive(Default)]
pub struct ConfigUpdate {
    pub admin: Option<Addr>,
    pub executors: Option<Vec<Addr>>,
    pub converter: Option<Addr>,
    pub fee_collector: Option<Addr>,
    pub fees: Option<FeeConfig>,
    pub min_sale_amount: Option<Uint128>,
    pub min_period: Option<u64>,
    pub max_schedules_per_account: Option<u32>,
    pub conversion_fee_bps: Option<u64>,
}

#[cw_serde]
pub struct BatchEntry {
    pub owner: Addr,
    pub index: u32,
    pub id: u64,
}

#[cw_serde]
pub enum VaultExecuteMsg {
    CreateSchedule {
        sale_amount: Uint128,
        period: u64,
    },
    UpdateSchedule {
        index: u32,
        id: u64,
        sale_amount: Option<Uint128>,
        period: Option<u64>,
    },
    SetSaleAmount {
        index: u32,
        id: u64,
        amount: Uint128,
    },
    SetPeriod {
        index: u32,
        id: u64,
        period: u64,
    },
    PauseSchedule {
        index: u32,
        id: u64,
    },
    ResumeSchedule {
        index: u32,
        id: u64,
    },
    WithdrawEscrow {
        index: u32,
        id: u64,
        amount: Uint128,
    },
    DeleteSchedule {
        index: u32,
        id: u64,
    },
    ExecuteSchedule {
        owner: Addr,
        index: u32,
        id: u64,
    },
    ExecuteBatch {
        entries: Vec<BatchEntry>,
        total_sale_amount: Uint128,
    },
    Withdraw {},
    UpdateConfig(ConfigUpdate),
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum VaultQueryMsg {
    #[returns(Config)]
    Config {},
    #[returns(Vec<Schedule>)]
    Schedules { owner: Addr },
    #[returns(Uint128)]
    Balance { owner: Addr },
    #[returns(bool)]
    CanExecute { owner: Addr, index: u32, id: u64 },
    #[returns(Uint128)]
    ExpectedProceeds { owner: Addr, index: u32, id: u64 },
}

pub enum DomainEvent {
    ScheduleCreated {
        owner: Addr,
        index: u32,
        id: u64,
        sale_amount: Uint128,
        period: u64,
        balance: Uint128,
    },
    ScheduleUpdated {
        owner: Addr,
        id: u64,
        sale_amount: Uint128,
        period: u64,
        balance: Uint128,
    },
    SchedulePaused {
        owner: Addr,
        id: u64,
    },
    ScheduleResumed {
        owner: Addr,
        id: u64,
    },
    EscrowWithdrawn {
        owner: Addr,
        id: u64,
        amount: Uint128,
    },
    ScheduleDeleted {
        owner: Addr,
        id: u64,
        refunded: Uint128,
    },
    ScheduleExecuted {
        owner: Addr,
        id: u64,
        spent: Uint128,
        received: Uint128,
        fee: Uint128,
    },
    FundsWithdrawn {
        owner: Addr,
        amount: Uint128,
    },
}

impl From<DomainEvent> for Event {
    fn from(event: DomainEvent) -> Self {
        match event {
            DomainEvent::ScheduleCreated {
                owner,
                index,
                id,
                sale_amount,
                period,
                balance,
            } => Event::new("schedule_created")
                .add_attribute("owner", owner.as_str())
                .add_attribute("index", index.to_string())
                .add_attribute("id", id.to_string())
                .add_attribute("sale_amount", sale_amount)
                .add_attribute("period", period.to_string())
                .add_attribute("balance", balance),
            DomainEvent::ScheduleUpdated {
                owner,
                id,
                sale_amount,
                period,
                balance,
            } => Event::new("schedule_updated")
                .add_attribute("owner", owner.as_str())
                .add_attribute("id", id.to_string())
                .add_attribute("sale_amount", sale_amount)
                .add_attribute("period", period.to_string())
                .add_attribute("balance", balance),
            DomainEvent::SchedulePaused { owner, id } => Event::new("schedule_paused")
                .add_attribute("owner", owner.as_str())
                .add_attribute("id", id.to_string()),
            DomainEvent::ScheduleResumed { owner, id } => Event::new("schedule_resumed")
                .add_attribute("owner", owner.as_str())
                .add_attribute("id", id.to_string()),
            DomainEvent::EscrowWithdrawn { owner, id, amount } => Event::new("escrow_withdrawn")
                .add_attribute("owner", owner.as_str())
                .add_attribute("id", id.to_string())
                .add_attribute("amount", amount),
            DomainEvent::ScheduleDeleted {
                owner,
                id,
                refunded,
            } => Event::new("schedule_deleted")
                .add_attribute("owner", owner.as_str())
                .add_attribute("id", id.to_string())
                .add_attribute("refunded", refunded),
            DomainEvent::ScheduleExecuted {
                owner,
                id,
                spent,
                received,
                fee,
            } => Event::new("schedule_executed")
                .add_attribute("owner", owner.as_str())
                .add_attribute("id", id.to_string())
                .add_attribute("spent", spent)
                .add_attribute("received", received)
                .add_attribute("fee", fee),
            DomainEvent::FundsWithdrawn { owner, amount } => Event::new("funds_withdrawn")
                .add_attribute("owner", owner.as_str())
                .add_attribute("amount", amount),
        }
    }
}
