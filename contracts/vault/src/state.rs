use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, StdError, StdResult, Storage, Uint128};
use cw_storage_plus::{Item, Map};
use recur_rs::{
    core::ContractError,
    vault::{BatchEntry, Config, Schedule},
};

pub const CONFIG: Item<Config> = Item::new("config");

/// Accrued post-fee quote-denom credit per account.
pub const LEDGER: Map<&Addr, Uint128> = Map::new("ledger");

/// In-flight settlement snapshot. Occupied between dispatching the
/// converter call and settling its result in `reply`; any execution entry
/// that finds it occupied must fail, which makes it the re-entrancy guard
/// around the external call.
pub const PENDING: Item<PendingSettlement> = Item::new("pending");

#[cw_serde]
pub enum PendingSettlement {
    Single {
        owner: Addr,
        index: u32,
        id: u64,
        pre_base: Uint128,
        pre_quote: Uint128,
    },
    Batch {
        entries: Vec<BatchEntry>,
        declared_total: Uint128,
        pre_base: Uint128,
        pre_quote: Uint128,
    },
}

pub struct ScheduleStore<'a> {
    schedules: Map<&'a Addr, Vec<Schedule>>,
}

impl ScheduleStore<'_> {
    pub fn all(&self, storage: &dyn Storage, owner: &Addr) -> StdResult<Vec<Schedule>> {
        Ok(self.schedules.may_load(storage, owner)?.unwrap_or_default())
    }

    /// Load the schedule at `index`, rejecting stale references: the stored
    /// id must match the supplied one.
    pub fn load_checked(
        &self,
        storage: &dyn Storage,
        owner: &Addr,
        index: u32,
        id: u64,
    ) -> Result<Schedule, ContractError> {
        let schedules = self.all(storage, owner)?;

        let schedule = schedules
            .get(index as usize)
            .ok_or(ContractError::ScheduleNotFound { index })?;

        if schedule.id != id {
            return Err(ContractError::ScheduleIdMismatch {
                index,
                expected: id,
                actual: schedule.id,
            });
        }

        Ok(schedule.clone())
    }

    pub fn save_all(
        &self,
        storage: &mut dyn Storage,
        owner: &Addr,
        schedules: &Vec<Schedule>,
    ) -> StdResult<()> {
        if schedules.is_empty() {
            self.schedules.remove(storage, owner);
            return Ok(());
        }

        self.schedules.save(storage, owner, schedules)
    }

    pub fn set(
        &self,
        storage: &mut dyn Storage,
        owner: &Addr,
        index: u32,
        schedule: &Schedule,
    ) -> StdResult<()> {
        let mut schedules = self.all(storage, owner)?;

        *schedules
            .get_mut(index as usize)
            .ok_or_else(|| StdError::generic_err(format!("no schedule at index {}", index)))? =
            schedule.clone();

        self.save_all(storage, owner, &schedules)
    }

    pub fn push(
        &self,
        storage: &mut dyn Storage,
        owner: &Addr,
        schedule: &Schedule,
    ) -> StdResult<()> {
        let mut schedules = self.all(storage, owner)?;
        schedules.push(schedule.clone());
        self.save_all(storage, owner, &schedules)
    }

    /// Swap-and-pop removal: the last schedule takes the removed index, so
    /// indices are not stable across deletions.
    pub fn swap_remove(
        &self,
        storage: &mut dyn Storage,
        owner: &Addr,
        index: u32,
    ) -> StdResult<Schedule> {
        let mut schedules = self.all(storage, owner)?;

        if index as usize >= schedules.len() {
            return Err(StdError::generic_err(format!(
                "no schedule at index {}",
                index
            )));
        }

        let removed = schedules.swap_remove(index as usize);
        self.save_all(storage, owner, &schedules)?;

        Ok(removed)
    }
}

pub const SCHEDULES: ScheduleStore<'static> = ScheduleStore {
    schedules: Map::new("schedules_v1"),
};
