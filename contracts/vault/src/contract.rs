use cosmwasm_schema::cw_serde;
#[cfg(not(feature = "library"))]
use cosmwasm_std::entry_point;
use cosmwasm_std::{
    to_json_binary, Addr, BankMsg, Binary, Coin, Deps, DepsMut, Env, Event, MessageInfo, Reply,
    Response, StdError, StdResult, SubMsg, SubMsgResult, Uint128,
};
use cw_utils::{may_pay, must_pay, nonpayable};
use recur_rs::{
    converter::{ConverterExecuteMsg, ConverterQueryMsg, ExpectedReceiveAmount},
    core::{Contract, ContractError, ContractResult},
    fees::FEE_RATE_DIVISOR,
    math::{ceil_share, floor_share},
    vault::{
        derive_schedule_id, BatchEntry, Config, ConfigUpdate, DomainEvent, Schedule,
        VaultExecuteMsg, VaultQueryMsg,
    },
};

use crate::state::{PendingSettlement, CONFIG, LEDGER, PENDING, SCHEDULES};

const CONTRACT_NAME: &str = "crates.io:recur-vault";
const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CONVERT_REPLY_ID: u64 = 1;

#[entry_point]
pub fn instantiate(deps: DepsMut, _env: Env, _info: MessageInfo, msg: Config) -> ContractResult {
    msg.validate(deps.api)?;

    cw2::set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    CONFIG.save(deps.storage, &msg)?;

    Ok(Response::default().add_attribute("initialized", "true"))
}

#[cw_serde]
pub struct MigrateMsg {}

#[entry_point]
pub fn migrate(_deps: DepsMut, _env: Env, _msg: MigrateMsg) -> Result<Response, StdError> {
    Ok(Response::default().add_attribute("migrated", "true"))
}

#[entry_point]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: VaultExecuteMsg,
) -> ContractResult {
    match msg {
        VaultExecuteMsg::CreateSchedule {
            sale_amount,
            period,
        } => create_schedule(deps, env, info, sale_amount, period),
        VaultExecuteMsg::UpdateSchedule {
            index,
            id,
            sale_amount,
            period,
        } => update_schedule(deps, info, index, id, sale_amount, period),
        VaultExecuteMsg::SetSaleAmount { index, id, amount } => {
            nonpayable(&info)?;
            update_schedule(deps, info, index, id, Some(amount), None)
        }
        VaultExecuteMsg::SetPeriod { index, id, period } => {
            nonpayable(&info)?;
            update_schedule(deps, info, index, id, None, Some(period))
        }
        VaultExecuteMsg::PauseSchedule { index, id } => set_paused(deps, info, index, id, true),
        VaultExecuteMsg::ResumeSchedule { index, id } => set_paused(deps, info, index, id, false),
        VaultExecuteMsg::WithdrawEscrow { index, id, amount } => {
            withdraw_escrow(deps, info, index, id, amount)
        }
        VaultExecuteMsg::DeleteSchedule { index, id } => delete_schedule(deps, info, index, id),
        VaultExecuteMsg::ExecuteSchedule { owner, index, id } => {
            execute_schedule(deps, env, info, owner, index, id)
        }
        VaultExecuteMsg::ExecuteBatch {
            entries,
            total_sale_amount,
        } => execute_batch(deps, env, info, entries, total_sale_amount),
        VaultExecuteMsg::Withdraw {} => withdraw(deps, info),
        VaultExecuteMsg::UpdateConfig(update) => update_config(deps, info, update),
    }
}

fn create_schedule(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    sale_amount: Uint128,
    period: u64,
) -> ContractResult {
    let config = CONFIG.load(deps.storage)?;
    let deposit = must_pay(&info, &config.base_denom)?;

    if period < config.min_period {
        return Err(ContractError::PeriodBelowMinimum {
            period,
            min: config.min_period,
        });
    }

    if sale_amount < config.min_sale_amount {
        return Err(ContractError::SaleAmountBelowMinimum {
            amount: sale_amount,
            min: config.min_sale_amount,
        });
    }

    if sale_amount > deposit {
        return Err(ContractError::SaleAmountExceedsBalance {
            amount: sale_amount,
            balance: deposit,
        });
    }

    let index = SCHEDULES.all(deps.storage, &info.sender)?.len() as u32;

    if index >= config.max_schedules_per_account {
        return Err(ContractError::MaxSchedulesReached {
            max: config.max_schedules_per_account,
        });
    }

    let schedule = Schedule {
        id: derive_schedule_id(&info.sender, env.block.time, index),
        sale_amount,
        period,
        last_execution: 0,
        balance: deposit,
        paused: false,
    };

    SCHEDULES.push(deps.storage, &info.sender, &schedule)?;

    Ok(Response::default()
        .add_event(DomainEvent::ScheduleCreated {
            owner: info.sender,
            index,
            id: schedule.id,
            sale_amount,
            period,
            balance: deposit,
        })
        .add_attribute("index", index.to_string())
        .add_attribute("id", schedule.id.to_string()))
}

fn update_schedule(
    deps: DepsMut,
    info: MessageInfo,
    index: u32,
    id: u64,
    sale_amount: Option<Uint128>,
    period: Option<u64>,
) -> ContractResult {
    let config = CONFIG.load(deps.storage)?;
    let deposit = may_pay(&info, &config.base_denom)?;

    let mut schedule = SCHEDULES.load_checked(deps.storage, &info.sender, index, id)?;

    schedule.balance = schedule.balance.checked_add(deposit)?;

    if let Some(period) = period {
        if period < config.min_period {
            return Err(ContractError::PeriodBelowMinimum {
                period,
                min: config.min_period,
            });
        }

        schedule.period = period;
    }

    if let Some(amount) = sale_amount {
        if amount < config.min_sale_amount {
            return Err(ContractError::SaleAmountBelowMinimum {
                amount,
                min: config.min_sale_amount,
            });
        }

        // validated against the balance including any fresh deposit
        if amount > schedule.balance {
            return Err(ContractError::SaleAmountExceedsBalance {
                amount,
                balance: schedule.balance,
            });
        }

        schedule.sale_amount = amount;
    }

    SCHEDULES.set(deps.storage, &info.sender, index, &schedule)?;

    Ok(Response::default().add_event(DomainEvent::ScheduleUpdated {
        owner: info.sender,
        id,
        sale_amount: schedule.sale_amount,
        period: schedule.period,
        balance: schedule.balance,
    }))
}

fn set_paused(
    deps: DepsMut,
    info: MessageInfo,
    index: u32,
    id: u64,
    paused: bool,
) -> ContractResult {
    nonpayable(&info)?;

    let mut schedule = SCHEDULES.load_checked(deps.storage, &info.sender, index, id)?;

    // pausing touches nothing else, so cadence resumes where it left off
    schedule.paused = paused;
    SCHEDULES.set(deps.storage, &info.sender, index, &schedule)?;

    Ok(Response::default().add_event(if paused {
        DomainEvent::SchedulePaused {
            owner: info.sender,
            id,
        }
    } else {
        DomainEvent::ScheduleResumed {
            owner: info.sender,
            id,
        }
    }))
}

fn withdraw_escrow(
    deps: DepsMut,
    info: MessageInfo,
    index: u32,
    id: u64,
    amount: Uint128,
) -> ContractResult {
    nonpayable(&info)?;

    if amount.is_zero() {
        return Err(ContractError::NothingToWithdraw {});
    }

    let config = CONFIG.load(deps.storage)?;
    let mut schedule = SCHEDULES.load_checked(deps.storage, &info.sender, index, id)?;

    // sale_amount is deliberately not re-validated against the reduced
    // balance; an under-funded execution fails on the checked debit
    schedule.balance = schedule.balance.checked_sub(amount)?;
    SCHEDULES.set(deps.storage, &info.sender, index, &schedule)?;

    Ok(Response::default()
        .add_message(BankMsg::Send {
            to_address: info.sender.to_string(),
            amount: vec![Coin::new(amount, config.base_denom)],
        })
        .add_event(DomainEvent::EscrowWithdrawn {
            owner: info.sender,
            id,
            amount,
        }))
}

fn delete_schedule(deps: DepsMut, info: MessageInfo, index: u32, id: u64) -> ContractResult {
    nonpayable(&info)?;

    let config = CONFIG.load(deps.storage)?;

    SCHEDULES.load_checked(deps.storage, &info.sender, index, id)?;
    let removed = SCHEDULES.swap_remove(deps.storage, &info.sender, index)?;

    let mut response = Response::default().add_event(DomainEvent::ScheduleDeleted {
        owner: info.sender.clone(),
        id,
        refunded: removed.balance,
    });

    if !removed.balance.is_zero() {
        response = response.add_message(BankMsg::Send {
            to_address: info.sender.to_string(),
            amount: vec![Coin::new(removed.balance, config.base_denom)],
        });
    }

    Ok(response)
}

fn withdraw(deps: DepsMut, info: MessageInfo) -> ContractResult {
    nonpayable(&info)?;

    let config = CONFIG.load(deps.storage)?;
    let balance = LEDGER
        .may_load(deps.storage, &info.sender)?
        .unwrap_or_default();

    if balance.is_zero() {
        return Err(ContractError::NothingToWithdraw {});
    }

    LEDGER.remove(deps.storage, &info.sender);

    Ok(Response::default()
        .add_message(BankMsg::Send {
            to_address: info.sender.to_string(),
            amount: vec![Coin::new(balance, config.quote_denom)],
        })
        .add_event(DomainEvent::FundsWithdrawn {
            owner: info.sender,
            amount: balance,
        }))
}

fn ensure_executable(schedule: &Schedule, now: u64) -> Result<(), ContractError> {
    if schedule.paused {
        return Err(ContractError::SchedulePaused { id: schedule.id });
    }

    if !schedule.is_due(now) {
        return Err(ContractError::PeriodNotElapsed {
            due: schedule.next_due(),
        });
    }

    Ok(())
}

fn ensure_executor(config: &Config, sender: &Addr) -> Result<(), ContractError> {
    if !config.executors.contains(sender) {
        return Err(ContractError::Unauthorized {});
    }

    Ok(())
}

fn ensure_idle(deps: &DepsMut) -> Result<(), ContractError> {
    if PENDING.may_load(deps.storage)?.is_some() {
        return Err(ContractError::SettlementInProgress {});
    }

    Ok(())
}

fn convert_submsg(config: &Config, amount: Uint128) -> Result<SubMsg, ContractError> {
    Ok(SubMsg::reply_always(
        Contract(config.converter.clone()).call(
            to_json_binary(&ConverterExecuteMsg::Convert {
                target_denom: config.quote_denom.clone(),
                recipient: None,
            })?,
            vec![Coin::new(amount, config.base_denom.clone())],
        ),
        CONVERT_REPLY_ID,
    ))
}

fn execute_schedule(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    owner: Addr,
    index: u32,
    id: u64,
) -> ContractResult {
    nonpayable(&info)?;

    let config = CONFIG.load(deps.storage)?;

    ensure_executor(&config, &info.sender)?;
    ensure_idle(&deps)?;

    let schedule = SCHEDULES.load_checked(deps.storage, &owner, index, id)?;
    ensure_executable(&schedule, env.block.time.seconds())?;

    let pre_base = deps
        .querier
        .query_balance(&env.contract.address, &config.base_denom)?
        .amount;
    let pre_quote = deps
        .querier
        .query_balance(&env.contract.address, &config.quote_denom)?
        .amount;

    PENDING.save(
        deps.storage,
        &PendingSettlement::Single {
            owner,
            index,
            id,
            pre_base,
            pre_quote,
        },
    )?;

    Ok(Response::default().add_submessage(convert_submsg(&config, schedule.sale_amount)?))
}

fn execute_batch(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    entries: Vec<BatchEntry>,
    total_sale_amount: Uint128,
) -> ContractResult {
    nonpayable(&info)?;

    let config = CONFIG.load(deps.storage)?;

    ensure_executor(&config, &info.sender)?;
    ensure_idle(&deps)?;

    if entries.is_empty() {
        return Err(ContractError::EmptyBatch {});
    }

    // all local reads happen before the external call
    let now = env.block.time.seconds();
    let mut sum = Uint128::zero();

    for entry in &entries {
        let schedule = SCHEDULES.load_checked(deps.storage, &entry.owner, entry.index, entry.id)?;
        ensure_executable(&schedule, now)?;

        sum = sum.checked_add(schedule.sale_amount)?;
    }

    if sum != total_sale_amount {
        return Err(ContractError::DeclaredTotalMismatch {
            declared: total_sale_amount,
            actual: sum,
        });
    }

    let pre_base = deps
        .querier
        .query_balance(&env.contract.address, &config.base_denom)?
        .amount;
    let pre_quote = deps
        .querier
        .query_balance(&env.contract.address, &config.quote_denom)?
        .amount;

    PENDING.save(
        deps.storage,
        &PendingSettlement::Batch {
            entries,
            declared_total: total_sale_amount,
            pre_base,
            pre_quote,
        },
    )?;

    Ok(Response::default().add_submessage(convert_submsg(&config, total_sale_amount)?))
}

fn update_config(deps: DepsMut, info: MessageInfo, update: ConfigUpdate) -> ContractResult {
    nonpayable(&info)?;

    let mut config = CONFIG.load(deps.storage)?;

    if info.sender != config.admin {
        return Err(ContractError::Unauthorized {});
    }

    if let Some(admin) = update.admin {
        config.admin = admin;
    }
    if let Some(executors) = update.executors {
        config.executors = executors;
    }
    if let Some(converter) = update.converter {
        config.converter = converter;
    }
    if let Some(fee_collector) = update.fee_collector {
        config.fee_collector = fee_collector;
    }
    if let Some(fees) = update.fees {
        config.fees = fees;
    }
    if let Some(min_sale_amount) = update.min_sale_amount {
        config.min_sale_amount = min_sale_amount;
    }
    if let Some(min_period) = update.min_period {
        config.min_period = min_period;
    }
    if let Some(max) = update.max_schedules_per_account {
        config.max_schedules_per_account = max;
    }
    if let Some(bps) = update.conversion_fee_bps {
        config.conversion_fee_bps = bps;
    }

    config.validate(deps.api)?;
    CONFIG.save(deps.storage, &config)?;

    Ok(Response::default().add_attribute("config_updated", "true"))
}

#[entry_point]
pub fn reply(deps: DepsMut, env: Env, reply: Reply) -> ContractResult {
    if reply.id != CONVERT_REPLY_ID {
        return Err(ContractError::generic_err(format!(
            "unhandled reply id: {}",
            reply.id
        )));
    }

    let pending = PENDING
        .may_load(deps.storage)?
        .ok_or_else(|| ContractError::generic_err("no settlement in progress"))?;

    PENDING.remove(deps.storage);

    if let SubMsgResult::Err(reason) = reply.result {
        return Err(ContractError::ConversionFailed { reason });
    }

    let config = CONFIG.load(deps.storage)?;

    let post_base = deps
        .querier
        .query_balance(&env.contract.address, &config.base_denom)?
        .amount;
    let post_quote = deps
        .querier
        .query_balance(&env.contract.address, &config.quote_denom)?
        .amount;

    match pending {
        PendingSettlement::Single {
            owner,
            index,
            id,
            pre_base,
            pre_quote,
        } => {
            let spent = pre_base.checked_sub(post_base)?;
            let received = post_quote.checked_sub(pre_quote)?;

            settle_single(deps, &env, &config, owner, index, id, spent, received)
        }
        PendingSettlement::Batch {
            entries,
            declared_total,
            pre_base,
            pre_quote,
        } => {
            let total_spent = pre_base.checked_sub(post_base)?;
            let total_received = post_quote.checked_sub(pre_quote)?;

            settle_batch(
                deps,
                &env,
                &config,
                entries,
                declared_total,
                total_spent,
                total_received,
            )
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn settle_single(
    deps: DepsMut,
    env: &Env,
    config: &Config,
    owner: Addr,
    index: u32,
    id: u64,
    spent: Uint128,
    received: Uint128,
) -> ContractResult {
    if received.is_zero() {
        return Err(ContractError::ConversionFailed {
            reason: "conversion service returned no proceeds".to_string(),
        });
    }

    let mut schedule = SCHEDULES.load_checked(deps.storage, &owner, index, id)?;

    // debit what the converter actually spent, which may be strictly less
    // than the requested sale amount
    schedule.balance = schedule.balance.checked_sub(spent)?;
    schedule.advance(env.block.time.seconds());
    SCHEDULES.set(deps.storage, &owner, index, &schedule)?;

    let fee = config.fees.fee_for(received)?;
    let credit = received.checked_sub(fee)?;

    LEDGER.update(deps.storage, &owner, |balance| {
        balance
            .unwrap_or_default()
            .checked_add(credit)
            .map_err(ContractError::from)
    })?;

    let mut response = Response::default()
        .add_event(DomainEvent::ScheduleExecuted {
            owner,
            id,
            spent,
            received,
            fee,
        })
        .add_attribute("spent", spent)
        .add_attribute("credited", credit);

    if !fee.is_zero() {
        response = response.add_message(BankMsg::Send {
            to_address: config.fee_collector.to_string(),
            amount: vec![Coin::new(fee, config.quote_denom.clone())],
        });
    }

    Ok(response)
}

fn settle_batch(
    deps: DepsMut,
    env: &Env,
    config: &Config,
    entries: Vec<BatchEntry>,
    declared_total: Uint128,
    total_spent: Uint128,
    total_received: Uint128,
) -> ContractResult {
    if total_received.is_zero() {
        return Err(ContractError::ConversionFailed {
            reason: "conversion service returned no proceeds".to_string(),
        });
    }

    let now = env.block.time.seconds();

    let mut settled_total = Uint128::zero();
    let mut total_fee = Uint128::zero();
    let mut events: Vec<Event> = Vec::with_capacity(entries.len());

    for entry in entries {
        let mut schedule =
            SCHEDULES.load_checked(deps.storage, &entry.owner, entry.index, entry.id)?;

        // a duplicate entry is no longer due after its first settlement, so
        // re-checking here fails the whole batch
        ensure_executable(&schedule, now)?;

        // spent shares round up so the pool can never be over-drawn,
        // received shares round down so the ledger can never over-credit
        let entry_spent = ceil_share(total_spent, schedule.sale_amount, declared_total)?;
        let entry_received = floor_share(total_received, schedule.sale_amount, declared_total)?;

        settled_total = settled_total.checked_add(schedule.sale_amount)?;

        schedule.balance = schedule.balance.checked_sub(entry_spent)?;
        schedule.advance(now);
        SCHEDULES.set(deps.storage, &entry.owner, entry.index, &schedule)?;

        let fee = config.fees.fee_for(entry_received)?;
        let credit = entry_received.checked_sub(fee)?;

        LEDGER.update(deps.storage, &entry.owner, |balance| {
            balance
                .unwrap_or_default()
                .checked_add(credit)
                .map_err(ContractError::from)
        })?;

        total_fee = total_fee.checked_add(fee)?;

        events.push(
            DomainEvent::ScheduleExecuted {
                owner: entry.owner,
                id: entry.id,
                spent: entry_spent,
                received: entry_received,
                fee,
            }
            .into(),
        );
    }

    if settled_total != declared_total {
        return Err(ContractError::DeclaredTotalMismatch {
            declared: declared_total,
            actual: settled_total,
        });
    }

    let mut response = Response::default()
        .add_events(events)
        .add_attribute("total_spent", total_spent)
        .add_attribute("total_received", total_received);

    if !total_fee.is_zero() {
        response = response.add_message(BankMsg::Send {
            to_address: config.fee_collector.to_string(),
            amount: vec![Coin::new(total_fee, config.quote_denom.clone())],
        });
    }

    Ok(response)
}

#[entry_point]
pub fn query(deps: Deps, env: Env, msg: VaultQueryMsg) -> StdResult<Binary> {
    match msg {
        VaultQueryMsg::Config {} => to_json_binary(&CONFIG.load(deps.storage)?),
        VaultQueryMsg::Schedules { owner } => to_json_binary(&SCHEDULES.all(deps.storage, &owner)?),
        VaultQueryMsg::Balance { owner } => {
            to_json_binary(&LEDGER.may_load(deps.storage, &owner)?.unwrap_or_default())
        }
        VaultQueryMsg::CanExecute { owner, index, id } => {
            let can_execute = SCHEDULES
                .load_checked(deps.storage, &owner, index, id)
                .map(|schedule| ensure_executable(&schedule, env.block.time.seconds()).is_ok())
                .unwrap_or(false);

            to_json_binary(&can_execute)
        }
        VaultQueryMsg::ExpectedProceeds { owner, index, id } => {
            to_json_binary(&expected_proceeds(deps, owner, index, id)?)
        }
    }
}

/// Estimated post-commission, post-fee proceeds of executing the schedule
/// at the converter's current quoted rate.
fn expected_proceeds(deps: Deps, owner: Addr, index: u32, id: u64) -> StdResult<Uint128> {
    let config = CONFIG.load(deps.storage)?;

    let schedule = SCHEDULES
        .load_checked(deps.storage, &owner, index, id)
        .map_err(|e| StdError::generic_err(e.to_string()))?;

    let quoted = deps
        .querier
        .query_wasm_smart::<ExpectedReceiveAmount>(
            config.converter,
            &ConverterQueryMsg::ExpectedReceiveAmount {
                convert_amount: Coin::new(schedule.sale_amount, config.base_denom),
                target_denom: config.quote_denom,
            },
        )?
        .receive_amount
        .amount;

    let gross = quoted.multiply_ratio(
        FEE_RATE_DIVISOR - config.conversion_fee_bps,
        FEE_RATE_DIVISOR,
    );

    let fee = config
        .fees
        .fee_for(gross)
        .map_err(|e| StdError::generic_err(e.to_string()))?;

    Ok(gross.checked_sub(fee)?)
}
