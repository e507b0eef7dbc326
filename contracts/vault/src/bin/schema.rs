use cosmwasm_schema::write_api;
use recur_rs::vault::{Config, VaultExecuteMsg, VaultQueryMsg};

fn main() {
    write_api! {
        instantiate: Config,
        execute: VaultExecuteMsg,
        query: VaultQueryMsg,
    }
}
