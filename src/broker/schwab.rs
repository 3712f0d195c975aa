//! Read-only Schwab Trader API client for balances and positions.
//!
//! The client is handed a bearer token that was issued elsewhere; it never
//! runs the OAuth flow and never places orders.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::PositionSource;

const TRADER_API_BASE: &str = "https://api.schwabapi.com/trader/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Entry from `/accounts/accountNumbers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountNumber {
    account_number: String,
    hash_value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    securities_account: SecuritiesAccount,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecuritiesAccount {
    #[serde(rename = "type")]
    account_type: String,
    #[serde(default)]
    current_balances: Balances,
    #[serde(default)]
    positions: Vec<PositionEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Balances {
    #[serde(default)]
    total_cash: Decimal,
    #[serde(default)]
    unsettled_cash: Decimal,
    #[serde(default)]
    cash_balance: Decimal,
    #[serde(default)]
    liquidation_value: Decimal,
    #[serde(default)]
    long_market_value: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionEntry {
    #[serde(default)]
    long_quantity: Decimal,
    instrument: Instrument,
}

#[derive(Debug, Clone, Deserialize)]
struct Instrument {
    symbol: String,
}

/// Balances summarised the way the trading loop consumes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub cash: Decimal,
    pub total_assets: Decimal,
    pub market_value: Decimal,
}

impl AccountSummary {
    fn from_account(account: &SecuritiesAccount) -> Self {
        let balances = &account.current_balances;
        // Unsettled proceeds are not spendable in a cash account
        let cash = match account.account_type.as_str() {
            "CASH" => balances.total_cash - balances.unsettled_cash,
            "MARGIN" => balances.cash_balance,
            _ => Decimal::ZERO,
        };

        Self {
            cash: cash.round_dp(2),
            total_assets: balances.liquidation_value.round_dp(2),
            market_value: balances.long_market_value.round_dp(2),
        }
    }
}

/// Client for the Schwab Trader API (read-only operations).
pub struct SchwabClient {
    http: Client,
    base_url: String,
    access_token: String,
    account_hash: String,
}

impl SchwabClient {
    /// Resolve the account hash for `account_number` and build a client.
    pub async fn connect(base_url: String, access_token: &str, account_number: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        let url = format!("{}/accounts/accountNumbers", base_url);
        let resp = http.get(&url).bearer_auth(access_token).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to get account numbers: {} - {}", status, text));
        }

        let accounts: Vec<AccountNumber> = resp
            .json()
            .await
            .context("Failed to parse account numbers")?;
        let account_hash = find_account_hash(&accounts, account_number)
            .ok_or_else(|| anyhow!("Account number not found for this token"))?;

        Ok(Self {
            http,
            base_url,
            access_token: access_token.to_string(),
            account_hash,
        })
    }

    /// Create from environment variables:
    /// - SCHWAB_ACCESS_TOKEN
    /// - SCHWAB_ACCOUNT_NUMBER
    /// - SCHWAB_API_BASE (defaults to the production Trader API)
    pub async fn from_env() -> Result<Self> {
        let access_token =
            std::env::var("SCHWAB_ACCESS_TOKEN").context("SCHWAB_ACCESS_TOKEN not set")?;
        let account_number =
            std::env::var("SCHWAB_ACCOUNT_NUMBER").context("SCHWAB_ACCOUNT_NUMBER not set")?;
        let base_url =
            std::env::var("SCHWAB_API_BASE").unwrap_or_else(|_| TRADER_API_BASE.to_string());

        Self::connect(base_url, &access_token, &account_number).await
    }

    async fn get_account(&self, with_positions: bool) -> Result<SecuritiesAccount> {
        let mut url = format!("{}/accounts/{}", self.base_url, self.account_hash);
        if with_positions {
            url.push_str("?fields=positions");
        }
        debug!(with_positions, "Fetching Schwab account");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to get account: {} - {}", status, text));
        }

        let account: AccountResponse = resp.json().await.context("Failed to parse account")?;
        Ok(account.securities_account)
    }

    /// Cash, total assets and long market value.
    pub async fn account_summary(&self) -> Result<AccountSummary> {
        let account = self.get_account(false).await?;
        Ok(AccountSummary::from_account(&account))
    }

    /// Long quantity per symbol.
    pub async fn positions(&self) -> Result<HashMap<String, Decimal>> {
        let account = self.get_account(true).await?;
        Ok(positions_by_symbol(&account.positions))
    }
}

#[async_trait]
impl PositionSource for SchwabClient {
    async fn position_quantity(&self, ticker: &str) -> Result<Decimal> {
        let positions = self.positions().await?;
        Ok(positions.get(ticker).copied().unwrap_or(Decimal::ZERO))
    }
}

fn find_account_hash(accounts: &[AccountNumber], account_number: &str) -> Option<String> {
    accounts
        .iter()
        .find(|a| a.account_number == account_number)
        .map(|a| a.hash_value.clone())
}

fn positions_by_symbol(entries: &[PositionEntry]) -> HashMap<String, Decimal> {
    entries
        .iter()
        .map(|p| (p.instrument.symbol.clone(), p.long_quantity))
        .collect()
}
