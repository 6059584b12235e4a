//! Esplora REST adapter for the Bitcoin family
//!
//! Speaks the mempool.space / Blockstream API: `/address/{a}`,
//! `/address/{a}/utxo`, `/address/{a}/txs/mempool`, `/fee-estimates`,
//! `/blocks/tip/height` and `POST /tx`.

use super::{
    AccountInfo, ApiSwitchNotifier, BalanceProvider, BroadcastProvider, FeeQuoteProvider,
    PendingReport, UtxoProvider,
};
use crate::amount::{Amount, Token};
use crate::blockchain::Blockchain;
use crate::config::SdkConfig;
use crate::error::ProviderError;
use crate::fee::FeeQuote;
use crate::transaction::NetworkPendingTransaction;
use crate::utxo::UnspentOutput;
use async_trait::async_trait;
use bitcoin::Address;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Confirmation targets (blocks) for the minimal, normal and priority tiers
const FEE_TARGETS: [&str; 3] = ["144", "6", "1"];

pub struct EsploraProvider {
    client: reqwest::Client,
    blockchain: Blockchain,
    hosts: Vec<String>,
    current: AtomicUsize,
    notifier: ApiSwitchNotifier,
}

impl EsploraProvider {
    pub fn new(blockchain: Blockchain, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            blockchain,
            hosts: vec![trim_host(base_url.into())],
            current: AtomicUsize::new(0),
            notifier: ApiSwitchNotifier::default(),
        }
    }

    pub fn from_config(blockchain: Blockchain, config: &SdkConfig) -> Self {
        Self::new(blockchain, config.esplora_url.clone())
    }

    /// Hosts to move to, in order, when the current one is unreachable
    pub fn with_fallback_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts
            .extend(hosts.into_iter().map(|host| trim_host(host.into())));
        self
    }

    pub fn with_notifier(mut self, notifier: ApiSwitchNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn base_url(&self) -> &str {
        let index = self.current.load(Ordering::Relaxed) % self.hosts.len();
        &self.hosts[index]
    }

    /// Moves to the next host; the failed request itself is not retried
    fn switch_host(&self) {
        if self.hosts.len() < 2 {
            return;
        }
        let next = (self.current.load(Ordering::Relaxed) + 1) % self.hosts.len();
        self.current.store(next, Ordering::Relaxed);
        self.notifier.notify(self.blockchain, &self.hosts[next]);
    }

    fn request_failed(&self, error: reqwest::Error) -> ProviderError {
        if error.is_connect() || error.is_timeout() {
            log::warn!("Esplora host {} unreachable: {}", self.base_url(), error);
            self.switch_host();
        }
        ProviderError::from(error)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{}", self.base_url(), path);
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_failed(e))?;
        check_status(response).await
    }

    async fn get_json(&self, path: &str) -> Result<Value, ProviderError> {
        self.get(path)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }

    pub async fn get_tip_height(&self) -> Result<u64, ProviderError> {
        let text = self.get("/blocks/tip/height").await?.text().await?;
        text.trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| ProviderError::Parse(e.to_string()))
    }
}

fn trim_host(host: String) -> String {
    host.trim_end_matches('/').to_string()
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ProviderError::Status {
        code: status.as_u16(),
        message,
    })
}

fn sats_to_decimal(sats: u64, decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(sats), decimals)
}

/// Spendable balance in sats, mempool activity included
pub fn parse_address_stats(value: &Value) -> Result<u64, ProviderError> {
    if value.get("chain_stats").is_none() {
        return Err(ProviderError::Parse("missing chain_stats".to_string()));
    }

    let stat = |section: &str, key: &str| value[section][key].as_u64().unwrap_or(0);
    let funded = stat("chain_stats", "funded_txo_sum") + stat("mempool_stats", "funded_txo_sum");
    let spent = stat("chain_stats", "spent_txo_sum") + stat("mempool_stats", "spent_txo_sum");

    Ok(funded.saturating_sub(spent))
}

/// Malformed entries are skipped
pub fn parse_utxos(
    value: &Value,
    address: &str,
    output_script: &[u8],
) -> Result<Vec<UnspentOutput>, ProviderError> {
    let list = value
        .as_array()
        .ok_or_else(|| ProviderError::Parse("expected a UTXO array".to_string()))?;

    let utxos = list
        .iter()
        .filter_map(|utxo| {
            Some(UnspentOutput {
                transaction_hash: utxo["txid"].as_str()?.to_string(),
                output_index: u32::try_from(utxo["vout"].as_u64()?).ok()?,
                amount: utxo["value"].as_u64()?,
                output_script: output_script.to_vec(),
                address: address.to_string(),
                assets: Vec::new(),
            })
        })
        .collect();

    Ok(utxos)
}

/// Fee rates in sat/vB for the minimal, normal and priority tiers, rounded up
pub fn parse_fee_estimates(value: &Value) -> Result<[u64; 3], ProviderError> {
    let rate = |target: &str| {
        value[target]
            .as_f64()
            .map(|rate| rate.ceil().max(1.0) as u64)
            .ok_or_else(|| {
                ProviderError::Parse(format!("missing fee estimate for {} blocks", target))
            })
    };

    Ok([
        rate(FEE_TARGETS[0])?,
        rate(FEE_TARGETS[1])?,
        rate(FEE_TARGETS[2])?,
    ])
}

/// Mempool transactions touching `address`, valued from its point of view
pub fn parse_mempool_transactions(
    value: &Value,
    address: &str,
    decimals: u32,
) -> Result<Vec<NetworkPendingTransaction>, ProviderError> {
    let list = value
        .as_array()
        .ok_or_else(|| ProviderError::Parse("expected a transaction array".to_string()))?;

    let is_ours = |entry: &Value| entry["scriptpubkey_address"].as_str() == Some(address);
    let mut pending = Vec::new();

    for tx in list {
        let Some(hash) = tx["txid"].as_str() else {
            continue;
        };
        let inputs = tx["vin"].as_array().map(Vec::as_slice).unwrap_or_default();
        let outputs = tx["vout"].as_array().map(Vec::as_slice).unwrap_or_default();

        let is_incoming = !inputs.iter().any(|input| is_ours(&input["prevout"]));
        let (source, destination, sats) = if is_incoming {
            let source = inputs
                .iter()
                .find_map(|input| input["prevout"]["scriptpubkey_address"].as_str())
                .unwrap_or_default();
            let received: u64 = outputs
                .iter()
                .filter(|&output| is_ours(output))
                .filter_map(|output| output["value"].as_u64())
                .sum();
            (source, address, received)
        } else {
            let foreign: Vec<&Value> = outputs.iter().filter(|&output| !is_ours(output)).collect();
            let destination = foreign
                .iter()
                .find_map(|output| output["scriptpubkey_address"].as_str())
                .unwrap_or_default();
            let sent: u64 = foreign.iter().filter_map(|output| output["value"].as_u64()).sum();
            (address, destination, sent)
        };

        pending.push(NetworkPendingTransaction {
            hash: hash.to_string(),
            source: source.to_string(),
            destination: destination.to_string(),
            value: sats_to_decimal(sats, decimals),
            fee: tx["fee"].as_u64().map(|fee| sats_to_decimal(fee, decimals)),
            date: Utc::now(),
            is_incoming,
        });
    }

    Ok(pending)
}

#[async_trait]
impl UtxoProvider for EsploraProvider {
    async fn get_unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, ProviderError> {
        let script = Address::from_str(address)
            .map_err(|e| ProviderError::Parse(format!("{}: {}", address, e)))?
            .assume_checked()
            .script_pubkey();

        let value = self.get_json(&format!("/address/{}/utxo", address)).await?;
        let utxos = parse_utxos(&value, address, script.as_bytes())?;
        log::debug!("{} unspent outputs for {}", utxos.len(), address);
        Ok(utxos)
    }
}

#[async_trait]
impl BalanceProvider for EsploraProvider {
    async fn get_info(&self, address: &str, _tokens: &[Token]) -> Result<AccountInfo, ProviderError> {
        let decimals = self.blockchain.decimal_count();

        let stats = self.get_json(&format!("/address/{}", address)).await?;
        let mempool = self
            .get_json(&format!("/address/{}/txs/mempool", address))
            .await?;

        Ok(AccountInfo {
            coin_balance: sats_to_decimal(parse_address_stats(&stats)?, decimals),
            pending: PendingReport::Complete(parse_mempool_transactions(&mempool, address, decimals)?),
            ..Default::default()
        })
    }
}

#[async_trait]
impl FeeQuoteProvider for EsploraProvider {
    async fn get_fee_quote(&self, _amount: &Amount, _destination: &str) -> Result<FeeQuote, ProviderError> {
        let value = self.get_json("/fee-estimates").await?;
        Ok(FeeQuote::Utxo {
            rates: parse_fee_estimates(&value)?,
        })
    }
}

#[async_trait]
impl BroadcastProvider for EsploraProvider {
    async fn submit(&self, raw_transaction: &[u8]) -> Result<String, ProviderError> {
        let url = format!("{}/tx", self.base_url());
        log::debug!("Broadcasting transaction to: {}", url);

        let response = self
            .client
            .post(&url)
            .body(hex::encode(raw_transaction))
            .send()
            .await
            .map_err(|e| self.request_failed(e))?;
        let txid = check_status(response).await?.text().await?;

        Ok(txid.trim().to_string())
    }
}
