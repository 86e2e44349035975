//! Solana JSON-RPC chain client.
//!
//! Fetches `getTransaction` with `jsonParsed` encoding. A signature that is
//! absent at `finalized` commitment but present at `confirmed` is reported as
//! pending so the verifier can retry it.

use crate::error::{Error, Result};
use crate::payment::chain::{
    ChainClient, ChainError, ObservedTransaction, TokenTransfer, TransactionLookup,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Program name the RPC node gives parsed SPL token instructions.
const SPL_TOKEN_PROGRAMS: [&str; 2] = ["spl-token", "spl-token-2022"];

/// Program name the RPC node gives parsed memo instructions.
const SPL_MEMO_PROGRAM: &str = "spl-memo";

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC client for a Solana node.
pub struct RpcChainClient {
    http: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl RpcChainClient {
    /// Create a client for `rpc_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(rpc_url: &str, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build RPC client: {e}")))?;
        Ok(Self {
            http,
            rpc_url: rpc_url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn get_transaction(
        &self,
        signature: &str,
        commitment: &str,
    ) -> std::result::Result<Option<Value>, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "getTransaction",
            "params": [
                signature,
                {
                    "encoding": "jsonParsed",
                    "commitment": commitment,
                    "maxSupportedTransactionVersion": 0
                }
            ]
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError(format!("RPC request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ChainError(format!("RPC returned HTTP {}", response.status())));
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| ChainError(format!("RPC response unreadable: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(ChainError(format!("RPC error {}: {}", err.code, err.message)));
        }

        Ok(envelope.result.filter(|v| !v.is_null()))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn transaction(
        &self,
        signature: &str,
    ) -> std::result::Result<TransactionLookup, ChainError> {
        if let Some(tx) = self.get_transaction(signature, "finalized").await? {
            debug!("Transaction {signature} finalized");
            return Ok(TransactionLookup::Finalized(parse_transaction(&tx)));
        }

        if self.get_transaction(signature, "confirmed").await?.is_some() {
            debug!("Transaction {signature} confirmed but not finalized");
            return Ok(TransactionLookup::Pending);
        }

        Ok(TransactionLookup::Missing)
    }
}

/// Extract token transfers and memos from a `jsonParsed` transaction.
#[must_use]
pub fn parse_transaction(tx: &Value) -> ObservedTransaction {
    let meta = &tx["meta"];
    let account_keys = account_keys(&tx["transaction"]["message"]["accountKeys"]);

    let outer = tx["transaction"]["message"]["instructions"]
        .as_array()
        .into_iter()
        .flatten();
    let inner = meta["innerInstructions"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|group| group["instructions"].as_array())
        .flatten();

    let mut observed = ObservedTransaction {
        failed: !meta["err"].is_null(),
        ..ObservedTransaction::default()
    };

    for ix in outer.chain(inner) {
        let program = ix["program"].as_str().unwrap_or_default();
        if program == SPL_MEMO_PROGRAM {
            if let Some(memo) = ix["parsed"].as_str() {
                observed.memos.push(memo.to_string());
            }
        } else if SPL_TOKEN_PROGRAMS.contains(&program) {
            if let Some(transfer) = parse_token_transfer(&ix["parsed"], meta, &account_keys) {
                observed.transfers.push(transfer);
            }
        }
    }

    observed
}

fn account_keys(keys: &Value) -> Vec<String> {
    keys.as_array()
        .into_iter()
        .flatten()
        .filter_map(|k| k["pubkey"].as_str().or_else(|| k.as_str()))
        .map(str::to_string)
        .collect()
}

fn parse_token_transfer(parsed: &Value, meta: &Value, account_keys: &[String]) -> Option<TokenTransfer> {
    let kind = parsed["type"].as_str()?;
    let info = &parsed["info"];
    let destination = info["destination"].as_str()?.to_string();
    let authority = info["authority"]
        .as_str()
        .or_else(|| info["multisigAuthority"].as_str())?
        .to_string();

    let balance = post_token_balance(meta, account_keys, &destination);
    let recipient_owner = balance
        .and_then(|b| b["owner"].as_str())
        .map(str::to_string);

    let (mint, amount_base_units, decimals) = match kind {
        "transferChecked" => (
            info["mint"].as_str()?.to_string(),
            info["tokenAmount"]["amount"].as_str()?.parse().ok()?,
            u32::try_from(info["tokenAmount"]["decimals"].as_u64()?).ok()?,
        ),
        "transfer" => {
            let balance = balance?;
            (
                balance["mint"].as_str()?.to_string(),
                info["amount"].as_str()?.parse().ok()?,
                u32::try_from(balance["uiTokenAmount"]["decimals"].as_u64()?).ok()?,
            )
        }
        _ => return None,
    };

    Some(TokenTransfer {
        authority,
        destination,
        recipient_owner,
        mint,
        amount_base_units,
        decimals,
    })
}

fn post_token_balance<'a>(meta: &'a Value, account_keys: &[String], account: &str) -> Option<&'a Value> {
    let index = account_keys.iter().position(|k| k == account)?;
    meta["postTokenBalances"]
        .as_array()?
        .iter()
        .find(|b| b["accountIndex"].as_u64() == Some(index as u64))
}
