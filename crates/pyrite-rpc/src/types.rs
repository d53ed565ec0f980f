//! JSON shapes of the public API.
//!
//! Rendering rules: addresses as base58 strings, hashes and byte blobs as
//! base64, balances and fees as decimal strings, timestamps as integers.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use pyrite_core::{
    AccountInfo, AccountType, Address, Balance, Error, ImmutableBlock, Result, Sha256, Signature,
    Transaction, TransactionStatus,
};

// ── Envelope ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Call,
    Subscribe,
    Unsubscribe,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Request {
    pub id: u64,
    #[serde(default)]
    pub version: u64,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Clone, Debug, Serialize)]
pub struct Response {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub status: &'static str,
    pub id: u64,
    pub result: Value,
}

impl Response {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            kind: "answer",
            status: "success",
            id,
            result,
        }
    }

    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Self {
            kind: "answer",
            status: "error",
            id,
            result: Value::String(message.into()),
        }
    }
}

/// The protocol version this server speaks.
pub const API_VERSION: u64 = 1;

// ── Command arguments ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AccountInfoArgs {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct FindBlockArgs {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub number: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct FindTransactionArgs {
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct PushTransactionArgs {
    pub from: String,
    pub to: String,
    pub amount: String,
    pub fee: String,
    pub timestamp: u64,
    #[serde(default)]
    pub data: String,
    pub sign: String,
}

impl PushTransactionArgs {
    /// Rebuild the signed transaction this request describes.
    pub fn into_transaction(self) -> Result<Transaction> {
        let from = Address::from_base58(&self.from)?;
        let to = if self.to.is_empty() {
            Address::null()
        } else {
            Address::from_base58(&self.to)?
        };
        let amount = Balance::from_dec_str(&self.amount)
            .map_err(|e| Error::InvalidArgument(format!("bad amount: {e}")))?;
        let fee: u64 = self
            .fee
            .parse()
            .map_err(|e| Error::InvalidArgument(format!("bad fee: {e}")))?;
        let data = BASE64
            .decode(&self.data)
            .map_err(|e| Error::InvalidArgument(format!("bad data: {e}")))?;
        let mut tx = Transaction::new(from, to, amount, fee, self.timestamp, data)?;
        tx.set_signature(Signature::from_base64(&self.sign)?);
        Ok(tx)
    }
}

#[derive(Debug, Deserialize)]
pub struct ViewCallArgs {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub message: String,
}

// ── Result rendering ─────────────────────────────────────────────────────────

/// Chain tip summary: the payload of `last_block_info` and its stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfoView {
    pub top_block_hash: Sha256,
    pub top_block_number: u64,
}

pub fn node_info_to_json(info: &NodeInfoView) -> Value {
    json!({
        "top_block_hash": info.top_block_hash.to_base64(),
        "top_block_number": info.top_block_number,
    })
}

pub fn account_info_to_json(info: &AccountInfo) -> Value {
    let kind = match info.account_type {
        AccountType::Client => "client",
        AccountType::Contract => "contract",
    };
    json!({
        "type": kind,
        "address": info.address.to_base58(),
        "balance": info.balance.to_string(),
        "nonce": info.nonce,
        "transaction_hashes": info.transactions.iter().map(Sha256::to_base64).collect::<Vec<_>>(),
    })
}

pub fn transaction_to_json(tx: &Transaction) -> Value {
    json!({
        "from": tx.from().to_base58(),
        "to": tx.to().to_base58(),
        "amount": tx.amount().to_string(),
        "fee": tx.fee().to_string(),
        "timestamp": tx.timestamp(),
        "data": BASE64.encode(tx.data()),
        "sign": tx.signature().to_base64(),
    })
}

pub fn block_to_json(block: &ImmutableBlock) -> Value {
    json!({
        "depth": block.depth(),
        "nonce": block.nonce(),
        "prev_block_hash": block.prev_block_hash().to_base64(),
        "timestamp": block.timestamp(),
        "coinbase": block.coinbase().to_base58(),
        "transactions": block.transactions().iter().map(transaction_to_json).collect::<Vec<_>>(),
        "hash": block.hash().to_base64(),
    })
}

pub fn status_to_json(status: &TransactionStatus) -> Value {
    json!({
        "status_code": status.status as u8,
        "action_type": status.action as u8,
        "fee_left": status.fee_left.to_string(),
        "message": status.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_envelope_parses() {
        let raw = r#"{"id": 3, "version": 1, "type": "call", "name": "last_block_info", "args": {}}"#;
        let request: Request = serde_json::from_str(raw).unwrap();
        assert_eq!(request.id, 3);
        assert_eq!(request.kind, RequestKind::Call);
        assert_eq!(request.name, "last_block_info");
    }

    #[test]
    fn response_envelope_shape() {
        let response = Response::success(7, json!({"x": 1}));
        let raw = serde_json::to_value(&response).unwrap();
        assert_eq!(raw["type"], "answer");
        assert_eq!(raw["status"], "success");
        assert_eq!(raw["id"], 7);

        let error = Response::error(7, "no such block");
        let raw = serde_json::to_value(&error).unwrap();
        assert_eq!(raw["status"], "error");
        assert_eq!(raw["result"], "no such block");
    }

    #[test]
    fn push_transaction_args_round_trip() {
        let keypair = pyrite_crypto::KeyPair::generate();
        let from = Address::from_public_key(&keypair.public_key_bytes());
        let mut tx = Transaction::new(
            from,
            Address::from_bytes([2; 20]),
            Balance::from(100u64),
            1,
            1_583_789_700,
            b"payload".to_vec(),
        )
        .unwrap();
        tx.sign(&keypair);

        let rendered = transaction_to_json(&tx);
        let args: PushTransactionArgs = serde_json::from_value(rendered).unwrap();
        let rebuilt = args.into_transaction().unwrap();
        assert_eq!(rebuilt, tx);
        assert!(rebuilt.check_sign());
    }

    #[test]
    fn balances_render_as_decimal_strings() {
        let info = AccountInfo {
            account_type: AccountType::Client,
            address: Address::from_bytes([1; 20]),
            balance: Balance::from(12_345u64),
            nonce: 2,
            transactions: vec![],
        };
        let value = account_info_to_json(&info);
        assert_eq!(value["balance"], "12345");
        assert_eq!(value["type"], "client");
    }
}
