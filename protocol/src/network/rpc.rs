//! # JSON-RPC API Definitions
//!
//! Envelope types, method names and error codes for the Sable JSON-RPC
//! surface. The HTTP server lives in the node binary (axum); the handlers
//! behind each method live in [`crate::api`].
//!
//! Methods are namespaced: `sable_` for transactions, queries and governance,
//! `personal_` for local account management.
//!
//! ## Method Index
//!
//! | Method                          | Description                                  |
//! |---------------------------------|----------------------------------------------|
//! | `sable_sendRawTransaction`      | Admit an externally signed transaction       |
//! | `sable_sendTransaction`         | Build, sign and admit from an intent         |
//! | `sable_signTransaction`         | Build and sign without submitting            |
//! | `sable_call`                    | Simulate a message against chain state       |
//! | `sable_estimateGas`             | Minimal gas allowance for a message          |
//! | `sable_sign` / `sable_ecRecover`| Personal message signing and recovery        |
//! | `sable_resend`                  | Re-sign a pooled transaction with new gas    |
//! | `sable_stock*`                  | Equity governance operations and queries     |
//! | `sable_addValidator` ...        | Validator and base-contract governance       |
//! | `sable_setWord` / `sable_getWord` | Extra attachments                          |
//! | `personal_*`                    | Account creation, import, unlock, lock       |

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Malformed transaction or request content.
pub const VALIDATION_ERROR: i32 = -32000;
/// Authorization gate refusal.
pub const UNAUTHORIZED: i32 = -32001;
/// Unknown account, unavailable state, missing collaborator.
pub const RESOURCE_UNAVAILABLE: i32 = -32002;
/// Pending pool rejection.
pub const TRANSACTION_REJECTED: i32 = -32003;
/// The node could not execute the call (fatal VM error, timeout).
pub const EXECUTION_ERROR: i32 = -32004;
/// Lookup by hash found nothing.
pub const NOT_FOUND: i32 = -32005;
/// Estimation never succeeded below the gas ceiling.
pub const GAS_ALLOWANCE_EXCEEDED: i32 = -32006;

// ---------------------------------------------------------------------------
// RPC Method Enumeration
// ---------------------------------------------------------------------------

/// Supported JSON-RPC methods. The wire name is the serde rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcMethod {
    #[serde(rename = "sable_sendRawTransaction")]
    SendRawTransaction,
    #[serde(rename = "sable_sendTransaction")]
    SendTransaction,
    #[serde(rename = "sable_signTransaction")]
    SignTransaction,
    #[serde(rename = "sable_call")]
    Call,
    #[serde(rename = "sable_estimateGas")]
    EstimateGas,
    #[serde(rename = "sable_sign")]
    Sign,
    #[serde(rename = "sable_ecRecover")]
    EcRecover,
    #[serde(rename = "sable_resend")]
    Resend,
    #[serde(rename = "sable_gasPrice")]
    GasPrice,
    #[serde(rename = "sable_accounts")]
    Accounts,
    #[serde(rename = "sable_pendingTransactions")]
    PendingTransactions,
    #[serde(rename = "sable_blockNumber")]
    BlockNumber,

    #[serde(rename = "personal_newAccount")]
    NewAccount,
    #[serde(rename = "personal_importRawKey")]
    ImportRawKey,
    #[serde(rename = "personal_unlockAccount")]
    UnlockAccount,
    #[serde(rename = "personal_lockAccount")]
    LockAccount,
    #[serde(rename = "personal_sendTransaction")]
    PersonalSendTransaction,
    #[serde(rename = "personal_sign")]
    PersonalSign,

    #[serde(rename = "sable_setStockManager")]
    SetStockManager,
    #[serde(rename = "sable_stockSet")]
    StockSet,
    #[serde(rename = "sable_stockTransfer")]
    StockTransfer,
    #[serde(rename = "sable_stockFreeze")]
    StockFreeze,
    #[serde(rename = "sable_stockUnfreeze")]
    StockUnfreeze,
    #[serde(rename = "sable_stockClean")]
    StockClean,
    #[serde(rename = "sable_stockManager")]
    StockManager,
    #[serde(rename = "sable_getStock")]
    GetStock,
    #[serde(rename = "sable_getStocks")]
    GetStocks,
    #[serde(rename = "sable_stockGasPool")]
    StockGasPool,

    #[serde(rename = "sable_addValidator")]
    AddValidator,
    #[serde(rename = "sable_setSystemContract")]
    SetSystemContract,
    #[serde(rename = "sable_setUserContract")]
    SetUserContract,
    #[serde(rename = "sable_cancelUserContract")]
    CancelUserContract,
    #[serde(rename = "sable_validators")]
    Validators,

    #[serde(rename = "sable_setWord")]
    SetWord,
    #[serde(rename = "sable_setData")]
    SetData,
    #[serde(rename = "sable_getWord")]
    GetWord,
    #[serde(rename = "sable_getData")]
    GetData,
}

impl RpcMethod {
    /// Resolves a wire name. `None` for unknown methods.
    pub fn from_name(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.to_string())).ok()
    }

    /// The wire name.
    pub fn name(&self) -> String {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(s)) => s,
            _ => format!("{:?}", self),
        }
    }
}

// ---------------------------------------------------------------------------
// RPC Request / Response
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
///
/// `method` stays a plain string so unknown methods can be answered with
/// [`METHOD_NOT_FOUND`] instead of a parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: serde_json::Value, method: RpcMethod, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.name(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response. Exactly one of `result` or `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// RPC Errors
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, msg)
    }

    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            METHOD_NOT_FOUND,
            format!("method not found: {}", method.into()),
        )
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, msg)
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, msg)
    }
}
