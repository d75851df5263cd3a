//! # HTTP API
//!
//! The axum router in front of the transaction facades. Handlers share
//! [`AppState`] through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path      | Description                               |
//! |--------|-----------|-------------------------------------------|
//! | GET    | `/health` | Liveness probe                            |
//! | GET    | `/status` | Chain height, pool size, local accounts   |
//! | POST   | `/rpc`    | JSON-RPC 2.0 gateway                      |
//!
//! ## JSON-RPC parameters
//!
//! Parameters are positional. Optional trailing block selectors default to
//! `latest`. An object in place of the params array is treated as a single
//! positional argument.

use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::{Address, Bytes, B256, U256};
use axum::body::Bytes as Body;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use sable_protocol::api::{
    ApiError, CallArgs, GovernanceApi, PersonalApi, Quantity, SendTxArgs, TransactionApi,
};
use sable_protocol::network::{RpcError, RpcMethod, RpcRequest, RpcResponse, TxPool};
use sable_protocol::storage::{BlockNumber, ChainReader, DevChain};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub chain: Arc<DevChain>,
    pub pool: Arc<TxPool>,
    pub transactions: TransactionApi,
    pub personal: PersonalApi,
    pub governance: GovernanceApi,
    pub metrics: SharedMetrics,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub chain_id: u64,
    pub block_number: u64,
    pub pool_size: usize,
    pub accounts: usize,
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rpc", post(rpc_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// REST Handlers
// ---------------------------------------------------------------------------

/// `GET /health`. Does not look at any subsystem.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: state.version.clone(),
        chain_id: state.transactions.backend().chain.chain_config().chain_id,
        block_number: state.chain.height(),
        pool_size: state.pool.size(),
        accounts: state.transactions.accounts().len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ---------------------------------------------------------------------------
// JSON-RPC Gateway
// ---------------------------------------------------------------------------

/// `POST /rpc`. Always answers 200 with a JSON-RPC envelope, including for
/// bodies that do not parse.
async fn rpc_handler(State(state): State<AppState>, body: Body) -> impl IntoResponse {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return Json(RpcResponse::error(
                Value::Null,
                RpcError::parse_error(e.to_string()),
            ))
        }
    };
    if request.jsonrpc != "2.0" {
        return Json(RpcResponse::error(
            request.id,
            RpcError::invalid_request("jsonrpc must be \"2.0\""),
        ));
    }
    let Some(method) = RpcMethod::from_name(&request.method) else {
        return Json(RpcResponse::error(
            request.id,
            RpcError::method_not_found(request.method),
        ));
    };

    let started = Instant::now();
    let params = Params::new(request.params);
    let outcome = dispatch(&state, method, &params).await;
    state
        .metrics
        .rpc_latency_seconds
        .with_label_values(&[request.method.as_str()])
        .observe(started.elapsed().as_secs_f64());

    match outcome {
        Ok(result) => Json(RpcResponse::success(request.id, result)),
        Err(error) => {
            debug!(method = %request.method, code = error.code, message = %error.message, "rpc error");
            Json(RpcResponse::error(request.id, error))
        }
    }
}

/// Positional parameters.
struct Params(Vec<Value>);

impl Params {
    fn new(raw: Value) -> Self {
        match raw {
            Value::Null => Self(Vec::new()),
            Value::Array(items) => Self(items),
            other => Self(vec![other]),
        }
    }

    fn required<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<T, RpcError> {
        let value = self
            .0
            .get(index)
            .filter(|v| !v.is_null())
            .ok_or_else(|| RpcError::invalid_params(format!("missing parameter {index} ({name})")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| RpcError::invalid_params(format!("parameter {index} ({name}): {e}")))
    }

    fn optional<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<Option<T>, RpcError> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.required(index, name).map(Some),
        }
    }

    fn block(&self, index: usize) -> Result<BlockNumber, RpcError> {
        Ok(self.optional(index, "block")?.unwrap_or_default())
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(e.to_string()))
}

fn reply<T: Serialize>(result: Result<T, ApiError>) -> Result<Value, RpcError> {
    to_json(result?)
}

/// Replies for routes that end in the pending pool, counting the outcome.
fn submitted(state: &AppState, result: Result<B256, ApiError>) -> Result<Value, RpcError> {
    match result {
        Ok(hash) => {
            state.metrics.transactions_submitted_total.inc();
            to_json(hash)
        }
        Err(e) => {
            state
                .metrics
                .transactions_rejected_total
                .with_label_values(&[e.kind().as_str()])
                .inc();
            Err(e.into())
        }
    }
}

async fn dispatch(state: &AppState, method: RpcMethod, p: &Params) -> Result<Value, RpcError> {
    let txs = &state.transactions;
    let personal = &state.personal;
    let gov = &state.governance;

    match method {
        // -- transactions ------------------------------------------------------
        RpcMethod::SendRawTransaction => {
            let raw: Bytes = p.required(0, "raw")?;
            submitted(state, txs.send_raw_transaction(&raw).await)
        }
        RpcMethod::SendTransaction => {
            let args: SendTxArgs = p.required(0, "args")?;
            submitted(state, txs.send_transaction(args).await)
        }
        RpcMethod::SignTransaction => {
            let args: SendTxArgs = p.required(0, "args")?;
            reply(txs.sign_transaction(args).await)
        }
        RpcMethod::Call => {
            let args: CallArgs = p.required(0, "args")?;
            let block = p.block(1)?;
            state.metrics.calls_total.inc();
            reply(txs.call(&args, block).await)
        }
        RpcMethod::EstimateGas => {
            let args: CallArgs = p.required(0, "args")?;
            state.metrics.estimates_total.inc();
            let estimate = txs.estimate_gas(&args).await?;
            state
                .metrics
                .estimate_probes
                .observe(f64::from(estimate.probes));
            to_json(Quantity(estimate.gas))
        }
        RpcMethod::Sign => {
            let address: Address = p.required(0, "address")?;
            let data: Bytes = p.required(1, "data")?;
            reply(txs.sign(address, &data))
        }
        RpcMethod::EcRecover => {
            let data: Bytes = p.required(0, "data")?;
            let signature: Bytes = p.required(1, "signature")?;
            reply(txs.ec_recover(&data, &signature))
        }
        RpcMethod::Resend => {
            let args: SendTxArgs = p.required(0, "args")?;
            let gas_price: Option<U256> = p.optional(1, "gasPrice")?;
            let gas: Option<Quantity> = p.optional(2, "gas")?;
            submitted(state, txs.resend(args, gas_price, gas.map(|q| q.0)).await)
        }
        RpcMethod::GasPrice => reply(txs.gas_price().await),
        RpcMethod::Accounts => to_json(txs.accounts()),
        RpcMethod::PendingTransactions => to_json(txs.pending_transactions()),
        RpcMethod::BlockNumber => to_json(Quantity(txs.block_number())),

        // -- personal ------------------------------------------------------------
        RpcMethod::NewAccount => {
            let passphrase: String = p.required(0, "passphrase")?;
            reply(personal.new_account(&passphrase))
        }
        RpcMethod::ImportRawKey => {
            let secret: String = p.required(0, "key")?;
            let passphrase: String = p.required(1, "passphrase")?;
            reply(personal.import_raw_key(&secret, &passphrase))
        }
        RpcMethod::UnlockAccount => {
            let address: Address = p.required(0, "address")?;
            let passphrase: String = p.required(1, "passphrase")?;
            let seconds: Option<Quantity> = p.optional(2, "duration")?;
            reply(personal.unlock_account(address, &passphrase, seconds.map(|q| q.0)))
        }
        RpcMethod::LockAccount => {
            let address: Address = p.required(0, "address")?;
            reply(personal.lock_account(address))
        }
        RpcMethod::PersonalSendTransaction => {
            let args: SendTxArgs = p.required(0, "args")?;
            let passphrase: String = p.required(1, "passphrase")?;
            submitted(state, personal.send_transaction(args, &passphrase).await)
        }
        RpcMethod::PersonalSign => {
            let data: Bytes = p.required(0, "data")?;
            let address: Address = p.required(1, "address")?;
            let passphrase: String = p.required(2, "passphrase")?;
            reply(personal.sign(&data, address, &passphrase))
        }

        // -- stock ---------------------------------------------------------------
        RpcMethod::SetStockManager => {
            let manager: Address = p.required(0, "manager")?;
            submitted(state, gov.set_stock_manager(manager).await)
        }
        RpcMethod::StockSet => {
            let holder: Address = p.required(0, "holder")?;
            let quantity: Quantity = p.required(1, "quantity")?;
            submitted(state, gov.stock_set(holder, quantity.0).await)
        }
        RpcMethod::StockTransfer => {
            let from: Address = p.required(0, "from")?;
            let to: Address = p.required(1, "to")?;
            let quantity: Quantity = p.required(2, "quantity")?;
            submitted(state, gov.stock_transfer(from, to, quantity.0).await)
        }
        RpcMethod::StockFreeze => {
            let holder: Address = p.required(0, "holder")?;
            submitted(state, gov.stock_freeze(holder).await)
        }
        RpcMethod::StockUnfreeze => {
            let holder: Address = p.required(0, "holder")?;
            submitted(state, gov.stock_unfreeze(holder).await)
        }
        RpcMethod::StockClean => {
            let holder: Address = p.required(0, "holder")?;
            submitted(state, gov.stock_clean(holder).await)
        }
        RpcMethod::StockManager => reply(gov.stock_manager(p.block(0)?).await),
        RpcMethod::GetStock => {
            let holder: Address = p.required(0, "holder")?;
            reply(gov.stock_get(holder, p.block(1)?).await)
        }
        RpcMethod::GetStocks => reply(gov.stocks_get(p.block(0)?).await),
        RpcMethod::StockGasPool => reply(gov.stock_gas_pool(p.block(0)?).await.map(Quantity)),

        // -- validators and base contracts ---------------------------------------
        RpcMethod::AddValidator => {
            let validator: Address = p.required(0, "validator")?;
            submitted(state, gov.add_validator(validator).await)
        }
        RpcMethod::SetSystemContract => {
            let contract: Address = p.required(0, "contract")?;
            submitted(state, gov.set_system_contract(contract).await)
        }
        RpcMethod::SetUserContract => {
            let from: Address = p.required(0, "from")?;
            let contract: Address = p.required(1, "contract")?;
            submitted(state, gov.set_user_contract(from, contract).await)
        }
        RpcMethod::CancelUserContract => {
            let from: Address = p.required(0, "from")?;
            let contract: Address = p.required(1, "contract")?;
            submitted(state, gov.cancel_user_contract(from, contract).await)
        }
        RpcMethod::Validators => reply(gov.validators(p.block(0)?).await),

        // -- attachments ---------------------------------------------------------
        RpcMethod::SetWord => {
            let word: String = p.required(0, "word")?;
            submitted(state, gov.set_word(&word).await)
        }
        RpcMethod::SetData => {
            let data: Bytes = p.required(0, "data")?;
            submitted(state, gov.set_data(data).await)
        }
        RpcMethod::GetWord => {
            let hash: B256 = p.required(0, "hash")?;
            reply(gov.get_word(hash).await)
        }
        RpcMethod::GetData => {
            let hash: B256 = p.required(0, "hash")?;
            reply(gov.get_data(hash).await)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body as RequestBody;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use sable_protocol::api::{Backend, FixedPriceOracle};
    use sable_protocol::config::ApiConfig;
    use sable_protocol::network::rpc::{
        INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR, UNAUTHORIZED, VALIDATION_ERROR,
    };
    use sable_protocol::network::{BlockProducer, PoolConfig, ProducerConfig};
    use sable_protocol::storage::{Genesis, GenesisAccount};
    use sable_protocol::vault::{KeyManager, KeyStore};
    use sable_protocol::vm::DevVmFactory;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::metrics::NodeMetrics;

    struct Fixture {
        router: Router,
        state: AppState,
        producer: BlockProducer,
        operator: Address,
        holder: Address,
    }

    /// A devnet with an unlocked operator (coinbase, stock manager) and a
    /// second unlocked account holding 100 units of stock.
    fn fixture() -> Fixture {
        let keystore = KeyStore::in_memory();
        let operator = keystore.new_account("pw").unwrap();
        let holder = keystore.new_account("pw").unwrap();
        keystore.unlock(&operator, "pw", None).unwrap();
        keystore.unlock(&holder, "pw", None).unwrap();

        let mut genesis = Genesis::default();
        for address in [operator, holder] {
            genesis.alloc.insert(
                address,
                GenesisAccount {
                    balance: U256::from(10u64).pow(U256::from(21u64)),
                    ..Default::default()
                },
            );
        }
        genesis.stock_manager = operator;
        genesis.holdings.insert(holder, 100);

        let chain = Arc::new(DevChain::new(&genesis));
        let pool = Arc::new(TxPool::new(chain.clone(), PoolConfig::default()));
        let backend = Backend::new(
            chain.clone(),
            pool.clone(),
            Arc::new(FixedPriceOracle(U256::from(1_000_000_000u64))),
            Arc::new(keystore.clone()),
            Arc::new(DevVmFactory),
            ApiConfig {
                coinbase: Some(operator),
                local_validator: Some(operator),
                ..Default::default()
            },
        );
        let transactions = TransactionApi::new(backend);
        let state = AppState {
            version: "0.1.0-test".into(),
            chain: chain.clone(),
            pool: pool.clone(),
            personal: PersonalApi::new(Arc::new(keystore), transactions.clone()),
            governance: GovernanceApi::new(transactions.clone()),
            transactions,
            metrics: Arc::new(NodeMetrics::new().unwrap()),
        };
        let producer = BlockProducer::new(chain, pool, operator, ProducerConfig::default());

        Fixture {
            router: create_router(state.clone()),
            state,
            producer,
            operator,
            holder,
        }
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .uri(path)
            .body(RequestBody::empty())
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    async fn post_raw(router: &Router, body: Vec<u8>) -> RpcResponse {
        let req = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(RequestBody::from(body))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn rpc(router: &Router, method: &str, params: Value) -> RpcResponse {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        post_raw(router, serde_json::to_vec(&body).unwrap()).await
    }

    fn result(resp: RpcResponse) -> Value {
        match (resp.result, resp.error) {
            (Some(result), None) => result,
            (_, error) => panic!("expected result, got error {:?}", error),
        }
    }

    fn error_code(resp: RpcResponse) -> i32 {
        match resp.error {
            Some(error) => error.code,
            None => panic!("expected error, got {:?}", resp.result),
        }
    }

    // -- 1. REST endpoints ------------------------------------------------------

    #[tokio::test]
    async fn health_and_status() {
        let fx = fixture();
        let (status, body) = get(&fx.router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");

        let (status, body) = get(&fx.router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.block_number, 0);
        assert_eq!(resp.pool_size, 0);
        assert_eq!(resp.accounts, 2);
    }

    // -- 2. Envelope errors -------------------------------------------------------

    #[tokio::test]
    async fn envelope_errors() {
        let fx = fixture();
        let resp = post_raw(&fx.router, b"{not json".to_vec()).await;
        assert_eq!(error_code(resp), PARSE_ERROR);

        let resp = rpc(&fx.router, "sable_nope", json!([])).await;
        assert_eq!(error_code(resp), METHOD_NOT_FOUND);

        let resp = rpc(&fx.router, "sable_sendTransaction", json!([])).await;
        assert_eq!(error_code(resp), INVALID_PARAMS);
    }

    // -- 3. Intent through the gateway -------------------------------------------

    #[tokio::test]
    async fn send_then_seal() {
        let fx = fixture();
        let args = json!({
            "from": fx.operator,
            "to": Address::repeat_byte(0x33),
            "value": "0x64"
        });
        let hash: B256 =
            serde_json::from_value(result(rpc(&fx.router, "sable_sendTransaction", json!([args])).await))
                .unwrap();

        let pending = result(rpc(&fx.router, "sable_pendingTransactions", Value::Null).await);
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let sealed = fx.producer.produce_once().unwrap();
        assert_eq!(sealed.included, vec![hash]);
        let number = result(rpc(&fx.router, "sable_blockNumber", json!([])).await);
        assert_eq!(number, "0x1");
        assert_eq!(fx.state.metrics.transactions_submitted_total.get(), 1);
    }

    #[tokio::test]
    async fn estimate_counts_probes() {
        let fx = fixture();
        let args = json!({ "to": Address::repeat_byte(0x33) });
        let gas = result(rpc(&fx.router, "sable_estimateGas", json!([args])).await);
        assert_eq!(gas, "0x5208");
        assert_eq!(fx.state.metrics.estimates_total.get(), 1);
        assert_eq!(fx.state.metrics.estimate_probes.get_sample_count(), 1);
    }

    // -- 4. Governance refusals keep their codes ---------------------------------

    #[tokio::test]
    async fn gate_refusal_is_unauthorized() {
        let fx = fixture();
        let resp = rpc(
            &fx.router,
            "sable_stockTransfer",
            json!([fx.holder, fx.operator, 150]),
        )
        .await;
        assert_eq!(error_code(resp), UNAUTHORIZED);
        assert_eq!(
            fx.state
                .metrics
                .transactions_rejected_total
                .with_label_values(&["authorization"])
                .get(),
            1
        );
        assert!(fx.state.pool.is_empty());
    }

    #[tokio::test]
    async fn stock_queries_default_to_latest() {
        let fx = fixture();
        let holding = result(rpc(&fx.router, "sable_getStock", json!([fx.holder])).await);
        assert_eq!(holding["number"], 100);
        let manager = result(rpc(&fx.router, "sable_stockManager", json!(["latest"])).await);
        assert_eq!(manager, json!(fx.operator));
    }

    // -- 5. Attachments and personal ---------------------------------------------

    #[tokio::test]
    async fn word_round_trip() {
        let fx = fixture();
        let hash = result(rpc(&fx.router, "sable_setWord", json!(["hello"])).await);
        fx.producer.produce_once().unwrap();
        let word = result(rpc(&fx.router, "sable_getWord", json!([hash])).await);
        assert_eq!(word, "hello");
    }

    #[tokio::test]
    async fn personal_sign_and_recover() {
        let fx = fixture();
        let signature = result(
            rpc(&fx.router, "personal_sign", json!(["0x6869", fx.operator, "pw"])).await,
        );
        let recovered = result(
            rpc(&fx.router, "sable_ecRecover", json!(["0x6869", signature])).await,
        );
        assert_eq!(recovered, json!(fx.operator));

        let resp = rpc(&fx.router, "sable_ecRecover", json!(["0x6869", "0x00"])).await;
        assert_eq!(error_code(resp), VALIDATION_ERROR);
    }
}
