use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use pyrite_core::{
    AccountInfo, Address, Error, ImmutableBlock, Result, Sha256, Transaction, TransactionStatus,
};

use crate::types::{
    account_info_to_json, block_to_json, node_info_to_json, status_to_json, transaction_to_json,
    AccountInfoArgs, FindBlockArgs, FindTransactionArgs, NodeInfoView, PushTransactionArgs,
    Request, RequestKind, Response, ViewCallArgs,
};

/// The node capabilities the API server is built against. The node binary
/// implements this over its `Core`; tests may implement it over fixtures.
pub trait NodeFacade: Send + Sync + 'static {
    fn last_block_info(&self) -> NodeInfoView;
    fn account_info(&self, address: &Address) -> AccountInfo;
    fn find_block_by_hash(&self, hash: &Sha256) -> Option<ImmutableBlock>;
    fn find_block_by_number(&self, number: u64) -> Option<ImmutableBlock>;
    fn find_transaction(&self, hash: &Sha256) -> Option<Transaction>;
    fn transaction_status(&self, hash: &Sha256) -> Option<TransactionStatus>;
    /// Signature/balance pre-check plus pending-set insert.
    fn push_transaction(&self, tx: Transaction) -> bool;
    fn call_view(&self, from: &Address, contract: &Address, data: &[u8]) -> Result<Vec<u8>>;
    fn minimal_fee(&self) -> u64;

    fn subscribe_blocks(&self) -> broadcast::Receiver<NodeInfoView>;
    fn subscribe_accounts(&self) -> broadcast::Receiver<Address>;
    fn subscribe_tx_statuses(&self) -> broadcast::Receiver<(Sha256, TransactionStatus)>;
}

/// Serve the public API on `addr` until the process ends. The same command
/// set is reachable two ways: one-shot `call`s over `POST /call` and the
/// full call/subscribe protocol over `GET /ws`.
pub async fn serve(facade: Arc<dyn NodeFacade>, addr: SocketAddr) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/call", post(http_call))
        .layer(cors)
        .with_state(facade);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Network(format!("bind {addr}: {e}")))?;
    info!(%addr, "public API listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Network(e.to_string()))
}

async fn http_call(
    State(facade): State<Arc<dyn NodeFacade>>,
    Json(request): Json<Request>,
) -> Json<Response> {
    if request.kind != RequestKind::Call {
        return Json(Response::error(
            request.id,
            "only `call` requests are accepted over HTTP",
        ));
    }
    Json(handle_call(&*facade, &request))
}

async fn ws_upgrade(
    State(facade): State<Arc<dyn NodeFacade>>,
    upgrade: WebSocketUpgrade,
) -> axum::response::Response {
    upgrade.on_upgrade(move |socket| ws_session(facade, socket))
}

/// One WebSocket session: requests in, answers and subscription updates
/// out. Each live subscription is a task forwarding a broadcast stream into
/// the session's outgoing queue.
async fn ws_session(facade: Arc<dyn NodeFacade>, socket: WebSocket) {
    let (mut sink, mut stream) = futures::StreamExt::split(socket);
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Response>(64);

    let writer = tokio::spawn(async move {
        while let Some(response) = outgoing_rx.recv().await {
            let Ok(raw) = serde_json::to_string(&response) else {
                continue;
            };
            if futures::SinkExt::send(&mut sink, WsMessage::Text(raw)).await.is_err() {
                break;
            }
        }
    });

    let mut subscriptions: HashMap<String, JoinHandle<()>> = HashMap::new();

    while let Some(frame) = futures::StreamExt::next(&mut stream).await {
        let Ok(frame) = frame else { break };
        let raw = match frame {
            WsMessage::Text(raw) => raw,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let request: Request = match serde_json::from_str(&raw) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "malformed API request");
                let _ = outgoing_tx.send(Response::error(0, format!("bad request: {e}"))).await;
                continue;
            }
        };

        match request.kind {
            RequestKind::Call => {
                let _ = outgoing_tx.send(handle_call(&*facade, &request)).await;
            }
            RequestKind::Subscribe => {
                match start_subscription(&facade, &request, outgoing_tx.clone()) {
                    Ok(task) => {
                        if let Some(previous) = subscriptions.insert(request.name.clone(), task) {
                            previous.abort();
                        }
                    }
                    Err(e) => {
                        let _ = outgoing_tx
                            .send(Response::error(request.id, e.to_string()))
                            .await;
                    }
                }
            }
            RequestKind::Unsubscribe => {
                if let Some(task) = subscriptions.remove(&request.name) {
                    task.abort();
                    let _ = outgoing_tx
                        .send(Response::success(request.id, serde_json::Value::Null))
                        .await;
                } else {
                    let _ = outgoing_tx
                        .send(Response::error(request.id, "no such subscription"))
                        .await;
                }
            }
        }
    }

    for (_, task) in subscriptions {
        task.abort();
    }
    writer.abort();
}

// ── Calls ────────────────────────────────────────────────────────────────────

fn handle_call(facade: &dyn NodeFacade, request: &Request) -> Response {
    match dispatch_call(facade, request) {
        Ok(result) => Response::success(request.id, result),
        Err(e) => Response::error(request.id, e.to_string()),
    }
}

fn dispatch_call(facade: &dyn NodeFacade, request: &Request) -> Result<serde_json::Value> {
    match request.name.as_str() {
        "last_block_info" => Ok(node_info_to_json(&facade.last_block_info())),
        "account_info" => {
            let args: AccountInfoArgs = parse_args(&request.args)?;
            let address = Address::from_base58(&args.address)?;
            Ok(account_info_to_json(&facade.account_info(&address)))
        }
        "find_block" => {
            let args: FindBlockArgs = parse_args(&request.args)?;
            let block = match (args.hash, args.number) {
                (Some(hash), _) => facade.find_block_by_hash(&Sha256::from_base64(&hash)?),
                (None, Some(number)) => facade.find_block_by_number(number),
                (None, None) => {
                    return Err(Error::InvalidArgument(
                        "find_block needs a hash or a number".into(),
                    ))
                }
            };
            block
                .map(|b| block_to_json(&b))
                .ok_or_else(|| Error::InvalidArgument("block not found".into()))
        }
        "find_transaction" => {
            let args: FindTransactionArgs = parse_args(&request.args)?;
            facade
                .find_transaction(&Sha256::from_base64(&args.hash)?)
                .map(|tx| transaction_to_json(&tx))
                .ok_or_else(|| Error::InvalidArgument("transaction not found".into()))
        }
        "find_transaction_status" => {
            let args: FindTransactionArgs = parse_args(&request.args)?;
            let status = facade
                .transaction_status(&Sha256::from_base64(&args.hash)?)
                .unwrap_or_else(TransactionStatus::unknown);
            Ok(status_to_json(&status))
        }
        "push_transaction" => {
            let args: PushTransactionArgs = parse_args(&request.args)?;
            let tx = args.into_transaction()?;
            let hash = tx.hash_of();
            if facade.push_transaction(tx) {
                Ok(serde_json::json!({ "hash": hash.to_base64() }))
            } else {
                Err(Error::InvalidArgument("transaction rejected".into()))
            }
        }
        "view_call" => {
            let args: ViewCallArgs = parse_args(&request.args)?;
            let from = Address::from_base58(&args.from)?;
            let to = Address::from_base58(&args.to)?;
            let message = BASE64
                .decode(&args.message)
                .map_err(|e| Error::InvalidArgument(format!("bad message: {e}")))?;
            let output = facade.call_view(&from, &to, &message)?;
            Ok(serde_json::Value::String(BASE64.encode(output)))
        }
        "fee_info" => Ok(serde_json::json!({ "fee": facade.minimal_fee().to_string() })),
        other => Err(Error::InvalidArgument(format!("unknown command `{other}`"))),
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: &serde_json::Value) -> Result<T> {
    serde_json::from_value(args.clone())
        .map_err(|e| Error::InvalidArgument(format!("bad arguments: {e}")))
}

// ── Subscriptions ────────────────────────────────────────────────────────────

fn start_subscription(
    facade: &Arc<dyn NodeFacade>,
    request: &Request,
    outgoing: mpsc::Sender<Response>,
) -> Result<JoinHandle<()>> {
    let id = request.id;
    match request.name.as_str() {
        "last_block_info" => {
            let mut updates = facade.subscribe_blocks();
            Ok(tokio::spawn(async move {
                while let Ok(info) = updates.recv().await {
                    if outgoing
                        .send(Response::success(id, node_info_to_json(&info)))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }))
        }
        "account_info" => {
            let args: AccountInfoArgs = parse_args(&request.args)?;
            let address = Address::from_base58(&args.address)?;
            let facade = Arc::clone(facade);
            let mut updates = facade.subscribe_accounts();
            Ok(tokio::spawn(async move {
                while let Ok(updated) = updates.recv().await {
                    if updated != address {
                        continue;
                    }
                    let info = facade.account_info(&address);
                    if outgoing
                        .send(Response::success(id, account_info_to_json(&info)))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }))
        }
        "push_transaction" => {
            let args: PushTransactionArgs = parse_args(&request.args)?;
            let tx = args.into_transaction()?;
            let tx_hash = tx.hash_of();
            let mut updates = facade.subscribe_tx_statuses();
            if !facade.push_transaction(tx) {
                return Err(Error::InvalidArgument("transaction rejected".into()));
            }
            Ok(tokio::spawn(async move {
                while let Ok((hash, status)) = updates.recv().await {
                    if hash != tx_hash {
                        continue;
                    }
                    if outgoing
                        .send(Response::success(id, status_to_json(&status)))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }))
        }
        other => Err(Error::InvalidArgument(format!(
            "`{other}` is not subscribable"
        ))),
    }
}
