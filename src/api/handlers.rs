use actix_web::{web, HttpResponse, Responder};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Block, CandidateChain, Ledger, Miner, MinerError, Transaction};
use crate::peers::PeerSet;

/// Shared state of a running node
#[derive(Debug)]
pub struct AppState {
    /// The local ledger
    pub ledger: Ledger,

    /// Miner paying rewards to this node
    pub miner: Miner,

    /// Known peer nodes
    pub peers: PeerSet,
}

impl AppState {
    pub fn new(ledger: Ledger, node_id: impl Into<String>, mining_reward: f64) -> Self {
        let miner = Miner::new(ledger.clone(), node_id, mining_reward);
        AppState {
            ledger,
            miner,
            peers: PeerSet::new(),
        }
    }
}

pub type AppData = web::Data<AppState>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// The length of the chain
    pub length: usize,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub message: String,

    /// The index of the block that will include this transaction
    pub index: u64,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

/// Request for the register nodes endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterNodesRequest {
    /// Peer addresses, e.g. `http://192.168.0.5:5000`
    pub nodes: Vec<String>,
}

/// Response for the node endpoints
#[derive(Serialize, Deserialize, ToSchema)]
pub struct NodesResponse {
    pub message: String,
    pub total_nodes: Vec<String>,
}

/// Request for the resolve endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResolveRequest {
    /// Chains fetched from peers, as returned by their `/chain` endpoint
    #[schema(value_type = Vec<CandidateChain>)]
    pub candidates: Vec<serde_json::Value>,
}

/// Response for the resolve endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResolveResponse {
    pub message: String,
    pub replaced: bool,
    pub chain: Vec<Block>,
}

fn internal_error(context: &str, err: impl std::fmt::Display) -> HttpResponse {
    error!("{}: {}", context, err);
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": format!("{}: {}", context, err)
    }))
}

/// Get the full blockchain
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(state: AppData) -> impl Responder {
    match state.ledger.chain_snapshot() {
        Ok(chain) => HttpResponse::Ok().json(ChainResponse {
            length: chain.len(),
            chain,
        }),
        Err(err) => internal_error("Failed to read chain", err),
    }
}

/// Get all pending transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(state: AppData) -> impl Responder {
    match state.ledger.pending_transactions() {
        Ok(transactions) => HttpResponse::Ok().json(transactions),
        Err(err) => internal_error("Failed to read pending transactions", err),
    }
}

/// Create a new transaction
///
/// Adds a new transaction to the pending pool
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = TransactionResponse),
        (status = 400, description = "Missing values")
    )
)]
pub async fn new_transaction(
    state: AppData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let TransactionRequest { sender, recipient, amount } = transaction_req.into_inner();

    match state.ledger.submit_transaction(sender, recipient, amount) {
        Ok(index) => HttpResponse::Created().json(TransactionResponse {
            message: format!("Transaction will be added to Block {}", index),
            index,
        }),
        Err(err) => internal_error("Failed to add transaction", err),
    }
}

/// Mine a new block
///
/// Solves the proof of work for the current tip and seals the pending
/// transactions together with this node's reward
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 503, description = "Mining was cancelled")
    )
)]
pub async fn mine_block(state: AppData) -> impl Responder {
    let miner = state.miner.clone();

    match web::block(move || miner.mine()).await {
        Ok(Ok(block)) => HttpResponse::Ok().json(MineResponse {
            message: "New Block Forged".to_string(),
            index: block.index,
            transactions: block.transactions,
            proof: block.proof,
            previous_hash: block.previous_hash,
        }),
        Ok(Err(MinerError::Cancelled)) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "error": "Mining was cancelled"
        })),
        Ok(Err(err)) => internal_error("Failed to mine block", err),
        Err(err) => internal_error("Mining task failed", err),
    }
}

/// Check if the local blockchain is valid
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(state: AppData) -> impl Responder {
    match state.ledger.is_valid() {
        Ok(is_valid) => HttpResponse::Ok().json(is_valid),
        Err(err) => internal_error("Failed to validate chain", err),
    }
}

/// Register peer nodes
#[utoipa::path(
    post,
    path = "/api/v1/nodes/register",
    request_body = RegisterNodesRequest,
    responses(
        (status = 201, description = "Nodes registered", body = NodesResponse),
        (status = 400, description = "No valid list of nodes supplied")
    )
)]
pub async fn register_nodes(
    state: AppData,
    register_req: web::Json<RegisterNodesRequest>,
) -> impl Responder {
    if register_req.nodes.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Please supply a valid list of nodes"
        }));
    }

    for node in &register_req.nodes {
        match state.peers.register(node) {
            Ok(true) => info!("Registered peer {}", node),
            Ok(false) => {}
            Err(err) => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": err.to_string()
                }));
            }
        }
    }

    HttpResponse::Created().json(NodesResponse {
        message: "New nodes have been added".to_string(),
        total_nodes: state.peers.list(),
    })
}

/// List peer nodes
#[utoipa::path(
    get,
    path = "/api/v1/nodes",
    responses(
        (status = 200, description = "Known peer nodes", body = NodesResponse)
    )
)]
pub async fn get_nodes(state: AppData) -> impl Responder {
    HttpResponse::Ok().json(NodesResponse {
        message: format!("{} known nodes", state.peers.len()),
        total_nodes: state.peers.list(),
    })
}

/// Resolve conflicts with peers
///
/// Replaces the local chain with the longest valid chain among the supplied candidates
#[utoipa::path(
    post,
    path = "/api/v1/nodes/resolve",
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Consensus round completed", body = ResolveResponse)
    )
)]
pub async fn resolve_conflicts(
    state: AppData,
    resolve_req: web::Json<ResolveRequest>,
) -> impl Responder {
    let ledger = state.ledger.clone();

    // A malformed candidate is skipped, not fatal to the round
    let candidates: Vec<CandidateChain> = resolve_req
        .into_inner()
        .candidates
        .into_iter()
        .filter_map(|value| match CandidateChain::from_value(value) {
            Ok(candidate) => Some(candidate),
            Err(err) => {
                warn!("Skipping candidate: {}", err);
                None
            }
        })
        .collect();

    match web::block(move || ledger.resolve(candidates)).await {
        Ok(Ok(resolution)) => {
            let message = if resolution.adopted {
                "Our chain was replaced"
            } else {
                "Our chain is authoritative"
            };

            HttpResponse::Ok().json(ResolveResponse {
                message: message.to_string(),
                replaced: resolution.adopted,
                chain: resolution.chain,
            })
        }
        Ok(Err(err)) => internal_error("Failed to resolve conflicts", err),
        Err(err) => internal_error("Resolve task failed", err),
    }
}
