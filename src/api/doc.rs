use utoipa::OpenApi;

use super::handlers;
use crate::blockchain;

/// OpenAPI description of the node's HTTP surface
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_chain,
        handlers::get_pending_transactions,
        handlers::new_transaction,
        handlers::mine_block,
        handlers::validate_chain,
        handlers::register_nodes,
        handlers::get_nodes,
        handlers::resolve_conflicts
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::CandidateChain,
            handlers::ChainResponse,
            handlers::TransactionRequest,
            handlers::TransactionResponse,
            handlers::MineResponse,
            handlers::RegisterNodesRequest,
            handlers::NodesResponse,
            handlers::ResolveRequest,
            handlers::ResolveResponse
        )
    ),
    tags(
        (name = "ledger", description = "Proof-of-work ledger node endpoints")
    ),
    info(
        title = "Ledger Node API",
        version = "0.1.0",
        description = "A minimal proof-of-work ledger node",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
