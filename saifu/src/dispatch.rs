//! Named-function dispatch against a user's chain session.
//!
//! The upstream agent emits `(function_name, arguments, agent_id)` triples;
//! this module validates them into a typed [`FunctionCall`], executes the
//! call against the cached session, and folds *every* failure path into a
//! structured [`FunctionResult`]. A raw error never crosses back to the
//! caller, and no chain call runs without a deadline.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ChainResult, DispatchError, DispatchResult};
use crate::registry::AgentRegistry;

/// Balance value some chain backends report for denoms that only exist on
/// another network.
const NOT_ON_MAINNET_SENTINEL: &str = "token not on mainnet";

/// A validated operation request.
///
/// Parsing happens once at the boundary; past this point there is no
/// dynamically-shaped argument inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionCall {
    /// Query balances for the given denoms (all denoms when empty).
    QueryBalances {
        /// Denoms to query; `None` means everything.
        denom_list: Option<Vec<String>>,
    },
    /// Send funds to an address.
    TransferFunds {
        /// Recipient address.
        to_address: String,
        /// Amount, as a decimal string.
        amount: String,
        /// Denomination of the amount.
        denom: String,
    },
}

#[derive(Debug, Deserialize)]
struct QueryBalancesArgs {
    #[serde(default)]
    denom_list: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TransferFundsArgs {
    to_address: String,
    amount: String,
    denom: String,
}

impl FunctionCall {
    /// Name of the `query_balances` operation.
    pub const QUERY_BALANCES: &'static str = "query_balances";
    /// Name of the `transfer_funds` operation.
    pub const TRANSFER_FUNDS: &'static str = "transfer_funds";

    /// Validate a named call against its declared argument shape.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidArguments`] naming the offending function or
    /// field for unknown names, missing keys, or wrong types.
    pub fn parse(function_name: &str, arguments: &Value) -> DispatchResult<Self> {
        match function_name {
            Self::QUERY_BALANCES => {
                let args: QueryBalancesArgs = serde_json::from_value(arguments.clone())
                    .map_err(|e| DispatchError::invalid_args(function_name, e.to_string()))?;
                Ok(Self::QueryBalances {
                    denom_list: args.denom_list,
                })
            }
            Self::TRANSFER_FUNDS => {
                let args: TransferFundsArgs = serde_json::from_value(arguments.clone())
                    .map_err(|e| DispatchError::invalid_args(function_name, e.to_string()))?;
                for (field, value) in [
                    ("to_address", &args.to_address),
                    ("amount", &args.amount),
                    ("denom", &args.denom),
                ] {
                    if value.trim().is_empty() {
                        return Err(DispatchError::invalid_args(
                            function_name,
                            format!("field '{field}' must not be empty"),
                        ));
                    }
                }
                Ok(Self::TransferFunds {
                    to_address: args.to_address,
                    amount: args.amount,
                    denom: args.denom,
                })
            }
            other => Err(DispatchError::invalid_args(
                other,
                "unknown function".to_owned(),
            )),
        }
    }
}

/// Context of the call a failure belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallDetails {
    /// The function that was invoked.
    pub function: String,
    /// The arguments as supplied by the caller.
    pub arguments: Value,
}

/// The structured outcome every dispatch produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResult {
    /// Whether the operation completed.
    pub success: bool,
    /// Operation output on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure message on error; never contains key material.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Call context on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<CallDetails>,
}

impl FunctionResult {
    /// Successful outcome carrying the operation output.
    #[must_use]
    pub const fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
        }
    }

    /// Failed outcome carrying the error message and call context.
    #[must_use]
    pub fn failure(error: &DispatchError, function: &str, arguments: Value) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            details: Some(CallDetails {
                function: function.to_owned(),
                arguments,
            }),
        }
    }
}

/// Validates and executes named operations against cached chain sessions.
pub struct FunctionDispatcher {
    registry: Arc<AgentRegistry>,
    timeout: Duration,
}

impl std::fmt::Debug for FunctionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDispatcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl FunctionDispatcher {
    /// Create a dispatcher over the given registry with a per-call
    /// deadline.
    #[must_use]
    pub fn new(registry: Arc<AgentRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Declared shapes of the supported operations, for the upstream agent
    /// to build its calls from.
    #[must_use]
    pub fn definitions() -> Vec<Value> {
        vec![
            json!({
                "name": FunctionCall::QUERY_BALANCES,
                "description": "Query the user's token balances. \
                                Returns a mapping of denom to amount.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "denom_list": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Denoms to query. Omit to query all known denoms."
                        }
                    },
                    "required": []
                }
            }),
            json!({
                "name": FunctionCall::TRANSFER_FUNDS,
                "description": "Transfer funds from the user's active wallet to an address. \
                                Returns the transaction hash.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "to_address": {
                            "type": "string",
                            "description": "The recipient address"
                        },
                        "amount": {
                            "type": "string",
                            "description": "The amount to transfer, as a decimal string"
                        },
                        "denom": {
                            "type": "string",
                            "description": "The denomination of the amount"
                        }
                    },
                    "required": ["to_address", "amount", "denom"]
                }
            }),
        ]
    }

    /// Execute a named operation for an agent.
    ///
    /// This is a total function: uninitialized agents, invalid arguments,
    /// chain faults and timeouts all come back as a
    /// `{success: false, error, details}` result, never as a propagated
    /// error.
    pub async fn execute(
        &self,
        function_name: &str,
        arguments: Value,
        agent_id: &str,
    ) -> FunctionResult {
        match self.try_execute(function_name, &arguments, agent_id).await {
            Ok(data) => FunctionResult::ok(data),
            Err(err) => {
                warn!(
                    agent_id = %agent_id,
                    function = %function_name,
                    error = %err,
                    "function call failed"
                );
                FunctionResult::failure(&err, function_name, arguments)
            }
        }
    }

    async fn try_execute(
        &self,
        function_name: &str,
        arguments: &Value,
        agent_id: &str,
    ) -> DispatchResult<Value> {
        let session = self
            .registry
            .get(agent_id)
            .await
            .ok_or(DispatchError::AgentNotInitialized)?;

        let call = FunctionCall::parse(function_name, arguments)?;

        match call {
            FunctionCall::QueryBalances { denom_list } => {
                let denoms = denom_list.unwrap_or_default();
                let mut balances = self
                    .bounded(session.client().query_balances(&denoms))
                    .await?;

                // A denom that only exists on another network reads as a
                // zero balance to callers.
                for (denom, amount) in &mut balances {
                    if amount == NOT_ON_MAINNET_SENTINEL {
                        debug!(denom = %denom, "masking off-network balance as zero");
                        "0".clone_into(amount);
                    }
                }

                Ok(json!({ "balances": balances }))
            }
            FunctionCall::TransferFunds {
                to_address,
                amount,
                denom,
            } => {
                let receipt = self
                    .bounded(session.client().transfer(&to_address, &amount, &denom))
                    .await?;

                Ok(json!({
                    "tx_hash": receipt.tx_hash,
                    "to_address": to_address,
                    "amount": amount,
                    "denom": denom
                }))
            }
        }
    }

    /// Run a chain call under the configured deadline.
    ///
    /// A timed-out transfer may or may not have landed on chain; the error
    /// says so, and nothing here retries.
    async fn bounded<T>(&self, call: impl Future<Output = ChainResult<T>>) -> DispatchResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(DispatchError::from),
            Err(_) => Err(DispatchError::ChainTimeout(self.timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainClient, ChainClientFactory, ChainEnvironment, TxReceipt};
    use crate::error::ChainError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    enum StubBehavior {
        Balances(BTreeMap<String, String>),
        Transfer(String),
        Fail(String),
        Hang,
    }

    struct StubClient {
        behavior: StubBehavior,
    }

    #[async_trait]
    impl ChainClient for StubClient {
        async fn query_balances(
            &self,
            _denoms: &[String],
        ) -> Result<BTreeMap<String, String>, ChainError> {
            match &self.behavior {
                StubBehavior::Balances(balances) => Ok(balances.clone()),
                StubBehavior::Fail(msg) => Err(ChainError::rpc(msg.clone())),
                StubBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
                StubBehavior::Transfer(_) => Ok(BTreeMap::new()),
            }
        }

        async fn transfer(
            &self,
            _to: &str,
            _amount: &str,
            _denom: &str,
        ) -> Result<TxReceipt, ChainError> {
            match &self.behavior {
                StubBehavior::Transfer(hash) => Ok(TxReceipt {
                    tx_hash: hash.clone(),
                }),
                StubBehavior::Fail(msg) => Err(ChainError::rpc(msg.clone())),
                StubBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
                StubBehavior::Balances(_) => Ok(TxReceipt {
                    tx_hash: "0x0".into(),
                }),
            }
        }
    }

    struct StubFactory(std::sync::Mutex<Option<StubClient>>);

    #[async_trait]
    impl ChainClientFactory for StubFactory {
        async fn create_session(
            &self,
            _private_key: &str,
            _environment: ChainEnvironment,
        ) -> Result<Arc<dyn ChainClient>, ChainError> {
            let client = self.0.lock().expect("factory lock").take().expect("one session");
            Ok(Arc::new(client))
        }
    }

    async fn dispatcher_with(behavior: StubBehavior, timeout: Duration) -> FunctionDispatcher {
        let registry = Arc::new(AgentRegistry::new(
            StubFactory(std::sync::Mutex::new(Some(StubClient { behavior }))),
            ChainEnvironment::Mainnet,
        ));
        registry
            .get_or_create("agent-1", "inj1a", "deadbeef")
            .await
            .unwrap();
        FunctionDispatcher::new(registry, timeout)
    }

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_uninitialized_agent_is_structured() {
        let dispatcher = dispatcher_with(StubBehavior::Hang, timeout()).await;

        let result = dispatcher
            .execute("query_balances", json!({}), "nobody")
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not initialized"));
    }

    #[tokio::test]
    async fn test_unknown_function_is_invalid_arguments() {
        let dispatcher = dispatcher_with(StubBehavior::Hang, timeout()).await;

        let result = dispatcher.execute("stake_funds", json!({}), "agent-1").await;
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("stake_funds"));
        assert!(error.contains("unknown function"));
    }

    #[tokio::test]
    async fn test_missing_field_is_named() {
        let dispatcher = dispatcher_with(StubBehavior::Hang, timeout()).await;

        let result = dispatcher
            .execute(
                "transfer_funds",
                json!({"amount": "1.5", "denom": "inj"}),
                "agent-1",
            )
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("to_address"));
        assert_eq!(result.details.unwrap().function, "transfer_funds");
    }

    #[tokio::test]
    async fn test_empty_field_is_rejected() {
        let dispatcher = dispatcher_with(StubBehavior::Hang, timeout()).await;

        let result = dispatcher
            .execute(
                "transfer_funds",
                json!({"to_address": "  ", "amount": "1", "denom": "inj"}),
                "agent-1",
            )
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("to_address"));
    }

    #[tokio::test]
    async fn test_chain_failure_is_captured() {
        let dispatcher =
            dispatcher_with(StubBehavior::Fail("node exploded".into()), timeout()).await;

        let result = dispatcher
            .execute(
                "transfer_funds",
                json!({"to_address": "inj1to", "amount": "0.2", "denom": "inj"}),
                "agent-1",
            )
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("node exploded"));

        let details = result.details.unwrap();
        assert_eq!(details.function, "transfer_funds");
        assert_eq!(details.arguments["to_address"], "inj1to");
    }

    #[tokio::test]
    async fn test_transfer_success_carries_tx_hash() {
        let dispatcher =
            dispatcher_with(StubBehavior::Transfer("0xabc123".into()), timeout()).await;

        let result = dispatcher
            .execute(
                "transfer_funds",
                json!({"to_address": "inj1to", "amount": "0.2", "denom": "inj"}),
                "agent-1",
            )
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["tx_hash"], "0xabc123");
        assert_eq!(data["denom"], "inj");
    }

    #[tokio::test]
    async fn test_off_network_balance_reads_as_zero() {
        let balances = BTreeMap::from([
            ("inj".to_owned(), "12.5".to_owned()),
            ("wbtc".to_owned(), NOT_ON_MAINNET_SENTINEL.to_owned()),
        ]);
        let dispatcher = dispatcher_with(StubBehavior::Balances(balances), timeout()).await;

        let result = dispatcher
            .execute(
                "query_balances",
                json!({"denom_list": ["inj", "wbtc"]}),
                "agent-1",
            )
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["balances"]["inj"], "12.5");
        assert_eq!(data["balances"]["wbtc"], "0");
    }

    #[tokio::test]
    async fn test_slow_chain_call_times_out() {
        let dispatcher = dispatcher_with(StubBehavior::Hang, Duration::from_millis(20)).await;

        let result = dispatcher
            .execute(
                "transfer_funds",
                json!({"to_address": "inj1to", "amount": "1", "denom": "inj"}),
                "agent-1",
            )
            .await;
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("timed out"));
        assert!(error.contains("outcome unknown"));
    }

    #[test]
    fn test_parse_round_trip() {
        let call = FunctionCall::parse("query_balances", &json!({})).unwrap();
        assert_eq!(call, FunctionCall::QueryBalances { denom_list: None });

        let call = FunctionCall::parse(
            "transfer_funds",
            &json!({"to_address": "inj1x", "amount": "3", "denom": "usdt"}),
        )
        .unwrap();
        assert!(matches!(call, FunctionCall::TransferFunds { .. }));
    }

    #[test]
    fn test_definitions_cover_supported_functions() {
        let defs = FunctionDispatcher::definitions();
        let names: Vec<_> = defs.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["query_balances", "transfer_funds"]);
        assert_eq!(
            defs[1]["parameters"]["required"],
            json!(["to_address", "amount", "denom"])
        );
    }
}
