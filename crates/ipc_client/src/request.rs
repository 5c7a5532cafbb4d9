//! Single-flight host requests: load-on-activation and explicit-trigger mutations.
//!
//! Both flavors funnel failures through the [`HostError`] normalizer and write into one shared
//! `{ response, error }` slot, keeping the two mutually exclusive after every settlement.

use std::{
    cell::{Cell, RefCell},
    future::Future,
    rc::Rc,
};

use ipc_contract::{invoke_json_with, HostBridge, HostError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::lifecycle::ActivationScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Monotonic stamp assigned to each mutation invocation.
pub struct InvocationId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// How concurrent mutation settlements share one slot.
pub enum MutationPolicy {
    /// Every settlement overwrites the slot; the last call to settle wins.
    #[default]
    LastSettled,
    /// Only the most recently issued call may write the slot; superseded settlements are dropped.
    LatestIssued,
}

#[derive(Debug, Clone, PartialEq)]
/// Settled result slot of a request.
pub struct RequestState<T> {
    /// Last successful response.
    pub response: Option<T>,
    /// Last normalized failure.
    pub error: Option<HostError>,
    /// Mutation invocation that produced the current contents.
    pub invocation: Option<InvocationId>,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            response: None,
            error: None,
            invocation: None,
        }
    }
}

impl<T> RequestState<T> {
    /// Returns whether a call has settled into this slot.
    pub fn is_settled(&self) -> bool {
        self.response.is_some() || self.error.is_some()
    }

    /// Returns whether the slot is still waiting for its first settlement.
    pub fn is_validating(&self) -> bool {
        !self.is_settled()
    }

    /// Stores `result`, clearing whichever side it does not occupy.
    pub fn settle(&mut self, result: Result<T, HostError>) {
        match result {
            Ok(response) => {
                self.error = None;
                self.response = Some(response);
            }
            Err(error) => {
                self.response = None;
                self.error = Some(error);
            }
        }
    }

    fn settle_invocation(&mut self, invocation: InvocationId, result: Result<T, HostError>) {
        self.settle(result);
        self.invocation = Some(invocation);
    }
}

/// Load-on-activation request for one command and fixed arguments.
///
/// There is no retry; callers re-activate to try again.
pub struct HostRequest<T> {
    bridge: Rc<dyn HostBridge>,
    command: String,
    args: Value,
    state: Rc<RefCell<RequestState<T>>>,
    scope: ActivationScope,
}

impl<T> Clone for HostRequest<T> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
            command: self.command.clone(),
            args: self.args.clone(),
            state: self.state.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<T> HostRequest<T>
where
    T: DeserializeOwned + Clone + 'static,
{
    /// Creates an idle request for `command` with `args`.
    pub fn new(bridge: Rc<dyn HostBridge>, command: impl Into<String>, args: Value) -> Self {
        Self {
            bridge,
            command: command.into(),
            args,
            state: Rc::new(RefCell::new(RequestState::default())),
            scope: ActivationScope::new(),
        }
    }

    /// Binds the request to an existing consumer scope.
    pub fn with_scope(mut self, scope: ActivationScope) -> Self {
        self.scope = scope;
        self
    }

    /// Returns the command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the scope gating settlement.
    pub fn scope(&self) -> &ActivationScope {
        &self.scope
    }

    /// Returns a snapshot of the settled slot.
    pub fn state(&self) -> RequestState<T> {
        self.state.borrow().clone()
    }

    /// Issues the call once and settles the slot unless the scope ended meanwhile.
    pub fn activate(&self) -> impl Future<Output = ()> + 'static {
        let bridge = self.bridge.clone();
        let command = self.command.clone();
        let args = self.args.clone();
        let state = self.state.clone();
        let scope = self.scope.clone();
        async move {
            let result = invoke_json_with::<_, _, T>(&*bridge, &command, &args).await;
            if scope.is_active() {
                state.borrow_mut().settle(result);
            }
        }
    }
}

/// Explicit-trigger request that may be invoked any number of times with fresh arguments.
pub struct Mutation<T> {
    bridge: Rc<dyn HostBridge>,
    command: String,
    policy: MutationPolicy,
    state: Rc<RefCell<RequestState<T>>>,
    latest: Rc<Cell<u64>>,
    scope: ActivationScope,
}

impl<T> Clone for Mutation<T> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
            command: self.command.clone(),
            policy: self.policy,
            state: self.state.clone(),
            latest: self.latest.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<T> Mutation<T>
where
    T: DeserializeOwned + Clone + 'static,
{
    /// Creates a mutation for `command` with the default [`MutationPolicy`].
    pub fn new(bridge: Rc<dyn HostBridge>, command: impl Into<String>) -> Self {
        Self {
            bridge,
            command: command.into(),
            policy: MutationPolicy::default(),
            state: Rc::new(RefCell::new(RequestState::default())),
            latest: Rc::new(Cell::new(0)),
            scope: ActivationScope::new(),
        }
    }

    /// Selects how concurrent settlements share the slot.
    pub fn with_policy(mut self, policy: MutationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Binds the mutation to an existing consumer scope.
    pub fn with_scope(mut self, scope: ActivationScope) -> Self {
        self.scope = scope;
        self
    }

    /// Returns the active settlement policy.
    pub fn policy(&self) -> MutationPolicy {
        self.policy
    }

    /// Returns a snapshot of the shared slot.
    pub fn state(&self) -> RequestState<T> {
        self.state.borrow().clone()
    }

    /// Returns the id of the most recently issued invocation.
    pub fn latest_issued(&self) -> Option<InvocationId> {
        match self.latest.get() {
            0 => None,
            id => Some(InvocationId(id)),
        }
    }

    /// Issues one invocation and resolves to that invocation's own result.
    ///
    /// The shared slot is written according to the [`MutationPolicy`]; the returned value is
    /// always the caller's own outcome.
    pub fn mutate<A>(&self, args: &A) -> impl Future<Output = Result<T, HostError>> + 'static
    where
        A: Serialize + ?Sized,
    {
        let id = self.latest.get() + 1;
        self.latest.set(id);
        let invocation = InvocationId(id);

        let encoded = serde_json::to_value(args).map_err(|err| {
            HostError::new(format!(
                "failed to encode arguments for `{}`: {err}",
                self.command
            ))
        });
        let bridge = self.bridge.clone();
        let command = self.command.clone();
        let policy = self.policy;
        let state = self.state.clone();
        let latest = self.latest.clone();
        let scope = self.scope.clone();

        async move {
            let result = match encoded {
                Ok(args) => invoke_json_with::<_, _, T>(&*bridge, &command, &args).await,
                Err(error) => Err(error),
            };
            let superseded =
                policy == MutationPolicy::LatestIssued && latest.get() != invocation.0;
            if scope.is_active() && !superseded {
                state
                    .borrow_mut()
                    .settle_invocation(invocation, result.clone());
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use futures::{
        channel::oneshot,
        executor::{block_on, LocalPool},
        task::LocalSpawnExt,
    };
    use ipc_contract::{
        BridgeFailure, DialogOptions, HostBridgeFuture, ListenerHandle, MemoryHostBridge,
        PushHandler, HOST_ERROR_NAME,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    /// Bridge whose replies are released by the test, one gate per `call` argument.
    #[derive(Default)]
    struct GatedBridge {
        gates: RefCell<HashMap<String, oneshot::Receiver<Result<Value, BridgeFailure>>>>,
    }

    impl GatedBridge {
        fn gate(&self, call: &str) -> oneshot::Sender<Result<Value, BridgeFailure>> {
            let (tx, rx) = oneshot::channel();
            self.gates.borrow_mut().insert(call.to_string(), rx);
            tx
        }
    }

    impl HostBridge for GatedBridge {
        fn invoke<'a>(
            &'a self,
            _command: &'a str,
            args: Value,
        ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>> {
            let call = args["call"].as_str().unwrap_or_default().to_string();
            let gate = self.gates.borrow_mut().remove(&call);
            Box::pin(async move {
                match gate {
                    Some(rx) => rx
                        .await
                        .unwrap_or_else(|_| Err(BridgeFailure::Message("gate dropped".into()))),
                    None => Err(BridgeFailure::Message("no gate".into())),
                }
            })
        }

        fn emit<'a>(
            &'a self,
            _channel: &'a str,
            _payload: Value,
        ) -> HostBridgeFuture<'a, Result<(), BridgeFailure>> {
            Box::pin(async { Ok(()) })
        }

        fn listen<'a>(
            &'a self,
            _channel: &'a str,
            _handler: PushHandler,
        ) -> HostBridgeFuture<'a, Result<ListenerHandle, BridgeFailure>> {
            Box::pin(async { Ok(ListenerHandle::inert()) })
        }

        fn open_dialog<'a>(
            &'a self,
            _options: DialogOptions,
        ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>> {
            Box::pin(async { Ok(Value::Null) })
        }
    }

    fn run_race(policy: MutationPolicy) -> (RequestState<String>, Vec<Result<String, HostError>>) {
        let bridge = Rc::new(GatedBridge::default());
        let first_gate = bridge.gate("first");
        let second_gate = bridge.gate("second");
        let mutation: Mutation<String> =
            Mutation::new(bridge.clone(), "compress").with_policy(policy);

        let mut pool = LocalPool::new();
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        for label in ["first", "second"] {
            let fut = mutation.mutate(&json!({ "call": label }));
            let outcomes = outcomes.clone();
            pool.spawner()
                .spawn_local(async move {
                    let outcome = fut.await;
                    outcomes.borrow_mut().push(outcome);
                })
                .expect("spawn");
        }
        pool.run_until_stalled();

        // The second call settles before the first.
        second_gate.send(Ok(json!("second"))).expect("release second");
        pool.run_until_stalled();
        first_gate.send(Ok(json!("first"))).expect("release first");
        pool.run_until_stalled();

        let outcomes = outcomes.borrow().clone();
        (mutation.state(), outcomes)
    }

    #[test]
    fn load_request_stores_response_then_error_exclusively() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply("ping", Ok(json!("pong")));
        let request: HostRequest<String> =
            HostRequest::new(Rc::new(bridge.clone()), "ping", Value::Null);
        assert!(request.state().is_validating());

        block_on(request.activate());
        let state = request.state();
        assert_eq!(state.response.as_deref(), Some("pong"));
        assert_eq!(state.error, None);
        assert!(!state.is_validating());

        bridge.set_reply("ping", Err(BridgeFailure::Message("socket closed".into())));
        block_on(request.activate());
        let state = request.state();
        assert_eq!(state.response, None);
        assert_eq!(
            state.error.as_ref().map(|err| err.name.as_str()),
            Some(HOST_ERROR_NAME)
        );
    }

    #[test]
    fn load_request_ignores_settlement_after_deactivation() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply("ping", Ok(json!("pong")));
        let request: HostRequest<String> =
            HostRequest::new(Rc::new(bridge), "ping", Value::Null);
        let pending = request.activate();
        request.scope().deactivate();
        block_on(pending);
        assert_eq!(request.state(), RequestState::default());
    }

    #[test]
    fn mutation_passes_fresh_arguments_each_call() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply("compress", Ok(json!(3)));
        let mutation: Mutation<u32> = Mutation::new(Rc::new(bridge.clone()), "compress");

        assert_eq!(block_on(mutation.mutate(&json!({"quality": 70}))), Ok(3));
        assert_eq!(block_on(mutation.mutate(&json!({"quality": 40}))), Ok(3));
        let args: Vec<Value> = bridge.invocations().into_iter().map(|(_, args)| args).collect();
        assert_eq!(args, vec![json!({"quality": 70}), json!({"quality": 40})]);
        assert_eq!(mutation.state().invocation, Some(InvocationId(2)));
    }

    #[test]
    fn last_settled_policy_lets_slower_call_overwrite() {
        let (state, outcomes) = run_race(MutationPolicy::LastSettled);
        assert_eq!(state.response.as_deref(), Some("first"));
        assert_eq!(state.invocation, Some(InvocationId(1)));
        assert_eq!(outcomes, vec![Ok("second".to_string()), Ok("first".to_string())]);
    }

    #[test]
    fn latest_issued_policy_discards_superseded_settlement() {
        let (state, outcomes) = run_race(MutationPolicy::LatestIssued);
        assert_eq!(state.response.as_deref(), Some("second"));
        assert_eq!(state.invocation, Some(InvocationId(2)));
        assert_eq!(outcomes.len(), 2);
    }

    #[test]
    fn failed_mutation_clears_previous_response() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply("compress", Ok(json!(1)));
        let mutation: Mutation<u32> = Mutation::new(Rc::new(bridge.clone()), "compress");
        block_on(mutation.mutate(&())).expect("first");

        bridge.set_reply(
            "compress",
            Err(BridgeFailure::Host(HostError::new("busy").with_status(409))),
        );
        let err = block_on(mutation.mutate(&())).expect_err("second");
        assert_eq!(err.status, Some(409));
        let state = mutation.state();
        assert_eq!(state.response, None);
        assert_eq!(state.error, Some(err));
    }
}
