//! Keyed host queries with a shared cache, manual mode, and success callbacks.

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    future::Future,
    hash::{Hash, Hasher},
    rc::Rc,
};

use ipc_contract::{invoke_json_with, HostBridge, HostBridgeFuture, HostError};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{lifecycle::ActivationScope, request::RequestState};

/// Custom fetcher producing the raw JSON result of a query.
pub type QueryFetcher =
    Rc<dyn Fn(Rc<dyn HostBridge>) -> HostBridgeFuture<'static, Result<Value, HostError>>>;

/// Stable query identity: command name plus canonical JSON arguments.
#[derive(Debug, Clone)]
pub struct QueryKey {
    command: String,
    args: Value,
    identity: String,
}

impl QueryKey {
    /// Builds a key; object arguments are canonicalized so key order does not matter.
    pub fn new(command: impl Into<String>, args: Value) -> Self {
        let command = command.into();
        let identity = format!("{command}:{}", canonical_json(&args));
        Self {
            command,
            args,
            identity,
        }
    }

    /// Builds a key for an argument-less command.
    pub fn command(command: impl Into<String>) -> Self {
        Self::new(command, Value::Null)
    }

    /// Returns the command name.
    pub fn name(&self) -> &str {
        &self.command
    }

    /// Returns the call arguments.
    pub fn args(&self) -> &Value {
        &self.args
    }

    /// Returns the canonical identity string.
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// Rebuilds `value` with object members inserted in sorted key order, whatever map
/// representation `serde_json` was compiled with.
fn canonical_json(value: &Value) -> Value {
    match value {
        Value::Object(members) => {
            let mut entries: Vec<(&String, &Value)> = members.iter().collect();
            entries.sort_unstable_by(|(left, _), (right, _)| left.cmp(right));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, member)| (key.clone(), canonical_json(member)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_json).collect()),
        other => other.clone(),
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity)
    }
}

/// Per-query execution options.
pub struct QueryOptions<T> {
    /// Whether activation runs the query; disabled queries only run on [`Query::refetch`].
    pub enabled: bool,
    /// Called with every successful result.
    pub on_success: Option<Rc<dyn Fn(&T)>>,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            enabled: true,
            on_success: None,
        }
    }
}

impl<T> Clone for QueryOptions<T> {
    fn clone(&self) -> Self {
        Self {
            enabled: self.enabled,
            on_success: self.on_success.clone(),
        }
    }
}

impl<T> QueryOptions<T> {
    /// Options for a query that only runs when explicitly refetched.
    pub fn manual() -> Self {
        Self {
            enabled: false,
            on_success: None,
        }
    }

    /// Attaches a success callback.
    pub fn on_success(mut self, callback: impl Fn(&T) + 'static) -> Self {
        self.on_success = Some(Rc::new(callback));
        self
    }
}

/// Shared query cache bound to one host bridge.
#[derive(Clone)]
pub struct QueryClient {
    bridge: Rc<dyn HostBridge>,
    cache: Rc<RefCell<HashMap<QueryKey, RequestState<Value>>>>,
}

impl QueryClient {
    /// Creates an empty cache over `bridge`.
    pub fn new(bridge: Rc<dyn HostBridge>) -> Self {
        Self {
            bridge,
            cache: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Returns the underlying bridge.
    pub fn bridge(&self) -> Rc<dyn HostBridge> {
        self.bridge.clone()
    }

    /// Returns the raw cached slot for `key`.
    pub fn state(&self, key: &QueryKey) -> RequestState<Value> {
        self.cache.borrow().get(key).cloned().unwrap_or_default()
    }

    /// Returns the cached response for `key` decoded into `T`.
    pub fn cached<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let cache = self.cache.borrow();
        let response = cache.get(key)?.response.clone()?;
        serde_json::from_value(response).ok()
    }

    /// Drops the cached slot for `key`; returns whether one existed.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        self.cache.borrow_mut().remove(key).is_some()
    }

    /// Creates a query that invokes `key`'s command with its arguments.
    pub fn query<T>(&self, key: QueryKey, options: QueryOptions<T>) -> Query<T>
    where
        T: DeserializeOwned + Clone + 'static,
    {
        let command = key.name().to_string();
        let args = key.args().clone();
        let fetcher: QueryFetcher = Rc::new(
            move |bridge: Rc<dyn HostBridge>| -> HostBridgeFuture<'static, Result<Value, HostError>> {
                let command = command.clone();
                let args = args.clone();
                Box::pin(async move {
                    invoke_json_with::<_, _, Value>(&*bridge, &command, &args).await
                })
            },
        );
        self.query_with(key, options, fetcher)
    }

    /// Creates a query whose result comes from a custom fetcher (for example the file dialog).
    pub fn query_with<T>(
        &self,
        key: QueryKey,
        options: QueryOptions<T>,
        fetcher: QueryFetcher,
    ) -> Query<T>
    where
        T: DeserializeOwned + Clone + 'static,
    {
        Query {
            client: self.clone(),
            key,
            options,
            fetcher,
            scope: ActivationScope::new(),
        }
    }

    fn store(&self, key: &QueryKey, result: Result<Value, HostError>) {
        self.cache
            .borrow_mut()
            .entry(key.clone())
            .or_default()
            .settle(result);
    }
}

/// One consumer's handle on a cached query.
pub struct Query<T> {
    client: QueryClient,
    key: QueryKey,
    options: QueryOptions<T>,
    fetcher: QueryFetcher,
    scope: ActivationScope,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            key: self.key.clone(),
            options: self.options.clone(),
            fetcher: self.fetcher.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<T> Query<T>
where
    T: DeserializeOwned + Clone + 'static,
{
    /// Binds success callbacks to an existing consumer scope.
    pub fn with_scope(mut self, scope: ActivationScope) -> Self {
        self.scope = scope;
        self
    }

    /// Returns the query identity.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Returns whether activation runs this query.
    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    /// Returns the scope gating success callbacks.
    pub fn scope(&self) -> &ActivationScope {
        &self.scope
    }

    /// Runs the query on activation when enabled; manual queries resolve to `None` untouched.
    pub fn activate(&self) -> impl Future<Output = Option<Result<T, HostError>>> + 'static {
        let run = self.options.enabled.then(|| self.refetch());
        async move {
            match run {
                Some(run) => Some(run.await),
                None => None,
            }
        }
    }

    /// Re-runs the underlying call, stores the outcome in the shared cache, and resolves to it.
    pub fn refetch(&self) -> impl Future<Output = Result<T, HostError>> + 'static {
        let client = self.client.clone();
        let key = self.key.clone();
        let fetch = (self.fetcher)(client.bridge());
        let on_success = self.options.on_success.clone();
        let scope = self.scope.clone();
        async move {
            let decoded = fetch.await.and_then(|value| {
                serde_json::from_value::<T>(value.clone())
                    .map(|typed| (value, typed))
                    .map_err(|err| HostError::new(format!("failed to decode `{key}` result: {err}")))
            });
            match decoded {
                Ok((value, typed)) => {
                    client.store(&key, Ok(value));
                    if scope.is_active() {
                        if let Some(callback) = on_success {
                            callback(&typed);
                        }
                    }
                    Ok(typed)
                }
                Err(error) => {
                    client.store(&key, Err(error.clone()));
                    Err(error)
                }
            }
        }
    }

    /// Returns the shared slot decoded into `T`.
    pub fn state(&self) -> RequestState<T> {
        let raw = self.client.state(&self.key);
        let mut state = RequestState {
            response: None,
            error: raw.error,
            invocation: raw.invocation,
        };
        if let Some(value) = raw.response {
            match serde_json::from_value(value) {
                Ok(typed) => state.response = Some(typed),
                Err(err) => {
                    state.error = Some(HostError::new(format!(
                        "failed to decode `{}` result: {err}",
                        self.key
                    )));
                }
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use futures::executor::block_on;
    use ipc_contract::{BridgeFailure, MemoryHostBridge};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn client_with(bridge: &MemoryHostBridge) -> QueryClient {
        QueryClient::new(Rc::new(bridge.clone()))
    }

    #[test]
    fn keys_ignore_object_member_order() {
        let a = QueryKey::new("cmd", json!({"a": 1, "b": 2}));
        let b = QueryKey::new("cmd", serde_json::from_str(r#"{"b":2,"a":1}"#).expect("json"));
        assert_eq!(a, b);
        assert_ne!(a, QueryKey::new("other", json!({"a": 1, "b": 2})));
    }

    #[test]
    fn identity_sorts_nested_members_regardless_of_insertion_order() {
        let mut inner = serde_json::Map::new();
        inner.insert("z".to_string(), json!(1));
        inner.insert("m".to_string(), json!([{"y": 2, "x": 1}]));
        let mut outer = serde_json::Map::new();
        outer.insert("options".to_string(), Value::Object(inner));
        outer.insert("files".to_string(), json!(2));

        let key = QueryKey::new("cmd", Value::Object(outer));
        assert_eq!(
            key.identity(),
            r#"cmd:{"files":2,"options":{"m":[{"x":1,"y":2}],"z":1}}"#
        );
    }

    #[test]
    fn consumers_of_the_same_key_share_results() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply("formats", Ok(json!(["png"])));
        let client = client_with(&bridge);

        let first: Query<Vec<String>> =
            client.query(QueryKey::command("formats"), QueryOptions::default());
        let second: Query<Vec<String>> =
            client.query(QueryKey::command("formats"), QueryOptions::manual());

        block_on(first.activate()).expect("enabled").expect("ok");
        assert_eq!(second.state().response, Some(vec!["png".to_string()]));
        assert_eq!(
            client.cached::<Vec<String>>(&QueryKey::command("formats")),
            Some(vec!["png".to_string()])
        );
    }

    #[test]
    fn manual_query_skips_activation_until_refetched() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply("open", Ok(json!(1)));
        let client = client_with(&bridge);
        let query: Query<u32> = client.query(QueryKey::command("open"), QueryOptions::manual());

        assert_eq!(block_on(query.activate()), None);
        assert!(bridge.invocations().is_empty());
        assert_eq!(block_on(query.refetch()), Ok(1));
        assert_eq!(bridge.invocations().len(), 1);
    }

    #[test]
    fn refetch_reruns_instead_of_replaying_cache() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply("count", Ok(json!(1)));
        let client = client_with(&bridge);
        let query: Query<u32> = client.query(QueryKey::command("count"), QueryOptions::default());

        assert_eq!(block_on(query.refetch()), Ok(1));
        bridge.set_reply("count", Ok(json!(2)));
        assert_eq!(block_on(query.refetch()), Ok(2));
        assert_eq!(query.state().response, Some(2));
    }

    #[test]
    fn success_callback_fires_only_while_scope_is_active() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply("count", Ok(json!(5)));
        let client = client_with(&bridge);
        let calls = Rc::new(Cell::new(0));
        let options = {
            let calls = calls.clone();
            QueryOptions::default().on_success(move |value: &u32| calls.set(calls.get() + value))
        };
        let query = client.query(QueryKey::command("count"), options);

        block_on(query.refetch()).expect("ok");
        assert_eq!(calls.get(), 5);

        query.scope().deactivate();
        block_on(query.refetch()).expect("still resolves");
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn failures_are_cached_and_rejected() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply("count", Err(BridgeFailure::Message("offline".into())));
        let client = client_with(&bridge);
        let query: Query<u32> = client.query(QueryKey::command("count"), QueryOptions::default());

        let err = block_on(query.refetch()).expect_err("rejects");
        assert_eq!(err.message.as_deref(), Some("offline"));
        let state = query.state();
        assert_eq!(state.response, None);
        assert_eq!(state.error, Some(err));

        assert!(client.invalidate(query.key()));
        assert!(query.state().is_validating());
    }

    #[test]
    fn custom_fetcher_results_are_cached_under_the_key() {
        let bridge = MemoryHostBridge::default();
        let client = client_with(&bridge);
        let fetcher: QueryFetcher = Rc::new(
            |_bridge: Rc<dyn HostBridge>| -> HostBridgeFuture<'static, Result<Value, HostError>> {
                Box::pin(async { Ok(json!("picked")) })
            },
        );
        let query: Query<String> =
            client.query_with(QueryKey::command("dialog"), QueryOptions::manual(), fetcher);

        assert_eq!(block_on(query.refetch()).as_deref(), Ok("picked"));
        assert_eq!(client.state(query.key()).response, Some(json!("picked")));
    }
}
