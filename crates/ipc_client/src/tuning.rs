//! Per-format compression bounds loaded from the host.

use std::{future::Future, rc::Rc};

use ipc_contract::{
    resolve_compress_options, CommandConfig, CompressOptions, CompressOptionsContext, HostBridge,
    TuningError,
};
use serde_json::Value;

use crate::{
    lifecycle::ActivationScope,
    request::{HostRequest, RequestState},
};

/// Load-on-activation request over `get_compress_options_context`.
#[derive(Clone)]
pub struct CompressTuning {
    request: HostRequest<Vec<CompressOptionsContext>>,
}

impl CompressTuning {
    /// Creates the request; nothing is sent until [`Self::load`].
    pub fn new(bridge: Rc<dyn HostBridge>, commands: &CommandConfig) -> Self {
        Self {
            request: HostRequest::new(
                bridge,
                commands.compress_options_context.clone(),
                Value::Null,
            ),
        }
    }

    /// Binds the request to an existing consumer scope.
    pub fn with_scope(self, scope: ActivationScope) -> Self {
        Self {
            request: self.request.with_scope(scope),
        }
    }

    /// Fetches the bounds once.
    pub fn load(&self) -> impl Future<Output = ()> + 'static {
        self.request.activate()
    }

    /// Returns the settled slot.
    pub fn state(&self) -> RequestState<Vec<CompressOptionsContext>> {
        self.request.state()
    }

    /// Returns the loaded bounds, or nothing before a successful load.
    pub fn contexts(&self) -> Vec<CompressOptionsContext> {
        self.request.state().response.unwrap_or_default()
    }

    /// Resolves options for `extension` against the loaded bounds.
    ///
    /// # Errors
    ///
    /// Returns [`TuningError::UnknownExtension`] when no bounds are loaded for `extension`.
    pub fn resolve(
        &self,
        extension: &str,
        quality: Option<f32>,
    ) -> Result<CompressOptions, TuningError> {
        resolve_compress_options(&self.contexts(), extension, quality)
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use ipc_contract::{commands, BridgeFailure, MemoryHostBridge};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn loaded_bounds_drive_option_resolution() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply(
            commands::GET_COMPRESS_OPTIONS_CONTEXT,
            Ok(json!([
                {"extension": "jpg", "min": 10.0, "max": 95.0, "default": 80.0, "step": 5.0}
            ])),
        );
        let tuning = CompressTuning::new(Rc::new(bridge), &CommandConfig::default());
        assert!(matches!(
            tuning.resolve("jpg", None),
            Err(TuningError::UnknownExtension(_))
        ));

        block_on(tuning.load());
        assert_eq!(
            tuning.resolve("jpg", Some(99.0)),
            Ok(CompressOptions {
                quality: Some(95.0),
                extension: "jpg".to_string(),
            })
        );
        assert_eq!(
            tuning.resolve("jpg", None).map(|options| options.quality),
            Ok(Some(80.0))
        );
    }

    #[test]
    fn failed_load_leaves_no_bounds() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply(
            commands::GET_COMPRESS_OPTIONS_CONTEXT,
            Err(BridgeFailure::Message("worker exited".into())),
        );
        let tuning = CompressTuning::new(Rc::new(bridge), &CommandConfig::default());
        block_on(tuning.load());

        assert!(tuning.contexts().is_empty());
        assert_eq!(
            tuning.state().error.map(|err| err.message_or_empty().to_string()),
            Some("worker exited".to_string())
        );
    }
}
