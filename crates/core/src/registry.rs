//! Mapping from ledger type to adapter factory.

use crate::traits::Adapter;
use ledgerbench_types::LedgerType;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Immutable set of known adapters, shared by primary and secondary.
///
/// Built once at startup and passed explicitly to whoever needs it. Both
/// sides of a run must register the same ledger types.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<LedgerType, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under `ledger_type`, replacing any previous one.
    pub fn with_adapter(
        mut self,
        ledger_type: impl Into<LedgerType>,
        adapter: Arc<dyn Adapter>,
    ) -> Self {
        self.adapters.insert(ledger_type.into(), adapter);
        self
    }

    /// Look up the adapter for a ledger type.
    pub fn get(&self, ledger_type: &LedgerType) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(ledger_type).cloned()
    }

    pub fn contains(&self, ledger_type: &LedgerType) -> bool {
        self.adapters.contains_key(ledger_type)
    }

    /// Registered ledger types, sorted.
    pub fn ledger_types(&self) -> impl Iterator<Item = &LedgerType> {
        self.adapters.keys()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("ledger_types", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AdapterError, AdapterParams, Builder, Client, ConnectionView, EndpointGroups, Environment,
    };
    use async_trait::async_trait;

    struct NullAdapter;

    #[async_trait]
    impl Adapter for NullAdapter {
        async fn builder(
            &self,
            _params: &AdapterParams,
            _env: &Environment,
            _endpoints: &EndpointGroups,
        ) -> Result<Box<dyn Builder>, AdapterError> {
            Err(AdapterError::Unsupported("builder"))
        }

        async fn client(&self, _view: &ConnectionView) -> Result<Arc<dyn Client>, AdapterError> {
            Err(AdapterError::Unsupported("client"))
        }
    }

    #[test]
    fn test_lookup() {
        let registry = AdapterRegistry::new().with_adapter("null", Arc::new(NullAdapter));

        assert!(registry.contains(&LedgerType::new("null")));
        assert!(registry.get(&LedgerType::new("null")).is_some());
        assert!(registry.get(&LedgerType::new("other")).is_none());
        assert_eq!(
            registry.ledger_types().map(LedgerType::as_str).collect::<Vec<_>>(),
            vec!["null"]
        );
    }
}
