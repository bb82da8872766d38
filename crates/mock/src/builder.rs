//! Setup-time side of the mock ledger.

use crate::transaction::MockTransaction;
use async_trait::async_trait;
use ledgerbench_core::{
    AccountHandle, AdapterError, Builder, Capabilities, ContractHandle, ResourceHandle,
};
use tracing::debug;

/// Provisions accounts and contracts on the mock ledger.
///
/// Handles are indices into the builder's own tables. Account stake is not
/// tracked here: mock clients start every account at the `balance` parameter.
#[derive(Debug, Default)]
pub struct MockBuilder {
    /// Number of accounts created.
    accounts: u64,

    /// Deployed contract names.
    contracts: Vec<String>,

    /// Created resource domains.
    resources: Vec<String>,
}

impl MockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts created so far.
    pub fn num_accounts(&self) -> usize {
        self.accounts as usize
    }

    fn check_account(&self, account: AccountHandle) -> Result<u64, AdapterError> {
        if account.0 < self.accounts {
            Ok(account.0)
        } else {
            Err(AdapterError::UnknownHandle(format!("account {}", account.0)))
        }
    }
}

#[async_trait]
impl Builder for MockBuilder {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            resources: true,
            custom_interactions: true,
        }
    }

    async fn create_account(&mut self, stake: u64) -> Result<AccountHandle, AdapterError> {
        let handle = AccountHandle(self.accounts);
        self.accounts += 1;
        debug!(account = handle.0, stake, "Created mock account");
        Ok(handle)
    }

    async fn create_contract(&mut self, name: &str) -> Result<ContractHandle, AdapterError> {
        let handle = ContractHandle(self.contracts.len() as u64);
        self.contracts.push(name.to_string());
        debug!(contract = handle.0, name, "Deployed mock contract");
        Ok(handle)
    }

    async fn create_resource(&mut self, domain: &str) -> Result<ResourceHandle, AdapterError> {
        let handle = ResourceHandle(self.resources.len() as u64);
        self.resources.push(domain.to_string());
        Ok(handle)
    }

    async fn encode_transfer(
        &mut self,
        stake: u64,
        from: AccountHandle,
        to: AccountHandle,
    ) -> Result<Vec<u8>, AdapterError> {
        MockTransaction::Transfer {
            from: self.check_account(from)?,
            to: self.check_account(to)?,
            stake,
        }
        .encode()
    }

    async fn encode_invoke(
        &mut self,
        from: AccountHandle,
        contract: ContractHandle,
    ) -> Result<Vec<u8>, AdapterError> {
        if contract.0 as usize >= self.contracts.len() {
            return Err(AdapterError::UnknownHandle(format!(
                "contract {}",
                contract.0
            )));
        }
        MockTransaction::Invoke {
            from: self.check_account(from)?,
            contract: contract.0,
        }
        .encode()
    }

    async fn encode_interaction(&mut self, kind: &str) -> Result<Vec<u8>, AdapterError> {
        MockTransaction::Custom {
            name: kind.to_string(),
        }
        .encode()
    }
}
