//! Asynchronous virtual machine client implementation.

use crate::models::{
    DeployVirtualMachineRequest, DeployedVirtualMachine, DestroyVirtualMachineRequest,
    ListVirtualMachinesRequest, StopVirtualMachineRequest, VirtualMachine, VirtualMachineStatus,
};
use crate::Result;
use cloudstack_core::client::{execute, ApiCaller, ApiClient, ApiClientBuilder};
use cloudstack_core::config::CloudStackConfig;
use cloudstack_core::ids::{JobId, VirtualMachineId};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const USER_AGENT: &str = concat!("cloudstack-vm/", env!("CARGO_PKG_VERSION"));

/// Builder for a [`VirtualMachineClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct VirtualMachineClientBuilder {
    inner: ApiClientBuilder,
}

impl VirtualMachineClientBuilder {
    /// Create a builder for the specified API endpoint.
    pub fn new(api_url: impl Into<String>) -> Result<Self> {
        let inner = ApiClientBuilder::new(api_url)?.with_user_agent(USER_AGENT);
        Ok(Self { inner })
    }

    /// Create a builder from an existing configuration.
    #[must_use]
    pub fn from_config(config: CloudStackConfig) -> Self {
        Self {
            inner: ApiClientBuilder::from_config(config).with_user_agent(USER_AGENT),
        }
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.with_timeout(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<VirtualMachineClient> {
        let caller = self.inner.build()?;
        Ok(VirtualMachineClient { caller })
    }
}

/// Virtual machine lifecycle client.
///
/// Every method issues exactly one command through the wrapped [`ApiCaller`] and keeps no
/// state between calls. Long-running commands return the job id; polling it is up to the
/// caller.
#[derive(Debug, Clone)]
pub struct VirtualMachineClient<C = ApiClient> {
    caller: C,
}

impl VirtualMachineClient {
    /// Construct an HTTP client directly from the API endpoint URL.
    pub fn new(api_url: impl Into<String>) -> Result<Self> {
        VirtualMachineClientBuilder::new(api_url)?.build()
    }

    /// Construct an HTTP client from a configuration.
    pub fn from_config(config: &CloudStackConfig) -> Result<Self> {
        VirtualMachineClientBuilder::from_config(config.clone()).build()
    }

    /// Return the API endpoint URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.caller.base_url()
    }
}

impl<C> VirtualMachineClient<C>
where
    C: ApiCaller,
{
    /// Wrap an existing caller.
    pub fn with_caller(caller: C) -> Self {
        Self { caller }
    }

    /// Access the underlying caller.
    pub fn caller(&self) -> &C {
        &self.caller
    }

    /// Deploy a virtual machine.
    ///
    /// Returns the new VM's id and the deployment job id.
    pub async fn deploy_virtual_machine(
        &self,
        request: &DeployVirtualMachineRequest,
    ) -> Result<DeployedVirtualMachine> {
        let envelope = execute(&self.caller, request).await?;
        info!(
            vm_id = %envelope.response.id,
            job_id = %envelope.response.job_id,
            "Virtual machine deployment started"
        );
        Ok(envelope.response)
    }

    /// Stop a virtual machine, returning the stop job id.
    pub async fn stop_virtual_machine(&self, id: &VirtualMachineId) -> Result<JobId> {
        let request = StopVirtualMachineRequest { id: id.clone() };
        let envelope = execute(&self.caller, &request).await?;
        debug!(vm_id = %id, job_id = %envelope.response.job_id, "Virtual machine stop queued");
        Ok(envelope.response.job_id)
    }

    /// Destroy a virtual machine, returning the destroy job id.
    pub async fn destroy_virtual_machine(&self, id: &VirtualMachineId) -> Result<JobId> {
        let request = DestroyVirtualMachineRequest { id: id.clone() };
        let envelope = execute(&self.caller, &request).await?;
        debug!(vm_id = %id, job_id = %envelope.response.job_id, "Virtual machine destroy queued");
        Ok(envelope.response.job_id)
    }

    /// Fetch the full record for a virtual machine.
    ///
    /// Returns `Ok(None)` unless the lookup reports exactly one match.
    pub async fn find_virtual_machine(
        &self,
        id: &VirtualMachineId,
    ) -> Result<Option<VirtualMachine>> {
        let request = ListVirtualMachinesRequest { id: id.clone() };
        let list = execute(&self.caller, &request).await?.response;

        if !list.is_consistent() {
            warn!(
                vm_id = %id,
                count = list.count,
                records = list.virtual_machines.len(),
                "listVirtualMachines count does not match returned records"
            );
        }

        let count = list.count;
        let vm = list.into_single();
        if vm.is_none() {
            debug!(vm_id = %id, count, "Virtual machine lookup did not yield exactly one match");
        }
        Ok(vm)
    }

    /// Snapshot a virtual machine's state and first NIC address.
    ///
    /// Returns `Ok(None)` when the lookup does not yield exactly one VM.
    pub async fn virtual_machine_state(
        &self,
        id: &VirtualMachineId,
    ) -> Result<Option<VirtualMachineStatus>> {
        let vm = self.find_virtual_machine(id).await?;
        Ok(vm.as_ref().map(VirtualMachineStatus::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cloudstack_core::{ApiRequest, Error};
    use mockall::predicate::function;
    use serde_json::json;

    mockall::mock! {
        Caller {}

        #[async_trait]
        impl ApiCaller for Caller {
            async fn call(&self, request: &ApiRequest) -> cloudstack_core::Result<serde_json::Value>;
        }
    }

    fn command_is(name: &'static str) -> impl Fn(&ApiRequest) -> bool {
        move |request: &ApiRequest| request.command() == name
    }

    fn deploy_request() -> DeployVirtualMachineRequest {
        DeployVirtualMachineRequest::new(
            "so-1",
            "tpl-1",
            "zone-1",
            vec!["net-1".into()],
            "key",
            "web-01",
        )
    }

    fn unavailable() -> Error {
        Error::ServiceUnavailable("management server down".to_string())
    }

    #[tokio::test]
    async fn deploy_returns_id_and_job() {
        let mut caller = MockCaller::new();
        caller
            .expect_call()
            .with(function(command_is("deployVirtualMachine")))
            .times(1)
            .returning(|_| {
                Ok(json!({
                    "deployvirtualmachineresponse": {"id": "vm-1", "jobid": "job-1"}
                }))
            });

        let client = VirtualMachineClient::with_caller(caller);
        let deployed = client
            .deploy_virtual_machine(&deploy_request())
            .await
            .unwrap();

        assert_eq!(deployed.id.as_str(), "vm-1");
        assert_eq!(deployed.job_id.as_str(), "job-1");
    }

    #[tokio::test]
    async fn deploy_propagates_call_failure() {
        let mut caller = MockCaller::new();
        caller.expect_call().returning(|_| Err(unavailable()));

        let client = VirtualMachineClient::with_caller(caller);
        let err = client
            .deploy_virtual_machine(&deploy_request())
            .await
            .unwrap_err();
        assert_eq!(err, unavailable());
    }

    #[tokio::test]
    async fn stop_returns_job() {
        let mut caller = MockCaller::new();
        caller
            .expect_call()
            .with(function(|request: &ApiRequest| {
                request.command() == "stopVirtualMachine" && request.params().get("id") == Some("vm-1")
            }))
            .times(1)
            .returning(|_| Ok(json!({"stopvirtualmachineresponse": {"jobid": "job-2"}})));

        let client = VirtualMachineClient::with_caller(caller);
        let job = client
            .stop_virtual_machine(&VirtualMachineId::new("vm-1"))
            .await
            .unwrap();
        assert_eq!(job.as_str(), "job-2");
    }

    #[tokio::test]
    async fn stop_propagates_call_failure() {
        let mut caller = MockCaller::new();
        caller.expect_call().returning(|_| Err(unavailable()));

        let client = VirtualMachineClient::with_caller(caller);
        let err = client
            .stop_virtual_machine(&VirtualMachineId::new("vm-1"))
            .await
            .unwrap_err();
        assert_eq!(err, unavailable());
    }

    #[tokio::test]
    async fn destroy_returns_job() {
        let mut caller = MockCaller::new();
        caller
            .expect_call()
            .with(function(command_is("destroyVirtualMachine")))
            .times(1)
            .returning(|_| Ok(json!({"destroyvirtualmachineresponse": {"jobid": "job-3"}})));

        let client = VirtualMachineClient::with_caller(caller);
        let job = client
            .destroy_virtual_machine(&VirtualMachineId::new("vm-1"))
            .await
            .unwrap();
        assert_eq!(job.as_str(), "job-3");
    }

    #[tokio::test]
    async fn destroy_propagates_call_failure() {
        let mut caller = MockCaller::new();
        caller.expect_call().returning(|_| {
            Err(Error::Api {
                code: 431,
                message: "Unable to find virtual machine".to_string(),
            })
        });

        let client = VirtualMachineClient::with_caller(caller);
        let err = client
            .destroy_virtual_machine(&VirtualMachineId::new("vm-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { code: 431, .. }));
    }

    #[tokio::test]
    async fn destroy_rejects_stop_envelope() {
        let mut caller = MockCaller::new();
        caller
            .expect_call()
            .returning(|_| Ok(json!({"stopvirtualmachineresponse": {"jobid": "job-3"}})));

        let client = VirtualMachineClient::with_caller(caller);
        let err = client
            .destroy_virtual_machine(&VirtualMachineId::new("vm-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[tokio::test]
    async fn state_of_single_match() {
        let mut caller = MockCaller::new();
        caller
            .expect_call()
            .with(function(command_is("listVirtualMachines")))
            .times(1)
            .returning(|_| {
                Ok(json!({
                    "listvirtualmachinesresponse": {
                        "count": 1,
                        "virtualmachine": [{
                            "id": "vm-1",
                            "state": "Running",
                            "nic": [
                                {"id": "nic-1", "ipaddress": "10.0.0.5", "isdefault": true},
                                {"id": "nic-2", "ipaddress": "10.0.1.5", "isdefault": false}
                            ]
                        }]
                    }
                }))
            });

        let client = VirtualMachineClient::with_caller(caller);
        let status = client
            .virtual_machine_state(&VirtualMachineId::new("vm-1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(status.ip_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(status.state, "Running");
    }

    #[tokio::test]
    async fn state_of_zero_matches_is_none() {
        let mut caller = MockCaller::new();
        caller.expect_call().returning(|_| {
            Ok(json!({"listvirtualmachinesresponse": {"count": 0, "virtualmachine": []}}))
        });

        let client = VirtualMachineClient::with_caller(caller);
        let status = client
            .virtual_machine_state(&VirtualMachineId::new("vm-1"))
            .await
            .unwrap();
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn state_of_ambiguous_matches_is_none() {
        let mut caller = MockCaller::new();
        caller.expect_call().returning(|_| {
            Ok(json!({
                "listvirtualmachinesresponse": {
                    "count": 2,
                    "virtualmachine": [
                        {"id": "vm-1", "state": "Running"},
                        {"id": "vm-2", "state": "Stopped"}
                    ]
                }
            }))
        });

        let client = VirtualMachineClient::with_caller(caller);
        let status = client
            .virtual_machine_state(&VirtualMachineId::new("vm-1"))
            .await
            .unwrap();
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn state_without_nics_has_no_ip() {
        let mut caller = MockCaller::new();
        caller.expect_call().returning(|_| {
            Ok(json!({
                "listvirtualmachinesresponse": {
                    "count": 1,
                    "virtualmachine": [{"id": "vm-1", "state": "Starting"}]
                }
            }))
        });

        let client = VirtualMachineClient::with_caller(caller);
        let status = client
            .virtual_machine_state(&VirtualMachineId::new("vm-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.state, "Starting");
        assert!(status.ip_address.is_none());
    }

    #[tokio::test]
    async fn state_of_record_without_id() {
        let mut caller = MockCaller::new();
        caller.expect_call().returning(|_| {
            Ok(json!({
                "listvirtualmachinesresponse": {
                    "count": 1,
                    "virtualmachine": [{"state": "Running", "nic": [{"ipaddress": "10.0.0.5"}]}]
                }
            }))
        });

        let client = VirtualMachineClient::with_caller(caller);
        let status = client
            .virtual_machine_state(&VirtualMachineId::new("vm-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.ip_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(status.state, "Running");
    }

    #[tokio::test]
    async fn state_propagates_call_failure() {
        let mut caller = MockCaller::new();
        caller.expect_call().returning(|_| Err(unavailable()));

        let client = VirtualMachineClient::with_caller(caller);
        let err = client
            .virtual_machine_state(&VirtualMachineId::new("vm-1"))
            .await
            .unwrap_err();
        assert_eq!(err, unavailable());
    }
}
