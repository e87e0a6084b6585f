//! Virtual machine commands, response envelopes and records.

use chrono::{DateTime, FixedOffset};
use cloudstack_core::ids::{
    DiskOfferingId, DomainId, JobId, NetworkId, NicId, ProjectId, ServiceOfferingId, TemplateId,
    VirtualMachineId, ZoneId,
};
use cloudstack_core::query::{ApiCommand, ApiParams};
use serde::{Deserialize, Serialize};

/// Timestamp layout CloudStack uses for `created` and friends (`2014-01-01T12:00:00+0000`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Parameters for `deployVirtualMachine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployVirtualMachineRequest {
    /// Compute sizing to deploy with.
    pub service_offering_id: ServiceOfferingId,
    /// Template to boot from.
    pub template_id: TemplateId,
    /// Zone to deploy into.
    pub zone_id: ZoneId,
    /// Guest networks to attach, sent as one comma-joined value.
    pub network_ids: Vec<NetworkId>,
    /// Registered SSH key pair name.
    pub key_pair: String,
    /// Display name for the new VM.
    pub display_name: String,
    /// Optional data disk offering.
    pub disk_offering: Option<DiskOfferingId>,
    /// Optional owning project.
    pub project_id: Option<ProjectId>,
}

impl DeployVirtualMachineRequest {
    /// Create a request with every required parameter and no optional ones.
    #[must_use]
    pub fn new(
        service_offering_id: impl Into<ServiceOfferingId>,
        template_id: impl Into<TemplateId>,
        zone_id: impl Into<ZoneId>,
        network_ids: impl IntoIterator<Item = NetworkId>,
        key_pair: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            service_offering_id: service_offering_id.into(),
            template_id: template_id.into(),
            zone_id: zone_id.into(),
            network_ids: network_ids.into_iter().collect(),
            key_pair: key_pair.into(),
            display_name: display_name.into(),
            disk_offering: None,
            project_id: None,
        }
    }

    /// Attach a data disk offering.
    #[must_use]
    pub fn with_disk_offering(mut self, disk_offering: impl Into<DiskOfferingId>) -> Self {
        self.disk_offering = Some(disk_offering.into());
        self
    }

    /// Deploy into a project.
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<ProjectId>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

impl ApiCommand for DeployVirtualMachineRequest {
    const NAME: &'static str = "deployVirtualMachine";
    type Response = DeployVirtualMachineResponse;

    fn to_params(&self) -> ApiParams {
        let mut params = ApiParams::new();
        params.set("serviceofferingid", &self.service_offering_id);
        params.set("templateid", &self.template_id);
        params.set("zoneid", &self.zone_id);
        params.set_list("networkids", &self.network_ids);
        params.set("keypair", &self.key_pair);
        params.set("displayname", &self.display_name);
        params.set_opt("projectid", self.project_id.as_ref());
        params.set_opt("diskoffering", self.disk_offering.as_ref());
        params
    }
}

/// Parameters for `stopVirtualMachine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopVirtualMachineRequest {
    /// VM to stop.
    pub id: VirtualMachineId,
}

impl ApiCommand for StopVirtualMachineRequest {
    const NAME: &'static str = "stopVirtualMachine";
    type Response = StopVirtualMachineResponse;

    fn to_params(&self) -> ApiParams {
        let mut params = ApiParams::new();
        params.set("id", &self.id);
        params
    }
}

/// Parameters for `destroyVirtualMachine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyVirtualMachineRequest {
    /// VM to destroy.
    pub id: VirtualMachineId,
}

impl ApiCommand for DestroyVirtualMachineRequest {
    const NAME: &'static str = "destroyVirtualMachine";
    type Response = DestroyVirtualMachineResponse;

    fn to_params(&self) -> ApiParams {
        let mut params = ApiParams::new();
        params.set("id", &self.id);
        params
    }
}

/// Parameters for `listVirtualMachines`, narrowed to a lookup by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListVirtualMachinesRequest {
    /// VM to look up.
    pub id: VirtualMachineId,
}

impl ApiCommand for ListVirtualMachinesRequest {
    const NAME: &'static str = "listVirtualMachines";
    type Response = ListVirtualMachinesResponse;

    fn to_params(&self) -> ApiParams {
        let mut params = ApiParams::new();
        params.set("id", &self.id);
        params
    }
}

/// `deployvirtualmachineresponse` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployVirtualMachineResponse {
    /// Envelope payload.
    #[serde(rename = "deployvirtualmachineresponse")]
    pub response: DeployedVirtualMachine,
}

/// Identifier and job handle of a VM whose deployment has been accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployedVirtualMachine {
    /// Id of the VM being deployed.
    #[serde(default)]
    pub id: VirtualMachineId,
    /// Deployment job.
    #[serde(rename = "jobid", default)]
    pub job_id: JobId,
}

/// `stopvirtualmachineresponse` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StopVirtualMachineResponse {
    /// Envelope payload.
    #[serde(rename = "stopvirtualmachineresponse")]
    pub response: AsyncJobHandle,
}

/// `destroyvirtualmachineresponse` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestroyVirtualMachineResponse {
    /// Envelope payload.
    #[serde(rename = "destroyvirtualmachineresponse")]
    pub response: AsyncJobHandle,
}

/// Handle of an asynchronous job started by a command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AsyncJobHandle {
    /// Job id to poll.
    #[serde(rename = "jobid", default)]
    pub job_id: JobId,
}

/// `listvirtualmachinesresponse` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListVirtualMachinesResponse {
    /// Envelope payload.
    #[serde(rename = "listvirtualmachinesresponse")]
    pub response: VirtualMachineList,
}

/// Payload of a `listVirtualMachines` response.
///
/// CloudStack omits both fields when nothing matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VirtualMachineList {
    /// Number of matching VMs.
    #[serde(default)]
    pub count: u64,
    /// Matching VMs.
    #[serde(rename = "virtualmachine", default)]
    pub virtual_machines: Vec<VirtualMachine>,
}

impl VirtualMachineList {
    /// Returns true when `count` agrees with the number of records.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        usize::try_from(self.count).is_ok_and(|count| count == self.virtual_machines.len())
    }

    /// Take the only match, if the list reports exactly one.
    ///
    /// Any other count, or a count of one with no record behind it, yields `None`.
    #[must_use]
    pub fn into_single(self) -> Option<VirtualMachine> {
        if self.count != 1 {
            return None;
        }
        self.virtual_machines.into_iter().next()
    }
}

/// Representation of a virtual machine as returned by `listVirtualMachines`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VirtualMachine {
    /// VM id. Empty when the record omits it.
    #[serde(default)]
    pub id: VirtualMachineId,
    /// Internal instance name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// User-facing display name.
    #[serde(rename = "displayname", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Owning account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Owning domain name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Owning domain id.
    #[serde(rename = "domainid", default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<DomainId>,

    /// Lifecycle state as reported by CloudStack ("Running", "Stopped", ...).
    #[serde(default)]
    pub state: String,

    /// Zone id.
    #[serde(rename = "zoneid", default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
    /// Zone name.
    #[serde(rename = "zonename", default, skip_serializing_if = "Option::is_none")]
    pub zone_name: Option<String>,
    /// Service offering id.
    #[serde(rename = "serviceofferingid", default, skip_serializing_if = "Option::is_none")]
    pub service_offering_id: Option<ServiceOfferingId>,
    /// Service offering name.
    #[serde(rename = "serviceofferingname", default, skip_serializing_if = "Option::is_none")]
    pub service_offering_name: Option<String>,
    /// Template id.
    #[serde(rename = "templateid", default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    /// Template name.
    #[serde(rename = "templatename", default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    /// Template display text.
    #[serde(rename = "templatedisplaytext", default, skip_serializing_if = "Option::is_none")]
    pub template_display_text: Option<String>,
    /// Guest OS type id.
    #[serde(rename = "guestosid", default, skip_serializing_if = "Option::is_none")]
    pub guest_os_id: Option<String>,
    /// Hypervisor (KVM, XenServer, VMware, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypervisor: Option<String>,
    /// SSH key pair name.
    #[serde(rename = "keypair", default, skip_serializing_if = "Option::is_none")]
    pub key_pair: Option<String>,

    /// Number of vCPUs.
    #[serde(rename = "cpunumber", default, skip_serializing_if = "Option::is_none")]
    pub cpu_number: Option<u32>,
    /// vCPU speed in MHz.
    #[serde(rename = "cpuspeed", default, skip_serializing_if = "Option::is_none")]
    pub cpu_speed: Option<u32>,
    /// Memory in MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,

    /// HA enabled flag.
    #[serde(rename = "haenable", default)]
    pub ha_enabled: bool,
    /// Password reset enabled flag.
    #[serde(rename = "passwordenabled", default)]
    pub password_enabled: bool,

    /// Root device id.
    #[serde(rename = "rootdeviceid", default, skip_serializing_if = "Option::is_none")]
    pub root_device_id: Option<u64>,
    /// Root device type (ROOT, NetworkFilesystem, ...).
    #[serde(rename = "rootdevicetype", default, skip_serializing_if = "Option::is_none")]
    pub root_device_type: Option<String>,

    /// Network interfaces, default NIC first.
    #[serde(rename = "nic", default)]
    pub nics: Vec<Nic>,
    /// Security groups (arbitrary JSON).
    #[serde(rename = "securitygroup", default)]
    pub security_groups: Vec<serde_json::Value>,
    /// Resource tags (arbitrary JSON).
    #[serde(default)]
    pub tags: Vec<serde_json::Value>,

    /// Creation timestamp, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

impl VirtualMachine {
    /// IP address of the first network interface.
    #[must_use]
    pub fn primary_ip(&self) -> Option<&str> {
        self.nics.first().and_then(|nic| nic.ip_address.as_deref())
    }

    /// Parse the `created` timestamp.
    ///
    /// Returns `None` when absent or not in CloudStack's layout.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.created
            .as_deref()
            .and_then(|raw| DateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok())
    }
}

/// Network interface representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Nic {
    /// NIC id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NicId>,
    /// IPv4 address.
    #[serde(rename = "ipaddress", default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Netmask.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    /// Gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// MAC address.
    #[serde(rename = "macaddress", default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Backing network id.
    #[serde(rename = "networkid", default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<NetworkId>,
    /// Traffic type (Guest, Public, ...).
    #[serde(rename = "traffictype", default, skip_serializing_if = "Option::is_none")]
    pub traffic_type: Option<String>,
    /// Network type (Isolated, Shared, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub nic_type: Option<String>,
    /// Default NIC flag.
    #[serde(rename = "isdefault", default)]
    pub is_default: bool,
}

/// State snapshot returned by a state query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMachineStatus {
    /// IP address of the first NIC, if the VM has one.
    pub ip_address: Option<String>,
    /// Lifecycle state string.
    pub state: String,
}

impl From<&VirtualMachine> for VirtualMachineStatus {
    fn from(vm: &VirtualMachine) -> Self {
        Self {
            ip_address: vm.primary_ip().map(str::to_string),
            state: vm.state.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deploy_request() -> DeployVirtualMachineRequest {
        DeployVirtualMachineRequest::new(
            "so-1",
            "tpl-1",
            "zone-1",
            vec![NetworkId::new("a"), NetworkId::new("b")],
            "deploy-key",
            "web-01",
        )
    }

    #[test]
    fn deploy_params_contain_required_keys() {
        let params = deploy_request().to_params();

        assert_eq!(params.get("serviceofferingid"), Some("so-1"));
        assert_eq!(params.get("templateid"), Some("tpl-1"));
        assert_eq!(params.get("zoneid"), Some("zone-1"));
        assert_eq!(params.get("networkids"), Some("a,b"));
        assert_eq!(params.get("keypair"), Some("deploy-key"));
        assert_eq!(params.get("displayname"), Some("web-01"));
        assert_eq!(params.len(), 6);
    }

    #[test]
    fn deploy_params_skip_absent_optionals() {
        let params = deploy_request().to_params();
        assert!(!params.contains("diskoffering"));
        assert!(!params.contains("projectid"));
    }

    #[test]
    fn deploy_params_include_present_optionals() {
        let params = deploy_request()
            .with_disk_offering("disk-20g")
            .with_project("proj-1")
            .to_params();

        assert_eq!(params.get("diskoffering"), Some("disk-20g"));
        assert_eq!(params.get("projectid"), Some("proj-1"));
    }

    #[test]
    fn deploy_params_send_empty_required_values() {
        let params = DeployVirtualMachineRequest::new("", "", "", Vec::new(), "", "").to_params();
        assert_eq!(params.len(), 6);
        assert_eq!(params.get("zoneid"), Some(""));
        assert_eq!(params.get("networkids"), Some(""));
    }

    #[test]
    fn command_names() {
        let id = VirtualMachineId::new("vm-1");
        assert_eq!(
            StopVirtualMachineRequest { id: id.clone() }.to_request().command(),
            "stopVirtualMachine"
        );
        assert_eq!(
            DestroyVirtualMachineRequest { id: id.clone() }
                .to_request()
                .command(),
            "destroyVirtualMachine"
        );
        let list = ListVirtualMachinesRequest { id }.to_request();
        assert_eq!(list.command(), "listVirtualMachines");
        assert_eq!(list.params().get("id"), Some("vm-1"));
        assert_eq!(deploy_request().to_request().command(), "deployVirtualMachine");
    }

    #[test]
    fn stop_and_destroy_envelopes_are_distinct() {
        let body = json!({"stopvirtualmachineresponse": {"jobid": "job-1"}});
        let stop: StopVirtualMachineResponse = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(stop.response.job_id.as_str(), "job-1");

        assert!(serde_json::from_value::<DestroyVirtualMachineResponse>(body).is_err());
    }

    #[test]
    fn empty_list_payload_defaults() {
        let list: ListVirtualMachinesResponse =
            serde_json::from_value(json!({"listvirtualmachinesresponse": {}})).unwrap();
        assert_eq!(list.response.count, 0);
        assert!(list.response.virtual_machines.is_empty());
        assert!(list.response.is_consistent());
        assert!(list.response.into_single().is_none());
    }

    #[test]
    fn single_requires_exactly_one() {
        let vm = VirtualMachine {
            id: VirtualMachineId::new("vm-1"),
            ..VirtualMachine::default()
        };

        let two = VirtualMachineList {
            count: 2,
            virtual_machines: vec![vm.clone(), vm.clone()],
        };
        assert!(two.into_single().is_none());

        let hollow = VirtualMachineList {
            count: 1,
            virtual_machines: Vec::new(),
        };
        assert!(!hollow.is_consistent());
        assert!(hollow.into_single().is_none());

        let one = VirtualMachineList {
            count: 1,
            virtual_machines: vec![vm],
        };
        assert_eq!(one.into_single().unwrap().id.as_str(), "vm-1");
    }

    #[test]
    fn status_from_vm_without_nics() {
        let vm = VirtualMachine {
            id: VirtualMachineId::new("vm-1"),
            state: "Stopped".to_string(),
            ..VirtualMachine::default()
        };
        let status = VirtualMachineStatus::from(&vm);
        assert_eq!(status.state, "Stopped");
        assert!(status.ip_address.is_none());
    }

    #[test]
    fn created_at_parses_cloudstack_layout() {
        let vm = VirtualMachine {
            created: Some("2014-01-01T12:00:00+0000".to_string()),
            ..VirtualMachine::default()
        };
        let created = vm.created_at().unwrap();
        assert_eq!(created.timestamp(), 1_388_577_600);

        let garbled = VirtualMachine {
            created: Some("yesterday".to_string()),
            ..VirtualMachine::default()
        };
        assert!(garbled.created_at().is_none());
    }
}
