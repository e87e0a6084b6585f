//! Virtual machine client and data models for CloudStack.
//!
//! Provides typed commands, response envelopes and an asynchronous client for the CloudStack
//! virtual machine lifecycle: deploy, stop, destroy and state lookup.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{VirtualMachineClient, VirtualMachineClientBuilder};
pub use models::{
    AsyncJobHandle, DeployVirtualMachineRequest, DeployVirtualMachineResponse,
    DeployedVirtualMachine, DestroyVirtualMachineRequest, DestroyVirtualMachineResponse,
    ListVirtualMachinesRequest, ListVirtualMachinesResponse, Nic, StopVirtualMachineRequest,
    StopVirtualMachineResponse, VirtualMachine, VirtualMachineList, VirtualMachineStatus,
};

/// Convenient result alias that reuses the shared CloudStack error type.
pub type Result<T> = cloudstack_core::Result<T>;
