// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pipeline Profiles
//!
//! A profile decides which commands a host of one platform is asked, and in
//! which order. Steps are sorted by priority (stable, so declaration order
//! breaks ties):
//!
//! | Priority | Steps                                      |
//! |----------|--------------------------------------------|
//! | 0        | hostname lookup                            |
//! | 10       | main show commands                         |
//! | 128      | inventory, default                         |
//! | 255      | commands the platform does not support     |
//!
//! Follow-up steps are derived from outputs of the same run once the base
//! steps are done (per-VRF tables for Cisco platforms).

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Discoverable, Platform};
use crate::log_store::{LogDetails, RawOutput, DEFAULT_ORDER};
use crate::parse::templates::vrf_names;

/// Template shared by every hostname lookup
pub const HOSTNAME_TEMPLATE: &str = "HOSTNAME";

/// Command and template of the vSphere inventory call
pub const VSPHERE_COMMAND: &str = "pyVmomi";

pub const PRIORITY_HOSTNAME: u32 = 0;
pub const PRIORITY_MAIN: u32 = 10;
pub const PRIORITY_UNSUPPORTED: u32 = 255;

const CONFIGURATION_COMMANDS: &[&str] = &["show running-config", "show startup-config"];

/// One query in a host pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    pub command: String,
    /// Template/ingestor identifier; defaults to the command
    pub template: String,
    pub priority: u32,
    pub supported: bool,
    pub vrf: Option<String>,
}

impl PipelineStep {
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            template: command.clone(),
            command,
            priority: DEFAULT_ORDER,
            supported: true,
            vrf: None,
        }
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Still executed and logged, never parsed
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self.priority = PRIORITY_UNSUPPORTED;
        self
    }

    pub fn in_vrf(mut self, vrf: impl Into<String>) -> Self {
        self.vrf = Some(vrf.into());
        self
    }

    /// Configuration dumps are kept raw; the hostname lookup is the exception
    pub fn is_configuration(&self) -> bool {
        self.template != HOSTNAME_TEMPLATE
            && CONFIGURATION_COMMANDS
                .iter()
                .any(|prefix| self.command.starts_with(prefix))
    }

    /// Details recorded on the log of this step
    pub fn details(&self, discoverable: &Discoverable) -> LogDetails {
        let verify_cert = match discoverable.platform.framework() {
            crate::domain::Framework::Json => Some(discoverable.options.verify_cert),
            crate::domain::Framework::Cli => None,
        };

        LogDetails {
            supported: self.supported,
            configuration: self.is_configuration(),
            vrf: self.vrf.clone(),
            verify_cert,
        }
    }
}

/// A step that already ran, with its output
#[derive(Debug, Clone, Copy)]
pub struct CompletedStep<'a> {
    pub step: &'a PipelineStep,
    pub output: &'a RawOutput,
}

/// Builds the query pipeline for one platform
pub trait PipelineProfile: Send + Sync {
    fn platform(&self) -> Platform;

    /// Steps every host of this platform runs
    fn base_steps(&self, discoverable: &Discoverable) -> Vec<PipelineStep>;

    /// Steps derived from base step outputs
    fn follow_up_steps(&self, _completed: &[CompletedStep<'_>]) -> Vec<PipelineStep> {
        Vec::new()
    }
}

/// Sort steps into execution order
pub fn execution_order(mut steps: Vec<PipelineStep>) -> Vec<PipelineStep> {
    steps.sort_by_key(|step| step.priority);
    steps
}

/// Cisco IOS, NX-OS and IOS XR over CLI
#[derive(Debug, Clone, Copy)]
pub struct CiscoProfile {
    platform: Platform,
}

impl CiscoProfile {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn vrf_command(&self) -> &'static str {
        match self.platform {
            Platform::CiscoXr => "show vrf all",
            _ => "show vrf",
        }
    }

    fn vrf_steps(&self, vrf: &str) -> Vec<PipelineStep> {
        match (self.platform, vrf) {
            (Platform::CiscoXr, "default") => vec![
                PipelineStep::new("show arp"),
                PipelineStep::new("show route"),
            ],
            (Platform::CiscoXr, _) => vec![
                PipelineStep::new(format!("show arp vrf {}", vrf))
                    .template("show arp")
                    .in_vrf(vrf),
                PipelineStep::new(format!("show route vrf {}", vrf))
                    .template("show route")
                    .in_vrf(vrf),
            ],
            (_, "default") => vec![
                PipelineStep::new("show ip arp"),
                PipelineStep::new("show ip route"),
            ],
            (_, _) => vec![
                PipelineStep::new(format!("show ip arp vrf {}", vrf))
                    .template("show ip arp")
                    .in_vrf(vrf),
                PipelineStep::new(format!("show ip route vrf {}", vrf))
                    .template("show ip route")
                    .in_vrf(vrf),
            ],
        }
    }
}

impl PipelineProfile for CiscoProfile {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn base_steps(&self, _discoverable: &Discoverable) -> Vec<PipelineStep> {
        let hostname = PipelineStep::new("show running-config | include hostname")
            .template(HOSTNAME_TEMPLATE)
            .priority(PRIORITY_HOSTNAME);

        let main: &[&str] = match self.platform {
            Platform::CiscoXr => &[
                "show running-config",
                "show interfaces",
                "show cdp neighbors detail",
                "show lldp neighbors",
                "show vrf all",
                "show ipv4 interface",
            ],
            Platform::CiscoNxos => &[
                "show running-config",
                "show interface",
                "show cdp neighbors detail",
                "show lldp neighbors detail",
                "show vrf",
                "show ip interface vrf all",
                "show vlan brief",
                "show mac address-table",
            ],
            _ => &[
                "show running-config",
                "show version",
                "show interfaces",
                "show cdp neighbors detail",
                "show lldp neighbors detail",
                "show vrf",
                "show ip interface",
                "show vlan brief",
                "show mac address-table",
            ],
        };

        let unsupported: &[&str] = match self.platform {
            Platform::CiscoXr => &[
                "show hsrp",
                "show vrrp",
                "show ospf neighbor",
                "show eigrp neighbors",
                "show bgp neighbors",
            ],
            _ => &[
                "show standby",
                "show vrrp",
                "show ip ospf neighbor",
                "show ip eigrp neighbors",
                "show ip bgp neighbors",
            ],
        };

        let mut steps = vec![hostname];
        steps.extend(
            main.iter()
                .map(|command| PipelineStep::new(*command).priority(PRIORITY_MAIN)),
        );
        steps.push(PipelineStep::new("show inventory"));
        steps.extend(
            unsupported
                .iter()
                .map(|command| PipelineStep::new(*command).unsupported()),
        );
        steps
    }

    fn follow_up_steps(&self, completed: &[CompletedStep<'_>]) -> Vec<PipelineStep> {
        let mut vrfs = vec!["default".to_string()];

        let listed = completed
            .iter()
            .filter(|done| done.step.command == self.vrf_command())
            .filter_map(|done| done.output.as_text())
            .flat_map(vrf_names);

        for vrf in listed {
            if !vrfs.contains(&vrf) {
                vrfs.push(vrf);
            }
        }

        vrfs.iter().flat_map(|vrf| self.vrf_steps(vrf)).collect()
    }
}

/// VMware vSphere over the management API
#[derive(Debug, Clone, Copy, Default)]
pub struct VsphereProfile;

impl PipelineProfile for VsphereProfile {
    fn platform(&self) -> Platform {
        Platform::VmwareVsphere
    }

    fn base_steps(&self, _discoverable: &Discoverable) -> Vec<PipelineStep> {
        vec![PipelineStep::new(VSPHERE_COMMAND).priority(PRIORITY_HOSTNAME)]
    }
}

/// Pipeline profiles keyed by platform
#[derive(Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<Platform, Arc<dyn PipelineProfile>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profiles for every built-in platform
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for platform in [Platform::CiscoIos, Platform::CiscoNxos, Platform::CiscoXr] {
            registry.register(Arc::new(CiscoProfile::new(platform)));
        }
        registry.register(Arc::new(VsphereProfile));
        registry
    }

    pub fn register(&mut self, profile: Arc<dyn PipelineProfile>) {
        self.profiles.insert(profile.platform(), profile);
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PipelineProfile>> {
        self.profiles.get(&platform).cloned()
    }
}
