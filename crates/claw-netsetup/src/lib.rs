//! Per-container network lifecycle actions: `up`, `down`, `net-out`,
//! `net-in`. Each is invoked once per container lifecycle event and is
//! otherwise stateless — all state lives in the bind-mount directory, the
//! container-record store, and the port map.

pub mod bindmount;
pub mod chain;
pub mod cni;
pub mod config;
pub mod error;
pub mod store;

use std::net::IpAddr;

use claw_netrules::rules::{net_out, net_out_default_pair, IcmpSelector, PortRange};
use claw_netrules::{FilterClient, IpTablesClient, LockedFilter};
use claw_portmap::PortMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SetupConfig;
use crate::error::{Result, SetupError};
use crate::store::ContainerRecord;

const FILTER_TABLE: &str = "filter";
const NAT_TABLE: &str = "nat";
const FORWARD_CHAIN: &str = "FORWARD";

/// Stdin payload for `up`.
#[derive(Debug, Deserialize)]
pub struct UpInput {
    /// PID of the container's init process, used to locate its netns.
    pub pid: u32,
}

/// Result of `up`: the properties handed back to the caller, at minimum
/// the container's overlay IP.
#[derive(Debug, Serialize)]
pub struct UpOutput {
    /// Final merged properties, including `container_ip`.
    pub properties: Value,
}

fn port_map(config: &SetupConfig) -> PortMap {
    PortMap::new(
        config.start_port,
        config.total_ports,
        config.port_map_path(),
        config.port_map_lock_path(),
    )
}

fn filter(config: &SetupConfig) -> LockedFilter<IpTablesClient> {
    LockedFilter::new(IpTablesClient::new(), &config.iptables_lock_file)
}

fn container_ip_of(properties: &Value) -> Result<String> {
    properties
        .get("container_ip")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SetupError::InvalidInput("delegate result missing container_ip".to_string()))
}

/// Runs the `up` lifecycle action: bind-mount the netns, delegate to the
/// configured CNI chain, create the per-container netout chain and hook
/// it into `FORWARD`.
pub fn up(config: &SetupConfig, handle: &str, properties: &Value, stdin: &UpInput) -> Result<UpOutput> {
    let mount_target = bindmount::mount(&config.bind_mount_dir, handle, stdin.pid)?;

    let delegate = cni::ProcessCniDelegate::new(config.cni_plugin_dir.clone());
    let delegates = cni::load_delegates(&config.cni_config_dir)?;
    let results = cni::run_chain(&delegate, &delegates, "ADD", handle, &mount_target, properties)?;

    let mut merged = properties.clone();
    if let Some(last) = results.last() {
        if let (Value::Object(merged_map), Value::Object(result_map)) = (&mut merged, last) {
            for (key, value) in result_map {
                merged_map.insert(key.clone(), value.clone());
            }
        }
    }
    let container_ip = container_ip_of(&merged)?;

    let netout = chain::netout_chain(handle);
    let filter = filter(config);
    filter.new_chain(FILTER_TABLE, &netout)?;
    let jump = claw_netrules::rules::IpTablesRule::new(vec![
        "--jump".to_string(),
        netout.clone(),
    ]);
    filter.insert(FILTER_TABLE, FORWARD_CHAIN, 1, &jump)?;

    for rule in net_out_default_pair(&container_ip, &config.overlay_network) {
        filter.append_unique(FILTER_TABLE, &netout, &rule)?;
    }

    store::write(
        config,
        &ContainerRecord {
            handle: handle.to_string(),
            ip: container_ip,
            metadata: merged.clone(),
        },
    )?;

    Ok(UpOutput { properties: merged })
}

/// Runs the `down` lifecycle action: reverse of `up`, strictly.
pub fn down(config: &SetupConfig, handle: &str) -> Result<()> {
    let netout = chain::netout_chain(handle);
    let netin = chain::netin_chain(handle);
    let filter = filter(config);

    let jump = claw_netrules::rules::IpTablesRule::new(vec![
        "--jump".to_string(),
        netout.clone(),
    ]);
    let _ = filter.delete(FILTER_TABLE, FORWARD_CHAIN, &jump);

    for (table, chain_name) in [(FILTER_TABLE, netout.as_str()), (NAT_TABLE, netin.as_str())] {
        let _ = filter.clear_chain(table, chain_name);
        let _ = filter.delete_chain(table, chain_name);
    }

    port_map(config).release(handle)?;
    bindmount::unmount(&config.bind_mount_dir, handle)?;
    store::remove(config, handle)?;
    Ok(())
}

/// Stdin/properties payload for `net-out`.
#[derive(Debug, Deserialize)]
pub struct NetOutInput {
    /// The container's overlay IP.
    pub container_ip: String,
    /// The requested egress rule.
    pub netout_rule: NetOutRule,
}

/// One egress rule: a cartesian product of network ranges and port
/// ranges, collapsing to the ports-less form when either is absent.
#[derive(Debug, Deserialize)]
pub struct NetOutRule {
    /// Destination IP ranges to allow.
    pub network_ranges: Vec<IpRange>,
    /// Protocol, when ports/icmp selectors are specified.
    pub protocol: Option<String>,
    /// Destination port ranges, paired with `protocol`.
    #[serde(default)]
    pub port_ranges: Vec<PortRange>,
    /// ICMP type/code selector, when `protocol` is `"icmp"`.
    pub icmp: Option<IcmpSelector>,
}

/// An inclusive IP range.
#[derive(Debug, Deserialize)]
pub struct IpRange {
    /// First address in the range.
    pub start: IpAddr,
    /// Last address in the range.
    pub end: IpAddr,
}

/// Runs `net-out`: for every `(network_range x port_range)` pair, inserts
/// an allow rule at position 1 of the container's netout chain.
pub fn net_out_action(config: &SetupConfig, handle: &str, input: &NetOutInput) -> Result<()> {
    let netout = chain::netout_chain(handle);
    let filter = filter(config);

    let protocol = input.netout_rule.protocol.as_deref();
    let port_ranges: Vec<Option<PortRange>> = if input.netout_rule.port_ranges.is_empty() {
        vec![None]
    } else {
        input.netout_rule.port_ranges.iter().copied().map(Some).collect()
    };

    for range in &input.netout_rule.network_ranges {
        for ports in &port_ranges {
            let rule = net_out(
                &input.container_ip,
                &range.start.to_string(),
                &range.end.to_string(),
                protocol,
                *ports,
                input.netout_rule.icmp,
            );
            filter.insert(FILTER_TABLE, &netout, 1, &rule)?;
        }
    }
    Ok(())
}

/// Stdin/properties payload for `net-in`.
#[derive(Debug, Deserialize)]
pub struct NetInInput {
    /// The host-facing IP to DNAT against.
    pub host_ip: String,
    /// Requested host port; `0` asks the allocator to pick one.
    pub host_port: u16,
    /// The container's overlay IP.
    pub container_ip: String,
    /// Container-side port; `0` means "same as the allocated host port".
    pub container_port: u16,
    /// Policy group id, surfaced in the rule's comment.
    pub group_id: String,
}

/// Result of `net-in`: the resolved host/container port pair.
#[derive(Debug, Serialize)]
pub struct NetInOutput {
    /// The allocated or confirmed host port.
    pub host_port: u16,
    /// The container-side port actually forwarded to.
    pub container_port: u16,
}

/// Runs `net-in`: resolves/allocates the host port, then appends a DNAT
/// rule to the `nat` table's netin chain.
pub fn net_in_action(config: &SetupConfig, handle: &str, input: &NetInInput) -> Result<NetInOutput> {
    let host_port = port_map(config).allocate(handle, input.host_port)?;
    let container_port = if input.container_port == 0 {
        host_port
    } else {
        input.container_port
    };

    let netin = chain::netin_chain(handle);
    let filter = filter(config);
    filter.new_chain(NAT_TABLE, &netin).or_else(|err| {
        if filter.list(NAT_TABLE, &netin).is_ok() {
            Ok(())
        } else {
            Err(err)
        }
    })?;

    let rule = claw_netrules::rules::net_in(
        &input.host_ip,
        host_port,
        &input.container_ip,
        container_port,
        &input.group_id,
    );
    filter.append_unique(NAT_TABLE, &netin, &rule)?;

    Ok(NetInOutput {
        host_port,
        container_port,
    })
}
