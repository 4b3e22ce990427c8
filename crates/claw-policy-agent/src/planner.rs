//! Pure rule planners.
//!
//! Each planner turns the current `(local containers, tagged policies)`
//! snapshot into a rule list for one chain; it never touches the filter
//! driver itself. Same input must produce the same output so a reconcile
//! pass that sees no change produces a byte-identical chain and the
//! atomic swap becomes a no-op in practice.

use std::collections::HashMap;

use claw_netrules::rules::{
    accept_existing_local, accept_existing_remote, default_deny_local, default_deny_remote,
    mark_allow, mark_set, masquerade,
};
use claw_netrules::IpTablesRule;
use claw_policy_store::models::IngressPolicy;

/// Snapshot a planner plans against.
pub struct PlanContext<'a> {
    /// `policy_group_id -> [container_ip]` for containers on this host.
    pub local_containers: &'a HashMap<String, Vec<String>>,
    /// Every currently tagged ingress policy.
    pub policies: &'a [IngressPolicy],
    /// Local overlay interface name.
    pub overlay_iface: &'a str,
    /// CIDR of this host's overlay subnet.
    pub local_subnet: &'a str,
    /// CIDR of the whole overlay network.
    pub overlay_network: &'a str,
    /// VNI for the remote overlay interface.
    pub remote_vni: u32,
}

/// One independent rule planner, each owning a distinct chain prefix so
/// their atomic swaps never collide.
pub trait Planner: Send + Sync {
    /// Name used only in logs.
    fn name(&self) -> &'static str;
    /// Packet-filter table this planner's chain lives in.
    fn table(&self) -> &'static str;
    /// Chain this planner's new chain is jumped to from.
    fn parent_chain(&self) -> &'static str;
    /// Prefix for this planner's generated chain names (`<prefix><nanos>`).
    fn chain_prefix(&self) -> &'static str;
    /// Computes the rule list for the current snapshot.
    fn plan(&self, ctx: &PlanContext<'_>) -> Vec<IpTablesRule>;
}

/// Static default rules for local-subnet traffic on the overlay interface.
pub struct LocalDefaultPlanner;

impl Planner for LocalDefaultPlanner {
    fn name(&self) -> &'static str {
        "local-default"
    }
    fn table(&self) -> &'static str {
        "filter"
    }
    fn parent_chain(&self) -> &'static str {
        "FORWARD"
    }
    fn chain_prefix(&self) -> &'static str {
        "vpa--local-"
    }
    fn plan(&self, ctx: &PlanContext<'_>) -> Vec<IpTablesRule> {
        vec![
            accept_existing_local(ctx.overlay_iface),
            default_deny_local(ctx.overlay_iface, ctx.local_subnet),
        ]
    }
}

/// Static default rules for traffic arriving on the remote overlay
/// interface (named by VNI).
pub struct RemoteDefaultPlanner;

impl Planner for RemoteDefaultPlanner {
    fn name(&self) -> &'static str {
        "remote-default"
    }
    fn table(&self) -> &'static str {
        "filter"
    }
    fn parent_chain(&self) -> &'static str {
        "FORWARD"
    }
    fn chain_prefix(&self) -> &'static str {
        "vpa--remote-"
    }
    fn plan(&self, ctx: &PlanContext<'_>) -> Vec<IpTablesRule> {
        vec![
            accept_existing_remote(ctx.remote_vni),
            default_deny_remote(ctx.remote_vni),
        ]
    }
}

/// Emits `MarkSet`/`MarkAllow` pairs for every policy touching a
/// container on this host.
pub struct DynamicPolicyPlanner;

impl Planner for DynamicPolicyPlanner {
    fn name(&self) -> &'static str {
        "dynamic-policy"
    }
    fn table(&self) -> &'static str {
        "filter"
    }
    fn parent_chain(&self) -> &'static str {
        "FORWARD"
    }
    fn chain_prefix(&self) -> &'static str {
        "vpa--"
    }
    fn plan(&self, ctx: &PlanContext<'_>) -> Vec<IpTablesRule> {
        let mut marks = Vec::new();
        let mut allows = Vec::new();

        for policy in ctx.policies {
            let Some(source_tag) = &policy.source.tag else {
                continue;
            };

            if let Some(local_sources) = ctx.local_containers.get(&policy.source.id) {
                for src_ip in local_sources {
                    marks.push(mark_set(src_ip, source_tag, &policy.source.id));
                }
            }

            if let Some(local_destinations) = ctx.local_containers.get(&policy.destination.id) {
                for dst_ip in local_destinations {
                    allows.push(mark_allow(
                        dst_ip,
                        policy.destination.protocol.as_str(),
                        policy.destination.port,
                        source_tag,
                        &policy.source.id,
                        &policy.destination.id,
                    ));
                }
            }
        }

        marks.extend(allows);
        marks
    }
}

/// SNAT for traffic leaving the overlay network. Optional: only wired up
/// when the host config enables it.
pub struct MasqueradePlanner;

impl Planner for MasqueradePlanner {
    fn name(&self) -> &'static str {
        "masquerade"
    }
    fn table(&self) -> &'static str {
        "nat"
    }
    fn parent_chain(&self) -> &'static str {
        "POSTROUTING"
    }
    fn chain_prefix(&self) -> &'static str {
        "vpa--masq-"
    }
    fn plan(&self, ctx: &PlanContext<'_>) -> Vec<IpTablesRule> {
        vec![masquerade(ctx.local_subnet, ctx.overlay_network)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claw_policy_store::models::{IngressDestination, IngressEndpoint, IngressProtocol};

    fn policy(src: &str, src_tag: &str, dst: &str, dst_tag: &str, port: u16) -> IngressPolicy {
        IngressPolicy {
            source: IngressEndpoint {
                id: src.to_string(),
                tag: Some(src_tag.to_string()),
            },
            destination: IngressDestination {
                id: dst.to_string(),
                tag: Some(dst_tag.to_string()),
                protocol: IngressProtocol::Tcp,
                port,
            },
        }
    }

    #[test]
    fn dynamic_planner_emits_marks_before_allows() {
        let mut containers = HashMap::new();
        containers.insert("src-guid".to_string(), vec!["10.255.0.1".to_string()]);
        containers.insert("dst-guid".to_string(), vec!["10.255.0.2".to_string()]);
        let policies = vec![policy("src-guid", "A", "dst-guid", "B", 8080)];

        let ctx = PlanContext {
            local_containers: &containers,
            policies: &policies,
            overlay_iface: "cni0",
            local_subnet: "10.255.0.0/24",
            overlay_network: "10.255.0.0/16",
            remote_vni: 1,
        };

        let rules = DynamicPolicyPlanner.plan(&ctx);
        assert_eq!(rules.len(), 2);
        assert!(rules[0].to_string().contains("MARK"));
        assert!(rules[1].to_string().contains("ACCEPT"));
    }

    #[test]
    fn dynamic_planner_ignores_policies_with_no_local_containers() {
        let containers = HashMap::new();
        let policies = vec![policy("src-guid", "A", "dst-guid", "B", 8080)];
        let ctx = PlanContext {
            local_containers: &containers,
            policies: &policies,
            overlay_iface: "cni0",
            local_subnet: "10.255.0.0/24",
            overlay_network: "10.255.0.0/16",
            remote_vni: 1,
        };

        assert!(DynamicPolicyPlanner.plan(&ctx).is_empty());
    }

    #[test]
    fn local_default_planner_is_static() {
        let containers = HashMap::new();
        let policies = Vec::new();
        let ctx = PlanContext {
            local_containers: &containers,
            policies: &policies,
            overlay_iface: "cni0",
            local_subnet: "10.255.0.0/24",
            overlay_network: "10.255.0.0/16",
            remote_vni: 1,
        };

        let a = LocalDefaultPlanner.plan(&ctx);
        let b = LocalDefaultPlanner.plan(&ctx);
        assert_eq!(a, b);
    }
}
