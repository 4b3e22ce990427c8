//! Packet-filter rule algebra.
//!
//! Every constructor here is a pure function of its inputs: identical policy
//! input must produce byte-identical output across runs and processes, since
//! the agent's atomic chain swap (see the `claw-policy-agent` crate) depends
//! on it to avoid flapping enforcement state.

use std::fmt;

/// An ordered, opaque argument sequence for the host's packet-filter tool.
///
/// Mirrors the original `IPTablesRule []string` shape: callers never
/// interpret the tokens, they only hand them to a [`crate::filter::FilterClient`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IpTablesRule(pub Vec<String>);

impl IpTablesRule {
    /// Builds a rule from owned string arguments.
    #[must_use]
    pub fn new(args: Vec<String>) -> Self {
        Self(args)
    }

    /// Returns the rule as a slice of arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.0
    }

    /// Appends a `-m comment --comment <sanitized>` suffix.
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.0.push("-m".to_string());
        self.0.push("comment".to_string());
        self.0.push("--comment".to_string());
        self.0.push(sanitize_comment(comment));
        self
    }
}

impl fmt::Display for IpTablesRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// Replaces spaces with underscores so later tokenization of `--comment`
/// values is unambiguous (a space would otherwise split the token).
#[must_use]
pub fn sanitize_comment(comment: &str) -> String {
    comment.replace(' ', "_")
}

macro_rules! rule {
    ($($arg:expr),* $(,)?) => {
        IpTablesRule(vec![$($arg.to_string()),*])
    };
}

/// `MarkAllow(dest_ip, protocol, port, tag, src_guid, dst_guid)` — accepts a
/// packet bearing the matching mark.
#[must_use]
pub fn mark_allow(
    destination_ip: &str,
    protocol: &str,
    port: u16,
    tag: &str,
    source_app_guid: &str,
    destination_app_guid: &str,
) -> IpTablesRule {
    rule![
        "-d",
        destination_ip,
        "-p",
        protocol,
        "--dport",
        port.to_string(),
        "-m",
        "mark",
        "--mark",
        format!("0x{tag}"),
        "--jump",
        "ACCEPT",
    ]
    .with_comment(&format!("src:{source_app_guid}_dst:{destination_app_guid}"))
}

/// `MarkSet(source_ip, tag, comment_guid)` — sets a per-flow mark to the
/// source group's tag.
#[must_use]
pub fn mark_set(source_ip: &str, tag: &str, app_guid: &str) -> IpTablesRule {
    rule![
        "--source",
        source_ip,
        "--jump",
        "MARK",
        "--set-xmark",
        format!("0x{tag}/0xFFFFFFFF"),
    ]
    .with_comment(&format!("src:{app_guid}"))
}

/// `Masquerade(local_subnet, overlay_network)` — SNAT only when leaving the
/// overlay.
#[must_use]
pub fn masquerade(local_subnet: &str, overlay_network: &str) -> IpTablesRule {
    rule![
        "--source",
        local_subnet,
        "!",
        "-d",
        overlay_network,
        "--jump",
        "MASQUERADE",
    ]
}

/// `LogRule(inner, prefix)` — rate-limited log wrapper.
#[must_use]
pub fn log_rule(inner: IpTablesRule, prefix: &str) -> IpTablesRule {
    let mut args = inner.0;
    args.extend(
        [
            "-m",
            "limit",
            "--limit",
            "2/min",
            "--jump",
            "LOG",
            "--log-prefix",
            prefix,
        ]
        .map(str::to_string),
    );
    IpTablesRule(args)
}

/// `AcceptExistingLocal` — baseline accept for established/related flows on
/// the local overlay interface.
#[must_use]
pub fn accept_existing_local(overlay_iface: &str) -> IpTablesRule {
    rule![
        "-i",
        overlay_iface,
        "-m",
        "state",
        "--state",
        "ESTABLISHED,RELATED",
        "--jump",
        "ACCEPT",
    ]
}

/// `DefaultDenyLocal` — reject same-subnet traffic not otherwise allowed.
#[must_use]
pub fn default_deny_local(overlay_iface: &str, local_subnet: &str) -> IpTablesRule {
    rule![
        "-i",
        overlay_iface,
        "--source",
        local_subnet,
        "-d",
        local_subnet,
        "--jump",
        "REJECT",
    ]
}

/// `AcceptExistingRemote` — baseline accept for established/related flows on
/// the remote overlay interface (named by VNI).
#[must_use]
pub fn accept_existing_remote(vni: u32) -> IpTablesRule {
    rule![
        "-i",
        format!("flannel.{vni}"),
        "-m",
        "state",
        "--state",
        "ESTABLISHED,RELATED",
        "--jump",
        "ACCEPT",
    ]
}

/// `DefaultDenyRemote` — reject anything else arriving on the remote
/// overlay interface.
#[must_use]
pub fn default_deny_remote(vni: u32) -> IpTablesRule {
    rule![
        "-i",
        format!("flannel.{vni}"),
        "--jump",
        "REJECT",
    ]
}

/// An inclusive port range, as used by [`net_out`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    /// First port in the range (inclusive).
    pub start: u16,
    /// Last port in the range (inclusive).
    pub end: u16,
}

/// An ICMP type/code pair, as used by [`net_out`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpSelector {
    /// ICMP type.
    pub icmp_type: u8,
    /// ICMP code.
    pub icmp_code: u8,
}

/// `NetOut(container_ip, ip_range, [protocol, port_range], [icmp
/// type/code])` — allows egress from a container to an explicit IP range.
///
/// A rule without ports/protocol collapses to the simpler `iprange`-only
/// form.
#[must_use]
pub fn net_out(
    container_ip: &str,
    range_start: &str,
    range_end: &str,
    protocol: Option<&str>,
    ports: Option<PortRange>,
    icmp: Option<IcmpSelector>,
) -> IpTablesRule {
    let mut args = vec![
        "--source".to_string(),
        container_ip.to_string(),
        "-m".to_string(),
        "iprange".to_string(),
    ];

    if let Some(protocol) = protocol {
        args.push("-p".to_string());
        args.push(protocol.to_string());
    }

    args.push("--dst-range".to_string());
    args.push(format!("{range_start}-{range_end}"));

    if let (Some(protocol), Some(ports)) = (protocol, ports) {
        args.push("-m".to_string());
        args.push(protocol.to_string());
        args.push("--destination-port".to_string());
        args.push(format!("{}:{}", ports.start, ports.end));
    }

    if let (Some("icmp"), Some(icmp)) = (protocol, icmp) {
        args.push("--icmp-type".to_string());
        args.push(format!("{}/{}", icmp.icmp_type, icmp.icmp_code));
    }

    args.push("--jump".to_string());
    args.push("RETURN".to_string());

    IpTablesRule(args)
}

/// `NetIn(host_ip, host_port, container_ip, container_port, group_id)` —
/// DNAT port-forward, appended to the `nat` table's netin chain.
#[must_use]
pub fn net_in(
    host_ip: &str,
    host_port: u16,
    container_ip: &str,
    container_port: u16,
    group_id: &str,
) -> IpTablesRule {
    rule![
        "-d",
        host_ip,
        "-p",
        "tcp",
        "--dport",
        host_port.to_string(),
        "-j",
        "DNAT",
        "--to-destination",
        format!("{container_ip}:{container_port}"),
    ]
    .with_comment(&format!("dst:{group_id}"))
}

/// The two default rules appended to a freshly created netout chain:
/// accept established/related, then reject everything else with
/// `icmp-port-unreachable`.
#[must_use]
pub fn net_out_default_pair(container_ip: &str, overlay_network: &str) -> [IpTablesRule; 2] {
    let subnet = format!("{container_ip}/32");
    [
        rule![
            "-s",
            subnet.clone(),
            "!",
            "-d",
            overlay_network,
            "-m",
            "state",
            "--state",
            "RELATED,ESTABLISHED",
            "--jump",
            "RETURN",
        ],
        rule![
            "-s",
            subnet,
            "!",
            "-d",
            overlay_network,
            "--jump",
            "REJECT",
            "--reject-with",
            "icmp-port-unreachable",
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_comment_replaces_spaces() {
        assert_eq!(sanitize_comment("src:a dst:b"), "src:a_dst:b");
        assert_eq!(sanitize_comment("no-spaces"), "no-spaces");
    }

    #[test]
    fn mark_allow_matches_expected_shape() {
        let r = mark_allow("10.255.100.21", "tcp", 9999, "C", "C", "A");
        assert_eq!(
            r.to_string(),
            "-d 10.255.100.21 -p tcp --dport 9999 -m mark --mark 0xC --jump ACCEPT \
             -m comment --comment src:C_dst:A"
        );
    }

    #[test]
    fn mark_set_matches_expected_shape() {
        let r = mark_set("10.255.100.21", "A", "A");
        assert_eq!(
            r.to_string(),
            "--source 10.255.100.21 --jump MARK --set-xmark 0xA/0xFFFFFFFF \
             -m comment --comment src:A"
        );
    }

    #[test]
    fn mark_allow_is_deterministic() {
        let a = mark_allow("10.0.0.1", "udp", 53, "1", "src", "dst");
        let b = mark_allow("10.0.0.1", "udp", 53, "1", "src", "dst");
        assert_eq!(a, b);
    }

    #[test]
    fn net_out_without_ports_collapses() {
        let r = net_out("10.255.0.5", "8.8.8.8", "8.8.8.8", None, None, None);
        assert_eq!(
            r.to_string(),
            "--source 10.255.0.5 -m iprange --dst-range 8.8.8.8-8.8.8.8 --jump RETURN"
        );
    }

    #[test]
    fn net_out_with_ports() {
        let r = net_out(
            "10.255.0.5",
            "8.8.8.8",
            "8.8.8.8",
            Some("tcp"),
            Some(PortRange { start: 80, end: 80 }),
            None,
        );
        assert_eq!(
            r.to_string(),
            "--source 10.255.0.5 -m iprange -p tcp --dst-range 8.8.8.8-8.8.8.8 \
             -m tcp --destination-port 80:80 --jump RETURN"
        );
    }

    #[test]
    fn net_in_includes_group_comment() {
        let r = net_in("10.0.1.5", 60000, "10.255.0.9", 8888, "A");
        assert_eq!(
            r.to_string(),
            "-d 10.0.1.5 -p tcp --dport 60000 -j DNAT --to-destination 10.255.0.9:8888 \
             -m comment --comment dst:A"
        );
    }

    #[test]
    fn net_out_default_pair_uses_container_slash_32() {
        let [established, reject] = net_out_default_pair("10.255.0.9", "10.255.0.0/16");
        assert!(established.to_string().contains("10.255.0.9/32"));
        assert!(reject.to_string().contains("icmp-port-unreachable"));
    }

    #[test]
    fn log_rule_wraps_inner_tokens() {
        let inner = mark_set("10.0.0.1", "A", "A");
        let wrapped = log_rule(inner.clone(), "REJECT_LOCAL: ");
        assert!(wrapped.to_string().starts_with(&inner.to_string()));
        assert!(wrapped.to_string().ends_with("LOG --log-prefix REJECT_LOCAL: "));
    }

    #[test]
    fn default_deny_remote_names_flannel_interface() {
        let r = default_deny_remote(42);
        assert!(r.to_string().contains("flannel.42"));
    }
}
