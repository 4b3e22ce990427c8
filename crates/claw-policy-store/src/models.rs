//! Wire/storage shapes for ingress and egress policies.

use serde::{Deserialize, Serialize};

/// Allowed ingress transport protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngressProtocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

impl IngressProtocol {
    /// The lowercase wire/SQL representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

/// Allowed egress transport protocols (egress additionally allows ICMP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EgressProtocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
    /// ICMP.
    Icmp,
}

impl EgressProtocol {
    /// The lowercase wire/SQL representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
        }
    }
}

/// The source or destination side of an ingress policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressEndpoint {
    /// Application guid.
    pub id: String,
    /// Tag assigned to this endpoint's group, populated on read, rejected
    /// on write.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tag: Option<String>,
}

/// The destination side of an ingress policy, carrying the allowed port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressDestination {
    /// Application guid.
    pub id: String,
    /// Tag assigned to this endpoint's group, populated on read.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tag: Option<String>,
    /// Transport protocol.
    pub protocol: IngressProtocol,
    /// Allowed port, `1..=65535`.
    pub port: u16,
}

/// An ingress policy: permission for `source` to reach `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressPolicy {
    /// The permitted traffic source.
    pub source: IngressEndpoint,
    /// The permitted traffic destination.
    pub destination: IngressDestination,
}

/// An assigned `{guid, tag}` pair, as returned by `Tags()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMapping {
    /// Application guid owning the tag.
    pub id: String,
    /// The assigned tag, a fixed-width hex string.
    pub tag: String,
}

/// Which kind of entity an egress policy's source refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EgressSourceKind {
    /// A single application.
    App,
    /// An entire space (all apps within it).
    Space,
}

/// The source side of an egress policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressSource {
    /// App or space guid.
    pub id: String,
    /// Which kind of entity `id` refers to.
    #[serde(rename = "type")]
    pub kind: EgressSourceKind,
}

/// One concrete destination of an egress policy: an IP range plus
/// optional protocol-specific selectors and human metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressDestination {
    /// Transport/network protocol.
    pub protocol: EgressProtocol,
    /// First address of the allowed range, inclusive.
    pub ip_range_start: String,
    /// Last address of the allowed range, inclusive.
    pub ip_range_end: String,
    /// First port of the allowed range, inclusive. Ignored for ICMP.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub port_start: Option<u16>,
    /// Last port of the allowed range, inclusive. Ignored for ICMP.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub port_end: Option<u16>,
    /// ICMP type. Only meaningful for `protocol: icmp`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub icmp_type: Option<u8>,
    /// ICMP code. Only meaningful for `protocol: icmp`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub icmp_code: Option<u8>,
    /// Operator-facing label.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    /// Operator-facing free text.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

/// An egress policy: permission for `source` to reach `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressPolicy {
    /// The permitted traffic source.
    pub source: EgressSource,
    /// The permitted traffic destination.
    pub destination: EgressDestination,
}

/// One concrete row bundle matching an egress policy shape, as returned by
/// `id_collections_by_egress_policy`; used to enumerate exactly what a
/// delete must remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressIdCollection {
    /// Row id of the matched `egress_policies` entry.
    pub egress_policy_id: i64,
    /// Row id of the source-side terminal.
    pub src_terminal_id: i64,
    /// Row id of the destination-side terminal.
    pub dest_terminal_id: i64,
    /// Row id of the referenced app, when the source is an app.
    pub src_app_id: Option<i64>,
    /// Row id of the referenced space, when the source is a space.
    pub src_space_id: Option<i64>,
    /// Row id of the destination's IP range row.
    pub ip_range_id: i64,
}
