// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Identifiers, node/edge tags and the input snapshot
//!
//! A [`Snapshot`] is the already-validated configuration handed over by the
//! input layer. Its JSON shape (`recursos`, `processos`, `alocacoes`,
//! `requisicoes`) is shared with the persisted run records.

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a resource type with a finite number of units
    ResourceId
);

string_id!(
    /// Identifier of a process
    ProcessId
);

/// Units per resource, keyed by resource
pub type UnitCounts = BTreeMap<ResourceId, u32>;

/// Signed units per resource. Negative values only appear when the input
/// allocates more units than a resource declares.
pub type Availability = BTreeMap<ResourceId, i64>;

/// Node type, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Resource,
    Process,
}

/// A node of the resource-allocation graph, tagged with its type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NodeId {
    Resource(ResourceId),
    Process(ProcessId),
}

impl NodeId {
    pub fn resource(id: impl Into<ResourceId>) -> Self {
        Self::Resource(id.into())
    }

    pub fn process(id: impl Into<ProcessId>) -> Self {
        Self::Process(id.into())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Resource(_) => NodeKind::Resource,
            Self::Process(_) => NodeKind::Process,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Resource(id) => id.as_str(),
            Self::Process(id) => id.as_str(),
        }
    }

    pub fn as_resource(&self) -> Option<&ResourceId> {
        match self {
            Self::Resource(id) => Some(id),
            Self::Process(_) => None,
        }
    }

    pub fn as_process(&self) -> Option<&ProcessId> {
        match self {
            Self::Process(id) => Some(id),
            Self::Resource(_) => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge type: a held unit (resource -> process) or a requested unit (process -> resource)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Allocation,
    Request,
}

/// A logical edge between two nodes, independent of its multiplicity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeRef {
    pub from: NodeId,
    pub to: NodeId,
}

impl EdgeRef {
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Self { from, to }
    }

    /// Edge from a resource to the process holding one of its units
    pub fn allocation(resource: &ResourceId, process: &ProcessId) -> Self {
        Self::new(NodeId::Resource(resource.clone()), NodeId::Process(process.clone()))
    }

    /// Edge from a process to the resource it waits for
    pub fn request(process: &ProcessId, resource: &ResourceId) -> Self {
        Self::new(NodeId::Process(process.clone()), NodeId::Resource(resource.clone()))
    }

    /// Kind implied by the endpoint types, if the endpoints are of different types
    pub fn kind(&self) -> Option<EdgeKind> {
        match (&self.from, &self.to) {
            (NodeId::Resource(_), NodeId::Process(_)) => Some(EdgeKind::Allocation),
            (NodeId::Process(_), NodeId::Resource(_)) => Some(EdgeKind::Request),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Deserialize a map, also accepting `[]` for an empty one.
///
/// Logs written by PHP's `json_encode` store empty associative arrays as `[]`.
fn map_or_empty_list<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Ord,
    V: Deserialize<'de>,
{
    struct MapOrEmptyList<K, V>(PhantomData<(K, V)>);

    impl<'de, K, V> Visitor<'de> for MapOrEmptyList<K, V>
    where
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
    {
        type Value = BTreeMap<K, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map or an empty list")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut map = BTreeMap::new();
            while let Some((key, value)) = access.next_entry()? {
                map.insert(key, value);
            }
            Ok(map)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            match access.next_element::<IgnoredAny>()? {
                None => Ok(BTreeMap::new()),
                Some(_) => Err(de::Error::invalid_length(1, &self)),
            }
        }
    }

    deserializer.deserialize_any(MapOrEmptyList(PhantomData))
}

/// Static snapshot of resources, processes, allocations and requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Total units per resource
    #[serde(rename = "recursos", default, deserialize_with = "map_or_empty_list")]
    pub resources: BTreeMap<ResourceId, u32>,
    /// Processes in declaration order; this order drives the feasibility scan
    #[serde(rename = "processos", default)]
    pub processes: Vec<ProcessId>,
    /// One entry per held unit
    #[serde(rename = "alocacoes", default, deserialize_with = "map_or_empty_list")]
    pub allocations: BTreeMap<ResourceId, Vec<ProcessId>>,
    /// One entry per requested unit
    #[serde(rename = "requisicoes", default, deserialize_with = "map_or_empty_list")]
    pub requests: BTreeMap<ProcessId, Vec<ResourceId>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource with `units` total units
    pub fn resource(mut self, id: impl Into<ResourceId>, units: u32) -> Self {
        self.resources.insert(id.into(), units);
        self
    }

    /// Declare a process
    pub fn process(mut self, id: impl Into<ProcessId>) -> Self {
        self.processes.push(id.into());
        self
    }

    /// Record one unit of `resource` held by `process`
    pub fn allocate(mut self, resource: impl Into<ResourceId>, process: impl Into<ProcessId>) -> Self {
        self.allocations.entry(resource.into()).or_default().push(process.into());
        self
    }

    /// Record one unit of `resource` requested by `process`
    pub fn request(mut self, process: impl Into<ProcessId>, resource: impl Into<ResourceId>) -> Self {
        self.requests.entry(process.into()).or_default().push(resource.into());
        self
    }

    /// True when nothing at all was declared
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.processes.is_empty() && self.allocations.is_empty() && self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_is_explicit() {
        // A process named like a resource is still a process
        let node = NodeId::process("R9");
        assert_eq!(node.kind(), NodeKind::Process);
        assert!(node.as_resource().is_none());
        assert_eq!(node.to_string(), "R9");
    }

    #[test]
    fn test_edge_kind_from_endpoints() {
        let alloc = EdgeRef::allocation(&"R1".into(), &"P1".into());
        let req = EdgeRef::request(&"P1".into(), &"R1".into());
        assert_eq!(alloc.kind(), Some(EdgeKind::Allocation));
        assert_eq!(req.kind(), Some(EdgeKind::Request));
        assert_eq!(EdgeRef::new(NodeId::process("P1"), NodeId::process("P2")).kind(), None);
        assert_eq!(alloc.to_string(), "R1 -> P1");
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let snapshot = Snapshot::new().resource("R1", 2).process("P1").allocate("R1", "P1").request("P1", "R1");
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["recursos"]["R1"], 2);
        assert_eq!(json["processos"][0], "P1");
        assert_eq!(json["alocacoes"]["R1"][0], "P1");
        assert_eq!(json["requisicoes"]["P1"][0], "R1");
    }

    #[test]
    fn test_snapshot_accepts_empty_lists_for_maps() {
        let snapshot: Snapshot =
            serde_json::from_str(r#"{"recursos": {"R1": 1}, "processos": ["P1"], "alocacoes": [], "requisicoes": []}"#).unwrap();
        assert_eq!(snapshot, Snapshot::new().resource("R1", 1).process("P1"));

        let empty: Snapshot = serde_json::from_str(r#"{"recursos": [], "processos": [], "alocacoes": [], "requisicoes": []}"#).unwrap();
        assert!(empty.is_empty());

        let err = serde_json::from_str::<Snapshot>(r#"{"alocacoes": [["R1", "P1"]]}"#).unwrap_err();
        assert!(err.to_string().contains("a map or an empty list"));
    }

    #[test]
    fn test_snapshot_missing_sections_default_to_empty() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"processos": ["P1"]}"#).unwrap();
        assert!(snapshot.resources.is_empty());
        assert_eq!(snapshot.processes, vec![ProcessId::new("P1")]);
        assert!(!snapshot.is_empty());
        assert!(Snapshot::new().is_empty());
    }

    #[test]
    fn test_node_id_serialization_is_tagged() {
        let json = serde_json::to_value(NodeId::resource("R1")).unwrap();
        assert_eq!(json["kind"], "resource");
        assert_eq!(json["id"], "R1");
    }
}
