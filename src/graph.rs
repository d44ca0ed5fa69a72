use crate::node::{Kind, Node, NodeId};
use crate::record::{Record, RecordDoc};
use crate::sink::SinkHandle;
use std::collections::{BTreeMap, HashSet};

/// How much of each node header a dump prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStyle {
    /// `<type:val> #gid @ref`
    Full,
    /// `<type:val>` only; stable across identity and ref changes.
    Structure,
}

/// Append-only arena of nodes. Every construction and attachment is synced
/// to the persistence sink when one is connected.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    sink: Option<SinkHandle>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: SinkHandle) -> Self {
        Self {
            nodes: Vec::new(),
            sink: Some(sink),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> Kind {
        self.nodes[id].kind
    }

    pub fn value(&self, id: NodeId) -> &str {
        &self.nodes[id].value
    }

    pub fn slot(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[id].slots.get(name).copied()
    }

    pub fn create(&mut self, kind: Kind, value: impl Into<String>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(kind, value));
        self.sync(id);
        id
    }

    /// Binds `child` under `name`, replacing any previous binding.
    pub fn set_slot(&mut self, id: NodeId, name: &str, child: NodeId) -> NodeId {
        self.nodes[id].slots.insert(name.to_string(), child);
        self.nodes[child].refs += 1;
        self.sync(id);
        if child != id {
            self.sync(child);
        }
        id
    }

    /// Binds `child` under its own kind tag.
    pub fn bind_by_kind(&mut self, id: NodeId, child: NodeId) -> NodeId {
        let name = self.nodes[child].kind.tag();
        self.set_slot(id, name, child)
    }

    /// Binds `child` under its own value.
    pub fn bind_by_value(&mut self, id: NodeId, child: NodeId) -> NodeId {
        let name = self.nodes[child].value.clone();
        self.set_slot(id, &name, child)
    }

    pub fn push_nest(&mut self, id: NodeId, child: NodeId) -> NodeId {
        self.nodes[id].nest.push(child);
        self.nodes[child].refs += 1;
        self.sync(id);
        if child != id {
            self.sync(child);
        }
        id
    }

    /// Snapshot of a node in the persisted row layout.
    pub fn record(&self, id: NodeId) -> Record {
        let node = &self.nodes[id];
        let gid = node.gid().to_string();
        let ty = node.kind.tag().to_string();

        let slot: BTreeMap<String, String> = node
            .slots
            .iter()
            .map(|(name, child)| (name.clone(), self.nodes[*child].gid().to_string()))
            .collect();
        let nest = node
            .nest
            .iter()
            .map(|child| self.nodes[*child].gid().to_string())
            .collect();

        Record {
            k: gid.clone(),
            ty: ty.clone(),
            val: node.value.clone(),
            refs: node.refs,
            v: RecordDoc {
                gid,
                refs: node.refs,
                ty,
                val: node.value.clone(),
                slot,
                nest,
            },
        }
    }

    pub fn sync(&self, id: NodeId) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.sync(self.record(id)) {
                log::warn!("sync of {} dropped: {}", self.nodes[id].gid(), e);
            }
        }
    }

    /// Indented tree dump. Nodes already printed are marked with ` _/` and not
    /// descended into again, so cyclic graphs terminate.
    pub fn dump(&self, id: NodeId, style: DumpStyle) -> String {
        let mut out = String::new();
        let mut done = HashSet::new();
        self.dump_into(&mut out, &mut done, id, 0, "", style);
        out
    }

    fn dump_into(
        &self,
        out: &mut String,
        done: &mut HashSet<NodeId>,
        id: NodeId,
        depth: usize,
        prefix: &str,
        style: DumpStyle,
    ) {
        let node = &self.nodes[id];
        out.push('\n');
        for _ in 0..depth {
            out.push('\t');
        }
        out.push_str(prefix);
        out.push_str(&node.head());
        if style == DumpStyle::Full {
            out.push_str(&format!(" #{} @{}", node.gid(), node.refs));
        }

        if !done.insert(id) {
            out.push_str(" _/");
            return;
        }

        let mut names: Vec<&String> = node.slots.keys().collect();
        names.sort();
        for name in names {
            let child = node.slots[name];
            self.dump_into(out, done, child, depth + 1, &format!("{} = ", name), style);
        }
        for (idx, child) in node.nest.iter().enumerate() {
            self.dump_into(out, done, *child, depth + 1, &format!("{}: ", idx), style);
        }
    }
}
