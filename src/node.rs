use std::collections::HashMap;
use std::fmt;
use xxhash_rust::xxh32::Xxh32;

/// Arena handle of a node inside a [`crate::graph::Graph`].
pub type NodeId = usize;

/// Closed set of node kinds. The kind selects evaluation and dispatch behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Error,
    Symbol,
    String,
    Op,
    Vm,
    Class,
    File,
    Png,
    Ip,
    Port,
    Email,
    Url,
    Web,
}

const ALL_KINDS: [Kind; 13] = [
    Kind::Error,
    Kind::Symbol,
    Kind::String,
    Kind::Op,
    Kind::Vm,
    Kind::Class,
    Kind::File,
    Kind::Png,
    Kind::Ip,
    Kind::Port,
    Kind::Email,
    Kind::Url,
    Kind::Web,
];

impl Kind {
    /// Name a class descriptor uses for this kind, e.g. `Web` or `PNG`.
    pub fn class_name(self) -> &'static str {
        match self {
            Kind::Error => "Error",
            Kind::Symbol => "Symbol",
            Kind::String => "String",
            Kind::Op => "Op",
            Kind::Vm => "VM",
            Kind::Class => "Class",
            Kind::File => "File",
            Kind::Png => "PNG",
            Kind::Ip => "IP",
            Kind::Port => "Port",
            Kind::Email => "Email",
            Kind::Url => "Url",
            Kind::Web => "Web",
        }
    }

    /// Tag stored in the `type` column and printed by dumps.
    pub fn tag(self) -> &'static str {
        match self {
            Kind::Error => "error",
            Kind::Symbol => "symbol",
            Kind::String => "string",
            Kind::Op => "op",
            Kind::Vm => "vm",
            Kind::Class => "class",
            Kind::File => "file",
            Kind::Png => "png",
            Kind::Ip => "ip",
            Kind::Port => "port",
            Kind::Email => "email",
            Kind::Url => "url",
            Kind::Web => "web",
        }
    }

    pub fn from_class_name(name: &str) -> Option<Kind> {
        ALL_KINDS.into_iter().find(|k| k.class_name() == name)
    }

    pub fn from_tag(tag: &str) -> Option<Kind> {
        ALL_KINDS.into_iter().find(|k| k.tag() == tag)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Content identity of a node: xxh32 (seed 0) over the kind tag followed by
/// the value. Slots, nest and refs never contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gid(pub u32);

impl Gid {
    pub fn of(kind: Kind, value: &str) -> Gid {
        let mut hasher = Xxh32::new(0);
        hasher.update(kind.tag().as_bytes());
        hasher.update(value.as_bytes());
        Gid(hasher.digest())
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Kind,
    pub value: String,
    pub slots: HashMap<String, NodeId>,
    pub nest: Vec<NodeId>,
    pub refs: u64,
}

impl Node {
    pub fn new(kind: Kind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            slots: HashMap::new(),
            nest: Vec::new(),
            refs: 0,
        }
    }

    pub fn gid(&self) -> Gid {
        Gid::of(self.kind, &self.value)
    }

    /// `<type:val>` header used by dumps.
    pub fn head(&self) -> String {
        format!("<{}:{}>", self.kind, self.value)
    }
}
