use crate::config::ServiceConfig;
use crate::error::NestError;
use crate::eval::DomainError;
use crate::graph::{DumpStyle, Graph};
use crate::lexer::Tokenizer;
use crate::node::{Kind, NodeId};
use crate::parser::Parser;
use crate::sink::SinkHandle;
use crate::web::Service;

pub const DEFAULT_MODULE: &str = "nestvm";

/// Result of one evaluated statement.
#[derive(Debug)]
pub struct Outcome {
    pub expr: NodeId,
    pub result: Result<NodeId, DomainError>,
}

/// Owns the graph, the root context every statement runs against, and the
/// optional service started by dereferencing a `web` node.
pub struct Runtime {
    pub(crate) graph: Graph,
    root: NodeId,
    pub(crate) service: Option<Box<dyn Service>>,
    pub(crate) service_config: ServiceConfig,
}

impl Runtime {
    pub fn new(module: &str) -> Self {
        Self::with_graph(Graph::new(), module)
    }

    pub fn with_sink(module: &str, sink: SinkHandle) -> Self {
        Self::with_graph(Graph::with_sink(sink), module)
    }

    fn with_graph(mut graph: Graph, module: &str) -> Self {
        let root = graph.create(Kind::Vm, module);
        graph.push_nest(root, root);

        let mut rt = Self {
            graph,
            root,
            service: None,
            service_config: ServiceConfig::default(),
        };
        rt.register_class(Kind::Web);
        rt
    }

    pub fn set_service(&mut self, service: Box<dyn Service>) {
        self.service = Some(service);
    }

    pub fn set_service_config(&mut self, config: ServiceConfig) {
        self.service_config = config;
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Binds a class descriptor for `kind` in the root context under its class name.
    pub fn register_class(&mut self, kind: Kind) -> NodeId {
        let class = self.graph.create(Kind::Class, kind.class_name());
        self.graph.bind_by_value(self.root, class);
        class
    }

    /// Creates a node of `kind`; `web` nodes get their address and logo slots.
    pub fn construct(&mut self, kind: Kind, value: &str) -> NodeId {
        let node = self.graph.create(kind, value);
        if kind == Kind::Web {
            let ip = self.graph.create(Kind::Ip, self.service_config.ip.clone());
            self.graph.set_slot(node, "ip", ip);
            let port = self
                .graph
                .create(Kind::Port, self.service_config.port.to_string());
            self.graph.set_slot(node, "port", port);
            let logo = self.graph.create(Kind::Png, "logo.png");
            self.graph.set_slot(node, "logo", logo);
        }
        node
    }

    /// Parses `source` and evaluates each statement as soon as it is complete.
    /// Lexical and syntax errors abort the run; domain errors only abort
    /// their own statement.
    pub fn run(&mut self, source: &str) -> Result<Vec<Outcome>, NestError> {
        Parser::new(Tokenizer::new(source), self).parse_program()
    }

    pub fn execute(&mut self, expr: NodeId) -> Outcome {
        let root = self.root;
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("{}", self.graph.dump(expr, DumpStyle::Full));
        }

        let result = self.eval(expr, root);
        match &result {
            Ok(value) => {
                if log::log_enabled!(log::Level::Debug) {
                    log::debug!("{}", self.graph.dump(*value, DumpStyle::Full));
                }
            }
            Err(e) => log::error!("{}{}", e, self.graph.dump(root, DumpStyle::Full)),
        }

        if log::log_enabled!(log::Level::Debug) {
            log::debug!("{}", self.graph.dump(root, DumpStyle::Full));
            log::debug!("{}", "-".repeat(66));
        }
        Outcome { expr, result }
    }

    pub fn dump(&self) -> String {
        self.graph.dump(self.root, DumpStyle::Full)
    }

    /// Final sync of the root context before the sink is stopped.
    pub fn shutdown(self) {
        self.graph.sync(self.root);
    }
}
