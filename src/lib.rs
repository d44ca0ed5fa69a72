pub mod config;
pub mod error;
pub mod eval;
pub mod graph;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod record;
pub mod runtime;
pub mod sink;
pub mod storage;
pub mod web;

pub use error::NestError;
pub use eval::{DomainError, ErrorReason};
pub use graph::{DumpStyle, Graph};
pub use node::{Gid, Kind, Node, NodeId};
pub use runtime::{Outcome, Runtime};
