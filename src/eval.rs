use crate::node::{Kind, NodeId};
use crate::runtime::Runtime;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorReason {
    #[error("unbound symbol `{0}`")]
    UnboundSymbol(String),

    #[error("cyclic binding through `{0}`")]
    CyclicBinding(String),

    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("operator `{op}` takes {expected} operand(s), found {found}")]
    OperatorArity {
        op: String,
        expected: usize,
        found: usize,
    },

    #[error("`{op}` is not supported by {kind}")]
    Unsupported { op: char, kind: Kind },

    #[error("unknown class `{0}`")]
    UnknownClass(String),

    #[error("no service configured")]
    ServiceUnavailable,

    #[error("service stopped: {0}")]
    Service(String),
}

/// A language-level failure. `node` is the `error` node recorded in the
/// graph; its nest holds the offending node.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason}")]
pub struct DomainError {
    pub node: NodeId,
    pub reason: ErrorReason,
}

impl Runtime {
    fn raise(&mut self, offender: NodeId, reason: ErrorReason) -> DomainError {
        let node = self.graph.create(Kind::Error, reason.to_string());
        self.graph.push_nest(node, offender);
        DomainError { node, reason }
    }

    fn unsupported(&mut self, this: NodeId, op: char) -> DomainError {
        let kind = self.graph.kind(this);
        self.raise(this, ErrorReason::Unsupported { op, kind })
    }

    pub fn eval(&mut self, id: NodeId, ctx: NodeId) -> Result<NodeId, DomainError> {
        match self.graph.kind(id) {
            Kind::Symbol => {
                let name = self.graph.value(id).to_string();
                match self.graph.slot(ctx, &name) {
                    Some(bound) => Ok(bound),
                    None => Err(self.raise(id, ErrorReason::UnboundSymbol(name))),
                }
            }
            Kind::Op => self.eval_op(id, ctx),
            Kind::Web => self.serve(id, ctx),
            // string, email and url literals, and every non-active kind
            // (vm, class, error, file, png, ip, port) evaluate to themselves
            _ => Ok(id),
        }
    }

    fn operands<const N: usize>(&mut self, op: NodeId) -> Result<[NodeId; N], DomainError> {
        let nest = &self.graph.node(op).nest;
        match <[NodeId; N]>::try_from(nest.as_slice()) {
            Ok(operands) => Ok(operands),
            Err(_) => {
                let reason = ErrorReason::OperatorArity {
                    op: self.graph.value(op).to_string(),
                    expected: N,
                    found: nest.len(),
                };
                Err(self.raise(op, reason))
            }
        }
    }

    fn eval_op(&mut self, op: NodeId, ctx: NodeId) -> Result<NodeId, DomainError> {
        let value = self.graph.value(op).to_string();
        match value.as_str() {
            "`" => {
                let [quoted] = self.operands(op)?;
                Ok(quoted)
            }
            ":" => {
                let [lval, rval] = self.operands(op)?;
                self.colon(lval, rval, ctx)
            }
            "=" => {
                let [lval, rval] = self.operands(op)?;
                self.eq(lval, rval, ctx)
            }
            "@" => {
                let [lval, rval] = self.operands(op)?;
                self.at(lval, rval, ctx)
            }
            other => {
                let reason = ErrorReason::UnknownOperator(other.to_string());
                Err(self.raise(op, reason))
            }
        }
    }

    /// Follows symbol bindings until a non-symbol node is reached.
    fn resolve(&mut self, this: NodeId, ctx: NodeId) -> Result<NodeId, DomainError> {
        let mut seen = HashSet::new();
        let mut target = this;
        while self.graph.kind(target) == Kind::Symbol {
            if !seen.insert(target) {
                let name = self.graph.value(this).to_string();
                return Err(self.raise(this, ErrorReason::CyclicBinding(name)));
            }
            target = self.eval(target, ctx)?;
        }
        Ok(target)
    }

    /// `this : that`. Classes construct a node of their kind from the raw
    /// value of `that`; symbols delegate to what they are bound to.
    pub fn colon(
        &mut self,
        this: NodeId,
        that: NodeId,
        ctx: NodeId,
    ) -> Result<NodeId, DomainError> {
        match self.graph.kind(this) {
            Kind::Symbol => {
                let target = self.resolve(this, ctx)?;
                self.colon(target, that, ctx)
            }
            Kind::Class => {
                let name = self.graph.value(this).to_string();
                let Some(kind) = Kind::from_class_name(&name) else {
                    return Err(self.raise(this, ErrorReason::UnknownClass(name)));
                };
                let value = self.graph.value(that).to_string();
                Ok(self.construct(kind, &value))
            }
            _ => Err(self.unsupported(this, ':')),
        }
    }

    /// `this = that`: binds the symbol's own name in `ctx` to `that` evaluated.
    pub fn eq(
        &mut self,
        this: NodeId,
        that: NodeId,
        ctx: NodeId,
    ) -> Result<NodeId, DomainError> {
        match self.graph.kind(this) {
            Kind::Symbol => {
                let value = self.eval(that, ctx)?;
                let name = self.graph.value(this).to_string();
                self.graph.set_slot(ctx, &name, value);
                Ok(value)
            }
            _ => Err(self.unsupported(this, '=')),
        }
    }

    /// `this @ that`: symbols and operators are evaluated first, the result
    /// receives `that` unevaluated.
    pub fn at(
        &mut self,
        this: NodeId,
        that: NodeId,
        ctx: NodeId,
    ) -> Result<NodeId, DomainError> {
        match self.graph.kind(this) {
            Kind::Symbol => {
                let target = self.resolve(this, ctx)?;
                self.at(target, that, ctx)
            }
            Kind::Op => {
                let target = self.eval_op(this, ctx)?;
                self.at(target, that, ctx)
            }
            Kind::Web => self.serve(this, ctx),
            _ => Err(self.unsupported(this, '@')),
        }
    }

    fn serve(&mut self, web: NodeId, ctx: NodeId) -> Result<NodeId, DomainError> {
        if self.service.is_none() {
            return Err(self.raise(web, ErrorReason::ServiceUnavailable));
        }

        log::info!("serving {}", self.graph.node(web).head());
        let result = match self.service.as_mut() {
            Some(service) => service.serve(&self.graph, ctx, web),
            None => Ok(()),
        };
        match result {
            Ok(()) => Ok(web),
            Err(e) => Err(self.raise(web, ErrorReason::Service(e.to_string()))),
        }
    }
}
