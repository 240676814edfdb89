use std::cell::{Cell, OnceCell};
use std::fmt;

use crate::ir::{BlockRef, FunctionId, GlobalId};

use super::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Literal,
    Procedure,
    Variable,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

impl SymbolKind {
    pub fn describe(self) -> &'static str {
        match self {
            SymbolKind::Literal => "literal",
            SymbolKind::Procedure => "procedure",
            SymbolKind::Variable => "variable",
        }
    }
}

#[derive(Debug)]
pub struct LiteralData {
    pub value: String,
}

#[derive(Debug)]
pub struct ProcedureData {
    pub function: FunctionId,
    block: Cell<BlockRef>,
}

impl ProcedureData {
    /// Block currently receiving this procedure's instructions.
    pub fn block(&self) -> BlockRef {
        self.block.get()
    }

    pub fn set_block(&self, block: BlockRef) {
        self.block.set(block);
    }
}

#[derive(Debug)]
pub struct VariableData {
    pub address: GlobalId,
    pub ty: Type,
}

#[derive(Debug)]
pub enum Payload {
    Literal(LiteralData),
    Procedure(ProcedureData),
    Variable(VariableData),
}

/// A declared name.
///
/// Created empty by `Scope::add`; exactly one `declare_*` call then fixes its
/// kind for good.
#[derive(Debug)]
pub struct Symbol {
    name: String,
    payload: OnceCell<Payload>,
}

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` while the declaration is still being parsed.
    pub fn kind(&self) -> Option<SymbolKind> {
        self.payload.get().map(|p| match p {
            Payload::Literal(_) => SymbolKind::Literal,
            Payload::Procedure(_) => SymbolKind::Procedure,
            Payload::Variable(_) => SymbolKind::Variable,
        })
    }

    pub fn describe_kind(&self) -> &'static str {
        self.kind().map_or("incomplete declaration", SymbolKind::describe)
    }

    fn attach(&self, payload: Payload) {
        if self.payload.set(payload).is_err() {
            panic!("symbol {} already has a payload", self.name);
        }
    }

    pub fn declare_literal(&self, value: impl Into<String>) {
        self.attach(Payload::Literal(LiteralData { value: value.into() }));
    }

    pub fn declare_procedure(&self, function: FunctionId, entry: BlockRef) {
        self.attach(Payload::Procedure(ProcedureData {
            function,
            block: Cell::new(entry),
        }));
    }

    pub fn declare_variable(&self, address: GlobalId, ty: Type) {
        self.attach(Payload::Variable(VariableData { address, ty }));
    }

    pub fn literal(&self) -> &LiteralData {
        match self.payload.get() {
            Some(Payload::Literal(data)) => data,
            _ => panic!("{} is a {}, not a literal", self.name, self.describe_kind()),
        }
    }

    pub fn procedure(&self) -> &ProcedureData {
        match self.payload.get() {
            Some(Payload::Procedure(data)) => data,
            _ => panic!("{} is a {}, not a procedure", self.name, self.describe_kind()),
        }
    }

    pub fn variable(&self) -> &VariableData {
        match self.payload.get() {
            Some(Payload::Variable(data)) => data,
            _ => panic!("{} is a {}, not a variable", self.name, self.describe_kind()),
        }
    }
}
