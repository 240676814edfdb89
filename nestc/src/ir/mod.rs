//! Minimal SSA-style IR that the front end emits into.
//!
//! The module owns every global, function and block; the rest of the crate
//! holds plain index handles (`GlobalId`, `FunctionId`, `BlockRef`) into it.

mod print;
mod verify;

pub use verify::{verify_function, verify_module};

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    /// `i1` for comparison results, `iN` for declared integers.
    Int(u32),
    Ptr,
}

impl IrType {
    pub fn bits(self) -> u32 {
        match self {
            IrType::Int(bits) => bits,
            IrType::Ptr => 64,
            IrType::Void => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

/// A basic block together with the function that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub function: FunctionId,
    pub block: BlockId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Const { ty: IrType, value: i64 },
    Reg { ty: IrType, id: u32 },
}

impl Value {
    pub fn ty(&self) -> IrType {
        match *self {
            Value::Const { ty, .. } | Value::Reg { ty, .. } => ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    SExt,
    ZExt,
    Trunc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Load { dest: Value, addr: GlobalId },
    Store { value: Value, addr: GlobalId },
    Binary { dest: Value, op: BinOp, lhs: Value, rhs: Value },
    Icmp { dest: Value, pred: IntPredicate, lhs: Value, rhs: Value },
    Cast { dest: Value, op: CastOp, value: Value },
    Call { callee: FunctionId },
    Br { target: BlockId },
    CondBr { cond: Value, then_block: BlockId, else_block: BlockId },
    Ret,
}

impl Instr {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Instr::Br { .. } | Instr::CondBr { .. } | Instr::Ret)
    }
}

#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,
    pub ty: IrType,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub label: String,
    pub instrs: Vec<Instr>,
}

impl BasicBlock {
    pub fn terminator(&self) -> Option<&Instr> {
        self.instrs.last().filter(|i| i.is_terminator())
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub internal: bool,
    pub blocks: Vec<BasicBlock>,
    next_reg: u32,
    labels: HashSet<String>,
}

impl Function {
    fn new(name: String, internal: bool) -> Self {
        Self {
            name,
            internal,
            blocks: Vec::new(),
            next_reg: 0,
            labels: HashSet::new(),
        }
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.0)
    }

    fn fresh_reg(&mut self, ty: IrType) -> Value {
        let id = self.next_reg;
        self.next_reg += 1;
        Value::Reg { ty, id }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
    symbols: HashSet<String>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Globals and functions share one namespace, like in LLVM.
    fn unique_symbol(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut n = 1;
        while self.symbols.contains(&name) {
            name = format!("{base}.{n}");
            n += 1;
        }
        self.symbols.insert(name.clone());
        name
    }

    pub fn add_global(&mut self, name: &str, ty: IrType) -> GlobalId {
        let name = self.unique_symbol(name);
        self.globals.push(Global { name, ty });
        GlobalId(self.globals.len() - 1)
    }

    pub fn add_function(&mut self, name: &str, internal: bool) -> FunctionId {
        let name = self.unique_symbol(name);
        self.functions.push(Function::new(name, internal));
        FunctionId(self.functions.len() - 1)
    }

    pub fn append_block(&mut self, function: FunctionId, label: &str) -> BlockRef {
        let func = &mut self.functions[function.0];
        let mut name = label.to_string();
        let mut n = 1;
        while func.labels.contains(&name) {
            name = format!("{label}.{n}");
            n += 1;
        }
        func.labels.insert(name.clone());
        func.blocks.push(BasicBlock {
            label: name,
            instrs: Vec::new(),
        });
        BlockRef {
            function,
            block: BlockId(func.blocks.len() - 1),
        }
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.0]
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0]
    }

    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(FunctionId)
    }

    pub fn basic_block(&self, at: BlockRef) -> &BasicBlock {
        &self.functions[at.function.0].blocks[at.block.0]
    }

    pub fn fresh_reg(&mut self, function: FunctionId, ty: IrType) -> Value {
        self.functions[function.0].fresh_reg(ty)
    }

    pub fn push_instr(&mut self, at: BlockRef, instr: Instr) {
        self.functions[at.function.0].blocks[at.block.0]
            .instrs
            .push(instr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clashing_names_get_suffixes() {
        let mut module = Module::new("m");
        let a = module.add_global("MAIN.X", IrType::Int(8));
        let b = module.add_global("MAIN.X", IrType::Int(8));
        let f = module.add_function("MAIN.X", false);
        assert_eq!(module.global(a).name, "MAIN.X");
        assert_eq!(module.global(b).name, "MAIN.X.1");
        assert_eq!(module.function(f).name, "MAIN.X.2");
    }

    #[test]
    fn block_labels_are_unique_per_function() {
        let mut module = Module::new("m");
        let f = module.add_function("f", false);
        let g = module.add_function("g", false);
        let a = module.append_block(f, "then");
        let b = module.append_block(f, "then");
        let c = module.append_block(g, "then");
        assert_eq!(module.basic_block(a).label, "then");
        assert_eq!(module.basic_block(b).label, "then.1");
        assert_eq!(module.basic_block(c).label, "then");
    }
}
