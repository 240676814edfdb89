use std::fmt;

use super::{BinOp, CastOp, Function, Instr, IntPredicate, IrType, Module, Value};

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => f.write_str("void"),
            IrType::Int(bits) => write!(f, "i{bits}"),
            IrType::Ptr => f.write_str("ptr"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Const { value, .. } => write!(f, "{value}"),
            Value::Reg { id, .. } => write!(f, "%t{id}"),
        }
    }
}

impl BinOp {
    pub(super) fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::UDiv => "udiv",
            BinOp::SRem => "srem",
            BinOp::URem => "urem",
        }
    }
}

impl IntPredicate {
    fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
        }
    }
}

impl CastOp {
    fn mnemonic(self) -> &'static str {
        match self {
            CastOp::SExt => "sext",
            CastOp::ZExt => "zext",
            CastOp::Trunc => "trunc",
        }
    }
}

struct InstrDisplay<'a> {
    module: &'a Module,
    func: &'a Function,
    instr: &'a Instr,
}

impl fmt::Display for InstrDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = |id: super::BlockId| &self.func.blocks[id.0].label;
        match self.instr {
            Instr::Load { dest, addr } => write!(
                f,
                "{dest} = load {}, ptr @{}",
                dest.ty(),
                self.module.global(*addr).name
            ),
            Instr::Store { value, addr } => write!(
                f,
                "store {} {value}, ptr @{}",
                value.ty(),
                self.module.global(*addr).name
            ),
            Instr::Binary { dest, op, lhs, rhs } => {
                write!(f, "{dest} = {} {} {lhs}, {rhs}", op.mnemonic(), lhs.ty())
            }
            Instr::Icmp { dest, pred, lhs, rhs } => {
                write!(f, "{dest} = icmp {} {} {lhs}, {rhs}", pred.mnemonic(), lhs.ty())
            }
            Instr::Cast { dest, op, value } => write!(
                f,
                "{dest} = {} {} {value} to {}",
                op.mnemonic(),
                value.ty(),
                dest.ty()
            ),
            Instr::Call { callee } => {
                write!(f, "call void @{}()", self.module.function(*callee).name)
            }
            Instr::Br { target } => write!(f, "br label %{}", label(*target)),
            Instr::CondBr { cond, then_block, else_block } => write!(
                f,
                "br i1 {cond}, label %{}, label %{}",
                label(*then_block),
                label(*else_block)
            ),
            Instr::Ret => f.write_str("ret void"),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in &self.globals {
            writeln!(f, "@{} = global {} 0", global.name, global.ty)?;
        }

        for func in &self.functions {
            writeln!(f)?;
            let linkage = if func.internal { "internal " } else { "" };
            writeln!(f, "define {linkage}void @{}() {{", func.name)?;
            for (i, block) in func.blocks.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "{}:", block.label)?;
                for instr in &block.instrs {
                    writeln!(f, "  {}", InstrDisplay { module: self, func, instr })?;
                }
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}
