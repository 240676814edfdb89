use crate::error::CompileError;

use super::{FunctionId, Instr, IrType, Module};

/// Structural check of one function.
///
/// Every block must be non-empty and end with exactly one terminator; branch
/// targets and callees must exist and operand types must line up.
pub fn verify_function(module: &Module, id: FunctionId) -> Result<(), CompileError> {
    let func = module.functions.get(id.0).ok_or_else(|| CompileError::Verification {
        function: format!("#{}", id.0),
        message: "no such function".to_string(),
    })?;

    let fail = |message: String| CompileError::Verification {
        function: func.name.clone(),
        message,
    };

    if func.blocks.is_empty() {
        return Err(fail("function has no blocks".to_string()));
    }

    for block in &func.blocks {
        let Some((last, body)) = block.instrs.split_last() else {
            return Err(fail(format!("block '{}' is empty", block.label)));
        };
        if !last.is_terminator() {
            return Err(fail(format!(
                "block '{}' does not end with a terminator",
                block.label
            )));
        }
        if body.iter().any(Instr::is_terminator) {
            return Err(fail(format!(
                "block '{}' has a terminator before its end",
                block.label
            )));
        }

        for instr in &block.instrs {
            check_instr(module, func.blocks.len(), instr)
                .map_err(|msg| fail(format!("in block '{}': {msg}", block.label)))?;
        }
    }
    Ok(())
}

pub fn verify_module(module: &Module) -> Result<(), CompileError> {
    (0..module.functions.len()).try_for_each(|i| verify_function(module, FunctionId(i)))
}

fn check_instr(module: &Module, block_count: usize, instr: &Instr) -> Result<(), String> {
    let check_block = |b: super::BlockId| {
        if b.0 < block_count {
            Ok(())
        } else {
            Err(format!("branch to unknown block #{}", b.0))
        }
    };
    let check_global = |g: super::GlobalId| {
        module
            .globals
            .get(g.0)
            .map(|global| global.ty)
            .ok_or_else(|| format!("reference to unknown global #{}", g.0))
    };

    match instr {
        Instr::Load { dest, addr } => {
            let ty = check_global(*addr)?;
            same_type(ty, dest.ty(), "load")
        }
        Instr::Store { value, addr } => {
            let ty = check_global(*addr)?;
            same_type(ty, value.ty(), "store")
        }
        Instr::Binary { dest, op, lhs, rhs } => {
            same_type(lhs.ty(), rhs.ty(), op.mnemonic())?;
            same_type(lhs.ty(), dest.ty(), op.mnemonic())
        }
        Instr::Icmp { dest, lhs, rhs, .. } => {
            same_type(lhs.ty(), rhs.ty(), "icmp")?;
            same_type(dest.ty(), IrType::Int(1), "icmp")
        }
        Instr::Cast { dest, op, value } => {
            let (from, to) = (value.ty().bits(), dest.ty().bits());
            let ok = match op {
                super::CastOp::SExt | super::CastOp::ZExt => from < to,
                super::CastOp::Trunc => from > to,
            };
            if ok {
                Ok(())
            } else {
                Err(format!("invalid cast from i{from} to i{to}"))
            }
        }
        Instr::Call { callee } => {
            if callee.0 < module.functions.len() {
                Ok(())
            } else {
                Err(format!("call to unknown function #{}", callee.0))
            }
        }
        Instr::Br { target } => check_block(*target),
        Instr::CondBr { cond, then_block, else_block } => {
            same_type(cond.ty(), IrType::Int(1), "br")?;
            check_block(*then_block)?;
            check_block(*else_block)
        }
        Instr::Ret => Ok(()),
    }
}

fn same_type(expected: IrType, found: IrType, what: &str) -> Result<(), String> {
    if expected == found {
        Ok(())
    } else {
        Err(format!("{what}: type mismatch ({expected} vs {found})"))
    }
}
