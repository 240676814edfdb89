//! Code-generation context: the module being built plus the insertion cursor.
//!
//! Every `build_*` call appends to whatever block the cursor designates at
//! that moment. Sequencing the cursor is the grammar's job.

use tracing::trace;

use crate::error::CompileError;
use crate::ir::{
    BinOp, BlockRef, CastOp, FunctionId, GlobalId, Instr, IntPredicate, IrType, Module, Value,
};

#[derive(Debug)]
pub struct CodeGen {
    module: Module,
    cursor: Option<BlockRef>,
}

impl CodeGen {
    pub fn new(module_name: &str) -> Self {
        Self {
            module: Module::new(module_name),
            cursor: None,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    pub fn create_function(&mut self, name: &str, internal: bool) -> FunctionId {
        self.module.add_function(name, internal)
    }

    pub fn create_global(&mut self, name: &str, ty: IrType) -> GlobalId {
        self.module.add_global(name, ty)
    }

    pub fn append_block(&mut self, function: FunctionId, label: &str) -> BlockRef {
        self.module.append_block(function, label)
    }

    pub fn position_at_end(&mut self, block: BlockRef) {
        trace!(
            function = %self.module.function(block.function).name,
            block = %self.module.basic_block(block).label,
            "insertion point moved"
        );
        self.cursor = Some(block);
    }

    pub fn current_block(&self) -> Option<BlockRef> {
        self.cursor
    }

    pub fn is_terminated(&self, block: BlockRef) -> bool {
        self.module.basic_block(block).terminator().is_some()
    }

    fn cursor(&self) -> Result<BlockRef, CompileError> {
        self.cursor
            .ok_or_else(|| CompileError::internal("instruction emitted with no insertion point"))
    }

    fn emit(&mut self, instr: Instr) -> Result<(), CompileError> {
        let at = self.cursor()?;
        self.module.push_instr(at, instr);
        Ok(())
    }

    fn fresh(&mut self, ty: IrType) -> Result<Value, CompileError> {
        let at = self.cursor()?;
        Ok(self.module.fresh_reg(at.function, ty))
    }

    pub fn build_load(&mut self, addr: GlobalId) -> Result<Value, CompileError> {
        let ty = self.module.global(addr).ty;
        let dest = self.fresh(ty)?;
        self.emit(Instr::Load { dest, addr })?;
        Ok(dest)
    }

    pub fn build_store(&mut self, value: Value, addr: GlobalId) -> Result<(), CompileError> {
        self.emit(Instr::Store { value, addr })
    }

    pub fn build_binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Result<Value, CompileError> {
        let dest = self.fresh(lhs.ty())?;
        self.emit(Instr::Binary { dest, op, lhs, rhs })?;
        Ok(dest)
    }

    pub fn build_icmp(
        &mut self,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value, CompileError> {
        let dest = self.fresh(IrType::Int(1))?;
        self.emit(Instr::Icmp { dest, pred, lhs, rhs })?;
        Ok(dest)
    }

    /// Integer resize. Constants fold instead of producing an instruction.
    pub fn build_int_cast(
        &mut self,
        value: Value,
        to: IrType,
        signed: bool,
    ) -> Result<Value, CompileError> {
        let (from_bits, to_bits) = (value.ty().bits(), to.bits());
        if from_bits == to_bits {
            return Ok(value);
        }
        if let Value::Const { value: v, .. } = value {
            return Ok(Value::Const {
                ty: to,
                value: fold_int_cast(v, from_bits, to_bits, signed),
            });
        }
        let op = match (from_bits < to_bits, signed) {
            (true, true) => CastOp::SExt,
            (true, false) => CastOp::ZExt,
            (false, _) => CastOp::Trunc,
        };
        let dest = self.fresh(to)?;
        self.emit(Instr::Cast { dest, op, value })?;
        Ok(dest)
    }

    pub fn build_call(&mut self, callee: FunctionId) -> Result<(), CompileError> {
        self.emit(Instr::Call { callee })
    }

    pub fn build_br(&mut self, target: BlockRef) -> Result<(), CompileError> {
        self.emit(Instr::Br { target: target.block })
    }

    pub fn build_cond_br(
        &mut self,
        cond: Value,
        then_block: BlockRef,
        else_block: BlockRef,
    ) -> Result<(), CompileError> {
        self.emit(Instr::CondBr {
            cond,
            then_block: then_block.block,
            else_block: else_block.block,
        })
    }

    pub fn build_ret(&mut self) -> Result<(), CompileError> {
        self.emit(Instr::Ret)
    }
}

fn fold_int_cast(value: i64, from_bits: u32, to_bits: u32, signed: bool) -> i64 {
    let truncate = |v: i64, bits: u32| -> i64 {
        if bits >= 64 {
            v
        } else {
            v & (((1u64 << bits) - 1) as i64)
        }
    };
    let sign_extend = |v: i64, bits: u32| -> i64 {
        if bits >= 64 {
            v
        } else {
            let shift = 64 - bits;
            (v << shift) >> shift
        }
    };

    if to_bits < from_bits {
        // Narrowed constants stay in the signed range of the target width.
        sign_extend(truncate(value, to_bits), to_bits)
    } else if signed {
        sign_extend(value, from_bits)
    } else {
        truncate(value, from_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitting_without_cursor_is_an_internal_error() {
        let mut cg = CodeGen::new("m");
        assert!(matches!(cg.build_ret(), Err(CompileError::Internal { .. })));
    }

    #[test]
    fn instructions_land_in_the_cursor_block() {
        let mut cg = CodeGen::new("m");
        let f = cg.create_function("f", false);
        let entry = cg.append_block(f, "entry");
        let exit = cg.append_block(f, "exit");

        cg.position_at_end(entry);
        cg.build_br(exit).unwrap();
        cg.position_at_end(exit);
        cg.build_ret().unwrap();

        assert!(cg.is_terminated(entry));
        assert!(cg.is_terminated(exit));
        assert_eq!(cg.module().basic_block(entry).instrs, vec![Instr::Br { target: exit.block }]);
        assert_eq!(cg.module().basic_block(exit).instrs, vec![Instr::Ret]);
    }

    #[test]
    fn constant_casts_fold() {
        let mut cg = CodeGen::new("m");
        let c = Value::Const { ty: IrType::Int(32), value: 300 };
        let narrowed = cg.build_int_cast(c, IrType::Int(8), true).unwrap();
        assert_eq!(narrowed, Value::Const { ty: IrType::Int(8), value: 44 });

        let minus_one = Value::Const { ty: IrType::Int(8), value: -1 };
        let zext = cg.build_int_cast(minus_one, IrType::Int(16), false).unwrap();
        assert_eq!(zext, Value::Const { ty: IrType::Int(16), value: 255 });
        let sext = cg.build_int_cast(minus_one, IrType::Int(16), true).unwrap();
        assert_eq!(sext, Value::Const { ty: IrType::Int(16), value: -1 });
    }

    #[test]
    fn register_casts_pick_extension_kind() {
        let mut cg = CodeGen::new("m");
        let f = cg.create_function("f", false);
        let g = cg.create_global("g", IrType::Int(8));
        let entry = cg.append_block(f, "entry");
        cg.position_at_end(entry);

        let v = cg.build_load(g).unwrap();
        cg.build_int_cast(v, IrType::Int(32), false).unwrap();
        let block = cg.module().basic_block(entry);
        assert!(matches!(block.instrs[1], Instr::Cast { op: CastOp::ZExt, .. }));
    }
}
