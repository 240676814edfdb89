//! Per-translation state threaded through every grammar action.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::codegen::CodeGen;
use crate::error::CompileError;
use crate::ir::{BlockRef, GlobalId, Module};
use crate::sema::{Scope, Symbol, Type};
use crate::span::Location;

#[derive(Debug)]
pub struct ParseContext {
    pub location: Location,
    scope: Rc<Scope>,
    procedures: Vec<Rc<Symbol>>,
    codegen: CodeGen,
}

impl ParseContext {
    pub fn new(filename: &str) -> Self {
        Self {
            location: Location::initialize(filename),
            scope: Rc::new(Scope::new(None)),
            procedures: Vec::new(),
            codegen: CodeGen::new(filename),
        }
    }

    pub fn scope(&self) -> &Rc<Scope> {
        &self.scope
    }

    pub fn codegen(&mut self) -> &mut CodeGen {
        &mut self.codegen
    }

    pub fn module(&self) -> &Module {
        self.codegen.module()
    }

    pub fn into_module(self) -> Module {
        self.codegen.into_module()
    }

    pub fn enter_scope(&mut self) {
        self.scope = Rc::new(Scope::new(Some(Rc::clone(&self.scope))));
        trace!(depth = self.scope.depth(), "enter scope");
    }

    pub fn leave_scope(&mut self) -> Result<(), CompileError> {
        let next = self
            .scope
            .next_scope()
            .ok_or_else(|| CompileError::internal("leaving the root scope"))?;
        self.scope = next;
        trace!(depth = self.scope.depth(), "leave scope");
        Ok(())
    }

    pub fn add(&self, name: &str) -> Result<Rc<Symbol>, CompileError> {
        self.scope.add(name, &self.location)
    }

    pub fn maybe_find(&self, name: &str) -> Option<Rc<Symbol>> {
        self.scope.maybe_find(name)
    }

    pub fn find(&self, name: &str) -> Result<Rc<Symbol>, CompileError> {
        self.scope.find(name, &self.location)
    }

    pub fn declare_literal(&self, symbol: &Symbol, value: &str) {
        debug!(name = symbol.name(), value, "declare literal");
        symbol.declare_literal(value);
    }

    /// Allocates storage for a variable, named after the open procedures.
    pub fn declare_variable(&mut self, symbol: &Symbol, ty: Type) -> GlobalId {
        let name = self.qualified_name(symbol.name());
        let address = self.codegen.create_global(&name, ty.backend());
        debug!(name = symbol.name(), global = %self.module().global(address).name, %ty, "declare variable");
        symbol.declare_variable(address, ty);
        address
    }

    /// Opens `symbol` as a procedure and moves the cursor to its entry block.
    ///
    /// The enclosing procedure's cursor is kept in its own payload, so
    /// `end_procedure` can put it back.
    pub fn begin_procedure(&mut self, symbol: &Rc<Symbol>) {
        let name = self.qualified_name(symbol.name());
        let internal = !self.procedures.is_empty();
        if let (Some(enclosing), Some(block)) = (self.procedures.last(), self.codegen.current_block()) {
            enclosing.procedure().set_block(block);
        }

        let function = self.codegen.create_function(&name, internal);
        let entry = self.codegen.append_block(function, "entry");
        symbol.declare_procedure(function, entry);
        self.procedures.push(Rc::clone(symbol));
        self.codegen.position_at_end(entry);
        debug!(name = %name, depth = self.procedures.len(), "begin procedure");
    }

    /// Closes the innermost procedure and restores the enclosing cursor.
    ///
    /// The outermost procedure stays on the stack so the driver can still
    /// reach it once parsing is done.
    pub fn end_procedure(&mut self) -> Result<(), CompileError> {
        match self.procedures.len() {
            0 => Err(CompileError::internal("end of procedure with none open")),
            1 => {
                debug!(name = self.procedures[0].name(), "end outermost procedure");
                Ok(())
            }
            _ => {
                if let Some(done) = self.procedures.pop() {
                    debug!(name = done.name(), "end procedure");
                }
                let block = self.current_procedure()?.procedure().block();
                self.codegen.position_at_end(block);
                Ok(())
            }
        }
    }

    pub fn current_procedure(&self) -> Result<Rc<Symbol>, CompileError> {
        self.procedures
            .last()
            .cloned()
            .ok_or_else(|| CompileError::internal("no procedure is open"))
    }

    pub fn outermost_procedure(&self) -> Result<Rc<Symbol>, CompileError> {
        self.procedures
            .first()
            .cloned()
            .ok_or_else(|| CompileError::internal("no procedure was declared"))
    }

    pub fn procedure_depth(&self) -> usize {
        self.procedures.len()
    }

    pub fn current_block(&self) -> Result<BlockRef, CompileError> {
        self.codegen
            .current_block()
            .ok_or_else(|| CompileError::internal("no insertion point"))
    }

    /// Moves the cursor; the current procedure remembers it as well.
    pub fn set_current_block(&mut self, block: BlockRef) -> Result<(), CompileError> {
        self.current_procedure()?.procedure().set_block(block);
        self.codegen.position_at_end(block);
        Ok(())
    }

    /// Appends a block to the procedure being generated.
    pub fn append_block(&mut self, label: &str) -> Result<BlockRef, CompileError> {
        let function = self.current_procedure()?.procedure().function;
        Ok(self.codegen.append_block(function, label))
    }

    fn qualified_name(&self, name: &str) -> String {
        let mut parts: Vec<&str> = self.procedures.iter().map(|p| p.name()).collect();
        parts.push(name);
        parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::SymbolKind;

    fn open(ctx: &mut ParseContext, name: &str) -> Rc<Symbol> {
        let sym = ctx.add(name).unwrap();
        ctx.begin_procedure(&sym);
        ctx.enter_scope();
        sym
    }

    fn close(ctx: &mut ParseContext) {
        ctx.leave_scope().unwrap();
        ctx.end_procedure().unwrap();
    }

    #[test]
    fn balanced_enter_leave_restores_scope() {
        let mut ctx = ParseContext::new("t.nst");
        let before = Rc::clone(ctx.scope());
        for depth in 1..=4 {
            for _ in 0..depth {
                ctx.enter_scope();
            }
            for _ in 0..depth {
                ctx.leave_scope().unwrap();
            }
            assert!(Rc::ptr_eq(ctx.scope(), &before));
        }
    }

    #[test]
    fn leaving_root_is_an_error() {
        let mut ctx = ParseContext::new("t.nst");
        assert!(matches!(ctx.leave_scope(), Err(CompileError::Internal { .. })));
    }

    #[test]
    fn literal_declared_at_top_is_found() {
        let ctx = ParseContext::new("t.nst");
        let x = ctx.add("X").unwrap();
        ctx.declare_literal(&x, "42");
        let found = ctx.find("X").unwrap();
        assert_eq!(found.kind(), Some(SymbolKind::Literal));
        assert_eq!(found.literal().value, "42");
    }

    #[test]
    fn current_and_outermost_procedure() {
        let mut ctx = ParseContext::new("t.nst");
        assert!(ctx.current_procedure().is_err());

        let p = open(&mut ctx, "P");
        assert!(Rc::ptr_eq(&ctx.current_procedure().unwrap(), &p));
        assert!(Rc::ptr_eq(&ctx.outermost_procedure().unwrap(), &p));

        let q = open(&mut ctx, "Q");
        assert!(Rc::ptr_eq(&ctx.current_procedure().unwrap(), &q));
        assert!(Rc::ptr_eq(&ctx.outermost_procedure().unwrap(), &p));
        assert_eq!(ctx.module().function(q.procedure().function).name, "P.Q");
    }

    #[test]
    fn nested_declarations_do_not_leak() {
        let mut ctx = ParseContext::new("t.nst");
        open(&mut ctx, "MAIN");
        open(&mut ctx, "INNER");
        let y = ctx.add("Y").unwrap();
        ctx.declare_variable(&y, Type::INT32);
        close(&mut ctx);

        let err = ctx.find("Y").unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedSymbol { ref name, .. } if name == "Y"));
        assert!(ctx.find("INNER").is_ok());
    }

    #[test]
    fn sibling_procedures_have_separate_scopes() {
        let mut ctx = ParseContext::new("t.nst");
        open(&mut ctx, "MAIN");

        open(&mut ctx, "A");
        let a_count = ctx.add("COUNT").unwrap();
        ctx.declare_variable(&a_count, Type::INT32);
        close(&mut ctx);

        open(&mut ctx, "B");
        let b_count = ctx.add("COUNT").unwrap();
        ctx.declare_variable(&b_count, Type::INT32);
        close(&mut ctx);

        let names: Vec<&str> = ctx.module().globals.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["MAIN.A.COUNT", "MAIN.B.COUNT"]);
    }

    #[test]
    fn ending_nested_procedure_restores_cursor() {
        let mut ctx = ParseContext::new("t.nst");
        let main = open(&mut ctx, "MAIN");
        let body = ctx.append_block("body").unwrap();
        ctx.set_current_block(body).unwrap();

        let inner = open(&mut ctx, "INNER");
        assert_eq!(ctx.current_block().unwrap(), inner.procedure().block());
        assert_ne!(ctx.current_block().unwrap().function, main.procedure().function);

        close(&mut ctx);
        assert_eq!(ctx.current_block().unwrap(), body);
        assert!(Rc::ptr_eq(&ctx.current_procedure().unwrap(), &main));
    }

    #[test]
    fn outermost_survives_its_own_end() {
        let mut ctx = ParseContext::new("t.nst");
        let main = open(&mut ctx, "MAIN");
        close(&mut ctx);
        assert!(Rc::ptr_eq(&ctx.outermost_procedure().unwrap(), &main));
        assert_eq!(ctx.procedure_depth(), 1);
    }
}
