use std::rc::Rc;

use tracing::{debug, debug_span};

use crate::context::ParseContext;
use crate::error::CompileError;
use crate::ir::{BinOp, BlockRef, IntPredicate, Value};
use crate::sema::{Symbol, SymbolKind, Type};
use crate::span::Span;

use super::lexer::{self, SpannedToken, Token};

/// Runs the grammar over `tokens`, emitting into `ctx` as it goes.
pub fn parse_tokens(tokens: Vec<SpannedToken>, ctx: &mut ParseContext) -> Result<(), CompileError> {
    let mut parser = Parser::new(tokens, ctx);
    parser.parse_program()
}

/// A value produced by an expression together with its declared type.
#[derive(Debug, Clone, Copy)]
struct Operand {
    value: Value,
    ty: Type,
}

impl Operand {
    fn constant(value: i64) -> Self {
        let ty = if i32::try_from(value).is_ok() { Type::INT32 } else { Type::INT64 };
        Self {
            value: Value::Const { ty: ty.backend(), value },
            ty,
        }
    }
}

fn predicate(op: &Token, signed: bool) -> Option<IntPredicate> {
    let pred = match (op, signed) {
        (Token::Equal, _) => IntPredicate::Eq,
        (Token::NotEqual, _) => IntPredicate::Ne,
        (Token::Less, true) => IntPredicate::Slt,
        (Token::Less, false) => IntPredicate::Ult,
        (Token::LessEqual, true) => IntPredicate::Sle,
        (Token::LessEqual, false) => IntPredicate::Ule,
        (Token::Greater, true) => IntPredicate::Sgt,
        (Token::Greater, false) => IntPredicate::Ugt,
        (Token::GreaterEqual, true) => IntPredicate::Sge,
        (Token::GreaterEqual, false) => IntPredicate::Uge,
        _ => return None,
    };
    Some(pred)
}

struct Parser<'a> {
    tokens: Vec<SpannedToken>,
    position: usize,
    ctx: &'a mut ParseContext,
}

impl<'a> Parser<'a> {
    fn new(mut tokens: Vec<SpannedToken>, ctx: &'a mut ParseContext) -> Self {
        if tokens.last().map(|t| &t.token) != Some(&Token::Eof) {
            let span = tokens.last().map_or_else(Span::default, |t| t.span);
            tokens.push(SpannedToken { token: Token::Eof, span });
        }
        Self { tokens, position: 0, ctx }
    }

    fn parse_program(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Token::Const => self.parse_const()?,
                Token::Var => self.parse_var()?,
                _ => break,
            }
        }

        if self.peek() != &Token::Procedure {
            return Err(self.syntax("a program must declare a top-level PROCEDURE"));
        }
        self.parse_procedure()?;

        if self.peek() == &Token::Dot {
            self.advance();
        }
        if self.peek() != &Token::Eof {
            return Err(self.syntax(format!("expected end of input, found {}", self.peek())));
        }
        Ok(())
    }

    // ----- declarations -----

    fn parse_declarations(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Token::Const => self.parse_const()?,
                Token::Var => self.parse_var()?,
                Token::Procedure => self.parse_procedure()?,
                _ => return Ok(()),
            }
        }
    }

    /// Declarations allowed at the head of a nested BEGIN block.
    fn parse_block_declarations(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Token::Const => self.parse_const()?,
                Token::Var => self.parse_var()?,
                _ => return Ok(()),
            }
        }
    }

    fn parse_const(&mut self) -> Result<(), CompileError> {
        self.expect(Token::Const)?;
        let (name, name_span) = self.expect_identifier()?;
        self.expect(Token::Equal)?;

        let value = match self.advance().token.clone() {
            Token::Number(text) => text,
            Token::Str(text) => text,
            Token::Minus => match self.advance().token.clone() {
                Token::Number(text) => format!("-{text}"),
                other => return Err(self.syntax_here(format!("expected a number after '-', found {other}"))),
            },
            Token::Identifier(other) => {
                let source = self.ctx.find(&other)?;
                self.expect_kind(&source, SymbolKind::Literal)?;
                source.literal().value.clone()
            }
            other => return Err(self.syntax_here(format!("expected a constant value, found {other}"))),
        };
        self.expect(Token::Semicolon)?;

        self.ctx.location.update(name_span);
        let symbol = self.ctx.add(&name)?;
        self.ctx.declare_literal(&symbol, &value);
        Ok(())
    }

    fn parse_var(&mut self) -> Result<(), CompileError> {
        self.expect(Token::Var)?;
        let mut names = vec![self.expect_identifier()?];
        while self.peek() == &Token::Comma {
            self.advance();
            names.push(self.expect_identifier()?);
        }
        self.expect(Token::Colon)?;
        let ty = self.parse_type()?;
        self.expect(Token::Semicolon)?;

        for (name, span) in names {
            self.ctx.location.update(span);
            let symbol = self.ctx.add(&name)?;
            self.ctx.declare_variable(&symbol, ty);
        }
        Ok(())
    }

    fn parse_type(&mut self) -> Result<Type, CompileError> {
        let (name, _) = self.expect_identifier()?;
        Type::from_name(&name).ok_or_else(|| self.syntax_here(format!("unknown type '{name}'")))
    }

    fn parse_procedure(&mut self) -> Result<(), CompileError> {
        self.expect(Token::Procedure)?;
        let (name, _) = self.expect_identifier()?;
        // Declared in the enclosing scope so the body and later siblings can call it.
        let symbol = self.ctx.add(&name)?;
        self.expect(Token::Semicolon)?;

        let span = debug_span!("procedure", name = %name);
        let _guard = span.enter();

        self.ctx.begin_procedure(&symbol);
        self.ctx.enter_scope();

        self.parse_declarations()?;
        self.expect(Token::Begin)?;
        self.parse_statements()?;
        self.expect(Token::End)?;

        let block = self.ctx.current_block()?;
        if !self.ctx.codegen().is_terminated(block) {
            self.ctx.codegen().build_ret()?;
        }

        self.ctx.leave_scope()?;
        self.ctx.end_procedure()?;

        if self.peek() == &Token::Semicolon {
            self.advance();
        }
        Ok(())
    }

    // ----- statements -----

    fn parse_statements(&mut self) -> Result<(), CompileError> {
        while !matches!(self.peek(), Token::End | Token::Else | Token::Eof) {
            self.parse_statement()?;
            while self.peek() == &Token::Semicolon {
                self.advance();
            }
        }
        Ok(())
    }

    fn parse_statement(&mut self) -> Result<(), CompileError> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                if self.peek() == &Token::Assign {
                    self.parse_assignment(&name)
                } else {
                    self.emit_call(&name)
                }
            }
            Token::Call => {
                self.advance();
                let (name, _) = self.expect_identifier()?;
                self.emit_call(&name)
            }
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::Return => {
                self.advance();
                self.ctx.codegen().build_ret()?;
                // Whatever follows is unreachable but still needs somewhere to go.
                let after = self.ctx.append_block("after.return")?;
                self.ctx.set_current_block(after)
            }
            Token::Begin => {
                self.advance();
                self.ctx.enter_scope();
                self.parse_block_declarations()?;
                self.parse_statements()?;
                self.expect(Token::End)?;
                self.ctx.leave_scope()
            }
            other => Err(self.syntax(format!("expected a statement, found {other}"))),
        }
    }

    fn parse_assignment(&mut self, name: &str) -> Result<(), CompileError> {
        let target = self.ctx.find(name)?;
        self.expect_kind(&target, SymbolKind::Variable)?;
        self.expect(Token::Assign)?;

        let value = self.parse_expression()?;
        let var = target.variable();
        let converted = self
            .ctx
            .codegen()
            .build_int_cast(value.value, var.ty.backend(), value.ty.is_signed())?;
        self.ctx.codegen().build_store(converted, var.address)
    }

    fn emit_call(&mut self, name: &str) -> Result<(), CompileError> {
        let callee = self.ctx.find(name)?;
        self.expect_kind(&callee, SymbolKind::Procedure)?;
        let function = callee.procedure().function;
        self.ctx.codegen().build_call(function)
    }

    fn parse_if(&mut self) -> Result<(), CompileError> {
        self.expect(Token::If)?;
        let cond = self.parse_condition()?;
        self.expect(Token::Then)?;

        let then_block = self.ctx.append_block("then")?;
        let else_block = self.ctx.append_block("else")?;
        let merge = self.ctx.append_block("endif")?;
        self.ctx.codegen().build_cond_br(cond, then_block, else_block)?;

        self.ctx.set_current_block(then_block)?;
        self.parse_statements()?;
        self.branch_if_open(merge)?;

        self.ctx.set_current_block(else_block)?;
        if self.peek() == &Token::Else {
            self.advance();
            self.parse_statements()?;
        }
        self.expect(Token::End)?;
        self.branch_if_open(merge)?;

        self.ctx.set_current_block(merge)
    }

    fn parse_while(&mut self) -> Result<(), CompileError> {
        self.expect(Token::While)?;

        let cond_block = self.ctx.append_block("while.cond")?;
        let body = self.ctx.append_block("while.body")?;
        let exit = self.ctx.append_block("while.end")?;
        self.branch_if_open(cond_block)?;

        self.ctx.set_current_block(cond_block)?;
        let cond = self.parse_condition()?;
        self.expect(Token::Do)?;
        self.ctx.codegen().build_cond_br(cond, body, exit)?;

        self.ctx.set_current_block(body)?;
        self.parse_statements()?;
        self.expect(Token::End)?;
        self.branch_if_open(cond_block)?;

        self.ctx.set_current_block(exit)
    }

    fn branch_if_open(&mut self, target: BlockRef) -> Result<(), CompileError> {
        let block = self.ctx.current_block()?;
        if self.ctx.codegen().is_terminated(block) {
            return Ok(());
        }
        self.ctx.codegen().build_br(target)
    }

    // ----- expressions -----

    fn parse_condition(&mut self) -> Result<Value, CompileError> {
        let lhs = self.parse_expression()?;
        let op = self.peek().clone();
        let (Some(signed), Some(unsigned)) = (predicate(&op, true), predicate(&op, false)) else {
            return Err(self.syntax(format!("expected a comparison operator, found {op}")));
        };
        self.advance();
        let rhs = self.parse_expression()?;
        let (lhs, rhs, ty) = self.unify(lhs, rhs)?;

        let pred = if ty.is_signed() { signed } else { unsigned };
        self.ctx.codegen().build_icmp(pred, lhs, rhs)
    }

    fn parse_expression(&mut self) -> Result<Operand, CompileError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = self.binary(op, left, right)?;
        }
    }

    fn parse_term(&mut self) -> Result<Operand, CompileError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::SDiv,
                Token::Mod => BinOp::SRem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_factor()?;
            left = self.binary(op, left, right)?;
        }
    }

    fn parse_factor(&mut self) -> Result<Operand, CompileError> {
        match self.advance().token.clone() {
            Token::Number(text) => {
                let value = lexer::parse_int(&text)
                    .ok_or_else(|| self.syntax_here(format!("invalid number '{text}'")))?;
                Ok(Operand::constant(value))
            }
            Token::Identifier(name) => self.load_symbol(&name),
            Token::LParen => {
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Minus => {
                let operand = self.parse_factor()?;
                if let Value::Const { value, .. } = operand.value {
                    return Ok(Operand::constant(value.wrapping_neg()));
                }
                let zero = Value::Const { ty: operand.ty.backend(), value: 0 };
                let value = self.ctx.codegen().build_binary(BinOp::Sub, zero, operand.value)?;
                Ok(Operand { value, ty: operand.ty })
            }
            other => Err(self.syntax_here(format!("expected an expression, found {other}"))),
        }
    }

    /// Literal uses are substituted by their text; variables are loaded.
    fn load_symbol(&mut self, name: &str) -> Result<Operand, CompileError> {
        let symbol = self.ctx.find(name)?;
        match symbol.kind() {
            Some(SymbolKind::Literal) => {
                let text = &symbol.literal().value;
                let value = lexer::parse_int(text).ok_or_else(|| CompileError::InvalidLiteral {
                    name: name.to_string(),
                    value: text.clone(),
                    location: self.ctx.location.clone(),
                })?;
                Ok(Operand::constant(value))
            }
            Some(SymbolKind::Variable) => {
                let var = symbol.variable();
                let value = self.ctx.codegen().build_load(var.address)?;
                Ok(Operand { value, ty: var.ty })
            }
            _ => Err(CompileError::KindMismatch {
                name: name.to_string(),
                expected: "value",
                found: symbol.describe_kind(),
                location: self.ctx.location.clone(),
            }),
        }
    }

    fn binary(&mut self, op: BinOp, lhs: Operand, rhs: Operand) -> Result<Operand, CompileError> {
        let (lhs, rhs, ty) = self.unify(lhs, rhs)?;
        let op = match (op, ty.is_signed()) {
            (BinOp::SDiv, false) => BinOp::UDiv,
            (BinOp::SRem, false) => BinOp::URem,
            (op, _) => op,
        };
        let value = self.ctx.codegen().build_binary(op, lhs, rhs)?;
        Ok(Operand { value, ty })
    }

    /// Widens the narrower operand so both share one type.
    fn unify(&mut self, lhs: Operand, rhs: Operand) -> Result<(Value, Value, Type), CompileError> {
        let ty = lhs.ty.common(rhs.ty);
        let cg = self.ctx.codegen();
        let l = cg.build_int_cast(lhs.value, ty.backend(), lhs.ty.is_signed())?;
        let r = cg.build_int_cast(rhs.value, ty.backend(), rhs.ty.is_signed())?;
        Ok((l, r, ty))
    }

    // ----- helpers -----

    fn expect_kind(&self, symbol: &Rc<Symbol>, expected: SymbolKind) -> Result<(), CompileError> {
        if symbol.kind() == Some(expected) {
            return Ok(());
        }
        debug!(name = symbol.name(), expected = %expected, "kind mismatch");
        Err(CompileError::KindMismatch {
            name: symbol.name().to_string(),
            expected: expected.describe(),
            found: symbol.describe_kind(),
            location: self.ctx.location.clone(),
        })
    }

    fn syntax(&self, message: impl Into<String>) -> CompileError {
        let mut location = self.ctx.location.clone();
        location.update(self.peek_span());
        CompileError::Syntax {
            location,
            message: message.into(),
        }
    }

    /// Error at the token just consumed.
    fn syntax_here(&self, message: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            location: self.ctx.location.clone(),
            message: message.into(),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position].token
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.position].span
    }

    /// Consumes one token and moves the location cursor onto it.
    fn advance(&mut self) -> &SpannedToken {
        // The trailing Eof is never consumed past.
        let index = self.position.min(self.tokens.len() - 1);
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        let token = &self.tokens[index];
        self.ctx.location.update(token.span);
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), CompileError> {
        if self.peek() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.syntax(format!("expected {}, found {}", expected, self.peek())))
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Span), CompileError> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                let span = self.advance().span;
                Ok((name, span))
            }
            other => Err(self.syntax(format!("expected an identifier, found {other}"))),
        }
    }
}
