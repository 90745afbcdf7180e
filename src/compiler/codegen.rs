//! Type-directed bytecode emission, one function at a time.
//!
//! The emitter keeps a compile-time stack counter in lockstep with what
//! the interpreter will do: every statement starts and ends at depth
//! zero, and the recorded peak becomes the frame's operand-stack size.

use std::sync::Arc;

use crate::ast::{CallSrc, CallTarget, ExprMember, ExprSrc, FunctionSrc, StmtSrc};
use crate::bytecode::{pack, Opcode, Word};
use crate::class::{ByteCode, DataDecl, DataType};
use crate::error::{CompileError, Result};
use crate::token::{Token, TokenKind};

use super::declaration::{local_decl, ClassDecl, Declarations, FunctionDecl};

/// Where an identifier resolves: a field, a frame local, or a parameter.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum DataLoc {
    Script,
    Local,
    Param,
}

#[derive(Debug)]
struct VarInfo {
    loc: DataLoc,
    offset: usize,
    ty: DataType,
}

pub(crate) struct FunctionEmitter<'a> {
    decls: &'a Declarations,
    class: &'a ClassDecl,
    function: &'a FunctionDecl,
    locals: Vec<DataDecl>,
    code: Vec<Word>,
    cur_stack: usize,
    max_stack: usize,
    new_class_names: Vec<Arc<str>>,
    last_op: Option<Opcode>,
}

impl<'a> FunctionEmitter<'a> {
    pub fn new(decls: &'a Declarations, class: &'a ClassDecl, function: &'a FunctionDecl) -> Self {
        Self {
            decls,
            class,
            function,
            locals: Vec::new(),
            code: Vec::new(),
            cur_stack: 0,
            max_stack: 0,
            new_class_names: Vec::new(),
            last_op: None,
        }
    }

    /// Compile one scripted function or constructor body.
    pub fn emit(mut self, source: &FunctionSrc) -> Result<ByteCode> {
        self.locals = source.locals.iter().map(local_decl).collect();
        for local in &self.locals {
            match &local.ty {
                DataType::Native(name) if self.decls.find(name).is_none() => {
                    return Err(self.unknown_type(name, local.line));
                }
                DataType::Void => {
                    return Err(self.unknown_type("void", local.line));
                }
                _ => {}
            }
        }

        // a derived constructor leads with the base-constructor call
        if self.class.super_name.is_some() && source.constructor {
            let Some(base_call) = &source.base_call else {
                return Err(CompileError::MissingSuperCall {
                    class: self.class.name.to_string(),
                    line: source.line,
                });
            };
            self.emit_call(base_call)?;
            self.emit_op(Opcode::Pop, 0);
            self.dec_stack();
            debug_assert_eq!(self.cur_stack, 0);
        }

        // local initializers store into their slots before the body runs
        for (idx, local_src) in source.locals.iter().enumerate() {
            if let Some(init) = &local_src.init {
                let ty = self.locals[idx].ty.clone();
                self.emit_expression_expecting(init, &ty)?;
                self.assign_to(&VarInfo {
                    loc: DataLoc::Local,
                    offset: idx,
                    ty,
                })?;
                debug_assert_eq!(self.cur_stack, 0);
            }
        }

        for statement in &source.body {
            self.emit_statement(statement)?;
        }

        // a void function may fall off the end; it returns a dummy bool
        if self.function.return_type == DataType::Void && self.last_op != Some(Opcode::Ret) {
            self.emit_op(Opcode::PushB, 0);
            self.inc_stack();
            self.emit_op(Opcode::Ret, 0);
            self.dec_stack();
        }

        if self.last_op != Some(Opcode::Ret) {
            return Err(CompileError::MissingReturn {
                class: self.class.name.to_string(),
                line: source.line,
                function: self.function.name.to_string(),
            });
        }

        debug_assert_eq!(self.cur_stack, 0);
        Ok(ByteCode {
            words: self.code,
            max_stack: self.max_stack,
            locals: self.locals,
            new_class_names: self.new_class_names,
        })
    }

    fn emit_statement(&mut self, statement: &StmtSrc) -> Result<()> {
        debug_assert_eq!(self.cur_stack, 0);
        match statement {
            StmtSrc::Block(statements) => {
                for statement in statements {
                    self.emit_statement(statement)?;
                }
            }
            StmtSrc::While {
                condition, body, ..
            } => {
                let loop_start = self.code.len() as u32;
                self.emit_expression_expecting(condition, &DataType::Bool)?;

                let jz_pos = self.emit_placeholder();
                self.dec_stack();

                self.emit_statement(body)?;
                self.emit_op(Opcode::Jmp, loop_start);

                let loop_end = self.code.len() as u32;
                self.patch(jz_pos, Opcode::Jz, loop_end);
            }
            StmtSrc::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.emit_expression_expecting(condition, &DataType::Bool)?;

                let jz_pos = self.emit_placeholder();
                self.dec_stack();

                self.emit_statement(then_branch)?;

                let false_pos = self.code.len() as u32;
                if let Some(else_branch) = else_branch {
                    self.emit_statement(else_branch)?;
                }
                self.patch(jz_pos, Opcode::Jz, false_pos);
            }
            StmtSrc::Return { line, value } => {
                let return_type = self.function.return_type.clone();
                if return_type == DataType::Void {
                    if value.is_some() {
                        return Err(self.type_mismatch("void", "a return value", *line));
                    }
                    // bogus value; the caller pops it
                    self.emit_op(Opcode::PushB, 0);
                    self.inc_stack();
                } else {
                    let Some(value) = value else {
                        return Err(CompileError::MissingReturn {
                            class: self.class.name.to_string(),
                            line: *line,
                            function: self.function.name.to_string(),
                        });
                    };
                    self.emit_expression_expecting(value, &return_type)?;
                }
                self.emit_op(Opcode::Ret, 0);
                self.dec_stack();
            }
            StmtSrc::Call(call) => {
                self.emit_call(call)?;
                // discard the return value
                self.emit_op(Opcode::Pop, 0);
                self.dec_stack();
            }
            StmtSrc::Assign {
                line,
                variable,
                expression,
            } => {
                let info = self.var_info(variable, *line)?;
                self.emit_expression_expecting(expression, &info.ty)?;
                self.assign_to(&info)?;
            }
        }
        debug_assert_eq!(self.cur_stack, 0);
        Ok(())
    }

    /// Compile the expression and require its type to satisfy the
    /// expected one. Native compatibility holds in either direction of
    /// the subtype relation.
    fn emit_expression_expecting(&mut self, expr: &ExprSrc, expected: &DataType) -> Result<()> {
        let found = self.emit_expression(expr)?;
        if self.types_compatible(expected, &found) {
            return Ok(());
        }
        Err(self.type_mismatch(&expected.to_string(), &found.to_string(), expr.line))
    }

    fn types_compatible(&self, expected: &DataType, found: &DataType) -> bool {
        if expected == found {
            return true;
        }
        match (expected, found) {
            (DataType::Native(want), DataType::Native(have)) => {
                self.decls.is_a(have, want) || self.decls.is_a(want, have)
            }
            _ => false,
        }
    }

    /// Walk the postfix members with a compile-time type stack; the
    /// single remaining entry is the expression's type.
    fn emit_expression(&mut self, expr: &ExprSrc) -> Result<DataType> {
        if expr.members.is_empty() {
            return Err(self.invalid_expression(expr.line));
        }

        let mut types: Vec<DataType> = Vec::new();
        for member in &expr.members {
            match member {
                ExprMember::Call(call) => {
                    let ret = self.emit_call(call)?;
                    types.push(ret);
                }
                ExprMember::Token(token) => match token.kind {
                    TokenKind::Identifier
                    | TokenKind::True
                    | TokenKind::False
                    | TokenKind::IntegerLiteral
                    | TokenKind::FloatLiteral => {
                        let ty = self.push_value(token)?;
                        types.push(ty);
                    }
                    TokenKind::UnaryMinus => {
                        let operand = types
                            .last()
                            .ok_or_else(|| self.invalid_expression(expr.line))?;
                        match operand {
                            DataType::Float => self.emit_op(Opcode::NegF, 0),
                            DataType::Int => self.emit_op(Opcode::NegI, 0),
                            other => {
                                return Err(self.bad_operands("-", &other.to_string(), expr.line))
                            }
                        }
                    }
                    TokenKind::Not => {
                        let operand = types
                            .last()
                            .ok_or_else(|| self.invalid_expression(expr.line))?;
                        if *operand == DataType::Bool {
                            self.emit_op(Opcode::Not, 0);
                        } else {
                            return Err(self.bad_operands("!", &operand.to_string(), expr.line));
                        }
                    }
                    kind if is_binary_operator(kind) => {
                        if types.len() < 2 {
                            return Err(self.invalid_expression(expr.line));
                        }
                        let rhs = types.pop().unwrap_or(DataType::Void);
                        let lhs = types.pop().unwrap_or(DataType::Void);
                        let result = self.emit_binary(kind, &lhs, &rhs, expr.line)?;
                        types.push(result);
                    }
                    _ => return Err(self.invalid_expression(expr.line)),
                },
            }
        }

        if types.len() != 1 {
            return Err(self.invalid_expression(expr.line));
        }
        Ok(types.pop().unwrap_or(DataType::Void))
    }

    /// Emit the typed opcode for one binary operator and report the
    /// result type. Each one consumes two stack values and produces one.
    fn emit_binary(
        &mut self,
        kind: TokenKind,
        lhs: &DataType,
        rhs: &DataType,
        line: u32,
    ) -> Result<DataType> {
        let picked = match kind {
            TokenKind::Divide => {
                arith_variant(lhs, rhs, [Opcode::DivII, Opcode::DivFF, Opcode::DivFI, Opcode::DivIF])
            }
            TokenKind::Multiply => {
                arith_variant(lhs, rhs, [Opcode::MulII, Opcode::MulFF, Opcode::MulFI, Opcode::MulIF])
            }
            TokenKind::Minus => {
                arith_variant(lhs, rhs, [Opcode::SubII, Opcode::SubFF, Opcode::SubFI, Opcode::SubIF])
            }
            TokenKind::Plus => {
                arith_variant(lhs, rhs, [Opcode::AddII, Opcode::AddFF, Opcode::AddFI, Opcode::AddIF])
            }
            TokenKind::Modulo => match (lhs, rhs) {
                (DataType::Int, DataType::Int) => Some((Opcode::Mod, DataType::Int)),
                _ => None,
            },
            TokenKind::Equals | TokenKind::NotEquals => equality_variant(lhs, rhs),
            TokenKind::LtEq => compare_variant(lhs, rhs, [
                Opcode::LtEqII,
                Opcode::LtEqFF,
                Opcode::LtEqFI,
                Opcode::LtEqIF,
            ]),
            TokenKind::Lt => compare_variant(lhs, rhs, [
                Opcode::LtII,
                Opcode::LtFF,
                Opcode::LtFI,
                Opcode::LtIF,
            ]),
            TokenKind::GtEq => compare_variant(lhs, rhs, [
                Opcode::GtEqII,
                Opcode::GtEqFF,
                Opcode::GtEqFI,
                Opcode::GtEqIF,
            ]),
            TokenKind::Gt => compare_variant(lhs, rhs, [
                Opcode::GtII,
                Opcode::GtFF,
                Opcode::GtFI,
                Opcode::GtIF,
            ]),
            TokenKind::And => match (lhs, rhs) {
                (DataType::Bool, DataType::Bool) => Some((Opcode::And, DataType::Bool)),
                _ => None,
            },
            TokenKind::Or => match (lhs, rhs) {
                (DataType::Bool, DataType::Bool) => Some((Opcode::Or, DataType::Bool)),
                _ => None,
            },
            _ => None,
        };

        let Some((op, result)) = picked else {
            return Err(self.bad_operands(
                &kind.to_string(),
                &format!("{lhs} and {rhs}"),
                line,
            ));
        };

        self.emit_op(op, 0);
        // inequality is equality followed by a logical not
        if kind == TokenKind::NotEquals {
            self.emit_op(Opcode::Not, 0);
        }
        self.dec_stack();
        Ok(result)
    }

    /// Push one value token: a literal or a fetched variable.
    fn push_value(&mut self, token: &Token) -> Result<DataType> {
        match token.kind {
            TokenKind::Identifier => {
                let info = self.var_info(&token.spelling, token.line)?;
                let op = fetch_op(info.loc, &info.ty)
                    .ok_or_else(|| self.invalid_expression(token.line))?;
                self.emit_op(op, info.offset as u32);
                self.inc_stack();
                Ok(info.ty)
            }
            TokenKind::True => {
                self.emit_op(Opcode::PushB, 1);
                self.inc_stack();
                Ok(DataType::Bool)
            }
            TokenKind::False => {
                self.emit_op(Opcode::PushB, 0);
                self.inc_stack();
                Ok(DataType::Bool)
            }
            TokenKind::IntegerLiteral => {
                let value: i32 = token.spelling.parse().map_err(|_| {
                    self.parse_error(
                        format!("Invalid integer literal \"{}\".", token.spelling),
                        token.line,
                    )
                })?;
                self.emit_op(Opcode::PushI, 0);
                self.emit_data(value as u32);
                self.inc_stack();
                Ok(DataType::Int)
            }
            TokenKind::FloatLiteral => {
                let value: f32 = token.spelling.parse().map_err(|_| {
                    self.parse_error(
                        format!("Invalid float literal \"{}\".", token.spelling),
                        token.line,
                    )
                })?;
                self.emit_op(Opcode::PushF, 0);
                self.emit_data(value.to_bits());
                self.inc_stack();
                Ok(DataType::Float)
            }
            _ => Err(self.invalid_expression(token.line)),
        }
    }

    /// Emit a whole call expression: the head call plus any chained
    /// continuations threaded through the pushed receiver.
    fn emit_call(&mut self, call: &CallSrc) -> Result<DataType> {
        let mut ret = self.emit_call_single(call, None)?;
        for linked in &call.chain {
            let DataType::Native(receiver_class) = ret else {
                return Err(self.bad_operands(".", &ret.to_string(), linked.line));
            };
            ret = self.emit_call_single(linked, Some(&receiver_class))?;
        }
        Ok(ret)
    }

    #[allow(clippy::too_many_lines)]
    fn emit_call_single(
        &mut self,
        call: &CallSrc,
        pushed_class: Option<&Arc<str>>,
    ) -> Result<DataType> {
        // which class the callee is looked up on
        let target_class: Arc<str> = match (pushed_class, &call.target) {
            (Some(name), _) => name.clone(),
            (None, CallTarget::New) => call.name.as_str().into(),
            (None, CallTarget::Var(var)) => {
                let info = self.var_info(var, call.line)?;
                match info.ty {
                    DataType::Native(name) => name,
                    other => {
                        return Err(self.bad_operands(".", &other.to_string(), call.line));
                    }
                }
            }
            (None, _) => self.class.name.clone(),
        };
        let target_decl = self
            .decls
            .find(&target_class)
            .ok_or_else(|| self.unknown_type(&target_class, call.line))?;

        // arguments go onto the stack left to right
        let mut arg_types = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            arg_types.push(self.emit_expression(arg)?);
        }

        let is_ctor_call =
            pushed_class.is_none() && matches!(call.target, CallTarget::New | CallTarget::BaseConstructor);
        let (fn_idx, callee) = if is_ctor_call {
            let ctor_decl = if call.target == CallTarget::BaseConstructor {
                let super_decl = self
                    .class
                    .super_name
                    .as_deref()
                    .and_then(|name| self.decls.find(name));
                super_decl.ok_or_else(|| self.unknown_function("super", call.line))?
            } else {
                target_decl
            };
            let idx = self
                .decls
                .constructor_index(ctor_decl, &arg_types)
                .ok_or_else(|| self.unknown_function(&ctor_decl.name, call.line))?;
            (idx, &ctor_decl.constructors[idx])
        } else {
            let idx = self
                .decls
                .function_index(target_decl, &call.name)
                .ok_or_else(|| self.unknown_function(&call.name, call.line))?;
            let decl = self
                .decls
                .function_decl(target_decl, idx)
                .ok_or_else(|| self.internal("function index out of range"))?;
            (idx, decl)
        };

        if call.args.len() != callee.params.len() {
            return Err(CompileError::ArityMismatch {
                class: self.class.name.to_string(),
                line: call.line,
                function: call.name.clone(),
            });
        }
        for (param, arg) in callee.params.iter().zip(&arg_types) {
            if !self.types_compatible(&param.ty, arg) {
                return Err(self.type_mismatch(&param.ty.to_string(), &arg.to_string(), call.line));
            }
        }
        let return_type = callee.return_type.clone();

        match (pushed_class, &call.target) {
            (Some(_), _) => {
                // receiver is the previous call's return value
                self.emit_op(Opcode::CallfPushedG, 0);
                self.emit_data(fn_idx as u32);
                self.dec_stack();
            }
            (None, CallTarget::SelfMethod) => {
                self.emit_op(Opcode::CallfSelfG, 0);
                self.emit_data(fn_idx as u32);
            }
            (None, CallTarget::Super) => {
                let super_decl = self
                    .class
                    .super_name
                    .as_deref()
                    .and_then(|name| self.decls.find(name))
                    .ok_or_else(|| self.unknown_function(&call.name, call.line))?;
                if fn_idx >= self.decls.num_functions(super_decl) {
                    return Err(self.unknown_function(&call.name, call.line));
                }
                self.emit_op(Opcode::CallfSuperG, 0);
                self.emit_data(fn_idx as u32);
            }
            (None, CallTarget::BaseConstructor) => {
                self.emit_op(Opcode::CallcSelfSuper, 0);
                self.emit_data(fn_idx as u32);
            }
            (None, CallTarget::Var(var)) => {
                // receiver goes on top, above the arguments
                let token = Token::new(TokenKind::Identifier, var, call.line, 0);
                self.push_value(&token)?;
                self.emit_op(Opcode::CallfPushedG, 0);
                self.emit_data(fn_idx as u32);
                self.dec_stack();
            }
            (None, CallTarget::New) => {
                let name_idx = self.intern_new_class(&target_class);
                self.emit_op(Opcode::New, name_idx);
                self.inc_stack();
                self.emit_op(Opcode::CallcPushedG, 0);
                self.emit_data(fn_idx as u32);
                self.dec_stack();
            }
        }

        // the callee consumes the arguments and pushes its return value
        for _ in 0..call.args.len() {
            self.dec_stack();
        }
        self.inc_stack();

        if call.target == CallTarget::New && pushed_class.is_none() {
            // the call's value is the constructed instance
            return Ok(DataType::Native(target_class));
        }
        Ok(return_type)
    }

    /// Interned index of a `new` target within this function.
    fn intern_new_class(&mut self, name: &Arc<str>) -> u32 {
        if let Some(idx) = self.new_class_names.iter().position(|n| n == name) {
            return idx as u32;
        }
        self.new_class_names.push(name.clone());
        (self.new_class_names.len() - 1) as u32
    }

    /// Resolve an identifier: parameters, then locals, then the class's
    /// effective data.
    fn var_info(&self, name: &str, line: u32) -> Result<VarInfo> {
        for (offset, param) in self.function.params.iter().enumerate() {
            if &*param.name == name {
                return Ok(VarInfo {
                    loc: DataLoc::Param,
                    offset,
                    ty: param.ty.clone(),
                });
            }
        }
        for (offset, local) in self.locals.iter().enumerate() {
            if &*local.name == name {
                return Ok(VarInfo {
                    loc: DataLoc::Local,
                    offset,
                    ty: local.ty.clone(),
                });
            }
        }
        for offset in 0..self.decls.num_data(self.class) {
            if let Some(data) = self.decls.data_decl(self.class, offset) {
                if &*data.name == name {
                    return Ok(VarInfo {
                        loc: DataLoc::Script,
                        offset,
                        ty: data.ty.clone(),
                    });
                }
            }
        }
        Err(CompileError::UnknownVariable {
            class: self.class.name.to_string(),
            line,
            variable: name.to_string(),
        })
    }

    /// Pop the stack top into the resolved variable.
    fn assign_to(&mut self, info: &VarInfo) -> Result<()> {
        let op = store_op(info.loc, &info.ty)
            .ok_or_else(|| self.internal("store into a void slot"))?;
        self.emit_op(op, info.offset as u32);
        self.dec_stack();
        Ok(())
    }

    fn emit_op(&mut self, op: Opcode, operand: u32) {
        self.code.push(pack(op, operand));
        self.last_op = Some(op);
    }

    fn emit_data(&mut self, word: Word) {
        self.code.push(word);
    }

    /// Reserve a slot for a forward jump; patched once the target is
    /// known.
    fn emit_placeholder(&mut self) -> usize {
        self.code.push(pack(Opcode::Invalid, 0));
        self.code.len() - 1
    }

    fn patch(&mut self, pos: usize, op: Opcode, target: u32) {
        self.code[pos] = pack(op, target);
    }

    fn inc_stack(&mut self) {
        self.cur_stack += 1;
        self.max_stack = self.max_stack.max(self.cur_stack);
    }

    fn dec_stack(&mut self) {
        debug_assert!(self.cur_stack > 0, "compile-time stack underflow");
        self.cur_stack -= 1;
    }

    fn parse_error(&self, message: String, line: u32) -> CompileError {
        CompileError::Parse {
            class: self.class.name.to_string(),
            line,
            message,
        }
    }

    fn invalid_expression(&self, line: u32) -> CompileError {
        self.parse_error("Invalid expression.".into(), line)
    }

    fn unknown_type(&self, type_name: &str, line: u32) -> CompileError {
        CompileError::UnknownType {
            class: self.class.name.to_string(),
            line,
            type_name: type_name.to_string(),
        }
    }

    fn unknown_function(&self, function: &str, line: u32) -> CompileError {
        CompileError::UnknownFunction {
            class: self.class.name.to_string(),
            line,
            function: function.to_string(),
        }
    }

    fn type_mismatch(&self, expected: &str, found: &str, line: u32) -> CompileError {
        CompileError::TypeMismatch {
            class: self.class.name.to_string(),
            line,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    fn bad_operands(&self, operator: &str, operands: &str, line: u32) -> CompileError {
        CompileError::BadOperandTypes {
            class: self.class.name.to_string(),
            line,
            operator: operator.to_string(),
            operands: operands.to_string(),
        }
    }

    fn internal(&self, message: &str) -> CompileError {
        CompileError::Internal(format!("{message} in class {}", self.class.name))
    }
}

const fn is_binary_operator(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Divide
            | TokenKind::Multiply
            | TokenKind::Minus
            | TokenKind::Plus
            | TokenKind::Modulo
            | TokenKind::Equals
            | TokenKind::NotEquals
            | TokenKind::LtEq
            | TokenKind::Lt
            | TokenKind::GtEq
            | TokenKind::Gt
            | TokenKind::And
            | TokenKind::Or
    )
}

/// Pick the `[II, FF, FI, IF]` arithmetic variant; the result is float
/// unless both operands are int.
fn arith_variant(lhs: &DataType, rhs: &DataType, ops: [Opcode; 4]) -> Option<(Opcode, DataType)> {
    match (lhs, rhs) {
        (DataType::Int, DataType::Int) => Some((ops[0], DataType::Int)),
        (DataType::Float, DataType::Float) => Some((ops[1], DataType::Float)),
        (DataType::Float, DataType::Int) => Some((ops[2], DataType::Float)),
        (DataType::Int, DataType::Float) => Some((ops[3], DataType::Float)),
        _ => None,
    }
}

fn compare_variant(
    lhs: &DataType,
    rhs: &DataType,
    ops: [Opcode; 4],
) -> Option<(Opcode, DataType)> {
    match (lhs, rhs) {
        (DataType::Int, DataType::Int) => Some((ops[0], DataType::Bool)),
        (DataType::Float, DataType::Float) => Some((ops[1], DataType::Bool)),
        (DataType::Float, DataType::Int) => Some((ops[2], DataType::Bool)),
        (DataType::Int, DataType::Float) => Some((ops[3], DataType::Bool)),
        _ => None,
    }
}

fn equality_variant(lhs: &DataType, rhs: &DataType) -> Option<(Opcode, DataType)> {
    match (lhs, rhs) {
        (DataType::Int, DataType::Int) => Some((Opcode::EqII, DataType::Bool)),
        (DataType::Float, DataType::Float) => Some((Opcode::EqFF, DataType::Bool)),
        (DataType::Float, DataType::Int) => Some((Opcode::EqFI, DataType::Bool)),
        (DataType::Int, DataType::Float) => Some((Opcode::EqIF, DataType::Bool)),
        (DataType::Bool, DataType::Bool) => Some((Opcode::EqBB, DataType::Bool)),
        _ => None,
    }
}

const fn fetch_op(loc: DataLoc, ty: &DataType) -> Option<Opcode> {
    match (loc, ty) {
        (DataLoc::Script, DataType::Float) => Some(Opcode::FetchSF),
        (DataLoc::Script, DataType::Int) => Some(Opcode::FetchSI),
        (DataLoc::Script, DataType::Bool) => Some(Opcode::FetchSB),
        (DataLoc::Script, DataType::Native(_)) => Some(Opcode::FetchSN),
        (DataLoc::Local, DataType::Float) => Some(Opcode::FetchLF),
        (DataLoc::Local, DataType::Int) => Some(Opcode::FetchLI),
        (DataLoc::Local, DataType::Bool) => Some(Opcode::FetchLB),
        (DataLoc::Local, DataType::Native(_)) => Some(Opcode::FetchLN),
        (DataLoc::Param, DataType::Float) => Some(Opcode::FetchPF),
        (DataLoc::Param, DataType::Int) => Some(Opcode::FetchPI),
        (DataLoc::Param, DataType::Bool) => Some(Opcode::FetchPB),
        (DataLoc::Param, DataType::Native(_)) => Some(Opcode::FetchPN),
        (_, DataType::Void) => None,
    }
}

const fn store_op(loc: DataLoc, ty: &DataType) -> Option<Opcode> {
    match (loc, ty) {
        (DataLoc::Script, DataType::Float) => Some(Opcode::StoreSF),
        (DataLoc::Script, DataType::Int) => Some(Opcode::StoreSI),
        (DataLoc::Script, DataType::Bool) => Some(Opcode::StoreSB),
        (DataLoc::Script, DataType::Native(_)) => Some(Opcode::StoreSN),
        (DataLoc::Local, DataType::Float) => Some(Opcode::StoreLF),
        (DataLoc::Local, DataType::Int) => Some(Opcode::StoreLI),
        (DataLoc::Local, DataType::Bool) => Some(Opcode::StoreLB),
        (DataLoc::Local, DataType::Native(_)) => Some(Opcode::StoreLN),
        (DataLoc::Param, DataType::Float) => Some(Opcode::StorePF),
        (DataLoc::Param, DataType::Int) => Some(Opcode::StorePI),
        (DataLoc::Param, DataType::Bool) => Some(Opcode::StorePB),
        (DataLoc::Param, DataType::Native(_)) => Some(Opcode::StorePN),
        (_, DataType::Void) => None,
    }
}
