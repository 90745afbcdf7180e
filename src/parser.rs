use crate::ast::{
    CallSrc, CallTarget, DataSrc, ExprMember, ExprSrc, FunctionSrc, ParamSrc, ScriptSrc, StmtSrc,
};
use crate::error::{CompileError, Result};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Recursive-descent parser from a token stream to a [`ScriptSrc`].
///
/// Lookahead skips interleaved comment tokens; the skipped comments are
/// collected and attached to the next class, data, or function
/// declaration. The parser performs no recovery: the first mismatch
/// aborts with a [`CompileError::Parse`].
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    prev: Token,
    comments: Vec<String>,
    class_name: String,
}

impl Parser {
    /// Parse one `.ds` source file.
    pub fn parse(source: &str) -> Result<ScriptSrc> {
        let tokens = Lexer::tokenize(source);
        if let Some(bad) = tokens.iter().find(|t| t.kind == TokenKind::Error) {
            return Err(CompileError::Parse {
                class: String::new(),
                line: bad.line,
                message: format!("Invalid token encountered \"{}\".", bad.spelling),
            });
        }

        let mut parser = Self {
            tokens,
            pos: 0,
            prev: Token::new(TokenKind::Error, "", 0, 0),
            comments: Vec::new(),
            class_name: String::new(),
        };
        parser.skip_comments();
        parser.parse_script()
    }

    fn skip_comments(&mut self) {
        while let Some(token) = self.tokens.get(self.pos) {
            if !token.kind.is_comment() {
                break;
            }
            self.comments.push(token.spelling.to_string());
            self.pos += 1;
        }
    }

    fn cur(&self) -> Token {
        self.tokens
            .get(self.pos)
            .cloned()
            .unwrap_or_else(|| Token::new(TokenKind::Error, "", 0, 0))
    }

    /// The nth non-comment token after the current one.
    fn peek(&self, n: usize) -> Token {
        let mut idx = self.pos;
        let mut remaining = n;
        while remaining > 0 {
            idx += 1;
            match self.tokens.get(idx) {
                Some(token) if token.kind.is_comment() => {}
                Some(_) => remaining -= 1,
                None => return Token::new(TokenKind::Error, "", 0, 0),
            }
        }
        self.tokens
            .get(idx)
            .cloned()
            .unwrap_or_else(|| Token::new(TokenKind::Error, "", 0, 0))
    }

    fn accept(&mut self, kind: TokenKind) -> Result<()> {
        let cur = self.cur();
        if cur.kind == kind {
            self.prev = cur;
            self.pos += 1;
            self.skip_comments();
            Ok(())
        } else {
            Err(self.parse_err(
                cur.line,
                format!(
                    "Expected token of type \"{kind}\", but encountered \"{}\".",
                    cur.spelling
                ),
            ))
        }
    }

    fn parse_err(&self, line: u32, message: String) -> CompileError {
        CompileError::Parse {
            class: self.class_name.clone(),
            line,
            message,
        }
    }

    /// Raw token distance from the current position to the next token of
    /// the given kind. Used to tell a field from a method heading.
    fn dist_to(&self, kind: TokenKind) -> usize {
        self.tokens[self.pos..]
            .iter()
            .take_while(|t| t.kind != kind)
            .count()
    }

    fn take_comments(&mut self) -> Vec<String> {
        std::mem::take(&mut self.comments)
    }

    /// `Ident ('.' Ident)*`, joined with dots.
    fn parse_class_name(&mut self) -> Result<String> {
        self.accept(TokenKind::Identifier)?;
        let mut name = self.prev.spelling.to_string();
        while self.cur().kind == TokenKind::Dot {
            self.accept(TokenKind::Dot)?;
            self.accept(TokenKind::Identifier)?;
            name.push('.');
            name.push_str(&self.prev.spelling);
        }
        Ok(name)
    }

    fn parse_script(&mut self) -> Result<ScriptSrc> {
        let mut script = ScriptSrc::default();

        while self.cur().kind == TokenKind::Import {
            self.comments.clear();
            self.accept(TokenKind::Import)?;
            let import = self.parse_class_name()?;
            script.imports.push(import);
            self.accept(TokenKind::Semicolon)?;
        }

        script.comments = self.take_comments();

        if self.cur().kind == TokenKind::Native {
            self.accept(TokenKind::Native)?;
            script.native = true;
        }

        self.accept(TokenKind::Class)?;
        script.line = self.prev.line;
        script.name = self.parse_class_name()?;
        self.class_name.clone_from(&script.name);

        if self.cur().kind == TokenKind::Extends {
            self.accept(TokenKind::Extends)?;
            script.super_name = self.parse_class_name()?;
        }

        self.comments.clear();
        self.accept(TokenKind::OpenCurly)?;

        while self.cur().kind != TokenKind::CloseCurly {
            // a field declaration reaches a ';' before any '('
            if self.dist_to(TokenKind::Semicolon) <= self.dist_to(TokenKind::OpenBracket) {
                let data = self.parse_class_data()?;
                script.data.push(data);
            } else {
                let function = self.parse_function(&script)?;
                if function.constructor {
                    script.constructors.push(function);
                } else {
                    script.functions.push(function);
                }
            }
        }

        self.accept(TokenKind::CloseCurly)?;
        self.accept(TokenKind::Semicolon)?;

        Ok(script)
    }

    fn parse_class_data(&mut self) -> Result<DataSrc> {
        let line = self.cur().line;
        let comments = self.take_comments();
        let type_name = self.parse_class_name()?;
        self.accept(TokenKind::Identifier)?;
        let name = self.prev.spelling.to_string();

        self.comments.clear();
        self.accept(TokenKind::Semicolon)?;

        Ok(DataSrc {
            type_name,
            name,
            line,
            comments,
            init: None,
        })
    }

    fn parse_local_data(&mut self) -> Result<DataSrc> {
        let line = self.cur().line;
        let comments = self.take_comments();
        let type_name = self.parse_class_name()?;
        self.accept(TokenKind::Identifier)?;
        let name = self.prev.spelling.to_string();

        let init = if self.cur().kind == TokenKind::Assign {
            self.accept(TokenKind::Assign)?;
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.comments.clear();
        self.accept(TokenKind::Semicolon)?;

        Ok(DataSrc {
            type_name,
            name,
            line,
            comments,
            init,
        })
    }

    fn parse_function(&mut self, script: &ScriptSrc) -> Result<FunctionSrc> {
        let mut function = FunctionSrc {
            line: self.cur().line,
            comments: self.take_comments(),
            ..FunctionSrc::default()
        };

        let return_type = self.parse_class_name()?;
        if self.cur().kind == TokenKind::OpenBracket {
            // the heading names the enclosing class: a constructor
            if return_type != script.name {
                return Err(self.parse_err(self.cur().line, "No return value specified.".into()));
            }
            function.return_type = "void".into();
            function.name = return_type;
            function.constructor = true;
        } else {
            function.return_type = return_type;
            self.accept(TokenKind::Identifier)?;
            function.name = self.prev.spelling.to_string();
        }

        self.accept(TokenKind::OpenBracket)?;
        while self.cur().kind != TokenKind::CloseBracket {
            if !function.params.is_empty() {
                self.accept(TokenKind::Comma)?;
            }
            let type_name = self.parse_class_name()?;
            self.accept(TokenKind::Identifier)?;
            function.params.push(ParamSrc {
                type_name,
                name: self.prev.spelling.to_string(),
                line: self.prev.line,
            });
        }
        self.accept(TokenKind::CloseBracket)?;

        // a bare ';' heading is a native function, legal only in a
        // native class
        if self.cur().kind == TokenKind::Semicolon {
            if !script.native {
                return Err(self.parse_err(
                    self.cur().line,
                    format!(
                        "Native function \"{}\" found in non-native class.",
                        function.name
                    ),
                ));
            }
            self.comments.clear();
            self.accept(TokenKind::Semicolon)?;
            function.native = true;
            return Ok(function);
        }

        self.accept(TokenKind::OpenCurly)?;

        if self.cur().kind != TokenKind::CloseCurly {
            while self.is_local_data() {
                let local = self.parse_local_data()?;
                function.locals.push(local);
            }

            if function.constructor && !script.super_name.is_empty() {
                if self.cur().kind != TokenKind::Super {
                    return Err(CompileError::MissingSuperCall {
                        class: self.class_name.clone(),
                        line: self.cur().line,
                    });
                }
                let call = self.parse_function_call()?;
                if call.target != CallTarget::BaseConstructor {
                    return Err(CompileError::MissingSuperCall {
                        class: self.class_name.clone(),
                        line: call.line,
                    });
                }
                self.accept(TokenKind::Semicolon)?;
                function.base_call = Some(call);
            }

            while self.cur().kind != TokenKind::CloseCurly {
                let statement = self.parse_statement()?;
                function.body.push(statement);
            }
        }

        self.comments.clear();
        self.accept(TokenKind::CloseCurly)?;

        Ok(function)
    }

    fn parse_statement(&mut self) -> Result<StmtSrc> {
        let line = self.cur().line;

        match self.cur().kind {
            TokenKind::While => {
                self.accept(TokenKind::While)?;
                self.accept(TokenKind::OpenBracket)?;
                let condition = self.parse_expression()?;
                self.accept(TokenKind::CloseBracket)?;
                let body = self.parse_statement()?;
                Ok(StmtSrc::While {
                    line,
                    condition,
                    body: Box::new(body),
                })
            }
            TokenKind::If => {
                self.accept(TokenKind::If)?;
                self.accept(TokenKind::OpenBracket)?;
                let condition = self.parse_expression()?;
                self.accept(TokenKind::CloseBracket)?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.cur().kind == TokenKind::Else {
                    self.accept(TokenKind::Else)?;
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(StmtSrc::If {
                    line,
                    condition,
                    then_branch,
                    else_branch,
                })
            }
            TokenKind::Return => {
                self.accept(TokenKind::Return)?;
                let value = if self.cur().kind == TokenKind::Semicolon {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.accept(TokenKind::Semicolon)?;
                Ok(StmtSrc::Return { line, value })
            }
            TokenKind::OpenCurly => {
                self.accept(TokenKind::OpenCurly)?;
                let mut statements = Vec::new();
                while self.cur().kind != TokenKind::CloseCurly {
                    statements.push(self.parse_statement()?);
                }
                self.accept(TokenKind::CloseCurly)?;
                Ok(StmtSrc::Block(statements))
            }
            TokenKind::Super | TokenKind::New => {
                let call = self.parse_call_with_chain()?;
                self.accept(TokenKind::Semicolon)?;
                Ok(StmtSrc::Call(call))
            }
            TokenKind::Identifier => match self.peek(1).kind {
                TokenKind::Dot | TokenKind::OpenBracket => {
                    let call = self.parse_call_with_chain()?;
                    self.accept(TokenKind::Semicolon)?;
                    Ok(StmtSrc::Call(call))
                }
                TokenKind::Assign => {
                    self.accept(TokenKind::Identifier)?;
                    let variable = self.prev.spelling.to_string();
                    self.accept(TokenKind::Assign)?;
                    let expression = self.parse_expression()?;
                    self.accept(TokenKind::Semicolon)?;
                    Ok(StmtSrc::Assign {
                        line,
                        variable,
                        expression,
                    })
                }
                _ => Err(self.parse_err(line, "Invalid statement.".into())),
            },
            _ => Err(self.parse_err(line, "Invalid statement.".into())),
        }
    }

    /// Operator-precedence shunting yard into a postfix member list.
    /// Commas and semicolons terminate the expression without being
    /// consumed; a close bracket with an empty operator stack belongs to
    /// the caller.
    fn parse_expression(&mut self) -> Result<ExprSrc> {
        let mut expr = ExprSrc {
            line: self.cur().line,
            members: Vec::new(),
        };
        let mut stack: Vec<Token> = Vec::new();

        loop {
            let cur = self.cur();
            match cur.kind {
                TokenKind::Semicolon | TokenKind::Comma => {
                    while let Some(op) = stack.pop() {
                        expr.members.push(ExprMember::Token(op));
                    }
                    return Ok(expr);
                }
                TokenKind::Eof | TokenKind::Error => {
                    return Err(self.parse_err(
                        expr.line,
                        "Unexpected end of file while parsing an expression.".into(),
                    ));
                }
                _ if self.is_function_call() => {
                    let call = self.parse_call_with_chain()?;
                    expr.members.push(ExprMember::Call(call));
                }
                TokenKind::CloseBracket => {
                    if stack.is_empty() {
                        // this ')' closes the surrounding call
                        return Ok(expr);
                    }
                    loop {
                        match stack.pop() {
                            Some(op) if op.kind == TokenKind::OpenBracket => break,
                            Some(op) => expr.members.push(ExprMember::Token(op)),
                            None => return Ok(expr),
                        }
                    }
                    self.accept(TokenKind::CloseBracket)?;
                }
                TokenKind::OpenBracket => {
                    stack.push(cur);
                    self.accept(TokenKind::OpenBracket)?;
                }
                kind if operator_priority(kind).is_some() => {
                    let priority = operator_priority(kind).unwrap_or_default();
                    while let Some(top) = stack.last() {
                        let top_priority = operator_priority(top.kind).unwrap_or_default();
                        if priority <= top_priority {
                            let Some(op) = stack.pop() else { break };
                            expr.members.push(ExprMember::Token(op));
                        } else {
                            break;
                        }
                    }
                    stack.push(cur.clone());
                    self.accept(cur.kind)?;
                }
                _ => {
                    expr.members.push(ExprMember::Token(cur.clone()));
                    self.accept(cur.kind)?;
                }
            }
        }
    }

    /// A call followed by any number of `.name(args)` continuations on
    /// its result.
    fn parse_call_with_chain(&mut self) -> Result<CallSrc> {
        let mut call = self.parse_function_call()?;
        while self.cur().kind == TokenKind::Dot {
            self.accept(TokenKind::Dot)?;
            let chained = self.parse_function_call()?;
            call.chain.push(chained);
        }
        Ok(call)
    }

    fn parse_function_call(&mut self) -> Result<CallSrc> {
        let line = self.cur().line;
        let mut target = CallTarget::SelfMethod;

        let name = if self.cur().kind == TokenKind::Super {
            self.accept(TokenKind::Super)?;
            if self.cur().kind == TokenKind::Dot {
                self.accept(TokenKind::Dot)?;
                target = CallTarget::Super;
                self.accept(TokenKind::Identifier)?;
                self.prev.spelling.to_string()
            } else {
                target = CallTarget::BaseConstructor;
                "super".to_string()
            }
        } else if self.cur().kind == TokenKind::Identifier && self.peek(1).kind == TokenKind::Dot {
            self.accept(TokenKind::Identifier)?;
            target = CallTarget::Var(self.prev.spelling.to_string());
            self.accept(TokenKind::Dot)?;
            self.accept(TokenKind::Identifier)?;
            self.prev.spelling.to_string()
        } else if self.cur().kind == TokenKind::New {
            self.accept(TokenKind::New)?;
            target = CallTarget::New;
            self.parse_class_name()?
        } else {
            self.accept(TokenKind::Identifier)?;
            self.prev.spelling.to_string()
        };

        self.accept(TokenKind::OpenBracket)?;
        let mut args = Vec::new();
        while self.cur().kind != TokenKind::CloseBracket {
            args.push(self.parse_expression()?);
            if self.cur().kind != TokenKind::CloseBracket {
                self.accept(TokenKind::Comma)?;
            }
        }
        self.accept(TokenKind::CloseBracket)?;

        Ok(CallSrc {
            target,
            name,
            line,
            args,
            chain: Vec::new(),
        })
    }

    fn is_function_call(&self) -> bool {
        let kind = |n| self.peek(n).kind;
        (self.cur().kind == TokenKind::Identifier && kind(1) == TokenKind::OpenBracket)
            || (self.cur().kind == TokenKind::Identifier
                && kind(1) == TokenKind::Dot
                && kind(2) == TokenKind::Identifier
                && kind(3) == TokenKind::OpenBracket)
            || (self.cur().kind == TokenKind::Super
                && kind(1) == TokenKind::Dot
                && kind(2) == TokenKind::Identifier
                && kind(3) == TokenKind::OpenBracket)
            || (self.cur().kind == TokenKind::Super && kind(1) == TokenKind::OpenBracket)
            || self.cur().kind == TokenKind::New
    }

    /// Does the body continue with `TypeName name (';' | '=')`? Scanned
    /// over raw tokens; the first statement ends local-declaration
    /// territory.
    fn is_local_data(&self) -> bool {
        let kind_at = |idx: usize| self.tokens.get(idx).map(|t| t.kind);
        let mut idx = self.pos;

        // dotted type name
        if kind_at(idx) != Some(TokenKind::Identifier) {
            return false;
        }
        idx += 1;
        while kind_at(idx) == Some(TokenKind::Dot) {
            idx += 1;
            if kind_at(idx) != Some(TokenKind::Identifier) {
                return false;
            }
            idx += 1;
        }

        // variable name, then either no initializer or an initializer
        if kind_at(idx) != Some(TokenKind::Identifier) {
            return false;
        }
        idx += 1;
        matches!(
            kind_at(idx),
            Some(TokenKind::Semicolon | TokenKind::Assign)
        )
    }
}

/// Ascending binding strength; the open bracket is a floor marker on the
/// operator stack.
const fn operator_priority(kind: TokenKind) -> Option<u32> {
    match kind {
        TokenKind::OpenBracket => Some(0),
        TokenKind::Or => Some(1),
        TokenKind::And => Some(2),
        TokenKind::Lt => Some(3),
        TokenKind::LtEq => Some(4),
        TokenKind::Gt => Some(5),
        TokenKind::GtEq => Some(6),
        TokenKind::Equals => Some(7),
        TokenKind::NotEquals => Some(8),
        TokenKind::Plus => Some(9),
        TokenKind::Minus => Some(10),
        TokenKind::Modulo => Some(11),
        TokenKind::Multiply => Some(12),
        TokenKind::Divide => Some(13),
        TokenKind::UnaryMinus => Some(14),
        TokenKind::Not => Some(15),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postfix_kinds(body: &str) -> Vec<String> {
        let source = format!("class T {{ int f() {{ return {body}; }} }};");
        let script = Parser::parse(&source).unwrap();
        let StmtSrc::Return {
            value: Some(expr), ..
        } = &script.functions[0].body[0]
        else {
            panic!("expected return statement");
        };
        expr.members
            .iter()
            .map(|m| match m {
                ExprMember::Token(t) => t.spelling.to_string(),
                ExprMember::Call(c) => format!("{}()", c.name),
            })
            .collect()
    }

    #[test]
    fn field_and_method_members() {
        let script = Parser::parse(
            "class C { int count; float scale; int get() { return count; } };",
        )
        .unwrap();
        assert_eq!(script.name, "C");
        assert_eq!(script.data.len(), 2);
        assert_eq!(script.data[0].name, "count");
        assert_eq!(script.functions.len(), 1);
        assert!(script.constructors.is_empty());
    }

    #[test]
    fn imports_and_dotted_names() {
        let script =
            Parser::parse("import game.Actor;\nclass game.Player extends game.Actor { };")
                .unwrap();
        assert_eq!(script.imports, vec!["game.Actor".to_string()]);
        assert_eq!(script.name, "game.Player");
        assert_eq!(script.super_name, "game.Actor");
    }

    #[test]
    fn constructor_is_detected_by_name() {
        let script = Parser::parse("class C { C(int x) { } int x_; };").unwrap();
        assert_eq!(script.constructors.len(), 1);
        assert!(script.constructors[0].constructor);
        assert_eq!(script.constructors[0].return_type, "void");
        assert_eq!(script.constructors[0].params.len(), 1);
    }

    #[test]
    fn precedence_orders_postfix() {
        assert_eq!(postfix_kinds("3 + 4 * 2"), vec!["3", "4", "2", "*", "+"]);
        assert_eq!(postfix_kinds("(3 + 4) * 2"), vec!["3", "4", "+", "2", "*"]);
        assert_eq!(
            postfix_kinds("a < b && c < d"),
            vec!["a", "b", "<", "c", "d", "<", "&&"]
        );
    }

    #[test]
    fn calls_in_expressions() {
        assert_eq!(postfix_kinds("get() + 1"), vec!["get()", "1", "+"]);
    }

    #[test]
    fn chained_calls_flatten() {
        let script =
            Parser::parse("class C { void f() { a.b().c().d(); } };").unwrap();
        let StmtSrc::Call(call) = &script.functions[0].body[0] else {
            panic!("expected call statement");
        };
        assert_eq!(call.target, CallTarget::Var("a".into()));
        assert_eq!(call.name, "b");
        assert_eq!(
            call.chain.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["c", "d"]
        );
    }

    #[test]
    fn locals_then_statements() {
        let script = Parser::parse(
            "class C { int f(int n) { int i; int s = 0; i = 0; return s; } };",
        )
        .unwrap();
        let function = &script.functions[0];
        assert_eq!(function.locals.len(), 2);
        assert!(function.locals[1].init.is_some());
        assert_eq!(function.body.len(), 2);
    }

    #[test]
    fn derived_constructor_requires_super_call() {
        let script =
            Parser::parse("class B extends A { B(int y) { super(y); y_ = y; } int y_; };")
                .unwrap();
        let ctor = &script.constructors[0];
        assert!(ctor.base_call.is_some());
        assert_eq!(ctor.base_call.as_ref().unwrap().args.len(), 1);

        let err = Parser::parse("class B extends A { B(int y) { y_ = y; } int y_; };")
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingSuperCall { .. }));
    }

    #[test]
    fn native_method_heading_needs_native_class() {
        assert!(Parser::parse("native class A { A(int x); int x_; };").is_ok());
        let err = Parser::parse("class A { int f(); };").unwrap_err();
        assert!(matches!(err, CompileError::Parse { .. }));
    }

    #[test]
    fn mismatch_reports_expected_and_found() {
        let err = Parser::parse("class C { int f() { return 1; } }").unwrap_err();
        let CompileError::Parse { message, .. } = &err else {
            panic!("expected parse error");
        };
        assert!(message.contains("Expected token"));
    }

    #[test]
    fn comments_attach_to_next_declaration() {
        let script = Parser::parse(
            "// the class\nclass C { // the field\nint x; };",
        )
        .unwrap();
        assert_eq!(script.comments, vec![" the class".to_string()]);
        assert_eq!(script.data[0].comments, vec![" the field".to_string()]);
    }
}
