use std::collections::HashSet;
use std::sync::Arc;

use craftscript_core::functions::ParamType;
use craftscript_core::result::SourceLocation;
use craftscript_core::selector::{Axis, SelTerm, Selector};

use crate::ast::*;
use crate::error::SyntaxError;
use crate::grammar::{tokenize, Located, Token};

struct Parser {
    tokens: Vec<Located>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Located>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .or_else(|| self.tokens.last())
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn loc(&self) -> SourceLocation {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.loc)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == expected
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.loc(), message)
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<SourceLocation, SyntaxError> {
        let loc = self.loc();
        if self.check(&expected) {
            self.advance();
            Ok(loc)
        } else {
            Err(self.error(format!("expected {}, found {}", what, self.peek().describe())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            Token::Axis { text, .. } => Err(self.error(format!(
                "'{}' is a selector term and cannot be used as {}",
                text, what
            ))),
            other => Err(self.error(format!("expected {}, found {}", what, other.describe()))),
        }
    }

    fn parse_program(&mut self) -> Result<Program, SyntaxError> {
        let statements = self.parse_statements(None)?;
        Ok(Program { statements })
    }

    /// Parses statements until `}` (when `open` is the brace location) or end of input.
    fn parse_statements(&mut self, open: Option<SourceLocation>) -> Result<Vec<Statement>, SyntaxError> {
        let mut statements = Vec::new();
        let mut macros = HashSet::new();
        loop {
            match (self.peek(), open) {
                (Token::Eof, Some(brace)) => {
                    return Err(SyntaxError::new(brace, "unclosed '{'"));
                }
                (Token::Eof, None) => break,
                (Token::RBrace, Some(_)) => break,
                (Token::RBrace, None) => return Err(self.error("unexpected '}'")),
                _ => {}
            }
            let stmt = self.parse_statement()?;
            if let Statement::Macro(decl) = &stmt {
                if !macros.insert(decl.name.clone()) {
                    return Err(SyntaxError::new(
                        decl.loc,
                        format!("macro '{}' is already declared in this scope", decl.name),
                    ));
                }
            }
            statements.push(stmt);
        }
        Ok(statements)
    }

    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        let loc = self.expect(Token::LBrace, "'{'")?;
        let statements = self.parse_statements(Some(loc))?;
        self.expect(Token::RBrace, "'}'")?;
        Ok(Block { statements, loc })
    }

    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        let loc = self.loc();
        match self.peek().clone() {
            Token::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            Token::LBrace => Ok(Statement::Block(self.parse_block()?)),
            Token::Macro => self.parse_macro(loc),
            Token::If => self.parse_if(loc),
            Token::Repeat => self.parse_repeat(loc),
            Token::While => {
                self.advance();
                self.expect(Token::LParen, "'(' after while")?;
                let test = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                let body = self.parse_block()?;
                Ok(Statement::While { test, body, loc })
            }
            Token::Assert => {
                self.advance();
                self.expect(Token::LParen, "'(' after assert")?;
                let test = self.parse_expr()?;
                let message = if self.eat(&Token::Comma) {
                    match self.advance() {
                        Token::Str(s) => Some(s),
                        other => {
                            return Err(SyntaxError::new(
                                self.tokens[self.pos - 1].loc,
                                format!("expected assertion message string, found {}", other.describe()),
                            ))
                        }
                    }
                } else {
                    None
                };
                self.expect(Token::RParen, "')'")?;
                self.expect(Token::Semicolon, "';'")?;
                Ok(Statement::Assert { test, message, loc })
            }
            Token::Let => {
                self.advance();
                let name = self.expect_ident("a variable name")?;
                self.expect(Token::Assign, "'='")?;
                let value = self.parse_expr()?;
                self.expect(Token::Semicolon, "';'")?;
                Ok(Statement::Let { name, value, loc })
            }
            Token::Ident(name) => {
                self.advance();
                match self.peek() {
                    Token::Assign => {
                        self.advance();
                        let value = self.parse_expr()?;
                        self.expect(Token::Semicolon, "';'")?;
                        Ok(Statement::Assign { name, value, loc })
                    }
                    Token::LParen => {
                        self.advance();
                        let args = self.parse_args()?;
                        self.expect(Token::Semicolon, "';' after command")?;
                        Ok(Statement::Command(CommandStmt { name, args, loc }))
                    }
                    other => Err(self.error(format!(
                        "expected '(' or '=' after '{}', found {}",
                        name,
                        other.describe()
                    ))),
                }
            }
            Token::Else => Err(self.error("'else' without matching 'if'")),
            other => Err(self.error(format!("unexpected {}", other.describe()))),
        }
    }

    fn parse_macro(&mut self, loc: SourceLocation) -> Result<Statement, SyntaxError> {
        self.advance();
        let name = self.expect_ident("a macro name")?;
        self.expect(Token::LParen, "'(' after macro name")?;
        let mut params: Vec<Param> = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let ty_loc = self.loc();
                let ty_name = self.expect_ident("a parameter type")?;
                let ty = ParamType::from_name(&ty_name).ok_or_else(|| {
                    SyntaxError::new(
                        ty_loc,
                        format!("unknown parameter type '{}' (expected int, bool or string)", ty_name),
                    )
                })?;
                let param_loc = self.loc();
                let param_name = self.expect_ident("a parameter name")?;
                if params.iter().any(|p| p.name == param_name) {
                    return Err(SyntaxError::new(
                        param_loc,
                        format!("duplicate parameter '{}'", param_name),
                    ));
                }
                params.push(Param { name: param_name, ty });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen, "')'")?;
        let body = self.parse_block()?;
        Ok(Statement::Macro(Arc::new(MacroDecl { name, params, body, loc })))
    }

    fn parse_if(&mut self, loc: SourceLocation) -> Result<Statement, SyntaxError> {
        self.advance();
        self.expect(Token::LParen, "'(' after if")?;
        let test = self.parse_expr()?;
        self.expect(Token::RParen, "')'")?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                let nested_loc = self.loc();
                let nested = self.parse_if(nested_loc)?;
                Some(Block {
                    statements: vec![nested],
                    loc: nested_loc,
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Statement::If { test, then_block, else_block, loc })
    }

    fn parse_repeat(&mut self, loc: SourceLocation) -> Result<Statement, SyntaxError> {
        self.advance();
        self.expect(Token::LParen, "'(' after repeat")?;
        let binds_var = matches!(self.peek_at(1), Token::Colon);
        let kind = match (self.peek().clone(), binds_var) {
            (Token::Ident(var), true) => {
                let start_loc = self.loc();
                self.advance();
                self.advance();
                let end = self.parse_expr()?;
                RepeatKind::Range {
                    var,
                    start: Expr::new(ExprKind::Int(0), start_loc),
                    end,
                    step: None,
                }
            }
            (Token::Axis { text, .. }, true) => {
                return Err(self.error(format!(
                    "'{}' is a selector term and cannot be used as a loop variable",
                    text
                )))
            }
            _ => RepeatKind::Count(self.parse_expr()?),
        };
        self.expect(Token::RParen, "')'")?;
        let body = self.parse_block()?;
        Ok(Statement::Repeat { kind, body, loc })
    }

    /// Parses call arguments after `(` up to and including `)`.
    fn parse_args(&mut self) -> Result<Vec<Arg>, SyntaxError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            let key = match (self.peek(), self.peek_at(1)) {
                (Token::Ident(name), Token::Colon) => Some(name.clone()),
                (Token::Axis { text, .. }, Token::Colon) => Some(text.clone()),
                _ => None,
            };
            match key {
                Some(name) => {
                    self.advance();
                    self.advance();
                    let value = self.parse_expr()?;
                    args.push(Arg::Named { name, value });
                }
                None => args.push(Arg::Positional(self.parse_expr()?)),
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, "')' or ','")?;
        Ok(args)
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_or()
    }

    fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        let loc = left.loc;
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            loc,
        )
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = Self::binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_comparison()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_comparison()?;
            left = Self::binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn comparison_op(&self) -> Option<BinOp> {
        match self.peek() {
            Token::EqEq => Some(BinOp::Eq),
            Token::NotEq => Some(BinOp::NotEq),
            Token::Lt => Some(BinOp::Lt),
            Token::Le => Some(BinOp::Le),
            Token::Gt => Some(BinOp::Gt),
            Token::Ge => Some(BinOp::Ge),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.parse_additive()?;
        let Some(op) = self.comparison_op() else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_additive()?;
        if self.comparison_op().is_some() {
            return Err(self.error("comparison operators cannot be chained"));
        }
        Ok(Self::binary(op, left, right))
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let op = match self.peek() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, loc))
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        match self.peek().clone() {
            Token::Int(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Int(n), loc))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::Str(s), loc))
            }
            Token::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(true), loc))
            }
            Token::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(false), loc))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Axis { .. } => self.parse_selector(loc),
            Token::Ident(name) => {
                self.advance();
                if !self.check(&Token::LParen) {
                    return Ok(Expr::new(ExprKind::Ident(name), loc));
                }
                self.advance();
                match name.as_str() {
                    "world" => {
                        let x = self.parse_expr()?;
                        self.expect(Token::Comma, "',' in world(x, y, z)")?;
                        let y = self.parse_expr()?;
                        self.expect(Token::Comma, "',' in world(x, y, z)")?;
                        let z = self.parse_expr()?;
                        self.expect(Token::RParen, "')'")?;
                        Ok(Expr::new(
                            ExprKind::World { x: Box::new(x), y: Box::new(y), z: Box::new(z) },
                            loc,
                        ))
                    }
                    "waypoint" => {
                        let wp_name = match self.advance() {
                            Token::Str(s) => s,
                            other => {
                                return Err(SyntaxError::new(
                                    self.tokens[self.pos - 1].loc,
                                    format!("expected waypoint name string, found {}", other.describe()),
                                ))
                            }
                        };
                        self.expect(Token::RParen, "')'")?;
                        Ok(Expr::new(ExprKind::Waypoint(wp_name), loc))
                    }
                    "block" => {
                        let mut entries = Vec::new();
                        for arg in self.parse_args()? {
                            match arg {
                                Arg::Named { name, value } => entries.push((name, value)),
                                Arg::Positional(e) => {
                                    return Err(SyntaxError::new(
                                        e.loc,
                                        "block(...) only takes named arguments such as name: \"stone\"",
                                    ))
                                }
                            }
                        }
                        Ok(Expr::new(ExprKind::BlockQuery(entries), loc))
                    }
                    _ => {
                        let args = self.parse_args()?;
                        Ok(Expr::new(ExprKind::Predicate { name, args }, loc))
                    }
                }
            }
            other => Err(self.error(format!("expected an expression, found {}", other.describe()))),
        }
    }

    fn parse_selector(&mut self, loc: SourceLocation) -> Result<Expr, SyntaxError> {
        let mut terms = Vec::new();
        loop {
            match self.advance() {
                Token::Axis { axis, magnitude, .. } => {
                    terms.push(SelTerm::new(axis, magnitude.unwrap_or(1)));
                }
                other => {
                    return Err(SyntaxError::new(
                        self.tokens[self.pos.saturating_sub(1)].loc,
                        format!("expected selector term, found {}", other.describe()),
                    ))
                }
            }
            let joins = matches!(self.peek(), Token::Plus) && matches!(self.peek_at(1), Token::Axis { .. });
            if !joins {
                break;
            }
            self.advance();
        }
        if self.eat(&Token::Caret) {
            terms.push(SelTerm::new(Axis::U, 1));
        } else if self.eat(&Token::Underscore) {
            terms.push(SelTerm::new(Axis::D, 1));
        }
        Ok(Expr::new(ExprKind::Selector(Selector::new(terms)), loc))
    }
}

/// Parses script text into a [`Program`].
///
/// Either the whole script parses or a [`SyntaxError`] is returned; there is
/// no partial result.
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

/// Parses standalone selector text such as `F3+R1` or `F^`.
pub fn parse_selector(source: &str) -> Result<Selector, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let loc = parser.loc();
    if !matches!(parser.peek(), Token::Axis { .. }) {
        return Err(parser.error(format!("expected a selector, found {}", parser.peek().describe())));
    }
    let expr = parser.parse_selector(loc)?;
    if !matches!(parser.peek(), Token::Eof) {
        return Err(parser.error(format!("unexpected {} after selector", parser.peek().describe())));
    }
    match expr.kind {
        ExprKind::Selector(selector) => Ok(selector),
        _ => Err(SyntaxError::new(loc, "expected a selector")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(src: &str) -> Statement {
        parse(src).unwrap().statements.into_iter().next().unwrap()
    }

    fn selector_of(expr: &Expr) -> &Selector {
        match &expr.kind {
            ExprKind::Selector(s) => s,
            other => panic!("Expected Selector, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_repeat_count() {
        match first("repeat(3) { forward(1); }") {
            Statement::Repeat { kind: RepeatKind::Count(n), body, .. } => {
                assert_eq!(n.kind, ExprKind::Int(3));
                assert_eq!(body.statements.len(), 1);
                match &body.statements[0] {
                    Statement::Command(cmd) => assert_eq!(cmd.name, "forward"),
                    _ => panic!("Expected Command"),
                }
            }
            _ => panic!("Expected Repeat"),
        }
    }

    #[test]
    fn test_parse_repeat_with_variable() {
        match first("repeat(i: 4) { log(i); }") {
            Statement::Repeat { kind: RepeatKind::Range { var, start, end, step }, .. } => {
                assert_eq!(var, "i");
                assert_eq!(start.kind, ExprKind::Int(0));
                assert_eq!(end.kind, ExprKind::Int(4));
                assert!(step.is_none());
            }
            _ => panic!("Expected Range repeat"),
        }
    }

    #[test]
    fn test_parse_selector_chain_and_shorthand() {
        match first("dig(f3+r1^);") {
            Statement::Command(cmd) => {
                let sel = selector_of(cmd.args[0].value());
                assert_eq!(sel.key(), "F3+R1+U1");
            }
            _ => panic!("Expected Command"),
        }
        match first("dig(f_);") {
            Statement::Command(cmd) => assert_eq!(selector_of(cmd.args[0].value()).key(), "F1+D1"),
            _ => panic!("Expected Command"),
        }
        match first("dig(b-2);") {
            Statement::Command(cmd) => assert_eq!(selector_of(cmd.args[0].value()).key(), "B-2"),
            _ => panic!("Expected Command"),
        }
    }

    #[test]
    fn test_parse_named_args() {
        match first("scan(r: 3, mode: \"fast\");") {
            Statement::Command(cmd) => {
                assert_eq!(cmd.args.len(), 2);
                match &cmd.args[0] {
                    Arg::Named { name, value } => {
                        assert_eq!(name, "r");
                        assert_eq!(value.kind, ExprKind::Int(3));
                    }
                    _ => panic!("Expected Named"),
                }
            }
            _ => panic!("Expected Command"),
        }
    }

    #[test]
    fn test_parse_macro_with_params() {
        match first("macro tunnel(int len, string id) { repeat(len) { dig(f1); } }") {
            Statement::Macro(decl) => {
                assert_eq!(decl.name, "tunnel");
                assert_eq!(decl.params.len(), 2);
                assert_eq!(decl.params[0].ty, ParamType::Int);
                assert_eq!(decl.params[1].ty, ParamType::String);
            }
            _ => panic!("Expected Macro"),
        }
    }

    #[test]
    fn test_duplicate_macro_in_same_scope() {
        let err = parse("macro a() { }\nmacro a() { }").unwrap_err();
        assert_eq!((err.line, err.column), (2, 1));
        assert!(err.message.contains("already declared"));
        // Same name in a nested block is allowed.
        assert!(parse("macro a() { }\n{ macro a() { } }").is_ok());
    }

    #[test]
    fn test_duplicate_param() {
        assert!(parse("macro a(int x, bool x) { }").is_err());
    }

    #[test]
    fn test_parse_else_if_chain() {
        match first("if (a) { x(); } else if (b) { y(); } else { z(); }") {
            Statement::If { else_block: Some(b), .. } => match &b.statements[0] {
                Statement::If { else_block, .. } => assert!(else_block.is_some()),
                _ => panic!("Expected nested If"),
            },
            _ => panic!("Expected If with else"),
        }
    }

    #[test]
    fn test_precedence() {
        match first("let x = 1 + 2 * 3 == 7 && !false;") {
            Statement::Let { value, .. } => match value.kind {
                ExprKind::Binary { op: BinOp::And, left, .. } => match left.kind {
                    ExprKind::Binary { op: BinOp::Eq, left, .. } => match left.kind {
                        ExprKind::Binary { op: BinOp::Add, right, .. } => {
                            assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }))
                        }
                        _ => panic!("Expected Add"),
                    },
                    _ => panic!("Expected Eq"),
                },
                _ => panic!("Expected And"),
            },
            _ => panic!("Expected Let"),
        }
    }

    #[test]
    fn test_chained_comparison_is_rejected() {
        assert!(parse("let x = 1 < 2 < 3;").is_err());
    }

    #[test]
    fn test_parse_builtin_forms() {
        match first("goto(world(1, 64, -2), tol: 1);") {
            Statement::Command(cmd) => {
                assert!(matches!(cmd.args[0].value().kind, ExprKind::World { .. }));
            }
            _ => panic!("Expected Command"),
        }
        match first("goto(waypoint(\"home\"));") {
            Statement::Command(cmd) => {
                assert_eq!(cmd.args[0].value().kind, ExprKind::Waypoint("home".into()));
            }
            _ => panic!("Expected Command"),
        }
        match first("if (block(name: \"stone\", at: d1)) { }") {
            Statement::If { test, .. } => match test.kind {
                ExprKind::BlockQuery(entries) => {
                    assert_eq!(entries.len(), 2);
                    assert_eq!(entries[1].0, "at");
                }
                _ => panic!("Expected BlockQuery"),
            },
            _ => panic!("Expected If"),
        }
        assert!(parse("if (block(\"stone\")) { }").is_err());
    }

    #[test]
    fn test_parse_assert_with_message() {
        match first("assert(false, \"nope\");") {
            Statement::Assert { message, .. } => assert_eq!(message.as_deref(), Some("nope")),
            _ => panic!("Expected Assert"),
        }
    }

    #[test]
    fn test_unclosed_brace_points_at_brace() {
        let err = parse("log(1);\nrepeat(2) {\n  dig(f1);\n").unwrap_err();
        assert_eq!((err.line, err.column), (2, 11));
        assert!(err.message.contains("unclosed"));
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse("dig(f1)\ndig(f2);").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_axis_word_is_not_an_identifier() {
        let err = parse("let f = 1;").unwrap_err();
        assert!(err.message.contains("selector term"));
        assert!(parse("macro d() { }").is_err());
    }

    #[test]
    fn test_empty_statements_and_blocks() {
        let program = parse(";; { let x = 1; } ;").unwrap();
        assert_eq!(program.statements.len(), 4);
        assert!(matches!(program.statements[2], Statement::Block(_)));
    }

    #[test]
    fn test_parse_is_pure() {
        let src = "repeat(2) { dig(f1); move(f1); }";
        assert_eq!(parse(src).unwrap(), parse(src).unwrap());
    }

    #[test]
    fn test_parse_standalone_selector() {
        let sel = parse_selector("F3+R1").unwrap();
        assert_eq!(sel.key(), "F3+R1");
        assert_eq!(parse_selector("B^").unwrap().key(), "B1+U1");
        assert!(parse_selector("F1 F2").is_err());
        assert!(parse_selector("42").is_err());
    }

    #[test]
    fn test_stray_tokens() {
        assert!(parse("}").is_err());
        assert!(parse("else { }").is_err());
        assert!(parse("42;").is_err());
    }
}
