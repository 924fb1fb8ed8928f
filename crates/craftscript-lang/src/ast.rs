use std::sync::Arc;

use craftscript_core::functions::ParamType;
use craftscript_core::result::SourceLocation;
use craftscript_core::selector::Selector;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A brace-delimited statement list. Opens a new variable scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: ParamType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Block,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepeatKind {
    /// `repeat(N)`
    Count(Expr),
    /// Loop variable over `[start, end)` stepping by `step`.
    Range {
        var: String,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Named { name: String, value: Expr },
}

impl Arg {
    pub fn value(&self) -> &Expr {
        match self {
            Arg::Positional(e) => e,
            Arg::Named { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandStmt {
    pub name: String,
    pub args: Vec<Arg>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Macro(Arc<MacroDecl>),
    If {
        test: Expr,
        then_block: Block,
        else_block: Option<Block>,
        loc: SourceLocation,
    },
    Repeat {
        kind: RepeatKind,
        body: Block,
        loc: SourceLocation,
    },
    While {
        test: Expr,
        body: Block,
        loc: SourceLocation,
    },
    Assert {
        test: Expr,
        message: Option<String>,
        loc: SourceLocation,
    },
    Let {
        name: String,
        value: Expr,
        loc: SourceLocation,
    },
    Assign {
        name: String,
        value: Expr,
        loc: SourceLocation,
    },
    Command(CommandStmt),
    Block(Block),
    Empty,
}

impl Statement {
    pub fn loc(&self) -> Option<SourceLocation> {
        match self {
            Statement::Macro(decl) => Some(decl.loc),
            Statement::If { loc, .. }
            | Statement::Repeat { loc, .. }
            | Statement::While { loc, .. }
            | Statement::Assert { loc, .. }
            | Statement::Let { loc, .. }
            | Statement::Assign { loc, .. } => Some(*loc),
            Statement::Command(cmd) => Some(cmd.loc),
            Statement::Block(b) => Some(b.loc),
            Statement::Empty => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: SourceLocation,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: SourceLocation) -> Self {
        Self { kind, loc }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Str(String),
    Bool(bool),
    Ident(String),
    Selector(Selector),
    World {
        x: Box<Expr>,
        y: Box<Expr>,
        z: Box<Expr>,
    },
    Waypoint(String),
    BlockQuery(Vec<(String, Expr)>),
    Predicate {
        name: String,
        args: Vec<Arg>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Visits every command and predicate call in a statement list, in source order.
///
/// The callback receives the name, its location and whether it is a predicate.
pub fn walk_calls<'a>(statements: &'a [Statement], f: &mut dyn FnMut(&'a str, SourceLocation, bool)) {
    for stmt in statements {
        match stmt {
            Statement::Macro(decl) => walk_calls(&decl.body.statements, f),
            Statement::If { test, then_block, else_block, .. } => {
                walk_expr(test, f);
                walk_calls(&then_block.statements, f);
                if let Some(b) = else_block {
                    walk_calls(&b.statements, f);
                }
            }
            Statement::Repeat { kind, body, .. } => {
                match kind {
                    RepeatKind::Count(n) => walk_expr(n, f),
                    RepeatKind::Range { start, end, step, .. } => {
                        walk_expr(start, f);
                        walk_expr(end, f);
                        if let Some(s) = step {
                            walk_expr(s, f);
                        }
                    }
                }
                walk_calls(&body.statements, f);
            }
            Statement::While { test, body, .. } => {
                walk_expr(test, f);
                walk_calls(&body.statements, f);
            }
            Statement::Assert { test, .. } => walk_expr(test, f),
            Statement::Let { value, .. } | Statement::Assign { value, .. } => walk_expr(value, f),
            Statement::Command(cmd) => {
                f(&cmd.name, cmd.loc, false);
                for arg in &cmd.args {
                    walk_expr(arg.value(), f);
                }
            }
            Statement::Block(b) => walk_calls(&b.statements, f),
            Statement::Empty => {}
        }
    }
}

fn walk_expr<'a>(expr: &'a Expr, f: &mut dyn FnMut(&'a str, SourceLocation, bool)) {
    match &expr.kind {
        ExprKind::Predicate { name, args } => {
            f(name, expr.loc, true);
            for arg in args {
                walk_expr(arg.value(), f);
            }
        }
        ExprKind::World { x, y, z } => {
            walk_expr(x, f);
            walk_expr(y, f);
            walk_expr(z, f);
        }
        ExprKind::BlockQuery(entries) => {
            for (_, e) in entries {
                walk_expr(e, f);
            }
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, f),
        ExprKind::Binary { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        ExprKind::Int(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::Ident(_)
        | ExprKind::Selector(_)
        | ExprKind::Waypoint(_) => {}
    }
}

/// Names of every macro declared anywhere in the statement list.
pub fn declared_macros(statements: &[Statement]) -> Vec<&str> {
    let mut names = Vec::new();
    collect_macros(statements, &mut names);
    names
}

fn collect_macros<'a>(statements: &'a [Statement], out: &mut Vec<&'a str>) {
    for stmt in statements {
        match stmt {
            Statement::Macro(decl) => {
                out.push(&decl.name);
                collect_macros(&decl.body.statements, out);
            }
            Statement::If { then_block, else_block, .. } => {
                collect_macros(&then_block.statements, out);
                if let Some(b) = else_block {
                    collect_macros(&b.statements, out);
                }
            }
            Statement::Repeat { body, .. } | Statement::While { body, .. } | Statement::Block(body) => {
                collect_macros(&body.statements, out)
            }
            _ => {}
        }
    }
}
