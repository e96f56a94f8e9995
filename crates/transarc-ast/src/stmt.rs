//! Statement AST nodes

use serde::{Deserialize, Serialize};

use crate::{BindingId, Expr, Span, TypeDecl};

/// A block of statements
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self {
            stmts,
            span: Span::dummy(),
        }
    }
}

/// A statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn synthetic(kind: StmtKind) -> Self {
        Self::new(kind, Span::dummy())
    }

    pub fn expr(expr: Expr) -> Self {
        let span = expr.span;
        Self::new(StmtKind::Expr(expr), span)
    }

    /// Wrap a list of statements so it fits a single-statement slot
    pub fn from_stmts(mut stmts: Vec<Stmt>, span: Span) -> Self {
        if stmts.len() == 1 {
            if let Some(stmt) = stmts.pop() {
                return stmt;
            }
        }
        Self::new(StmtKind::Block(Block { stmts, span }), span)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// Local variable declaration: `T x = init;`
    Local {
        var: BindingId,
        init: Option<Expr>,
    },

    /// Expression statement: `foo();`
    Expr(Expr),

    Block(Block),

    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    While {
        cond: Expr,
        body: Box<Stmt>,
    },

    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },

    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
    },

    /// `switch (selector)` with fall-through between cases
    Switch {
        selector: Expr,
        cases: Vec<SwitchCase>,
    },

    /// Enhanced iteration: `for (T x : iterable)`
    ForEach {
        var: BindingId,
        iterable: Expr,
        body: Box<Stmt>,
    },

    Return(Option<Expr>),

    Break(Option<String>),

    Continue(Option<String>),

    Labeled {
        label: String,
        body: Box<Stmt>,
    },

    Throw(Expr),

    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
    },

    Synchronized {
        lock: Expr,
        body: Block,
    },

    /// Local type declaration
    LocalType(Box<TypeDecl>),

    Empty,
}

/// A catch clause of a try statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub var: BindingId,
    pub body: Block,
    pub span: Span,
}

/// One `case a: case b:` group (or `default:`) of a switch and the
/// statements that follow it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// Constant labels; empty for `default`
    pub labels: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl SwitchCase {
    pub fn new(labels: Vec<Expr>, body: Vec<Stmt>) -> Self {
        Self {
            labels,
            body,
            span: Span::dummy(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.labels.is_empty()
    }
}
