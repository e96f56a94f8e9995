//! Expression AST nodes

use serde::{Deserialize, Serialize};

use crate::{BindingId, Block, PrimitiveType, Span, TypeDecl, TypeRef};

/// An expression with its resolved type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeRef,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeRef, span: Span) -> Self {
        Self { kind, ty, span }
    }

    /// Synthesized expression with no source location
    pub fn synthetic(kind: ExprKind, ty: TypeRef) -> Self {
        Self::new(kind, ty, Span::dummy())
    }

    pub fn local(var: BindingId, ty: TypeRef) -> Self {
        Self::synthetic(ExprKind::Local(var), ty)
    }

    pub fn literal(literal: Literal, ty: TypeRef) -> Self {
        Self::synthetic(ExprKind::Literal(literal), ty)
    }

    pub fn intrinsic(func: Intrinsic, args: Vec<Expr>, ty: TypeRef) -> Self {
        Self::synthetic(ExprKind::Intrinsic { func, args }, ty)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(_))
    }

    /// Whether evaluating the expression can have an observable side effect
    pub fn has_side_effects(&self) -> bool {
        match &self.kind {
            ExprKind::Call { .. }
            | ExprKind::New { .. }
            | ExprKind::NewArray { .. }
            | ExprKind::Assign { .. }
            | ExprKind::Step { .. }
            | ExprKind::Lambda { .. }
            | ExprKind::MethodRef { .. }
            | ExprKind::Reflective { .. }
            | ExprKind::DynamicLoad { .. } => true,
            ExprKind::Intrinsic { func, args } => {
                func.has_side_effects() || args.iter().any(Expr::has_side_effects)
            }
            ExprKind::Literal(_) | ExprKind::This | ExprKind::OuterThis(_) | ExprKind::Local(_) => {
                false
            }
            ExprKind::Field { target, .. } => target.as_deref().is_some_and(Expr::has_side_effects),
            ExprKind::Index { array, index } => array.has_side_effects() || index.has_side_effects(),
            ExprKind::Length(inner)
            | ExprKind::Unary { operand: inner, .. }
            | ExprKind::Cast { expr: inner }
            | ExprKind::InstanceOf { expr: inner, .. }
            | ExprKind::Box(inner)
            | ExprKind::Unbox(inner) => inner.has_side_effects(),
            ExprKind::Binary { lhs, rhs, .. } => lhs.has_side_effects() || rhs.has_side_effects(),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => cond.has_side_effects() || then_expr.has_side_effects() || else_expr.has_side_effects(),
        }
    }
}

/// A literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    /// Integral literal; the expression type says which width
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),

    /// `this` of the type whose body is being evaluated
    This,

    /// Qualified `Outer.this` naming an enclosing instance
    OuterThis(BindingId),

    /// Read of a local variable or parameter
    Local(BindingId),

    /// Field access; `target: None` means implicit `this` or a static field
    Field {
        target: Option<Box<Expr>>,
        field: BindingId,
    },

    /// Method or constructor invocation; `target: None` means implicit
    /// `this` or a static method. `is_super` marks `super.m()` and `super(..)`
    Call {
        target: Option<Box<Expr>>,
        method: BindingId,
        args: Vec<Expr>,
        is_super: bool,
    },

    /// Object creation, optionally with an explicit enclosing instance or an
    /// anonymous class body
    New {
        class: BindingId,
        ctor: Option<BindingId>,
        args: Vec<Expr>,
        outer: Option<Box<Expr>>,
        body: Option<Box<TypeDecl>>,
    },

    /// Lambda expression. `class` is the synthetic type the lambda becomes
    /// and `method` its implementation of the functional interface method
    Lambda {
        class: BindingId,
        method: BindingId,
        params: Vec<BindingId>,
        body: Block,
    },

    /// Method reference `receiver::target`, or `Type::target` without a
    /// receiver. A constructor `target` stands for `Type::new`. `class` and
    /// `method` play the same role as for a lambda
    MethodRef {
        class: BindingId,
        method: BindingId,
        receiver: Option<Box<Expr>>,
        target: BindingId,
    },

    /// Array creation: `new T[d0][d1]` or `new T[] { .. }`
    NewArray {
        element: TypeRef,
        dims: Vec<Expr>,
        init: Option<Vec<Expr>>,
    },

    /// Array element access: `a[i]`
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },

    /// Array length: `a.length`
    Length(Box<Expr>),

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// Assignment; `op: Some(..)` for compound assignment (`+=`, ...)
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },

    /// Increment or decrement, prefix or postfix
    Step {
        op: StepOp,
        prefix: bool,
        target: Box<Expr>,
    },

    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },

    /// Cast to the expression's own type
    Cast { expr: Box<Expr> },

    InstanceOf { expr: Box<Expr>, class: TypeRef },

    /// Explicit primitive-to-boxed conversion
    Box(Box<Expr>),

    /// Explicit boxed-to-primitive conversion
    Unbox(Box<Expr>),

    /// Call into the target runtime introduced by a lowering pass
    Intrinsic { func: Intrinsic, args: Vec<Expr> },

    /// Reflective member invocation; no bounded translation exists
    Reflective { description: String, args: Vec<Expr> },

    /// Loading a type by name at run time; no bounded translation exists
    DynamicLoad { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    // Bitwise and shifts
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,

    // Short-circuit logical
    And,
    Or,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOp {
    Increment,
    Decrement,
}

/// Runtime operations introduced by the lowering passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Intrinsic {
    /// Throws on null, otherwise yields its argument
    NilCheck,
    /// Runs the static initializer of a type if it has not run yet, then
    /// yields its argument (if any). With a static field argument the result
    /// is still a place that can be assigned or stepped
    EnsureInitialized(BindingId),
    IteratorAcquire,
    IteratorHasNext,
    IteratorNext,
    /// `array, index` → element, bounds checked
    ArrayGet,
    /// `array, index, value` → value, bounds and store checked
    ArraySet,
    /// `array, index, value` → combined element
    ArrayCompoundAssign(BinaryOp),
    /// `array, index` → stepped element
    ArrayStep { op: StepOp, prefix: bool },
    ArrayLength,
    /// `dims..` → array of `dimensions` levels with default elements
    ArrayCreate { element: TypeRef, dimensions: usize },
    /// `elements..` → one-level array holding the given elements
    ArrayInit { element: TypeRef },
    /// `target` → stepped boxed value, stored back into `target`
    BoxedStep {
        op: StepOp,
        prefix: bool,
        boxed: PrimitiveType,
    },
    /// `target, value` → combined boxed value, stored back into `target`
    BoxedCompoundAssign { op: BinaryOp, boxed: PrimitiveType },
    /// Checked integer division: traps on zero, defines `MIN / -1`
    CheckedDiv(PrimitiveType),
    CheckedRem(PrimitiveType),
    /// Shift with the distance masked to the operand width
    MaskedShift { op: BinaryOp, bits: u8 },
    /// Floating remainder with the source language's sign rules
    FloatRem,
    /// Saturating floating-to-integral conversion (NaN maps to zero)
    FloatToIntegral(PrimitiveType),
    StringConcat,
    /// Content equality of two strings, the left one non-null
    StringEquals,
}

impl Intrinsic {
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Intrinsic::EnsureInitialized(_)
                | Intrinsic::IteratorAcquire
                | Intrinsic::IteratorNext
                | Intrinsic::ArraySet
                | Intrinsic::ArrayCompoundAssign(_)
                | Intrinsic::ArrayStep { .. }
                | Intrinsic::ArrayCreate { .. }
                | Intrinsic::ArrayInit { .. }
                | Intrinsic::BoxedStep { .. }
                | Intrinsic::BoxedCompoundAssign { .. }
        )
    }

    /// Runtime function name handed to the emitter
    pub fn runtime_name(&self) -> String {
        match self {
            Intrinsic::NilCheck => "nil_chk".into(),
            Intrinsic::EnsureInitialized(_) => "ensure_initialized".into(),
            Intrinsic::IteratorAcquire => "iterator".into(),
            Intrinsic::IteratorHasNext => "hasNext".into(),
            Intrinsic::IteratorNext => "next".into(),
            Intrinsic::ArrayGet => "array_get".into(),
            Intrinsic::ArraySet => "array_set".into(),
            Intrinsic::ArrayCompoundAssign(op) => format!("array_assign{}", op.symbol()),
            Intrinsic::ArrayStep { op, prefix } => format!(
                "array_{}{}",
                if *prefix { "pre" } else { "post" },
                match op {
                    StepOp::Increment => "inc",
                    StepOp::Decrement => "dec",
                }
            ),
            Intrinsic::ArrayLength => "array_length".into(),
            Intrinsic::ArrayCreate { dimensions, .. } => format!("array_create{}d", dimensions),
            Intrinsic::ArrayInit { .. } => "array_init".into(),
            Intrinsic::BoxedStep { op, prefix, boxed } => format!(
                "{}_{}{}",
                boxed.boxed_name(),
                if *prefix { "pre" } else { "post" },
                match op {
                    StepOp::Increment => "Incr",
                    StepOp::Decrement => "Decr",
                }
            ),
            Intrinsic::BoxedCompoundAssign { op, boxed } => {
                format!("{}_assign{}", boxed.boxed_name(), op.symbol())
            }
            Intrinsic::CheckedDiv(p) => format!("{}_div", p.name()),
            Intrinsic::CheckedRem(p) => format!("{}_rem", p.name()),
            Intrinsic::MaskedShift { op, bits } => format!("shift{}{}", op.symbol(), bits),
            Intrinsic::FloatRem => "fmod".into(),
            Intrinsic::FloatToIntegral(p) => format!("fp_to_{}", p.name()),
            Intrinsic::StringConcat => "strcat".into(),
            Intrinsic::StringEquals => "string_equals".into(),
        }
    }
}
