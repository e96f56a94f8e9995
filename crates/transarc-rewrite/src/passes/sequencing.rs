//! Sequencing-hazard extraction
//!
//! The target language leaves the evaluation order of operands unspecified.
//! Two operands of one node conflict when both have opaque side effects
//! (calls, object creation), when one writes storage the other reads or
//! writes, or when one has opaque effects and the other touches a field or
//! an array element. Every operand before the last conflicting one is bound
//! to a temporary in a statement of its own, in source order. A store whose
//! value writes the stored place has its value bound first. The right side
//! of `&&`/`||` and the branches of a conditional are conditionally
//! evaluated and stay where they are.
//!
//! Loop conditions and `for` updates that need temporaries move into the
//! loop body so they are re-evaluated on every iteration, `continue`
//! included.

use std::collections::HashSet;

use transarc_ast::builder::{self, ProgramBuilder};
use transarc_ast::fold::{self, Folder};
use transarc_ast::visit::{self, Visitor};
use transarc_ast::{
    BindingId, Block, CompilationUnit, Expr, ExprKind, Intrinsic, Literal, MethodDecl, Span,
    Stmt, StmtKind, TypeDecl, TypeRef, UnaryOp,
};

use crate::{Pass, PassContext};

pub struct SequencingExtraction;

impl Pass for SequencingExtraction {
    fn name(&self) -> &'static str {
        "sequencing-extraction"
    }

    fn run(&self, unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit {
        Sequencer {
            builder: ctx.builder(),
            owners: Vec::new(),
        }
        .fold_unit(unit)
    }
}

/// Storage an expression can read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Location {
    Local(BindingId),
    /// The field on any instance, or the static field
    Field(BindingId),
    /// An element of any array
    Element,
}

/// What evaluating one operand may touch
#[derive(Debug, Default)]
struct Access {
    reads: HashSet<Location>,
    writes: HashSet<Location>,
    /// Effects that may read or write any field or element
    opaque: bool,
}

impl Access {
    fn of(expr: &Expr) -> Self {
        let mut access = Self::default();
        access.visit_expr(expr);
        access
    }

    fn touches_heap(&self) -> bool {
        self.reads
            .iter()
            .chain(&self.writes)
            .any(|l| !matches!(l, Location::Local(_)))
    }

    fn conflicts_with(&self, other: &Access) -> bool {
        (self.opaque && (other.opaque || other.touches_heap()))
            || (other.opaque && self.touches_heap())
            || self
                .writes
                .iter()
                .any(|l| other.reads.contains(l) || other.writes.contains(l))
            || other.writes.iter().any(|l| self.reads.contains(l))
    }

    fn touch(&mut self, location: Location, reads_old: bool) {
        self.writes.insert(location);
        if reads_old {
            self.reads.insert(location);
        }
    }

    /// Record a store to `place`; `reads_old` for updates that use the old value
    fn place(&mut self, place: &Expr, reads_old: bool) {
        match &place.kind {
            ExprKind::Local(var) => self.touch(Location::Local(*var), reads_old),
            ExprKind::Field { target, field } => {
                self.touch(Location::Field(*field), reads_old);
                if let Some(target) = target {
                    self.visit_expr(target);
                }
            }
            ExprKind::Index { array, index } => {
                self.touch(Location::Element, reads_old);
                self.visit_expr(array);
                self.visit_expr(index);
            }
            ExprKind::Intrinsic {
                func: Intrinsic::EnsureInitialized(_),
                args,
            } => {
                self.opaque = true;
                for arg in args {
                    self.place(arg, reads_old);
                }
            }
            _ => self.visit_expr(place),
        }
    }
}

impl Visitor for Access {
    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Local(var) => {
                self.reads.insert(Location::Local(*var));
            }
            ExprKind::Field { field, .. } => {
                self.reads.insert(Location::Field(*field));
            }
            ExprKind::Index { .. } => {
                self.reads.insert(Location::Element);
            }
            ExprKind::Assign { op, target, value } => {
                self.place(target, op.is_some());
                self.visit_expr(value);
                return;
            }
            ExprKind::Step { target, .. } => {
                self.place(target, true);
                return;
            }
            ExprKind::Intrinsic {
                func: Intrinsic::BoxedStep { .. } | Intrinsic::BoxedCompoundAssign { .. },
                args,
            } => {
                if let Some((place, rest)) = args.split_first() {
                    self.place(place, true);
                    for arg in rest {
                        self.visit_expr(arg);
                    }
                }
                return;
            }
            ExprKind::Call { .. }
            | ExprKind::New { .. }
            | ExprKind::MethodRef { .. }
            | ExprKind::Reflective { .. }
            | ExprKind::DynamicLoad { .. } => self.opaque = true,
            // the body runs later, not as part of this expression
            ExprKind::Lambda { .. } => {
                self.opaque = true;
                return;
            }
            ExprKind::Intrinsic { func, .. } if func.has_side_effects() => self.opaque = true,
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}

/// Storage a node itself writes, after its operands are evaluated
fn own_store(kind: &ExprKind) -> Option<Location> {
    let place = match kind {
        ExprKind::Assign { target, .. } | ExprKind::Step { target, .. } => target.as_ref(),
        ExprKind::Intrinsic {
            func: Intrinsic::BoxedStep { .. } | Intrinsic::BoxedCompoundAssign { .. },
            args,
        } => args.first()?,
        _ => return None,
    };
    location(place)
}

fn location(place: &Expr) -> Option<Location> {
    match &place.kind {
        ExprKind::Local(var) => Some(Location::Local(*var)),
        ExprKind::Field { field, .. } => Some(Location::Field(*field)),
        ExprKind::Index { .. } => Some(Location::Element),
        ExprKind::Intrinsic {
            func: Intrinsic::EnsureInitialized(_),
            args,
        } => args.first().and_then(location),
        _ => None,
    }
}

struct Sequencer<'a> {
    builder: ProgramBuilder<'a>,
    /// Method whose body is being sequenced; `None` inside a type body
    owners: Vec<Option<BindingId>>,
}

fn placeholder() -> Expr {
    Expr::literal(Literal::Null, TypeRef::Null)
}

/// Operands a place expression evaluates before it is written
fn place_operands(place: &mut Expr) -> Vec<&mut Expr> {
    match &mut place.kind {
        ExprKind::Field {
            target: Some(target),
            ..
        } => vec![target.as_mut()],
        ExprKind::Index { array, index } => vec![array.as_mut(), index.as_mut()],
        _ => Vec::new(),
    }
}

/// Unconditionally evaluated operands of a node, in evaluation order
fn operands(kind: &mut ExprKind) -> Vec<&mut Expr> {
    match kind {
        ExprKind::Literal(_)
        | ExprKind::This
        | ExprKind::OuterThis(_)
        | ExprKind::Local(_)
        | ExprKind::Lambda { .. }
        | ExprKind::DynamicLoad { .. } => Vec::new(),
        ExprKind::Field { target, .. } => target.iter_mut().map(|t| t.as_mut()).collect(),
        ExprKind::MethodRef { receiver, .. } => receiver.iter_mut().map(|r| r.as_mut()).collect(),
        ExprKind::Call { target, args, .. } => target
            .iter_mut()
            .map(|t| t.as_mut())
            .chain(args.iter_mut())
            .collect(),
        ExprKind::New { outer, args, .. } => outer
            .iter_mut()
            .map(|o| o.as_mut())
            .chain(args.iter_mut())
            .collect(),
        ExprKind::NewArray { dims, init, .. } => dims
            .iter_mut()
            .chain(init.iter_mut().flatten())
            .collect(),
        ExprKind::Index { array, index } => vec![array.as_mut(), index.as_mut()],
        ExprKind::Length(inner)
        | ExprKind::Unary { operand: inner, .. }
        | ExprKind::Cast { expr: inner }
        | ExprKind::InstanceOf { expr: inner, .. }
        | ExprKind::Box(inner)
        | ExprKind::Unbox(inner) => vec![inner.as_mut()],
        ExprKind::Binary { op, lhs, rhs } => {
            if op.is_short_circuit() {
                vec![lhs.as_mut()]
            } else {
                vec![lhs.as_mut(), rhs.as_mut()]
            }
        }
        ExprKind::Assign { target, value, .. } => {
            let mut ops = place_operands(target);
            ops.push(value.as_mut());
            ops
        }
        ExprKind::Step { target, .. } => place_operands(target),
        ExprKind::Conditional { cond, .. } => vec![cond.as_mut()],
        ExprKind::Intrinsic {
            func: Intrinsic::BoxedStep { .. } | Intrinsic::BoxedCompoundAssign { .. },
            args,
        } => {
            let mut iter = args.iter_mut();
            let mut ops = iter.next().map(place_operands).unwrap_or_default();
            ops.extend(iter);
            ops
        }
        ExprKind::Intrinsic { args, .. } | ExprKind::Reflective { args, .. } => {
            args.iter_mut().collect()
        }
    }
}

/// Operands that never need a temporary
fn is_trivial(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(_) | ExprKind::This)
}

fn not(cond: Expr) -> Expr {
    Expr::synthetic(
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand: Box::new(cond),
        },
        TypeRef::boolean(),
    )
}

/// `if (!cond) break;`
fn exit_unless(cond: Expr) -> Stmt {
    Stmt::synthetic(StmtKind::If {
        cond: not(cond),
        then_branch: Box::new(Stmt::synthetic(StmtKind::Break(None))),
        else_branch: None,
    })
}

fn block(stmts: Vec<Stmt>) -> Stmt {
    Stmt::synthetic(StmtKind::Block(Block::new(stmts)))
}

impl Sequencer<'_> {
    fn owner(&self) -> Option<BindingId> {
        self.owners.last().copied().flatten()
    }

    /// Index of the last operand that must not run ahead of the earlier ones
    fn boundary(accesses: &[Access], pending: &[Vec<Stmt>], own: Option<Location>) -> Option<usize> {
        let stores_own = own.is_some_and(|own| accesses.iter().any(|a| a.writes.contains(&own)));
        if stores_own {
            return Some(accesses.len());
        }
        (1..accesses.len()).rev().find(|&j| {
            !pending[j].is_empty() || accesses[..j].iter().any(|a| a.conflicts_with(&accesses[j]))
        })
    }

    /// Sequence `expr`; statements that must run first are appended to `out`
    fn sequence(&mut self, mut expr: Expr, out: &mut Vec<Stmt>) -> Expr {
        let Some(owner) = self.owner() else {
            return expr;
        };
        let own = own_store(&expr.kind);
        let mut ops = operands(&mut expr.kind);
        if ops.is_empty() {
            drop(ops);
            return expr;
        }

        let accesses: Vec<Access> = ops.iter().map(|op| Access::of(op)).collect();
        let mut pending: Vec<Vec<Stmt>> = Vec::with_capacity(ops.len());
        for op in ops.iter_mut() {
            let mut buffer = Vec::new();
            let taken = std::mem::replace(&mut **op, placeholder());
            **op = self.sequence(taken, &mut buffer);
            pending.push(buffer);
        }

        let boundary = Self::boundary(&accesses, &pending, own);
        for (index, (op, buffer)) in ops.into_iter().zip(pending).enumerate() {
            out.extend(buffer);
            let hoist = boundary.is_some_and(|b| index < b) && !is_trivial(op);
            if hoist {
                let ty = op.ty.clone();
                let temp = self.builder.temp(owner, "seq", ty.clone());
                let value = std::mem::replace(op, Expr::local(temp, ty));
                let span = value.span;
                out.push(Stmt::new(
                    StmtKind::Local {
                        var: temp,
                        init: Some(value),
                    },
                    span,
                ));
            }
        }
        expr
    }

    fn sequence_stmt(
        &mut self,
        expr: Expr,
        wrap: impl FnOnce(Expr) -> StmtKind,
        span: Span,
    ) -> Vec<Stmt> {
        let mut out = Vec::new();
        let expr = self.sequence(expr, &mut out);
        out.push(Stmt::new(wrap(expr), span));
        out
    }

    /// `first = true` in the loop header, `first = false` as its update
    fn first_flag(&mut self, owner: BindingId) -> (BindingId, Stmt, Expr) {
        let flag = self.builder.temp(owner, "first", TypeRef::boolean());
        let declare = builder::declare_local(flag, Some(builder::boolean(true)));
        let clear = builder::assign(Expr::local(flag, TypeRef::boolean()), builder::boolean(false));
        (flag, declare, clear)
    }

    fn sequence_for(
        &mut self,
        init: Vec<Stmt>,
        cond: Option<Expr>,
        update: Vec<Expr>,
        body: Stmt,
        span: Span,
    ) -> Stmt {
        let mut init: Vec<Stmt> = init.into_iter().flat_map(|s| self.fold_stmt(s)).collect();
        let body = fold::fold_single(self, body);
        let mut hoisted = Vec::new();
        let cond = cond.map(|c| self.sequence(c, &mut hoisted));
        let mut steps = Vec::with_capacity(update.len());
        for expr in update {
            let mut pre = Vec::new();
            let expr = self.sequence(expr, &mut pre);
            steps.push((pre, expr));
        }

        let update_hoisted = steps.iter().any(|(pre, _)| !pre.is_empty());
        let owner = match self.owner() {
            Some(owner) if update_hoisted || !hoisted.is_empty() => owner,
            _ => {
                return Stmt::new(
                    StmtKind::For {
                        init,
                        cond,
                        update: steps.into_iter().map(|(_, e)| e).collect(),
                        body: Box::new(body),
                    },
                    span,
                )
            }
        };

        let mut stmts = Vec::new();
        let update = if update_hoisted {
            // for (init, first = true; ; first = false) { if (!first) { update } .. }
            let (flag, declare, clear) = self.first_flag(owner);
            init.push(declare);
            let update = steps
                .into_iter()
                .flat_map(|(pre, e)| pre.into_iter().chain(std::iter::once(Stmt::expr(e))))
                .collect();
            stmts.push(Stmt::synthetic(StmtKind::If {
                cond: not(Expr::local(flag, TypeRef::boolean())),
                then_branch: Box::new(block(update)),
                else_branch: None,
            }));
            vec![clear]
        } else {
            steps.into_iter().map(|(_, e)| e).collect()
        };
        stmts.extend(hoisted);
        if let Some(cond) = cond {
            stmts.push(exit_unless(cond));
        }
        stmts.push(body);
        Stmt::new(
            StmtKind::For {
                init,
                cond: None,
                update,
                body: Box::new(block(stmts)),
            },
            span,
        )
    }
}

impl Folder for Sequencer<'_> {
    fn fold_type_decl(&mut self, decl: TypeDecl) -> TypeDecl {
        self.owners.push(None);
        let decl = fold::walk_type_decl(self, decl);
        self.owners.pop();
        decl
    }

    fn fold_method(&mut self, method: MethodDecl) -> MethodDecl {
        self.owners.push(Some(method.binding));
        let method = fold::walk_method(self, method);
        self.owners.pop();
        method
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        let Stmt { kind, span } = stmt;
        match kind {
            StmtKind::Expr(expr) => self.sequence_stmt(expr, StmtKind::Expr, span),
            StmtKind::Local {
                var,
                init: Some(init),
            } => self.sequence_stmt(
                init,
                |init| StmtKind::Local {
                    var,
                    init: Some(init),
                },
                span,
            ),
            StmtKind::Return(Some(value)) => {
                self.sequence_stmt(value, |v| StmtKind::Return(Some(v)), span)
            }
            StmtKind::Throw(value) => self.sequence_stmt(value, StmtKind::Throw, span),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let then_branch = Box::new(fold::fold_single(self, *then_branch));
                let else_branch = else_branch.map(|e| Box::new(fold::fold_single(self, *e)));
                self.sequence_stmt(
                    cond,
                    |cond| StmtKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    },
                    span,
                )
            }
            StmtKind::Synchronized { lock, body } => {
                let body = self.fold_block(body);
                self.sequence_stmt(lock, |lock| StmtKind::Synchronized { lock, body }, span)
            }
            StmtKind::While { cond, body } => {
                let body = fold::fold_single(self, *body);
                let mut hoisted = Vec::new();
                let cond = self.sequence(cond, &mut hoisted);
                if hoisted.is_empty() {
                    return vec![Stmt::new(
                        StmtKind::While {
                            cond,
                            body: Box::new(body),
                        },
                        span,
                    )];
                }
                // while (true) { hoisted; if (!cond) break; body }
                hoisted.push(exit_unless(cond));
                hoisted.push(body);
                vec![Stmt::new(
                    StmtKind::While {
                        cond: builder::boolean(true),
                        body: Box::new(block(hoisted)),
                    },
                    span,
                )]
            }
            StmtKind::DoWhile { body, cond } => {
                let body = fold::fold_single(self, *body);
                let mut hoisted = Vec::new();
                let cond = self.sequence(cond, &mut hoisted);
                let owner = match self.owner() {
                    Some(owner) if !hoisted.is_empty() => owner,
                    _ => {
                        return vec![Stmt::new(
                            StmtKind::DoWhile {
                                body: Box::new(body),
                                cond,
                            },
                            span,
                        )]
                    }
                };
                // for (first = true; ; first = false) { if (!first) { hoisted; if (!cond) break; } body }
                let (flag, declare, clear) = self.first_flag(owner);
                hoisted.push(exit_unless(cond));
                let check = Stmt::synthetic(StmtKind::If {
                    cond: not(Expr::local(flag, TypeRef::boolean())),
                    then_branch: Box::new(block(hoisted)),
                    else_branch: None,
                });
                vec![Stmt::new(
                    StmtKind::For {
                        init: vec![declare],
                        cond: None,
                        update: vec![clear],
                        body: Box::new(block(vec![check, body])),
                    },
                    span,
                )]
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => vec![self.sequence_for(init, cond, update, *body, span)],
            kind => fold::walk_stmt(self, Stmt { kind, span }),
        }
    }
}
