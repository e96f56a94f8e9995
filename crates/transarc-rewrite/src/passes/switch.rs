//! Switch lowering
//!
//! A switch becomes a labelled block. The selector is evaluated once into a
//! temporary; each case group turns into an `if` taken when one of its labels
//! matches or when the group before it fell through. `default` matches when
//! no label of any group does, and as the last group it runs unconditionally.
//! Strings compare by content, everything else by `==`. Unlabelled `break`s
//! aimed at the switch leave the block. Locals declared directly in a group
//! stay visible to the groups after it, so their declarations move ahead of
//! the first group and their initializers become assignments.

use log::warn;
use transarc_ast::builder::{self, ProgramBuilder};
use transarc_ast::fold::{self, Folder};
use transarc_ast::{
    BinaryOp, BindingId, Block, CompilationUnit, Expr, ExprKind, Intrinsic, MethodDecl, Span,
    Stmt, StmtKind, SwitchCase, TypeDecl, TypeRef, UnaryOp,
};

use crate::{Pass, PassContext};

pub struct SwitchLowering;

impl Pass for SwitchLowering {
    fn name(&self) -> &'static str {
        "switch-lowering"
    }

    fn run(&self, unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit {
        Lowerer {
            builder: ctx.builder(),
            owners: Vec::new(),
            switches: 0,
        }
        .fold_unit(unit)
    }
}

struct Lowerer<'a> {
    builder: ProgramBuilder<'a>,
    /// Method (or type, for initializers) that owns new temporaries
    owners: Vec<BindingId>,
    /// Switches lowered so far; numbers the block labels
    switches: usize,
}

impl Lowerer<'_> {
    fn lower(&mut self, selector: Expr, cases: Vec<SwitchCase>, span: Span) -> Stmt {
        let Some(owner) = self.owners.last().copied() else {
            warn!("switch outside any type body left in place");
            return Stmt::new(StmtKind::Switch { selector, cases }, span);
        };
        let label = format!("switch${}", self.switches);
        self.switches += 1;

        let b = &self.builder;
        let selector_ty = selector.ty.clone();
        let value = b.temp(owner, "selector", selector_ty.clone());
        let selector = if selector_ty.is_reference() {
            Expr::intrinsic(Intrinsic::NilCheck, vec![selector], selector_ty.clone())
        } else {
            selector
        };
        let mut stmts = vec![Stmt::new(
            StmtKind::Local {
                var: value,
                init: Some(selector),
            },
            span,
        )];

        let read = || Expr::local(value, selector_ty.clone());
        let matches = |labels: &[Expr]| {
            labels
                .iter()
                .map(|label| label_match(read(), label.clone()))
                .reduce(|acc, next| logical(BinaryOp::Or, acc, next))
        };
        let every_label: Vec<Expr> = cases.iter().flat_map(|c| c.labels.clone()).collect();

        let fall = (cases.len() > 1).then(|| b.temp(owner, "fallthrough", TypeRef::boolean()));
        if let Some(fall) = fall {
            stmts.push(builder::declare_local(fall, Some(builder::boolean(false))));
        }
        let read_fall = |fall: BindingId| Expr::local(fall, TypeRef::boolean());

        let count = cases.len();
        let mut groups = Vec::with_capacity(count);
        for (index, mut case) in cases.into_iter().enumerate() {
            let last = index + 1 == count;
            let mut body = Vec::new();
            if let (Some(fall), false) = (fall, last) {
                body.push(Stmt::expr(builder::assign(read_fall(fall), builder::boolean(true))));
            }
            for stmt in std::mem::take(&mut case.body) {
                body.extend(hoist_local(b, stmt, &mut stmts));
            }
            let body = Retarget { label: &label }.fold_block(Block::new(body)).stmts;

            if last && case.is_default() {
                groups.extend(body);
                continue;
            }
            let matched = if case.is_default() {
                matches(&every_label).map(negate)
            } else {
                matches(&case.labels)
            };
            let cond = match (matched, fall.filter(|_| index > 0)) {
                (Some(matched), Some(fall)) => logical(BinaryOp::Or, read_fall(fall), matched),
                (Some(matched), None) => matched,
                (None, _) => builder::boolean(true),
            };
            groups.push(Stmt::new(
                StmtKind::If {
                    cond,
                    then_branch: Box::new(Stmt::synthetic(StmtKind::Block(Block::new(body)))),
                    else_branch: None,
                },
                case.span,
            ));
        }
        stmts.extend(groups);

        Stmt::new(
            StmtKind::Labeled {
                label,
                body: Box::new(Stmt::new(StmtKind::Block(Block { stmts, span }), span)),
            },
            span,
        )
    }
}

/// Move a local declared at group level ahead of the groups
fn hoist_local(b: &ProgramBuilder<'_>, stmt: Stmt, header: &mut Vec<Stmt>) -> Option<Stmt> {
    match stmt.kind {
        StmtKind::Local { var, init } => {
            header.push(builder::declare_local(var, None));
            init.map(|init| {
                let target = Expr::local(var, b.type_of(var));
                Stmt::new(StmtKind::Expr(builder::assign(target, init)), stmt.span)
            })
        }
        kind => Some(Stmt {
            kind,
            span: stmt.span,
        }),
    }
}

fn label_match(value: Expr, label: Expr) -> Expr {
    if value.ty.is_string() {
        Expr::intrinsic(Intrinsic::StringEquals, vec![value, label], TypeRef::boolean())
    } else {
        builder::binary(BinaryOp::Eq, value, label, TypeRef::boolean())
    }
}

fn logical(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    builder::binary(op, lhs, rhs, TypeRef::boolean())
}

fn negate(cond: Expr) -> Expr {
    Expr::synthetic(
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand: Box::new(cond),
        },
        TypeRef::boolean(),
    )
}

/// Points unlabelled `break`s at the lowered switch. Loops keep their own
/// breaks; nested type bodies and lambdas are left alone.
struct Retarget<'l> {
    label: &'l str,
}

impl Folder for Retarget<'_> {
    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        match stmt.kind {
            StmtKind::Break(None) => vec![Stmt::new(
                StmtKind::Break(Some(self.label.to_string())),
                stmt.span,
            )],
            StmtKind::While { .. }
            | StmtKind::DoWhile { .. }
            | StmtKind::For { .. }
            | StmtKind::ForEach { .. }
            | StmtKind::Switch { .. }
            | StmtKind::LocalType(_) => vec![stmt],
            kind => fold::walk_stmt(
                self,
                Stmt {
                    kind,
                    span: stmt.span,
                },
            ),
        }
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        expr
    }
}

impl Folder for Lowerer<'_> {
    fn fold_type_decl(&mut self, decl: TypeDecl) -> TypeDecl {
        self.owners.push(decl.binding);
        let decl = fold::walk_type_decl(self, decl);
        self.owners.pop();
        decl
    }

    fn fold_method(&mut self, method: MethodDecl) -> MethodDecl {
        self.owners.push(method.binding);
        let method = fold::walk_method(self, method);
        self.owners.pop();
        method
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        // nested switches are lowered first, so their breaks are already labelled
        fold::walk_stmt(self, stmt)
            .into_iter()
            .map(|stmt| match stmt.kind {
                StmtKind::Switch { selector, cases } => self.lower(selector, cases, stmt.span),
                kind => Stmt {
                    kind,
                    span: stmt.span,
                },
            })
            .collect()
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        match expr.kind {
            ExprKind::Lambda { method, .. } => {
                self.owners.push(method);
                let expr = fold::walk_expr(self, expr);
                self.owners.pop();
                expr
            }
            _ => fold::walk_expr(self, expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transarc_ast::BindingCache;

    fn lower_body(
        cache: &BindingCache,
        host: BindingId,
        run: BindingId,
        stmts: Vec<Stmt>,
    ) -> Vec<Stmt> {
        let decl = TypeDecl::new(host).with_member(builder::method_member(run, vec![], stmts));
        let unit = CompilationUnit::new("p/C.src", "p").with_type(decl);
        let mut ctx = PassContext::new(cache, "p/C.src");
        let unit = SwitchLowering.run(unit, &mut ctx);
        let stmts = unit.types[0].methods().next().unwrap().body.clone().unwrap().stmts;
        stmts
    }

    fn call_stmt(method: BindingId) -> Stmt {
        Stmt::expr(builder::call(None, method, vec![], TypeRef::Void))
    }

    /// The statements inside the labelled block a switch lowers to
    fn lowered_block(stmt: &Stmt) -> (&str, &[Stmt]) {
        let StmtKind::Labeled { label, body } = &stmt.kind else {
            panic!("expected labelled block");
        };
        let StmtKind::Block(block) = &body.kind else {
            panic!("expected block");
        };
        (label, &block.stmts)
    }

    fn if_parts(stmt: &Stmt) -> (&Expr, &[Stmt]) {
        let StmtKind::If {
            cond, then_branch, ..
        } = &stmt.kind
        else {
            panic!("expected if");
        };
        let StmtKind::Block(block) = &then_branch.kind else {
            panic!("expected block");
        };
        (cond, &block.stmts)
    }

    #[test]
    fn test_cases_fall_through_until_break() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let c = b.class("p", "C");
        let run = b.method(c, "run", vec![], TypeRef::Void);
        let one = b.method(c, "one", vec![], TypeRef::Void);
        let two = b.method(c, "two", vec![], TypeRef::Void);
        let other = b.method(c, "other", vec![], TypeRef::Void);
        let code = b.local(run, "code", TypeRef::int());

        let switch = Stmt::synthetic(StmtKind::Switch {
            selector: Expr::local(code, TypeRef::int()),
            cases: vec![
                SwitchCase::new(vec![builder::int(1)], vec![call_stmt(one)]),
                SwitchCase::new(
                    vec![builder::int(2), builder::int(3)],
                    vec![call_stmt(two), Stmt::synthetic(StmtKind::Break(None))],
                ),
                SwitchCase::new(vec![], vec![call_stmt(other)]),
            ],
        });
        let stmts = lower_body(&cache, c, run, vec![switch]);
        assert_eq!(stmts.len(), 1);
        let (label, block) = lowered_block(&stmts[0]);
        assert_eq!(label, "switch$0");

        // selector temp, fall-through flag, two guarded groups, trailing default
        assert_eq!(block.len(), 5);
        let StmtKind::Local { var: selector, init: Some(init) } = &block[0].kind else {
            panic!("expected selector temp");
        };
        assert_eq!(init, &Expr::local(code, TypeRef::int()));
        let StmtKind::Local { var: fall, .. } = &block[1].kind else {
            panic!("expected fall-through flag");
        };

        let (first_cond, first_body) = if_parts(&block[2]);
        assert_eq!(
            first_cond,
            &builder::binary(
                BinaryOp::Eq,
                Expr::local(*selector, TypeRef::int()),
                builder::int(1),
                TypeRef::boolean()
            )
        );
        assert_eq!(first_body.len(), 2);

        let (second_cond, second_body) = if_parts(&block[3]);
        let ExprKind::Binary { op: BinaryOp::Or, lhs, .. } = &second_cond.kind else {
            panic!("expected fall-through or match");
        };
        assert_eq!(lhs.kind, ExprKind::Local(*fall));
        assert_eq!(
            second_body.last().map(|s| &s.kind),
            Some(&StmtKind::Break(Some("switch$0".into())))
        );

        // default is last and runs whenever control reaches it
        assert_eq!(block[4], call_stmt(other));
    }

    #[test]
    fn test_default_before_cases_matches_only_unlisted_values() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let c = b.class("p", "C");
        let run = b.method(c, "run", vec![], TypeRef::Void);
        let other = b.method(c, "other", vec![], TypeRef::Void);
        let one = b.method(c, "one", vec![], TypeRef::Void);
        let code = b.local(run, "code", TypeRef::int());

        let switch = Stmt::synthetic(StmtKind::Switch {
            selector: Expr::local(code, TypeRef::int()),
            cases: vec![
                SwitchCase::new(vec![], vec![call_stmt(other)]),
                SwitchCase::new(vec![builder::int(1)], vec![call_stmt(one)]),
            ],
        });
        let stmts = lower_body(&cache, c, run, vec![switch]);
        let (_, block) = lowered_block(&stmts[0]);
        let (default_cond, _) = if_parts(&block[2]);
        let ExprKind::Unary { op: UnaryOp::Not, operand } = &default_cond.kind else {
            panic!("default matches when no label does");
        };
        assert!(matches!(operand.kind, ExprKind::Binary { op: BinaryOp::Eq, .. }));
    }

    #[test]
    fn test_string_selector_compares_content_and_loop_breaks_stay() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let c = b.class("p", "C");
        let run = b.method(c, "run", vec![], TypeRef::Void);
        let command = b.local(run, "command", TypeRef::String);
        let count = b.local(run, "count", TypeRef::int());

        let inner_loop = Stmt::synthetic(StmtKind::While {
            cond: builder::boolean(true),
            body: Box::new(Stmt::synthetic(StmtKind::Break(None))),
        });
        let switch = Stmt::synthetic(StmtKind::Switch {
            selector: Expr::local(command, TypeRef::String),
            cases: vec![
                SwitchCase::new(
                    vec![builder::string("stop")],
                    vec![
                        builder::declare_local(count, Some(builder::int(0))),
                        inner_loop.clone(),
                    ],
                ),
                SwitchCase::new(
                    vec![builder::string("go")],
                    vec![Stmt::expr(builder::assign(
                        Expr::local(count, TypeRef::int()),
                        builder::int(1),
                    ))],
                ),
            ],
        });
        let stmts = lower_body(&cache, c, run, vec![switch]);
        let (_, block) = lowered_block(&stmts[0]);

        let StmtKind::Local { init: Some(init), .. } = &block[0].kind else {
            panic!("expected selector temp");
        };
        assert!(matches!(
            init.kind,
            ExprKind::Intrinsic { func: Intrinsic::NilCheck, .. }
        ));
        // `count` is declared ahead of the groups so the second one sees it
        assert_eq!(block[2], builder::declare_local(count, None));

        let (cond, body) = if_parts(&block[3]);
        assert!(matches!(
            cond.kind,
            ExprKind::Intrinsic { func: Intrinsic::StringEquals, .. }
        ));
        let StmtKind::Expr(assigned) = &body[1].kind else {
            panic!("initializer becomes an assignment");
        };
        assert!(matches!(assigned.kind, ExprKind::Assign { .. }));
        assert_eq!(body[2], inner_loop);
        assert!(matches!(block[4].kind, StmtKind::If { .. }));
    }

    #[test]
    fn test_nested_switch_breaks_target_the_inner_block() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let c = b.class("p", "C");
        let run = b.method(c, "run", vec![], TypeRef::Void);
        let x = b.local(run, "x", TypeRef::int());

        let inner = Stmt::synthetic(StmtKind::Switch {
            selector: Expr::local(x, TypeRef::int()),
            cases: vec![SwitchCase::new(
                vec![builder::int(2)],
                vec![Stmt::synthetic(StmtKind::Break(None))],
            )],
        });
        let outer = Stmt::synthetic(StmtKind::Switch {
            selector: Expr::local(x, TypeRef::int()),
            cases: vec![SwitchCase::new(
                vec![builder::int(1)],
                vec![inner, Stmt::synthetic(StmtKind::Break(None))],
            )],
        });
        let stmts = lower_body(&cache, c, run, vec![outer]);
        let (outer_label, block) = lowered_block(&stmts[0]);
        assert_eq!(outer_label, "switch$1");
        let (_, body) = if_parts(&block[1]);
        let (inner_label, inner_block) = lowered_block(&body[0]);
        assert_eq!(inner_label, "switch$0");
        let (_, inner_body) = if_parts(&inner_block[1]);
        assert_eq!(inner_body[0].kind, StmtKind::Break(Some("switch$0".into())));
        assert_eq!(body[1].kind, StmtKind::Break(Some("switch$1".into())));
    }
}
