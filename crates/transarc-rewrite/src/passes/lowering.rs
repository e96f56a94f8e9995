//! Array and operator lowering
//!
//! Operations whose target-language counterpart has different semantics
//! become runtime calls: array access, store, length and creation; integer
//! division and remainder (unless the divisor is a literal other than `0` and
//! `-1`); shifts, whose distance is masked to the operand width; floating
//! remainder; floating-to-integral casts; and string concatenation.

use transarc_ast::fold::{self, Folder};
use transarc_ast::{
    BinaryOp, CompilationUnit, Expr, ExprKind, Intrinsic, Literal, PrimitiveType, Span, TypeRef,
};

use crate::{Pass, PassContext};

pub struct ArrayOperatorLowering;

impl Pass for ArrayOperatorLowering {
    fn name(&self) -> &'static str {
        "array-operator-lowering"
    }

    fn run(&self, unit: CompilationUnit, _ctx: &mut PassContext<'_>) -> CompilationUnit {
        Lowerer.fold_unit(unit)
    }
}

struct Lowerer;

fn intrinsic(func: Intrinsic, args: Vec<Expr>, ty: TypeRef, span: Span) -> Expr {
    Expr::new(ExprKind::Intrinsic { func, args }, ty, span)
}

/// Divisor that can neither trap nor overflow
fn is_safe_divisor(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(Literal::Int(v)) if v != 0 && v != -1)
}

/// Arithmetic type of a binary operation on two primitives
fn promoted(lhs: &TypeRef, rhs: &TypeRef) -> Option<PrimitiveType> {
    let (l, r) = (lhs.as_primitive()?, rhs.as_primitive()?);
    let either = |p: PrimitiveType| l == p || r == p;
    Some(if either(PrimitiveType::Double) {
        PrimitiveType::Double
    } else if either(PrimitiveType::Float) {
        PrimitiveType::Float
    } else if either(PrimitiveType::Long) {
        PrimitiveType::Long
    } else {
        PrimitiveType::Int
    })
}

/// Side-effect free slot that can be read and written again
fn is_repeatable(place: &Expr) -> bool {
    match &place.kind {
        ExprKind::Local(_) => true,
        ExprKind::Field { target, .. } => target.as_deref().map_or(true, |t| {
            matches!(t.kind, ExprKind::This | ExprKind::Local(_))
        }),
        _ => false,
    }
}

fn strip_dimensions(ty: &TypeRef, levels: usize) -> TypeRef {
    let mut current = ty;
    for _ in 0..levels {
        match current.element_type() {
            Some(element) => current = element,
            None => break,
        }
    }
    current.clone()
}

/// Lowered form of `lhs op rhs`; the operands come back untouched when the
/// operator maps directly
fn lower_binary(
    op: BinaryOp,
    lhs: Expr,
    rhs: Expr,
    ty: &TypeRef,
    span: Span,
) -> Result<Expr, (Expr, Expr)> {
    match op {
        BinaryOp::Add if ty.is_string() => {
            let mut parts = Vec::new();
            for part in [lhs, rhs] {
                match part.kind {
                    ExprKind::Intrinsic {
                        func: Intrinsic::StringConcat,
                        args,
                    } => parts.extend(args),
                    kind => parts.push(Expr {
                        kind,
                        ty: part.ty,
                        span: part.span,
                    }),
                }
            }
            Ok(intrinsic(Intrinsic::StringConcat, parts, TypeRef::String, span))
        }
        BinaryOp::Div | BinaryOp::Rem => match promoted(&lhs.ty, &rhs.ty) {
            Some(_) if is_safe_divisor(&rhs) => Err((lhs, rhs)),
            Some(p) if p.is_integral() => {
                let func = if op == BinaryOp::Div {
                    Intrinsic::CheckedDiv(p)
                } else {
                    Intrinsic::CheckedRem(p)
                };
                Ok(intrinsic(func, vec![lhs, rhs], ty.clone(), span))
            }
            _ if op == BinaryOp::Rem && ty.as_primitive().is_some_and(|t| t.is_floating()) => {
                Ok(intrinsic(Intrinsic::FloatRem, vec![lhs, rhs], ty.clone(), span))
            }
            _ => Err((lhs, rhs)),
        },
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => match lhs.ty.as_primitive() {
            Some(p) if p.is_integral() => Ok(intrinsic(
                Intrinsic::MaskedShift {
                    op,
                    bits: p.promoted_bits(),
                },
                vec![lhs, rhs],
                ty.clone(),
                span,
            )),
            _ => Err((lhs, rhs)),
        },
        _ => Err((lhs, rhs)),
    }
}

impl Lowerer {
    /// Fold the parts of a written slot without turning it into a read
    fn fold_place(&mut self, place: Expr) -> Expr {
        let Expr { kind, ty, span } = place;
        let kind = match kind {
            ExprKind::Index { array, index } => ExprKind::Index {
                array: Box::new(self.fold_expr(*array)),
                index: Box::new(self.fold_expr(*index)),
            },
            ExprKind::Field { target, field } => ExprKind::Field {
                target: target.map(|t| Box::new(self.fold_expr(*t))),
                field,
            },
            other => other,
        };
        Expr { kind, ty, span }
    }

    fn lower_assign(
        &mut self,
        op: Option<BinaryOp>,
        target: Expr,
        value: Expr,
        ty: TypeRef,
        span: Span,
    ) -> Expr {
        let target = self.fold_place(target);
        let value = self.fold_expr(value);
        let target_ty = target.ty.clone();

        let target = match target.kind {
            ExprKind::Index { array, index } => {
                let func = match op {
                    None => Intrinsic::ArraySet,
                    Some(op) => Intrinsic::ArrayCompoundAssign(op),
                };
                return intrinsic(func, vec![*array, *index, value], ty, span);
            }
            kind => Expr {
                kind,
                ty: target.ty,
                span: target.span,
            },
        };

        // `x op= y` on a repeatable slot becomes `x = x op y` when the
        // operator itself lowers
        if let Some(op) = op.filter(|_| is_repeatable(&target)) {
            let combined_ty = match (op, &target_ty) {
                (BinaryOp::Add, TypeRef::String) => TypeRef::String,
                _ => promoted(&target_ty, &value.ty)
                    .map(TypeRef::Primitive)
                    .unwrap_or_else(|| target_ty.clone()),
            };
            match lower_binary(op, target.clone(), value, &combined_ty, span) {
                Ok(lowered) => {
                    let lowered = if lowered.ty != target_ty {
                        Expr::new(
                            ExprKind::Cast {
                                expr: Box::new(lowered),
                            },
                            target_ty,
                            span,
                        )
                    } else {
                        lowered
                    };
                    return Expr::new(
                        ExprKind::Assign {
                            op: None,
                            target: Box::new(target),
                            value: Box::new(lowered),
                        },
                        ty,
                        span,
                    );
                }
                Err((target, value)) => {
                    return Expr::new(
                        ExprKind::Assign {
                            op: Some(op),
                            target: Box::new(target),
                            value: Box::new(value),
                        },
                        ty,
                        span,
                    );
                }
            }
        }

        Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            ty,
            span,
        )
    }
}

impl Folder for Lowerer {
    fn fold_expr(&mut self, expr: Expr) -> Expr {
        let Expr { kind, ty, span } = expr;
        match kind {
            ExprKind::Assign { op, target, value } => {
                self.lower_assign(op, *target, *value, ty, span)
            }
            ExprKind::Step { op, prefix, target } => {
                let target = self.fold_place(*target);
                match target.kind {
                    ExprKind::Index { array, index } => intrinsic(
                        Intrinsic::ArrayStep { op, prefix },
                        vec![*array, *index],
                        ty,
                        span,
                    ),
                    kind => Expr::new(
                        ExprKind::Step {
                            op,
                            prefix,
                            target: Box::new(Expr {
                                kind,
                                ty: target.ty,
                                span: target.span,
                            }),
                        },
                        ty,
                        span,
                    ),
                }
            }
            ExprKind::Index { array, index } => {
                let array = self.fold_expr(*array);
                let index = self.fold_expr(*index);
                intrinsic(Intrinsic::ArrayGet, vec![array, index], ty, span)
            }
            ExprKind::Length(array) => {
                let array = self.fold_expr(*array);
                intrinsic(Intrinsic::ArrayLength, vec![array], ty, span)
            }
            ExprKind::NewArray {
                element: _,
                dims,
                init,
            } => match init {
                Some(items) => {
                    let items = items.into_iter().map(|e| self.fold_expr(e)).collect();
                    let element = strip_dimensions(&ty, 1);
                    intrinsic(Intrinsic::ArrayInit { element }, items, ty, span)
                }
                None => {
                    let dims: Vec<Expr> = dims.into_iter().map(|e| self.fold_expr(e)).collect();
                    let element = strip_dimensions(&ty, dims.len());
                    let dimensions = dims.len();
                    intrinsic(Intrinsic::ArrayCreate { element, dimensions }, dims, ty, span)
                }
            },
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.fold_expr(*lhs);
                let rhs = self.fold_expr(*rhs);
                match lower_binary(op, lhs, rhs, &ty, span) {
                    Ok(lowered) => lowered,
                    Err((lhs, rhs)) => Expr::new(
                        ExprKind::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        ty,
                        span,
                    ),
                }
            }
            ExprKind::Cast { expr: inner } => {
                let inner = self.fold_expr(*inner);
                let from_float = inner.ty.as_primitive().is_some_and(|p| p.is_floating());
                match ty.as_primitive() {
                    Some(to) if from_float && to.is_integral() => {
                        intrinsic(Intrinsic::FloatToIntegral(to), vec![inner], ty, span)
                    }
                    _ => Expr::new(
                        ExprKind::Cast {
                            expr: Box::new(inner),
                        },
                        ty,
                        span,
                    ),
                }
            }
            kind => fold::walk_expr(self, Expr { kind, ty, span }),
        }
    }
}
