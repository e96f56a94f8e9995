//! Debug printer for resolved programs
//!
//! Renders a compilation unit as indented pseudo-source with binding names
//! resolved through the cache. Used by `transarc dump` and by tests that want
//! a readable picture of what a pass produced. The output is not meant to be
//! parsed back.

use crate::builder::describe_type;
use crate::{
    BindingCache, BindingId, Block, CompilationUnit, Expr, ExprKind, Literal, Member, Stmt,
    StmtKind, TeardownStep, TypeDecl, UnaryOp,
};

/// Helper to generate indentation string (two spaces per level).
fn indent_str(level: usize) -> String {
    "  ".repeat(level)
}

fn escape_string(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            _ => result.push(c),
        }
    }
    result
}

pub fn print_unit(unit: &CompilationUnit, cache: &BindingCache) -> String {
    let mut printer = Printer::new(cache);
    printer.unit(unit);
    printer.out
}

pub fn print_expr(expr: &Expr, cache: &BindingCache) -> String {
    Printer::new(cache).expr(expr)
}

struct Printer<'a> {
    cache: &'a BindingCache,
    out: String,
    level: usize,
}

impl<'a> Printer<'a> {
    fn new(cache: &'a BindingCache) -> Self {
        Self {
            cache,
            out: String::new(),
            level: 0,
        }
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(&indent_str(self.level));
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn name(&self, id: BindingId) -> String {
        self.cache.name_of(id)
    }

    fn unit(&mut self, unit: &CompilationUnit) {
        self.line(&format!("// {}", unit.path));
        self.line(&format!("package {};", unit.package));
        for import in &unit.imports {
            self.line(&format!("import {};", self.cache.qualified_of(*import)));
        }
        for decl in &unit.types {
            self.type_decl(decl);
        }
    }

    fn type_decl(&mut self, decl: &TypeDecl) {
        let binding = self.cache.get(decl.binding);
        let keyword = match binding.as_ref().and_then(|b| b.as_type()) {
            Some(t) if t.is_interface() => "interface",
            _ => "class",
        };
        let mut header = format!("{} {}", keyword, self.cache.qualified_of(decl.binding));
        if let Some(t) = binding.as_ref().and_then(|b| b.as_type()) {
            if let Some(sup) = t.superclass {
                header.push_str(&format!(" extends {}", self.name(sup)));
            }
            if !t.interfaces.is_empty() {
                let names: Vec<_> = t.interfaces.iter().map(|i| self.name(*i)).collect();
                header.push_str(&format!(" implements {}", names.join(", ")));
            }
        }
        self.line(&format!("{} {{", header));
        self.level += 1;
        for member in &decl.members {
            self.member(member);
        }
        self.level -= 1;
        self.line("}");
    }

    fn member(&mut self, member: &Member) {
        match member {
            Member::Field(f) => {
                let binding = self.cache.get(f.binding);
                let ty = binding
                    .as_ref()
                    .and_then(|b| b.value_type())
                    .map(|t| describe_type(self.cache, t))
                    .unwrap_or_default();
                let mut text = String::new();
                if binding.as_ref().is_some_and(|b| b.is_static) {
                    text.push_str("static ");
                }
                if let Some(kind) = f.meta.ownership {
                    text.push_str(&format!("[{:?}] ", kind));
                }
                text.push_str(&format!("{} {}", ty, self.name(f.binding)));
                if let Some(init) = &f.init {
                    text.push_str(&format!(" = {}", self.expr(init)));
                }
                text.push(';');
                self.line(&text);
            }
            Member::Method(m) => {
                let params: Vec<_> = m
                    .params
                    .iter()
                    .map(|p| {
                        let ty = self
                            .cache
                            .get(*p)
                            .and_then(|b| b.value_type().map(|t| describe_type(self.cache, t)))
                            .unwrap_or_default();
                        format!("{} {}", ty, self.name(*p))
                    })
                    .collect();
                let signature = format!("{}({})", self.name(m.binding), params.join(", "));
                match &m.body {
                    Some(body) => {
                        self.line(&format!("{} {{", signature));
                        self.block_contents(body);
                        self.line("}");
                    }
                    None => self.line(&format!("{};", signature)),
                }
            }
            Member::Initializer(i) => {
                self.line(if i.is_static { "static {" } else { "{" });
                self.block_contents(&i.body);
                self.line("}");
            }
            Member::Type(t) => self.type_decl(t),
            Member::Destructor(d) => {
                self.line("destructor {");
                self.level += 1;
                if let Some(fin) = d.finalizer {
                    self.line(&format!("{}();", self.name(fin)));
                }
                for step in &d.steps {
                    let text = match step {
                        TeardownStep::Release(f) => format!("release {};", self.name(*f)),
                        TeardownStep::Clear(f) => format!("clear {};", self.name(*f)),
                    };
                    self.line(&text);
                }
                self.level -= 1;
                self.line("}");
            }
        }
    }

    fn block_contents(&mut self, block: &Block) {
        self.level += 1;
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
        self.level -= 1;
    }

    fn nested(&mut self, header: &str, body: &Stmt) {
        self.line(&format!("{} {{", header));
        match &body.kind {
            StmtKind::Block(b) => self.block_contents(b),
            _ => {
                self.level += 1;
                self.stmt(body);
                self.level -= 1;
            }
        }
        self.line("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Local { var, init } => {
                let ty = self
                    .cache
                    .get(*var)
                    .and_then(|b| b.value_type().map(|t| describe_type(self.cache, t)))
                    .unwrap_or_default();
                match init {
                    Some(init) => {
                        let text = format!("{} {} = {};", ty, self.name(*var), self.expr(init));
                        self.line(&text)
                    }
                    None => self.line(&format!("{} {};", ty, self.name(*var))),
                }
            }
            StmtKind::Expr(e) => {
                let text = format!("{};", self.expr(e));
                self.line(&text);
            }
            StmtKind::Block(b) => {
                self.line("{");
                self.block_contents(b);
                self.line("}");
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let header = format!("if ({})", self.expr(cond));
                self.nested(&header, then_branch);
                if let Some(else_branch) = else_branch {
                    self.nested("else", else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                let header = format!("while ({})", self.expr(cond));
                self.nested(&header, body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.nested("do", body);
                let text = format!("while ({});", self.expr(cond));
                self.line(&text);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                self.line("for-init {");
                self.level += 1;
                for s in init {
                    self.stmt(s);
                }
                self.level -= 1;
                self.line("}");
                let cond = cond.as_ref().map(|c| self.expr(c)).unwrap_or_default();
                let update: Vec<_> = update.iter().map(|u| self.expr(u)).collect();
                self.nested(&format!("for (; {}; {})", cond, update.join(", ")), body);
            }
            StmtKind::Switch { selector, cases } => {
                let text = format!("switch ({}) {{", self.expr(selector));
                self.line(&text);
                for case in cases {
                    let header = if case.is_default() {
                        "default:".to_string()
                    } else {
                        format!("case {}:", self.exprs(&case.labels))
                    };
                    self.line(&header);
                    self.level += 1;
                    for s in &case.body {
                        self.stmt(s);
                    }
                    self.level -= 1;
                }
                self.line("}");
            }
            StmtKind::ForEach {
                var,
                iterable,
                body,
            } => {
                let header = format!("for ({} : {})", self.name(*var), self.expr(iterable));
                self.nested(&header, body);
            }
            StmtKind::Return(value) => match value {
                Some(v) => {
                    let text = format!("return {};", self.expr(v));
                    self.line(&text);
                }
                None => self.line("return;"),
            },
            StmtKind::Break(label) => match label {
                Some(l) => self.line(&format!("break {};", l)),
                None => self.line("break;"),
            },
            StmtKind::Continue(label) => match label {
                Some(l) => self.line(&format!("continue {};", l)),
                None => self.line("continue;"),
            },
            StmtKind::Labeled { label, body } => self.nested(&format!("{}:", label), body),
            StmtKind::Throw(e) => {
                let text = format!("throw {};", self.expr(e));
                self.line(&text);
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                self.line("try {");
                self.block_contents(body);
                for catch in catches {
                    self.line(&format!("}} catch ({}) {{", self.name(catch.var)));
                    self.block_contents(&catch.body);
                }
                if let Some(finally) = finally {
                    self.line("} finally {");
                    self.block_contents(finally);
                }
                self.line("}");
            }
            StmtKind::Synchronized { lock, body } => {
                let text = format!("synchronized ({}) {{", self.expr(lock));
                self.line(&text);
                self.block_contents(body);
                self.line("}");
            }
            StmtKind::LocalType(decl) => self.type_decl(decl),
            StmtKind::Empty => self.line(";"),
        }
    }

    fn exprs(&self, exprs: &[Expr]) -> String {
        exprs
            .iter()
            .map(|e| self.expr(e))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn expr(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Null => "null".into(),
                Literal::Bool(b) => b.to_string(),
                Literal::Int(i) => i.to_string(),
                Literal::Float(f) => format!("{:?}", f),
                Literal::Str(s) => format!("\"{}\"", escape_string(s)),
            },
            ExprKind::This => "this".into(),
            ExprKind::OuterThis(ty) => format!("{}.this", self.name(*ty)),
            ExprKind::Local(var) => self.name(*var),
            ExprKind::Field { target, field } => match target {
                Some(t) => format!("{}.{}", self.expr(t), self.name(*field)),
                None => self.name(*field),
            },
            ExprKind::Call {
                target,
                method,
                args,
                is_super,
            } => {
                let receiver = match (target, is_super) {
                    (_, true) => "super.".to_string(),
                    (Some(t), false) => format!("{}.", self.expr(t)),
                    (None, false) => String::new(),
                };
                format!("{}{}({})", receiver, self.name(*method), self.exprs(args))
            }
            ExprKind::New {
                class,
                args,
                outer,
                body,
                ..
            } => {
                let outer = outer
                    .as_ref()
                    .map(|o| format!("{}.", self.expr(o)))
                    .unwrap_or_default();
                let body = if body.is_some() { " { .. }" } else { "" };
                format!("{}new {}({}){}", outer, self.name(*class), self.exprs(args), body)
            }
            ExprKind::Lambda { params, .. } => {
                let params: Vec<_> = params.iter().map(|p| self.name(*p)).collect();
                format!("({}) -> {{ .. }}", params.join(", "))
            }
            ExprKind::MethodRef {
                receiver, target, ..
            } => {
                let owner = match receiver {
                    Some(r) => self.expr(r),
                    None => self
                        .cache
                        .declaring_type_of(*target)
                        .map(|t| self.name(t))
                        .unwrap_or_default(),
                };
                format!("{}::{}", owner, self.name(*target))
            }
            ExprKind::NewArray {
                element,
                dims,
                init,
            } => {
                let dims: String = dims.iter().map(|d| format!("[{}]", self.expr(d))).collect();
                match init {
                    Some(init) => format!(
                        "new {}{}{{{}}}",
                        describe_type(self.cache, element),
                        dims,
                        self.exprs(init)
                    ),
                    None => format!("new {}{}", describe_type(self.cache, element), dims),
                }
            }
            ExprKind::Index { array, index } => {
                format!("{}[{}]", self.expr(array), self.expr(index))
            }
            ExprKind::Length(array) => format!("{}.length", self.expr(array)),
            ExprKind::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                    UnaryOp::Not => "!",
                    UnaryOp::BitNot => "~",
                };
                format!("{}{}", symbol, self.expr(operand))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                format!("({} {} {})", self.expr(lhs), op.symbol(), self.expr(rhs))
            }
            ExprKind::Assign { op, target, value } => {
                let symbol = op.map(|o| format!("{}=", o.symbol())).unwrap_or("=".into());
                format!("{} {} {}", self.expr(target), symbol, self.expr(value))
            }
            ExprKind::Step { op, prefix, target } => {
                let symbol = match op {
                    crate::StepOp::Increment => "++",
                    crate::StepOp::Decrement => "--",
                };
                if *prefix {
                    format!("{}{}", symbol, self.expr(target))
                } else {
                    format!("{}{}", self.expr(target), symbol)
                }
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => format!(
                "({} ? {} : {})",
                self.expr(cond),
                self.expr(then_expr),
                self.expr(else_expr)
            ),
            ExprKind::Cast { expr: inner } => {
                format!("({}) {}", describe_type(self.cache, &expr.ty), self.expr(inner))
            }
            ExprKind::InstanceOf { expr: inner, class } => {
                format!("{} instanceof {}", self.expr(inner), describe_type(self.cache, class))
            }
            ExprKind::Box(inner) => format!("box({})", self.expr(inner)),
            ExprKind::Unbox(inner) => format!("unbox({})", self.expr(inner)),
            ExprKind::Intrinsic { func, args } => {
                format!("@{}({})", func.runtime_name(), self.exprs(args))
            }
            ExprKind::Reflective { description, args } => {
                format!("reflect<{}>({})", description, self.exprs(args))
            }
            ExprKind::DynamicLoad { name } => format!("load<{}>", name),
        }
    }
}
