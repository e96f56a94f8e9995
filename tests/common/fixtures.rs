use transarc::ast::builder::{self, ProgramBuilder};
use transarc::ast::{
    BinaryOp, BindingCache, BindingId, Block, CompilationUnit, Expr, ExprKind, FieldAnnotation,
    Member, MethodDecl, Stmt, StmtKind, SwitchCase, TypeDecl, TypeRef,
};
use transarc::driver::{BatchConfig, BatchSession, Input, MemoryEmitter, BatchReport, FinalizedUnit};

/// A resolved program ready to be handed to a session
pub struct Batch {
    pub cache: BindingCache,
    pub inputs: Vec<Input>,
}

impl Batch {
    pub fn id(&self, qualified: &str) -> BindingId {
        self.cache
            .lookup(qualified)
            .unwrap_or_else(|| panic!("no binding {}", qualified))
    }
}

/// One input per unit, named after the unit's path
pub fn inputs_of(units: Vec<CompilationUnit>) -> Vec<Input> {
    units
        .into_iter()
        .map(|unit| Input::new(unit.path.clone(), vec![unit]))
        .collect()
}

pub fn config() -> BatchConfig {
    BatchConfig::default().with_workers(3)
}

/// Run a batch in memory and return the report with the emitted units
pub fn translate(batch: Batch, config: BatchConfig) -> (BatchReport, Vec<FinalizedUnit>) {
    let session = BatchSession::new(config, batch.cache).expect("session");
    let emitter = MemoryEmitter::new();
    let report = session.run(batch.inputs, &emitter).expect("batch run");
    (report, emitter.into_units())
}

/// `p.A -> p.B -> p.C -> p.A` across three units, with `p.C#a` designated
/// as the owner; `p.D` holds an `A` from outside the cycle
pub fn ownership_ring() -> Batch {
    let cache = BindingCache::new();
    let units = {
        let b = ProgramBuilder::new(&cache);
        let a = b.class("p", "A");
        let bb = b.class("p", "B");
        let c = b.class("p", "C");
        let d = b.class("p", "D");
        let ab = b.field(a, "b", TypeRef::Declared(bb));
        let bc = b.field(bb, "c", TypeRef::Declared(c));
        let ca = b.annotated_field(c, "a", TypeRef::Declared(a), FieldAnnotation::RetainedWith);
        let da = b.field(d, "a", TypeRef::Declared(a));

        let unit = |path: &str, ty: BindingId, field: BindingId| {
            CompilationUnit::new(path, "p")
                .with_type(TypeDecl::new(ty).with_member(builder::field_member(field, None)))
        };
        vec![
            unit("p/A.src", a, ab),
            unit("p/B.src", bb, bc),
            unit("p/C.src", c, ca),
            unit("p/D.src", d, da),
        ]
    };
    Batch {
        inputs: inputs_of(units),
        cache,
    }
}

/// `p.Left <-> p.Right` with no designated owner
pub fn unowned_pair() -> Batch {
    let cache = BindingCache::new();
    let units = {
        let b = ProgramBuilder::new(&cache);
        let left = b.class("p", "Left");
        let right = b.class("p", "Right");
        let lr = b.field(left, "right", TypeRef::Declared(right));
        let rl = b.field(right, "left", TypeRef::Declared(left));
        vec![
            CompilationUnit::new("p/Left.src", "p")
                .with_type(TypeDecl::new(left).with_member(builder::field_member(lr, None))),
            CompilationUnit::new("p/Right.src", "p")
                .with_type(TypeDecl::new(right).with_member(builder::field_member(rl, None))),
        ]
    };
    Batch {
        inputs: inputs_of(units),
        cache,
    }
}

/// Value type `geo.A` holds a reference to class `geo.B`; `geo.B` holds an
/// inline `geo.A`
pub fn pointer_and_inline() -> Batch {
    let cache = BindingCache::new();
    let units = {
        let b = ProgramBuilder::new(&cache);
        let a = b.value_type("geo", "A");
        let bb = b.class("geo", "B");
        let a_to_b = b.field(a, "b", TypeRef::Declared(bb));
        let b_to_a = b.field(bb, "a", TypeRef::Declared(a));
        vec![
            CompilationUnit::new("geo/A.src", "geo")
                .with_type(TypeDecl::new(a).with_member(builder::field_member(a_to_b, None))),
            CompilationUnit::new("geo/B.src", "geo")
                .with_type(TypeDecl::new(bb).with_member(builder::field_member(b_to_a, None))),
        ]
    };
    Batch {
        inputs: inputs_of(units),
        cache,
    }
}

/// `p.Outer#run()` declares local class `Helper` whose `size()` reads the
/// enclosing instance's `items` field
pub fn local_class_capturing_outer() -> Batch {
    let cache = BindingCache::new();
    let units = {
        let b = ProgramBuilder::new(&cache);
        let items = b.class("p", "Items");
        let outer = b.class("p", "Outer");
        let items_field = b.field(outer, "items", TypeRef::Declared(items));
        let run = b.method(outer, "run", vec![], TypeRef::Void);
        let helper = b.local_type(run, "Helper");
        let size = b.method(helper, "size", vec![], TypeRef::Declared(items));

        let helper_decl = TypeDecl::new(helper).with_member(builder::method_member(
            size,
            vec![],
            vec![builder::ret(Some(builder::field_of(
                None,
                items_field,
                TypeRef::Declared(items),
            )))],
        ));
        let outer_decl = TypeDecl::new(outer)
            .with_member(builder::field_member(items_field, None))
            .with_member(builder::method_member(
                run,
                vec![],
                vec![
                    Stmt::synthetic(StmtKind::LocalType(Box::new(helper_decl))),
                    Stmt::expr(builder::new_object(helper, None, vec![])),
                ],
            ));
        vec![
            CompilationUnit::new("p/Items.src", "p").with_type(TypeDecl::new(items)),
            CompilationUnit::new("p/Outer.src", "p").with_type(outer_decl),
        ]
    };
    Batch {
        inputs: inputs_of(units),
        cache,
    }
}

/// `p.Outer#run()` picks `limit` with a switch over `this.mode`, then returns
/// a `p.Check` lambda reading `limit` and `this.items`
pub fn lambda_capturing_outer() -> Batch {
    let cache = BindingCache::new();
    let units = {
        let b = ProgramBuilder::new(&cache);
        let items = b.class("p", "Items");
        let check = b.interface("p", "Check");
        let test = b.method(check, "test", vec![TypeRef::int()], TypeRef::boolean());
        let tested = b.param(test, "value", TypeRef::int());
        let outer = b.class("p", "Outer");
        let items_field = b.field(outer, "items", TypeRef::Declared(items));
        let mode = b.field(outer, "mode", TypeRef::int());
        let run = b.method(outer, "run", vec![], TypeRef::Declared(check));
        let limit = b.local(run, "limit", TypeRef::int());
        let lambda = b.lambda_type(run, check, 1);
        let lambda_test = b.method(lambda, "test", vec![TypeRef::int()], TypeRef::boolean());
        let n = b.param(lambda_test, "n", TypeRef::int());

        let set_limit = |value| {
            Stmt::expr(builder::assign(Expr::local(limit, TypeRef::int()), builder::int(value)))
        };
        let switch = Stmt::synthetic(StmtKind::Switch {
            selector: builder::field_of(Some(builder::this(outer)), mode, TypeRef::int()),
            cases: vec![
                SwitchCase::new(
                    vec![builder::int(0)],
                    vec![set_limit(1), Stmt::synthetic(StmtKind::Break(None))],
                ),
                SwitchCase::new(vec![], vec![set_limit(10)]),
            ],
        });
        // n -> n < limit && this.items != null
        let within = builder::binary(
            BinaryOp::Lt,
            Expr::local(n, TypeRef::int()),
            Expr::local(limit, TypeRef::int()),
            TypeRef::boolean(),
        );
        let present = builder::binary(
            BinaryOp::Ne,
            builder::field_of(Some(builder::this(outer)), items_field, TypeRef::Declared(items)),
            builder::null(),
            TypeRef::boolean(),
        );
        let created = Expr::synthetic(
            ExprKind::Lambda {
                class: lambda,
                method: lambda_test,
                params: vec![n],
                body: Block::new(vec![builder::ret(Some(builder::binary(
                    BinaryOp::And,
                    within,
                    present,
                    TypeRef::boolean(),
                )))]),
            },
            TypeRef::Declared(check),
        );
        let outer_decl = TypeDecl::new(outer)
            .with_member(builder::field_member(items_field, None))
            .with_member(builder::field_member(mode, None))
            .with_member(builder::method_member(
                run,
                vec![],
                vec![
                    builder::declare_local(limit, None),
                    switch,
                    builder::ret(Some(created)),
                ],
            ));
        let check_decl = TypeDecl::new(check)
            .with_member(Member::Method(MethodDecl::new(test, vec![tested], None)));
        vec![
            CompilationUnit::new("p/Check.src", "p").with_type(check_decl),
            CompilationUnit::new("p/Items.src", "p").with_type(TypeDecl::new(items)),
            CompilationUnit::new("p/Outer.src", "p").with_type(outer_decl),
        ]
    };
    Batch {
        inputs: inputs_of(units),
        cache,
    }
}

/// Two healthy units and `p.Loader`, whose `load()` loads a class by name
pub fn with_unsupported_construct() -> Batch {
    let cache = BindingCache::new();
    let units = {
        let b = ProgramBuilder::new(&cache);
        let first = b.class("p", "First");
        let second = b.class("p", "Second");
        let loader = b.class("p", "Loader");
        let link = b.field(first, "second", TypeRef::Declared(second));
        let load = b.method(loader, "load", vec![], TypeRef::Void);
        let dynamic = Stmt::expr(Expr::synthetic(
            ExprKind::DynamicLoad {
                name: "p.Plugin".into(),
            },
            TypeRef::Object,
        ));
        vec![
            CompilationUnit::new("p/First.src", "p")
                .with_type(TypeDecl::new(first).with_member(builder::field_member(link, None))),
            CompilationUnit::new("p/Loader.src", "p").with_type(
                TypeDecl::new(loader)
                    .with_member(builder::method_member(load, vec![], vec![dynamic])),
            ),
            CompilationUnit::new("p/Second.src", "p").with_type(TypeDecl::new(second)),
        ]
    };
    Batch {
        inputs: inputs_of(units),
        cache,
    }
}

/// `app.Main#main()` creates a `lib.Used` and calls `greet()` on it;
/// `lib.Used#shout()` and `lib.Orphan` are never mentioned
pub fn application() -> Batch {
    let cache = BindingCache::new();
    let units = {
        let b = ProgramBuilder::new(&cache);
        let used = b.class("lib", "Used");
        let used_ctor = b.constructor(used, vec![]);
        let greet = b.method(used, "greet", vec![], TypeRef::Void);
        let shout = b.method(used, "shout", vec![], TypeRef::Void);
        let orphan = b.class("lib", "Orphan");
        let orphan_run = b.method(orphan, "run", vec![], TypeRef::Void);
        let main_type = b.class("app", "Main");
        let main = b.static_method(main_type, "main", vec![], TypeRef::Void);
        let helper = b.static_method(main_type, "unusedHelper", vec![], TypeRef::Void);
        let local = b.local(main, "used", TypeRef::Declared(used));

        let main_decl = TypeDecl::new(main_type)
            .with_member(builder::method_member(
                main,
                vec![],
                vec![
                    builder::declare_local(
                        local,
                        Some(builder::new_object(used, Some(used_ctor), vec![])),
                    ),
                    Stmt::expr(builder::call(
                        Some(Expr::local(local, TypeRef::Declared(used))),
                        greet,
                        vec![],
                        TypeRef::Void,
                    )),
                ],
            ))
            .with_member(builder::method_member(helper, vec![], vec![]));
        let mut main_unit = CompilationUnit::new("app/Main.src", "app").with_type(main_decl);
        main_unit.imports = vec![used];

        vec![
            main_unit,
            CompilationUnit::new("lib/Used.src", "lib").with_type(
                TypeDecl::new(used)
                    .with_member(builder::method_member(used_ctor, vec![], vec![]))
                    .with_member(builder::method_member(greet, vec![], vec![]))
                    .with_member(builder::method_member(shout, vec![], vec![])),
            ),
            CompilationUnit::new("lib/Orphan.src", "lib").with_type(
                TypeDecl::new(orphan).with_member(Member::Method(
                    transarc::ast::MethodDecl::new(orphan_run, vec![], None),
                )),
            ),
        ]
    };
    Batch {
        inputs: inputs_of(units),
        cache,
    }
}

/// Same simple names in two packages that share a prefix
pub fn colliding_names() -> Batch {
    let cache = BindingCache::new();
    let units = {
        let b = ProgramBuilder::new(&cache);
        let x = b.class("x", "Node");
        let y = b.class("y", "Node");
        let x_next = b.field(x, "next", TypeRef::Declared(x));
        let y_value = b.field(y, "value", TypeRef::int());
        let y_get = b.method(y, "get", vec![TypeRef::int()], TypeRef::int());
        let index = b.param(y_get, "index", TypeRef::int());
        vec![
            CompilationUnit::new("x/Node.src", "x")
                .with_type(TypeDecl::new(x).with_member(builder::field_member(x_next, None))),
            CompilationUnit::new("y/Node.src", "y").with_type(
                TypeDecl::new(y)
                    .with_member(builder::field_member(y_value, None))
                    .with_member(builder::method_member(
                        y_get,
                        vec![index],
                        vec![builder::ret(Some(builder::int(0)))],
                    )),
            ),
        ]
    };
    Batch {
        inputs: inputs_of(units),
        cache,
    }
}
