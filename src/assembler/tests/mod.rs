// End-to-end tests: compile IR programs and run the assembly on the
// simulator in `sim`.


use std::collections::BTreeMap;
use std::path::Path;

use sim::Machine;

use crate::assembler::assembler::{
    analyze_function, compile_program, compile_to_lines, read_program, CompileOptions,
};
use crate::assembler::codegen::{CodeGenerator, FuncContext};
use crate::assembler::liveness::compute_liveness;
use crate::assembler::reg_alloc::Allocation;
use crate::assembler::x86::{AsmLine, PhysReg};
use crate::cfg::three_address_code::{
    Addr, BinOp, CallTgt, Const, Data, Func, FuncBuilder, Inst, Program, Reg, RelOp, Src, Type,
    UnOp,
};
use crate::error::CodegenError;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn program(funcs: Vec<Func>) -> Program {
    Program { data: vec![], funcs }
}

fn machine(program: &Program, opts: &CompileOptions) -> Machine {
    Machine::new(compile_to_lines(program, opts).unwrap())
}

fn run(program: &Program, name: &str, args: &[i64]) -> i64 {
    machine(program, &CompileOptions::default()).run(name, args)
}

fn asm(program: &Program) -> String {
    compile_program(program, &CompileOptions::default()).unwrap()
}

fn instr_count(lines: &[AsmLine]) -> usize {
    lines.iter().filter(|l| l.is_instr()).count()
}

fn indirect(tgt: CallTgt, args: Vec<Src>, rdst: &Reg) -> Inst {
    Inst::Call {
        tgt,
        ind: true,
        args,
        rdst: Some(rdst.clone()),
    }
}

/// sub(x, y) = x - y
fn sub_func() -> Func {
    let mut b = FuncBuilder::new("sub", &["x", "y"]);
    let d = b.temp();
    b.label("L0")
        .binop(BinOp::Sub, &d, Src::id("x"), Src::id("y"))
        .ret(Some(Src::Reg(d.clone())))
        .label("L1");
    b.finish()
}

/// digits(x, y, z) = 100x + 10y + z
fn digits_func() -> Func {
    let mut b = FuncBuilder::new("digits", &["x", "y", "z"]);
    let t1 = b.temp();
    let t2 = b.temp();
    let t3 = b.temp();
    let t4 = b.temp();
    b.label("L0")
        .binop(BinOp::Mul, &t1, Src::id("x"), 100)
        .binop(BinOp::Mul, &t2, Src::id("y"), 10)
        .binop(BinOp::Add, &t3, &t1, &t2)
        .binop(BinOp::Add, &t4, &t3, Src::id("z"))
        .ret(Some(Src::Reg(t4.clone())))
        .label("L1");
    b.finish()
}

// ---------------------------------------------------------------------------
// Whole programs
// ---------------------------------------------------------------------------

#[test]
fn factorial_fixture() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/factorial.json");
    let program = read_program(&path).unwrap();

    let mut m = machine(&program, &CompileOptions::default());
    assert_eq!(m.run("main", &[]), 3628800);
    assert_eq!(m.output, vec!["3628800"]);

    assert_eq!(run(&program, "fact", &[5]), 120);
    assert_eq!(run(&program, "fact", &[0]), 1);
}

#[test]
fn loop_carried_registers_keep_one_location() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/factorial.json");
    let program = read_program(&path).unwrap();
    let analysis = analyze_function(&program.funcs[0], &CompileOptions::default()).unwrap();

    let t = analysis.alloc.get(&Reg::id("t")).unwrap();
    let i = analysis.alloc.get(&Reg::id("i")).unwrap();
    let n = analysis.alloc.get(&Reg::id("n")).unwrap();
    assert_ne!(t, i);
    assert_ne!(t, n);
    assert_ne!(i, n);

    let text = asm(&program);
    assert!(text.contains(&format!("    imulq {}, {}", i, t)));
    assert!(text.contains(&format!("    addq $1, {}", i)));
    assert!(text.contains("    # 4. if i > n goto L2"));
    assert!(text.contains("    jg F0_L2"));
    assert!(text.contains("    jmp F0_L1"));
}

#[test]
fn read_program_reports_missing_file() {
    let err = read_program(Path::new("/nonexistent/prog.json")).unwrap_err();
    assert!(err.to_string().contains("cannot read"));
}

#[test]
fn recursive_factorial() {
    let mut b = FuncBuilder::new("fact", &["n"]);
    let m = b.temp();
    let r = b.temp();
    let t = b.temp();
    b.label("L0")
        .cjump(RelOp::Gt, Src::id("n"), 1, "L1")
        .ret(Some(Src::Int(1)))
        .label("L1")
        .binop(BinOp::Sub, &m, Src::id("n"), 1)
        .call("fact", vec![Src::Reg(m.clone())], Some(&r))
        .binop(BinOp::Mul, &t, Src::id("n"), &r)
        .ret(Some(Src::Reg(t.clone())))
        .label("L2");
    let p = program(vec![b.finish()]);
    assert_eq!(run(&p, "fact", &[10]), 3628800);
    assert_eq!(run(&p, "fact", &[1]), 1);
}

#[test]
fn arguments_are_swapped_in_place() {
    // main(a, b) = sub(b, a)
    let mut b = FuncBuilder::new("main", &["a", "b"]);
    let r = b.temp();
    b.label("L0")
        .call("sub", vec![Src::id("b"), Src::id("a")], Some(&r))
        .ret(Some(Src::Reg(r.clone())))
        .label("L1");
    let p = program(vec![sub_func(), b.finish()]);
    assert_eq!(run(&p, "main", &[10, 3]), -7);
}

#[test]
fn arguments_are_rotated() {
    // rot(a, b, c) = digits(c, a, b)
    let mut b = FuncBuilder::new("rot", &["a", "b", "c"]);
    let r = b.temp();
    b.label("L0")
        .call("digits", vec![Src::id("c"), Src::id("a"), Src::id("b")], Some(&r))
        .ret(Some(Src::Reg(r.clone())))
        .label("L1");
    let p = program(vec![digits_func(), b.finish()]);
    assert_eq!(run(&p, "rot", &[1, 2, 3]), 312);
}

#[test]
fn values_survive_external_calls() {
    // s = 0; for i in 1..=3 { printInt(i); s += i }; return s
    let mut b = FuncBuilder::new("main", &[]);
    let s = b.local("s");
    let i = b.local("i");
    b.label("L0")
        .mov(&s, 0)
        .mov(&i, 1)
        .label("L1")
        .cjump(RelOp::Gt, &i, 3, "L2")
        .call("printInt", vec![Src::Reg(i.clone())], None)
        .binop(BinOp::Add, &s, &s, &i)
        .binop(BinOp::Add, &i, &i, 1)
        .jump("L1")
        .label("L2")
        .ret(Some(Src::Reg(s.clone())))
        .label("L3");
    let p = program(vec![b.finish()]);
    let mut m = machine(&p, &CompileOptions::default());
    assert_eq!(m.run("main", &[]), 6);
    assert_eq!(m.output, vec!["1", "2", "3"]);
}

#[test]
fn caller_saved_values_are_pushed_around_calls() {
    // eight values live across a call: six callee-saved registers are not
    // enough, so two end up caller-saved and must be pushed
    let mut b = FuncBuilder::new("main", &["a"]);
    let vs: Vec<Reg> = (0..8).map(|_| b.temp()).collect();
    b.label("L0");
    for (k, v) in vs.iter().enumerate() {
        b.binop(BinOp::Add, v, Src::id("a"), k as i32);
    }
    b.call("printInt", vec![Src::id("a")], None);
    let mut acc = b.temp();
    b.mov(&acc, 0);
    for v in &vs {
        let next = b.temp();
        b.binop(BinOp::Add, &next, &acc, v);
        acc = next;
    }
    b.ret(Some(Src::Reg(acc.clone()))).label("L1");
    let p = program(vec![b.finish()]);

    let text = asm(&p);
    let call_at = text.find("    call _printInt").unwrap();
    assert!(text[..call_at].matches("    pushq").count() > 6);

    let mut m = machine(&p, &CompileOptions::default());
    // 8a + (0 + 1 + ... + 7)
    assert_eq!(m.run("main", &[5]), 68);
    assert_eq!(m.output, vec!["5"]);
}

#[test]
fn indirect_calls_through_a_table() {
    // add(x, y) = x + y
    let mut add = FuncBuilder::new("add", &["x", "y"]);
    let d = add.temp();
    add.label("L0")
        .binop(BinOp::Add, &d, Src::id("x"), Src::id("y"))
        .ret(Some(Src::Reg(d.clone())))
        .label("L1");

    let mut b = FuncBuilder::new("main", &["a", "b"]);
    let f = b.temp();
    let r1 = b.temp();
    let r2 = b.temp();
    let g = b.temp();
    let r3 = b.temp();
    b.label("L0")
        .push(Inst::Load {
            ty: Type::Ptr,
            dst: f.clone(),
            addr: Addr::new(Src::Global("ops".into()), 8),
        })
        .push(indirect(CallTgt::Reg(f.clone()), vec![Src::id("a"), Src::id("b")], &r1))
        .push(indirect(
            CallTgt::Global("ops".into()),
            vec![Src::Reg(r1.clone()), Src::id("b")],
            &r2,
        ))
        .mov(&g, Src::Global("sub".into()))
        .push(indirect(CallTgt::Reg(g.clone()), vec![Src::Reg(r2.clone()), Src::Int(4)], &r3))
        .ret(Some(Src::Reg(r3.clone())))
        .label("L1");

    let p = Program {
        data: vec![Data {
            name: "ops".into(),
            size: 16,
            items: vec![Const::Global("sub".into()), Const::Global("add".into())],
        }],
        funcs: vec![sub_func(), add.finish(), b.finish()],
    };
    let text = asm(&p);
    assert!(text.starts_with(".text\n.globl _ops\n_ops:\n    .quad _sub\n    .quad _add\n"));
    assert!(text.contains("    call *_ops(%rip)"));
    assert!(text.contains("    leaq _sub(%rip), "));

    // add(10, 3) = 13, sub(13, 3) = 10, sub(10, 4) = 6
    assert_eq!(run(&p, "main", &[10, 3]), 6);
}

#[test]
fn indirect_target_in_an_argument_register() {
    // apply(x, y, fp) = fp(x, y, 5); fp arrives in %rdx, which the call needs
    let mut b = FuncBuilder::new("apply", &["x", "y", "fp"]);
    let r = b.temp();
    b.label("L0")
        .push(indirect(
            CallTgt::Reg(Reg::id("fp")),
            vec![Src::id("x"), Src::id("y"), Src::Int(5)],
            &r,
        ))
        .ret(Some(Src::Reg(r.clone())))
        .label("L1");
    let apply = b.finish();

    let mut b = FuncBuilder::new("main", &[]);
    let g = b.temp();
    let r = b.temp();
    b.label("L0")
        .mov(&g, Src::Global("digits".into()))
        .call("apply", vec![Src::Int(1), Src::Int(2), Src::Reg(g.clone())], Some(&r))
        .ret(Some(Src::Reg(r.clone())))
        .label("L1");

    let p = program(vec![digits_func(), apply, b.finish()]);
    let text = asm(&p);
    assert!(text.contains("    movq %rdx, %r11"));
    assert!(text.contains("    call *%r11"));
    assert_eq!(run(&p, "main", &[]), 125);
}

#[test]
fn heap_stores_and_loads() {
    let mut b = FuncBuilder::new("main", &[]);
    let p = b.temp();
    let t = b.temp();
    let u = b.temp();
    let x = b.temp();
    let flag = b.temp();
    let y = b.temp();
    let s1 = b.temp();
    let s2 = b.temp();
    b.label("L0")
        .call("malloc", vec![Src::Int(16)], Some(&p))
        .binop(BinOp::Add, &t, &p, 8)
        .push(Inst::Store {
            ty: Type::Int,
            addr: Addr::new(&t, 0),
            src: Src::Int(42),
        })
        .push(Inst::Store {
            ty: Type::Bool,
            addr: Addr::new(&p, 0),
            src: Src::Bool(true),
        })
        .push(Inst::Store {
            ty: Type::Int,
            addr: Addr::new(&p, 4),
            src: Src::Int(-5),
        })
        .binop(BinOp::Add, &u, &p, 8)
        .push(Inst::Load {
            ty: Type::Int,
            dst: x.clone(),
            addr: Addr::new(&u, 0),
        })
        .push(Inst::Load {
            ty: Type::Bool,
            dst: flag.clone(),
            addr: Addr::new(&p, 0),
        })
        .push(Inst::Load {
            ty: Type::Int,
            dst: y.clone(),
            addr: Addr::new(&p, 4),
        })
        .binop(BinOp::Add, &s1, &x, &flag)
        .binop(BinOp::Add, &s2, &s1, &y)
        .ret(Some(Src::Reg(s2.clone())))
        .label("L1");
    let p = program(vec![b.finish()]);

    let plain = CompileOptions::default();
    let folded = CompileOptions { fold_addresses: true };
    assert_eq!(machine(&p, &plain).run("main", &[]), 38);
    assert_eq!(machine(&p, &folded).run("main", &[]), 38);

    let plain_lines = compile_to_lines(&p, &plain).unwrap();
    let folded_lines = compile_to_lines(&p, &folded).unwrap();
    assert_eq!(instr_count(&plain_lines), instr_count(&folded_lines) + 4);

    let text = compile_program(&p, &folded).unwrap();
    assert!(text.contains("    # 2. 8[t1]:I = 42"));
    assert!(text.contains("movl $42, 8(%"));
    assert!(text.contains("movb $1, (%"));
    assert!(text.contains("movslq 8(%"));
    assert!(text.contains("movzbq (%"));
}

#[test]
fn dead_stores_emit_nothing() {
    let mut b = FuncBuilder::new("f", &["a"]);
    let t = b.temp();
    b.label("L0")
        .binop(BinOp::Mul, &t, Src::id("a"), 5)
        .binop(BinOp::Div, &t, Src::id("a"), 2)
        .ret(Some(Src::id("a")))
        .label("L1");
    let p = program(vec![b.finish()]);
    let text = asm(&p);
    assert!(!text.contains("imulq"));
    assert!(!text.contains("idivq"));
    assert_eq!(run(&p, "f", &[7]), 7);
}

#[test]
fn division_saves_registers_live_across_it() {
    // ten values plus both operands stay live over the division, which
    // together with the quotient fills all thirteen registers, so %rax or
    // %rdx necessarily holds a value that must survive idivq
    let mut b = FuncBuilder::new("divmix", &["a", "b"]);
    let vs: Vec<Reg> = (0..10).map(|_| b.temp()).collect();
    let q = b.temp();
    b.label("L0");
    for (k, v) in vs.iter().enumerate() {
        b.binop(BinOp::Add, v, Src::id("a"), k as i32 + 1);
    }
    b.binop(BinOp::Div, &q, Src::id("a"), Src::id("b"));
    let mut acc = q.clone();
    for src in vs.iter().cloned().chain([Reg::id("a"), Reg::id("b")]) {
        let next = b.temp();
        b.binop(BinOp::Add, &next, &acc, &src);
        acc = next;
    }
    b.ret(Some(Src::Reg(acc.clone()))).label("L1");
    let p = program(vec![b.finish()]);

    let text = asm(&p);
    let div_at = text.find("    idivq").unwrap();
    let before = &text[..div_at];
    let after = &text[div_at..];
    assert!(before.contains("    pushq %rdx") || before.contains("    pushq %rax"));
    assert!(after.contains("    popq %rdx") || after.contains("    popq %rax"));

    // q = a / b truncates toward zero
    assert_eq!(run(&p, "divmix", &[-20, 3]), -6 + (-200 + 55) - 20 + 3);
    assert_eq!(run(&p, "divmix", &[100, 7]), 14 + (1000 + 55) + 100 + 7);
}

#[test]
fn two_divisions_sharing_operands() {
    // q1 = a / b, q2 = c / a, q3 = q1 / c with eight more values live
    // throughout. The second division sees a full clique of thirteen, so a
    // value in %rax or %rdx has to survive it.
    let mut b = FuncBuilder::new("divs", &["a", "b", "c"]);
    let vs: Vec<Reg> = (0..8).map(|_| b.temp()).collect();
    let (q1, q2, q3) = (b.temp(), b.temp(), b.temp());
    b.label("L0");
    for (k, v) in vs.iter().enumerate() {
        b.binop(BinOp::Add, v, Src::id("a"), k as i32 + 1);
    }
    b.binop(BinOp::Div, &q1, Src::id("a"), Src::id("b"))
        .binop(BinOp::Div, &q2, Src::id("c"), Src::id("a"))
        .binop(BinOp::Div, &q3, &q1, Src::id("c"));
    let mut acc = b.temp();
    b.binop(BinOp::Add, &acc, &q3, &q2);
    for src in vs.iter().cloned().chain([Reg::id("a"), Reg::id("b"), Reg::id("c")]) {
        let next = b.temp();
        b.binop(BinOp::Add, &next, &acc, &src);
        acc = next;
    }
    b.ret(Some(Src::Reg(acc.clone()))).label("L1");
    let p = program(vec![b.finish()]);

    let text = asm(&p);
    let segments: Vec<&str> = text.split("    idivq").collect();
    assert_eq!(segments.len(), 4);
    assert!(segments[1].contains("    pushq %rax") || segments[1].contains("    pushq %rdx"));

    let expect = |a: i64, b: i64, c: i64| (a / b) / c + c / a + 8 * a + 36 + a + b + c;
    for (a, bv, c) in [(-9, 1, 9), (60, 4, 7), (12, -3, -25)] {
        assert_eq!(run(&p, "divs", &[a, bv, c]), expect(a, bv, c));
    }
}

#[test]
fn dead_call_result_does_not_shadow_a_live_register() {
    // x = printInt(y); return y, with x and y sharing %rcx: x never
    // holds a value, so the allocation is legal and %rcx must be saved
    let mut b = FuncBuilder::new("main", &["y"]);
    let x = b.local("x");
    b.label("L0")
        .call("printInt", vec![Src::id("y")], Some(&x))
        .ret(Some(Src::id("y")))
        .label("L1");
    let func = b.finish();
    let live = compute_liveness(&func).unwrap();
    assert!(!live.is_live_out(1, &x));
    let alloc = Allocation {
        env: BTreeMap::from([(Reg::id("y"), PhysReg::Rcx), (x.clone(), PhysReg::Rcx)]),
        callee_saves_used: vec![],
    };

    let mut cg = CodeGenerator::new();
    cg.begin_program(&program(vec![func.clone()]));
    cg.generate_function(&FuncContext::new(&func, 0, &live, &alloc)).unwrap();
    let lines = cg.finish();
    let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    let call_at = text.iter().position(|l| l == "    call _printInt").unwrap();
    assert!(text[..call_at].contains(&"    pushq %rcx".to_string()));

    let mut m = Machine::new(lines);
    assert_eq!(m.run("main", &[77]), 77);
    assert_eq!(m.output, vec!["77"]);
}

#[test]
fn values_survive_a_call_with_an_unread_result() {
    // x = printInt(a) is never read, but x is reassigned after the call,
    // so it still gets a register that other values may reuse at the call
    let mut b = FuncBuilder::new("main", &["a"]);
    let vs: Vec<Reg> = (0..9).map(|_| b.temp()).collect();
    let x = b.local("x");
    b.label("L0");
    for (k, v) in vs.iter().enumerate() {
        b.binop(BinOp::Mul, v, Src::id("a"), k as i32 + 1);
    }
    b.call("printInt", vec![Src::id("a")], Some(&x))
        .binop(BinOp::Add, &x, Src::id("a"), 100);
    let mut acc = x.clone();
    for v in &vs {
        let next = b.temp();
        b.binop(BinOp::Add, &next, &acc, v);
        acc = next;
    }
    b.ret(Some(Src::Reg(acc.clone()))).label("L1");
    let p = program(vec![b.finish()]);

    let mut m = machine(&p, &CompileOptions::default());
    // a * (1 + 2 + ... + 9) + a + 100
    assert_eq!(m.run("main", &[3]), 238);
    assert_eq!(m.output, vec!["3"]);
}

#[test]
fn local_labels_are_qualified_per_function() {
    // abs(x) and main(a) = min(abs(a), 10) both use L1
    let mut b = FuncBuilder::new("abs", &["x"]);
    let x = Reg::id("x");
    b.label("L0")
        .cjump(RelOp::Ge, &x, 0, "L1")
        .push(Inst::Unop {
            op: UnOp::Neg,
            dst: x.clone(),
            src: Src::Reg(x.clone()),
        })
        .label("L1")
        .ret(Some(Src::Reg(x.clone())))
        .label("L2");
    let abs = b.finish();

    let mut b = FuncBuilder::new("main", &["a"]);
    let r = b.temp();
    b.label("L0")
        .call("abs", vec![Src::id("a")], Some(&r))
        .cjump(RelOp::Lt, &r, 10, "L1")
        .mov(&r, 10)
        .label("L1")
        .ret(Some(Src::Reg(r.clone())))
        .label("L2");
    let p = program(vec![abs, b.finish()]);

    let text = asm(&p);
    assert!(text.contains("\nF0_L1:\n"));
    assert!(text.contains("\nF1_L1:\n"));
    assert!(text.contains("    jge F0_L1"));
    assert!(text.contains("    jl F1_L1"));
    assert_eq!(run(&p, "main", &[-5]), 5);
    assert_eq!(run(&p, "main", &[-50]), 10);
    assert_eq!(run(&p, "main", &[7]), 7);
}

#[test]
fn relational_and_unary_operators() {
    // f(a, b) = !(a < b) + -a
    let mut b = FuncBuilder::new("f", &["a", "b"]);
    let c = b.temp();
    let d = b.temp();
    let e = b.temp();
    let r = b.temp();
    b.label("L0")
        .binop(BinOp::Lt, &c, Src::id("a"), Src::id("b"))
        .push(Inst::Unop {
            op: UnOp::Not,
            dst: d.clone(),
            src: Src::Reg(c.clone()),
        })
        .push(Inst::Unop {
            op: UnOp::Neg,
            dst: e.clone(),
            src: Src::id("a"),
        })
        .binop(BinOp::Add, &r, &d, &e)
        .ret(Some(Src::Reg(r.clone())))
        .label("L1");
    let p = program(vec![b.finish()]);
    assert_eq!(run(&p, "f", &[3, 5]), -3);
    assert_eq!(run(&p, "f", &[5, 3]), -4);
    assert_eq!(run(&p, "f", &[4, 4]), -3);
}

#[test]
fn string_literals_are_printed() {
    let mut b = FuncBuilder::new("main", &[]);
    b.label("L0")
        .call("printStr", vec![Src::Str("hello\n".into())], None)
        .call("printStr", vec![Src::Str("tab\there".into())], None)
        .ret(Some(Src::Int(0)))
        .label("L1");
    let p = program(vec![b.finish()]);

    let text = asm(&p);
    assert!(text.ends_with("_S0:\n    .asciz \"hello\\n\"\n_S1:\n    .asciz \"tab\\there\"\n"));

    let mut m = machine(&p, &CompileOptions::default());
    assert_eq!(m.run("main", &[]), 0);
    assert_eq!(m.output, vec!["hello\n", "tab\there"]);
}

#[test]
fn unused_parameters_are_not_moved() {
    // second(a, b) = b; a is dead on entry
    let mut b = FuncBuilder::new("second", &["a", "b"]);
    b.label("L0").ret(Some(Src::id("b"))).label("L1");
    let p = program(vec![b.finish()]);
    let text = asm(&p);
    assert!(!text.contains("%rdi"));
    assert!(text.contains("    movq %rsi, %rax"));
    assert_eq!(run(&p, "second", &[1, 2]), 2);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn undeclared_label_stops_compilation() {
    let mut b = FuncBuilder::new("g", &[]);
    b.label("L0").jump("nowhere").label("L1");
    let err = compile_program(&program(vec![b.finish()]), &CompileOptions::default()).unwrap_err();
    assert_eq!(
        err,
        CodegenError::UndeclaredLabel {
            func: "g".into(),
            label: "nowhere".into()
        }
    );
}

#[test]
fn too_many_call_arguments() {
    let mut b = FuncBuilder::new("caller", &[]);
    b.label("L0")
        .call("many", (0..7).map(Src::Int).collect(), None)
        .ret(None)
        .label("L1");
    let err = compile_program(&program(vec![b.finish()]), &CompileOptions::default()).unwrap_err();
    assert_eq!(
        err,
        CodegenError::TooManyArgs {
            func: "caller".into(),
            count: 7
        }
    );
}

#[test]
fn register_exhaustion_names_the_function() {
    let mut b = FuncBuilder::new("pressure", &[]);
    let t: Vec<Reg> = (0..14).map(|_| b.temp()).collect();
    b.label("L0");
    for (k, r) in t.iter().enumerate() {
        b.mov(r, k as i32);
    }
    let mut acc = b.temp();
    b.mov(&acc, 0);
    for r in &t {
        let next = b.temp();
        b.binop(BinOp::Add, &next, &acc, r);
        acc = next;
    }
    b.ret(Some(Src::Reg(acc.clone()))).label("L1");

    let p = program(vec![sub_func(), b.finish()]);
    let err = compile_program(&p, &CompileOptions::default()).unwrap_err();
    assert_eq!(err.func(), "pressure");
    assert!(matches!(err, CodegenError::OutOfRegisters { .. }));
}
