use super::three_address_code::*;
use std::fmt::Write;

/// Render an indexed listing of the whole program IR.
pub fn visualize_program_ir(program: &Program) -> String {
    let mut output = String::new();

    if !program.data.is_empty() {
        writeln!(output, "╔══════════════════════════════════════════╗").unwrap();
        writeln!(output, "║          Data Declarations               ║").unwrap();
        writeln!(output, "╚══════════════════════════════════════════╝").unwrap();
        for d in &program.data {
            writeln!(output, "  {}", d).unwrap();
        }
        writeln!(output).unwrap();
    }

    for (i, func) in program.funcs.iter().enumerate() {
        if i > 0 {
            writeln!(output).unwrap();
        }
        output.push_str(&visualize_function_ir(func, |_| String::new()));
    }

    output
}

/// Render one function, appending `annotate(i)` after instruction `i`.
pub fn visualize_function_ir<F>(func: &Func, annotate: F) -> String
where
    F: Fn(usize) -> String,
{
    let mut output = String::new();
    let header = format!("Function: {}", func.signature());
    let rule_len = header.chars().count().max(44);

    writeln!(output, "{}", "═".repeat(rule_len)).unwrap();
    writeln!(output, "{}", header).unwrap();
    writeln!(output, "{}", "═".repeat(rule_len)).unwrap();
    if !func.locals.is_empty() {
        writeln!(output, "  locals: {}", func.locals.join(", ")).unwrap();
    }

    let lines: Vec<String> = func.code.iter().map(format_inst).collect();
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    for (i, line) in lines.iter().enumerate() {
        let note = annotate(i);
        if note.is_empty() {
            writeln!(output, "  {:>3}  {}", i, line).unwrap();
        } else {
            writeln!(output, "  {:>3}  {:<width$}  {}", i, line, note, width = width).unwrap();
        }
    }

    output
}

// labels flush, everything else indented under them
fn format_inst(inst: &Inst) -> String {
    if inst.is_label() {
        inst.to_string()
    } else {
        format!("  {}", inst)
    }
}
