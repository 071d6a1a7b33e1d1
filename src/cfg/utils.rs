/// Escape a string literal for an `.asciz` directive. The result includes
/// the surrounding quotes.
pub fn escape_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\0' => out.push_str("\\0"),
            c if c.is_ascii_graphic() || c == ' ' => out.push(c),
            // everything else as octal bytes
            c => {
                let mut buf = [0u8; 4];
                for b in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("\\{:03o}", b));
                }
            }
        }
    }
    out.push('"');
    out
}

/// Global symbol for a function, data table or string literal.
pub fn global_symbol(name: &str) -> String {
    format!("_{}", name)
}

/// Function-qualified label, unique across the whole program.
pub fn qualified_label(func_number: usize, label: &str) -> String {
    format!("F{}_{}", func_number, label)
}
