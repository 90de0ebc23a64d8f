//! C primitive type names and the names the binding generator uses for them.

use crate::diag::Diagnostics;

const TABLE: &[(&str, &str)] = &[
    ("void", "void"),
    ("char", "c_char"),
    ("int", "c_int"),
    ("float", "f32"),
    ("double", "f64"),
    ("int8_t", "i8"),
    ("uint8_t", "u8"),
    ("int16_t", "i16"),
    ("uint16_t", "u16"),
    ("int32_t", "i32"),
    ("uint32_t", "u32"),
    ("int64_t", "i64"),
    ("uint64_t", "u64"),
    ("size_t", "usize"),
];

/// Maps a C type name through the table. Names without an entry are returned unchanged.
pub fn substitute(name: &str, diagnostics: &mut Diagnostics) -> String {
    match TABLE.iter().find(|(c_name, _)| *c_name == name) {
        Some((c_name, replacement)) => {
            diagnostics.substitution_used(*c_name);
            String::from(*replacement)
        }
        None => String::from(name),
    }
}

/// Table entries no lookup ever hit. A non-empty result usually means the table is stale.
pub fn unused(diagnostics: &Diagnostics) -> Vec<&'static str> {
    let used: Vec<&str> = diagnostics.used_substitutions().collect();
    TABLE
        .iter()
        .map(|(c_name, _)| *c_name)
        .filter(|c_name| !used.contains(c_name))
        .collect()
}
