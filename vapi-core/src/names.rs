//! Naming rules: exported identifiers, transferable type names, dotted method keys.

/// Primitive type names that may be used as argument or reply types.
const BUILTIN_TYPES: &[&str] = &[
    "bool", "char", "str", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32",
    "u64", "u128", "usize", "f32", "f64",
];

/// True if `name` starts with an uppercase letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// True if a full type name (as from `std::any::type_name`) is exported or built in.
///
/// Unnamed composite types (tuples, arrays, slices) count as built in.
pub fn is_exported_or_builtin(type_name: &str) -> bool {
    let mut ty = type_name.trim();
    loop {
        if let Some(rest) = ty.strip_prefix('&') {
            ty = rest.trim_start();
        } else if let Some(rest) = ty.strip_prefix("mut ") {
            ty = rest.trim_start();
        } else {
            break;
        }
    }
    if ty.starts_with('(') || ty.starts_with('[') {
        return true;
    }
    let short = short_type_name(ty);
    is_exported(short) || BUILTIN_TYPES.contains(&short)
}

/// Last path segment of a type name, without generic arguments.
///
/// `alloc::vec::Vec<my::Foo>` becomes `Vec`, `my_crate::Echo` becomes `Echo`.
pub fn short_type_name(type_name: &str) -> &str {
    let base = type_name
        .split_once('<')
        .map_or(type_name, |(head, _)| head);
    base.rsplit("::").next().unwrap_or(base).trim()
}

/// Split a `Service.Method` key into exactly two non-empty parts.
pub fn split_method(method: &str) -> Option<(&str, &str)> {
    let mut parts = method.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(service), Some(name), None) if !service.is_empty() && !name.is_empty() => {
            Some((service, name))
        }
        _ => None,
    }
}

/// Normalize a raw `:method` segment: title-case everything after the first dot.
///
/// Returns `None` when there is no dot. The service part is left as sent.
pub fn normalize_method(raw: &str) -> Option<String> {
    let (service, method) = raw.split_once('.')?;
    Some(format!("{}.{}", service, title_case(method)))
}

/// Upper-case the first letter of every word.
///
/// Word boundaries follow the classic rule: ASCII letters, digits and `_` continue a word,
/// any other ASCII character separates; non-ASCII letters and digits continue, whitespace
/// separates.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev = ' ';
    for c in s.chars() {
        if is_separator(prev) {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev = c;
    }
    out
}

fn is_separator(c: char) -> bool {
    if c.is_ascii() {
        return !(c.is_ascii_alphanumeric() || c == '_');
    }
    if c.is_alphanumeric() {
        return false;
    }
    c.is_whitespace()
}
