//! JSON pointer helpers shared by issue reporting and round-trip checks.

/// Escape one reference token (`~` → `~0`, `/` → `~1`).
pub fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Undo [`escape`].
pub fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Append an unescaped token to a pointer.
pub fn join(pointer: &str, segment: &str) -> String {
    format!("{}/{}", pointer, escape(segment))
}

/// Unescaped tokens of a pointer. The root pointer `""` has none.
pub fn segments(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer
        .strip_prefix('/')
        .unwrap_or(pointer)
        .split('/')
        .map(unescape)
        .collect()
}

/// Render a pointer as a JSONPath expression, e.g. `/a/0/b c` → `$.a[0]['b c']`.
pub fn to_json_path(pointer: &str) -> String {
    let mut path = String::from("$");
    for segment in segments(pointer) {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            path.push_str(&format!("[{}]", segment));
        } else if is_identifier(&segment) {
            path.push('.');
            path.push_str(&segment);
        } else {
            path.push_str(&format!("['{}']", segment.replace('\'', "\\'")));
        }
    }
    path
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-')
}
