//! Inline `style` attribute manipulation.
//!
//! Pure string functions; the rewriter decides which elements they apply to.

/// Drop every `color` and `font`/`font-*` declaration from a style value.
///
/// Other declarations and their `;` separators are kept as written, so
/// `margin:0;color:red;` becomes `margin:0;`.
pub fn strip_theme_declarations(style: &str) -> String {
    style
        .split(';')
        .filter(|decl| !is_theme_declaration(decl))
        .collect::<Vec<_>>()
        .join(";")
}

/// True for declarations the site theme owns: `color`, `font`, `font-*`.
fn is_theme_declaration(decl: &str) -> bool {
    let Some((property, _)) = decl.split_once(':') else {
        return false;
    };
    let property = property.trim().to_ascii_lowercase();
    property == "color" || property == "font" || property.starts_with("font-")
}

/// Append declarations, inserting a `;` unless the value already ends with one.
pub fn append_declarations(style: &mut String, declarations: &str) {
    if !style.ends_with(';') {
        style.push(';');
    }
    style.push_str(declarations);
}
