//! PowerShell script templates
//!
//! Scripts are fixed handlebars skeletons with named substitution points.
//! Every substituted value is escaped for a single-quoted PowerShell literal,
//! so templates must always place `{{value}}` between single quotes.

use handlebars::Handlebars;
use serde::Serialize;

use crate::modules::error::ModuleError;

/// Characters PowerShell accepts as a single-quote delimiter.
const SINGLE_QUOTES: [char; 5] = ['\'', '\u{2018}', '\u{2019}', '\u{201A}', '\u{201B}'];

fn is_single_quote(c: char) -> bool {
    SINGLE_QUOTES.contains(&c)
}

/// Escape a value for use inside a single-quoted PowerShell string: every
/// single-quote character, typographic ones included, is doubled.
pub fn quote_literal_content(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if is_single_quote(c) {
            escaped.push(c);
        }
        escaped.push(c);
    }
    escaped
}

pub struct ScriptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for ScriptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(quote_literal_content);

        Self { handlebars }
    }

    /// Register a named skeleton.
    pub fn register(&mut self, name: &str, template: &str) -> Result<(), ModuleError> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| ModuleError::Template(format!("{name}: {e}")))
    }

    pub fn render<T: Serialize>(&self, name: &str, values: &T) -> Result<String, ModuleError> {
        Ok(self.handlebars.render(name, values)?)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }
}

/// Build a renderer from `(name, skeleton)` pairs.
pub fn renderer_with(templates: &[(&str, &str)]) -> Result<ScriptRenderer, ModuleError> {
    let mut renderer = ScriptRenderer::new();
    for (name, template) in templates {
        renderer.register(name, template)?;
    }
    Ok(renderer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_render_escapes_quotes() {
        let renderer = renderer_with(&[("pool", "New-WebAppPool '{{name}}'")]).unwrap();
        let script = renderer
            .render("pool", &json!({"name": "it's'; Remove-Item C:\\ -Recurse; '"}))
            .unwrap();

        assert_eq!(
            script,
            "New-WebAppPool 'it''s''; Remove-Item C:\\ -Recurse; '''"
        );
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let renderer = renderer_with(&[("pool", "Start-WebAppPool '{{name}}'")]).unwrap();
        let err = renderer.render("pool", &json!({})).unwrap_err();
        assert!(matches!(err, ModuleError::Template(_)));
    }

    #[test]
    fn test_invalid_skeleton_rejected() {
        let mut renderer = ScriptRenderer::new();
        assert!(renderer.register("broken", "{{#if}}").is_err());
        assert!(!renderer.has_template("broken"));
    }

    #[test]
    fn test_render_escapes_typographic_quotes() {
        let renderer = renderer_with(&[("pool", "New-WebAppPool -Name '{{name}}'")]).unwrap();
        let script = renderer
            .render(
                "pool",
                &json!({"name": "x\u{2019}; Remove-Item C:\\data -Recurse; \u{2019}"}),
            )
            .unwrap();

        assert_eq!(
            script,
            "New-WebAppPool -Name 'x\u{2019}\u{2019}; Remove-Item C:\\data -Recurse; \u{2019}\u{2019}'"
        );
    }

    /// Read back a single-quoted literal body the way PowerShell does: a
    /// quote followed by another quote is one literal quote, a lone quote
    /// ends the string. Returns the value and the unread remainder.
    fn read_literal(body: &str) -> (String, String) {
        let mut value = String::new();
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            if is_single_quote(c) {
                match chars.peek() {
                    Some(next) if is_single_quote(*next) => {
                        chars.next();
                    }
                    _ => return (value, chars.collect()),
                }
            }
            value.push(c);
        }
        (value, String::new())
    }

    proptest! {
        #[test]
        fn quoted_value_never_closes_literal(
            value in "[a-z ;'\u{2018}\u{2019}\u{201A}\u{201B}]*"
        ) {
            let escaped = quote_literal_content(&value);
            let (read, rest) = read_literal(&escaped);
            prop_assert_eq!(read, value);
            prop_assert_eq!(rest, "");
        }
    }
}
