//! Authoring-time syntax checks. Advisory only; delivery never consults them.

use super::substitution::VARIABLE_TOKEN;
use super::types::TemplateValidation;

pub fn validate_template_syntax(template: &str) -> TemplateValidation {
    let mut errors = Vec::new();

    let opening = template.matches("{{").count();
    let closing = template.matches("}}").count();
    if opening != closing {
        errors.push(format!(
            "Mismatched braces: {} opening '{{{{' and {} closing '}}}}'",
            opening, closing
        ));
    }

    let empty = template.matches("{{}}").count();
    if empty > 0 {
        errors.push(format!("Found {} empty variable token(s) '{{{{}}}}'", empty));
    }

    let mut variables: Vec<String> = Vec::new();
    for caps in VARIABLE_TOKEN.captures_iter(template) {
        let name = &caps[1];
        if !variables.iter().any(|v| v == name) {
            variables.push(name.to_string());
        }
    }

    TemplateValidation {
        valid: errors.is_empty(),
        errors,
        variables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_template() {
        let result = validate_template_syntax("Hi {{name}}, your {{leaveType}} for {{name}}");
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.variables, vec!["name", "leaveType"]);
    }

    #[test]
    fn test_mismatched_braces() {
        let result = validate_template_syntax("Hi {{name}, welcome {{team}}");
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("2 opening"));
        assert!(result.errors[0].contains("1 closing"));
        assert_eq!(result.variables, vec!["team"]);
    }

    #[test]
    fn test_empty_token() {
        let result = validate_template_syntax("Hello {{}}");
        assert!(!result.valid);
        assert!(result.errors[0].contains("empty variable token"));
    }

    #[test]
    fn test_plain_text_is_valid() {
        let result = validate_template_syntax("No variables here");
        assert!(result.valid);
        assert!(result.variables.is_empty());
    }
}
