//! Shared HTML shell around every rendered email body.

use chrono::{Datelike, Utc};

use crate::notification::TemplateVariables;

use super::substitution::render_variables;

const LAYOUT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{appName}}</title>
  <style>
    body { margin: 0; padding: 0; background: #f4f5f7; font-family: Arial, Helvetica, sans-serif; color: #1f2933; }
    .container { max-width: 600px; margin: 24px auto; background: #ffffff; border-radius: 8px; overflow: hidden; }
    .header { background: #2563eb; color: #ffffff; padding: 20px 24px; font-size: 20px; font-weight: bold; }
    .content { padding: 24px; line-height: 1.5; }
    .details td { padding: 4px 12px 4px 0; }
    .button { display: inline-block; padding: 10px 18px; background: #2563eb; color: #ffffff; text-decoration: none; border-radius: 4px; }
    .footer { padding: 16px 24px; font-size: 12px; color: #7b8794; border-top: 1px solid #e4e7eb; }
  </style>
</head>
<body>
  <div class="container">
    <div class="header">{{appName}}</div>
    <div class="content">
{{content}}
    </div>
    <div class="footer">
      This is an automated message from <a href="{{appUrl}}">{{appName}}</a>. Please do not reply.<br>
      &copy; {{year}} {{appName}}
    </div>
  </div>
</body>
</html>"#;

/// Branding for the shared email layout
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub app_name: String,
    pub app_url: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            app_name: "HR Portal".to_string(),
            app_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Wrap a rendered body fragment in the shared layout.
///
/// The fragment is inserted verbatim; tokens inside it are not substituted
/// a second time.
pub fn wrap_in_layout(body_html: &str, layout: &LayoutConfig) -> String {
    let mut vars = TemplateVariables::new();
    vars.insert("appName".into(), layout.app_name.clone().into());
    vars.insert("appUrl".into(), layout.app_url.clone().into());
    vars.insert("year".into(), Utc::now().year().into());
    vars.insert("content".into(), body_html.into());
    render_variables(LAYOUT_HTML, &vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_wraps_content() {
        let html = wrap_in_layout("<p>Body</p>", &LayoutConfig::default());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<p>Body</p>"));
        assert!(html.contains("HR Portal"));
        assert!(html.contains(&Utc::now().year().to_string()));
        assert!(!html.contains("{{appName}}"));
    }

    #[test]
    fn test_layout_does_not_touch_body_tokens() {
        let html = wrap_in_layout("<p>{{literal}}</p>", &LayoutConfig::default());
        assert!(html.contains("<p>{{literal}}</p>"));
    }
}
