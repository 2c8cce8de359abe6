//! Detail view builder for key-value display of runs and approvals.

use console::style;

use super::colors::{label, section_header};

/// A builder for detail views (key-value display).
pub struct DetailView {
    title: String,
    sections: Vec<DetailSection>,
}

struct DetailSection {
    header: Option<String>,
    fields: Vec<(String, String)>,
    items: Vec<String>,
}

impl DetailView {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            sections: vec![DetailSection {
                header: None,
                fields: vec![],
                items: vec![],
            }],
        }
    }

    /// Add a key-value field to the current section.
    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        if let Some(section) = self.sections.last_mut() {
            section.fields.push((key.to_string(), value.into()));
        }
        self
    }

    /// Add a field only if the value is Some.
    pub fn field_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    /// Start a new named section with a header. Empty sections are skipped on render.
    pub fn section(mut self, header: &str) -> Self {
        self.sections.push(DetailSection {
            header: Some(header.to_string()),
            fields: vec![],
            items: vec![],
        });
        self
    }

    /// Add a bullet-point item to the current section.
    pub fn item(mut self, text: impl Into<String>) -> Self {
        if let Some(section) = self.sections.last_mut() {
            section.items.push(text.into());
        }
        self
    }

    pub fn render(&self) -> String {
        let mut lines = vec![style(&self.title).bold().to_string()];
        let key_width = self
            .sections
            .iter()
            .flat_map(|s| s.fields.iter())
            .map(|(k, _)| k.len())
            .max()
            .unwrap_or(12);

        for section in &self.sections {
            if section.fields.is_empty() && section.items.is_empty() {
                continue;
            }
            if let Some(header) = &section.header {
                lines.push(section_header(header));
            }
            for (key, value) in &section.fields {
                // Pad on the raw key; styling escapes would throw off the width.
                let padding = " ".repeat(key_width.saturating_sub(key.len()));
                lines.push(format!("  {}{}  {}", label(key), padding, value));
            }
            for item in &section.items {
                lines.push(format!("  {} {}", style("\u{2022}").dim(), item));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_skips_empty_sections() {
        let rendered = DetailView::new("Run tg_1")
            .field("Status", "completed")
            .field_opt("Note", None)
            .section("Errors")
            .section("Artifacts")
            .item("brief_tg_1")
            .render();

        assert!(rendered.contains("completed"));
        assert!(rendered.contains("brief_tg_1"));
        assert!(!rendered.contains("Errors"));
        assert!(!rendered.contains("Note"));
    }
}
