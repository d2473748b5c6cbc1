use std::collections::HashMap;

use crate::records::RecordId;

/// One named output section. Row insertion order is irrelevant; rows are
/// sorted by record id at render time.
pub struct Chapter {
    pub title: String,
    pub labels: Vec<String>,
    pub empty_message: String,
    rows: HashMap<RecordId, String>,
}

impl Chapter {
    pub fn new(title: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            title: title.into(),
            labels,
            empty_message: "No entries detected.".to_string(),
            rows: HashMap::new(),
        }
    }

    pub fn add_row(&mut self, id: RecordId, row: String) {
        self.rows.insert(id, row);
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.rows.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn matches_labels(&self, labels: &[String]) -> bool {
        self.labels.iter().any(|l| labels.contains(l))
    }

    pub fn render(&self, ascending: bool) -> String {
        let mut out = format!("### {}\n", self.title);

        if self.rows.is_empty() {
            out.push_str(&self.empty_message);
            out.push('\n');
            return out;
        }

        let mut entries: Vec<(&RecordId, &String)> = self.rows.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        if !ascending {
            entries.reverse();
        }

        for (_, row) in entries {
            out.push_str(&format!("- {}\n", row));
        }
        out
    }
}
