//! The error sink shared by every pass
//!
//! Each pass appends `(component, token, message)` records as it finds
//! problems; the driver pretty-prints the collection at the end and uses it
//! to decide the exit status. Records keep the offending token so the
//! display can point into the source.

use crate::errors::{context_lines, PrettyError};
use crate::tokens::Token;
use ansi_term::Color::Red;

/// One collected diagnostic
#[derive(Debug, Clone)]
pub struct Report<'a> {
    /// The pass that produced the record, e.g. `"Prover"`
    pub component: &'static str,
    /// The token the diagnostic points at, when one is known
    pub token: Option<Token<'a>>,
    pub message: String,
}

/// The collecting error sink
#[derive(Debug, Default)]
pub struct Reports<'a> {
    records: Vec<Report<'a>>,
}

impl<'a> Reports<'a> {
    pub fn new() -> Self {
        Reports {
            records: Vec::new(),
        }
    }

    /// Appends one record
    pub fn collect(&mut self, component: &'static str, token: Option<Token<'a>>, message: String) {
        self.records.push(Report {
            component,
            token,
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[Report<'a>] {
        &self.records
    }

    /// The records produced by one component, e.g. all prover verdicts
    pub fn from_component(&self, component: &str) -> Vec<&Report<'a>> {
        self.records
            .iter()
            .filter(|r| r.component == component)
            .collect()
    }
}

impl PrettyError for Report<'_> {
    fn pretty_format(&self, file_str: &str, file_name: &str) -> String {
        let mut msg = format!("{}: {}\n", Red.paint("error"), self.message);
        if let Some(token) = &self.token {
            msg.push_str(&context_lines(token.byte_range(), file_str, file_name));
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::tokenize;

    #[test]
    fn collects_in_order() {
        let src = "a' = 'b;";
        let tokens = tokenize(src);
        let mut reports = Reports::new();
        assert!(reports.is_empty());

        reports.collect("Prover", Some(tokens[0]), "first".into());
        reports.collect("ContextCheck", None, "second".into());

        assert_eq!(reports.len(), 2);
        assert_eq!(reports.records()[0].message, "first");
        assert_eq!(reports.from_component("Prover").len(), 1);
    }

    #[test]
    fn pretty_format_points_at_the_token() {
        let src = "a' = 'b;";
        let tokens = tokenize(src);
        let mut reports = Reports::new();
        reports.collect("Prover", Some(tokens[2]), "no".into());

        let out = reports.records()[0].pretty_format(src, "x.tj");
        assert!(out.contains("x.tj:1:4"));
    }
}
