//! Label table loading and score-to-label resolution.

use std::path::Path;

use tracing::debug;

use crate::error::{InferenceError, InferenceResult, LabelTableError};

/// Ordered label names; index `i` names classifier output `i`.
///
/// Never empty once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

/// Winning label for a score distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelResolution {
    pub index: usize,
    pub label: String,
    /// Raw score at `index`, not renormalized.
    pub confidence: f32,
}

impl LabelTable {
    /// Build a table from already-split labels.
    pub fn from_labels<I, S>(labels: I) -> Result<Self, LabelTableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(LabelTableError::Empty);
        }
        if let Some(pos) = labels.iter().position(|l| l.trim().is_empty()) {
            return Err(LabelTableError::BlankLabel { line: pos + 1 });
        }
        Ok(Self { labels })
    }

    /// Parse newline-delimited labels.
    ///
    /// Lines are trimmed and trailing blank lines dropped. A blank line in
    /// the middle would shift every later index, so it is rejected.
    pub fn parse(contents: &str) -> Result<Self, LabelTableError> {
        let mut lines: Vec<&str> = contents.lines().map(str::trim).collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        Self::from_labels(lines)
    }

    /// Load a label file from disk.
    pub fn load(path: &Path) -> Result<Self, LabelTableError> {
        let contents = std::fs::read_to_string(path)?;
        let table = Self::parse(&contents)?;
        debug!(path = %path.display(), count = table.len(), "Label table loaded");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Resolve the highest-scoring label.
    ///
    /// The distribution must have one score per label. Exact ties go to the
    /// lowest index; NaN scores never win.
    pub fn resolve(&self, scores: &[f32]) -> InferenceResult<LabelResolution> {
        if scores.len() != self.labels.len() {
            return Err(InferenceError::LabelIndexOutOfRange {
                scores: scores.len(),
                labels: self.labels.len(),
            });
        }

        let (index, confidence) = argmax_first(scores).ok_or_else(|| {
            InferenceError::inference_failed("classifier produced no comparable scores")
        })?;

        let label = self
            .get(index)
            .ok_or(InferenceError::LabelIndexOutOfRange {
                scores: scores.len(),
                labels: self.labels.len(),
            })?
            .to_string();

        Ok(LabelResolution {
            index,
            label,
            confidence,
        })
    }
}

/// Index and value of the first maximum, skipping NaN.
fn argmax_first(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table(labels: &[&str]) -> LabelTable {
        LabelTable::from_labels(labels.iter().copied()).unwrap()
    }

    #[test]
    fn test_resolve_picks_maximum() {
        let labels = table(&["A", "B", "C"]);
        let res = labels.resolve(&[0.1, 0.7, 0.2]).unwrap();
        assert_eq!(res.index, 1);
        assert_eq!(res.label, "B");
        assert_eq!(res.confidence, 0.7);
    }

    #[test]
    fn test_tie_break_selects_lowest_index() {
        let labels = table(&["A", "B", "C", "D", "E", "F"]);
        let scores = [0.05, 0.05, 0.3, 0.0, 0.0, 0.3];
        let res = labels.resolve(&scores).unwrap();
        assert_eq!(res.index, 2);
        assert_eq!(res.label, "C");
        assert_eq!(res.confidence, 0.3);
    }

    #[test]
    fn test_confidence_is_raw_score() {
        let labels = table(&["A", "B"]);
        let res = labels.resolve(&[0.123_456_78, 0.1]).unwrap();
        assert_eq!(res.confidence, 0.123_456_78);
    }

    #[test]
    fn test_length_mismatch_is_out_of_range() {
        let labels = table(&["A", "B", "C"]);
        let err = labels.resolve(&[0.5, 0.5]).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::LabelIndexOutOfRange {
                scores: 2,
                labels: 3
            }
        ));

        let err = labels.resolve(&[0.1, 0.2, 0.3, 0.4]).unwrap_err();
        assert!(matches!(err, InferenceError::LabelIndexOutOfRange { .. }));
    }

    #[test]
    fn test_nan_never_wins() {
        let labels = table(&["A", "B", "C"]);
        let res = labels.resolve(&[f32::NAN, 0.2, 0.1]).unwrap();
        assert_eq!(res.index, 1);

        let err = labels.resolve(&[f32::NAN; 3]).unwrap_err();
        assert!(matches!(err, InferenceError::InferenceFailure(_)));
    }

    #[test]
    fn test_parse_trims_and_drops_trailing_blank_lines() {
        let labels = LabelTable::parse("A\r\n B \nC\n\n\n").unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(1), Some("B"));
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert!(labels.contains("C"));
    }

    #[test]
    fn test_parse_rejects_empty_and_interior_blank() {
        assert!(matches!(LabelTable::parse(""), Err(LabelTableError::Empty)));
        assert!(matches!(
            LabelTable::parse("\n\n"),
            Err(LabelTableError::Empty)
        ));
        assert!(matches!(
            LabelTable::parse("A\n\nC\n"),
            Err(LabelTableError::BlankLabel { line: 2 })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hello").unwrap();
        writeln!(file, "thanks").unwrap();

        let labels = LabelTable::load(file.path()).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(0), Some("hello"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = LabelTable::load(Path::new("/nonexistent/labels.txt")).unwrap_err();
        assert!(matches!(err, LabelTableError::Io(_)));
    }
}
