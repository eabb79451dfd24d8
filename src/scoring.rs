//! Scoring of flattened model predictions against the gold labels encoded
//! in the custom ids. Same-source is the positive class throughout.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::prompts::{gold_label_of, GoldLabel};

/// Flattened model verdict: either the parsed answer or a parse error.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Verdict {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

/// One line of the predictions JSONL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredRecord {
    pub custom_id: String,
    pub response: Verdict,
}

/// Accumulates prediction rows into a confusion matrix and error counters.
/// Rows are appended one at a time; metrics are derived on demand.
#[derive(Debug, Default)]
pub struct Scoreboard {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    pub unlabeled: usize,
    pub duplicates: Vec<String>,
    seen: HashSet<String>,
    pub pred_same_true_same: usize,
    pub pred_same_true_diff: usize,
    pub pred_diff_true_same: usize,
    pub pred_diff_true_diff: usize,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, rec: &PredRecord) {
        if !self.seen.insert(rec.custom_id.clone()) {
            self.duplicates.push(rec.custom_id.clone());
        }
        self.total += 1;

        let gold = match gold_label_of(&rec.custom_id) {
            Some(label) => label,
            None => {
                self.unlabeled += 1;
                return;
            }
        };

        // A missing answer counts as a parse failure, not a "diff" vote.
        let answer = match (&rec.response.parse_error, rec.response.answer) {
            (None, Some(answer)) => answer,
            _ => {
                self.errors += 1;
                return;
            }
        };
        self.success += 1;

        match (answer, gold) {
            (true, GoldLabel::Same) => self.pred_same_true_same += 1,
            (true, GoldLabel::Diff) => self.pred_same_true_diff += 1,
            (false, GoldLabel::Same) => self.pred_diff_true_same += 1,
            (false, GoldLabel::Diff) => self.pred_diff_true_diff += 1,
        }
    }

    /// Correct verdicts over *all* recorded entries, so parse failures
    /// count against the model rather than vanishing from the denominator.
    pub fn accuracy(&self) -> f64 {
        ratio(
            self.pred_same_true_same + self.pred_diff_true_diff,
            self.total,
        )
    }

    pub fn precision(&self) -> f64 {
        ratio(
            self.pred_same_true_same,
            self.pred_same_true_same + self.pred_same_true_diff,
        )
    }

    pub fn recall(&self) -> f64 {
        ratio(
            self.pred_same_true_same,
            self.pred_same_true_same + self.pred_diff_true_same,
        )
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Matthews correlation coefficient; 0.0 when any marginal is empty.
    pub fn mcc(&self) -> f64 {
        let tp = self.pred_same_true_same as f64;
        let fp = self.pred_same_true_diff as f64;
        let fn_ = self.pred_diff_true_same as f64;
        let tn = self.pred_diff_true_diff as f64;

        let denom = ((tp + fp) * (tn + fn_) * (tp + fn_) * (tn + fp)).sqrt();
        if denom == 0.0 {
            0.0
        } else {
            (tp * tn - fp * fn_) / denom
        }
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(custom_id: &str, answer: Option<bool>, parse_error: Option<&str>) -> PredRecord {
        PredRecord {
            custom_id: custom_id.to_owned(),
            response: Verdict {
                analysis: answer.map(|_| "reasoning".to_owned()),
                answer,
                parse_error: parse_error.map(str::to_owned),
            },
        }
    }

    #[test]
    fn confusion_matrix_fills_the_right_cells() {
        let mut board = Scoreboard::new();
        board.record(&rec("same_source_pair_0000", Some(true), None)); // tp
        board.record(&rec("same_source_pair_0001", Some(false), None)); // fn
        board.record(&rec("diff_source_pair_0002", Some(true), None)); // fp
        board.record(&rec("diff_source_pair_0003", Some(false), None)); // tn

        assert_eq!(board.pred_same_true_same, 1);
        assert_eq!(board.pred_diff_true_same, 1);
        assert_eq!(board.pred_same_true_diff, 1);
        assert_eq!(board.pred_diff_true_diff, 1);
        assert_eq!(board.total, 4);
        assert_eq!(board.success, 4);
        assert!((board.accuracy() - 0.5).abs() < 1e-9);
        assert!((board.precision() - 0.5).abs() < 1e-9);
        assert!((board.recall() - 0.5).abs() < 1e-9);
        assert!((board.f1() - 0.5).abs() < 1e-9);
        assert!(board.mcc().abs() < 1e-9);
    }

    #[test]
    fn parse_errors_and_missing_answers_are_not_scored() {
        let mut board = Scoreboard::new();
        board.record(&rec("same_source_pair_0000", None, Some("bad json")));
        board.record(&rec("diff_source_pair_0001", None, None));
        assert_eq!(board.total, 2);
        assert_eq!(board.errors, 2);
        assert_eq!(board.success, 0);
        assert_eq!(board.accuracy(), 0.0);
    }

    #[test]
    fn parse_errors_depress_accuracy() {
        let mut board = Scoreboard::new();
        board.record(&rec("same_source_pair_0000", Some(true), None));
        board.record(&rec("diff_source_pair_0001", Some(false), None));
        board.record(&rec("same_source_pair_0002", None, Some("bad json")));
        assert_eq!(board.total, 3);
        assert_eq!(board.success, 2);
        assert_eq!(board.errors, 1);
        assert!((board.accuracy() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let mut board = Scoreboard::new();
        board.record(&rec("same_source_pair_0000", Some(true), None));
        board.record(&rec("same_source_pair_0000", Some(true), None));
        assert_eq!(board.duplicates, ["same_source_pair_0000"]);
    }

    #[test]
    fn perfect_run_scores_one_everywhere() {
        let mut board = Scoreboard::new();
        board.record(&rec("same_source_pair_0000", Some(true), None));
        board.record(&rec("diff_source_pair_0001", Some(false), None));
        assert!((board.accuracy() - 1.0).abs() < 1e-9);
        assert!((board.f1() - 1.0).abs() < 1e-9);
        assert!((board.mcc() - 1.0).abs() < 1e-9);
    }
}
