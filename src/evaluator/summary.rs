use serde::Serialize;

use crate::checklist::{CHECKLIST, CHECKLIST_LEN};
use crate::grade::Grade;

/// How many scored rows met one checklist item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemTotal {
    pub item: &'static str,
    pub count: usize,
}

/// Aggregate counts over the grades of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub scored: usize,
    pub throttled: usize,
    pub failed: usize,
    /// Checklist order
    pub items: Vec<ItemTotal>,
}

impl BatchSummary {
    pub fn from_grades(grades: &[Grade]) -> Self {
        let mut counts = [0usize; CHECKLIST_LEN];
        let (mut scored, mut throttled, mut failed) = (0, 0, 0);

        for grade in grades {
            match grade {
                Grade::Scored(evaluation) => {
                    scored += 1;
                    for (count, value) in counts.iter_mut().zip(evaluation.scores.values()) {
                        *count += usize::from(*value);
                    }
                }
                Grade::Throttled { .. } => throttled += 1,
                Grade::Failed { .. } => failed += 1,
            }
        }

        Self {
            total: grades.len(),
            scored,
            throttled,
            failed,
            items: CHECKLIST
                .iter()
                .zip(counts)
                .map(|(item, count)| ItemTotal {
                    item: item.name,
                    count,
                })
                .collect(),
        }
    }

    pub fn item_count(&self, name: &str) -> Option<usize> {
        self.items.iter().find(|t| t.item == name).map(|t| t.count)
    }

    pub(crate) fn log(&self) {
        log::info!(
            "graded {} rows: {} scored, {} throttled, {} failed",
            self.total,
            self.scored,
            self.throttled,
            self.failed
        );
    }
}
