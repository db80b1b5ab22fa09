//! The ten fixed checklist items and the structured evaluation record.

use std::fmt;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// Number of checklist items every evaluation scores.
pub const CHECKLIST_LEN: usize = 10;

/// A single named criterion scored 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecklistItem {
    /// Key the model must use in its JSON answer
    pub name: &'static str,
    /// Question the item answers
    pub description: &'static str,
}

/// Checklist in the order items are rendered and reported.
pub static CHECKLIST: [ChecklistItem; CHECKLIST_LEN] = [
    ChecklistItem {
        name: "역할",
        description: "프롬프트에 역할(예: 너는 선생님이다)이 명시되어 있는가?",
    },
    ChecklistItem {
        name: "대상",
        description: "프롬프트에 대상(예: 중학생에게 설명해줘)이 명시되어 있는가?",
    },
    ChecklistItem {
        name: "정보",
        description: "배경 정보 또는 설명이 포함되어 있는가?",
    },
    ChecklistItem {
        name: "작업",
        description: "명확한 작업(예: 요약해줘, 표로 정리해줘)이 명시되어 있는가?",
    },
    ChecklistItem {
        name: "규칙",
        description: "하지 말아야 할 금지 조건이 포함되어 있는가?",
    },
    ChecklistItem {
        name: "스타일",
        description: "어조, 톤, 스타일 지시가 포함되어 있는가?",
    },
    ChecklistItem {
        name: "제약사항",
        description: "분량, 시간 등의 제약 조건이 명시되어 있는가?",
    },
    ChecklistItem {
        name: "형식/구조",
        description: "JSON, 표, 목록 등의 출력 형식이 포함되어 있는가?",
    },
    ChecklistItem {
        name: "예시",
        description: "예시 또는 샘플이 포함되어 있는가?",
    },
    ChecklistItem {
        name: "프롬프트 테크닉",
        description: "few-shot, chain-of-thought 등의 고급 기법이 사용되었는가?",
    },
];

/// Key holding the free-text feedback in model answers.
pub const FEEDBACK_KEY: &str = "피드백";

/// Position of an item in [`CHECKLIST`].
pub fn item_index(name: &str) -> Option<usize> {
    CHECKLIST.iter().position(|item| item.name == name)
}

/// Item names joined for prompt rendering.
pub fn item_names(separator: &str) -> String {
    CHECKLIST
        .iter()
        .map(|item| item.name)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Per-item 0/1 scores in checklist order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ChecklistScores([u8; CHECKLIST_LEN]);

impl ChecklistScores {
    /// Builds scores from raw values; anything other than 0 or 1 is rejected.
    pub fn from_values(values: [u8; CHECKLIST_LEN]) -> Option<Self> {
        values.iter().all(|v| *v <= 1).then_some(Self(values))
    }

    pub fn get(&self, name: &str) -> Option<u8> {
        item_index(name).map(|idx| self.0[idx])
    }

    pub fn values(&self) -> &[u8; CHECKLIST_LEN] {
        &self.0
    }

    /// Items paired with their score, in checklist order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static ChecklistItem, u8)> + '_ {
        CHECKLIST.iter().zip(self.0.iter().copied())
    }

    pub fn total(&self) -> u32 {
        self.0.iter().map(|v| u32::from(*v)).sum()
    }
}

impl Serialize for ChecklistScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CHECKLIST_LEN))?;
        for (item, score) in self.iter() {
            map.serialize_entry(item.name, &score)?;
        }
        map.end()
    }
}

/// Structured evaluation of one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Evaluation {
    pub scores: ChecklistScores,
    pub feedback: String,
}

impl Evaluation {
    pub fn new(scores: ChecklistScores, feedback: impl Into<String>) -> Self {
        Self {
            scores,
            feedback: feedback.into(),
        }
    }

    pub fn score(&self, name: &str) -> Option<u8> {
        self.scores.get(name)
    }

    /// Number of items scored 1.
    pub fn total(&self) -> u32 {
        self.scores.total()
    }
}

impl Serialize for Evaluation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Evaluation", 3)?;
        state.serialize_field("scores", &self.scores)?;
        state.serialize_field("total", &self.total())?;
        state.serialize_field("feedback", &self.feedback)?;
        state.end()
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scored: Vec<String> = self
            .scores
            .iter()
            .map(|(item, score)| format!("{}={score}", item.name))
            .collect();
        write!(
            f,
            "{} ({}/{CHECKLIST_LEN}) {}",
            scored.join(", "),
            self.total(),
            self.feedback
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checklist_names_are_unique() {
        for (idx, item) in CHECKLIST.iter().enumerate() {
            assert_eq!(item_index(item.name), Some(idx));
        }
    }

    #[test]
    fn scores_reject_values_above_one() {
        let mut values = [0u8; CHECKLIST_LEN];
        values[3] = 2;
        assert!(ChecklistScores::from_values(values).is_none());
    }

    #[test]
    fn evaluation_serializes_in_checklist_order() {
        let mut values = [0u8; CHECKLIST_LEN];
        values[0] = 1;
        values[9] = 1;
        let eval = Evaluation::new(ChecklistScores::from_values(values).unwrap(), "좋아요");
        let json = serde_json::to_string(&eval).unwrap();
        let first = json.find("역할").unwrap();
        let last = json.find("프롬프트 테크닉").unwrap();
        assert!(first < last);
        assert!(json.contains("\"total\":2"));
        assert_eq!(eval.score("역할"), Some(1));
        assert_eq!(eval.score("없는 항목"), None);
    }
}
