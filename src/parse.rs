//! Strict parsing of model answers into [`Evaluation`] values.
//!
//! Parsing fails closed: a missing item, a score other than 0/1, or an absent
//! feedback string is a [`GradeError::ResponseFormatError`], never a default.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Deserializer, Map, Value};

use crate::checklist::{ChecklistScores, Evaluation, CHECKLIST, CHECKLIST_LEN, FEEDBACK_KEY};
use crate::error::GradeError;
use crate::template::ORDINAL_KEY;

const FEEDBACK_ALIASES: [&str; 2] = [FEEDBACK_KEY, "feedback"];

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z]*\s*\n?(.*?)```").expect("code fence pattern is valid")
    })
}

/// Parses a single-prompt answer.
///
/// The JSON object may be wrapped in a code fence. Feedback is read from the
/// object, or from free text following it when the object has none.
pub fn parse_evaluation(raw: &str) -> Result<Evaluation, GradeError> {
    let body = strip_code_fence(raw);
    let (value, rest) = first_json_value(&body, '{', Value::is_object)
        .ok_or_else(|| GradeError::malformed("no JSON object in answer", raw))?;
    let Value::Object(object) = value else {
        return Err(GradeError::malformed("answer is not a JSON object", raw));
    };
    let trailing = trailing_feedback(rest).or_else(|| trailing_feedback(after_fence(raw)));
    evaluation_from_object(&object, trailing, raw)
}

/// Parses a batched answer holding `expected` records.
///
/// Returns one entry per prompt, in prompt order. Records are matched by their
/// ordinal field; a slot without a usable record gets its own error.
pub fn parse_batch(
    raw: &str,
    expected: usize,
) -> Result<Vec<Result<Evaluation, GradeError>>, GradeError> {
    let body = strip_code_fence(raw);
    let (value, _) = first_json_value(&body, '[', is_record_array)
        .ok_or_else(|| GradeError::malformed("no JSON array in answer", raw))?;
    let Value::Array(records) = value else {
        return Err(GradeError::malformed("answer is not a JSON array", raw));
    };

    let mut slots: Vec<Option<Result<Evaluation, GradeError>>> =
        (0..expected).map(|_| None).collect();

    let ordinals: Vec<Option<usize>> = records.iter().map(record_ordinal).collect();
    let any_ordinal = ordinals.iter().any(Option::is_some);

    if !any_ordinal {
        if records.len() != expected {
            let message = format!(
                "expected {expected} records without ordinals, got {}",
                records.len()
            );
            return Ok((0..expected)
                .map(|_| Err(GradeError::malformed(message.clone(), raw)))
                .collect());
        }
        for (slot, record) in slots.iter_mut().zip(records.iter()) {
            *slot = Some(record_to_evaluation(record, raw));
        }
    } else {
        for (record, ordinal) in records.iter().zip(ordinals) {
            let Some(ordinal) = ordinal else {
                log::warn!("dropping batch record without \"{ORDINAL_KEY}\"");
                continue;
            };
            let Some(slot) = ordinal.checked_sub(1).and_then(|idx| slots.get_mut(idx)) else {
                log::warn!("dropping batch record with out-of-range id {ordinal}");
                continue;
            };
            *slot = Some(match slot {
                Some(_) => Err(GradeError::malformed(
                    format!("duplicate record for item {ordinal}"),
                    raw,
                )),
                None => record_to_evaluation(record, raw),
            });
        }
    }

    Ok(slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.unwrap_or_else(|| {
                Err(GradeError::malformed(
                    format!("no record returned for item {}", idx + 1),
                    raw,
                ))
            })
        })
        .collect())
}

fn record_ordinal(record: &Value) -> Option<usize> {
    let value = record.as_object()?.get(ORDINAL_KEY)?;
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().trim_matches(['[', ']']).parse().ok(),
        _ => None,
    }
}

fn record_to_evaluation(record: &Value, raw: &str) -> Result<Evaluation, GradeError> {
    match record {
        Value::Object(object) => evaluation_from_object(object, None, raw),
        _ => Err(GradeError::malformed("batch record is not an object", raw)),
    }
}

fn evaluation_from_object(
    object: &Map<String, Value>,
    trailing_feedback: Option<String>,
    raw: &str,
) -> Result<Evaluation, GradeError> {
    let mut values = [0u8; CHECKLIST_LEN];
    for (slot, item) in values.iter_mut().zip(CHECKLIST.iter()) {
        let value = object
            .get(item.name)
            .ok_or_else(|| GradeError::malformed(format!("missing item \"{}\"", item.name), raw))?;
        *slot = binary_score(value).ok_or_else(|| {
            GradeError::malformed(
                format!("item \"{}\" must be 0 or 1, got {value}", item.name),
                raw,
            )
        })?;
    }
    let scores = ChecklistScores::from_values(values)
        .ok_or_else(|| GradeError::malformed("scores out of range", raw))?;

    let feedback = FEEDBACK_ALIASES
        .iter()
        .find_map(|key| object.get(*key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .or(trailing_feedback)
        .ok_or_else(|| GradeError::malformed("missing feedback", raw))?;

    Ok(Evaluation::new(scores, feedback))
}

fn binary_score(value: &Value) -> Option<u8> {
    match value {
        Value::Bool(flag) => Some(u8::from(*flag)),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(0),
            Some(1) => Some(1),
            _ => None,
        },
        _ => None,
    }
}

fn strip_code_fence(raw: &str) -> String {
    match code_fence().captures(raw).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().to_string(),
        None => raw.to_string(),
    }
}

fn after_fence(raw: &str) -> &str {
    match code_fence().find(raw) {
        Some(m) => &raw[m.end()..],
        None => "",
    }
}

fn is_record_array(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|records| records.iter().all(Value::is_object))
}

/// Decodes the first accepted JSON value starting at `open`, returning it with the text after it.
fn first_json_value(
    text: &str,
    open: char,
    accept: impl Fn(&Value) -> bool,
) -> Option<(Value, &str)> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(open) {
        let start = search_from + offset;
        let mut stream = Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            if accept(&value) {
                let end = start + stream.byte_offset();
                return Some((value, &text[end..]));
            }
        }
        search_from = start + open.len_utf8();
    }
    None
}

fn trailing_feedback(rest: &str) -> Option<String> {
    let text = rest.trim().trim_matches('`').trim();
    let text = FEEDBACK_ALIASES
        .iter()
        .find_map(|key| text.strip_prefix(*key))
        .map(|stripped| stripped.trim_start_matches([':', '：', ' ']).trim())
        .unwrap_or(text);
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(scores: &[(&str, u8)], feedback: Option<&str>) -> String {
        let mut object = Map::new();
        for item in CHECKLIST.iter() {
            let score = scores
                .iter()
                .find(|(name, _)| *name == item.name)
                .map(|(_, s)| *s)
                .unwrap_or(0);
            object.insert(item.name.to_string(), Value::from(score));
        }
        if let Some(feedback) = feedback {
            object.insert(FEEDBACK_KEY.to_string(), Value::from(feedback));
        }
        Value::Object(object).to_string()
    }

    #[test]
    fn parses_plain_object() {
        let raw = answer(&[("작업", 1), ("대상", 1)], Some("대상이 분명해요."));
        let eval = parse_evaluation(&raw).unwrap();
        assert_eq!(eval.score("작업"), Some(1));
        assert_eq!(eval.score("대상"), Some(1));
        assert_eq!(eval.score("예시"), Some(0));
        assert_eq!(eval.feedback, "대상이 분명해요.");
    }

    #[test]
    fn parses_fenced_object_with_trailing_feedback() {
        let raw = format!(
            "```json\n{}\n```\n피드백: 예시를 추가해 보세요.",
            answer(&[("역할", 1)], None)
        );
        let eval = parse_evaluation(&raw).unwrap();
        assert_eq!(eval.score("역할"), Some(1));
        assert_eq!(eval.feedback, "예시를 추가해 보세요.");
    }

    #[test]
    fn parses_object_after_preamble() {
        let raw = format!("평가 결과입니다:\n{} 잘 했어요!", answer(&[], None));
        let eval = parse_evaluation(&raw).unwrap();
        assert_eq!(eval.total(), 0);
        assert_eq!(eval.feedback, "잘 했어요!");
    }

    #[test]
    fn missing_item_fails_closed() {
        let raw = r#"{"역할": 1, "피드백": "ok"}"#;
        let err = parse_evaluation(raw).unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("missing item"));
    }

    #[test]
    fn non_binary_score_fails_closed() {
        let raw = answer(&[("규칙", 3)], Some("ok"));
        assert!(parse_evaluation(&raw).unwrap_err().is_malformed());
    }

    #[test]
    fn missing_feedback_fails_closed() {
        let raw = answer(&[], None);
        let err = parse_evaluation(&raw).unwrap_err();
        assert!(err.to_string().contains("missing feedback"));
    }

    #[test]
    fn plain_text_is_malformed() {
        assert!(parse_evaluation("I cannot evaluate this.").unwrap_err().is_malformed());
    }

    fn batch_record(id: Option<usize>, score: u8) -> String {
        let mut value: Value = serde_json::from_str(&answer(&[("작업", score)], Some("fb"))).unwrap();
        if let Some(id) = id {
            value[ORDINAL_KEY] = Value::from(id);
        }
        value.to_string()
    }

    #[test]
    fn batch_records_follow_ordinals_not_position() {
        let raw = format!("[{}, {}]", batch_record(Some(2), 0), batch_record(Some(1), 1));
        let parsed = parse_batch(&raw, 2).unwrap();
        assert_eq!(parsed[0].as_ref().unwrap().score("작업"), Some(1));
        assert_eq!(parsed[1].as_ref().unwrap().score("작업"), Some(0));
    }

    #[test]
    fn batch_missing_record_is_reported_in_its_own_slot() {
        let raw = format!("[{}, {}]", batch_record(Some(1), 1), batch_record(Some(3), 1));
        let parsed = parse_batch(&raw, 3).unwrap();
        assert!(parsed[0].is_ok());
        let err = parsed[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("no record returned for item 2"));
        assert!(parsed[2].is_ok());
    }

    #[test]
    fn batch_without_ordinals_uses_position_when_counts_match() {
        let raw = format!("[{}, {}]", batch_record(None, 1), batch_record(None, 0));
        let parsed = parse_batch(&raw, 2).unwrap();
        assert_eq!(parsed[0].as_ref().unwrap().score("작업"), Some(1));
        assert_eq!(parsed[1].as_ref().unwrap().score("작업"), Some(0));
    }

    #[test]
    fn batch_without_ordinals_and_wrong_count_fails_every_slot() {
        let raw = format!("[{}]", batch_record(None, 1));
        let parsed = parse_batch(&raw, 2).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed.iter().all(|slot| slot.is_err()));
    }

    #[test]
    fn batch_duplicate_ordinal_marks_slot_malformed() {
        let raw = format!("[{}, {}]", batch_record(Some(1), 1), batch_record(Some(1), 0));
        let parsed = parse_batch(&raw, 1).unwrap();
        assert!(parsed[0].as_ref().unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn batch_answer_must_be_an_array() {
        assert!(parse_batch("no array here", 2).unwrap_err().is_malformed());
    }

    #[test]
    fn batch_skips_bracketed_markers_before_the_array() {
        let raw = format!("[1] 결과:\n[{}]", batch_record(Some(1), 1));
        let parsed = parse_batch(&raw, 1).unwrap();
        assert!(parsed[0].is_ok());
    }
}
