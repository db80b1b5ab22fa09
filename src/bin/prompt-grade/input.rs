use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Context;

/// Reads prompts from `path`, or stdin when no path is given.
pub fn read_prompts(path: Option<&Path>) -> anyhow::Result<Vec<String>> {
    let text = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read prompts from {}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read prompts from stdin")?;
            text
        }
    };
    parse_prompts(&text)
}

/// A JSON array of strings keeps multi-line and empty prompts intact;
/// anything else is one prompt per non-blank line.
pub fn parse_prompts(text: &str) -> anyhow::Result<Vec<String>> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text).context("input looks like JSON but is not an array of strings");
    }
    Ok(text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_one_prompt_per_line() {
        let prompts = parse_prompts("첫 번째 프롬프트\n\n두 번째 프롬프트  \n").unwrap();
        assert_eq!(prompts, ["첫 번째 프롬프트", "두 번째 프롬프트"]);
    }

    #[test]
    fn json_array_keeps_multiline_and_empty_prompts() {
        let prompts = parse_prompts(r#"["line one\nline two", ""]"#).unwrap();
        assert_eq!(prompts, ["line one\nline two", ""]);
    }

    #[test]
    fn json_of_wrong_shape_is_rejected() {
        assert!(parse_prompts(r#"[1, 2]"#).is_err());
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.txt");
        fs::write(&path, "a\nb\n").unwrap();
        assert_eq!(read_prompts(Some(&path)).unwrap(), ["a", "b"]);
    }
}
