//! In-process fallback converter.
//!
//! A greedy longest-match converter over a flat `pinyin -> word` table. It
//! knows nothing about context or n-grams; it exists so the bot keeps
//! answering when no external engine is available.
//!
//! Dictionary format, one entry per line:
//!
//! ```text
//! # comment
//! nihao	你好	1200
//! ni	你	900
//! hao	好
//! ```
//!
//! The third column is an optional frequency; for a repeated key the most
//! frequent word wins.

use std::collections::HashMap;
use std::path::Path;

use super::ImeError;

const LOG_TARGET: &str = "imebot::ime";

/// Dictionary-backed greedy converter.
#[derive(Debug, Default, Clone)]
pub struct SimpleIme {
    entries: HashMap<String, (String, u64)>,
    /// Longest key, in chars; bounds the match window
    max_key_chars: usize,
}

impl SimpleIme {
    pub fn load(path: &Path) -> Result<Self, ImeError> {
        let content = std::fs::read_to_string(path).map_err(|e| ImeError::Dictionary {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let ime = Self::parse(&content).map_err(|message| ImeError::Dictionary {
            path: path.to_path_buf(),
            message,
        })?;
        log::info!(
            target: LOG_TARGET,
            "Loaded {} dictionary entries from {}",
            ime.len(),
            path.display()
        );
        Ok(ime)
    }

    /// Parse dictionary text. Errors carry the 1-based line number.
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut ime = SimpleIme::default();
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cols = line.split('\t');
            let (Some(key), Some(word)) = (cols.next(), cols.next()) else {
                return Err(format!("line {}: expected `pinyin<TAB>word`", idx + 1));
            };
            let freq = match cols.next() {
                Some(f) => f
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| format!("line {}: bad frequency: {}", idx + 1, e))?,
                None => 0,
            };
            ime.insert(key, word.trim(), freq);
        }
        Ok(ime)
    }

    fn insert(&mut self, key: &str, word: &str, freq: u64) {
        let key = normalize(key);
        if key.is_empty() || word.is_empty() {
            return;
        }
        self.max_key_chars = self.max_key_chars.max(key.chars().count());
        match self.entries.get(&key) {
            Some((_, existing)) if *existing >= freq => {}
            _ => {
                self.entries.insert(key, (word.to_string(), freq));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert `text`, passing through anything the table does not cover.
    pub fn convert(&self, text: &str) -> String {
        let input: Vec<char> = normalize(text).chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;

        while pos < input.len() {
            let window = self.max_key_chars.min(input.len() - pos);
            let hit = (1..=window).rev().find_map(|len| {
                let key: String = input[pos..pos + len].iter().collect();
                self.entries.get(&key).map(|(word, _)| (word, len))
            });
            match hit {
                Some((word, len)) => {
                    out.push_str(word);
                    pos += len;
                }
                None => {
                    out.push(input[pos]);
                    pos += 1;
                }
            }
        }
        out
    }
}

/// Lower-case and drop syllable separators.
fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\'' | ' ' | '\u{a0}'))
        .flat_map(char::to_lowercase)
        .collect()
}
