//! Word lists and tokenization shared by the scoring heuristics.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Word lists consulted by the importance scorer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringLexicon {
    /// Tokens that carry no topic signal.
    pub common_words: Vec<String>,
    /// Grammatical words excluded from the density ratio.
    pub function_words: Vec<String>,
    /// Substrings that mark a memory as worth keeping.
    pub important_keywords: Vec<String>,
}

impl Default for ScoringLexicon {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| (*w).to_string()).collect();
        Self {
            common_words: words(&[
                "的", "了", "是", "我", "你", "他", "她", "在", "有", "和", "就", "都", "也",
                "很", "吗", "呢", "啊", "吧", "嗯", "哦", "这个", "那个", "什么", "我们",
                "你们", "他们", "一下", "the", "a", "an", "is", "are", "was", "be", "i",
                "you", "it", "to", "and", "of", "in", "on", "ok", "yes", "no",
            ]),
            function_words: words(&[
                "的", "了", "着", "过", "吗", "呢", "啊", "吧", "呀", "嘛", "和", "与", "而",
                "但", "或", "就", "都", "也", "the", "a", "an", "of", "to", "in", "on", "at",
                "and", "or", "but", "is", "are", "was", "were", "be", "it", "that", "this",
            ]),
            important_keywords: words(&[
                "喜欢", "讨厌", "生日", "名字", "工作", "家", "记住", "重要", "约定", "梦想",
                "害怕", "爱", "哥哥", "妹妹", "限定", "蜂黄泉", "birthday", "remember",
                "important", "favorite", "name", "promise",
            ]),
        }
    }
}

/// Lower-cased word tokens: maximal runs of letters, digits and `_`, with
/// every CJK character as its own token.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in words(&text.to_lowercase()) {
        for (cjk, piece) in script_runs(word) {
            if cjk {
                tokens.extend(piece.chars().map(String::from));
            } else {
                tokens.push(piece.to_string());
            }
        }
    }
    tokens
}

/// Tokens for the importance heuristics.
///
/// Like [`tokenize`], except that a CJK run is cut at the `stop_words` it
/// contains (longest match first). Each stop word becomes a token, and
/// the text between two stop words stays one content token.
#[must_use]
pub fn segment(text: &str, stop_words: &HashSet<String>) -> Vec<String> {
    let longest = stop_words.iter().map(|word| char_len(word)).max().unwrap_or(0);
    let mut tokens = Vec::new();
    for word in words(&text.to_lowercase()) {
        for (cjk, piece) in script_runs(word) {
            if !cjk {
                tokens.push(piece.to_string());
                continue;
            }
            let chars: Vec<char> = piece.chars().collect();
            let mut pending = String::new();
            let mut at = 0;
            while at < chars.len() {
                let stop = (1..=longest.min(chars.len() - at))
                    .rev()
                    .find(|len| stop_words.contains(&chars[at..at + len].iter().collect::<String>()));
                match stop {
                    Some(len) => {
                        if !pending.is_empty() {
                            tokens.push(std::mem::take(&mut pending));
                        }
                        tokens.push(chars[at..at + len].iter().collect());
                        at += len;
                    }
                    None => {
                        pending.push(chars[at]);
                        at += 1;
                    }
                }
            }
            if !pending.is_empty() {
                tokens.push(pending);
            }
        }
    }
    tokens
}

/// Whether `ch` is a Han, kana or Hangul character.
#[must_use]
pub const fn is_cjk(ch: char) -> bool {
    matches!(
        ch,
        '\u{3040}'..='\u{30FF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{AC00}'..='\u{D7AF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{20000}'..='\u{2A6DF}'
    )
}

fn words(lowered: &str) -> impl Iterator<Item = &str> {
    lowered
        .split(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
        .filter(|word| !word.is_empty())
}

/// Split `word` into maximal CJK and non-CJK pieces, flagged `true` for CJK.
fn script_runs(word: &str) -> Vec<(bool, &str)> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (index, ch) in word.char_indices() {
        let cjk = is_cjk(ch);
        if let Some(previous) = current.filter(|flag| *flag != cjk) {
            runs.push((previous, &word[start..index]));
            start = index;
        }
        current = Some(cjk);
    }
    if let Some(flag) = current {
        runs.push((flag, &word[start..]));
    }
    runs
}

/// Distinct tokens of `text`.
#[must_use]
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Jaccard similarity of the token sets of two texts; `0.0` when both are empty.
#[must_use]
pub fn jaccard(left: &str, right: &str) -> f64 {
    let left = token_set(left);
    let right = token_set(right);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    #[allow(clippy::cast_precision_loss)]
    {
        intersection as f64 / union as f64
    }
}

/// Character count, not byte count.
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("Hello, WORLD! 你好 x_1"),
            vec!["hello", "world", "你", "好", "x_1"]
        );
        assert_eq!(tokenize("学AI吧"), vec!["学", "ai", "吧"]);
        assert!(tokenize("  ?! ").is_empty());
    }

    #[test]
    fn test_segment_cuts_cjk_runs_at_stop_words() {
        let stops: HashSet<String> = ["的", "了", "我", "我们", "什么"]
            .iter()
            .map(|w| (*w).to_string())
            .collect();
        assert_eq!(
            segment("我们去看电影了", &stops),
            vec!["我们", "去看电影", "了"]
        );
        assert_eq!(segment("我的量子计算机", &stops), vec!["我", "的", "量子计算机"]);
        assert_eq!(segment("Rust是什么", &stops), vec!["rust", "是", "什么"]);
        assert_eq!(segment("今天下雨", &HashSet::new()), vec!["今天下雨"]);
    }

    #[test]
    fn test_jaccard_counts_shared_cjk_characters() {
        assert!((jaccard("天空", "天气") - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_jaccard() {
        assert!((jaccard("a b c", "b c d") - 0.5).abs() < 1e-12);
        assert!((jaccard("same words", "Same WORDS") - 1.0).abs() < 1e-12);
        assert!(jaccard("", "").abs() < f64::EPSILON);
    }
}
