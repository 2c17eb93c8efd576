//! 内容分析器。
//!
//! 纯函数：文本 -> {是否脏话, 情感极性, 主观性}。对确定输入结果确定，
//! 无副作用；空白或无法识别的输入退化为中性结果，绝不让调用方失败。

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

/// 分析结果。极性范围 [-1, 1]，主观性范围 [0, 1]。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentAnalysis {
    pub profane: bool,
    pub polarity: f64,
    pub subjectivity: f64,
}

impl ContentAnalysis {
    pub const NEUTRAL: Self = Self {
        profane: false,
        polarity: 0.0,
        subjectivity: 0.0,
    };
}

/// 脏话词表。
static PROFANITY: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "arse", "ass", "asshole", "bastard", "bitch", "bollocks", "bullshit", "crap", "damn",
        "dammit", "dick", "douche", "fuck", "fucking", "goddamn", "hell", "jackass", "jerk",
        "piss", "prick", "shit", "shitty", "slut", "twat", "wanker",
    ]
    .into_iter()
    .collect()
});

/// 情感词表：单词 -> (极性, 主观性)。
static SENTIMENT: Lazy<HashMap<&'static str, (f64, f64)>> = Lazy::new(|| {
    [
        ("amazing", (0.6, 0.9)),
        ("angry", (-0.5, 1.0)),
        ("annoying", (-0.6, 0.8)),
        ("awesome", (1.0, 1.0)),
        ("awful", (-1.0, 1.0)),
        ("bad", (-0.7, 0.67)),
        ("beautiful", (0.85, 1.0)),
        ("best", (1.0, 0.3)),
        ("boring", (-1.0, 1.0)),
        ("cool", (0.35, 0.65)),
        ("cruel", (-0.8, 0.9)),
        ("disgusting", (-1.0, 1.0)),
        ("dumb", (-0.6, 0.8)),
        ("excellent", (1.0, 1.0)),
        ("fantastic", (0.9, 0.9)),
        ("friendly", (0.4, 0.6)),
        ("fun", (0.3, 0.2)),
        ("good", (0.7, 0.6)),
        ("great", (0.8, 0.75)),
        ("happy", (0.8, 1.0)),
        ("hate", (-0.8, 0.9)),
        ("hateful", (-0.9, 0.9)),
        ("horrible", (-1.0, 1.0)),
        ("kind", (0.6, 0.9)),
        ("lame", (-0.5, 0.75)),
        ("loser", (-0.7, 0.8)),
        ("love", (0.5, 0.6)),
        ("lovely", (0.75, 0.95)),
        ("mean", (-0.5, 0.7)),
        ("nasty", (-0.8, 0.9)),
        ("nice", (0.6, 1.0)),
        ("pathetic", (-0.8, 0.9)),
        ("perfect", (1.0, 1.0)),
        ("rude", (-0.6, 0.8)),
        ("sad", (-0.5, 1.0)),
        ("scary", (-0.6, 0.9)),
        ("stupid", (-0.8, 0.9)),
        ("terrible", (-1.0, 1.0)),
        ("ugly", (-0.7, 0.8)),
        ("unfriendly", (-0.4, 0.6)),
        ("wonderful", (1.0, 1.0)),
        ("worst", (-1.0, 1.0)),
        ("worthless", (-0.8, 0.9)),
        ("wrong", (-0.5, 0.7)),
    ]
    .into_iter()
    .collect()
});

/// 否定词：反转并衰减其后第一个情感词的极性。
static NEGATORS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "aint", "cannot", "cant", "couldnt", "doesnt", "dont", "isnt", "never", "no", "none",
        "not", "nothing", "shouldnt", "wasnt", "wont", "wouldnt",
    ]
    .into_iter()
    .collect()
});

/// 分析一段文本。
pub fn analyze(text: &str) -> ContentAnalysis {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return ContentAnalysis::NEUTRAL;
    }

    let profane = tokens.iter().any(|token| PROFANITY.contains(token.as_str()));

    let mut polarities = Vec::new();
    let mut subjectivities = Vec::new();
    let mut negated = false;
    for token in &tokens {
        if NEGATORS.contains(token.as_str()) {
            negated = true;
            continue;
        }
        if let Some(&(polarity, subjectivity)) = SENTIMENT.get(token.as_str()) {
            // 否定词反转并衰减其修饰的情感词
            let polarity = if negated { polarity * -0.5 } else { polarity };
            polarities.push(polarity);
            subjectivities.push(subjectivity);
            negated = false;
        }
    }

    if polarities.is_empty() {
        return ContentAnalysis {
            profane,
            polarity: 0.0,
            subjectivity: 0.0,
        };
    }

    let polarity = mean(&polarities).clamp(-1.0, 1.0);
    let subjectivity = mean(&subjectivities).clamp(0.0, 1.0);

    ContentAnalysis {
        profane,
        polarity,
        subjectivity,
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// 小写字母数字分词；单词内的撇号直接去掉，让 "don't" 归一成 "dont"。
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                current.push(lower);
            }
        } else if ch == '\'' {
            continue;
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_yields_neutral_defaults() {
        for text in ["", "   ", "\n\t", "!!! ???"] {
            let analysis = analyze(text);
            assert!(!analysis.profane);
            assert_eq!(analysis.polarity, 0.0);
            assert_eq!(analysis.subjectivity, 0.0);
        }
    }

    #[test]
    fn detects_profanity_regardless_of_case() {
        assert!(analyze("well DAMN that happened").profane);
        assert!(!analyze("what a lovely afternoon").profane);
    }

    #[test]
    fn positive_text_scores_positive() {
        let analysis = analyze("what a wonderful and happy day");
        assert!(analysis.polarity > 0.5);
        assert!(analysis.subjectivity > 0.5);
    }

    #[test]
    fn hostile_text_scores_negative_and_subjective() {
        let analysis = analyze("I hate this, it is awful and terrible");
        assert!(analysis.polarity < -0.5);
        assert!(analysis.subjectivity > 0.5);
    }

    #[test]
    fn negation_inverts_and_dampens() {
        let plain = analyze("this is good");
        let negated = analyze("this is not good");

        assert_eq!(plain.polarity, 0.7);
        assert_eq!(negated.polarity, -0.35);
    }

    #[test]
    fn contractions_negate_too() {
        let analysis = analyze("I don't love it");
        assert!(analysis.polarity < 0.0);
    }

    #[test]
    fn deterministic_for_same_input() {
        let first = analyze("such a great and fun evening");
        let second = analyze("such a great and fun evening");
        assert_eq!(first, second);
    }

    #[test]
    fn scores_stay_within_documented_ranges() {
        let analysis = analyze("awesome wonderful perfect excellent");
        assert!(analysis.polarity <= 1.0);
        assert!(analysis.subjectivity <= 1.0);
    }
}
