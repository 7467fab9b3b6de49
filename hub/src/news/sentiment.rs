//! Headline polarity from a small financial lexicon.
//!
//! Each matched word carries a polarity in [-1, 1]. A preceding negator
//! flips and halves it; a preceding intensifier scales it. The headline's
//! polarity is the mean over matched words, `0.0` when nothing matches.

use std::collections::HashMap;

pub struct SentimentAnalyzer {
    lexicon: HashMap<&'static str, f64>,
}

const NEGATORS: &[&str] = &[
    "not", "no", "never", "without", "isn't", "aren't", "doesn't", "don't", "won't",
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("sharply", 1.4),
    ("strongly", 1.3),
    ("extremely", 1.5),
    ("slightly", 0.6),
    ("modestly", 0.7),
];

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self {
            lexicon: build_lexicon(),
        }
    }

    /// Polarity in [-1, 1].
    pub fn polarity(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|t| !t.is_empty())
            .collect();

        let mut scores = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            let Some(&base) = self.lexicon.get(token) else {
                continue;
            };
            let mut score = base;
            if let Some(prev) = i.checked_sub(1).map(|j| tokens[j]) {
                if let Some((_, k)) = INTENSIFIERS.iter().find(|(w, _)| *w == prev) {
                    score *= k;
                }
            }
            let negated = tokens[i.saturating_sub(3)..i].iter().any(|t| NEGATORS.contains(t));
            if negated {
                score *= -0.5;
            }
            scores.push(score.clamp(-1.0, 1.0));
        }

        if scores.is_empty() {
            return 0.0;
        }
        (scores.iter().sum::<f64>() / scores.len() as f64).clamp(-1.0, 1.0)
    }
}

fn build_lexicon() -> HashMap<&'static str, f64> {
    let positive: &[(&str, f64)] = &[
        // Price action
        ("rally", 0.6), ("rallies", 0.6), ("surge", 0.7), ("surges", 0.7), ("soar", 0.8),
        ("soars", 0.8), ("jump", 0.5), ("jumps", 0.5), ("gain", 0.4), ("gains", 0.4),
        ("rise", 0.3), ("rises", 0.3), ("climb", 0.4), ("climbs", 0.4), ("rebound", 0.4),
        ("high", 0.2), ("record", 0.5), ("bullish", 0.7), ("upgrade", 0.6), ("upgrades", 0.6),
        // Results
        ("beat", 0.5), ("beats", 0.5), ("profit", 0.4), ("profits", 0.4), ("growth", 0.5),
        ("strong", 0.4), ("robust", 0.5), ("outperform", 0.6), ("outperforms", 0.6),
        ("optimistic", 0.6), ("positive", 0.3), ("boost", 0.5), ("boosts", 0.5),
        ("good", 0.7), ("great", 0.8), ("best", 1.0), ("win", 0.8), ("wins", 0.8),
    ];
    let negative: &[(&str, f64)] = &[
        // Price action
        ("fall", -0.4), ("falls", -0.4), ("drop", -0.4), ("drops", -0.4), ("slump", -0.6),
        ("slumps", -0.6), ("plunge", -0.8), ("plunges", -0.8), ("tumble", -0.6), ("tumbles", -0.6),
        ("sink", -0.5), ("sinks", -0.5), ("crash", -0.9), ("selloff", -0.6), ("low", -0.2),
        ("bearish", -0.7), ("downgrade", -0.6), ("downgrades", -0.6), ("volatile", -0.3),
        // Results
        ("miss", -0.5), ("misses", -0.5), ("loss", -0.5), ("losses", -0.5), ("weak", -0.4),
        ("decline", -0.4), ("declines", -0.4), ("recession", -0.7), ("fear", -0.6), ("fears", -0.6),
        ("risk", -0.3), ("risks", -0.3), ("layoffs", -0.6), ("lawsuit", -0.5), ("fraud", -0.9),
        ("bad", -0.7), ("worst", -1.0), ("crisis", -0.8), ("uncertainty", -0.4),
    ];
    positive.iter().chain(negative).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_text_is_zero() {
        let a = SentimentAnalyzer::new();
        assert_eq!(a.polarity(""), 0.0);
        assert_eq!(a.polarity("Company announces quarterly call date"), 0.0);
    }

    #[test]
    fn sign_follows_lexicon() {
        let a = SentimentAnalyzer::new();
        assert!(a.polarity("Tech stocks surge to record high") > 0.0);
        assert!(a.polarity("Shares plunge after earnings miss") < 0.0);
    }

    #[test]
    fn negation_flips_and_intensifier_scales() {
        let a = SentimentAnalyzer::new();
        assert!((a.polarity("profits") - 0.4).abs() < 1e-12);
        assert!((a.polarity("no profits") + 0.2).abs() < 1e-12);
        assert!(a.polarity("sharply drops") < a.polarity("drops"));
    }

    #[test]
    fn polarity_is_bounded() {
        let a = SentimentAnalyzer::new();
        let p = a.polarity("extremely best best best, extremely great");
        assert!((-1.0..=1.0).contains(&p));
        let n = a.polarity("extremely worst crash");
        assert!((-1.0..=1.0).contains(&n));
    }
}
