//! Headline sentiment and word-frequency reporting.
//!
//! Scores are derived from a small valence lexicon tuned for political
//! headlines. Nothing here feeds back into filtering.

use std::collections::HashMap;
use std::fmt;

use crate::news::NewsItem;

/// Sign bucket of a headline's polarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn from_score(score: f64) -> Self {
        if score > 0.0 {
            Sentiment::Positive
        } else if score < 0.0 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const LEXICON: &[(&str, f64)] = &[
    // positive
    ("win", 2.8),
    ("wins", 2.7),
    ("won", 2.7),
    ("victory", 2.8),
    ("success", 2.7),
    ("successful", 2.8),
    ("support", 1.7),
    ("supports", 1.7),
    ("praise", 2.6),
    ("praised", 2.5),
    ("celebrate", 2.7),
    ("celebrates", 2.7),
    ("approve", 2.0),
    ("approved", 1.8),
    ("agreement", 2.2),
    ("deal", 1.2),
    ("boost", 1.7),
    ("boosts", 1.7),
    ("growth", 1.6),
    ("improve", 1.9),
    ("improves", 1.9),
    ("progress", 1.8),
    ("protect", 1.4),
    ("protects", 1.4),
    ("help", 1.7),
    ("helps", 1.7),
    ("good", 1.9),
    ("great", 3.1),
    ("best", 3.2),
    ("hope", 1.9),
    ("honor", 2.2),
    ("honored", 2.4),
    ("strong", 2.3),
    ("safe", 1.9),
    ("benefit", 2.0),
    ("benefits", 2.0),
    ("gain", 2.0),
    ("gains", 1.9),
    ("save", 2.2),
    ("saves", 2.2),
    ("relief", 2.1),
    ("bipartisan", 1.2),
    ("historic", 1.5),
    ("welcome", 2.0),
    ("welcomes", 2.0),
    ("thanks", 1.9),
    ("pass", 0.8),
    ("passes", 0.8),
    ("passed", 0.8),
    // negative
    ("lose", -1.9),
    ("loses", -1.9),
    ("lost", -1.3),
    ("loss", -1.3),
    ("defeat", -2.2),
    ("defeated", -2.1),
    ("fail", -2.5),
    ("fails", -2.2),
    ("failed", -2.3),
    ("failure", -2.3),
    ("attack", -2.1),
    ("attacks", -2.1),
    ("crisis", -3.1),
    ("scandal", -1.9),
    ("fraud", -2.8),
    ("corruption", -3.1),
    ("lawsuit", -1.2),
    ("sue", -1.2),
    ("sues", -1.2),
    ("sued", -1.3),
    ("indicted", -2.4),
    ("charged", -1.3),
    ("criticism", -1.9),
    ("criticize", -1.6),
    ("criticizes", -1.4),
    ("slam", -1.6),
    ("slams", -1.6),
    ("blast", -1.6),
    ("blasts", -1.6),
    ("clash", -1.3),
    ("clashes", -1.3),
    ("fight", -1.6),
    ("fights", -1.4),
    ("threat", -2.4),
    ("threatens", -2.0),
    ("veto", -1.0),
    ("vetoes", -1.0),
    ("vetoed", -1.0),
    ("cut", -1.1),
    ("cuts", -1.1),
    ("ban", -2.6),
    ("bans", -2.6),
    ("block", -1.0),
    ("blocks", -1.0),
    ("oppose", -1.3),
    ("opposes", -1.3),
    ("reject", -1.7),
    ("rejects", -1.7),
    ("rejected", -1.5),
    ("controversy", -1.7),
    ("controversial", -0.8),
    ("bad", -2.5),
    ("worst", -3.1),
    ("concern", -0.4),
    ("concerns", -0.4),
    ("warn", -0.4),
    ("warns", -0.4),
    ("chaos", -2.7),
    ("death", -2.9),
    ("dead", -3.3),
    ("kill", -3.7),
    ("violence", -3.1),
    ("shutdown", -1.5),
    ("resign", -1.2),
    ("resigns", -1.2),
    ("probe", -0.8),
    ("investigation", -0.8),
    ("wrong", -2.1),
    ("blame", -1.4),
    ("blames", -1.4),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "without", "cannot", "cant", "dont", "doesnt", "didnt", "wont",
    "isnt", "arent", "wasnt", "neither", "nor",
];

/// Damping applied to a valence that follows a negation word.
const NEGATION_SCALAR: f64 = -0.74;

/// Normalisation constant for the compound score.
const ALPHA: f64 = 15.0;

pub const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
    "for", "with", "about", "against", "between", "into", "through", "during", "before",
    "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
    "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will",
    "just", "don", "should", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren",
    "couldn", "didn", "doesn", "hadn", "hasn", "haven", "isn", "ma", "mightn", "mustn",
    "needn", "shan", "shouldn", "wasn", "weren", "won", "wouldn",
];

/// Split a title into lowercase alphanumeric tokens.
///
/// Punctuation separates tokens; a token that still contains anything but
/// letters and digits (an apostrophe or hyphen) is dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || (c.is_ascii_punctuation() && c != '\'' && c != '-'))
        .map(|token| token.trim_matches(|c: char| c == '\'' || c == '-'))
        .filter(|token| !token.is_empty() && token.chars().all(char::is_alphanumeric))
        .map(str::to_lowercase)
        .collect()
}

fn valence(token: &str) -> Option<f64> {
    LEXICON
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, v)| *v)
}

/// Compound polarity in `[-1, 1]`; zero when no lexicon word occurs.
pub fn polarity(title: &str) -> f64 {
    // Negation words contain apostrophes in the wild; normalise them away first.
    let tokens: Vec<String> = title
        .split_whitespace()
        .map(|t| t.replace(['\'', '\u{2019}'], ""))
        .flat_map(|t| tokenize(&t))
        .collect();

    let mut sum = 0.0;
    for (i, token) in tokens.iter().enumerate() {
        let Some(mut v) = valence(token) else {
            continue;
        };
        let negated = tokens[i.saturating_sub(3)..i]
            .iter()
            .any(|prev| NEGATIONS.contains(&prev.as_str()));
        if negated {
            v *= NEGATION_SCALAR;
        }
        sum += v;
    }

    if sum == 0.0 {
        0.0
    } else {
        sum / (sum * sum + ALPHA).sqrt()
    }
}

pub fn classify(title: &str) -> Sentiment {
    Sentiment::from_score(polarity(title))
}

/// Label each item in place.
pub fn annotate(items: &mut [NewsItem]) {
    for item in items {
        item.sentiment = Some(classify(&item.title));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentimentSummary {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentSummary {
    pub fn from_items(items: &[NewsItem]) -> Self {
        let mut summary = Self::default();
        for item in items {
            match item.sentiment.unwrap_or_else(|| classify(&item.title)) {
                Sentiment::Positive => summary.positive += 1,
                Sentiment::Neutral => summary.neutral += 1,
                Sentiment::Negative => summary.negative += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }

    pub fn positive_percent(&self) -> usize {
        self.bar_percent(self.positive)
    }

    pub fn neutral_percent(&self) -> usize {
        self.bar_percent(self.neutral)
    }

    pub fn negative_percent(&self) -> usize {
        self.bar_percent(self.negative)
    }

    /// Bar width for `count` as a percentage of the largest bucket.
    fn bar_percent(&self, count: usize) -> usize {
        let max = self.positive.max(self.neutral).max(self.negative);
        if max == 0 {
            0
        } else {
            count * 100 / max
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
    /// Relative weight in `(0, 1]`, 1 for the most frequent word
    pub weight: f64,
}

impl WordCount {
    /// Font size for the word cloud, between 0.8em and 2.8em.
    pub fn font_size_em(&self) -> String {
        format!("{:.2}", 0.8 + 2.0 * self.weight)
    }
}

/// Most frequent non-stop-words across all titles, most frequent first.
/// Ties are broken alphabetically.
pub fn word_frequencies<'a, I>(titles: I, max_words: usize) -> Vec<WordCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for title in titles {
        for token in tokenize(title) {
            if STOP_WORDS.contains(&token.as_str()) {
                continue;
            }
            *counts.entry(token).or_insert(0) += 1;
        }
    }

    let mut words: Vec<(String, usize)> = counts.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(max_words);

    let max = words.first().map(|(_, c)| *c).unwrap_or(1) as f64;
    words
        .into_iter()
        .map(|(word, count)| WordCount {
            word,
            count,
            weight: count as f64 / max,
        })
        .collect()
}
