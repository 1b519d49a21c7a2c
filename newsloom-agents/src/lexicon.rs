//! Shared word lists for the deterministic scoring passes
//!
//! Deliberately small: these back heuristic scoring, not linguistics.
//! English and Russian entries live in the same tables because the
//! corpus mixes both.

/// Tokens excluded from keyphrase and topic candidates
pub const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "of", "in", "on", "at", "to", "for", "from", "by",
    "with", "about", "as", "is", "are", "was", "were", "be", "been", "has", "have", "had", "it",
    "its", "this", "that", "these", "those", "they", "their", "he", "she", "we", "you", "i",
    "will", "would", "can", "could", "should", "may", "might", "not", "no", "yes", "more", "most",
    "new", "also", "after", "before", "over", "under", "than", "then", "there", "here", "said",
    // corpus boilerplate, useless as topic anchors
    "says", "say", "news", "latest", "report", "update",
    "и", "в", "на", "с", "по", "за", "из", "от", "до", "для", "не", "что", "как",
    "это", "был", "была", "были", "будет", "он", "она", "они", "мы", "вы", "я", "его", "ее", "их",
];

/// Positive sentiment cues
pub const POSITIVE: &[&str] = &[
    "gain", "gains", "growth", "surge", "rally", "record", "strong", "beat", "beats", "rise",
    "rises", "up", "improve", "improved", "success", "successful", "win", "wins", "profit",
    "profits", "boom", "optimism", "optimistic", "breakthrough", "expand", "expands",
    "рост", "успех", "прибыль", "рекорд", "укрепление", "подъем",
];

/// Negative sentiment cues
pub const NEGATIVE: &[&str] = &[
    "loss", "losses", "drop", "drops", "fall", "falls", "decline", "declines", "crash", "crisis",
    "weak", "miss", "misses", "down", "cut", "cuts", "layoff", "layoffs", "fraud", "risk",
    "risks", "fear", "fears", "recession", "bankruptcy", "plunge", "slump", "warn", "warns",
    "падение", "убыток", "кризис", "риск", "спад", "банкротство",
];

/// Emotion cue tables, one per bucket
pub const JOY: &[&str] = &[
    "celebrate", "celebrates", "delight", "happy", "joy", "cheer", "triumph", "победа", "радость",
];
pub const SADNESS: &[&str] = &[
    "mourn", "mourns", "grief", "sad", "tragic", "tragedy", "loss", "скорбь", "трагедия",
];
pub const ANGER: &[&str] = &[
    "outrage", "angry", "anger", "protest", "protests", "backlash", "fury", "гнев", "протест",
];
pub const FEAR: &[&str] = &[
    "fear", "fears", "panic", "threat", "threats", "warning", "alarm", "страх", "угроза",
];
pub const SURPRISE: &[&str] = &[
    "surprise", "surprising", "unexpected", "shock", "shocking", "stunning", "внезапно", "шок",
];

/// True when a token is a stopword
#[must_use]
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopword_lookup() {
        assert!(is_stopword("the"));
        assert!(is_stopword("что"));
        assert!(!is_stopword("adoption"));
    }

    #[test]
    fn test_lexicons_are_lowercase() {
        for word in POSITIVE.iter().chain(NEGATIVE) {
            assert_eq!(*word, word.to_lowercase());
        }
    }
}
