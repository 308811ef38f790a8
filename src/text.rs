use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{L}\p{M}\p{N}_'-]+").unwrap());

static STOPWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ENGLISH_STOPWORDS.iter().copied().collect());

/// Normalize free text for compact tabular output
///
/// Lowercases, splits into words, drops English stopwords and joins the rest
/// with single spaces. Normalizing already-normalized text is a no-op.
pub fn process_text(s: &str) -> String {
    let lowered = s.to_lowercase();

    WORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| !STOPWORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "almost", "alone", "along",
    "already", "also", "although", "always", "am", "among", "an", "and", "another", "any",
    "anybody", "anyone", "anything", "anywhere", "are", "aren't", "around", "as", "at", "be",
    "became", "because", "become", "becomes", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "cannot", "can't", "could", "couldn't", "did", "didn't", "do",
    "does", "doesn't", "doing", "don't", "down", "during", "each", "either", "else", "enough",
    "etc", "even", "ever", "every", "few", "for", "from", "further", "had", "hadn't", "has",
    "hasn't", "have", "haven't", "having", "he", "he'd", "he'll", "her", "here", "here's",
    "hers", "herself", "he's", "him", "himself", "his", "how", "how's", "however", "i", "i'd",
    "if", "i'll", "i'm", "in", "into", "is", "isn't", "it", "its", "it's", "itself", "i've",
    "just", "least", "less", "let's", "many", "may", "me", "might", "more", "most", "much",
    "must", "mustn't", "my", "myself", "neither", "no", "nor", "not", "now", "of", "off",
    "often", "on", "once", "only", "or", "other", "others", "otherwise", "ought", "our", "ours",
    "ourselves", "out", "over", "own", "perhaps", "rather", "same", "shall", "shan't", "she",
    "she'd", "she'll", "she's", "should", "shouldn't", "since", "so", "some", "somebody",
    "someone", "something", "sometimes", "somewhere", "still", "such", "than", "that",
    "that's", "the", "their", "theirs", "them", "themselves", "then", "there", "therefore",
    "there's", "these", "they", "they'd", "they'll", "they're", "they've", "this", "those",
    "though", "through", "thus", "to", "too", "toward", "under", "until", "up", "upon", "us",
    "very", "via", "was", "wasn't", "we", "we'd", "we'll", "were", "we're", "weren't", "we've",
    "what", "whatever", "what's", "when", "whenever", "when's", "where", "whereas", "wherever",
    "where's", "whether", "which", "while", "who", "whoever", "whom", "who's", "whose", "why",
    "why's", "will", "with", "within", "without", "won't", "would", "wouldn't", "yet", "you",
    "you'd", "you'll", "your", "you're", "yours", "yourself", "yourselves", "you've",
];
