// Lexicon Service
// Vocabularies, language names and gram lists, loaded once and shared read-only

use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::services::config_store::FileConfig;

/// Language names shorter than this are dropped to avoid spurious matches.
pub const MIN_LANGNAME_LEN: usize = 5;

/// Grams matched case-insensitively when no gram list file is configured.
pub const DEFAULT_GRAMS: &[&str] = &[
    "1SG", "1PL", "1SM", "2SG", "2P", "2SM", "3SG", "3REFL", "3SGP", "3SM", "3P",
];

/// Grams matched case-sensitively when no cased gram list file is configured.
pub const DEFAULT_CASED_GRAMS: &[&str] = &[
    "POSS", "ACC", "NOM", "DAT", "ERG", "AOR", "ABS", "OBL", "DUAL", "REFL", "NEG", "TOP", "FUT",
    "PROG", "PRES", "PASS",
];

const PATTERN_SIZE_LIMIT: usize = 256 << 20;

#[derive(Error, Debug)]
pub enum LexiconError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to compile {what} pattern: {source}")]
    Pattern {
        what: &'static str,
        #[source]
        source: regex::Error,
    },
}

fn read_file(path: &Path) -> Result<String, LexiconError> {
    fs::read_to_string(path).map_err(|source| LexiconError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// A reference vocabulary. Entries are stored lower-cased; lookups expect
/// already lower-cased tokens.
#[derive(Debug, Clone, Default)]
pub struct Wordlist {
    words: HashSet<String>,
}

impl Wordlist {
    /// One entry per non-blank line; only the first whitespace-separated column counts.
    pub fn parse(content: &str) -> Self {
        content
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .collect()
    }

    pub fn read(path: &Path) -> Result<Self, LexiconError> {
        Ok(Self::parse(&read_file(path)?))
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Wordlist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            words: iter.into_iter().map(|w| w.as_ref().to_lowercase()).collect(),
        }
    }
}

/// Which reference vocabulary an OOV feature reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    English,
    Gloss,
    Meta,
}

/// Immutable lookup tables shared by every feature worker.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    en_words: Option<Wordlist>,
    gloss_words: Option<Wordlist>,
    meta_words: Option<Wordlist>,
    langnames: Option<Regex>,
    grams: Option<Regex>,
    cased_grams: Option<Regex>,
}

impl Lexicon {
    /// Load every configured list. Vocabularies degrade to "absent" with a
    /// warning; a configured but unreadable language-name file is an error
    /// only when `need_langnames` is set.
    pub fn load(files: &FileConfig, need_langnames: bool) -> Result<Self, LexiconError> {
        let mut lexicon = Self::default();

        lexicon.en_words = load_optional_wordlist("English", files.en_wordlist.as_deref());
        lexicon.gloss_words = load_optional_wordlist("gloss", files.gls_wordlist.as_deref());
        lexicon.meta_words = load_optional_wordlist("meta", files.met_wordlist.as_deref());

        if need_langnames {
            match files.lang_names.as_deref() {
                Some(path) => {
                    let names = parse_language_names(&read_file(path)?);
                    info!("[LEXICON] loaded {} language names from {}", names.len(), path.display());
                    lexicon = lexicon.with_language_names(names)?;
                }
                None => warn!("[LEXICON] no language name file configured; has_langname will never fire"),
            }
        }

        let grams = load_gram_list("gram list", files.gram_list.as_deref(), DEFAULT_GRAMS);
        let cased = load_gram_list("cased gram list", files.gram_list_cased.as_deref(), DEFAULT_CASED_GRAMS);
        lexicon.with_grams(&grams, &cased)
    }

    pub fn with_wordlist(mut self, vocabulary: Vocabulary, words: Wordlist) -> Self {
        match vocabulary {
            Vocabulary::English => self.en_words = Some(words),
            Vocabulary::Gloss => self.gloss_words = Some(words),
            Vocabulary::Meta => self.meta_words = Some(words),
        }
        self
    }

    pub fn with_language_names<I, S>(mut self, names: I) -> Result<Self, LexiconError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| n.chars().count() >= MIN_LANGNAME_LEN)
            .collect();
        self.langnames = alternation("language name", &names, true)?;
        Ok(self)
    }

    pub fn with_grams<S: AsRef<str>>(mut self, uncased: &[S], cased: &[S]) -> Result<Self, LexiconError> {
        self.grams = alternation("gram", uncased, true)?;
        self.cased_grams = alternation("cased gram", cased, false)?;
        Ok(self)
    }

    pub fn wordlist(&self, vocabulary: Vocabulary) -> Option<&Wordlist> {
        match vocabulary {
            Vocabulary::English => self.en_words.as_ref(),
            Vocabulary::Gloss => self.gloss_words.as_ref(),
            Vocabulary::Meta => self.meta_words.as_ref(),
        }
    }

    /// Case-insensitive search for any known language name.
    pub fn has_langname(&self, text: &str) -> bool {
        self.langnames.as_ref().map_or(false, |re| re.is_match(text))
    }

    pub fn has_grams(&self, text: &str) -> bool {
        let hit = |re: &Option<Regex>| re.as_ref().map_or(false, |re| re.is_match(text));
        hit(&self.grams) || hit(&self.cased_grams)
    }
}

/// Language-name files carry the names from the fourth column onward,
/// comma separated.
pub fn parse_language_names(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for line in content.lines() {
        let last_col = line.split_whitespace().skip(3).collect::<Vec<_>>().join(" ");
        for name in last_col.split(',') {
            let name = name.replace('[', "").trim().to_lowercase();
            if name.chars().count() >= MIN_LANGNAME_LEN && seen.insert(name.clone()) {
                names.push(name);
            }
        }
    }
    names
}

fn alternation<S: AsRef<str>>(
    what: &'static str,
    items: &[S],
    case_insensitive: bool,
) -> Result<Option<Regex>, LexiconError> {
    let mut escaped: Vec<String> = items
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        return Ok(None);
    }
    escaped.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    escaped.dedup();

    RegexBuilder::new(&escaped.join("|"))
        .case_insensitive(case_insensitive)
        .size_limit(PATTERN_SIZE_LIMIT)
        .dfa_size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map(Some)
        .map_err(|source| LexiconError::Pattern { what, source })
}

fn load_optional_wordlist(name: &str, path: Option<&Path>) -> Option<Wordlist> {
    let path = path?;
    match Wordlist::read(path) {
        Ok(words) => {
            info!("[LEXICON] {} wordlist: {} entries", name, words.len());
            Some(words)
        }
        Err(e) => {
            warn!("[LEXICON] {} wordlist unavailable, OOV rate will be 0: {}", name, e);
            None
        }
    }
}

fn load_gram_list(name: &str, path: Option<&Path>, fallback: &[&str]) -> Vec<String> {
    let Some(path) = path else {
        return fallback.iter().map(|s| s.to_string()).collect();
    };
    let grams: Vec<String> = match read_file(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) => {
            warn!("[LEXICON] {} unreadable: {}", name, e);
            Vec::new()
        }
    };
    if grams.is_empty() {
        warn!("[LEXICON] no entries found in {}", name);
    }
    grams
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wordlist_first_column_lowercased() {
        let wl = Wordlist::parse("The 123\ncat\n\n  dog extra\n");
        assert_eq!(wl.len(), 3);
        assert!(wl.contains("the"));
        assert!(wl.contains("dog"));
        assert!(!wl.contains("123"));
    }

    #[test]
    fn test_parse_language_names_filters_short() {
        let content = "aaa X Y [Swahili,Kiswahili,Ewe\nbbb X Y Tok Pisin,Hopi\n";
        let names = parse_language_names(content);
        assert_eq!(names, vec!["swahili", "kiswahili", "tok pisin"]);
    }

    #[test]
    fn test_langname_match_case_insensitive() {
        let lex = Lexicon::default()
            .with_language_names(["Swahili", "Ewe"])
            .unwrap();
        assert!(lex.has_langname("(1) SWAHILI (Bantu)"));
        assert!(!lex.has_langname("Ewe is too short to count"));
    }

    #[test]
    fn test_langname_absent_never_fires() {
        assert!(!Lexicon::default().has_langname("Swahili"));
    }

    #[test]
    fn test_grams_cased_and_uncased() {
        let lex = Lexicon::default()
            .with_grams(DEFAULT_GRAMS, DEFAULT_CASED_GRAMS)
            .unwrap();
        assert!(lex.has_grams("dog-3sg see-PAST"));
        assert!(lex.has_grams("man-ERG"));
        assert!(!lex.has_grams("the nominal erg"));
    }

    #[test]
    fn test_load_missing_wordlist_degrades() {
        let files = FileConfig {
            en_wordlist: Some(PathBuf::from("/nonexistent/en.txt")),
            ..FileConfig::default()
        };
        let lex = Lexicon::load(&files, false).unwrap();
        assert!(lex.wordlist(Vocabulary::English).is_none());
        assert!(lex.has_grams("1SG"));
    }

    #[test]
    fn test_load_missing_langnames_is_error() {
        let files = FileConfig {
            lang_names: Some(PathBuf::from("/nonexistent/langs.txt")),
            ..FileConfig::default()
        };
        assert!(matches!(Lexicon::load(&files, true), Err(LexiconError::Io { .. })));
        assert!(Lexicon::load(&files, false).is_ok());
    }
}
