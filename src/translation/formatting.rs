/*!
 * Output cleanup for raw engine text.
 *
 * Seq2seq engines can leak special tokens and language-code prefixes into
 * their output. These are stripped before a translation is stored.
 * Japanese output additionally loses the token spacing engines put between
 * CJK characters, and ASCII punctuation gets its full-width form.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::language_utils;
use crate::registry::EngineType;

/// Special tokens emitted by T5-style decoders
static SPECIAL_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<pad>|</s>|<s>|<unk>").expect("valid special token regex"));

/// Leading NLLB language tag such as `__fra_Latn__`
static DUNDER_LANG_PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^__\w+__\s*").expect("valid language tag regex"));

/// Leading bare language code such as `fra_Latn` or `en_XX`
static BARE_LANG_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2,3}_[A-Z][A-Za-z]{1,3}\s+").expect("valid language code regex")
});

/// Echoed T5 task prefix such as `translate English to French:`
static T5_TASK_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^translate\s+\w+\s+to\s+\w+:\s*").expect("valid task prefix regex")
});

/// Collapses runs of spaces left behind by token removal
static MULTI_SPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("valid whitespace regex"));

/// Whitespace between two kana or kanji
static CJK_GAP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\x{3040}-\x{30FF}\x{4E00}-\x{9FFF}])\s+([\x{3040}-\x{30FF}\x{4E00}-\x{9FFF}])")
        .expect("valid CJK gap regex")
});

/// Whitespace before Japanese punctuation
static SPACE_BEFORE_JA_PUNCT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([。、・！？])").expect("valid punctuation regex"));

static OPEN_PAREN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*（\s*").expect("valid parenthesis regex"));

static CLOSE_PAREN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*）\s*").expect("valid parenthesis regex"));

/// Output cleaner for raw engine text
pub struct OutputCleaner;

impl OutputCleaner {
    /// Clean a raw engine answer. Every engine gets whitespace trimming;
    /// seq2seq engines additionally lose special tokens and language prefixes.
    /// Japanese targets are detokenized last.
    pub fn clean(engine: EngineType, target_language: &str, raw: &str) -> String {
        let cleaned = if engine.needs_output_cleanup() {
            Self::strip_model_artifacts(raw)
        } else {
            raw.trim().to_string()
        };

        if language_utils::language_codes_match(target_language, "ja") {
            Self::detokenize_japanese(&cleaned)
        } else {
            cleaned
        }
    }

    /// Drop token spacing from Japanese text and use full-width punctuation
    pub fn detokenize_japanese(text: &str) -> String {
        // Adjacent gaps share a character, so one pass can leave every other gap behind
        let mut joined = text.to_string();
        loop {
            let next = CJK_GAP_REGEX.replace_all(&joined, "$1$2").into_owned();
            if next == joined {
                break;
            }
            joined = next;
        }

        let punctuated = joined
            .replace(" .", "。")
            .replace(" ,", "、")
            .replace(" ・", "・")
            .replace(" ！", "！")
            .replace(" ？", "？");
        let tightened = SPACE_BEFORE_JA_PUNCT_REGEX.replace_all(&punctuated, "$1");
        let opened = OPEN_PAREN_REGEX.replace_all(&tightened, "（");
        CLOSE_PAREN_REGEX.replace_all(&opened, "）").trim().to_string()
    }

    pub fn strip_model_artifacts(raw: &str) -> String {
        let without_tokens = SPECIAL_TOKEN_REGEX.replace_all(raw, " ");
        let trimmed = without_tokens.trim();
        let without_dunder = DUNDER_LANG_PREFIX_REGEX.replace(trimmed, "");
        let without_prefix = BARE_LANG_PREFIX_REGEX.replace(&without_dunder, "");
        let without_task = T5_TASK_PREFIX_REGEX.replace(&without_prefix, "");
        MULTI_SPACE_REGEX
            .replace_all(&without_task, " ")
            .trim()
            .to_string()
    }
}
