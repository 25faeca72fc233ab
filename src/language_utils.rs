/*!
 * ISO 639 language code handling.
 *
 * Requests store language codes in their shortest ISO form: the 2-letter
 * ISO 639-1 code when one exists, otherwise the 3-letter ISO 639-2/T code.
 */

use anyhow::{anyhow, Result};
use isolang::Language;

/// ISO 639-2/B bibliographic codes that differ from their 639-2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("geo", "kat"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("ice", "isl"),
    ("mac", "mkd"),
    ("may", "msa"),
    ("per", "fas"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Resolve a code to an isolang `Language`
fn lookup(code: &str) -> Option<Language> {
    let code = code.trim().to_lowercase();
    match code.len() {
        // Engine identifiers use "jp" for Japanese
        2 if code == "jp" => Language::from_639_1("ja"),
        2 => Language::from_639_1(&code),
        3 => {
            let terminological = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == code)
                .map(|(_, t)| *t)
                .unwrap_or(code.as_str());
            Language::from_639_3(terminological)
        }
        _ => None,
    }
}

/// Normalize a language code to ISO 639-1 when possible, ISO 639-2/T otherwise
pub fn normalize_language_code(code: &str) -> Result<String> {
    let language = lookup(code).ok_or_else(|| anyhow!("Invalid language code: {}", code))?;
    Ok(language
        .to_639_1()
        .map(str::to_string)
        .unwrap_or_else(|| language.to_639_3().to_string()))
}

/// Check if two language codes represent the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (lookup(code1), lookup(code2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// English name of the language behind a code
pub fn get_language_name(code: &str) -> Result<String> {
    let language = lookup(code).ok_or_else(|| anyhow!("Invalid language code: {}", code))?;
    Ok(language.to_name().to_string())
}
