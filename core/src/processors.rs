//! Ready-made word and field processors.
//!
//! Word processors have the shape `Fn(&str) -> Option<String>` and may veto a
//! word by returning `None`; field processors rewrite a whole field before it
//! is tokenized. Register them on an [`EngineBuilder`](crate::EngineBuilder).

use lazy_static::lazy_static;
use regex::{Captures, Regex};
pub use rust_stemmers::Algorithm;
use rust_stemmers::Stemmer;
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref JOINING_DASH: Regex = Regex::new(r"(\S)-").expect("valid regex");
    static ref LINK: Regex =
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#).expect("valid regex");
    static ref IMAGE: Regex = Regex::new(r#"(?is)<img\s[^>]*?alt\s*=\s*["']([^"']*)["'][^>]*>"#).expect("valid regex");
    static ref SCRIPT: Regex = Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("valid regex");
    static ref STYLE: Regex = Regex::new(r"(?is)<style\b[^>]*>.*?</style>").expect("valid regex");
    static ref TAG: Regex = Regex::new(r"(?s)<.*?>").expect("valid regex");
    static ref NUMERIC_ENTITY: Regex = Regex::new(r"(?i)&#(x[0-9a-f]{1,6}|[0-9]{1,7});").expect("valid regex");
    static ref NAMED_ENTITY: Regex = Regex::new(r"&([a-zA-Z]{2,8});").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn word_set<I, S>(words: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words.into_iter().map(|w| w.as_ref().to_string()).collect()
}

/// Veto every listed word.
pub fn stopwords<I, S>(words: I) -> impl Fn(&str) -> Option<String> + Send + Sync
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set = word_set(words);
    move |w: &str| if set.contains(w) { None } else { Some(w.to_string()) }
}

/// [`stopwords`] with a common English list.
pub fn english_stopwords() -> impl Fn(&str) -> Option<String> + Send + Sync {
    stopwords(STOPWORDS.iter())
}

/// Replace listed words with their canonical form.
pub fn wordforms(forms: HashMap<String, String>) -> impl Fn(&str) -> Option<String> + Send + Sync {
    move |w: &str| Some(forms.get(w).cloned().unwrap_or_else(|| w.to_string()))
}

/// Collapse runs of a repeated letter (`kaaalle` -> `kale`). Listed words
/// are vetoed before collapsing.
pub fn multiples<I, S>(stopwords: I) -> impl Fn(&str) -> Option<String> + Send + Sync
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set = word_set(stopwords);
    move |w: &str| {
        if set.contains(w) {
            return None;
        }
        let mut out = String::with_capacity(w.len());
        let mut prev: Option<char> = None;
        for c in w.chars() {
            let repeat = c.is_alphabetic() && prev.map_or(false, |p| p.to_lowercase().eq(c.to_lowercase()));
            if !repeat {
                out.push(c);
                prev = Some(c);
            }
        }
        Some(out)
    }
}

/// Drop the first dash that directly follows a non-space character.
pub fn dashes<I, S>(stopwords: I) -> impl Fn(&str) -> Option<String> + Send + Sync
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set = word_set(stopwords);
    move |w: &str| if set.contains(w) { None } else { Some(JOINING_DASH.replacen(w, 1, "$1").into_owned()) }
}

/// Snowball stemmer for `algorithm`. Listed words pass through unstemmed.
pub fn stemmer<I, S>(algorithm: Algorithm, exceptions: I) -> impl Fn(&str) -> Option<String> + Send + Sync
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set = word_set(exceptions);
    let stemmer = Stemmer::create(algorithm);
    move |w: &str| {
        if set.contains(w) {
            Some(w.to_string())
        } else {
            Some(stemmer.stem(w).into_owned())
        }
    }
}

/// Replace the word by its American Soundex code.
pub fn soundex() -> impl Fn(&str) -> Option<String> + Send + Sync {
    |w: &str| soundex_code(w)
}

fn soundex_digit(c: char) -> Option<char> {
    match c.to_ascii_lowercase() {
        'b' | 'f' | 'p' | 'v' => Some('1'),
        'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some('2'),
        'd' | 't' => Some('3'),
        'l' => Some('4'),
        'm' | 'n' => Some('5'),
        'r' => Some('6'),
        _ => None,
    }
}

/// First letter followed by three digits, zero padded. `h` and `w` do not
/// separate equal codes, every other uncoded character does.
pub fn soundex_code(word: &str) -> Option<String> {
    let mut chars = word.chars();
    let first = chars.next()?;
    let mut code: String = first.to_uppercase().collect();
    let mut last = soundex_digit(first);
    let mut digits = 0;
    for c in chars {
        if digits == 3 {
            break;
        }
        match soundex_digit(c) {
            Some(d) => {
                if last != Some(d) {
                    code.push(d);
                    digits += 1;
                }
                last = Some(d);
            }
            None if matches!(c.to_ascii_lowercase(), 'h' | 'w') => {}
            None => last = None,
        }
    }
    code.extend(std::iter::repeat('0').take(3 - digits));
    Some(code)
}

fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "nbsp" => " ",
        "amp" => "&",
        "gt" => ">",
        "lt" => "<",
        "quot" => "\"",
        "apos" => "'",
        "aring" => "å",
        "Aring" => "Å",
        "auml" => "ä",
        "Auml" => "Ä",
        "ouml" => "ö",
        "Ouml" => "Ö",
        "oslash" => "ø",
        "Oslash" => "Ø",
        "uuml" => "ü",
        "Uuml" => "Ü",
        "eacute" => "é",
        "Eacute" => "É",
        _ => return None,
    })
}

/// Reduce HTML to its readable text.
///
/// Links keep their text and target, images their alt text. Script and style
/// blocks are dropped along with every other tag. Numeric entities and a
/// small set of named ones are decoded; unknown entities become a space.
pub fn strip_html() -> impl Fn(&str) -> String + Send + Sync {
    |field: &str| {
        let s = LINK.replace_all(field, " $2 $1 ");
        let s = IMAGE.replace_all(&s, " $1 ");
        let s = SCRIPT.replace_all(&s, "");
        let s = STYLE.replace_all(&s, "");
        let s = TAG.replace_all(&s, " ");
        let s = NUMERIC_ENTITY.replace_all(&s, |caps: &Captures| {
            let digits = &caps[1];
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => digits.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32).map_or_else(|| " ".to_string(), |c| c.to_string())
        });
        let s = NAMED_ENTITY.replace_all(&s, |caps: &Captures| named_entity(&caps[1]).unwrap_or(" ").to_string());
        s.into_owned()
    }
}

/// NFKC-normalize a field.
pub fn normalize_unicode() -> impl Fn(&str) -> String + Send + Sync {
    |field: &str| field.nfkc().collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopwords_veto() {
        let p = stopwords(["artikel", "bemötande"]);
        assert_eq!(p("bemötande"), None);
        assert_eq!(p("bemötandet").as_deref(), Some("bemötandet"));
        let en = english_stopwords();
        assert_eq!(en("the"), None);
        assert_eq!(en("fox").as_deref(), Some("fox"));
    }

    #[test]
    fn wordforms_replace() {
        let p = wordforms(HashMap::from([("colour".to_string(), "color".to_string())]));
        assert_eq!(p("colour").as_deref(), Some("color"));
        assert_eq!(p("red").as_deref(), Some("red"));
    }

    #[test]
    fn multiples_collapse_letters_only() {
        let p = multiples(["kallle"]);
        assert_eq!(p("kaaallle").as_deref(), Some("kale"));
        assert_eq!(p("k000aaaallle").as_deref(), Some("k000ale"));
        assert_eq!(p("kallle"), None);
    }

    #[test]
    fn dashes_drop_first_joining_dash() {
        let p = dashes(Vec::<String>::new());
        assert_eq!(p("e-post").as_deref(), Some("epost"));
        assert_eq!(p("a-b-c").as_deref(), Some("ab-c"));
        assert_eq!(p("-x").as_deref(), Some("-x"));
    }

    #[test]
    fn stemmer_respects_exceptions() {
        let p = stemmer(Algorithm::English, ["running"]);
        assert_eq!(p("runs").as_deref(), Some("run"));
        assert_eq!(p("running").as_deref(), Some("running"));
    }

    #[test]
    fn soundex_codes() {
        assert_eq!(soundex_code("tile").as_deref(), Some("T400"));
        assert_eq!(soundex_code("tilly").as_deref(), Some("T400"));
        assert_eq!(soundex_code("textual").as_deref(), Some("T234"));
        assert_eq!(soundex_code("sexual").as_deref(), Some("S240"));
        assert_eq!(soundex_code("robert").as_deref(), Some("R163"));
        assert_eq!(soundex_code("ashcraft").as_deref(), Some("A261"));
        assert_eq!(soundex_code("pfister").as_deref(), Some("P236"));
        assert_eq!(soundex_code(""), None);
    }

    #[test]
    fn html_is_reduced_to_text() {
        let strip = strip_html();
        let html = "<!-- htmlcomment --><p><script>scriptcontent</script><h1>atitle</h1>\
                    <style> div > #id { stylecontent; } </style><img alt=\"imgdescription\">\
                    <a href=\"http://url\">linktext</a><br><hr/><fakeunclosedtag>aword\
                    <strong>&Aring;rsringar &lt;innanf&ouml;r&gt; &bogus;</p>";
        let text = strip(html);
        for kept in ["atitle", "imgdescription", "linktext", "http://url", "aword", "Årsringar", "<innanför>"] {
            assert!(text.contains(kept), "{kept} missing from {text:?}");
        }
        for dropped in ["htmlcomment", "scriptcontent", "stylecontent", "fakeunclosedtag", "bogus"] {
            assert!(!text.contains(dropped), "{dropped} left in {text:?}");
        }
    }

    #[test]
    fn numeric_entities_decode() {
        let strip = strip_html();
        assert_eq!(strip("&#x74;&#x69;&#x74;&#x6C;&#x65;"), "title");
        assert_eq!(strip("&#229;ngest"), "ångest");
    }

    #[test]
    fn nfkc_folds_compatibility_forms() {
        let norm = normalize_unicode();
        assert_eq!(norm("ﬁne ①"), "fine 1");
    }
}
