//! Individual lookup strategies used by the field cascade.
//!
//! Document strategies share the signature `fn(Field, &Html) -> Option<String>`
//! and never fail: a layout that does not match simply yields `None`.
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::document::DocumentSet;
use crate::fields::Field;
use crate::types::collapse_whitespace;

/// Province and metropolitan-city prefixes an address starts with.
pub const REGIONS: [&str; 17] = [
    "서울", "경기", "인천", "부산", "대구", "광주", "대전", "울산", "세종", "강원", "충북", "충남",
    "전북", "전남", "경북", "경남", "제주",
];

/// Salary and hiring vocabulary; text containing any of these is not an address.
pub const BLOCKED_KEYWORDS: [&str; 12] = [
    "연봉", "급여", "월급", "일급", "시급", "채용", "모집", "근무", "우대", "경력", "만원", "찾아줘",
];

pub const MOBILE_PREFIX: &str = "010";

/// Address candidates must be strictly longer than this many characters.
const ADDRESS_MIN_CHARS: usize = 5;
/// Address candidates must be strictly shorter than this many characters.
const ADDRESS_MAX_CHARS: usize = 80;
/// `data-addr` values must be strictly longer than this many characters.
const ATTRIBUTE_MIN_CHARS: usize = 5;

static FAX_IN_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:팩스|FAX|Fax|F\s*A\s*X)(?:<[^>]*>|[\s:.\-])*(\d{2,4}[\-. ]\d{3,4}[\-. ]\d{4})")
        .expect("fax pattern")
});

static ADDRESS_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    let regions = REGIONS.join("|");
    Regex::new(&format!(
        r"(?:{regions})[가-힣\s\d,.\-]+(?:로|길|동|가|읍|면|리)\s*[\d\-]+(?:,\s*[가-힣\d\s,.\-]+)?"
    ))
    .expect("address pattern")
});

/// Label cell followed by a value cell: `<th>업종</th><td>value</td>`.
pub(crate) fn tabular(field: Field, doc: &Html) -> Option<String> {
    let th_sel = Selector::parse("th").ok()?;
    let label = doc
        .select(&th_sel)
        .find(|th| field.label().is_match(&element_text(*th)))?;
    let value = label
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "td")?;
    accept(&element_text(value))
}

/// Label inside a list item: `<li><em class="tit">업종</em>value</li>`.
pub(crate) fn list_item(field: Field, doc: &Html) -> Option<String> {
    let em_sel = Selector::parse("li em.tit").ok()?;
    let label = doc
        .select(&em_sel)
        .find(|em| field.label().is_match(&element_text(*em)))?;
    let item = label.parent().and_then(ElementRef::wrap)?;
    let label_text = element_text(label);
    accept(&element_text(item).replacen(&label_text, "", 1))
}

/// Map buttons carry the full address in a `data-addr` attribute.
pub(crate) fn map_attribute(_field: Field, doc: &Html) -> Option<String> {
    let sel = Selector::parse("[data-addr]").ok()?;
    let value = doc.select(&sel).next()?.value().attr("data-addr")?;
    let value = collapse_whitespace(value);
    if value.chars().count() > ATTRIBUTE_MIN_CHARS {
        Some(value)
    } else {
        None
    }
}

/// Free-standing address text, e.g. `<p>경기도 양주시 ...</p>`.
pub(crate) fn region_text(_field: Field, doc: &Html) -> Option<String> {
    let sel = Selector::parse("p, div, span").ok()?;
    for region in REGIONS {
        for element in doc.select(&sel) {
            let text = element_text(element);
            if !text.starts_with(region) || is_blocked(&text) {
                continue;
            }
            if address_length_ok(&text) {
                return Some(text);
            }
        }
    }
    None
}

/// Phone-shaped number after a fax label anywhere in the raw markup.
pub(crate) fn fax_in_markup(docs: &DocumentSet) -> Option<String> {
    let markup = docs.combined_markup();
    FAX_IN_MARKUP
        .captures_iter(&markup)
        .filter_map(|caps| caps.get(1))
        .map(|number| normalize_phone(number.as_str()))
        .find(|number| !number.starts_with(MOBILE_PREFIX))
}

/// Region-anchored street address anywhere in the rendered text.
pub(crate) fn address_in_text(docs: &DocumentSet) -> Option<String> {
    let text = docs.combined_text();
    ADDRESS_IN_TEXT
        .find_iter(&text)
        .map(|found| collapse_whitespace(found.as_str()))
        .find(|candidate| {
            !is_blocked(candidate) && candidate.chars().count() < ADDRESS_MAX_CHARS
        })
}

pub fn is_blocked(text: &str) -> bool {
    BLOCKED_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

fn address_length_ok(text: &str) -> bool {
    let len = text.chars().count();
    len > ADDRESS_MIN_CHARS && len < ADDRESS_MAX_CHARS
}

fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == ' ' || c == '.' { '-' } else { c })
        .collect()
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Empty cells and dash placeholders are not values.
fn accept(value: &str) -> Option<String> {
    let value = collapse_whitespace(value);
    if value.is_empty() || value == "-" {
        None
    } else {
        Some(value)
    }
}
