use std::sync::LazyLock;

use crawl_logging::crawl_debug;
use regex::Regex;
use scraper::Html;

use crate::document::DocumentSet;
use crate::strategies;
use crate::types::DetailFields;

/// A detail-page field resolved by the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Industry,
    Employees,
    Fax,
    Address,
}

type DocumentStrategy = fn(Field, &Html) -> Option<String>;
type SetStrategy = fn(&DocumentSet) -> Option<String>;

/// Ordered strategies for one field: per-document lookups first, then an
/// optional fallback over the whole document set.
struct Cascade {
    per_document: &'static [DocumentStrategy],
    fallback: Option<SetStrategy>,
}

const LABELLED: &[DocumentStrategy] = &[strategies::tabular, strategies::list_item];
const ADDRESS: &[DocumentStrategy] = &[
    strategies::map_attribute,
    strategies::tabular,
    strategies::list_item,
    strategies::region_text,
];

static INDUSTRY_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)업\s*종").expect("industry label"));
static EMPLOYEES_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)근로자수|사원수|직원수").expect("employees label"));
static FAX_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)팩스|fax").expect("fax label"));
static ADDRESS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)주소|소재지|위치").expect("address label"));

impl Field {
    pub const ALL: [Field; 4] = [Field::Industry, Field::Employees, Field::Fax, Field::Address];

    /// Pattern matched against label cells and list-item labels.
    pub fn label(self) -> &'static Regex {
        match self {
            Field::Industry => &*INDUSTRY_LABEL,
            Field::Employees => &*EMPLOYEES_LABEL,
            Field::Fax => &*FAX_LABEL,
            Field::Address => &*ADDRESS_LABEL,
        }
    }

    fn cascade(self) -> Cascade {
        match self {
            Field::Industry | Field::Employees => Cascade {
                per_document: LABELLED,
                fallback: None,
            },
            Field::Fax => Cascade {
                per_document: LABELLED,
                fallback: Some(strategies::fax_in_markup),
            },
            Field::Address => Cascade {
                per_document: ADDRESS,
                fallback: Some(strategies::address_in_text),
            },
        }
    }
}

/// Resolves all four detail fields from a tab's documents.
///
/// Each field is independent; a field no strategy resolves keeps the
/// "not found" placeholder.
pub fn extract_fields(docs: &DocumentSet) -> DetailFields {
    let parsed = docs.parse();
    let mut fields = DetailFields::default();

    for field in Field::ALL {
        match resolve(field, &parsed, docs) {
            Some(value) => *slot(&mut fields, field) = value,
            None => crawl_debug!("{:?}: no strategy matched in {} documents", field, docs.len()),
        }
    }
    fields
}

fn resolve(field: Field, parsed: &[Html], docs: &DocumentSet) -> Option<String> {
    let cascade = field.cascade();
    for doc in parsed {
        for strategy in cascade.per_document {
            if let Some(value) = strategy(field, doc) {
                return Some(value);
            }
        }
    }
    cascade.fallback.and_then(|fallback| fallback(docs))
}

fn slot(fields: &mut DetailFields, field: Field) -> &mut String {
    match field {
        Field::Industry => &mut fields.industry,
        Field::Employees => &mut fields.employees,
        Field::Fax => &mut fields.fax,
        Field::Address => &mut fields.address,
    }
}
