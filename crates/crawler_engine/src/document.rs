use scraper::Html;

use crate::types::collapse_whitespace;

/// Markup and rendered text of one document in a detail tab.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct PageDocument {
    pub markup: String,
    /// Rendered plain text (`innerText` of the body).
    pub text: String,
}

/// The main document of a tab followed by its readable sub-documents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentSet {
    documents: Vec<PageDocument>,
}

impl DocumentSet {
    pub fn new(documents: Vec<PageDocument>) -> Self {
        Self { documents }
    }

    /// Builds a set from bare markup, deriving the plain text from text nodes.
    pub fn from_markup<I, S>(markups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let documents = markups
            .into_iter()
            .map(|markup| {
                let markup = markup.into();
                let text = plain_text(&markup);
                PageDocument { markup, text }
            })
            .collect();
        Self { documents }
    }

    pub fn documents(&self) -> &[PageDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Raw markup of every document, concatenated.
    pub fn combined_markup(&self) -> String {
        self.documents
            .iter()
            .map(|doc| doc.markup.as_str())
            .collect::<Vec<_>>()
            .concat()
    }

    /// Rendered text of every document, one document per block.
    pub fn combined_text(&self) -> String {
        let mut out = String::new();
        for doc in &self.documents {
            out.push_str(&doc.text);
            out.push('\n');
        }
        out
    }

    /// Parses every document once for the structural strategies.
    pub(crate) fn parse(&self) -> Vec<Html> {
        self.documents
            .iter()
            .map(|doc| Html::parse_document(&doc.markup))
            .collect()
    }
}

fn plain_text(markup: &str) -> String {
    let html = Html::parse_document(markup);
    let lines: Vec<String> = html
        .root_element()
        .text()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n")
}
