/*
 * style.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The parts of CSL styles and locales read by the built-in engine.
 */

//! CSL style and locale summaries.
//!
//! Only what the built-in author-date engine and the style status report
//! need is read: the style's `info` block, its class and default locale,
//! the citation layout's affixes and delimiter, and locale terms.

use docxcite_xml::{NodeId, XmlDocument};

use crate::error::{Error, Result};

/// Affixes and delimiter of a citation layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationLayout {
    pub prefix: String,
    pub suffix: String,
    pub delimiter: String,
}

impl Default for CitationLayout {
    fn default() -> Self {
        Self {
            prefix: "(".to_string(),
            suffix: ")".to_string(),
            delimiter: "; ".to_string(),
        }
    }
}

/// Summary of a CSL style.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleInfo {
    pub title: Option<String>,
    pub title_short: Option<String>,
    pub id: Option<String>,
    /// `in-text` or `note`.
    pub class: Option<String>,
    pub default_locale: Option<String>,
    pub layout: CitationLayout,
}

impl StyleInfo {
    /// Read a style. Fails with [`Error::Engine`] when the text is not XML
    /// or its root is not a `style` element.
    pub fn parse(csl: &str) -> Result<Self> {
        let doc = docxcite_xml::parse(csl).map_err(|e| Error::Engine(format!("not valid CSL: {}", e)))?;
        let root = doc.root();
        if !doc.is_element_named(root, "style") {
            return Err(Error::Engine(
                "not valid CSL: root element is not <style>".to_string(),
            ));
        }

        let mut info = StyleInfo {
            class: doc.get_attribute(root, "class").map(str::to_string),
            default_locale: doc.get_attribute(root, "default-locale").map(str::to_string),
            ..Default::default()
        };

        for child in doc.element_children(root) {
            match doc.local_name(child) {
                Some("info") => {
                    for field in doc.element_children(child) {
                        match doc.local_name(field) {
                            Some("title") => info.title = Some(doc.text_content(field)),
                            Some("title-short") => info.title_short = Some(doc.text_content(field)),
                            Some("id") => info.id = Some(doc.text_content(field)),
                            _ => {}
                        }
                    }
                }
                Some("citation") => info.layout = parse_layout(&doc, child),
                _ => {}
            }
        }

        Ok(info)
    }

    /// Status line shown to users: `Using <title>`.
    pub fn status(&self) -> String {
        match &self.title {
            Some(title) => format!("Using {}", title),
            None => "Using untitled style".to_string(),
        }
    }
}

fn parse_layout(doc: &XmlDocument, citation: NodeId) -> CitationLayout {
    let mut layout = CitationLayout::default();
    let Some(element) = doc
        .element_children(citation)
        .into_iter()
        .find(|c| doc.is_element_named(*c, "layout"))
    else {
        return layout;
    };

    // Absent attributes mean no affix at all, not the defaults.
    layout.prefix = doc.get_attribute(element, "prefix").unwrap_or("").to_string();
    layout.suffix = doc.get_attribute(element, "suffix").unwrap_or("").to_string();
    if let Some(delimiter) = doc.get_attribute(element, "delimiter") {
        layout.delimiter = delimiter.to_string();
    }
    layout
}

/// Locale terms, keyed by name and form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleTerms {
    terms: Vec<(String, String, String)>,
}

impl LocaleTerms {
    /// Read the `terms` of a CSL locale file.
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = docxcite_xml::parse(xml).map_err(|e| Error::Engine(format!("invalid locale: {}", e)))?;
        let mut terms = Vec::new();
        for term in doc.descendants_by_local_name(doc.root(), "term") {
            let Some(name) = doc.get_attribute(term, "name") else {
                continue;
            };
            let form = doc.get_attribute(term, "form").unwrap_or("long");
            // Plural terms keep only their singular.
            let value = doc
                .element_children(term)
                .into_iter()
                .find(|c| doc.is_element_named(*c, "single"))
                .map(|single| doc.text_content(single))
                .unwrap_or_else(|| doc.text_content(term));
            terms.push((name.to_string(), form.to_string(), value));
        }
        Ok(Self { terms })
    }

    /// Look a term up, falling back from `form` to the long form.
    pub fn get(&self, name: &str, form: &str) -> Option<&str> {
        let find = |form: &str| {
            self.terms
                .iter()
                .find(|(n, f, _)| n == name && f == form)
                .map(|(_, _, v)| v.as_str())
        };
        find(form).or_else(|| find("long"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<style xmlns="http://purl.org/net/xbiblio/csl" class="in-text" version="1.0" default-locale="en-GB">
  <info>
    <title>Chicago Manual of Style 17th edition (author-date)</title>
    <id>http://www.zotero.org/styles/chicago-author-date</id>
  </info>
  <citation>
    <layout prefix="[" suffix="]" delimiter=", "><text variable="title"/></layout>
  </citation>
</style>"#;

    #[test]
    fn test_parse_style_info() {
        let info = StyleInfo::parse(STYLE).unwrap();
        assert_eq!(
            info.status(),
            "Using Chicago Manual of Style 17th edition (author-date)"
        );
        assert_eq!(info.class.as_deref(), Some("in-text"));
        assert_eq!(info.default_locale.as_deref(), Some("en-GB"));
        assert_eq!(
            info.layout,
            CitationLayout {
                prefix: "[".to_string(),
                suffix: "]".to_string(),
                delimiter: ", ".to_string(),
            }
        );
    }

    #[test]
    fn test_not_csl() {
        assert!(StyleInfo::parse("<html/>").is_err());
        assert!(StyleInfo::parse("{}").is_err());
    }

    #[test]
    fn test_locale_terms() {
        let locale = LocaleTerms::parse(
            r#"<locale xml:lang="en-US"><terms>
              <term name="no date">no date</term>
              <term name="no date" form="short">n.d.</term>
              <term name="and">and</term>
              <term name="page" form="short"><single>p.</single><multiple>pp.</multiple></term>
            </terms></locale>"#,
        )
        .unwrap();
        assert_eq!(locale.get("no date", "short"), Some("n.d."));
        assert_eq!(locale.get("and", "short"), Some("and"));
        assert_eq!(locale.get("page", "short"), Some("p."));
        assert_eq!(locale.get("et-al", "long"), None);
    }
}
