/*
 * author_date.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * A small author-date citation engine.
 */

//! Built-in author-date engine.
//!
//! Renders `(Smith 2001; Jones and Lee 2010, p. 4)` style citations and an
//! HTML bibliography sorted by author and year. It honours the style's
//! citation layout affixes and delimiter and takes the `and`, `et-al`,
//! `no date` and `page` terms from the locale. Anything beyond that
//! (disambiguation, name particles, note styles) is left to full CSL
//! processors plugged in through [`EngineFactory`].

use quick_xml::escape::escape;
use serde_json::Value;

use crate::engine::{Bibliography, CitationCluster, CitationEngine, EngineFactory, EngineSources};
use crate::error::{Error, Result};
use crate::style::{CitationLayout, LocaleTerms, StyleInfo};

const FALLBACK_LOCALE: &str = "en-US";

/// Engine factory for [`AuthorDateEngine`].
#[derive(Debug, Clone, Default)]
pub struct AuthorDateFactory {
    style: StyleInfo,
}

impl AuthorDateFactory {
    pub fn new(style: StyleInfo) -> Self {
        Self { style }
    }

    /// Build a factory from CSL text.
    ///
    /// Only `in-text` styles can be rendered; note styles fail with
    /// [`Error::Engine`].
    pub fn from_csl(csl: &str) -> Result<Self> {
        let style = StyleInfo::parse(csl)?;
        match style.class.as_deref() {
            None | Some("in-text") => Ok(Self::new(style)),
            Some(class) => Err(Error::Engine(format!(
                "{} uses class=\"{}\"; the built-in engine only renders in-text styles",
                style.title.as_deref().unwrap_or("style"),
                class
            ))),
        }
    }
}

impl EngineFactory for AuthorDateFactory {
    fn create(&self, sources: EngineSources) -> Result<Box<dyn CitationEngine>> {
        let lang = self
            .style
            .default_locale
            .as_deref()
            .unwrap_or(FALLBACK_LOCALE);
        let terms = match sources
            .retrieve_locale(lang)
            .or_else(|| sources.retrieve_locale(FALLBACK_LOCALE))
        {
            Some(xml) => LocaleTerms::parse(xml)?,
            None => LocaleTerms::default(),
        };
        Ok(Box::new(AuthorDateEngine {
            layout: self.style.layout.clone(),
            terms,
            sources,
            clusters: 0,
            cited: Vec::new(),
        }))
    }
}

/// The engine state for one formatting pass.
pub struct AuthorDateEngine {
    layout: CitationLayout,
    terms: LocaleTerms,
    sources: EngineSources,
    clusters: usize,
    /// Cited ids in order of first citation.
    cited: Vec<String>,
}

impl AuthorDateEngine {
    fn term<'a>(&'a self, name: &str, form: &str, fallback: &'a str) -> &'a str {
        self.terms.get(name, form).unwrap_or(fallback)
    }

    fn record(&self, id: &str) -> Result<&Value> {
        self.sources
            .retrieve_item(id)
            .ok_or_else(|| Error::Engine(format!("no record for item {}", id)))
    }

    fn short_names(&self, item: &Value) -> String {
        let names = names(item);
        match names.as_slice() {
            [] => title(item).unwrap_or_default(),
            [one] => one.clone(),
            [first, second] => format!("{} {} {}", first, self.term("and", "text", "and"), second),
            [first, ..] => format!("{} {}", first, self.term("et-al", "long", "et al.")),
        }
    }

    fn year(&self, item: &Value) -> String {
        issued_year(item).unwrap_or_else(|| self.term("no date", "short", "n.d.").to_string())
    }

    fn render_item(&self, id: &str, locator: Option<&str>, label: Option<&str>) -> Result<String> {
        let item = self.record(id)?;
        let mut out = format!("{} {}", self.short_names(item), self.year(item));
        if let Some(locator) = locator {
            let label = match label {
                None | Some("page") => self.term("page", "short", "p.").to_string(),
                Some(other) => other.to_string(),
            };
            out.push_str(&format!(", {} {}", label, locator));
        }
        Ok(out)
    }

    fn render_entry(&self, item: &Value) -> String {
        let authors = names(item).join(", ");
        let mut entry = String::new();
        if !authors.is_empty() {
            entry.push_str(&authors);
            entry.push_str(". ");
        }
        entry.push_str(&self.year(item));
        entry.push_str(". ");
        if let Some(title) = title(item) {
            entry.push_str(&title);
            entry.push('.');
        }
        if let Some(container) = item.get("container-title").and_then(Value::as_str) {
            entry.push(' ');
            entry.push_str(container);
            entry.push('.');
        }
        format!(
            "  <div class=\"csl-entry\">{}</div>\n",
            escape(entry.trim_end())
        )
    }
}

impl CitationEngine for AuthorDateEngine {
    fn append_citation_cluster(
        &mut self,
        cluster: &CitationCluster,
    ) -> Result<Vec<(usize, String)>> {
        let mut parts = Vec::with_capacity(cluster.citation_items.len());
        for item in &cluster.citation_items {
            parts.push(self.render_item(
                &item.id,
                item.locator.as_deref(),
                item.label.as_deref(),
            )?);
        }
        for item in &cluster.citation_items {
            if !self.cited.contains(&item.id) {
                self.cited.push(item.id.clone());
            }
        }

        let text = format!(
            "{}{}{}",
            self.layout.prefix,
            parts.join(&self.layout.delimiter),
            self.layout.suffix
        );
        let index = self.clusters;
        self.clusters += 1;
        Ok(vec![(index, text)])
    }

    fn make_bibliography(&mut self) -> Result<Bibliography> {
        let mut items = Vec::with_capacity(self.cited.len());
        for id in &self.cited {
            items.push(self.record(id)?);
        }
        items.sort_by_cached_key(|item| (sort_name(item), issued_year(item).unwrap_or_default()));

        Ok(Bibliography {
            bibstart: "<div class=\"csl-bib-body\">\n".to_string(),
            entries: items.into_iter().map(|item| self.render_entry(item)).collect(),
            bibend: "</div>".to_string(),
        })
    }
}

/// Family names (or literal names) of the item's authors, falling back to
/// its editors.
fn names(item: &Value) -> Vec<String> {
    let people = ["author", "editor"]
        .iter()
        .find_map(|role| item.get(*role).and_then(Value::as_array).filter(|a| !a.is_empty()));
    let Some(people) = people else {
        return Vec::new();
    };
    people
        .iter()
        .filter_map(|person| {
            person
                .get("family")
                .or_else(|| person.get("literal"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect()
}

fn title(item: &Value) -> Option<String> {
    item.get("title").and_then(Value::as_str).map(str::to_string)
}

fn sort_name(item: &Value) -> String {
    names(item)
        .into_iter()
        .next()
        .or_else(|| title(item))
        .unwrap_or_default()
        .to_lowercase()
}

fn issued_year(item: &Value) -> Option<String> {
    let issued = item.get("issued")?;
    if let Some(year) = issued
        .get("date-parts")
        .and_then(|parts| parts.get(0))
        .and_then(|first| first.get(0))
    {
        return match year {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };
    }
    issued
        .get("literal")
        .or_else(|| issued.get("raw"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ClusterItem;
    use crate::records::RecordMap;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn sources() -> EngineSources {
        EngineSources {
            records: Arc::new(RecordMap::from_items([
                json!({"id": "u/items/id1", "title": "On Things", "author": [{"family": "Smith", "given": "A"}], "issued": {"date-parts": [[2001]]}}),
                json!({"id": "u/items/id2", "title": "More <Things>", "container-title": "Journal", "author": [{"family": "Jones"}], "issued": {"date-parts": [["2010", 3]]}}),
                json!({"id": "u/items/id3", "title": "Undated", "author": [{"family": "Lee"}, {"family": "Park"}]}),
                json!({"id": "u/items/id4", "title": "Crowd", "author": [{"family": "Ames"}, {"family": "B"}, {"family": "C"}], "issued": {"raw": "1999"}}),
            ])),
            locales: Arc::new(HashMap::new()),
        }
    }

    fn item(id: &str) -> ClusterItem {
        ClusterItem {
            id: id.to_string(),
            locator: None,
            label: None,
        }
    }

    fn cluster(items: Vec<ClusterItem>) -> CitationCluster {
        CitationCluster {
            citation_items: items,
            note_index: 0,
        }
    }

    #[test]
    fn test_two_item_cluster() {
        let mut engine = AuthorDateFactory::default().create(sources()).unwrap();
        let out = engine
            .append_citation_cluster(&cluster(vec![item("id1"), item("id2")]))
            .unwrap();
        assert_eq!(out, vec![(0, "(Smith 2001; Jones 2010)".to_string())]);
    }

    #[test]
    fn test_names_dates_and_locators() {
        let mut engine = AuthorDateFactory::default().create(sources()).unwrap();
        engine.append_citation_cluster(&cluster(vec![item("id1")])).unwrap();
        let out = engine
            .append_citation_cluster(&cluster(vec![
                ClusterItem {
                    id: "id3".to_string(),
                    locator: Some("4".to_string()),
                    label: None,
                },
                ClusterItem {
                    id: "id4".to_string(),
                    locator: Some("2".to_string()),
                    label: Some("chapter".to_string()),
                },
            ]))
            .unwrap();
        assert_eq!(
            out,
            vec![(
                1,
                "(Lee and Park n.d., p. 4; Ames et al. 1999, chapter 2)".to_string()
            )]
        );
    }

    #[test]
    fn test_locale_and_layout_are_used() {
        let style = StyleInfo::parse(
            r#"<style class="in-text" default-locale="de-DE"><info><title>S</title></info>
               <citation><layout prefix="[" suffix="]" delimiter=" | "/></citation></style>"#,
        )
        .unwrap();
        let mut sources = sources();
        sources.locales = Arc::new(HashMap::from([(
            "de-DE".to_string(),
            r#"<locale><terms><term name="and">und</term><term name="no date" form="short">o. J.</term></terms></locale>"#
                .to_string(),
        )]));
        let mut engine = AuthorDateFactory::new(style).create(sources).unwrap();

        let out = engine
            .append_citation_cluster(&cluster(vec![item("id3"), item("id1")]))
            .unwrap();

        assert_eq!(out[0].1, "[Lee und Park o. J. | Smith 2001]");
    }

    #[test]
    fn test_bibliography_sorted_and_escaped() {
        let mut engine = AuthorDateFactory::default().create(sources()).unwrap();
        engine
            .append_citation_cluster(&cluster(vec![item("id2"), item("id1")]))
            .unwrap();

        let bib = engine.make_bibliography().unwrap();

        assert_eq!(
            bib.entries,
            vec![
                "  <div class=\"csl-entry\">Jones. 2010. More &lt;Things&gt;. Journal.</div>\n",
                "  <div class=\"csl-entry\">Smith. 2001. On Things.</div>\n",
            ]
        );
        assert!(bib.render().starts_with("<div class=\"csl-bib-body\">\n"));
    }

    #[test]
    fn test_note_styles_are_rejected() {
        let csl = r#"<style class="note"><info><title>Chicago (note)</title></info>
               <citation><layout suffix="."/></citation></style>"#;

        let err = AuthorDateFactory::from_csl(csl).unwrap_err();

        assert!(matches!(err, Error::Engine(ref message) if message.contains("class=\"note\"")));
    }

    #[test]
    fn test_in_text_style_is_accepted() {
        let csl = r#"<style class="in-text"><citation><layout prefix="[" suffix="]"/></citation></style>"#;
        let mut engine = AuthorDateFactory::from_csl(csl)
            .unwrap()
            .create(sources())
            .unwrap();

        let out = engine.append_citation_cluster(&cluster(vec![item("id1")])).unwrap();

        assert_eq!(out[0].1, "[Smith 2001]");
    }

    #[test]
    fn test_unknown_item_is_an_engine_error() {
        let mut engine = AuthorDateFactory::default().create(sources()).unwrap();
        assert!(matches!(
            engine.append_citation_cluster(&cluster(vec![item("nope")])),
            Err(Error::Engine(_))
        ));
    }
}
