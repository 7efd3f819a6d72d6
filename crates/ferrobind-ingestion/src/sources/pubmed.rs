//! PubMed E-utilities adapter.
//!
//! Endpoints used:
//!   esearch: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi (JSON id list)
//!   efetch:  https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi (article XML)

use async_trait::async_trait;
use chrono::NaiveDate;
use ferrobind_common::sandbox::SandboxClient as Client;
use ferrobind_common::{FerrobindError, RawRecord, SearchField, SearchQuery, SourceKind};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use super::{boolean_query, paginate, parse_month, quote, AdapterOptions, Page, RequestBudget, SourceAdapter};
use crate::retry::FetchError;

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL:  &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

pub struct PubMedAdapter {
    client: Client,
    api_key: Option<SecretString>,
    options: AdapterOptions,
    budget: RequestBudget,
}

impl PubMedAdapter {
    /// The API key is optional; without one NCBI allows about 3 requests/s.
    pub fn new(api_key: Option<String>, options: AdapterOptions) -> ferrobind_common::Result<Self> {
        Ok(Self {
            client: Client::new()?,
            api_key: api_key.filter(|k| !k.trim().is_empty()).map(SecretString::from),
            budget: RequestBudget::new(&options)?,
            options,
        })
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("db", "pubmed".to_string())];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.expose_secret().to_string()));
        }
        params
    }

    /// Search PubMed and return one page of PMIDs plus the total hit count.
    #[instrument(skip(self))]
    async fn esearch(&self, term: &str, query: &SearchQuery, retstart: usize) -> Result<(Vec<String>, usize), FetchError> {
        let mut params = self.base_params();
        params.push(("term", term.to_string()));
        params.push(("retmode", "json".to_string()));
        params.push(("retstart", retstart.to_string()));
        params.push(("retmax", self.options.page_size.to_string()));
        params.push(("sort", "relevance".to_string()));
        if let Some(range) = query.date_range() {
            params.push(("datetype", "pdat".to_string()));
            params.push(("mindate", range.from.format("%Y/%m/%d").to_string()));
            params.push(("maxdate", range.to.format("%Y/%m/%d").to_string()));
        }

        let params = &params;
        let resp: serde_json::Value = self.budget.call(move || async move {
            let resp = self.client.get(ESEARCH_URL)?.query(params).send().await?;
            if !resp.status().is_success() {
                return Err(FetchError::from_status(resp.status(), "esearch"));
            }
            resp.json::<serde_json::Value>().await.map_err(FetchError::parse)
        }).await?;

        let result = &resp["esearchresult"];
        if let Some(err) = result["ERROR"].as_str() {
            return Err(FetchError::Permanent(format!("esearch: {err}")));
        }
        let ids: Vec<String> = result["idlist"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let count = result["count"]
            .as_str()
            .and_then(|c| c.parse().ok())
            .unwrap_or(ids.len());

        debug!(?ids, count, "PubMed esearch returned PMIDs");
        Ok((ids, count))
    }

    /// Fetch PubMed XML for a list of PMIDs and parse into raw records.
    #[instrument(skip(self))]
    async fn efetch(&self, pmids: &[String]) -> Result<Vec<RawRecord>, FetchError> {
        if pmids.is_empty() {
            return Ok(vec![]);
        }
        let mut params = self.base_params();
        params.push(("id", pmids.join(",")));
        params.push(("rettype", "abstract".to_string()));
        params.push(("retmode", "xml".to_string()));

        let params = &params;
        let xml = self.budget.call(move || async move {
            let resp = self.client.get(EFETCH_URL)?.query(params).send().await?;
            if !resp.status().is_success() {
                return Err(FetchError::from_status(resp.status(), "efetch"));
            }
            Ok(resp.text().await?)
        }).await?;

        parse_pubmed_xml(&xml).map_err(FetchError::parse)
    }

    async fn fetch_page(&self, term: &str, query: &SearchQuery, page: usize) -> Result<Page, FetchError> {
        let retstart = page * self.options.page_size;
        let (ids, count) = self.esearch(term, query, retstart).await?;
        let has_more = !ids.is_empty() && retstart + ids.len() < count;
        let records = self.efetch(&ids).await?;
        Ok(Page { records, has_more })
    }
}

/// Render the E-utilities `term` parameter: `(a[tiab] OR b[tiab]) AND c[tiab]`.
pub fn build_term(query: &SearchQuery) -> String {
    let tags: Vec<&str> = if query.fields().is_empty() {
        vec!["tiab"]
    } else {
        query
            .fields()
            .iter()
            .map(|f| match f {
                SearchField::Title    => "ti",
                SearchField::Abstract => "tiab",
                SearchField::Author   => "au",
            })
            .collect()
    };
    boolean_query(query, |term| {
        let quoted = quote(term);
        let parts: Vec<String> = tags.iter().map(|tag| format!("{quoted}[{tag}]")).collect();
        if parts.len() == 1 {
            parts.concat()
        } else {
            format!("({})", parts.join(" OR "))
        }
    })
}

#[async_trait]
impl SourceAdapter for PubMedAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::PubMed
    }

    #[instrument(skip(self, query), fields(question = query.question()))]
    async fn search(&self, query: &SearchQuery, page_limit: usize) -> ferrobind_common::Result<Vec<RawRecord>> {
        let term = build_term(query);
        let term = term.as_str();
        paginate(SourceKind::PubMed, page_limit, self.options.max_results, move |page| {
            self.fetch_page(term, query, page)
        })
        .await
    }
}

// ── XML parsing ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct ArticleBuilder {
    pmid: String,
    title: String,
    abstract_sections: Vec<String>,
    section: String,
    authors: Vec<String>,
    last_name: String,
    fore_name: String,
    collective: String,
    journal: String,
    year: String,
    month: String,
    day: String,
    medline_date: String,
    doi: Option<String>,
    keywords: Vec<String>,
    keyword: String,
}

impl ArticleBuilder {
    fn pub_date(&self) -> Option<NaiveDate> {
        let (year, month) = if !self.year.trim().is_empty() {
            (self.year.trim().to_string(), self.month.clone())
        } else {
            // MedlineDate looks like "2019 Nov-Dec"
            let mut parts = self.medline_date.split_whitespace();
            let year = parts.next().unwrap_or("").chars().take(4).collect();
            (year, parts.next().unwrap_or("").to_string())
        };
        let year: i32 = year.parse().ok()?;
        let month = parse_month(&month).unwrap_or(1);
        let day = self.day.trim().parse().unwrap_or(1);
        NaiveDate::from_ymd_opt(year, month, day).or_else(|| NaiveDate::from_ymd_opt(year, month, 1))
    }

    fn finish(self) -> Option<RawRecord> {
        let title = collapse(&self.title);
        if title.is_empty() || self.pmid.trim().is_empty() {
            return None;
        }
        let pub_date = self.pub_date();
        let pmid = self.pmid.trim().to_string();
        let abstract_text = self
            .abstract_sections
            .iter()
            .map(|s| collapse(s))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let mut record = RawRecord::new(SourceKind::PubMed, pmid.clone(), title);
        record.abstract_text = (!abstract_text.is_empty()).then_some(abstract_text);
        record.authors = self.authors;
        record.pub_date = pub_date;
        record.doi = self.doi;
        record.url = Some(format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/"));
        record.journal = Some(collapse(&self.journal)).filter(|j| !j.is_empty());
        record.keywords = self.keywords;
        Some(record)
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn ends_with(stack: &[String], suffix: &[&str]) -> bool {
    stack.len() >= suffix.len()
        && stack[stack.len() - suffix.len()..].iter().zip(suffix).all(|(a, b)| a == b)
}

fn within(stack: &[String], name: &str) -> bool {
    stack.iter().any(|n| n == name)
}

/// Parse PubMed XML (efetch abstract mode) into raw records.
/// Handles the <PubmedArticleSet><PubmedArticle> structure; inline markup
/// inside titles and abstracts is flattened to text.
pub fn parse_pubmed_xml(xml: &str) -> Result<Vec<RawRecord>, FerrobindError> {
    let mut records = Vec::new();
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<ArticleBuilder> = None;
    let mut doi_target = false;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| FerrobindError::Xml(format!("at byte {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "PubmedArticle" => current = Some(ArticleBuilder::default()),
                    "AbstractText" => {
                        if let Some(a) = current.as_mut() {
                            a.section.clear();
                        }
                    }
                    "Author" => {
                        if let Some(a) = current.as_mut() {
                            a.last_name.clear();
                            a.fore_name.clear();
                            a.collective.clear();
                        }
                    }
                    "Keyword" => {
                        if let Some(a) = current.as_mut() {
                            a.keyword.clear();
                        }
                    }
                    "ArticleId" => {
                        doi_target = ends_with(&stack, &["PubmedData", "ArticleIdList"])
                            && attr(e, "IdType").as_deref() == Some("doi");
                    }
                    "ELocationID" => {
                        doi_target = attr(e, "EIdType").as_deref() == Some("doi");
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Event::Text(ref e) => {
                if let Some(a) = current.as_mut() {
                    let text = e.unescape().unwrap_or_default();
                    let top = stack.last().map(String::as_str).unwrap_or("");

                    if top == "PMID" && ends_with(&stack, &["MedlineCitation", "PMID"]) && a.pmid.is_empty() {
                        a.pmid = text.to_string();
                    } else if within(&stack, "ArticleTitle") {
                        a.title.push_str(&text);
                    } else if within(&stack, "AbstractText") {
                        a.section.push_str(&text);
                    } else if within(&stack, "Author") {
                        match top {
                            "LastName"       => a.last_name.push_str(&text),
                            "ForeName"       => a.fore_name.push_str(&text),
                            "CollectiveName" => a.collective.push_str(&text),
                            _ => {}
                        }
                    } else if ends_with(&stack, &["Journal", "Title"]) {
                        a.journal.push_str(&text);
                    } else if within(&stack, "PubDate") && within(&stack, "JournalIssue") {
                        match top {
                            "Year"        => a.year.push_str(&text),
                            "Month"       => a.month.push_str(&text),
                            "Day"         => a.day.push_str(&text),
                            "MedlineDate" => a.medline_date.push_str(&text),
                            _ => {}
                        }
                    } else if within(&stack, "Keyword") {
                        a.keyword.push_str(&text);
                    } else if doi_target && (top == "ArticleId" || top == "ELocationID") && a.doi.is_none() {
                        let doi = text.trim();
                        if !doi.is_empty() {
                            a.doi = Some(doi.to_string());
                        }
                    }
                }
            }
            Event::End(ref e) => {
                let name = e.name();
                let name = name.as_ref();
                if let Some(a) = current.as_mut() {
                    match name {
                        b"AbstractText" => {
                            let section = std::mem::take(&mut a.section);
                            a.abstract_sections.push(section);
                        }
                        b"Author" => {
                            let full = if !a.collective.trim().is_empty() {
                                collapse(&a.collective)
                            } else if a.fore_name.trim().is_empty() {
                                collapse(&a.last_name)
                            } else {
                                format!("{} {}", collapse(&a.fore_name), collapse(&a.last_name))
                            };
                            if !full.is_empty() {
                                a.authors.push(full);
                            }
                        }
                        b"Keyword" => {
                            let kw = collapse(&a.keyword);
                            if !kw.is_empty() {
                                a.keywords.push(kw);
                            }
                        }
                        b"ArticleId" | b"ELocationID" => doi_target = false,
                        _ => {}
                    }
                }
                if name == b"PubmedArticle" {
                    if let Some(builder) = current.take() {
                        match builder.finish() {
                            Some(r) => records.push(r),
                            None => warn!("Skipping PubMed article with empty title or PMID"),
                        }
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">38000001</PMID>
      <Article>
        <Journal>
          <JournalIssue>
            <PubDate><Year>2023</Year><Month>Sep</Month><Day>12</Day></PubDate>
          </JournalIssue>
          <Title>Protein Science</Title>
        </Journal>
        <ArticleTitle>De novo peptide binders against <i>PD-L1</i></ArticleTitle>
        <ELocationID EIdType="doi">10.1002/pro.1234</ELocationID>
        <Abstract>
          <AbstractText Label="BACKGROUND">Peptide binders are useful.</AbstractText>
          <AbstractText Label="RESULTS">Binders were expressed in <i>E. coli</i> BL21(DE3) &amp; purified.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author><LastName>Smith</LastName><ForeName>Jane</ForeName></Author>
          <Author><CollectiveName>Binder Design Consortium</CollectiveName></Author>
        </AuthorList>
      </Article>
      <KeywordList><Keyword>peptide design</Keyword></KeywordList>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">38000001</ArticleId>
        <ArticleId IdType="doi">10.1002/pro.1234</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_pubmed_article() {
        let records = parse_pubmed_xml(SAMPLE).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.native_id, "38000001");
        assert_eq!(r.title, "De novo peptide binders against PD-L1");
        assert_eq!(
            r.abstract_text.as_deref(),
            Some("Peptide binders are useful. Binders were expressed in E. coli BL21(DE3) & purified.")
        );
        assert_eq!(r.authors, vec!["Jane Smith", "Binder Design Consortium"]);
        assert_eq!(r.doi.as_deref(), Some("10.1002/pro.1234"));
        assert_eq!(r.journal.as_deref(), Some("Protein Science"));
        assert_eq!(r.pub_date, NaiveDate::from_ymd_opt(2023, 9, 12));
        assert_eq!(r.keywords, vec!["peptide design"]);
    }

    #[test]
    fn test_article_without_title_is_skipped() {
        let xml = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation><PMID>1</PMID>
            <Article><ArticleTitle></ArticleTitle></Article></MedlineCitation></PubmedArticle></PubmedArticleSet>"#;
        assert!(parse_pubmed_xml(xml).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml_is_error() {
        let xml = "<PubmedArticleSet><PubmedArticle></Wrong></PubmedArticleSet>";
        assert!(matches!(parse_pubmed_xml(xml), Err(FerrobindError::Xml(_))));
    }

    #[test]
    fn test_build_term_uses_field_tags() {
        let mut synonyms = BTreeMap::new();
        synonyms.insert("binder".to_string(), vec!["affinity protein".to_string()]);
        let q = SearchQuery::new("q", vec!["binder".into(), "yeast".into()], synonyms);
        assert_eq!(build_term(&q), "(binder[tiab] OR \"affinity protein\"[tiab]) AND yeast[tiab]");

        let q = q.with_fields([SearchField::Title]);
        assert_eq!(build_term(&q), "(binder[ti] OR \"affinity protein\"[ti]) AND yeast[ti]");
    }
}
