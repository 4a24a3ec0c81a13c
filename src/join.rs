//! Join the topic-term and document-topic tables produced by a topic job.

use std::{fs::File, io::Read, path::Path};

use indexmap::IndexMap;
use polars::prelude::{CsvWriter, DataFrame, NamedFrom, SerWriter, Series};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Row of `topic-terms.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTermRow {
    pub topic: i64,
    pub term: String,
    pub weight: f64,
}

/// Row of `doc-topics.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocTopicRow {
    pub docname: String,
    pub topic: i64,
    pub proportion: f64,
}

/// A topic and its terms joined by `", "` in descending weight order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicTerms {
    pub topic: i64,
    pub terms: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRow {
    pub docname: String,
    pub topic: i64,
    pub proportion: f64,
    pub terms: Option<String>,
}

fn read_rows<T, R>(reader: R) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let rows = reader.deserialize::<T>().collect::<Result<Vec<T>, _>>()?;
    Ok(rows)
}

pub fn read_topic_terms<R: Read>(reader: R) -> Result<Vec<TopicTermRow>> {
    read_rows(reader)
}

pub fn read_doc_topics<R: Read>(reader: R) -> Result<Vec<DocTopicRow>> {
    read_rows(reader)
}

/// Sort by (topic, weight desc) and collapse each topic into one term string.
pub fn aggregate_terms(rows: &[TopicTermRow]) -> Vec<TopicTerms> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        a.topic
            .cmp(&b.topic)
            .then_with(|| b.weight.total_cmp(&a.weight))
    });

    let mut grouped: IndexMap<i64, Vec<String>> = IndexMap::new();
    for row in sorted {
        grouped.entry(row.topic).or_default().push(row.term);
    }
    grouped
        .into_iter()
        .map(|(topic, terms)| TopicTerms {
            topic,
            terms: terms.join(", "),
        })
        .collect()
}

/// Sort by (docname, proportion desc).
pub fn sort_doc_topics(rows: &mut [DocTopicRow]) {
    rows.sort_by(|a, b| {
        a.docname
            .cmp(&b.docname)
            .then_with(|| b.proportion.total_cmp(&a.proportion))
    });
}

/// Left join: every document row survives, unmatched topics carry `None`.
pub fn left_join(docs: &[DocTopicRow], topics: &[TopicTerms]) -> Vec<JoinedRow> {
    let lookup: IndexMap<i64, &str> = topics
        .iter()
        .map(|t| (t.topic, t.terms.as_str()))
        .collect();
    docs.iter()
        .map(|doc| JoinedRow {
            docname: doc.docname.clone(),
            topic: doc.topic,
            proportion: doc.proportion,
            terms: lookup.get(&doc.topic).map(|terms| terms.to_string()),
        })
        .collect()
}

/// The joined, display-ready result of a topic modeling run.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedTable {
    pub rows: Vec<JoinedRow>,
}

impl JoinedTable {
    pub fn build(terms: &[TopicTermRow], mut docs: Vec<DocTopicRow>) -> Self {
        let topics = aggregate_terms(terms);
        sort_doc_topics(&mut docs);
        Self {
            rows: left_join(&docs, &topics),
        }
    }

    pub fn from_files(topic_terms: &Path, doc_topics: &Path) -> Result<Self> {
        let terms = read_topic_terms(File::open(topic_terms)?)?;
        let docs = read_doc_topics(File::open(doc_topics)?)?;
        info!(terms = terms.len(), docs = docs.len(), "loaded topic tables");
        Ok(Self::build(&terms, docs))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Series::new(
                "docname".into(),
                self.rows
                    .iter()
                    .map(|r| r.docname.clone())
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "topic".into(),
                self.rows.iter().map(|r| r.topic).collect::<Vec<_>>(),
            ),
            Series::new(
                "proportion".into(),
                self.rows.iter().map(|r| r.proportion).collect::<Vec<_>>(),
            ),
            Series::new(
                "terms".into(),
                self.rows
                    .iter()
                    .map(|r| r.terms.clone())
                    .collect::<Vec<Option<String>>>(),
            ),
        ])?)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut df = self.to_frame()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        info!(path = %path.display(), rows = df.height(), "wrote joined topics");
        Ok(())
    }
}
