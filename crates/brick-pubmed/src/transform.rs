//! Row accumulators building Arrow `RecordBatch`es for the brick schemas

use std::sync::Arc;

use arrow::array::{ArrayRef, Int32Array, Int64Array, RecordBatch, StringArray};
use arrow::error::ArrowError;
use brick_core::{Accumulator, DEFAULT_BATCH_SIZE};

use crate::project::ProjectedRow;
use crate::schema;

/// One transcoded article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRow {
    pub pmid: i64,
    pub json: String,
}

/// Buffers [`ArticleRow`]s of a single input file.
///
/// Every row of the file carries the same `source`, so it is stored once.
pub struct ArticleAccumulator {
    source: String,
    pmid: Vec<i64>,
    json: Vec<String>,
}

impl ArticleAccumulator {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            pmid: Vec::with_capacity(DEFAULT_BATCH_SIZE),
            json: Vec::with_capacity(DEFAULT_BATCH_SIZE),
        }
    }
}

impl Accumulator for ArticleAccumulator {
    type Row = ArticleRow;

    fn push(&mut self, row: ArticleRow) {
        self.pmid.push(row.pmid);
        self.json.push(row.json);
    }

    fn len(&self) -> usize {
        self.pmid.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let n = self.pmid.len();
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(std::mem::take(&mut self.pmid))),
            Arc::new(StringArray::from(std::mem::take(&mut self.json))),
            Arc::new(StringArray::from(vec![self.source.as_str(); n])),
        ];
        RecordBatch::try_new(schema::ARTICLES.clone(), arrays)
    }
}

/// Buffers [`ProjectedRow`]s destined for one year partition
#[derive(Default)]
pub struct ProjectedAccumulator {
    pmid: Vec<i64>,
    title: Vec<Option<String>>,
    abstract_text: Vec<Option<String>>,
    doi: Vec<Option<String>>,
    year: Vec<Option<i32>>,
    authors: Vec<Option<String>>,
    journal: Vec<Option<String>>,
    mesh_terms: Vec<Option<String>>,
    keywords: Vec<Option<String>>,
    pub_types: Vec<Option<String>>,
    date_created: Vec<Option<String>>,
    date_revised: Vec<Option<String>>,
    json: Vec<String>,
    source: Vec<String>,
}

impl ProjectedAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Accumulator for ProjectedAccumulator {
    type Row = ProjectedRow;

    fn push(&mut self, row: ProjectedRow) {
        self.pmid.push(row.pmid);
        self.title.push(row.title);
        self.abstract_text.push(row.abstract_text);
        self.doi.push(row.doi);
        self.year.push(row.year);
        self.authors.push(row.authors);
        self.journal.push(row.journal);
        self.mesh_terms.push(row.mesh_terms);
        self.keywords.push(row.keywords);
        self.pub_types.push(row.pub_types);
        self.date_created.push(row.date_created);
        self.date_revised.push(row.date_revised);
        self.json.push(row.json);
        self.source.push(row.source);
    }

    fn len(&self) -> usize {
        self.pmid.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(std::mem::take(&mut self.pmid))),
            Arc::new(StringArray::from(std::mem::take(&mut self.title))),
            Arc::new(StringArray::from(std::mem::take(&mut self.abstract_text))),
            Arc::new(StringArray::from(std::mem::take(&mut self.doi))),
            Arc::new(Int32Array::from(std::mem::take(&mut self.year))),
            Arc::new(StringArray::from(std::mem::take(&mut self.authors))),
            Arc::new(StringArray::from(std::mem::take(&mut self.journal))),
            Arc::new(StringArray::from(std::mem::take(&mut self.mesh_terms))),
            Arc::new(StringArray::from(std::mem::take(&mut self.keywords))),
            Arc::new(StringArray::from(std::mem::take(&mut self.pub_types))),
            Arc::new(StringArray::from(std::mem::take(&mut self.date_created))),
            Arc::new(StringArray::from(std::mem::take(&mut self.date_revised))),
            Arc::new(StringArray::from(std::mem::take(&mut self.json))),
            Arc::new(StringArray::from(std::mem::take(&mut self.source))),
        ];
        RecordBatch::try_new(schema::PROJECTED.clone(), arrays)
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::Array;

    use super::*;

    #[test]
    fn article_accumulator_repeats_source() {
        let mut acc = ArticleAccumulator::new("pubmed25n0001.xml.gz");
        acc.push(ArticleRow {
            pmid: 1,
            json: "{}".into(),
        });
        acc.push(ArticleRow {
            pmid: 2,
            json: r#"{"a":"b"}"#.into(),
        });
        assert_eq!(acc.len(), 2);

        let batch = acc.take_batch().unwrap();
        assert!(acc.is_empty());
        assert_eq!(batch.num_rows(), 2);

        let source = batch
            .column(2)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(source.value(0), "pubmed25n0001.xml.gz");
        assert_eq!(source.value(1), "pubmed25n0001.xml.gz");

        let pmid = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(pmid.values(), &[1, 2]);
    }

    #[test]
    fn empty_take_is_valid_batch() {
        let mut acc = ArticleAccumulator::new("x.xml");
        let batch = acc.take_batch().unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 3);
    }

    #[test]
    fn projected_accumulator_keeps_nulls() {
        let mut acc = ProjectedAccumulator::new();
        acc.push(ProjectedRow {
            pmid: 7,
            title: Some("T".into()),
            year: None,
            json: "{}".into(),
            source: "a.parquet".into(),
            ..Default::default()
        });
        let batch = acc.take_batch().unwrap();
        assert_eq!(batch.num_rows(), 1);

        let year = batch.column(4).as_any().downcast_ref::<Int32Array>().unwrap();
        assert!(year.is_null(0));
        let doi = batch.column(3).as_any().downcast_ref::<StringArray>().unwrap();
        assert!(doi.is_null(0));
        let title = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(title.value(0), "T");
    }
}
