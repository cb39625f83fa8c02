//! Convert one XML archive into one parquet file
//!
//! The file is the unit of work: either every article is transcoded and the
//! parquet file is published, or nothing appears at the output path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use brick_core::progress::upgrade_to_bar;
use brick_core::{Accumulator, ByteCounter, InputReader, ParquetSink, open_input};
use indicatif::ProgressBar;

use crate::dtd::DtdSchema;
use crate::error::{Error, Result};
use crate::schema;
use crate::transcode::transcode;
use crate::transform::{ArticleAccumulator, ArticleRow};
use crate::xml::{ArticleReader, XmlElement};

/// Root child listing PMIDs withdrawn by an update file
const DELETE_CITATION: &str = "DeleteCitation";

/// Path of the primary key inside an article
const PMID_PATH: [&str; 2] = ["MedlineCitation", "PMID"];

/// Outcome of converting one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertStats {
    /// Rows written
    pub articles: usize,
    /// PMIDs listed in `DeleteCitation` blocks
    pub deleted_pmids: Vec<i64>,
    pub output: PathBuf,
}

/// Input file name as recorded in the `source` column
pub fn source_name(input: &Path) -> String {
    input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `pubmed25n0001.xml.gz` → `pubmed25n0001.parquet`
pub fn output_filename(input: &Path) -> String {
    let name = source_name(input);
    let base = name.strip_suffix(".gz").unwrap_or(&name);
    let base = base.strip_suffix(".xml").unwrap_or(base);
    format!("{base}.parquet")
}

/// Final output path for `input` under `output_dir`
pub fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
    output_dir.join(output_filename(input))
}

/// Convert `input` into `output_dir/<stem>.parquet`.
///
/// `cancel` is polled between articles; once set, the partial output is
/// discarded and [`Error::Cancelled`] is returned.
pub fn convert_file(
    input: &Path,
    output_dir: &Path,
    schema: &DtdSchema,
    zstd_level: i32,
    pb: &ProgressBar,
    cancel: &AtomicBool,
) -> Result<ConvertStats> {
    let source = source_name(input);
    let (reader, bytes_read, total_bytes) = open_input(input)?;
    upgrade_to_bar(pb, total_bytes);
    pb.set_message(source.clone());

    let mut sink = ParquetSink::create(
        output_dir,
        &output_filename(input),
        schema::articles(),
        zstd_level,
    )?;

    let job = FileJob {
        source: &source,
        schema,
        pb,
        bytes_read: &bytes_read,
        cancel,
    };
    let deleted_pmids = match job.write_articles(reader, &mut sink) {
        Ok(deleted) => deleted,
        Err(e) => {
            sink.abort();
            return Err(e);
        }
    };

    let output = sink.final_path().to_path_buf();
    let articles = sink.finalize()?;

    if !deleted_pmids.is_empty() {
        log::info!("{source}: {} deleted citations", deleted_pmids.len());
    }
    log::debug!("{source}: {articles} articles -> {}", output.display());

    Ok(ConvertStats {
        articles,
        deleted_pmids,
        output,
    })
}

struct FileJob<'a> {
    source: &'a str,
    schema: &'a DtdSchema,
    pb: &'a ProgressBar,
    bytes_read: &'a ByteCounter,
    cancel: &'a AtomicBool,
}

impl FileJob<'_> {
    /// Stream every article into `sink`, returning deleted PMIDs
    fn write_articles(&self, reader: InputReader, sink: &mut ParquetSink) -> Result<Vec<i64>> {
        let mut articles = ArticleReader::new(reader);
        let mut acc = ArticleAccumulator::new(self.source);
        let mut deleted = Vec::new();
        let mut index = 0usize;

        while let Some(element) = articles.next_article()? {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }

            if element.name == DELETE_CITATION {
                for pmid in element.child_elements().filter(|e| e.name == "PMID") {
                    deleted.push(parse_pmid(&pmid.text(), index)?);
                }
                continue;
            }

            let pmid = extract_pmid(&element, index)?;
            let json = transcode(&element, self.schema)?.to_json()?;
            acc.push(ArticleRow { pmid, json });
            index += 1;

            if acc.is_full() {
                self.flush(&mut acc, sink)?;
            }
        }

        self.flush(&mut acc, sink)?;
        Ok(deleted)
    }

    /// Like [`Accumulator::flush_to`], but batch assembly errors keep their
    /// Arrow kind in failure records
    fn flush(&self, acc: &mut ArticleAccumulator, sink: &mut ParquetSink) -> Result<()> {
        if !acc.is_empty() {
            let batch = acc.take_batch()?;
            sink.write_batch(&batch)?;
        }
        self.pb.set_position(self.bytes_read.load(Ordering::Relaxed));
        Ok(())
    }
}

/// Positive PMID at `MedlineCitation/PMID`
pub fn extract_pmid(article: &XmlElement, index: usize) -> Result<i64> {
    let node = article
        .find_path(&PMID_PATH)
        .ok_or_else(|| Error::Identifier {
            index,
            reason: format!("<{}> has no {}", article.name, PMID_PATH.join("/")),
        })?;
    parse_pmid(&node.text(), index)
}

fn parse_pmid(text: &str, index: usize) -> Result<i64> {
    let text = text.trim();
    let pmid: i64 = text.parse().map_err(|_| Error::Identifier {
        index,
        reason: format!("PMID '{text}' is not an integer"),
    })?;
    if pmid <= 0 {
        return Err(Error::Identifier {
            index,
            reason: format!("PMID must be positive, got {pmid}"),
        });
    }
    Ok(pmid)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use brick_core::parquet_row_count;
    use tempfile::TempDir;

    use super::*;
    use crate::xml::parse_str;

    const MINI_DTD: &str = include_str!("../tests/data/pubmed_mini.dtd");

    fn article(pmid: &str) -> String {
        format!(
            "<PubmedArticle><MedlineCitation><PMID Version=\"1\">{pmid}</PMID>\
             <Article><ArticleTitle>T{pmid}</ArticleTitle></Article></MedlineCitation></PubmedArticle>"
        )
    }

    fn convert(dir: &TempDir, name: &str, body: &str, cancel: bool) -> Result<ConvertStats> {
        let input = dir.path().join(name);
        fs::write(&input, format!("<PubmedArticleSet>{body}</PubmedArticleSet>")).unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let schema = DtdSchema::parse(MINI_DTD);
        convert_file(
            &input,
            &out,
            &schema,
            3,
            &ProgressBar::hidden(),
            &AtomicBool::new(cancel),
        )
    }

    #[test]
    fn output_filename_strips_extensions() {
        assert_eq!(output_filename(Path::new("in/pubmed25n0001.xml.gz")), "pubmed25n0001.parquet");
        assert_eq!(output_filename(Path::new("pubmed25n0002.xml")), "pubmed25n0002.parquet");
        assert_eq!(output_filename(Path::new("odd.gz")), "odd.parquet");
        assert_eq!(source_name(Path::new("a/b/pubmed25n0001.xml.gz")), "pubmed25n0001.xml.gz");
    }

    #[test]
    fn extract_pmid_variants() {
        let ok = parse_str(&article(" 123 ")).unwrap();
        assert_eq!(extract_pmid(&ok, 0).unwrap(), 123);

        let zero = parse_str(&article("0")).unwrap();
        assert_eq!(extract_pmid(&zero, 4).unwrap_err().kind(), "identifier");

        let text = parse_str(&article("abc")).unwrap();
        assert!(extract_pmid(&text, 0).unwrap_err().to_string().contains("'abc'"));

        let missing = parse_str("<PubmedArticle><MedlineCitation/></PubmedArticle>").unwrap();
        let err = extract_pmid(&missing, 9).unwrap_err();
        assert!(matches!(err, Error::Identifier { index: 9, .. }));
    }

    #[test]
    fn converts_articles_in_order() {
        let dir = TempDir::new().unwrap();
        let body = format!("{}{}{}", article("3"), article("1"), article("2"));
        let stats = convert(&dir, "f.xml", &body, false).unwrap();
        assert_eq!(stats.articles, 3);
        assert_eq!(stats.output, dir.path().join("out/f.parquet"));
        assert_eq!(parquet_row_count(&stats.output), Some(3));
    }

    #[test]
    fn empty_file_produces_empty_output() {
        let dir = TempDir::new().unwrap();
        let stats = convert(&dir, "empty.xml", "", false).unwrap();
        assert_eq!(stats.articles, 0);
        assert_eq!(parquet_row_count(&stats.output), Some(0));
    }

    #[test]
    fn delete_citations_are_not_articles() {
        let dir = TempDir::new().unwrap();
        let body = format!(
            "{}<DeleteCitation><PMID Version=\"1\">11</PMID><PMID Version=\"1\">12</PMID></DeleteCitation>",
            article("5")
        );
        let stats = convert(&dir, "update.xml", &body, false).unwrap();
        assert_eq!(stats.articles, 1);
        assert_eq!(stats.deleted_pmids, vec![11, 12]);
    }

    #[test]
    fn missing_pmid_fails_whole_file() {
        let dir = TempDir::new().unwrap();
        let body = format!(
            "{}<PubmedArticle><MedlineCitation/></PubmedArticle>",
            article("1")
        );
        let err = convert(&dir, "bad.xml", &body, false).unwrap_err();
        assert_eq!(err.kind(), "identifier");
        assert!(!dir.path().join("out/bad.parquet").exists());
        assert!(!dir.path().join("out/bad.parquet.tmp").exists());
    }

    #[test]
    fn schema_miss_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let body = "<PubmedArticle><MedlineCitation><PMID>1</PMID><MysteryTag/></MedlineCitation></PubmedArticle>";
        let err = convert(&dir, "miss.xml", body, false).unwrap_err();
        assert_eq!(err.kind(), "schema_missing");
        assert!(fs::read_dir(dir.path().join("out")).unwrap().next().is_none());
    }

    #[test]
    fn cancelled_conversion_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let err = convert(&dir, "c.xml", &article("1"), true).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(fs::read_dir(dir.path().join("out")).unwrap().next().is_none());
    }

    #[test]
    fn missing_input_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = convert_file(
            &dir.path().join("nope.xml.gz"),
            dir.path(),
            &DtdSchema::new(),
            3,
            &ProgressBar::hidden(),
            &AtomicBool::new(false),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
