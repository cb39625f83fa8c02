//! Arrow schema definitions for brick output files

use std::sync::{Arc, LazyLock};

use arrow::datatypes::{DataType, Field, Schema};

/// Transcoded articles: one row per article, the whole record as JSON
pub static ARTICLES: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("pmid", DataType::Int64, false),
        Field::new("json", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
    ]))
});

/// Year-partitioned projection with searchable columns
pub static PROJECTED: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("pmid", DataType::Int64, false),
        Field::new("title", DataType::Utf8, true),
        Field::new("abstract_text", DataType::Utf8, true),
        Field::new("doi", DataType::Utf8, true),
        Field::new("year", DataType::Int32, true),
        // "Last, Fore" entries joined with "; "
        Field::new("authors", DataType::Utf8, true),
        Field::new("journal", DataType::Utf8, true),
        // Joined with "; "
        Field::new("mesh_terms", DataType::Utf8, true),
        Field::new("keywords", DataType::Utf8, true),
        Field::new("pub_types", DataType::Utf8, true),
        // YYYY-MM-DD as written in the record
        Field::new("date_created", DataType::Utf8, true),
        Field::new("date_revised", DataType::Utf8, true),
        Field::new("json", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
    ]))
});

pub fn articles() -> &'static Schema {
    &ARTICLES
}

pub fn projected() -> &'static Schema {
    &PROJECTED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn articles_columns_are_non_null() {
        let schema = articles();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["pmid", "json", "source"]);
        assert!(schema.fields().iter().all(|f| !f.is_nullable()));
        assert_eq!(schema.field_with_name("pmid").unwrap().data_type(), &DataType::Int64);
    }

    #[test]
    fn projected_keeps_key_and_record() {
        let schema = projected();
        assert!(!schema.field_with_name("pmid").unwrap().is_nullable());
        assert!(!schema.field_with_name("json").unwrap().is_nullable());
        assert_eq!(schema.field_with_name("year").unwrap().data_type(), &DataType::Int32);
        assert!(schema.field_with_name("mesh_terms").is_ok());
    }
}
