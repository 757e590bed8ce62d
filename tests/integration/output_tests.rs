//! Batch persistence through the public writer API

use tempfile::TempDir;
use template_scraper::output::{create_writer, read_array, Batch, OutputPaths};
use template_scraper::{FieldValue, OutputMode, Record};

fn record(url: &str, body: &str) -> Record {
    Record::Extracted {
        url: url.to_string(),
        fields: vec![("body".to_string(), FieldValue::Single(body.to_string()))],
    }
}

#[test]
fn test_json_survives_corruption_between_flushes() {
    let dir = TempDir::new().unwrap();
    let paths = OutputPaths::new(dir.path(), "run");
    let mut writer = create_writer(OutputMode::TextOnly, &paths, vec![]);
    writer.reset().unwrap();

    writer
        .flush(&Batch::Records(vec![record("https://a.com/1", "one")]))
        .unwrap();
    std::fs::write(paths.json(), "{ not json").unwrap();
    writer
        .flush(&Batch::Records(vec![record("https://a.com/2", "two")]))
        .unwrap();

    let items = read_array(&paths.json()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["body"], "two");
}

#[test]
fn test_url_list_appends_batches_on_new_lines() {
    let dir = TempDir::new().unwrap();
    let paths = OutputPaths::new(dir.path(), "links");
    let mut writer = create_writer(OutputMode::UrlsOnly, &paths, vec![]);
    writer.reset().unwrap();

    let batch = |links: &[&str]| Batch::Links(links.iter().map(|s| s.to_string()).collect());
    writer.flush(&batch(&["https://x.com/a", "https://x.com/a"])).unwrap();
    writer.flush(&batch(&[])).unwrap();
    writer.flush(&batch(&["https://x.com/b"])).unwrap();

    let content = std::fs::read_to_string(paths.url_list()).unwrap();
    assert_eq!(content, "https://x.com/a\nhttps://x.com/b");
}

#[test]
fn test_metadata_mode_writes_three_artifacts() {
    let dir = TempDir::new().unwrap();
    let paths = OutputPaths::new(dir.path(), "meta");
    let mut writer = create_writer(OutputMode::TextMetadata, &paths, vec!["body".to_string()]);
    writer.reset().unwrap();

    let summary = writer
        .flush(&Batch::Records(vec![
            record("https://a.com/1", "one"),
            Record::failed("https://a.com/2", "timeout"),
            record("https://a.com/3", "three"),
        ]))
        .unwrap();

    assert_eq!(summary.items_written, 3);
    assert_eq!(summary.text_files, 2);
    assert!(paths.export_json().exists());
    assert!(paths.metadata_table().exists());

    let export = paths.export_dir();
    assert_eq!(std::fs::read_to_string(export.join("1.txt")).unwrap(), "one");
    assert_eq!(std::fs::read_to_string(export.join("3.txt")).unwrap(), "three");

    let table = std::fs::read_to_string(paths.metadata_table()).unwrap();
    assert!(table.starts_with("file_name,url,body,error\n"));
    assert!(table.contains("ERROR,https://a.com/2,,timeout"));
}
