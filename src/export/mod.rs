//! JSON shard sink: one file per processed page, numbered in visit order.

use crate::error::ScrapeError;
use crate::models::{Batch, Site};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes a run's batches as `{site}_items_{NNN}.json` shards. The suffix
/// is zero-padded and starts at 000; re-running a site overwrites its
/// previous shards in place.
#[derive(Debug)]
pub struct Exporter {
    dir: PathBuf,
    site: Site,
    next_seq: usize,
    written: Vec<PathBuf>,
}

impl Exporter {
    pub fn new(dir: &Path, site: Site) -> Result<Self, ScrapeError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            site,
            next_seq: 0,
            written: Vec::new(),
        })
    }

    /// Writes one batch and returns the shard path. Empty batches still
    /// produce a shard; a page that yielded nothing is a fact worth keeping.
    pub fn write(&mut self, batch: &Batch) -> Result<PathBuf, ScrapeError> {
        let name = format!("{}_items_{:03}.json", self.site.token(), self.next_seq);
        let path = self.dir.join(name);
        let mut file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut file, &batch.records)?;
        file.flush()?;
        info!("wrote {} records to {}", batch.len(), path.display());
        self.next_seq += 1;
        self.written.push(path.clone());
        Ok(path)
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn into_written(self) -> Vec<PathBuf> {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ProductRecord};

    fn record(name: &str) -> ProductRecord {
        ProductRecord {
            source_site: Site::Alkosto,
            category: Some(Category::Nintendo),
            name: name.to_string(),
            description: "d".to_string(),
            price: 100,
            image: "i".to_string(),
            url: format!("https://www.alkosto.com/{name}"),
            identifier: Some(1),
        }
    }

    #[test]
    fn shards_are_numbered_and_zero_padded() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = Exporter::new(dir.path(), Site::Alkosto).unwrap();

        let first = exporter.write(&Batch::new(vec![record("a")])).unwrap();
        let second = exporter.write(&Batch::default()).unwrap();

        assert!(first.ends_with("alkosto_items_000.json"));
        assert!(second.ends_with("alkosto_items_001.json"));
        assert_eq!(exporter.written().len(), 2);
    }

    #[test]
    fn shards_round_trip_their_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = Exporter::new(dir.path(), Site::Exito).unwrap();
        let batch = Batch::new(vec![record("ps5"), record("switch")]);
        let path = exporter.write(&batch).unwrap();

        let body = std::fs::read_to_string(path).unwrap();
        let parsed: Vec<ProductRecord> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, batch.records);
    }

    #[test]
    fn empty_batch_writes_an_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = Exporter::new(dir.path(), Site::Olx).unwrap();
        let path = exporter.write(&Batch::default()).unwrap();

        let body = std::fs::read_to_string(path).unwrap();
        let parsed: Vec<ProductRecord> = serde_json::from_str(&body).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn rerun_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut first_run = Exporter::new(dir.path(), Site::Olx).unwrap();
        first_run
            .write(&Batch::new(vec![record("a"), record("b")]))
            .unwrap();

        let mut second_run = Exporter::new(dir.path(), Site::Olx).unwrap();
        let path = second_run.write(&Batch::new(vec![record("c")])).unwrap();

        let parsed: Vec<ProductRecord> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "c");
    }
}
