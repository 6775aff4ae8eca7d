//! Reading recording files from a levelX-style data directory.
//!
//! Each recording `NN` contributes `NN_tracks.csv` (one row per object per
//! frame) and `NN_tracksMeta.csv` (one row per object). Track files can be
//! large, so they are streamed in fixed-size chunks.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::analyzers::classify::{class_index, classify_samples};
use crate::analyzers::types::{LocatedSample, TrackMeta, TrackSample};
use crate::error::{AnalysisError, Result};

/// Rows per chunk when streaming a tracks file.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

const ID_COLUMNS: &[&str] = &["id", "trackId"];
const TRACK_COLUMNS: &[&[&str]] = &[ID_COLUMNS, &["x"], &["y"]];
const META_COLUMNS: &[&[&str]] = &[
    ID_COLUMNS,
    &["class"],
    &["meanXVelocity"],
    &["numLaneChanges"],
];

pub fn tracks_path(data_dir: &Path, file_id: u32) -> PathBuf {
    data_dir.join(format!("{file_id:02}_tracks.csv"))
}

pub fn meta_path(data_dir: &Path, file_id: u32) -> PathBuf {
    data_dir.join(format!("{file_id:02}_tracksMeta.csv"))
}

fn open_csv(path: &Path, required: &[&[&str]]) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| AnalysisError::io(path, e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AnalysisError::csv(path, e))?
        .clone();
    require_columns(path, &headers, required)?;

    Ok(reader)
}

/// Checks that every entry of `required` is satisfied by at least one of its
/// accepted names.
fn require_columns(path: &Path, headers: &StringRecord, required: &[&[&str]]) -> Result<()> {
    for names in required {
        if !names.iter().any(|name| headers.iter().any(|h| h == *name)) {
            return Err(AnalysisError::MissingColumn {
                path: path.to_path_buf(),
                column: names[0].to_string(),
            });
        }
    }
    Ok(())
}

/// Reads a whole `NN_tracksMeta.csv` file.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn read_meta(path: &Path) -> Result<Vec<TrackMeta>> {
    let reader = open_csv(path, META_COLUMNS)?;

    let rows = reader
        .into_deserialize()
        .collect::<std::result::Result<Vec<TrackMeta>, _>>()
        .map_err(|e| AnalysisError::csv(path, e))?;

    debug!(objects = rows.len(), "Metadata loaded");
    Ok(rows)
}

/// Streams a `NN_tracks.csv` file as chunks of at most `chunk_size` samples.
pub struct TrackChunks {
    path: PathBuf,
    records: csv::DeserializeRecordsIntoIter<File, TrackSample>,
    chunk_size: usize,
}

impl TrackChunks {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let reader = open_csv(path, TRACK_COLUMNS)?;
        Ok(Self {
            path: path.to_path_buf(),
            records: reader.into_deserialize(),
            chunk_size: chunk_size.max(1),
        })
    }
}

impl Iterator for TrackChunks {
    type Item = Result<Vec<TrackSample>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = Vec::with_capacity(self.chunk_size);
        for record in self.records.by_ref().take(self.chunk_size) {
            match record {
                Ok(sample) => chunk.push(sample),
                Err(e) => return Some(Err(AnalysisError::csv(&self.path, e))),
            }
        }

        if chunk.is_empty() {
            None
        } else {
            Some(Ok(chunk))
        }
    }
}

/// Loads one recording's samples with their object classes attached.
///
/// Metadata is read in full first; the tracks file is then streamed chunk by
/// chunk and joined against it.
#[tracing::instrument(skip(data_dir), fields(data_dir = %data_dir.display()))]
pub fn load_located_samples(
    data_dir: &Path,
    file_id: u32,
    chunk_size: usize,
) -> Result<Vec<LocatedSample>> {
    let meta = read_meta(&meta_path(data_dir, file_id))?;
    let classes = class_index(&meta);

    let mut located = Vec::new();
    let mut chunks = 0usize;
    for chunk in TrackChunks::open(&tracks_path(data_dir, file_id), chunk_size)? {
        located.extend(classify_samples(chunk?, &classes)?);
        chunks += 1;
    }

    debug!(samples = located.len(), chunks, "Samples classified");
    Ok(located)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const META: &str = "id,width,class,meanXVelocity,numLaneChanges\n\
                        1,4.5,Car,30.5,0\n\
                        2,12.0,Truck,-22.0,1\n";

    const TRACKS: &str = "frame,id,x,y\n\
                          1,1,10.0,2.0\n\
                          1,2,50.0,6.0\n\
                          2,1,11.0,2.1\n\
                          2,2,49.0,6.0\n\
                          3,1,12.0,2.2\n";

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_paths_are_zero_padded() {
        let dir = Path::new("data");
        assert_eq!(tracks_path(dir, 1), Path::new("data/01_tracks.csv"));
        assert_eq!(meta_path(dir, 12), Path::new("data/12_tracksMeta.csv"));
    }

    #[test]
    fn test_read_meta() {
        let dir = TempDir::new().unwrap();
        write(&dir, "01_tracksMeta.csv", META);

        let rows = read_meta(&meta_path(dir.path(), 1)).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].class, "Truck");
        assert_eq!(rows[1].mean_x_velocity, -22.0);
        assert_eq!(rows[1].num_lane_changes, 1);
    }

    #[test]
    fn test_read_meta_accepts_track_id_alias() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "00_tracksMeta.csv",
            "trackId,class,meanXVelocity,numLaneChanges\n5,Bus,12.0,0\n",
        );

        let rows = read_meta(&meta_path(dir.path(), 0)).unwrap();
        assert_eq!(rows[0].id, 5);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "01_tracksMeta.csv", "id,class,meanXVelocity\n1,Car,3.0\n");

        let err = read_meta(&meta_path(dir.path(), 1)).unwrap_err();
        match err {
            AnalysisError::MissingColumn { column, .. } => assert_eq!(column, "numLaneChanges"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_value_is_csv_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "01_tracks.csv", "id,x,y\n1,abc,2.0\n");

        let mut chunks = TrackChunks::open(&tracks_path(dir.path(), 1), 10).unwrap();
        assert!(matches!(chunks.next(), Some(Err(AnalysisError::Csv { .. }))));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_meta(&meta_path(dir.path(), 9)).unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound { .. }));
    }

    #[test]
    fn test_track_chunks_respect_size() {
        let dir = TempDir::new().unwrap();
        write(&dir, "01_tracks.csv", TRACKS);

        let sizes: Vec<usize> = TrackChunks::open(&tracks_path(dir.path(), 1), 2)
            .unwrap()
            .map(|chunk| chunk.unwrap().len())
            .collect();

        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_load_located_samples_joins_classes() {
        let dir = TempDir::new().unwrap();
        write(&dir, "01_tracksMeta.csv", META);
        write(&dir, "01_tracks.csv", TRACKS);

        let located = load_located_samples(dir.path(), 1, 2).unwrap();

        assert_eq!(located.len(), 5);
        assert_eq!(located[0].class, "Car");
        assert_eq!(located[1].class, "Truck");
        assert_eq!((located[4].x, located[4].y), (12.0, 2.2));
    }

    #[test]
    fn test_load_located_samples_unknown_object() {
        let dir = TempDir::new().unwrap();
        write(&dir, "01_tracksMeta.csv", META);
        write(&dir, "01_tracks.csv", "id,x,y\n1,0.0,0.0\n3,1.0,1.0\n");

        let err = load_located_samples(dir.path(), 1, 10).unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownObject { id: 3 }));
    }
}
