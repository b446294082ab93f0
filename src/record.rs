use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use filetime::FileTime;

use crate::metadata::{parse_metadata, Fields, ParsedMetadata, MODEL_HASH_KEY};
use crate::models::ModelTable;
use crate::scan::SidecarPair;
use crate::AppError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub fields: Fields,
    pub model_hash: String,
    pub model_name: String,
    /// Relative to the output root.
    pub image_path: PathBuf,
    pub created_at: DateTime<Local>,
}

impl Record {
    pub fn enrich(
        parsed: ParsedMetadata,
        pair: &SidecarPair,
        root: &Path,
        created_at: DateTime<Local>,
        table: &ModelTable,
    ) -> Result<Self, AppError> {
        let model_hash = parsed
            .model_hash()
            .ok_or_else(|| AppError::MissingModelHash {
                path: pair.metadata.clone(),
            })?
            .to_string();
        let model_name = table
            .name(&model_hash)
            .ok_or_else(|| AppError::UnknownModelHash {
                path: pair.metadata.clone(),
                hash: model_hash.clone(),
            })?
            .to_string();
        let image_path = pair
            .image
            .strip_prefix(root)
            .map_err(|_| {
                AppError::Invalid(format!(
                    "image {} is not under {}",
                    pair.image.display(),
                    root.display()
                ))
            })?
            .to_path_buf();

        Ok(Self {
            prompt: parsed.prompt,
            negative_prompt: parsed.negative_prompt,
            fields: parsed.fields,
            model_hash,
            model_name,
            image_path,
            created_at,
        })
    }

    /// Fields shown in the record table; the model hash is the section heading instead.
    pub fn display_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().filter(|(k, _)| *k != MODEL_HASH_KEY)
    }
}

/// Birth time of the file, or its modification time where the filesystem has none.
pub fn created_at(meta: &fs::Metadata) -> Result<DateTime<Local>, AppError> {
    let mtime = FileTime::from_last_modification_time(meta);
    let ctime = FileTime::from_creation_time(meta).unwrap_or(mtime);
    DateTime::<Utc>::from_timestamp(ctime.unix_seconds(), ctime.nanoseconds())
        .map(|t| t.with_timezone(&Local))
        .ok_or_else(|| AppError::Invalid(format!("timestamp out of range: {}", ctime.unix_seconds())))
}

pub fn load_record(pair: &SidecarPair, root: &Path, table: &ModelTable) -> Result<Record, AppError> {
    let file_err = |source| AppError::File {
        path: pair.metadata.clone(),
        source,
    };
    let text = fs::read_to_string(&pair.metadata).map_err(file_err)?;
    let meta = fs::metadata(&pair.metadata).map_err(file_err)?;
    let parsed = parse_metadata(&text).map_err(|source| AppError::Metadata {
        path: pair.metadata.clone(),
        source,
    })?;
    Record::enrich(parsed, pair, root, created_at(&meta)?, table)
}

/// Stable sort by table priority, then creation time.
pub fn sort_records(records: &mut [Record], table: &ModelTable) {
    records.sort_by_key(|r| {
        (
            table.priority(&r.model_hash).unwrap_or(usize::MAX),
            r.created_at,
        )
    });
}

/// Contiguous runs of records sharing a model hash.
pub fn group_by_model(records: &[Record]) -> impl Iterator<Item = (&str, &[Record])> {
    records
        .chunk_by(|a, b| a.model_hash == b.model_hash)
        .map(|run| (run[0].model_hash.as_str(), run))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metadata::parse_parameter_line;
    use chrono::TimeZone;
    use tempfile::tempdir;

    pub(crate) fn record(hash: &str, name: &str, secs: i64, image: &str) -> Record {
        let mut fields = Fields::new();
        fields.insert("Steps", "20");
        fields.insert(MODEL_HASH_KEY, hash);
        Record {
            prompt: format!("prompt for {}\n", image),
            negative_prompt: None,
            fields,
            model_hash: hash.to_string(),
            model_name: name.to_string(),
            image_path: PathBuf::from(image),
            created_at: Local.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn pair(root: &Path, stem: &str) -> SidecarPair {
        SidecarPair {
            metadata: root.join(format!("{}.txt", stem)),
            image: root.join(format!("{}.png", stem)),
        }
    }

    #[test]
    fn enrich_looks_up_model_name_and_relative_image() {
        let root = Path::new("/data/outputs");
        let parsed = parse_metadata("a cat\nSteps: 20, Model hash: 7460a6fa\n").unwrap();
        let when = Local.timestamp_opt(1_665_000_000, 0).unwrap();
        let rec = Record::enrich(
            parsed,
            &pair(&root.join("day1"), "00001"),
            root,
            when,
            &ModelTable::builtin(),
        )
        .unwrap();

        assert_eq!(rec.model_name, "stable diffusion v1.4");
        assert_eq!(rec.model_hash, "7460a6fa");
        assert_eq!(rec.image_path, PathBuf::from("day1/00001.png"));
        assert_eq!(rec.created_at, when);
        assert_eq!(rec.prompt, "a cat\n");
        let shown: Vec<_> = rec.display_fields().collect();
        assert_eq!(shown, vec![("Steps", "20")]);
    }

    #[test]
    fn unknown_hash_is_fatal() {
        let root = Path::new("/data/outputs");
        let parsed = parse_metadata("p\nModel hash: deadbeef\n").unwrap();
        let err = Record::enrich(
            parsed,
            &pair(root, "x"),
            root,
            Local.timestamp_opt(0, 0).unwrap(),
            &ModelTable::builtin(),
        )
        .unwrap_err();
        match err {
            AppError::UnknownModelHash { hash, path } => {
                assert_eq!(hash, "deadbeef");
                assert_eq!(path, root.join("x.txt"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_hash_is_fatal() {
        let root = Path::new("/data/outputs");
        let parsed = ParsedMetadata {
            prompt: "p\n".into(),
            negative_prompt: None,
            fields: parse_parameter_line("Steps: 20").unwrap(),
        };
        let err = Record::enrich(
            parsed,
            &pair(root, "x"),
            root,
            Local.timestamp_opt(0, 0).unwrap(),
            &ModelTable::builtin(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::MissingModelHash { .. }));
    }

    #[test]
    fn load_record_reads_file_and_timestamp() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let p = pair(root, "00007");
        fs::write(
            &p.metadata,
            "forest\nNegative prompt: fog\nSeed: 3, Model hash: 9a4c6612\n",
        )
        .unwrap();
        fs::write(&p.image, b"png").unwrap();

        let rec = load_record(&p, root, &ModelTable::builtin()).unwrap();
        assert_eq!(rec.model_name, "finetuned: epoch 000461");
        assert_eq!(rec.negative_prompt.as_deref(), Some("fog"));
        assert_eq!(rec.image_path, PathBuf::from("00007.png"));
        let age = Local::now().signed_duration_since(rec.created_at);
        assert!(age.num_minutes().abs() < 60);
    }

    #[test]
    fn load_record_reports_parse_errors_with_path() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let p = pair(root, "bad");
        fs::write(&p.metadata, "p\nSteps 20, Model hash: 7460a6fa\n").unwrap();

        match load_record(&p, root, &ModelTable::builtin()) {
            Err(AppError::Metadata { path, .. }) => assert_eq!(path, p.metadata),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn sorts_by_priority_then_time() {
        let table = ModelTable::builtin();
        let mut records = vec![
            record("08bf2ce2", "finetuned: epoch 000307", 50, "a.png"),
            record("7460a6fa", "stable diffusion v1.4", 300, "b.png"),
            record("2efa9d2e", "finetuned: last", 10, "c.png"),
            record("7460a6fa", "stable diffusion v1.4", 100, "d.png"),
            record("08bf2ce2", "finetuned: epoch 000307", 20, "e.png"),
        ];
        sort_records(&mut records, &table);

        let order: Vec<&str> = records.iter().map(|r| r.image_path.to_str().unwrap()).collect();
        assert_eq!(order, vec!["d.png", "b.png", "e.png", "a.png", "c.png"]);

        for w in records.windows(2) {
            let (pa, pb) = (
                table.priority(&w[0].model_hash).unwrap(),
                table.priority(&w[1].model_hash).unwrap(),
            );
            assert!(pa < pb || (pa == pb && w[0].created_at <= w[1].created_at));
        }
    }

    #[test]
    fn ties_keep_input_order() {
        let table = ModelTable::builtin();
        let mut records = vec![
            record("7460a6fa", "stable diffusion v1.4", 5, "first.png"),
            record("7460a6fa", "stable diffusion v1.4", 5, "second.png"),
        ];
        sort_records(&mut records, &table);
        assert_eq!(records[0].image_path, PathBuf::from("first.png"));
    }

    #[test]
    fn groups_are_contiguous_runs() {
        let table = ModelTable::builtin();
        let mut records = vec![
            record("9a4c6612", "finetuned: epoch 000461", 1, "a.png"),
            record("7460a6fa", "stable diffusion v1.4", 2, "b.png"),
            record("9a4c6612", "finetuned: epoch 000461", 3, "c.png"),
            record("7460a6fa", "stable diffusion v1.4", 4, "d.png"),
        ];
        sort_records(&mut records, &table);
        let groups: Vec<(&str, usize)> = group_by_model(&records)
            .map(|(hash, run)| (hash, run.len()))
            .collect();
        assert_eq!(groups, vec![("7460a6fa", 2), ("9a4c6612", 2)]);
    }

    #[test]
    fn grouping_empty_slice_yields_nothing() {
        assert_eq!(group_by_model(&[]).count(), 0);
    }
}
