use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::DatasetError;
use super::example::ImageExample;
use super::shuffle::shuffle;

/// Share of the shuffled examples that goes into the training set.
pub const TRAIN_PERCENT: usize = 99;

/// Train and test partitions of one shuffled dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSplit {
    pub train: Vec<ImageExample>,
    pub test: Vec<ImageExample>,
}

impl DatasetSplit {
    pub fn total(&self) -> usize {
        self.train.len() + self.test.len()
    }
}

/// Reads `root/<label>/<file>` into shuffled train and test sets.
///
/// Each immediate subdirectory of `root` is a class and its base name is the
/// label. Files directly inside it become examples; nested directories and
/// files placed in `root` itself are ignored. File contents are not checked.
///
/// The shuffle uses a fresh entropy seed, so repeated calls generally produce
/// different partitions. Use [`read_data_seeded`] for a reproducible split.
///
/// A class directory whose name is not valid UTF-8 is rejected with
/// [`DatasetError::InvalidLabel`].
///
/// With fewer than 100 files the training set can be empty; that is not an
/// error here.
pub fn read_data(root: impl AsRef<Path>) -> Result<DatasetSplit, DatasetError> {
    read_data_with_rng(root, &mut StdRng::from_entropy())
}

/// Same as [`read_data`] with a seeded shuffle.
pub fn read_data_seeded(root: impl AsRef<Path>, seed: u64) -> Result<DatasetSplit, DatasetError> {
    read_data_with_rng(root, &mut StdRng::seed_from_u64(seed))
}

/// Same as [`read_data`] drawing the shuffle from `rng`.
pub fn read_data_with_rng<R: Rng + ?Sized>(
    root: impl AsRef<Path>,
    rng: &mut R,
) -> Result<DatasetSplit, DatasetError> {
    let root = root.as_ref();
    let examples = collect_examples(root)?;
    let shuffled: Vec<ImageExample> = shuffle(examples, rng).collect();
    let split = split_sets(shuffled, TRAIN_PERCENT);

    info!(
        "Read {} examples from {:?} ({} train, {} test)",
        split.total(),
        root,
        split.train.len(),
        split.test.len()
    );
    Ok(split)
}

/// Lists every labeled example under `root` without shuffling.
///
/// Directories and files are visited in path order so that a seeded shuffle
/// over the same tree is reproducible.
pub fn collect_examples(root: impl AsRef<Path>) -> Result<Vec<ImageExample>, DatasetError> {
    let root = root.as_ref();
    if !root.exists() {
        return Err(DatasetError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(DatasetError::NotADirectory(root.to_path_buf()));
    }

    let mut examples = Vec::new();
    for dir in sorted_entries(root, EntryKind::Dir)? {
        let label = match dir.file_name() {
            Some(name) => name
                .to_str()
                .ok_or_else(|| DatasetError::InvalidLabel(dir.clone()))?
                .to_string(),
            None => continue,
        };

        let files = sorted_entries(&dir, EntryKind::File)?;
        debug!("Label '{}': {} files in {:?}", label, files.len(), dir);
        examples.extend(
            files
                .into_iter()
                .map(|file| ImageExample::labeled(file, label.clone())),
        );
    }
    Ok(examples)
}

/// Splits `examples` so that the first `len * percent / 100` rows train and
/// the rest test.
pub fn split_sets(mut examples: Vec<ImageExample>, percent: usize) -> DatasetSplit {
    let train_count = examples.len() * percent.min(100) / 100;
    let test = examples.split_off(train_count);
    DatasetSplit {
        train: examples,
        test,
    }
}

#[derive(Clone, Copy)]
enum EntryKind {
    Dir,
    File,
}

fn sorted_entries(dir: &Path, kind: EntryKind) -> Result<Vec<PathBuf>, DatasetError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))? {
        let entry = entry.map_err(|e| DatasetError::io(dir, e))?;
        let path = entry.path();
        let keep = match kind {
            EntryKind::Dir => path.is_dir(),
            EntryKind::File => path.is_file(),
        };
        if keep {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
