//! Labeled image datasets read from a `root/<label>/<file>` directory tree.

mod error;
mod example;
mod loader;
pub mod shuffle;

pub use error::DatasetError;
pub use example::{ImageExample, ImageSource};
pub use loader::{
    collect_examples, read_data, read_data_seeded, read_data_with_rng, split_sets, DatasetSplit,
    TRAIN_PERCENT,
};
pub use shuffle::{shuffle, shuffle_seeded, Shuffled};
