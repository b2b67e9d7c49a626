mod common;

use std::fs;
use std::sync::Arc;
use std::thread;

use common::{init, test_settings, write_class, write_png, write_rgb_dataset, ColourExtractor};
use imagefront::{
    ClassifierError, ImageClassifier, ImageSource, ModelError, PrototypeTrainer,
};
use tempfile::TempDir;

fn build_classifier(dir: &TempDir) -> ImageClassifier {
    ImageClassifier::builder()
        .with_feature_extractor(Arc::new(ColourExtractor::default()))
        .unwrap()
        .with_image_settings(test_settings())
        .with_dataset_path(dir.path().join("data"))
        .with_saved_model_path(dir.path().join("models").join("model.json"))
        .with_seed(17)
        .build()
        .expect("Failed to create classifier")
}

#[test]
fn test_train_and_classify() -> Result<(), ClassifierError> {
    init();
    let dir = TempDir::new().unwrap();
    write_rgb_dataset(&dir.path().join("data"), 8);

    let classifier = build_classifier(&dir);
    let report = classifier.fit_model()?;

    assert_eq!(report.train_count, 23);
    assert_eq!(report.test_count, 1);
    assert_eq!(report.model.labels, vec!["blue", "green", "red"]);
    assert!(report.saved_to.exists());
    let metrics = report.metrics.expect("one test image should be evaluated");
    assert_eq!(metrics.count, 1);
    assert!(metrics.log_loss.is_finite());

    let query = dir.path().join("query.png");
    write_png(&query, [250, 10, 10]);
    let (scores, label) = classifier.classify_single_image(&query)?;
    assert_eq!(label, "red");
    assert_eq!(scores.len(), 3);
    assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    Ok(())
}

#[test]
fn test_classify_from_bytes() -> Result<(), ClassifierError> {
    let dir = TempDir::new().unwrap();
    write_rgb_dataset(&dir.path().join("data"), 6);
    let classifier = build_classifier(&dir);
    classifier.fit_model()?;

    let query = dir.path().join("query.png");
    write_png(&query, [10, 10, 240]);
    let bytes = fs::read(&query)?;
    let prediction = classifier.classify(&ImageSource::Bytes(bytes))?;
    assert_eq!(prediction.predicted_label, "blue");
    Ok(())
}

#[test]
fn test_saved_model_reloads_in_new_classifier() -> Result<(), ClassifierError> {
    let dir = TempDir::new().unwrap();
    write_rgb_dataset(&dir.path().join("data"), 6);
    let query = dir.path().join("query.png");
    write_png(&query, [15, 235, 15]);

    let trained = build_classifier(&dir);
    let report = trained.fit_model()?;
    let expected = trained.classify_single_image(&query)?;

    let fresh = build_classifier(&dir);
    assert!(!fresh.is_loaded());
    let actual = fresh.classify_single_image(&query)?;
    assert!(fresh.is_loaded());
    assert_eq!(actual, expected);
    assert_eq!(actual.1, "green");
    assert_eq!(*fresh.preload()?, *report.model);
    Ok(())
}

#[test]
fn test_clear_cache_forces_reload() -> Result<(), ClassifierError> {
    let dir = TempDir::new().unwrap();
    write_rgb_dataset(&dir.path().join("data"), 5);
    let query = dir.path().join("query.png");
    write_png(&query, [240, 30, 30]);

    let classifier = build_classifier(&dir);
    let report = classifier.fit_model()?;
    assert!(classifier.is_loaded());
    assert!(classifier.info().class_labels.is_some());

    // Still resident: the file is not needed.
    fs::remove_file(&report.saved_to)?;
    assert_eq!(classifier.classify_single_image(&query)?.1, "red");

    classifier.clear_cache();
    assert!(!classifier.is_loaded());
    let result = classifier.classify_single_image(&query);
    assert!(matches!(
        result,
        Err(ClassifierError::Store(ModelError::NotFound(_)))
    ));
    Ok(())
}

#[test]
fn test_incompatible_extractor_is_rejected() -> Result<(), ClassifierError> {
    let dir = TempDir::new().unwrap();
    write_rgb_dataset(&dir.path().join("data"), 4);
    build_classifier(&dir).fit_model()?;

    let other = ImageClassifier::builder()
        .with_feature_extractor(Arc::new(ColourExtractor {
            output_name: "pool5".into(),
        }))?
        .with_image_settings(test_settings())
        .with_saved_model_path(dir.path().join("models").join("model.json"))
        .build()?;

    let query = dir.path().join("query.png");
    write_png(&query, [0, 0, 0]);
    assert!(matches!(
        other.classify_single_image(&query),
        Err(ClassifierError::SchemaMismatch(_))
    ));
    assert!(!other.is_loaded());
    Ok(())
}

#[test]
fn test_inconsistent_saved_head_fails_at_load() -> Result<(), ClassifierError> {
    let dir = TempDir::new().unwrap();
    write_rgb_dataset(&dir.path().join("data"), 5);
    let report = build_classifier(&dir).fit_model()?;

    let mut json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report.saved_to)?).unwrap();
    json["head"]["mean"]["dim"] = serde_json::json!([2]);
    json["head"]["mean"]["data"] = serde_json::json!([0.5, 0.5]);
    fs::write(&report.saved_to, serde_json::to_string(&json).unwrap())?;

    let query = dir.path().join("query.png");
    write_png(&query, [240, 20, 20]);
    let fresh = build_classifier(&dir);
    assert!(matches!(
        fresh.classify_single_image(&query),
        Err(ClassifierError::SchemaMismatch(_))
    ));
    assert!(!fresh.is_loaded());
    Ok(())
}

#[test]
fn test_seeded_training_is_reproducible() -> Result<(), ClassifierError> {
    let dir = TempDir::new().unwrap();
    write_rgb_dataset(&dir.path().join("data"), 5);

    let a = build_classifier(&dir).fit_model()?;
    let b = build_classifier(&dir).fit_model()?;
    assert_eq!(a.model, b.model);
    Ok(())
}

#[test]
fn test_prototype_trainer() -> Result<(), ClassifierError> {
    let dir = TempDir::new().unwrap();
    write_rgb_dataset(&dir.path().join("data"), 5);

    let classifier = ImageClassifier::builder()
        .with_feature_extractor(Arc::new(ColourExtractor::default()))?
        .with_image_settings(test_settings())
        .with_saved_model_path(dir.path().join("proto.json"))
        .with_trainer(PrototypeTrainer)
        .build()?;
    classifier.train(dir.path().join("data"))?;

    let query = dir.path().join("query.png");
    write_png(&query, [20, 20, 250]);
    assert_eq!(classifier.classify_single_image(&query)?.1, "blue");
    Ok(())
}

#[test]
fn test_single_image_dataset_cannot_train() {
    let dir = TempDir::new().unwrap();
    write_class(&dir.path().join("data"), "lonely", [100, 100, 100], 1);

    let classifier = build_classifier(&dir);
    let result = classifier.fit_model();
    assert!(matches!(result, Err(ClassifierError::TrainingError(_))));
    assert!(!dir.path().join("models").join("model.json").exists());
}

#[test]
fn test_corrupt_image_fails_training() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write_rgb_dataset(&data, 3);
    fs::write(data.join("red").join("broken.png"), b"not a png").unwrap();

    let classifier = build_classifier(&dir);
    assert!(matches!(
        classifier.fit_model(),
        Err(ClassifierError::Image(_))
    ));
}

#[test]
fn test_missing_dataset() {
    let dir = TempDir::new().unwrap();
    let classifier = build_classifier(&dir);
    assert!(matches!(
        classifier.fit_model(),
        Err(ClassifierError::Dataset(_))
    ));
}

#[test]
fn test_thread_safety() -> Result<(), ClassifierError> {
    let dir = TempDir::new().unwrap();
    write_rgb_dataset(&dir.path().join("data"), 5);
    build_classifier(&dir).fit_model()?;

    let query = dir.path().join("query.png");
    write_png(&query, [20, 240, 20]);

    // Not loaded yet: every thread races for the first load.
    let classifier = Arc::new(build_classifier(&dir));
    let mut handles = vec![];
    for _ in 0..4 {
        let classifier = Arc::clone(&classifier);
        let query = query.clone();
        handles.push(thread::spawn(move || classifier.classify_single_image(&query)));
    }

    for handle in handles {
        let (_, label) = handle.join().unwrap()?;
        assert_eq!(label, "green");
    }
    assert!(classifier.is_loaded());
    Ok(())
}
