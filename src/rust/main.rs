use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imagefront::ImageClassifier;
use log::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit a classifier head on a `label/image` directory tree and save it
    Train {
        /// Dataset root; every subdirectory is one class
        #[arg(short, long)]
        data: PathBuf,
        /// Pretrained ONNX feature extractor
        #[arg(short, long)]
        pretrained: PathBuf,
        /// Where to write the trained model
        #[arg(short, long)]
        out: PathBuf,
        /// Seed for a reproducible train/test split
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Classify images with a previously trained model
    Classify {
        /// Pretrained ONNX feature extractor the model was trained with
        #[arg(short, long)]
        pretrained: PathBuf,
        /// Trained model written by `train`
        #[arg(short, long)]
        model: PathBuf,
        /// Images to classify
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Train {
            data,
            pretrained,
            out,
            seed,
        } => train(data, pretrained, out, seed),
        Command::Classify {
            pretrained,
            model,
            images,
        } => classify(pretrained, model, images),
    }
}

fn train(data: PathBuf, pretrained: PathBuf, out: PathBuf, seed: Option<u64>) -> Result<()> {
    info!("=== Starting Training ===");
    let start_time = Instant::now();

    let mut builder = ImageClassifier::builder()
        .with_pretrained_model(&pretrained)?
        .with_dataset_path(data)
        .with_saved_model_path(out);
    if let Some(seed) = seed {
        builder = builder.with_seed(seed);
    }
    let classifier = builder.build().context("Failed to build classifier")?;

    let report = classifier.fit_model().context("Training failed")?;

    println!("Trained on {} images, tested on {}", report.train_count, report.test_count);
    println!("Classes: {}", report.model.labels.join(", "));
    match &report.metrics {
        Some(metrics) => {
            println!("  Log-loss:           {:.4}", metrics.log_loss);
            println!("  Log-loss reduction: {:.4}", metrics.log_loss_reduction);
            println!("  Micro accuracy:     {:.1}%", metrics.micro_accuracy * 100.0);
            println!("  Macro accuracy:     {:.1}%", metrics.macro_accuracy * 100.0);
        }
        None => println!("  No test images; metrics unavailable"),
    }
    println!("Model saved to {}", report.saved_to.display());

    info!("=== Training Complete (took {:.2?}) ===", start_time.elapsed());
    Ok(())
}

fn classify(pretrained: PathBuf, model: PathBuf, images: Vec<PathBuf>) -> Result<()> {
    let classifier = ImageClassifier::builder()
        .with_pretrained_model(&pretrained)?
        .with_saved_model_path(&model)
        .build()
        .context("Failed to build classifier")?;

    let loaded = classifier
        .preload()
        .with_context(|| format!("Failed to load model {}", model.display()))?;

    let classify_start = Instant::now();
    for (i, image) in images.iter().enumerate() {
        info!("Image {}/{}: {}", i + 1, images.len(), image.display());
        let (scores, label) = classifier
            .classify_single_image(image)
            .with_context(|| format!("Failed to classify {}", image.display()))?;

        let mut ranked: Vec<_> = loaded.labels.iter().zip(scores).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        println!("\n{}", image.display());
        println!("  Predicted class: {}", label);
        for (class, score) in ranked {
            println!("    {}: {:.3}", class, score);
        }
    }

    info!(
        "Average time per image: {:.2?}",
        classify_start.elapsed() / images.len().max(1) as u32
    );
    Ok(())
}
