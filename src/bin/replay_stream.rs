use std::env;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};

use guante::corpus_loader::{load_manifest, load_training_set};
use guante::gesture_classifier::{
    Classifier, EuclideanClassifier, EuclideanParams, GaussianClassifier, GaussianParams,
};
use guante::gesture_stabilizer::{GestureStabilizer, StabilizerParams};
use guante::moving_average::{FilterParams, MovingAverageFilter};
use guante::types::{FrameSchema, NormalizedSample, RawFrame};

struct ReplayOptions {
    dump_samples: bool,
    kind: String,
}

fn parse_args() -> Result<(PathBuf, PathBuf, ReplayOptions)> {
    let mut dump_samples = false;
    let mut kind = "gauss".to_string();
    let mut positional: Vec<PathBuf> = Vec::new();

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--dump-samples" => dump_samples = true,
            "--euclid" => kind = "euclid".to_string(),
            "--gauss" => kind = "gauss".to_string(),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    if positional.len() != 2 {
        bail!("Uso: replay_stream [--gauss|--euclid] [--dump-samples] <manifiesto.json> <captura.csv|directorio>");
    }

    let stream = positional.pop().unwrap();
    let manifest = positional.pop().unwrap();
    Ok((manifest, stream, ReplayOptions { dump_samples, kind }))
}

/// Con un directorio como entrada elige una captura CSV al azar.
fn resolve_stream_path(path: PathBuf) -> Result<PathBuf> {
    if !path.is_dir() {
        return Ok(path);
    }

    let csv_files: Vec<PathBuf> = fs::read_dir(&path)
        .with_context(|| format!("No se pudo listar el directorio {:?}", path))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();

    if csv_files.is_empty() {
        bail!("No hay archivos CSV en {:?}", path);
    }

    use rand::Rng;
    let random_idx = rand::thread_rng().gen_range(0..csv_files.len());
    Ok(csv_files[random_idx].clone())
}

fn main() -> Result<()> {
    let (manifest_path, stream_path, opts) = parse_args()?;
    let stream_path = resolve_stream_path(stream_path)?;
    println!("🎞️  Reproduciendo flujo desde {:?}", stream_path);

    let schema = FrameSchema::default();
    let manifest = load_manifest(&manifest_path)?;
    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let set = load_training_set(&manifest, base_dir, schema.feature_arity())?;

    let classifier: Arc<dyn Classifier> = match opts.kind.as_str() {
        "gauss" => Arc::new(GaussianClassifier::train(&set, GaussianParams::default())?),
        _ => Arc::new(EuclideanClassifier::train(
            &set,
            EuclideanParams::default(),
        )?),
    };

    let mut filter = MovingAverageFilter::new(schema, FilterParams::default());
    let mut stabilizer = GestureStabilizer::new(StabilizerParams::default());

    let file = fs::File::open(&stream_path)
        .with_context(|| format!("No se pudo abrir la captura {:?}", stream_path))?;

    let mut ticks = 0usize;
    let mut discarded = 0usize;
    let mut last_sample: Option<NormalizedSample> = None;

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Error leyendo la línea {}", idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }

        let frame = RawFrame {
            seq: idx as u64,
            data: line,
        };

        match filter.ingest(&frame) {
            Ok(Some(sample)) => {
                if opts.dump_samples {
                    println!("  [{:04}] {:?}", idx, sample);
                }

                let result = classifier.classify(&sample);
                ticks += 1;
                if let Some(label) = stabilizer.observe(result.label) {
                    println!(
                        "  ➡️  {} (tick {}, puntuación {:.6})",
                        label, ticks, result.score
                    );
                }
                last_sample = Some(sample);
            }
            Ok(None) => {}
            Err(err) => {
                discarded += 1;
                eprintln!("⚠️  Línea {} descartada: {}", idx + 1, err);
            }
        }
    }

    let last_sample =
        last_sample.ok_or_else(|| anyhow!("La captura no produjo ninguna muestra normalizada"))?;

    // Tabla final de puntuaciones para la última muestra
    let mut scores = classifier.scores(&last_sample);
    if opts.kind == "gauss" {
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    } else {
        scores.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    }

    println!("\n🥇 Última muestra, puntuación por gesto:");
    for (idx, (label, score)) in scores.iter().enumerate() {
        println!("  {:>2}. {:<25} {:>14.6}", idx + 1, label, score);
    }

    println!(
        "\n📊 ticks={} descartadas={} etiqueta_final={}",
        ticks,
        discarded,
        stabilizer
            .last_emitted()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "desconocido".to_string())
    );

    Ok(())
}
