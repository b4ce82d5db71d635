/*
Reconocimiento de Gestos en Tiempo Real - Guante de Sensores de Flexión

Sistema que:
1. Carga el corpus de entrenamiento declarado en un manifiesto JSON
2. Entrena un clasificador (bayesiano gaussiano o euclídeo por centroides)
3. Procesa un flujo de tramas delimitadas (stdin o archivo) por el pipeline
4. Estabiliza la clasificación por voto mayoritario y notifica cada transición

Para compilar y ejecutar:
    cargo run --release -- gestos/manifiesto.json gauss
    cat captura.csv | ./target/release/guante gestos/manifiesto.json euclid

Con un archivo como tercer argumento se procesa esa captura en lugar de stdin:
    ./target/release/guante gestos/manifiesto.json gauss captura.csv
*/

use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use guante::corpus_loader::{load_manifest, load_training_set};
use guante::gesture_classifier::{
    Classifier, EuclideanClassifier, EuclideanParams, GaussianClassifier, GaussianParams,
};
use guante::pipeline::{OutputCallback, PipelineDriver, PipelineParams, ShutdownMode};
use guante::types::FrameSchema;

fn usage() -> ! {
    eprintln!("Uso: guante <manifiesto.json> [gauss|euclid] [captura.csv]");
    std::process::exit(2);
}

fn train_classifier(
    kind: &str,
    manifest_path: &Path,
    schema: &FrameSchema,
) -> Result<Arc<dyn Classifier>> {
    let manifest = load_manifest(manifest_path)?;
    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let set = load_training_set(&manifest, base_dir, schema.feature_arity())?;

    let classifier: Arc<dyn Classifier> = match kind {
        "gauss" => Arc::new(GaussianClassifier::train(&set, GaussianParams::default())?),
        "euclid" => Arc::new(EuclideanClassifier::train(
            &set,
            EuclideanParams::default(),
        )?),
        other => bail!("Clasificador desconocido {:?} (use gauss o euclid)", other),
    };

    Ok(classifier)
}

fn main() -> Result<()> {
    println!("🧤 Reconocimiento de gestos - guante\n");

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let manifest_path = PathBuf::from(&args[1]);
    let kind = args.get(2).map(String::as_str).unwrap_or("gauss");
    let capture_path = args.get(3).map(PathBuf::from);

    let schema = FrameSchema::default();
    println!(
        "🔧 Esquema: {} campos por trama ({} canales para el clasificador)",
        schema.raw_fields,
        schema.feature_arity()
    );

    let classifier = train_classifier(kind, &manifest_path, &schema)?;
    println!("✅ Clasificador listo: {:?}\n", classifier.labels());

    // Punto de integración para GUI/actuación: una llamada síncrona por
    // transición estabilizada
    let callback: OutputCallback = Box::new(|label, score| {
        println!("🖐️  Gesto: {} (puntuación {:.6})", label, score);
    });

    let params = PipelineParams {
        schema,
        ..PipelineParams::default()
    };
    let driver = PipelineDriver::spawn(params, classifier, callback)?;

    // Productor: la capa de adquisición externa entrega líneas ya delimitadas
    let reader: Box<dyn BufRead> = match &capture_path {
        Some(path) => {
            println!("🎬 Procesando captura {:?}...\n", path);
            let file =
                File::open(path).with_context(|| format!("No se pudo abrir la captura {:?}", path))?;
            Box::new(BufReader::new(file))
        }
        None => {
            println!("🎧 Leyendo tramas de stdin (EOF para terminar)...\n");
            Box::new(BufReader::new(io::stdin()))
        }
    };

    for line in reader.lines() {
        let line = line.context("Error leyendo el flujo de entrada")?;
        if line.trim().is_empty() {
            continue;
        }
        driver.feed_line(&line);
    }

    let stats = driver.shutdown(ShutdownMode::Drain);
    println!(
        "\n📊 tramas={} clasificadas={} transiciones={} errores_esquema={} expulsadas={} ",
        stats.frames_processed,
        stats.samples_classified,
        stats.transitions,
        stats.schema_errors,
        stats.frames_dropped
    );

    Ok(())
}
