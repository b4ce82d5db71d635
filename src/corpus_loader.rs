use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;

use crate::gesture_profile::TrainingSet;

/// Manifiesto de gestos conocidos: etiqueta → archivo de corpus, con rutas
/// relativas al directorio del manifiesto.
#[derive(Debug, Deserialize)]
pub struct GestureManifest {
    pub gestures: BTreeMap<String, PathBuf>,
}

/// Carga y valida el manifiesto JSON.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<GestureManifest> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("No se pudo leer el manifiesto {:?}", path))?;
    let manifest: GestureManifest = serde_json::from_str(&content)
        .with_context(|| format!("Manifiesto {:?} inválido", path))?;

    ensure!(
        !manifest.gestures.is_empty(),
        "El manifiesto {:?} no declara ningún gesto",
        path
    );
    Ok(manifest)
}

/// Carga el corpus completo de entrenamiento: un CSV sin encabezado por gesto,
/// una muestra normalizada de `arity` valores por línea.
///
/// Un corpus ausente o vacío para un gesto declarado es un error fatal de
/// configuración, no un caso de reintento.
pub fn load_training_set(
    manifest: &GestureManifest,
    base_dir: &Path,
    arity: usize,
) -> Result<TrainingSet> {
    let mut set = TrainingSet::new();

    for (label, relative) in &manifest.gestures {
        let path = base_dir.join(relative);
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .with_context(|| format!("No se pudo abrir el corpus {:?} para {:?}", path, label))?;

        let mut samples = 0usize;
        for (row_idx, result) in reader.records().enumerate() {
            let record = result
                .with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
            if record.len() != arity {
                bail!(
                    "La fila {} de {:?} tiene {} campos (se esperaban {})",
                    row_idx + 1,
                    path,
                    record.len(),
                    arity
                );
            }

            let mut sample = Vec::with_capacity(arity);
            for field in record.iter() {
                let value: f64 = field.trim().parse().with_context(|| {
                    format!("Valor inválido {:?} en fila {} de {:?}", field, row_idx + 1, path)
                })?;
                sample.push(value);
            }

            set.add_sample(label, sample);
            samples += 1;
        }

        ensure!(
            samples > 0,
            "El corpus {:?} para {:?} está vacío",
            path,
            label
        );
        println!("📂 Corpus {:?}: {} muestras", label, samples);
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn setup_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_manifest_and_corpus() {
        let dir = setup_dir("guante_test_corpus_ok");
        write_file(
            &dir,
            "manifiesto.json",
            r#"{"gestures": {"punio": "punio.csv", "palma": "palma.csv"}}"#,
        );
        write_file(&dir, "punio.csv", "1.0,2.0\n1.1,2.1\n");
        write_file(&dir, "palma.csv", "9.0,8.0\n");

        let manifest = load_manifest(dir.join("manifiesto.json")).unwrap();
        assert_eq!(manifest.gestures.len(), 2);

        let set = load_training_set(&manifest, &dir, 2).unwrap();
        assert_eq!(set.num_labels(), 2);
        assert_eq!(set.validate().unwrap(), 2);
    }

    #[test]
    fn test_empty_corpus_is_fatal() {
        let dir = setup_dir("guante_test_corpus_vacio");
        write_file(&dir, "manifiesto.json", r#"{"gestures": {"punio": "punio.csv"}}"#);
        write_file(&dir, "punio.csv", "");

        let manifest = load_manifest(dir.join("manifiesto.json")).unwrap();
        assert!(load_training_set(&manifest, &dir, 2).is_err());
    }

    #[test]
    fn test_missing_corpus_file_is_fatal() {
        let dir = setup_dir("guante_test_corpus_ausente");
        write_file(&dir, "manifiesto.json", r#"{"gestures": {"punio": "no_existe.csv"}}"#);

        let manifest = load_manifest(dir.join("manifiesto.json")).unwrap();
        assert!(load_training_set(&manifest, &dir, 2).is_err());
    }

    #[test]
    fn test_wrong_arity_row_is_fatal() {
        let dir = setup_dir("guante_test_corpus_aridad");
        write_file(&dir, "manifiesto.json", r#"{"gestures": {"punio": "punio.csv"}}"#);
        write_file(&dir, "punio.csv", "1.0,2.0\n3.0\n");

        let manifest = load_manifest(dir.join("manifiesto.json")).unwrap();
        assert!(load_training_set(&manifest, &dir, 2).is_err());
    }

    #[test]
    fn test_manifest_without_gestures_is_rejected() {
        let dir = setup_dir("guante_test_manifiesto_vacio");
        write_file(&dir, "manifiesto.json", r#"{"gestures": {}}"#);
        assert!(load_manifest(dir.join("manifiesto.json")).is_err());
    }
}
