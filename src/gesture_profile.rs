use std::collections::BTreeMap;

use thiserror::Error;

/// Varianza mínima tras el entrenamiento; una varianza nula (entrenamiento de
/// una sola muestra o datos constantes) degeneraría la densidad normal.
pub const VARIANCE_EPSILON: f64 = 1e-9;

#[derive(Error, Debug, PartialEq)]
pub enum TrainingError {
    #[error("Training set is empty")]
    EmptyCorpus,

    #[error("No samples for gesture {label:?}")]
    EmptyLabel { label: String },

    #[error("Arity mismatch for gesture {label:?}: expected {expected}, got {got}")]
    ArityMismatch {
        label: String,
        expected: usize,
        got: usize,
    },
}

/// Conjunto de entrenamiento: muestras normalizadas agrupadas por etiqueta.
///
/// El `BTreeMap` fija el orden lexicográfico de las etiquetas, del que dependen
/// los desempates deterministas de los clasificadores.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    gestures: BTreeMap<String, Vec<Vec<f64>>>,
}

impl TrainingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, label: &str, sample: Vec<f64>) {
        self.gestures
            .entry(label.to_string())
            .or_default()
            .push(sample);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Vec<f64>])> + '_ {
        self.gestures
            .iter()
            .map(|(label, samples)| (label.as_str(), samples.as_slice()))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.gestures.keys().map(String::as_str)
    }

    pub fn num_labels(&self) -> usize {
        self.gestures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gestures.is_empty()
    }

    /// Valida aridad uniforme y que toda etiqueta tenga al menos una muestra.
    /// Devuelve la aridad K del conjunto.
    pub fn validate(&self) -> Result<usize, TrainingError> {
        let mut arity: Option<usize> = None;

        for (label, samples) in &self.gestures {
            if samples.is_empty() {
                return Err(TrainingError::EmptyLabel {
                    label: label.clone(),
                });
            }
            for sample in samples {
                let expected = *arity.get_or_insert(sample.len());
                if sample.len() != expected {
                    return Err(TrainingError::ArityMismatch {
                        label: label.clone(),
                        expected,
                        got: sample.len(),
                    });
                }
            }
        }

        arity.ok_or(TrainingError::EmptyCorpus)
    }
}

/// Perfil entrenado de un gesto. Inmutable tras el entrenamiento: el registro
/// de perfiles es propiedad exclusiva del clasificador y puede compartirse
/// entre hilos sin bloqueo.
#[derive(Debug, Clone)]
pub struct GestureProfile {
    pub label: String,
    pub kind: ProfileKind,
}

#[derive(Debug, Clone)]
pub enum ProfileKind {
    Gaussian { mean: Vec<f64>, variance: Vec<f64> },
    Centroid { vector: Vec<f64> },
}

/// Cuantización previa a la comparación euclídea.
#[derive(Debug, Clone, Copy)]
pub struct BinningParams {
    pub enabled: bool,
    /// Ancho de cada bin (default: 3.0)
    pub boundary: f64,
    /// Suavizado laplaciano sumado al índice del bin (default: 1.0)
    pub smoothing: f64,
}

impl Default for BinningParams {
    fn default() -> Self {
        Self {
            enabled: true,
            boundary: 3.0,
            smoothing: 1.0,
        }
    }
}

/// `floor(valor / boundary) + smoothing`; identidad con la cuantización apagada.
pub fn quantize(value: f64, binning: &BinningParams) -> f64 {
    if !binning.enabled {
        return value;
    }
    (value / binning.boundary).floor() + binning.smoothing
}

/// Media y varianza poblacional (÷ n, no n−1) por canal, sin ajuste de épsilon.
pub fn population_stats(samples: &[Vec<f64>], arity: usize) -> (Vec<f64>, Vec<f64>) {
    let n = samples.len() as f64;

    let mut mean = vec![0.0; arity];
    for sample in samples {
        for (channel, value) in sample.iter().enumerate() {
            mean[channel] += value;
        }
    }
    for value in &mut mean {
        *value /= n;
    }

    let mut variance = vec![0.0; arity];
    for sample in samples {
        for (channel, value) in sample.iter().enumerate() {
            let diff = value - mean[channel];
            variance[channel] += diff * diff;
        }
    }
    for value in &mut variance {
        *value /= n;
    }

    (mean, variance)
}

/// Entrena un perfil gaussiano por etiqueta. Las varianzas nulas se ajustan a
/// [`VARIANCE_EPSILON`] con un aviso; un corpus vacío es fatal.
pub fn train_gaussian_profiles(set: &TrainingSet) -> Result<Vec<GestureProfile>, TrainingError> {
    let arity = set.validate()?;
    let mut profiles = Vec::with_capacity(set.num_labels());

    for (label, samples) in set.iter() {
        let (mean, mut variance) = population_stats(samples, arity);

        let mut clamped = 0usize;
        for value in &mut variance {
            if *value < VARIANCE_EPSILON {
                *value = VARIANCE_EPSILON;
                clamped += 1;
            }
        }
        if clamped > 0 {
            println!(
                "⚠️  Varianza degenerada en {} canal(es) de {:?}; ajustada a {:e}",
                clamped, label, VARIANCE_EPSILON
            );
        }

        profiles.push(GestureProfile {
            label: label.to_string(),
            kind: ProfileKind::Gaussian { mean, variance },
        });
    }

    Ok(profiles)
}

/// Entrena un perfil por centroide (opcionalmente cuantizado) por etiqueta.
pub fn train_centroid_profiles(
    set: &TrainingSet,
    binning: &BinningParams,
) -> Result<Vec<GestureProfile>, TrainingError> {
    let arity = set.validate()?;
    let mut profiles = Vec::with_capacity(set.num_labels());

    for (label, samples) in set.iter() {
        let n = samples.len() as f64;
        let mut vector = vec![0.0; arity];
        for sample in samples {
            for (channel, value) in sample.iter().enumerate() {
                vector[channel] += quantize(*value, binning);
            }
        }
        for value in &mut vector {
            *value /= n;
        }

        profiles.push(GestureProfile {
            label: label.to_string(),
            kind: ProfileKind::Centroid { vector },
        });
    }

    Ok(profiles)
}
