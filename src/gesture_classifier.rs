use std::f64::consts::PI;

use crate::gesture_profile::{
    quantize, train_centroid_profiles, train_gaussian_profiles, BinningParams, GestureProfile,
    ProfileKind, TrainingError, TrainingSet,
};
use crate::types::{ClassificationResult, GestureLabel, NormalizedSample};

/// Parámetros del clasificador bayesiano ingenuo gaussiano.
#[derive(Debug, Clone)]
pub struct GaussianParams {
    /// Verosimilitud conjunta mínima para aceptar un gesto.
    pub recognition_threshold: f64,
    /// Prior por clase; `None` usa el prior uniforme 1/num_clases.
    pub prior: Option<f64>,
}

impl Default for GaussianParams {
    fn default() -> Self {
        Self {
            recognition_threshold: 1e-12,
            prior: None,
        }
    }
}

/// Parámetros del clasificador euclídeo por centroides.
#[derive(Debug, Clone)]
pub struct EuclideanParams {
    /// Distancia máxima aceptada; se compara contra la distancia al cuadrado.
    pub distance_threshold: f64,
    pub binning: BinningParams,
}

impl Default for EuclideanParams {
    fn default() -> Self {
        Self {
            distance_threshold: 50.0,
            binning: BinningParams::default(),
        }
    }
}

/// Clasificador instantáneo de muestras normalizadas. Los perfiles son de solo
/// lectura tras el entrenamiento y el clasificador se comparte entre hilos
/// mediante `Arc` sin bloqueo alguno.
pub trait Classifier: Send + Sync {
    /// Clasifica una muestra; devuelve `NoGesture` si ningún perfil supera el
    /// umbral configurado.
    fn classify(&self, sample: &NormalizedSample) -> ClassificationResult;

    /// Puntuación de la muestra contra cada perfil, en orden lexicográfico.
    fn scores(&self, sample: &NormalizedSample) -> Vec<(String, f64)>;

    fn labels(&self) -> Vec<&str>;
}

/// Bayes ingenuo gaussiano: densidad normal univariante por canal,
/// multiplicada entre canales (independencia condicional) y por el prior.
pub struct GaussianClassifier {
    profiles: Vec<GestureProfile>,
    prior: f64,
    recognition_threshold: f64,
}

impl GaussianClassifier {
    pub fn train(set: &TrainingSet, params: GaussianParams) -> Result<Self, TrainingError> {
        let profiles = train_gaussian_profiles(set)?;
        let prior = params.prior.unwrap_or(1.0 / profiles.len() as f64);

        println!(
            "[MODELO] Clasificador gaussiano: {} gestos, prior {:.4}, umbral {:e}",
            profiles.len(),
            prior,
            params.recognition_threshold
        );

        Ok(Self {
            profiles,
            prior,
            recognition_threshold: params.recognition_threshold,
        })
    }

    fn joint_likelihood(&self, profile: &GestureProfile, sample: &NormalizedSample) -> f64 {
        let (mean, variance) = match &profile.kind {
            ProfileKind::Gaussian { mean, variance } => (mean, variance),
            ProfileKind::Centroid { .. } => unreachable!("perfil no gaussiano en clasificador gaussiano"),
        };

        let mut joint = 1.0;
        for (channel, value) in sample.iter().enumerate() {
            joint *= normal_density(*value, mean[channel], variance[channel]);
        }
        joint * self.prior
    }
}

impl Classifier for GaussianClassifier {
    fn classify(&self, sample: &NormalizedSample) -> ClassificationResult {
        let mut best: Option<(&str, f64)> = None;
        for profile in &self.profiles {
            let score = self.joint_likelihood(profile, sample);
            // La desigualdad estricta conserva la primera etiqueta en empates
            if best.map_or(true, |(_, current)| score > current) {
                best = Some((profile.label.as_str(), score));
            }
        }

        match best {
            Some((label, score)) if score >= self.recognition_threshold => ClassificationResult {
                label: GestureLabel::known(label),
                score,
            },
            Some((_, score)) => ClassificationResult {
                label: GestureLabel::NoGesture,
                score,
            },
            None => ClassificationResult {
                label: GestureLabel::NoGesture,
                score: 0.0,
            },
        }
    }

    fn scores(&self, sample: &NormalizedSample) -> Vec<(String, f64)> {
        self.profiles
            .iter()
            .map(|profile| {
                (
                    profile.label.clone(),
                    self.joint_likelihood(profile, sample),
                )
            })
            .collect()
    }

    fn labels(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.label.as_str()).collect()
    }
}

/// Vecino más cercano por centroide: distancia euclídea al cuadrado (la raíz
/// se omite; los umbrales se comparan en el espacio cuadrado).
pub struct EuclideanClassifier {
    profiles: Vec<GestureProfile>,
    binning: BinningParams,
    squared_threshold: f64,
}

impl EuclideanClassifier {
    pub fn train(set: &TrainingSet, params: EuclideanParams) -> Result<Self, TrainingError> {
        let profiles = train_centroid_profiles(set, &params.binning)?;

        println!(
            "[MODELO] Clasificador euclídeo: {} gestos, umbral de distancia {} (cuantización: {})",
            profiles.len(),
            params.distance_threshold,
            if params.binning.enabled { "sí" } else { "no" }
        );

        Ok(Self {
            profiles,
            binning: params.binning,
            squared_threshold: params.distance_threshold * params.distance_threshold,
        })
    }

    fn squared_distance(&self, profile: &GestureProfile, sample: &NormalizedSample) -> f64 {
        let vector = match &profile.kind {
            ProfileKind::Centroid { vector } => vector,
            ProfileKind::Gaussian { .. } => unreachable!("perfil no euclídeo en clasificador euclídeo"),
        };

        let mut distance = 0.0;
        for (channel, value) in sample.iter().enumerate() {
            let diff = quantize(*value, &self.binning) - vector[channel];
            distance += diff * diff;
        }
        distance
    }
}

impl Classifier for EuclideanClassifier {
    fn classify(&self, sample: &NormalizedSample) -> ClassificationResult {
        let mut best: Option<(&str, f64)> = None;
        for profile in &self.profiles {
            let distance = self.squared_distance(profile, sample);
            // La desigualdad estricta conserva la primera etiqueta en empates
            if best.map_or(true, |(_, current)| distance < current) {
                best = Some((profile.label.as_str(), distance));
            }
        }

        match best {
            Some((label, distance)) if distance <= self.squared_threshold => {
                ClassificationResult {
                    label: GestureLabel::known(label),
                    score: distance,
                }
            }
            Some((_, distance)) => ClassificationResult {
                label: GestureLabel::NoGesture,
                score: distance,
            },
            None => ClassificationResult {
                label: GestureLabel::NoGesture,
                score: f64::INFINITY,
            },
        }
    }

    fn scores(&self, sample: &NormalizedSample) -> Vec<(String, f64)> {
        self.profiles
            .iter()
            .map(|profile| (profile.label.clone(), self.squared_distance(profile, sample)))
            .collect()
    }

    fn labels(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.label.as_str()).collect()
    }
}

/// Densidad normal univariante N(x; μ, σ²). La varianza llega ya ajustada a un
/// mínimo positivo por el entrenamiento.
fn normal_density(x: f64, mean: f64, variance: f64) -> f64 {
    let diff = x - mean;
    (1.0 / (2.0 * PI * variance).sqrt()) * (-(diff * diff) / (2.0 * variance)).exp()
}
