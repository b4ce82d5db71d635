use std::fmt;

/// Delimitador de campos en las tramas de texto de la adquisición.
pub const FIELD_DELIMITER: char = ',';

/// Campos por trama en el formato del guante: timestamp + 12 canales de flexión/orientación.
pub const DEFAULT_RAW_FIELDS: usize = 13;

/// Esquema de la trama cruda que entrega la capa de adquisición.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchema {
    /// Número total de campos por trama, incluido el canal de tiempo si existe.
    pub raw_fields: usize,
    /// El primer campo es un timestamp y se excluye de la muestra normalizada.
    pub has_time_channel: bool,
}

impl FrameSchema {
    pub fn new(raw_fields: usize, has_time_channel: bool) -> Self {
        Self {
            raw_fields,
            has_time_channel,
        }
    }

    /// Número de canales que llegan al clasificador (K).
    pub fn feature_arity(&self) -> usize {
        if self.has_time_channel {
            self.raw_fields.saturating_sub(1)
        } else {
            self.raw_fields
        }
    }
}

impl Default for FrameSchema {
    fn default() -> Self {
        Self {
            raw_fields: DEFAULT_RAW_FIELDS,
            has_time_channel: true,
        }
    }
}

/// Trama cruda tal como sale de la cola: número de secuencia asignado al
/// publicar más la línea delimitada original. El filtro es su único consumidor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub seq: u64,
    pub data: String,
}

/// Muestra suavizada y reescalada; una por tick con la ventana ya caliente.
pub type NormalizedSample = Vec<f64>;

/// Etiqueta de clasificación. `NoGesture` es el centinela de rechazo cuando
/// ningún perfil supera el umbral configurado.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GestureLabel {
    Known(String),
    NoGesture,
}

impl GestureLabel {
    pub fn known(label: impl Into<String>) -> Self {
        GestureLabel::Known(label.into())
    }

    pub fn is_no_gesture(&self) -> bool {
        matches!(self, GestureLabel::NoGesture)
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GestureLabel::Known(label) => f.write_str(label),
            GestureLabel::NoGesture => f.write_str("desconocido"),
        }
    }
}

/// Resultado instantáneo de clasificar una muestra normalizada.
/// `score` es la verosimilitud conjunta (clasificador gaussiano) o la
/// distancia euclídea al cuadrado (clasificador por centroides).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: GestureLabel,
    pub score: f64,
}
