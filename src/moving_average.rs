use std::collections::VecDeque;

use thiserror::Error;

use crate::types::{FrameSchema, NormalizedSample, RawFrame, FIELD_DELIMITER};

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("Schema mismatch: expected {expected} fields, got {got} (seq {seq})")]
    SchemaMismatch {
        expected: usize,
        got: usize,
        seq: u64,
    },

    #[error("Unparseable value {value:?} in field {field} (seq {seq})")]
    BadValue {
        field: usize,
        value: String,
        seq: u64,
    },
}

/// Parámetros del filtro de media móvil.
///
/// El reescalado es `scale * (media + offset) / span`: con los valores por
/// defecto mapea el rango crudo esperado [-1.5, 3.0] sobre [0, 100].
#[derive(Debug, Clone)]
pub struct FilterParams {
    /// Tramas por ventana deslizante (default: 5)
    pub window_len: usize,
    pub offset: f64,
    pub span: f64,
    pub scale: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            window_len: 5,
            offset: 1.5,
            span: 4.5,
            scale: 100.0,
        }
    }
}

/// Filtro de suavizado y normalización por ventana deslizante.
///
/// Mantiene las últimas `window_len` tramas crudas por canal; a partir de la
/// ventana completa emite una muestra por trama entrante: media aritmética por
/// canal, reescalado afín y truncado (no redondeo) a 3 decimales. El canal de
/// tiempo reservado se excluye de la salida.
pub struct MovingAverageFilter {
    schema: FrameSchema,
    params: FilterParams,
    window: VecDeque<Vec<f64>>,
}

impl MovingAverageFilter {
    pub fn new(schema: FrameSchema, params: FilterParams) -> Self {
        let capacity = params.window_len;
        Self {
            schema,
            params,
            window: VecDeque::with_capacity(capacity),
        }
    }

    /// Incorpora una trama cruda. `Ok(None)` durante el calentamiento.
    ///
    /// Una trama con aridad incorrecta o con cualquier campo no numérico
    /// invalida la ventana completa y fuerza un nuevo calentamiento; el error
    /// se devuelve tipado en lugar de interrumpir el flujo.
    pub fn ingest(&mut self, frame: &RawFrame) -> Result<Option<NormalizedSample>, FilterError> {
        let fields: Vec<&str> = frame.data.split(FIELD_DELIMITER).collect();
        if fields.len() != self.schema.raw_fields {
            self.window.clear();
            return Err(FilterError::SchemaMismatch {
                expected: self.schema.raw_fields,
                got: fields.len(),
                seq: frame.seq,
            });
        }

        let mut values = Vec::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            match field.trim().parse::<f64>() {
                Ok(value) => values.push(value),
                Err(_) => {
                    self.window.clear();
                    return Err(FilterError::BadValue {
                        field: idx,
                        value: (*field).to_string(),
                        seq: frame.seq,
                    });
                }
            }
        }

        self.window.push_back(values);
        if self.window.len() > self.params.window_len {
            self.window.pop_front();
        }
        if self.window.len() < self.params.window_len {
            return Ok(None);
        }

        let first_channel = if self.schema.has_time_channel { 1 } else { 0 };
        let mut sample = Vec::with_capacity(self.schema.feature_arity());
        for channel in first_channel..self.schema.raw_fields {
            let sum: f64 = self.window.iter().map(|frame| frame[channel]).sum();
            let mean = sum / self.params.window_len as f64;
            let scaled = self.params.scale * (mean + self.params.offset) / self.params.span;
            sample.push(truncate_to_millis(scaled));
        }

        Ok(Some(sample))
    }

    /// Vacía la ventana; la siguiente emisión requiere un calentamiento completo.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    pub fn is_warmed_up(&self) -> bool {
        self.window.len() >= self.params.window_len
    }
}

/// Trunca (no redondea) a 3 decimales.
fn truncate_to_millis(value: f64) -> f64 {
    (value * 1000.0).trunc() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_params(window_len: usize) -> FilterParams {
        // Reescalado identidad: scale * (x + 0) / 1
        FilterParams {
            window_len,
            offset: 0.0,
            span: 1.0,
            scale: 1.0,
        }
    }

    fn frame(seq: u64, data: &str) -> RawFrame {
        RawFrame {
            seq,
            data: data.to_string(),
        }
    }

    #[test]
    fn test_no_output_until_window_full() {
        let schema = FrameSchema::new(3, true);
        let mut filter = MovingAverageFilter::new(schema, identity_params(5));

        // Las primeras 4 tramas no emiten nada
        for i in 0..4 {
            let out = filter.ingest(&frame(i, "0,1.0,2.0")).unwrap();
            assert!(out.is_none());
            assert!(!filter.is_warmed_up());
        }

        // De la 5ª en adelante, exactamente una muestra por trama
        for i in 4..10 {
            let out = filter.ingest(&frame(i, "0,1.0,2.0")).unwrap();
            assert!(out.is_some());
        }
    }

    #[test]
    fn test_mean_and_rescale_excluding_time_channel() {
        let schema = FrameSchema::new(3, true);
        let mut filter = MovingAverageFilter::new(schema, FilterParams::default());

        // Canal 1 constante en 0.9, canal 2 con valores 1..=5 (media 3.0)
        let mut last = None;
        for i in 0..5 {
            let data = format!("{},0.9,{}", i * 10, i + 1);
            last = filter.ingest(&frame(i as u64, &data)).unwrap();
        }

        let sample = last.unwrap();
        assert_eq!(sample.len(), 2);
        // 100 * (0.9 + 1.5) / 4.5 = 53.333...
        assert!((sample[0] - 53.333).abs() < 1e-9);
        // 100 * (3.0 + 1.5) / 4.5 = 100.0
        assert!((sample[1] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_truncates_instead_of_rounding() {
        let schema = FrameSchema::new(1, false);
        let mut filter = MovingAverageFilter::new(schema, identity_params(5));

        let mut last = None;
        for i in 0..5 {
            last = filter.ingest(&frame(i, "10.99995")).unwrap();
        }

        // Redondear daría 11.000; truncar debe dar 10.999
        assert_eq!(last.unwrap()[0], 10.999);
    }

    #[test]
    fn test_schema_mismatch_resets_window() {
        let schema = FrameSchema::new(3, true);
        let mut filter = MovingAverageFilter::new(schema, identity_params(5));

        for i in 0..4 {
            filter.ingest(&frame(i, "0,1,2")).unwrap();
        }

        let err = filter.ingest(&frame(4, "0,1")).unwrap_err();
        assert!(matches!(
            err,
            FilterError::SchemaMismatch {
                expected: 3,
                got: 2,
                ..
            }
        ));

        // La ventana se reinició: hacen falta 5 tramas válidas más
        for i in 5..9 {
            assert!(filter.ingest(&frame(i, "0,1,2")).unwrap().is_none());
        }
        assert!(filter.ingest(&frame(9, "0,1,2")).unwrap().is_some());
    }

    #[test]
    fn test_bad_value_invalidates_whole_frame() {
        let schema = FrameSchema::new(3, true);
        let mut filter = MovingAverageFilter::new(schema, identity_params(5));

        for i in 0..4 {
            filter.ingest(&frame(i, "0,1,2")).unwrap();
        }

        let err = filter.ingest(&frame(4, "0,abc,2")).unwrap_err();
        assert!(matches!(err, FilterError::BadValue { field: 1, .. }));
        assert!(!filter.is_warmed_up());
    }

    #[test]
    fn test_window_slides_over_newest_values() {
        let schema = FrameSchema::new(1, false);
        let mut filter = MovingAverageFilter::new(schema, identity_params(2));

        assert!(filter.ingest(&frame(0, "1.0")).unwrap().is_none());
        let a = filter.ingest(&frame(1, "3.0")).unwrap().unwrap();
        assert_eq!(a[0], 2.0); // media de 1 y 3

        let b = filter.ingest(&frame(2, "5.0")).unwrap().unwrap();
        assert_eq!(b[0], 4.0); // media de 3 y 5: la trama más vieja salió
    }
}
