use std::collections::{HashMap, VecDeque};

use crate::types::GestureLabel;

/// Parámetros del estabilizador temporal.
#[derive(Debug, Clone)]
pub struct StabilizerParams {
    /// Clasificaciones instantáneas retenidas para el voto (default: 25)
    pub history_len: usize,
}

impl Default for StabilizerParams {
    fn default() -> Self {
        Self { history_len: 25 }
    }
}

/// Estabilizador por voto mayoritario sobre las últimas N clasificaciones
/// instantáneas (incluido `NoGesture`).
///
/// Mientras el historial no está lleno la etiqueta instantánea pasa directa;
/// con el historial completo se emite la moda de la ventana. En ambos casos
/// solo se notifica un cambio respecto a la última etiqueta emitida, y
/// `last_emitted` se actualiza en cada observación aunque no haya evento.
pub struct GestureStabilizer {
    history: VecDeque<GestureLabel>,
    history_len: usize,
    last_emitted: Option<GestureLabel>,
}

impl GestureStabilizer {
    pub fn new(params: StabilizerParams) -> Self {
        Self {
            history: VecDeque::with_capacity(params.history_len),
            history_len: params.history_len,
            last_emitted: None,
        }
    }

    /// Registra una etiqueta instantánea; devuelve la nueva etiqueta
    /// estabilizada solo cuando cambia.
    pub fn observe(&mut self, label: GestureLabel) -> Option<GestureLabel> {
        self.history.push_back(label.clone());
        if self.history.len() > self.history_len {
            self.history.pop_front();
        }

        let current = if self.history.len() < self.history_len {
            label
        } else {
            self.majority()
        };

        let changed = self.last_emitted.as_ref() != Some(&current);
        self.last_emitted = Some(current.clone());
        changed.then_some(current)
    }

    /// Moda de la ventana. Empates: gana la etiqueta vista más recientemente
    /// entre las empatadas.
    fn majority(&self) -> GestureLabel {
        let mut tally: HashMap<&GestureLabel, (usize, usize)> = HashMap::new();
        for (position, label) in self.history.iter().enumerate() {
            let entry = tally.entry(label).or_insert((0, 0));
            entry.0 += 1;
            entry.1 = position;
        }

        tally
            .into_iter()
            .max_by_key(|&(_, (count, last_seen))| (count, last_seen))
            .map(|(label, _)| label.clone())
            .unwrap_or(GestureLabel::NoGesture)
    }

    pub fn last_emitted(&self) -> Option<&GestureLabel> {
        self.last_emitted.as_ref()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str) -> GestureLabel {
        GestureLabel::known(name)
    }

    fn stabilizer(n: usize) -> GestureStabilizer {
        GestureStabilizer::new(StabilizerParams { history_len: n })
    }

    #[test]
    fn test_warmup_passes_instantaneous_label_through() {
        let mut st = stabilizer(5);

        assert_eq!(st.observe(label("a")), Some(label("a")));
        assert_eq!(st.observe(label("a")), None); // sin cambio, sin evento
        assert_eq!(st.observe(label("b")), Some(label("b")));
    }

    #[test]
    fn test_majority_without_event_when_already_emitted() {
        let mut st = stabilizer(5);

        // [a, a, a, a, b]: la moda es a y ya era la última emitida
        assert_eq!(st.observe(label("a")), Some(label("a")));
        assert_eq!(st.observe(label("a")), None);
        assert_eq!(st.observe(label("a")), None);
        assert_eq!(st.observe(label("a")), None);
        assert_eq!(st.observe(label("b")), None);
        assert_eq!(st.last_emitted(), Some(&label("a")));
    }

    #[test]
    fn test_single_transition_event_on_majority_flip() {
        let mut st = stabilizer(5);

        // [a, a, b, b, b]: exactamente una transición a → b
        let events: Vec<_> = ["a", "a", "b", "b", "b"]
            .iter()
            .filter_map(|l| st.observe(label(l)))
            .collect();

        assert_eq!(events, vec![label("a"), label("b")]);
        assert_eq!(st.last_emitted(), Some(&label("b")));
    }

    #[test]
    fn test_tie_prefers_most_recent_label() {
        let mut st = stabilizer(4);

        st.observe(label("a"));
        st.observe(label("b"));
        st.observe(label("a"));
        // [a, b, a, b]: empate 2-2; b es la más reciente
        let event = st.observe(label("b"));
        assert_eq!(event, Some(label("b")));
    }

    #[test]
    fn test_no_gesture_participates_in_the_vote() {
        let mut st = stabilizer(3);

        st.observe(GestureLabel::NoGesture);
        st.observe(GestureLabel::NoGesture);
        let event = st.observe(label("a"));
        // [∅, ∅, a]: la moda sigue siendo NoGesture
        assert_eq!(event, None);
        assert_eq!(st.last_emitted(), Some(&GestureLabel::NoGesture));
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let mut st = stabilizer(4);
        for i in 0..50 {
            st.observe(label(&format!("g{}", i % 3)));
            assert!(st.history_len() <= 4);
        }
    }

    #[test]
    fn test_sustained_majority_survives_jitter() {
        let mut st = stabilizer(5);

        // Ventana ya caliente con a dominante: las b espurias no se emiten
        let mut events = Vec::new();
        for l in ["a", "a", "a", "a", "a", "b", "a", "a", "b", "a"] {
            if let Some(e) = st.observe(label(l)) {
                events.push(e);
            }
        }
        assert_eq!(events, vec![label("a")]);
    }
}
