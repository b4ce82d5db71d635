use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::frame_queue::{FrameQueue, QueueError};
use crate::gesture_classifier::Classifier;
use crate::gesture_stabilizer::{GestureStabilizer, StabilizerParams};
use crate::moving_average::{FilterParams, MovingAverageFilter};
use crate::types::{FrameSchema, GestureLabel, RawFrame};

/// Política de apagado del consumidor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Procesa las tramas pendientes de la cola antes de terminar.
    Drain,
    /// Descarta las tramas pendientes (quedan contabilizadas).
    Discard,
}

/// Instantánea de los contadores de salud del pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub samples_classified: u64,
    pub schema_errors: u64,
    pub frames_dropped: u64,
    pub discarded_on_shutdown: u64,
    pub transitions: u64,
    pub ordering_violations: u64,
}

#[derive(Default)]
struct Counters {
    frames_processed: AtomicU64,
    samples_classified: AtomicU64,
    schema_errors: AtomicU64,
    discarded_on_shutdown: AtomicU64,
    transitions: AtomicU64,
    ordering_violations: AtomicU64,
}

/// Parámetros de construcción del pipeline.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub schema: FrameSchema,
    pub filter: FilterParams,
    pub stabilizer: StabilizerParams,
    /// Capacidad de la cola de tramas (potencia de dos)
    pub queue_capacity: usize,
    /// Plazo de cada espera del consumidor antes de sondear el canal de control
    pub poll_interval: Duration,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            schema: FrameSchema::default(),
            filter: FilterParams::default(),
            stabilizer: StabilizerParams::default(),
            queue_capacity: 2048,
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Callback síncrono invocado una vez por cada cambio de etiqueta estabilizada.
/// Es el punto de integración de los consumidores externos (GUI, actuación).
pub type OutputCallback = Box<dyn FnMut(&GestureLabel, f64) + Send>;

/// Conecta cola → filtro → clasificador → estabilizador → callback y es dueño
/// del único hilo consumidor. El productor publica con [`PipelineDriver::feed_line`].
pub struct PipelineDriver {
    queue: Arc<FrameQueue>,
    counters: Arc<Counters>,
    ctrl_tx: Sender<ShutdownMode>,
    consumer: Option<JoinHandle<()>>,
}

impl PipelineDriver {
    pub fn spawn(
        params: PipelineParams,
        classifier: Arc<dyn Classifier>,
        on_transition: OutputCallback,
    ) -> Result<Self, QueueError> {
        let queue = Arc::new(FrameQueue::with_capacity(params.queue_capacity)?);
        let counters = Arc::new(Counters::default());
        let (ctrl_tx, ctrl_rx) = bounded::<ShutdownMode>(1);

        let consumer = {
            let queue = Arc::clone(&queue);
            let counters = Arc::clone(&counters);
            std::thread::spawn(move || {
                consumer_loop(params, queue, ctrl_rx, counters, classifier, on_transition)
            })
        };

        Ok(Self {
            queue,
            counters,
            ctrl_tx,
            consumer: Some(consumer),
        })
    }

    /// Extremo productor: publica una línea delimitada tal como llega de la
    /// adquisición y devuelve su número de secuencia.
    pub fn feed_line(&self, line: &str) -> u64 {
        self.queue.push(line.to_string())
    }

    pub fn queue(&self) -> Arc<FrameQueue> {
        Arc::clone(&self.queue)
    }

    pub fn stats(&self) -> PipelineStats {
        let queue_stats = self.queue.stats();
        PipelineStats {
            frames_processed: self.counters.frames_processed.load(Ordering::Relaxed),
            samples_classified: self.counters.samples_classified.load(Ordering::Relaxed),
            schema_errors: self.counters.schema_errors.load(Ordering::Relaxed),
            frames_dropped: queue_stats.dropped,
            discarded_on_shutdown: self.counters.discarded_on_shutdown.load(Ordering::Relaxed),
            transitions: self.counters.transitions.load(Ordering::Relaxed),
            ordering_violations: self.counters.ordering_violations.load(Ordering::Relaxed),
        }
    }

    /// Señala el apagado, espera al consumidor y devuelve los contadores
    /// finales. Ninguna trama se procesa una vez reconocida la señal, salvo el
    /// drenaje explícito con [`ShutdownMode::Drain`].
    pub fn shutdown(mut self, mode: ShutdownMode) -> PipelineStats {
        let _ = self.ctrl_tx.send(mode);
        self.queue.close();
        if let Some(handle) = self.consumer.take() {
            let _ = handle.join();
        }
        self.stats()
    }
}

impl Drop for PipelineDriver {
    fn drop(&mut self) {
        // Apagado implícito si el dueño olvidó llamar a shutdown()
        let _ = self.ctrl_tx.send(ShutdownMode::Discard);
        self.queue.close();
        if let Some(handle) = self.consumer.take() {
            let _ = handle.join();
        }
    }
}

struct Consumer {
    filter: MovingAverageFilter,
    stabilizer: GestureStabilizer,
    classifier: Arc<dyn Classifier>,
    counters: Arc<Counters>,
    on_transition: OutputCallback,
    last_seq: Option<u64>,
}

impl Consumer {
    /// Un tick completo: filtro → clasificador → estabilizador → callback.
    /// Los errores por trama se absorben y contabilizan; nunca tumban el hilo.
    fn tick(&mut self, frame: RawFrame) {
        self.counters.frames_processed.fetch_add(1, Ordering::Relaxed);

        if let Some(last) = self.last_seq {
            if frame.seq <= last {
                self.counters
                    .ordering_violations
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
        self.last_seq = Some(frame.seq);

        match self.filter.ingest(&frame) {
            Ok(Some(sample)) => {
                let result = self.classifier.classify(&sample);
                self.counters
                    .samples_classified
                    .fetch_add(1, Ordering::Relaxed);

                if let Some(label) = self.stabilizer.observe(result.label) {
                    self.counters.transitions.fetch_add(1, Ordering::Relaxed);
                    (self.on_transition)(&label, result.score);
                }
            }
            Ok(None) => {}
            Err(err) => {
                self.counters.schema_errors.fetch_add(1, Ordering::Relaxed);
                eprintln!("⚠️  Trama descartada: {}", err);
            }
        }
    }

    fn finish(&mut self, mode: ShutdownMode, queue: &FrameQueue) {
        match mode {
            ShutdownMode::Drain => {
                while let Some(frame) = queue.pop() {
                    self.tick(frame);
                }
            }
            ShutdownMode::Discard => {
                self.counters
                    .discarded_on_shutdown
                    .fetch_add(queue.len() as u64, Ordering::Relaxed);
            }
        }
    }
}

fn consumer_loop(
    params: PipelineParams,
    queue: Arc<FrameQueue>,
    ctrl_rx: Receiver<ShutdownMode>,
    counters: Arc<Counters>,
    classifier: Arc<dyn Classifier>,
    on_transition: OutputCallback,
) {
    let mut consumer = Consumer {
        filter: MovingAverageFilter::new(params.schema, params.filter),
        stabilizer: GestureStabilizer::new(params.stabilizer),
        classifier,
        counters,
        on_transition,
        last_seq: None,
    };

    loop {
        // La señal de control tiene prioridad sobre las tramas pendientes
        match ctrl_rx.try_recv() {
            Ok(mode) => {
                consumer.finish(mode, &queue);
                return;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                consumer.finish(ShutdownMode::Discard, &queue);
                return;
            }
        }

        match queue.pop_blocking(params.poll_interval) {
            Ok(frame) => consumer.tick(frame),
            Err(QueueError::Timeout) => continue,
            Err(_) => {
                // Cola cerrada: aplicar la política pendiente si llegó a tiempo
                let mode = ctrl_rx.try_recv().unwrap_or(ShutdownMode::Drain);
                consumer.finish(mode, &queue);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture_classifier::{EuclideanClassifier, EuclideanParams};
    use crate::gesture_profile::{BinningParams, TrainingSet};
    use crossbeam_channel::unbounded;

    fn test_params() -> PipelineParams {
        PipelineParams {
            schema: FrameSchema::new(3, true),
            // Reescalado identidad para razonar en valores crudos
            filter: FilterParams {
                window_len: 2,
                offset: 0.0,
                span: 1.0,
                scale: 1.0,
            },
            stabilizer: StabilizerParams { history_len: 3 },
            queue_capacity: 64,
            poll_interval: Duration::from_millis(5),
        }
    }

    fn test_classifier() -> Arc<dyn Classifier> {
        let mut set = TrainingSet::new();
        set.add_sample("cerca", vec![0.0, 0.0]);
        set.add_sample("lejos", vec![100.0, 100.0]);

        let params = EuclideanParams {
            distance_threshold: 50.0,
            binning: BinningParams {
                enabled: false,
                ..BinningParams::default()
            },
        };
        Arc::new(EuclideanClassifier::train(&set, params).unwrap())
    }

    #[test]
    fn test_end_to_end_transition_reaches_callback() {
        let (event_tx, event_rx) = unbounded::<(GestureLabel, f64)>();
        let callback: OutputCallback = Box::new(move |label, score| {
            let _ = event_tx.send((label.clone(), score));
        });

        let driver = PipelineDriver::spawn(test_params(), test_classifier(), callback).unwrap();

        // 6 tramas cerca de (0,0): la primera emisión llega en la trama 2
        for i in 0..6 {
            driver.feed_line(&format!("{},0.5,0.5", i));
        }

        let stats = driver.shutdown(ShutdownMode::Drain);
        assert_eq!(stats.frames_processed, 6);
        assert_eq!(stats.samples_classified, 5);
        assert_eq!(stats.schema_errors, 0);
        assert_eq!(stats.ordering_violations, 0);

        let (label, score) = event_rx.try_recv().unwrap();
        assert_eq!(label, GestureLabel::known("cerca"));
        assert!(score < 2500.0);
        // Una sola transición: el resto de ticks repite la misma etiqueta
        assert!(event_rx.try_recv().is_err());
        assert_eq!(stats.transitions, 1);
    }

    #[test]
    fn test_malformed_frames_are_counted_not_fatal() {
        let callback: OutputCallback = Box::new(|_, _| {});
        let driver = PipelineDriver::spawn(test_params(), test_classifier(), callback).unwrap();

        driver.feed_line("0,0.5,0.5");
        driver.feed_line("no,es,numerico");
        driver.feed_line("1,0.5"); // aridad incorrecta
        driver.feed_line("2,0.5,0.5");

        let stats = driver.shutdown(ShutdownMode::Drain);
        assert_eq!(stats.frames_processed, 4);
        assert_eq!(stats.schema_errors, 2);
        // El consumidor siguió vivo tras los errores
        assert_eq!(stats.samples_classified, 0); // la ventana nunca se calentó del todo
    }

    #[test]
    fn test_discard_shutdown_accounts_for_every_frame() {
        let callback: OutputCallback = Box::new(|_, _| {});
        let driver = PipelineDriver::spawn(test_params(), test_classifier(), callback).unwrap();

        for i in 0..40 {
            driver.feed_line(&format!("{},0.5,0.5", i));
        }

        let stats = driver.shutdown(ShutdownMode::Discard);
        // Cada trama terminó procesada, descartada en el apagado o expulsada
        assert_eq!(
            stats.frames_processed + stats.discarded_on_shutdown + stats.frames_dropped,
            40
        );
    }

    #[test]
    fn test_fifo_order_is_preserved() {
        let callback: OutputCallback = Box::new(|_, _| {});
        let driver = PipelineDriver::spawn(test_params(), test_classifier(), callback).unwrap();

        for i in 0..200 {
            driver.feed_line(&format!("{},0.1,0.2", i));
        }

        let stats = driver.shutdown(ShutdownMode::Drain);
        assert_eq!(stats.ordering_violations, 0);
        assert_eq!(stats.frames_processed + stats.frames_dropped, 200);
    }
}
