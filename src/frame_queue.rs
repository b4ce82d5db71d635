use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::types::RawFrame;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("Timed out waiting for a frame")]
    Timeout,

    #[error("Queue is closed")]
    Closed,

    #[error("Capacity must be a nonzero power of two, got {0}")]
    BadCapacity(usize),
}

/// Contadores de publicación de la cola.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub pushed: u64,
    pub dropped: u64,
}

struct Inner {
    ring: VecDeque<RawFrame>,
    closed: bool,
}

/// Cola acotada entre la adquisición y el hilo de procesamiento.
///
/// Contrato SPSC: exactamente un productor y un consumidor; no es segura para
/// varios productores o consumidores sin sincronización adicional. Cada trama
/// publicada recibe un número de secuencia monótono creciente y se entrega a
/// lo sumo una vez, en orden FIFO estricto.
///
/// Política de desborde: con la cola llena, `push` descarta la trama más
/// antigua sin consumir y contabiliza el descarte; la adquisición nunca se
/// bloquea. `try_push` es la variante que falla rápido.
pub struct FrameQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    capacity: usize,
    next_seq: AtomicU64,
    pushed: AtomicU64,
    dropped: AtomicU64,
}

impl FrameQueue {
    /// Crea la cola con capacidad fija. La capacidad debe ser potencia de dos.
    pub fn with_capacity(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(QueueError::BadCapacity(capacity));
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                ring: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
            next_seq: AtomicU64::new(0),
            pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    /// Publica una trama y devuelve su número de secuencia. Si la cola está
    /// llena se descarta la trama más antigua y se incrementa `dropped`.
    pub fn push(&self, data: String) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.ring.len() == self.capacity {
                inner.ring.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            inner.ring.push_back(RawFrame { seq, data });
        }
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.not_empty.notify_one();
        seq
    }

    /// Variante de publicación que falla rápido con la cola llena en lugar de
    /// descartar.
    pub fn try_push(&self, data: String) -> Result<u64, QueueError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.ring.len() == self.capacity {
            return Err(QueueError::Full {
                capacity: self.capacity,
            });
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        inner.ring.push_back(RawFrame { seq, data });
        drop(inner);
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.not_empty.notify_one();
        Ok(seq)
    }

    /// Extrae la siguiente trama sin bloquear.
    pub fn pop(&self) -> Option<RawFrame> {
        self.inner.lock().unwrap().ring.pop_front()
    }

    /// Extrae la siguiente trama, suspendiendo al consumidor hasta que llegue
    /// una, venza el plazo o la cola se cierre estando vacía.
    pub fn pop_blocking(&self, timeout: Duration) -> Result<RawFrame, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap();

        loop {
            if let Some(frame) = inner.ring.pop_front() {
                return Ok(frame);
            }
            if inner.closed {
                return Err(QueueError::Closed);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(QueueError::Timeout);
            }

            let (guard, _wait) = self.not_empty.wait_timeout(inner, remaining).unwrap();
            inner = guard;
        }
    }

    /// Cierra la cola y despierta al consumidor. Las tramas ya publicadas
    /// siguen siendo extraíbles; después `pop_blocking` devuelve `Closed`.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.not_empty.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
