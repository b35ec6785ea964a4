use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::{Array4, ArrayView4, CowArray, IxDyn};

/// Counts tensors that have been created and not yet dropped.
///
/// Tensors are the only per-tick allocation of any size, so a ledger reading
/// of zero between ticks means nothing leaked.
#[derive(Debug, Clone, Default)]
pub struct TensorLedger {
    live: Arc<AtomicUsize>,
}

impl TensorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

/// Model input in NHWC layout with a batch of one: `[1, height, width, channels]`.
#[derive(Debug)]
pub struct Tensor {
    data: Array4<f32>,
    ledger: TensorLedger,
}

impl Tensor {
    pub fn new(data: Array4<f32>, ledger: &TensorLedger) -> Self {
        ledger.live.fetch_add(1, Ordering::AcqRel);
        Self {
            data,
            ledger: ledger.clone(),
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        let dim = self.data.dim();
        [dim.0, dim.1, dim.2, dim.3]
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn as_cow_dyn(&self) -> CowArray<'_, f32, IxDyn> {
        CowArray::from(self.data.view().into_dyn())
    }
}

impl Drop for Tensor {
    fn drop(&mut self) {
        self.ledger.live.fetch_sub(1, Ordering::AcqRel);
    }
}
