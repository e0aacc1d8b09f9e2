//! Shared test doubles for the integration tests.

use std::cell::Cell;

use ndarray::{Array1, Array2};
use pixant_core::{FieldOracle, FieldSeries, ForwardFields, PowerSeries, SeriesError, Waveform};

/// An oracle whose conductivity gradient is the same in every cell.
///
/// Forward runs receive a unit field (negated on every other call when
/// `flip` is set) and a feed power of `2`. Backward runs return
/// `-magnitude`, so the gradient is `±magnitude`.
pub struct UniformOracle {
    pub cells: usize,
    pub magnitude: f64,
    pub flip: bool,
    pub forward_calls: Cell<usize>,
}

impl UniformOracle {
    #[must_use]
    pub fn steady(cells: usize, magnitude: f64) -> Self {
        Self {
            cells,
            magnitude,
            flip: false,
            forward_calls: Cell::new(0),
        }
    }

    #[must_use]
    pub fn flipping(cells: usize, magnitude: f64) -> Self {
        Self {
            flip: true,
            ..Self::steady(cells, magnitude)
        }
    }
}

impl FieldOracle for UniformOracle {
    type Error = SeriesError;

    fn simulate_forward(
        &self,
        _conductivity: &Array1<f64>,
        _excitation: Option<&Waveform>,
    ) -> Result<ForwardFields, SeriesError> {
        let call = self.forward_calls.get();
        self.forward_calls.set(call + 1);

        let sign = if self.flip && call % 2 == 1 { -1.0 } else { 1.0 };
        Ok(ForwardFields {
            received: FieldSeries::new(0.1, Array2::from_elem((1, self.cells), sign))?,
            feed_power: PowerSeries::new(0.1, Array1::from_elem(1, 2.0))?,
        })
    }

    fn simulate_backward(
        &self,
        _conductivity: &Array1<f64>,
        _excitation: &Waveform,
    ) -> Result<FieldSeries, SeriesError> {
        FieldSeries::new(0.1, Array2::from_elem((1, self.cells), -self.magnitude))
    }
}

/// A shell simulator for a grid of `cells` cells that exports a uniform
/// received field of `1`, a feed power of `2`, and an excited field of
/// `excited` at every sample of the time axis it is given. Each invocation
/// appends its direction to `calls.log`.
#[must_use]
pub fn uniform_simulator_script(cells: usize, excited: f64) -> String {
    format!(
        r#"#!/bin/sh
set -e
dir="$2"
samples=$(awk "BEGIN {{ print int($4 / $3 + 1e-9) + 1 }}")
echo "$1" >> "$dir/calls.log"
records() {{
  i=0
  while [ $i -lt {cells} ]; do
    echo "0 0 0 $1 0 0"
    i=$((i + 1))
  done
}}
export_field() {{
  printf 'x y z Ex Ey Ez\n---\n'
  k=0
  while [ $k -lt $samples ]; do
    echo "Sample $k"
    records "$1"
    k=$((k + 1))
  done
}}
export_power() {{
  printf 'x y z Px Py Pz\n---\n'
  k=0
  while [ $k -lt $samples ]; do
    echo "Sample $k"
    echo "0 0 0 2 0 0"
    k=$((k + 1))
  done
}}
case "$1" in
  forward)
    export_field 1 > "$dir/E_received.txt"
    export_power > "$dir/power.txt"
    ;;
  backward)
    export_field {excited} > "$dir/E_excited.txt"
    ;;
esac
"#
    )
}
