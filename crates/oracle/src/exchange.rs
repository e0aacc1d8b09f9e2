use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use ndarray::Array1;
use pixant_core::{
    FieldOracle, FieldSeries, ForwardFields, GridSpec, PowerSeries, ShapeError, Waveform,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    Sampling,
    codec::{self, DecodeError},
};

/// Which simulation the external command should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Plane wave incident on the structure; exports the received field and
    /// the feed power.
    Forward,

    /// Excitation at the feed; exports the excited field.
    Backward,
}

impl Direction {
    /// The argument passed to the simulator command.
    #[must_use]
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Files in the exchange directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeFile {
    /// Conductivity layout, written before every run.
    Conductivity,

    /// Plane wave signal for a forward run; absent for the default signal.
    Excitation,

    /// Time-reversed feed power for a backward run.
    ReversedPower,

    /// Field received over the grid, exported by a forward run.
    ReceivedField,

    /// Feed power, exported by a forward run.
    FeedPower,

    /// Field over the grid, exported by a backward run.
    ExcitedField,
}

impl ExchangeFile {
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Conductivity => "conductivity.txt",
            Self::Excitation => "excitation.txt",
            Self::ReversedPower => "reversed_power.txt",
            Self::ReceivedField => "E_received.txt",
            Self::FeedPower => "power.txt",
            Self::ExcitedField => "E_excited.txt",
        }
    }

    #[must_use]
    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

/// Errors that can occur during an exchange run.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("exchange file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch simulator {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{direction} simulation failed ({status}): {stderr}")]
    SimulationFailed {
        direction: Direction,
        status: ExitStatus,
        stderr: String,
    },

    #[error("could not decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("{path} has {actual} samples but the sampling calls for {expected}")]
    SampleCount {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl ExchangeError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A field oracle backed by an external simulator command.
///
/// Each run removes the previous run's exports, writes its inputs into the
/// exchange directory, invokes
/// `program [args...] <forward|backward> <dir> <time_step> <time_end>`, and
/// decodes the exports the command leaves behind. A non-zero exit status, a
/// missing export, or an export with the wrong number of samples is an error.
#[derive(Debug, Clone)]
pub struct ExchangeOracle {
    program: PathBuf,
    args: Vec<String>,
    dir: PathBuf,
    grid: GridSpec,
    sampling: Sampling,
}

impl ExchangeOracle {
    /// Creates an oracle that runs `program` against `dir`, asking for
    /// exports on `sampling`.
    pub fn new(
        program: impl Into<PathBuf>,
        dir: impl Into<PathBuf>,
        grid: GridSpec,
        sampling: Sampling,
    ) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: dir.into(),
            grid,
            sampling,
        }
    }

    /// Adds arguments passed before the direction.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    fn write(&self, file: ExchangeFile, contents: &str) -> Result<(), ExchangeError> {
        let path = file.path_in(&self.dir);
        fs::write(&path, contents).map_err(|e| ExchangeError::io(&path, e))
    }

    fn remove(&self, file: ExchangeFile) -> Result<(), ExchangeError> {
        let path = file.path_in(&self.dir);
        match fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(ExchangeError::io(&path, e)),
            _ => Ok(()),
        }
    }

    fn read(&self, file: ExchangeFile) -> Result<(PathBuf, String), ExchangeError> {
        let path = file.path_in(&self.dir);
        let text = fs::read_to_string(&path).map_err(|e| ExchangeError::io(&path, e))?;
        Ok((path, text))
    }

    fn write_conductivity(&self, conductivity: &Array1<f64>) -> Result<(), ExchangeError> {
        let text = codec::encode_conductivity(&self.grid, conductivity)?;
        self.write(ExchangeFile::Conductivity, &text)
    }

    fn check_samples(&self, path: PathBuf, actual: usize) -> Result<(), ExchangeError> {
        let expected = self.sampling.samples();
        if actual == expected {
            Ok(())
        } else {
            Err(ExchangeError::SampleCount {
                path,
                expected,
                actual,
            })
        }
    }

    fn read_field(&self, file: ExchangeFile) -> Result<FieldSeries, ExchangeError> {
        let (path, text) = self.read(file)?;
        let field = codec::decode_field(&text, self.sampling.time_step()).map_err(|source| {
            ExchangeError::Decode {
                path: path.clone(),
                source,
            }
        })?;
        self.grid.check("exported field", field.cells())?;
        self.check_samples(path, field.samples())?;
        Ok(field)
    }

    fn read_power(&self) -> Result<PowerSeries, ExchangeError> {
        let (path, text) = self.read(ExchangeFile::FeedPower)?;
        let power = codec::decode_power(&text, self.sampling.time_step()).map_err(|source| {
            ExchangeError::Decode {
                path: path.clone(),
                source,
            }
        })?;
        self.check_samples(path, power.values().len())?;
        Ok(power)
    }

    fn run(&self, direction: Direction) -> Result<(), ExchangeError> {
        debug!(
            program = %self.program.display(),
            dir = %self.dir.display(),
            %direction,
            "running simulator"
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(direction.as_arg())
            .arg(&self.dir)
            .arg(self.sampling.time_step().to_string())
            .arg(self.sampling.time_end().to_string())
            .output()
            .map_err(|source| ExchangeError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(%direction, status = %output.status, "simulator failed");
            Err(ExchangeError::SimulationFailed {
                direction,
                status: output.status,
                stderr,
            })
        }
    }
}

impl FieldOracle for ExchangeOracle {
    type Error = ExchangeError;

    fn simulate_forward(
        &self,
        conductivity: &Array1<f64>,
        excitation: Option<&Waveform>,
    ) -> Result<ForwardFields, ExchangeError> {
        self.write_conductivity(conductivity)?;
        match excitation {
            Some(waveform) => {
                self.write(ExchangeFile::Excitation, &codec::encode_waveform(waveform))?;
            }
            None => self.remove(ExchangeFile::Excitation)?,
        }
        self.remove(ExchangeFile::ReceivedField)?;
        self.remove(ExchangeFile::FeedPower)?;

        self.run(Direction::Forward)?;

        Ok(ForwardFields {
            received: self.read_field(ExchangeFile::ReceivedField)?,
            feed_power: self.read_power()?,
        })
    }

    fn simulate_backward(
        &self,
        conductivity: &Array1<f64>,
        excitation: &Waveform,
    ) -> Result<FieldSeries, ExchangeError> {
        self.write_conductivity(conductivity)?;
        self.write(ExchangeFile::ReversedPower, &codec::encode_waveform(excitation))?;
        self.remove(ExchangeFile::ExcitedField)?;

        self.run(Direction::Backward)?;

        self.read_field(ExchangeFile::ExcitedField)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use ndarray::array;
    use tempfile::TempDir;

    const SCRIPT: &str = r#"#!/bin/sh
set -e
dir="$2"
case "$1" in
  forward)
    test -f "$dir/conductivity.txt"
    if [ -f "$dir/excitation.txt" ]; then px=1.5; else px=0.5; fi
    printf 'x y z Ex Ey Ez\n---\nSample 0\n0 0 0 3 4 0\n6 0 0 -1 0 0\nSample 1\n0 0 0 0 0 0\n6 0 0 0 0 0\n' > "$dir/E_received.txt"
    printf 'x y z Px Py Pz\n---\nSample 0\n0 0 0 %s 0 0\nSample 1\n0 0 0 0 0 0\n' "$px" > "$dir/power.txt"
    ;;
  backward)
    test -f "$dir/reversed_power.txt"
    printf 'x y z Ex Ey Ez\n---\nSample 0\n0 0 0 0 1 0\n6 0 0 2 0 0\nSample 1\n0 0 0 1 0 0\n6 0 0 0 0 0\n' > "$dir/E_excited.txt"
    ;;
  *)
    echo "unknown direction $1" >&2
    exit 2
    ;;
esac
"#;

    fn grid() -> GridSpec {
        GridSpec::from_millimeters(12.0, 6.0, 6.0).unwrap()
    }

    fn sampling() -> Sampling {
        Sampling::new(0.1, 0.1).unwrap()
    }

    fn is_missing(err: &ExchangeError, file: &str) -> bool {
        matches!(err, ExchangeError::Io { path, .. } if path.ends_with(file))
    }

    fn oracle_with(script: &str) -> (TempDir, ExchangeOracle) {
        let dir = TempDir::new().unwrap();
        let script_path = dir.path().join("simulate.sh");
        fs::write(&script_path, script).unwrap();
        let oracle = ExchangeOracle::new("sh", dir.path(), grid(), sampling())
            .with_args([script_path.display().to_string()]);
        (dir, oracle)
    }

    #[test]
    fn forward_run_writes_inputs_and_decodes_exports() {
        let (dir, oracle) = oracle_with(SCRIPT);

        let fields = oracle.simulate_forward(&array![100.0, 5.8e7], None).unwrap();

        assert_eq!(fields.received.values(), &array![[5.0, -1.0], [0.0, 0.0]]);
        assert_relative_eq!(fields.feed_power.values()[0], 0.5);

        let layout = fs::read_to_string(dir.path().join("conductivity.txt")).unwrap();
        assert!(layout.contains("\"Lossy metal\""));
        assert!(!dir.path().join("excitation.txt").exists());
    }

    #[test]
    fn forward_run_passes_excitation_and_clears_it_afterwards() {
        let (dir, oracle) = oracle_with(SCRIPT);
        let wave = Waveform::new(array![0.0, 0.1], array![0.0, 1.0]).unwrap();

        let fields = oracle
            .simulate_forward(&array![1.0, 1.0], Some(&wave))
            .unwrap();
        assert_relative_eq!(fields.feed_power.values()[0], 1.5);
        let written = fs::read_to_string(dir.path().join("excitation.txt")).unwrap();
        assert_eq!(codec::decode_waveform(&written).unwrap(), wave);

        let fields = oracle.simulate_forward(&array![1.0, 1.0], None).unwrap();
        assert_relative_eq!(fields.feed_power.values()[0], 0.5);
    }

    #[test]
    fn backward_run_decodes_excited_field() {
        let (dir, oracle) = oracle_with(SCRIPT);
        let wave = Waveform::new(array![0.0, 0.1], array![2.0, 0.5]).unwrap();

        let field = oracle.simulate_backward(&array![1.0, 1.0], &wave).unwrap();

        assert_eq!(field.values(), &array![[0.0, 2.0], [1.0, 0.0]]);
        assert!(dir.path().join("reversed_power.txt").exists());
    }

    #[test]
    fn simulator_receives_direction_and_time_axis() {
        let script = r#"echo "$@" > "$2/args.txt"
exit 0
"#;
        let (dir, oracle) = oracle_with(script);
        let oracle = ExchangeOracle {
            sampling: Sampling::new(0.05, 2.5).unwrap(),
            ..oracle
        };

        let _ = oracle.simulate_forward(&array![1.0, 1.0], None);

        let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
        let expected = format!("forward {} 0.05 2.5", dir.path().display());
        assert_eq!(args.trim(), expected);
    }

    #[test]
    fn failing_simulator_is_an_error() {
        let (_dir, oracle) = oracle_with("echo 'license server down' >&2\nexit 3\n");

        let err = oracle.simulate_forward(&array![1.0, 1.0], None).unwrap_err();

        match err {
            ExchangeError::SimulationFailed {
                direction, stderr, ..
            } => {
                assert_eq!(direction, Direction::Forward);
                assert_eq!(stderr, "license server down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_export_is_an_error() {
        let (_dir, oracle) = oracle_with("exit 0\n");

        let err = oracle.simulate_forward(&array![1.0, 1.0], None).unwrap_err();

        assert!(is_missing(&err, "E_received.txt"));
    }

    #[test]
    fn exports_from_an_earlier_run_are_not_reused() {
        // Exports only on the first call in each direction.
        let script = format!("[ -f \"$2/ran-$1\" ] && exit 0\ntouch \"$2/ran-$1\"\n{SCRIPT}");
        let (_dir, oracle) = oracle_with(&script);
        let wave = Waveform::new(array![0.0, 0.1], array![2.0, 0.5]).unwrap();

        oracle.simulate_forward(&array![1.0, 1.0], None).unwrap();
        oracle.simulate_backward(&array![1.0, 1.0], &wave).unwrap();

        let err = oracle.simulate_forward(&array![1.0, 1.0], None).unwrap_err();
        assert!(is_missing(&err, "E_received.txt"));

        let err = oracle.simulate_backward(&array![1.0, 1.0], &wave).unwrap_err();
        assert!(is_missing(&err, "E_excited.txt"));
    }

    #[test]
    fn export_with_wrong_sample_count_is_an_error() {
        let (_dir, oracle) = oracle_with(SCRIPT);
        let oracle = ExchangeOracle {
            sampling: Sampling::new(0.1, 0.3).unwrap(),
            ..oracle
        };

        let err = oracle.simulate_forward(&array![1.0, 1.0], None).unwrap_err();

        match err {
            ExchangeError::SampleCount {
                path,
                expected,
                actual,
            } => {
                assert!(path.ends_with("E_received.txt"));
                assert_eq!(expected, 4);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn export_for_another_grid_is_an_error() {
        let (_dir, oracle) = oracle_with(SCRIPT);
        let oracle = ExchangeOracle {
            grid: GridSpec::from_millimeters(18.0, 6.0, 6.0).unwrap(),
            ..oracle
        };

        let err = oracle.simulate_forward(&array![1.0, 1.0, 1.0], None).unwrap_err();

        assert!(matches!(err, ExchangeError::Shape(_)));
    }

    #[test]
    fn unknown_program_fails_to_launch() {
        let dir = TempDir::new().unwrap();
        let oracle = ExchangeOracle::new("/nonexistent/simulator", dir.path(), grid(), sampling());

        let err = oracle.simulate_forward(&array![1.0, 1.0], None).unwrap_err();

        assert!(matches!(err, ExchangeError::Launch { .. }));
    }

    #[test]
    fn conductivity_must_match_grid() {
        let (_dir, oracle) = oracle_with(SCRIPT);

        let err = oracle.simulate_forward(&array![1.0], None).unwrap_err();

        assert!(matches!(err, ExchangeError::Shape(_)));
    }
}
