//! Per-run metric logs
//!
//! Each run writes two append-only comma-separated text files:
//! * `<run>.txt` - `iteration_index,expert_reward_mean,policy_surrogate_loss,discriminator_loss`
//! * `<run>_eval.txt` - `iteration_index,mean_eval_return`
//!
//! A missing value is written as an empty field.
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error creating or writing a run log.
#[derive(Error, Debug)]
pub enum RunLogError {
    #[error("failed to create log directory {}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to open log file {}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to write log file {}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Line-buffered CSV file, flushed after every line.
#[derive(Debug)]
struct CsvFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvFile {
    fn create(path: PathBuf) -> Result<Self, RunLogError> {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Ok(Self {
                path,
                writer: BufWriter::new(file),
            }),
            Err(source) => Err(RunLogError::Open { path, source }),
        }
    }

    fn write_line(&mut self, fields: &[String]) -> Result<(), RunLogError> {
        writeln!(self.writer, "{}", fields.join(","))
            .and_then(|_| self.writer.flush())
            .map_err(|source| RunLogError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// Metric log files of a single training run.
#[derive(Debug)]
pub struct RunLog {
    iterations: CsvFile,
    evaluations: CsvFile,
}

impl RunLog {
    /// Create `dir` if needed and open `<run_name>.txt` and `<run_name>_eval.txt` inside it.
    pub fn create<P: AsRef<Path>>(dir: P, run_name: &str) -> Result<Self, RunLogError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| RunLogError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            iterations: CsvFile::create(dir.join(format!("{}.txt", run_name)))?,
            evaluations: CsvFile::create(dir.join(format!("{}_eval.txt", run_name)))?,
        })
    }

    pub fn iterations_path(&self) -> &Path {
        &self.iterations.path
    }

    pub fn evaluations_path(&self) -> &Path {
        &self.evaluations.path
    }

    /// Append the metrics of a training iteration.
    pub fn log_iteration(
        &mut self,
        iteration: u64,
        expert_reward_mean: Option<f64>,
        surrogate_loss: f64,
        discriminator_loss: f64,
    ) -> Result<(), RunLogError> {
        self.iterations.write_line(&[
            iteration.to_string(),
            expert_reward_mean.map_or_else(String::new, |r| r.to_string()),
            surrogate_loss.to_string(),
            discriminator_loss.to_string(),
        ])
    }

    /// Append an evaluation result.
    pub fn log_eval(&mut self, iteration: u64, mean_return: f64) -> Result<(), RunLogError> {
        self.evaluations
            .write_line(&[iteration.to_string(), mean_return.to_string()])
    }
}
