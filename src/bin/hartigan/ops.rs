use std::fmt::{Debug, Display};
use std::fs::File;
use std::io::{stdout, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use ndarray::{Array2, Axis};
use num_traits::Float;
use thiserror::Error;

use hartigan::{Clustering, Outcome};

#[derive(Error, Debug)]
#[error("{message}")]
pub(crate) struct FileParseError {
    pub message: String,
}

impl FileParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Reads in a file formatted as (tab separated):
///     id1 val1 val2 val3
///     id2 val1 val2 val3
///
/// Provide as many ids and values as desired
/// All rows should be same length
/// Values should be floating-point decimal values
pub(crate) fn from_file<F>(p: PathBuf, d: &str) -> Result<(Array2<F>, Vec<String>), FileParseError>
where
    F: Float + Default + FromStr,
    <F as FromStr>::Err: Debug,
{
    let file = File::open(&p)
        .map_err(|e| FileParseError::new(format!("Unable to open {}: {}", p.display(), e)))?;
    let reader = BufReader::new(file);
    let mut labels = Vec::new();
    let mut data = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            FileParseError::new(format!("Error reading line {}: {}", idx + 1, e))
        })?;
        if !line.contains(d) {
            return Err(FileParseError::new(format!(
                "Line {} is not delimited by {:?}",
                idx + 1,
                d
            )));
        }
        let mut line = line.split(d);
        // ID as first col
        match line.next() {
            Some(l) => labels.push(l.to_string()),
            None => return Err(FileParseError::new("Error loading line label")),
        }
        let mut entry: Vec<F> = vec![];
        for s in line {
            match s.trim().parse::<F>() {
                Ok(v) => entry.push(v),
                Err(_) => {
                    return Err(FileParseError::new(format!(
                        "Error parsing file at line {}",
                        idx + 1
                    )))
                }
            }
        }
        // Rest are data
        data.push(entry);
    }
    if data.is_empty() {
        return Err(FileParseError::new("Data file is empty"));
    }
    let length = data[0].len();
    if data.iter().any(|v| v.len() != length) {
        return Err(FileParseError::new(
            "Input data rows must all be same length!",
        ));
    }
    // Convert data to Array2
    let mut out = Array2::<F>::default((data.len(), length));
    out.axis_iter_mut(Axis(0))
        .zip(data.iter())
        .for_each(|(mut row, entry)| {
            row.iter_mut().zip(entry).for_each(|(col, &v)| *col = v);
        });
    Ok((out, labels))
}

/// Deterministic starting partition: document `i` goes to cluster `i % k`.
pub(crate) fn round_robin(n: usize, k: usize) -> Vec<usize> {
    (0..n).map(|i| i % k).collect()
}

#[cfg(not(tarpaulin_include))]
pub(crate) fn display_results<F, L>(
    outcome: &Outcome,
    objective: F,
    clustering: &Clustering<F>,
    labels: &[L],
) -> std::io::Result<()>
where
    F: Float + Send + Sync + Display,
    L: Display + AsRef<[u8]>,
{
    let mut writer = BufWriter::new(stdout());
    // Output header
    writeln!(
        writer,
        "Stopped={} passes={} moves={} objective={} nClusters={} nSamples={}",
        outcome.reason,
        outcome.passes,
        outcome.moves,
        objective,
        clustering.k(),
        clustering.len()
    )?;
    for (idx, members) in clustering.members().iter().enumerate() {
        writeln!(writer, ">Cluster={} size={}", idx + 1, members.len())?;
        // Write cluster members
        let mut it = members.iter();
        if let Some(first) = it.next() {
            writer.write_all(labels[*first].as_ref())?;
        }
        for v in it {
            writer.write_all(b",")?;
            writer.write_all(labels[*v].as_ref())?;
        }
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use ndarray::arr2;
    use tempfile::NamedTempFile;

    use crate::ops::{from_file, round_robin};

    #[test]
    fn valid_load() {
        // Write tempdata
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id1\t1.0\t5.0\t1.0").unwrap();
        writeln!(file, "id2\t2.0\t4.0\t2.0").unwrap();
        writeln!(file, "id3\t3.0\t3.0\t3.0").unwrap();
        // Read into starting data
        let (data, labels) = from_file::<f32>(file.path().to_path_buf(), "\t").unwrap();
        assert_eq!(labels, vec!["id1", "id2", "id3"]);
        let expected = arr2(&[[1., 5., 1.], [2., 4., 2.], [3., 3., 3.]]);
        assert_eq!(data, expected);
    }

    #[test]
    fn invalid_load_empty_file() {
        let file = NamedTempFile::new().unwrap();
        assert!(from_file::<f32>(file.path().to_path_buf(), "\t").is_err());
    }

    #[test]
    fn invalid_load_mismatched_data() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id1\t1.0\t5.0\t1.0").unwrap();
        writeln!(file, "id2\t2.0\t4.0").unwrap();
        let err = from_file::<f32>(file.path().to_path_buf(), "\t").unwrap_err();
        assert_eq!(err.message, "Input data rows must all be same length!");
    }

    #[test]
    fn invalid_load_invalid_data() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id1\t1.0\t5.0\t1.0").unwrap();
        writeln!(file, "id2\ta\tb\tc").unwrap();
        let err = from_file::<f64>(file.path().to_path_buf(), "\t").unwrap_err();
        assert_eq!(err.message, "Error parsing file at line 2");
    }

    #[test]
    fn invalid_file_format() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id1 1.0 5.0 1.0").unwrap();
        assert!(from_file::<f32>(file.path().to_path_buf(), "\t").is_err());
    }

    #[test]
    fn round_robin_uses_every_cluster() {
        assert_eq!(round_robin(5, 2), vec![0, 1, 0, 1, 0]);
    }
}
