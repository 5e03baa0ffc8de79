//! Keeps the calibrated frames of a session and writes them out as a plain
//! text matrix when the session ends normally.
//!
//! Each row is one tick that had a frame: all 30 calibrated values in
//! row-major (group, chip, axis) order, space separated.

use crate::sensor_frame::{CalibratedFrame, FRAME_LEN};

use log::info;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Calibrated frames collected over a session.
#[derive(Debug, Clone)]
pub struct Recorder {
    path: PathBuf,
    rows: Vec<[f64; FRAME_LEN]>,
}

impl Recorder {
    /// A recorder that will write to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Vec::new(),
        }
    }

    /// Append one frame.
    pub fn add(&mut self, frame: &CalibratedFrame) {
        let mut row = [0.0; FRAME_LEN];
        for (slot, value) in row.iter_mut().zip(frame.frame().values()) {
            *slot = value;
        }
        self.rows.push(row);
    }

    /// Rows recorded so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Where the recording goes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every row to `writer`.
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        for row in &self.rows {
            let line: Vec<String> = row.iter().map(|v| format!("{:.18e}", v)).collect();
            writeln!(writer, "{}", line.join(" "))?;
        }
        writer.flush()
    }

    /// Write the recording to its path.
    pub fn save(&self) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        self.write_to(&mut writer)?;
        info!("Wrote {} rows to {}", self.rows.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor_frame::SensorFrame;
    use std::fs;

    fn calibrated(first: f64) -> CalibratedFrame {
        let mut values = [0.0; FRAME_LEN];
        values[0] = first;
        values[FRAME_LEN - 1] = -first;
        CalibratedFrame::new(SensorFrame::from_row_major(&values).unwrap())
    }

    #[test]
    fn one_row_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(dir.path().join("session.txt"));
        recorder.add(&calibrated(1.5));
        recorder.add(&calibrated(-2.0));
        recorder.save().unwrap();

        let text = fs::read_to_string(recorder.path()).unwrap();
        let rows: Vec<Vec<f64>> = text
            .lines()
            .map(|l| l.split(' ').map(|v| v.parse().unwrap()).collect())
            .collect();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == FRAME_LEN));
        assert_eq!(rows[0][0], 1.5);
        assert_eq!(rows[1][FRAME_LEN - 1], 2.0);
    }

    #[test]
    fn empty_sessions_write_an_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(dir.path().join("empty.txt"));
        assert!(recorder.is_empty());
        recorder.save().unwrap();
        assert_eq!(fs::read_to_string(recorder.path()).unwrap(), "");
    }
}
