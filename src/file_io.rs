//! Native file ingestion: CSV rows and ASCII STL triangles.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileIoError {
    #[error("cannot open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("{path}: binary STL is not supported")]
    BinaryStl { path: PathBuf },
    #[error("{path}: malformed STL: {reason}")]
    MalformedStl { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

pub type Triangle = [Vec3; 3];

fn open(path: &Path) -> Result<File, FileIoError> {
    File::open(path).map_err(|source| FileIoError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a CSV file into rows of cells.
///
/// Commas inside double quotes do not split cells. Quote characters only
/// toggle quoting and are dropped from the cell. Cells that are not valid
/// UTF-8 are decoded lossily.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<Vec<String>>, FileIoError> {
    let path = path.as_ref();
    let mut reader = BufReader::new(open(path)?);

    let mut rows = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|source| FileIoError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if read == 0 {
            break;
        }
        let bytes = line.strip_suffix(b"\n").unwrap_or(&line[..]);
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        rows.push(parse_csv_line(bytes));
    }
    tracing::debug!(path = %path.display(), rows = rows.len(), "read CSV");
    Ok(rows)
}

fn parse_csv_line(line: &[u8]) -> Vec<String> {
    let to_cell = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();

    let mut row = Vec::new();
    let mut cell = Vec::new();
    let mut in_quotes = false;

    for &byte in line {
        match byte {
            b'"' => in_quotes = !in_quotes,
            b',' if !in_quotes => {
                row.push(to_cell(&cell));
                cell.clear();
            }
            byte => cell.push(byte),
        }
    }
    row.push(to_cell(&cell));
    row
}

/// Reads the triangles of an ASCII STL file.
pub fn read_stl(path: impl AsRef<Path>) -> Result<Vec<Triangle>, FileIoError> {
    let path = path.as_ref();
    let mut content = String::new();
    open(path)?
        .read_to_string(&mut content)
        .map_err(|source| match source.kind() {
            // binary STL is rarely valid UTF-8
            io::ErrorKind::InvalidData => FileIoError::BinaryStl {
                path: path.to_path_buf(),
            },
            _ => FileIoError::Read {
                path: path.to_path_buf(),
                source,
            },
        })?;

    if !content.starts_with("solid") {
        return Err(FileIoError::BinaryStl {
            path: path.to_path_buf(),
        });
    }

    let malformed = |reason: String| FileIoError::MalformedStl {
        path: path.to_path_buf(),
        reason,
    };

    let mut vertices = Vec::new();
    let mut tokens = content.split_whitespace();
    while let Some(token) = tokens.next() {
        if token != "vertex" {
            continue;
        }
        let mut coord = || -> Result<f64, FileIoError> {
            let raw = tokens
                .next()
                .ok_or_else(|| malformed("vertex with missing coordinates".into()))?;
            raw.parse()
                .map_err(|_| malformed(format!("invalid coordinate '{raw}'")))
        };
        let x = coord()?;
        let y = coord()?;
        let z = coord()?;
        vertices.push(Vec3 { x, y, z });
    }

    if vertices.len() % 3 != 0 {
        return Err(malformed(format!(
            "{} vertices do not form whole triangles",
            vertices.len()
        )));
    }

    let triangles = vertices
        .chunks_exact(3)
        .map(|v| [v[0], v[1], v[2]])
        .collect::<Vec<Triangle>>();
    tracing::debug!(path = %path.display(), triangles = triangles.len(), "read STL");
    Ok(triangles)
}
