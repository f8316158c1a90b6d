use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use prodplan_model::{MarketTable, ScenarioTables, TimeTable};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const TIME_FILE: &str = "time.json";
pub const DEMAND_FILE: &str = "demands.json";
pub const PROFIT_FILE: &str = "profits.json";

#[derive(Error, Debug)]
pub enum IoError {
    #[error("Error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Error parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn read_json<T: DeserializeOwned>(path: PathBuf) -> Result<T, IoError> {
    let source = fs::read_to_string(&path).map_err(|source| IoError::Read {
        path: path.clone(),
        source,
    })?;
    debug!("read {} bytes from {}", source.len(), path.display());
    serde_json::from_str(&source).map_err(|source| IoError::Parse { path, source })
}

/// Load the time, demand and profit tables from `dir`
pub fn load_tables(dir: &Path) -> Result<ScenarioTables, IoError> {
    let time: TimeTable = read_json(dir.join(TIME_FILE))?;
    let demand: MarketTable = read_json(dir.join(DEMAND_FILE))?;
    let profit: MarketTable = read_json(dir.join(PROFIT_FILE))?;
    Ok(ScenarioTables { time, demand, profit })
}

/// Write a solved allocation as `<dir>/<name>_output.json`
pub fn write_output(dir: &Path, name: &str, table: &MarketTable) -> Result<PathBuf, IoError> {
    let path = dir.join(format!("{}_output.json", name));
    let write_err = |source: std::io::Error| IoError::Write {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(dir).map_err(write_err)?;
    let json = serde_json::to_string_pretty(table).map_err(|e| write_err(e.into()))?;
    fs::write(&path, json).map_err(write_err)?;
    Ok(path)
}

/// Write a text report, truncating the file or appending to it
pub fn write_report(path: &Path, text: &str, append: bool) -> Result<(), IoError> {
    let write_err = |source: std::io::Error| IoError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(write_err)?;
    file.write_all(text.as_bytes()).map_err(write_err)
}
