//! Mesh output files
//!
//! All output directories and writers of a run form one resource group,
//! [`OutputSet`]. Files are written into hidden staging directories and only
//! moved into place by [`OutputSet::commit`]. Dropping an uncommitted set
//! (error, interrupt) closes every writer and deletes the staging
//! directories, so an aborted run leaves nothing behind.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ExportConfig;
use crate::error::Result;
use crate::geodesy::VertexRecord;

/// Anything that accepts vertex records, one per line
pub trait VertexSink {
    fn write_vertex(&mut self, record: &VertexRecord) -> io::Result<()>;
}

impl<W: Write> VertexSink for W {
    fn write_vertex(&mut self, record: &VertexRecord) -> io::Result<()> {
        writeln!(self, "{}", record)
    }
}

/// Final locations of one factor's output pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputFiles {
    pub factor: u32,
    pub geoid: PathBuf,
    pub topo: PathBuf,
}

/// The two open writers of one exaggeration factor
pub struct FactorOutputs {
    pub factor: u32,
    pub geoid: BufWriter<File>,
    pub topo: BufWriter<File>,
    files: OutputFiles,
}

impl FactorOutputs {
    pub fn flush(&mut self) -> io::Result<()> {
        self.geoid.flush()?;
        self.topo.flush()
    }
}

#[derive(Debug)]
struct StagedDir {
    staging: PathBuf,
    target: PathBuf,
}

/// How a staged directory reached its target
#[derive(Debug)]
enum Published {
    /// The staging directory itself was renamed
    Whole,
    /// Files moved into a pre-existing target
    Files(Vec<PathBuf>),
}

impl StagedDir {
    fn create(root: &Path, name: &str) -> io::Result<Self> {
        let staging = root.join(format!(".{}.partial-{}", name, uuid::Uuid::new_v4()));
        fs::create_dir(&staging)?;
        Ok(Self {
            staging,
            target: root.join(name),
        })
    }

    /// Move the staged files into the target directory
    fn publish(&self) -> io::Result<Published> {
        if !self.target.exists() {
            fs::rename(&self.staging, &self.target)?;
            return Ok(Published::Whole);
        }

        // Target left over from an earlier run: replace file by file
        let mut moved = Vec::new();
        for entry in fs::read_dir(&self.staging)? {
            let entry = entry?;
            let dest = self.target.join(entry.file_name());
            if dest.exists() {
                fs::remove_file(&dest)?;
            }
            fs::rename(entry.path(), &dest)?;
            moved.push(dest);
        }
        fs::remove_dir(&self.staging)?;
        Ok(Published::Files(moved))
    }

    /// Take back what `publish` put in place
    fn unpublish(&self, published: &Published) -> io::Result<()> {
        match published {
            Published::Whole => fs::remove_dir_all(&self.target),
            Published::Files(files) => {
                for file in files {
                    fs::remove_file(file)?;
                }
                Ok(())
            }
        }
    }
}

/// Staged output directories plus one writer pair per factor
pub struct OutputSet {
    geoid_dir: StagedDir,
    topo_dir: StagedDir,
    outputs: Vec<FactorOutputs>,
    committed: bool,
}

impl OutputSet {
    /// Create the staging directories and open every output file
    pub fn create(config: &ExportConfig) -> Result<Self> {
        fs::create_dir_all(&config.output_root)?;

        let geoid_dir = StagedDir::create(&config.output_root, &config.geoid_dir_name())?;
        let topo_dir = match StagedDir::create(&config.output_root, &config.topo_dir_name()) {
            Ok(dir) => dir,
            Err(e) => {
                let _ = fs::remove_dir_all(&geoid_dir.staging);
                return Err(e.into());
            }
        };

        // From here on, Drop cleans up
        let mut set = OutputSet {
            geoid_dir,
            topo_dir,
            outputs: Vec::with_capacity(config.exaggerations.len()),
            committed: false,
        };

        for &factor in &config.exaggerations {
            let geoid_name = config.geoid_file_name(factor);
            let topo_name = config.topo_file_name(factor);
            let geoid = BufWriter::new(File::create(set.geoid_dir.staging.join(&geoid_name))?);
            let topo = BufWriter::new(File::create(set.topo_dir.staging.join(&topo_name))?);
            set.outputs.push(FactorOutputs {
                factor,
                geoid,
                topo,
                files: OutputFiles {
                    factor,
                    geoid: set.geoid_dir.target.join(geoid_name),
                    topo: set.topo_dir.target.join(topo_name),
                },
            });
        }

        debug!(
            "staged {} output pair(s) in {} and {}",
            set.outputs.len(),
            set.geoid_dir.staging.display(),
            set.topo_dir.staging.display()
        );

        Ok(set)
    }

    /// Hand the writers to their owners; they come back through `commit`
    pub fn take_outputs(&mut self) -> Vec<FactorOutputs> {
        std::mem::take(&mut self.outputs)
    }

    /// Flush and close `outputs`, then move the staged directories into place
    pub fn commit(mut self, outputs: Vec<FactorOutputs>) -> Result<Vec<OutputFiles>> {
        let mut files = Vec::with_capacity(outputs.len());
        for mut out in outputs.into_iter().chain(self.take_outputs()) {
            out.flush()?;
            files.push(out.files.clone());
        }

        // Both directories go in place or neither does
        let geoid = self.geoid_dir.publish()?;
        if let Err(e) = self.topo_dir.publish() {
            if let Err(undo) = self.geoid_dir.unpublish(&geoid) {
                warn!(
                    "could not remove {}: {}",
                    self.geoid_dir.target.display(),
                    undo
                );
            }
            return Err(e.into());
        }
        self.committed = true;

        files.sort_by_key(|f| f.factor);
        Ok(files)
    }
}

impl Drop for OutputSet {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // Close handles before deleting their directories
        self.outputs.clear();
        for dir in [&self.geoid_dir, &self.topo_dir] {
            if dir.staging.exists() {
                if let Err(e) = fs::remove_dir_all(&dir.staging) {
                    warn!("could not remove {}: {}", dir.staging.display(), e);
                }
            }
        }
        debug!("output set rolled back");
    }
}
