//! On-disk artifacts of the native engine.
//!
//! | File              | Format                                   |
//! |-------------------|------------------------------------------|
//! | `vectors.bin`     | little-endian header + raw `f32` rows    |
//! | `graph.bin`       | little-endian header + levels + layers   |
//! | `labels.bin`      | bincode [`LabelTable`]                   |
//! | `engine_meta.bin` | bincode [`EngineMeta`], written last     |
//!
//! Each file is written to a temporary sibling and renamed into place.
//! `engine_meta.bin` marks a complete set of artifacts.

use super::graph::{Graph, MAX_LEVEL};
use super::labels::LabelTable;
use super::layer::{Layer, Slot};
use crate::distance::EngineMetric;
use crate::engine::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub(super) const VECTORS_FILE: &str = "vectors.bin";
pub(super) const GRAPH_FILE: &str = "graph.bin";
pub(super) const LABELS_FILE: &str = "labels.bin";
pub(super) const META_FILE: &str = "engine_meta.bin";

pub(super) const FORMAT_VERSION: u32 = 1;
const NO_ENTRY_POINT: u64 = u64::MAX;

/// Engine parameters persisted next to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(super) struct EngineMeta {
    pub(super) version: u32,
    pub(super) metric: EngineMetric,
    pub(super) dimension: usize,
    pub(super) capacity: usize,
    pub(super) graph_degree: usize,
    pub(super) ef_construction: usize,
}

/// Returns true if `dir` holds a complete set of artifacts.
pub(super) fn has_artifacts(dir: &Path) -> bool {
    dir.join(META_FILE).is_file()
}

/// Writes every artifact for the given state.
pub(super) fn save(
    dir: &Path,
    graph: &Graph,
    labels: &LabelTable,
    meta: &EngineMeta,
) -> EngineResult<()> {
    fs::create_dir_all(dir)?;
    write_atomic(&dir.join(VECTORS_FILE), |w| write_vectors(w, graph))?;
    write_atomic(&dir.join(GRAPH_FILE), |w| write_graph(w, graph))?;
    write_atomic(&dir.join(LABELS_FILE), |w| {
        bincode::serialize_into(w, labels).map_err(io::Error::other)
    })?;
    write_atomic(&dir.join(META_FILE), |w| {
        bincode::serialize_into(w, meta).map_err(io::Error::other)
    })?;
    Ok(())
}

/// Reads every artifact back.
pub(super) fn load(dir: &Path) -> EngineResult<(Graph, LabelTable, EngineMeta)> {
    let meta: EngineMeta = bincode::deserialize_from(open(&dir.join(META_FILE))?)
        .map_err(|e| EngineError::Corrupted(format!("{META_FILE}: {e}")))?;
    if meta.version != FORMAT_VERSION {
        return Err(EngineError::Corrupted(format!(
            "unsupported artifact version {}",
            meta.version
        )));
    }

    let labels: LabelTable = bincode::deserialize_from(open(&dir.join(LABELS_FILE))?)
        .map_err(|e| EngineError::Corrupted(format!("{LABELS_FILE}: {e}")))?;

    let mut graph = Graph::new(
        meta.metric.metric,
        meta.dimension,
        meta.graph_degree,
        meta.ef_construction,
    );
    read_vectors(&mut open(&dir.join(VECTORS_FILE))?, &mut graph).map_err(corrupted(VECTORS_FILE))?;
    read_graph(&mut open(&dir.join(GRAPH_FILE))?, &mut graph).map_err(corrupted(GRAPH_FILE))?;

    if graph.len() != labels.len() {
        return Err(EngineError::Corrupted(format!(
            "graph holds {} slots but label table holds {}",
            graph.len(),
            labels.len()
        )));
    }

    Ok((graph, labels, meta))
}

fn open(path: &Path) -> EngineResult<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

fn corrupted(file: &'static str) -> impl Fn(io::Error) -> EngineError {
    move |e| EngineError::Corrupted(format!("{file}: {e}"))
}

fn write_atomic<F>(path: &Path, write: F) -> EngineResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let temp_path = path.with_extension("tmp");
    let mut writer = BufWriter::new(File::create(&temp_path)?);
    write(&mut writer)?;
    let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn write_vectors<W: Write>(w: &mut W, graph: &Graph) -> io::Result<()> {
    w.write_all(&FORMAT_VERSION.to_le_bytes())?;
    w.write_all(&(graph.len() as u64).to_le_bytes())?;
    w.write_all(&(graph.dimension as u32).to_le_bytes())?;
    for &val in &graph.vectors {
        w.write_all(&val.to_le_bytes())?;
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn write_graph<W: Write>(w: &mut W, graph: &Graph) -> io::Result<()> {
    w.write_all(&FORMAT_VERSION.to_le_bytes())?;
    w.write_all(&(graph.layers.len() as u32).to_le_bytes())?;
    w.write_all(&(graph.max_connections as u32).to_le_bytes())?;
    w.write_all(&(graph.max_connections_0 as u32).to_le_bytes())?;
    w.write_all(&(graph.ef_construction as u32).to_le_bytes())?;
    let entry = graph.entry_point.map_or(NO_ENTRY_POINT, u64::from);
    w.write_all(&entry.to_le_bytes())?;
    w.write_all(&(graph.max_layer as u32).to_le_bytes())?;
    w.write_all(&(graph.len() as u64).to_le_bytes())?;
    w.write_all(&graph.levels)?;

    for layer in &graph.layers {
        w.write_all(&(layer.neighbors.len() as u64).to_le_bytes())?;
        for list in &layer.neighbors {
            w.write_all(&(list.len() as u32).to_le_bytes())?;
            for &neighbor in list {
                w.write_all(&neighbor.to_le_bytes())?;
            }
        }
    }
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn read_len<R: Read>(r: &mut R) -> io::Result<usize> {
    usize::try_from(read_u64(r)?).map_err(|e| invalid(e.to_string()))
}

fn check_version(version: u32) -> io::Result<()> {
    if version == FORMAT_VERSION {
        Ok(())
    } else {
        Err(invalid(format!("unsupported version {version}")))
    }
}

fn read_vectors<R: Read>(r: &mut R, graph: &mut Graph) -> io::Result<()> {
    check_version(read_u32(r)?)?;
    let count = read_len(r)?;
    let dimension = read_u32(r)? as usize;
    if dimension != graph.dimension {
        return Err(invalid(format!(
            "dimension {dimension} disagrees with metadata {}",
            graph.dimension
        )));
    }

    let floats = count
        .checked_mul(dimension)
        .ok_or_else(|| invalid("vector count overflows".to_string()))?;
    let mut vectors = Vec::new();
    vectors
        .try_reserve_exact(floats)
        .map_err(|e| invalid(e.to_string()))?;
    let mut buf = [0u8; 4];
    for _ in 0..floats {
        r.read_exact(&mut buf)?;
        vectors.push(f32::from_le_bytes(buf));
    }

    graph.vectors = vectors;
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn read_graph<R: Read>(r: &mut R, graph: &mut Graph) -> io::Result<()> {
    check_version(read_u32(r)?)?;
    let num_layers = read_u32(r)? as usize;
    let max_connections = read_u32(r)? as usize;
    let max_connections_0 = read_u32(r)? as usize;
    let ef_construction = read_u32(r)? as usize;
    let entry = read_u64(r)?;
    let max_layer = read_u32(r)? as usize;
    let count = read_len(r)?;

    if num_layers == 0 || num_layers > MAX_LEVEL + 1 || max_layer >= num_layers {
        return Err(invalid(format!(
            "{num_layers} layers with top layer {max_layer}"
        )));
    }
    if graph.dimension > 0 && graph.vectors.len() != count * graph.dimension {
        return Err(invalid(format!("{count} slots but vector file disagrees")));
    }

    let mut levels = vec![0u8; count];
    r.read_exact(&mut levels)?;

    let mut layers = Vec::with_capacity(num_layers);
    for _ in 0..num_layers {
        let num_nodes = read_len(r)?;
        if num_nodes > count {
            return Err(invalid(format!("layer addresses {num_nodes} of {count} slots")));
        }
        let mut layer = Layer::with_len(num_nodes);
        for list in &mut layer.neighbors {
            let len = read_u32(r)? as usize;
            let mut neighbors: Vec<Slot> = Vec::with_capacity(len.min(max_connections_0 + 1));
            for _ in 0..len {
                let neighbor = read_u32(r)?;
                if neighbor as usize >= count {
                    return Err(invalid(format!("edge to missing slot {neighbor}")));
                }
                neighbors.push(neighbor);
            }
            *list = neighbors;
        }
        layers.push(layer);
    }

    graph.entry_point = if entry == NO_ENTRY_POINT {
        None
    } else {
        Some(Slot::try_from(entry).map_err(|e| invalid(e.to_string()))?)
    };
    graph.max_connections = max_connections;
    graph.max_connections_0 = max_connections_0;
    graph.ef_construction = ef_construction;
    graph.max_layer = max_layer;
    graph.levels = levels;
    graph.layers = layers;
    Ok(())
}
