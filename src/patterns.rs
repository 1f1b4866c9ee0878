//! Pattern export
//!
//! Pattern mining on the server leaves two newline-delimited JSON files in
//! an export directory:
//!
//! - `edges.json`: `{"id": .., "data": {"alignId": ..}}` per mined edge
//! - `graphs.json`: `{"id": .., "data": {"support": .., "__variable_mapping": "{__e0=3, __v0=1}"}}`
//!   per pattern
//!
//! Edge references are resolved to alignment graph edge keys through the
//! Karma `alignId`, then written out as CSV. Unknown ids are logged and
//! skipped.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::alignment::AlignmentGraph;
use crate::error::{SereneError, SereneResult};
use crate::graph::EdgeId;

pub const GRAPHS_FILE: &str = "graphs.json";
pub const EDGES_FILE: &str = "edges.json";
pub const CSV_HEADER: &str = "pattern,support,num_edges,edge_keys";

const EDGE_VARIABLE_PREFIX: &str = "__e";

/// One mined pattern
#[derive(Debug, Clone, PartialEq)]
pub struct PatternRow {
    pub pattern: String,
    pub support: Value,
    /// Alignment edge keys, sorted ascending
    pub edge_keys: Vec<EdgeId>,
}

impl PatternRow {
    pub fn num_edges(&self) -> usize {
        self.edge_keys.len()
    }
}

#[derive(Deserialize)]
struct EdgeRecord {
    id: Value,
    data: EdgeData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeData {
    align_id: String,
}

#[derive(Deserialize)]
struct GraphRecord {
    id: Value,
    data: GraphData,
}

#[derive(Deserialize)]
struct GraphData {
    support: Value,
    #[serde(rename = "__variable_mapping")]
    variable_mapping: String,
}

/// Ids are numbers in some exports and strings in others
fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn records<T: for<'de> Deserialize<'de>>(reader: impl BufRead, what: &str) -> SereneResult<Vec<T>> {
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| SereneError::malformed(what, e))?;
        out.push(record);
    }
    Ok(out)
}

/// Map mined edge ids to alignment edge keys
fn edge_lines(alignment: &AlignmentGraph, edges: impl BufRead) -> SereneResult<HashMap<String, EdgeId>> {
    let lookup = alignment.align_lookup();
    let mut lines = HashMap::new();
    for record in records::<EdgeRecord>(edges, EDGES_FILE)? {
        match lookup.get(record.data.align_id.as_str()) {
            Some(key) => {
                lines.insert(id_text(&record.id), *key);
            }
            None => warn!("Missing alignId: {}", record.data.align_id),
        }
    }
    Ok(lines)
}

/// Edge keys referenced by a `{k=v, ...}` variable mapping
fn mapped_edges(mapping: &str, edge_lines: &HashMap<String, EdgeId>) -> Vec<EdgeId> {
    let mut keys = Vec::new();
    for pair in mapping.replace(['{', '}'], "").split(',') {
        let mut parts = pair.trim().splitn(2, '=');
        let (Some(var), value) = (parts.next(), parts.next()) else {
            continue;
        };
        if !var.starts_with(EDGE_VARIABLE_PREFIX) {
            continue;
        }
        match value.and_then(|v| edge_lines.get(v.trim())) {
            Some(key) => keys.push(*key),
            None => warn!("Missing edge id: {}", value.unwrap_or_default()),
        }
    }
    keys.sort();
    keys
}

/// Join the mining output with the alignment graph. Rows come back sorted
/// by their edge-key lists.
pub fn read_patterns(
    alignment: &AlignmentGraph,
    graphs: impl BufRead,
    edges: impl BufRead,
) -> SereneResult<Vec<PatternRow>> {
    let edge_lines = edge_lines(alignment, edges)?;

    let mut rows: Vec<PatternRow> = records::<GraphRecord>(graphs, GRAPHS_FILE)?
        .into_iter()
        .map(|record| PatternRow {
            pattern: id_text(&record.id),
            support: record.data.support,
            edge_keys: mapped_edges(&record.data.variable_mapping, &edge_lines),
        })
        .collect();
    rows.sort_by(|a, b| a.edge_keys.cmp(&b.edge_keys));
    Ok(rows)
}

fn csv_cell(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn edge_keys_cell(keys: &[EdgeId]) -> String {
    let inner: Vec<String> = keys.iter().map(|k| k.as_u64().to_string()).collect();
    csv_cell(&format!("[{}]", inner.join(", ")))
}

/// Write rows as CSV with a `pattern,support,num_edges,edge_keys` header
pub fn write_patterns_csv(rows: &[PatternRow], mut out: impl Write) -> SereneResult<()> {
    writeln!(out, "{}", CSV_HEADER)?;
    for row in rows {
        let support = match &row.support {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        writeln!(
            out,
            "{},{},{},{}",
            csv_cell(&row.pattern),
            csv_cell(&support),
            row.num_edges(),
            edge_keys_cell(&row.edge_keys)
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Read `graphs.json` and `edges.json` from `export_dir` and write the
/// joined patterns to `out`.
pub fn export_patterns(alignment: &AlignmentGraph, export_dir: &Path, out: &Path) -> SereneResult<Vec<PatternRow>> {
    let graphs = BufReader::new(File::open(export_dir.join(GRAPHS_FILE))?);
    let edges = BufReader::new(File::open(export_dir.join(EDGES_FILE))?);
    let rows = read_patterns(alignment, graphs, edges)?;

    write_patterns_csv(&rows, BufWriter::new(File::create(out)?))?;
    info!("Patterns have been written to csv {}", out.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::convert_karma_graph;
    use serde_json::json;

    fn alignment() -> AlignmentGraph {
        convert_karma_graph(&json!({
            "nodes": [
                {"id": "n1", "type": "InternalNode", "label": {"uri": "ex:Person"}},
                {"id": "n2", "type": "DataNode"},
                {"id": "n3", "type": "InternalNode", "label": {"uri": "ex:Place"}},
                {"id": "n4", "type": "DataNode"}
            ],
            "links": [
                {"id": "n1---ex:name---n2", "type": "DataPropertyLink", "weight": 1.0},
                {"id": "n1---ex:livesIn---n3", "type": "ObjectPropertyLink", "weight": 1.0},
                {"id": "n3---ex:name---n4", "type": "DataPropertyLink", "weight": 1.0}
            ]
        }))
        .unwrap()
    }

    const EDGES: &str = concat!(
        r#"{"id": 10, "data": {"alignId": "n3---ex:name---n4"}}"#, "\n",
        r#"{"id": 11, "data": {"alignId": "n1---ex:livesIn---n3"}}"#, "\n",
        r#"{"id": 12, "data": {"alignId": "n9---ex:gone---n8"}}"#, "\n",
        r#"{"id": 13, "data": {"alignId": "n1---ex:name---n2"}}"#, "\n",
    );

    const GRAPHS: &str = concat!(
        r#"{"id": "p1", "data": {"support": 4, "__variable_mapping": "{__e0=10, __v0=1, __e1=11}"}}"#, "\n",
        "\n",
        r#"{"id": "p2", "data": {"support": 7, "__variable_mapping": "{__e0=13}"}}"#, "\n",
        r#"{"id": "p3", "data": {"support": 2, "__variable_mapping": "{__e0=12, __e1=99}"}}"#, "\n",
    );

    #[test]
    fn test_read_patterns_resolves_and_sorts() {
        let rows = read_patterns(&alignment(), GRAPHS.as_bytes(), EDGES.as_bytes()).unwrap();

        let order: Vec<&str> = rows.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(order, vec!["p3", "p2", "p1"]);

        assert!(rows[0].edge_keys.is_empty());
        assert_eq!(rows[1].edge_keys, vec![EdgeId::new(0)]);
        assert_eq!(rows[2].edge_keys, vec![EdgeId::new(1), EdgeId::new(2)]);
        assert_eq!(rows[2].num_edges(), 2);
        assert_eq!(rows[2].support, json!(4));
    }

    #[test]
    fn test_csv_layout() {
        let rows = read_patterns(&alignment(), GRAPHS.as_bytes(), EDGES.as_bytes()).unwrap();
        let mut out = Vec::new();
        write_patterns_csv(&rows, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "pattern,support,num_edges,edge_keys",
                "p3,2,0,[]",
                "p2,7,1,[0]",
                "p1,4,2,\"[1, 2]\"",
            ]
        );
    }

    #[test]
    fn test_export_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(GRAPHS_FILE), GRAPHS).unwrap();
        std::fs::write(dir.path().join(EDGES_FILE), EDGES).unwrap();
        let out = dir.path().join("patterns.csv");

        let rows = export_patterns(&alignment(), dir.path(), &out).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(std::fs::read_to_string(&out).unwrap().starts_with(CSV_HEADER));
    }

    #[test]
    fn test_malformed_record() {
        let err = read_patterns(&alignment(), "not json\n".as_bytes(), EDGES.as_bytes()).unwrap_err();
        assert!(matches!(err, SereneError::Validation(_)));
    }
}
