//! File-name scheme (spec.md §6). All paths are relative to the producing
//! node's temp directory, and the basenames are exactly what a peer
//! requests over `/data/`. Ported from `original_source/mapreduce/worker.go`'s
//! `mapSourceFile`/`mapInputFile`/etc.

pub fn map_source_file(n: usize) -> String {
    format!("map_{}_source.db", n)
}

pub fn map_input_file(n: usize) -> String {
    format!("map_{}_input.db", n)
}

pub fn map_output_file(n: usize, r: usize) -> String {
    format!("map_{}_output_{}.db", n, r)
}

pub fn reduce_input_file(r: usize) -> String {
    format!("reduce_{}_input.db", r)
}

pub fn reduce_output_file(r: usize) -> String {
    format!("reduce_{}_output.db", r)
}

pub fn reduce_temp_file(r: usize) -> String {
    format!("reduce_{}_temp.db", r)
}

pub const FINAL_TEMP_FILE: &str = "final_temp.db";
