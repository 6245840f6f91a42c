// Indexes DNA k-mers from GenBank files in a disk-based B-tree.
//
// Life of a build:
// 1. GenBank text comes in
// 2. `ORIGIN` sections are cut into fixed-length windows
// 3. Each valid window is 2-bit encoded and inserted; duplicates bump a count
// 4. The cache is flushed and the header is written last
//
// Life of a query:
// 1. Open the finalized tree, validating the header
// 2. Encode each query line and search
// 3. Print `<query>: <frequency>` for the ones found
//
// System components:
//  - B-tree engine over fixed-size node records
//  - Write-back node cache
//  - GenBank reader and k-mer codec
//  - Simulated storage for deterministic testing

pub mod config;
pub mod driver;
pub mod genbank;
pub mod kmer;
pub mod simulation;
pub mod storage;

mod e2e_tests;
