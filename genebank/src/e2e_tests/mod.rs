//! End-to-end tests through the tree files and session drivers.
//!
//! Each test file covers a specific scenario, using deterministic inputs
//! to verify complete build and query sessions.

#![cfg(test)]

mod helpers;

mod test_build_and_search;
mod test_cache_equivalence;
mod test_concrete_scenario;
mod test_fault_injection;
mod test_file_layout;
mod test_reopen_extend;
mod test_root_split;
mod test_unfinished_build;
