//! Integration-style tests that span several subsystems at once, grouped one
//! file per subsystem like the testable properties list calls out.

// Value tagging and header-encoding properties (spec.md §8 first two
// groups) are covered by the inline `#[cfg(test)]` modules in `val.rs` and
// `gc/header.rs` themselves, next to the code they exercise.

mod fixtures;
mod test_e2e;
mod test_gc;
mod test_image;
mod test_interpreter;
mod test_verifier;
