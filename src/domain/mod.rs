// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, errors and traits that describe the
// recommendation problem. No Burn types live here.
//
//   impression.rs — one user's clicked history plus the
//                   candidate set (1 clicked + K unclicked)
//   error.rs      — batch-schema validation errors
//   traits.rs     — seams implemented by other layers
//
// Reference: Wu et al. (2019) Neural News Recommendation
//            with Multi-Head Self-Attention (NRMS)

// A training impression and its tokenized titles
pub mod impression;

// Named-field validation failures
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
