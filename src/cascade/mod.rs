//! Cascade Hashing: two-stage approximate nearest-neighbour search
//!
//! Descriptors are hashed with random hyperplanes into two structures:
//!
//! - a long binary code (one bit per descriptor dimension), compared with
//!   Hamming distance to cheaply rank candidates;
//! - several short bucket ids (one per group), used to gather candidates
//!   without scanning the whole database.
//!
//! Only the few candidates that survive the Hamming ranking are compared with
//! the exact Euclidean distance.
//!
//! ```rust
//! use syna_match::cascade::{CascadeConfig, CascadeHasher};
//! use syna_match::DescriptorMatrix;
//!
//! let db = DescriptorMatrix::from_flat((0..512).map(|i| (i as f32 * 1.3).sin()).collect(), 8)?;
//! let hasher = CascadeHasher::new(8, CascadeConfig::small())?;
//!
//! // Centering is part of the hash function: queries reuse the database mean
//! let mean = CascadeHasher::zero_mean(&db);
//! let hashed_db = hasher.hash_set(&db, &mean)?;
//! let hashed_query = hasher.hash_set(&db, &mean)?;
//!
//! let outcome = hasher.search(&hashed_db, &db, &hashed_query, &db, 2)?;
//! println!("{} queries dropped", outcome.dropped_queries);
//! # Ok::<(), syna_match::MatchError>(())
//! ```
//!
//! # Parameters
//!
//! | Parameter | Default | Effect |
//! |-----------|---------|--------|
//! | `bucket_groups` | 6 | More groups gather more candidates (recall up, speed down) |
//! | `bits_per_bucket` | 10 | Fewer bits make larger buckets |
//! | `top_candidates` | 10 | Shortlist size for exact re-ranking |
//! | `seed` | 5489 | Identical seeds hash identically |

mod config;
mod hashed;
mod hasher;
mod projection;

pub use config::{CascadeConfig, DEFAULT_SEED, MAX_BITS_PER_BUCKET};
pub use hashed::{Bucket, HashedDescriptor, HashedSet};
pub use hasher::{CascadeHasher, Neighbor, SearchOutcome};
pub use projection::ProjectionParameters;
