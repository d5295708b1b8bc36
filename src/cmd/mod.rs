//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module      | Commands handled                   |
//! |-------------|------------------------------------|
//! | `serve`     | `Serve`                            |
//! | `evaluate`  | `Evaluate`                         |
//! | `generate`  | `Generate`                         |
//! | `tooling`   | `SeedSql`, `UploadImages`, `ShuffleSeed` |
//! | `browse`    | `Feed`, `Show`, `Random`, `Delete` |
//! | `favorites` | `Favorite`                         |
//! | `filter`    | `Filter`                           |

pub mod browse;
pub mod evaluate;
pub mod favorites;
pub mod filter;
pub mod generate;
pub mod serve;
pub mod tooling;

pub use browse::{cmd_delete, cmd_feed, cmd_random, cmd_show};
pub use evaluate::cmd_evaluate;
pub use favorites::cmd_favorite;
pub use filter::cmd_filter;
pub use generate::cmd_generate;
pub use serve::cmd_serve;
pub use tooling::{cmd_seed_sql, cmd_shuffle_seed, cmd_upload_images};
