//! UI module for consistent CLI output
//!
//! Uses `cliclack` for styled step output and spinners, with automatic
//! fallback to plain `[OK]` / `[FAIL]` lines in CI or when piped.
//!
//! # Example
//!
//! ```rust,ignore
//! use getpack::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Providing ffmpeg 5.1.2...");
//! // ... do work ...
//! spinner.stop("ffmpeg 5.1.2 ready");
//!
//! ui::step_warn_hint(&ctx, "Config already exists", "Use --force to overwrite");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{remark, step_error_detail, step_info, step_ok, step_ok_detail, step_warn_hint};
pub use progress::{ProvideProgress, TaskSpinner};
