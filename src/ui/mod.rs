//! Terminal output with automatic fallback to plain text
//!
//! Uses `cliclack` for interactive output and `indicatif` for progress
//! bars; in CI or when piped, every helper prints plain tagged lines.
//!
//! ```rust,ignore
//! use imcache::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect().with_auto_yes(args.yes);
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Pruning image cache...");
//! spinner.stop("Freed 1.2 GB");
//! ```

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, outro_success, outro_warn, step_error_detail, step_info, step_ok,
    step_ok_detail, step_warn_hint,
};
pub use progress::{BatchProgress, TaskSpinner};
pub use prompts::confirm;
