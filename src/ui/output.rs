//! Output functions for consistent CLI formatting
//!
//! Interactive terminals get cliclack log lines; everything else gets
//! plain `[TAG] message` lines that are easy to grep in CI logs.

use super::context::UiContext;
use console::style;

#[derive(Debug, Clone, Copy)]
enum Level {
    Ok,
    Info,
    Warn,
    Fail,
}

impl Level {
    fn tag(self) -> String {
        match self {
            Self::Ok => style("[OK]").green().to_string(),
            Self::Info => style("[INFO]").cyan().to_string(),
            Self::Warn => style("[WARN]").yellow().to_string(),
            Self::Fail => style("[FAIL]").red().to_string(),
        }
    }

    fn log(self, message: String) {
        let _ = match self {
            Self::Ok => cliclack::log::success(message),
            Self::Info => cliclack::log::info(message),
            Self::Warn => cliclack::log::warning(message),
            Self::Fail => cliclack::log::error(message),
        };
    }
}

fn step(ctx: &UiContext, level: Level, message: &str, detail: Option<&str>) {
    if ctx.use_fancy_output() {
        match detail {
            Some(detail) => level.log(format!("{} ({})", message, style(detail).dim())),
            None => level.log(message.to_string()),
        }
    } else {
        match detail {
            Some(detail) => println!("  {} {} ({})", level.tag(), message, detail),
            None => println!("  {} {}", level.tag(), message),
        }
    }
}

/// Display intro banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).cyan().bold());
        println!();
    }
}

/// Display success outro
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!("{} {}", Level::Ok.tag(), message);
    }
}

/// Display warning outro
pub fn outro_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).yellow().bold()).ok();
    } else {
        println!("{} {}", Level::Warn.tag(), message);
    }
}

/// Display a success step
pub fn step_ok(ctx: &UiContext, message: &str) {
    step(ctx, Level::Ok, message, None);
}

/// Display a success step with detail
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    step(ctx, Level::Ok, message, Some(detail));
}

/// Display an info step
pub fn step_info(ctx: &UiContext, message: &str) {
    step(ctx, Level::Info, message, None);
}

/// Display a warning step with hint
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    step(ctx, Level::Warn, message, Some(hint));
}

/// Display an error step with detail
pub fn step_error_detail(ctx: &UiContext, message: &str, detail: &str) {
    step(ctx, Level::Fail, message, Some(detail));
}
