// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::{
    Args, ValueEnum,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use owo_colors::{OwoColorize, Style, style};
use std::{fmt, sync::Once};
use tracing::{Event, Level, Subscriber, level_filters::LevelFilter};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format::Writer},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Log events with this target are printed without a level heading.
pub(crate) const NO_HEADING_TARGET: &str = "qt_testrunner::no_heading";

/// Environment variable holding a `tracing` target filter, e.g. `qtest_supervisor=trace`.
pub(crate) const LOG_ENV: &str = "QT_TESTRUNNER_LOG";

/// Styles for `--help` output.
pub(crate) const fn clap_styles() -> Styles {
    let bold_green = AnsiColor::Green.on_default().effects(Effects::BOLD);
    let bold_cyan = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
    Styles::styled()
        .header(bold_green)
        .usage(bold_green)
        .literal(bold_cyan)
        .placeholder(AnsiColor::Cyan.on_default())
        .error(AnsiColor::Red.on_default().effects(Effects::BOLD))
        .valid(bold_cyan)
        .invalid(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
}

#[derive(Copy, Clone, Debug, Args)]
#[command(next_help_heading = "Output options")]
pub(crate) struct OutputOpts {
    /// Verbose output: debug logging, full command lines and environment overlays
    #[arg(long, short, env = "QT_TESTRUNNER_VERBOSE")]
    pub(crate) verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        value_name = "WHEN",
        env = "QT_TESTRUNNER_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    /// Sets up logging to stderr and returns the output context.
    pub(crate) fn init(self) -> OutputContext {
        init_logging(
            self.verbose,
            self.color.should_colorize(supports_color::Stream::Stderr),
        );
        OutputContext {
            verbose: self.verbose,
            color: self.color,
        }
    }
}

/// How output is produced for this run.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) verbose: bool,
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns styles for error messages written to stderr.
    pub fn stderr_styles(&self) -> StderrStyles {
        if self.color.should_colorize(supports_color::Stream::Stderr) {
            StderrStyles {
                bold: style().bold(),
            }
        } else {
            StderrStyles::default()
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

impl Color {
    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

static INIT_LOGGING: Once = Once::new();

fn init_logging(verbose: bool, colorize: bool) {
    INIT_LOGGING.call_once(|| {
        let default_level = if verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        // An unset or unparseable filter falls back to the default level.
        let targets = std::env::var(LOG_ENV)
            .ok()
            .filter(|filter| !filter.is_empty())
            .and_then(|filter| filter.parse::<Targets>().ok())
            .unwrap_or_else(|| Targets::new().with_default(default_level));

        let layer = tracing_subscriber::fmt::layer()
            .event_format(HeadingFormatter { colorize })
            .with_writer(std::io::stderr)
            .with_filter(targets);
        tracing_subscriber::registry().with(layer).init();
    });
}

/// Formats events as `<level>: <message> <fields>`.
struct HeadingFormatter {
    colorize: bool,
}

impl HeadingFormatter {
    fn heading(&self, level: Level) -> (&'static str, Style) {
        let (heading, colored) = match level {
            Level::ERROR => ("error", style().red().bold()),
            Level::WARN => ("warning", style().yellow().bold()),
            Level::INFO => ("info", style().bold()),
            Level::DEBUG => ("debug", style().bold()),
            Level::TRACE => ("trace", style().dimmed()),
        };
        (heading, if self.colorize { colored } else { style() })
    }
}

impl<S, N> FormatEvent<S, N> for HeadingFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        if metadata.target() != NO_HEADING_TARGET {
            let (heading, heading_style) = self.heading(*metadata.level());
            write!(writer, "{}: ", heading.style(heading_style))?;
        }
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Styles for messages written to standard error outside of logging.
#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
}
