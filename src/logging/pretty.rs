//! Colorful console output for local development.

use nu_ansi_term::{Color, Style};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

pub struct PrettyConsoleLogFormat;

macro_rules! styled {
    ($writer:expr, $style:expr, $($arg:tt)*) => {{
        let style = $style;
        write!($writer, "{}", style.prefix())?;
        write!($writer, $($arg)*)?;
        write!($writer, "{}", style.suffix())?;
    }};
}

fn level_style(level: &Level) -> Style {
    match *level {
        Level::TRACE => Style::new().fg(Color::White),
        Level::DEBUG => Style::new().fg(Color::Blue),
        Level::INFO => Style::new().fg(Color::Green),
        Level::WARN => Style::new().fg(Color::Yellow),
        Level::ERROR => Style::new().fg(Color::Red).bold(),
    }
}

impl PrettyConsoleLogFormat {
    fn format_new_span<S, N>(
        writer: &mut Writer,
        ctx: &FmtContext<'_, S, N>,
        event: &Event<'_>,
    ) -> std::fmt::Result
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
        N: for<'a> FormatFields<'a> + 'static,
    {
        let span = ctx.event_scope().and_then(|mut scope| scope.next());
        styled!(writer, Style::new().fg(Color::Magenta), "=> ");
        styled!(writer, Style::new().dimmed(), "{}: ", event.metadata().target());

        match span {
            Some(span) => {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>()
                    && !fields.is_empty()
                {
                    write!(writer, "{{{}}}", fields)?;
                }
            }
            None => write!(writer, "new")?,
        }

        Ok(())
    }
}

impl<S, N> FormatEvent<S, N> for PrettyConsoleLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();

        styled!(
            writer,
            Style::new().dimmed(),
            "{} ",
            chrono::Local::now().format("%T%.3f")
        );
        styled!(writer, level_style(metadata.level()), "{:<5}", metadata.level());

        if let Some(scope) = ctx.event_scope() {
            styled!(writer, Style::new().fg(Color::Magenta), " {}", "|".repeat(scope.count()));
        }
        write!(writer, " ")?;

        let mut fields = String::new();
        ctx.field_format()
            .format_fields(Writer::new(&mut fields), event)?;

        if metadata.is_span() && fields == "new" {
            Self::format_new_span(&mut writer, ctx, event)?;
        } else {
            styled!(writer, Style::new().dimmed(), "{}: ", metadata.target());
            write!(writer, "{}", fields)?;
        }

        writeln!(writer)
    }
}
