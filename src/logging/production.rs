//! Plain log formatting for log aggregation.
//!
//! No ANSI colors, one line per event.
//! Format: `TIMESTAMP LEVEL target: message [span1{field=value}][span2{field=value}]`

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

pub struct ProductionLogFormat;

impl<S, N> FormatEvent<S, N> for ProductionLogFormat
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

        write!(
            writer,
            "{} {:<5} {}: ",
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            metadata.level(),
            metadata.target()
        )?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        if let Some(scope) = ctx.event_scope() {
            let spans: Vec<_> = scope.collect();

            if !spans.is_empty() {
                write!(writer, " ")?;

                // Outermost span first
                for span in spans.into_iter().rev() {
                    write!(writer, "[{}", span.name())?;

                    let ext = span.extensions();
                    if let Some(fields) = ext.get::<FormattedFields<N>>()
                        && !fields.is_empty()
                    {
                        write!(writer, "{{{}}}", fields)?;
                    }

                    write!(writer, "]")?;
                }
            }
        }

        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture::Capture;

    #[test]
    fn formats_level_target_message_and_spans() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(ProductionLogFormat)
            .with_writer(capture.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("http_request", path = "/health");
            let _guard = span.enter();
            tracing::warn!("Something happened");
        });

        let output = capture.contents();
        assert!(output.contains("WARN "), "{output}");
        assert!(output.contains("Something happened"), "{output}");
        assert!(output.contains("[http_request{path=\"/health\"}]"), "{output}");
        assert!(output.ends_with('\n'));
    }
}
