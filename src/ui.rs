use colored::Colorize;
use orderkit::{BoxedOrder, ProgressCallback, Report, RunOutcome, RunSummary};
use serde::Serialize;
use serde_json::{Value, json};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

// ============================================================================
// Run Progress
// ============================================================================

/// Terminal progress for a run
pub struct ConsoleProgress {
    total: usize,
    current: usize,
    verbose: bool,
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(verbose: u8, quiet: bool) -> Self {
        Self {
            total: 0,
            current: 0,
            verbose: verbose > 0,
            quiet,
        }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_run_start(&mut self, count: usize) {
        self.total = count;
        if !self.quiet {
            header(&format!("Executing {count} orders"));
        }
    }

    fn on_order_start(&mut self, id: &str, kind: &str) {
        self.current += 1;
        if !self.quiet {
            step(self.current, self.total, &format!("{} {}", kind.dimmed(), id));
        }
    }

    fn on_order_complete(&mut self, id: &str, report: &Report) {
        let note = status_note(report)
            .map(|note| format!(" ({note})").dimmed().to_string())
            .unwrap_or_default();

        if report.is_success() {
            if !self.quiet {
                println!("  {} {}{}", "✓".green(), id, note);
            }
            if self.verbose {
                print_output(report);
            }
            return;
        }

        println!("  {} {}{}", "✗".red(), id, note);
        for err in &report.errors {
            println!("    {}", err.to_string().red());
        }
        print_output(report);
    }

    fn on_order_skipped(&mut self, id: &str, reason: &str) {
        if !self.quiet {
            println!("  {} {} {}", "⊘".yellow(), id, format!("({reason})").dimmed());
        }
    }
}

/// Short annotation shown next to a finished order
fn status_note(report: &Report) -> Option<&'static str> {
    if report.is_success() {
        return report.is_empty().then_some("no effects");
    }

    if report.errors.iter().any(orderkit::Error::is_script_failure) {
        Some("script failed")
    } else {
        Some("setup failed")
    }
}

fn print_output(report: &Report) {
    for line in report.output_str().lines() {
        println!("    {}", line.dimmed());
    }
}

/// Print the end-of-run summary
pub fn print_summary(summary: &RunSummary, halted_by: Option<&str>) {
    println!();
    if summary.is_success() {
        println!("  {} All orders executed", "✓".green().bold());
    } else {
        println!("  {} Run finished with errors", "⚠".yellow().bold());
    }

    println!("    • {} orders executed", summary.executed);
    if summary.skipped > 0 {
        println!("    • {} orders skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "orders".red());
    }
    if let Some(id) = halted_by {
        println!("    • halted after {}", id.bold());
    }
}

/// Print the execution order of a schematic
pub fn print_plan(orders: &[BoxedOrder]) {
    header(&format!("Plan: {} orders", orders.len()));
    for (index, order) in orders.iter().enumerate() {
        let mut flags = Vec::new();
        if order.order().ignore_fail {
            flags.push("ignore-fail");
        }
        if order.order().ignore_global {
            flags.push("ignore-global");
        }

        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!(
            "  {:>3}. {:<7} {}{}",
            index + 1,
            order.kind().cyan(),
            order.id(),
            flags.dimmed()
        );
    }
}

// ============================================================================
// JSON Output
// ============================================================================

#[derive(Serialize)]
struct OrderView<'a> {
    id: &'a str,
    kind: &'a str,
    exit_code: i32,
    errors: Vec<String>,
    output: String,
    env_directions: &'a [orderkit::EnvDirection],
    data: &'a std::collections::BTreeMap<String, String>,
}

/// Machine-readable view of a finished run
pub fn outcome_json(outcome: &RunOutcome) -> Value {
    let orders: Vec<OrderView<'_>> = outcome
        .outcomes
        .iter()
        .map(|o| OrderView {
            id: &o.id,
            kind: o.kind,
            exit_code: o.report.exit_code,
            errors: o.report.errors.iter().map(ToString::to_string).collect(),
            output: o.report.output_str(),
            env_directions: &o.report.env_directions,
            data: &o.report.data,
        })
        .collect();

    json!({
        "summary": outcome.summary(),
        "halted_by": outcome.halted_by(),
        "global": outcome.global,
        "orders": orders,
        "skipped": outcome.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderkit::{
        DataOrder, EngineOptions, MemoryEnvironment, Order, OrderContext, OrderOutcome,
        execute_simple,
    };

    #[test]
    fn test_status_note() {
        assert_eq!(status_note(&Report::default()), Some("no effects"));

        let mut published = Report::default();
        published.data.insert("#data:port".into(), "8080".into());
        assert_eq!(status_note(&published), None);

        let mut failed = Report::default();
        failed.fail(orderkit::Error::ScriptFailed {
            path: "/tmp/x".into(),
            status: "exit status: 3".into(),
            code: Some(3),
        });
        assert_eq!(status_note(&failed), Some("script failed"));

        let mut unwritable = Report::default();
        unwritable.fail(orderkit::Error::ReservedId("#GLOBAL#".into()));
        assert_eq!(status_note(&unwritable), Some("setup failed"));
    }

    #[test]
    fn test_outcome_json_shape() {
        let orders: Vec<BoxedOrder> = vec![Box::new(DataOrder::new(Order::new(0, "port"), "8080"))];
        let outcome =
            execute_simple(orders, &mut MemoryEnvironment::new(), &EngineOptions::default())
                .unwrap();

        let value = outcome_json(&outcome);

        assert_eq!(value["summary"]["executed"], 1);
        assert_eq!(value["halted_by"], Value::Null);
        assert_eq!(value["global"]["data"]["#data:port"], "8080");
        assert_eq!(value["orders"][0]["id"], "port");
        assert_eq!(value["orders"][0]["kind"], "data");
        assert_eq!(value["orders"][0]["exit_code"], 0);
    }

    #[test]
    fn test_outcome_json_lists_errors_as_text() {
        let mut report = Report::default();
        report.fail(orderkit::Error::DuplicateId("x".into()));
        let outcome = RunOutcome {
            global: OrderContext::global(),
            contexts: Default::default(),
            outcomes: vec![OrderOutcome {
                id: "x".into(),
                kind: "script",
                report,
            }],
            skipped: vec!["y".into()],
        };

        let value = outcome_json(&outcome);

        assert_eq!(value["orders"][0]["exit_code"], 1);
        assert!(
            value["orders"][0]["errors"][0]
                .as_str()
                .unwrap()
                .contains('x')
        );
        assert_eq!(value["skipped"][0], "y");
    }
}
