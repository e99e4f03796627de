use console::Style;
use flume::Receiver;

use crate::report::CaseOutcome;
use crate::report::CaseReport;
use crate::runner::RunEvent;

pub struct OutPutter;

/// What the outputter saw, used for the closing summary.
#[derive(Debug, Default)]
pub struct Seen {
    pub cases: usize,
    pub failed: Vec<(String, CaseReport)>,
}

impl OutPutter {
    pub async fn start(rx: Receiver<RunEvent>, suite_path: &str, n_tests: usize) -> Seen {
        let style = Style::new().bold().cyan();
        let open_text =
            format!("Running test suite: {suite_path} Found {n_tests} tests: Running...");

        println!("{}", style.apply_to(open_text));

        let mut seen = Seen::default();
        while let Ok(event) = rx.recv_async().await {
            match event {
                RunEvent::TestStarted { name, n_cases } => {
                    println!();
                    println!(
                        "{} {} ({n_cases} cases)",
                        console::style("[TEST]").cyan().bold(),
                        console::style(name).bold()
                    );
                }
                RunEvent::CaseFinished { test, report } => {
                    seen.cases += 1;
                    print!("{}", render_case(&report));

                    if !report.passed() {
                        seen.failed.push((test, report));
                    }
                }
            }
        }

        print_summary(&seen);
        seen
    }
}

/// Text for one finished case, including its diffs and bodies if present.
pub fn render_case(report: &CaseReport) -> String {
    let mut out = String::new();
    let name = &report.name;

    match &report.outcome {
        CaseOutcome::Pass => out.push_str(&format!(
            "  {} {name} {}\n",
            console::style("✔").green().bold(),
            console::style("PASS!").green().bold(),
        )),
        CaseOutcome::Fail { diffs } => {
            out.push_str(&format!(
                "  {} {name} {} {}\n",
                console::style("╳").red().bold(),
                console::style("FAILED!").red().bold(),
                console::style(format!("({} differences)", diffs.len())).dim(),
            ));
            for diff in diffs {
                for line in diff.to_string().lines() {
                    out.push_str(&format!("      {line}\n"));
                }
            }
        }
        CaseOutcome::Error { message } => out.push_str(&format!(
            "  {} {name} {} {}\n",
            console::style("⚠").yellow().bold(),
            console::style("ERROR!").yellow().bold(),
            console::style(message).yellow(),
        )),
    }

    if let Some(bodies) = &report.bodies {
        for (label, body) in [("[A]", &bodies.a), ("[B]", &bodies.b)] {
            let pretty = serde_json::to_string_pretty(body).unwrap_or_default();
            out.push_str(&format!("    {}\n", console::style(label).dim()));
            for line in pretty.lines() {
                out.push_str(&format!("      {line}\n"));
            }
        }
    }

    out
}

fn print_summary(seen: &Seen) {
    println!();
    if seen.failed.is_empty() {
        println!(
            "{}",
            console::style(format!("All {} cases passed! 🎉", seen.cases))
                .bold()
                .green()
        );
        return;
    }

    println!(
        "{}",
        console::style(format!(
            "Summary of Failed Cases ({} of {}):",
            seen.failed.len(),
            seen.cases
        ))
        .bold()
        .red()
    );
    for (idx, (test, report)) in seen.failed.iter().enumerate() {
        let reason = match &report.outcome {
            CaseOutcome::Fail { diffs } => format!("{} differences", diffs.len()),
            CaseOutcome::Error { message } => message.clone(),
            CaseOutcome::Pass => continue,
        };
        println!("{}. {test} / {}: {reason}", idx + 1, report.name);
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::diff::DiffEntry;
    use crate::report::Bodies;

    fn plain(text: String) -> String {
        console::strip_ansi_codes(&text).into_owned()
    }

    #[test]
    fn renders_every_diff() {
        let report = CaseReport {
            name: "user 1".into(),
            outcome: CaseOutcome::Fail {
                diffs: vec![
                    DiffEntry {
                        path: "name".into(),
                        value_a: Some(json!("x")),
                        value_b: Some(json!("X")),
                    },
                    DiffEntry {
                        path: "extra".into(),
                        value_a: None,
                        value_b: Some(json!(null)),
                    },
                ],
            },
            bodies: None,
        };

        let text = plain(render_case(&report));

        assert!(text.contains("user 1 FAILED! (2 differences)"));
        assert!(text.contains("A: \"x\""));
        assert!(text.contains("B: \"X\""));
        assert!(text.contains("A: <absent>"));
        assert!(text.contains("B: null"));
    }

    #[test]
    fn renders_error_and_bodies() {
        let report = CaseReport {
            name: "down".into(),
            outcome: CaseOutcome::Error {
                message: "connection refused".into(),
            },
            bodies: Some(Bodies {
                a: json!({ "id": 1 }),
                b: json!({ "id": 2 }),
            }),
        };

        let text = plain(render_case(&report));

        assert!(text.contains("down ERROR! connection refused"));
        assert!(text.contains("[A]"));
        assert!(text.contains("\"id\": 2"));
    }

    #[tokio::test]
    async fn collects_failures_in_order() {
        let (tx, rx) = flume::unbounded();

        let pass = CaseReport {
            name: "ok".into(),
            outcome: CaseOutcome::Pass,
            bodies: None,
        };
        let error = CaseReport {
            name: "bad".into(),
            outcome: CaseOutcome::Error {
                message: "boom".into(),
            },
            bodies: None,
        };

        tx.send(RunEvent::TestStarted {
            name: "t".into(),
            n_cases: 2,
        })
        .unwrap();
        tx.send(RunEvent::CaseFinished {
            test: "t".into(),
            report: pass,
        })
        .unwrap();
        tx.send(RunEvent::CaseFinished {
            test: "t".into(),
            report: error,
        })
        .unwrap();
        drop(tx);

        let seen = OutPutter::start(rx, "suite.yaml", 1).await;

        assert_eq!(seen.cases, 2);
        assert_eq!(seen.failed.len(), 1);
        assert_eq!(seen.failed[0].1.name, "bad");
    }
}
