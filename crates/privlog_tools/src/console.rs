#![forbid(unsafe_code)]

use std::fmt::Write as _;

use privlog_kernel_contracts::applicant::{ApplicantColumn, ApplicantId, ApplicantRecord, RecordKey};
use privlog_kernel_contracts::employee::EmployeeId;
use privlog_kernel_contracts::history::ActionHistoryEntry;
use privlog_kernel_contracts::policy::{PolicyId, Purpose, Role};
use privlog_os::redaction::BatchMode;
use privlog_os::PrivlogRuntime;

pub const CONSOLE_USAGE: &str = "\
commands:
  show <applicant_id>
  update <applicant_id> <column> <value...>
  view <record_key> [policy_id]   (grants auditor/review when no policy_id)
  soft-delete <record_key>
  hard-delete <applicant_id>
  redact <column> <record_key>... [--sequential]
  redact-row <record_key>
  history <record_key> [--json]
  random [applicant|employee]
  help";

/// Executes one console line as `actor`. Output and errors are plain text.
pub fn execute_console_command(
    rt: &PrivlogRuntime,
    actor: EmployeeId,
    line: &str,
) -> Result<String, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&command, args)) = tokens.split_first() else {
        return Ok(String::new());
    };
    match command {
        "help" => Ok(CONSOLE_USAGE.to_string()),
        "show" => {
            let id = parse_applicant_id(arg(args, 0, "applicant_id")?)?;
            let record = rt
                .gateway
                .applicant_by_external_id(id)
                .map_err(|e| e.to_string())?;
            Ok(format_record(&record))
        }
        "update" => {
            let id = parse_applicant_id(arg(args, 0, "applicant_id")?)?;
            let column = arg(args, 1, "column")?;
            if args.len() < 3 {
                return Err("missing value".to_string());
            }
            let value = args[2..].join(" ");
            let out = rt
                .gateway
                .record_update(actor, id, column, &value)
                .map_err(|e| e.to_string())?;
            Ok(format!(
                "updated record {} {}: {} -> {} (entry {}, policy {})",
                out.record_key, out.column, out.previous, out.value, out.entry_id, out.policy_id
            ))
        }
        "view" => {
            let key = parse_record_key(arg(args, 0, "record_key")?)?;
            let policy_id = match args.get(1) {
                Some(raw) => parse_policy_id(raw)?,
                None => {
                    // No grant is issued for a record that does not exist.
                    rt.gateway.applicant(key).map_err(|e| e.to_string())?;
                    rt.ledger
                        .grant(Role::Auditor, Purpose::Review, None, None)
                        .map_err(|e| e.to_string())?
                }
            };
            let out = rt
                .gateway
                .record_view(policy_id, actor, key)
                .map_err(|e| e.to_string())?;
            Ok(format!(
                "{}\n(view logged as entry {} under policy {})",
                format_record(&out.record),
                out.entry_id,
                policy_id
            ))
        }
        "soft-delete" => {
            let key = parse_record_key(arg(args, 0, "record_key")?)?;
            let out = rt
                .gateway
                .record_soft_delete(actor, key)
                .map_err(|e| e.to_string())?;
            Ok(format!(
                "record {} marked redacted (entry {})",
                out.record_key, out.entry_id
            ))
        }
        "hard-delete" => {
            let id = parse_applicant_id(arg(args, 0, "applicant_id")?)?;
            let report = rt
                .gateway
                .hard_delete_cascading(id)
                .map_err(|e| e.to_string())?;
            Ok(format!(
                "removed {} record(s) and {} history entr(y/ies) for applicant {id}",
                report.records_removed, report.history_entries_removed
            ))
        }
        "redact" => {
            let column = ApplicantColumn::parse(arg(args, 0, "column")?).map_err(|e| e.to_string())?;
            let mut mode = BatchMode::Batched;
            let mut keys = Vec::new();
            for raw in &args[1..] {
                if *raw == "--sequential" {
                    mode = BatchMode::Sequential;
                } else {
                    keys.push(parse_record_key(raw)?);
                }
            }
            match keys.as_slice() {
                [] => Err("missing record_key".to_string()),
                [key] => {
                    let out = rt
                        .redaction
                        .redact_column(column, *key)
                        .map_err(|e| e.to_string())?;
                    Ok(format!(
                        "redacted {} of record {} (was {}); {} history payload(s) scrubbed",
                        out.column,
                        out.record_key,
                        out.previous,
                        out.history.total()
                    ))
                }
                many => {
                    let out = rt
                        .redaction
                        .batch_redact(column, many, mode)
                        .map_err(|e| e.to_string())?;
                    Ok(format!(
                        "redacted {} of {} record(s) in {} transaction(s); {} history payload(s) scrubbed",
                        out.column,
                        out.records,
                        out.transactions,
                        out.history.total()
                    ))
                }
            }
        }
        "redact-row" => {
            let key = parse_record_key(arg(args, 0, "record_key")?)?;
            let out = rt.redaction.redact_record(key).map_err(|e| e.to_string())?;
            Ok(format!(
                "cleared {} column(s) of record {}; {} history payload(s) scrubbed",
                out.columns_cleared,
                out.record_key,
                out.history.total()
            ))
        }
        "history" => {
            let key = parse_record_key(arg(args, 0, "record_key")?)?;
            let entries = rt.gateway.history_for(key);
            if args.get(1) == Some(&"--json") {
                return serde_json::to_string_pretty(&entries).map_err(|e| e.to_string());
            }
            Ok(entries
                .iter()
                .map(format_entry)
                .collect::<Vec<_>>()
                .join("\n"))
        }
        "random" => match args.first().copied().unwrap_or("applicant") {
            "applicant" => rt
                .gateway
                .random_applicant()
                .map(|r| format_record(&r))
                .map_err(|e| e.to_string()),
            "employee" => rt
                .gateway
                .random_employee()
                .map(|e| format!("{} {} <{}>", e.employee_id, e.display_name(), e.email))
                .map_err(|e| e.to_string()),
            other => Err(format!("unknown random target: {other}. expected applicant or employee")),
        },
        _ => Err(format!("unknown command: {command}\n{CONSOLE_USAGE}")),
    }
}

pub fn format_record(record: &ApplicantRecord) -> String {
    let mut out = format!(
        "record {} applicant_id={} redacted={} version={}",
        record.record_key, record.applicant_id, record.redacted, record.row_version
    );
    for column in ApplicantColumn::ALL {
        let _ = write!(out, "\n  {column}={}", record.value(column));
    }
    out
}

fn format_entry(entry: &ActionHistoryEntry) -> String {
    let mut out = format!(
        "#{} {} {} record={} policy={} actor={}",
        entry.entry_id,
        entry.time.to_rfc3339(),
        entry.operation,
        entry.record_key,
        entry.policy_id,
        entry.actor_id
    );
    if let Some(column) = entry.modified_column {
        let _ = write!(out, " column={column}");
    }
    match entry.rendered_new_data() {
        Some(data) => {
            let _ = write!(out, " new_data={data}");
        }
        None => out.push_str(" new_data=NULL"),
    }
    out
}

fn arg<'a>(args: &[&'a str], i: usize, name: &str) -> Result<&'a str, String> {
    args.get(i).copied().ok_or_else(|| format!("missing {name}"))
}

fn parse_applicant_id(raw: &str) -> Result<ApplicantId, String> {
    ApplicantId::parse(raw).map_err(|e| e.to_string())
}

fn parse_record_key(raw: &str) -> Result<RecordKey, String> {
    raw.parse::<u64>()
        .ok()
        .filter(|k| *k > 0)
        .map(RecordKey)
        .ok_or_else(|| format!("invalid record_key '{raw}'"))
}

fn parse_policy_id(raw: &str) -> Result<PolicyId, String> {
    raw.parse::<u64>()
        .ok()
        .filter(|k| *k > 0)
        .map(PolicyId)
        .ok_or_else(|| format!("invalid policy_id '{raw}'"))
}
